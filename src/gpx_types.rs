//! Version-neutral GPX document model.
//!
//! Strings use the empty string for "not set"; numbers and timestamps use
//! [`Nullable`]. Both wire layouts decode into and encode from these types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::extension::{Extension, ExtensionAttr};
use crate::namespace::NamespaceRegistry;
use crate::nullable::Nullable;

/// Written as `creator` when a document does not name one.
pub const DEFAULT_CREATOR: &str = concat!("gpxdoc ", env!("CARGO_PKG_VERSION"));

/// A GPX document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GpxDocument {
    pub version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub creator: String,
    #[serde(skip_serializing_if = "NamespaceRegistry::is_empty")]
    pub namespaces: NamespaceRegistry,
    /// Extra root attributes such as `xsi:schemaLocation`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<ExtensionAttr>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub author_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub author_email: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub author_link: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub author_link_text: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub author_link_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub copyright: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub copyright_year: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub copyright_license: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub link: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub link_text: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub link_type: String,
    #[serde(skip_serializing_if = "Nullable::is_absent")]
    pub time: Nullable<DateTime<Utc>>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub keywords: String,
    #[serde(skip_serializing_if = "Extension::is_empty")]
    pub extensions: Extension,
    #[serde(skip_serializing_if = "Extension::is_empty")]
    pub metadata_extensions: Extension,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub waypoints: Vec<GpxPoint>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<GpxRoute>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tracks: Vec<GpxTrack>,
}

impl Default for GpxDocument {
    fn default() -> Self {
        Self {
            version: "1.1".to_string(),
            creator: String::new(),
            namespaces: NamespaceRegistry::default(),
            attributes: Vec::new(),
            name: String::new(),
            description: String::new(),
            author_name: String::new(),
            author_email: String::new(),
            author_link: String::new(),
            author_link_text: String::new(),
            author_link_type: String::new(),
            copyright: String::new(),
            copyright_year: String::new(),
            copyright_license: String::new(),
            link: String::new(),
            link_text: String::new(),
            link_type: String::new(),
            time: Nullable::absent(),
            keywords: String::new(),
            extensions: Extension::default(),
            metadata_extensions: Extension::default(),
            waypoints: Vec::new(),
            routes: Vec::new(),
            tracks: Vec::new(),
        }
    }
}

/// A waypoint, route point or track point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GpxPoint {
    pub lat: f64,
    pub lon: f64,
    #[serde(skip_serializing_if = "Nullable::is_absent")]
    pub elevation: Nullable<f64>,
    #[serde(skip_serializing_if = "Nullable::is_absent")]
    pub timestamp: Nullable<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Nullable::is_absent")]
    pub magnetic_variation: Nullable<f64>,
    #[serde(skip_serializing_if = "Nullable::is_absent")]
    pub geoid_height: Nullable<f64>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub comment: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub symbol: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub point_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub type_of_gps_fix: String,
    #[serde(skip_serializing_if = "Nullable::is_absent")]
    pub satellites: Nullable<i64>,
    #[serde(skip_serializing_if = "Nullable::is_absent")]
    pub horizontal_dilution: Nullable<f64>,
    #[serde(skip_serializing_if = "Nullable::is_absent")]
    pub vertical_dilution: Nullable<f64>,
    #[serde(skip_serializing_if = "Nullable::is_absent")]
    pub positional_dilution: Nullable<f64>,
    #[serde(skip_serializing_if = "Nullable::is_absent")]
    pub age_of_dgps_data: Nullable<f64>,
    #[serde(skip_serializing_if = "Nullable::is_absent")]
    pub dgps_id: Nullable<i64>,
    #[serde(skip_serializing_if = "Extension::is_empty")]
    pub extensions: Extension,
}

impl GpxPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            ..Default::default()
        }
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation.set(elevation);
        self
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.timestamp.set(time);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GpxRoute {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub comment: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(skip_serializing_if = "Nullable::is_absent")]
    pub number: Nullable<i64>,
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub route_type: String,
    #[serde(skip_serializing_if = "Extension::is_empty")]
    pub extensions: Extension,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<GpxPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GpxTrack {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub comment: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(skip_serializing_if = "Nullable::is_absent")]
    pub number: Nullable<i64>,
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub track_type: String,
    #[serde(skip_serializing_if = "Extension::is_empty")]
    pub extensions: Extension,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<GpxTrackSegment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GpxTrackSegment {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<GpxPoint>,
    #[serde(skip_serializing_if = "Extension::is_empty")]
    pub extensions: Extension,
}

impl GpxTrackSegment {
    pub fn new(points: Vec<GpxPoint>) -> Self {
        Self {
            points,
            extensions: Extension::default(),
        }
    }

    pub fn append_point(&mut self, point: GpxPoint) {
        self.points.push(point);
    }

    /// Keeps `points[..=at]` and returns a new segment with the rest.
    /// Returns `None` (and leaves the segment alone) when `at` is out of range.
    pub fn split_off(&mut self, at: usize) -> Option<GpxTrackSegment> {
        if at >= self.points.len() {
            return None;
        }
        Some(GpxTrackSegment::new(self.points.split_off(at + 1)))
    }

    pub fn join(&mut self, other: GpxTrackSegment) {
        self.points.extend(other.points);
    }

    pub fn has_times(&self) -> bool {
        self.points.iter().all(|p| p.timestamp.is_present())
    }
}

impl GpxTrack {
    pub fn append_segment(&mut self, segment: GpxTrackSegment) {
        self.segments.push(segment);
    }

    pub fn remove_segment(&mut self, idx: usize) -> Option<GpxTrackSegment> {
        (idx < self.segments.len()).then(|| self.segments.remove(idx))
    }

    /// Splits segment `segment_no` after `point_no`. The point at the split
    /// index stays in the first half; out-of-range indices are a no-op.
    pub fn split(&mut self, segment_no: usize, point_no: usize) {
        let Some(segment) = self.segments.get_mut(segment_no) else {
            return;
        };
        if let Some(rest) = segment.split_off(point_no) {
            self.segments.insert(segment_no + 1, rest);
        }
    }

    /// Appends the points of `second` to `first` and drops `second`.
    pub fn join(&mut self, first: usize, second: usize) {
        if first == second || first >= self.segments.len() || second >= self.segments.len() {
            return;
        }
        let removed = self.segments.remove(second);
        let first = if second < first { first - 1 } else { first };
        self.segments[first].join(removed);
    }

    pub fn join_next(&mut self, segment_no: usize) {
        self.join(segment_no, segment_no + 1);
    }

    pub fn points(&self) -> impl Iterator<Item = &GpxPoint> {
        self.segments.iter().flat_map(|s| s.points.iter())
    }

    pub fn points_mut(&mut self) -> impl Iterator<Item = &mut GpxPoint> {
        self.segments.iter_mut().flat_map(|s| s.points.iter_mut())
    }

    pub fn has_times(&self) -> bool {
        self.segments.iter().all(GpxTrackSegment::has_times)
    }
}

impl GpxDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-assigns `prefix` to a namespace URL used by extension nodes.
    pub fn register_namespace(&mut self, prefix: &str, url: &str) -> Result<()> {
        self.namespaces.register(prefix, url)
    }

    pub fn append_waypoint(&mut self, point: GpxPoint) {
        self.waypoints.push(point);
    }

    pub fn append_route(&mut self, route: GpxRoute) {
        self.routes.push(route);
    }

    pub fn append_track(&mut self, track: GpxTrack) {
        self.tracks.push(track);
    }

    pub fn remove_waypoint(&mut self, idx: usize) -> Option<GpxPoint> {
        (idx < self.waypoints.len()).then(|| self.waypoints.remove(idx))
    }

    pub fn remove_route(&mut self, idx: usize) -> Option<GpxRoute> {
        (idx < self.routes.len()).then(|| self.routes.remove(idx))
    }

    pub fn remove_track(&mut self, idx: usize) -> Option<GpxTrack> {
        (idx < self.tracks.len()).then(|| self.tracks.remove(idx))
    }

    /// Appends to the last segment of the last track, creating either if
    /// the document has none.
    pub fn append_point(&mut self, point: GpxPoint) {
        if self.tracks.is_empty() {
            self.tracks.push(GpxTrack::default());
        }
        let last = self.tracks.len() - 1;
        let track = &mut self.tracks[last];
        if track.segments.is_empty() {
            track.segments.push(GpxTrackSegment::default());
        }
        let last = track.segments.len() - 1;
        track.segments[last].append_point(point);
    }

    pub fn split(&mut self, track_no: usize, segment_no: usize, point_no: usize) {
        if let Some(track) = self.tracks.get_mut(track_no) {
            track.split(segment_no, point_no);
        }
    }

    pub fn join(&mut self, track_no: usize, first: usize, second: usize) {
        if let Some(track) = self.tracks.get_mut(track_no) {
            track.join(first, second);
        }
    }

    pub fn join_next(&mut self, track_no: usize, segment_no: usize) {
        if let Some(track) = self.tracks.get_mut(track_no) {
            track.join_next(segment_no);
        }
    }

    /// Moves every segment of every track into the first track, in order.
    pub fn reduce_to_single_track(&mut self) {
        if self.tracks.len() <= 1 {
            return;
        }
        let mut rest = self.tracks.split_off(1);
        let first = &mut self.tracks[0];
        for track in &mut rest {
            first.segments.append(&mut track.segments);
        }
    }

    pub fn track_points_no(&self) -> usize {
        self.tracks
            .iter()
            .flat_map(|t| &t.segments)
            .map(|s| s.points.len())
            .sum()
    }

    pub fn execute_on_waypoints<F: FnMut(&mut GpxPoint)>(&mut self, mut f: F) {
        self.waypoints.iter_mut().for_each(&mut f);
    }

    pub fn execute_on_route_points<F: FnMut(&mut GpxPoint)>(&mut self, mut f: F) {
        self.routes
            .iter_mut()
            .flat_map(|r| r.points.iter_mut())
            .for_each(&mut f);
    }

    pub fn execute_on_track_points<F: FnMut(&mut GpxPoint)>(&mut self, mut f: F) {
        self.tracks
            .iter_mut()
            .flat_map(|t| t.points_mut())
            .for_each(&mut f);
    }

    pub fn execute_on_all_points<F: FnMut(&mut GpxPoint)>(&mut self, mut f: F) {
        self.execute_on_waypoints(&mut f);
        self.execute_on_route_points(&mut f);
        self.execute_on_track_points(&mut f);
    }

    /// Shifts every present elevation by `delta`; absent ones stay absent.
    pub fn add_elevation(&mut self, delta: f64) {
        self.execute_on_all_points(|p| {
            if let Some(ele) = p.elevation.get_mut() {
                *ele += delta;
            }
        });
    }

    pub fn remove_elevation(&mut self) {
        self.execute_on_all_points(|p| p.elevation.clear());
    }

    pub fn remove_time(&mut self) {
        self.time.clear();
        self.execute_on_all_points(|p| p.timestamp.clear());
    }

    /// True when every point of every track segment carries a timestamp.
    pub fn has_times(&self) -> bool {
        self.tracks.iter().all(GpxTrack::has_times)
    }

    /// Namespace URLs referenced by extensions and root attributes.
    pub(crate) fn extension_namespaces(&self) -> Vec<String> {
        let mut out = Vec::new();
        for attr in &self.attributes {
            if !attr.namespace.is_empty() && !out.contains(&attr.namespace) {
                out.push(attr.namespace.clone());
            }
        }
        for ext in self.all_extensions() {
            ext.collect_namespaces(&mut out);
        }
        out
    }

    /// Whether a root or extension attribute is qualified with `namespace`.
    pub(crate) fn has_attribute_in(&self, namespace: &str) -> bool {
        self.attributes.iter().any(|a| a.namespace == namespace)
            || self
                .all_extensions()
                .iter()
                .any(|ext| ext.has_attribute_in(namespace))
    }

    fn all_extensions(&self) -> Vec<&Extension> {
        let mut all = vec![&self.extensions, &self.metadata_extensions];
        let points = self
            .waypoints
            .iter()
            .chain(self.routes.iter().flat_map(|r| &r.points))
            .chain(self.tracks.iter().flat_map(|t| t.points()));
        all.extend(points.map(|p| &p.extensions));
        all.extend(self.routes.iter().map(|r| &r.extensions));
        for t in &self.tracks {
            all.push(&t.extensions);
            all.extend(t.segments.iter().map(|s| &s.extensions));
        }
        all
    }
}
