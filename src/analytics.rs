//! Track analytics over the document model.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::geo::{self, GeoError, SpeedAndDistance};
use crate::gpx_types::{GpxDocument, GpxPoint, GpxRoute, GpxTrack, GpxTrackSegment};

/// km/h at or below which a pair of points counts as stopped.
pub const STOPPED_SPEED_THRESHOLD: f64 = 1.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovingData {
    /// Seconds.
    pub moving_time: f64,
    pub stopped_time: f64,
    /// Metres.
    pub moving_distance: f64,
    pub stopped_distance: f64,
    /// Metres per second.
    pub max_speed: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UphillDownhill {
    pub uphill: f64,
    pub downhill: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpxBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl GpxBounds {
    fn merge(self, other: GpxBounds) -> GpxBounds {
        GpxBounds {
            min_lat: self.min_lat.min(other.min_lat),
            max_lat: self.max_lat.max(other.max_lat),
            min_lon: self.min_lon.min(other.min_lon),
            max_lon: self.max_lon.max(other.max_lon),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ElevationBounds {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBounds {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// A point found by [`GpxDocument::location_at`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationMatch {
    pub track_no: usize,
    pub segment_no: usize,
    pub point_no: usize,
}

/// Summary statistics for a whole document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpxStats {
    pub length_2d: f64,
    pub length_3d: f64,
    pub duration: f64,
    pub moving_data: MovingData,
    pub uphill_downhill: UphillDownhill,
    pub bounds: Option<GpxBounds>,
    pub time_bounds: Option<TimeBounds>,
    pub track_points: usize,
}

impl GpxStats {
    pub fn of(doc: &GpxDocument) -> Self {
        Self {
            length_2d: doc.length_2d(),
            length_3d: doc.length_3d(),
            duration: doc.duration(),
            moving_data: doc.moving_data(),
            uphill_downhill: doc.uphill_downhill(),
            bounds: doc.bounds(),
            time_bounds: doc.time_bounds(),
            track_points: doc.track_points_no(),
        }
    }
}

/// Lat/lon bounds over any set of points.
pub fn bounds_of<'a>(points: impl IntoIterator<Item = &'a GpxPoint>) -> Option<GpxBounds> {
    points
        .into_iter()
        .map(|p| GpxBounds {
            min_lat: p.lat,
            max_lat: p.lat,
            min_lon: p.lon,
            max_lon: p.lon,
        })
        .reduce(GpxBounds::merge)
}

/// Elevation range over the points that have one.
pub fn elevation_bounds_of<'a>(
    points: impl IntoIterator<Item = &'a GpxPoint>,
) -> Option<ElevationBounds> {
    points
        .into_iter()
        .filter_map(|p| p.elevation.value())
        .fold(None, |acc: Option<ElevationBounds>, ele| {
            Some(match acc {
                Some(b) => ElevationBounds {
                    min: b.min.min(ele),
                    max: b.max.max(ele),
                },
                None => ElevationBounds { min: ele, max: ele },
            })
        })
}

/// First and last timestamp, in point order, of the points that have one.
pub fn time_bounds_of<'a>(points: impl IntoIterator<Item = &'a GpxPoint>) -> Option<TimeBounds> {
    let mut times = points.into_iter().filter_map(|p| p.timestamp.value());
    let start_time = times.next()?;
    let end_time = times.last().unwrap_or(start_time);
    Some(TimeBounds {
        start_time,
        end_time,
    })
}

impl GpxPoint {
    pub fn distance_2d(&self, other: &GpxPoint) -> f64 {
        geo::distance_2d(self.lat, self.lon, other.lat, other.lon, false)
    }

    pub fn distance_3d(&self, other: &GpxPoint) -> f64 {
        geo::distance_3d(
            (self.lat, self.lon, self.elevation),
            (other.lat, other.lon, other.elevation),
            false,
        )
    }

    pub fn haversine_distance(&self, other: &GpxPoint) -> f64 {
        geo::haversine_distance(self.lat, self.lon, other.lat, other.lon)
    }

    /// Ellipsoidal distance; with `with_elevation` the elevation delta is
    /// added when both points have one.
    pub fn vincenty_distance(&self, other: &GpxPoint, with_elevation: bool) -> Result<f64, GeoError> {
        let flat = geo::vincenty_distance(self.lat, self.lon, other.lat, other.lon)?;
        match (with_elevation, self.elevation.value(), other.elevation.value()) {
            (true, Some(e1), Some(e2)) => Ok((flat * flat + (e1 - e2).powi(2)).sqrt()),
            _ => Ok(flat),
        }
    }

    /// Seconds from `other` to `self`, when both have timestamps.
    pub fn time_diff(&self, other: &GpxPoint) -> Option<f64> {
        let (t1, t2) = (self.timestamp.value()?, other.timestamp.value()?);
        Some((t1 - t2).num_milliseconds() as f64 / 1000.0)
    }

    /// 3D speed in m/s between two timestamped points.
    pub fn speed_between(&self, other: &GpxPoint) -> Option<f64> {
        let seconds = self.time_diff(other)?;
        (seconds != 0.0).then(|| (self.distance_3d(other) / seconds).abs())
    }

    pub fn elevation_angle(&self, other: &GpxPoint, radians: bool) -> f64 {
        geo::elevation_angle(self, other, radians)
    }

    pub fn angle_from_north(&self, other: &GpxPoint, radians: bool) -> f64 {
        geo::angle_from_north(self, other, radians)
    }

    /// Largest of the known HDOP/VDOP/PDOP values, 0 when none is known.
    pub fn max_dilution_of_precision(&self) -> f64 {
        [
            self.horizontal_dilution,
            self.vertical_dilution,
            self.positional_dilution,
        ]
        .iter()
        .filter_map(|d| d.value())
        .fold(0.0, f64::max)
    }
}

impl GpxTrackSegment {
    pub fn length_2d(&self) -> f64 {
        geo::length_2d(&self.points)
    }

    pub fn length_3d(&self) -> f64 {
        geo::length_3d(&self.points)
    }

    pub fn bounds(&self) -> Option<GpxBounds> {
        bounds_of(&self.points)
    }

    pub fn elevation_bounds(&self) -> Option<ElevationBounds> {
        elevation_bounds_of(&self.points)
    }

    pub fn time_bounds(&self) -> Option<TimeBounds> {
        time_bounds_of(&self.points)
    }

    /// Seconds between the first and last timestamp.
    pub fn duration(&self) -> f64 {
        self.time_bounds()
            .map(|b| (b.end_time - b.start_time).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0)
    }

    /// Speed (m/s) at a point, averaged over its neighbours. An index past
    /// the end is clamped to the last point.
    pub fn speed(&self, point_no: usize) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        let idx = point_no.min(self.points.len() - 1);
        let point = &self.points[idx];
        let prev = idx
            .checked_sub(1)
            .and_then(|i| point.speed_between(&self.points[i]));
        let next = self
            .points
            .get(idx + 1)
            .and_then(|p| point.speed_between(p));
        match (prev, next) {
            (Some(a), Some(b)) => (a + b) / 2.0,
            (Some(s), None) | (None, Some(s)) => s,
            (None, None) => 0.0,
        }
    }

    pub fn uphill_downhill(&self) -> UphillDownhill {
        let elevations: Vec<_> = self.points.iter().map(|p| p.elevation).collect();
        let (uphill, downhill) = geo::calc_uphill_downhill(&elevations);
        UphillDownhill { uphill, downhill }
    }

    /// Splits consecutive point pairs into moving and stopped buckets by
    /// their speed against [`STOPPED_SPEED_THRESHOLD`].
    pub fn moving_data(&self) -> MovingData {
        let mut data = MovingData::default();
        let mut samples = Vec::new();

        for pair in self.points.windows(2) {
            let (prev, point) = (&pair[0], &pair[1]);
            let distance = point.distance_3d(prev);
            let seconds = point.time_diff(prev).unwrap_or(0.0);
            let speed_kmh = if seconds > 0.0 {
                (distance / 1000.0) / (seconds / 3600.0)
            } else {
                0.0
            };

            if speed_kmh <= STOPPED_SPEED_THRESHOLD {
                data.stopped_time += seconds.max(0.0);
                data.stopped_distance += distance;
            } else {
                data.moving_time += seconds;
                data.moving_distance += distance;
                samples.push(SpeedAndDistance {
                    speed: distance / seconds,
                    distance,
                });
            }
        }

        data.max_speed = geo::calc_max_speed(&samples);
        data
    }

    /// Index of the first point timestamped after `t`. `None` for segments
    /// whose timestamps do not move forward, or when `t` is past the end.
    pub fn location_at(&self, t: DateTime<Utc>) -> Option<usize> {
        let bounds = self.time_bounds()?;
        if bounds.start_time >= bounds.end_time {
            return None;
        }
        self.points
            .iter()
            .position(|p| p.timestamp.value().is_some_and(|pt| t < pt))
    }

    pub fn simplify(&mut self, max_distance: f64) {
        self.points = geo::simplify_points(&self.points, max_distance);
    }

    pub fn smooth_horizontal(&mut self) {
        self.points = geo::smooth_horizontal(&self.points);
    }

    pub fn smooth_vertical(&mut self) {
        self.points = geo::smooth_vertical(&self.points);
    }

    /// Drops every point closer than `min_distance` (3D) to the last kept one.
    pub fn reduce_points(&mut self, min_distance: f64) {
        let mut kept: Vec<GpxPoint> = Vec::with_capacity(self.points.len());
        for p in self.points.drain(..) {
            match kept.last() {
                Some(last) if last.distance_3d(&p) < min_distance => {}
                _ => kept.push(p),
            }
        }
        self.points = kept;
    }
}

impl GpxTrack {
    pub fn length_2d(&self) -> f64 {
        self.segments.iter().map(GpxTrackSegment::length_2d).sum()
    }

    pub fn length_3d(&self) -> f64 {
        self.segments.iter().map(GpxTrackSegment::length_3d).sum()
    }

    pub fn duration(&self) -> f64 {
        self.segments.iter().map(GpxTrackSegment::duration).sum()
    }

    pub fn bounds(&self) -> Option<GpxBounds> {
        bounds_of(self.points())
    }

    pub fn elevation_bounds(&self) -> Option<ElevationBounds> {
        elevation_bounds_of(self.points())
    }

    pub fn time_bounds(&self) -> Option<TimeBounds> {
        time_bounds_of(self.points())
    }

    pub fn uphill_downhill(&self) -> UphillDownhill {
        self.segments
            .iter()
            .map(GpxTrackSegment::uphill_downhill)
            .fold(UphillDownhill::default(), |acc, u| UphillDownhill {
                uphill: acc.uphill + u.uphill,
                downhill: acc.downhill + u.downhill,
            })
    }

    /// Sums of every segment; max speed is the largest segment max speed.
    pub fn moving_data(&self) -> MovingData {
        self.segments
            .iter()
            .map(GpxTrackSegment::moving_data)
            .fold(MovingData::default(), sum_moving_data)
    }

    /// `(segment_no, point_no)` for every segment with a match.
    pub fn location_at(&self, t: DateTime<Utc>) -> Vec<(usize, usize)> {
        self.segments
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.location_at(t).map(|p| (i, p)))
            .collect()
    }

    pub fn simplify(&mut self, max_distance: f64) {
        self.segments.iter_mut().for_each(|s| s.simplify(max_distance));
    }

    pub fn smooth_horizontal(&mut self) {
        self.segments.iter_mut().for_each(GpxTrackSegment::smooth_horizontal);
    }

    pub fn smooth_vertical(&mut self) {
        self.segments.iter_mut().for_each(GpxTrackSegment::smooth_vertical);
    }
}

fn sum_moving_data(acc: MovingData, md: MovingData) -> MovingData {
    MovingData {
        moving_time: acc.moving_time + md.moving_time,
        stopped_time: acc.stopped_time + md.stopped_time,
        moving_distance: acc.moving_distance + md.moving_distance,
        stopped_distance: acc.stopped_distance + md.stopped_distance,
        max_speed: acc.max_speed.max(md.max_speed),
    }
}

impl GpxRoute {
    pub fn length_2d(&self) -> f64 {
        geo::length_2d(&self.points)
    }

    pub fn length_3d(&self) -> f64 {
        geo::length_3d(&self.points)
    }

    pub fn bounds(&self) -> Option<GpxBounds> {
        bounds_of(&self.points)
    }

    /// Mean latitude and longitude of the route points.
    pub fn center(&self) -> Option<(f64, f64)> {
        if self.points.is_empty() {
            return None;
        }
        let n = self.points.len() as f64;
        let lat = self.points.iter().map(|p| p.lat).sum::<f64>() / n;
        let lon = self.points.iter().map(|p| p.lon).sum::<f64>() / n;
        Some((lat, lon))
    }
}

impl GpxDocument {
    pub fn length_2d(&self) -> f64 {
        self.tracks.iter().map(GpxTrack::length_2d).sum()
    }

    pub fn length_3d(&self) -> f64 {
        self.tracks.iter().map(GpxTrack::length_3d).sum()
    }

    pub fn duration(&self) -> f64 {
        self.tracks.iter().map(GpxTrack::duration).sum()
    }

    /// Bounds of all track points.
    pub fn bounds(&self) -> Option<GpxBounds> {
        bounds_of(self.tracks.iter().flat_map(|t| t.points()))
    }

    pub fn elevation_bounds(&self) -> Option<ElevationBounds> {
        elevation_bounds_of(self.tracks.iter().flat_map(|t| t.points()))
    }

    pub fn time_bounds(&self) -> Option<TimeBounds> {
        time_bounds_of(self.tracks.iter().flat_map(|t| t.points()))
    }

    pub fn uphill_downhill(&self) -> UphillDownhill {
        self.tracks
            .iter()
            .map(GpxTrack::uphill_downhill)
            .fold(UphillDownhill::default(), |acc, u| UphillDownhill {
                uphill: acc.uphill + u.uphill,
                downhill: acc.downhill + u.downhill,
            })
    }

    pub fn moving_data(&self) -> MovingData {
        self.tracks
            .iter()
            .map(GpxTrack::moving_data)
            .fold(MovingData::default(), sum_moving_data)
    }

    pub fn location_at(&self, t: DateTime<Utc>) -> Vec<LocationMatch> {
        self.tracks
            .iter()
            .enumerate()
            .flat_map(|(track_no, track)| {
                track
                    .location_at(t)
                    .into_iter()
                    .map(move |(segment_no, point_no)| LocationMatch {
                        track_no,
                        segment_no,
                        point_no,
                    })
            })
            .collect()
    }

    pub fn simplify_tracks(&mut self, max_distance: f64) {
        self.tracks.iter_mut().for_each(|t| t.simplify(max_distance));
    }

    pub fn smooth_horizontal(&mut self) {
        self.tracks.iter_mut().for_each(GpxTrack::smooth_horizontal);
    }

    pub fn smooth_vertical(&mut self) {
        self.tracks.iter_mut().for_each(GpxTrack::smooth_vertical);
    }

    /// Thins track points: first by `min_distance`, then, if more than
    /// `max_points` remain, by the distance that spreads `max_points` evenly
    /// over the 3D length. Zero disables either step.
    pub fn reduce_track_points(&mut self, max_points: usize, min_distance: f64) {
        if min_distance > 0.0 {
            self.for_each_segment(|s| s.reduce_points(min_distance));
        }
        if max_points == 0 || self.track_points_no() <= max_points {
            return;
        }
        let spacing = (self.length_3d() / max_points as f64).ceil();
        if spacing > 0.0 {
            self.for_each_segment(|s| s.reduce_points(spacing));
        }
    }

    fn for_each_segment<F: FnMut(&mut GpxTrackSegment)>(&mut self, mut f: F) {
        self.tracks
            .iter_mut()
            .flat_map(|t| t.segments.iter_mut())
            .for_each(&mut f);
    }
}
