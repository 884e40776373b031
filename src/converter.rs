//! GeoJSON export of a decoded document.

use geojson::{Feature, FeatureCollection, Geometry, Value};
use serde_json::{Map, Value as JsonValue};

use crate::gpx_types::{GpxDocument, GpxPoint, GpxRoute, GpxTrack, GpxTrackSegment};
use crate::nullable::Nullable;
use crate::options::{ConvertOptions, GpxElementType};

type Properties = Map<String, JsonValue>;

/// Convert a document to a GeoJSON FeatureCollection.
///
/// Waypoints become Points, routes LineStrings, and tracks one LineString
/// per segment (or a single MultiLineString with `join_track_segments`).
/// Anything with a single point becomes a Point.
pub fn to_feature_collection(doc: &GpxDocument, opts: &ConvertOptions) -> FeatureCollection {
    let mut features = Vec::new();

    if opts.should_include(GpxElementType::Waypoint) {
        features.extend(
            doc.waypoints
                .iter()
                .map(|wpt| point_feature(wpt, "waypoint", opts)),
        );
    }

    if opts.should_include(GpxElementType::Route) {
        features.extend(doc.routes.iter().filter_map(|rte| route_to_feature(rte, opts)));
    }

    if opts.should_include(GpxElementType::Track) {
        for trk in &doc.tracks {
            features.extend(track_to_features(trk, opts));
        }
    }

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn feature(value: Value, properties: Properties) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn route_to_feature(rte: &GpxRoute, opts: &ConvertOptions) -> Option<Feature> {
    match rte.points.as_slice() {
        [] => None,
        [only] => Some(point_feature(only, "route", opts)),
        points => {
            let mut props = gpx_type("route");
            if opts.include_metadata {
                insert_strings(
                    &mut props,
                    &[
                        ("name", &rte.name),
                        ("cmt", &rte.comment),
                        ("desc", &rte.description),
                        ("src", &rte.source),
                        ("type", &rte.route_type),
                    ],
                );
                insert_number(&mut props, "number", &rte.number);
            }
            if opts.include_time {
                insert_coordinate_times(&mut props, vec![times(points)]);
            }
            Some(feature(Value::LineString(line(points, opts)), props))
        }
    }
}

fn track_to_features(trk: &GpxTrack, opts: &ConvertOptions) -> Vec<Feature> {
    let segments: Vec<&GpxTrackSegment> = trk
        .segments
        .iter()
        .filter(|s| !s.points.is_empty())
        .collect();

    match segments.as_slice() {
        [] => return Vec::new(),
        [only] if only.points.len() == 1 => {
            return vec![point_feature(&only.points[0], "track", opts)];
        }
        _ => {}
    }

    // single-point segments cannot form a line
    let lines: Vec<&GpxTrackSegment> = segments.into_iter().filter(|s| s.points.len() >= 2).collect();

    if opts.join_track_segments && lines.len() > 1 {
        let mut props = track_props(trk, opts);
        if opts.include_time {
            insert_coordinate_times(&mut props, lines.iter().map(|s| times(&s.points)).collect());
        }
        let coords = lines.iter().map(|s| line(&s.points, opts)).collect();
        return vec![feature(Value::MultiLineString(coords), props)];
    }

    lines
        .into_iter()
        .map(|seg| {
            let mut props = track_props(trk, opts);
            if opts.include_time {
                insert_coordinate_times(&mut props, vec![times(&seg.points)]);
            }
            feature(Value::LineString(line(&seg.points, opts)), props)
        })
        .collect()
}

fn track_props(trk: &GpxTrack, opts: &ConvertOptions) -> Properties {
    let mut props = gpx_type("track");
    if opts.include_metadata {
        insert_strings(
            &mut props,
            &[
                ("name", &trk.name),
                ("cmt", &trk.comment),
                ("desc", &trk.description),
                ("src", &trk.source),
                ("type", &trk.track_type),
            ],
        );
        insert_number(&mut props, "number", &trk.number);
    }
    props
}

fn point_feature(pt: &GpxPoint, kind: &str, opts: &ConvertOptions) -> Feature {
    let mut props = gpx_type(kind);
    if opts.include_metadata {
        insert_strings(
            &mut props,
            &[
                ("name", &pt.name),
                ("cmt", &pt.comment),
                ("desc", &pt.description),
                ("src", &pt.source),
                ("sym", &pt.symbol),
                ("type", &pt.point_type),
            ],
        );
        if let Some(ele) = pt.elevation.value().and_then(serde_json::Number::from_f64) {
            props.insert("ele".to_string(), JsonValue::Number(ele));
        }
        if let Some(time) = pt.timestamp.format() {
            props.insert("time".to_string(), JsonValue::String(time));
        }
    }
    feature(Value::Point(coords(pt, opts)), props)
}

fn gpx_type(kind: &str) -> Properties {
    let mut props = Map::new();
    props.insert("gpxType".to_string(), JsonValue::String(kind.to_string()));
    props
}

/// [lon, lat] or [lon, lat, ele].
fn coords(pt: &GpxPoint, opts: &ConvertOptions) -> Vec<f64> {
    match (opts.include_elevation, pt.elevation.value()) {
        (true, Some(ele)) => vec![pt.lon, pt.lat, ele],
        _ => vec![pt.lon, pt.lat],
    }
}

fn line(points: &[GpxPoint], opts: &ConvertOptions) -> Vec<Vec<f64>> {
    points.iter().map(|pt| coords(pt, opts)).collect()
}

fn times(points: &[GpxPoint]) -> Vec<JsonValue> {
    points
        .iter()
        .map(|pt| pt.timestamp.format().map_or(JsonValue::Null, JsonValue::String))
        .collect()
}

fn insert_strings(props: &mut Properties, fields: &[(&str, &String)]) {
    for (key, value) in fields {
        if !value.is_empty() {
            props.insert(key.to_string(), JsonValue::String(value.to_string()));
        }
    }
}

fn insert_number(props: &mut Properties, key: &str, value: &Nullable<i64>) {
    if let Some(n) = value.value() {
        props.insert(key.to_string(), JsonValue::Number(n.into()));
    }
}

/// `coordinateProperties.times`, flat for a LineString and nested per line
/// for a MultiLineString. Omitted when no point has a timestamp.
fn insert_coordinate_times(props: &mut Properties, per_line: Vec<Vec<JsonValue>>) {
    if per_line.iter().flatten().all(JsonValue::is_null) {
        return;
    }
    let times = match <[_; 1]>::try_from(per_line) {
        Ok([single]) => JsonValue::Array(single),
        Err(lines) => JsonValue::Array(lines.into_iter().map(JsonValue::Array).collect()),
    };
    let mut coord_props = Map::new();
    coord_props.insert("times".to_string(), times);
    props.insert("coordinateProperties".to_string(), JsonValue::Object(coord_props));
}
