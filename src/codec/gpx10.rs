//! GPX 1.0: flat author/email/url on the root, no extensions, and plain
//! zero-defaulted numbers for the GPS-fix quality fields.

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::error::Result;
use crate::extension::ExtensionAttr;
use crate::gpx_types::{
    DEFAULT_CREATOR, GpxDocument, GpxPoint, GpxRoute, GpxTrack, GpxTrackSegment,
};
use crate::namespace::{GPX10_NAMESPACE, NamespaceRegistry};
use crate::nullable::{Nullable, WireValue};
use crate::xml::{XmlInput, XmlOutput};

#[derive(Debug, Default, PartialEq)]
pub(crate) struct Gpx10 {
    pub version: String,
    pub creator: String,
    pub attributes: Vec<ExtensionAttr>,
    pub name: String,
    pub desc: String,
    pub author: String,
    pub email: String,
    pub url: String,
    pub urlname: String,
    pub time: Nullable<DateTime<Utc>>,
    pub keywords: String,
    pub waypoints: Vec<Point>,
    pub routes: Vec<Route>,
    pub tracks: Vec<Track>,
}

/// A 1.0 point. `sat`, the DOPs, `ageofdgpsdata` and `dgpsid` have no
/// presence encoding: zero means "not reported".
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct Point {
    pub lat: f64,
    pub lon: f64,
    pub ele: Nullable<f64>,
    pub time: Nullable<DateTime<Utc>>,
    pub course: Nullable<f64>,
    pub speed: Nullable<f64>,
    pub magvar: Nullable<f64>,
    pub geoidheight: Nullable<f64>,
    pub name: String,
    pub cmt: String,
    pub desc: String,
    pub src: String,
    pub url: String,
    pub urlname: String,
    pub sym: String,
    pub point_type: String,
    pub fix: String,
    pub sat: i64,
    pub hdop: f64,
    pub vdop: f64,
    pub pdop: f64,
    pub ageofdgpsdata: f64,
    pub dgpsid: i64,
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct Route {
    pub name: String,
    pub cmt: String,
    pub desc: String,
    pub src: String,
    pub url: String,
    pub urlname: String,
    pub number: Nullable<i64>,
    pub route_type: String,
    pub points: Vec<Point>,
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct Track {
    pub name: String,
    pub cmt: String,
    pub desc: String,
    pub src: String,
    pub url: String,
    pub urlname: String,
    pub number: Nullable<i64>,
    pub track_type: String,
    pub segments: Vec<Vec<Point>>,
}

// ---- neutral <-> wire ----

/// Lossy: absent fix-quality values become zero, extensions and route/track
/// links are dropped.
pub(crate) fn to_wire(doc: &GpxDocument, version: &str) -> Gpx10 {
    Gpx10 {
        version: version.to_string(),
        creator: if doc.creator.is_empty() {
            DEFAULT_CREATOR.to_string()
        } else {
            doc.creator.clone()
        },
        attributes: doc.attributes.clone(),
        name: doc.name.clone(),
        desc: doc.description.clone(),
        author: doc.author_name.clone(),
        email: doc.author_email.clone(),
        url: doc.author_link.clone(),
        urlname: doc.author_link_text.clone(),
        time: doc.time,
        keywords: doc.keywords.clone(),
        waypoints: doc.waypoints.iter().map(point_to_wire).collect(),
        routes: doc
            .routes
            .iter()
            .map(|r| Route {
                name: r.name.clone(),
                cmt: r.comment.clone(),
                desc: r.description.clone(),
                src: r.source.clone(),
                number: r.number,
                route_type: r.route_type.clone(),
                points: r.points.iter().map(point_to_wire).collect(),
                ..Default::default()
            })
            .collect(),
        tracks: doc
            .tracks
            .iter()
            .map(|t| Track {
                name: t.name.clone(),
                cmt: t.comment.clone(),
                desc: t.description.clone(),
                src: t.source.clone(),
                number: t.number,
                track_type: t.track_type.clone(),
                segments: t
                    .segments
                    .iter()
                    .map(|s| s.points.iter().map(point_to_wire).collect())
                    .collect(),
                ..Default::default()
            })
            .collect(),
    }
}

fn point_to_wire(p: &GpxPoint) -> Point {
    Point {
        lat: p.lat,
        lon: p.lon,
        ele: p.elevation,
        time: p.timestamp,
        magvar: p.magnetic_variation,
        geoidheight: p.geoid_height,
        name: p.name.clone(),
        cmt: p.comment.clone(),
        desc: p.description.clone(),
        src: p.source.clone(),
        sym: p.symbol.clone(),
        point_type: p.point_type.clone(),
        fix: p.type_of_gps_fix.clone(),
        sat: p.satellites.value_or(0),
        hdop: p.horizontal_dilution.value_or(0.0),
        vdop: p.vertical_dilution.value_or(0.0),
        pdop: p.positional_dilution.value_or(0.0),
        ageofdgpsdata: p.age_of_dgps_data.value_or(0.0),
        dgpsid: p.dgps_id.value_or(0),
        ..Default::default()
    }
}

pub(crate) fn from_wire(gpx: Gpx10, namespaces: NamespaceRegistry) -> GpxDocument {
    GpxDocument {
        version: gpx.version,
        creator: gpx.creator,
        namespaces,
        attributes: gpx.attributes,
        name: gpx.name,
        description: gpx.desc,
        author_name: gpx.author,
        author_email: gpx.email,
        author_link: gpx.url,
        author_link_text: gpx.urlname,
        time: gpx.time,
        keywords: gpx.keywords,
        waypoints: gpx.waypoints.into_iter().map(point_from_wire).collect(),
        routes: gpx
            .routes
            .into_iter()
            .map(|r| GpxRoute {
                name: r.name,
                comment: r.cmt,
                description: r.desc,
                source: r.src,
                number: r.number,
                route_type: r.route_type,
                points: r.points.into_iter().map(point_from_wire).collect(),
                ..Default::default()
            })
            .collect(),
        tracks: gpx
            .tracks
            .into_iter()
            .map(|t| GpxTrack {
                name: t.name,
                comment: t.cmt,
                description: t.desc,
                source: t.src,
                number: t.number,
                track_type: t.track_type,
                segments: t
                    .segments
                    .into_iter()
                    .map(|points| GpxTrackSegment::new(points.into_iter().map(point_from_wire).collect()))
                    .collect(),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

fn point_from_wire(p: Point) -> GpxPoint {
    GpxPoint {
        lat: p.lat,
        lon: p.lon,
        elevation: p.ele,
        timestamp: p.time,
        magnetic_variation: p.magvar,
        geoid_height: p.geoidheight,
        name: p.name,
        comment: p.cmt,
        description: p.desc,
        source: p.src,
        symbol: p.sym,
        point_type: p.point_type,
        type_of_gps_fix: p.fix,
        satellites: non_zero(p.sat),
        horizontal_dilution: non_zero(p.hdop),
        vertical_dilution: non_zero(p.vdop),
        positional_dilution: non_zero(p.pdop),
        age_of_dgps_data: non_zero(p.ageofdgpsdata),
        dgps_id: non_zero(p.dgpsid),
        ..Default::default()
    }
}

fn non_zero<T: Default + PartialEq>(value: T) -> Nullable<T> {
    if value == T::default() {
        Nullable::absent()
    } else {
        Nullable::new(value)
    }
}

// ---- reading ----

pub(crate) fn read(xml: &str) -> Result<(Gpx10, NamespaceRegistry)> {
    let mut input = XmlInput::new(xml);
    let root = input.read_root()?;
    let mut gpx = Gpx10 {
        version: root.version,
        creator: root.creator,
        attributes: root.attributes,
        ..Default::default()
    };

    while let Some(e) = input.next_child("gpx")? {
        match e.local_name().as_ref() {
            b"name" => gpx.name = input.read_text("name")?,
            b"desc" => gpx.desc = input.read_text("desc")?,
            b"author" => gpx.author = input.read_text("author")?,
            b"email" => gpx.email = input.read_text("email")?,
            b"url" => gpx.url = input.read_text("url")?,
            b"urlname" => gpx.urlname = input.read_text("urlname")?,
            b"time" => gpx.time = input.read_value("time")?,
            b"keywords" => gpx.keywords = input.read_text("keywords")?,
            b"wpt" => gpx.waypoints.extend(read_point(&mut input, &e, "wpt")?),
            b"rte" => gpx.routes.push(read_route(&mut input)?),
            b"trk" => gpx.tracks.push(read_track(&mut input)?),
            _ => input.skip(&e)?,
        }
    }

    Ok((gpx, input.into_namespaces()))
}

fn read_plain<T: WireValue + Default>(input: &mut XmlInput<'_>, element: &'static str) -> Result<T> {
    Ok(T::from_wire(&input.read_text(element)?).unwrap_or_default())
}

fn read_point(
    input: &mut XmlInput<'_>,
    start: &quick_xml::events::BytesStart<'_>,
    element: &'static str,
) -> Result<Option<Point>> {
    let Some((lat, lon)) = input.lat_lon(start)? else {
        input.skip(start)?;
        return Ok(None);
    };
    let mut p = Point {
        lat,
        lon,
        ..Default::default()
    };
    while let Some(e) = input.next_child(element)? {
        match e.local_name().as_ref() {
            b"ele" => p.ele = input.read_value("ele")?,
            b"time" => p.time = input.read_value("time")?,
            b"course" => p.course = input.read_value("course")?,
            b"speed" => p.speed = input.read_value("speed")?,
            b"magvar" => p.magvar = input.read_value("magvar")?,
            b"geoidheight" => p.geoidheight = input.read_value("geoidheight")?,
            b"name" => p.name = input.read_text("name")?,
            b"cmt" => p.cmt = input.read_text("cmt")?,
            b"desc" => p.desc = input.read_text("desc")?,
            b"src" => p.src = input.read_text("src")?,
            b"url" => p.url = input.read_text("url")?,
            b"urlname" => p.urlname = input.read_text("urlname")?,
            b"sym" => p.sym = input.read_text("sym")?,
            b"type" => p.point_type = input.read_text("type")?,
            b"fix" => p.fix = input.read_text("fix")?,
            b"sat" => p.sat = read_plain(input, "sat")?,
            b"hdop" => p.hdop = read_plain(input, "hdop")?,
            b"vdop" => p.vdop = read_plain(input, "vdop")?,
            b"pdop" => p.pdop = read_plain(input, "pdop")?,
            b"ageofdgpsdata" => p.ageofdgpsdata = read_plain(input, "ageofdgpsdata")?,
            b"dgpsid" => p.dgpsid = read_plain(input, "dgpsid")?,
            _ => input.skip(&e)?,
        }
    }
    if !p.url.is_empty() || p.course.is_present() || p.speed.is_present() {
        trace!("1.0 url/course/speed on {element} are not kept");
    }
    Ok(Some(p))
}

fn read_route(input: &mut XmlInput<'_>) -> Result<Route> {
    let mut route = Route::default();
    while let Some(e) = input.next_child("rte")? {
        match e.local_name().as_ref() {
            b"name" => route.name = input.read_text("name")?,
            b"cmt" => route.cmt = input.read_text("cmt")?,
            b"desc" => route.desc = input.read_text("desc")?,
            b"src" => route.src = input.read_text("src")?,
            b"url" => route.url = input.read_text("url")?,
            b"urlname" => route.urlname = input.read_text("urlname")?,
            b"number" => route.number = input.read_value("number")?,
            b"type" => route.route_type = input.read_text("type")?,
            b"rtept" => route.points.extend(read_point(input, &e, "rtept")?),
            _ => input.skip(&e)?,
        }
    }
    Ok(route)
}

fn read_track(input: &mut XmlInput<'_>) -> Result<Track> {
    let mut track = Track::default();
    while let Some(e) = input.next_child("trk")? {
        match e.local_name().as_ref() {
            b"name" => track.name = input.read_text("name")?,
            b"cmt" => track.cmt = input.read_text("cmt")?,
            b"desc" => track.desc = input.read_text("desc")?,
            b"src" => track.src = input.read_text("src")?,
            b"url" => track.url = input.read_text("url")?,
            b"urlname" => track.urlname = input.read_text("urlname")?,
            b"number" => track.number = input.read_value("number")?,
            b"type" => track.track_type = input.read_text("type")?,
            b"trkseg" => {
                let mut points = Vec::new();
                while let Some(p) = input.next_child("trkseg")? {
                    if p.local_name().as_ref() == b"trkpt" {
                        points.extend(read_point(input, &p, "trkpt")?);
                    } else {
                        input.skip(&p)?;
                    }
                }
                track.segments.push(points);
            }
            _ => input.skip(&e)?,
        }
    }
    Ok(track)
}

// ---- writing ----

pub(crate) fn write(gpx: &Gpx10, namespaces: &NamespaceRegistry, indent: bool) -> Result<Vec<u8>> {
    let mut out = XmlOutput::new(namespaces, GPX10_NAMESPACE, indent);
    out.declaration()?;
    let mut root = out.root_attributes(&gpx.attributes);
    root.push(("version".to_string(), gpx.version.clone()));
    root.push(("creator".to_string(), gpx.creator.clone()));
    out.open_with("gpx", root)?;

    out.text("name", &gpx.name)?;
    out.text("desc", &gpx.desc)?;
    out.text("author", &gpx.author)?;
    out.text("email", &gpx.email)?;
    out.text("url", &gpx.url)?;
    out.text("urlname", &gpx.urlname)?;
    out.value("time", &gpx.time)?;
    out.text("keywords", &gpx.keywords)?;
    for p in &gpx.waypoints {
        write_point(&mut out, "wpt", p)?;
    }
    for route in &gpx.routes {
        out.open("rte")?;
        out.text("name", &route.name)?;
        out.text("cmt", &route.cmt)?;
        out.text("desc", &route.desc)?;
        out.text("src", &route.src)?;
        out.text("url", &route.url)?;
        out.text("urlname", &route.urlname)?;
        out.value("number", &route.number)?;
        out.text("type", &route.route_type)?;
        for p in &route.points {
            write_point(&mut out, "rtept", p)?;
        }
        out.close("rte")?;
    }
    for track in &gpx.tracks {
        out.open("trk")?;
        out.text("name", &track.name)?;
        out.text("cmt", &track.cmt)?;
        out.text("desc", &track.desc)?;
        out.text("src", &track.src)?;
        out.text("url", &track.url)?;
        out.text("urlname", &track.urlname)?;
        out.value("number", &track.number)?;
        out.text("type", &track.track_type)?;
        for segment in &track.segments {
            out.open("trkseg")?;
            for p in segment {
                write_point(&mut out, "trkpt", p)?;
            }
            out.close("trkseg")?;
        }
        out.close("trk")?;
    }

    out.close("gpx")?;
    Ok(out.finish())
}

fn write_point(out: &mut XmlOutput<'_>, element: &str, p: &Point) -> Result<()> {
    out.open_with(element, [("lat", p.lat.to_wire()), ("lon", p.lon.to_wire())])?;
    out.value("ele", &p.ele)?;
    out.value("time", &p.time)?;
    out.value("course", &p.course)?;
    out.value("speed", &p.speed)?;
    out.value("magvar", &p.magvar)?;
    out.value("geoidheight", &p.geoidheight)?;
    out.text("name", &p.name)?;
    out.text("cmt", &p.cmt)?;
    out.text("desc", &p.desc)?;
    out.text("src", &p.src)?;
    out.text("url", &p.url)?;
    out.text("urlname", &p.urlname)?;
    out.text("sym", &p.sym)?;
    out.text("type", &p.point_type)?;
    out.text("fix", &p.fix)?;
    out.value("sat", &non_zero(p.sat))?;
    out.value("hdop", &non_zero(p.hdop))?;
    out.value("vdop", &non_zero(p.vdop))?;
    out.value("pdop", &non_zero(p.pdop))?;
    out.value("ageofdgpsdata", &non_zero(p.ageofdgpsdata))?;
    out.value("dgpsid", &non_zero(p.dgpsid))?;
    out.close(element)
}
