//! GPX 1.1: author, copyright and links nested under `<metadata>`, and
//! `<extensions>` at every attachment point.
//!
//! Points, routes, tracks and segments share the neutral model's shape, so
//! only the root and metadata have dedicated wire structs here.

use chrono::{DateTime, Utc};

use crate::codec::{join_email, split_email};
use crate::error::Result;
use crate::extension::{Extension, ExtensionAttr};
use crate::gpx_types::{
    DEFAULT_CREATOR, GpxDocument, GpxPoint, GpxRoute, GpxTrack, GpxTrackSegment,
};
use crate::namespace::{GPX11_NAMESPACE, NamespaceRegistry};
use crate::nullable::{Nullable, WireValue};
use crate::xml::{XmlInput, XmlOutput, attributes};

#[derive(Debug, Default, PartialEq)]
pub(crate) struct Gpx11 {
    pub version: String,
    pub creator: String,
    pub attributes: Vec<ExtensionAttr>,
    pub metadata: Option<Metadata>,
    pub waypoints: Vec<GpxPoint>,
    pub routes: Vec<GpxRoute>,
    pub tracks: Vec<GpxTrack>,
    pub extensions: Extension,
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct Metadata {
    pub name: String,
    pub desc: String,
    pub author: Option<Person>,
    pub copyright: Option<Copyright>,
    pub link: Option<Link>,
    pub time: Nullable<DateTime<Utc>>,
    pub keywords: String,
    pub extensions: Extension,
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct Person {
    pub name: String,
    pub email: Option<Email>,
    pub link: Option<Link>,
}

/// `domain` is `None` for an address without `@`.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Email {
    pub id: String,
    pub domain: Option<String>,
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct Link {
    pub href: String,
    pub text: String,
    pub link_type: String,
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct Copyright {
    pub author: String,
    pub year: String,
    pub license: String,
}

// ---- neutral <-> wire ----

pub(crate) fn to_wire(doc: &GpxDocument, version: &str) -> Gpx11 {
    let author_link = link_of(&doc.author_link, &doc.author_link_text, &doc.author_link_type);
    let email = (!doc.author_email.is_empty()).then(|| {
        let (id, domain) = split_email(&doc.author_email);
        Email { id, domain }
    });
    let author = (!doc.author_name.is_empty() || email.is_some() || author_link.is_some()).then(
        || Person {
            name: doc.author_name.clone(),
            email,
            link: author_link,
        },
    );
    let copyright = (!doc.copyright.is_empty()
        || !doc.copyright_year.is_empty()
        || !doc.copyright_license.is_empty())
    .then(|| Copyright {
        author: doc.copyright.clone(),
        year: doc.copyright_year.clone(),
        license: doc.copyright_license.clone(),
    });
    let link = link_of(&doc.link, &doc.link_text, &doc.link_type);
    let metadata = Metadata {
        name: doc.name.clone(),
        desc: doc.description.clone(),
        author,
        copyright,
        link,
        time: doc.time,
        keywords: doc.keywords.clone(),
        extensions: doc.metadata_extensions.clone(),
    };
    let has_metadata = metadata != Metadata::default();

    Gpx11 {
        version: version.to_string(),
        creator: if doc.creator.is_empty() {
            DEFAULT_CREATOR.to_string()
        } else {
            doc.creator.clone()
        },
        attributes: doc.attributes.clone(),
        metadata: has_metadata.then_some(metadata),
        waypoints: doc.waypoints.clone(),
        routes: doc.routes.clone(),
        tracks: doc.tracks.clone(),
        extensions: doc.extensions.clone(),
    }
}

/// A link is written when any of its parts is set, with `href=""` if need be.
fn link_of(href: &str, text: &str, link_type: &str) -> Option<Link> {
    (!href.is_empty() || !text.is_empty() || !link_type.is_empty()).then(|| Link {
        href: href.to_string(),
        text: text.to_string(),
        link_type: link_type.to_string(),
    })
}

pub(crate) fn from_wire(gpx: Gpx11, namespaces: NamespaceRegistry) -> GpxDocument {
    let mut doc = GpxDocument {
        version: gpx.version,
        creator: gpx.creator,
        namespaces,
        attributes: gpx.attributes,
        extensions: gpx.extensions,
        waypoints: gpx.waypoints,
        routes: gpx.routes,
        tracks: gpx.tracks,
        ..Default::default()
    };
    let Some(meta) = gpx.metadata else {
        return doc;
    };
    doc.name = meta.name;
    doc.description = meta.desc;
    doc.time = meta.time;
    doc.keywords = meta.keywords;
    doc.metadata_extensions = meta.extensions;
    if let Some(author) = meta.author {
        doc.author_name = author.name;
        if let Some(email) = author.email {
            doc.author_email = join_email(&email.id, email.domain.as_deref());
        }
        if let Some(link) = author.link {
            doc.author_link = link.href;
            doc.author_link_text = link.text;
            doc.author_link_type = link.link_type;
        }
    }
    if let Some(copyright) = meta.copyright {
        doc.copyright = copyright.author;
        doc.copyright_year = copyright.year;
        doc.copyright_license = copyright.license;
    }
    if let Some(link) = meta.link {
        doc.link = link.href;
        doc.link_text = link.text;
        doc.link_type = link.link_type;
    }
    doc
}

// ---- reading ----

pub(crate) fn read(xml: &str) -> Result<(Gpx11, NamespaceRegistry)> {
    let mut input = XmlInput::new(xml);
    let root = input.read_root()?;
    let mut gpx = Gpx11 {
        version: root.version,
        creator: root.creator,
        attributes: root.attributes,
        ..Default::default()
    };

    while let Some(e) = input.next_child("gpx")? {
        match e.local_name().as_ref() {
            b"metadata" => gpx.metadata = Some(read_metadata(&mut input)?),
            b"wpt" => gpx.waypoints.extend(read_point(&mut input, &e, "wpt")?),
            b"rte" => gpx.routes.push(read_route(&mut input)?),
            b"trk" => gpx.tracks.push(read_track(&mut input)?),
            b"extensions" => gpx.extensions = input.read_extensions(&e)?,
            _ => input.skip(&e)?,
        }
    }

    Ok((gpx, input.into_namespaces()))
}

fn read_metadata(input: &mut XmlInput<'_>) -> Result<Metadata> {
    let mut meta = Metadata::default();
    while let Some(e) = input.next_child("metadata")? {
        match e.local_name().as_ref() {
            b"name" => meta.name = input.read_text("name")?,
            b"desc" => meta.desc = input.read_text("desc")?,
            b"author" => meta.author = Some(read_person(input)?),
            b"copyright" => {
                let mut copyright = Copyright::default();
                for (key, value) in attributes(&e)? {
                    if key == "author" {
                        copyright.author = value;
                    }
                }
                while let Some(c) = input.next_child("copyright")? {
                    match c.local_name().as_ref() {
                        b"year" => copyright.year = input.read_text("year")?,
                        b"license" => copyright.license = input.read_text("license")?,
                        _ => input.skip(&c)?,
                    }
                }
                meta.copyright = Some(copyright);
            }
            b"link" => meta.link = Some(read_link(input, &e)?),
            b"time" => meta.time = input.read_value("time")?,
            b"keywords" => meta.keywords = input.read_text("keywords")?,
            b"extensions" => meta.extensions = input.read_extensions(&e)?,
            _ => input.skip(&e)?,
        }
    }
    Ok(meta)
}

fn read_person(input: &mut XmlInput<'_>) -> Result<Person> {
    let mut person = Person::default();
    while let Some(e) = input.next_child("author")? {
        match e.local_name().as_ref() {
            b"name" => person.name = input.read_text("name")?,
            b"email" => {
                let mut email = Email::default();
                for (key, value) in attributes(&e)? {
                    match key.as_str() {
                        "id" => email.id = value,
                        "domain" => email.domain = Some(value),
                        _ => {}
                    }
                }
                input.skip(&e)?;
                person.email = Some(email);
            }
            b"link" => person.link = Some(read_link(input, &e)?),
            _ => input.skip(&e)?,
        }
    }
    Ok(person)
}

fn read_link(input: &mut XmlInput<'_>, start: &quick_xml::events::BytesStart<'_>) -> Result<Link> {
    let mut link = Link::default();
    for (key, value) in attributes(start)? {
        if key == "href" {
            link.href = value;
        }
    }
    while let Some(e) = input.next_child("link")? {
        match e.local_name().as_ref() {
            b"text" => link.text = input.read_text("text")?,
            b"type" => link.link_type = input.read_text("type")?,
            _ => input.skip(&e)?,
        }
    }
    Ok(link)
}

fn read_point(
    input: &mut XmlInput<'_>,
    start: &quick_xml::events::BytesStart<'_>,
    element: &'static str,
) -> Result<Option<GpxPoint>> {
    let Some((lat, lon)) = input.lat_lon(start)? else {
        input.skip(start)?;
        return Ok(None);
    };
    let mut p = GpxPoint::new(lat, lon);
    while let Some(e) = input.next_child(element)? {
        match e.local_name().as_ref() {
            b"ele" => p.elevation = input.read_value("ele")?,
            b"time" => p.timestamp = input.read_value("time")?,
            b"magvar" => p.magnetic_variation = input.read_value("magvar")?,
            b"geoidheight" => p.geoid_height = input.read_value("geoidheight")?,
            b"name" => p.name = input.read_text("name")?,
            b"cmt" => p.comment = input.read_text("cmt")?,
            b"desc" => p.description = input.read_text("desc")?,
            b"src" => p.source = input.read_text("src")?,
            b"sym" => p.symbol = input.read_text("sym")?,
            b"type" => p.point_type = input.read_text("type")?,
            b"fix" => p.type_of_gps_fix = input.read_text("fix")?,
            b"sat" => p.satellites = input.read_value("sat")?,
            b"hdop" => p.horizontal_dilution = input.read_value("hdop")?,
            b"vdop" => p.vertical_dilution = input.read_value("vdop")?,
            b"pdop" => p.positional_dilution = input.read_value("pdop")?,
            b"ageofdgpsdata" => p.age_of_dgps_data = input.read_value("ageofdgpsdata")?,
            b"dgpsid" => p.dgps_id = input.read_value("dgpsid")?,
            b"extensions" => p.extensions = input.read_extensions(&e)?,
            // <link> on points is not modelled
            _ => input.skip(&e)?,
        }
    }
    Ok(Some(p))
}

fn read_route(input: &mut XmlInput<'_>) -> Result<GpxRoute> {
    let mut route = GpxRoute::default();
    while let Some(e) = input.next_child("rte")? {
        match e.local_name().as_ref() {
            b"name" => route.name = input.read_text("name")?,
            b"cmt" => route.comment = input.read_text("cmt")?,
            b"desc" => route.description = input.read_text("desc")?,
            b"src" => route.source = input.read_text("src")?,
            b"number" => route.number = input.read_value("number")?,
            b"type" => route.route_type = input.read_text("type")?,
            b"extensions" => route.extensions = input.read_extensions(&e)?,
            b"rtept" => route.points.extend(read_point(input, &e, "rtept")?),
            _ => input.skip(&e)?,
        }
    }
    Ok(route)
}

fn read_track(input: &mut XmlInput<'_>) -> Result<GpxTrack> {
    let mut track = GpxTrack::default();
    while let Some(e) = input.next_child("trk")? {
        match e.local_name().as_ref() {
            b"name" => track.name = input.read_text("name")?,
            b"cmt" => track.comment = input.read_text("cmt")?,
            b"desc" => track.description = input.read_text("desc")?,
            b"src" => track.source = input.read_text("src")?,
            b"number" => track.number = input.read_value("number")?,
            b"type" => track.track_type = input.read_text("type")?,
            b"extensions" => track.extensions = input.read_extensions(&e)?,
            b"trkseg" => track.segments.push(read_segment(input)?),
            _ => input.skip(&e)?,
        }
    }
    Ok(track)
}

fn read_segment(input: &mut XmlInput<'_>) -> Result<GpxTrackSegment> {
    let mut segment = GpxTrackSegment::default();
    while let Some(e) = input.next_child("trkseg")? {
        match e.local_name().as_ref() {
            b"trkpt" => segment.points.extend(read_point(input, &e, "trkpt")?),
            b"extensions" => segment.extensions = input.read_extensions(&e)?,
            _ => input.skip(&e)?,
        }
    }
    Ok(segment)
}

// ---- writing ----

pub(crate) fn write(gpx: &Gpx11, namespaces: &NamespaceRegistry, indent: bool) -> Result<Vec<u8>> {
    let mut out = XmlOutput::new(namespaces, GPX11_NAMESPACE, indent);
    out.declaration()?;
    let mut root = out.root_attributes(&gpx.attributes);
    root.push(("version".to_string(), gpx.version.clone()));
    root.push(("creator".to_string(), gpx.creator.clone()));
    out.open_with("gpx", root)?;

    if let Some(meta) = &gpx.metadata {
        write_metadata(&mut out, meta)?;
    }
    for p in &gpx.waypoints {
        write_point(&mut out, "wpt", p)?;
    }
    for route in &gpx.routes {
        write_route(&mut out, route)?;
    }
    for track in &gpx.tracks {
        write_track(&mut out, track)?;
    }
    out.extensions(&gpx.extensions)?;

    out.close("gpx")?;
    Ok(out.finish())
}

fn write_metadata(out: &mut XmlOutput<'_>, meta: &Metadata) -> Result<()> {
    out.open("metadata")?;
    out.text("name", &meta.name)?;
    out.text("desc", &meta.desc)?;
    if let Some(author) = &meta.author {
        out.open("author")?;
        out.text("name", &author.name)?;
        if let Some(email) = &author.email {
            let mut attrs = vec![("id", email.id.as_str())];
            if let Some(domain) = &email.domain {
                attrs.push(("domain", domain.as_str()));
            }
            out.open_with("email", attrs)?;
            out.close("email")?;
        }
        if let Some(link) = &author.link {
            write_link(out, link)?;
        }
        out.close("author")?;
    }
    if let Some(copyright) = &meta.copyright {
        out.open_with("copyright", [("author", &copyright.author)])?;
        out.text("year", &copyright.year)?;
        out.text("license", &copyright.license)?;
        out.close("copyright")?;
    }
    if let Some(link) = &meta.link {
        write_link(out, link)?;
    }
    out.value("time", &meta.time)?;
    out.text("keywords", &meta.keywords)?;
    out.extensions(&meta.extensions)?;
    out.close("metadata")
}

fn write_link(out: &mut XmlOutput<'_>, link: &Link) -> Result<()> {
    out.open_with("link", [("href", &link.href)])?;
    out.text("text", &link.text)?;
    out.text("type", &link.link_type)?;
    out.close("link")
}

fn write_point(out: &mut XmlOutput<'_>, element: &str, p: &GpxPoint) -> Result<()> {
    out.open_with(element, [("lat", p.lat.to_wire()), ("lon", p.lon.to_wire())])?;
    out.value("ele", &p.elevation)?;
    out.value("time", &p.timestamp)?;
    out.value("magvar", &p.magnetic_variation)?;
    out.value("geoidheight", &p.geoid_height)?;
    out.text("name", &p.name)?;
    out.text("cmt", &p.comment)?;
    out.text("desc", &p.description)?;
    out.text("src", &p.source)?;
    out.text("sym", &p.symbol)?;
    out.text("type", &p.point_type)?;
    out.text("fix", &p.type_of_gps_fix)?;
    out.value("sat", &p.satellites)?;
    out.value("hdop", &p.horizontal_dilution)?;
    out.value("vdop", &p.vertical_dilution)?;
    out.value("pdop", &p.positional_dilution)?;
    out.value("ageofdgpsdata", &p.age_of_dgps_data)?;
    out.value("dgpsid", &p.dgps_id)?;
    out.extensions(&p.extensions)?;
    out.close(element)
}

fn write_route(out: &mut XmlOutput<'_>, route: &GpxRoute) -> Result<()> {
    out.open("rte")?;
    out.text("name", &route.name)?;
    out.text("cmt", &route.comment)?;
    out.text("desc", &route.description)?;
    out.text("src", &route.source)?;
    out.value("number", &route.number)?;
    out.text("type", &route.route_type)?;
    out.extensions(&route.extensions)?;
    for p in &route.points {
        write_point(out, "rtept", p)?;
    }
    out.close("rte")
}

fn write_track(out: &mut XmlOutput<'_>, track: &GpxTrack) -> Result<()> {
    out.open("trk")?;
    out.text("name", &track.name)?;
    out.text("cmt", &track.comment)?;
    out.text("desc", &track.description)?;
    out.text("src", &track.source)?;
    out.value("number", &track.number)?;
    out.text("type", &track.track_type)?;
    out.extensions(&track.extensions)?;
    for segment in &track.segments {
        out.open("trkseg")?;
        for p in &segment.points {
            write_point(out, "trkpt", p)?;
        }
        out.extensions(&segment.extensions)?;
        out.close("trkseg")?;
    }
    out.close("trk")
}
