use gpxdoc::analytics::GpxStats;
use gpxdoc::extension::{Extension, NamespaceMatch};
use gpxdoc::gpx_types::{GpxDocument, GpxPoint, GpxTrack, GpxTrackSegment};
use gpxdoc::nullable::parse_time;
use gpxdoc::options::EncodeOptions;
use gpxdoc::parser::parse;
use gpxdoc::serializer::{to_json, to_xml, to_xml_string};
use gpxdoc::GpxError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const FIXTURES: &[&str] = &[
    "basic/file.gpx",
    "extensions/gpx11_with_extensions.gpx",
    "extensions/garmin.gpx",
    "versions/gpx10.gpx",
    "versions/non_standard_version.gpx",
];

const EXT_NS: &str = "http://trla.baba.lan";

fn load_fixture(path: &str) -> Vec<u8> {
    std::fs::read(format!("tests/fixtures/{path}")).unwrap()
}

fn load_doc(path: &str) -> GpxDocument {
    parse(&load_fixture(path)).unwrap()
}

fn reencode(doc: &GpxDocument, version: &str) -> GpxDocument {
    let xml = to_xml(doc, &EncodeOptions::default().with_version(version)).unwrap();
    parse(&xml).unwrap()
}

// ---- basic/ ----

#[test]
fn test_basic_metadata() {
    let doc = load_doc("basic/file.gpx");
    assert_eq!(doc.version, "1.1");
    assert_eq!(doc.creator, "eTrex 10");
    assert_eq!(doc.name, "example name");
    assert_eq!(doc.description, "example description");
    assert_eq!(doc.author_name, "author name");
    assert_eq!(doc.author_email, "aaa@bbb.com");
    assert_eq!(doc.author_link, "http://link");
    assert_eq!(doc.author_link_text, "link text");
    assert_eq!(doc.author_link_type, "link type");
    assert_eq!(doc.copyright, "gpxauth");
    assert_eq!(doc.copyright_year, "2013");
    assert_eq!(doc.copyright_license, "lic");
    assert_eq!(doc.link, "http://example.com");
    assert_eq!(doc.link_text, "example link");
    assert_eq!(doc.link_type, "text/html");
    assert_eq!(doc.time.value(), parse_time("2013-01-01T12:00:00Z"));
    assert_eq!(doc.keywords, "example keywords");

    assert_eq!(doc.attributes.len(), 1);
    assert_eq!(doc.attributes[0].local_name, "schemaLocation");
    assert_eq!(doc.attributes[0].namespace, "http://www.w3.org/2001/XMLSchema-instance");
}

#[test]
fn test_basic_waypoints() {
    let doc = load_doc("basic/file.gpx");
    assert_eq!(doc.waypoints.len(), 2);

    let w = &doc.waypoints[0];
    assert_eq!((w.lat, w.lon), (12.3, 45.6));
    assert_eq!(w.elevation.value(), Some(75.1));
    assert_eq!(w.timestamp.value(), parse_time("2013-01-02T02:03:00Z"));
    assert_eq!(w.magnetic_variation.value(), Some(1.1));
    assert_eq!(w.geoid_height.value(), Some(2.0));
    assert_eq!(w.comment, "example cmt");
    assert_eq!(w.symbol, "example sym");
    assert_eq!(w.point_type, "example type");
    assert_eq!(w.type_of_gps_fix, "2d");
    assert_eq!(w.satellites.value(), Some(5));
    assert_eq!(w.horizontal_dilution.value(), Some(6.0));
    assert_eq!(w.vertical_dilution.value(), Some(7.0));
    assert_eq!(w.positional_dilution.value(), Some(8.0));
    assert_eq!(w.age_of_dgps_data.value(), Some(9.0));
    assert_eq!(w.dgps_id.value(), Some(45));

    // present zeros stay present in 1.1
    let w = &doc.waypoints[1];
    assert_eq!(w.elevation.value(), Some(0.0));
    assert_eq!(w.satellites.value(), Some(0));
    assert!(w.timestamp.is_absent());
    assert!(w.horizontal_dilution.is_absent());
}

#[test]
fn test_basic_route_and_track() {
    let doc = load_doc("basic/file.gpx");
    let route = &doc.routes[0];
    assert_eq!(route.number.value(), Some(7));
    assert_eq!(route.route_type, "rte type");
    assert_eq!(route.points.len(), 3);
    assert_eq!(route.points[1].name, "rtept 2");

    let track = &doc.tracks[0];
    assert_eq!(track.name, "example name t");
    assert_eq!(track.number.value(), Some(1));
    assert_eq!(track.segments.len(), 1);
    assert_eq!(doc.track_points_no(), 4);
    assert!(doc.has_times());
}

#[test]
fn test_basic_analytics() {
    let doc = load_doc("basic/file.gpx");

    let md = doc.moving_data();
    assert_eq!(md.moving_time, 39.0);
    assert_eq!(md.stopped_time, 25.0);
    assert!((md.moving_distance - 55.20136198817515).abs() < 1e-6);
    assert!((md.stopped_distance - 6.480388227319754).abs() < 1e-6);

    let ud = doc.uphill_downhill();
    assert!((ud.uphill - 5.863).abs() < 1e-6);
    assert!((ud.downhill - 1.543).abs() < 1e-6);

    assert!((doc.length_2d() - 56.687053111255985).abs() < 1e-6);
    assert!((doc.length_3d() - 61.6817502154949).abs() < 1e-6);
    assert_eq!(doc.duration(), 64.0);

    let stats = GpxStats::of(&doc);
    assert_eq!(stats.track_points, 4);
    assert_eq!(stats.moving_data, md);
    let bounds = stats.bounds.unwrap();
    assert_eq!(bounds.min_lat, 52.5113534275);
    assert_eq!(bounds.max_lon, 13.4571944922);
}

// ---- round trips ----

#[test]
fn test_round_trip_own_version() {
    for fixture in FIXTURES {
        let doc = load_doc(fixture);
        let back = reencode(&doc, &doc.version);
        assert_eq!(back, doc, "round trip of {fixture}");
        // and stays stable from there
        assert_eq!(reencode(&back, &back.version), back, "second round trip of {fixture}");
    }
}

#[test]
fn test_round_trip_indented() {
    for fixture in FIXTURES {
        let doc = load_doc(fixture);
        let opts = EncodeOptions::for_document(&doc).indented();
        let back = parse(&to_xml(&doc, &opts).unwrap()).unwrap();
        assert_eq!(back, doc, "indented round trip of {fixture}");
    }
}

#[test]
fn test_gpx10_document_through_gpx11() {
    let doc = load_doc("versions/gpx10.gpx");
    let mut back = reencode(&doc, "1.1");
    assert_eq!(back.version, "1.1");
    assert_eq!(
        back.attributes[0].value,
        "http://www.topografix.com/GPX/1/1 http://www.topografix.com/GPX/1/1/gpx.xsd"
    );
    // and back to the original schema location
    assert_eq!(reencode(&back, "1.0").attributes, doc.attributes);
    back.version = doc.version.clone();
    back.attributes = doc.attributes.clone();
    assert_eq!(back, doc);
}

#[test]
fn test_gpx11_document_through_gpx10_is_lossy_only_where_expected() {
    let doc = load_doc("basic/file.gpx");
    let back = reencode(&doc, "1.0");

    assert_eq!(back.version, "1.0");
    assert_eq!(back.creator, doc.creator);
    assert_eq!(back.name, doc.name);
    assert_eq!(back.author_name, doc.author_name);
    assert_eq!(back.author_email, doc.author_email);
    assert_eq!(back.author_link, doc.author_link);
    assert_eq!(back.author_link_text, doc.author_link_text);
    assert_eq!(back.time, doc.time);
    assert_eq!(back.attributes.len(), 1);
    assert_eq!(back.attributes[0].local_name, "schemaLocation");
    assert_eq!(
        back.attributes[0].value,
        "http://www.topografix.com/GPX/1/0 http://www.topografix.com/GPX/1/0/gpx.xsd"
    );
    assert_eq!(back.routes, doc.routes);
    assert_eq!(back.tracks, doc.tracks);
    assert_eq!(back.waypoints[0], doc.waypoints[0]);

    // not representable in 1.0
    assert!(back.author_link_type.is_empty());
    assert!(back.copyright.is_empty());
    assert!(back.link.is_empty());
    // a present zero sat count cannot be told apart from a missing one
    assert!(back.waypoints[1].satellites.is_absent());
    assert_eq!(back.waypoints[1].elevation.value(), Some(0.0));
}

#[test]
fn test_gpx10_drops_extensions() {
    let doc = load_doc("extensions/gpx11_with_extensions.gpx");
    let xml = to_xml_string(&doc, &EncodeOptions::default().with_version("1.0")).unwrap();
    assert!(!xml.contains("extensions"));
    let back = parse(xml.as_bytes()).unwrap();
    assert!(back.extensions.is_empty());
    assert!(back.waypoints[0].extensions.is_empty());
    assert_eq!(back.waypoints[0].name, "wpt");
}

#[test]
fn test_non_standard_version_is_kept() {
    let doc = load_doc("versions/non_standard_version.gpx");
    assert_eq!(doc.version, "7.7.5-play");
    assert_eq!(doc.waypoints[0].name, "somewhere");

    let xml = to_xml_string(&doc, &EncodeOptions::for_document(&doc)).unwrap();
    assert!(xml.contains(r#"version="7.7.5-play""#));
    assert!(xml.contains(r#"xmlns="http://www.topografix.com/GPX/1/1""#));
}

#[test]
fn test_json_mirror_round_trip() {
    for fixture in FIXTURES {
        let doc = load_doc(fixture);
        let json = to_json(&doc, &EncodeOptions::default()).unwrap();
        assert_eq!(parse(&json).unwrap(), doc, "json mirror of {fixture}");
    }
}

#[test]
fn test_json_mirror_keeps_present_zero() {
    let doc = load_doc("basic/file.gpx");
    let json: serde_json::Value =
        serde_json::from_slice(&to_json(&doc, &EncodeOptions::default()).unwrap()).unwrap();
    let second = &json["waypoints"][1];
    assert_eq!(second["elevation"], 0.0);
    assert_eq!(second["satellites"], 0);
    assert!(second.get("timestamp").is_none());
}

// ---- extensions ----

fn assert_sample_extension(ext: &Extension, at: &str) {
    assert_eq!(ext.nodes.len(), 2, "{at}");

    let aaa = &ext.nodes[0];
    assert_eq!(aaa.namespace, EXT_NS, "{at}");
    assert_eq!(aaa.local_name, "aaa", "{at}");
    assert_eq!(aaa.text, "bbb", "{at}");
    assert_eq!(aaa.attrs.len(), 1, "{at}");
    assert_eq!(aaa.get_attr("jjj"), Some("kkk"), "{at}");

    let ccc = &ext.nodes[1];
    assert!(ccc.attrs.is_empty(), "{at}");
    assert_eq!(ccc.children.len(), 1, "{at}");
    let ddd = &ccc.children[0];
    assert_eq!(ddd.get_attr("lll"), Some("mmm"), "{at}");
    assert_eq!(ddd.get_attr("nnn"), Some("ooo"), "{at}");
    assert_eq!(ddd.children[0].text, "ggg", "{at}");
}

#[test]
fn test_extensions_at_every_attachment_point() {
    let doc = load_doc("extensions/gpx11_with_extensions.gpx");
    for d in [&doc, &reencode(&doc, "1.1")] {
        assert_sample_extension(&d.extensions, "document");
        assert_sample_extension(&d.waypoints[0].extensions, "waypoint");
        assert_sample_extension(&d.routes[0].points[0].extensions, "route point");
        assert_sample_extension(&d.tracks[0].segments[0].points[0].extensions, "track point");

        let meta = d.metadata_extensions.get_node(NamespaceMatch::Url(EXT_NS), "meta").unwrap();
        assert_eq!(meta.text, "metadata level");

        let route = d.routes[0].extensions.get_node(NamespaceMatch::Any, "route").unwrap();
        assert_eq!(route.get_attr("kind"), Some("loop"));
        assert_eq!(route.attrs[0].namespace, "");

        let color = d.tracks[0].extensions.get_node(NamespaceMatch::Url(EXT_NS), "color").unwrap();
        assert_eq!(color.text, "red");

        let seg = &d.tracks[0].segments[0].extensions;
        assert_eq!(seg.get_node(NamespaceMatch::Any, "segment").unwrap().text, "first");
    }
}

#[test]
fn test_garmin_extensions() {
    let doc = load_doc("extensions/garmin.gpx");
    let tpe_ns = "http://www.garmin.com/xmlschemas/TrackPointExtension/v1";
    let points = &doc.tracks[0].segments[0].points;
    // the inline gpxtpx declaration names the same namespace as ns3
    for (p, hr) in points.iter().zip(["171", "173"]) {
        let tpe = p.extensions.get_node(NamespaceMatch::Url(tpe_ns), "TrackPointExtension").unwrap();
        assert_eq!(tpe.get_node(NamespaceMatch::Url(tpe_ns), "hr").unwrap().text, hr);
    }
    assert_eq!(points[1].timestamp.format().as_deref(), Some("2017-08-05T06:26:48.500Z"));

    let xml = to_xml_string(&doc, &EncodeOptions::default()).unwrap();
    assert!(xml.contains("<ns3:TrackPointExtension>"));
    assert!(xml.contains("<ns3:hr>171</ns3:hr>"));
    assert!(xml.contains("<ns3:hr>173</ns3:hr>"));
    assert!(!xml.contains("gpxtpx"));
}

#[test]
fn test_create_extension_with_registered_namespace() {
    let mut doc = GpxDocument::new();
    doc.register_namespace("ext", EXT_NS).unwrap();
    doc.extensions.get_or_create_node(EXT_NS, "aaa/bbb/ccc").unwrap().text = "ccc data".to_string();
    doc.extensions.get_or_create_node(EXT_NS, "aaa/bbb").unwrap().set_attr("key", "value");

    let xml = to_xml_string(&doc, &EncodeOptions::default()).unwrap();
    assert!(xml.contains(r#"xmlns:ext="http://trla.baba.lan""#));
    assert!(xml.contains(r#"<ext:bbb ext:key="value">"#));
    assert!(xml.contains("<ext:ccc>ccc data</ext:ccc>"));

    let back = parse(xml.as_bytes()).unwrap();
    let back_again = reencode(&back, "1.1");
    for d in [&doc, &back, &back_again] {
        assert_eq!(d.extensions, doc.extensions);
        let by_url = d.extensions.get_node(NamespaceMatch::Url(EXT_NS), "aaa").unwrap();
        let by_any = d.extensions.get_node(NamespaceMatch::Any, "aaa").unwrap();
        assert_eq!(by_url, by_any);
        let bbb = by_url.get_node(NamespaceMatch::Url(EXT_NS), "bbb").unwrap();
        assert_eq!(bbb.namespace, EXT_NS);
        assert_eq!(bbb.get_attr("key"), Some("value"));
        assert_eq!(bbb.get_node(NamespaceMatch::Any, "ccc").unwrap().text, "ccc data");
    }
    assert!(doc.extensions.get_node(NamespaceMatch::None, "aaa").is_none());
}

#[test]
fn test_create_extension_without_namespace() {
    let mut doc = GpxDocument::new();
    doc.metadata_extensions.get_or_create_node("", "aaa/bbb/ccc").unwrap().text = "ccc data".to_string();
    doc.metadata_extensions.get_or_create_node("", "aaa/bbb").unwrap().set_attr("key", "value");

    let xml = to_xml_string(&doc, &EncodeOptions::default()).unwrap();
    // the GPX default namespace is undeclared for nodes without one
    assert!(xml.contains(r#"<metadata><extensions><aaa xmlns=""><bbb key="value"><ccc>ccc data</ccc></bbb></aaa></extensions></metadata>"#));

    let back = parse(xml.as_bytes()).unwrap();
    assert_eq!(back.metadata_extensions, doc.metadata_extensions);
    assert!(back.metadata_extensions.get_node(NamespaceMatch::None, "aaa").is_some());
}

const GPX11_NS: &str = "http://www.topografix.com/GPX/1/1";

#[test]
fn test_extension_in_gpx_namespace_round_trips() {
    let mut doc = GpxDocument::new();
    doc.append_waypoint(GpxPoint::new(1.0, 2.0));
    let ext = &mut doc.waypoints[0].extensions;
    ext.get_or_create_node(GPX11_NS, "x").unwrap().text = "1".to_string();
    ext.get_or_create_node(GPX11_NS, "x").unwrap().set_attr("unit", "m");
    ext.get_or_create_node("", "plain/inner").unwrap().text = "2".to_string();
    ext.get_or_create_node(GPX11_NS, "y").unwrap();

    let xml = to_xml_string(&doc, &EncodeOptions::default()).unwrap();
    assert!(xml.contains(r#"<plain xmlns=""><inner>2</inner></plain>"#));
    assert!(xml.contains("<y/>"));

    let back = parse(xml.as_bytes()).unwrap();
    assert_eq!(back.waypoints[0].extensions, doc.waypoints[0].extensions);
    let x = back.waypoints[0].extensions.get_node(NamespaceMatch::Url(GPX11_NS), "x").unwrap();
    assert_eq!(x.text, "1");
    assert_eq!(x.get_attr("unit"), Some("m"));
    assert_eq!(reencode(&back, "1.1").waypoints, back.waypoints);
}

#[test]
fn test_unprefixed_extension_elements_take_the_default_namespace() {
    let xml = br#"<gpx xmlns="http://www.topografix.com/GPX/1/1" version="1.1">
  <wpt lat="1" lon="2"><extensions><speed>3</speed></extensions></wpt>
</gpx>"#;
    let doc = parse(xml).unwrap();
    let ext = &doc.waypoints[0].extensions;
    assert_eq!(ext.nodes[0].namespace, GPX11_NS);
    assert!(ext.get_node(NamespaceMatch::None, "speed").is_none());

    let out = to_xml_string(&doc, &EncodeOptions::for_document(&doc)).unwrap();
    assert!(out.contains("<extensions><speed>3</speed></extensions>"));
    assert_eq!(parse(out.as_bytes()).unwrap().waypoints, doc.waypoints);
}

#[test]
fn test_extension_text_keeps_its_whitespace() {
    let mut doc = GpxDocument::new();
    let ext = &mut doc.extensions;
    ext.get_or_create_node(EXT_NS, "padded").unwrap().text = "  padded  ".to_string();
    ext.get_or_create_node(EXT_NS, "lines").unwrap().text = "a\n  b\n".to_string();
    ext.get_or_create_node(EXT_NS, "blank").unwrap().text = "   ".to_string();
    ext.get_or_create_node(EXT_NS, "mixed").unwrap().text = " head ".to_string();
    ext.get_or_create_node(EXT_NS, "mixed/child").unwrap().text = "c".to_string();

    for opts in [EncodeOptions::default(), EncodeOptions::default().indented()] {
        let back = parse(&to_xml(&doc, &opts).unwrap()).unwrap();
        assert_eq!(back.extensions, doc.extensions, "indent = {}", opts.indent);
    }
}

#[test]
fn test_unregistered_namespace_gets_prefix_on_encode() {
    let mut doc = GpxDocument::new();
    doc.append_waypoint(GpxPoint::new(1.0, 2.0));
    doc.waypoints[0]
        .extensions
        .get_or_create_node("http://example.com/a", "speed")
        .unwrap()
        .text = "3".to_string();
    doc.waypoints[0]
        .extensions
        .get_or_create_node("http://example.com/b", "power")
        .unwrap()
        .text = "250".to_string();

    let xml = to_xml_string(&doc, &EncodeOptions::default()).unwrap();
    assert!(xml.contains(r#"xmlns:ns1="http://example.com/a""#));
    assert!(xml.contains(r#"xmlns:ns2="http://example.com/b""#));
    assert!(xml.contains("<ns1:speed>3</ns1:speed>"));

    let back = parse(xml.as_bytes()).unwrap();
    assert_eq!(back.waypoints[0].extensions, doc.waypoints[0].extensions);
    // encoding does not touch the caller's registry
    assert!(doc.namespaces.is_empty());
}

// ---- document editing ----

#[test]
fn test_split_join_and_reduce() {
    let mut doc = load_doc("basic/file.gpx");
    doc.split(0, 0, 1);
    assert_eq!(doc.tracks[0].segments.len(), 2);
    assert_eq!(doc.tracks[0].segments[0].points.len(), 2);
    assert_eq!(doc.tracks[0].segments[1].points.len(), 2);

    doc.join_next(0, 0);
    assert_eq!(doc.tracks[0].segments.len(), 1);
    assert_eq!(doc, load_doc("basic/file.gpx"));

    doc.append_track(GpxTrack::default());
    doc.append_point(GpxPoint::new(52.6, 13.5));
    doc.reduce_to_single_track();
    assert_eq!(doc.tracks.len(), 1);
    assert_eq!(doc.track_points_no(), 5);
    assert!(!doc.has_times());
}

#[test]
fn test_elevation_and_time_edits_survive_encoding() {
    let mut doc = load_doc("basic/file.gpx");
    doc.add_elevation(10.0);
    doc.remove_time();
    let back = reencode(&doc, "1.1");
    assert_eq!(back.tracks[0].segments[0].points[0].elevation.value(), Some(59.26 + 10.0));
    assert!(!back.has_times());
    assert!(back.waypoints[0].timestamp.is_absent());

    doc.remove_elevation();
    let back = reencode(&doc, "1.1");
    assert!(back.tracks[0].points().all(|p| p.elevation.is_absent()));
}

#[test]
fn test_location_at_on_fixture() {
    let doc = load_doc("basic/file.gpx");
    let found = doc.location_at(parse_time("2012-03-17T12:46:20Z").unwrap());
    assert_eq!(found.len(), 1);
    assert_eq!((found[0].track_no, found[0].segment_no, found[0].point_no), (0, 0, 1));
    assert!(doc.location_at(parse_time("2030-01-01T00:00:00Z").unwrap()).is_empty());
}

// ---- simplification ----

fn random_walk(seed: u64, n: usize) -> GpxDocument {
    let mut rng = StdRng::seed_from_u64(seed);
    // close to the equator the planar approximation is a true metric
    let (mut lat, mut lon) = (0.0, 14.0);
    let mut points = Vec::with_capacity(n);
    for _ in 0..n {
        lat += rng.random_range(-0.0005..0.0005);
        lon += rng.random_range(-0.0005..0.0005);
        points.push(GpxPoint::new(lat, lon));
    }
    let mut track = GpxTrack::default();
    track.append_segment(GpxTrackSegment::new(points));
    let mut doc = GpxDocument::new();
    doc.append_track(track);
    doc
}

#[test]
fn test_simplify_is_monotonic() {
    for seed in [1, 2, 3] {
        let doc = random_walk(seed, 300);
        let original = doc.length_2d();

        let mut exact = doc.clone();
        exact.simplify_tracks(0.0);
        assert_eq!(exact.length_2d(), original);

        let mut previous = original;
        for threshold in [0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 1000.0] {
            let mut simplified = doc.clone();
            simplified.simplify_tracks(threshold);
            let length = simplified.length_2d();
            assert!(
                length <= previous + 1e-3,
                "seed {seed}: {length} > {previous} at threshold {threshold}"
            );
            previous = length;
        }

        let mut collapsed = doc.clone();
        collapsed.simplify_tracks(1e9);
        let points = &collapsed.tracks[0].segments[0].points;
        assert_eq!(points.len(), 2);
        assert_eq!(points[0], doc.tracks[0].segments[0].points[0]);
        assert_eq!(points[1], doc.tracks[0].segments[0].points[299]);
    }
}

// ---- errors ----

#[test]
fn test_decode_errors() {
    assert!(matches!(
        parse(br#"<?xml version="1.0"?><gpx creator="x"></gpx>"#),
        Err(GpxError::MissingVersion)
    ));
    assert!(parse(br#"<gpx version="1.1"><trk><trkseg></trk></gpx>"#).is_err());
    assert!(matches!(parse(br#"{"version": 11}"#), Err(GpxError::Json(_))));
}

#[test]
fn test_conflicting_registration() {
    let mut doc = GpxDocument::new();
    doc.register_namespace("a", "http://x").unwrap();
    doc.register_namespace("a", "http://x").unwrap();
    assert!(matches!(
        doc.register_namespace("b", "http://x"),
        Err(GpxError::NamespaceConflict { .. })
    ));
    assert!(matches!(
        doc.register_namespace("a", "http://y"),
        Err(GpxError::NamespaceConflict { .. })
    ));
    assert!(matches!(doc.register_namespace("xmlns", "http://z"), Err(GpxError::InvalidPrefix(_))));
}
