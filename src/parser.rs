use tracing::debug;

use crate::codec;
use crate::error::{GpxError, Result};
use crate::gpx_types::GpxDocument;

/// How far into the input the root `version` attribute is looked for.
const SNIFF_LIMIT: usize = 1000;

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Decodes a document from XML or from its JSON mirror. Input whose first
/// significant character is `{` is read as JSON.
pub fn parse(bytes: &[u8]) -> Result<GpxDocument> {
    let body = strip_bom(bytes);
    match body.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') => parse_json(body),
        _ => parse_xml(body),
    }
}

pub fn parse_str(input: &str) -> Result<GpxDocument> {
    parse(input.as_bytes())
}

/// Decodes GPX XML. The schema layout is chosen from the root `version`
/// attribute before the document is parsed.
pub fn parse_xml(bytes: &[u8]) -> Result<GpxDocument> {
    let bytes = strip_bom(bytes);
    let version = sniff_version(bytes).ok_or(GpxError::MissingVersion)?;
    debug!(version = %version, "detected GPX version");
    let xml = std::str::from_utf8(bytes)?;
    codec::decode(xml, &version)
}

pub fn parse_json(bytes: &[u8]) -> Result<GpxDocument> {
    Ok(serde_json::from_slice(strip_bom(bytes))?)
}

/// Reads the quoted `version` literal of the `<gpx>` start tag, looking only
/// at the first 1000 bytes.
pub fn sniff_version(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(SNIFF_LIMIT)];
    let tag_start = find_root(head)?;
    let tag = &head[tag_start..];
    let tag = match tag.iter().position(|&b| b == b'>') {
        Some(end) => &tag[..end],
        None => tag,
    };

    let mut i = 0;
    while let Some(offset) = find(&tag[i..], b"version") {
        let at = i + offset;
        i = at + b"version".len();
        if !tag[at - 1].is_ascii_whitespace() {
            continue;
        }
        let rest = skip_ws(&tag[i..]);
        let Some(rest) = rest.strip_prefix(b"=") else {
            continue;
        };
        let rest = skip_ws(rest);
        let (&quote, rest) = rest.split_first()?;
        if quote != b'"' && quote != b'\'' {
            return None;
        }
        let end = rest.iter().position(|&b| b == quote)?;
        return std::str::from_utf8(&rest[..end]).ok().map(str::to_string);
    }
    None
}

/// Offset of the `<gpx` start tag, not matching longer names like `<gpxx:`.
fn find_root(head: &[u8]) -> Option<usize> {
    let mut i = 0;
    while let Some(offset) = find(&head[i..], b"<gpx") {
        let at = i + offset;
        i = at + b"<gpx".len();
        match head.get(i) {
            Some(b) if b.is_ascii_whitespace() || *b == b'>' => return Some(at),
            _ => continue,
        }
    }
    None
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn skip_ws(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    &bytes[start..]
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(BOM).unwrap_or(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::NamespaceMatch;

    fn parse_gpx(xml: &str) -> GpxDocument {
        parse_str(xml).unwrap()
    }

    #[test]
    fn test_sniff_version() {
        assert_eq!(
            sniff_version(br#"<?xml version="1.0"?><gpx version="1.1">"#).as_deref(),
            Some("1.1")
        );
        assert_eq!(
            sniff_version(b"<gpx creator='x'\n  version = '1.0'>").as_deref(),
            Some("1.0")
        );
        assert_eq!(
            sniff_version(br#"<gpx xmlns:gpxx="u" version="7.7.5-play">"#).as_deref(),
            Some("7.7.5-play")
        );
        // `gpxversion` is not the version attribute
        assert_eq!(sniff_version(br#"<gpx gpxversion="2" version="1.0">"#).as_deref(), Some("1.0"));
        assert_eq!(sniff_version(br#"<gpx creator="x">"#), None);
        assert_eq!(sniff_version(br#"<gpxx version="1.1">"#), None);
        assert_eq!(sniff_version(b"not xml at all"), None);
    }

    #[test]
    fn test_sniff_stops_after_limit() {
        let padding = " ".repeat(SNIFF_LIMIT);
        let xml = format!(r#"<?xml version="1.0"?>{padding}<gpx version="1.1"></gpx>"#);
        assert!(matches!(parse_str(&xml), Err(GpxError::MissingVersion)));
    }

    #[test]
    fn test_missing_version_fails() {
        let xml = r#"<?xml version="1.0"?><gpx creator="x"></gpx>"#;
        assert!(matches!(parse_str(xml), Err(GpxError::MissingVersion)));
    }

    #[test]
    fn test_minimal_waypoint() {
        let doc = parse_gpx(
            r#"<?xml version="1.0"?>
<gpx version="1.1">
  <wpt lat="35.6762" lon="139.6503"/>
</gpx>"#,
        );
        assert_eq!(doc.waypoints.len(), 1);
        assert!((doc.waypoints[0].lat - 35.6762).abs() < 1e-10);
        assert!((doc.waypoints[0].lon - 139.6503).abs() < 1e-10);
        assert!(doc.waypoints[0].elevation.is_absent());
    }

    #[test]
    fn test_waypoint_with_children() {
        let doc = parse_gpx(
            r#"<?xml version="1.0"?>
<gpx version="1.1">
  <wpt lat="35.6762" lon="139.6503">
    <ele>40.5</ele>
    <time>2025-01-01T00:00:00Z</time>
    <name>Tokyo Tower</name>
    <desc>A famous landmark</desc>
    <cmt>Comment</cmt>
    <src>GPS</src>
    <sym>Flag</sym>
    <type>POI</type>
    <sat>0</sat>
  </wpt>
</gpx>"#,
        );
        let pt = &doc.waypoints[0];
        assert_eq!(pt.elevation.value(), Some(40.5));
        assert_eq!(pt.timestamp.format().as_deref(), Some("2025-01-01T00:00:00Z"));
        assert_eq!(pt.name, "Tokyo Tower");
        assert_eq!(pt.description, "A famous landmark");
        assert_eq!(pt.comment, "Comment");
        assert_eq!(pt.source, "GPS");
        assert_eq!(pt.symbol, "Flag");
        assert_eq!(pt.point_type, "POI");
        assert_eq!(pt.satellites.value(), Some(0));
    }

    #[test]
    fn test_unparsable_number_is_absent() {
        let doc = parse_gpx(
            r#"<gpx version="1.1">
  <wpt lat="1" lon="2"><ele>high</ele><name>kept</name></wpt>
</gpx>"#,
        );
        assert!(doc.waypoints[0].elevation.is_absent());
        assert_eq!(doc.waypoints[0].name, "kept");
    }

    #[test]
    fn test_tracks_and_segments() {
        let doc = parse_gpx(
            r#"<?xml version="1.0"?>
<gpx version="1.1">
  <trk>
    <name>Morning Run</name>
    <number>3</number>
    <trkseg>
      <trkpt lat="35.0" lon="139.0"><ele>10.0</ele></trkpt>
      <trkpt lat="35.001" lon="139.001"><ele>11.0</ele></trkpt>
    </trkseg>
    <trkseg></trkseg>
  </trk>
</gpx>"#,
        );
        let track = &doc.tracks[0];
        assert_eq!(track.name, "Morning Run");
        assert_eq!(track.number.value(), Some(3));
        assert_eq!(track.segments.len(), 2);
        assert_eq!(track.segments[0].points.len(), 2);
        assert!(track.segments[1].points.is_empty());
    }

    #[test]
    fn test_extensions_are_kept() {
        let doc = parse_gpx(
            r#"<?xml version="1.0"?>
<gpx version="1.1" xmlns:gpxtpx="http://www.garmin.com/xmlschemas/TrackPointExtension/v1">
  <trk><trkseg>
    <trkpt lat="35.0" lon="139.0">
      <extensions>
        <gpxtpx:TrackPointExtension>
          <gpxtpx:hr>150</gpxtpx:hr>
        </gpxtpx:TrackPointExtension>
      </extensions>
    </trkpt>
  </trkseg></trk>
</gpx>"#,
        );
        let ext = &doc.tracks[0].segments[0].points[0].extensions;
        let tpe = ext
            .get_node(
                NamespaceMatch::Url("http://www.garmin.com/xmlschemas/TrackPointExtension/v1"),
                "TrackPointExtension",
            )
            .unwrap();
        assert_eq!(tpe.get_node(NamespaceMatch::Any, "hr").unwrap().text, "150");
        assert_eq!(
            doc.namespaces.prefix_for("http://www.garmin.com/xmlschemas/TrackPointExtension/v1"),
            Some("gpxtpx")
        );
    }

    #[test]
    fn test_cdata_and_entities() {
        let doc = parse_gpx(
            r#"<?xml version="1.0"?>
<gpx version="1.1">
  <wpt lat="35.0" lon="139.0"><name><![CDATA[Test & Name]]></name></wpt>
  <wpt lat="35.0" lon="139.0"><name>Caf&#233; &amp; Bar</name></wpt>
</gpx>"#,
        );
        assert_eq!(doc.waypoints[0].name, "Test & Name");
        assert_eq!(doc.waypoints[1].name, "Café & Bar");
    }

    #[test]
    fn test_missing_lat_lon_skipped() {
        let doc = parse_gpx(
            r#"<?xml version="1.0"?>
<gpx version="1.1">
  <wpt lat="35.0" lon="139.0"><name>Good</name></wpt>
  <wpt><name>Bad - no coords</name></wpt>
  <wpt lat="36.0" lon="140.0"><name>Also Good</name></wpt>
</gpx>"#,
        );
        assert_eq!(doc.waypoints.len(), 2);
        assert_eq!(doc.waypoints[0].name, "Good");
        assert_eq!(doc.waypoints[1].name, "Also Good");
    }

    #[test]
    fn test_metadata_and_email() {
        let doc = parse_gpx(
            r#"<gpx version="1.1" creator="test">
  <metadata>
    <name>Doc</name>
    <author><name>Jane</name><email id="jane" domain="example.com"/></author>
    <copyright author="Jane"><year>2020</year></copyright>
    <keywords>a, b</keywords>
  </metadata>
</gpx>"#,
        );
        assert_eq!(doc.creator, "test");
        assert_eq!(doc.name, "Doc");
        assert_eq!(doc.author_name, "Jane");
        assert_eq!(doc.author_email, "jane@example.com");
        assert_eq!(doc.copyright, "Jane");
        assert_eq!(doc.copyright_year, "2020");
        assert_eq!(doc.keywords, "a, b");
    }

    #[test]
    fn test_gpx10_document() {
        let doc = parse_gpx(
            r#"<?xml version="1.0"?>
<gpx xmlns="http://www.topografix.com/GPX/1/0" version="1.0">
  <author>Jane</author>
  <email>jane@example.com</email>
  <trk>
    <trkseg>
      <trkpt lat="35.0" lon="139.0">
        <speed>5.5</speed>
        <course>180.0</course>
        <sat>0</sat>
      </trkpt>
      <trkpt lat="35.001" lon="139.001"/>
    </trkseg>
  </trk>
</gpx>"#,
        );
        assert_eq!(doc.version, "1.0");
        assert_eq!(doc.author_name, "Jane");
        assert_eq!(doc.author_email, "jane@example.com");
        assert_eq!(doc.tracks[0].segments[0].points.len(), 2);
        // 1.0 cannot tell a zero from a missing value
        assert!(doc.tracks[0].segments[0].points[0].satellites.is_absent());
    }

    #[test]
    fn test_json_input_and_bom() {
        let json = br#"  {"version":"1.1","name":"mirror","waypoints":[{"lat":1.0,"lon":2.0,"elevation":0.0}]}"#;
        let doc = parse(json).unwrap();
        assert_eq!(doc.name, "mirror");
        assert_eq!(doc.waypoints[0].elevation.value(), Some(0.0));

        let mut xml = BOM.to_vec();
        xml.extend_from_slice(br#"<gpx version="1.1"><wpt lat="1" lon="2"/></gpx>"#);
        assert_eq!(parse(&xml).unwrap().waypoints.len(), 1);
    }

    #[test]
    fn test_malformed_input_fails() {
        assert!(parse(br#"<gpx version="1.1"><wpt lat="1" lon="2">"#).is_err());
        assert!(matches!(parse(b"{ not json"), Err(GpxError::Json(_))));
        assert!(matches!(
            parse(b"<gpx version=\"1.1\"><name>\xFF</name></gpx>"),
            Err(GpxError::Utf8(_))
        ));
    }
}
