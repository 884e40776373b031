//! Read, edit, analyse and write GPX 1.0 / 1.1 documents.
//!
//! Documents decode into a version-neutral model ([`GpxDocument`]) and encode
//! back to either schema, to a JSON mirror, or to GeoJSON. The same API is
//! exported to JavaScript through `wasm-bindgen`.

pub mod analytics;
mod codec;
pub mod converter;
pub mod error;
pub mod extension;
pub mod geo;
pub mod gpx_types;
pub mod namespace;
pub mod nullable;
pub mod options;
pub mod parser;
pub mod serializer;
mod xml;

use wasm_bindgen::prelude::*;

pub use crate::analytics::{GpxBounds, GpxStats, LocationMatch, MovingData, UphillDownhill};
pub use crate::codec::Layout;
pub use crate::error::{GpxError, Result};
pub use crate::extension::{Extension, ExtensionAttr, ExtensionNode, NamespaceMatch};
pub use crate::gpx_types::{GpxDocument, GpxPoint, GpxRoute, GpxTrack, GpxTrackSegment};
pub use crate::namespace::NamespaceRegistry;
pub use crate::nullable::Nullable;
pub use crate::options::{ConvertOptions, EncodeOptions};
pub use crate::parser::{parse, parse_json, parse_str, parse_xml};
pub use crate::serializer::{to_json, to_xml, to_xml_string};

/// Decode GPX (or its JSON mirror) into a JS object.
#[wasm_bindgen(js_name = parseGpx)]
pub fn parse_gpx(input: &[u8]) -> std::result::Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let doc = parser::parse(input)?;
    to_js(&doc)
}

/// Re-encode a document as GPX XML.
#[wasm_bindgen(js_name = gpxToXml)]
pub fn gpx_to_xml(input: &[u8], options: JsValue) -> std::result::Result<js_sys::Uint8Array, JsValue> {
    console_error_panic_hook::set_once();

    let doc = parser::parse(input)?;
    let opts = encode_options(options, &doc)?;
    let xml = serializer::to_xml(&doc, &opts)?;
    Ok(js_sys::Uint8Array::from(xml.as_slice()))
}

/// Re-encode a document as its JSON mirror string.
#[wasm_bindgen(js_name = gpxToJson)]
pub fn gpx_to_json(input: &[u8], options: JsValue) -> std::result::Result<String, JsValue> {
    console_error_panic_hook::set_once();

    let doc = parser::parse(input)?;
    let opts = encode_options(options, &doc)?;
    let json = serializer::to_json(&doc, &opts)?;
    String::from_utf8(json).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Convert GPX to GeoJSON, returned as a JS object.
#[wasm_bindgen(js_name = gpxToGeoJson)]
pub fn gpx_to_geojson(input: &[u8], options: JsValue) -> std::result::Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let opts = convert_options(options)?;
    let doc = parser::parse(input)?;
    let fc = converter::to_feature_collection(&doc, &opts);
    to_js(&fc)
}

/// Convert GPX to GeoJSON, returned as a JSON string.
#[wasm_bindgen(js_name = gpxToGeoJsonString)]
pub fn gpx_to_geojson_string(input: &[u8], options: JsValue) -> std::result::Result<String, JsValue> {
    console_error_panic_hook::set_once();

    let opts = convert_options(options)?;
    let doc = parser::parse(input)?;
    let fc = converter::to_feature_collection(&doc, &opts);
    serde_json::to_string(&fc).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Length, duration, moving data, climb and bounds of all tracks.
#[wasm_bindgen(js_name = gpxStats)]
pub fn gpx_stats(input: &[u8]) -> std::result::Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let doc = parser::parse(input)?;
    to_js(&GpxStats::of(&doc))
}

fn to_js<T: serde::Serialize>(value: &T) -> std::result::Result<JsValue, JsValue> {
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    value
        .serialize(&serializer)
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

fn convert_options(options: JsValue) -> std::result::Result<ConvertOptions, JsValue> {
    if options.is_undefined() || options.is_null() {
        Ok(ConvertOptions::default())
    } else {
        serde_wasm_bindgen::from_value(options).map_err(|e| JsValue::from_str(&e.to_string()))
    }
}

/// Without options the document is re-emitted under its own version.
fn encode_options(options: JsValue, doc: &GpxDocument) -> std::result::Result<EncodeOptions, JsValue> {
    if options.is_undefined() || options.is_null() {
        Ok(EncodeOptions::for_document(doc))
    } else {
        serde_wasm_bindgen::from_value(options).map_err(|e| JsValue::from_str(&e.to_string()))
    }
}
