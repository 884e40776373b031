use std::str::Utf8Error;

use thiserror::Error;
use wasm_bindgen::JsValue;

/// Errors surfaced while decoding or encoding a GPX document.
///
/// Field-level anomalies (an unparsable `<ele>`, a bad timestamp) never show
/// up here; they are absorbed into absent values by the decoder.
#[derive(Debug, Error)]
pub enum GpxError {
    #[error("XML parse error: {0}")]
    XmlParse(#[from] quick_xml::Error),

    #[error("invalid XML attribute: {0}")]
    XmlAttribute(String),

    #[error("XML write error: {0}")]
    XmlWrite(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("input is not valid UTF-8: {0}")]
    Utf8(#[from] Utf8Error),

    #[error("no version attribute found on the <gpx> root element")]
    MissingVersion,

    #[error("document has no <gpx> root element")]
    MissingRoot,

    #[error("unexpected end of input inside <{0}>")]
    UnexpectedEof(&'static str),

    #[error("'{0}' cannot be used as a namespace prefix")]
    InvalidPrefix(String),

    #[error("namespace conflict: prefix '{prefix}' for '{url}' clashes with '{existing}'")]
    NamespaceConflict {
        prefix: String,
        url: String,
        existing: String,
    },
}

pub type Result<T> = std::result::Result<T, GpxError>;

impl From<quick_xml::events::attributes::AttrError> for GpxError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        Self::XmlParse(e.into())
    }
}

impl From<GpxError> for JsValue {
    fn from(e: GpxError) -> Self {
        JsValue::from_str(&e.to_string())
    }
}
