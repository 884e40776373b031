use tracing::debug;

use crate::codec;
use crate::error::Result;
use crate::gpx_types::GpxDocument;
use crate::options::EncodeOptions;

/// Encodes the document as GPX XML in the layout `options.version` selects.
/// Fails only when the document's namespace registry is inconsistent.
pub fn to_xml(doc: &GpxDocument, options: &EncodeOptions) -> Result<Vec<u8>> {
    codec::encode(doc, &options.version, options.indent)
}

pub fn to_xml_string(doc: &GpxDocument, options: &EncodeOptions) -> Result<String> {
    let bytes = to_xml(doc, options)?;
    Ok(String::from_utf8(bytes).map_err(|e| e.utf8_error())?)
}

/// Encodes the JSON mirror of the document. The mirror is not schema-bound,
/// so `options.version` has no effect here.
pub fn to_json(doc: &GpxDocument, options: &EncodeOptions) -> Result<Vec<u8>> {
    doc.namespaces.validate()?;
    debug!(indent = options.indent, "encoding JSON mirror");
    let bytes = if options.indent {
        serde_json::to_vec_pretty(doc)?
    } else {
        serde_json::to_vec(doc)?
    };
    Ok(bytes)
}
