use serde::Deserialize;

use crate::gpx_types::GpxDocument;

/// Options for encoding a document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodeOptions {
    /// Schema version to emit: "1.0" selects the 1.0 layout, anything else is
    /// written with the 1.1 layout and kept verbatim (default: "1.1")
    #[serde(default = "default_version")]
    pub version: String,

    /// Pretty-print the output (default: false)
    #[serde(default)]
    pub indent: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            version: default_version(),
            indent: false,
        }
    }
}

impl EncodeOptions {
    /// Re-emits under the version the document was read with.
    pub fn for_document(doc: &GpxDocument) -> Self {
        let version = if doc.version.is_empty() {
            default_version()
        } else {
            doc.version.clone()
        };
        Self {
            version,
            indent: false,
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn indented(mut self) -> Self {
        self.indent = true;
        self
    }
}

/// Options for GPX to GeoJSON conversion.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertOptions {
    /// Include elevation as the 3rd coordinate value (default: true)
    #[serde(default = "default_true")]
    pub include_elevation: bool,

    /// Include timestamps in coordinateProperties.times (default: true)
    #[serde(default = "default_true")]
    pub include_time: bool,

    /// Include names, descriptions and other strings in properties (default: true)
    #[serde(default = "default_true")]
    pub include_metadata: bool,

    /// Which element types to convert (default: all)
    #[serde(default)]
    pub types: Option<Vec<GpxElementType>>,

    /// Join track segments into a single MultiLineString (default: false)
    #[serde(default)]
    pub join_track_segments: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            include_elevation: true,
            include_time: true,
            include_metadata: true,
            types: None,
            join_track_segments: false,
        }
    }
}

impl ConvertOptions {
    pub fn should_include(&self, element_type: GpxElementType) -> bool {
        self.types
            .as_ref()
            .is_none_or(|types| types.contains(&element_type))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpxElementType {
    Waypoint,
    Route,
    Track,
}

fn default_true() -> bool {
    true
}

fn default_version() -> String {
    "1.1".to_string()
}
