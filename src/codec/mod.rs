//! Wire layouts of GPX 1.0 and 1.1 and their mapping to the neutral model.
//!
//! Each layout module owns its wire structs, reads/writes them with
//! quick-xml, and converts them to and from [`GpxDocument`].

pub(crate) mod gpx10;
pub(crate) mod gpx11;

use tracing::{debug, warn};

use crate::error::Result;
use crate::extension::ExtensionAttr;
use crate::gpx_types::GpxDocument;
use crate::namespace::{GPX10_NAMESPACE, GPX11_NAMESPACE, NamespaceRegistry, XSI_NAMESPACE};

/// Which wire schema a version string is read and written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Gpx10,
    Gpx11,
}

impl Layout {
    /// `"1.0"` selects the 1.0 layout; every other version string, standard
    /// or not, is handled with the 1.1 layout.
    pub fn for_version(version: &str) -> Self {
        if version.trim() == "1.0" {
            Self::Gpx10
        } else {
            Self::Gpx11
        }
    }

    pub fn namespace(self) -> &'static str {
        match self {
            Self::Gpx10 => GPX10_NAMESPACE,
            Self::Gpx11 => GPX11_NAMESPACE,
        }
    }

    fn other(self) -> Self {
        match self {
            Self::Gpx10 => Self::Gpx11,
            Self::Gpx11 => Self::Gpx10,
        }
    }

    /// `namespace schema-url` pair for `xsi:schemaLocation`.
    pub fn schema_location(self) -> String {
        format!("{0} {0}/gpx.xsd", self.namespace())
    }
}

pub(crate) fn decode(xml: &str, version: &str) -> Result<GpxDocument> {
    let layout = Layout::for_version(version);
    if layout == Layout::Gpx11 && version.trim() != "1.1" {
        warn!(version = %version, "non-standard GPX version, reading with the 1.1 layout");
    }
    let doc = match layout {
        Layout::Gpx10 => {
            let (wire, namespaces) = gpx10::read(xml)?;
            gpx10::from_wire(wire, namespaces)
        }
        Layout::Gpx11 => {
            let (wire, namespaces) = gpx11::read(xml)?;
            gpx11::from_wire(wire, namespaces)
        }
    };
    debug!(
        waypoints = doc.waypoints.len(),
        routes = doc.routes.len(),
        tracks = doc.tracks.len(),
        "decoded GPX document"
    );
    Ok(doc)
}

pub(crate) fn encode(doc: &GpxDocument, version: &str, indent: bool) -> Result<Vec<u8>> {
    let layout = Layout::for_version(version);
    let namespaces = resolve_namespaces(doc, layout)?;
    debug!(version = %version, ?layout, "encoding GPX document");
    match layout {
        Layout::Gpx10 => {
            let mut wire = gpx10::to_wire(doc, version);
            wire.attributes = retarget_schema_location(&wire.attributes, layout);
            gpx10::write(&wire, &namespaces, indent)
        }
        Layout::Gpx11 => {
            let mut wire = gpx11::to_wire(doc, version);
            wire.attributes = retarget_schema_location(&wire.attributes, layout);
            gpx11::write(&wire, &namespaces, indent)
        }
    }
}

/// Replaces the other GPX version's entry in `xsi:schemaLocation` with the
/// schema of `layout`. Values without such an entry are kept verbatim.
fn retarget_schema_location(attributes: &[ExtensionAttr], layout: Layout) -> Vec<ExtensionAttr> {
    let other = layout.other().namespace();
    attributes
        .iter()
        .map(|attr| {
            let tokens: Vec<&str> = attr.value.split_whitespace().collect();
            let is_schema_location =
                attr.namespace == XSI_NAMESPACE && attr.local_name == "schemaLocation";
            if !is_schema_location || !tokens.chunks(2).any(|pair| pair[0] == other) {
                return attr.clone();
            }
            let pairs: Vec<String> = tokens
                .chunks(2)
                .map(|pair| {
                    if pair[0] == other {
                        layout.schema_location()
                    } else {
                        pair.join(" ")
                    }
                })
                .collect();
            ExtensionAttr {
                value: pairs.join(" "),
                ..attr.clone()
            }
        })
        .collect()
}

/// Completes the document's registry with a prefix for every namespace
/// that will appear in the output. 1.0 carries no extensions, so only root
/// attributes count there. Elements in the layout's own namespace are
/// written bare, but attributes in it still need a prefix.
fn resolve_namespaces(doc: &GpxDocument, layout: Layout) -> Result<NamespaceRegistry> {
    doc.namespaces.validate()?;
    let mut namespaces = doc.namespaces.clone();
    let used: Vec<String> = match layout {
        Layout::Gpx10 => doc
            .attributes
            .iter()
            .filter(|a| !a.namespace.is_empty())
            .map(|a| a.namespace.clone())
            .collect(),
        Layout::Gpx11 => doc.extension_namespaces(),
    };
    for url in used {
        if url != layout.namespace() || doc.has_attribute_in(&url) {
            namespaces.ensure(&url);
        }
    }
    Ok(namespaces)
}

/// Splits `id@domain` on the first `@`. Without an `@` there is no domain.
pub(crate) fn split_email(email: &str) -> (String, Option<String>) {
    match email.split_once('@') {
        Some((id, domain)) => (id.to_string(), Some(domain.to_string())),
        None => (email.to_string(), None),
    }
}

pub(crate) fn join_email(id: &str, domain: Option<&str>) -> String {
    match domain {
        Some(domain) => format!("{id}@{domain}"),
        None => id.to_string(),
    }
}
