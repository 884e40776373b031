//! Prefix bookkeeping for the namespaces declared on a document's root.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GpxError, Result};

pub const GPX10_NAMESPACE: &str = "http://www.topografix.com/GPX/1/0";
pub const GPX11_NAMESPACE: &str = "http://www.topografix.com/GPX/1/1";
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// One `xmlns:prefix="url"` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub prefix: String,
    pub url: String,
}

/// Prefix ↔ URL table for one document, kept in declaration order.
///
/// The default (unprefixed) namespace is never stored here; it is always the
/// schema URL of the layout being written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamespaceRegistry {
    declarations: Vec<Namespace>,
}

impl NamespaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Namespace> {
        self.declarations.iter()
    }

    pub fn prefix_for(&self, url: &str) -> Option<&str> {
        self.declarations
            .iter()
            .find(|ns| ns.url == url)
            .map(|ns| ns.prefix.as_str())
    }

    pub fn url_for(&self, prefix: &str) -> Option<&str> {
        self.declarations
            .iter()
            .find(|ns| ns.prefix == prefix)
            .map(|ns| ns.url.as_str())
    }

    /// Binds `prefix` to `url`. Re-registering the same pair is a no-op;
    /// reusing either side with a different partner is a conflict.
    pub fn register(&mut self, prefix: &str, url: &str) -> Result<()> {
        check_prefix(prefix)?;
        if let Some(existing) = self.prefix_for(url) {
            if existing == prefix {
                return Ok(());
            }
            return Err(GpxError::NamespaceConflict {
                prefix: prefix.to_string(),
                url: url.to_string(),
                existing: existing.to_string(),
            });
        }
        if let Some(existing) = self.url_for(prefix) {
            return Err(GpxError::NamespaceConflict {
                prefix: prefix.to_string(),
                url: url.to_string(),
                existing: existing.to_string(),
            });
        }
        self.declarations.push(Namespace {
            prefix: prefix.to_string(),
            url: url.to_string(),
        });
        Ok(())
    }

    /// Returns the prefix bound to `url`, allocating `ns1`, `ns2`, ... for
    /// URLs seen for the first time.
    pub fn ensure(&mut self, url: &str) -> String {
        if let Some(prefix) = self.prefix_for(url) {
            return prefix.to_string();
        }
        let prefix = (1..)
            .map(|n| format!("ns{n}"))
            .find(|p| self.url_for(p).is_none())
            .unwrap_or_default();
        debug!(prefix = %prefix, url = %url, "allocated namespace prefix");
        self.declarations.push(Namespace {
            prefix: prefix.clone(),
            url: url.to_string(),
        });
        prefix
    }

    /// Records a declaration found in an input document. Aliases (a second
    /// prefix for a known URL) and rebindings of a taken prefix are skipped,
    /// keeping the table bijective.
    pub(crate) fn declare(&mut self, prefix: &str, url: &str) {
        if check_prefix(prefix).is_err() || url.is_empty() {
            return;
        }
        if self.prefix_for(url).is_none() && self.url_for(prefix).is_none() {
            self.declarations.push(Namespace {
                prefix: prefix.to_string(),
                url: url.to_string(),
            });
        }
    }

    /// Fails if the table is not one-to-one, which can only happen for a
    /// registry deserialized from JSON.
    pub fn validate(&self) -> Result<()> {
        for (i, ns) in self.declarations.iter().enumerate() {
            check_prefix(&ns.prefix)?;
            for other in &self.declarations[..i] {
                if other.prefix == ns.prefix || other.url == ns.url {
                    return Err(GpxError::NamespaceConflict {
                        prefix: ns.prefix.clone(),
                        url: ns.url.clone(),
                        existing: if other.prefix == ns.prefix {
                            other.url.clone()
                        } else {
                            other.prefix.clone()
                        },
                    });
                }
            }
        }
        Ok(())
    }
}

fn check_prefix(prefix: &str) -> Result<()> {
    let valid = !prefix.is_empty()
        && !prefix.eq_ignore_ascii_case("xml")
        && !prefix.eq_ignore_ascii_case("xmlns")
        && !prefix.contains([':', ' ', '<', '>', '"', '\'', '&', '=', '/']);
    if valid {
        Ok(())
    } else {
        Err(GpxError::InvalidPrefix(prefix.to_string()))
    }
}
