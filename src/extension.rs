//! Opaque storage for vendor `<extensions>` content.
//!
//! Nodes carry namespace URLs, never prefixes. Prefixes are chosen when the
//! document is written (see [`crate::namespace`]).

use serde::{Deserialize, Serialize};

/// Selects child nodes by namespace in [`Extension::get_node`] lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceMatch<'a> {
    /// Exactly this namespace URL.
    Url(&'a str),
    /// Elements that were written without any namespace.
    None,
    /// Any namespace, first match by local name.
    Any,
}

impl NamespaceMatch<'_> {
    fn matches(&self, namespace: &str) -> bool {
        match self {
            Self::Url(url) => *url == namespace,
            Self::None => namespace.is_empty(),
            Self::Any => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionAttr {
    #[serde(default)]
    pub namespace: String,
    pub local_name: String,
    #[serde(default)]
    pub value: String,
}

impl ExtensionAttr {
    pub fn new(namespace: &str, local_name: &str, value: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            local_name: local_name.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtensionNode {
    pub namespace: String,
    pub local_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<ExtensionAttr>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ExtensionNode>,
}

impl ExtensionNode {
    pub fn new(namespace: &str, local_name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            local_name: local_name.to_string(),
            ..Default::default()
        }
    }

    /// Walks `path` (slash separated local names) below this node, creating
    /// missing children in this node's namespace. An empty path returns `self`.
    pub fn get_or_create_node(&mut self, path: &str) -> &mut ExtensionNode {
        let namespace = self.namespace.clone();
        let mut node = self;
        for name in path.split('/').filter(|s| !s.is_empty()) {
            let current = node;
            node = child_or_insert(&mut current.children, &namespace, name);
        }
        node
    }

    pub fn get_node(&self, namespace: NamespaceMatch<'_>, local_name: &str) -> Option<&ExtensionNode> {
        find_child(&self.children, namespace, local_name)
    }

    pub fn get_node_mut(
        &mut self,
        namespace: NamespaceMatch<'_>,
        local_name: &str,
    ) -> Option<&mut ExtensionNode> {
        self.children
            .iter_mut()
            .find(|n| n.local_name == local_name && namespace.matches(&n.namespace))
    }

    /// Sets an attribute in the node's own namespace.
    pub fn set_attr(&mut self, local_name: &str, value: &str) {
        let namespace = self.namespace.clone();
        self.set_attr_ns(&namespace, local_name, value);
    }

    /// Replaces the first attribute with this local name, or appends one.
    pub fn set_attr_ns(&mut self, namespace: &str, local_name: &str, value: &str) {
        match self.attrs.iter_mut().find(|a| a.local_name == local_name) {
            Some(attr) => {
                attr.namespace = namespace.to_string();
                attr.value = value.to_string();
            }
            None => self.attrs.push(ExtensionAttr::new(namespace, local_name, value)),
        }
    }

    pub fn get_attr(&self, local_name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.local_name == local_name)
            .map(|a| a.value.as_str())
    }

    pub fn remove_attr(&mut self, local_name: &str) -> Option<ExtensionAttr> {
        let idx = self.attrs.iter().position(|a| a.local_name == local_name)?;
        Some(self.attrs.remove(idx))
    }

    fn has_attribute_in(&self, namespace: &str) -> bool {
        self.attrs.iter().any(|a| a.namespace == namespace)
            || self.children.iter().any(|c| c.has_attribute_in(namespace))
    }

    fn collect_namespaces(&self, out: &mut Vec<String>) {
        push_unique(out, &self.namespace);
        for attr in &self.attrs {
            push_unique(out, &attr.namespace);
        }
        for child in &self.children {
            child.collect_namespaces(out);
        }
    }
}

/// The ordered root-level nodes of one `<extensions>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Extension {
    pub nodes: Vec<ExtensionNode>,
}

impl Extension {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Walks `path` (for example `"aaa/bbb/ccc"`) under `namespace`, creating
    /// every missing node, and returns the last one. `None` when the path
    /// names no element.
    pub fn get_or_create_node(&mut self, namespace: &str, path: &str) -> Option<&mut ExtensionNode> {
        let mut names = path.split('/').filter(|s| !s.is_empty());
        let root = names.next()?;
        let mut node = child_or_insert(&mut self.nodes, namespace, root);
        for name in names {
            let current = node;
            node = child_or_insert(&mut current.children, namespace, name);
        }
        Some(node)
    }

    pub fn get_node(&self, namespace: NamespaceMatch<'_>, local_name: &str) -> Option<&ExtensionNode> {
        find_child(&self.nodes, namespace, local_name)
    }

    pub fn get_node_mut(
        &mut self,
        namespace: NamespaceMatch<'_>,
        local_name: &str,
    ) -> Option<&mut ExtensionNode> {
        self.nodes
            .iter_mut()
            .find(|n| n.local_name == local_name && namespace.matches(&n.namespace))
    }

    /// Distinct namespace URLs used anywhere in the tree, in first-seen order.
    pub fn namespaces(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_namespaces(&mut out);
        out
    }

    pub(crate) fn has_attribute_in(&self, namespace: &str) -> bool {
        self.nodes.iter().any(|n| n.has_attribute_in(namespace))
    }

    pub(crate) fn collect_namespaces(&self, out: &mut Vec<String>) {
        for node in &self.nodes {
            node.collect_namespaces(out);
        }
    }
}

fn child_or_insert<'a>(
    nodes: &'a mut Vec<ExtensionNode>,
    namespace: &str,
    local_name: &str,
) -> &'a mut ExtensionNode {
    let idx = match nodes
        .iter()
        .position(|n| n.namespace == namespace && n.local_name == local_name)
    {
        Some(idx) => idx,
        None => {
            nodes.push(ExtensionNode::new(namespace, local_name));
            nodes.len() - 1
        }
    };
    &mut nodes[idx]
}

fn find_child<'a>(
    nodes: &'a [ExtensionNode],
    namespace: NamespaceMatch<'_>,
    local_name: &str,
) -> Option<&'a ExtensionNode> {
    nodes
        .iter()
        .find(|n| n.local_name == local_name && namespace.matches(&n.namespace))
}

fn push_unique(out: &mut Vec<String>, namespace: &str) {
    if !namespace.is_empty() && !out.iter().any(|n| n == namespace) {
        out.push(namespace.to_string());
    }
}
