//! quick-xml plumbing shared by both wire layouts.

use std::borrow::Cow;

use quick_xml::escape::unescape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::{trace, warn};

use crate::error::{GpxError, Result};
use crate::extension::{Extension, ExtensionAttr, ExtensionNode};
use crate::namespace::NamespaceRegistry;
use crate::nullable::{Nullable, WireValue};

/// Attributes of the `<gpx>` root element.
#[derive(Debug, Default)]
pub(crate) struct RootElement {
    pub version: String,
    pub creator: String,
    pub attributes: Vec<ExtensionAttr>,
}

/// Event reader that also tracks namespace declarations.
///
/// Declarations on the root go straight into `namespaces`, and the root's
/// default namespace opens the outermost scope. Declarations met inside
/// `<extensions>` are scoped while their element is open, and are recorded
/// in `namespaces` as well so a re-encode can declare them on the root.
pub(crate) struct XmlInput<'a> {
    reader: Reader<&'a [u8]>,
    namespaces: NamespaceRegistry,
    scopes: Vec<Vec<(String, String)>>,
}

impl<'a> XmlInput<'a> {
    pub(crate) fn new(xml: &'a str) -> Self {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().expand_empty_elements = true;
        Self {
            reader,
            namespaces: NamespaceRegistry::default(),
            scopes: Vec::new(),
        }
    }

    pub(crate) fn into_namespaces(self) -> NamespaceRegistry {
        self.namespaces
    }

    fn next(&mut self) -> Result<Event<'a>> {
        Ok(self.reader.read_event()?)
    }

    /// Advances to the `<gpx>` start tag and reads its attributes.
    pub(crate) fn read_root(&mut self) -> Result<RootElement> {
        loop {
            match self.next()? {
                Event::Start(e) if e.local_name().as_ref() == b"gpx" => return self.root_from(&e),
                Event::Start(_) | Event::Eof => return Err(GpxError::MissingRoot),
                _ => {}
            }
        }
    }

    fn root_from(&mut self, start: &BytesStart<'_>) -> Result<RootElement> {
        let mut root = RootElement::default();
        let mut others = Vec::new();
        for (key, value) in attributes(start)? {
            match key.as_str() {
                "version" => root.version = value,
                "creator" => root.creator = value,
                "xmlns" => self.scopes.push(vec![(String::new(), value)]),
                _ => match key.strip_prefix("xmlns:") {
                    Some(prefix) => self.namespaces.declare(prefix, &value),
                    None => others.push((key, value)),
                },
            }
        }
        root.attributes = others
            .into_iter()
            .map(|(key, value)| {
                let (namespace, local_name) = self.resolve_attribute(&key);
                ExtensionAttr {
                    namespace,
                    local_name,
                    value,
                }
            })
            .collect();
        Ok(root)
    }

    /// Next child start tag of the element being read, or `None` at its end tag.
    pub(crate) fn next_child(&mut self, parent: &'static str) -> Result<Option<BytesStart<'a>>> {
        loop {
            match self.next()? {
                Event::Start(e) => return Ok(Some(e)),
                Event::End(_) => return Ok(None),
                Event::Eof => return Err(GpxError::UnexpectedEof(parent)),
                _ => {}
            }
        }
    }

    pub(crate) fn skip(&mut self, start: &BytesStart<'_>) -> Result<()> {
        trace!(element = %String::from_utf8_lossy(start.name().as_ref()), "skipping element");
        self.reader.read_to_end(start.name())?;
        Ok(())
    }

    /// Text content of the current element, including text of any nested
    /// elements, up to its end tag.
    pub(crate) fn read_text(&mut self, element: &'static str) -> Result<String> {
        let mut text = String::new();
        let mut depth = 0usize;
        loop {
            let event = self.next()?;
            match &event {
                Event::Start(_) => depth += 1,
                Event::End(_) if depth == 0 => break,
                Event::End(_) => depth -= 1,
                Event::Eof => return Err(GpxError::UnexpectedEof(element)),
                _ => append_text(&mut text, &event)?,
            }
        }
        Ok(text)
    }

    /// Reads `value` of a number-bearing element; unparsable text is absent.
    pub(crate) fn read_value<T: WireValue>(&mut self, element: &'static str) -> Result<Nullable<T>> {
        Ok(Nullable::parse(&self.read_text(element)?))
    }

    /// `lat`/`lon` of a point element. `None` (with a warning) when either is
    /// missing or not a number.
    pub(crate) fn lat_lon(&self, start: &BytesStart<'_>) -> Result<Option<(f64, f64)>> {
        let mut lat = None;
        let mut lon = None;
        for (key, value) in attributes(start)? {
            match key.as_str() {
                "lat" => lat = f64::from_wire(&value),
                "lon" => lon = f64::from_wire(&value),
                _ => {}
            }
        }
        match (lat, lon) {
            (Some(lat), Some(lon)) => Ok(Some((lat, lon))),
            _ => {
                warn!(
                    element = %String::from_utf8_lossy(start.name().as_ref()),
                    "skipping point with missing or invalid lat/lon"
                );
                Ok(None)
            }
        }
    }

    /// Reads an `<extensions>` element whose start tag was just consumed.
    pub(crate) fn read_extensions(&mut self, start: &BytesStart<'_>) -> Result<Extension> {
        self.push_scope(start)?;
        let mut ext = Extension::default();
        while let Some(child) = self.next_child("extensions")? {
            ext.nodes.push(self.read_extension_node(&child)?);
        }
        self.scopes.pop();
        Ok(ext)
    }

    fn read_extension_node(&mut self, start: &BytesStart<'_>) -> Result<ExtensionNode> {
        self.push_scope(start)?;
        let qname = std::str::from_utf8(start.name().as_ref())?.to_string();
        let (namespace, local_name) = self.resolve_element(&qname);
        let mut node = ExtensionNode {
            namespace,
            local_name,
            ..Default::default()
        };
        for (key, value) in attributes(start)? {
            if key == "xmlns" || key.starts_with("xmlns:") {
                continue;
            }
            let (namespace, local_name) = self.resolve_attribute(&key);
            node.attrs.push(ExtensionAttr {
                namespace,
                local_name,
                value,
            });
        }

        // runs of character data, split by child elements
        let mut run = String::new();
        loop {
            let event = self.next()?;
            match &event {
                Event::Start(child) => {
                    flush_run(&mut node.text, &mut run, true);
                    node.children.push(self.read_extension_node(child)?);
                }
                Event::End(_) => {
                    flush_run(&mut node.text, &mut run, !node.children.is_empty());
                    break;
                }
                Event::Eof => return Err(GpxError::UnexpectedEof("extensions")),
                _ => append_text(&mut run, &event)?,
            }
        }
        self.scopes.pop();
        Ok(node)
    }

    fn push_scope(&mut self, start: &BytesStart<'_>) -> Result<()> {
        let mut frame = Vec::new();
        for (key, value) in attributes(start)? {
            if key == "xmlns" {
                frame.push((String::new(), value));
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                self.namespaces.declare(prefix, &value);
                frame.push((prefix.to_string(), value));
            }
        }
        self.scopes.push(frame);
        Ok(())
    }

    fn lookup(&self, prefix: &str) -> Option<String> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|frame| frame.iter())
            .find(|(p, _)| p == prefix)
            .map(|(_, url)| url.clone())
            .or_else(|| self.namespaces.url_for(prefix).map(str::to_string))
    }

    /// Unprefixed elements take the innermost default namespace, if any.
    /// An undeclared prefix keeps the qualified name as the local name.
    fn resolve_element(&self, qname: &str) -> (String, String) {
        match qname.split_once(':') {
            Some((prefix, local)) => match self.lookup(prefix) {
                Some(url) => (url, local.to_string()),
                None => (String::new(), qname.to_string()),
            },
            None => (self.lookup("").unwrap_or_default(), qname.to_string()),
        }
    }

    /// Unprefixed attributes are never in a namespace.
    fn resolve_attribute(&self, qname: &str) -> (String, String) {
        match qname.split_once(':') {
            Some((prefix, local)) => match self.lookup(prefix) {
                Some(url) => (url, local.to_string()),
                None => (String::new(), qname.to_string()),
            },
            None => (String::new(), qname.to_string()),
        }
    }
}

/// Moves `run` into `text`. Whitespace-only runs next to child elements are
/// layout, not content, and are dropped.
fn flush_run(text: &mut String, run: &mut String, beside_elements: bool) {
    if !(beside_elements && run.trim().is_empty()) {
        text.push_str(run);
    }
    run.clear();
}

/// Appends character data from `event`; other events are ignored.
fn append_text(text: &mut String, event: &Event<'_>) -> Result<()> {
    match event {
        Event::Text(e) => text.push_str(std::str::from_utf8(e.as_ref())?),
        Event::CData(e) => text.push_str(std::str::from_utf8(e.as_ref())?),
        Event::GeneralRef(e) => {
            if let Ok(Some(ch)) = e.resolve_char_ref() {
                text.push(ch);
            } else {
                match std::str::from_utf8(e.as_ref())? {
                    "amp" => text.push('&'),
                    "lt" => text.push('<'),
                    "gt" => text.push('>'),
                    "quot" => text.push('"'),
                    "apos" => text.push('\''),
                    other => warn!(entity = %other, "dropping unknown entity reference"),
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// All attributes of a start tag as (qualified name, unescaped value).
pub(crate) fn attributes(start: &BytesStart<'_>) -> Result<Vec<(String, String)>> {
    start
        .attributes()
        .map(|attr| {
            let attr = attr?;
            let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
            let raw = std::str::from_utf8(&attr.value)?;
            let value = unescape(raw)
                .map_err(|e| GpxError::XmlAttribute(format!("{key}: {e}")))?
                .into_owned();
            Ok((key, value))
        })
        .collect()
}

/// Event writer that turns namespace URLs into the prefixes of a resolved
/// registry.
pub(crate) struct XmlOutput<'n> {
    writer: Writer<Vec<u8>>,
    namespaces: &'n NamespaceRegistry,
    default_namespace: &'static str,
}

impl<'n> XmlOutput<'n> {
    pub(crate) fn new(
        namespaces: &'n NamespaceRegistry,
        default_namespace: &'static str,
        indent: bool,
    ) -> Self {
        let writer = if indent {
            Writer::new_with_indent(Vec::new(), b' ', 2)
        } else {
            Writer::new(Vec::new())
        };
        Self {
            writer,
            namespaces,
            default_namespace,
        }
    }

    fn write(&mut self, event: Event<'_>) -> Result<()> {
        self.writer
            .write_event(event)
            .map_err(|e| GpxError::XmlWrite(e.to_string()))
    }

    pub(crate) fn declaration(&mut self) -> Result<()> {
        self.write(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
    }

    /// Attribute name: `prefix:local`, or the bare local name for no
    /// namespace. Unprefixed attributes never take the default namespace.
    pub(crate) fn attribute_name<'s>(&self, namespace: &str, local_name: &'s str) -> Cow<'s, str> {
        if namespace.is_empty() {
            return Cow::Borrowed(local_name);
        }
        match self.namespaces.prefix_for(namespace) {
            Some(prefix) => Cow::Owned(format!("{prefix}:{local_name}")),
            None => {
                warn!(namespace = %namespace, "no prefix registered, writing unqualified name");
                Cow::Borrowed(local_name)
            }
        }
    }

    /// `xmlns` declarations plus the document's extra root attributes.
    pub(crate) fn root_attributes(&self, extra: &[ExtensionAttr]) -> Vec<(String, String)> {
        let mut attrs = vec![("xmlns".to_string(), self.default_namespace.to_string())];
        attrs.extend(
            self.namespaces
                .iter()
                .map(|ns| (format!("xmlns:{}", ns.prefix), ns.url.clone())),
        );
        attrs.extend(extra.iter().map(|a| {
            (
                self.attribute_name(&a.namespace, &a.local_name).into_owned(),
                a.value.clone(),
            )
        }));
        attrs
    }

    pub(crate) fn open(&mut self, name: &str) -> Result<()> {
        self.write(Event::Start(BytesStart::new(name)))
    }

    pub(crate) fn open_with<K, V>(
        &mut self,
        name: &str,
        attrs: impl IntoIterator<Item = (K, V)>,
    ) -> Result<()>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut start = BytesStart::new(name);
        for (key, value) in attrs {
            start.push_attribute((key.as_ref(), value.as_ref()));
        }
        self.write(Event::Start(start))
    }

    pub(crate) fn close(&mut self, name: &str) -> Result<()> {
        self.write(Event::End(BytesEnd::new(name)))
    }

    /// `<name>text</name>`, skipped for empty text.
    pub(crate) fn text(&mut self, name: &str, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.open(name)?;
        self.write(Event::Text(BytesText::new(text)))?;
        self.close(name)
    }

    /// `<name>value</name>`, skipped when absent.
    pub(crate) fn value<T: WireValue>(&mut self, name: &str, value: &Nullable<T>) -> Result<()> {
        match value.format() {
            Some(text) => self.text(name, &text),
            None => Ok(()),
        }
    }

    /// Writes `<extensions>` with its subtree, or nothing when empty.
    pub(crate) fn extensions(&mut self, ext: &Extension) -> Result<()> {
        if ext.is_empty() {
            return Ok(());
        }
        self.open("extensions")?;
        let in_scope = self.default_namespace;
        for node in &ext.nodes {
            self.extension_node(node, in_scope)?;
        }
        self.close("extensions")
    }

    /// `in_scope` is the default namespace the node is written under. A node
    /// in that namespace is written bare, a node with a registered namespace
    /// gets its prefix, and any other node (including one with no namespace)
    /// redeclares the default with `xmlns`.
    fn extension_node(&mut self, node: &ExtensionNode, in_scope: &str) -> Result<()> {
        let mut attrs: Vec<(String, String)> = Vec::new();
        let (name, scope) = if node.namespace == in_scope {
            (node.local_name.clone(), in_scope)
        } else if let Some(prefix) = self.namespaces.prefix_for(&node.namespace) {
            (format!("{prefix}:{}", node.local_name), in_scope)
        } else {
            attrs.push(("xmlns".to_string(), node.namespace.clone()));
            (node.local_name.clone(), node.namespace.as_str())
        };
        attrs.extend(node.attrs.iter().map(|a| {
            (
                self.attribute_name(&a.namespace, &a.local_name).into_owned(),
                a.value.clone(),
            )
        }));
        if node.text.is_empty() && node.children.is_empty() {
            let mut empty = BytesStart::new(name.as_str());
            for (key, value) in &attrs {
                empty.push_attribute((key.as_str(), value.as_str()));
            }
            return self.write(Event::Empty(empty));
        }
        self.open_with(&name, attrs)?;
        if !node.text.is_empty() {
            self.write(Event::Text(BytesText::new(&node.text)))?;
        }
        for child in &node.children {
            self.extension_node(child, scope)?;
        }
        self.close(&name)
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}
