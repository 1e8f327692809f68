// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # `quick-xml`-backed `XmlNode` / `XmlDocumentSource` adapter
//!
//! `keyinfo-core` treats the XML tree as a trait boundary; this module is
//! the one concrete implementation of that boundary this repository ships,
//! used only by the demo binary. It builds an owned, mutable, reference
//! counted element tree from a `quick_xml` event stream, since the driver
//! needs live, cheaply-clonable node handles rather than borrowed `roxmltree`
//! style nodes.

use std::cell::RefCell;
use std::rc::Rc;

use keyinfo_core::error::{KeyInfoError, KeyInfoResult};
use keyinfo_core::xml::{XmlDocumentSource, XmlNode};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

#[derive(Debug, Default)]
struct DomNodeData {
    local_name: String,
    namespace_uri: Option<String>,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<DomNode>,
}

/// A handle into a shared, mutable element tree. Cloning shares the
/// underlying node, matching the live-handle contract `XmlNode` documents.
#[derive(Debug, Clone)]
pub struct DomNode(Rc<RefCell<DomNodeData>>);

impl DomNode {
    fn new(local_name: &str, namespace_uri: Option<String>) -> Self {
        DomNode(Rc::new(RefCell::new(DomNodeData {
            local_name: local_name.to_string(),
            namespace_uri,
            ..Default::default()
        })))
    }

    /// Re-serialize this subtree as a `quick_xml`-compatible UTF-8 byte
    /// buffer. Namespaces are re-declared on every element rather than
    /// hoisted, which is verbose but always well-formed.
    pub fn to_xml_bytes(&self) -> KeyInfoResult<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        write_node(&mut writer, self)
            .map_err(|err| KeyInfoError::ExternalFailure(err.to_string()))?;
        Ok(writer.into_inner())
    }
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &DomNode) -> quick_xml::Result<()> {
    use quick_xml::events::{BytesEnd, BytesText};

    let data = node.0.borrow();
    let mut start = BytesStart::new(data.local_name.clone());
    if let Some(ns) = &data.namespace_uri {
        start.push_attribute(("xmlns", ns.as_str()));
    }
    for (name, value) in &data.attributes {
        start.push_attribute((name.as_str(), value.as_str()));
    }

    if data.children.is_empty() && data.text.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    if !data.text.is_empty() {
        writer.write_event(Event::Text(BytesText::new(&data.text)))?;
    }
    for child in &data.children {
        write_node(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(data.local_name.clone())))?;
    Ok(())
}

impl XmlNode for DomNode {
    fn local_name(&self) -> String {
        self.0.borrow().local_name.clone()
    }

    fn namespace_uri(&self) -> Option<String> {
        self.0.borrow().namespace_uri.clone()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.0
            .borrow()
            .attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    fn text(&self) -> String {
        self.0.borrow().text.clone()
    }

    fn set_text(&mut self, value: &str) {
        let mut data = self.0.borrow_mut();
        data.text = value.to_string();
        data.children.clear();
    }

    fn element_children(&self) -> Vec<Box<dyn XmlNode>> {
        self.0
            .borrow()
            .children
            .iter()
            .cloned()
            .map(|c| Box::new(c) as Box<dyn XmlNode>)
            .collect()
    }

    fn clear_children(&mut self) {
        self.0.borrow_mut().children.clear();
    }

    fn append_child_element(&mut self, local_name: &str, namespace_uri: &str) -> Box<dyn XmlNode> {
        let child = DomNode::new(local_name, Some(namespace_uri.to_string()));
        self.0.borrow_mut().children.push(child.clone());
        Box::new(child)
    }

    fn set_attribute(&mut self, name: &str, value: &str) {
        let mut data = self.0.borrow_mut();
        if let Some(existing) = data.attributes.iter_mut().find(|(n, _)| n == name) {
            existing.1 = value.to_string();
        } else {
            data.attributes.push((name.to_string(), value.to_string()));
        }
    }

    fn box_clone(&self) -> Box<dyn XmlNode> {
        Box::new(self.clone())
    }
}

/// One namespace scope: a stack of (prefix, uri) declarations visible at the
/// current depth. `None` prefix is the default namespace.
#[derive(Debug, Clone, Default)]
struct NsScope {
    default: Option<String>,
    prefixed: Vec<(String, String)>,
}

impl NsScope {
    fn resolve(&self, prefix: Option<&str>) -> Option<String> {
        match prefix {
            None => self.default.clone(),
            Some(p) => self.prefixed.iter().find(|(n, _)| n == p).map(|(_, u)| u.clone()),
        }
    }
}

fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qname),
    }
}

fn parse_start(
    start: &BytesStart,
    parent_scope: &NsScope,
) -> quick_xml::Result<(DomNode, Vec<(String, String)>, NsScope)> {
    let mut scope = parent_scope.clone();
    let mut regular_attrs = Vec::new();

    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        if key == "xmlns" {
            scope.default = Some(value);
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            scope.prefixed.push((prefix.to_string(), value));
        } else {
            regular_attrs.push((key, value));
        }
    }

    let qname = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let (prefix, local) = split_qname(&qname);
    let namespace_uri = scope.resolve(prefix);

    Ok((DomNode::new(local, namespace_uri), regular_attrs, scope))
}

/// Parse a byte buffer into a [`DomNode`] tree rooted at the document's
/// single root element. Comments, processing instructions, and DOCTYPE
/// declarations are skipped; mixed content collapses to the element's text.
pub fn parse_bytes(bytes: &[u8]) -> KeyInfoResult<DomNode> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text = true;

    let mut stack: Vec<(DomNode, NsScope)> = Vec::new();
    let mut root: Option<DomNode> = None;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|err| KeyInfoError::ExternalFailure(err.to_string()))?;

        match event {
            Event::Start(start) => {
                let parent_scope = stack.last().map(|(_, s)| s.clone()).unwrap_or_default();
                let (node, attrs, scope) = parse_start(&start, &parent_scope)
                    .map_err(|err| KeyInfoError::ExternalFailure(err.to_string()))?;
                for (k, v) in attrs {
                    node.0.borrow_mut().attributes.push((k, v));
                }
                if let Some((parent, _)) = stack.last() {
                    parent.0.borrow_mut().children.push(node.clone());
                } else {
                    root = Some(node.clone());
                }
                stack.push((node, scope));
            }
            Event::Empty(start) => {
                let parent_scope = stack.last().map(|(_, s)| s.clone()).unwrap_or_default();
                let (node, attrs, _scope) = parse_start(&start, &parent_scope)
                    .map_err(|err| KeyInfoError::ExternalFailure(err.to_string()))?;
                for (k, v) in attrs {
                    node.0.borrow_mut().attributes.push((k, v));
                }
                if let Some((parent, _)) = stack.last() {
                    parent.0.borrow_mut().children.push(node.clone());
                } else {
                    root = Some(node.clone());
                }
            }
            Event::Text(text) => {
                if let Some((current, _)) = stack.last() {
                    let decoded = text
                        .unescape()
                        .map_err(|err| KeyInfoError::ExternalFailure(err.to_string()))?;
                    current.0.borrow_mut().text.push_str(&decoded);
                }
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    root.ok_or_else(|| KeyInfoError::InvalidKeyData("document has no root element".to_string()))
}

/// [`XmlDocumentSource`] backed by [`parse_bytes`]. `parse_recover` is no
/// more lenient than `parse`; a stricter tolerant mode is out of scope for
/// this demo adapter.
#[derive(Debug, Default)]
pub struct QuickXmlSource;

impl XmlDocumentSource for QuickXmlSource {
    fn parse(&self, bytes: &[u8]) -> KeyInfoResult<Box<dyn XmlNode>> {
        Ok(Box::new(parse_bytes(bytes)?))
    }

    fn parse_recover(&self, bytes: &[u8]) -> KeyInfoResult<Box<dyn XmlNode>> {
        Ok(Box::new(parse_bytes(bytes)?))
    }
}
