// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # XML tree boundary
//!
//! This crate never implements an XML parser, serializer, or DOM. Every
//! operation the driver and handlers need from the surrounding document —
//! node navigation, attribute lookup, text read/write, child creation, and
//! recovering a fresh document from a byte buffer — is expressed as the
//! [`XmlNode`] / [`XmlDocumentSource`] trait boundary below. A real
//! integration (e.g. an adapter over a concrete XML crate) lives outside
//! this crate; see `keyinfo-cli` for one such adapter used only for the
//! demo binary.

use std::fmt::Debug;

use crate::error::KeyInfoResult;

/// A handle to one element node in the surrounding XML document.
///
/// Implementations are expected to be cheap to clone (e.g. an index into an
/// arena, or a reference-counted pointer), since the driver passes nodes by
/// value while walking siblings and children.
pub trait XmlNode: Debug {
    /// The element's local name, e.g. `"KeyName"`.
    ///
    /// Returns an owned `String` rather than a borrowed `&str` so that
    /// implementations backed by interior mutability (arenas, `RefCell`
    /// trees) aren't forced to leak a borrow tied to `&self`.
    fn local_name(&self) -> String;

    /// The element's namespace URI, if any.
    fn namespace_uri(&self) -> Option<String>;

    /// Look up an attribute by local name (attributes are not namespaced in
    /// the schemas this crate dispatches over).
    fn attribute(&self, name: &str) -> Option<String>;

    /// The element's text content, concatenated across text node children.
    fn text(&self) -> String;

    /// Replace the element's text content, clearing any existing children.
    fn set_text(&mut self, value: &str);

    /// Element children, in document order, skipping comments/PIs/text.
    fn element_children(&self) -> Vec<Box<dyn XmlNode>>;

    /// `true` if the element has no element children (used to detect a
    /// pre-filled write template that a handler must leave untouched).
    fn is_empty_of_elements(&self) -> bool {
        self.element_children().is_empty()
    }

    /// Remove all children (used before a handler writes fresh content).
    fn clear_children(&mut self);

    /// Append a new, empty child element in the given namespace and return a
    /// handle to it.
    fn append_child_element(&mut self, local_name: &str, namespace_uri: &str) -> Box<dyn XmlNode>;

    /// Set or replace an attribute.
    fn set_attribute(&mut self, name: &str, value: &str);

    /// Clone this handle into an owned, independent `Box<dyn XmlNode>`.
    fn box_clone(&self) -> Box<dyn XmlNode>;
}

impl Clone for Box<dyn XmlNode> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Recovers a document from a byte buffer, as produced by the transform
/// pipeline or by decryption. Out of scope: implementing the actual parser.
/// `recover` mirrors xmlsec's tolerant "recover" parse mode, used for
/// re-parsing a retrieved document where a strict parse would be too
/// brittle against real-world key-distribution endpoints.
pub trait XmlDocumentSource: Debug {
    /// Parse `bytes` and return the document's root element.
    fn parse(&self, bytes: &[u8]) -> KeyInfoResult<Box<dyn XmlNode>>;

    /// Parse `bytes` tolerating recoverable errors (unknown entities,
    /// trailing garbage) and return the document's root element.
    fn parse_recover(&self, bytes: &[u8]) -> KeyInfoResult<Box<dyn XmlNode>>;
}
