// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Registry lookup façade (C2)
//!
//! A flat, ordered list of [`HandlerDescriptor`]s plus the [`KeyDataHandler`]
//! trait objects they describe. The registry itself — how descriptors get
//! registered at process start — is out of scope; only the two lookups the
//! driver and handlers need are implemented here: by (local name, namespace,
//! usage bit) and by (href URI, usage bit).

use std::fmt::Debug;
use std::sync::Arc;

use bitflags::bitflags;

use crate::context::KeyInfoCtx;
use crate::error::KeyInfoResult;
use crate::key::Key;
use crate::xml::XmlNode;

/// Stable identifier for a registered key-data handler (e.g. "RSAKeyValue",
/// "X509Data"). A compile-time registry slot, not a runtime entity id, so a
/// small newtype over `u32` is enough — see `DESIGN.md`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub u32);

bitflags! {
    /// Usage bits a handler may be selected under. Mirrors the four usage
    /// bits named in the data model: KeyInfo children, the two possible
    /// shapes of a RetrievalMethod result, and KeyValue children.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct KeyDataUsage: u8 {
        const KEYINFO_CHILD        = 0b0001;
        const RETRIEVAL_XML_RESULT = 0b0010;
        const RETRIEVAL_BIN_RESULT = 0b0100;
        const KEYVALUE_CHILD       = 0b1000;
    }
}

/// Read-only static metadata about a registered handler.
#[derive(Debug, Clone, Copy)]
pub struct HandlerDescriptor {
    pub id: HandlerId,
    pub name: &'static str,
    pub usage: KeyDataUsage,
    /// `Type`/href URI this handler answers to when resolving a
    /// `RetrievalMethod`'s declared type, if any.
    pub href: Option<&'static str>,
    pub data_node_localname: &'static str,
    pub data_node_namespace: &'static str,
}

/// A pluggable key-data handler: reads and/or writes one specific KeyInfo
/// child or key-data element. Every method is optional (default: not
/// supported for this handler) — the descriptor's capability is implied by
/// which methods a concrete implementation overrides.
pub trait KeyDataHandler: Debug + Send + Sync {
    fn descriptor(&self) -> &HandlerDescriptor;

    fn xml_read(
        &self,
        _node: &dyn XmlNode,
        _key: &mut Key,
        _ctx: &mut KeyInfoCtx,
    ) -> KeyInfoResult<()> {
        Ok(())
    }

    fn xml_write(
        &self,
        _node: &mut dyn XmlNode,
        _key: &Key,
        _ctx: &mut KeyInfoCtx,
    ) -> KeyInfoResult<()> {
        Ok(())
    }

    fn bin_read(&self, _data: &[u8], _key: &mut Key, _ctx: &mut KeyInfoCtx) -> KeyInfoResult<()> {
        Ok(())
    }

    fn bin_write(&self, _key: &Key, _ctx: &mut KeyInfoCtx) -> KeyInfoResult<Vec<u8>> {
        Ok(Vec::new())
    }

    /// Whether this handler supports writing a `KeyValue` child
    /// (`KeyValueNodeWrite` usage in the source material). Handlers that
    /// implement `xml_write` for a `KeyValue`-eligible data node override
    /// this to `true`.
    fn supports_key_value_write(&self) -> bool {
        false
    }
}

/// An ordered collection of registered handlers, consulted either directly
/// (the global registry) or through a caller-supplied allow-list
/// (`enabled_key_data`). The two are never merged: when the allow-list is
/// non-empty it alone is authoritative.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    handlers: Vec<Arc<dyn KeyDataHandler>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn KeyDataHandler>) {
        self.handlers.push(handler);
    }

    pub fn handlers(&self) -> &[Arc<dyn KeyDataHandler>] {
        &self.handlers
    }

    /// Resolve a handler by the element's local name and namespace, under
    /// the given usage bit. Local name matching is case-sensitive;
    /// namespace matching is an exact URI string comparison. First
    /// registered match wins.
    pub fn find_by_node(
        &self,
        local_name: &str,
        namespace_uri: Option<&str>,
        usage: KeyDataUsage,
    ) -> Option<Arc<dyn KeyDataHandler>> {
        self.handlers
            .iter()
            .find(|h| {
                let d = h.descriptor();
                d.usage.contains(usage)
                    && d.data_node_localname == local_name
                    && Some(d.data_node_namespace) == namespace_uri
            })
            .cloned()
    }

    /// Resolve a handler by its declared `href` (e.g. a `RetrievalMethod`
    /// `Type` attribute), under the given usage bit. First registered match
    /// wins.
    pub fn find_by_href(&self, href: &str, usage: KeyDataUsage) -> Option<Arc<dyn KeyDataHandler>> {
        self.handlers
            .iter()
            .find(|h| {
                let d = h.descriptor();
                d.usage.contains(usage) && d.href == Some(href)
            })
            .cloned()
    }
}

/// A caller-supplied allow-list of handler ids (`enabled_key_data`). When
/// present and non-empty it is authoritative: lookups are restricted to
/// these handlers regardless of what the global [`Registry`] holds.
#[derive(Debug, Clone, Default)]
pub struct EnabledKeyData {
    handlers: Vec<Arc<dyn KeyDataHandler>>,
}

impl EnabledKeyData {
    pub fn new(handlers: Vec<Arc<dyn KeyDataHandler>>) -> Self {
        Self { handlers }
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn find_by_node(
        &self,
        local_name: &str,
        namespace_uri: Option<&str>,
        usage: KeyDataUsage,
    ) -> Option<Arc<dyn KeyDataHandler>> {
        self.handlers
            .iter()
            .find(|h| {
                let d = h.descriptor();
                d.usage.contains(usage)
                    && d.data_node_localname == local_name
                    && Some(d.data_node_namespace) == namespace_uri
            })
            .cloned()
    }

    pub fn find_by_href(&self, href: &str, usage: KeyDataUsage) -> Option<Arc<dyn KeyDataHandler>> {
        self.handlers
            .iter()
            .find(|h| {
                let d = h.descriptor();
                d.usage.contains(usage) && d.href == Some(href)
            })
            .cloned()
    }
}
