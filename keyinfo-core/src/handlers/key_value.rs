// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # KeyValue handler (C5)
//!
//! Dispatches to exactly one inner key-material element (e.g.
//! `RSAKeyValue`), registered under the `KEYVALUE_CHILD` usage bit.

use tracing::{debug, warn};

use crate::context::KeyInfoCtx;
use crate::error::{KeyInfoError, KeyInfoResult};
use crate::key::Key;
use crate::registry::{HandlerDescriptor, HandlerId, KeyDataHandler, KeyDataUsage};
use crate::xml::XmlNode;

pub const KEY_VALUE_HANDLER_ID: HandlerId = HandlerId(2);
const DSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

pub const KEY_VALUE_DESCRIPTOR: HandlerDescriptor = HandlerDescriptor {
    id: KEY_VALUE_HANDLER_ID,
    name: "KeyValue",
    usage: KeyDataUsage::KEYINFO_CHILD,
    href: None,
    data_node_localname: "KeyValue",
    data_node_namespace: DSIG_NS,
};

#[derive(Debug, Default)]
pub struct KeyValueHandler;

impl KeyDataHandler for KeyValueHandler {
    fn descriptor(&self) -> &HandlerDescriptor {
        &KEY_VALUE_DESCRIPTOR
    }

    fn xml_read(&self, node: &dyn XmlNode, key: &mut Key, ctx: &mut KeyInfoCtx) -> KeyInfoResult<()> {
        let children = node.element_children();
        let Some(inner) = children.first() else {
            return Ok(());
        };
        if children.len() > 1 {
            return Err(KeyInfoError::InvalidKeyData(
                "KeyValue has more than one element child".to_string(),
            ));
        }

        let local_name = inner.local_name();
        let namespace_uri = inner.namespace_uri();

        match ctx.resolve_by_node(&local_name, namespace_uri.as_deref(), KeyDataUsage::KEYVALUE_CHILD) {
            Some(handler) => {
                debug!(handler = handler.descriptor().name, %local_name, "dispatching KeyValue child");
                handler.xml_read(inner.as_ref(), key, ctx)
            }
            None => {
                if ctx.flags.contains(crate::context::KeyInfoFlags::KEYVALUE_STOP_ON_UNKNOWN_CHILD) {
                    warn!(%local_name, "unknown KeyValue child, KEYVALUE_STOP_ON_UNKNOWN_CHILD set");
                    Err(KeyInfoError::UnknownKeyDataChild(local_name))
                } else {
                    debug!(%local_name, "ignoring unknown KeyValue child");
                    Ok(())
                }
            }
        }
    }

    fn xml_write(&self, node: &mut dyn XmlNode, key: &Key, ctx: &mut KeyInfoCtx) -> KeyInfoResult<()> {
        let Some(value) = key.value() else {
            return Ok(());
        };
        let Some(value_handler) = ctx.registry.handlers().iter().find(|h| h.descriptor().id == value.handler_id) else {
            return Ok(());
        };
        if !value_handler.supports_key_value_write() {
            return Ok(());
        }
        if let Some(allow_list) = &ctx.enabled_key_data {
            if !allow_list.is_empty() && allow_list.find_by_node(
                value_handler.descriptor().data_node_localname,
                Some(value_handler.descriptor().data_node_namespace),
                KeyDataUsage::KEYVALUE_CHILD,
            ).is_none() {
                return Ok(());
            }
        }
        if !ctx.key_req.matches(key) {
            return Ok(());
        }

        node.clear_children();
        let descriptor = value_handler.descriptor();
        let mut child = node.append_child_element(descriptor.data_node_localname, descriptor.data_node_namespace);
        value_handler.xml_write(child.as_mut(), key, ctx)
    }
}
