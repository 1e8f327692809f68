// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # KeyName handler (C4)
//!
//! Reads or writes a key identifier string, consulting the keys manager on
//! read.

use tracing::debug;

use crate::context::KeyInfoCtx;
use crate::error::{KeyInfoError, KeyInfoResult};
use crate::key::Key;
use crate::registry::{HandlerDescriptor, HandlerId, KeyDataHandler, KeyDataUsage};
use crate::xml::XmlNode;

pub const KEY_NAME_HANDLER_ID: HandlerId = HandlerId(1);

pub const KEY_NAME_DESCRIPTOR: HandlerDescriptor = HandlerDescriptor {
    id: KEY_NAME_HANDLER_ID,
    name: "KeyName",
    usage: KeyDataUsage::KEYINFO_CHILD,
    href: None,
    data_node_localname: "KeyName",
    data_node_namespace: "http://www.w3.org/2000/09/xmldsig#",
};

#[derive(Debug, Default)]
pub struct KeyNameHandler;

impl KeyDataHandler for KeyNameHandler {
    fn descriptor(&self) -> &HandlerDescriptor {
        &KEY_NAME_DESCRIPTOR
    }

    fn xml_read(&self, node: &dyn XmlNode, key: &mut Key, ctx: &mut KeyInfoCtx) -> KeyInfoResult<()> {
        let name = node.text();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(KeyInfoError::InvalidKeyData("KeyName content is empty".to_string()));
        }

        if !key.is_valid() {
            if let Some(keys_manager) = &ctx.keys_manager {
                if let Some(found) = keys_manager.find_key(trimmed, &ctx.key_req) {
                    debug!(name = trimmed, "keys manager resolved KeyName");
                    key.empty();
                    key.copy_from(&found);
                    key.set_name(trimmed);
                    return Ok(());
                }
                // Miss: the name may still be validated elsewhere, continue.
            }
        }

        match key.name() {
            Some(existing) if existing != trimmed => {
                Err(KeyInfoError::InvalidKeyData(format!(
                    "KeyName mismatch: existing name {existing:?}, new name {trimmed:?}"
                )))
            }
            Some(_) => Ok(()),
            None => {
                key.set_name(trimmed);
                Ok(())
            }
        }
    }

    fn xml_write(&self, node: &mut dyn XmlNode, key: &Key, _ctx: &mut KeyInfoCtx) -> KeyInfoResult<()> {
        // Sentinel "skip" behaviors preserved from the source material:
        // no name to write, and a pre-filled template, are both successful
        // no-ops rather than errors.
        let Some(name) = key.name() else {
            return Ok(());
        };
        if !node.is_empty_of_elements() || !node.text().is_empty() {
            return Ok(());
        }
        node.set_text(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{KeyInfoCtxBuilder, Mode};
    use crate::testing::fakes::{FakeKeysManager, FakeNode};
    use std::sync::Arc;

    /// S1: KeyName resolves via keys manager.
    #[test]
    fn key_name_resolves_via_keys_manager() {
        let mut resolved = Key::new();
        resolved.set_value(crate::key::KeyMaterial::new(HandlerId(42), vec![1u8, 2, 3]));

        let manager = FakeKeysManager::new().with_key("alice", resolved);
        let mut ctx = KeyInfoCtxBuilder::new(Mode::Read)
            .keys_manager(Arc::new(manager))
            .build();

        let node = FakeNode::element("KeyName", Some(KEY_NAME_DESCRIPTOR.data_node_namespace))
            .with_text("alice");
        let mut key = Key::new();

        KeyNameHandler.xml_read(&node, &mut key, &mut ctx).unwrap();

        assert_eq!(key.name(), Some("alice"));
        assert!(key.is_valid());
        assert_eq!(key.handler_id(), Some(HandlerId(42)));
    }

    /// S2: KeyName with whitespace and no keys manager just trims.
    #[test]
    fn key_name_trims_without_keys_manager() {
        let mut ctx = KeyInfoCtxBuilder::new(Mode::Read).build();
        let node = FakeNode::element("KeyName", Some(KEY_NAME_DESCRIPTOR.data_node_namespace))
            .with_text("   bob   ");
        let mut key = Key::new();

        KeyNameHandler.xml_read(&node, &mut key, &mut ctx).unwrap();

        assert_eq!(key.name(), Some("bob"));
        assert!(!key.is_valid());
    }

    #[test]
    fn key_name_empty_is_error() {
        let mut ctx = KeyInfoCtxBuilder::new(Mode::Read).build();
        let node = FakeNode::element("KeyName", Some(KEY_NAME_DESCRIPTOR.data_node_namespace))
            .with_text("   ");
        let mut key = Key::new();

        let err = KeyNameHandler.xml_read(&node, &mut key, &mut ctx).unwrap_err();
        assert!(matches!(err, KeyInfoError::InvalidKeyData(_)));
    }

    #[test]
    fn key_name_mismatch_errors() {
        let mut ctx = KeyInfoCtxBuilder::new(Mode::Read).build();
        let node = FakeNode::element("KeyName", Some(KEY_NAME_DESCRIPTOR.data_node_namespace))
            .with_text("carol");
        let mut key = Key::new();
        key.set_name("dave");

        let err = KeyNameHandler.xml_read(&node, &mut key, &mut ctx).unwrap_err();
        assert!(matches!(err, KeyInfoError::InvalidKeyData(_)));
    }

    #[test]
    fn key_name_write_no_name_is_noop() {
        let mut ctx = KeyInfoCtxBuilder::new(Mode::Write).build();
        let mut node = FakeNode::element("KeyName", Some(KEY_NAME_DESCRIPTOR.data_node_namespace));
        let key = Key::new();

        KeyNameHandler.xml_write(&mut node, &key, &mut ctx).unwrap();
        assert!(node.text().is_empty());
    }

    #[test]
    fn key_name_write_serializes_name() {
        let mut ctx = KeyInfoCtxBuilder::new(Mode::Write).build();
        let mut node = FakeNode::element("KeyName", Some(KEY_NAME_DESCRIPTOR.data_node_namespace));
        let mut key = Key::new();
        key.set_name("erin");

        KeyNameHandler.xml_write(&mut node, &key, &mut ctx).unwrap();
        assert_eq!(node.text(), "erin");
    }

    #[test]
    fn key_name_write_prefilled_template_is_noop() {
        let mut ctx = KeyInfoCtxBuilder::new(Mode::Write).build();
        let mut node = FakeNode::element("KeyName", Some(KEY_NAME_DESCRIPTOR.data_node_namespace))
            .with_text("preset");
        let mut key = Key::new();
        key.set_name("erin");

        KeyNameHandler.xml_write(&mut node, &key, &mut ctx).unwrap();
        assert_eq!(node.text(), "preset");
    }
}
