// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # KeyInfoReference handler (C7)
//!
//! Simpler sibling of `RetrievalMethod`: no transform chain, the fetched
//! result must itself be (or be rooted at) a `<KeyInfo>` element, which is
//! then walked recursively by the driver.

use tracing::debug;

use crate::context::KeyInfoCtx;
use crate::driver;
use crate::error::{KeyInfoError, KeyInfoResult};
use crate::key::Key;
use crate::registry::{HandlerDescriptor, HandlerId, KeyDataHandler, KeyDataUsage};
use crate::xml::XmlNode;

pub const KEYINFO_REFERENCE_HANDLER_ID: HandlerId = HandlerId(4);
const DSIG11_NS: &str = "http://www.w3.org/2009/xmldsig11#";

pub const KEYINFO_REFERENCE_DESCRIPTOR: HandlerDescriptor = HandlerDescriptor {
    id: KEYINFO_REFERENCE_HANDLER_ID,
    name: "KeyInfoReference",
    usage: KeyDataUsage::KEYINFO_CHILD,
    href: None,
    data_node_localname: "KeyInfoReference",
    data_node_namespace: DSIG11_NS,
};

#[derive(Debug, Default)]
pub struct KeyInfoReferenceHandler;

impl KeyDataHandler for KeyInfoReferenceHandler {
    fn descriptor(&self) -> &HandlerDescriptor {
        &KEYINFO_REFERENCE_DESCRIPTOR
    }

    fn xml_read(&self, node: &dyn XmlNode, key: &mut Key, ctx: &mut KeyInfoCtx) -> KeyInfoResult<()> {
        if ctx.cur_keyinfo_ref_level >= ctx.max_keyinfo_ref_level {
            return Err(KeyInfoError::MaxKeyInfoRefLevel {
                max: ctx.max_keyinfo_ref_level,
            });
        }
        ctx.cur_keyinfo_ref_level += 1;

        let outcome = read_body(node, key, ctx);

        if outcome.is_ok() {
            ctx.cur_keyinfo_ref_level -= 1;
        }
        outcome
    }

    fn xml_write(&self, _node: &mut dyn XmlNode, _key: &Key, _ctx: &mut KeyInfoCtx) -> KeyInfoResult<()> {
        // Deliberate no-op, same rationale as RetrievalMethod::xml_write.
        Ok(())
    }
}

fn read_body(node: &dyn XmlNode, key: &mut Key, ctx: &mut KeyInfoCtx) -> KeyInfoResult<()> {
    if !node.is_empty_of_elements() {
        return Err(KeyInfoError::InvalidKeyData(
            "KeyInfoReference must have no element children".to_string(),
        ));
    }

    let uri = node
        .attribute("URI")
        .ok_or_else(|| KeyInfoError::InvalidKeyData("KeyInfoReference missing URI attribute".to_string()))?;

    let keyinfo_ref_ctx = ctx
        .keyinfo_ref_ctx
        .as_mut()
        .ok_or_else(|| KeyInfoError::ExternalFailure("no KeyInfoReference transform context configured".to_string()))?;
    keyinfo_ref_ctx.reset();
    keyinfo_ref_ctx.set_uri(&uri)?;
    keyinfo_ref_ctx.execute(node)?;

    let buffer = ctx
        .keyinfo_ref_ctx
        .as_ref()
        .and_then(|rc| rc.result())
        .map(|bytes| bytes.to_vec())
        .filter(|b| !b.is_empty())
        .ok_or(KeyInfoError::EmptyTransformResult)?;

    let xml_source = ctx
        .xml_source
        .clone()
        .ok_or_else(|| KeyInfoError::ExternalFailure("no XML document source configured".to_string()))?;
    let root = xml_source.parse_recover(&buffer)?;

    let is_keyinfo_root = root.local_name() == "KeyInfo";
    let keyinfo_root: Box<dyn XmlNode> = if is_keyinfo_root {
        root
    } else {
        root.element_children()
            .into_iter()
            .find(|c| c.local_name() == "KeyInfo")
            .ok_or_else(|| KeyInfoError::InvalidKeyData("invalid node: KeyInfoReference result has no KeyInfo root".to_string()))?
    };

    debug!("recursing into fetched KeyInfo via KeyInfoReference");
    driver::read(keyinfo_root.as_ref(), key, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{KeyInfoCtxBuilder, Mode};
    use crate::testing::fakes::{FakeNode, FakeTransformContext};
    use std::sync::Arc;

    #[derive(Debug)]
    struct FixedXmlSource(FakeNode);

    impl crate::xml::XmlDocumentSource for FixedXmlSource {
        fn parse(&self, _bytes: &[u8]) -> KeyInfoResult<Box<dyn XmlNode>> {
            Ok(Box::new(self.0.clone()))
        }
        fn parse_recover(&self, _bytes: &[u8]) -> KeyInfoResult<Box<dyn XmlNode>> {
            Ok(Box::new(self.0.clone()))
        }
    }

    #[test]
    fn resolves_nested_keyinfo_and_decrements_level() {
        let nested = FakeNode::element("KeyInfo", None)
            .with_child(FakeNode::element("KeyName", Some("http://www.w3.org/2000/09/xmldsig#")).with_text("alice"));
        let xml_source = Arc::new(FixedXmlSource(nested));

        let node = FakeNode::element("KeyInfoReference", Some(DSIG11_NS)).with_attribute("URI", "#ref1");
        let mut ctx = KeyInfoCtxBuilder::new(Mode::Read)
            .keyinfo_ref_ctx(Box::new(FakeTransformContext::with_result(vec![1])))
            .xml_source(xml_source)
            .registry(Arc::new({
                let mut r = crate::registry::Registry::new();
                r.register(Arc::new(crate::handlers::key_name::KeyNameHandler));
                r
            }))
            .build();
        let mut key = Key::new();

        KeyInfoReferenceHandler.xml_read(&node, &mut key, &mut ctx).unwrap();

        assert_eq!(key.name(), Some("alice"));
        assert_eq!(ctx.cur_keyinfo_ref_level, 0);
    }

    #[test]
    fn non_empty_elements_is_error() {
        let node = FakeNode::element("KeyInfoReference", Some(DSIG11_NS))
            .with_attribute("URI", "#ref1")
            .with_child(FakeNode::element("Bogus", None));
        let mut ctx = KeyInfoCtxBuilder::new(Mode::Read).build();
        let mut key = Key::new();

        let err = KeyInfoReferenceHandler.xml_read(&node, &mut key, &mut ctx).unwrap_err();
        assert!(matches!(err, KeyInfoError::InvalidKeyData(_)));
    }

    #[test]
    fn missing_uri_is_error() {
        let node = FakeNode::element("KeyInfoReference", Some(DSIG11_NS));
        let mut ctx = KeyInfoCtxBuilder::new(Mode::Read).build();
        let mut key = Key::new();

        let err = KeyInfoReferenceHandler.xml_read(&node, &mut key, &mut ctx).unwrap_err();
        assert!(matches!(err, KeyInfoError::InvalidKeyData(_)));
    }

    #[test]
    fn max_level_rejects() {
        let node = FakeNode::element("KeyInfoReference", Some(DSIG11_NS)).with_attribute("URI", "#ref1");
        let mut ctx = KeyInfoCtxBuilder::new(Mode::Read).max_keyinfo_ref_level(1).build();
        ctx.cur_keyinfo_ref_level = 1;
        let mut key = Key::new();

        let err = KeyInfoReferenceHandler.xml_read(&node, &mut key, &mut ctx).unwrap_err();
        assert!(matches!(err, KeyInfoError::MaxKeyInfoRefLevel { max: 1 }));
    }

    #[test]
    fn non_keyinfo_root_without_nested_keyinfo_is_invalid() {
        let other_root = FakeNode::element("SomethingElse", None);
        let xml_source = Arc::new(FixedXmlSource(other_root));

        let node = FakeNode::element("KeyInfoReference", Some(DSIG11_NS)).with_attribute("URI", "#ref1");
        let mut ctx = KeyInfoCtxBuilder::new(Mode::Read)
            .keyinfo_ref_ctx(Box::new(FakeTransformContext::with_result(vec![1])))
            .xml_source(xml_source)
            .build();
        let mut key = Key::new();

        let err = KeyInfoReferenceHandler.xml_read(&node, &mut key, &mut ctx).unwrap_err();
        assert!(matches!(err, KeyInfoError::InvalidKeyData(_)));
    }
}
