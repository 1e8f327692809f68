//! Integration-level scenario suite (spec.md section 8's concrete
//! scenarios S1-S6), driven through `driver::read` against the built-in
//! handler registry and the in-memory fakes exposed behind `test-util`.

use std::sync::Arc;

use keyinfo_core::context::{KeyInfoCtxBuilder, KeyInfoFlags, Mode};
use keyinfo_core::encryption::{EncCtx, EncryptionEngine};
use keyinfo_core::error::{KeyInfoError, KeyInfoResult};
use keyinfo_core::handlers::default_registry;
use keyinfo_core::key::{Key, KeyMaterial};
use keyinfo_core::registry::HandlerId;
use keyinfo_core::testing::fakes::{FakeKeysManager, FakeNode, FakeTransformContext};
use keyinfo_core::xml::{XmlDocumentSource, XmlNode};
use keyinfo_core::driver;

const DSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";
const XENC_NS: &str = "http://www.w3.org/2001/04/xmlenc#";

#[derive(Debug)]
struct FixedXmlSource(FakeNode);

impl XmlDocumentSource for FixedXmlSource {
    fn parse(&self, _bytes: &[u8]) -> KeyInfoResult<Box<dyn XmlNode>> {
        Ok(Box::new(self.0.clone()))
    }
    fn parse_recover(&self, _bytes: &[u8]) -> KeyInfoResult<Box<dyn XmlNode>> {
        Ok(Box::new(self.0.clone()))
    }
}

/// S1. `<KeyInfo><KeyName>alice</KeyName></KeyInfo>` with a keys manager
/// containing alice -> a public key. Expected: name and value both set.
#[test]
fn s1_key_name_resolves_via_keys_manager() {
    let mut resolved = Key::new();
    resolved.set_value(KeyMaterial::new(HandlerId(42), vec![1u8, 2, 3]));
    let manager = FakeKeysManager::new().with_key("alice", resolved);

    let node = FakeNode::element("KeyInfo", None)
        .with_child(FakeNode::element("KeyName", Some(DSIG_NS)).with_text("alice"));

    let mut ctx = KeyInfoCtxBuilder::new(Mode::Read)
        .registry(Arc::new(default_registry()))
        .keys_manager(Arc::new(manager))
        .build();
    let mut key = Key::new();

    driver::read(&node, &mut key, &mut ctx).unwrap();

    assert_eq!(key.name(), Some("alice"));
    assert!(key.is_valid());
}

/// S2. `<KeyInfo><KeyName>   bob   </KeyName></KeyInfo>` with no keys
/// manager. Expected: name trimmed, no key material.
#[test]
fn s2_key_name_trims_without_keys_manager() {
    let node = FakeNode::element("KeyInfo", None)
        .with_child(FakeNode::element("KeyName", Some(DSIG_NS)).with_text("   bob   "));

    let mut ctx = KeyInfoCtxBuilder::new(Mode::Read)
        .registry(Arc::new(default_registry()))
        .build();
    let mut key = Key::new();

    driver::read(&node, &mut key, &mut ctx).unwrap();

    assert_eq!(key.name(), Some("bob"));
    assert!(!key.is_valid());
}

/// S3. A `RetrievalMethod` whose `Type` declares X509Data and whose fetched
/// document really is an X509Data. Expected: key resolves, level returns
/// to zero.
#[test]
fn s3_retrieval_method_resolves_declared_type() {
    let x509_descriptor = keyinfo_core::registry::HandlerDescriptor {
        id: HandlerId(300),
        name: "X509Data",
        usage: keyinfo_core::registry::KeyDataUsage::RETRIEVAL_XML_RESULT,
        href: Some("http://www.w3.org/2000/09/xmldsig#X509Data"),
        data_node_localname: "X509Data",
        data_node_namespace: DSIG_NS,
    };
    let x509_handler = Arc::new(keyinfo_core::testing::fakes::RecordingHandler::set_key_on_read(
        x509_descriptor,
    ));

    let mut registry = default_registry();
    registry.register(x509_handler);

    let fetched_root = FakeNode::element("X509Data", Some(DSIG_NS));
    let xml_source = Arc::new(FixedXmlSource(fetched_root));

    let node = FakeNode::element("KeyInfo", None).with_child(
        FakeNode::element("RetrievalMethod", Some(DSIG_NS))
            .with_attribute("URI", "#k1")
            .with_attribute("Type", "http://www.w3.org/2000/09/xmldsig#X509Data"),
    );

    let mut ctx = KeyInfoCtxBuilder::new(Mode::Read)
        .registry(Arc::new(registry))
        .retrieval_ctx(Box::new(FakeTransformContext::with_result(vec![1, 2, 3])))
        .xml_source(xml_source)
        .build();
    let mut key = Key::new();

    driver::read(&node, &mut key, &mut ctx).unwrap();

    assert!(key.is_valid());
    assert_eq!(ctx.cur_retrieval_level, 0);
}

/// S4. Same as S3 but the fetched document is an `RSAKeyValue` instead of
/// the declared `X509Data`. With `RETRMETHOD_STOP_ON_MISMATCH_HREF`:
/// failure. Without: success with the RSA key.
#[test]
fn s4_retrieval_method_type_mismatch() {
    let registry_with = |registry: &mut keyinfo_core::registry::Registry| {
        registry.register(Arc::new(keyinfo_core::testing::fakes::RecordingHandler::set_key_on_read(
            keyinfo_core::registry::HandlerDescriptor {
                id: HandlerId(300),
                name: "X509Data",
                usage: keyinfo_core::registry::KeyDataUsage::RETRIEVAL_XML_RESULT,
                href: Some("http://www.w3.org/2000/09/xmldsig#X509Data"),
                data_node_localname: "X509Data",
                data_node_namespace: DSIG_NS,
            },
        )));
        registry.register(Arc::new(keyinfo_core::testing::fakes::RecordingHandler::set_key_on_read(
            keyinfo_core::registry::HandlerDescriptor {
                id: HandlerId(301),
                name: "RSAKeyValue",
                usage: keyinfo_core::registry::KeyDataUsage::RETRIEVAL_XML_RESULT,
                href: Some("http://www.w3.org/2000/09/xmldsig#RSAKeyValue"),
                data_node_localname: "RSAKeyValue",
                data_node_namespace: DSIG_NS,
            },
        )));
    };

    let node = FakeNode::element("KeyInfo", None).with_child(
        FakeNode::element("RetrievalMethod", Some(DSIG_NS))
            .with_attribute("URI", "#k1")
            .with_attribute("Type", "http://www.w3.org/2000/09/xmldsig#X509Data"),
    );

    // With the mismatch flag set: failure.
    {
        let mut registry = default_registry();
        registry_with(&mut registry);
        let xml_source = Arc::new(FixedXmlSource(FakeNode::element("RSAKeyValue", Some(DSIG_NS))));
        let mut ctx = KeyInfoCtxBuilder::new(Mode::Read)
            .registry(Arc::new(registry))
            .retrieval_ctx(Box::new(FakeTransformContext::with_result(vec![1])))
            .xml_source(xml_source)
            .flags(KeyInfoFlags::RETRMETHOD_STOP_ON_MISMATCH_HREF)
            .build();
        let mut key = Key::new();

        let err = driver::read(&node, &mut key, &mut ctx).unwrap_err();
        assert!(matches!(err, KeyInfoError::RetrievalTypeMismatch { .. }));
    }

    // Without the flag: success with the RSA key.
    {
        let mut registry = default_registry();
        registry_with(&mut registry);
        let xml_source = Arc::new(FixedXmlSource(FakeNode::element("RSAKeyValue", Some(DSIG_NS))));
        let mut ctx = KeyInfoCtxBuilder::new(Mode::Read)
            .registry(Arc::new(registry))
            .retrieval_ctx(Box::new(FakeTransformContext::with_result(vec![1])))
            .xml_source(xml_source)
            .build();
        let mut key = Key::new();

        driver::read(&node, &mut key, &mut ctx).unwrap();
        assert!(key.is_valid());
        assert_eq!(key.handler_id(), Some(HandlerId(301)));
    }
}

/// S5. A `RetrievalMethod` whose fetched document contains another
/// `RetrievalMethod`, with `max_retrieval_level = 1`. Expected: failure with
/// `MaxRetrievalsLevel` once the inner hop is attempted.
#[test]
fn s5_retrieval_method_nesting_rejected_past_bound() {
    let inner_retrieval = FakeNode::element("RetrievalMethod", Some(DSIG_NS)).with_attribute("URI", "#k2");
    let xml_source = Arc::new(FixedXmlSource(inner_retrieval));

    let node = FakeNode::element("KeyInfo", None).with_child(
        FakeNode::element("RetrievalMethod", Some(DSIG_NS)).with_attribute("URI", "#k1"),
    );

    let mut ctx = KeyInfoCtxBuilder::new(Mode::Read)
        .registry(Arc::new(default_registry()))
        .retrieval_ctx(Box::new(FakeTransformContext::with_result(vec![9])))
        .xml_source(xml_source)
        .max_retrieval_level(1)
        .build();
    let mut key = Key::new();

    // The fetched inner document's root is itself a RetrievalMethod, so the
    // XML-result dispatch re-enters RetrievalMethodHandler::xml_read, which
    // is where the bound trips.
    let err = driver::read(&node, &mut key, &mut ctx).unwrap_err();
    assert!(matches!(err, KeyInfoError::MaxRetrievalsLevel { max: 1 }));
}

#[derive(Debug, Default, Clone)]
struct RecipientEngine;

impl EncryptionEngine for RecipientEngine {
    fn decrypt_to_buffer(&mut self, node: &dyn XmlNode, _enc_ctx: &mut EncCtx) -> KeyInfoResult<Option<Vec<u8>>> {
        let recipient = node.attribute("Recipient").unwrap_or_default();
        if recipient == "me" {
            Ok(Some(vec![1, 2, 3]))
        } else {
            Err(KeyInfoError::ExternalFailure("wrong recipient".to_string()))
        }
    }
    fn binary_encrypt(&mut self, _node: &mut dyn XmlNode, _plaintext: &[u8], _enc_ctx: &mut EncCtx) -> KeyInfoResult<()> {
        Ok(())
    }
    fn derived_key_generate(&mut self, _node: &dyn XmlNode, _enc_ctx: &mut EncCtx) -> KeyInfoResult<Option<Key>> {
        Ok(None)
    }
    fn agreement_method_generate(&mut self, _node: &dyn XmlNode, _enc_ctx: &mut EncCtx) -> KeyInfoResult<Option<Key>> {
        Ok(None)
    }
    fn agreement_method_xml_write(&mut self, _node: &mut dyn XmlNode, _enc_ctx: &mut EncCtx) -> KeyInfoResult<()> {
        Ok(())
    }
    fn copy_user_prefs_from(&mut self, _other: &dyn EncryptionEngine) {}
    fn fresh_clone(&self) -> Box<dyn EncryptionEngine> {
        Box::new(self.clone())
    }
}

fn symmetric_key_descriptor() -> keyinfo_core::registry::HandlerDescriptor {
    keyinfo_core::registry::HandlerDescriptor {
        id: HandlerId(400),
        name: "SymmetricKey",
        usage: keyinfo_core::registry::KeyDataUsage::RETRIEVAL_BIN_RESULT,
        href: None,
        data_node_localname: "SymmetricKey",
        data_node_namespace: XENC_NS,
    }
}

/// S6. Two `<EncryptedKey>` siblings, the first encrypted to a different
/// recipient. Default flags: the first failure is swallowed, the second
/// succeeds. `ENCKEY_DONT_STOP_ON_FAILED_DECRYPTION`: fails on the first.
#[test]
fn s6_encrypted_key_siblings_default_swallows_first_failure() {
    let target = Arc::new(keyinfo_core::testing::fakes::RecordingHandler::set_key_on_read(
        symmetric_key_descriptor(),
    ));
    let mut registry = default_registry();
    registry.register(target.clone());

    let node = FakeNode::element("KeyInfo", None)
        .with_child(
            FakeNode::element("EncryptedKey", Some(XENC_NS)).with_attribute("Recipient", "someone-else"),
        )
        .with_child(FakeNode::element("EncryptedKey", Some(XENC_NS)).with_attribute("Recipient", "me"));

    let mut ctx = KeyInfoCtxBuilder::new(Mode::Read)
        .registry(Arc::new(registry))
        .encryption_engine(Box::new(RecipientEngine::default()))
        .build();
    ctx.key_req.expected_handler = Some(HandlerId(400));
    let mut key = Key::new();

    driver::read(&node, &mut key, &mut ctx).unwrap();

    assert!(key.is_valid());
    assert_eq!(target.read_count(), 1);
}

#[test]
fn s6_encrypted_key_siblings_fails_fast_when_flagged() {
    let target = Arc::new(keyinfo_core::testing::fakes::RecordingHandler::set_key_on_read(
        symmetric_key_descriptor(),
    ));
    let mut registry = default_registry();
    registry.register(target);

    let node = FakeNode::element("KeyInfo", None)
        .with_child(
            FakeNode::element("EncryptedKey", Some(XENC_NS)).with_attribute("Recipient", "someone-else"),
        )
        .with_child(FakeNode::element("EncryptedKey", Some(XENC_NS)).with_attribute("Recipient", "me"));

    let mut ctx = KeyInfoCtxBuilder::new(Mode::Read)
        .registry(Arc::new(registry))
        .encryption_engine(Box::new(RecipientEngine::default()))
        .flags(KeyInfoFlags::ENCKEY_DONT_STOP_ON_FAILED_DECRYPTION)
        .build();
    ctx.key_req.expected_handler = Some(HandlerId(400));
    let mut key = Key::new();

    let err = driver::read(&node, &mut key, &mut ctx).unwrap_err();
    assert!(matches!(err, KeyInfoError::DecryptionFailed(_)));
}
