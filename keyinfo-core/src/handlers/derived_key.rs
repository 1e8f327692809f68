// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # DerivedKey handler (C9, half 1)
//!
//! Delegates to the encryption engine's key-derivation operation and
//! adopts the result only if it satisfies the caller's current
//! requirement; a non-matching or failed derivation is discarded rather
//! than treated as fatal, since a sibling element may still succeed.

use tracing::{debug, warn};

use crate::context::{KeyInfoCtx, KeyInfoFlags};
use crate::error::{KeyInfoError, KeyInfoResult};
use crate::key::Key;
use crate::registry::{HandlerDescriptor, HandlerId, KeyDataHandler, KeyDataUsage};
use crate::xml::XmlNode;

pub const DERIVED_KEY_HANDLER_ID: HandlerId = HandlerId(6);
const XENC11_NS: &str = "http://www.w3.org/2009/xmlenc11#";

pub const DERIVED_KEY_DESCRIPTOR: HandlerDescriptor = HandlerDescriptor {
    id: DERIVED_KEY_HANDLER_ID,
    name: "DerivedKey",
    usage: KeyDataUsage::KEYINFO_CHILD,
    href: None,
    data_node_localname: "DerivedKey",
    data_node_namespace: XENC11_NS,
};

#[derive(Debug, Default)]
pub struct DerivedKeyHandler;

impl KeyDataHandler for DerivedKeyHandler {
    fn descriptor(&self) -> &HandlerDescriptor {
        &DERIVED_KEY_DESCRIPTOR
    }

    fn xml_read(&self, node: &dyn XmlNode, key: &mut Key, ctx: &mut KeyInfoCtx) -> KeyInfoResult<()> {
        if ctx.cur_encrypted_key_level >= ctx.max_encrypted_key_level {
            return Err(KeyInfoError::MaxEncryptedKeyLevel {
                max: ctx.max_encrypted_key_level,
            });
        }
        ctx.cur_encrypted_key_level += 1;

        let outcome = read_body(node, key, ctx);

        if outcome.is_ok() {
            ctx.cur_encrypted_key_level -= 1;
        }
        outcome
    }

    fn xml_write(&self, _node: &mut dyn XmlNode, _key: &Key, _ctx: &mut KeyInfoCtx) -> KeyInfoResult<()> {
        // No-op: the DerivedKey template is assumed complete already.
        Ok(())
    }
}

fn read_body(node: &dyn XmlNode, key: &mut Key, ctx: &mut KeyInfoCtx) -> KeyInfoResult<()> {
    ctx.ensure_or_reset_enc_ctx()?;

    let derived = {
        let enc_ctx = ctx.enc_ctx.as_mut().expect("ensure_or_reset_enc_ctx just created it");
        enc_ctx.with_engine(|engine, enc_ctx| engine.derived_key_generate(node, enc_ctx))
    };

    let derived = match derived {
        Ok(Some(k)) => k,
        Ok(None) => {
            debug!("DerivedKey generation yielded no key");
            return Ok(());
        }
        Err(err) => {
            if ctx.flags.contains(KeyInfoFlags::ENCKEY_DONT_STOP_ON_FAILED_DECRYPTION) {
                warn!(error = %err, "DerivedKey generation failed, propagating per policy flag");
                return Err(KeyInfoError::DecryptionFailed(err.to_string()));
            }
            debug!(error = %err, "DerivedKey generation failed, swallowing per default policy");
            return Ok(());
        }
    };

    if !ctx.key_req.matches(&derived) {
        debug!("derived key does not satisfy the current requirement, discarding");
        return Ok(());
    }

    key.copy_from(&derived);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{KeyInfoCtxBuilder, Mode};
    use crate::encryption::EncCtx;
    use crate::key::{KeyMaterial, KeyRequirement};
    use crate::registry::HandlerId as HId;
    use crate::testing::fakes::FakeNode;

    #[derive(Debug, Default, Clone)]
    struct FakeEngine {
        derived: Option<Key>,
        fail: bool,
    }

    impl crate::encryption::EncryptionEngine for FakeEngine {
        fn decrypt_to_buffer(&mut self, _node: &dyn XmlNode, _enc_ctx: &mut EncCtx) -> KeyInfoResult<Option<Vec<u8>>> {
            Ok(None)
        }
        fn binary_encrypt(&mut self, _node: &mut dyn XmlNode, _plaintext: &[u8], _enc_ctx: &mut EncCtx) -> KeyInfoResult<()> {
            Ok(())
        }
        fn derived_key_generate(&mut self, _node: &dyn XmlNode, _enc_ctx: &mut EncCtx) -> KeyInfoResult<Option<Key>> {
            if self.fail {
                return Err(KeyInfoError::ExternalFailure("derivation failed".to_string()));
            }
            Ok(self.derived.clone())
        }
        fn agreement_method_generate(&mut self, _node: &dyn XmlNode, _enc_ctx: &mut EncCtx) -> KeyInfoResult<Option<Key>> {
            Ok(None)
        }
        fn agreement_method_xml_write(&mut self, _node: &mut dyn XmlNode, _enc_ctx: &mut EncCtx) -> KeyInfoResult<()> {
            Ok(())
        }
        fn copy_user_prefs_from(&mut self, _other: &dyn crate::encryption::EncryptionEngine) {}
        fn fresh_clone(&self) -> Box<dyn crate::encryption::EncryptionEngine> {
            Box::new(self.clone())
        }
    }

    fn derived_key_with_handler(id: u32) -> Key {
        let mut k = Key::new();
        k.set_value(KeyMaterial::new(HId(id), vec![1u8, 2, 3]));
        k
    }

    #[test]
    fn matching_derived_key_is_adopted() {
        let node = FakeNode::element("DerivedKey", Some(XENC11_NS));
        let mut ctx = KeyInfoCtxBuilder::new(Mode::Read)
            .encryption_engine(Box::new(FakeEngine {
                derived: Some(derived_key_with_handler(7)),
                fail: false,
            }))
            .build();
        ctx.key_req = KeyRequirement {
            expected_handler: Some(HId(7)),
            ..KeyRequirement::any()
        };
        let mut key = Key::new();

        DerivedKeyHandler.xml_read(&node, &mut key, &mut ctx).unwrap();
        assert!(key.is_valid());
        assert_eq!(ctx.cur_encrypted_key_level, 0);
    }

    #[test]
    fn non_matching_derived_key_is_discarded_without_error() {
        let node = FakeNode::element("DerivedKey", Some(XENC11_NS));
        let mut ctx = KeyInfoCtxBuilder::new(Mode::Read)
            .encryption_engine(Box::new(FakeEngine {
                derived: Some(derived_key_with_handler(7)),
                fail: false,
            }))
            .build();
        ctx.key_req = KeyRequirement {
            expected_handler: Some(HId(999)),
            ..KeyRequirement::any()
        };
        let mut key = Key::new();

        DerivedKeyHandler.xml_read(&node, &mut key, &mut ctx).unwrap();
        assert!(!key.is_valid());
    }

    #[test]
    fn failed_generation_swallowed_by_default() {
        let node = FakeNode::element("DerivedKey", Some(XENC11_NS));
        let mut ctx = KeyInfoCtxBuilder::new(Mode::Read)
            .encryption_engine(Box::new(FakeEngine {
                derived: None,
                fail: true,
            }))
            .build();
        let mut key = Key::new();

        assert!(DerivedKeyHandler.xml_read(&node, &mut key, &mut ctx).is_ok());
        assert!(!key.is_valid());
    }
}
