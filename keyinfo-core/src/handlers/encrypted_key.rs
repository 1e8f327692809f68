// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # EncryptedKey handler (C8)
//!
//! Decrypts an inner ciphertext into raw key octets via the encryption
//! engine, then loads the plaintext through the handler the caller's
//! requirement names. A failed decryption is swallowed by default (the
//! ciphertext may simply have been encrypted to a different recipient),
//! letting the driver try a sibling `<EncryptedKey>`.

use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::context::{KeyInfoCtx, KeyInfoFlags, KeyInfoCtxBuilder, Mode};
use crate::error::{KeyInfoError, KeyInfoResult};
use crate::key::{Key, KeyRequirement};
use crate::registry::{HandlerDescriptor, HandlerId, KeyDataHandler, KeyDataUsage};
use crate::xml::XmlNode;

pub const ENCRYPTED_KEY_HANDLER_ID: HandlerId = HandlerId(5);
const XENC_NS: &str = "http://www.w3.org/2001/04/xmlenc#";

pub const ENCRYPTED_KEY_DESCRIPTOR: HandlerDescriptor = HandlerDescriptor {
    id: ENCRYPTED_KEY_HANDLER_ID,
    name: "EncryptedKey",
    usage: KeyDataUsage::KEYINFO_CHILD,
    href: None,
    data_node_localname: "EncryptedKey",
    data_node_namespace: XENC_NS,
};

#[derive(Debug, Default)]
pub struct EncryptedKeyHandler;

impl KeyDataHandler for EncryptedKeyHandler {
    fn descriptor(&self) -> &HandlerDescriptor {
        &ENCRYPTED_KEY_DESCRIPTOR
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

    fn xml_write(&self, node: &mut dyn XmlNode, key: &Key, ctx: &mut KeyInfoCtx) -> KeyInfoResult<()> {
        write_body(node, key, ctx)
    }
}

fn read_body(node: &dyn XmlNode, key: &mut Key, ctx: &mut KeyInfoCtx) -> KeyInfoResult<()> {
    ctx.ensure_or_reset_enc_ctx()?;

    let plaintext = {
        let enc_ctx = ctx.enc_ctx.as_mut().expect("ensure_or_reset_enc_ctx just created it");
        enc_ctx.with_engine(|engine, enc_ctx| engine.decrypt_to_buffer(node, enc_ctx))
    };

    let plaintext = match plaintext {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            debug!("EncryptedKey decryption yielded no plaintext, treating as not-for-us");
            return Ok(());
        }
        Err(err) => {
            if ctx.flags.contains(KeyInfoFlags::ENCKEY_DONT_STOP_ON_FAILED_DECRYPTION) {
                warn!(error = %err, "EncryptedKey decryption failed, propagating per policy flag");
                return Err(KeyInfoError::DecryptionFailed(err.to_string()));
            }
            debug!(error = %err, "EncryptedKey decryption failed, swallowing per default policy");
            return Ok(());
        }
    };
    let plaintext = Zeroizing::new(plaintext);

    if plaintext.is_empty() {
        return Ok(());
    }

    let handler_id = ctx.key_req.expected_handler;
    let Some(handler_id) = handler_id else {
        return Err(KeyInfoError::InvalidKeyData(
            "EncryptedKey plaintext decoded but no expected handler in the key requirement".to_string(),
        ));
    };
    let Some(handler) = ctx.registry.handlers().iter().find(|h| h.descriptor().id == handler_id).cloned() else {
        return Err(KeyInfoError::InvalidKeyData(format!(
            "no registered handler for expected key id {handler_id:?}"
        )));
    };

    handler.bin_read(&plaintext, key, ctx)
}

fn write_body(node: &mut dyn XmlNode, key: &Key, ctx: &mut KeyInfoCtx) -> KeyInfoResult<()> {
    let Some(value) = key.value() else {
        return Ok(());
    };
    let Some(handler) = ctx.registry.handlers().iter().find(|h| h.descriptor().id == value.handler_id).cloned() else {
        return Err(KeyInfoError::InvalidKeyData(format!(
            "no registered handler for key value handler id {:?}",
            value.handler_id
        )));
    };

    let mut child_ctx = KeyInfoCtxBuilder::new(Mode::Write).build();
    KeyInfoCtx::copy_user_prefs(&mut child_ctx, ctx);
    child_ctx.key_req = KeyRequirement::any();

    let plaintext = Zeroizing::new(handler.bin_write(key, &mut child_ctx)?);

    ctx.ensure_or_reset_enc_ctx()?;
    let enc_ctx = ctx.enc_ctx.as_mut().expect("ensure_or_reset_enc_ctx just created it");
    enc_ctx.with_engine(|engine, enc_ctx| engine.binary_encrypt(node, &plaintext, enc_ctx))
}
