// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # AgreementMethod handler (C9, half 2)
//!
//! Mirrors `DerivedKey`'s read path against the engine's key-agreement
//! operation. Unlike `DerivedKey`, writing is not a no-op: it re-enters the
//! encryption engine's own serializer.

use tracing::{debug, warn};

use crate::context::{KeyInfoCtx, KeyInfoFlags};
use crate::error::{KeyInfoError, KeyInfoResult};
use crate::key::Key;
use crate::registry::{HandlerDescriptor, HandlerId, KeyDataHandler, KeyDataUsage};
use crate::xml::XmlNode;

pub const AGREEMENT_METHOD_HANDLER_ID: HandlerId = HandlerId(7);
const XENC11_NS: &str = "http://www.w3.org/2009/xmlenc11#";

pub const AGREEMENT_METHOD_DESCRIPTOR: HandlerDescriptor = HandlerDescriptor {
    id: AGREEMENT_METHOD_HANDLER_ID,
    name: "AgreementMethod",
    usage: KeyDataUsage::KEYINFO_CHILD,
    href: None,
    data_node_localname: "AgreementMethod",
    data_node_namespace: XENC11_NS,
};

#[derive(Debug, Default)]
pub struct AgreementMethodHandler;

impl KeyDataHandler for AgreementMethodHandler {
    fn descriptor(&self) -> &HandlerDescriptor {
        &AGREEMENT_METHOD_DESCRIPTOR
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

    fn xml_write(&self, node: &mut dyn XmlNode, _key: &Key, ctx: &mut KeyInfoCtx) -> KeyInfoResult<()> {
        if ctx.cur_encrypted_key_level >= ctx.max_encrypted_key_level {
            return Err(KeyInfoError::MaxEncryptedKeyLevel {
                max: ctx.max_encrypted_key_level,
            });
        }
        ctx.cur_encrypted_key_level += 1;

        let outcome = write_body(node, ctx);

        if outcome.is_ok() {
            ctx.cur_encrypted_key_level -= 1;
        }
        outcome
    }
}

fn read_body(node: &dyn XmlNode, key: &mut Key, ctx: &mut KeyInfoCtx) -> KeyInfoResult<()> {
    ctx.ensure_or_reset_enc_ctx()?;

    let agreed = {
        let enc_ctx = ctx.enc_ctx.as_mut().expect("ensure_or_reset_enc_ctx just created it");
        enc_ctx.with_engine(|engine, enc_ctx| engine.agreement_method_generate(node, enc_ctx))
    };

    let agreed = match agreed {
        Ok(Some(k)) => k,
        Ok(None) => {
            debug!("AgreementMethod generation yielded no key");
            return Ok(());
        }
        Err(err) => {
            if ctx.flags.contains(KeyInfoFlags::ENCKEY_DONT_STOP_ON_FAILED_DECRYPTION) {
                warn!(error = %err, "AgreementMethod generation failed, propagating per policy flag");
                return Err(KeyInfoError::DecryptionFailed(err.to_string()));
            }
            debug!(error = %err, "AgreementMethod generation failed, swallowing per default policy");
            return Ok(());
        }
    };

    if !ctx.key_req.matches(&agreed) {
        debug!("agreed key does not satisfy the current requirement, discarding");
        return Ok(());
    }

    key.copy_from(&agreed);
    Ok(())
}

fn write_body(node: &mut dyn XmlNode, ctx: &mut KeyInfoCtx) -> KeyInfoResult<()> {
    ctx.ensure_or_reset_enc_ctx()?;
    let enc_ctx = ctx.enc_ctx.as_mut().expect("ensure_or_reset_enc_ctx just created it");
    enc_ctx.with_engine(|engine, enc_ctx| engine.agreement_method_xml_write(node, enc_ctx))
}
