// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Encryption engine boundary and the `EncCtx` sub-context
//!
//! `EncryptedKey`, `DerivedKey`, and `AgreementMethod` all delegate the
//! actual cryptography to an external encryption engine: decrypting
//! ciphertext, deriving a key, or running a key-agreement exchange. That
//! engine is out of scope here (no cipher, no KDF, no ECDH is implemented in
//! this crate) — only its operations and error surface matter, captured by
//! the [`EncryptionEngine`] trait.
//!
//! [`EncCtx`] is the lazily-created sub-context a [`crate::context::KeyInfoCtx`]
//! owns to reach that engine. It has a natural cyclic shape in the source
//! material — a `KeyInfoCtx` creates an `EncCtx`, which itself contains two
//! nested `KeyInfoCtx`s (one per I/O direction) used to read/write the
//! `CipherData`'s own nested `KeyInfo`. This crate breaks the cycle with
//! strict tree ownership: the outer context owns its `EncCtx`; the two inner
//! contexts inside `EncCtx` are fresh contexts populated via
//! `copy_user_prefs`, never back-pointers to the outer context.

use std::fmt::Debug;

use crate::context::KeyInfoCtx;
use crate::error::KeyInfoResult;
use crate::key::Key;
use crate::xml::XmlNode;

pub trait EncryptionEngine: Debug + Send {
    /// Decrypt the `<EncryptedKey>`/`<EncryptedData>` rooted at `node` and
    /// return the plaintext, or `None` if decryption failed for a reason the
    /// caller should treat as "this ciphertext wasn't for us" (e.g. wrong
    /// recipient) rather than a hard error.
    fn decrypt_to_buffer(
        &mut self,
        node: &dyn XmlNode,
        enc_ctx: &mut EncCtx,
    ) -> KeyInfoResult<Option<Vec<u8>>>;

    /// Encrypt `plaintext` into the given template node.
    fn binary_encrypt(
        &mut self,
        node: &mut dyn XmlNode,
        plaintext: &[u8],
        enc_ctx: &mut EncCtx,
    ) -> KeyInfoResult<()>;

    /// Derive a fresh key from a `<DerivedKey>` element, or `None` if
    /// derivation failed in a swallowable way.
    fn derived_key_generate(
        &mut self,
        node: &dyn XmlNode,
        enc_ctx: &mut EncCtx,
    ) -> KeyInfoResult<Option<Key>>;

    /// Run a key-agreement exchange described by an `<AgreementMethod>`
    /// element, or `None` if it failed in a swallowable way.
    fn agreement_method_generate(
        &mut self,
        node: &dyn XmlNode,
        enc_ctx: &mut EncCtx,
    ) -> KeyInfoResult<Option<Key>>;

    /// Serialize an `<AgreementMethod>` element for the write path.
    fn agreement_method_xml_write(
        &mut self,
        node: &mut dyn XmlNode,
        enc_ctx: &mut EncCtx,
    ) -> KeyInfoResult<()>;

    /// Propagate only user-configured preferences from `other`.
    fn copy_user_prefs_from(&mut self, other: &dyn EncryptionEngine);

    /// Construct a fresh, independent instance carrying the same concrete
    /// configuration as `self` (used when `ensure_enc_ctx` needs its own
    /// engine handle).
    fn fresh_clone(&self) -> Box<dyn EncryptionEngine>;
}

/// The encryption sub-context owned by a [`KeyInfoCtx`], created lazily and
/// exactly once per context (`ensure_enc_ctx` errors if called twice).
#[derive(Debug)]
pub struct EncCtx {
    pub engine: Box<dyn EncryptionEngine>,
    /// Sub-context used when this `EncCtx` needs to *read* a nested
    /// `KeyInfo` inside `CipherData` (e.g. while decrypting).
    pub inner_read_ctx: Box<KeyInfoCtx>,
    /// Sub-context used when this `EncCtx` needs to *write* a nested
    /// `KeyInfo` inside `CipherData` (e.g. while encrypting).
    pub inner_write_ctx: Box<KeyInfoCtx>,
}

impl EncCtx {
    pub fn new(engine: Box<dyn EncryptionEngine>) -> Self {
        Self {
            engine,
            inner_read_ctx: Box::new(KeyInfoCtx::new_inner_encrypted_key(crate::context::Mode::Read)),
            inner_write_ctx: Box::new(KeyInfoCtx::new_inner_encrypted_key(crate::context::Mode::Write)),
        }
    }

    /// Call into the owned engine with `self` also available, by briefly
    /// swapping the engine out for a placeholder. `EncryptionEngine`
    /// methods take both `&mut self` and `&mut EncCtx`, and the engine lives
    /// inside the very `EncCtx` being passed — this is the only way to give
    /// both borrows to the callback without unsafe code.
    pub fn with_engine<R>(&mut self, f: impl FnOnce(&mut dyn EncryptionEngine, &mut EncCtx) -> R) -> R {
        let mut engine = std::mem::replace(&mut self.engine, Box::new(UnreachableEngine));
        let result = f(engine.as_mut(), self);
        self.engine = engine;
        result
    }
}

/// Placeholder engine swapped into `EncCtx::engine` only for the duration
/// of [`EncCtx::with_engine`]; never actually invoked.
#[derive(Debug, Default)]
struct UnreachableEngine;

impl EncryptionEngine for UnreachableEngine {
    fn decrypt_to_buffer(&mut self, _node: &dyn XmlNode, _enc_ctx: &mut EncCtx) -> KeyInfoResult<Option<Vec<u8>>> {
        unreachable!("placeholder engine must never be invoked")
    }
    fn binary_encrypt(&mut self, _node: &mut dyn XmlNode, _plaintext: &[u8], _enc_ctx: &mut EncCtx) -> KeyInfoResult<()> {
        unreachable!("placeholder engine must never be invoked")
    }
    fn derived_key_generate(&mut self, _node: &dyn XmlNode, _enc_ctx: &mut EncCtx) -> KeyInfoResult<Option<Key>> {
        unreachable!("placeholder engine must never be invoked")
    }
    fn agreement_method_generate(&mut self, _node: &dyn XmlNode, _enc_ctx: &mut EncCtx) -> KeyInfoResult<Option<Key>> {
        unreachable!("placeholder engine must never be invoked")
    }
    fn agreement_method_xml_write(&mut self, _node: &mut dyn XmlNode, _enc_ctx: &mut EncCtx) -> KeyInfoResult<()> {
        unreachable!("placeholder engine must never be invoked")
    }
    fn copy_user_prefs_from(&mut self, _other: &dyn EncryptionEngine) {}
    fn fresh_clone(&self) -> Box<dyn EncryptionEngine> {
        Box::new(UnreachableEngine)
    }
}
