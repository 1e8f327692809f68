// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Processing context (C1)
//!
//! `KeyInfoCtx` holds everything a single read or write pass needs: the
//! fixed mode, policy flags, recursion counters and bounds, references to
//! the registry / keys manager / transform sub-contexts / encryption
//! sub-context, and the current [`KeyRequirement`]. Its lifecycle is
//! `init -> (reset)* -> finalize`; each top-level `read`/`write` is one
//! logical transaction.

use std::any::Any;
use std::sync::Arc;

use bitflags::bitflags;

use crate::encryption::{EncCtx, EncryptionEngine};
use crate::error::{KeyInfoError, KeyInfoResult};
use crate::key::KeyRequirement;
use crate::keys_manager::KeysManager;
use crate::registry::{EnabledKeyData, KeyDataHandler, KeyDataUsage, Registry};
use crate::transform::TransformContext;
use crate::xml::XmlDocumentSource;

/// Fixed for the lifetime of one pass: whether this context is reading an
/// existing `<KeyInfo>` or writing a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    Write,
}

/// Caller-supplied label for the current high-level operation (e.g.
/// "verify-signature", "decrypt"), propagated into `enc_ctx`'s inner
/// sub-contexts by `ensure_enc_ctx`. Opaque to the core; used only for
/// logging and for handing the same label to nested contexts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Operation(pub Option<String>);

bitflags! {
    /// Primary policy flags (`spec.md` §6).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct KeyInfoFlags: u32 {
        /// Do not short-circuit the read loop once a valid matching key
        /// exists.
        const DONT_STOP_ON_KEY_FOUND = 1 << 0;
        /// Unknown child of `<KeyInfo>` is a hard error.
        const STOP_ON_UNKNOWN_CHILD = 1 << 1;
        /// Unknown inner child of `<KeyValue>`, or unknown root of a
        /// retrieved XML result, is a hard error.
        const KEYVALUE_STOP_ON_UNKNOWN_CHILD = 1 << 2;
        /// Unresolvable `Type` attribute on `<RetrievalMethod>` is a hard
        /// error.
        const RETRMETHOD_STOP_ON_UNKNOWN_HREF = 1 << 3;
        /// Fetched data's inferred type != declared `Type` is a hard error.
        const RETRMETHOD_STOP_ON_MISMATCH_HREF = 1 << 4;
        /// A failing `EncryptedKey`/`DerivedKey`/`AgreementMethod` is fatal
        /// rather than swallowed.
        const ENCKEY_DONT_STOP_ON_FAILED_DECRYPTION = 1 << 5;
    }
}

bitflags! {
    /// Second, independent flag bitset. Kept separate from `KeyInfoFlags`
    /// the same way the source material keeps `flags`/`flags2` distinct, so
    /// a later flag generation never renumbers the first. Currently
    /// unpopulated.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct KeyInfoFlags2: u32 {
        const _RESERVED = 0;
    }
}

/// Builder for [`KeyInfoCtx`], used by callers and tests that want to
/// configure more than the constructor's mandatory fields.
#[derive(Debug, Default)]
pub struct KeyInfoCtxBuilder {
    mode: Option<Mode>,
    keys_manager: Option<Arc<dyn KeysManager>>,
    registry: Option<Arc<Registry>>,
    enabled_key_data: Option<EnabledKeyData>,
    flags: KeyInfoFlags,
    flags2: KeyInfoFlags2,
    max_retrieval_level: u32,
    max_keyinfo_ref_level: u32,
    max_encrypted_key_level: u32,
    base64_line_size: u32,
    certs_verification_depth: u32,
    certs_verification_time: Option<i64>,
    retrieval_ctx: Option<Box<dyn TransformContext>>,
    keyinfo_ref_ctx: Option<Box<dyn TransformContext>>,
    xml_source: Option<Arc<dyn XmlDocumentSource>>,
    encryption_engine_prototype: Option<Box<dyn EncryptionEngine>>,
}

impl KeyInfoCtxBuilder {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode: Some(mode),
            max_retrieval_level: 1,
            max_keyinfo_ref_level: 1,
            max_encrypted_key_level: 1,
            certs_verification_depth: 9,
            ..Default::default()
        }
    }

    pub fn keys_manager(mut self, km: Arc<dyn KeysManager>) -> Self {
        self.keys_manager = Some(km);
        self
    }

    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn enabled_key_data(mut self, handlers: Vec<Arc<dyn KeyDataHandler>>) -> Self {
        self.enabled_key_data = Some(EnabledKeyData::new(handlers));
        self
    }

    pub fn flags(mut self, flags: KeyInfoFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn flags2(mut self, flags2: KeyInfoFlags2) -> Self {
        self.flags2 = flags2;
        self
    }

    pub fn max_retrieval_level(mut self, n: u32) -> Self {
        self.max_retrieval_level = n;
        self
    }

    pub fn max_keyinfo_ref_level(mut self, n: u32) -> Self {
        self.max_keyinfo_ref_level = n;
        self
    }

    pub fn max_encrypted_key_level(mut self, n: u32) -> Self {
        self.max_encrypted_key_level = n;
        self
    }

    pub fn base64_line_size(mut self, n: u32) -> Self {
        self.base64_line_size = n;
        self
    }

    pub fn certs_verification_depth(mut self, n: u32) -> Self {
        self.certs_verification_depth = n;
        self
    }

    pub fn certs_verification_time(mut self, t: i64) -> Self {
        self.certs_verification_time = Some(t);
        self
    }

    pub fn retrieval_ctx(mut self, ctx: Box<dyn TransformContext>) -> Self {
        self.retrieval_ctx = Some(ctx);
        self
    }

    pub fn keyinfo_ref_ctx(mut self, ctx: Box<dyn TransformContext>) -> Self {
        self.keyinfo_ref_ctx = Some(ctx);
        self
    }

    pub fn xml_source(mut self, source: Arc<dyn XmlDocumentSource>) -> Self {
        self.xml_source = Some(source);
        self
    }

    /// A prototype encryption engine. `ensure_enc_ctx` duplicates it via
    /// `EncryptionEngine::fresh_clone` each time a fresh `enc_ctx` is
    /// needed, since the engine itself is out of scope for this crate.
    pub fn encryption_engine(mut self, engine: Box<dyn EncryptionEngine>) -> Self {
        self.encryption_engine_prototype = Some(engine);
        self
    }

    pub fn build(self) -> KeyInfoCtx {
        KeyInfoCtx {
            mode: self.mode.expect("KeyInfoCtxBuilder requires a mode"),
            flags: self.flags,
            flags2: self.flags2,
            keys_manager: self.keys_manager,
            registry: self.registry.unwrap_or_default(),
            enabled_key_data: self.enabled_key_data,
            retrieval_ctx: self.retrieval_ctx,
            keyinfo_ref_ctx: self.keyinfo_ref_ctx,
            xml_source: self.xml_source,
            encryption_engine_prototype: self.encryption_engine_prototype,
            cur_retrieval_level: 0,
            max_retrieval_level: self.max_retrieval_level,
            cur_keyinfo_ref_level: 0,
            max_keyinfo_ref_level: self.max_keyinfo_ref_level,
            cur_encrypted_key_level: 0,
            max_encrypted_key_level: self.max_encrypted_key_level,
            enc_ctx: None,
            key_req: KeyRequirement::any(),
            base64_line_size: self.base64_line_size,
            certs_verification_depth: self.certs_verification_depth,
            certs_verification_time: self.certs_verification_time,
            operation: Operation::default(),
            user_data: None,
        }
    }
}

/// The KeyInfo processing context (C1). See module docs.
#[derive(Debug)]
pub struct KeyInfoCtx {
    pub mode: Mode,
    pub flags: KeyInfoFlags,
    pub flags2: KeyInfoFlags2,
    pub keys_manager: Option<Arc<dyn KeysManager>>,
    pub registry: Arc<Registry>,
    pub enabled_key_data: Option<EnabledKeyData>,
    pub retrieval_ctx: Option<Box<dyn TransformContext>>,
    pub keyinfo_ref_ctx: Option<Box<dyn TransformContext>>,
    pub xml_source: Option<Arc<dyn XmlDocumentSource>>,
    pub encryption_engine_prototype: Option<Box<dyn EncryptionEngine>>,
    pub cur_retrieval_level: u32,
    pub max_retrieval_level: u32,
    pub cur_keyinfo_ref_level: u32,
    pub max_keyinfo_ref_level: u32,
    pub cur_encrypted_key_level: u32,
    pub max_encrypted_key_level: u32,
    pub enc_ctx: Option<Box<EncCtx>>,
    pub key_req: KeyRequirement,
    pub base64_line_size: u32,
    pub certs_verification_depth: u32,
    pub certs_verification_time: Option<i64>,
    pub operation: Operation,
    pub user_data: Option<Arc<dyn Any + Send + Sync>>,
}

impl KeyInfoCtx {
    /// Construct a context with the given mode and no keys manager.
    pub fn init(mode: Mode, keys_manager: Option<Arc<dyn KeysManager>>) -> Self {
        let mut ctx = KeyInfoCtxBuilder::new(mode).build();
        ctx.keys_manager = keys_manager;
        ctx
    }

    /// A fresh context used as one of `EncCtx`'s two inner sub-contexts.
    /// Its own mode is forced by `copy_user_prefs` to "encrypted-key"
    /// (see that method) once preferences are copied in from the parent.
    pub(crate) fn new_inner_encrypted_key(mode: Mode) -> Self {
        KeyInfoCtxBuilder::new(mode).build()
    }

    /// Tear down this context. Transient state is simply dropped; callers
    /// must not reuse a `KeyInfoCtx` after `finalize`.
    pub fn finalize(self) {
        drop(self);
    }

    /// Clear transient state (recursion counters, transform results,
    /// operation, inner encryption context state) while keeping all
    /// user-configured settings. Use this between a failed pass and the
    /// next one, since recursion counters are not rewound on error.
    pub fn reset(&mut self) {
        self.cur_retrieval_level = 0;
        self.cur_keyinfo_ref_level = 0;
        self.cur_encrypted_key_level = 0;
        self.operation = Operation::default();
        if let Some(retrieval_ctx) = &mut self.retrieval_ctx {
            retrieval_ctx.reset();
        }
        if let Some(keyinfo_ref_ctx) = &mut self.keyinfo_ref_ctx {
            keyinfo_ref_ctx.reset();
        }
        if let Some(enc_ctx) = &mut self.enc_ctx {
            enc_ctx.inner_read_ctx.reset();
            enc_ctx.inner_write_ctx.reset();
        }
    }

    /// Propagate only configuration from `src` into `dst`, never transient
    /// counters or results: `user_data`, `flags`, `flags2`, `keys_manager`,
    /// `registry`, `xml_source`, `base64_line_size`, a deep copy of
    /// `enabled_key_data`, `max_retrieval_level`, `max_keyinfo_ref_level`,
    /// `max_encrypted_key_level`, transform-pipeline user prefs (both
    /// sub-contexts), and certificate-verification settings. If both sides
    /// have an `enc_ctx`, the encryption engine's own preference-copy is
    /// invoked on it and the nested mode is forced to "encrypted-key".
    pub fn copy_user_prefs(dst: &mut KeyInfoCtx, src: &KeyInfoCtx) {
        dst.user_data = src.user_data.clone();
        dst.flags = src.flags;
        dst.flags2 = src.flags2;
        dst.keys_manager = src.keys_manager.clone();
        dst.registry = src.registry.clone();
        dst.xml_source = src.xml_source.clone();
        dst.encryption_engine_prototype = src
            .encryption_engine_prototype
            .as_ref()
            .map(|engine| engine.fresh_clone());
        dst.base64_line_size = src.base64_line_size;
        dst.enabled_key_data = src.enabled_key_data.clone();
        dst.max_retrieval_level = src.max_retrieval_level;
        dst.max_keyinfo_ref_level = src.max_keyinfo_ref_level;
        dst.max_encrypted_key_level = src.max_encrypted_key_level;
        dst.certs_verification_depth = src.certs_verification_depth;
        dst.certs_verification_time = src.certs_verification_time;

        if let (Some(dst_retrieval), Some(src_retrieval)) =
            (&mut dst.retrieval_ctx, &src.retrieval_ctx)
        {
            dst_retrieval.copy_user_prefs_from(src_retrieval.as_ref());
        }
        if let (Some(dst_ref), Some(src_ref)) = (&mut dst.keyinfo_ref_ctx, &src.keyinfo_ref_ctx) {
            dst_ref.copy_user_prefs_from(src_ref.as_ref());
        }

        if let (Some(dst_enc), Some(src_enc)) = (&mut dst.enc_ctx, &src.enc_ctx) {
            dst_enc.engine.copy_user_prefs_from(src_enc.engine.as_ref());
            // Forcing "encrypted-key" mode here refers to the nested
            // KeyInfoCtx's `operation` label, not `mode: Mode`, which stays
            // fixed for the context's lifetime; see `Operation`.
            dst_enc.inner_read_ctx.operation = Operation(Some("encrypted-key".to_string()));
            dst_enc.inner_write_ctx.operation = Operation(Some("encrypted-key".to_string()));
        }
    }

    /// Lazily create `enc_ctx` in "encrypted-key" mode, populate its inner
    /// read/write sub-contexts from this context via `copy_user_prefs`
    /// (choosing which sub-context to populate into by this context's
    /// mode), and propagate `operation` into both. Errors if `enc_ctx`
    /// already exists.
    pub fn ensure_enc_ctx(
        &mut self,
        engine_factory: impl FnOnce() -> Box<dyn crate::encryption::EncryptionEngine>,
    ) -> KeyInfoResult<()> {
        if self.enc_ctx.is_some() {
            return Err(KeyInfoError::EncCtxAlreadyExists);
        }
        let mut enc_ctx = EncCtx::new(engine_factory());
        KeyInfoCtx::copy_user_prefs(&mut enc_ctx.inner_read_ctx, self);
        KeyInfoCtx::copy_user_prefs(&mut enc_ctx.inner_write_ctx, self);
        enc_ctx.inner_read_ctx.operation = self.operation.clone();
        enc_ctx.inner_write_ctx.operation = self.operation.clone();
        self.enc_ctx = Some(Box::new(enc_ctx));
        Ok(())
    }

    /// Create `enc_ctx` if absent, or reset its inner sub-contexts'
    /// transient state if it already exists (reusing the same engine
    /// handle) — the `EncryptedKey`/`DerivedKey`/`AgreementMethod` handlers
    /// call this once per invocation rather than `ensure_enc_ctx`, since
    /// sibling elements of the same kind legitimately reuse one `enc_ctx`
    /// across a single `KeyInfo` pass.
    pub fn ensure_or_reset_enc_ctx(&mut self) -> KeyInfoResult<()> {
        if self.enc_ctx.is_some() {
            if let Some(enc_ctx) = &mut self.enc_ctx {
                enc_ctx.inner_read_ctx.reset();
                enc_ctx.inner_write_ctx.reset();
            }
            return Ok(());
        }
        let prototype = self
            .encryption_engine_prototype
            .as_ref()
            .ok_or_else(|| {
                KeyInfoError::ExternalFailure("no encryption engine configured".to_string())
            })?
            .fresh_clone();
        self.ensure_enc_ctx(|| prototype)
    }

    /// Resolve a handler by (local name, namespace, usage), consulting the
    /// allow-list when non-empty, otherwise the global registry. The two
    /// are never merged.
    pub fn resolve_by_node(
        &self,
        local_name: &str,
        namespace_uri: Option<&str>,
        usage: KeyDataUsage,
    ) -> Option<Arc<dyn KeyDataHandler>> {
        match &self.enabled_key_data {
            Some(allow_list) if !allow_list.is_empty() => {
                allow_list.find_by_node(local_name, namespace_uri, usage)
            }
            _ => self.registry.find_by_node(local_name, namespace_uri, usage),
        }
    }

    /// Resolve a handler by href, consulting the allow-list when non-empty,
    /// otherwise the global registry.
    pub fn resolve_by_href(
        &self,
        href: &str,
        usage: KeyDataUsage,
    ) -> Option<Arc<dyn KeyDataHandler>> {
        match &self.enabled_key_data {
            Some(allow_list) if !allow_list.is_empty() => allow_list.find_by_href(href, usage),
            _ => self.registry.find_by_href(href, usage),
        }
    }
}
