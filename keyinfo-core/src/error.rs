// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Error taxonomy
//!
//! `KeyInfoError` categorizes the six error kinds described for the KeyInfo
//! processor: schema-lax unknowns upgraded by a `STOP_ON_*` flag, hard schema
//! violations, recursion-limit exceedances, declared-vs-actual type
//! mismatches, external collaborator failures, and policy-controlled soft
//! failures that the driver itself never constructs (handlers convert those
//! to `Ok(())` with no key change unless a flag upgrades them).

use thiserror::Error;

/// Errors produced while walking or writing a `<KeyInfo>` element.
///
/// Every handler and the driver return `Result<_, KeyInfoError>`; an `Err`
/// aborts the current pass immediately. Recursion counters are decremented
/// only on success, so a `KeyInfoCtx` that produced an `Err` must be
/// discarded or `reset` before reuse.
#[derive(Error, Debug, Clone)]
pub enum KeyInfoError {
    /// An unknown child of `<KeyInfo>` was rejected because
    /// `STOP_ON_UNKNOWN_CHILD` is set.
    #[error("unknown KeyInfo child: {0}")]
    UnknownKeyInfoChild(String),

    /// An unknown child of `<KeyValue>`, or an unknown root element of a
    /// retrieved XML result, was rejected because
    /// `KEYVALUE_STOP_ON_UNKNOWN_CHILD` is set.
    #[error("unknown key data child: {0}")]
    UnknownKeyDataChild(String),

    /// `<RetrievalMethod Type=.../>` did not resolve to a registered handler
    /// and `RETRMETHOD_STOP_ON_UNKNOWN_HREF` is set.
    #[error("unresolvable RetrievalMethod Type href: {0}")]
    UnknownRetrievalHref(String),

    /// The fetched document's inferred handler differs from the declared
    /// `Type` attribute and `RETRMETHOD_STOP_ON_MISMATCH_HREF` is set.
    #[error("RetrievalMethod Type mismatch: declared {declared}, resolved {resolved}")]
    RetrievalTypeMismatch { declared: String, resolved: String },

    /// A required attribute or child was missing, content was empty where
    /// non-empty content is required, duplicate content was present, or a
    /// root element did not match the expected local name.
    #[error("invalid key data: {0}")]
    InvalidKeyData(String),

    /// `cur_retrieval_level >= max_retrieval_level` on entry to
    /// `RetrievalMethod`.
    #[error("maximum RetrievalMethod nesting level exceeded (max {max})")]
    MaxRetrievalsLevel { max: u32 },

    /// `cur_keyinfo_ref_level >= max_keyinfo_ref_level` on entry to
    /// `KeyInfoReference`.
    #[error("maximum KeyInfoReference nesting level exceeded (max {max})")]
    MaxKeyInfoRefLevel { max: u32 },

    /// `cur_encrypted_key_level >= max_encrypted_key_level` on entry to
    /// `EncryptedKey`, `DerivedKey`, or `AgreementMethod`.
    #[error("maximum EncryptedKey nesting level exceeded (max {max})")]
    MaxEncryptedKeyLevel { max: u32 },

    /// Decryption failed and `ENCKEY_DONT_STOP_ON_FAILED_DECRYPTION` is set,
    /// making the failure fatal instead of swallowed.
    #[error("EncryptedKey decryption failed: {0}")]
    DecryptionFailed(String),

    /// `ensure_enc_ctx` was called while an `enc_ctx` already existed.
    #[error("encryption context already initialized")]
    EncCtxAlreadyExists,

    /// The transform pipeline, an XML parse, the encryption engine, or
    /// another external collaborator failed.
    #[error("external collaborator failed: {0}")]
    ExternalFailure(String),

    /// The transform pipeline produced no result, or produced a result the
    /// caller required to be non-empty.
    #[error("empty transform result")]
    EmptyTransformResult,
}

impl KeyInfoError {
    /// Broad category, for structured logging / metrics, following the
    /// domain's error-category convention.
    pub fn category(&self) -> &'static str {
        match self {
            KeyInfoError::UnknownKeyInfoChild(_) | KeyInfoError::UnknownKeyDataChild(_) => {
                "schema-lax"
            }
            KeyInfoError::UnknownRetrievalHref(_) | KeyInfoError::RetrievalTypeMismatch { .. } => {
                "data-mismatch"
            }
            KeyInfoError::InvalidKeyData(_) => "schema-hard",
            KeyInfoError::MaxRetrievalsLevel { .. }
            | KeyInfoError::MaxKeyInfoRefLevel { .. }
            | KeyInfoError::MaxEncryptedKeyLevel { .. } => "limit-exceeded",
            KeyInfoError::DecryptionFailed(_) => "policy-controlled",
            KeyInfoError::EncCtxAlreadyExists => "internal",
            KeyInfoError::ExternalFailure(_) | KeyInfoError::EmptyTransformResult => "external",
        }
    }

    /// Whether the error stems from a depth bound rather than malformed
    /// input or a hard failure.
    pub fn is_limit_exceeded(&self) -> bool {
        matches!(
            self,
            KeyInfoError::MaxRetrievalsLevel { .. }
                | KeyInfoError::MaxKeyInfoRefLevel { .. }
                | KeyInfoError::MaxEncryptedKeyLevel { .. }
        )
    }
}

impl From<std::io::Error> for KeyInfoError {
    fn from(err: std::io::Error) -> Self {
        KeyInfoError::ExternalFailure(err.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type KeyInfoResult<T> = Result<T, KeyInfoError>;
