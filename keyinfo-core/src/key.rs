// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Key data model
//!
//! [`Key`] is the opaque, caller-owned holder that handlers mutate while
//! walking a `<KeyInfo>` element. Its actual cryptographic material is
//! type-erased and tagged by the [`HandlerId`] of the handler that produced
//! it, since decoding any concrete key format (RSA, X.509, SPKI, ...) is out
//! of scope for this crate.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use crate::registry::HandlerId;

bitflags! {
    /// Bitmask of key kinds a [`KeyRequirement`] will accept.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct KeyKindMask: u8 {
        const PUBLIC    = 0b0001;
        const PRIVATE   = 0b0010;
        const SYMMETRIC = 0b0100;
        const ANY = Self::PUBLIC.bits() | Self::PRIVATE.bits() | Self::SYMMETRIC.bits();
    }
}

impl Default for KeyKindMask {
    fn default() -> Self {
        KeyKindMask::ANY
    }
}

/// Declared usage a key must support (signature verification, signing,
/// encryption, decryption, key agreement, ...). Left open-ended as a
/// small closed set sufficient for dispatch; exact semantics of each usage
/// are the encryption engine's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyUsage {
    Sign,
    Verify,
    Encrypt,
    Decrypt,
    Any,
}

/// Type-erased cryptographic material, tagged by the handler that can make
/// sense of it. Only the handler identified by `handler_id` is expected to
/// downcast `data`.
#[derive(Clone)]
pub struct KeyMaterial {
    pub handler_id: HandlerId,
    pub data: Arc<dyn Any + Send + Sync>,
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("handler_id", &self.handler_id)
            .finish_non_exhaustive()
    }
}

impl KeyMaterial {
    pub fn new<T: Any + Send + Sync>(handler_id: HandlerId, data: T) -> Self {
        Self {
            handler_id,
            data: Arc::new(data),
        }
    }

    /// Downcast to the concrete type the owning handler expects.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }
}

/// Auxiliary certificate data attached to a key, type-erased the same way as
/// [`KeyMaterial`] (X.509 chains, PGP data, etc. are handler-specific).
#[derive(Clone)]
pub struct KeyCertificate {
    pub handler_id: HandlerId,
    pub data: Arc<dyn Any + Send + Sync>,
}

impl fmt::Debug for KeyCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyCertificate")
            .field("handler_id", &self.handler_id)
            .finish_non_exhaustive()
    }
}

/// An opaque, caller-owned key. Handlers mutate it in place; a failed pass
/// may leave it partially populated, and the caller decides whether to
/// retain or [`Key::empty`] it.
#[derive(Debug, Clone, Default)]
pub struct Key {
    value: Option<KeyMaterial>,
    name: Option<String>,
    certificates: Vec<KeyCertificate>,
    /// Coarse kind hint a handler may attach alongside `value`, consulted by
    /// `matches` when a `KeyRequirement` constrains key kind. `None` always
    /// matches (the core cannot itself classify type-erased material).
    kind_hint: Option<KeyKindMask>,
}

impl Key {
    pub fn new() -> Self {
        Self::default()
    }

    /// A key is valid once it carries cryptographic material.
    pub fn is_valid(&self) -> bool {
        self.value.is_some()
    }

    /// Whether this key satisfies `req`. An unset requirement field always
    /// matches.
    pub fn matches(&self, req: &KeyRequirement) -> bool {
        if !self.is_valid() {
            return false;
        }
        if let Some(expected) = req.expected_handler {
            if self.handler_id() != Some(expected) {
                return false;
            }
        }
        // Key-kind and size/usage checks are delegated to the handler that
        // owns the material in a full implementation; the core only
        // verifies what it can see (handler identity) plus a caller-visible
        // kind hint carried alongside the material, when present.
        if !req.key_kind_mask.is_empty() && req.key_kind_mask != KeyKindMask::ANY {
            if let Some(kind) = self.kind_hint {
                if !req.key_kind_mask.contains(kind) {
                    return false;
                }
            }
        }
        true
    }

    /// Reset to the empty state (no value, no name, no certificates).
    pub fn empty(&mut self) {
        *self = Key::default();
    }

    /// Replace this key's contents with a copy of `other`'s.
    pub fn copy_from(&mut self, other: &Key) {
        self.value = other.value.clone();
        self.name = other.name.clone();
        self.certificates = other.certificates.clone();
        self.kind_hint = other.kind_hint;
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn value(&self) -> Option<&KeyMaterial> {
        self.value.as_ref()
    }

    pub fn set_value(&mut self, value: KeyMaterial) {
        self.value = Some(value);
    }

    pub fn handler_id(&self) -> Option<HandlerId> {
        self.value.as_ref().map(|v| v.handler_id)
    }

    pub fn certificates(&self) -> &[KeyCertificate] {
        &self.certificates
    }

    pub fn add_certificate(&mut self, cert: KeyCertificate) {
        self.certificates.push(cert);
    }

    /// A coarse kind hint a handler may set alongside the material, used by
    /// [`Key::matches`] when the caller's [`KeyRequirement`] constrains key
    /// kind. Handlers that don't track this leave it `None`, which always
    /// matches.
    pub fn set_kind_hint(&mut self, kind: KeyKindMask) {
        self.kind_hint = Some(kind);
    }
}

/// Predicate describing the key a caller needs.
#[derive(Debug, Clone, Default)]
pub struct KeyRequirement {
    pub expected_handler: Option<HandlerId>,
    pub key_kind_mask: KeyKindMask,
    pub min_size_bits: Option<u32>,
    pub usage: Option<KeyUsage>,
}

impl KeyRequirement {
    pub fn any() -> Self {
        Self {
            key_kind_mask: KeyKindMask::ANY,
            ..Default::default()
        }
    }

    pub fn matches(&self, key: &Key) -> bool {
        key.matches(self)
    }
}
