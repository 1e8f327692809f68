// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Built-in KeyInfo child handlers (C4-C9)
//!
//! Each submodule implements one `KeyDataHandler` for a specific KeyInfo
//! child element. None of them decode real cryptographic formats; they
//! resolve, dispatch, and delegate to the collaborator traits the data and
//! format handlers are expected to live behind in a full deployment.

pub mod agreement_method;
pub mod derived_key;
pub mod encrypted_key;
pub mod key_name;
pub mod key_value;
pub mod keyinfo_reference;
pub mod retrieval_method;

use std::sync::Arc;

use crate::registry::Registry;

/// Build a [`Registry`] carrying the seven built-in handlers, each under its
/// default identity and namespace. Callers that need format handlers
/// (RSAKeyValue, X509Data, ...) register those separately; this only wires
/// up the structural KeyInfo-child dispatch this crate owns.
pub fn default_registry() -> Registry {
    let mut registry = Registry::new();
    registry.register(Arc::new(key_name::KeyNameHandler));
    registry.register(Arc::new(key_value::KeyValueHandler));
    registry.register(Arc::new(retrieval_method::RetrievalMethodHandler));
    registry.register(Arc::new(keyinfo_reference::KeyInfoReferenceHandler));
    registry.register(Arc::new(encrypted_key::EncryptedKeyHandler));
    registry.register(Arc::new(derived_key::DerivedKeyHandler));
    registry.register(Arc::new(agreement_method::AgreementMethodHandler));
    registry
}
