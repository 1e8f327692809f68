// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # keyinfo-core
//!
//! A recursive, polymorphic, bounded-depth dispatcher for resolving
//! cryptographic key material out of an XML `<KeyInfo>` element, and for
//! writing a `Key` back into a `<KeyInfo>` template.
//!
//! This crate owns the dispatch policy only: recursion bounds, the handler
//! registry, the processing context, and the built-in handlers for
//! `KeyName`, `KeyValue`, `RetrievalMethod`, `KeyInfoReference`,
//! `EncryptedKey`, `DerivedKey`, and `AgreementMethod`. The XML tree itself,
//! the transform pipeline, the encryption engine, the keys manager, and
//! every concrete key/certificate format are expressed only as trait
//! boundaries ([`xml::XmlNode`], [`transform::TransformContext`],
//! [`encryption::EncryptionEngine`], [`keys_manager::KeysManager`],
//! [`registry::KeyDataHandler`]) — a caller wires in concrete
//! implementations of those.
//!
//! See `driver::read`/`driver::write` for the top-level entry points.

pub mod context;
pub mod debug_dump;
pub mod driver;
pub mod encryption;
pub mod error;
pub mod handlers;
pub mod key;
pub mod keys_manager;
pub mod registry;
pub mod transform;
pub mod xml;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use context::{KeyInfoCtx, KeyInfoCtxBuilder, KeyInfoFlags, KeyInfoFlags2, Mode};
pub use error::{KeyInfoError, KeyInfoResult};
pub use key::{Key, KeyRequirement};
pub use registry::{HandlerId, KeyDataHandler, Registry};
