// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Transform pipeline boundary
//!
//! `RetrievalMethod` and, indirectly, `KeyInfoReference` dereference a URI
//! and run it through a chain of content transforms to obtain a byte
//! buffer. That whole engine — URI fetch policy, canonicalization,
//! decompression, whatever a given transform chain specifies — is out of
//! scope; the core only needs the five-operation contract below, exposed as
//! the [`TransformContext`] trait. Each [`crate::context::KeyInfoCtx`] owns
//! two independent instances (`retrieval_ctx`, `keyinfo_ref_ctx`) that are
//! reset on every use and retain no state across top-level passes beyond
//! user preferences.

use std::fmt::Debug;

use crate::error::KeyInfoResult;
use crate::xml::XmlNode;

pub trait TransformContext: Debug + Send {
    /// Clear any per-invocation state (URI, transform chain, result buffer)
    /// while keeping user-configured preferences.
    fn reset(&mut self);

    /// Set the URI to dereference. Implementations validate the URI against
    /// their own enabled/disabled transform and scheme policy.
    fn set_uri(&mut self, uri: &str) -> KeyInfoResult<()>;

    /// Parse a `<Transforms>` child into the transform chain to run.
    fn read_transforms(&mut self, transforms_node: &dyn XmlNode) -> KeyInfoResult<()>;

    /// Execute the configured URI fetch plus transform chain against the
    /// node's owning document.
    fn execute(&mut self, owning_document: &dyn XmlNode) -> KeyInfoResult<()>;

    /// The result buffer from the most recent `execute`, if any.
    fn result(&self) -> Option<&[u8]>;

    /// Propagate only user-configured preferences from `other` into `self`
    /// (never transient URI/result state) — the transform-pipeline half of
    /// `KeyInfoCtx::copy_user_prefs`.
    fn copy_user_prefs_from(&mut self, other: &dyn TransformContext);

    /// A cheap way for [`crate::context::KeyInfoCtx::init`] to construct a
    /// fresh, independent instance carrying the same concrete
    /// implementation as `self`.
    fn fresh_clone(&self) -> Box<dyn TransformContext>;
}
