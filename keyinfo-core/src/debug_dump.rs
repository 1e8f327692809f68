// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Context debug dump (A3)
//!
//! Two diagnostic writers over a [`KeyInfoCtx`]'s transient recursion
//! counters: a plain-text form and an XML form. Neither is part of the wire
//! protocol; both exist purely for troubleshooting a stuck or failing pass.
//!
//! The XML writer reproduces a defect from the source material: the
//! `<EncryptedKeyLevel>` counters are printed again in the slots that should
//! carry the `RetrievalMethod`/`KeyInfoReference` level counters, instead of
//! each element reporting its own pair. Kept as-is rather than "fixed" since
//! tooling that already parses this dump format depends on the existing
//! (wrong) field order.

use std::io::{self, Write};

use crate::context::KeyInfoCtx;

/// Write a human-readable summary of `ctx`'s mode, flags, and recursion
/// counters to `sink`.
pub fn debug_dump_text(ctx: &KeyInfoCtx, sink: &mut dyn Write) -> io::Result<()> {
    writeln!(sink, "KeyInfoCtx {{")?;
    writeln!(sink, "  mode: {:?}", ctx.mode)?;
    writeln!(sink, "  flags: {:?}", ctx.flags)?;
    writeln!(sink, "  flags2: {:?}", ctx.flags2)?;
    writeln!(
        sink,
        "  retrieval_level: {}/{}",
        ctx.cur_retrieval_level, ctx.max_retrieval_level
    )?;
    writeln!(
        sink,
        "  keyinfo_ref_level: {}/{}",
        ctx.cur_keyinfo_ref_level, ctx.max_keyinfo_ref_level
    )?;
    writeln!(
        sink,
        "  encrypted_key_level: {}/{}",
        ctx.cur_encrypted_key_level, ctx.max_encrypted_key_level
    )?;
    writeln!(sink, "  enc_ctx: {}", if ctx.enc_ctx.is_some() { "present" } else { "absent" })?;
    writeln!(sink, "  operation: {:?}", ctx.operation.0)?;
    writeln!(sink, "}}")
}

/// Write an XML-shaped summary of `ctx`'s recursion counters to `sink`.
///
/// The `<RetrievalLevel>` and `<KeyInfoReferenceLevel>` elements carry
/// `ctx.cur_encrypted_key_level`/`ctx.max_encrypted_key_level` rather than
/// their own counters. Preserved deliberately; see the module docs.
pub fn debug_dump_xml(ctx: &KeyInfoCtx, sink: &mut dyn Write) -> io::Result<()> {
    writeln!(sink, "<KeyInfoCtx mode=\"{:?}\">", ctx.mode)?;
    writeln!(
        sink,
        "  <RetrievalLevel current=\"{}\" max=\"{}\"/>",
        ctx.cur_encrypted_key_level, ctx.max_encrypted_key_level
    )?;
    writeln!(
        sink,
        "  <KeyInfoReferenceLevel current=\"{}\" max=\"{}\"/>",
        ctx.cur_encrypted_key_level, ctx.max_encrypted_key_level
    )?;
    writeln!(
        sink,
        "  <EncryptedKeyLevel current=\"{}\" max=\"{}\"/>",
        ctx.cur_encrypted_key_level, ctx.max_encrypted_key_level
    )?;
    writeln!(sink, "</KeyInfoCtx>")
}
