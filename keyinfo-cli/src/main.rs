// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # keyinfo-cli
//!
//! A thin demo binary that exercises `keyinfo-core`'s `KeyInfo` reader
//! end-to-end against a real file on disk, using the `quick_xml`-backed
//! adapter in [`xml_adapter`] for the XML tree boundary `keyinfo-core` itself
//! never implements.

mod xml_adapter;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

use keyinfo_core::context::KeyInfoCtxBuilder;
use keyinfo_core::debug_dump::debug_dump_text;
use keyinfo_core::driver;
use keyinfo_core::handlers::default_registry;
use keyinfo_core::key::Key;
use keyinfo_core::xml::XmlNode;

use xml_adapter::QuickXmlSource;

/// Inspect a `<KeyInfo>` document and report what key material the built-in
/// handlers could resolve from it.
#[derive(Debug, Parser)]
#[command(name = "keyinfo-cli", version, about)]
struct Cli {
    /// Path to a file whose root element is a `<KeyInfo>` element.
    file: PathBuf,

    /// Enable debug-level logging.
    #[arg(short, long)]
    verbose: bool,

    /// Print the context's recursion-counter dump after the pass completes.
    #[arg(long)]
    dump_context: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let bytes = fs::read(&cli.file)
        .with_context(|| format!("reading {}", cli.file.display()))?;

    let source = Arc::new(QuickXmlSource);
    let root = source
        .parse(&bytes)
        .map_err(|err| anyhow::anyhow!("parsing {}: {err}", cli.file.display()))?;

    if root.local_name() != "KeyInfo" {
        anyhow::bail!(
            "root element is <{}>, expected <KeyInfo>",
            root.local_name()
        );
    }

    let registry = Arc::new(default_registry());
    let mut ctx = KeyInfoCtxBuilder::new(keyinfo_core::context::Mode::Read)
        .registry(registry)
        .xml_source(source)
        .build();

    let mut key = Key::new();
    debug!(file = %cli.file.display(), "starting KeyInfo read");
    driver::read(root.as_ref(), &mut key, &mut ctx)
        .map_err(|err| anyhow::anyhow!("reading KeyInfo: {err}"))?;

    if key.is_valid() {
        info!(
            name = key.name().unwrap_or("<unnamed>"),
            handler = ?key.handler_id(),
            "resolved key material"
        );
    } else {
        info!("no key material resolved");
    }

    if cli.dump_context {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        debug_dump_text(&ctx, &mut lock)?;
    }

    Ok(())
}
