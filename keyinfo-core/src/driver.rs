// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # KeyInfo driver (C3)
//!
//! The top-level walker over `<KeyInfo>` children. `read` and `write` both
//! enumerate element children in document order, skipping non-element
//! nodes, and dispatch each child to whatever handler the registry resolves
//! for it under the `KEYINFO_CHILD` usage bit.

use tracing::{debug, warn};

use crate::context::KeyInfoCtx;
use crate::error::{KeyInfoError, KeyInfoResult};
use crate::key::Key;
use crate::registry::KeyDataUsage;
use crate::xml::XmlNode;

/// Read a `<KeyInfo>` element into `key`, honoring `ctx`'s policy flags.
///
/// Stops and returns `Ok(())` as soon as `key.is_valid() &&
/// ctx.key_req.matches(key)`, unless `DONT_STOP_ON_KEY_FOUND` is set. An
/// unresolved child is ignored unless `STOP_ON_UNKNOWN_CHILD` is set, in
/// which case it is a hard error. Any handler error aborts the pass
/// immediately; `key` may be left partially populated.
pub fn read(keyinfo_node: &dyn XmlNode, key: &mut Key, ctx: &mut KeyInfoCtx) -> KeyInfoResult<()> {
    debug_assert_eq!(ctx.mode, crate::context::Mode::Read);

    for child in keyinfo_node.element_children() {
        if !ctx.flags.contains(crate::context::KeyInfoFlags::DONT_STOP_ON_KEY_FOUND)
            && key.is_valid()
            && ctx.key_req.matches(key)
        {
            return Ok(());
        }

        dispatch_child(child.as_ref(), key, ctx, Direction::Read)?;
    }

    Ok(())
}

/// Write `key` into the `<KeyInfo>` template, with no early termination:
/// every registered handler writes into its matching template child.
pub fn write(keyinfo_node: &mut dyn XmlNode, key: &Key, ctx: &mut KeyInfoCtx) -> KeyInfoResult<()> {
    debug_assert_eq!(ctx.mode, crate::context::Mode::Write);

    for mut child in keyinfo_node.element_children() {
        dispatch_child_write(child.as_mut(), key, ctx)?;
    }

    Ok(())
}

enum Direction {
    Read,
}

fn dispatch_child(
    child: &dyn XmlNode,
    key: &mut Key,
    ctx: &mut KeyInfoCtx,
    _direction: Direction,
) -> KeyInfoResult<()> {
    let local_name = child.local_name();
    let namespace_uri = child.namespace_uri();

    match ctx.resolve_by_node(&local_name, namespace_uri.as_deref(), KeyDataUsage::KEYINFO_CHILD) {
        Some(handler) => {
            debug!(handler = handler.descriptor().name, %local_name, "dispatching KeyInfo child");
            handler.xml_read(child, key, ctx)
        }
        None => {
            if ctx.flags.contains(crate::context::KeyInfoFlags::STOP_ON_UNKNOWN_CHILD) {
                warn!(%local_name, "unknown KeyInfo child, STOP_ON_UNKNOWN_CHILD set");
                Err(KeyInfoError::UnknownKeyInfoChild(local_name))
            } else {
                debug!(%local_name, "ignoring unknown KeyInfo child (schema-lax)");
                Ok(())
            }
        }
    }
}

fn dispatch_child_write(
    child: &mut dyn XmlNode,
    key: &Key,
    ctx: &mut KeyInfoCtx,
) -> KeyInfoResult<()> {
    let local_name = child.local_name();
    let namespace_uri = child.namespace_uri();

    match ctx.resolve_by_node(&local_name, namespace_uri.as_deref(), KeyDataUsage::KEYINFO_CHILD) {
        Some(handler) => handler.xml_write(child, key, ctx),
        None => {
            if ctx.flags.contains(crate::context::KeyInfoFlags::STOP_ON_UNKNOWN_CHILD) {
                Err(KeyInfoError::UnknownKeyInfoChild(local_name))
            } else {
                Ok(())
            }
        }
    }
}
