// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! In-memory fakes for every external collaborator trait, used by unit
//! tests throughout this crate and, via the `test-util` feature, by the
//! scenario suite in `tests/scenarios.rs`.

#![allow(dead_code)]

pub mod fakes {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::context::KeyInfoCtx;
    use crate::error::{KeyInfoError, KeyInfoResult};
    use crate::key::{Key, KeyMaterial};
    use crate::keys_manager::KeysManager;
    use crate::registry::{HandlerDescriptor, HandlerId, KeyDataHandler};
    use crate::transform::TransformContext;
    use crate::xml::XmlNode;

    #[derive(Debug, Default)]
    struct FakeNodeData {
        local_name: String,
        namespace_uri: Option<String>,
        attributes: HashMap<String, String>,
        text: String,
        children: Vec<FakeNode>,
    }

    /// A minimal, mutable, reference-counted element tree used only in
    /// tests. Cloning a `FakeNode` clones the handle, not the data — both
    /// handles observe the same mutations, matching the live-handle
    /// semantics a real XML tree library would provide.
    #[derive(Debug, Clone)]
    pub struct FakeNode(Rc<RefCell<FakeNodeData>>);

    impl FakeNode {
        pub fn element(local_name: &str, namespace_uri: Option<&str>) -> Self {
            FakeNode(Rc::new(RefCell::new(FakeNodeData {
                local_name: local_name.to_string(),
                namespace_uri: namespace_uri.map(|s| s.to_string()),
                ..Default::default()
            })))
        }

        pub fn with_child(self, child: FakeNode) -> Self {
            self.0.borrow_mut().children.push(child);
            self
        }

        pub fn with_text(self, text: &str) -> Self {
            self.0.borrow_mut().text = text.to_string();
            self
        }

        pub fn with_attribute(self, name: &str, value: &str) -> Self {
            self.0
                .borrow_mut()
                .attributes
                .insert(name.to_string(), value.to_string());
            self
        }

        pub fn child_named(&self, name: &str) -> Option<FakeNode> {
            self.0
                .borrow()
                .children
                .iter()
                .find(|c| c.0.borrow().local_name == name)
                .cloned()
        }

        pub fn children_count(&self) -> usize {
            self.0.borrow().children.len()
        }
    }

    impl XmlNode for FakeNode {
        fn local_name(&self) -> String {
            self.0.borrow().local_name.clone()
        }

        fn namespace_uri(&self) -> Option<String> {
            self.0.borrow().namespace_uri.clone()
        }

        fn attribute(&self, name: &str) -> Option<String> {
            self.0.borrow().attributes.get(name).cloned()
        }

        fn text(&self) -> String {
            self.0.borrow().text.clone()
        }

        fn set_text(&mut self, value: &str) {
            let mut data = self.0.borrow_mut();
            data.text = value.to_string();
            data.children.clear();
        }

        fn element_children(&self) -> Vec<Box<dyn XmlNode>> {
            self.0
                .borrow()
                .children
                .iter()
                .cloned()
                .map(|c| Box::new(c) as Box<dyn XmlNode>)
                .collect()
        }

        fn clear_children(&mut self) {
            self.0.borrow_mut().children.clear();
        }

        fn append_child_element(&mut self, local_name: &str, namespace_uri: &str) -> Box<dyn XmlNode> {
            let child = FakeNode::element(local_name, Some(namespace_uri));
            self.0.borrow_mut().children.push(child.clone());
            Box::new(child)
        }

        fn set_attribute(&mut self, name: &str, value: &str) {
            self.0
                .borrow_mut()
                .attributes
                .insert(name.to_string(), value.to_string());
        }

        fn box_clone(&self) -> Box<dyn XmlNode> {
            Box::new(self.clone())
        }
    }

    /// A handler that records how many times it was asked to read, and
    /// optionally sets a valid key on read (to simulate a handler that
    /// resolves a key, for read-loop-termination tests).
    #[derive(Debug)]
    pub struct RecordingHandler {
        descriptor: HandlerDescriptor,
        read_count: AtomicU32,
        sets_key: bool,
    }

    impl RecordingHandler {
        pub fn new(descriptor: HandlerDescriptor) -> Self {
            Self {
                descriptor,
                read_count: AtomicU32::new(0),
                sets_key: false,
            }
        }

        pub fn set_key_on_read(descriptor: HandlerDescriptor) -> Self {
            Self {
                descriptor,
                read_count: AtomicU32::new(0),
                sets_key: true,
            }
        }

        pub fn read_count(&self) -> u32 {
            self.read_count.load(Ordering::SeqCst)
        }
    }

    impl KeyDataHandler for RecordingHandler {
        fn descriptor(&self) -> &HandlerDescriptor {
            &self.descriptor
        }

        fn xml_read(&self, _node: &dyn XmlNode, key: &mut Key, _ctx: &mut KeyInfoCtx) -> KeyInfoResult<()> {
            self.read_count.fetch_add(1, Ordering::SeqCst);
            if self.sets_key {
                key.set_value(KeyMaterial::new(self.descriptor.id, Vec::<u8>::new()));
            }
            Ok(())
        }
    }

    /// A `KeysManager` fake backed by a fixed map of name -> key.
    #[derive(Debug, Default)]
    pub struct FakeKeysManager {
        keys: HashMap<String, Key>,
    }

    impl FakeKeysManager {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_key(mut self, name: &str, key: Key) -> Self {
            self.keys.insert(name.to_string(), key);
            self
        }
    }

    impl KeysManager for FakeKeysManager {
        fn find_key(&self, name: &str, _req: &crate::key::KeyRequirement) -> Option<Key> {
            self.keys.get(name).cloned()
        }
    }

    /// A `TransformContext` fake that returns a fixed result buffer
    /// regardless of URI/transform chain, recording the last URI set.
    #[derive(Debug, Default)]
    pub struct FakeTransformContext {
        pub uri: Option<String>,
        pub result: Option<Vec<u8>>,
        pub fail_on_uri: Option<String>,
    }

    impl FakeTransformContext {
        pub fn with_result(result: Vec<u8>) -> Self {
            Self {
                result: Some(result),
                ..Default::default()
            }
        }

        pub fn failing(uri: &str) -> Self {
            Self {
                fail_on_uri: Some(uri.to_string()),
                ..Default::default()
            }
        }
    }

    impl TransformContext for FakeTransformContext {
        fn reset(&mut self) {
            self.uri = None;
        }

        fn set_uri(&mut self, uri: &str) -> KeyInfoResult<()> {
            if self.fail_on_uri.as_deref() == Some(uri) {
                return Err(KeyInfoError::ExternalFailure(format!("cannot dereference {uri}")));
            }
            self.uri = Some(uri.to_string());
            Ok(())
        }

        fn read_transforms(&mut self, _transforms_node: &dyn XmlNode) -> KeyInfoResult<()> {
            Ok(())
        }

        fn execute(&mut self, _owning_document: &dyn XmlNode) -> KeyInfoResult<()> {
            if self.result.is_none() {
                return Err(KeyInfoError::EmptyTransformResult);
            }
            Ok(())
        }

        fn result(&self) -> Option<&[u8]> {
            self.result.as_deref()
        }

        fn copy_user_prefs_from(&mut self, _other: &dyn TransformContext) {}

        fn fresh_clone(&self) -> Box<dyn TransformContext> {
            Box::new(FakeTransformContext {
                uri: None,
                result: self.result.clone(),
                fail_on_uri: self.fail_on_uri.clone(),
            })
        }
    }
}
