//! Binding registry: the static tree of commands surfaced to the chat host,
//! and the lookup that maps an inbound call path back to its handler.
//!
//! The tree is assembled once through [`BindingTreeBuilder`] and frozen by
//! [`BindingTreeBuilder::build`], which consumes the builder. The frozen
//! [`BindingTree`] is immutable and shared by every request task.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use thiserror::Error;

use crate::apps::{Binding, Call, CallRequest, CallResponse, CallType, Form};

/// Call-type suffixes stripped before lookup, in priority order.
const CALL_SUFFIXES: [&str; 3] = ["/submit", "/form", "/lookup"];

/// Source of per-builder tags stamped into every [`NodeId`].
static NEXT_BUILDER: AtomicUsize = AtomicUsize::new(0);

/// Something a leaf binding invokes.
#[async_trait]
pub trait CallHandler: Send + Sync {
    async fn handle(&self, request: CallRequest, call_type: CallType) -> CallResponse;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BindingError {
    #[error("unknown parent node {0}")]
    UnknownParent(usize),
    #[error("location \"{0}\" is already registered under this parent")]
    DuplicateLocation(String),
    #[error("binding \"{0}\" has an invocation path but no handler")]
    MissingHandler(String),
}

/// One command or command group, prior to registration.
pub struct BindingNode {
    binding: Binding,
    handler: Option<Arc<dyn CallHandler>>,
}

impl BindingNode {
    /// Pure grouping node, no invocation path.
    pub fn group(location: impl Into<String>) -> Self {
        Self {
            binding: Binding {
                location: location.into(),
                ..Binding::default()
            },
            handler: None,
        }
    }

    /// Invocable leaf. A path always comes with its handler.
    pub fn command(
        location: impl Into<String>,
        path: impl Into<String>,
        handler: Arc<dyn CallHandler>,
    ) -> Self {
        Self {
            binding: Binding {
                location: location.into(),
                call: Some(Call::new(path)),
                ..Binding::default()
            },
            handler: Some(handler),
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.binding.label = label.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.binding.description = description.into();
        self
    }

    pub fn form(mut self, form: Form) -> Self {
        self.binding.form = Some(form);
        self
    }

    /// Distinct invocation paths of this node: its call, then its form's
    /// call when that differs.
    fn paths(&self) -> impl Iterator<Item = &str> {
        let call = self.binding.call.as_ref().map(|c| c.path.as_str());
        let form_call = self
            .binding
            .form
            .as_ref()
            .and_then(|f| f.call.as_ref())
            .map(|c| c.path.as_str())
            .filter(|p| Some(*p) != call);
        call.into_iter().chain(form_call)
    }
}

/// Handle to a registered node, valid only for the builder that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId {
    builder: usize,
    index: usize,
}

struct PendingEntry {
    node: BindingNode,
    children: Vec<usize>,
}

/// Collects nodes in registration order. Nodes live in an arena and refer
/// to their children by index until [`build`](Self::build) nests them.
pub struct BindingTreeBuilder {
    tag: usize,
    entries: Vec<PendingEntry>,
    roots: Vec<usize>,
}

impl Default for BindingTreeBuilder {
    fn default() -> Self {
        Self {
            tag: NEXT_BUILDER.fetch_add(1, Ordering::Relaxed),
            entries: Vec::new(),
            roots: Vec::new(),
        }
    }
}

impl BindingTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn node_id(&self, index: usize) -> NodeId {
        NodeId {
            builder: self.tag,
            index,
        }
    }

    pub fn add_root(&mut self, node: BindingNode) -> Result<NodeId, BindingError> {
        Self::check_node(&node)?;
        self.check_sibling_location(&self.roots, &node)?;
        let id = self.push(node);
        self.roots.push(id);
        Ok(self.node_id(id))
    }

    /// Fails with [`BindingError::UnknownParent`] for ids issued by another
    /// builder, even when their index is in range here.
    pub fn add_child(&mut self, parent: NodeId, child: BindingNode) -> Result<NodeId, BindingError> {
        let unknown = BindingError::UnknownParent(parent.index);
        if parent.builder != self.tag {
            return Err(unknown);
        }
        let siblings = &self.entries.get(parent.index).ok_or(unknown)?.children;
        Self::check_node(&child)?;
        self.check_sibling_location(siblings, &child)?;
        let id = self.push(child);
        self.entries[parent.index].children.push(id);
        Ok(self.node_id(id))
    }

    fn push(&mut self, node: BindingNode) -> usize {
        self.entries.push(PendingEntry {
            node,
            children: Vec::new(),
        });
        self.entries.len() - 1
    }

    fn check_node(node: &BindingNode) -> Result<(), BindingError> {
        if node.handler.is_none() && node.paths().next().is_some() {
            return Err(BindingError::MissingHandler(node.binding.location.clone()));
        }
        Ok(())
    }

    fn check_sibling_location(
        &self,
        siblings: &[usize],
        node: &BindingNode,
    ) -> Result<(), BindingError> {
        let location = &node.binding.location;
        if siblings
            .iter()
            .any(|&i| self.entries[i].node.binding.location == *location)
        {
            return Err(BindingError::DuplicateLocation(location.clone()));
        }
        Ok(())
    }

    /// Freeze the registry. Invocation paths registered twice are kept but
    /// reported: lookup returns the first-registered handler.
    pub fn build(self) -> BindingTree {
        let mut seen: HashMap<String, String> = HashMap::new();
        let mut order: Vec<usize> = Vec::new();
        collect_preorder(&self.entries, &self.roots, &mut order);
        for &i in &order {
            let node = &self.entries[i].node;
            for path in node.paths() {
                if let Some(first) = seen.get(path) {
                    tracing::warn!(
                        path,
                        first = %first,
                        shadowed = %node.binding.location,
                        "duplicate invocation path; first-registered binding wins"
                    );
                } else {
                    seen.insert(path.to_string(), node.binding.location.clone());
                }
            }
        }

        let mut slots: Vec<Option<PendingEntry>> = self.entries.into_iter().map(Some).collect();
        let roots = self
            .roots
            .iter()
            .filter_map(|&i| nest(&mut slots, i))
            .collect();
        BindingTree { roots }
    }
}

fn collect_preorder(entries: &[PendingEntry], ids: &[usize], out: &mut Vec<usize>) {
    for &i in ids {
        out.push(i);
        collect_preorder(entries, &entries[i].children, out);
    }
}

fn nest(slots: &mut [Option<PendingEntry>], index: usize) -> Option<BindingEntry> {
    let pending = slots.get_mut(index)?.take()?;
    let entries = pending
        .children
        .iter()
        .filter_map(|&c| nest(slots, c))
        .collect();
    Some(BindingEntry {
        binding: pending.node.binding,
        handler: pending.node.handler,
        entries,
    })
}

/// Frozen node: its binding, its handler and its ordered children.
pub struct BindingEntry {
    binding: Binding,
    handler: Option<Arc<dyn CallHandler>>,
    entries: Vec<BindingEntry>,
}

impl BindingEntry {
    /// Snapshot of this subtree with children nested in registration order.
    pub fn render(&self) -> Binding {
        let mut binding = self.binding.clone();
        binding.bindings = self.entries.iter().map(BindingEntry::render).collect();
        binding
    }

    fn matches(&self, path: &str) -> bool {
        let call = self.binding.call.as_ref().is_some_and(|c| c.path == path);
        let form_call = self
            .binding
            .form
            .as_ref()
            .and_then(|f| f.call.as_ref())
            .is_some_and(|c| c.path == path);
        call || form_call
    }

    fn find_handler(&self, path: &str) -> Option<Arc<dyn CallHandler>> {
        if self.matches(path)
            && let Some(handler) = &self.handler
        {
            return Some(handler.clone());
        }
        self.entries.iter().find_map(|e| e.find_handler(path))
    }
}

/// Immutable registry of everything the app binds.
pub struct BindingTree {
    roots: Vec<BindingEntry>,
}

impl BindingTree {
    pub fn render(&self) -> Vec<Binding> {
        self.roots.iter().map(BindingEntry::render).collect()
    }

    /// Handler for a call path such as `/commands/dylan/submit`.
    /// Depth-first in registration order; first match wins.
    pub fn find_handler(&self, path: &str) -> Option<Arc<dyn CallHandler>> {
        let path = strip_call_suffix(path);
        self.roots.iter().find_map(|e| e.find_handler(path))
    }
}

/// Remove one trailing `/submit`, `/form` or `/lookup`, whichever matches
/// first.
pub(crate) fn strip_call_suffix(path: &str) -> &str {
    CALL_SUFFIXES
        .iter()
        .find_map(|suffix| path.strip_suffix(suffix))
        .unwrap_or(path)
}
