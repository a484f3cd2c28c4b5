//! In-memory namespace used by unit tests.
//!
//! Children keep insertion order so tests can observe that callers preserve service order.
//! Failure injection covers rejected writes, failing listings and nodes that disappear
//! right after their parent was listed.

use super::{Namespace, NamespaceError, NodeStat, ROOT, child_path};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default)]
struct MemNode {
    payload: Vec<u8>,
    children: Vec<String>,
    version: i32,
}

#[derive(Debug, Default)]
struct State {
    nodes: BTreeMap<String, MemNode>,
    mutations: Vec<String>,
    rejected_writes: BTreeSet<String>,
    failing_listings: BTreeSet<String>,
    vanishing: BTreeSet<String>,
    probe_reply: Option<String>,
}

#[derive(Debug)]
pub struct MemoryNamespace {
    state: RefCell<State>,
}

impl Default for MemoryNamespace {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryNamespace {
    pub fn new() -> Self {
        let mut state = State::default();
        state.nodes.insert(ROOT.to_string(), MemNode::default());
        state.probe_reply = Some("imok".to_string());
        MemoryNamespace {
            state: RefCell::new(state),
        }
    }

    /// Test setup: creates `path` (and ancestors) with `payload` without recording a mutation.
    pub fn insert(&self, path: &str, payload: &[u8]) {
        let mut state = self.state.borrow_mut();
        ensure_path(&mut state, path);
        if let Some(node) = state.nodes.get_mut(path) {
            node.payload = payload.to_vec();
        }
    }

    pub fn payload(&self, path: &str) -> Option<Vec<u8>> {
        self.state
            .borrow()
            .nodes
            .get(path)
            .map(|n| n.payload.clone())
    }

    /// Mutations in the order they were applied, as `"<op> <path>"`.
    pub fn mutations(&self) -> Vec<String> {
        self.state.borrow().mutations.clone()
    }

    pub fn reject_writes_to(&self, path: &str) {
        self.state
            .borrow_mut()
            .rejected_writes
            .insert(path.to_string());
    }

    pub fn fail_listing_of(&self, path: &str) {
        self.state
            .borrow_mut()
            .failing_listings
            .insert(path.to_string());
    }

    /// Makes `path` disappear right after its parent has been listed.
    pub fn vanish_after_parent_listed(&self, path: &str) {
        self.state.borrow_mut().vanishing.insert(path.to_string());
    }

    pub fn set_probe_reply(&self, reply: Option<&str>) {
        self.state.borrow_mut().probe_reply = reply.map(str::to_string);
    }

    fn check_writable(state: &State, path: &str) -> Result<(), NamespaceError> {
        if state.rejected_writes.contains(path) {
            return Err(NamespaceError::Service {
                path: path.to_string(),
                message: "QuotaExceeded".to_string(),
            });
        }
        Ok(())
    }
}

fn parent_of(path: &str) -> Option<&str> {
    if path == ROOT {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some(ROOT),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

fn ensure_path(state: &mut State, path: &str) {
    let mut current = ROOT.to_string();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        let next = child_path(&current, segment);
        if !state.nodes.contains_key(&next) {
            state.nodes.insert(next.clone(), MemNode::default());
            if let Some(parent) = state.nodes.get_mut(&current) {
                parent.children.push(segment.to_string());
            }
        }
        current = next;
    }
}

fn remove_subtree(state: &mut State, path: &str) {
    let prefix = format!("{}/", path);
    state
        .nodes
        .retain(|key, _| key != path && !key.starts_with(&prefix));
    if let Some(parent) = parent_of(path)
        && let Some(parent_node) = state.nodes.get_mut(parent)
    {
        let name = super::node_name(path);
        parent_node.children.retain(|c| c != name);
    }
}

impl Namespace for MemoryNamespace {
    fn exists(&self, path: &str) -> Result<bool, NamespaceError> {
        Ok(self.state.borrow().nodes.contains_key(path))
    }

    fn list_children(&self, path: &str) -> Result<Vec<String>, NamespaceError> {
        let mut state = self.state.borrow_mut();
        if state.failing_listings.contains(path) {
            return Err(NamespaceError::Service {
                path: path.to_string(),
                message: "ConnectionLoss".to_string(),
            });
        }
        let children = state
            .nodes
            .get(path)
            .map(|n| n.children.clone())
            .ok_or_else(|| NamespaceError::NodeNotFound(path.to_string()))?;

        for child in &children {
            let full = child_path(path, child);
            if state.vanishing.remove(&full) {
                remove_subtree(&mut state, &full);
            }
        }

        Ok(children)
    }

    fn get_value(&self, path: &str) -> Result<(Vec<u8>, NodeStat), NamespaceError> {
        let state = self.state.borrow();
        let node = state
            .nodes
            .get(path)
            .ok_or_else(|| NamespaceError::NodeNotFound(path.to_string()))?;
        let stat = NodeStat {
            version: node.version,
            data_length: node.payload.len() as i32,
            num_children: node.children.len() as i32,
            ..NodeStat::default()
        };
        Ok((node.payload.clone(), stat))
    }

    fn set_value(&self, path: &str, payload: Vec<u8>) -> Result<(), NamespaceError> {
        let mut state = self.state.borrow_mut();
        Self::check_writable(&state, path)?;
        let node = state
            .nodes
            .get_mut(path)
            .ok_or_else(|| NamespaceError::NodeNotFound(path.to_string()))?;
        node.payload = payload;
        node.version += 1;
        state.mutations.push(format!("set {}", path));
        Ok(())
    }

    fn create_path(&self, path: &str) -> Result<(), NamespaceError> {
        let mut state = self.state.borrow_mut();
        Self::check_writable(&state, path)?;
        ensure_path(&mut state, path);
        state.mutations.push(format!("create {}", path));
        Ok(())
    }

    fn delete_subtree(&self, path: &str) -> Result<(), NamespaceError> {
        let mut state = self.state.borrow_mut();
        if !state.nodes.contains_key(path) {
            return Err(NamespaceError::NodeNotFound(path.to_string()));
        }
        Self::check_writable(&state, path)?;
        remove_subtree(&mut state, path);
        state.mutations.push(format!("delete {}", path));
        Ok(())
    }

    fn health_probe(&self) -> Result<String, NamespaceError> {
        self.state
            .borrow()
            .probe_reply
            .clone()
            .ok_or_else(|| NamespaceError::Service {
                path: ROOT.to_string(),
                message: "Connection refused".to_string(),
            })
    }
}
