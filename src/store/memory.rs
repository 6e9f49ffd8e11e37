//! In-process coordination store with ZooKeeper node semantics.
//!
//! Several sessions share one tree. Ephemeral nodes belong to the session that
//! created them and disappear when it is closed or expired. Parents must exist
//! before children are created, ephemeral nodes cannot have children, and
//! sequential names get a ten-digit suffix taken from the parent's child
//! counter.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;

use super::{Acl, Connector, CreateMode, NodeStore, StoreError, StoreResult};
use crate::config::ConnectionDescriptor;
use crate::layout::parent_of;

#[derive(Debug, Clone)]
struct Node {
    data: Vec<u8>,
    version: i32,
    cversion: i32,
    owner: Option<u64>,
    children: BTreeSet<String>,
}

impl Node {
    fn new(data: Vec<u8>, owner: Option<u64>) -> Self {
        Self {
            data,
            version: 0,
            cversion: 0,
            owner,
            children: BTreeSet::new(),
        }
    }
}

#[derive(Debug)]
struct Tree {
    nodes: BTreeMap<String, Node>,
    next_session: u64,
    expired: HashSet<u64>,
    available: bool,
}

impl Tree {
    fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::new(Vec::new(), None));
        Self {
            nodes,
            next_session: 1,
            expired: HashSet::new(),
            available: true,
        }
    }

    fn check_session(&self, session: u64) -> StoreResult<()> {
        if !self.available {
            return Err(StoreError::ConnectionLoss);
        }
        if self.expired.contains(&session) {
            return Err(StoreError::SessionExpired);
        }
        Ok(())
    }

    fn remove(&mut self, path: &str) {
        self.nodes.remove(path);
        if let Some(parent) = parent_of(path) {
            if let Some(parent) = self.nodes.get_mut(parent) {
                parent.children.remove(crate::layout::node_name(path));
                parent.cversion += 1;
            }
        }
    }

    fn reclaim(&mut self, session: u64) -> usize {
        let owned: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.owner == Some(session))
            .map(|(path, _)| path.clone())
            .collect();
        for path in &owned {
            self.remove(path);
        }
        owned.len()
    }
}

/// Snapshot of one node, as returned by [`MemoryStore::dump`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub path: String,
    pub data: Vec<u8>,
    pub version: i32,
    pub ephemeral_owner: Option<u64>,
}

/// Shared tree; hand out sessions with [`MemoryStore::session`].
#[derive(Debug, Clone)]
pub struct MemoryStore {
    tree: Arc<Mutex<Tree>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tree: Arc::new(Mutex::new(Tree::new())),
        }
    }

    /// Opens a new session on this tree.
    pub fn session(&self) -> MemorySession {
        let mut tree = lock(&self.tree);
        let id = tree.next_session;
        tree.next_session += 1;
        MemorySession {
            id,
            tree: Arc::clone(&self.tree),
        }
    }

    /// Simulates a network partition: while unavailable every call from every
    /// session fails with [`StoreError::ConnectionLoss`].
    pub fn set_available(&self, available: bool) {
        lock(&self.tree).available = available;
    }

    /// Every node except `/`, ordered by path.
    pub fn dump(&self) -> Vec<NodeInfo> {
        lock(&self.tree)
            .nodes
            .iter()
            .filter(|(path, _)| path.as_str() != "/")
            .map(|(path, node)| NodeInfo {
                path: path.clone(),
                data: node.data.clone(),
                version: node.version,
                ephemeral_owner: node.owner,
            })
            .collect()
    }

    pub fn contains(&self, path: &str) -> bool {
        lock(&self.tree).nodes.contains_key(path)
    }
}

impl Connector for MemoryStore {
    type Store = MemorySession;

    fn connect(&self, descriptor: &ConnectionDescriptor) -> StoreResult<MemorySession> {
        if !lock(&self.tree).available {
            return Err(StoreError::ConnectionLoss);
        }
        let session = self.session();
        debug!(
            "memory store session {} opened for {} (timeout {:?})",
            session.id,
            descriptor.endpoints.join(","),
            descriptor.session_timeout
        );
        Ok(session)
    }
}

/// One client session on a [`MemoryStore`].
#[derive(Debug)]
pub struct MemorySession {
    id: u64,
    tree: Arc<Mutex<Tree>>,
}

impl MemorySession {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Expires the session: its ephemeral nodes are removed and every later
    /// call fails with [`StoreError::SessionExpired`]. Returns the number of
    /// nodes reclaimed.
    pub fn expire(&self) -> usize {
        let mut tree = lock(&self.tree);
        tree.expired.insert(self.id);
        let reclaimed = tree.reclaim(self.id);
        debug!("memory store session {} expired, {reclaimed} node(s) reclaimed", self.id);
        reclaimed
    }

    fn tree(&self) -> StoreResult<MutexGuard<'_, Tree>> {
        let tree = lock(&self.tree);
        tree.check_session(self.id)?;
        Ok(tree)
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        let mut tree = lock(&self.tree);
        if !tree.expired.contains(&self.id) {
            tree.reclaim(self.id);
        }
    }
}

impl NodeStore for MemorySession {
    fn exists(&self, path: &str) -> StoreResult<bool> {
        validate_path(path)?;
        Ok(self.tree()?.nodes.contains_key(path))
    }

    fn create(
        &self,
        path: &str,
        data: &[u8],
        mode: CreateMode,
        _acl: &[Acl],
    ) -> StoreResult<String> {
        validate_path(path)?;
        if path == "/" {
            return Err(StoreError::NodeExists(path.to_string()));
        }
        let mut tree = self.tree()?;
        let parent_path = parent_of(path).ok_or_else(|| StoreError::BadArguments(path.to_string()))?;
        let parent = tree
            .nodes
            .get(parent_path)
            .ok_or_else(|| StoreError::NoNode(parent_path.to_string()))?;
        if parent.owner.is_some() {
            return Err(StoreError::NoChildrenForEphemerals(parent_path.to_string()));
        }

        let actual = if mode.is_sequential() {
            format!("{path}{:010}", parent.cversion)
        } else {
            path.to_string()
        };
        if tree.nodes.contains_key(&actual) {
            return Err(StoreError::NodeExists(actual));
        }

        let owner = mode.is_ephemeral().then_some(self.id);
        tree.nodes.insert(actual.clone(), Node::new(data.to_vec(), owner));
        if let Some(parent) = tree.nodes.get_mut(parent_path) {
            parent
                .children
                .insert(crate::layout::node_name(&actual).to_string());
            parent.cversion += 1;
        }
        Ok(actual)
    }

    fn delete(&self, path: &str, version: Option<i32>) -> StoreResult<()> {
        validate_path(path)?;
        if path == "/" {
            return Err(StoreError::BadArguments(path.to_string()));
        }
        let mut tree = self.tree()?;
        let node = tree
            .nodes
            .get(path)
            .ok_or_else(|| StoreError::NoNode(path.to_string()))?;
        if let Some(expected) = version {
            if expected != node.version {
                return Err(StoreError::BadVersion {
                    path: path.to_string(),
                    expected,
                    actual: node.version,
                });
            }
        }
        if !node.children.is_empty() {
            return Err(StoreError::NotEmpty(path.to_string()));
        }
        tree.remove(path);
        Ok(())
    }

    fn children(&self, path: &str) -> StoreResult<Vec<String>> {
        validate_path(path)?;
        let tree = self.tree()?;
        let node = tree
            .nodes
            .get(path)
            .ok_or_else(|| StoreError::NoNode(path.to_string()))?;
        Ok(node.children.iter().cloned().collect())
    }

    fn get(&self, path: &str) -> StoreResult<Vec<u8>> {
        validate_path(path)?;
        let tree = self.tree()?;
        tree.nodes
            .get(path)
            .map(|node| node.data.clone())
            .ok_or_else(|| StoreError::NoNode(path.to_string()))
    }
}

fn lock(tree: &Mutex<Tree>) -> MutexGuard<'_, Tree> {
    tree.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn validate_path(path: &str) -> StoreResult<()> {
    if path == "/" {
        return Ok(());
    }
    let valid = path.starts_with('/')
        && !path.ends_with('/')
        && !path.contains('\0')
        && path[1..].split('/').all(|segment| !segment.is_empty());
    if valid {
        Ok(())
    } else {
        Err(StoreError::BadArguments(path.to_string()))
    }
}
