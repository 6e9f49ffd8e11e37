//! Coordination-store capability consumed by the registration engine.
//!
//! The engine only needs five node operations. A networked ZooKeeper client
//! plugs in by implementing [`NodeStore`] for its session handle and
//! [`Connector`] for whatever opens that session.

pub mod memory;

use std::sync::Arc;

use crate::config::ConnectionDescriptor;

pub use memory::{MemorySession, MemoryStore};

/// Node creation semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CreateMode {
    Persistent,
    Ephemeral,
    PersistentSequential,
    EphemeralSequential,
}

impl CreateMode {
    /// Wire flag value (ephemeral = 1, sequential = 2).
    pub fn flags(self) -> i32 {
        match self {
            CreateMode::Persistent => 0,
            CreateMode::Ephemeral => 1,
            CreateMode::PersistentSequential => 2,
            CreateMode::EphemeralSequential => 3,
        }
    }

    pub fn is_ephemeral(self) -> bool {
        matches!(self, CreateMode::Ephemeral | CreateMode::EphemeralSequential)
    }

    pub fn is_sequential(self) -> bool {
        matches!(
            self,
            CreateMode::PersistentSequential | CreateMode::EphemeralSequential
        )
    }
}

pub const PERM_READ: u32 = 1;
pub const PERM_WRITE: u32 = 1 << 1;
pub const PERM_CREATE: u32 = 1 << 2;
pub const PERM_DELETE: u32 = 1 << 3;
pub const PERM_ADMIN: u32 = 1 << 4;
pub const PERM_ALL: u32 = PERM_READ | PERM_WRITE | PERM_CREATE | PERM_DELETE | PERM_ADMIN;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acl {
    pub perms: u32,
    pub scheme: String,
    pub id: String,
}

impl Acl {
    /// `world:anyone` with every permission.
    pub fn world_all() -> Vec<Acl> {
        vec![Acl {
            perms: PERM_ALL,
            scheme: "world".to_string(),
            id: "anyone".to_string(),
        }]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("node already exists: {0}")]
    NodeExists(String),
    #[error("node does not exist: {0}")]
    NoNode(String),
    #[error("node has children: {0}")]
    NotEmpty(String),
    #[error("version mismatch on {path}: expected {expected}, found {actual}")]
    BadVersion {
        path: String,
        expected: i32,
        actual: i32,
    },
    #[error("ephemeral node cannot have children: {0}")]
    NoChildrenForEphemerals(String),
    #[error("invalid node path: {0}")]
    BadArguments(String),
    #[error("connection to the coordination store was lost")]
    ConnectionLoss,
    #[error("coordination store session expired")]
    SessionExpired,
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Session or transport failure, as opposed to a per-path condition.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, StoreError::ConnectionLoss | StoreError::SessionExpired)
    }

    /// Conflicts that leave the tree in the state the caller wanted anyway.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            StoreError::NodeExists(_) | StoreError::NoNode(_) | StoreError::NotEmpty(_)
        )
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// One coordination-store session.
///
/// Every call is an independent blocking round trip; implementations must be
/// safe to share between threads.
pub trait NodeStore: Send + Sync {
    fn exists(&self, path: &str) -> StoreResult<bool>;

    /// Creates a node and returns its actual path, which differs from `path`
    /// for sequential modes.
    fn create(&self, path: &str, data: &[u8], mode: CreateMode, acl: &[Acl])
        -> StoreResult<String>;

    /// Deletes a node; `None` matches any version.
    fn delete(&self, path: &str, version: Option<i32>) -> StoreResult<()>;

    /// Child names (not full paths) of `path`.
    fn children(&self, path: &str) -> StoreResult<Vec<String>>;

    fn get(&self, path: &str) -> StoreResult<Vec<u8>>;
}

impl<S: NodeStore + ?Sized> NodeStore for Arc<S> {
    fn exists(&self, path: &str) -> StoreResult<bool> {
        (**self).exists(path)
    }

    fn create(
        &self,
        path: &str,
        data: &[u8],
        mode: CreateMode,
        acl: &[Acl],
    ) -> StoreResult<String> {
        (**self).create(path, data, mode, acl)
    }

    fn delete(&self, path: &str, version: Option<i32>) -> StoreResult<()> {
        (**self).delete(path, version)
    }

    fn children(&self, path: &str) -> StoreResult<Vec<String>> {
        (**self).children(path)
    }

    fn get(&self, path: &str) -> StoreResult<Vec<u8>> {
        (**self).get(path)
    }
}

/// Opens a store session for a connection descriptor.
pub trait Connector {
    type Store: NodeStore;

    fn connect(&self, descriptor: &ConnectionDescriptor) -> StoreResult<Self::Store>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_mode_flags() {
        assert_eq!(CreateMode::Persistent.flags(), 0);
        assert_eq!(CreateMode::Ephemeral.flags(), 1);
        assert_eq!(CreateMode::PersistentSequential.flags(), 2);
        assert_eq!(CreateMode::EphemeralSequential.flags(), 3);
        assert!(CreateMode::EphemeralSequential.is_ephemeral());
        assert!(!CreateMode::Persistent.is_sequential());
    }

    #[test]
    fn test_error_classification() {
        assert!(StoreError::NodeExists("/a".into()).is_benign());
        assert!(StoreError::NoNode("/a".into()).is_benign());
        assert!(!StoreError::ConnectionLoss.is_benign());
        assert!(StoreError::SessionExpired.is_connectivity());
        assert!(!StoreError::NotEmpty("/a".into()).is_connectivity());
    }

    #[test]
    fn test_world_acl() {
        let acl = Acl::world_all();
        assert_eq!(acl.len(), 1);
        assert_eq!(acl[0].perms, 31);
        assert_eq!(acl[0].scheme, "world");
    }
}
