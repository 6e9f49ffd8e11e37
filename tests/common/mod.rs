#![allow(dead_code)]

use std::sync::Mutex;

use znode_registrar::layout::parent_of;
use znode_registrar::store::{Acl, CreateMode, MemorySession, NodeStore, StoreError, StoreResult};
use znode_registrar::Service;

pub const ROOT: &str = "/registrator";

pub fn web_service() -> Service {
    Service::new("nginx", "10.0.0.5", 32768, "web-1", "80")
}

pub fn paths(store: &znode_registrar::store::MemoryStore) -> Vec<String> {
    store.dump().into_iter().map(|node| node.path).collect()
}

/// Session wrapper that fails selected operations.
pub struct FlakyStore {
    inner: MemorySession,
    fail_create_under: Mutex<Option<String>>,
    fail_delete_under: Mutex<Option<String>>,
    drop_parent_of: Mutex<Option<String>>,
}

impl FlakyStore {
    pub fn new(inner: MemorySession) -> Self {
        Self {
            inner,
            fail_create_under: Mutex::new(None),
            fail_delete_under: Mutex::new(None),
            drop_parent_of: Mutex::new(None),
        }
    }

    pub fn fail_creates_under(&self, prefix: &str) {
        *self.fail_create_under.lock().unwrap() = Some(prefix.to_string());
    }

    pub fn fail_deletes_under(&self, prefix: &str) {
        *self.fail_delete_under.lock().unwrap() = Some(prefix.to_string());
    }

    /// The next create of exactly `path` first deletes its parent, as a
    /// concurrent deregistration pruning it would.
    pub fn drop_parent_before_create(&self, path: &str) {
        *self.drop_parent_of.lock().unwrap() = Some(path.to_string());
    }

    fn matches(rule: &Mutex<Option<String>>, path: &str) -> bool {
        rule.lock()
            .unwrap()
            .as_deref()
            .map_or(false, |prefix| path.starts_with(prefix))
    }
}

impl NodeStore for FlakyStore {
    fn exists(&self, path: &str) -> StoreResult<bool> {
        self.inner.exists(path)
    }

    fn create(&self, path: &str, data: &[u8], mode: CreateMode, acl: &[Acl]) -> StoreResult<String> {
        if Self::matches(&self.fail_create_under, path) {
            return Err(StoreError::Other(format!("injected create failure at {path}")));
        }
        let mut drop_parent = self.drop_parent_of.lock().unwrap();
        if drop_parent.as_deref() == Some(path) {
            *drop_parent = None;
            if let Some(parent) = parent_of(path) {
                self.inner.delete(parent, None)?;
            }
        }
        drop(drop_parent);
        self.inner.create(path, data, mode, acl)
    }

    fn delete(&self, path: &str, version: Option<i32>) -> StoreResult<()> {
        if Self::matches(&self.fail_delete_under, path) {
            return Err(StoreError::Other(format!("injected delete failure at {path}")));
        }
        self.inner.delete(path, version)
    }

    fn children(&self, path: &str) -> StoreResult<Vec<String>> {
        self.inner.children(path)
    }

    fn get(&self, path: &str) -> StoreResult<Vec<u8>> {
        self.inner.get(path)
    }
}
