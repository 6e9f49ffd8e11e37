use log::{debug, info, warn};

use crate::layout::RegistryLayout;
use crate::store::{Acl, CreateMode, NodeStore, StoreError, StoreResult};

/// How [`Bootstrapper::ensure`] found or left a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    Existed,
    Created,
    /// Another client created the node between our check and our create.
    LostRace,
}

/// Creates persistent, empty, world-accessible nodes when they are missing.
pub struct Bootstrapper<'a, S: NodeStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: NodeStore + ?Sized> Bootstrapper<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Makes sure `path` exists.
    ///
    /// A failing existence check is treated as "absent". Losing a create race
    /// is not an error: the node exists either way.
    pub fn ensure(&self, path: &str) -> StoreResult<EnsureOutcome> {
        match self.store.exists(path) {
            Ok(true) => return Ok(EnsureOutcome::Existed),
            Ok(false) => {}
            Err(err) => warn!("exists check failed for {path}, assuming absent: {err}"),
        }

        match self
            .store
            .create(path, &[], CreateMode::Persistent, &Acl::world_all())
        {
            Ok(_) => {
                debug!("created {path}");
                Ok(EnsureOutcome::Created)
            }
            Err(StoreError::NodeExists(_)) => {
                debug!("{path} created concurrently by another client");
                Ok(EnsureOutcome::LostRace)
            }
            Err(err) => Err(err),
        }
    }

    /// Ensures each path in order, stopping at the first failure.
    pub fn ensure_all<I, P>(&self, paths: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        for path in paths {
            self.ensure(path.as_ref())?;
        }
        Ok(())
    }

    /// Ensures the registry root and its `containers` and `services` nodes.
    pub fn ensure_skeleton(&self, layout: &RegistryLayout) -> StoreResult<()> {
        self.ensure_all(layout.skeleton())?;
        info!("registry skeleton ready under {}", layout.root_path());
        Ok(())
    }
}
