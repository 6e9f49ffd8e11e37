//! Node-path lifecycle for service registrations.
//!
//! A registration is one primary node under `containers/{host}` plus one
//! tag-index node per tag under `services/{tag}`. The nodes are written one at
//! a time; there is no multi-path transaction, so a call can leave a partial
//! registration behind. [`FailurePolicy`] decides whether that is reported
//! and rolled back or only logged.

use log::{debug, info, warn};

use crate::bootstrap::{Bootstrapper, EnsureOutcome};
use crate::codec::{self, ZnodeBody};
use crate::config::{FailurePolicy, RegistryConfig};
use crate::error::NodeFailure;
use crate::layout::{parent_of, RegistryLayout, TagKey};
use crate::service::Service;
use crate::store::{Acl, CreateMode, NodeStore, StoreError, StoreResult};
use crate::{Error, Result};

/// Nodes touched by a register or refresh call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationReport {
    /// Nodes created by this call, parents included, in creation order.
    pub created: Vec<String>,
    /// Registration nodes that were already present.
    pub existing: Vec<String>,
    pub failures: Vec<NodeFailure>,
}

impl RegistrationReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Nodes touched by a deregister call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeregistrationReport {
    pub removed: Vec<String>,
    /// Intermediate nodes deleted because they were left without children.
    pub pruned: Vec<String>,
    pub failures: Vec<NodeFailure>,
}

impl DeregistrationReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct RegistrationEngine<S: NodeStore> {
    store: S,
    layout: RegistryLayout,
    policy: FailurePolicy,
    acl: Vec<Acl>,
}

impl<S: NodeStore> RegistrationEngine<S> {
    pub fn new(store: S, config: &RegistryConfig) -> Result<Self> {
        Ok(Self {
            store,
            layout: RegistryLayout::new(&config.root)?,
            policy: config.failure_policy,
            acl: Acl::world_all(),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn layout(&self) -> &RegistryLayout {
        &self.layout
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Ensures the registry skeleton exists.
    pub fn bootstrap(&self) -> StoreResult<()> {
        Bootstrapper::new(&self.store).ensure_skeleton(&self.layout)
    }

    pub fn register(&self, service: &Service) -> Result<RegistrationReport> {
        let mut report = RegistrationReport::default();
        let host = service.container_id();

        let private_port = service.private_port().unwrap_or_else(|| {
            warn!(
                "{}: exposed port {:?} is not numeric, registering private port 0",
                service.name, service.origin.exposed_port
            );
            0
        });
        let body = ZnodeBody::from_service(service, private_port);
        let payload = codec::encode(&body).unwrap_or_else(|err| {
            warn!("{}: failed to encode node body, writing empty payload: {err}", service.name);
            Vec::new()
        });

        let container = self.layout.container_path(host);
        let primary = self.layout.service_path(host, &service.name);
        let parents = [container];
        self.ensure_parents(&parents, &mut report);
        self.create_node(&primary, &payload, CreateMode::Ephemeral, &parents, &mut report);

        let key = service.tag_key();
        let services_root = self.layout.services_root();
        for tag in &service.tags {
            let target = self.layout.tag_instance_path(tag, &key);
            let parents = self.layout.intermediate_paths(&services_root, &target);
            self.ensure_parents(&parents, &mut report);
            match &key {
                TagKey::Port(_) => {
                    self.create_node(&target, &payload, CreateMode::Ephemeral, &parents, &mut report);
                }
                TagKey::Scoped { uuid, subpath } => {
                    let scope = self.layout.tag_scope_path(tag, uuid, subpath);
                    if let Some(existing) = self.find_scoped_node(&scope, service) {
                        debug!("{existing} already indexes {}", service.name);
                        report.existing.push(existing);
                        continue;
                    }
                    self.create_node(
                        &target,
                        &payload,
                        CreateMode::EphemeralSequential,
                        &parents,
                        &mut report,
                    );
                }
            }
        }

        self.settle_registration(service, report)
    }

    /// Re-issues the full creation sequence; live nodes are left alone.
    pub fn refresh(&self, service: &Service) -> Result<RegistrationReport> {
        self.register(service)
    }

    pub fn deregister(&self, service: &Service) -> Result<DeregistrationReport> {
        let mut report = DeregistrationReport::default();
        let host = service.container_id();

        let primary = self.layout.service_path(host, &service.name);
        self.delete_node(&primary, &mut report);
        // `containers` itself is part of the skeleton, so one level is enough.
        self.prune(&self.layout.container_path(host), &mut report);

        let key = service.tag_key();
        let services_root = self.layout.services_root();
        for tag in &service.tags {
            let parent = match &key {
                TagKey::Port(_) => {
                    let target = self.layout.tag_instance_path(tag, &key);
                    self.delete_node(&target, &mut report);
                    // A port like `53/udp` nests the node one level deeper.
                    parent_of(&target)
                        .map_or_else(|| self.layout.tag_base_path(tag), str::to_string)
                }
                TagKey::Scoped { uuid, subpath } => {
                    let scope = self.layout.tag_scope_path(tag, uuid, subpath);
                    self.delete_owned_children(&scope, host, &mut report);
                    scope
                }
            };
            self.prune_upward(&parent, &services_root, &mut report);
        }

        self.settle_deregistration(service, report)
    }

    fn ensure_parents(&self, parents: &[String], report: &mut RegistrationReport) {
        let boot = Bootstrapper::new(&self.store);
        for parent in parents {
            match boot.ensure(parent) {
                Ok(EnsureOutcome::Created) => report.created.push(parent.clone()),
                Ok(_) => {}
                Err(err) => {
                    // The child create reports the failure.
                    warn!("failed to ensure {parent}: {err}");
                    return;
                }
            }
        }
    }

    fn create_node(
        &self,
        path: &str,
        payload: &[u8],
        mode: CreateMode,
        parents: &[String],
        report: &mut RegistrationReport,
    ) {
        let mut result = self.store.create(path, payload, mode, &self.acl);
        if let Err(StoreError::NoNode(_)) = result {
            // A concurrent deregistration pruned a parent after we ensured it.
            debug!("parent of {path} vanished, recreating");
            self.ensure_parents(parents, report);
            result = self.store.create(path, payload, mode, &self.acl);
        }

        match result {
            Ok(actual) => {
                debug!("created {actual}");
                report.created.push(actual);
            }
            Err(StoreError::NodeExists(_)) => {
                debug!("{path} already exists, keeping it");
                report.existing.push(path.to_string());
            }
            Err(err) => {
                warn!("failed to create {path}: {err}");
                report.failures.push(NodeFailure::new(path, err));
            }
        }
    }

    /// Finds this instance's node among the sequential children of `scope`.
    fn find_scoped_node(&self, scope: &str, service: &Service) -> Option<String> {
        let children = self.store.children(scope).ok()?;
        children.into_iter().find_map(|child| {
            let path = format!("{scope}/{child}");
            let body = codec::decode(&self.store.get(&path).ok()?).ok()?;
            (body.is_owned_by(service.container_id()) && body.name == service.name)
                .then_some(path)
        })
    }

    fn delete_node(&self, path: &str, report: &mut DeregistrationReport) {
        match self.store.delete(path, None) {
            Ok(()) => {
                debug!("deleted {path}");
                report.removed.push(path.to_string());
            }
            Err(StoreError::NoNode(_)) => debug!("{path} already gone"),
            Err(err) => {
                warn!("failed to delete {path}: {err}");
                report.failures.push(NodeFailure::new(path, err));
            }
        }
    }

    /// Sequential node names are store-assigned, so ownership is read from
    /// each child's body.
    ///
    /// Every child whose `ContainerID` matches is deleted, whatever its
    /// `Name`. Two services of one container that share a tag and the same
    /// `service_uuid`/`service_subpath` therefore lose both scoped nodes when
    /// either deregisters. The survivor's node comes back on its next refresh.
    fn delete_owned_children(&self, scope: &str, container_id: &str, report: &mut DeregistrationReport) {
        let children = match self.store.children(scope) {
            Ok(children) => children,
            Err(StoreError::NoNode(_)) => return,
            Err(err) => {
                warn!("failed to list {scope}: {err}");
                report.failures.push(NodeFailure::new(scope, err));
                return;
            }
        };

        for child in children {
            let path = format!("{scope}/{child}");
            let bytes = match self.store.get(&path) {
                Ok(bytes) => bytes,
                Err(StoreError::NoNode(_)) => continue,
                Err(err) => {
                    warn!("failed to read {path}: {err}");
                    report.failures.push(NodeFailure::new(path, err));
                    continue;
                }
            };
            match codec::decode(&bytes) {
                Ok(body) if body.is_owned_by(container_id) => self.delete_node(&path, report),
                Ok(_) => {}
                Err(err) => debug!("skipping {path}, undecodable body: {err}"),
            }
        }
    }

    /// Deletes `path` if it has no children. Returns whether it is gone.
    fn prune(&self, path: &str, report: &mut DeregistrationReport) -> bool {
        match self.store.children(path) {
            Ok(children) if children.is_empty() => {}
            Ok(_) => return false,
            Err(StoreError::NoNode(_)) => return true,
            Err(err) => {
                warn!("failed to list {path}: {err}");
                report.failures.push(NodeFailure::new(path, err));
                return false;
            }
        }

        match self.store.delete(path, None) {
            Ok(()) => {
                debug!("pruned {path}");
                report.pruned.push(path.to_string());
                true
            }
            Err(StoreError::NoNode(_)) => true,
            // Something registered underneath it since we looked.
            Err(StoreError::NotEmpty(_)) => false,
            Err(err) => {
                warn!("failed to prune {path}: {err}");
                report.failures.push(NodeFailure::new(path, err));
                false
            }
        }
    }

    /// Prunes `start` and its ancestors while they are empty, stopping below
    /// `stop`.
    fn prune_upward(&self, start: &str, stop: &str, report: &mut DeregistrationReport) {
        let prefix = format!("{stop}/");
        let mut current = start;
        while current.starts_with(&prefix) {
            if !self.prune(current, report) {
                break;
            }
            current = match parent_of(current) {
                Some(parent) => parent,
                None => break,
            };
        }
    }

    fn settle_registration(
        &self,
        service: &Service,
        report: RegistrationReport,
    ) -> Result<RegistrationReport> {
        if report.is_complete() {
            info!(
                "registered {} on {} ({} created, {} existing)",
                service.name,
                service.container_id(),
                report.created.len(),
                report.existing.len()
            );
            return Ok(report);
        }

        match self.policy {
            FailurePolicy::Lenient => {
                warn!(
                    "{} registered partially, {} node(s) failed",
                    service.name,
                    report.failures.len()
                );
                Ok(report)
            }
            FailurePolicy::Strict => {
                self.rollback(&report);
                Err(Error::PartialRegistration {
                    service: service.name.clone(),
                    failures: report.failures,
                })
            }
        }
    }

    /// Deletes what a failed call created, children before parents.
    fn rollback(&self, report: &RegistrationReport) {
        for path in report.created.iter().rev() {
            match self.store.delete(path, None) {
                Ok(()) => debug!("rolled back {path}"),
                Err(err) if err.is_benign() => {}
                Err(err) => warn!("failed to roll back {path}: {err}"),
            }
        }
    }

    fn settle_deregistration(
        &self,
        service: &Service,
        report: DeregistrationReport,
    ) -> Result<DeregistrationReport> {
        if report.is_complete() {
            info!(
                "deregistered {} on {} ({} removed, {} pruned)",
                service.name,
                service.container_id(),
                report.removed.len(),
                report.pruned.len()
            );
            return Ok(report);
        }

        match self.policy {
            FailurePolicy::Lenient => {
                warn!(
                    "{} deregistered partially, {} node(s) failed",
                    service.name,
                    report.failures.len()
                );
                Ok(report)
            }
            FailurePolicy::Strict => Err(Error::IncompleteDeregistration {
                service: service.name.clone(),
                failures: report.failures,
            }),
        }
    }
}
