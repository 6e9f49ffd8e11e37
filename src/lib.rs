//! Service registration adapter for ZooKeeper-style coordination stores.
//!
//! Running service instances are projected onto an ephemeral-node tree so
//! that discovery clients can find live services by watching paths:
//!
//! ```text
//! {root}/
//! ├── containers/{hostname}/{service}          ← primary registration
//! └── services/{tag}/{exposed_port}            ← tag index
//!     services/{tag}/{uuid}/{subpath}/actorNNN ← scoped tag index
//! ```

pub mod bootstrap;
pub mod codec;
pub mod config;
pub mod error;
pub mod layout;
pub mod registry;
pub mod replay;
pub mod service;
pub mod store;

pub use config::{ConnectionDescriptor, FailurePolicy, PingMode, RegistryConfig};
pub use error::{Error, Result};
pub use registry::{RegistrationEngine, RegistryAdapter, ZkAdapter};
pub use service::{Service, ServiceOrigin};
pub use store::{Acl, CreateMode, NodeStore, StoreError};
