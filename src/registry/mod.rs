//! Lifecycle surface driven by the container event dispatcher.

pub mod engine;

use log::{error, info, warn};

use crate::config::{ConnectionDescriptor, PingMode, RegistryConfig};
use crate::service::Service;
use crate::store::{Connector, NodeStore};
use crate::{Error, Result};

pub use engine::{DeregistrationReport, RegistrationEngine, RegistrationReport};

/// The four calls a registry backend answers for the dispatcher.
pub trait RegistryAdapter: Send + Sync {
    fn ping(&self) -> Result<()>;

    fn register(&self, service: &Service) -> Result<()>;

    fn deregister(&self, service: &Service) -> Result<()>;

    fn refresh(&self, service: &Service) -> Result<()>;
}

/// Registry backend for a ZooKeeper-style store session.
pub struct ZkAdapter<S: NodeStore> {
    engine: RegistrationEngine<S>,
    ping: PingMode,
}

impl<S: NodeStore> ZkAdapter<S> {
    /// Wraps an open session and bootstraps the registry skeleton.
    ///
    /// Losing the connection while bootstrapping aborts construction; any
    /// other bootstrap failure is logged and registration proceeds.
    pub fn new(store: S, config: RegistryConfig) -> Result<Self> {
        let engine = RegistrationEngine::new(store, &config)?;
        match engine.bootstrap() {
            Ok(()) => {}
            Err(err) if err.is_connectivity() => {
                error!("cannot bootstrap registry at {}: {err}", engine.layout().root_path());
                return Err(err.into());
            }
            Err(err) => warn!("registry bootstrap incomplete: {err}"),
        }
        Ok(Self {
            engine,
            ping: config.ping,
        })
    }

    /// Parses `uri`, opens a session through `connector` and bootstraps.
    pub fn connect<C>(connector: &C, uri: &str) -> Result<Self>
    where
        C: Connector<Store = S>,
    {
        let descriptor = ConnectionDescriptor::parse(uri)?;
        let store = connector.connect(&descriptor).map_err(|err| {
            error!("cannot connect to {}: {err}", descriptor.endpoints.join(","));
            Error::from(err)
        })?;
        info!(
            "connected to {} (session timeout {:?})",
            descriptor.endpoints.join(","),
            descriptor.session_timeout
        );
        Self::new(store, RegistryConfig::from_descriptor(&descriptor))
    }

    pub fn engine(&self) -> &RegistrationEngine<S> {
        &self.engine
    }
}

impl<S: NodeStore> RegistryAdapter for ZkAdapter<S> {
    fn ping(&self) -> Result<()> {
        match self.ping {
            PingMode::NoOp => Ok(()),
            PingMode::CheckRoot => {
                self.engine
                    .store()
                    .exists(self.engine.layout().root_path())?;
                Ok(())
            }
        }
    }

    fn register(&self, service: &Service) -> Result<()> {
        self.engine.register(service).map(|_| ())
    }

    fn deregister(&self, service: &Service) -> Result<()> {
        self.engine.deregister(service).map(|_| ())
    }

    fn refresh(&self, service: &Service) -> Result<()> {
        self.engine.refresh(service).map(|_| ())
    }
}
