use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::{Error, Result};

/// URI scheme the adapter answers to.
pub const SCHEME: &str = "zookeeper";
pub const DEFAULT_PORT: u16 = 2181;
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(1);

/// What a register or deregister call does when some of its nodes fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log every node failure and report success.
    #[default]
    Lenient,
    /// Undo the nodes written by the failing call and return an error.
    Strict,
}

impl FromStr for FailurePolicy {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "lenient" => Ok(FailurePolicy::Lenient),
            "strict" => Ok(FailurePolicy::Strict),
            other => Err(Error::Config(format!("unknown failure policy: {other}"))),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Lenient => f.write_str("lenient"),
            FailurePolicy::Strict => f.write_str("strict"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PingMode {
    /// Always healthy; the session state is not consulted.
    #[default]
    NoOp,
    /// Round-trip an `exists` on the registry root.
    CheckRoot,
}

impl FromStr for PingMode {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "noop" | "none" => Ok(PingMode::NoOp),
            "root" | "check-root" => Ok(PingMode::CheckRoot),
            other => Err(Error::Config(format!("unknown ping mode: {other}"))),
        }
    }
}

/// Everything a connection URI says about the store and the registry.
///
/// `zookeeper://host[:port]/root[?endpoint=host:port&timeout_ms=N&policy=strict&ping=root]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub endpoints: Vec<String>,
    pub root: String,
    pub session_timeout: Duration,
    pub failure_policy: FailurePolicy,
    pub ping: PingMode,
}

impl ConnectionDescriptor {
    pub fn parse(uri: &str) -> Result<Self> {
        let url = Url::parse(uri).map_err(|e| Error::Config(format!("{uri}: {e}")))?;
        Self::from_url(&url)
    }

    pub fn from_url(url: &Url) -> Result<Self> {
        if url.scheme() != SCHEME {
            return Err(Error::Config(format!(
                "unsupported scheme {}, expected {SCHEME}",
                url.scheme()
            )));
        }
        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| Error::Config(format!("missing store host in {url}")))?;
        let port = url.port().unwrap_or(DEFAULT_PORT);

        let mut descriptor = Self {
            endpoints: vec![format!("{host}:{port}")],
            root: url.path().to_string(),
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            failure_policy: FailurePolicy::default(),
            ping: PingMode::default(),
        };

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "endpoint" => descriptor.endpoints.push(value.into_owned()),
                "timeout_ms" => {
                    let millis: u64 = value
                        .parse()
                        .map_err(|_| Error::Config(format!("invalid timeout_ms: {value}")))?;
                    descriptor.session_timeout = Duration::from_millis(millis);
                }
                "policy" => descriptor.failure_policy = value.parse()?,
                "ping" => descriptor.ping = value.parse()?,
                other => log::warn!("ignoring unknown connection option {other}={value}"),
            }
        }
        Ok(descriptor)
    }
}

/// Registry settings for an already-open session. The session timeout stays
/// on [`ConnectionDescriptor`], where the [`crate::store::Connector`] reads it.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub root: String,
    pub failure_policy: FailurePolicy,
    pub ping: PingMode,
}

impl RegistryConfig {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            failure_policy: FailurePolicy::default(),
            ping: PingMode::default(),
        }
    }

    pub fn strict(mut self) -> Self {
        self.failure_policy = FailurePolicy::Strict;
        self
    }

    pub fn from_descriptor(descriptor: &ConnectionDescriptor) -> Self {
        Self {
            root: descriptor.root.clone(),
            failure_policy: descriptor.failure_policy,
            ping: descriptor.ping,
        }
    }
}
