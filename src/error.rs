use std::fmt;

use crate::layout::PathError;
use crate::store::StoreError;

/// A single node operation that failed during a multi-node call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFailure {
    pub path: String,
    pub error: StoreError,
}

impl NodeFailure {
    pub fn new(path: impl Into<String>, error: StoreError) -> Self {
        Self {
            path: path.into(),
            error,
        }
    }
}

impl fmt::Display for NodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.error)
    }
}

#[derive(Debug)]
pub enum Error {
    Store(StoreError),
    Codec(serde_json::Error),
    Config(String),
    Path(PathError),
    PartialRegistration {
        service: String,
        failures: Vec<NodeFailure>,
    },
    IncompleteDeregistration {
        service: String,
        failures: Vec<NodeFailure>,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Store(err) => write!(f, "store error: {err}"),
            Error::Codec(err) => write!(f, "payload codec error: {err}"),
            Error::Config(msg) => write!(f, "invalid configuration: {msg}"),
            Error::Path(err) => write!(f, "invalid path: {err}"),
            Error::PartialRegistration { service, failures } => {
                write!(
                    f,
                    "registration of {service} rolled back after {} node failure(s): {}",
                    failures.len(),
                    join_failures(failures)
                )
            }
            Error::IncompleteDeregistration { service, failures } => {
                write!(
                    f,
                    "deregistration of {service} left {} node(s) behind: {}",
                    failures.len(),
                    join_failures(failures)
                )
            }
        }
    }
}

fn join_failures(failures: &[NodeFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Store(err) => Some(err),
            Error::Codec(err) => Some(err),
            Error::Path(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for Error {
    fn from(value: StoreError) -> Self {
        Error::Store(value)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Codec(value)
    }
}

impl From<PathError> for Error {
    fn from(value: PathError) -> Self {
        Error::Path(value)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
