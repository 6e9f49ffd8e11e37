use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::layout::TagKey;

/// Attribute naming the scope identifier of a scoped tag-index node.
pub const ATTR_SERVICE_UUID: &str = "service_uuid";
/// Attribute naming the sub-path of a scoped tag-index node.
pub const ATTR_SERVICE_SUBPATH: &str = "service_subpath";

/// Where a service instance runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceOrigin {
    pub hostname: String,
    /// Port exposed on the container, as reported by the runtime.
    pub exposed_port: String,
}

/// A running service instance as handed over by the lifecycle dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub ip: String,
    pub port: u16,
    pub origin: ServiceOrigin,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
}

impl Service {
    pub fn new(
        name: impl Into<String>,
        ip: impl Into<String>,
        port: u16,
        hostname: impl Into<String>,
        exposed_port: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            ip: ip.into(),
            port,
            origin: ServiceOrigin {
                hostname: hostname.into(),
                exposed_port: exposed_port.into(),
            },
            tags: BTreeSet::new(),
            attrs: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn container_id(&self) -> &str {
        &self.origin.hostname
    }

    /// Exposed container port as an integer; unparsable values yield `None`.
    pub fn private_port(&self) -> Option<u16> {
        self.origin.exposed_port.trim().parse().ok()
    }

    /// Shape of this instance's tag-index nodes.
    ///
    /// Scoped only when both `service_uuid` and `service_subpath` are set.
    pub fn tag_key(&self) -> TagKey {
        match (
            self.attrs.get(ATTR_SERVICE_UUID),
            self.attrs.get(ATTR_SERVICE_SUBPATH),
        ) {
            (Some(uuid), Some(subpath)) => TagKey::Scoped {
                uuid: uuid.clone(),
                subpath: subpath.clone(),
            },
            _ => TagKey::Port(self.origin.exposed_port.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_key_defaults_to_port() {
        let service = Service::new("nginx", "10.0.0.5", 32768, "web-1", "80");
        assert_eq!(service.tag_key(), TagKey::Port("80".to_string()));
    }

    #[test]
    fn test_tag_key_needs_both_attrs() {
        let service =
            Service::new("nginx", "10.0.0.5", 32768, "web-1", "80").with_attr(ATTR_SERVICE_UUID, "abc");
        assert_eq!(service.tag_key(), TagKey::Port("80".to_string()));

        let service = service.with_attr(ATTR_SERVICE_SUBPATH, "p1");
        assert_eq!(
            service.tag_key(),
            TagKey::Scoped {
                uuid: "abc".to_string(),
                subpath: "p1".to_string(),
            }
        );
    }

    #[test]
    fn test_private_port_parse() {
        let service = Service::new("nginx", "10.0.0.5", 32768, "web-1", "8080");
        assert_eq!(service.private_port(), Some(8080));
        let service = Service::new("nginx", "10.0.0.5", 32768, "web-1", "8080/udp");
        assert_eq!(service.private_port(), None);
    }

    #[test]
    fn test_deserialize_minimal_json() {
        let json = r#"{"name":"redis","ip":"10.0.0.7","port":6379,
            "origin":{"hostname":"cache-1","exposed_port":"6379"}}"#;
        let service: Service = serde_json::from_str(json).unwrap();
        assert!(service.tags.is_empty());
        assert!(service.attrs.is_empty());
        assert_eq!(service.container_id(), "cache-1");
    }
}
