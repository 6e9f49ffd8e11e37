//! Node body written at primary and tag-index nodes.
//!
//! The body is a JSON object with Go-style field names, which is what
//! discovery clients watching the tree already parse:
//!
//! ```json
//! {"Name":"nginx","IP":"10.0.0.5","PublicPort":32768,"PrivatePort":80,
//!  "ContainerID":"web-1","Tags":["web"],"Attrs":{}}
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::service::Service;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ZnodeBody {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "IP")]
    pub ip: String,
    #[serde(rename = "PublicPort")]
    pub public_port: u16,
    #[serde(rename = "PrivatePort")]
    pub private_port: u16,
    /// Owner of the node; the only link from a tag-index node back to its
    /// container.
    #[serde(
        rename = "ContainerID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub container_id: Option<String>,
    #[serde(rename = "Tags", default)]
    pub tags: Vec<String>,
    #[serde(rename = "Attrs", default)]
    pub attrs: BTreeMap<String, String>,
}

impl ZnodeBody {
    pub fn from_service(service: &Service, private_port: u16) -> Self {
        Self {
            name: service.name.clone(),
            ip: service.ip.clone(),
            public_port: service.port,
            private_port,
            container_id: Some(service.container_id().to_string()),
            tags: service.tags.iter().cloned().collect(),
            attrs: service.attrs.clone(),
        }
    }

    pub fn is_owned_by(&self, container_id: &str) -> bool {
        self.container_id.as_deref() == Some(container_id)
    }
}

pub fn encode(body: &ZnodeBody) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(body)?)
}

pub fn decode(bytes: &[u8]) -> Result<ZnodeBody> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(tags: &[&str], attrs: &[(&str, &str)]) -> ZnodeBody {
        ZnodeBody {
            name: "nginx".to_string(),
            ip: "10.0.0.5".to_string(),
            public_port: 32768,
            private_port: 80,
            container_id: Some("web-1".to_string()),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_round_trip_empty_and_populated() {
        for body in [
            sample(&[], &[]),
            sample(&["web", "api"], &[]),
            sample(&[], &[("service_uuid", "abc")]),
            sample(&["web"], &[("service_uuid", "abc"), ("service_subpath", "p1")]),
        ] {
            let bytes = encode(&body).unwrap();
            assert_eq!(decode(&bytes).unwrap(), body);
        }
    }

    #[test]
    fn test_wire_field_names() {
        let bytes = encode(&sample(&["web"], &[("k", "v")])).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let object = value.as_object().unwrap();
        for field in [
            "Name",
            "IP",
            "PublicPort",
            "PrivatePort",
            "ContainerID",
            "Tags",
            "Attrs",
        ] {
            assert!(object.contains_key(field), "missing {field}");
        }
        assert_eq!(object["PrivatePort"], 80);
    }

    #[test]
    fn test_container_id_is_optional() {
        let mut body = sample(&[], &[]);
        body.container_id = None;
        let bytes = encode(&body).unwrap();
        assert!(!String::from_utf8(bytes.clone()).unwrap().contains("ContainerID"));
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.container_id, None);
        assert!(!decoded.is_owned_by("web-1"));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode(b"").is_err());
        assert!(decode(b"10.0.0.5:80").is_err());
    }
}
