//! Offline replay of container lifecycle events.
//!
//! Events are JSON lines:
//!
//! ```text
//! {"action":"register","service":{"name":"nginx","ip":"10.0.0.5","port":32768,
//!   "origin":{"hostname":"web-1","exposed_port":"80"},"tags":["web"]}}
//! {"action":"deregister","service":{...}}
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::registry::RegistryAdapter;
use crate::service::Service;
use crate::store::memory::NodeInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Register,
    Deregister,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub action: Action,
    pub service: Service,
}

pub fn load_events(path: &Path) -> Result<Vec<LifecycleEvent>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    parse_events(BufReader::new(file)).with_context(|| format!("parse {}", path.display()))
}

pub fn parse_events(reader: impl BufRead) -> Result<Vec<LifecycleEvent>> {
    let mut events = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let event: LifecycleEvent = serde_json::from_str(trimmed)
            .with_context(|| format!("line {}: invalid lifecycle event", idx + 1))?;
        events.push(event);
    }
    Ok(events)
}

/// Applies events in order. Returns how many calls reported an error; a
/// failing call does not stop the replay.
pub fn apply_events<A: RegistryAdapter + ?Sized>(adapter: &A, events: &[LifecycleEvent]) -> usize {
    let mut failed = 0;
    for event in events {
        let result = match event.action {
            Action::Register => adapter.register(&event.service),
            Action::Deregister => adapter.deregister(&event.service),
            Action::Refresh => adapter.refresh(&event.service),
        };
        if let Err(err) = result {
            warn!("{:?} {} failed: {err}", event.action, event.service.name);
            failed += 1;
        }
    }
    failed
}

/// One line per node, indented by depth; ephemeral nodes are marked `*`.
pub fn render_tree(nodes: &[NodeInfo]) -> String {
    let mut out = String::new();
    for node in nodes {
        let depth = node.path.matches('/').count().saturating_sub(1);
        let name = crate::layout::node_name(&node.path);
        let marker = if node.ephemeral_owner.is_some() { " *" } else { "" };
        let _ = writeln!(out, "{}{name}{marker}", "  ".repeat(depth));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use tempfile::NamedTempFile;

    use crate::config::RegistryConfig;
    use crate::registry::ZkAdapter;
    use crate::store::MemoryStore;

    const EVENTS: &str = r#"
# web comes up, then goes away
{"action":"register","service":{"name":"nginx","ip":"10.0.0.5","port":32768,"origin":{"hostname":"web-1","exposed_port":"80"},"tags":["web"]}}
{"action":"refresh","service":{"name":"nginx","ip":"10.0.0.5","port":32768,"origin":{"hostname":"web-1","exposed_port":"80"},"tags":["web"]}}
{"action":"register","service":{"name":"redis","ip":"10.0.0.7","port":6379,"origin":{"hostname":"cache-1","exposed_port":"6379"}}}
{"action":"deregister","service":{"name":"nginx","ip":"10.0.0.5","port":32768,"origin":{"hostname":"web-1","exposed_port":"80"},"tags":["web"]}}
"#;

    #[test]
    fn test_load_and_apply_events() {
        let mut file = NamedTempFile::new().expect("tempfile");
        file.write_all(EVENTS.as_bytes()).expect("write events");

        let events = load_events(file.path()).expect("load events");
        assert_eq!(events.len(), 4);
        assert_eq!(events[1].action, Action::Refresh);

        let store = MemoryStore::new();
        let adapter = ZkAdapter::new(store.session(), RegistryConfig::new("/r")).expect("adapter");
        assert_eq!(apply_events(&adapter, &events), 0);

        let rendered = render_tree(&store.dump());
        assert_eq!(
            rendered,
            "r\n  containers\n    cache-1\n      redis *\n  services\n"
        );
    }

    #[test]
    fn test_parse_reports_bad_line() {
        let err = parse_events("{\"action\":\"explode\"}\n".as_bytes()).unwrap_err();
        assert!(format!("{err:#}").contains("line 1"));
    }
}
