//! Path conventions for the registration tree.
//!
//! ```text
//! {root}/
//! ├── containers/
//! │   └── {hostname}/{service}                 ← ephemeral, one per instance
//! └── services/
//!     └── {tag}/
//!         ├── {exposed_port}                   ← ephemeral
//!         └── {uuid}/{subpath}/actor{seq}      ← ephemeral + sequential
//! ```
//!
//! Components are joined verbatim. Names containing `/` are a caller contract
//! violation and are not rejected here; only the configured root is checked.

use std::fmt;

pub const CONTAINERS_DIR: &str = "containers";
pub const SERVICES_DIR: &str = "services";
/// Name prefix of scoped tag-index nodes; the store appends the sequence.
pub const ACTOR_PREFIX: &str = "actor";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    EmptyComponent { field: &'static str },
    InvalidComponent { field: &'static str, value: String },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::EmptyComponent { field } => {
                write!(f, "empty path component: {field}")
            }
            PathError::InvalidComponent { field, value } => {
                write!(f, "invalid path component for {field}: {value}")
            }
        }
    }
}

impl std::error::Error for PathError {}

type Result<T> = std::result::Result<T, PathError>;

/// Selects the shape of a tag-index node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagKey {
    /// `services/{tag}/{exposed_port}`
    Port(String),
    /// `services/{tag}/{uuid}/{subpath}/actor{seq}`
    Scoped { uuid: String, subpath: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryLayout {
    root: String,
}

impl RegistryLayout {
    /// Builds a layout under `root`.
    ///
    /// Trailing slashes are trimmed and a leading slash is added, so
    /// `registrator`, `/registrator` and `/registrator/` are equivalent. An
    /// empty root (or `/`) places the tree directly under the store root.
    pub fn new(root: &str) -> Result<Self> {
        let trimmed = root.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self {
                root: String::new(),
            });
        }
        for segment in trimmed.split('/') {
            validate_root_segment(segment)?;
        }
        Ok(Self {
            root: format!("/{trimmed}"),
        })
    }

    /// The normalized root prefix, empty when the tree lives at `/`.
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn root_path(&self) -> &str {
        if self.root.is_empty() {
            "/"
        } else {
            &self.root
        }
    }

    pub fn containers_root(&self) -> String {
        format!("{}/{CONTAINERS_DIR}", self.root)
    }

    pub fn services_root(&self) -> String {
        format!("{}/{SERVICES_DIR}", self.root)
    }

    /// Path: `{root}/containers/{host}`
    pub fn container_path(&self, host: &str) -> String {
        format!("{}/{host}", self.containers_root())
    }

    /// Path: `{root}/containers/{host}/{name}`
    pub fn service_path(&self, host: &str, name: &str) -> String {
        format!("{}/{name}", self.container_path(host))
    }

    /// Path: `{root}/services/{tag}`
    pub fn tag_base_path(&self, tag: &str) -> String {
        format!("{}/{tag}", self.services_root())
    }

    /// Path: `{root}/services/{tag}/{uuid}/{subpath}`
    pub fn tag_scope_path(&self, tag: &str, uuid: &str, subpath: &str) -> String {
        format!("{}/{uuid}/{subpath}", self.tag_base_path(tag))
    }

    /// Path of the tag-index node for `key`.
    ///
    /// For [`TagKey::Scoped`] this is the name passed to a sequential create;
    /// the final node name carries a store-assigned suffix.
    pub fn tag_instance_path(&self, tag: &str, key: &TagKey) -> String {
        match key {
            TagKey::Port(port) => format!("{}/{port}", self.tag_base_path(tag)),
            TagKey::Scoped { uuid, subpath } => {
                format!("{}/{ACTOR_PREFIX}", self.tag_scope_path(tag, uuid, subpath))
            }
        }
    }

    /// Persistent nodes the adapter needs before any registration, parents
    /// first.
    pub fn skeleton(&self) -> Vec<String> {
        let mut paths = Vec::new();
        let mut prefix = String::new();
        for segment in self.root.split('/').filter(|s| !s.is_empty()) {
            prefix.push('/');
            prefix.push_str(segment);
            paths.push(prefix.clone());
        }
        paths.push(self.containers_root());
        paths.push(self.services_root());
        paths
    }

    /// Persistent ancestors of `path` strictly below `base`, parents first.
    ///
    /// Returns an empty list when `path` is not under `base`.
    pub fn intermediate_paths(&self, base: &str, path: &str) -> Vec<String> {
        let rest = match path.strip_prefix(base).and_then(|r| r.strip_prefix('/')) {
            Some(rest) => rest,
            None => return Vec::new(),
        };
        let mut paths = Vec::new();
        let mut prefix = base.to_string();
        let segments: Vec<&str> = rest.split('/').collect();
        for segment in &segments[..segments.len().saturating_sub(1)] {
            prefix.push('/');
            prefix.push_str(segment);
            paths.push(prefix.clone());
        }
        paths
    }
}

/// Parent of an absolute node path; `None` for `/`.
pub fn parent_of(path: &str) -> Option<&str> {
    if path == "/" || path.is_empty() {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Final segment of a node path.
pub fn node_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn validate_root_segment(value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(PathError::EmptyComponent { field: "root" });
    }
    if value == "." || value == ".." || value.contains('\0') {
        return Err(PathError::InvalidComponent {
            field: "root",
            value: value.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> RegistryLayout {
        RegistryLayout::new("/registrator").unwrap()
    }

    #[test]
    fn test_root_normalization() {
        assert_eq!(RegistryLayout::new("registrator").unwrap().root(), "/registrator");
        assert_eq!(RegistryLayout::new("/registrator/").unwrap().root(), "/registrator");
        assert_eq!(RegistryLayout::new("/").unwrap().root(), "");
        assert_eq!(RegistryLayout::new("").unwrap().root_path(), "/");
    }

    #[test]
    fn test_root_rejects_bad_segments() {
        let err = RegistryLayout::new("/a//b").unwrap_err();
        assert!(matches!(err, PathError::EmptyComponent { field: "root" }));
        assert!(RegistryLayout::new("/a/../b").is_err());
    }

    #[test]
    fn test_container_and_service_paths() {
        let layout = layout();
        assert_eq!(layout.container_path("web-1"), "/registrator/containers/web-1");
        assert_eq!(
            layout.service_path("web-1", "nginx"),
            "/registrator/containers/web-1/nginx"
        );
    }

    #[test]
    fn test_tag_paths() {
        let layout = layout();
        assert_eq!(layout.tag_base_path("web"), "/registrator/services/web");
        assert_eq!(
            layout.tag_instance_path("web", &TagKey::Port("80".to_string())),
            "/registrator/services/web/80"
        );
        let scoped = TagKey::Scoped {
            uuid: "abc".to_string(),
            subpath: "p1".to_string(),
        };
        assert_eq!(
            layout.tag_instance_path("web", &scoped),
            "/registrator/services/web/abc/p1/actor"
        );
    }

    #[test]
    fn test_paths_under_store_root() {
        let layout = RegistryLayout::new("").unwrap();
        assert_eq!(layout.container_path("h"), "/containers/h");
        assert_eq!(layout.skeleton(), vec!["/containers", "/services"]);
    }

    #[test]
    fn test_skeleton_lists_parents_first() {
        let layout = RegistryLayout::new("/a/b").unwrap();
        assert_eq!(
            layout.skeleton(),
            vec!["/a", "/a/b", "/a/b/containers", "/a/b/services"]
        );
    }

    #[test]
    fn test_intermediate_paths() {
        let layout = layout();
        let base = layout.services_root();
        let target = layout.tag_instance_path(
            "web",
            &TagKey::Scoped {
                uuid: "abc".to_string(),
                subpath: "p1".to_string(),
            },
        );
        assert_eq!(
            layout.intermediate_paths(&base, &target),
            vec![
                "/registrator/services/web",
                "/registrator/services/web/abc",
                "/registrator/services/web/abc/p1",
            ]
        );
        assert!(layout.intermediate_paths("/other", &target).is_empty());
    }

    #[test]
    fn test_parent_of() {
        assert_eq!(parent_of("/a/b/c"), Some("/a/b"));
        assert_eq!(parent_of("/a"), Some("/"));
        assert_eq!(parent_of("/"), None);
        assert_eq!(node_name("/a/b/actor0000000001"), "actor0000000001");
    }
}
