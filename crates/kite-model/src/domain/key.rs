use std::{fmt, str::FromStr};

use crate::{ModelError, ResourceKind};

/// Identity of a watched object: kind, optional namespace and name.
///
/// The key is the unit of deduplication in the change queue and the lookup key of the cache.
/// It renders as `{plural}/{namespace}/{name}` (or `{plural}/{name}` for cluster-scoped objects)
/// and parses back from the same form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    kind: ResourceKind,
    namespace: Option<String>,
    name: String,
}

impl ResourceKey {
    /// Create a namespaced key.
    pub fn new(kind: ResourceKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// Create a key for an object without a namespace.
    pub fn cluster_scoped(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: None,
            name: name.into(),
        }
    }

    #[inline]
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    #[inline]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind.plural(), ns, self.name),
            None => write!(f, "{}/{}", self.kind.plural(), self.name),
        }
    }
}

impl FromStr for ResourceKey {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(ModelError::InvalidKey(s.to_string()));
        }
        match parts.as_slice() {
            [kind, name] => Ok(Self::cluster_scoped(kind.parse()?, *name)),
            [kind, ns, name] => Ok(Self::new(kind.parse()?, *ns, *name)),
            _ => Err(ModelError::InvalidKey(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_namespaced_key() {
        let key = ResourceKey::new(ResourceKind::Pod, "default", "wr-manager-0");
        assert_eq!(key.to_string(), "pods/default/wr-manager-0");
    }

    #[test]
    fn display_cluster_scoped_key() {
        let key = ResourceKey::cluster_scoped(ResourceKind::ConfigMap, "scripts");
        assert_eq!(key.to_string(), "configmaps/scripts");
        assert!(key.namespace().is_none());
    }

    #[test]
    fn parse_accepts_rendered_form() {
        let key: ResourceKey = "pods/default/web".parse().unwrap();
        assert_eq!(key.kind(), ResourceKind::Pod);
        assert_eq!(key.namespace(), Some("default"));
        assert_eq!(key.name(), "web");
    }

    #[test]
    fn parse_rejects_empty_segments_and_bad_shapes() {
        assert!("pods//web".parse::<ResourceKey>().is_err());
        assert!("pods".parse::<ResourceKey>().is_err());
        assert!("pods/a/b/c".parse::<ResourceKey>().is_err());
        assert!("widgets/a/b".parse::<ResourceKey>().is_err());
    }

    #[test]
    fn keys_differ_by_kind() {
        let a = ResourceKey::new(ResourceKind::Pod, "ns", "x");
        let b = ResourceKey::new(ResourceKind::ConfigMap, "ns", "x");
        assert_ne!(a, b);
    }
}
