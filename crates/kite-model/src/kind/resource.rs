use serde::{Deserialize, Serialize};

use crate::{ConfigMap, Labels, ModelError, ObjectMeta, Pod, ResourceKey, ResourceKind};

/// A watched object of one of the supported kinds.
///
/// The kind is resolved once when the object is decoded; everything downstream matches on the
/// variant instead of inspecting payloads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Resource {
    Pod(Pod),
    ConfigMap(ConfigMap),
}

impl Resource {
    /// Decode an API payload of a known kind.
    ///
    /// List responses omit `kind` on their items, so the caller supplies it.
    pub fn decode(kind: ResourceKind, value: serde_json::Value) -> Result<Self, ModelError> {
        let decode_err = |e: serde_json::Error| ModelError::Decode {
            kind: kind.as_str(),
            reason: e.to_string(),
        };
        match kind {
            ResourceKind::Pod => serde_json::from_value(value)
                .map(Resource::Pod)
                .map_err(decode_err),
            ResourceKind::ConfigMap => serde_json::from_value(value)
                .map(Resource::ConfigMap)
                .map_err(decode_err),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Pod(_) => ResourceKind::Pod,
            Resource::ConfigMap(_) => ResourceKind::ConfigMap,
        }
    }

    pub fn meta(&self) -> &ObjectMeta {
        match self {
            Resource::Pod(p) => &p.metadata,
            Resource::ConfigMap(c) => &c.metadata,
        }
    }

    pub fn meta_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Resource::Pod(p) => &mut p.metadata,
            Resource::ConfigMap(c) => &mut c.metadata,
        }
    }

    /// Derive the cache/queue key from kind, namespace and name.
    pub fn key(&self) -> Result<ResourceKey, ModelError> {
        let meta = self.meta();
        if meta.name.is_empty() {
            return Err(ModelError::MissingName);
        }
        Ok(match &meta.namespace {
            Some(ns) => ResourceKey::new(self.kind(), ns.clone(), meta.name.clone()),
            None => ResourceKey::cluster_scoped(self.kind(), meta.name.clone()),
        })
    }

    #[inline]
    pub fn resource_version(&self) -> Option<&str> {
        self.meta().resource_version.as_deref()
    }

    #[inline]
    pub fn labels(&self) -> &Labels {
        &self.meta().labels
    }

    pub fn as_pod(&self) -> Option<&Pod> {
        match self {
            Resource::Pod(p) => Some(p),
            _ => None,
        }
    }
}

impl From<Pod> for Resource {
    fn from(pod: Pod) -> Self {
        Resource::Pod(pod)
    }
}

impl From<ConfigMap> for Resource {
    fn from(cm: ConfigMap) -> Self {
        Resource::ConfigMap(cm)
    }
}
