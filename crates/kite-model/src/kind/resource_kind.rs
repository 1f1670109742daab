use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// The closed set of object kinds the controller knows how to watch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Pod,
    ConfigMap,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Pod, ResourceKind::ConfigMap];

    /// Singular kind name as it appears in object payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Pod => "Pod",
            ResourceKind::ConfigMap => "ConfigMap",
        }
    }

    /// Lowercase plural used in API paths and keys.
    pub fn plural(&self) -> &'static str {
        match self {
            ResourceKind::Pod => "pods",
            ResourceKind::ConfigMap => "configmaps",
        }
    }

    /// API group/version prefix for collection paths.
    pub fn api_prefix(&self) -> &'static str {
        match self {
            ResourceKind::Pod | ResourceKind::ConfigMap => "/api/v1",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase();
        match norm.as_str() {
            "pod" | "pods" | "po" => Ok(ResourceKind::Pod),
            "configmap" | "configmaps" | "cm" => Ok(ResourceKind::ConfigMap),
            _ => Err(ModelError::UnknownKind(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_aliases() {
        assert_eq!("Pod".parse::<ResourceKind>().unwrap(), ResourceKind::Pod);
        assert_eq!("pods".parse::<ResourceKind>().unwrap(), ResourceKind::Pod);
        assert_eq!(" CM ".parse::<ResourceKind>().unwrap(), ResourceKind::ConfigMap);
        assert!("deployment".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn plural_round_trips_through_parse() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.plural().parse::<ResourceKind>().unwrap(), kind);
        }
    }
}
