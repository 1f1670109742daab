use serde::{Deserialize, Serialize};

use crate::ObjectMeta;

/// Observed pod state. Only the fields the controller reasons about are kept.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: PodStatus,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub init_container_statuses: Vec<ContainerStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub container_statuses: Vec<ContainerStatus>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStatus {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: ContainerState,
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub restart_count: i32,
}

/// At most one of the fields is set by the source.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiting: Option<StateWaiting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running: Option<StateRunning>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminated: Option<StateTerminated>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateWaiting {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRunning {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateTerminated {
    #[serde(default)]
    pub exit_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Coarse classification of a pod's init container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InitState {
    /// No init container statuses have been reported yet.
    NotInitialized,
    Waiting { reason: Option<String> },
    Running,
    Terminated { exit_code: i32 },
    /// A status exists but carries no state.
    Unknown,
}

impl Pod {
    /// Classify the first init container.
    ///
    /// Pods managed by this controller carry a single init container that stages the workload;
    /// any further init containers are ignored.
    pub fn init_state(&self) -> InitState {
        let Some(first) = self.status.init_container_statuses.first() else {
            return InitState::NotInitialized;
        };
        let state = &first.state;
        if let Some(w) = &state.waiting {
            InitState::Waiting {
                reason: w.reason.clone(),
            }
        } else if state.running.is_some() {
            InitState::Running
        } else if let Some(t) = &state.terminated {
            InitState::Terminated {
                exit_code: t.exit_code,
            }
        } else {
            InitState::Unknown
        }
    }

    #[inline]
    pub fn phase(&self) -> &str {
        self.status.phase.as_deref().unwrap_or("Unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod_with_init(state: ContainerState) -> Pod {
        Pod {
            metadata: ObjectMeta::named("default", "wr-manager"),
            status: PodStatus {
                phase: Some("Pending".into()),
                init_container_statuses: vec![ContainerStatus {
                    name: "init".into(),
                    state,
                    ..Default::default()
                }],
                container_statuses: vec![],
            },
        }
    }

    #[test]
    fn no_statuses_means_not_initialized() {
        let pod = Pod::default();
        assert_eq!(pod.init_state(), InitState::NotInitialized);
        assert_eq!(pod.phase(), "Unknown");
    }

    #[test]
    fn classifies_each_state() {
        let waiting = pod_with_init(ContainerState {
            waiting: Some(StateWaiting {
                reason: Some("PodInitializing".into()),
                message: None,
            }),
            ..Default::default()
        });
        assert_eq!(
            waiting.init_state(),
            InitState::Waiting {
                reason: Some("PodInitializing".into())
            }
        );

        let running = pod_with_init(ContainerState {
            running: Some(StateRunning::default()),
            ..Default::default()
        });
        assert_eq!(running.init_state(), InitState::Running);

        let done = pod_with_init(ContainerState {
            terminated: Some(StateTerminated {
                exit_code: 0,
                reason: Some("Completed".into()),
            }),
            ..Default::default()
        });
        assert_eq!(done.init_state(), InitState::Terminated { exit_code: 0 });

        let empty = pod_with_init(ContainerState::default());
        assert_eq!(empty.init_state(), InitState::Unknown);
    }

    #[test]
    fn decodes_api_payload() {
        let json = r#"{
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {
                "name": "wr-manager-7f9",
                "namespace": "wr",
                "resourceVersion": "4812",
                "labels": {"app": "wr-manager"}
            },
            "spec": {"containers": []},
            "status": {
                "phase": "Pending",
                "initContainerStatuses": [
                    {"name": "init", "ready": false, "restartCount": 0,
                     "state": {"terminated": {"exitCode": 1, "reason": "Error"}}}
                ]
            }
        }"#;
        let pod: Pod = serde_json::from_str(json).unwrap();
        assert_eq!(pod.metadata.resource_version.as_deref(), Some("4812"));
        assert_eq!(pod.metadata.labels.get("app").map(String::as_str), Some("wr-manager"));
        assert_eq!(pod.init_state(), InitState::Terminated { exit_code: 1 });
    }
}
