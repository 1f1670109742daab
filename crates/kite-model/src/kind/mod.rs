mod resource_kind;
pub use resource_kind::ResourceKind;

mod pod;
pub use pod::{
    ContainerState, ContainerStatus, InitState, Pod, PodStatus, StateRunning, StateTerminated,
    StateWaiting,
};

mod config_map;
pub use config_map::ConfigMap;

mod resource;
pub use resource::Resource;
