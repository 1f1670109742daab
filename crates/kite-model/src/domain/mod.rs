mod key;
pub use key::ResourceKey;

mod meta;
pub use meta::{Labels, ObjectMeta};

mod selector;
pub use selector::{LabelSelector, Requirement};

/// Opaque version string assigned by the watch source.
///
/// Only ever compared for equality or handed back to the source when resuming a watch.
pub type ResourceVersion = String;
