mod error;
pub use error::ExecError;

mod config;
pub use config::ExecConfig;

pub mod hook;
pub use hook::{ExecReconciler, HookEvent};

mod util;

pub mod prelude {
    pub use crate::{ExecConfig, ExecError, ExecReconciler, HookEvent};
}
