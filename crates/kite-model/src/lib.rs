mod domain;
pub use domain::*;

mod kind;
pub use kind::*;

mod event;
pub use event::ChangeEvent;

mod error;
pub use error::ModelError;
