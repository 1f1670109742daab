mod source;
pub use source::HttpSource;

mod config;
pub use config::{SERVICE_ACCOUNT_DIR, WatchConfig};

mod errors;
pub use errors::SourceError;
