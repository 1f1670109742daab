use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid resource key: {0}")]
    InvalidKey(String),
    #[error("unknown resource kind: {0}")]
    UnknownKind(String),
    #[error("invalid label selector: {0}")]
    InvalidSelector(String),
    #[error("failed to decode {kind}: {reason}")]
    Decode { kind: &'static str, reason: String },
    #[error("object has no name")]
    MissingName,
}
