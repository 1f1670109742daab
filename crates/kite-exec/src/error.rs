use std::io;

use thiserror::Error;

/// Why one hook invocation did not succeed.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("hook program '{0}' not found")]
    MissingProgram(String),
    #[error("cannot start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("'{program}' exited with code {code}")]
    NonZeroExit { program: String, code: i32 },
    #[error("'{program}' was killed by a signal")]
    KilledBySignal { program: String },
    #[error("cannot encode resource for the hook: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("waiting for the hook failed: {0}")]
    Wait(#[from] io::Error),
    #[error("hook cancelled")]
    Cancelled,
}
