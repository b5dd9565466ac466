use thiserror::Error;

/// Errors from driving the Claude CLI.
#[derive(Debug, Error)]
pub enum Error {
    /// The `claude` binary is not on `PATH` and no explicit path was set.
    #[error("claude CLI binary not found")]
    BinaryNotFound,

    /// Spawning, feeding or reaping the process failed.
    #[error("process error: {0}")]
    ProcessError(String),

    /// No output line arrived within the configured timeout.
    #[error("timed out after {0}s waiting for agent output")]
    Timeout(u64),

    /// Configuration or prompt failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A stream-json line could not be decoded.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
