use std::io;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("command execution failed: {0}")]
    Command(#[from] io::Error),

    #[error("gpg exited with status {status}: {stderr}")]
    Gpg { status: i32, stderr: String },

    /// gpg failed while attached to the terminal; its diagnostics went
    /// straight to the operator and were not captured.
    #[error("gpg exited with status {status}")]
    GpgExited { status: i32 },

    #[error("invalid identifier '{identifier}': {reason}")]
    InvalidIdentifier { identifier: String, reason: String },

    #[error("invalid keyserver '{server}': {reason}")]
    InvalidServer { server: String, reason: String },

    #[error("invalid operands: {0}")]
    InvalidOperands(String),

    #[error("unexpected keyserver page layout: marker '{marker}' not found")]
    UnexpectedPageLayout { marker: &'static str },

    #[error("keyserver request failed: {0}")]
    Transport(String),

    #[error("operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("identifier '{identifier}' matches several keys: {}", matches.join(", "))]
    AmbiguousIdentifier {
        identifier: String,
        matches: Vec<String>,
    },

    #[error("selection {index} is out of range (0..{count})")]
    InvalidSelection { index: usize, count: usize },

    #[error("no candidate confirmed after {attempts} attempts")]
    ConfirmationDeclined { attempts: usize },

    #[error("operator prompt failed: {0}")]
    Prompt(io::Error),

    #[error("keyring not initialized")]
    KeyringNotInitialized,

    #[error("permission denied")]
    PermissionDenied,
}

impl Error {
    /// Whether the keyserver could not be asked at all, as opposed to
    /// answering that it has no matching key.
    pub fn is_remote_failure(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::Timeout(_) | Error::UnexpectedPageLayout { .. }
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
