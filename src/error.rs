use std::path::PathBuf;

use thiserror::Error;

/// Why an image could not be fetched or stored.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("empty image link")]
    EmptyUrl,
    #[error("HTTP {0}")]
    Status(u16),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("cannot write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AcquireError {
    /// Transport errors, 429 and 5xx are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            AcquireError::Transport(_) => true,
            AcquireError::Status(code) => *code == 429 || (500..600).contains(code),
            AcquireError::EmptyUrl | AcquireError::Io { .. } => false,
        }
    }
}

impl From<reqwest::Error> for AcquireError {
    fn from(e: reqwest::Error) -> Self {
        AcquireError::Transport(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("cannot open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot decode {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}
