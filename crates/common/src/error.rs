//! Error types shared across DualSync crates.

use std::path::PathBuf;

/// Top-level error type for DualSync operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Player error: {message}")]
    Player { message: String },

    #[error("Synchronization error: {message}")]
    Sync { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Encoder error: {message}")]
    Encoder { message: String },

    #[error("Export error: {message}")]
    Export { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using SyncError.
pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    pub fn player(msg: impl Into<String>) -> Self {
        Self::Player {
            message: msg.into(),
        }
    }

    pub fn sync(msg: impl Into<String>) -> Self {
        Self::Sync {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn encoder(msg: impl Into<String>) -> Self {
        Self::Encoder {
            message: msg.into(),
        }
    }

    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }
}
