use std::io;

use thiserror::Error;

use codeflow_core::CodeflowError;

#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Core(#[from] CodeflowError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),
}
