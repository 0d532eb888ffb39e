//! Error type shared by every Codeflow operation.

use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T, E = CodeflowError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum CodeflowError {
    #[error("malformed location link `{link}`: {reason}")]
    MalformedLink { link: String, reason: &'static str },

    #[error("no workspace folder is open")]
    NoWorkspace,

    #[error("path `{0}` points outside the workspace")]
    PathEscapesWorkspace(String),

    #[error("invalid diagram document: {0}")]
    InvalidDocument(String),

    #[error("error writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid glob pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("collation data unavailable: {0}")]
    Collation(String),

    #[error("cannot open editor: {0}")]
    Editor(String),

    #[error("renderer channel is closed")]
    ChannelClosed,
}

/// Stable, wire-visible classification of a [`CodeflowError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    MalformedLink,
    NoWorkspace,
    PathEscapesWorkspace,
    InvalidDocument,
    Write,
    Read,
    Pattern,
    Config,
    Collation,
    Editor,
    ChannelClosed,
}

impl CodeflowError {
    pub(crate) fn malformed_link(link: &str, reason: &'static str) -> Self {
        Self::MalformedLink {
            link: link.to_string(),
            reason,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedLink { .. } => ErrorKind::MalformedLink,
            Self::NoWorkspace => ErrorKind::NoWorkspace,
            Self::PathEscapesWorkspace(_) => ErrorKind::PathEscapesWorkspace,
            Self::InvalidDocument(_) => ErrorKind::InvalidDocument,
            Self::Write { .. } => ErrorKind::Write,
            Self::Read { .. } => ErrorKind::Read,
            Self::Pattern { .. } => ErrorKind::Pattern,
            Self::Config(_) => ErrorKind::Config,
            Self::Collation(_) => ErrorKind::Collation,
            Self::Editor(_) => ErrorKind::Editor,
            Self::ChannelClosed => ErrorKind::ChannelClosed,
        }
    }
}
