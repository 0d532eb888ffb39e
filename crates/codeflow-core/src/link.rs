//! Source links: `path#L<start>-L<end>` references into the workspace.
//!
//! A link is what the renderer stores on a diagram node and sends back in a
//! `linkClicked` message. Paths are relative to the workspace root and always
//! use `/` as separator, whatever the host platform.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CodeflowError, Result};

/// A file and an inclusive, 1-based line range.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocationLink {
    relative_path: String,
    start_line: u32,
    end_line: u32,
}

impl LocationLink {
    /// Builds a link, swapping the bounds if they are given in reverse.
    pub fn new(relative_path: impl Into<String>, start_line: u32, end_line: u32) -> Self {
        Self {
            relative_path: relative_path.into(),
            start_line: start_line.min(end_line),
            end_line: start_line.max(end_line),
        }
    }

    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    pub fn start_line(&self) -> u32 {
        self.start_line
    }

    pub fn end_line(&self) -> u32 {
        self.end_line
    }

    /// Zero-based line an editor should put its caret on.
    pub fn caret_line(&self) -> u32 {
        to_caret_position(self.start_line)
    }

    /// Absolute location of the linked file under `root`.
    pub fn resolve(&self, root: Option<&Path>) -> Result<PathBuf> {
        resolve_to_absolute(&self.relative_path, root)
    }
}

impl fmt::Display for LocationLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode(&self.relative_path, self.start_line, self.end_line))
    }
}

impl FromStr for LocationLink {
    type Err = CodeflowError;

    fn from_str(s: &str) -> Result<Self> {
        decode(s)
    }
}

/// Canonical text form of a line range in `relative_path`.
pub fn encode(relative_path: &str, start_line: u32, end_line: u32) -> String {
    format!("{relative_path}#L{start_line}-L{end_line}")
}

/// Parses `path#L<n>` or `path#L<n>-L<m>`.
///
/// Both bounds are returned; the one-line form yields `start == end`.
pub fn decode(text: &str) -> Result<LocationLink> {
    let (path, position) = text
        .split_once('#')
        .ok_or_else(|| CodeflowError::malformed_link(text, "missing `#` separator"))?;
    if path.is_empty() {
        return Err(CodeflowError::malformed_link(text, "empty path"));
    }

    let (start_line, end_line) = match position.split_once('-') {
        Some((start, end)) => (parse_line(text, start)?, parse_line(text, end)?),
        None => {
            let line = parse_line(text, position)?;
            (line, line)
        }
    };
    if end_line < start_line {
        return Err(CodeflowError::malformed_link(
            text,
            "end line precedes start line",
        ));
    }

    Ok(LocationLink {
        relative_path: path.to_string(),
        start_line,
        end_line,
    })
}

fn parse_line(link: &str, part: &str) -> Result<u32> {
    let digits = part
        .strip_prefix('L')
        .ok_or_else(|| CodeflowError::malformed_link(link, "line must start with `L`"))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CodeflowError::malformed_link(
            link,
            "line number is not an integer",
        ));
    }
    match digits.parse::<u32>() {
        Ok(0) => Err(CodeflowError::malformed_link(link, "line numbers start at 1")),
        Ok(line) => Ok(line),
        Err(_) => Err(CodeflowError::malformed_link(link, "line number out of range")),
    }
}

/// Joins a `/`-separated workspace-relative path onto `root`.
///
/// Rejects absolute paths and `..` segments that climb above the root.
pub fn resolve_to_absolute(relative_path: &str, root: Option<&Path>) -> Result<PathBuf> {
    let root = root.ok_or(CodeflowError::NoWorkspace)?;
    let escapes = || CodeflowError::PathEscapesWorkspace(relative_path.to_string());

    if relative_path.starts_with(['/', '\\'])
        || Path::new(relative_path)
            .components()
            .any(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
    {
        return Err(escapes());
    }

    let mut resolved = root.to_path_buf();
    let mut depth = 0usize;
    for segment in relative_path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                if depth == 0 {
                    return Err(escapes());
                }
                resolved.pop();
                depth -= 1;
            }
            name => {
                resolved.push(name);
                depth += 1;
            }
        }
    }
    Ok(resolved)
}

/// Zero-based caret line for a 1-based line number.
pub fn to_caret_position(line: u32) -> u32 {
    line.saturating_sub(1)
}

/// Workspace-relative, `/`-separated label for `path`, or `None` if `path`
/// is not under `root`.
///
/// Index labels, `metaData.fileName` and link paths all go through this.
pub fn relative_label(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let segments: Vec<_> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy()),
            _ => None,
        })
        .collect();
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}
