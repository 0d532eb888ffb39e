//! Opening source links in the user's editor.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::info;

use codeflow_core::{CodeflowError, EditorSurface, Result};

/// GUI editors probed on `PATH` when nothing is configured.
const KNOWN_EDITORS: [&str; 5] = ["code", "cursor", "zed", "zeditor", "subl"];

/// Launches an external editor process for every revealed location.
#[derive(Debug, Clone, Default)]
pub struct SystemEditor {
    command: Option<String>,
}

impl SystemEditor {
    pub fn new(command: Option<String>) -> Self {
        Self { command }
    }

    /// Configured command, then `$VISUAL`, then `$EDITOR`, then the first
    /// known GUI editor on `PATH`. Terminal editors are skipped: the host's
    /// terminal belongs to the renderer.
    fn resolve(&self) -> Option<String> {
        self.command
            .clone()
            .or_else(|| std::env::var("VISUAL").ok().filter(|v| !is_terminal_editor(v)))
            .or_else(|| std::env::var("EDITOR").ok().filter(|v| !is_terminal_editor(v)))
            .or_else(|| {
                KNOWN_EDITORS
                    .iter()
                    .find(|name| which::which(name).is_ok())
                    .map(|name| name.to_string())
            })
    }
}

fn binary_name(editor: &str) -> String {
    PathBuf::from(editor)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| editor.to_string())
}

fn is_terminal_editor(editor: &str) -> bool {
    matches!(
        binary_name(editor).as_str(),
        "vim" | "nvim" | "vi" | "nano" | "emacs" | "helix" | "hx" | "ed" | "micro"
    )
}

/// Arguments that make `editor` open `path` at 1-based `line`.
fn editor_args(editor: &str, path: &str, line: u32) -> Vec<String> {
    match binary_name(editor).as_str() {
        "code" | "cursor" => vec![
            "--reuse-window".to_string(),
            "--goto".to_string(),
            format!("{path}:{line}"),
        ],
        // -a adds the file to the focused workspace
        "zed" | "zeditor" => vec!["-a".to_string(), format!("{path}:{line}")],
        "subl" => vec![format!("{path}:{line}")],
        _ => vec![path.to_string()],
    }
}

impl EditorSurface for SystemEditor {
    fn reveal(&mut self, path: &Path, line_index: u32) -> Result<()> {
        if !path.is_file() {
            return Err(CodeflowError::Read {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::NotFound, "file not found"),
            });
        }
        let path_str = path.to_string_lossy();
        let line = line_index.saturating_add(1);

        let Some(editor) = self.resolve() else {
            let fallback = if cfg!(target_os = "macos") {
                "open"
            } else if cfg!(windows) {
                "explorer"
            } else {
                "xdg-open"
            };
            info!(opener = fallback, path = &*path_str; "No editor found, using platform opener");
            Command::new(fallback)
                .arg(&*path_str)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .spawn()
                .map_err(|e| CodeflowError::Editor(format!("{fallback}: {e}")))?;
            return Ok(());
        };

        info!(editor = editor.as_str(), path = &*path_str, line; "Launching editor");
        Command::new(&editor)
            .args(editor_args(&editor, &path_str, line))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| CodeflowError::Editor(format!("{editor}: {e}")))?;
        Ok(())
    }
}
