//! Reading and writing diagram files under the workspace root.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::document::DiagramDocument;
use crate::error::{CodeflowError, Result};
use crate::index::DiagramIndex;
use crate::link::{relative_label, resolve_to_absolute};

/// Writes `document` to its `metaData.fileName` under `root`, records it in
/// `index` and refreshes it.
///
/// The content goes to a temporary sibling first and is renamed into place,
/// so a failed write leaves the previous file as it was. There is no conflict
/// detection: the last save wins.
pub fn save(
    document: &DiagramDocument,
    root: Option<&Path>,
    index: &mut DiagramIndex,
) -> Result<PathBuf> {
    let root = root.ok_or(CodeflowError::NoWorkspace)?;
    let path = resolve_to_absolute(document.file_name(), Some(root))?;
    // `.` or `sub/..` name the root itself.
    let label = relative_label(root, &path).ok_or_else(|| {
        CodeflowError::InvalidDocument(format!(
            "`metaData.fileName` `{}` does not name a file",
            document.file_name()
        ))
    })?;

    write_atomic(&path, document.serialize())?;
    info!(file_name = document.file_name(), bytes = document.serialize().len(); "Diagram saved");

    if !document.is_diagram() {
        debug!(label = label.as_str(); "Saved document lacks the diagram signature, indexing by save");
    }
    index.note_saved(label);
    index.refresh();
    Ok(path)
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let write_err = |source| CodeflowError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));

    if let Err(source) = fs::write(&tmp, data) {
        let _ = fs::remove_file(&tmp);
        return Err(write_err(source));
    }
    if let Err(source) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(write_err(source));
    }
    Ok(())
}

/// A diagram read from disk for the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDiagram {
    pub file_name: String,
    pub content: String,
}

/// Reads the diagram at workspace-relative `file_name`.
pub fn load(root: Option<&Path>, file_name: &str) -> Result<LoadedDiagram> {
    let path = resolve_to_absolute(file_name, root)?;
    let bytes = fs::read(&path).map_err(|source| CodeflowError::Read {
        path: path.clone(),
        source,
    })?;
    Ok(LoadedDiagram {
        file_name: file_name.to_string(),
        content: String::from_utf8_lossy(&bytes).into_owned(),
    })
}
