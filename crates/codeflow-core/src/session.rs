//! The context every operation runs in.
//!
//! A [`Session`] owns the workspace root, the diagram index and the two host
//! seams: the outbound renderer channel and the editor surface used for link
//! navigation.

use std::path::{Path, PathBuf};

use log::{debug, info};
use serde_json::Value;

use crate::config::Config;
use crate::document::parse_for_save;
use crate::error::{CodeflowError, Result};
use crate::index::{scan_workspace, DiagramIndex, IndexEntry, ScanOptions};
use crate::link::decode;
use crate::persist;
use crate::protocol::{FileLocator, HostMessage, RendererMessage};

/// Sink for host -> renderer messages. Must deliver in call order.
pub trait RendererChannel {
    fn post(&mut self, message: HostMessage) -> Result<()>;
}

/// Where decoded links are opened.
pub trait EditorSurface {
    /// Shows `path` with the caret on zero-based `line_index`.
    fn reveal(&mut self, path: &Path, line_index: u32) -> Result<()>;
}

pub struct Session {
    root: Option<PathBuf>,
    index: DiagramIndex,
    files: ScanOptions,
    channel: Box<dyn RendererChannel + Send>,
    editor: Box<dyn EditorSurface + Send>,
}

impl Session {
    pub fn new(
        root: Option<PathBuf>,
        config: &Config,
        channel: Box<dyn RendererChannel + Send>,
        editor: Box<dyn EditorSurface + Send>,
    ) -> Self {
        Self {
            root,
            index: DiagramIndex::new(config.index.clone()),
            files: config.files.clone(),
            channel,
            editor,
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn index(&self) -> &DiagramIndex {
        &self.index
    }

    pub fn index_mut(&mut self) -> &mut DiagramIndex {
        &mut self.index
    }

    fn require_root(&self) -> Result<&Path> {
        self.root.as_deref().ok_or(CodeflowError::NoWorkspace)
    }

    /// Routes one inbound message. Unknown commands are ignored.
    pub fn dispatch(&mut self, message: RendererMessage) -> Result<()> {
        match message {
            RendererMessage::ListFiles { node_id } => self.list_files(node_id),
            RendererMessage::LinkClicked { link } => self.open_link(&link),
            RendererMessage::SaveDiag { data } => self.save_diagram(data).map(|_| ()),
            RendererMessage::ListDiags {} => self.push_listing(),
            RendererMessage::OpenDiag { file_name } => self.open_entry(&file_name),
            RendererMessage::Unknown => {
                debug!("Ignoring unknown renderer command");
                Ok(())
            }
        }
    }

    /// Answers `listFiles` with every workspace file, echoing `node_id`.
    pub fn list_files(&mut self, node_id: Value) -> Result<()> {
        let root = self.require_root()?;
        let entries = scan_workspace(root, &self.files)?;
        let data = FileLocator::from_entries(&entries, root);
        debug!(files = data.len(); "Answering listFiles");
        self.channel.post(HostMessage::ListFiles { data, node_id })
    }

    /// Decodes `link` and reveals its start line in the editor.
    pub fn open_link(&mut self, link: &str) -> Result<()> {
        let link = decode(link)?;
        let path = link.resolve(self.root.as_deref())?;
        info!(link:% = link; "Opening source link");
        self.editor.reveal(&path, link.caret_line())
    }

    /// Parses and persists a `saveDiag` payload, returning the written path.
    pub fn save_diagram(&mut self, content: String) -> Result<PathBuf> {
        let document = parse_for_save(content)?;
        persist::save(&document, self.root.as_deref(), &mut self.index)
    }

    /// Current diagram listing, scanning if the cache is stale.
    pub fn list_diagrams(&mut self) -> Result<Vec<IndexEntry>> {
        if let Some(cached) = self.index.cached() {
            return Ok(cached.to_vec());
        }
        let root = self.require_root()?.to_path_buf();
        Ok(self.index.scan(&root)?.to_vec())
    }

    /// Sends the diagram listing to the renderer.
    pub fn push_listing(&mut self) -> Result<()> {
        let entries = self.list_diagrams()?;
        let root = self.require_root()?;
        let data = FileLocator::from_entries(&entries, root);
        self.channel.post(HostMessage::ListDiags { data })
    }

    /// Loads the diagram labelled `file_name` and pushes it as `loadDiag`.
    pub fn open_entry(&mut self, file_name: &str) -> Result<()> {
        let loaded = persist::load(self.root.as_deref(), file_name)?;
        self.channel.post(HostMessage::LoadDiag {
            data: loaded.content,
            file_name: loaded.file_name,
        })
    }

    /// Reports a failed action to the renderer.
    pub fn report(&mut self, err: &CodeflowError) -> Result<()> {
        self.channel.post(HostMessage::error(err))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("root", &self.root)
            .field("index", &self.index)
            .field("files", &self.files)
            .finish_non_exhaustive()
    }
}
