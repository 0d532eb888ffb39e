//! Messages exchanged between the host and the renderer.
//!
//! Every message is a JSON object tagged by `command`. Delivery is ordered
//! per direction only. The one request that needs identity, `listFiles`,
//! carries its `nodeId` both ways.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CodeflowError, ErrorKind};
use crate::index::IndexEntry;

/// Renderer -> host.
#[derive(Debug, Clone, PartialEq, Deserialize, schemars::JsonSchema)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum RendererMessage {
    /// List every workspace file for the tree node `nodeId`.
    ListFiles {
        #[serde(rename = "nodeId", default)]
        node_id: Value,
    },
    /// Open the location named by a source link.
    LinkClicked { link: String },
    /// Persist a whole diagram document.
    SaveDiag { data: String },
    /// List the diagram index.
    ListDiags {},
    /// Load a diagram from the index into the renderer.
    OpenDiag {
        #[serde(rename = "fileName")]
        file_name: String,
    },
    /// Any command this host does not know. Ignored.
    #[serde(other)]
    Unknown,
}

impl RendererMessage {
    /// Parses one wire message.
    pub fn from_json(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }
}

/// Host -> renderer.
#[derive(Debug, Clone, PartialEq, Serialize, schemars::JsonSchema)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum HostMessage {
    ListFiles {
        data: Vec<FileLocator>,
        #[serde(rename = "nodeId")]
        node_id: Value,
    },
    LoadDiag {
        data: String,
        #[serde(rename = "fileName")]
        file_name: String,
    },
    ListDiags { data: Vec<FileLocator> },
    Error { kind: ErrorKind, message: String },
}

impl HostMessage {
    pub fn error(err: &CodeflowError) -> Self {
        Self::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// An index entry as sent to the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct FileLocator {
    /// Workspace-relative path, also the display label.
    pub label: String,
    /// Absolute path under the current workspace root.
    pub path: String,
}

impl FileLocator {
    pub fn new(entry: &IndexEntry, root: &Path) -> Self {
        Self {
            label: entry.label().to_string(),
            path: entry.locate(root).to_string_lossy().into_owned(),
        }
    }

    pub fn from_entries(entries: &[IndexEntry], root: &Path) -> Vec<Self> {
        entries.iter().map(|e| Self::new(e, root)).collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_renderer_messages() {
        assert_eq!(
            RendererMessage::from_json(r#"{"command":"listFiles","nodeId":"n-7"}"#).unwrap(),
            RendererMessage::ListFiles {
                node_id: json!("n-7")
            }
        );
        assert_eq!(
            RendererMessage::from_json(r#"{"command":"linkClicked","link":"a.rs#L3"}"#).unwrap(),
            RendererMessage::LinkClicked {
                link: "a.rs#L3".to_string()
            }
        );
        assert_eq!(
            RendererMessage::from_json(r#"{"command":"saveDiag","data":"{}"}"#).unwrap(),
            RendererMessage::SaveDiag {
                data: "{}".to_string()
            }
        );
        assert_eq!(
            RendererMessage::from_json(r#"{"command":"listDiags"}"#).unwrap(),
            RendererMessage::ListDiags {}
        );
        assert_eq!(
            RendererMessage::from_json(r#"{"command":"openDiag","fileName":"a.json"}"#).unwrap(),
            RendererMessage::OpenDiag {
                file_name: "a.json".to_string()
            }
        );
    }

    #[test]
    fn node_id_may_be_missing_or_numeric() {
        assert_eq!(
            RendererMessage::from_json(r#"{"command":"listFiles"}"#).unwrap(),
            RendererMessage::ListFiles {
                node_id: Value::Null
            }
        );
        assert_eq!(
            RendererMessage::from_json(r#"{"command":"listFiles","nodeId":12}"#).unwrap(),
            RendererMessage::ListFiles { node_id: json!(12) }
        );
    }

    #[test]
    fn unknown_commands_are_tolerated() {
        assert_eq!(
            RendererMessage::from_json(r#"{"command":"zoomIn","factor":2}"#).unwrap(),
            RendererMessage::Unknown
        );
    }

    #[test]
    fn malformed_known_commands_fail() {
        assert!(RendererMessage::from_json(r#"{"command":"linkClicked"}"#).is_err());
        assert!(RendererMessage::from_json(r#"{"link":"a#L1"}"#).is_err());
    }

    #[test]
    fn host_messages_use_wire_names() {
        let root = Path::new("/ws");
        let msg = HostMessage::ListFiles {
            data: FileLocator::from_entries(&[IndexEntry::new("src/a.rs")], root),
            node_id: json!("n-1"),
        };
        let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["command"], "listFiles");
        assert_eq!(value["nodeId"], "n-1");
        assert_eq!(value["data"][0]["label"], "src/a.rs");

        let msg = HostMessage::LoadDiag {
            data: "{}".to_string(),
            file_name: "d.json".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"command": "loadDiag", "data": "{}", "fileName": "d.json"})
        );

        let msg = HostMessage::error(&CodeflowError::NoWorkspace);
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"command": "error", "kind": "noWorkspace", "message": "no workspace folder is open"})
        );
    }
}
