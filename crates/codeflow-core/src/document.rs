//! Diagram documents as exchanged with the renderer and stored on disk.
//!
//! The renderer owns the serialisation of a diagram. The host only needs two
//! facts from it: where it should be saved (`metaData.fileName`) and whether a
//! file on disk looks like a diagram at all (the leading `{"diagData":`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CodeflowError, Result};

/// Leading bytes every diagram file starts with.
///
/// This is a content sniff, not validation: a diagram written with a
/// different key order or leading whitespace is not recognised, and any JSON
/// file that happens to start with these bytes is.
pub const DIAGRAM_SIGNATURE: &[u8; 12] = br#"{"diagData":"#;

/// Whether `bytes` start with [`DIAGRAM_SIGNATURE`].
pub fn is_diagram_signature(bytes: &[u8]) -> bool {
    bytes.starts_with(DIAGRAM_SIGNATURE)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetaData {
    /// Workspace-relative save target.
    pub file_name: String,
}

/// A diagram ready to be written: its save target and the renderer's
/// verbatim content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramDocument {
    meta_data: MetaData,
    content: String,
}

impl DiagramDocument {
    pub fn meta_data(&self) -> &MetaData {
        &self.meta_data
    }

    pub fn file_name(&self) -> &str {
        &self.meta_data.file_name
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Bytes written on save. Never re-encoded.
    pub fn serialize(&self) -> &[u8] {
        self.content.as_bytes()
    }

    /// Whether the index will classify this document as a diagram once saved.
    pub fn is_diagram(&self) -> bool {
        is_diagram_signature(self.serialize())
    }
}

/// Parses a `saveDiag` payload and extracts its save target.
pub fn parse_for_save(content: impl Into<String>) -> Result<DiagramDocument> {
    let content = content.into();
    let value: Value = serde_json::from_str(&content)
        .map_err(|e| CodeflowError::InvalidDocument(format!("not valid JSON: {e}")))?;

    let file_name = match value.pointer("/metaData/fileName") {
        Some(Value::String(name)) if !name.trim().is_empty() => name.clone(),
        Some(Value::String(_)) => {
            return Err(CodeflowError::InvalidDocument(
                "`metaData.fileName` is empty".to_string(),
            ))
        }
        Some(_) => {
            return Err(CodeflowError::InvalidDocument(
                "`metaData.fileName` is not a string".to_string(),
            ))
        }
        None => {
            return Err(CodeflowError::InvalidDocument(
                "missing `metaData.fileName`".to_string(),
            ))
        }
    };

    Ok(DiagramDocument {
        meta_data: MetaData { file_name },
        content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_matches_diagram_prefix() {
        assert!(is_diagram_signature(br#"{"diagData":{"nodes":[]}}"#));
        assert!(is_diagram_signature(br#"{"diagData":"#));
        assert!(!is_diagram_signature(br#"{"other":1}"#));
        assert!(!is_diagram_signature(br#"{"diagData""#));
        assert!(!is_diagram_signature(b""));
        // Same document, different key order: not recognised.
        assert!(!is_diagram_signature(
            br#"{"metaData":{"fileName":"a.json"},"diagData":{}}"#
        ));
        assert!(!is_diagram_signature(br#"{ "diagData": {}}"#));
    }

    #[test]
    fn parse_extracts_file_name_and_keeps_content() {
        let raw = r#"{"diagData":{"nodes":[1,2]},"metaData":{"fileName":"diagrams/a.json"}}"#;
        let doc = parse_for_save(raw).unwrap();
        assert_eq!(doc.file_name(), "diagrams/a.json");
        assert_eq!(doc.serialize(), raw.as_bytes());
        assert!(doc.is_diagram());
    }

    #[test]
    fn parse_accepts_documents_without_signature_order() {
        let doc = parse_for_save(r#"{"metaData":{"fileName":"x.json"},"diagData":{}}"#).unwrap();
        assert_eq!(doc.file_name(), "x.json");
        assert!(!doc.is_diagram());
    }

    #[test]
    fn parse_rejects_invalid_documents() {
        for raw in [
            "not json",
            r#"{"diagData":{}}"#,
            r#"{"metaData":{}}"#,
            r#"{"metaData":{"fileName":42}}"#,
            r#"{"metaData":{"fileName":"  "}}"#,
            r#"[1,2,3]"#,
        ] {
            assert!(
                matches!(parse_for_save(raw), Err(CodeflowError::InvalidDocument(_))),
                "{raw}"
            );
        }
    }
}
