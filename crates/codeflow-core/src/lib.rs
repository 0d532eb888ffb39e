//! Core of Codeflow: source links, diagram documents, workspace discovery,
//! the renderer protocol and persistence.
//!
//! Everything here is synchronous and file-system bound. The host decides how
//! messages reach the renderer and how links are opened, through the
//! [`RendererChannel`] and [`EditorSurface`] traits.

pub mod config;
pub mod document;
pub mod error;
pub mod index;
pub mod link;
pub mod persist;
pub mod protocol;
pub mod session;

pub use config::{load_config, Config};
pub use document::{is_diagram_signature, parse_for_save, DiagramDocument, MetaData};
pub use error::{CodeflowError, ErrorKind, Result};
pub use index::{
    scan_workspace, DiagramIndex, IndexEntry, IndexEvent, LabelCollator, ScanOptions,
};
pub use link::{decode, encode, resolve_to_absolute, to_caret_position, LocationLink};
pub use protocol::{FileLocator, HostMessage, RendererMessage};
pub use session::{EditorSurface, RendererChannel, Session};
