//! Host-side controller for Codeflow diagrams.
//!
//! `serve` runs the renderer bus on stdin/stdout. The other commands are
//! one-shot versions of the same operations for scripts and editor
//! integrations.

pub mod bus;
pub mod editor;
pub mod error;
pub mod watcher;

mod args;

pub use args::{Args, Command};
pub use error::HostError;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};
use tokio::io::BufReader;

use codeflow_core::link::relative_label;
use codeflow_core::{
    decode, load_config, persist, scan_workspace, CodeflowError, EditorSurface, HostMessage,
    LocationLink, RendererMessage,
};

use crate::bus::Bus;
use crate::editor::SystemEditor;
use crate::watcher::watch_workspace;

/// Runs the command in `args`, printing results to stdout.
pub fn run(args: &Args) -> Result<(), HostError> {
    let stdout = io::stdout();
    run_to(args, &mut stdout.lock())
}

/// Runs the command in `args`, printing results to `out`.
///
/// # Errors
///
/// Returns [`HostError`] for configuration, workspace, I/O and protocol
/// failures.
pub fn run_to(args: &Args, out: &mut impl Write) -> Result<(), HostError> {
    match &args.command {
        Command::Serve { watch } => serve(args, *watch),
        Command::List { all } => list(args, *all, out),
        Command::Link { file, start, end } => {
            link(args, file, *start, end.unwrap_or(*start), out)
        }
        Command::Open { link } => open(args, link),
        Command::Show { file } => show(args, file, out),
        Command::Schema => schema(out),
    }
}

fn workspace_or_cwd(args: &Args) -> Result<PathBuf, HostError> {
    let root = match &args.workspace {
        Some(root) => root.clone(),
        None => std::env::current_dir()?,
    };
    Ok(root.canonicalize()?)
}

fn serve(args: &Args, watch: bool) -> Result<(), HostError> {
    let root = args
        .workspace
        .as_deref()
        .map(Path::canonicalize)
        .transpose()?;
    let config = load_config(args.config.as_deref(), root.as_deref())?;
    let watch = watch || config.watch.enabled;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let editor = SystemEditor::new(config.editor.command.clone());
        let mut bus = Bus::new(root.clone(), &config, Box::new(editor));

        let _watcher = match (&root, watch) {
            (Some(root), true) => Some(watch_workspace(root, bus.events())?),
            (None, true) => {
                warn!("Watching needs a workspace, not watching");
                None
            }
            _ => None,
        };

        info!(workspace:? = root, watch; "Serving renderer bus on stdio");
        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        bus.run(stdin, &mut stdout).await
    })
}

fn list(args: &Args, all: bool, out: &mut impl Write) -> Result<(), HostError> {
    let root = workspace_or_cwd(args)?;
    let config = load_config(args.config.as_deref(), Some(&root))?;
    let options = if all { &config.files } else { &config.index };

    for entry in scan_workspace(&root, options)? {
        writeln!(out, "{}", entry.label())?;
    }
    Ok(())
}

fn link(
    args: &Args,
    file: &Path,
    start: u32,
    end: u32,
    out: &mut impl Write,
) -> Result<(), HostError> {
    let root = workspace_or_cwd(args)?;
    let absolute = std::env::current_dir()?
        .join(file)
        .canonicalize()
        .map_err(|source| CodeflowError::Read {
            path: file.to_path_buf(),
            source,
        })?;
    let label = relative_label(&root, &absolute)
        .ok_or_else(|| CodeflowError::PathEscapesWorkspace(file.display().to_string()))?;

    writeln!(out, "{}", LocationLink::new(label, start, end))?;
    Ok(())
}

fn open(args: &Args, text: &str) -> Result<(), HostError> {
    let root = workspace_or_cwd(args)?;
    let config = load_config(args.config.as_deref(), Some(&root))?;
    let link = decode(text)?;
    let path = link.resolve(Some(&root))?;

    SystemEditor::new(config.editor.command).reveal(&path, link.caret_line())?;
    Ok(())
}

fn show(args: &Args, file: &str, out: &mut impl Write) -> Result<(), HostError> {
    let root = workspace_or_cwd(args)?;
    let loaded = persist::load(Some(&root), file)?;
    out.write_all(loaded.content.as_bytes())?;
    Ok(())
}

fn schema(out: &mut impl Write) -> Result<(), HostError> {
    let schemas = serde_json::json!({
        "renderer": schemars::schema_for!(RendererMessage),
        "host": schemars::schema_for!(HostMessage),
    });
    writeln!(out, "{}", serde_json::to_string_pretty(&schemas)?)?;
    Ok(())
}
