//! Command-line arguments for the Codeflow host.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Host for code-flow diagrams: renderer bus, source links and workspace index
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Workspace root. One-shot commands default to the current directory;
    /// `serve` runs without a workspace when omitted.
    #[arg(short, long, global = true)]
    pub workspace: Option<PathBuf>,

    /// Path to configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Speak the renderer protocol as JSON lines on stdin/stdout
    Serve {
        /// Refresh the index when diagram files change on disk
        #[arg(long)]
        watch: bool,
    },
    /// Print the diagram index
    List {
        /// List every workspace file instead of diagrams only
        #[arg(long)]
        all: bool,
    },
    /// Print the source link for a file and line range
    Link {
        file: PathBuf,
        /// First selected line (1-based)
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        start: u32,
        /// Last selected line, defaults to `start`
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        end: Option<u32>,
    },
    /// Open a source link in the editor
    Open { link: String },
    /// Print the content of a diagram file
    Show { file: String },
    /// Print the JSON schemas of the renderer protocol
    Schema,
}
