use std::path::PathBuf;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser, Clone)]
#[clap(author, version, about = "Download, verify, and install binary tools", long_about = None)]
pub struct CLI {
    /// Registry file to use instead of the built-in tool table
    #[clap(long, global = true)]
    pub(crate) registry: Option<PathBuf>,
    /// Show debug output
    #[clap(short, long, global = true, conflicts_with = "quiet")]
    pub(crate) verbose: bool,
    /// Only show warnings and errors
    #[clap(short, long, global = true)]
    pub(crate) quiet: bool,
    #[command(subcommand)]
    pub(crate) command: ToolbeltCommand,
}

#[derive(Debug, Subcommand, Clone, PartialEq)]
pub enum ToolbeltCommand {
    /// List available tools, grouped by tag
    List {
        /// Print the registry as JSON
        #[clap(long)]
        json: bool,
    },
    /// Download, verify, and install tools
    Install {
        /// Tool names to install
        tools: Vec<String>,
        /// Install every tool in the registry
        #[clap(long)]
        all: bool,
        /// Install every tool in the given group (repeatable)
        #[clap(long = "group")]
        groups: Vec<String>,
        /// Destination directory
        #[clap(long, default_value = "/usr/local/bin")]
        dest: PathBuf,
        /// Copy into the destination through sudo
        #[clap(long)]
        sudo: bool,
    },
}
