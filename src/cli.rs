use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use vmfolders::{AppConfig, FolderPath};

#[derive(Debug, Parser)]
#[command(name = "vmfolders", version)]
#[command(about = "Dump and restore the VM folder layout of a datacenter", long_about = None)]
pub struct Cli {
    /// Debug logging and full error traces
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (default: ./Config.toml if present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Write the folder layout of a datacenter to a snapshot file
    Dump(DumpArgs),
    /// Recreate folders from a snapshot and move VMs back into them
    Restore(RestoreArgs),
}

/// Connection flags; each one overrides the config file and environment.
#[derive(Debug, Args)]
pub struct ConnectionArgs {
    /// Inventory server (`file:<path>` for an inventory document)
    #[arg(short, long)]
    pub server: Option<String>,

    #[arg(short, long)]
    pub user: Option<String>,

    /// Prompted for when not given here or in the environment
    #[arg(short, long)]
    pub password: Option<String>,

    #[arg(short, long)]
    pub datacenter: Option<String>,
}

impl ConnectionArgs {
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(server) = &self.server {
            config.server = Some(server.clone());
        }
        if let Some(user) = &self.user {
            config.user = Some(user.clone());
        }
        if let Some(password) = &self.password {
            config.password = Some(password.clone());
        }
        if let Some(datacenter) = &self.datacenter {
            config.datacenter = Some(datacenter.clone());
        }
    }
}

#[derive(Debug, Args)]
pub struct DumpArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Folders to dump (default: every top-level VM folder)
    #[arg(value_name = "FOLDER")]
    pub folders: Vec<FolderPath>,

    /// Exclude folders and VMs whose path matches PATTERN
    #[arg(short, long, value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Exclude VMs whose path matches PATTERN
    #[arg(long, value_name = "PATTERN")]
    pub exclude_vm: Vec<String>,

    /// Exclude folders (and everything below them) whose path matches PATTERN
    #[arg(long, value_name = "PATTERN")]
    pub exclude_folder: Vec<String>,

    /// Snapshot file to write (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct RestoreArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Snapshot file written by `dump`
    pub snapshot: PathBuf,

    /// Existing folder to restore under (default: the datacenter's VM root)
    #[arg(short, long, value_name = "FOLDER")]
    pub folder: Option<FolderPath>,

    /// Folder searched for the VMs to move
    #[arg(long, value_name = "NAME")]
    pub holding_folder: Option<String>,

    /// Only report what would be done
    #[arg(short, long, alias = "simulate")]
    pub noop: bool,

    /// Apply without asking for confirmation
    #[arg(short, long)]
    pub yes: bool,
}
