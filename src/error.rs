use thiserror::Error;

use crate::folder_path::FolderPath;
use crate::inventory::InventoryError;
use crate::snapshot::SnapshotError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("missing required connection parameter '{0}'")]
    MissingParameter(&'static str),

    #[error("invalid exclusion pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("invalid folder path '{0}'")]
    InvalidPath(String),

    #[error("datacenter '{0}' not found")]
    DatacenterNotFound(String),

    #[error("folder '{0}' not found")]
    FolderNotFound(FolderPath),

    #[error("holding folder '{0}' not found")]
    HoldingFolderNotFound(String),

    #[error("no inventory connector for server '{0}'")]
    UnsupportedServer(String),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),
}
