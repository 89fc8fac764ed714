pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod exclusion;
pub mod folder_path;
pub mod inventory;
pub mod progress;
pub mod restore;
pub mod snapshot;
pub mod walker;

pub use config::AppConfig;
pub use engine::{dump, restore, DumpRequest, DumpResult, RestoreRequest, RestoreResult};
pub use error::Error;
pub use exclusion::ExclusionRules;
pub use folder_path::FolderPath;
pub use inventory::{Inventory, InventoryError, MemoryInventory, Session};
pub use progress::{ProgressReporter, SilentReporter};
pub use restore::{ExecutionMode, ExecutionReport, Outcome, RestorePlan};
pub use snapshot::{Snapshot, VmRecord};
pub use walker::WalkStats;
