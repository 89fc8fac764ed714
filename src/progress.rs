use crate::folder_path::FolderPath;
use crate::restore::OperationOutcome;
use crate::walker::WalkStats;

/// Trait for reporting dump and restore progress.
///
/// The CLI implements this with an indicatif spinner. All methods have
/// default no-op implementations.
pub trait ProgressReporter {
    fn on_walk_start(&self, _roots: usize) {}
    fn on_folder_visited(&self, _path: &FolderPath, _folders_seen: usize) {}
    fn on_walk_complete(&self, _stats: &WalkStats, _duration_secs: f64) {}
    fn on_plan_complete(&self, _operations: usize, _unresolved: usize) {}
    fn on_operation(&self, _outcome: &OperationOutcome) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
