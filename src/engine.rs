use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::Error;
use crate::exclusion::ExclusionRules;
use crate::folder_path::{non_overlapping_folders, FolderPath};
use crate::inventory::{Inventory, ObjectRef};
use crate::progress::ProgressReporter;
use crate::restore::{self, ExecutionMode, ExecutionReport, RestorePlan};
use crate::snapshot::Snapshot;
use crate::walker::{self, ScanRoot, WalkStats};

#[derive(Debug, Clone)]
pub struct DumpRequest {
    pub datacenter: String,
    /// Folders to scan; all top-level folders when empty.
    pub folders: Vec<FolderPath>,
    pub rules: ExclusionRules,
}

#[derive(Debug)]
pub struct DumpResult {
    pub snapshot: Snapshot,
    pub stats: WalkStats,
    pub roots: Vec<FolderPath>,
    pub walk_duration: Duration,
}

#[derive(Debug, Clone)]
pub struct RestoreRequest {
    pub datacenter: String,
    /// Existing folder to restore under; the datacenter's VM root when `None`.
    pub target_folder: Option<FolderPath>,
    pub holding_folder: String,
    pub mode: ExecutionMode,
}

#[derive(Debug)]
pub struct RestoreResult {
    pub plan: RestorePlan,
    pub report: ExecutionReport,
    pub plan_duration: Duration,
    pub execute_duration: Duration,
}

fn resolve_datacenter<I: Inventory + ?Sized>(
    inventory: &I,
    name: &str,
) -> Result<(ObjectRef, ObjectRef), Error> {
    let datacenter = inventory
        .find_datacenter(name)?
        .ok_or_else(|| Error::DatacenterNotFound(name.to_string()))?;
    let vm_root = inventory.vm_root_folder(&datacenter)?;
    debug!("Datacenter '{}' ({}) has VM root {}", name, datacenter, vm_root);
    Ok((datacenter, vm_root))
}

/// Resolve every scan root before any walking starts, so a bad folder name
/// aborts the dump without partial work.
fn resolve_roots<I: Inventory + ?Sized>(
    inventory: &I,
    datacenter: &ObjectRef,
    vm_root: &ObjectRef,
    folders: &[FolderPath],
) -> Result<Vec<ScanRoot>, Error> {
    if folders.is_empty() {
        return Ok(inventory
            .root_folders(datacenter)?
            .into_iter()
            .map(|node| ScanRoot {
                path: FolderPath::root(&node.name),
                folder: node.id,
            })
            .collect());
    }

    non_overlapping_folders(folders.to_vec())
        .into_iter()
        .map(|path| -> Result<ScanRoot, Error> {
            let folder = inventory
                .find_by_path(vm_root, &path)?
                .ok_or_else(|| Error::FolderNotFound(path.clone()))?;
            Ok(ScanRoot { path, folder })
        })
        .collect()
}

/// Walk the requested folders of a datacenter into a snapshot.
pub fn dump<I: Inventory + ?Sized>(
    inventory: &I,
    request: &DumpRequest,
    reporter: &dyn ProgressReporter,
) -> Result<DumpResult, Error> {
    let (datacenter, vm_root) = resolve_datacenter(inventory, &request.datacenter)?;
    let roots = resolve_roots(inventory, &datacenter, &vm_root, &request.folders)?;
    let root_paths: Vec<FolderPath> = roots.iter().map(|root| root.path.clone()).collect();
    info!(
        "Dumping {} root folders of datacenter '{}'",
        roots.len(),
        request.datacenter
    );

    reporter.on_walk_start(roots.len());
    let walk_start = Instant::now();
    let result = walker::walk(inventory, &roots, &request.rules, reporter)?;
    let walk_duration = walk_start.elapsed();
    reporter.on_walk_complete(&result.stats, walk_duration.as_secs_f64());

    info!(
        "Walk completed in {:.2}s: {} folders, {} VMs, {} excluded, {} skipped",
        walk_duration.as_secs_f64(),
        result.stats.folders_visited,
        result.stats.vms_recorded,
        result.stats.folders_excluded + result.stats.vms_excluded,
        result.stats.unknown_skipped + result.stats.vanished_skipped,
    );

    Ok(DumpResult {
        snapshot: result.snapshot,
        stats: result.stats,
        roots: root_paths,
        walk_duration,
    })
}

/// Plan and execute the restore of `snapshot` into a datacenter.
pub fn restore<I: Inventory + ?Sized>(
    inventory: &mut I,
    request: &RestoreRequest,
    snapshot: &Snapshot,
    reporter: &dyn ProgressReporter,
) -> Result<RestoreResult, Error> {
    let (_, vm_root) = resolve_datacenter(&*inventory, &request.datacenter)?;
    let target_root = match &request.target_folder {
        None => vm_root.clone(),
        Some(path) => inventory
            .find_by_path(&vm_root, path)?
            .ok_or_else(|| Error::FolderNotFound(path.clone()))?,
    };
    let holding = inventory
        .find_child_folder(&vm_root, &request.holding_folder)?
        .ok_or_else(|| Error::HoldingFolderNotFound(request.holding_folder.clone()))?;

    info!(
        "Restoring {} folders and {} VMs into datacenter '{}' ({:?})",
        snapshot.len(),
        snapshot.vm_count(),
        request.datacenter,
        request.mode
    );

    let plan_start = Instant::now();
    let plan = restore::plan(&*inventory, snapshot, &target_root, &holding)?;
    let plan_duration = plan_start.elapsed();
    reporter.on_plan_complete(plan.entries.len(), plan.unresolved());

    let execute_start = Instant::now();
    let report = restore::execute(inventory, &plan, &target_root, request.mode, reporter)?;
    let execute_duration = execute_start.elapsed();

    Ok(RestoreResult {
        plan,
        report,
        plan_duration,
        execute_duration,
    })
}
