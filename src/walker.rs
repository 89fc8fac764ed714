//! Depth-first walk of the VM folder hierarchy.
//!
//! Exclusions are checked before descending, so an excluded folder costs no
//! further inventory calls. Entries that disappear while the walk is running
//! are skipped with a warning, as are objects that are neither folders nor
//! VMs.

use tracing::{debug, info, warn};

use crate::classify::{classify, Entry};
use crate::error::Error;
use crate::exclusion::ExclusionRules;
use crate::folder_path::FolderPath;
use crate::inventory::{Inventory, InventoryError, ObjectRef};
use crate::progress::ProgressReporter;
use crate::snapshot::{Snapshot, VmRecord};

/// A folder the walk starts from, with the path it is recorded under.
#[derive(Debug, Clone)]
pub struct ScanRoot {
    pub path: FolderPath,
    pub folder: ObjectRef,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub folders_visited: usize,
    pub vms_recorded: usize,
    pub folders_excluded: usize,
    pub vms_excluded: usize,
    pub unknown_skipped: usize,
    pub vanished_skipped: usize,
}

#[derive(Debug)]
pub struct WalkResult {
    pub snapshot: Snapshot,
    pub stats: WalkStats,
}

struct Walker<'a, I: Inventory + ?Sized> {
    inventory: &'a I,
    rules: &'a ExclusionRules,
    reporter: &'a dyn ProgressReporter,
    snapshot: Snapshot,
    stats: WalkStats,
}

pub fn walk<I: Inventory + ?Sized>(
    inventory: &I,
    roots: &[ScanRoot],
    rules: &ExclusionRules,
    reporter: &dyn ProgressReporter,
) -> Result<WalkResult, Error> {
    let mut walker = Walker {
        inventory,
        rules,
        reporter,
        snapshot: Snapshot::new(),
        stats: WalkStats::default(),
    };

    for root in roots {
        walker.visit_root(root)?;
    }

    Ok(WalkResult {
        snapshot: walker.snapshot,
        stats: walker.stats,
    })
}

impl<I: Inventory + ?Sized> Walker<'_, I> {
    fn visit_root(&mut self, root: &ScanRoot) -> Result<(), Error> {
        if self.rules.excludes_folder(&root.path) {
            info!("Skipping excluded root folder '{}'", root.path);
            self.stats.folders_excluded += 1;
            return Ok(());
        }
        if self.snapshot.contains(&root.path) {
            warn!("Root folder '{}' was already visited, skipping", root.path);
            return Ok(());
        }
        self.visit_folder(&root.path, &root.folder)
    }

    fn visit_folder(&mut self, path: &FolderPath, folder: &ObjectRef) -> Result<(), Error> {
        self.snapshot.ensure_folder(path);
        self.stats.folders_visited += 1;
        self.reporter.on_folder_visited(path, self.stats.folders_visited);
        debug!("Visiting folder '{}' ({})", path, folder);

        let children = match self.inventory.list_children(folder) {
            Ok(children) => children,
            Err(InventoryError::NotFound(_)) => {
                warn!("Folder '{}' disappeared during the walk, treating it as empty", path);
                self.stats.vanished_skipped += 1;
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        for node in children {
            match classify(&node) {
                Entry::Folder(id) => {
                    let child_path = path.child(&node.name);
                    if self.rules.excludes_folder(&child_path) {
                        debug!("Excluding folder '{}'", child_path);
                        self.stats.folders_excluded += 1;
                        continue;
                    }
                    self.visit_folder(&child_path, &id)?;
                }
                Entry::VirtualMachine(id) => {
                    let vm_path = path.entry_path(&node.name);
                    if self.rules.excludes_vm(&vm_path) {
                        debug!("Excluding VM '{}'", vm_path);
                        self.stats.vms_excluded += 1;
                        continue;
                    }
                    self.record_vm(path, &node.name, &id)?;
                }
                Entry::Unknown(type_tag) => {
                    warn!(
                        "Skipping '{}' in '{}': unsupported object type '{}'",
                        node.name, path, type_tag
                    );
                    self.stats.unknown_skipped += 1;
                }
            }
        }

        Ok(())
    }

    fn record_vm(&mut self, folder: &FolderPath, name: &str, vm: &ObjectRef) -> Result<(), Error> {
        match self.inventory.vm_config(vm) {
            Ok(Some(config)) if !config.uuid.trim().is_empty() => {
                self.snapshot.push_vm(folder, VmRecord::new(name, &config.uuid));
                self.stats.vms_recorded += 1;
                Ok(())
            }
            Ok(_) | Err(InventoryError::NotFound(_)) => {
                warn!(
                    "Configuration of VM '{}' in '{}' is unavailable, skipping",
                    name, folder
                );
                self.stats.vanished_skipped += 1;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}
