use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use super::{Operation, PlanEntry, PlanIssue, PlanStatus, RestorePlan};
use crate::classify::{classify, Entry};
use crate::error::Error;
use crate::folder_path::FolderPath;
use crate::inventory::{Inventory, InventoryError, Node, ObjectRef};
use crate::snapshot::Snapshot;

#[derive(Debug, Clone)]
enum FolderState {
    Existing(ObjectRef),
    Planned,
}

struct Planner<'a, I: Inventory + ?Sized> {
    inventory: &'a I,
    target_root: &'a ObjectRef,
    holding: &'a ObjectRef,
    folders: HashMap<FolderPath, FolderState>,
    resident_uuids: HashMap<ObjectRef, HashSet<String>>,
    entries: Vec<PlanEntry>,
}

/// Compute the steps that reproduce `snapshot` below `target_root`.
///
/// Folders are matched by path, so folders that already exist are reused and
/// never planned twice. VMs are looked up by uuid among the direct children
/// of `holding`. Only reads are issued against the inventory.
pub fn plan<I: Inventory + ?Sized>(
    inventory: &I,
    snapshot: &Snapshot,
    target_root: &ObjectRef,
    holding: &ObjectRef,
) -> Result<RestorePlan, Error> {
    let mut planner = Planner {
        inventory,
        target_root,
        holding,
        folders: HashMap::new(),
        resident_uuids: HashMap::new(),
        entries: Vec::new(),
    };

    let mut ordered: Vec<&FolderPath> = snapshot.paths().collect();
    ordered.sort_by_key(|path| path.depth());
    for path in ordered {
        planner.plan_folder(path)?;
    }

    let holding_index = planner.index_holding_folder()?;
    planner.plan_relocations(snapshot, &holding_index)?;

    let plan = RestorePlan {
        entries: planner.entries,
    };
    info!(
        "Restore plan: {} folders to create, {} VMs to move, {} already in place, {} unresolved",
        plan.folders_to_create(),
        plan.vms_to_relocate(),
        plan.already_in_place(),
        plan.unresolved()
    );
    Ok(plan)
}

impl<I: Inventory + ?Sized> Planner<'_, I> {
    /// Plan `path` and any of its ancestors that are not known yet.
    fn plan_folder(&mut self, path: &FolderPath) -> Result<(), Error> {
        for depth in 1..=path.depth() {
            let Some(prefix) = path.prefix(depth) else {
                break;
            };
            if self.folders.contains_key(&prefix) {
                continue;
            }

            let parent = prefix.parent();
            let parent_state = match &parent {
                None => FolderState::Existing(self.target_root.clone()),
                Some(parent) => self.folders[parent].clone(),
            };

            let state = match parent_state {
                FolderState::Existing(parent_ref) => {
                    match self.inventory.find_child_folder(&parent_ref, prefix.name())? {
                        Some(existing) => {
                            debug!("Folder '{}' already exists ({})", prefix, existing);
                            FolderState::Existing(existing)
                        }
                        None => self.plan_create(parent, &prefix),
                    }
                }
                FolderState::Planned => self.plan_create(parent, &prefix),
            };
            self.folders.insert(prefix, state);
        }
        Ok(())
    }

    fn plan_create(&mut self, parent: Option<FolderPath>, path: &FolderPath) -> FolderState {
        debug!("Planning creation of folder '{}'", path);
        self.entries.push(PlanEntry {
            operation: Operation::CreateFolder {
                parent,
                name: path.name().to_string(),
            },
            status: PlanStatus::Ready { source: None },
        });
        FolderState::Planned
    }

    /// uuid -> VMs carrying it among the holding folder's direct children.
    fn index_holding_folder(&self) -> Result<HashMap<String, Vec<ObjectRef>>, Error> {
        let mut index: HashMap<String, Vec<ObjectRef>> = HashMap::new();
        for node in self.children_or_empty(self.holding)? {
            let Entry::VirtualMachine(vm) = classify(&node) else {
                continue;
            };
            match self.vm_uuid(&vm)? {
                Some(uuid) => index.entry(uuid).or_default().push(vm),
                None => warn!("Holding folder VM '{}' has no readable configuration, skipping", node.name),
            }
        }
        debug!("Holding folder contains {} distinct VM uuids", index.len());
        Ok(index)
    }

    fn plan_relocations(
        &mut self,
        snapshot: &Snapshot,
        holding_index: &HashMap<String, Vec<ObjectRef>>,
    ) -> Result<(), Error> {
        let mut seen: HashSet<&str> = HashSet::new();

        for (destination, vms) in snapshot.iter() {
            for vm in vms {
                let operation = Operation::RelocateVm {
                    vm: vm.clone(),
                    destination: destination.clone(),
                };

                let status = if !seen.insert(vm.uuid.as_str()) {
                    warn!("VM {} appears more than once in the snapshot", vm.uuid);
                    PlanStatus::Unresolved(PlanIssue::DuplicateInSnapshot(vm.uuid.clone()))
                } else if self.is_resident(destination, &vm.uuid)? {
                    PlanStatus::AlreadyInPlace
                } else {
                    match holding_index.get(&vm.uuid).map(Vec::as_slice) {
                        Some([source]) => PlanStatus::Ready {
                            source: Some(source.clone()),
                        },
                        Some(sources) => {
                            warn!(
                                "{} VMs with uuid {} in the holding folder, not moving any",
                                sources.len(),
                                vm.uuid
                            );
                            PlanStatus::Unresolved(PlanIssue::DuplicateUuid {
                                uuid: vm.uuid.clone(),
                                count: sources.len(),
                            })
                        }
                        None => {
                            warn!("VM '{}' ({}) not found in the holding folder", vm.name, vm.uuid);
                            PlanStatus::Unresolved(PlanIssue::VmNotFound(vm.uuid.clone()))
                        }
                    }
                };

                self.entries.push(PlanEntry { operation, status });
            }
        }
        Ok(())
    }

    /// True when the destination already exists and directly holds a VM with
    /// `uuid`.
    fn is_resident(&mut self, destination: &FolderPath, uuid: &str) -> Result<bool, Error> {
        let folder = match self.folders.get(destination) {
            Some(FolderState::Existing(folder)) => folder.clone(),
            _ => return Ok(false),
        };
        if !self.resident_uuids.contains_key(&folder) {
            let mut uuids = HashSet::new();
            for node in self.children_or_empty(&folder)? {
                if let Entry::VirtualMachine(vm) = classify(&node) {
                    if let Some(uuid) = self.vm_uuid(&vm)? {
                        uuids.insert(uuid);
                    }
                }
            }
            self.resident_uuids.insert(folder.clone(), uuids);
        }
        Ok(self.resident_uuids[&folder].contains(uuid))
    }

    /// A folder that vanished since it was found lists as empty.
    fn children_or_empty(&self, folder: &ObjectRef) -> Result<Vec<Node>, Error> {
        match self.inventory.list_children(folder) {
            Ok(children) => Ok(children),
            Err(InventoryError::NotFound(_)) => {
                warn!("Folder {} disappeared while planning, treating it as empty", folder);
                Ok(Vec::new())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// `None` when the VM vanished or carries no usable uuid.
    fn vm_uuid(&self, vm: &ObjectRef) -> Result<Option<String>, Error> {
        match self.inventory.vm_config(vm) {
            Ok(Some(config)) if !config.uuid.trim().is_empty() => Ok(Some(config.uuid)),
            Ok(_) | Err(InventoryError::NotFound(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}
