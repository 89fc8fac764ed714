use std::collections::HashMap;

use chrono::Utc;
use tracing::{error, info, warn};

use super::{ExecutionMode, ExecutionReport, Operation, OperationOutcome, Outcome, PlanEntry, PlanStatus, RestorePlan};
use crate::error::Error;
use crate::folder_path::FolderPath;
use crate::inventory::{Inventory, InventoryError, ObjectRef};
use crate::progress::ProgressReporter;

/// Looks up folders below the target root by path, remembering what it found
/// and what was created along the way.
struct FolderResolver<'a> {
    target_root: &'a ObjectRef,
    known: HashMap<FolderPath, ObjectRef>,
}

impl FolderResolver<'_> {
    fn resolve<I: Inventory + ?Sized>(
        &mut self,
        inventory: &I,
        path: &FolderPath,
    ) -> Result<Option<ObjectRef>, InventoryError> {
        if let Some(found) = self.known.get(path) {
            return Ok(Some(found.clone()));
        }
        let parent = match path.parent() {
            None => self.target_root.clone(),
            Some(parent) => match self.resolve(inventory, &parent)? {
                Some(parent) => parent,
                None => return Ok(None),
            },
        };
        let found = inventory.find_child_folder(&parent, path.name())?;
        if let Some(found) = &found {
            self.known.insert(path.clone(), found.clone());
        }
        Ok(found)
    }

    fn resolve_parent<I: Inventory + ?Sized>(
        &mut self,
        inventory: &I,
        parent: Option<&FolderPath>,
    ) -> Result<Option<ObjectRef>, InventoryError> {
        match parent {
            None => Ok(Some(self.target_root.clone())),
            Some(parent) => self.resolve(inventory, parent),
        }
    }
}

/// Session-level failures end the whole run; anything else only fails the
/// operation at hand.
fn is_fatal(err: &InventoryError) -> bool {
    matches!(
        err,
        InventoryError::Connection(_) | InventoryError::Closed | InventoryError::Authentication(_)
    )
}

/// Carry out `plan` in order.
///
/// Every plan entry gets exactly one outcome in the report. Failures of
/// individual operations are recorded and the run continues; only a lost
/// session aborts it. In [`ExecutionMode::Simulate`] no mutating call is
/// made and ready entries are reported as [`Outcome::WouldApply`].
pub fn execute<I: Inventory + ?Sized>(
    inventory: &mut I,
    plan: &RestorePlan,
    target_root: &ObjectRef,
    mode: ExecutionMode,
    reporter: &dyn ProgressReporter,
) -> Result<ExecutionReport, Error> {
    let mut resolver = FolderResolver {
        target_root,
        known: HashMap::new(),
    };
    let mut report = ExecutionReport {
        mode,
        outcomes: Vec::with_capacity(plan.entries.len()),
    };

    for entry in &plan.entries {
        let outcome = match (&entry.status, mode) {
            (PlanStatus::Unresolved(issue), _) => {
                warn!("Cannot {}: {}", entry.operation, issue);
                Outcome::Unresolved(issue.clone())
            }
            (PlanStatus::AlreadyInPlace, _) => {
                info!("Already done: {}", entry.operation);
                Outcome::AlreadyInPlace
            }
            (PlanStatus::Ready { .. }, ExecutionMode::Simulate) => {
                info!("Would {}", entry.operation);
                Outcome::WouldApply
            }
            (PlanStatus::Ready { source }, ExecutionMode::Apply) => {
                match apply(inventory, &mut resolver, entry, source.as_ref()) {
                    Ok(()) => {
                        info!("Done: {}", entry.operation);
                        Outcome::Applied
                    }
                    Err(err) if is_fatal(&err) => {
                        error!("Restore aborted at '{}': {}", entry.operation, err);
                        return Err(err.into());
                    }
                    Err(err) => {
                        error!("Failed to {}: {}", entry.operation, err);
                        Outcome::Failed(err.to_string())
                    }
                }
            }
        };

        let recorded = OperationOutcome {
            operation: entry.operation.clone(),
            outcome,
            at: Utc::now(),
        };
        reporter.on_operation(&recorded);
        report.outcomes.push(recorded);
    }

    info!(
        "Restore finished: {} applied, {} would apply, {} already in place, {} unresolved, {} failed",
        report.applied(),
        report.would_apply(),
        report.already_in_place(),
        report.unresolved(),
        report.failed()
    );
    Ok(report)
}

fn apply<I: Inventory + ?Sized>(
    inventory: &mut I,
    resolver: &mut FolderResolver<'_>,
    entry: &PlanEntry,
    source: Option<&ObjectRef>,
) -> Result<(), InventoryError> {
    match &entry.operation {
        Operation::CreateFolder { parent, name } => {
            let parent_ref = resolver
                .resolve_parent(&*inventory, parent.as_ref())?
                .ok_or_else(|| missing_folder(parent.as_ref()))?;
            let created = inventory.create_folder(&parent_ref, name)?;
            resolver.known.insert(entry.operation.target_path(), created);
            Ok(())
        }
        Operation::RelocateVm { vm, destination } => {
            let vm_ref = source.ok_or_else(|| InventoryError::NotFound(vm.uuid.clone()))?;
            let folder = resolver
                .resolve(&*inventory, destination)?
                .ok_or_else(|| missing_folder(Some(destination)))?;
            inventory.move_into_folder(&folder, vm_ref)
        }
    }
}

fn missing_folder(path: Option<&FolderPath>) -> InventoryError {
    match path {
        Some(path) => InventoryError::NotFound(path.to_string()),
        None => InventoryError::NotFound("target root".to_string()),
    }
}
