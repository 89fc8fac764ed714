//! Recreating a snapshot's folder layout in a target inventory.
//!
//! [`plan`] reads the target and decides which folders must be created and
//! which VMs must be moved. [`execute`] applies the plan, or only reports it
//! in [`ExecutionMode::Simulate`].

mod execute;
mod plan;

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::folder_path::FolderPath;
use crate::inventory::ObjectRef;
use crate::snapshot::VmRecord;

pub use execute::execute;
pub use plan::plan;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Create `name` inside `parent`, or inside the target root when `parent`
    /// is `None`.
    CreateFolder {
        parent: Option<FolderPath>,
        name: String,
    },
    RelocateVm {
        vm: VmRecord,
        destination: FolderPath,
    },
}

impl Operation {
    /// Full path of the folder this operation creates or fills.
    pub fn target_path(&self) -> FolderPath {
        match self {
            Operation::CreateFolder { parent: Some(parent), name } => parent.child(name),
            Operation::CreateFolder { parent: None, name } => FolderPath::root(name),
            Operation::RelocateVm { destination, .. } => destination.clone(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateFolder { .. } => write!(f, "create folder '{}'", self.target_path()),
            Operation::RelocateVm { vm, destination } => {
                write!(f, "move VM '{}' ({}) to '{}'", vm.name, vm.uuid, destination)
            }
        }
    }
}

/// Why a plan entry cannot be carried out.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanIssue {
    #[error("VM {0} not found in the holding folder")]
    VmNotFound(String),

    #[error("{count} VMs with uuid {uuid} found in the holding folder")]
    DuplicateUuid { uuid: String, count: usize },

    #[error("uuid {0} appears more than once in the snapshot")]
    DuplicateInSnapshot(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanStatus {
    /// Ready to apply. Relocations carry the VM found in the holding folder.
    Ready { source: Option<ObjectRef> },
    /// The VM already sits in its destination folder.
    AlreadyInPlace,
    Unresolved(PlanIssue),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub operation: Operation,
    pub status: PlanStatus,
}

/// Ordered restore steps: all folder creations (parents first), then all
/// relocations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestorePlan {
    pub entries: Vec<PlanEntry>,
}

impl RestorePlan {
    pub fn ready(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.status, PlanStatus::Ready { .. }))
    }

    pub fn folders_to_create(&self) -> usize {
        self.ready()
            .filter(|entry| matches!(entry.operation, Operation::CreateFolder { .. }))
            .count()
    }

    pub fn vms_to_relocate(&self) -> usize {
        self.ready()
            .filter(|entry| matches!(entry.operation, Operation::RelocateVm { .. }))
            .count()
    }

    pub fn unresolved(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.status, PlanStatus::Unresolved(_)))
            .count()
    }

    pub fn already_in_place(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.status == PlanStatus::AlreadyInPlace)
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    Apply,
    #[default]
    Simulate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    WouldApply,
    AlreadyInPlace,
    Unresolved(PlanIssue),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct OperationOutcome {
    pub operation: Operation,
    pub outcome: Outcome,
    pub at: DateTime<Utc>,
}

/// One outcome per plan entry, in plan order.
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    pub mode: ExecutionMode,
    pub outcomes: Vec<OperationOutcome>,
}

impl ExecutionReport {
    fn count(&self, f: impl Fn(&OperationOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| f(o)).count()
    }

    pub fn applied(&self) -> usize {
        self.count(|o| o.outcome == Outcome::Applied)
    }

    pub fn would_apply(&self) -> usize {
        self.count(|o| o.outcome == Outcome::WouldApply)
    }

    pub fn already_in_place(&self) -> usize {
        self.count(|o| o.outcome == Outcome::AlreadyInPlace)
    }

    pub fn unresolved(&self) -> usize {
        self.count(|o| matches!(o.outcome, Outcome::Unresolved(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o.outcome, Outcome::Failed(_)))
    }

    /// Folder creations that were applied or would be.
    pub fn folders_created(&self) -> usize {
        self.count(|o| {
            matches!(o.operation, Operation::CreateFolder { .. })
                && matches!(o.outcome, Outcome::Applied | Outcome::WouldApply)
        })
    }

    /// True when nothing failed or stayed unresolved; otherwise a re-run may
    /// be needed once the cause is fixed.
    pub fn is_complete(&self) -> bool {
        self.failed() == 0 && self.unresolved() == 0
    }

    /// Outcome recorded for `operation`, if it was part of the plan.
    pub fn outcome_for(&self, operation: &Operation) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|o| &o.operation == operation)
            .map(|o| &o.outcome)
    }
}
