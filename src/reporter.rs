use std::cell::RefCell;
use std::time::Duration;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use vmfolders::restore::{OperationOutcome, Outcome};
use vmfolders::{FolderPath, ProgressReporter, WalkStats};

/// CLI progress reporter: a spinner while walking, one line per restore
/// operation.
pub struct CliReporter {
    bar: RefCell<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: RefCell::new(None),
        }
    }

    fn finish_bar(&self) {
        if let Some(pb) = self.bar.borrow_mut().take() {
            pb.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_walk_start(&self, roots: usize) {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }
        pb.set_message(format!("Walking {} root folders...", roots));
        pb.enable_steady_tick(Duration::from_millis(80));
        if let Some(old) = self.bar.borrow_mut().replace(pb) {
            old.finish_and_clear();
        }
    }

    fn on_folder_visited(&self, path: &FolderPath, folders_seen: usize) {
        if let Some(pb) = self.bar.borrow().as_ref() {
            pb.set_message(format!("{} folders... {}", folders_seen, path));
        }
    }

    fn on_walk_complete(&self, stats: &WalkStats, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  {} Walk complete: {} folders, {} VMs in {:.2}s",
            "✓".green(),
            stats.folders_visited,
            stats.vms_recorded,
            duration_secs
        );
    }

    fn on_plan_complete(&self, operations: usize, unresolved: usize) {
        eprintln!(
            "  {} Plan: {} entries, {} unresolved",
            "✓".green(),
            operations,
            unresolved
        );
    }

    fn on_operation(&self, outcome: &OperationOutcome) {
        let label = match &outcome.outcome {
            Outcome::Applied => "applied".green(),
            Outcome::WouldApply => "would apply".cyan(),
            Outcome::AlreadyInPlace => "in place".dimmed(),
            Outcome::Unresolved(_) => "unresolved".yellow(),
            Outcome::Failed(_) => "failed".red(),
        };
        match &outcome.outcome {
            Outcome::Unresolved(issue) => eprintln!("  [{}] {}: {}", label, outcome.operation, issue),
            Outcome::Failed(reason) => eprintln!("  [{}] {}: {}", label, outcome.operation, reason),
            _ => eprintln!("  [{}] {}", label, outcome.operation),
        }
    }
}
