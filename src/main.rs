mod cli;
mod logging;
mod prompt;
mod reporter;

use std::io::{self, Write};
use std::process;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands, DumpArgs, RestoreArgs};
use colored::*;
use dotenv::dotenv;
use reporter::CliReporter;
use tracing::{debug, info};
use vmfolders::inventory::{self, Session};
use vmfolders::restore::ExecutionMode;
use vmfolders::snapshot::{self, Snapshot};
use vmfolders::{AppConfig, DumpRequest, RestoreRequest};

fn main() {
    dotenv().ok();

    let args = Cli::parse();
    let verbose = args.verbose;
    let guard = logging::init_logger(verbose);

    let code = match run(args) {
        Ok(()) => 0,
        Err(err) => {
            if verbose {
                eprintln!("{} {:?}", "error:".red().bold(), err);
            } else {
                eprintln!("{} {:#}", "error:".red().bold(), err);
            }
            1
        }
    };

    // flush the file log before exiting
    drop(guard);
    process::exit(code);
}

fn run(args: Cli) -> anyhow::Result<()> {
    let config = vmfolders::config::load_configuration(args.config.as_deref())
        .context("Error loading configuration")?;
    debug!("Configuration: server={:?} datacenter={:?}", config.server, config.datacenter);

    match args.command {
        Some(Commands::Dump(dump_args)) => run_dump(config, dump_args),
        Some(Commands::Restore(restore_args)) => run_restore(config, restore_args),
        None => {
            Cli::command().print_long_help()?;
            Ok(())
        }
    }
}

fn run_dump(mut config: AppConfig, args: DumpArgs) -> anyhow::Result<()> {
    args.connection.apply_to(&mut config);
    config.exclude.extend(args.exclude);
    config.exclude_vm.extend(args.exclude_vm);
    config.exclude_folder.extend(args.exclude_folder);

    let request = DumpRequest {
        datacenter: config.datacenter()?.to_string(),
        folders: args.folders,
        rules: config.exclusion_rules()?,
    };
    let params = config.connection_params(prompt::prompt_password)?;

    let session = Session::new(inventory::connect(&params)?);
    let reporter = CliReporter::new();
    let result = vmfolders::dump(&*session, &request, &reporter)?;
    session.close().context("Error releasing inventory session")?;

    match &args.output {
        Some(path) => {
            snapshot::write_snapshot(path, &result.snapshot)?;
            info!("Snapshot written to {}", path.display());
        }
        None => {
            let bytes = snapshot::encode(&result.snapshot)?;
            io::stdout().write_all(&bytes)?;
        }
    }

    eprintln!(
        "{} folders, {} VMs, {} excluded, {} skipped",
        format!("{}", result.snapshot.len()).cyan(),
        format!("{}", result.snapshot.vm_count()).cyan(),
        result.stats.folders_excluded + result.stats.vms_excluded,
        format!("{}", result.stats.unknown_skipped + result.stats.vanished_skipped).yellow(),
    );
    Ok(())
}

fn run_restore(mut config: AppConfig, args: RestoreArgs) -> anyhow::Result<()> {
    args.connection.apply_to(&mut config);
    if let Some(holding_folder) = args.holding_folder {
        config.holding_folder = holding_folder;
    }

    // A malformed snapshot must stop us before anything is touched.
    let snapshot: Snapshot = snapshot::read_snapshot(&args.snapshot)
        .with_context(|| format!("Error loading snapshot {}", args.snapshot.display()))?;

    let mode = if args.noop {
        ExecutionMode::Simulate
    } else {
        ExecutionMode::Apply
    };
    let request = RestoreRequest {
        datacenter: config.datacenter()?.to_string(),
        target_folder: args.folder,
        holding_folder: config.holding_folder.clone(),
        mode,
    };
    let params = config.connection_params(prompt::prompt_password)?;

    if mode == ExecutionMode::Apply && !args.yes {
        let question = format!(
            "Restore {} folders and {} VMs into datacenter '{}'?",
            snapshot.len(),
            snapshot.vm_count(),
            request.datacenter
        );
        if !prompt::prompt_confirm(&question, Some(false))? {
            info!("Restore cancelled");
            return Ok(());
        }
    }

    let mut session = Session::new(inventory::connect(&params)?);
    let reporter = CliReporter::new();
    let result = vmfolders::restore(&mut *session, &request, &snapshot, &reporter)?;
    session.close().context("Error releasing inventory session")?;

    let report = &result.report;
    eprintln!(
        "Plan {:.2}s, execute {:.2}s: {} applied, {} would apply, {} in place, {} unresolved, {} failed",
        result.plan_duration.as_secs_f64(),
        result.execute_duration.as_secs_f64(),
        format!("{}", report.applied()).green(),
        format!("{}", report.would_apply()).cyan(),
        report.already_in_place(),
        format!("{}", report.unresolved()).yellow(),
        format!("{}", report.failed()).red(),
    );

    if mode == ExecutionMode::Apply && !report.is_complete() {
        bail!(
            "restore incomplete: {} failed, {} unresolved; re-run after fixing the cause",
            report.failed(),
            report.unresolved()
        );
    }
    Ok(())
}
