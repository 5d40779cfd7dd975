use clap::Parser;
use snapshot_extract::ui::output::plan_total;
use snapshot_extract::{
    logging, Cli, ExtractError, OutputFormatter, OutputMode, RunReport, SnapshotExtract,
    UserFriendlyError,
};
use std::path::{Path, PathBuf};
use std::process;

const EXIT_SHARD_FAILURES: i32 = 1;
const EXIT_CONFIG: i32 = 2;
const EXIT_TOOL_MISSING: i32 = 3;
const EXIT_INTERNAL: i32 = 4;
const EXIT_CANCELLED: i32 = 130;

#[tokio::main]
async fn main() {
    let exit_code = run().await;
    process::exit(exit_code);
}

async fn run() -> i32 {
    let cli = Cli::parse();

    if cli.generate_config {
        return handle_generate_config(&cli);
    }

    if let Err(e) = logging::init(cli.verbosity_level(), cli.quiet, cli.should_use_colors()) {
        eprintln!("warning: {}", e);
    }

    let (source_dir, dest_dir) = match (&cli.input_dir, &cli.output_dir) {
        (Some(source), Some(dest)) => (source.clone(), dest.clone()),
        _ => {
            eprintln!("error: INPUT_DIR and OUTPUT_DIR are required");
            return EXIT_CONFIG;
        }
    };

    let snapshot = match SnapshotExtract::from_cli(&cli) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            print_startup_error(&cli, &e);
            return exit_code_for(&e);
        }
    };

    if cli.dry_run {
        return handle_dry_run(&snapshot, &source_dir, &dest_dir);
    }

    let interactive = cli.interactive(snapshot.config());
    match snapshot.extract(&source_dir, &dest_dir, interactive).await {
        Ok(report) => {
            snapshot.output_formatter().print_run_report(&report);
            exit_code_for_report(&report)
        }
        Err(e) => {
            snapshot.handle_error(&e);
            exit_code_for(&e)
        }
    }
}

fn exit_code_for_report(report: &RunReport) -> i32 {
    if report.cancelled {
        EXIT_CANCELLED
    } else if !report.failures.is_empty() {
        EXIT_SHARD_FAILURES
    } else {
        0
    }
}

fn exit_code_for(error: &ExtractError) -> i32 {
    match error {
        ExtractError::Cancelled => EXIT_CANCELLED,
        ExtractError::Config { .. } | ExtractError::InvalidPath { .. } => EXIT_CONFIG,
        ExtractError::ToolNotFound { .. } => EXIT_TOOL_MISSING,
        ExtractError::ArchiveMissing { .. } | ExtractError::ToolFailed { .. } => {
            EXIT_SHARD_FAILURES
        }
        ExtractError::StreamClosed | ExtractError::Worker { .. } | ExtractError::Io(_) => {
            EXIT_INTERNAL
        }
    }
}

fn handle_generate_config(cli: &Cli) -> i32 {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("snapshot-extract.toml"));

    match SnapshotExtract::generate_sample_config(&config_path) {
        Ok(()) => {
            println!(
                "Generated sample configuration file: {}",
                config_path.display()
            );
            println!("\nTo use this configuration:");
            println!(
                "  snapshot-extract <INPUT_DIR> <OUTPUT_DIR> --config {}",
                config_path.display()
            );
            0
        }
        Err(e) => {
            eprintln!(
                "Failed to generate configuration file: {}",
                e.user_message()
            );
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            EXIT_CONFIG
        }
    }
}

fn handle_dry_run(snapshot: &SnapshotExtract, source_dir: &Path, dest_dir: &Path) -> i32 {
    let formatter = snapshot.output_formatter();
    let config = snapshot.config();

    formatter.info("DRY RUN MODE - No files will be extracted");
    formatter.print_banner(source_dir, dest_dir);
    formatter.info(&format!("Shards: {:?}", config.shard_list()));
    formatter.info(&format!(
        "Compression: {:?}, tar program: {}",
        config.extract.compression, config.extract.tar_program
    ));

    let plan = match snapshot.dry_run(source_dir) {
        Ok(plan) => plan,
        Err(e) => {
            snapshot.handle_error(&e);
            return exit_code_for(&e);
        }
    };

    formatter.print_dry_run(&plan);

    let missing = plan.iter().filter(|(_, scanned)| scanned.is_err()).count();
    if missing > 0 {
        formatter.error(&format!("{} shard(s) have no archive", missing));
        return EXIT_SHARD_FAILURES;
    }

    formatter.success(&format!(
        "{} shard(s) ready, {} to extract",
        plan.len(),
        plan_total(&plan)
    ));
    0
}

fn print_startup_error(cli: &Cli, error: &ExtractError) {
    let mode: OutputMode = cli.output_format.into();
    let formatter = OutputFormatter::new(mode, 0, false);
    formatter.print_user_friendly_error(error);
}
