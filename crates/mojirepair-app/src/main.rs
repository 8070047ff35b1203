use std::process;

use mojirepair_app::cli::{Cli, Commands, RunArgs, SanitizeArgs};
use mojirepair_app::config::{self, AppConfig};
use mojirepair_app::error::AppError;
use mojirepair_app::services::{
    RepairEvent, RepairOptions, Resolution, build_repairer, build_sanitizer,
};
use tracing_subscriber::{filter::LevelFilter, fmt};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(determine_log_level(&cli));

    if let Err(err) = run(cli).await {
        eprintln!("{err}");
        process::exit(1);
    }
}

fn determine_log_level(cli: &Cli) -> LevelFilter {
    match cli.verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn init_tracing(level: LevelFilter) {
    // Progress lines own stdout; diagnostics go to stderr.
    let subscriber = fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("Tracing subscriber already set; skipping re-initialization.");
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let cfg = config::load()?;

    match cli.command {
        None => run_repair(&cfg, RunArgs::default()).await,
        Some(Commands::Run(args)) => run_repair(&cfg, args).await,
        Some(Commands::Sanitize(args)) => run_sanitize(&cfg, args).await,
    }
}

async fn run_repair(cfg: &AppConfig, args: RunArgs) -> Result<(), AppError> {
    let page_size = match args.page_size {
        Some(size) => usize::try_from(size)
            .map_err(|_| AppError::Config(format!("page size {size} is out of range")))?,
        None => cfg.repair.page_size,
    };
    if page_size == 0 {
        return Err(AppError::Config("repair.page_size must be > 0".to_string()));
    }

    let options = RepairOptions::builder()
        .page_size(page_size)
        .start_offset(args.offset.unwrap_or(cfg.repair.start_offset))
        .dry_run(args.dry_run)
        .include_descriptions(args.descriptions || cfg.repair.include_descriptions)
        .maybe_max_pages(args.max_pages)
        .build();
    let repairer = build_repairer(cfg, options, !args.no_oracle)?;

    tracing::info!(
        table = %cfg.store.table,
        page_size,
        dry_run = args.dry_run,
        "starting repair run"
    );
    println!("Starting database repair...");
    repairer.run(print_event).await;

    Ok(())
}

fn print_event(event: &RepairEvent) {
    if let RepairEvent::FixProposed { id, resolution, .. } = event {
        tracing::debug!(%id, via = resolution.label(), "fix proposed");
    }
    println!("{}", progress_line(event));
}

fn progress_line(event: &RepairEvent) -> String {
    match event {
        RepairEvent::BatchStarted { offset } => format!("Scanning batch {offset}..."),
        RepairEvent::FixProposed {
            id,
            field,
            before,
            after,
            ..
        } => format!("[FIX] ID {id} {field}: '{before}' -> '{after}'"),
        RepairEvent::Saved { .. } => " -> Saved".to_string(),
        RepairEvent::WriteFailed { .. } => " -> Failed".to_string(),
        RepairEvent::WriteSkipped { .. } => " -> Skipped (dry run)".to_string(),
        RepairEvent::Completed { summary } => format!("\n{summary}"),
    }
}

async fn run_sanitize(cfg: &AppConfig, args: SanitizeArgs) -> Result<(), AppError> {
    let sanitizer = build_sanitizer(cfg, !args.no_oracle)?;

    for input in &args.inputs {
        let out = sanitizer.sanitize(input).await;
        match &out.resolution {
            Resolution::OracleFailed(err) => {
                println!("'{input}' -> '{}' [{}: {err}]", out.text, out.resolution.label())
            }
            resolution => println!("'{input}' -> '{}' [{}]", out.text, resolution.label()),
        }
    }

    Ok(())
}
