//! Innkeep CLI: media library maintenance for the hotel site.
//!
//! Set DATABASE_URL (a `.env` file is honoured). Logs go to stderr; set
//! LOG_FORMAT=json for structured logs and RUST_LOG to change the filter.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use innkeep_cli::{format_bytes, init_tracing, truncate_string};
use innkeep_core::models::DedupReport;
use innkeep_core::{ContentHash, DedupConfig, ErrorMetadata, LogFormat};
use innkeep_db::{connect, migrate, ContentRepository, MediaAssetRepository};
use innkeep_services::{DedupOptions, DedupPlan, MediaDedupService, ReferenceLocation};
use serde::Serialize;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "innkeep", about = "Media library maintenance")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Show duplicate groups and what a merge would do, without writing
    Scan {
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Merge duplicate groups: rewrite references, then delete duplicates
    Merge {
        /// Plan only; overrides DEDUP_DRY_RUN
        #[arg(long)]
        dry_run: bool,
        /// Leave already-rewritten rows as they are when a group fails
        #[arg(long)]
        no_compensate: bool,
        /// Skip the reference check before deleting
        #[arg(long)]
        no_verify: bool,
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// List content rows referencing a media URL
    Usage {
        url: String,
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// List unprotected assets no content row references
    Orphans {
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Print the content hash of a local file
    Hash {
        file: PathBuf,
    },
    /// Delete a single media asset
    Delete {
        /// Media asset UUID
        id: Uuid,
        /// Delete even if content still references the asset
        #[arg(long)]
        force: bool,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

async fn build_service(
    options: impl FnOnce(&DedupConfig) -> DedupOptions,
) -> anyhow::Result<MediaDedupService> {
    let config = DedupConfig::from_env().context("Failed to load configuration")?;
    let pool = connect(&config).await?;
    Ok(MediaDedupService::new(
        Arc::new(MediaAssetRepository::new(pool.clone())),
        Arc::new(ContentRepository::new(pool)),
        options(&config),
    ))
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing(LogFormat::from_env());

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            if let Some(app_error) = e.downcast_ref::<innkeep_core::AppError>() {
                eprintln!("Error [{}]: {}", app_error.error_code(), app_error.client_message());
                if let Some(action) = app_error.suggested_action() {
                    eprintln!("  {}", action);
                }
            } else {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> anyhow::Result<ExitCode> {
    match command {
        Commands::Migrate => {
            let config = DedupConfig::from_env().context("Failed to load configuration")?;
            let pool = connect(&config).await?;
            migrate(&pool).await?;
            println!("Migrations applied");
        }
        Commands::Scan { format } => {
            let service = build_service(|_| DedupOptions {
                dry_run: true,
                ..DedupOptions::default()
            })
            .await?;
            let plan = service.plan().await?;
            match format {
                OutputFormat::Json => print_json(&plan)?,
                OutputFormat::Table => print_plan_table(&plan),
            }
        }
        Commands::Merge {
            dry_run,
            no_compensate,
            no_verify,
            format,
        } => {
            let service = build_service(|config| {
                let mut options = DedupOptions::from(config);
                options.dry_run |= dry_run;
                options.compensate_on_failure &= !no_compensate;
                options.verify_before_delete &= !no_verify;
                options
            })
            .await?;
            let report = service.run().await?;
            match format {
                OutputFormat::Json => print_json(&report)?,
                OutputFormat::Table => print_report_table(&report),
            }
            if report.has_failures() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Usage { url, format } => {
            let service = build_service(|config| DedupOptions::from(config)).await?;
            let locations = service.usage(&url).await?;
            match format {
                OutputFormat::Json => print_json(&locations)?,
                OutputFormat::Table => print_usage_table(&url, &locations),
            }
        }
        Commands::Orphans { format } => {
            let service = build_service(|config| DedupOptions::from(config)).await?;
            let orphans = service.orphans().await?;
            match format {
                OutputFormat::Json => print_json(&orphans)?,
                OutputFormat::Table => {
                    println!("{:<36}  {:>10}  URL", "ID", "SIZE");
                    for asset in &orphans {
                        println!(
                            "{:<36}  {:>10}  {}",
                            asset.id,
                            format_bytes(asset.byte_size),
                            truncate_string(&asset.url, 60)
                        );
                    }
                    let total: i64 = orphans.iter().map(|a| a.byte_size).sum();
                    println!("\n{} unreferenced assets ({})", orphans.len(), format_bytes(total));
                }
            }
        }
        Commands::Hash { file } => {
            let reader = std::fs::File::open(&file)
                .with_context(|| format!("Failed to open {}", file.display()))?;
            let hash = ContentHash::from_reader(std::io::BufReader::new(reader))?;
            println!("{}  {}", hash, file.display());
        }
        Commands::Delete { id, force } => {
            let service = build_service(|config| DedupOptions::from(config)).await?;
            let asset = service.delete_asset(id, force).await?;
            println!("Deleted {} ({}, {})", asset.id, asset.url, format_bytes(asset.byte_size));
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_plan_table(plan: &DedupPlan) {
    println!("Scanned {} assets\n", plan.assets_scanned);
    for group in &plan.groups {
        println!(
            "{}  keep {} ({})",
            truncate_string(&group.group, 24),
            group.canonical.id,
            truncate_string(&group.canonical.url, 60)
        );
        for asset in &group.to_delete {
            println!("    delete  {}  {}", asset.id, truncate_string(&asset.url, 60));
        }
        for asset in &group.retained {
            println!("    retain  {}  {} (protected)", asset.id, truncate_string(&asset.url, 60));
        }
        println!(
            "    {} references to rewrite, {} reclaimable",
            group.references,
            format_bytes(group.bytes_reclaimable)
        );
    }
    println!(
        "\n{} duplicate groups, {} duplicates, {} references, {} reclaimable",
        plan.groups.len(),
        plan.duplicates,
        plan.references,
        format_bytes(plan.bytes_reclaimable)
    );
}

fn print_report_table(report: &DedupReport) {
    println!(
        "{:<24}  {:<16}  {:>7}  {:>10}  {:>10}",
        "GROUP", "STATE", "DELETED", "REFS", "RECLAIMED"
    );
    for outcome in &report.outcomes {
        println!(
            "{:<24}  {:<16}  {:>7}  {:>10}  {:>10}",
            truncate_string(&outcome.group, 24),
            outcome.state.as_str(),
            outcome.deleted_ids.len(),
            outcome.references_rewritten,
            format_bytes(outcome.bytes_reclaimed)
        );
        for error in &outcome.errors {
            println!("    ! {}", error);
        }
    }
    println!("\n{}", report.summary_line());
}

fn print_usage_table(url: &str, locations: &[ReferenceLocation]) {
    if locations.is_empty() {
        println!("{} is not referenced", url);
        return;
    }
    println!("{:<28}  {:<36}  {:>5}", "FIELD", "ROW", "COUNT");
    for location in locations {
        println!(
            "{:<28}  {:<36}  {:>5}",
            format!("{}.{}", location.table, location.column),
            location.row_id,
            location.occurrences
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_is_its_own_command() {
        let cli = Cli::try_parse_from(["innkeep", "migrate"]).unwrap();
        assert!(matches!(cli.command, Commands::Migrate));
    }
}
