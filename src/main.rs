use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use lead_consolidator::app::{ConsolidationRequest, ConsolidationUseCase};
use lead_consolidator::config::AppConfig;
use lead_consolidator::infra::{HttpCompanyLookup, JsonOutputAdapter};
use lead_consolidator::logging;
use lead_consolidator::observability;
use lead_consolidator::pipeline::enrich::EnrichmentEscalator;
use lead_consolidator::pipeline::ingestion::load_batches;
use lead_consolidator::pipeline::storage::CampaignHistory;

#[derive(Parser)]
#[command(name = "lead_consolidator")]
#[command(about = "Consolidates scraped lead batches into a deduplicated, country-verified list")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize, deduplicate, classify and filter lead batches
    Consolidate {
        /// TOML configuration file
        #[arg(long)]
        config: PathBuf,
        /// Batch file ({source, records}); repeat in priority order
        #[arg(long = "batch", required = true)]
        batches: Vec<PathBuf>,
        /// Client whose campaign history is used for cross-campaign dedup
        #[arg(long, requires = "history_dir")]
        client: Option<String>,
        /// Directory holding the client's campaign files
        #[arg(long, requires = "client")]
        history_dir: Option<PathBuf>,
        /// Skip paid company lookups even if enabled in the config
        #[arg(long)]
        no_escalation: bool,
        /// Where to write the consolidated leads
        #[arg(long)]
        out: PathBuf,
        /// Where to write the run report
        #[arg(long)]
        report: PathBuf,
        /// Write Prometheus metrics of the run to this file
        #[arg(long)]
        metrics_out: Option<PathBuf>,
    },
    /// List the effective country registry
    Countries {
        /// TOML configuration file (built-in countries only when omitted)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn build_escalator(config: &AppConfig, no_escalation: bool) -> anyhow::Result<Option<EnrichmentEscalator>> {
    if no_escalation || !config.escalation.enabled {
        info!("Company lookup escalation disabled");
        return Ok(None);
    }
    let api_key = config.escalation.api_key().with_context(|| {
        format!(
            "Escalation is enabled but {} is not set",
            config.escalation.api_key_env
        )
    })?;
    let limits = config.escalation.limits();
    let lookup = HttpCompanyLookup::new(&config.escalation.base_url, api_key, limits.timeout)?;
    Ok(Some(EnrichmentEscalator::new(Arc::new(lookup), limits)))
}

#[allow(clippy::too_many_arguments)]
async fn consolidate(
    config_path: &Path,
    batches: Vec<PathBuf>,
    client: Option<String>,
    history_dir: Option<PathBuf>,
    no_escalation: bool,
    out: PathBuf,
    report: PathBuf,
    metrics_out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = AppConfig::load(config_path)?;
    let _guard = logging::init_logging(&config.run.log_dir);
    if metrics_out.is_some() {
        observability::init().map_err(|e| anyhow::anyhow!("{}", e))?;
    }

    let escalator = build_escalator(&config, no_escalation)?;
    let output = Arc::new(JsonOutputAdapter::new(out, report));
    let mut use_case = ConsolidationUseCase::from_config(&config, escalator, output)?;

    // Batch tags are validated before any record is processed.
    let mut request = ConsolidationRequest::from(load_batches(&batches)?);
    if let (Some(client), Some(dir)) = (client, history_dir) {
        request = request.with_history(CampaignHistory::new(dir, client));
    }

    let run = use_case.run_and_write(request).await?;
    let report = &run.report;

    println!("\n📊 Consolidation Results (run {}):", report.run_id);
    println!("   Target country: {}", report.target_country);
    println!("   Normalized leads: {}", report.total_normalized());
    println!(
        "   Duplicates removed: {}",
        report.dedup_stats.intra_run.duplicates_removed()
            + report
                .dedup_stats
                .cross_campaign
                .as_ref()
                .map_or(0, |s| s.duplicates_removed())
    );
    println!(
        "   Classification: {} domestic, {} foreign, {} uncertain",
        report.classification_stats.domestic,
        report.classification_stats.foreign,
        report.classification_stats.uncertain
    );
    if report.escalation_stats.escalated_domains > 0 {
        println!(
            "   Escalated domains: {} ({} credits)",
            report.escalation_stats.escalated_domains, report.escalation_stats.credits_consumed
        );
    }
    for stage in &report.filter_stage_reports {
        println!(
            "   Stage {}: {} -> {}",
            stage.name, stage.before_count, stage.after_count
        );
    }
    println!("   Delivered leads: {}", report.output_leads);
    if let Some(campaign) = report.persisted_campaign {
        println!("   Recorded as campaign {}", campaign);
    }
    if let Some(error) = &report.history_error {
        println!("\n⚠️  Delivered leads were not recorded in the client history: {}", error);
    }
    if !report.skipped_batches.is_empty() {
        warn!("{} batches were skipped", report.skipped_batches.len());
        println!("\n⚠️  Skipped batches:");
        for skipped in &report.skipped_batches {
            println!("   - {}", skipped);
        }
    }

    if let Some(path) = metrics_out {
        let rendered = observability::render().unwrap_or_default();
        std::fs::write(&path, rendered)
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
        info!("Metrics written to {}", path.display());
    }

    Ok(())
}

fn list_countries(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = match config_path {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    let registry = config.country_registry()?;
    println!("🌍 Country registry ({} countries):", registry.len());
    for profile in registry.profiles() {
        let marker = if profile.code == config.run.target_country.to_ascii_uppercase() {
            " (target)"
        } else {
            ""
        };
        println!(
            "   {} {}{}: tld {}, phone {}, aliases [{}]",
            profile.code,
            profile.name,
            marker,
            profile.home_tld,
            profile.home_phone_prefix,
            profile.aliases.join(", ")
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Consolidate {
            config,
            batches,
            client,
            history_dir,
            no_escalation,
            out,
            report,
            metrics_out,
        } => {
            consolidate(
                &config,
                batches,
                client,
                history_dir,
                no_escalation,
                out,
                report,
                metrics_out,
            )
            .await
        }
        Commands::Countries { config } => list_countries(config),
    }
}
