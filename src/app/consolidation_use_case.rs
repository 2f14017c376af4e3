use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn, Span};
use uuid::Uuid;

use crate::app::ports::LeadOutputPort;
use crate::app::report::{ConsolidationReport, DedupReport};
use crate::config::AppConfig;
use crate::domain::Lead;
use crate::error::{ConfigError, ConsolidationError, Result};
use crate::pipeline::ingestion::{LoadedBatches, RawBatch};
use crate::pipeline::processing::classify::CountryClassifier;
use crate::pipeline::processing::dedup::{deduplicate, deduplicate_against_history};
use crate::pipeline::processing::enrich::{escalate_uncertain, EnrichmentEscalator};
use crate::pipeline::processing::normalize::{IndustryCache, NormalizationStats, SchemaNormalizer};
use crate::pipeline::processing::quality_gate::FilterPipeline;
use crate::pipeline::storage::{Campaign, CampaignHistory};

/// Input of one consolidation run.
#[derive(Debug, Default)]
pub struct ConsolidationRequest {
    /// Batches in priority order; earlier batches win duplicates
    pub batches: Vec<RawBatch>,
    /// Labels of batches that could not be loaded
    pub skipped_batches: Vec<String>,
    /// Client history to deduplicate against and to extend with this run
    pub history: Option<CampaignHistory>,
}

impl ConsolidationRequest {
    pub fn new(batches: Vec<RawBatch>) -> Self {
        Self {
            batches,
            ..Default::default()
        }
    }

    pub fn with_history(mut self, history: CampaignHistory) -> Self {
        self.history = Some(history);
        self
    }
}

impl From<LoadedBatches> for ConsolidationRequest {
    fn from(loaded: LoadedBatches) -> Self {
        Self {
            batches: loaded.batches,
            skipped_batches: loaded
                .skipped
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            history: None,
        }
    }
}

/// Result of a run. Nothing is added to the client's history until the
/// leads are delivered, see [`ConsolidationRun::record_delivery`].
#[derive(Debug, Clone)]
pub struct ConsolidationRun {
    pub leads: Vec<Lead>,
    pub removed: Vec<Lead>,
    pub report: ConsolidationReport,
    /// History the delivered leads are recorded in
    pub history: Option<CampaignHistory>,
}

impl ConsolidationRun {
    /// Record the delivered leads as a new campaign of the client. A failure
    /// is kept in the report; the leads were delivered either way.
    pub fn record_delivery(&mut self) {
        let Some(history) = &self.history else {
            return;
        };
        let campaign = Campaign::new(history.client(), self.leads.clone());
        match history.persist(&campaign) {
            Ok(_) => self.report.persisted_campaign = Some(campaign.campaign_id),
            Err(e) => {
                warn!(
                    "Campaign {} for {} could not be recorded: {}",
                    campaign.campaign_id,
                    history.client(),
                    e
                );
                self.report.history_error = Some(e.to_string());
            }
        }
    }
}

/// Normalize, deduplicate, classify, escalate and filter a set of batches.
pub struct ConsolidationUseCase {
    normalizer: SchemaNormalizer,
    classifier: CountryClassifier,
    escalator: Option<EnrichmentEscalator>,
    pipeline: FilterPipeline,
    output_port: Arc<dyn LeadOutputPort>,
}

impl ConsolidationUseCase {
    pub fn new(
        normalizer: SchemaNormalizer,
        classifier: CountryClassifier,
        escalator: Option<EnrichmentEscalator>,
        pipeline: FilterPipeline,
        output_port: Arc<dyn LeadOutputPort>,
    ) -> Self {
        Self {
            normalizer,
            classifier,
            escalator,
            pipeline,
            output_port,
        }
    }

    /// Build every component from configuration. Fails before any record is
    /// read if the target country or a stage is invalid.
    pub fn from_config(
        config: &AppConfig,
        escalator: Option<EnrichmentEscalator>,
        output_port: Arc<dyn LeadOutputPort>,
    ) -> std::result::Result<Self, ConfigError> {
        let registry = config.country_registry()?;
        let profile = registry.get(&config.run.target_country)?.clone();
        let pipeline = FilterPipeline::compile(&config.stages, &registry, config.run.breakdown_size)?;
        let industry_cache = match &config.industry_cache_path {
            Some(path) => IndustryCache::load(path),
            None => IndustryCache::in_memory(),
        };
        info!(
            "Consolidating for {} with stages {:?}",
            profile.code,
            pipeline.stage_names()
        );
        Ok(Self::new(
            SchemaNormalizer::new(industry_cache),
            CountryClassifier::new(profile),
            escalator,
            pipeline,
            output_port,
        ))
    }

    #[instrument(skip(self, request), fields(target = %self.classifier.profile().code, run_id = tracing::field::Empty))]
    pub async fn run(&mut self, request: ConsolidationRequest) -> Result<ConsolidationRun> {
        let run_id = Uuid::new_v4();
        Span::current().record("run_id", tracing::field::display(run_id));
        let started_at = Utc::now();
        info!(
            "Starting run {} with {} batches ({} skipped)",
            run_id,
            request.batches.len(),
            request.skipped_batches.len()
        );
        for skipped in &request.skipped_batches {
            warn!("Batch {} was skipped and is not part of run {}", skipped, run_id);
        }

        // Normalize
        let mut normalization: BTreeMap<_, NormalizationStats> = BTreeMap::new();
        let mut normalized_batches = Vec::with_capacity(request.batches.len());
        for batch in &request.batches {
            let normalized = self.normalizer.normalize_batch(&batch.records, batch.source);
            normalization
                .entry(batch.source)
                .or_default()
                .merge(&normalized.stats);
            normalized_batches.push(normalized.leads);
        }

        // Deduplicate within the run, then against the client's history
        let (mut leads, mut intra_run) = deduplicate(normalized_batches);
        intra_run.skipped_batches = request.skipped_batches.len();
        let mut dedup_stats = DedupReport {
            intra_run,
            ..Default::default()
        };
        if let Some(history) = &request.history {
            let loaded = history.load();
            dedup_stats.skipped_history_files = loaded.skipped_files;
            let campaigns: Vec<Vec<Lead>> = loaded.campaigns.into_iter().map(|c| c.leads).collect();
            let (survivors, stats) = deduplicate_against_history(&campaigns, leads);
            leads = survivors;
            dedup_stats.cross_campaign = Some(stats);
        }

        // Classify and escalate
        let mut classification_stats = self.classifier.classify_all(&mut leads);
        let escalation_stats =
            escalate_uncertain(&mut leads, &self.classifier, self.escalator.as_ref()).await;
        classification_stats.recount(&leads);
        info!(
            "Classification: {} domestic, {} foreign, {} uncertain",
            classification_stats.domestic, classification_stats.foreign, classification_stats.uncertain
        );

        // Filter
        let outcome = self.pipeline.apply(leads);

        if let Err(e) = self.normalizer.industry_cache_mut().flush() {
            warn!("Industry cache could not be saved: {}", e);
        }

        let report = ConsolidationReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            target_country: self.classifier.profile().code.clone(),
            client: request.history.as_ref().map(|h| h.client().to_string()),
            skipped_batches: request.skipped_batches.clone(),
            normalization,
            dedup_stats,
            classification_stats,
            escalation_stats,
            filter_stage_reports: outcome.reports,
            output_leads: outcome.kept.len(),
            removed_leads: outcome.removed.len(),
            persisted_campaign: None,
            history_error: None,
        };
        info!(
            "Run {} finished: {} leads delivered, {} removed by filters",
            run_id, report.output_leads, report.removed_leads
        );

        Ok(ConsolidationRun {
            leads: outcome.kept,
            removed: outcome.removed,
            report,
            history: request.history,
        })
    }

    /// Run and hand the leads and report to the output port. The campaign is
    /// recorded in the client's history only after the leads were written.
    pub async fn run_and_write(&mut self, request: ConsolidationRequest) -> Result<ConsolidationRun> {
        let mut run = self.run(request).await?;
        self.output_port
            .write_leads(&run.leads)
            .await
            .map_err(|e| ConsolidationError::Output(e.to_string()))?;
        run.record_delivery();
        self.output_port
            .write_report(&run.report)
            .await
            .map_err(|e| ConsolidationError::Output(e.to_string()))?;
        Ok(run)
    }
}
