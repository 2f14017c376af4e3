//! Metrics for the consolidation phases.
//!
//! Recording is a no-op until [`init`] installs the Prometheus recorder, so
//! library code and tests can call these functions unconditionally.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fmt;
use std::sync::OnceLock;
use tracing::info;

/// Every metric name the consolidator emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Normalize metrics
    NormalizeRecordsNormalized,
    NormalizeRecordsDiscarded,
    NormalizeNamesRestored,
    NormalizeBatchesProcessed,
    NormalizeBatchSize,

    // Dedup metrics
    DedupDuplicatesRemoved,
    DedupLeadsIn,
    DedupLeadsKept,

    // Classify metrics
    ClassifyVerdicts,

    // Escalation metrics
    EscalationLookups,
    EscalationCreditsConsumed,
    EscalationLookupDuration,

    // Quality gate metrics
    QualityGateLeadsRemoved,
    QualityGateStageRuns,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::NormalizeRecordsNormalized => "leads_normalize_records_normalized_total",
            MetricName::NormalizeRecordsDiscarded => "leads_normalize_records_discarded_total",
            MetricName::NormalizeNamesRestored => "leads_normalize_names_restored_total",
            MetricName::NormalizeBatchesProcessed => "leads_normalize_batches_processed_total",
            MetricName::NormalizeBatchSize => "leads_normalize_batch_size",

            MetricName::DedupDuplicatesRemoved => "leads_dedup_duplicates_removed_total",
            MetricName::DedupLeadsIn => "leads_dedup_leads_in_total",
            MetricName::DedupLeadsKept => "leads_dedup_leads_kept_total",

            MetricName::ClassifyVerdicts => "leads_classify_verdicts_total",

            MetricName::EscalationLookups => "leads_escalation_lookups_total",
            MetricName::EscalationCreditsConsumed => "leads_escalation_credits_consumed_total",
            MetricName::EscalationLookupDuration => "leads_escalation_lookup_duration_seconds",

            MetricName::QualityGateLeadsRemoved => "leads_quality_gate_leads_removed_total",
            MetricName::QualityGateStageRuns => "leads_quality_gate_stage_runs_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Calling it twice is harmless.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    METRICS_HANDLE.set(handle).ok();
    info!("Metrics system initialized");
    Ok(())
}

/// Prometheus text exposition of everything recorded so far.
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

// ============================================================================
// Normalize Metrics
// ============================================================================

pub mod normalize {
    use super::MetricName;

    pub fn record_normalized(source: &str) {
        ::metrics::counter!(MetricName::NormalizeRecordsNormalized.as_str(), "source" => source.to_string())
            .increment(1);
    }

    pub fn record_discarded(source: &str, reason: &str) {
        ::metrics::counter!(
            MetricName::NormalizeRecordsDiscarded.as_str(),
            "source" => source.to_string(),
            "reason" => reason.to_string()
        )
        .increment(1);
    }

    pub fn names_restored() {
        ::metrics::counter!(MetricName::NormalizeNamesRestored.as_str()).increment(1);
    }

    pub fn batch_processed(batch_size: usize) {
        ::metrics::histogram!(MetricName::NormalizeBatchSize.as_str()).record(batch_size as f64);
        ::metrics::counter!(MetricName::NormalizeBatchesProcessed.as_str()).increment(1);
    }
}

// ============================================================================
// Dedup Metrics
// ============================================================================

pub mod dedup {
    use super::MetricName;

    pub fn duplicate_removed(key_kind: &str) {
        ::metrics::counter!(MetricName::DedupDuplicatesRemoved.as_str(), "key_kind" => key_kind.to_string())
            .increment(1);
    }

    pub fn batch_processed(input: usize, kept: usize) {
        ::metrics::counter!(MetricName::DedupLeadsIn.as_str()).increment(input as u64);
        ::metrics::counter!(MetricName::DedupLeadsKept.as_str()).increment(kept as u64);
    }
}

// ============================================================================
// Classify Metrics
// ============================================================================

pub mod classify {
    use super::MetricName;

    pub fn verdict(state: &str) {
        ::metrics::counter!(MetricName::ClassifyVerdicts.as_str(), "state" => state.to_string()).increment(1);
    }
}

// ============================================================================
// Escalation Metrics
// ============================================================================

pub mod escalation {
    use super::MetricName;

    /// `outcome` is one of found, not_found, error
    pub fn lookup(outcome: &str) {
        ::metrics::counter!(MetricName::EscalationLookups.as_str(), "outcome" => outcome.to_string())
            .increment(1);
    }

    pub fn credits_consumed(credits: u32) {
        ::metrics::counter!(MetricName::EscalationCreditsConsumed.as_str()).increment(credits as u64);
    }

    pub fn lookup_duration(secs: f64) {
        ::metrics::histogram!(MetricName::EscalationLookupDuration.as_str()).record(secs);
    }
}

// ============================================================================
// Quality Gate Metrics
// ============================================================================

pub mod quality_gate {
    use super::MetricName;

    pub fn stage_completed(stage: &str, removed: usize) {
        ::metrics::counter!(MetricName::QualityGateStageRuns.as_str(), "stage" => stage.to_string())
            .increment(1);
        ::metrics::counter!(MetricName::QualityGateLeadsRemoved.as_str(), "stage" => stage.to_string())
            .increment(removed as u64);
    }
}
