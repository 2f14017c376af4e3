use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::SourceKind;
use crate::pipeline::processing::classify::ClassificationStats;
use crate::pipeline::processing::dedup::DedupStats;
use crate::pipeline::processing::enrich::EscalationStats;
use crate::pipeline::processing::normalize::NormalizationStats;
use crate::pipeline::processing::quality_gate::StageReport;

/// Dedup counters of both passes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DedupReport {
    pub intra_run: DedupStats,
    /// Present when the run was deduplicated against a client's history
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_campaign: Option<DedupStats>,
    #[serde(default)]
    pub skipped_history_files: usize,
}

/// Everything a run did, written next to the consolidated leads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub target_country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    /// Batches that could not be loaded
    #[serde(default)]
    pub skipped_batches: Vec<String>,
    pub normalization: BTreeMap<SourceKind, NormalizationStats>,
    pub dedup_stats: DedupReport,
    pub classification_stats: ClassificationStats,
    pub escalation_stats: EscalationStats,
    pub filter_stage_reports: Vec<StageReport>,
    pub output_leads: usize,
    pub removed_leads: usize,
    /// Campaign the delivered leads were recorded as
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persisted_campaign: Option<Uuid>,
    /// Why the delivered leads could not be recorded in the client's history
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_error: Option<String>,
}

impl ConsolidationReport {
    pub fn total_normalized(&self) -> usize {
        self.normalization.values().map(|s| s.normalized).sum()
    }
}
