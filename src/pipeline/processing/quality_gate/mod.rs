//! Ordered quality filter pipeline.
//!
//! Each stage sees only the leads the previous stage kept. Removed leads are
//! returned separately with a `removal_reason` of `"<stage>: <value>"`.

pub mod stages;
pub mod titles;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::domain::Lead;
use crate::error::ConfigError;
use crate::observability::metrics;
use crate::pipeline::processing::classify::CountryRegistry;

pub use stages::{FilterStage, StageSpec, Verdict};
pub use titles::TitlePatternSpec;

pub const DEFAULT_BREAKDOWN_SIZE: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownEntry {
    pub value: String,
    pub count: usize,
}

/// Counts for one stage of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub name: String,
    pub before_count: usize,
    pub after_count: usize,
    pub removed_count: usize,
    /// Most frequent removal values, count descending then value ascending
    pub removal_breakdown: Vec<BreakdownEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub kept: Vec<Lead>,
    pub removed: Vec<Lead>,
    pub reports: Vec<StageReport>,
}

pub struct FilterPipeline {
    stages: Vec<Box<dyn FilterStage>>,
    breakdown_size: usize,
}

impl FilterPipeline {
    /// Compile every stage up front; the first malformed one fails the pipeline.
    pub fn compile(
        specs: &[StageSpec],
        registry: &CountryRegistry,
        breakdown_size: usize,
    ) -> Result<Self, ConfigError> {
        let stages = specs
            .iter()
            .map(|spec| spec.compile(registry))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_stages(stages, breakdown_size))
    }

    pub fn from_stages(stages: Vec<Box<dyn FilterStage>>, breakdown_size: usize) -> Self {
        Self {
            stages,
            breakdown_size,
        }
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn apply(&self, leads: Vec<Lead>) -> FilterOutcome {
        let mut outcome = FilterOutcome {
            kept: leads,
            ..FilterOutcome::default()
        };

        for stage in &self.stages {
            let before_count = outcome.kept.len();
            let mut counts: BTreeMap<String, usize> = BTreeMap::new();
            let mut kept = Vec::with_capacity(before_count);

            for mut lead in outcome.kept.drain(..) {
                match stage.evaluate(&lead) {
                    Verdict::Keep => kept.push(lead),
                    Verdict::Remove(value) => {
                        debug!("{} removed {:?}: {}", stage.name(), lead.display_name(), value);
                        lead.removal_reason = Some(format!("{}: {}", stage.name(), value));
                        *counts.entry(value).or_insert(0) += 1;
                        outcome.removed.push(lead);
                    }
                }
            }

            let report = StageReport {
                name: stage.name().to_string(),
                before_count,
                after_count: kept.len(),
                removed_count: before_count - kept.len(),
                removal_breakdown: top_values(counts, self.breakdown_size),
            };
            info!(
                "Stage {}: {} -> {} ({} removed)",
                report.name, report.before_count, report.after_count, report.removed_count
            );
            metrics::quality_gate::stage_completed(&report.name, report.removed_count);
            outcome.reports.push(report);
            outcome.kept = kept;
        }

        outcome
    }
}

fn top_values(counts: BTreeMap<String, usize>, limit: usize) -> Vec<BreakdownEntry> {
    let mut entries: Vec<BreakdownEntry> = counts
        .into_iter()
        .map(|(value, count)| BreakdownEntry { value, count })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    entries.truncate(limit);
    entries
}

/// Compile `specs` and run `leads` through them.
pub fn apply(
    leads: Vec<Lead>,
    specs: &[StageSpec],
    registry: &CountryRegistry,
) -> Result<FilterOutcome, ConfigError> {
    Ok(FilterPipeline::compile(specs, registry, DEFAULT_BREAKDOWN_SIZE)?.apply(leads))
}
