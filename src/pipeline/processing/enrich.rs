//! Enrichment escalation: settle uncertain classifications with a paid
//! company lookup.
//!
//! Lookups run on a bounded task pool, one per unique domain. All tasks are
//! joined before any lead is touched, so the merge itself is sequential.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::app::ports::{CompanyLookup, DomainLookup};
use crate::domain::{ClassificationState, Lead, LeadField};
use crate::error::LookupError;
use crate::observability::metrics;
use crate::pipeline::ingestion::rate_limiter::{Limits, RateLimiter};
use crate::pipeline::processing::classify::CountryClassifier;

#[derive(Debug, Clone)]
pub struct EscalationLimits {
    pub concurrency: u32,
    pub requests_per_min: Option<u64>,
    pub timeout: Duration,
}

impl Default for EscalationLimits {
    fn default() -> Self {
        Self {
            concurrency: 4,
            requests_per_min: Some(120),
            timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EscalationStats {
    /// Unique domains sent to the company lookup
    pub escalated_domains: usize,
    /// Leads that left the uncertain state after escalation
    pub resolved_by_escalation: usize,
    pub not_found: usize,
    pub lookup_failures: usize,
    pub credits_consumed: u64,
}

pub type LookupResults = BTreeMap<String, Result<DomainLookup, LookupError>>;

pub struct EnrichmentEscalator {
    lookup: Arc<dyn CompanyLookup>,
    limiter: RateLimiter,
    timeout: Duration,
}

impl EnrichmentEscalator {
    pub fn new(lookup: Arc<dyn CompanyLookup>, limits: EscalationLimits) -> Self {
        let limiter = RateLimiter::new(Limits {
            requests_per_min: limits.requests_per_min,
            concurrency: Some(limits.concurrency.max(1)),
        });
        Self {
            lookup,
            limiter,
            timeout: limits.timeout,
        }
    }

    /// Look up every domain once. Each domain gets its own result; a failed,
    /// timed-out or panicked task never affects another domain.
    pub async fn resolve_domains(&self, domains: &BTreeSet<String>) -> LookupResults {
        let mut results: LookupResults = domains
            .iter()
            .map(|d| {
                (
                    d.clone(),
                    Err(LookupError::TaskFailed("lookup task did not complete".to_string())),
                )
            })
            .collect();

        let mut tasks = JoinSet::new();
        for domain in domains {
            let lookup = Arc::clone(&self.lookup);
            let limiter = self.limiter.clone();
            let timeout = self.timeout;
            let domain = domain.clone();
            tasks.spawn(async move {
                let _permit = limiter.acquire().await;
                let started = Instant::now();
                let result = match tokio::time::timeout(timeout, lookup.lookup(&domain)).await {
                    Ok(result) => result,
                    Err(_) => Err(LookupError::Timeout(timeout)),
                };
                metrics::escalation::lookup_duration(started.elapsed().as_secs_f64());
                (domain, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((domain, result)) => {
                    results.insert(domain, result);
                }
                Err(e) => warn!("Lookup task aborted: {}", e),
            }
        }
        results
    }
}

/// Unique, lowercased company domains of uncertain leads.
pub fn uncertain_domains(leads: &[Lead]) -> BTreeSet<String> {
    leads
        .iter()
        .filter(|l| l.classification_state == Some(ClassificationState::Uncertain))
        .filter_map(|l| l.value(LeadField::CompanyDomain))
        .map(str::to_lowercase)
        .collect()
}

/// Escalate uncertain leads and re-classify the ones whose company country
/// the lookup found. Without an escalator nothing changes.
pub async fn escalate_uncertain(
    leads: &mut [Lead],
    classifier: &CountryClassifier,
    escalator: Option<&EnrichmentEscalator>,
) -> EscalationStats {
    let mut stats = EscalationStats::default();
    let Some(escalator) = escalator else {
        debug!("No escalator configured, uncertain leads stay uncertain");
        return stats;
    };

    let domains = uncertain_domains(leads);
    if domains.is_empty() {
        return stats;
    }
    info!("Escalating {} unique domains to company lookup", domains.len());
    stats.escalated_domains = domains.len();

    let results = escalator.resolve_domains(&domains).await;
    let mut countries: BTreeMap<&str, &str> = BTreeMap::new();
    for (domain, result) in &results {
        match result {
            Ok(lookup) => {
                stats.credits_consumed += u64::from(lookup.credits_consumed);
                metrics::escalation::credits_consumed(lookup.credits_consumed);
                match lookup.country.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
                    Some(country) if lookup.found => {
                        metrics::escalation::lookup("found");
                        countries.insert(domain.as_str(), country);
                    }
                    _ => {
                        metrics::escalation::lookup("not_found");
                        stats.not_found += 1;
                    }
                }
            }
            Err(e) => {
                metrics::escalation::lookup("error");
                warn!("Company lookup for {} failed: {}", domain, e);
                stats.lookup_failures += 1;
            }
        }
    }

    for lead in leads.iter_mut() {
        if lead.classification_state != Some(ClassificationState::Uncertain) {
            continue;
        }
        let Some(country) = lead
            .value(LeadField::CompanyDomain)
            .map(str::to_lowercase)
            .and_then(|d| countries.get(d.as_str()).copied())
        else {
            continue;
        };
        lead.company_country = Some(country.to_string());
        let verdict = classifier.classify(lead);
        if verdict.state != ClassificationState::Uncertain {
            stats.resolved_by_escalation += 1;
        }
        verdict.apply_to(lead);
    }

    info!(
        "Escalation resolved {} leads ({} not found, {} failures, {} credits)",
        stats.resolved_by_escalation, stats.not_found, stats.lookup_failures, stats.credits_consumed
    );
    stats
}
