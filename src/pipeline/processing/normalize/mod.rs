//! Schema normalization: maps scraper-specific records onto the canonical [`Lead`].

pub mod industry_cache;
pub mod names;
pub mod sources;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::{Lead, LeadField, SourceKind};
use crate::error::RecordError;
use crate::observability::metrics;

pub use industry_cache::IndustryCache;

/// Symbols scrapers print in progress output; never part of a real name.
const SYMBOL_MARKERS: &[&str] = &["🔍", "✅", "⏳", "📄", "🚀", "❌", "⚠", "[info]", "[debug]"];

/// Progress phrases. Only person names are checked for these, since a
/// business can legitimately be called "Crawling Kids Daycare".
const PHRASE_MARKERS: &[&str] = &[
    "scanning pages",
    "pages scanned",
    "scraping page",
    "crawling",
    "progress:",
    "status:",
    "loading more",
];

const PERSON_NAME_FIELDS: [LeadField; 3] = [
    LeadField::FirstName,
    LeadField::LastName,
    LeadField::FullName,
];

/// Field-level problems that were recovered by leaving the field empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldIssue {
    UnparseableWebsite,
    UnparseablePhone,
    UnresolvedIndustryId,
}

/// A successfully normalized lead plus what happened on the way.
#[derive(Debug, Clone)]
pub struct NormalizedLead {
    pub lead: Lead,
    /// The record was already canonical and was passed through untouched
    pub passthrough: bool,
    pub issues: Vec<FieldIssue>,
    pub names_restored: bool,
}

#[derive(Debug, Clone)]
pub enum RecordOutcome {
    Lead(NormalizedLead),
    /// Non-lead noise; carries the marker that identified it
    Junk(&'static str),
}

/// Per-source normalization counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizationStats {
    pub input: usize,
    pub normalized: usize,
    pub passthrough: usize,
    pub junk: usize,
    pub malformed: usize,
    pub field_issues: usize,
    pub names_restored: usize,
}

impl NormalizationStats {
    pub fn merge(&mut self, other: &NormalizationStats) {
        self.input += other.input;
        self.normalized += other.normalized;
        self.passthrough += other.passthrough;
        self.junk += other.junk;
        self.malformed += other.malformed;
        self.field_issues += other.field_issues;
        self.names_restored += other.names_restored;
    }
}

#[derive(Debug, Clone)]
pub struct NormalizedBatch {
    pub source: SourceKind,
    pub leads: Vec<Lead>,
    pub stats: NormalizationStats,
}

/// Maps raw scraper records to canonical leads.
pub struct SchemaNormalizer {
    industry_cache: IndustryCache,
}

impl Default for SchemaNormalizer {
    fn default() -> Self {
        Self::new(IndustryCache::in_memory())
    }
}

impl SchemaNormalizer {
    pub fn new(industry_cache: IndustryCache) -> Self {
        Self { industry_cache }
    }

    pub fn industry_cache(&self) -> &IndustryCache {
        &self.industry_cache
    }

    pub fn industry_cache_mut(&mut self) -> &mut IndustryCache {
        &mut self.industry_cache
    }

    /// Normalize one raw record declared to come from `source`.
    pub fn normalize_record(
        &mut self,
        raw: &Value,
        source: SourceKind,
    ) -> Result<RecordOutcome, RecordError> {
        let record = match raw {
            Value::Object(map) => map,
            Value::Null => return Err(RecordError::NotAnObject("null")),
            Value::Array(_) => return Err(RecordError::NotAnObject("array")),
            Value::String(_) => return Err(RecordError::NotAnObject("string")),
            Value::Number(_) => return Err(RecordError::NotAnObject("number")),
            Value::Bool(_) => return Err(RecordError::NotAnObject("bool")),
        };

        if source.is_canonical_shape(record) {
            let lead = passthrough(record, source)?;
            if let Some(marker) = junk_marker(&lead) {
                return Ok(RecordOutcome::Junk(marker));
            }
            return Ok(RecordOutcome::Lead(NormalizedLead {
                lead,
                passthrough: true,
                issues: Vec::new(),
                names_restored: false,
            }));
        }

        let mut lead = Lead::new(source);
        for (path, field) in source.field_map() {
            if lead.value(*field).is_some() {
                continue;
            }
            if let Some(value) = sources::lookup_path(record, path) {
                lead.set(*field, Some(value));
            }
        }

        if let Some(marker) = junk_marker(&lead) {
            return Ok(RecordOutcome::Junk(marker));
        }

        let mut issues = Vec::new();
        self.apply_industry_ids(record, source, &mut lead, &mut issues);
        derive_company_domain(&mut lead, &mut issues);
        clean_phone(&mut lead, &mut issues);
        let names_restored = names::restore_diacritics(&mut lead);

        Ok(RecordOutcome::Lead(NormalizedLead {
            lead,
            passthrough: false,
            issues,
            names_restored,
        }))
    }

    /// Normalize a whole batch, skipping malformed records and junk.
    pub fn normalize_batch(&mut self, records: &[Value], source: SourceKind) -> NormalizedBatch {
        let mut stats = NormalizationStats {
            input: records.len(),
            ..Default::default()
        };
        let mut leads = Vec::with_capacity(records.len());

        for (index, raw) in records.iter().enumerate() {
            match self.normalize_record(raw, source) {
                Ok(RecordOutcome::Lead(normalized)) => {
                    stats.normalized += 1;
                    if normalized.passthrough {
                        stats.passthrough += 1;
                    }
                    if normalized.names_restored {
                        stats.names_restored += 1;
                        metrics::normalize::names_restored();
                    }
                    stats.field_issues += normalized.issues.len();
                    metrics::normalize::record_normalized(source.as_str());
                    leads.push(normalized.lead);
                }
                Ok(RecordOutcome::Junk(marker)) => {
                    debug!("Discarding record {} from {}: junk marker {:?}", index, source, marker);
                    stats.junk += 1;
                    metrics::normalize::record_discarded(source.as_str(), "junk");
                }
                Err(e) => {
                    warn!("Skipping malformed record {} from {}: {}", index, source, e);
                    stats.malformed += 1;
                    metrics::normalize::record_discarded(source.as_str(), "malformed");
                }
            }
        }

        metrics::normalize::batch_processed(records.len());
        info!(
            "Normalized {} batch: {}/{} leads ({} junk, {} malformed, {} names restored)",
            source, stats.normalized, stats.input, stats.junk, stats.malformed, stats.names_restored
        );

        NormalizedBatch {
            source,
            leads,
            stats,
        }
    }

    fn apply_industry_ids(
        &mut self,
        record: &Map<String, Value>,
        source: SourceKind,
        lead: &mut Lead,
        issues: &mut Vec<FieldIssue>,
    ) {
        let tag_id = source
            .industry_id_path()
            .and_then(|path| sources::lookup_path(record, path));

        match (lead.value(LeadField::Industry).map(str::to_string), tag_id) {
            (Some(industry), _) if IndustryCache::is_industry_id(&industry) => {
                let resolved = self.industry_cache.resolve(&industry).map(str::to_string);
                if resolved.is_none() {
                    issues.push(FieldIssue::UnresolvedIndustryId);
                }
                lead.set(LeadField::Industry, resolved);
            }
            (Some(industry), Some(id)) => self.industry_cache.learn(&id, &industry),
            (None, Some(id)) => match self.industry_cache.resolve(&id) {
                Some(name) => lead.set(LeadField::Industry, Some(name.to_string())),
                None => issues.push(FieldIssue::UnresolvedIndustryId),
            },
            (Some(_), None) | (None, None) => {}
        }
    }
}

fn passthrough(record: &Map<String, Value>, source: SourceKind) -> Result<Lead, RecordError> {
    let mut record = record.clone();
    if !record.contains_key("source") {
        record.insert("source".to_string(), Value::String(source.as_str().to_string()));
    }
    serde_json::from_value(Value::Object(record)).map_err(|e| RecordError::Canonical(e.to_string()))
}

fn junk_marker(lead: &Lead) -> Option<&'static str> {
    let find = |value: &str, markers: &[&'static str]| {
        let lower = value.to_lowercase();
        markers.iter().copied().find(|marker| lower.contains(marker))
    };

    PERSON_NAME_FIELDS
        .iter()
        .filter_map(|field| lead.value(*field))
        .find_map(|value| find(value, SYMBOL_MARKERS).or_else(|| find(value, PHRASE_MARKERS)))
        .or_else(|| {
            lead.value(LeadField::CompanyName)
                .and_then(|value| find(value, SYMBOL_MARKERS))
        })
}

/// Host portion of a website URL, lowercased and without a leading `www.`.
pub fn domain_from_website(website: &str) -> Option<String> {
    let trimmed = website.trim();
    if trimmed.is_empty() {
        return None;
    }
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    let url = Url::parse(&with_scheme).ok()?;
    let host = url.host_str()?.trim_end_matches('.').to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    if host.contains('.') {
        Some(host)
    } else {
        None
    }
}

fn derive_company_domain(lead: &mut Lead, issues: &mut Vec<FieldIssue>) {
    if let Some(domain) = lead.value(LeadField::CompanyDomain) {
        let cleaned = domain_from_website(domain).unwrap_or_else(|| domain.to_ascii_lowercase());
        lead.set(LeadField::CompanyDomain, Some(cleaned));
        return;
    }
    let Some(website) = lead.value(LeadField::CompanyWebsite) else {
        return;
    };
    match domain_from_website(website) {
        Some(domain) => lead.set(LeadField::CompanyDomain, Some(domain)),
        None => {
            debug!("Could not derive a domain from website {:?}", website);
            issues.push(FieldIssue::UnparseableWebsite);
        }
    }
}

fn clean_phone(lead: &mut Lead, issues: &mut Vec<FieldIssue>) {
    let Some(phone) = lead.value(LeadField::CompanyPhone) else {
        return;
    };
    if !phone.chars().any(|c| c.is_ascii_digit()) {
        issues.push(FieldIssue::UnparseablePhone);
        lead.set(LeadField::CompanyPhone, None);
    }
}
