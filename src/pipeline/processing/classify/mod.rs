//! Country classification of leads against a target [`CountryProfile`].
//!
//! An explicit company country is authoritative. Without one the classifier
//! weighs domain, email and phone evidence; any disagreement is uncertain and
//! left to the enrichment escalator.

pub mod country;
pub mod signals;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{ClassificationState, Lead, LeadField};
use crate::observability::metrics;

pub use country::{CountryProfile, CountryRegistry};
use signals::{Signal, Support};

/// Verdict plus the signals that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub state: ClassificationState,
    pub reason: String,
}

impl Classification {
    /// Annotate the lead. Only the two classification fields are touched.
    pub fn apply_to(&self, lead: &mut Lead) {
        lead.classification_state = Some(self.state);
        lead.classification_reason = Some(self.reason.clone());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationStats {
    pub domestic: usize,
    pub foreign: usize,
    pub uncertain: usize,
}

impl ClassificationStats {
    fn count(&mut self, state: ClassificationState) {
        match state {
            ClassificationState::Domestic => self.domestic += 1,
            ClassificationState::Foreign => self.foreign += 1,
            ClassificationState::Uncertain => self.uncertain += 1,
        }
    }

    /// Recount verdicts from annotated leads.
    pub fn recount(&mut self, leads: &[Lead]) {
        self.domestic = 0;
        self.foreign = 0;
        self.uncertain = 0;
        for state in leads.iter().filter_map(|l| l.classification_state) {
            self.count(state);
        }
    }
}

/// Classify one lead. Pure: the same lead and profile always give the same verdict.
pub fn classify(lead: &Lead, profile: &CountryProfile) -> Classification {
    if let Some(country) = lead.value(LeadField::CompanyCountry) {
        let state = if profile.matches_country(country) {
            ClassificationState::Domestic
        } else {
            ClassificationState::Foreign
        };
        return Classification {
            state,
            reason: format!("company_country={country}"),
        };
    }

    let signals = gather_signals(lead, profile);
    let domestic = labels(&signals, Support::Domestic);
    let foreign = labels(&signals, Support::Foreign);

    match (domestic.is_empty(), foreign.is_empty()) {
        (false, true) => Classification {
            state: ClassificationState::Domestic,
            reason: domestic.join(","),
        },
        (true, false) => Classification {
            state: ClassificationState::Foreign,
            reason: foreign.join(","),
        },
        (false, false) => Classification {
            state: ClassificationState::Uncertain,
            reason: format!(
                "conflict:domestic={}|foreign={}",
                domestic.join(","),
                foreign.join(",")
            ),
        },
        (true, true) => Classification {
            state: ClassificationState::Uncertain,
            reason: "no signals".to_string(),
        },
    }
}

fn labels(signals: &[Signal], support: Support) -> Vec<&str> {
    signals
        .iter()
        .filter(|s| s.support == support)
        .map(|s| s.label.as_str())
        .collect()
}

/// Signals in fixed order: domain, email, phone.
fn gather_signals(lead: &Lead, profile: &CountryProfile) -> Vec<Signal> {
    let mut gathered = Vec::with_capacity(3);

    let domain_tld = lead
        .value(LeadField::CompanyDomain)
        .and_then(|d| signals::domain_tld(d, profile));
    if let Some(tld) = &domain_tld {
        gathered.push(Signal {
            label: format!("domain={tld}"),
            support: signals::tld_support(tld, profile),
        });
    }

    let email_tld = lead
        .value(LeadField::Email)
        .and_then(signals::email_domain)
        .and_then(|d| signals::domain_tld(d, profile));
    if let Some(tld) = email_tld.filter(|t| Some(t) != domain_tld.as_ref()) {
        gathered.push(Signal {
            support: signals::tld_support(&tld, profile),
            label: format!("email={tld}"),
        });
    }

    if let Some((prefix, support)) = lead
        .value(LeadField::CompanyPhone)
        .and_then(|p| signals::phone_prefix(p, profile))
    {
        gathered.push(Signal {
            label: format!("phone={prefix}"),
            support,
        });
    }

    gathered
}

/// Classifier bound to the run's target country.
#[derive(Debug, Clone)]
pub struct CountryClassifier {
    profile: CountryProfile,
}

impl CountryClassifier {
    pub fn new(profile: CountryProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &CountryProfile {
        &self.profile
    }

    pub fn classify(&self, lead: &Lead) -> Classification {
        classify(lead, &self.profile)
    }

    /// Classify and annotate every lead.
    pub fn classify_all(&self, leads: &mut [Lead]) -> ClassificationStats {
        let mut stats = ClassificationStats::default();
        for lead in leads.iter_mut() {
            let verdict = self.classify(lead);
            debug!(
                "Classified {:?} as {} ({})",
                lead.display_name(),
                verdict.state,
                verdict.reason
            );
            metrics::classify::verdict(verdict.state.as_str());
            stats.count(verdict.state);
            verdict.apply_to(lead);
        }
        stats
    }
}
