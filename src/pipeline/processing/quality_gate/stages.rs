//! Filter stage kinds and their compiled forms.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::titles::{TitlePatternSpec, TitleTable};
use crate::domain::{ClassificationState, Lead, LeadField};
use crate::error::ConfigError;
use crate::pipeline::processing::classify::signals::{self, Support};
use crate::pipeline::processing::classify::{CountryProfile, CountryRegistry};

/// A filter stage as written in the `[[stages]]` config array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageSpec {
    RequireEmail,
    RequireEmailStatus {
        allowed: Vec<String>,
    },
    RequirePhonePrefix {
        prefix: String,
    },
    ExcludeTitles {
        #[serde(default)]
        extra_patterns: Vec<TitlePatternSpec>,
    },
    IndustryWhitelist {
        industries: Vec<String>,
    },
    IndustryBlacklist {
        industries: Vec<String>,
    },
    RequireCountry {
        country: String,
    },
    PhoneCountryDiscrepancy,
    RejectForeignDomain {
        country: String,
    },
    RequireClassification {
        allowed: Vec<ClassificationState>,
    },
}

impl StageSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            StageSpec::RequireEmail => "require_email",
            StageSpec::RequireEmailStatus { .. } => "require_email_status",
            StageSpec::RequirePhonePrefix { .. } => "require_phone_prefix",
            StageSpec::ExcludeTitles { .. } => "exclude_titles",
            StageSpec::IndustryWhitelist { .. } => "industry_whitelist",
            StageSpec::IndustryBlacklist { .. } => "industry_blacklist",
            StageSpec::RequireCountry { .. } => "require_country",
            StageSpec::PhoneCountryDiscrepancy => "phone_country_discrepancy",
            StageSpec::RejectForeignDomain { .. } => "reject_foreign_domain",
            StageSpec::RequireClassification { .. } => "require_classification",
        }
    }

    /// Validate the configured stage and build it.
    pub fn compile(&self, registry: &CountryRegistry) -> Result<Box<dyn FilterStage>, ConfigError> {
        let kind = self.kind();
        let invalid = |message: &str| ConfigError::InvalidStage {
            stage: kind.to_string(),
            message: message.to_string(),
        };
        let profile = |code: &str| -> Result<CountryProfile, ConfigError> {
            registry.get(code).cloned().map_err(|_| invalid(&format!("unknown country {code:?}")))
        };

        let stage: Box<dyn FilterStage> = match self {
            StageSpec::RequireEmail => Box::new(RequireEmail),
            StageSpec::RequireEmailStatus { allowed } => {
                let allowed = lowercase_set(allowed);
                if allowed.is_empty() {
                    return Err(invalid("allowed statuses must not be empty"));
                }
                Box::new(RequireEmailStatus { allowed })
            }
            StageSpec::RequirePhonePrefix { prefix } => {
                let prefix = signals::compact_phone(prefix);
                if prefix.len() < 2 || !prefix.starts_with('+') {
                    return Err(invalid("prefix must look like \"+371\""));
                }
                Box::new(RequirePhonePrefix { prefix })
            }
            StageSpec::ExcludeTitles { extra_patterns } => Box::new(ExcludeTitles {
                table: TitleTable::compile(kind, extra_patterns)?,
            }),
            StageSpec::IndustryWhitelist { industries } => {
                let industries = lowercase_set(industries);
                if industries.is_empty() {
                    return Err(invalid("industries must not be empty"));
                }
                Box::new(IndustryList {
                    industries,
                    keep_listed: true,
                })
            }
            StageSpec::IndustryBlacklist { industries } => {
                let industries = lowercase_set(industries);
                if industries.is_empty() {
                    return Err(invalid("industries must not be empty"));
                }
                Box::new(IndustryList {
                    industries,
                    keep_listed: false,
                })
            }
            StageSpec::RequireCountry { country } => Box::new(RequireCountry {
                profile: profile(country)?,
            }),
            StageSpec::PhoneCountryDiscrepancy => Box::new(PhoneCountryDiscrepancy {
                registry: registry.clone(),
            }),
            StageSpec::RejectForeignDomain { country } => Box::new(RejectForeignDomain {
                profile: profile(country)?,
            }),
            StageSpec::RequireClassification { allowed } => {
                if allowed.is_empty() {
                    return Err(invalid("allowed states must not be empty"));
                }
                Box::new(RequireClassification {
                    allowed: allowed.iter().copied().collect(),
                })
            }
        };
        Ok(stage)
    }
}

fn lowercase_set(values: &[String]) -> BTreeSet<String> {
    values
        .iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Decision of one stage for one lead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Keep,
    /// Remove; the value is what the removal breakdown groups by
    Remove(String),
}

/// A compiled filter stage. Stages see each lead once and never modify it.
pub trait FilterStage: Send + Sync {
    fn name(&self) -> &str;
    fn evaluate(&self, lead: &Lead) -> Verdict;
}

struct RequireEmail;

impl FilterStage for RequireEmail {
    fn name(&self) -> &str {
        "require_email"
    }

    // The one stage that removes on absence.
    fn evaluate(&self, lead: &Lead) -> Verdict {
        match lead.value(LeadField::Email) {
            None => Verdict::Remove("missing".to_string()),
            Some(email) if !email.contains('@') => Verdict::Remove("malformed".to_string()),
            Some(_) => Verdict::Keep,
        }
    }
}

struct RequireEmailStatus {
    allowed: BTreeSet<String>,
}

impl FilterStage for RequireEmailStatus {
    fn name(&self) -> &str {
        "require_email_status"
    }

    fn evaluate(&self, lead: &Lead) -> Verdict {
        match lead.value(LeadField::EmailStatus).map(str::to_lowercase) {
            Some(status) if !self.allowed.contains(&status) => Verdict::Remove(status),
            _ => Verdict::Keep,
        }
    }
}

struct RequirePhonePrefix {
    prefix: String,
}

impl FilterStage for RequirePhonePrefix {
    fn name(&self) -> &str {
        "require_phone_prefix"
    }

    fn evaluate(&self, lead: &Lead) -> Verdict {
        let Some(phone) = lead.value(LeadField::CompanyPhone) else {
            return Verdict::Keep;
        };
        let compact = signals::compact_phone(phone);
        if compact.starts_with(&self.prefix) {
            return Verdict::Keep;
        }
        if compact.starts_with('+') {
            let shown: String = compact.chars().take(self.prefix.len()).collect();
            Verdict::Remove(shown)
        } else {
            Verdict::Remove("local_format".to_string())
        }
    }
}

struct ExcludeTitles {
    table: TitleTable,
}

impl FilterStage for ExcludeTitles {
    fn name(&self) -> &str {
        "exclude_titles"
    }

    fn evaluate(&self, lead: &Lead) -> Verdict {
        match lead
            .value(LeadField::Title)
            .and_then(|t| self.table.excluded_category(t))
        {
            Some(category) => Verdict::Remove(category.to_string()),
            None => Verdict::Keep,
        }
    }
}

struct IndustryList {
    industries: BTreeSet<String>,
    keep_listed: bool,
}

impl FilterStage for IndustryList {
    fn name(&self) -> &str {
        if self.keep_listed {
            "industry_whitelist"
        } else {
            "industry_blacklist"
        }
    }

    fn evaluate(&self, lead: &Lead) -> Verdict {
        let Some(industry) = lead.value(LeadField::Industry).map(str::to_lowercase) else {
            return Verdict::Keep;
        };
        if self.industries.contains(&industry) == self.keep_listed {
            Verdict::Keep
        } else {
            Verdict::Remove(industry)
        }
    }
}

struct RequireCountry {
    profile: CountryProfile,
}

impl FilterStage for RequireCountry {
    fn name(&self) -> &str {
        "require_country"
    }

    fn evaluate(&self, lead: &Lead) -> Verdict {
        let countries: Vec<&str> = [LeadField::CompanyCountry, LeadField::PersonCountry]
            .into_iter()
            .filter_map(|f| lead.value(f))
            .collect();
        match countries.first() {
            None => Verdict::Keep,
            Some(_) if countries.iter().any(|c| self.profile.matches_country(c)) => Verdict::Keep,
            Some(first) => Verdict::Remove(first.to_string()),
        }
    }
}

struct PhoneCountryDiscrepancy {
    registry: CountryRegistry,
}

impl FilterStage for PhoneCountryDiscrepancy {
    fn name(&self) -> &str {
        "phone_country_discrepancy"
    }

    fn evaluate(&self, lead: &Lead) -> Verdict {
        let (Some(phone), Some(country)) = (
            lead.value(LeadField::CompanyPhone),
            lead.value(LeadField::CompanyCountry)
                .or_else(|| lead.value(LeadField::PersonCountry)),
        ) else {
            return Verdict::Keep;
        };
        let Some(profile) = self.registry.find(country) else {
            return Verdict::Keep;
        };
        if !signals::is_international(phone) {
            return Verdict::Keep;
        }
        match signals::phone_prefix(phone, profile) {
            Some((_, Support::Domestic)) => Verdict::Keep,
            Some((prefix, _)) => Verdict::Remove(format!("{}:{}", profile.code, prefix)),
            None => Verdict::Remove(format!("{}:unknown", profile.code)),
        }
    }
}

struct RejectForeignDomain {
    profile: CountryProfile,
}

impl FilterStage for RejectForeignDomain {
    fn name(&self) -> &str {
        "reject_foreign_domain"
    }

    fn evaluate(&self, lead: &Lead) -> Verdict {
        match lead
            .value(LeadField::CompanyDomain)
            .and_then(|d| signals::domain_tld(d, &self.profile))
        {
            Some(tld) if signals::tld_support(&tld, &self.profile) == Support::Foreign => {
                Verdict::Remove(tld)
            }
            _ => Verdict::Keep,
        }
    }
}

struct RequireClassification {
    allowed: BTreeSet<ClassificationState>,
}

impl FilterStage for RequireClassification {
    fn name(&self) -> &str {
        "require_classification"
    }

    fn evaluate(&self, lead: &Lead) -> Verdict {
        match lead.classification_state {
            Some(state) if !self.allowed.contains(&state) => Verdict::Remove(state.to_string()),
            _ => Verdict::Keep,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SourceKind;

    fn compile(spec: StageSpec) -> Box<dyn FilterStage> {
        spec.compile(&CountryRegistry::builtin()).unwrap()
    }

    fn bare() -> Lead {
        Lead::new(SourceKind::Apollo)
    }

    #[test]
    fn test_specs_parse_from_toml() {
        #[derive(Deserialize)]
        struct Stages {
            stages: Vec<StageSpec>,
        }
        let parsed: Stages = toml::from_str(
            r#"
            [[stages]]
            kind = "require_email"

            [[stages]]
            kind = "require_phone_prefix"
            prefix = "+371"

            [[stages]]
            kind = "require_classification"
            allowed = ["domestic", "uncertain"]
            "#,
        )
        .unwrap();
        assert_eq!(parsed.stages.len(), 3);
        assert_eq!(
            parsed.stages[2],
            StageSpec::RequireClassification {
                allowed: vec![ClassificationState::Domestic, ClassificationState::Uncertain]
            }
        );
    }

    #[test]
    fn test_malformed_specs_fail_to_compile() {
        let registry = CountryRegistry::builtin();
        for spec in [
            StageSpec::RequirePhonePrefix { prefix: "371".to_string() },
            StageSpec::IndustryWhitelist { industries: vec![" ".to_string()] },
            StageSpec::RequireCountry { country: "XX".to_string() },
            StageSpec::RequireClassification { allowed: vec![] },
        ] {
            assert!(
                matches!(spec.compile(&registry), Err(ConfigError::InvalidStage { .. })),
                "{spec:?}"
            );
        }
    }

    #[test]
    fn test_absent_fields_are_kept_by_every_stage_but_require_email() {
        let lead = bare();
        let specs = vec![
            StageSpec::RequireEmailStatus { allowed: vec!["verified".to_string()] },
            StageSpec::RequirePhonePrefix { prefix: "+371".to_string() },
            StageSpec::ExcludeTitles { extra_patterns: vec![] },
            StageSpec::IndustryWhitelist { industries: vec!["retail".to_string()] },
            StageSpec::IndustryBlacklist { industries: vec!["gambling".to_string()] },
            StageSpec::RequireCountry { country: "LV".to_string() },
            StageSpec::PhoneCountryDiscrepancy,
            StageSpec::RejectForeignDomain { country: "LV".to_string() },
            StageSpec::RequireClassification { allowed: vec![ClassificationState::Domestic] },
        ];
        for spec in specs {
            let stage = compile(spec);
            assert_eq!(stage.evaluate(&lead), Verdict::Keep, "{}", stage.name());
        }
        assert_eq!(
            compile(StageSpec::RequireEmail).evaluate(&lead),
            Verdict::Remove("missing".to_string())
        );
    }

    #[test]
    fn test_phone_prefix_stage() {
        let stage = compile(StageSpec::RequirePhonePrefix { prefix: "+371".to_string() });
        let mut lead = bare();
        lead.company_phone = Some("00371 2000 0000".to_string());
        assert_eq!(stage.evaluate(&lead), Verdict::Keep);
        lead.company_phone = Some("+358 40 123".to_string());
        assert_eq!(stage.evaluate(&lead), Verdict::Remove("+358".to_string()));
        lead.company_phone = Some("2000 0000".to_string());
        assert_eq!(stage.evaluate(&lead), Verdict::Remove("local_format".to_string()));
    }

    #[test]
    fn test_industry_lists_are_case_insensitive() {
        let whitelist = compile(StageSpec::IndustryWhitelist { industries: vec!["Retail".to_string()] });
        let blacklist = compile(StageSpec::IndustryBlacklist { industries: vec!["Gambling".to_string()] });
        let mut lead = bare();
        lead.industry = Some("RETAIL".to_string());
        assert_eq!(whitelist.evaluate(&lead), Verdict::Keep);
        assert_eq!(blacklist.evaluate(&lead), Verdict::Keep);
        lead.industry = Some("gambling".to_string());
        assert_eq!(whitelist.evaluate(&lead), Verdict::Remove("gambling".to_string()));
        assert_eq!(blacklist.evaluate(&lead), Verdict::Remove("gambling".to_string()));
    }

    #[test]
    fn test_phone_country_discrepancy_needs_international_phone() {
        let stage = compile(StageSpec::PhoneCountryDiscrepancy);
        let mut lead = bare();
        lead.company_country = Some("Latvia".to_string());
        lead.company_phone = Some("+358 40 123 4567".to_string());
        assert_eq!(stage.evaluate(&lead), Verdict::Remove("LV:+358".to_string()));

        lead.company_phone = Some("2000 0000".to_string());
        assert_eq!(stage.evaluate(&lead), Verdict::Keep);

        lead.company_phone = Some("+371 2000 0000".to_string());
        assert_eq!(stage.evaluate(&lead), Verdict::Keep);

        lead.company_country = Some("Atlantis".to_string());
        lead.company_phone = Some("+358 40 123 4567".to_string());
        assert_eq!(stage.evaluate(&lead), Verdict::Keep);
    }

    #[test]
    fn test_require_country_checks_company_then_person() {
        let stage = compile(StageSpec::RequireCountry { country: "LV".to_string() });
        let mut lead = bare();
        lead.person_country = Some("Latvia".to_string());
        assert_eq!(stage.evaluate(&lead), Verdict::Keep);
        lead.person_country = Some("Estonia".to_string());
        assert_eq!(stage.evaluate(&lead), Verdict::Remove("Estonia".to_string()));
    }

    #[test]
    fn test_reject_foreign_domain() {
        let stage = compile(StageSpec::RejectForeignDomain { country: "LV".to_string() });
        let mut lead = bare();
        lead.company_domain = Some("acme.co.uk".to_string());
        assert_eq!(stage.evaluate(&lead), Verdict::Remove(".co.uk".to_string()));
        lead.company_domain = Some("acme.com".to_string());
        assert_eq!(stage.evaluate(&lead), Verdict::Keep);
    }
}
