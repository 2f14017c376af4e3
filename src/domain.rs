//! Canonical lead shape shared by every pipeline phase.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// The scrapers whose output the consolidator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Apollo,
    ApifyLeads,
    GoogleMaps,
    LinkedinSalesNav,
    ManualImport,
}

impl SourceKind {
    pub const ALL: [SourceKind; 5] = [
        SourceKind::Apollo,
        SourceKind::ApifyLeads,
        SourceKind::GoogleMaps,
        SourceKind::LinkedinSalesNav,
        SourceKind::ManualImport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Apollo => "apollo",
            SourceKind::ApifyLeads => "apify_leads",
            SourceKind::GoogleMaps => "google_maps",
            SourceKind::LinkedinSalesNav => "linkedin_sales_nav",
            SourceKind::ManualImport => "manual_import",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase();
        SourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == tag)
            .ok_or_else(|| ConfigError::UnknownSource(s.to_string()))
    }
}

/// Country verification verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationState {
    Domestic,
    Foreign,
    Uncertain,
}

impl ClassificationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationState::Domestic => "domestic",
            ClassificationState::Foreign => "foreign",
            ClassificationState::Uncertain => "uncertain",
        }
    }
}

impl fmt::Display for ClassificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical text fields of a [`Lead`]. Field-mapping tables target these
/// variants, so a typo in a mapping is a compile error rather than a silently
/// dropped column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeadField {
    FirstName,
    LastName,
    FullName,
    Title,
    LinkedinUrl,
    Email,
    EmailStatus,
    City,
    PersonCountry,
    CompanyName,
    CompanyWebsite,
    CompanyDomain,
    CompanyPhone,
    CompanyCountry,
    Industry,
}

impl LeadField {
    pub const ALL: [LeadField; 15] = [
        LeadField::FirstName,
        LeadField::LastName,
        LeadField::FullName,
        LeadField::Title,
        LeadField::LinkedinUrl,
        LeadField::Email,
        LeadField::EmailStatus,
        LeadField::City,
        LeadField::PersonCountry,
        LeadField::CompanyName,
        LeadField::CompanyWebsite,
        LeadField::CompanyDomain,
        LeadField::CompanyPhone,
        LeadField::CompanyCountry,
        LeadField::Industry,
    ];

    /// Canonical key name as it appears in serialized leads.
    pub fn key(&self) -> &'static str {
        match self {
            LeadField::FirstName => "first_name",
            LeadField::LastName => "last_name",
            LeadField::FullName => "full_name",
            LeadField::Title => "title",
            LeadField::LinkedinUrl => "linkedin_url",
            LeadField::Email => "email",
            LeadField::EmailStatus => "email_status",
            LeadField::City => "city",
            LeadField::PersonCountry => "person_country",
            LeadField::CompanyName => "company_name",
            LeadField::CompanyWebsite => "company_website",
            LeadField::CompanyDomain => "company_domain",
            LeadField::CompanyPhone => "company_phone",
            LeadField::CompanyCountry => "company_country",
            LeadField::Industry => "industry",
        }
    }
}

/// One canonical contact + company record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    /// The scraper that produced this record
    pub source: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification_state: Option<ClassificationState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removal_reason: Option<String>,
}

impl Lead {
    /// An empty lead attributed to `source`.
    pub fn new(source: SourceKind) -> Self {
        Self {
            first_name: None,
            last_name: None,
            full_name: None,
            title: None,
            linkedin_url: None,
            email: None,
            email_status: None,
            city: None,
            person_country: None,
            company_name: None,
            company_website: None,
            company_domain: None,
            company_phone: None,
            company_country: None,
            industry: None,
            source,
            classification_state: None,
            classification_reason: None,
            removal_reason: None,
        }
    }

    fn slot(&self, field: LeadField) -> &Option<String> {
        match field {
            LeadField::FirstName => &self.first_name,
            LeadField::LastName => &self.last_name,
            LeadField::FullName => &self.full_name,
            LeadField::Title => &self.title,
            LeadField::LinkedinUrl => &self.linkedin_url,
            LeadField::Email => &self.email,
            LeadField::EmailStatus => &self.email_status,
            LeadField::City => &self.city,
            LeadField::PersonCountry => &self.person_country,
            LeadField::CompanyName => &self.company_name,
            LeadField::CompanyWebsite => &self.company_website,
            LeadField::CompanyDomain => &self.company_domain,
            LeadField::CompanyPhone => &self.company_phone,
            LeadField::CompanyCountry => &self.company_country,
            LeadField::Industry => &self.industry,
        }
    }

    fn slot_mut(&mut self, field: LeadField) -> &mut Option<String> {
        match field {
            LeadField::FirstName => &mut self.first_name,
            LeadField::LastName => &mut self.last_name,
            LeadField::FullName => &mut self.full_name,
            LeadField::Title => &mut self.title,
            LeadField::LinkedinUrl => &mut self.linkedin_url,
            LeadField::Email => &mut self.email,
            LeadField::EmailStatus => &mut self.email_status,
            LeadField::City => &mut self.city,
            LeadField::PersonCountry => &mut self.person_country,
            LeadField::CompanyName => &mut self.company_name,
            LeadField::CompanyWebsite => &mut self.company_website,
            LeadField::CompanyDomain => &mut self.company_domain,
            LeadField::CompanyPhone => &mut self.company_phone,
            LeadField::CompanyCountry => &mut self.company_country,
            LeadField::Industry => &mut self.industry,
        }
    }

    /// Trimmed value of `field`; blank strings count as absent.
    pub fn value(&self, field: LeadField) -> Option<&str> {
        self.slot(field)
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, field: LeadField, value: Option<String>) {
        *self.slot_mut(field) = value;
    }

    /// Full name, falling back to "first last" when only the parts are known.
    pub fn display_name(&self) -> Option<String> {
        if let Some(full) = self.value(LeadField::FullName) {
            return Some(full.to_string());
        }
        let parts: Vec<&str> = [LeadField::FirstName, LeadField::LastName]
            .into_iter()
            .filter_map(|f| self.value(f))
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_values_read_as_absent() {
        let mut lead = Lead::new(SourceKind::Apollo);
        lead.email = Some("   ".to_string());
        assert_eq!(lead.value(LeadField::Email), None);

        lead.set(LeadField::Email, Some(" a@b.com ".to_string()));
        assert_eq!(lead.value(LeadField::Email), Some("a@b.com"));
    }

    #[test]
    fn test_source_tag_parsing() {
        assert_eq!("Apollo".parse::<SourceKind>().unwrap(), SourceKind::Apollo);
        assert_eq!(" google_maps ".parse::<SourceKind>().unwrap(), SourceKind::GoogleMaps);
        assert!(matches!(
            "yellow_pages".parse::<SourceKind>(),
            Err(ConfigError::UnknownSource(_))
        ));
    }

    #[test]
    fn test_display_name_falls_back_to_parts() {
        let mut lead = Lead::new(SourceKind::ManualImport);
        lead.first_name = Some("Jane".to_string());
        lead.last_name = Some("Doe".to_string());
        assert_eq!(lead.display_name().as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn test_serialization_omits_absent_fields() {
        let mut lead = Lead::new(SourceKind::ApifyLeads);
        lead.email = Some("a@x.com".to_string());
        let json = serde_json::to_value(&lead).unwrap();
        assert_eq!(json["source"], "apify_leads");
        assert_eq!(json["email"], "a@x.com");
        assert!(json.get("first_name").is_none());
    }
}
