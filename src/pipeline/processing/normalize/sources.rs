//! Per-scraper field-mapping tables.
//!
//! Each [`SourceKind`] owns one static table of `(raw key path, canonical field)`
//! pairs. Paths may descend into nested objects (`organization.name`) or arrays
//! (`emails.0`). When several raw paths feed the same field the first non-empty
//! one wins, so tables list the preferred path first.

use serde_json::{Map, Value};

use crate::domain::{LeadField, SourceKind};

pub type FieldMap = &'static [(&'static str, LeadField)];

const APOLLO_FIELDS: FieldMap = &[
    ("first_name", LeadField::FirstName),
    ("last_name", LeadField::LastName),
    ("name", LeadField::FullName),
    ("title", LeadField::Title),
    ("linkedin_url", LeadField::LinkedinUrl),
    ("email", LeadField::Email),
    ("email_status", LeadField::EmailStatus),
    ("city", LeadField::City),
    ("country", LeadField::PersonCountry),
    ("organization.name", LeadField::CompanyName),
    ("organization_name", LeadField::CompanyName),
    ("organization.website_url", LeadField::CompanyWebsite),
    ("organization.primary_domain", LeadField::CompanyDomain),
    ("organization.phone", LeadField::CompanyPhone),
    ("organization.primary_phone.number", LeadField::CompanyPhone),
    ("organization.country", LeadField::CompanyCountry),
    ("organization.industry", LeadField::Industry),
];

const APIFY_LEADS_FIELDS: FieldMap = &[
    ("first_name", LeadField::FirstName),
    ("last_name", LeadField::LastName),
    ("full_name", LeadField::FullName),
    ("job_title", LeadField::Title),
    ("linkedin", LeadField::LinkedinUrl),
    ("email", LeadField::Email),
    ("email_status", LeadField::EmailStatus),
    ("city", LeadField::City),
    ("country", LeadField::PersonCountry),
    ("company_name", LeadField::CompanyName),
    ("company_website", LeadField::CompanyWebsite),
    ("company_domain", LeadField::CompanyDomain),
    ("company_phone", LeadField::CompanyPhone),
    ("company_country", LeadField::CompanyCountry),
    ("industry", LeadField::Industry),
];

const GOOGLE_MAPS_FIELDS: FieldMap = &[
    ("title", LeadField::CompanyName),
    ("website", LeadField::CompanyWebsite),
    ("phone", LeadField::CompanyPhone),
    ("phoneUnformatted", LeadField::CompanyPhone),
    ("emails.0", LeadField::Email),
    ("city", LeadField::City),
    ("countryCode", LeadField::CompanyCountry),
    ("categoryName", LeadField::Industry),
];

const LINKEDIN_SALES_NAV_FIELDS: FieldMap = &[
    ("firstName", LeadField::FirstName),
    ("lastName", LeadField::LastName),
    ("fullName", LeadField::FullName),
    ("title", LeadField::Title),
    ("linkedInProfileUrl", LeadField::LinkedinUrl),
    ("profileUrl", LeadField::LinkedinUrl),
    ("companyName", LeadField::CompanyName),
    ("companyWebsite", LeadField::CompanyWebsite),
    ("companyIndustry", LeadField::Industry),
];

const MANUAL_IMPORT_FIELDS: FieldMap = &[
    ("First Name", LeadField::FirstName),
    ("Last Name", LeadField::LastName),
    ("Name", LeadField::FullName),
    ("Title", LeadField::Title),
    ("LinkedIn", LeadField::LinkedinUrl),
    ("Email", LeadField::Email),
    ("City", LeadField::City),
    ("Company", LeadField::CompanyName),
    ("Website", LeadField::CompanyWebsite),
    ("Phone", LeadField::CompanyPhone),
    ("Country", LeadField::CompanyCountry),
    ("Industry", LeadField::Industry),
];

impl SourceKind {
    /// The raw-key to canonical-field table for this scraper.
    pub fn field_map(&self) -> FieldMap {
        match self {
            SourceKind::Apollo => APOLLO_FIELDS,
            SourceKind::ApifyLeads => APIFY_LEADS_FIELDS,
            SourceKind::GoogleMaps => GOOGLE_MAPS_FIELDS,
            SourceKind::LinkedinSalesNav => LINKEDIN_SALES_NAV_FIELDS,
            SourceKind::ManualImport => MANUAL_IMPORT_FIELDS,
        }
    }

    /// Raw path carrying an industry tag id instead of a name, when the source has one.
    pub fn industry_id_path(&self) -> Option<&'static str> {
        match self {
            SourceKind::Apollo => Some("organization.industry_tag_id"),
            _ => None,
        }
    }

    /// Top-level raw keys this source emits that are not canonical key names.
    fn source_specific_keys(&self) -> impl Iterator<Item = &'static str> {
        self.field_map()
            .iter()
            .map(|(path, _)| top_level(path))
            .filter(|key| !is_canonical_key(key))
    }

    /// Whether `record` already looks like a canonical lead for this source:
    /// it carries at least one canonical key the source never emits itself and
    /// none of the source's own raw keys.
    pub fn is_canonical_shape(&self, record: &Map<String, Value>) -> bool {
        let raw_keys: Vec<&str> = self.field_map().iter().map(|(p, _)| top_level(p)).collect();

        let has_canonical_only = CANONICAL_KEYS
            .iter()
            .any(|key| !raw_keys.contains(key) && record.contains_key(*key));
        let has_source_specific = self
            .source_specific_keys()
            .any(|key| record.contains_key(key));

        has_canonical_only && !has_source_specific
    }
}

/// Keys of a serialized canonical lead, including provenance.
const CANONICAL_KEYS: &[&str] = &[
    "first_name",
    "last_name",
    "full_name",
    "title",
    "linkedin_url",
    "email",
    "email_status",
    "city",
    "person_country",
    "company_name",
    "company_website",
    "company_domain",
    "company_phone",
    "company_country",
    "industry",
    "source",
];

fn is_canonical_key(key: &str) -> bool {
    CANONICAL_KEYS.contains(&key)
}

fn top_level(path: &str) -> &str {
    path.split('.').next().unwrap_or(path)
}

/// Resolve a dotted path inside a raw record and render scalar values as text.
pub fn lookup_path(record: &Map<String, Value>, path: &str) -> Option<String> {
    let mut segments = path.split('.');
    let mut current = record.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    let text = match current {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
