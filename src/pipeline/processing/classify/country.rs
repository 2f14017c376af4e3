//! Country profiles: the data that drives classification.
//!
//! Built-in profiles cover the Baltic and Nordic markets plus GB. Adding a
//! country is one `[countries.<CODE>]` table in the config file.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::ConfigError;

const COMMON_FOREIGN_TLDS: &[&str] = &[
    ".ae", ".at", ".au", ".be", ".bg", ".br", ".by", ".ca", ".ch", ".cn", ".cy", ".cz", ".de",
    ".dk", ".ee", ".es", ".fi", ".fr", ".gr", ".hr", ".hu", ".ie", ".il", ".in", ".is", ".it",
    ".jp", ".kz", ".lt", ".lu", ".lv", ".md", ".mt", ".nl", ".no", ".nz", ".pl", ".pt", ".ro",
    ".rs", ".ru", ".se", ".sg", ".si", ".sk", ".tr", ".ua", ".uk", ".us", ".za",
];

const COMMON_NEUTRAL_TLDS: &[&str] = &[
    ".com", ".net", ".org", ".info", ".biz", ".io", ".co", ".eu", ".app", ".ai", ".dev", ".tech",
    ".online", ".site", ".store", ".shop", ".global", ".group", ".agency", ".me",
];

const COMMON_COMPOUND_TLDS: &[&str] = &[
    ".co.uk", ".org.uk", ".ac.uk", ".gov.uk", ".ltd.uk", ".plc.uk", ".com.au", ".net.au",
    ".org.au", ".co.nz", ".co.za", ".com.br", ".co.jp", ".co.il", ".com.cn", ".co.in",
    ".com.pl", ".com.tr", ".com.ua", ".com.cy", ".com.mt",
];

const COMMON_PHONE_PREFIXES: &[&str] = &[
    "+1", "+7", "+27", "+30", "+31", "+32", "+33", "+34", "+36", "+39", "+40", "+41", "+43",
    "+44", "+45", "+46", "+47", "+48", "+49", "+61", "+64", "+65", "+81", "+86", "+90", "+91",
    "+351", "+352", "+353", "+354", "+356", "+357", "+358", "+359", "+370", "+371", "+372",
    "+373", "+375", "+380", "+381", "+385", "+386", "+420", "+421", "+971", "+972",
];

fn set_of(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_foreign_tlds() -> BTreeSet<String> {
    set_of(COMMON_FOREIGN_TLDS)
}

fn default_neutral_tlds() -> BTreeSet<String> {
    set_of(COMMON_NEUTRAL_TLDS)
}

fn default_compound_tlds() -> BTreeSet<String> {
    set_of(COMMON_COMPOUND_TLDS)
}

fn default_foreign_phone_prefixes() -> BTreeSet<String> {
    set_of(COMMON_PHONE_PREFIXES)
}

/// Everything the classifier needs to know about one target country.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryProfile {
    /// ISO code; filled from the config table key when omitted
    #[serde(default)]
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub home_tld: String,
    pub home_phone_prefix: String,
    #[serde(default = "default_foreign_tlds")]
    pub foreign_tlds: BTreeSet<String>,
    #[serde(default = "default_neutral_tlds")]
    pub neutral_tlds: BTreeSet<String>,
    #[serde(default = "default_compound_tlds")]
    pub compound_tlds: BTreeSet<String>,
    #[serde(default = "default_foreign_phone_prefixes")]
    pub foreign_phone_prefixes: BTreeSet<String>,
}

impl CountryProfile {
    /// A profile with the shared foreign/neutral/compound tables.
    pub fn new(code: &str, name: &str, aliases: &[&str], home_tld: &str, home_phone_prefix: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            home_tld: home_tld.to_string(),
            home_phone_prefix: home_phone_prefix.to_string(),
            foreign_tlds: default_foreign_tlds(),
            neutral_tlds: default_neutral_tlds(),
            compound_tlds: default_compound_tlds(),
            foreign_phone_prefixes: default_foreign_phone_prefixes(),
        }
    }

    /// Whether `value` names this country (code, name or alias, case-insensitive).
    pub fn matches_country(&self, value: &str) -> bool {
        let value = value.trim();
        value.eq_ignore_ascii_case(&self.code)
            || value.to_lowercase() == self.name.to_lowercase()
            || self.aliases.iter().any(|a| a.to_lowercase() == value.to_lowercase())
    }

    /// Lowercase the tables, give every TLD a leading dot, and take the home
    /// TLD/prefix out of the foreign sets.
    pub fn normalized(mut self) -> Result<Self, ConfigError> {
        self.code = self.code.trim().to_ascii_uppercase();
        let invalid = |message: &str| ConfigError::InvalidCountry {
            code: self.code.clone(),
            message: message.to_string(),
        };

        if self.code.is_empty() {
            return Err(invalid("country code must not be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        let home_tld = dotted(&self.home_tld);
        if home_tld.len() < 2 || home_tld[1..].contains('.') {
            return Err(invalid("home_tld must be a single label such as \".lv\""));
        }
        let prefix = self.home_phone_prefix.trim().to_string();
        if !is_phone_prefix(&prefix) {
            return Err(invalid("home_phone_prefix must look like \"+371\""));
        }
        if let Some(bad) = self.foreign_phone_prefixes.iter().find(|p| !is_phone_prefix(p.trim())) {
            let message = format!("foreign phone prefix {:?} must look like \"+358\"", bad);
            return Err(invalid(&message));
        }

        self.foreign_tlds = self
            .foreign_tlds
            .iter()
            .map(|t| dotted(t))
            .filter(|t| *t != home_tld)
            .collect();
        self.neutral_tlds = self.neutral_tlds.iter().map(|t| dotted(t)).collect();
        self.compound_tlds = self.compound_tlds.iter().map(|t| dotted(t)).collect();
        self.foreign_phone_prefixes = self
            .foreign_phone_prefixes
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| *p != prefix)
            .collect();
        self.home_tld = home_tld;
        self.home_phone_prefix = prefix;
        Ok(self)
    }
}

fn dotted(tld: &str) -> String {
    let tld = tld.trim().to_lowercase();
    if tld.starts_with('.') {
        tld
    } else {
        format!(".{tld}")
    }
}

fn is_phone_prefix(prefix: &str) -> bool {
    prefix.len() >= 2
        && prefix.starts_with('+')
        && prefix[1..].chars().all(|c| c.is_ascii_digit())
}

/// Country profiles by code.
#[derive(Debug, Clone)]
pub struct CountryRegistry {
    profiles: BTreeMap<String, CountryProfile>,
}

impl Default for CountryRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CountryRegistry {
    pub fn builtin() -> Self {
        let builtins = [
            CountryProfile::new("LV", "Latvia", &["Latvija", "Republic of Latvia"], ".lv", "+371"),
            CountryProfile::new("LT", "Lithuania", &["Lietuva"], ".lt", "+370"),
            CountryProfile::new("EE", "Estonia", &["Eesti"], ".ee", "+372"),
            CountryProfile::new("FI", "Finland", &["Suomi"], ".fi", "+358"),
            CountryProfile::new("SE", "Sweden", &["Sverige"], ".se", "+46"),
            CountryProfile::new(
                "GB",
                "United Kingdom",
                &["UK", "Great Britain", "England", "Scotland", "Wales"],
                ".uk",
                "+44",
            ),
        ];
        let mut profiles = BTreeMap::new();
        for profile in builtins {
            // Built-in tables are well formed; normalization only strips home entries.
            let code = profile.code.clone();
            if let Ok(profile) = profile.normalized() {
                profiles.insert(code, profile);
            }
        }
        Self { profiles }
    }

    /// Add or replace profiles from configuration, keyed by country code.
    pub fn with_overrides(
        mut self,
        overrides: &BTreeMap<String, CountryProfile>,
    ) -> Result<Self, ConfigError> {
        for (key, profile) in overrides {
            let mut profile = profile.clone();
            if profile.code.trim().is_empty() {
                profile.code = key.clone();
            }
            let profile = profile.normalized()?;
            self.profiles.insert(profile.code.clone(), profile);
        }
        Ok(self)
    }

    pub fn get(&self, code: &str) -> Result<&CountryProfile, ConfigError> {
        self.profiles
            .get(&code.trim().to_ascii_uppercase())
            .ok_or_else(|| ConfigError::UnknownCountry(code.to_string()))
    }

    /// Find the profile a free-text country value refers to.
    pub fn find(&self, value: &str) -> Option<&CountryProfile> {
        self.profiles.values().find(|p| p.matches_country(value))
    }

    pub fn profiles(&self) -> impl Iterator<Item = &CountryProfile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
