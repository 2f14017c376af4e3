use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::pipeline::processing::classify::{CountryProfile, CountryRegistry};
use crate::pipeline::processing::enrich::EscalationLimits;
use crate::pipeline::processing::quality_gate::{StageSpec, DEFAULT_BREAKDOWN_SIZE};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub escalation: EscalationConfig,
    /// Extra or replacement country profiles keyed by code
    #[serde(default)]
    pub countries: BTreeMap<String, CountryProfile>,
    #[serde(default = "default_stages")]
    pub stages: Vec<StageSpec>,
    #[serde(default)]
    pub industry_cache_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_target_country")]
    pub target_country: String,
    #[serde(default = "default_breakdown_size")]
    pub breakdown_size: usize,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EscalationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
    #[serde(default = "default_requests_per_min")]
    pub requests_per_min: Option<u64>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_target_country() -> String {
    "LV".to_string()
}

fn default_breakdown_size() -> usize {
    DEFAULT_BREAKDOWN_SIZE
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_base_url() -> String {
    "https://api.apollo.io/api/v1".to_string()
}

fn default_api_key_env() -> String {
    "LEAD_LOOKUP_API_KEY".to_string()
}

fn default_concurrency() -> u32 {
    4
}

fn default_requests_per_min() -> Option<u64> {
    Some(120)
}

fn default_timeout_seconds() -> u64 {
    15
}

fn default_stages() -> Vec<StageSpec> {
    vec![
        StageSpec::ExcludeTitles {
            extra_patterns: Vec::new(),
        },
        StageSpec::PhoneCountryDiscrepancy,
    ]
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            target_country: default_target_country(),
            breakdown_size: default_breakdown_size(),
            log_dir: default_log_dir(),
        }
    }
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            concurrency: default_concurrency(),
            requests_per_min: default_requests_per_min(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            run: RunConfig::default(),
            escalation: EscalationConfig::default(),
            countries: BTreeMap::new(),
            stages: default_stages(),
            industry_cache_path: None,
        }
    }
}

impl EscalationConfig {
    pub fn limits(&self) -> EscalationLimits {
        EscalationLimits {
            concurrency: self.concurrency,
            requests_per_min: self.requests_per_min,
            timeout: Duration::from_secs(self.timeout_seconds),
        }
    }

    /// The API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String, std::env::VarError> {
        std::env::var(&self.api_key_env)
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Built-in profiles extended with the configured ones.
    pub fn country_registry(&self) -> Result<CountryRegistry, ConfigError> {
        CountryRegistry::builtin().with_overrides(&self.countries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.run.target_country, "LV");
        assert_eq!(config.run.breakdown_size, DEFAULT_BREAKDOWN_SIZE);
        assert!(!config.escalation.enabled);
        assert_eq!(config.escalation.api_key_env, "LEAD_LOOKUP_API_KEY");
        assert_eq!(config.stages, default_stages());
    }

    #[test]
    fn test_full_config() {
        let config = AppConfig::from_toml_str(
            r#"
            industry_cache_path = "cache/industries.json"

            [run]
            target_country = "PL"
            breakdown_size = 3

            [escalation]
            enabled = true
            concurrency = 2
            timeout_seconds = 5

            [countries.PL]
            name = "Poland"
            home_tld = ".pl"
            home_phone_prefix = "+48"

            [[stages]]
            kind = "require_email"

            [[stages]]
            kind = "reject_foreign_domain"
            country = "PL"
            "#,
        )
        .unwrap();
        assert_eq!(config.run.breakdown_size, 3);
        assert_eq!(config.escalation.limits().timeout, Duration::from_secs(5));
        assert_eq!(config.stages.len(), 2);
        let registry = config.country_registry().unwrap();
        assert_eq!(registry.get(&config.run.target_country).unwrap().name, "Poland");
    }

    #[test]
    fn test_missing_file_and_bad_toml() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            AppConfig::load(dir.path().join("missing.toml")),
            Err(ConfigError::Unreadable { .. })
        ));
        let bad = dir.path().join("bad.toml");
        fs::write(&bad, "[[stages]]\nkind = \"teleport\"\n").unwrap();
        assert!(matches!(AppConfig::load(&bad), Err(ConfigError::Toml(_))));
    }
}
