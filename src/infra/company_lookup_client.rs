use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::app::ports::{CompanyLookup, DomainLookup};
use crate::error::LookupError;

const API_KEY_HEADER: &str = "X-Api-Key";

#[derive(Debug, Deserialize)]
struct EnrichResponse {
    #[serde(default)]
    organization: Option<Organization>,
}

#[derive(Debug, Deserialize)]
struct Organization {
    #[serde(default)]
    country: Option<String>,
}

/// Company lookup over the organization-enrich HTTP API.
pub struct HttpCompanyLookup {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpCompanyLookup {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn enrich_url(&self, domain: &str) -> String {
        format!(
            "{}/organizations/enrich?domain={}",
            self.base_url,
            urlencoding::encode(domain)
        )
    }
}

/// Read an enrich response body. An organization without a country is still
/// a billed match.
fn parse_enrich_response(body: &str) -> Result<DomainLookup, LookupError> {
    let response: EnrichResponse = serde_json::from_str(body)?;
    Ok(match response.organization {
        Some(org) => DomainLookup {
            found: true,
            country: org.country.filter(|c| !c.trim().is_empty()),
            credits_consumed: 1,
        },
        None => DomainLookup::not_found(),
    })
}

#[async_trait]
impl CompanyLookup for HttpCompanyLookup {
    async fn lookup(&self, domain: &str) -> Result<DomainLookup, LookupError> {
        let url = self.enrich_url(domain);
        let resp = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            debug!("No organization found for {}", domain);
            return Ok(DomainLookup::not_found());
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LookupError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = resp.text().await?;
        let lookup = parse_enrich_response(&body)?;
        debug!("Lookup for {} returned {:?}", domain, lookup.country);
        Ok(lookup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_found_organization_costs_one_credit() {
        let lookup = parse_enrich_response(r#"{"organization": {"name": "Acme", "country": "Latvia"}}"#).unwrap();
        assert!(lookup.found);
        assert_eq!(lookup.country.as_deref(), Some("Latvia"));
        assert_eq!(lookup.credits_consumed, 1);
    }

    #[test]
    fn test_null_organization_is_not_found() {
        let lookup = parse_enrich_response(r#"{"organization": null}"#).unwrap();
        assert_eq!(lookup, DomainLookup::not_found());
    }

    #[test]
    fn test_garbage_body_is_parse_error() {
        assert!(matches!(parse_enrich_response("<html>"), Err(LookupError::Parse(_))));
    }

    #[test]
    fn test_domain_is_url_encoded() {
        let client = HttpCompanyLookup::new("https://api.example.com/v1/", "key", Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.enrich_url("acme.lv&x=1"),
            "https://api.example.com/v1/organizations/enrich?domain=acme.lv%26x%3D1"
        );
    }
}
