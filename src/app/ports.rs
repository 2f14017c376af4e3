use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::app::report::ConsolidationReport;
use crate::domain::Lead;
use crate::error::LookupError;

/// Answer of the company lookup service for one domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainLookup {
    pub found: bool,
    /// Free-text country as reported by the service
    pub country: Option<String>,
    pub credits_consumed: u32,
}

impl DomainLookup {
    pub fn not_found() -> Self {
        Self {
            found: false,
            country: None,
            credits_consumed: 0,
        }
    }
}

/// Paid company-by-domain lookup used to settle uncertain classifications.
#[async_trait]
pub trait CompanyLookup: Send + Sync {
    async fn lookup(&self, domain: &str) -> Result<DomainLookup, LookupError>;
}

/// Destination for the consolidated leads and the run report.
#[async_trait]
pub trait LeadOutputPort: Send + Sync {
    async fn write_leads(&self, leads: &[Lead]) -> anyhow::Result<()>;
    async fn write_report(&self, report: &ConsolidationReport) -> anyhow::Result<()>;
}
