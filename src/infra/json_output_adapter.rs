use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::app::ports::LeadOutputPort;
use crate::app::report::ConsolidationReport;
use crate::domain::Lead;

/// Writes the consolidated leads as a pretty JSON array and the report as a
/// JSON object.
pub struct JsonOutputAdapter {
    pub leads_path: PathBuf,
    pub report_path: PathBuf,
}

impl JsonOutputAdapter {
    pub fn new(leads_path: impl Into<PathBuf>, report_path: impl Into<PathBuf>) -> Self {
        Self {
            leads_path: leads_path.into(),
            report_path: report_path.into(),
        }
    }

    /// Ensure the output directory exists
    async fn ensure_parent(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent_dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent_dir.exists() {
                tokio::fs::create_dir_all(parent_dir).await.map_err(|e| {
                    anyhow::anyhow!("Failed to create output directory {:?}: {}", parent_dir, e)
                })?;
                debug!("Created output directory: {:?}", parent_dir);
            }
        }
        Ok(())
    }

    async fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> anyhow::Result<()> {
        self.ensure_parent(path).await?;
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| anyhow::anyhow!("Failed to serialize output to JSON: {}", e))?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to write {:?}: {}", path, e))?;
        Ok(())
    }
}

#[async_trait]
impl LeadOutputPort for JsonOutputAdapter {
    async fn write_leads(&self, leads: &[Lead]) -> anyhow::Result<()> {
        self.write_json(&self.leads_path, leads).await?;
        info!("Wrote {} leads to {:?}", leads.len(), self.leads_path);
        Ok(())
    }

    async fn write_report(&self, report: &ConsolidationReport) -> anyhow::Result<()> {
        self.write_json(&self.report_path, report).await?;
        info!("Wrote run report {} to {:?}", report.run_id, self.report_path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SourceKind;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_leads_are_written_as_canonical_json_array() {
        let dir = tempdir().unwrap();
        let adapter = JsonOutputAdapter::new(
            dir.path().join("out/leads.json"),
            dir.path().join("out/report.json"),
        );
        let mut lead = Lead::new(SourceKind::GoogleMaps);
        lead.company_name = Some("Kafejnīca".to_string());

        adapter.write_leads(&[lead.clone()]).await.unwrap();

        let content = tokio::fs::read_to_string(dir.path().join("out/leads.json")).await.unwrap();
        let parsed: Vec<Lead> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, vec![lead]);
    }
}
