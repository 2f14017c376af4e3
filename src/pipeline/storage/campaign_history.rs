use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::Lead;
use crate::error::Result;

/// Leads accepted for one client in one campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub campaign_id: Uuid,
    pub client: String,
    pub created_at: DateTime<Utc>,
    pub leads: Vec<Lead>,
}

impl Campaign {
    pub fn new(client: impl Into<String>, leads: Vec<Lead>) -> Self {
        Self {
            campaign_id: Uuid::new_v4(),
            client: client.into(),
            created_at: Utc::now(),
            leads,
        }
    }

    fn file_name(&self) -> String {
        format!(
            "campaign-{}-{}.json",
            self.created_at.format("%Y%m%dT%H%M%S"),
            self.campaign_id
        )
    }
}

/// Campaigns loaded for a client, oldest first.
#[derive(Debug, Default)]
pub struct LoadedHistory {
    pub campaigns: Vec<Campaign>,
    /// Files that could not be read or parsed
    pub skipped_files: usize,
}

impl LoadedHistory {
    pub fn lead_count(&self) -> usize {
        self.campaigns.iter().map(|c| c.leads.len()).sum()
    }
}

/// Directory of campaign files for a single client.
#[derive(Debug, Clone)]
pub struct CampaignHistory {
    dir: PathBuf,
    client: String,
}

impl CampaignHistory {
    pub fn new(dir: impl Into<PathBuf>, client: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            client: client.into(),
        }
    }

    pub fn client(&self) -> &str {
        &self.client
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load every campaign file of this client sorted by `created_at`. A missing
    /// directory is an empty history; unreadable files are skipped and counted.
    pub fn load(&self) -> LoadedHistory {
        let mut history = LoadedHistory::default();
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No campaign history at {:?}, starting fresh", self.dir);
                return history;
            }
            Err(e) => {
                warn!("Campaign history {:?} could not be listed: {}", self.dir, e);
                return history;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_campaign(&path) {
                Ok(campaign) if campaign.client == self.client => {
                    debug!("Loaded campaign {} with {} leads", campaign.campaign_id, campaign.leads.len());
                    history.campaigns.push(campaign);
                }
                Ok(campaign) => {
                    debug!("Ignoring campaign {} of client {}", campaign.campaign_id, campaign.client);
                }
                Err(e) => {
                    warn!("Skipping unreadable campaign file {:?}: {}", path, e);
                    history.skipped_files += 1;
                }
            }
        }

        history
            .campaigns
            .sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.campaign_id.cmp(&b.campaign_id)));
        info!(
            "Loaded {} campaigns ({} leads) for client {}",
            history.campaigns.len(),
            history.lead_count(),
            self.client
        );
        history
    }

    /// Write `campaign` as a new file in the history directory.
    pub fn persist(&self, campaign: &Campaign) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(campaign.file_name());
        fs::write(&path, serde_json::to_string_pretty(campaign)?)?;
        info!(
            "Persisted campaign {} ({} leads) to {:?}",
            campaign.campaign_id,
            campaign.leads.len(),
            path
        );
        Ok(path)
    }
}

fn read_campaign(path: &Path) -> Result<Campaign> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SourceKind;
    use chrono::Duration;
    use tempfile::tempdir;

    fn lead(email: &str) -> Lead {
        let mut lead = Lead::new(SourceKind::Apollo);
        lead.email = Some(email.to_string());
        lead
    }

    #[test]
    fn test_missing_directory_is_empty_history() {
        let dir = tempdir().unwrap();
        let history = CampaignHistory::new(dir.path().join("nope"), "acme").load();
        assert!(history.campaigns.is_empty());
        assert_eq!(history.skipped_files, 0);
    }

    #[test]
    fn test_campaigns_load_oldest_first_and_skip_corrupt_files() {
        let dir = tempdir().unwrap();
        let store = CampaignHistory::new(dir.path(), "acme");

        let mut newer = Campaign::new("acme", vec![lead("new@x.com")]);
        let mut older = Campaign::new("acme", vec![lead("old@x.com")]);
        older.created_at = newer.created_at - Duration::days(30);
        newer.created_at += Duration::seconds(1);
        store.persist(&newer).unwrap();
        store.persist(&older).unwrap();
        store.persist(&Campaign::new("other", vec![lead("x@x.com")])).unwrap();
        fs::write(dir.path().join("broken.json"), "{").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let history = store.load();
        assert_eq!(history.skipped_files, 1);
        assert_eq!(history.campaigns.len(), 2);
        assert_eq!(history.campaigns[0].leads[0].email.as_deref(), Some("old@x.com"));
        assert_eq!(history.campaigns[1].leads[0].email.as_deref(), Some("new@x.com"));
        assert_eq!(history.lead_count(), 2);
    }
}
