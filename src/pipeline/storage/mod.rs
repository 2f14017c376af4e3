// Pipeline storage: per-client campaign history

pub mod campaign_history;

pub use campaign_history::{Campaign, CampaignHistory, LoadedHistory};
