// Consolidation pipeline: ingestion, processing, and storage

pub mod ingestion;
pub mod processing;
pub mod storage;

pub use processing::{classify, dedup, enrich, normalize, quality_gate};
