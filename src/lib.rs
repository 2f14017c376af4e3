pub mod config;
pub mod error;
pub mod logging;
pub mod observability;
pub mod pipeline;

// Layered boundaries for application and infrastructure
pub mod app;
pub mod infra;

// Lead shape shared across layers
pub mod domain;

pub use domain::{ClassificationState, Lead, LeadField, SourceKind};
pub use error::{ConfigError, ConsolidationError, LookupError, RecordError};
