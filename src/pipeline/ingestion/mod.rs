// Pipeline ingestion: batch files and outbound request limiting

pub mod batch_loader;
pub mod rate_limiter;

pub use batch_loader::{load_batches, LoadedBatches, RawBatch};
pub use rate_limiter::{Limits, RateLimiter};
