// Observability: metrics per consolidation phase

pub mod metrics;

pub use metrics::{init, render};
