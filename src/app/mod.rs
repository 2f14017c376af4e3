pub mod consolidation_use_case;
pub mod ports;
pub mod report;

pub use consolidation_use_case::{ConsolidationRequest, ConsolidationRun, ConsolidationUseCase};
pub use report::ConsolidationReport;
