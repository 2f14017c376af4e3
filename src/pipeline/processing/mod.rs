// Pipeline processing: normalize, dedup, classify, escalate, filter

pub mod classify;
pub mod dedup;
pub mod enrich;
pub mod normalize;
pub mod quality_gate;
