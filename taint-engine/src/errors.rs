//! Construction-time errors surfaced by the fixpoint driver.
//!
//! Per §7 the engine itself has no fatal analysis conditions; this enum
//! exists solely for malformed inputs caught before the fixpoint loop
//! starts. Grounded on `program_analysis::analysis_context::AnalysisError`'s
//! `thiserror` style.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FixpointError {
    #[error("CFG for `{0}` is malformed: {1}")]
    MalformedCfg(String, #[source] taint_ir::errors::CfgError),
}
