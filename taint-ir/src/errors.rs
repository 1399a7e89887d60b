//! Construction-time errors.
//!
//! Per §7, the engine itself never fails once a well-formed CFG and config
//! are handed to it — a missing pattern match or an unresolved label is a
//! soft condition logged with `log::warn!` from within the engine, not an
//! `Err`. These error types are reserved for malformed *inputs*: building an
//! ill-formed CFG, or a config whose collaborator hooks are inconsistent.
//! Grounded on `program_structure::control_flow_graph::errors::CFGError`,
//! trimmed to what a label-and-offset IL (rather than a circom template)
//! can get wrong, and kept as a `thiserror` enum in the teacher's style.

use thiserror::Error;

use crate::lvalue::VariableName;

#[derive(Debug, Error)]
pub enum CfgError {
    #[error("basic block {0} referenced but not present in this CFG")]
    UnknownBasicBlock(usize),

    #[error("entry block is not reachable from itself")]
    UnreachableEntry,

    #[error("variable `{0}` used before it is ever defined on any predecessor path")]
    UndefinedVariable(VariableName),
}

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("l-value `{0}` has no root variable in this environment")]
    UnknownRoot(VariableName),

    #[error("offset path exceeds the polymorphic offset bound while resolving `{0}`")]
    OffsetBoundExceeded(VariableName),
}
