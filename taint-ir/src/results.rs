//! Result emission (C8): the three kinds of finding the engine can report
//! once fixpoint is reached, handed one at a time to
//! [`crate::config::Config::handle_results`].
//!
//! Grounded on `program_analysis::taint_analysis::run_taint_analysis`'s
//! report-construction pattern, generalized from its single
//! "variable X is tainted" shape to the three result kinds the distilled
//! spec separates: a sink violation, taint escaping through a return value
//! (for interprocedural summaries), and taint escaping into an l-value that
//! outlives the current scope (e.g. a global or an out-parameter).

use crate::lvalue::Lvalue;
use crate::matches::{MetavarBindings, SinkMatch};
use crate::taint::TaintToken;

/// Where a tainted return happens: the location of the `return` statement.
pub type ReturnLocation = crate::location::SourceLocation;

#[derive(Debug, Clone)]
pub enum AnalysisResult {
    /// A sink's `requires` formula was satisfied by the given taints, at the
    /// given match, in the l-value environment current at that program
    /// point (kept for a collaborator that wants to render the full trace).
    /// `bindings` is the source/sink metavariable merge (§6), already
    /// resolved per `unify_mvars`.
    ToSink { taints: Vec<TaintToken>, sink: SinkMatch, bindings: MetavarBindings },
    /// Taint reached the function's return value; carried out to callers so
    /// the interprocedural engine can instantiate it at call sites (§4.7).
    ToReturn { taints: Vec<TaintToken>, location: ReturnLocation },
    /// Taint reached an l-value that survives the current function's scope
    /// (a global, or a by-reference out-parameter).
    ToLval { taints: Vec<TaintToken>, lvalue: Lvalue },
}

impl AnalysisResult {
    pub fn taints(&self) -> &[TaintToken] {
        match self {
            AnalysisResult::ToSink { taints, .. } => taints,
            AnalysisResult::ToReturn { taints, .. } => taints,
            AnalysisResult::ToLval { taints, .. } => taints,
        }
    }
}
