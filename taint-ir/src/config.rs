//! Engine configuration: the collaborator hooks the checker and transfer
//! function call out to, plus the handful of toggles that change how
//! conservative the engine is at unresolved call sites (§4, §6).
//!
//! Grounded on the boxed-closure-as-pass style in
//! `program_analysis::get_analysis_passes` (`type AnalysisPass = dyn Fn(...)
//! -> ReportCollection; Vec<Box<AnalysisPass>>`), generalized from "a list
//! of independent passes" to "a handful of named hooks a single pass calls
//! out to", since this engine is one interprocedural fixpoint rather than a
//! battery of intraprocedural lints.

use crate::location::SourceLocation;
use crate::lvalue::VariableName;
use crate::matches::{PatternMatches, SinkMatch};
use crate::results::AnalysisResult;
use crate::taint::TaintSet;
use crate::LvalEnv;

/// The source language, gating language-specific heuristics (§6): Java's
/// getter/setter convention lets the checker treat `obj.getX()` as reading
/// field `x` and `obj.setX(v)` as writing it, rather than as an opaque call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Java,
    Other,
}

/// Toggles that trade soundness for fewer findings at sites the engine
/// cannot resolve precisely (§6). Each defaults to the more conservative
/// (non-"assume-safe") behavior.
#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// Treat calls to functions without a taint signature as not
    /// propagating taint from their arguments to their result.
    pub taint_assume_safe_functions: bool,
    /// Treat an unresolved (`Offset::Any`) index as not aliasing any known
    /// field, rather than conservatively touching every field.
    pub taint_assume_safe_indexes: bool,
    /// Treat the result of a comparison expression as never tainted.
    pub taint_assume_safe_comparisons: bool,
    /// Treat the result of a boolean (`&&`/`||`/`!`) expression as never
    /// tainted.
    pub taint_assume_safe_booleans: bool,
    /// Treat numeric literals folded into an expression as never tainted.
    pub taint_assume_safe_numbers: bool,
    /// Only run propagators through direct assignments, never through call
    /// arguments/results.
    pub taint_only_propagate_through_assignments: bool,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            taint_assume_safe_functions: false,
            taint_assume_safe_indexes: false,
            taint_assume_safe_comparisons: false,
            taint_assume_safe_booleans: false,
            taint_assume_safe_numbers: false,
            taint_only_propagate_through_assignments: false,
        }
    }
}

/// The oracle hook: given the source range of an expression, l-value or
/// instruction, return every pattern match relevant there. Boxed rather
/// than generic so `Config` stays an ordinary, storable value.
pub type PatternMatchOracle = dyn Fn(SourceLocation) -> PatternMatches;

/// A precomputed taint summary for one function (§4.7): the results of
/// analyzing its body once with polymorphic `Var(Arg(i))`/`Var(This)` taint
/// seeded at its parameters (see `taint-cli`'s `signature` demo for how such
/// a seeded run looks). `params` maps each formal parameter's position to the
/// `VariableName` the body's own results address, so a `ToLval` entry rooted
/// in a parameter can be translated back to the caller's matching argument
/// l-value at instantiation time.
pub struct FunctionSignature {
    pub params: Vec<VariableName>,
    pub results: Vec<AnalysisResult>,
}

/// Look up a function's taint signature by name, if one is known (built-in,
/// pre-analyzed, or stubbed by the collaborator). Returns `None` for
/// functions the engine has no summary for, which is when
/// `taint_assume_safe_functions` takes effect.
pub type FunctionTaintSignature = dyn Fn(&str) -> Option<FunctionSignature>;

/// Resolve an attribute/field access on a value of a known class name to the
/// l-value it reads or writes, used by the Java getter/setter heuristic.
pub type FindAttributeInClass = dyn Fn(&str, &str) -> Option<VariableName>;

/// Given the final l-value environment at one of a function's exit nodes,
/// decide whether any at-exit sink (e.g. an end-of-scope resource sink) is
/// relevant there at all (§4.8, §6). Returns the taints to check and the
/// `at_exit` sink matches to check them against, or `None` if this exit node
/// has nothing for the hook to say about.
pub type CheckTaintedAtExitSinks = dyn Fn(&LvalEnv, usize) -> Option<(TaintSet, Vec<SinkMatch>)>;

pub type HandleResults = dyn FnMut(AnalysisResult);

/// Everything the engine needs beyond the CFG itself: where to ask pattern
/// matching questions, how conservative to be, and where to send findings.
pub struct Config {
    pub filepath: String,
    pub rule_id: String,
    pub language: Language,
    /// Whether to track control-dependency taint at all (§4.1 `Control`
    /// origin) — disabling this drops a source of false positives at the
    /// cost of missing control-flow-only leaks.
    pub track_control: bool,
    /// Whether metavariable bindings across distinct pattern matches must
    /// unify (the same `$X` must bind the same value) for a combined match
    /// (e.g. a propagator's `from`/`to` pair) to be considered joined (§6).
    pub unify_mvars: bool,
    pub options: Options,
    pub oracle: Box<PatternMatchOracle>,
    pub function_taint_signature: Box<FunctionTaintSignature>,
    pub find_attribute_in_class: Box<FindAttributeInClass>,
    pub check_tainted_at_exit_sinks: Box<CheckTaintedAtExitSinks>,
    pub handle_results: Box<HandleResults>,
}
