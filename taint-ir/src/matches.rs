//! Pattern-match oracle interface (C4): the shapes the checker consumes
//! when it asks "does a source/sink/sanitizer/propagator pattern match the
//! expression or l-value at this program point?".
//!
//! The engine never runs pattern matching itself — a collaborator (the
//! rule-matching front end) hands it these structs. Grounded on
//! `program_structure::ir` expression/statement metadata for the
//! range+bindings shape, and on the `SourceSpec`/`SinkSpec`/`SanitizerSpec`
//! split in `other_examples/18d9e59d_mattepiu-drift...graph-taint-types.rs`,
//! generalized from that file's closed CWE-driven enums to the open,
//! rule-author-defined label/precondition model this engine requires.

use std::collections::HashMap;
use std::fmt;

use crate::label::{Label, Precondition};
use crate::location::SourceLocation;
use crate::lvalue::VariableName;

/// Identity of a single concrete pattern match, assigned by the oracle.
/// Two matches of the same rule at different program points get distinct
/// ids; re-evaluating the same match at the same point yields the same id
/// (this is what lets [`crate::taint::taints_of_pms`] de-duplicate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatternMatchId(pub u64);

impl fmt::Display for PatternMatchId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "pm#{}", self.0)
    }
}

/// Metavariable bindings captured by a match, e.g. `$X` bound to the text of
/// the matched subexpression. The engine treats binding values as opaque;
/// only `unify_mvars` (§6) compares them for equality across matches.
pub type MetavarBindings = HashMap<String, String>;

/// Whether a sanitizer/source/propagator fires only via the side effect of a
/// call (e.g. a function whose return value is irrelevant but which
/// sanitizes its argument in place) or also as a plain data producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BySideEffect {
    /// Fires only through the side-effect path (C6 `CallSpecial`/`Call`
    /// handling), never by matching the call's result value.
    Only,
    /// Fires through both the side-effect path and ordinary value matching.
    Yes,
    /// Does not fire through the side-effect path at all.
    No,
}

/// Common shape shared by every kind of pattern match: where it matched and
/// what it bound. `Spec` carries the kind-specific rule metadata.
#[derive(Debug, Clone)]
pub struct Match<Spec> {
    pub id: PatternMatchId,
    pub range: SourceLocation,
    pub bindings: MetavarBindings,
    pub spec: Spec,
}

impl<Spec> Match<Spec> {
    pub fn new(id: PatternMatchId, range: SourceLocation, bindings: MetavarBindings, spec: Spec) -> Match<Spec> {
        Match { id, range, bindings, spec }
    }
}

#[derive(Debug, Clone)]
pub struct SourceSpec {
    pub label: Label,
    pub precondition: Precondition,
    pub by_side_effect: BySideEffect,
    /// An "exact" source match taints only the matched expression itself,
    /// not any compound value it happens to be nested inside (§4.2).
    pub exact: bool,
    pub control: bool,
}

#[derive(Debug, Clone)]
pub struct SinkSpec {
    pub requires: Precondition,
    /// Only checked once, at function exit, rather than at every occurrence
    /// (§4.8 `check_tainted_at_exit_sinks`).
    pub at_exit: bool,
    /// Whether this sink has an explicit focus metavariable (`focus-metavariable`):
    /// if so only the focused subexpression's taint is checked, not the whole match.
    pub has_focus: bool,
    pub exact: bool,
}

#[derive(Debug, Clone)]
pub struct SanitizerSpec {
    pub by_side_effect: BySideEffect,
    pub exact: bool,
}

/// Direction a propagator match moves taint: `From` reads taint off the
/// matched expression into the propagator's channel, `To` writes the
/// channel's accumulated taint onto the matched l-value (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropagatorDirection {
    From,
    To,
}

/// Identifies one propagator rule's `from`/`to` channel pairing, so that a
/// `From` match and its corresponding `To` match can be joined.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropId(pub String);

#[derive(Debug, Clone)]
pub struct PropagatorSpec {
    pub prop: PropId,
    pub direction: PropagatorDirection,
    /// The variable the matched subexpression binds to, when the
    /// propagator targets a variable rather than the whole matched range.
    pub var: Option<VariableName>,
    pub by_side_effect: bool,
    /// Whether passing through this propagator replaces the incoming
    /// labels rather than adding to them.
    pub replace_labels: bool,
    pub label: Option<Label>,
    pub requires: Precondition,
}

pub type SourceMatch = Match<SourceSpec>;
pub type SinkMatch = Match<SinkSpec>;
pub type SanitizerMatch = Match<SanitizerSpec>;
pub type PropagatorMatch = Match<PropagatorSpec>;

/// All pattern matches relevant to a single expression/l-value, as handed
/// to the checker by the oracle (§4.4/§4.5). Picking which concrete rule
/// matches count at all — narrowest range wins, then first-declared-rule —
/// is the oracle's responsibility; the engine consumes whatever survives
/// that reduction. But best-match canonicalization also has an engine-side
/// half: a single match can be re-consulted at more than one program point
/// the checker visits for the same underlying AST position (e.g.
/// `Checker::check_lval`'s per-prefix walk over `x.a.b`, which has only one
/// `SourceLocation` to query the oracle with across all three prefixes), so
/// the engine itself deduplicates by [`PatternMatchId`] within one such
/// walk to avoid emitting the same sink hit once per prefix depth.
#[derive(Debug, Clone, Default)]
pub struct PatternMatches {
    pub sources: Vec<SourceMatch>,
    pub sinks: Vec<SinkMatch>,
    pub sanitizers: Vec<SanitizerMatch>,
    pub propagators: Vec<PropagatorMatch>,
}

impl PatternMatches {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.sinks.is_empty() && self.sanitizers.is_empty() && self.propagators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::FileId;

    #[test]
    fn test_pattern_matches_is_empty() {
        assert!(PatternMatches::default().is_empty());
        let mut pms = PatternMatches::default();
        pms.sources.push(Match::new(
            PatternMatchId(0),
            SourceLocation::new(FileId(0), 0, 1),
            MetavarBindings::new(),
            SourceSpec {
                label: Label::new("a"),
                precondition: Precondition::True,
                by_side_effect: BySideEffect::No,
                exact: false,
                control: false,
            },
        ));
        assert!(!pms.is_empty());
    }
}
