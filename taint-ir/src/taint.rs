//! Taint values and traces (C1).
//!
//! Grounded on `program_analysis::taint_analysis` — the teacher's
//! `TaintAnalysis::taint_map: HashMap<VariableName, HashSet<VariableName>>`
//! is a *label-free*, intraprocedural taint relation between variable names.
//! This module generalizes it along three axes the distilled spec requires
//! that the teacher's circuit-signal taint does not need: an `Origin` that
//! distinguishes concrete sources from polymorphic (`Var`) and control taint,
//! a trace of source locations per token (teacher has none — variable names
//! are their own trace), and label/precondition bookkeeping (§4.1).
//! Trace/flow bookkeeping style follows `TaintInfo`/`TaintFlow` in
//! `other_examples/313b069e_c2j-astgrep...dataflow-src-taint.rs`.

use std::collections::HashSet;

use crate::label::{Label, LabelSet, Precondition};
use crate::location::SourceLocation;
use crate::lvalue::SigLval;
use crate::matches::{MetavarBindings, PatternMatchId, SourceMatch};

/// One hop in a call trace: the callee name and the call-site location,
/// prepended each time a `ToReturn`/`ToSink` taint is carried across a
/// signature instantiation (§4.7).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallFrame {
    pub callee: String,
    pub location: SourceLocation,
}

impl CallFrame {
    pub fn new(callee: impl Into<String>, location: SourceLocation) -> CallFrame {
        CallFrame { callee: callee.into(), location }
    }
}

/// Where a taint came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Traced back to a source pattern match.
    Source {
        pm: PatternMatchId,
        label: Label,
        precondition: Precondition,
        call_trace: Vec<CallFrame>,
        /// Metavariable bindings captured by the source match, carried along
        /// so a later `ToSink` can merge them with the sink's own bindings
        /// (§6).
        bindings: MetavarBindings,
    },
    /// Polymorphic: "whatever the caller passes through this l-value",
    /// used in function taint signatures (§4.7).
    Var(SigLval),
    /// Flowed through a control dependency (a guard), not through data.
    Control,
}

/// A single taint token. `tokens` accumulates the chain of program
/// locations the taint has passed through; the checker pushes onto it in
/// traversal order (front-to-back) and it is reversed exactly once, at
/// result emission, so callers see chronological order (§4.1).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaintToken {
    pub origin: Origin,
    pub tokens: Vec<SourceLocation>,
}

impl TaintToken {
    pub fn new(origin: Origin) -> TaintToken {
        TaintToken { origin, tokens: Vec::new() }
    }

    /// Return a copy of this token with `location` pushed onto its trace.
    pub fn with_step(&self, location: SourceLocation) -> TaintToken {
        let mut tokens = self.tokens.clone();
        tokens.push(location);
        TaintToken { origin: self.origin.clone(), tokens }
    }

    /// Return a copy of this token with `frame` prepended to its call trace.
    /// Only meaningful for `Source` origins; other origins are returned
    /// unchanged (signature instantiation only prepends frames to `Source`
    /// taints flowing out through `ToReturn`/`ToSink`, per §4.7).
    pub fn with_call_frame(&self, frame: CallFrame) -> TaintToken {
        let origin = match &self.origin {
            Origin::Source { pm, label, precondition, call_trace, bindings } => {
                let mut call_trace = call_trace.clone();
                call_trace.insert(0, frame);
                Origin::Source {
                    pm: *pm,
                    label: label.clone(),
                    precondition: precondition.clone(),
                    call_trace,
                    bindings: bindings.clone(),
                }
            }
            other => other.clone(),
        };
        TaintToken { origin, tokens: self.tokens.clone() }
    }

    /// The token's chronological trace: locations in the order they were
    /// actually traversed (reverses the internal reporting order).
    pub fn chronological_tokens(&self) -> Vec<SourceLocation> {
        let mut tokens = self.tokens.clone();
        tokens.reverse();
        tokens
    }

    pub fn label(&self) -> Option<&Label> {
        match &self.origin {
            Origin::Source { label, .. } => Some(label),
            _ => None,
        }
    }

    pub fn precondition(&self) -> Precondition {
        match &self.origin {
            Origin::Source { precondition, .. } => precondition.clone(),
            _ => Precondition::True,
        }
    }

    pub fn is_polymorphic(&self) -> bool {
        matches!(self.origin, Origin::Var(_))
    }
}

pub type TaintSet = HashSet<TaintToken>;

pub fn singleton(origin: Origin) -> TaintToken {
    TaintToken::new(origin)
}

pub fn union(a: &TaintSet, b: &TaintSet) -> TaintSet {
    a.union(b).cloned().collect()
}

pub fn intersection(a: &TaintSet, b: &TaintSet) -> TaintSet {
    a.intersection(b).cloned().collect()
}

pub fn is_empty(taints: &TaintSet) -> bool {
    taints.is_empty()
}

/// The labels carried by the non-polymorphic taints in `taints`. `Var` and
/// `Control` origins contribute nothing: their label contribution is either
/// unknown (deferred to substitution) or not label-bearing at all.
pub fn closed_labels(taints: &TaintSet) -> LabelSet {
    taints.iter().filter_map(|taint| taint.label().cloned()).collect()
}

/// Apply a precondition substitution when a `Var` taint is replaced by a set
/// of concrete taints at a call site (§4.7): conjoin the substituted formula
/// with each concrete taint's own precondition. Returns `None` if the
/// conjunction is unsatisfiable for every concrete taint, meaning the
/// substitution contributes nothing.
pub fn map_preconditions(subst: &Precondition, concrete: &TaintSet) -> Option<Precondition> {
    let mut any = false;
    let mut combined = Precondition::False;
    for taint in concrete {
        if let Some(conjoined) = subst.clone().conjoin(taint.precondition()) {
            combined = if any { combined.or(conjoined) } else { conjoined };
            any = true;
        }
    }
    if any {
        Some(combined)
    } else {
        None
    }
}

/// Evaluate a sink's `requires` formula against a taint set. Returns `None`
/// ("too polymorphic to decide", §4.1) when the set contains a `Var`-origin
/// taint whose eventual label is unknown and the formula is not already
/// satisfied by the taints whose labels *are* known. In that case resolution
/// is deferred until the polymorphic taint is substituted at a call site.
pub fn solve_precondition(taints: &TaintSet, requires: &Precondition) -> Option<bool> {
    let labels = closed_labels(taints);
    if requires.eval_closed(&labels) {
        return Some(true);
    }
    let has_unresolved_var = taints.iter().any(TaintToken::is_polymorphic);
    if has_unresolved_var {
        None
    } else {
        Some(false)
    }
}

/// Construct `Source`-origin taints from a list of source pattern matches,
/// one taint per match, ignoring any taint already present in `incoming`
/// with the same origin (a match re-evaluated at the same program point
/// should not duplicate its own contribution).
pub fn taints_of_pms<'a, I>(pms: I, incoming: &TaintSet) -> TaintSet
where
    I: IntoIterator<Item = &'a SourceMatch>,
{
    let mut result = TaintSet::new();
    for source in pms {
        let taint = singleton(Origin::Source {
            pm: source.id,
            label: source.spec.label.clone(),
            precondition: source.spec.precondition.clone(),
            call_trace: Vec::new(),
            bindings: source.bindings.clone(),
        });
        if !incoming.contains(&taint) {
            result.insert(taint);
        }
    }
    result
}

/// Merge metavariable bindings across every `Source`-origin taint in
/// `taints` with `sink_bindings` (§6). With `unify_mvars` set, any key that
/// collides with a differing value anywhere in the merge — source vs.
/// source, or source vs. sink — makes the whole merge fail (`None`); the
/// caller should then suppress the `ToSink` for this match, per the spec's
/// "no `ToSink` emitted for that pair" rule. Without `unify_mvars`, conflicts
/// across sources are dropped (the rest of the bindings survive) and the
/// sink's own bindings win over the source-merged result on collision.
pub fn merge_source_bindings(taints: &TaintSet, sink_bindings: &MetavarBindings, unify_mvars: bool) -> Option<MetavarBindings> {
    let mut merged = MetavarBindings::new();
    let mut conflicted: HashSet<String> = HashSet::new();
    for taint in taints {
        let Origin::Source { bindings, .. } = &taint.origin else { continue };
        for (key, value) in bindings {
            match merged.get(key) {
                Some(existing) if existing != value => {
                    if unify_mvars {
                        return None;
                    }
                    conflicted.insert(key.clone());
                }
                _ => {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
    }
    for key in &conflicted {
        merged.remove(key);
    }
    for (key, value) in sink_bindings {
        match merged.get(key) {
            Some(existing) if existing != value => {
                if unify_mvars {
                    return None;
                }
                merged.insert(key.clone(), value.clone());
            }
            _ => {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    Some(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::Precondition;

    fn pm(id: u64) -> PatternMatchId {
        PatternMatchId(id)
    }

    #[test]
    fn test_union_and_is_empty() {
        let a: TaintSet = [singleton(Origin::Control)].into_iter().collect();
        let b = TaintSet::new();
        assert!(is_empty(&b));
        assert!(!is_empty(&union(&a, &b)));
    }

    #[test]
    fn test_solve_precondition_defers_on_var() {
        let taints: TaintSet = [singleton(Origin::Var(SigLval::new(crate::lvalue::VarBase::Arg(0))))]
            .into_iter()
            .collect();
        assert_eq!(solve_precondition(&taints, &Precondition::label("a")), None);
    }

    #[test]
    fn test_solve_precondition_satisfied_without_var() {
        let taints: TaintSet = [singleton(Origin::Source {
            pm: pm(0),
            label: Label::new("a"),
            precondition: Precondition::True,
            call_trace: Vec::new(),
            bindings: MetavarBindings::new(),
        })]
        .into_iter()
        .collect();
        assert_eq!(solve_precondition(&taints, &Precondition::label("a")), Some(true));
        assert_eq!(solve_precondition(&taints, &Precondition::label("b")), Some(false));
    }

    fn source_match(id: u64, label: &str, bindings: MetavarBindings) -> SourceMatch {
        use crate::location::{FileId, SourceLocation};
        use crate::matches::BySideEffect;

        SourceMatch::new(
            pm(id),
            SourceLocation::new(FileId(0), 0, 1),
            bindings,
            crate::matches::SourceSpec {
                label: Label::new(label),
                precondition: Precondition::True,
                by_side_effect: BySideEffect::Yes,
                exact: false,
                control: false,
            },
        )
    }

    #[test]
    fn test_taints_of_pms_dedup() {
        let taint = singleton(Origin::Source {
            pm: pm(1),
            label: Label::new("a"),
            precondition: Precondition::True,
            call_trace: Vec::new(),
            bindings: MetavarBindings::new(),
        });
        let incoming: TaintSet = [taint].into_iter().collect();
        let fresh = taints_of_pms([&source_match(1, "a", MetavarBindings::new())], &incoming);
        assert!(fresh.is_empty());
    }

    #[test]
    fn test_merge_source_bindings_sink_biased_by_default() {
        let mut source_bindings = MetavarBindings::new();
        source_bindings.insert("X".into(), "tainted_value".into());
        let taints: TaintSet = [singleton(Origin::Source {
            pm: pm(2),
            label: Label::new("a"),
            precondition: Precondition::True,
            call_trace: Vec::new(),
            bindings: source_bindings,
        })]
        .into_iter()
        .collect();

        let mut sink_bindings = MetavarBindings::new();
        sink_bindings.insert("X".into(), "sink_value".into());
        sink_bindings.insert("Y".into(), "other".into());

        let merged = merge_source_bindings(&taints, &sink_bindings, false).unwrap();
        assert_eq!(merged.get("X"), Some(&"sink_value".to_string()));
        assert_eq!(merged.get("Y"), Some(&"other".to_string()));
    }

    #[test]
    fn test_merge_source_bindings_fails_unification_on_collision() {
        let mut source_bindings = MetavarBindings::new();
        source_bindings.insert("X".into(), "tainted_value".into());
        let taints: TaintSet = [singleton(Origin::Source {
            pm: pm(3),
            label: Label::new("a"),
            precondition: Precondition::True,
            call_trace: Vec::new(),
            bindings: source_bindings,
        })]
        .into_iter()
        .collect();

        let mut sink_bindings = MetavarBindings::new();
        sink_bindings.insert("X".into(), "sink_value".into());

        assert!(merge_source_bindings(&taints, &sink_bindings, true).is_none());
    }
}
