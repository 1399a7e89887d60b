//! User-defined taint labels and the boolean precondition formulas attached
//! to sources and required by sinks.
//!
//! Not present in the teacher (`circomspect` signals are untyped field
//! elements with no label system). Grounded on the label/requires language
//! described in the distilled spec §3–§4.1 and shaped after the
//! `SourceType`/`SanitizerType` taxonomies in
//! `other_examples/18d9e59d_mattepiu-drift...graph-taint-types.rs`, but kept
//! open (user-defined names) rather than a fixed enum, since sources in this
//! engine are pattern-match driven rather than a closed CWE taxonomy.

use std::collections::HashSet;
use std::fmt;

/// A user-defined taint label, e.g. `"tainted"`, `"user-controlled"`.
/// The default label used when a source spec does not name one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(String);

pub const DEFAULT_LABEL: &str = "source";

impl Label {
    pub fn new(name: impl Into<String>) -> Label {
        Label(name.into())
    }

    pub fn default_label() -> Label {
        Label::new(DEFAULT_LABEL)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S: Into<String>> From<S> for Label {
    fn from(name: S) -> Label {
        Label::new(name)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type LabelSet = HashSet<Label>;

/// A boolean formula over labels, attached to a taint (from a source's
/// `requires`) or demanded by a sink (its `requires`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    True,
    False,
    Label(Label),
    And(Box<Precondition>, Box<Precondition>),
    Or(Box<Precondition>, Box<Precondition>),
    Not(Box<Precondition>),
}

impl Precondition {
    pub fn label(label: impl Into<Label>) -> Precondition {
        Precondition::Label(label.into())
    }

    pub fn and(self, other: Precondition) -> Precondition {
        Precondition::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Precondition) -> Precondition {
        Precondition::Or(Box::new(self), Box::new(other))
    }

    pub fn not(self) -> Precondition {
        Precondition::Not(Box::new(self))
    }

    /// Evaluate the formula against a closed-world label set: every label is
    /// assumed either present or absent, nothing is left undecided. Used once
    /// a taint's label contribution is fully known (no more `Var` origins to
    /// resolve against it).
    pub fn eval_closed(&self, labels: &LabelSet) -> bool {
        use Precondition::*;
        match self {
            True => true,
            False => false,
            Label(label) => labels.contains(label),
            And(lhs, rhs) => lhs.eval_closed(labels) && rhs.eval_closed(labels),
            Or(lhs, rhs) => lhs.eval_closed(labels) || rhs.eval_closed(labels),
            Not(inner) => !inner.eval_closed(labels),
        }
    }

    /// Substitute taints coming from a polymorphic `Var` position: conjoin
    /// the substituted formula with the concrete taints' own preconditions at
    /// the call site, per §4.7. Returns `None` if the resulting formula
    /// collapses to `false` (the substitution is dead).
    pub fn conjoin(self, other: Precondition) -> Option<Precondition> {
        if matches!(self, Precondition::False) || matches!(other, Precondition::False) {
            None
        } else {
            Some(self.and(other))
        }
    }
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Precondition::*;
        match self {
            True => write!(f, "true"),
            False => write!(f, "false"),
            Label(label) => write!(f, "{label}"),
            And(lhs, rhs) => write!(f, "({lhs} and {rhs})"),
            Or(lhs, rhs) => write!(f, "({lhs} or {rhs})"),
            Not(inner) => write!(f, "not {inner}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_closed() {
        let labels: LabelSet = ["a".into()].into_iter().collect();
        let requires = Precondition::label("a").and(Precondition::label("b"));
        assert!(!requires.eval_closed(&labels));

        let labels: LabelSet = ["a".into(), "b".into()].into_iter().collect();
        assert!(requires.eval_closed(&labels));
    }

    #[test]
    fn test_or_not() {
        let labels: LabelSet = ["a".into()].into_iter().collect();
        let requires = Precondition::label("a").or(Precondition::label("b"));
        assert!(requires.eval_closed(&labels));
        assert!(Precondition::label("b").not().eval_closed(&labels));
    }
}
