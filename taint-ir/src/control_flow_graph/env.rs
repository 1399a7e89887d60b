//! The l-value environment (C3): the fixpoint's per-node abstract state.
//!
//! No analogue exists in the teacher, whose per-pass state
//! (`TaintAnalysis::taint_map`) is a flat `HashMap<VariableName,
//! HashSet<VariableName>>` with no shape, control-taint, or propagator
//! bookkeeping. This module generalizes that shape to the four-part state
//! required by §3 `LvalEnv`, following the same "plain struct + free
//! functions that read/return it" style as `TaintAnalysis`'s own
//! `add_taint_step`/`single_step_taint`.

use std::collections::{HashMap, HashSet};

use crate::lvalue::{Lvalue, Offset, VariableName};
use crate::matches::PropId;
use crate::shape::{Cell, Shape, XTaint};
use crate::taint::{self, TaintSet};

/// The per-program-point abstract state: field-sensitive taint per root
/// variable, the current control-taint, and propagator bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LvalEnv {
    tainted: HashMap<VariableName, Cell>,
    control: TaintSet,
    pending: HashMap<PropId, HashSet<Lvalue>>,
    propagated: HashMap<PropId, TaintSet>,
}

impl LvalEnv {
    pub fn empty() -> LvalEnv {
        LvalEnv::default()
    }

    /// Monotone join: cells join pointwise (structural offsets union, see
    /// [`Cell::join`]); pending/propagated join by pointwise set/taint
    /// union (§4.3).
    pub fn union(a: &LvalEnv, b: &LvalEnv) -> LvalEnv {
        let mut tainted = a.tainted.clone();
        for (name, cell) in &b.tainted {
            tainted.entry(name.clone()).and_modify(|existing| *existing = existing.join(cell)).or_insert_with(|| cell.clone());
        }
        let mut pending = a.pending.clone();
        for (prop, lvals) in &b.pending {
            pending.entry(prop.clone()).or_default().extend(lvals.iter().cloned());
        }
        let mut propagated = a.propagated.clone();
        for (prop, taints) in &b.propagated {
            propagated.entry(prop.clone()).and_modify(|existing| *existing = taint::union(existing, taints)).or_insert_with(|| taints.clone());
        }
        LvalEnv { tainted, control: taint::union(&a.control, &b.control), pending, propagated }
    }

    /// Whether `a` and `b` are equal as abstract states — used by the
    /// fixpoint loop to detect convergence (§4.8).
    pub fn equal(a: &LvalEnv, b: &LvalEnv) -> bool {
        a == b
    }

    /// Equality restricted to the cell rooted at `lval`'s base variable —
    /// used at function exit to decide whether a single parameter gained
    /// new taint (§4.8 side-effect summary).
    pub fn equal_by_lval(a: &LvalEnv, b: &LvalEnv, lval: &Lvalue) -> bool {
        a.tainted.get(&lval.base) == b.tainted.get(&lval.base)
    }

    /// Exact lookup: no polymorphic-offset inheritance (that is
    /// `fix_poly_taint_with_field`'s job, in the checker).
    pub fn find_lval(&self, lval: &Lvalue) -> Option<&Cell> {
        let root = self.tainted.get(&lval.base)?;
        find_at_offsets(root, &lval.offsets)
    }

    /// Union `taints` into the cell at `lval`, creating intermediate `Obj`
    /// cells along the path if it doesn't exist yet (§4.3 `add`).
    pub fn add(&mut self, lval: &Lvalue, taints: &TaintSet) {
        self.add_shape(lval, taints, Shape::Bot)
    }

    /// As `add`, but also installs/merges `shape` at the target cell.
    pub fn add_shape(&mut self, lval: &Lvalue, taints: &TaintSet, shape: Shape) {
        if taints.is_empty() && matches!(shape, Shape::Bot) {
            self.tainted.entry(lval.base.clone()).or_default();
            return;
        }
        let root = self.tainted.entry(lval.base.clone()).or_default();
        set_at_offsets(root, &lval.offsets, taints, shape);
    }

    /// Mark `xtaint := Clean` at `lval`; the subtree below it is dropped
    /// (§4.3 `clean`).
    pub fn clean(&mut self, lval: &Lvalue) {
        if lval.offsets.is_empty() {
            self.tainted.insert(lval.base.clone(), Cell::new(XTaint::Clean, Shape::Bot));
            return;
        }
        let root = self.tainted.entry(lval.base.clone()).or_default();
        set_clean_at_offsets(root, &lval.offsets);
    }

    pub fn get_control_taints(&self) -> &TaintSet {
        &self.control
    }

    pub fn add_control_taints(&mut self, taints: &TaintSet) {
        self.control = taint::union(&self.control, taints);
    }

    /// Deposit `taints` for propagator `prop`'s destinations (§4.3
    /// `propagate_to`).
    pub fn propagate_to(&mut self, prop: &PropId, taints: &TaintSet) {
        self.propagated.entry(prop.clone()).and_modify(|existing| *existing = taint::union(existing, taints)).or_insert_with(|| taints.clone());
    }

    /// Consume and return the taints deposited for `prop`, if any
    /// (§4.3 `propagate_from`).
    pub fn propagate_from(&mut self, prop: &PropId) -> Option<TaintSet> {
        self.propagated.remove(prop)
    }

    /// Enqueue `lval` as a destination awaiting a later propagator source
    /// for `prop` (§4.3 `pending_propagation`).
    pub fn pending_propagation(&mut self, prop: &PropId, lval: Lvalue) {
        self.pending.entry(prop.clone()).or_default().insert(lval);
    }

    pub fn pending_for(&self, prop: &PropId) -> Option<&HashSet<Lvalue>> {
        self.pending.get(prop)
    }

    /// Enumerate every root variable and its cell (§4.3 `seq_of_tainted`).
    pub fn seq_of_tainted(&self) -> impl Iterator<Item = (&VariableName, &Cell)> {
        self.tainted.iter()
    }
}

fn find_at_offsets<'a>(cell: &'a Cell, offsets: &[Offset]) -> Option<&'a Cell> {
    match offsets.split_first() {
        None => Some(cell),
        Some((first, rest)) => {
            if let Shape::Obj(fields) = &cell.shape {
                find_at_offsets(fields.get(first)?, rest)
            } else {
                None
            }
        }
    }
}

fn set_at_offsets(cell: &mut Cell, offsets: &[Offset], taints: &TaintSet, shape: Shape) {
    match offsets.split_first() {
        None => {
            cell.xtaint = cell.xtaint.join(&XTaint::Tainted(taints.clone()));
            cell.shape = cell.shape.join(&shape);
        }
        Some((first, rest)) => {
            if !matches!(cell.shape, Shape::Obj(_)) {
                cell.shape = Shape::empty_obj();
            }
            if let Shape::Obj(fields) = &mut cell.shape {
                let child = fields.entry(first.clone()).or_default();
                set_at_offsets(child, rest, taints, shape);
            }
        }
    }
}

fn set_clean_at_offsets(cell: &mut Cell, offsets: &[Offset]) {
    match offsets.split_first() {
        None => {
            cell.xtaint = XTaint::Clean;
            cell.shape = Shape::Bot;
        }
        Some((first, rest)) => {
            if !matches!(cell.shape, Shape::Obj(_)) {
                cell.shape = Shape::empty_obj();
            }
            if let Shape::Obj(fields) = &mut cell.shape {
                let child = fields.entry(first.clone()).or_default();
                set_clean_at_offsets(child, rest);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taint::{singleton, Origin};

    fn lval(name: &str) -> Lvalue {
        Lvalue::new(name)
    }

    #[test]
    fn test_add_then_find() {
        let mut env = LvalEnv::empty();
        let taints: TaintSet = [singleton(Origin::Control)].into_iter().collect();
        env.add(&lval("x"), &taints);
        assert_eq!(env.find_lval(&lval("x")).unwrap().xtaint.taints(), taints);
    }

    #[test]
    fn test_clean_drops_subtree() {
        let mut env = LvalEnv::empty();
        let taints: TaintSet = [singleton(Origin::Control)].into_iter().collect();
        env.add(&lval("x").extended(Offset::Field("a".into())), &taints);
        env.clean(&lval("x"));
        assert_eq!(env.find_lval(&lval("x")).unwrap().xtaint, XTaint::Clean);
        assert!(env.find_lval(&lval("x").extended(Offset::Field("a".into()))).is_none());
    }

    #[test]
    fn test_union_is_commutative_on_control() {
        let mut a = LvalEnv::empty();
        a.add_control_taints(&[singleton(Origin::Control)].into_iter().collect());
        let b = LvalEnv::empty();
        let joined = LvalEnv::union(&a, &b);
        assert_eq!(joined.get_control_taints(), a.get_control_taints());
    }

    #[test]
    fn test_propagate_to_then_from() {
        let mut env = LvalEnv::empty();
        let prop = PropId("p".into());
        let taints: TaintSet = [singleton(Origin::Control)].into_iter().collect();
        env.propagate_to(&prop, &taints);
        assert_eq!(env.propagate_from(&prop), Some(taints));
        assert_eq!(env.propagate_from(&prop), None);
    }
}
