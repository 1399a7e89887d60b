//! Field-sensitive shape model (C2): tracks taint not just on a variable as
//! a whole but on its individual fields/indices, so that `x.secret = tainted`
//! does not force `x.public` to read as tainted too.
//!
//! The teacher has no analogue — `program_structure::ir` signals are scalar
//! field elements with no compound structure. Shaped after the nested-map
//! `TaintState`-per-path style used by `InterproceduralTaintTracker` in
//! `other_examples/3e4476b4_c2j-astgrep...cr-dataflow-src-interprocedural.rs`,
//! adapted to a recursive `Offset -> Cell` tree rather than a flat path map,
//! since the l-value checker's prefix walk (`Checker::check_lval`) needs the
//! tree structure one offset at a time, joining parent and child cells as it
//! goes.

use std::collections::BTreeMap;

use crate::lvalue::Offset;
use crate::taint::{self, TaintSet};

/// The taint state of a single storage cell, independent of its sub-shape.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum XTaint {
    /// Nothing is known yet (the cell has not been initialized in this
    /// environment on this path).
    #[default]
    None,
    /// Known to be clean.
    Clean,
    /// Tainted by the accumulated taint set.
    Tainted(TaintSet),
    /// Explicitly sanitized: taint was present and a sanitizer match
    /// removed it. Distinct from `Clean` so a later join with a tainted
    /// branch does not silently re-taint it (§4.3 sanitizer domination).
    Sanitized,
}

impl XTaint {
    pub fn is_tainted(&self) -> bool {
        matches!(self, XTaint::Tainted(_))
    }

    pub fn taints(&self) -> TaintSet {
        match self {
            XTaint::Tainted(taints) => taints.clone(),
            _ => TaintSet::new(),
        }
    }

    /// Monotone join of two `XTaint` values along the same program path,
    /// e.g. when merging branches at a control-flow join point.
    /// `Sanitized` only yields to a join with `Tainted` if the other branch
    /// carries taint the sanitizer never saw; in that case the result stays
    /// tainted with just the new taints, since re-introducing the taints the
    /// sanitizer already cleared would defeat it.
    pub fn join(&self, other: &XTaint) -> XTaint {
        match (self, other) {
            (XTaint::None, other) => other.clone(),
            (this, XTaint::None) => this.clone(),
            (XTaint::Sanitized, XTaint::Sanitized) => XTaint::Sanitized,
            (XTaint::Sanitized, XTaint::Clean) | (XTaint::Clean, XTaint::Sanitized) => XTaint::Sanitized,
            (XTaint::Sanitized, XTaint::Tainted(taints)) | (XTaint::Tainted(taints), XTaint::Sanitized) => {
                XTaint::Tainted(taints.clone())
            }
            (XTaint::Clean, XTaint::Clean) => XTaint::Clean,
            (XTaint::Clean, XTaint::Tainted(taints)) | (XTaint::Tainted(taints), XTaint::Clean) => {
                XTaint::Tainted(taints.clone())
            }
            (XTaint::Tainted(a), XTaint::Tainted(b)) => XTaint::Tainted(taint::union(a, b)),
        }
    }
}

/// One node in a compound value's field tree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cell {
    pub xtaint: XTaint,
    pub shape: Shape,
}

impl Cell {
    pub fn new(xtaint: XTaint, shape: Shape) -> Cell {
        Cell { xtaint, shape }
    }

    pub fn join(&self, other: &Cell) -> Cell {
        Cell { xtaint: self.xtaint.join(&other.xtaint), shape: self.shape.join(&other.shape) }
    }
}

/// The shape of a value: either unstructured (`Bot`, a plain scalar or an
/// object we have no field-level knowledge of) or a known set of fields,
/// each with its own [`Cell`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Shape {
    #[default]
    Bot,
    Obj(BTreeMap<Offset, Cell>),
}

impl Shape {
    pub fn empty_obj() -> Shape {
        Shape::Obj(BTreeMap::new())
    }

    pub fn get(&self, offset: &Offset) -> Option<&Cell> {
        match self {
            Shape::Obj(fields) => fields.get(offset),
            Shape::Bot => None,
        }
    }

    /// Set the cell at `offset`, upgrading `Bot` to `Obj` first if needed.
    pub fn set(&mut self, offset: Offset, cell: Cell) {
        if matches!(self, Shape::Bot) {
            *self = Shape::empty_obj();
        }
        if let Shape::Obj(fields) = self {
            fields.insert(offset, cell);
        }
    }

    pub fn join(&self, other: &Shape) -> Shape {
        match (self, other) {
            (Shape::Bot, Shape::Bot) => Shape::Bot,
            (Shape::Bot, Shape::Obj(fields)) | (Shape::Obj(fields), Shape::Bot) => Shape::Obj(fields.clone()),
            (Shape::Obj(a), Shape::Obj(b)) => {
                let mut joined = a.clone();
                for (offset, cell) in b {
                    joined
                        .entry(offset.clone())
                        .and_modify(|existing| *existing = existing.join(cell))
                        .or_insert_with(|| cell.clone());
                }
                Shape::Obj(joined)
            }
        }
    }
}

/// Build the shape for a tuple/array literal with `len` positional elements,
/// each starting with the given per-element taint (§4.2, object/array
/// literal construction): `[a, b, c]` becomes offsets `0, 1, 2`.
pub fn tuple_like_obj(elements: impl IntoIterator<Item = XTaint>) -> Shape {
    let mut fields = BTreeMap::new();
    for (i, xtaint) in elements.into_iter().enumerate() {
        fields.insert(Offset::Index(i as i64), Cell::new(xtaint, Shape::Bot));
    }
    Shape::Obj(fields)
}

/// Walk a sequence of offsets from `shape`'s root, one hop at a time,
/// returning the cell at the end of the path, or `None` as soon as one
/// offset has no matching field. Generalizes [`Shape::get`] (a single hop)
/// to an arbitrary offset path — used by signature instantiation's `SigLval`
/// offset walk (§4.7), which needs to follow a possibly multi-field path
/// into an argument's shape in one call rather than re-deriving the
/// intermediate cells by hand at each call site.
pub fn find_in_shape<'a>(shape: &'a Shape, offsets: &[Offset]) -> Option<&'a Cell> {
    let mut current = shape;
    let mut cell = None;
    for offset in offsets {
        let found = current.get(offset)?;
        cell = Some(found);
        current = &found.shape;
    }
    cell
}

/// Collect every taint token reachable anywhere inside `shape`, recursively.
/// Used when a whole compound value is consumed at once (e.g. passed to a
/// sink that doesn't name a specific field) and every field's taint must be
/// considered (§4.2).
pub fn gather_all_taints_in_shape(shape: &Shape) -> TaintSet {
    let mut result = TaintSet::new();
    if let Shape::Obj(fields) = shape {
        for cell in fields.values() {
            result = taint::union(&result, &cell.xtaint.taints());
            result = taint::union(&result, &gather_all_taints_in_shape(&cell.shape));
        }
    }
    result
}

/// Whether a reference (an alias introduced by e.g. a `&`-like enter node)
/// should be treated as pointing into an already-known shape, as opposed to
/// an opaque target that forces the conservative `Bot` fallback.
pub fn enum_in_ref(shape: &Shape) -> bool {
    matches!(shape, Shape::Obj(_))
}

/// Whether either the taint or the shape carries information worth
/// preserving in the environment — an all-`None`/`Bot` cell can be dropped
/// entirely rather than stored, keeping the environment map small (§4.3).
pub fn taints_and_shape_are_relevant(xtaint: &XTaint, shape: &Shape) -> bool {
    !matches!(xtaint, XTaint::None) || !matches!(shape, Shape::Bot)
}

/// Wrap a taint set as an `XTaint`, for callers (C6, C7) that only have a
/// `TaintSet` on hand but need to ask [`taints_and_shape_are_relevant`].
pub fn xtaint_of_taints(taints: &TaintSet) -> XTaint {
    if taints.is_empty() {
        XTaint::None
    } else {
        XTaint::Tainted(taints.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taint::{singleton, Origin};

    #[test]
    fn test_tuple_like_obj_and_get() {
        let taint = singleton(Origin::Control);
        let tainted: TaintSet = [taint].into_iter().collect();
        let shape = tuple_like_obj([XTaint::Clean, XTaint::Tainted(tainted.clone())]);
        let cell = shape.get(&Offset::Index(1)).expect("cell at index 1");
        assert_eq!(cell.xtaint, XTaint::Tainted(tainted));
        assert!(shape.get(&Offset::Index(5)).is_none());
    }

    #[test]
    fn test_find_in_shape_walks_nested_offsets() {
        let taint = singleton(Origin::Control);
        let tainted: TaintSet = [taint].into_iter().collect();
        let mut inner = Shape::empty_obj();
        inner.set(Offset::Field("b".into()), Cell::new(XTaint::Tainted(tainted.clone()), Shape::Bot));
        let mut outer = Shape::empty_obj();
        outer.set(Offset::Field("a".into()), Cell::new(XTaint::None, inner));

        let cell = find_in_shape(&outer, &[Offset::Field("a".into()), Offset::Field("b".into())]).expect("nested cell");
        assert_eq!(cell.xtaint, XTaint::Tainted(tainted));
        assert!(find_in_shape(&outer, &[Offset::Field("a".into()), Offset::Field("missing".into())]).is_none());
        assert!(find_in_shape(&outer, &[]).is_none());
    }

    #[test]
    fn test_gather_all_taints_in_shape_recurses() {
        let taint = singleton(Origin::Control);
        let tainted: TaintSet = [taint].into_iter().collect();
        let mut inner = Shape::empty_obj();
        inner.set(Offset::Field("b".into()), Cell::new(XTaint::Tainted(tainted.clone()), Shape::Bot));
        let mut outer = Shape::empty_obj();
        outer.set(Offset::Field("a".into()), Cell::new(XTaint::None, inner));
        assert_eq!(gather_all_taints_in_shape(&outer), tainted);
    }

    #[test]
    fn test_sanitized_join_keeps_new_taint_only() {
        let taint = singleton(Origin::Control);
        let tainted: TaintSet = [taint].into_iter().collect();
        let joined = XTaint::Sanitized.join(&XTaint::Tainted(tainted.clone()));
        assert_eq!(joined, XTaint::Tainted(tainted));
    }

    #[test]
    fn test_taints_and_shape_are_relevant() {
        assert!(!taints_and_shape_are_relevant(&XTaint::None, &Shape::Bot));
        assert!(taints_and_shape_are_relevant(&XTaint::Clean, &Shape::Bot));
    }
}
