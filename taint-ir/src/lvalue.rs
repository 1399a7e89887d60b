//! L-values: addressable storage paths `base.off1.off2...`.
//!
//! Two flavors are needed (distilled spec §3 "Taint origin"):
//!
//! - [`Lvalue`]: a concrete IL l-value, rooted at a [`VariableName`] in the
//!   current function, used to address the [`crate::cfg::ir::LvalEnv`] (C3).
//! - [`SigLval`]: a *polymorphic* l-value used only inside `Var` taint
//!   origins, rooted at a [`VarBase`] (`Arg(i)`, `This`, or `Global(name)`)
//!   rather than a concrete variable — it stands for "whatever the caller
//!   passes through here" in a function's taint signature (§4.7).
//!
//! Grounded on `program_structure::ir::VariableName` (teacher keeps a plain
//! name + suffix + SSA version; our l-values add a field/index offset path
//! instead, since field sensitivity, not SSA versioning, is this engine's
//! concern).

use std::fmt;

/// The name of a root variable in the current function's l-value
/// environment. Two variables compare equal iff their names are equal —
/// scoping and shadowing are resolved upstream, by whatever gave us unique
/// names in the IL (out of scope here, as in the teacher's
/// `ensure_unique_variables` pass).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableName(String);

impl VariableName {
    pub fn new(name: impl Into<String>) -> VariableName {
        VariableName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S: Into<String>> From<S> for VariableName {
    fn from(name: S) -> VariableName {
        VariableName::new(name)
    }
}

impl fmt::Display for VariableName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single step in an l-value offset path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Offset {
    /// A named field, e.g. `.foo` or `["foo"]` with a constant string key.
    Field(String),
    /// A constant integer index, e.g. `[3]`.
    Index(i64),
    /// A computed or otherwise unknown index/key (`Oany` in the distilled
    /// spec) — field/index-inheritance is skipped for this offset kind (§7).
    Any,
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Offset::Field(name) => write!(f, ".{name}"),
            Offset::Index(i) => write!(f, "[{i}]"),
            Offset::Any => write!(f, "[*]"),
        }
    }
}

/// Upper bound on the offset path length of any `Var` taint (distilled spec
/// invariant 2). Chosen generously above any realistic field chain while
/// still guaranteeing `fix_poly_taint_with_field` terminates on loops like
/// `x = x.getX()`.
pub const MAX_POLY_OFFSET: usize = 8;

/// The root of a polymorphic (`Var`) taint origin: "whatever flows in
/// through this input", to be resolved at call sites that have a concrete
/// argument/receiver/global for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VarBase {
    /// A positional parameter, 0-indexed.
    Arg(usize),
    /// The receiver of a method call.
    This,
    /// A global variable, addressed by name.
    Global(String),
}

impl fmt::Display for VarBase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VarBase::Arg(i) => write!(f, "Arg({i})"),
            VarBase::This => write!(f, "this"),
            VarBase::Global(name) => write!(f, "Global({name})"),
        }
    }
}

/// A polymorphic l-value used inside a `Var` taint origin or a function
/// taint signature (§4.7).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SigLval {
    pub base: VarBase,
    pub offsets: Vec<Offset>,
}

impl SigLval {
    pub fn new(base: VarBase) -> SigLval {
        SigLval { base, offsets: Vec::new() }
    }

    pub fn with_offsets(base: VarBase, offsets: Vec<Offset>) -> SigLval {
        SigLval { base, offsets }
    }

    /// Extend this signature l-value by one offset, enforcing the
    /// termination guard from §4.5: the offset path must stay below
    /// `MAX_POLY_OFFSET`, and the same offset must not already occur in the
    /// path (this is what breaks `x = x.getX()` loops).
    pub fn extended(&self, offset: Offset) -> Option<SigLval> {
        if self.offsets.len() + 1 >= MAX_POLY_OFFSET || self.offsets.contains(&offset) {
            return None;
        }
        let mut offsets = self.offsets.clone();
        offsets.push(offset);
        Some(SigLval { base: self.base.clone(), offsets })
    }
}

impl fmt::Display for SigLval {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.base)?;
        for offset in &self.offsets {
            write!(f, "{offset}")?;
        }
        Ok(())
    }
}

/// A concrete IL l-value, rooted at a variable in the current function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Lvalue {
    pub base: VariableName,
    pub offsets: Vec<Offset>,
}

impl Lvalue {
    pub fn new(base: impl Into<VariableName>) -> Lvalue {
        Lvalue { base: base.into(), offsets: Vec::new() }
    }

    pub fn with_offsets(base: impl Into<VariableName>, offsets: Vec<Offset>) -> Lvalue {
        Lvalue { base: base.into(), offsets }
    }

    pub fn extended(&self, offset: Offset) -> Lvalue {
        let mut offsets = self.offsets.clone();
        offsets.push(offset);
        Lvalue { base: self.base.clone(), offsets }
    }

    /// Enumerate the bottom-up prefixes of this l-value: for `x.a.b` this
    /// yields `x`, `x.a`, `x.a.b`, in that order. The l-value checker (C5)
    /// walks these from shortest to longest (§4.5).
    pub fn prefixes(&self) -> Vec<Lvalue> {
        let mut result = Vec::with_capacity(self.offsets.len() + 1);
        let mut current = Lvalue::new(self.base.clone());
        result.push(current.clone());
        for offset in &self.offsets {
            current = current.extended(offset.clone());
            result.push(current.clone());
        }
        result
    }
}

impl fmt::Display for Lvalue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.base)?;
        for offset in &self.offsets {
            write!(f, "{offset}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes() {
        let lval = Lvalue::with_offsets("x", vec![Offset::Field("a".into()), Offset::Index(0)]);
        let prefixes = lval.prefixes();
        assert_eq!(prefixes.len(), 3);
        assert_eq!(prefixes[0], Lvalue::new("x"));
        assert_eq!(prefixes[1], Lvalue::with_offsets("x", vec![Offset::Field("a".into())]));
        assert_eq!(prefixes[2], lval);
    }

    #[test]
    fn test_sig_lval_bounded_extension() {
        let mut sig = SigLval::new(VarBase::Arg(0));
        for i in 0..MAX_POLY_OFFSET {
            match sig.extended(Offset::Field(format!("f{i}"))) {
                Some(next) => sig = next,
                None => break,
            }
        }
        assert!(sig.offsets.len() < MAX_POLY_OFFSET);
    }

    #[test]
    fn test_sig_lval_rejects_repeated_offset() {
        let sig = SigLval::with_offsets(VarBase::This, vec![Offset::Field("x".into())]);
        assert!(sig.extended(Offset::Field("x".into())).is_none());
    }
}
