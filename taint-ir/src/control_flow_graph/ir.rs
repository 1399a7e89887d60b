//! The minimal intermediate language the engine consumes.
//!
//! Lowering source code to this IL, and building the [`super::cfg::Cfg`]
//! from it, are collaborator responsibilities (§1 Out of scope) — this
//! module only defines the shapes the checker (C5) and instruction handler
//! (C6) pattern-match on. Grounded on the statement/expression split in
//! `program_structure::ir` (the teacher's own `ir::Statement`/`ir::Expression`,
//! read off `crate::ir::ir::{Meta, Statement}` in the original
//! `basic_block.rs`), trimmed of circom-specific node kinds (signal
//! declarations, constraint equality, template/component instantiation) and
//! extended with the call/method/object-literal shapes a general-purpose
//! taint engine needs (§4.6).

use std::fmt;

use crate::location::SourceLocation;
use crate::lvalue::Lvalue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn is_comparison(&self) -> bool {
        matches!(self, BinOp::Eq | BinOp::Neq | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge)
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, BinOp::And | BinOp::Or) || self.is_comparison()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Not,
    Neg,
}

/// A callee expression: a plain name, a method invoked on a receiver
/// (carries its own object taint, per §4.6), or an arbitrary computed
/// expression (a call through a value, e.g. a function pointer/lambda).
#[derive(Debug, Clone)]
pub enum Callee {
    Named(String),
    Method { receiver: Box<Expression>, name: String },
    Expr(Box<Expression>),
}

impl Callee {
    pub fn name(&self) -> Option<&str> {
        match self {
            Callee::Named(name) => Some(name),
            Callee::Method { name, .. } => Some(name),
            Callee::Expr(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Expression {
    Lvalue(Lvalue),
    /// A literal value (number, string, boolean, ...). The engine does not
    /// care which; only that it introduces no taint of its own.
    Literal,
    Binary { op: BinOp, lhs: Box<Expression>, rhs: Box<Expression>, range: SourceLocation },
    Unary { op: UnOp, operand: Box<Expression>, range: SourceLocation },
    /// An object/array/tuple literal: `[a, b, c]` or `{x: a, y: b}`.
    Tuple { elements: Vec<Expression>, range: SourceLocation },
    /// A call appearing in expression position (its result is consumed by
    /// an enclosing expression, as opposed to a statement-level
    /// [`Instruction::Call`]).
    Call { callee: Callee, args: Vec<Expression>, range: SourceLocation },
}

impl Expression {
    pub fn range(&self) -> Option<SourceLocation> {
        match self {
            Expression::Lvalue(_) | Expression::Literal => None,
            Expression::Binary { range, .. }
            | Expression::Unary { range, .. }
            | Expression::Tuple { range, .. }
            | Expression::Call { range, .. } => Some(*range),
        }
    }
}

/// One statement-level effect within a basic block (§4.6).
#[derive(Debug, Clone)]
pub enum Instruction {
    Assign { lvalue: Lvalue, rhs: Expression, range: SourceLocation },
    Call { result: Option<Lvalue>, callee: Callee, args: Vec<Expression>, range: SourceLocation },
    New { result: Option<Lvalue>, ty: String, ctor: Option<Callee>, args: Vec<Expression>, range: SourceLocation },
    /// A call whose result is discarded and whose callee is not considered
    /// for interprocedural summary lookup — conservatively treated as
    /// unioning argument taints with no sink check beyond the range.
    CallSpecial { args: Vec<Expression>, range: SourceLocation },
    /// A placeholder for an IL node the lowering pass could not translate.
    /// Handled conservatively: no taint flows, nothing is checked.
    FixmeInstr { range: SourceLocation },
    /// A function literal assigned to an l-value: opaque to the engine, so
    /// it carries no taint (§4.6 `AssignAnon`).
    AssignAnon { lvalue: Lvalue, range: SourceLocation },
}

impl Instruction {
    pub fn range(&self) -> SourceLocation {
        match self {
            Instruction::Assign { range, .. }
            | Instruction::Call { range, .. }
            | Instruction::New { range, .. }
            | Instruction::CallSpecial { range, .. }
            | Instruction::FixmeInstr { range }
            | Instruction::AssignAnon { range, .. } => *range,
        }
    }
}

/// How a basic block ends, determining which C7 transfer case applies.
/// `Join`/`Exit`/`Other` carry no expression and pass their IN env through
/// unchanged; the remaining variants may themselves evaluate an expression
/// and can therefore emit sink findings (§4.8).
#[derive(Debug, Clone)]
pub enum Terminator {
    /// Falls through unconditionally to the next block.
    Goto(usize),
    Cond { expr: Expression, range: SourceLocation, if_true: usize, if_false: Option<usize> },
    Throw { expr: Expression, range: SourceLocation, target: Option<usize> },
    Return { value: Option<Expression>, location: SourceLocation },
    /// A control-flow join point with no condition of its own.
    Join,
    /// The function's single exit block.
    Exit,
    /// Anything else that neither evaluates nor branches meaningfully.
    Other,
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Terminator::Goto(target) => write!(f, "goto {target}"),
            Terminator::Cond { if_true, if_false, .. } => write!(f, "if ... {if_true} else {if_false:?}"),
            Terminator::Throw { .. } => write!(f, "throw ..."),
            Terminator::Return { .. } => write!(f, "return ..."),
            Terminator::Join => write!(f, "join"),
            Terminator::Exit => write!(f, "exit"),
            Terminator::Other => write!(f, "other"),
        }
    }
}
