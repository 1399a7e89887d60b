//! Interprocedural taint dataflow engine.
//!
//! Where the teacher's [`get_analysis_passes`] collects a battery of
//! independent intraprocedural lints run once each over a `Cfg`, this crate
//! is a single interprocedural pass: [`fixpoint`] drives one function's
//! [`taint_ir::cfg::Cfg`] to a monotone fixpoint, dispatching through the
//! expression/l-value checker (C5, [`checker`]) and instruction handler
//! (C6, [`instr`]) at every node, and reports findings through
//! `Config::handle_results` as it goes.

pub mod checker;
pub mod errors;
pub mod fixpoint;
pub mod instr;

pub use fixpoint::{fixpoint, FixpointResult, NodeEnvs};
