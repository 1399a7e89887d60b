//! Instruction / call handler (C6).
//!
//! Grounded on the `Statement`-kind `match` in
//! `program_analysis::taint_analysis::run_taint_analysis`, which dispatches
//! on `Substitution`/`Declaration`/`IfThenElse`/... and records taint
//! steps per kind. This module generalizes that dispatch to the five
//! instruction kinds in §4.6, delegating expression evaluation to
//! [`crate::checker::Checker`] rather than recording raw variable pairs.

use log::{trace, warn};

use taint_ir::cfg::ir::Instruction;
use taint_ir::shape::{taints_and_shape_are_relevant, xtaint_of_taints, Shape};
use taint_ir::taint::{self, TaintSet};
use taint_ir::LvalEnv;

use crate::checker::Checker;

/// Run one instruction against `env`, returning the updated environment.
pub fn handle_instruction(checker: &mut Checker, env: LvalEnv, instr: &Instruction) -> LvalEnv {
    trace!("handling instruction at {}", instr.range());
    match instr {
        Instruction::Assign { lvalue, rhs, range } => {
            let before = env.find_lval(lvalue).cloned();
            let (taints, shape, mut env) = checker.check_expr(env, rhs, *range);
            let after = env.find_lval(lvalue).cloned();
            if !taints_and_shape_are_relevant(&xtaint_of_taints(&taints), &shape) && before == after {
                env.clean(lvalue);
            } else {
                env.add_shape(lvalue, &taints, shape);
            }
            env
        }
        Instruction::Call { result, callee, args, range } => {
            let (taints, shape, mut env) = checker.check_call(env, callee, args, *range);
            if let Some(result) = result {
                env.add_shape(result, &taints, shape);
            }
            env
        }
        Instruction::New { result, ctor: Some(ctor), args, range, .. } => {
            let (taints, shape, mut env) = checker.check_call(env, ctor, args, *range);
            if let Some(result) = result {
                env.add_shape(result, &taints, shape);
            }
            env
        }
        Instruction::New { result, args, range, .. } => {
            // No constructor: conservative sink-less consumer (§4.6).
            let mut env = env;
            let mut taints = TaintSet::new();
            for arg in args {
                let (arg_taints, arg_shape, next_env) = checker.check_expr(env, arg, *range);
                env = next_env;
                taints = taint::union(&taints, &arg_taints);
                taints = taint::union(&taints, &taint_ir::shape::gather_all_taints_in_shape(&arg_shape));
            }
            if let Some(result) = result {
                env.add_shape(result, &taints, Shape::Bot);
            }
            env
        }
        Instruction::CallSpecial { args, range } => {
            let mut env = env;
            let mut taints = TaintSet::new();
            for arg in args {
                let (arg_taints, arg_shape, next_env) = checker.check_expr(env, arg, *range);
                env = next_env;
                taints = taint::union(&taints, &arg_taints);
                taints = taint::union(&taints, &taint_ir::shape::gather_all_taints_in_shape(&arg_shape));
            }
            env
        }
        Instruction::FixmeInstr { range } => {
            warn!("encountered an untranslated IL node at {range}; treating conservatively as a no-op");
            env
        }
        Instruction::AssignAnon { lvalue, .. } => {
            let mut env = env;
            env.clean(lvalue);
            env
        }
    }
}
