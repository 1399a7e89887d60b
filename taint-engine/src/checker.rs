//! Expression & l-value checker (C5).
//!
//! No direct analogue in the teacher — `TaintAnalysis::run_taint_analysis`
//! (grounding for this crate's overall shape) walks statements with a flat
//! `match stmt { ... }` over `ir::Statement` and records `(source, sink)`
//! variable pairs directly, with no recursive expression evaluation, shape
//! tracking, or pattern-match oracle. This module generalizes that single
//! `match` into the mutually-recursive `check_expr`/`check_lval` pair the
//! spec requires, keeping the teacher's `trace!`-per-node logging style.

use std::collections::HashSet;

use log::{trace, warn};

use taint_ir::cfg::ir::{BinOp, Callee, Expression, UnOp};
use taint_ir::config::{Config, FunctionSignature};
use taint_ir::label::Precondition;
use taint_ir::location::SourceLocation;
use taint_ir::lvalue::{Lvalue, Offset, SigLval, VarBase, MAX_POLY_OFFSET};
use taint_ir::matches::{BySideEffect, PatternMatchId, PropagatorDirection, SinkMatch};
use taint_ir::results::AnalysisResult;
use taint_ir::shape::{find_in_shape, gather_all_taints_in_shape, tuple_like_obj, Shape, XTaint};
use taint_ir::taint::{self, CallFrame, Origin, TaintSet, TaintToken};
use taint_ir::{LvalEnv, Options};

/// Bundles the config (oracle + hooks + result sink) and options together
/// for the duration of one `fixpoint` run. Holds `&mut Config` so
/// `handle_results` (an `FnMut`) can be invoked while checking.
pub struct Checker<'a> {
    pub config: &'a mut Config,
    pub options: Options,
}

impl<'a> Checker<'a> {
    pub fn new(config: &'a mut Config, options: Options) -> Checker<'a> {
        Checker { config, options }
    }

    /// `check_expr(env, expr) -> (T, Shape, env')` (§4.5). `enclosing` is the
    /// nearest ancestor range, used when `expr` carries no range of its own
    /// (a bare [`Expression::Lvalue`] or [`Expression::Literal`]).
    pub fn check_expr(&mut self, env: LvalEnv, expr: &Expression, enclosing: SourceLocation) -> (TaintSet, Shape, LvalEnv) {
        self.check_expr_impl(env, expr, enclosing, true)
    }

    /// As [`Self::check_expr`], but skips this call's own Step 5 sink check.
    /// Used for call/method-call sub-expressions (receiver, arguments):
    /// [`Self::check_call`] runs its own consolidated sink check over all of
    /// them afterward at the call's range, so a bare [`Expression::Lvalue`]
    /// or [`Expression::Literal`] argument — which has no range of its own
    /// and so falls back to that same call range as `enclosing` — would
    /// otherwise be checked against the same sink matches twice.
    fn check_expr_as_call_operand(&mut self, env: LvalEnv, expr: &Expression, enclosing: SourceLocation) -> (TaintSet, Shape, LvalEnv) {
        self.check_expr_impl(env, expr, enclosing, false)
    }

    fn check_expr_impl(&mut self, env: LvalEnv, expr: &Expression, enclosing: SourceLocation, check_own_sinks: bool) -> (TaintSet, Shape, LvalEnv) {
        let range = expr.range().unwrap_or(enclosing);
        trace!("checking expression at {range}");

        // Step 1: best sanitizer.
        let pms = (self.config.oracle)(range);
        if !pms.sanitizers.is_empty() {
            trace!("expression at {range} matches a sanitizer, taint cleared");
            return (TaintSet::new(), Shape::Bot, env);
        }

        // Step 2: taints from subexpressions.
        let (mut taints, shape, mut env) = self.check_subexpressions(env, expr, range);

        // Step 3: best sources.
        for source in &pms.sources {
            let fresh = taint::taints_of_pms([source], &taints);
            if !fresh.is_empty() && !matches!(source.spec.by_side_effect, BySideEffect::No) {
                if let Expression::Lvalue(lval) = expr {
                    env.add(lval, &fresh);
                }
            }
            taints = taint::union(&taints, &fresh);
        }

        // Step 4: propagators.
        env = self.apply_propagators(&pms.propagators, expr_as_lvalue(expr), &mut taints, env, range);

        // Step 5: best sinks.
        if check_own_sinks {
            self.check_sinks(&pms.sinks, &taints, &shape, &env, &mut HashSet::new());
        }

        // Step 6: type-based drop.
        if self.drops_data_taint(expr) {
            trace!("dropping data taint from typed-boolean/comparison expression at {range}");
            taints = TaintSet::new();
        }

        (taints, shape, env)
    }

    fn check_subexpressions(&mut self, env: LvalEnv, expr: &Expression, range: SourceLocation) -> (TaintSet, Shape, LvalEnv) {
        match expr {
            Expression::Lvalue(lval) => {
                let (taints, shape, _subtaint_of_base, env) = self.check_lval(env, lval, range);
                (taints, shape, env)
            }
            Expression::Literal => (TaintSet::new(), Shape::Bot, env),
            Expression::Binary { op, lhs, rhs, .. } => {
                let (lhs_taints, _, env) = self.check_expr(env, lhs, range);
                let (rhs_taints, _, env) = self.check_expr(env, rhs, range);
                let taints = if op.is_comparison() && self.options.taint_assume_safe_comparisons {
                    TaintSet::new()
                } else {
                    taint::union(&lhs_taints, &rhs_taints)
                };
                (taints, Shape::Bot, env)
            }
            Expression::Unary { op, operand, .. } => {
                let (taints, _, env) = self.check_expr(env, operand, range);
                let taints = if matches!(op, UnOp::Not) && self.options.taint_assume_safe_booleans {
                    TaintSet::new()
                } else {
                    taints
                };
                (taints, Shape::Bot, env)
            }
            Expression::Tuple { elements, .. } => {
                let mut env = env;
                let mut xtaints = Vec::with_capacity(elements.len());
                let mut all = TaintSet::new();
                for element in elements {
                    let (taints, _, next_env) = self.check_expr(env, element, range);
                    env = next_env;
                    all = taint::union(&all, &taints);
                    xtaints.push(if taints.is_empty() { XTaint::None } else { XTaint::Tainted(taints) });
                }
                (TaintSet::new(), tuple_like_obj(xtaints), env)
            }
            Expression::Call { callee, args, .. } => self.check_call(env, callee, args, range),
        }
    }

    /// `check_lval(env, lval) -> (T, Shape, SubtaintOfBase, env')` (§4.5),
    /// bottom-up over the offset path.
    pub fn check_lval(&mut self, mut env: LvalEnv, lval: &Lvalue, range: SourceLocation) -> (TaintSet, Shape, bool, LvalEnv) {
        let prefixes = lval.prefixes();
        let mut taints = TaintSet::new();
        let mut shape = Shape::Bot;
        let mut sanitized = false;
        let mut emitted_sinks = HashSet::new();

        for (depth, prefix) in prefixes.iter().enumerate() {
            let pms = (self.config.oracle)(range);
            let is_last = depth == prefixes.len() - 1;
            if !sanitized && is_last && !pms.sanitizers.is_empty() {
                trace!("l-value `{prefix}` matches a sanitizer, taint cleared");
                for sanitizer in &pms.sanitizers {
                    if matches!(sanitizer.spec.by_side_effect, BySideEffect::Yes | BySideEffect::Only) {
                        env.clean(prefix);
                    }
                }
                sanitized = true;
                taints = TaintSet::new();
                shape = Shape::Bot;
                continue;
            }

            let parent_shape = shape.clone();

            if let Some(cell) = env.find_lval(prefix) {
                taints = cell.xtaint.taints();
                shape = cell.shape.clone();
                sanitized = matches!(cell.xtaint, XTaint::Sanitized);
            } else if depth > 0 {
                let offset = &prefix.offsets[prefix.offsets.len() - 1];
                taints = fix_poly_taint_with_field(&taints, offset);
                shape = Shape::Bot;
            } else {
                taints = TaintSet::new();
                shape = Shape::Bot;
            }

            if depth > 0 && !self.options.taint_assume_safe_indexes {
                let offset = &prefix.offsets[prefix.offsets.len() - 1];
                if matches!(offset, Offset::Any) {
                    trace!("unresolved index at `{prefix}`, conservatively touching every sibling field");
                    taints = taint::union(&taints, &gather_all_taints_in_shape(&parent_shape));
                }
            }

            for source in &pms.sources {
                let fresh = taint::taints_of_pms([source], &taints);
                taints = taint::union(&taints, &fresh);
                if !fresh.is_empty() && !matches!(source.spec.by_side_effect, BySideEffect::No) {
                    env.add(prefix, &fresh);
                }
            }

            let exact_sinks: Vec<SinkMatch> = pms.sinks.iter().filter(|sink| sink.spec.exact).cloned().collect();
            self.check_sinks(&exact_sinks, &taints, &shape, &env, &mut emitted_sinks);
        }

        (taints, shape, !sanitized, env)
    }

    fn apply_propagators(
        &mut self,
        propagators: &[taint_ir::matches::PropagatorMatch],
        target: Option<&Lvalue>,
        taints: &mut TaintSet,
        mut env: LvalEnv,
        range: SourceLocation,
    ) -> LvalEnv {
        if self.options.taint_only_propagate_through_assignments {
            return env;
        }
        for prop in propagators {
            if let Some(var) = &prop.spec.var {
                if target.map(|lval| &lval.base) != Some(var) {
                    continue;
                }
            }
            match prop.spec.direction {
                PropagatorDirection::From => {
                    if taint::solve_precondition(taints, &prop.spec.requires).unwrap_or(true) {
                        let deposit = if prop.spec.replace_labels {
                            relabel(taints, prop.spec.label.clone())
                        } else {
                            taints.clone()
                        };
                        trace!("propagator `{}` deposits taint at {range}", prop.spec.prop.0);
                        env.propagate_to(&prop.spec.prop, &deposit);
                    }
                }
                PropagatorDirection::To => {
                    if let Some(deposited) = env.propagate_from(&prop.spec.prop) {
                        if !deposited.is_empty() {
                            *taints = taint::union(taints, &deposited);
                            if prop.spec.by_side_effect {
                                if let Some(lval) = target {
                                    env.add(lval, &deposited);
                                }
                            }
                        }
                    } else if let Some(lval) = target {
                        env.pending_propagation(&prop.spec.prop, lval.clone());
                    }
                }
            }
        }
        env
    }

    /// §4.4 best-match canonicalization, narrowed to what this engine's IR
    /// can actually distinguish: a single [`Lvalue`] carries one `range` for
    /// its whole offset path, so [`Self::check_lval`]'s per-prefix loop
    /// queries the oracle at the *same* range for every prefix depth. A sink
    /// match that is tainted at more than one of those depths (e.g. taint on
    /// both `x` and `x.a` of `x.a.b`) would otherwise fire once per depth for
    /// what is really one concrete match. `emitted` is threaded through one
    /// `check_lval` call (fresh per call elsewhere) so each sink id emits at
    /// most once per call, keeping the "prevents duplicate findings at both
    /// an outer and inner expression" guarantee without needing a
    /// range-per-prefix AST this IR doesn't have.
    fn check_sinks(&mut self, sinks: &[SinkMatch], taints: &TaintSet, shape: &Shape, env: &LvalEnv, emitted: &mut HashSet<PatternMatchId>) {
        for sink in sinks {
            if sink.spec.at_exit || emitted.contains(&sink.id) {
                continue;
            }
            let combined = taint::union(taints, env.get_control_taints());
            let combined = taint::union(&combined, &gather_all_taints_in_shape(shape));
            if self.try_emit_sink(sink, &combined) {
                emitted.insert(sink.id);
            }
        }
    }

    /// §4.8 at-exit sinks: unlike [`Self::check_sinks`], these are checked
    /// only once, against whatever taints `check_tainted_at_exit_sinks`
    /// decides are relevant at an exit node, rather than at every matching
    /// expression/l-value.
    pub fn check_exit_sinks(&mut self, sinks: &[SinkMatch], taints: &TaintSet) {
        for sink in sinks {
            self.try_emit_sink(sink, taints);
        }
    }

    fn try_emit_sink(&mut self, sink: &SinkMatch, combined: &TaintSet) -> bool {
        if combined.is_empty() {
            return false;
        }
        if matches!(taint::solve_precondition(combined, &sink.spec.requires), Some(false)) {
            trace!("sink match at {} does not satisfy its label requirement; no finding", sink.range);
            return false;
        }
        let Some(bindings) = taint::merge_source_bindings(combined, &sink.bindings, self.config.unify_mvars) else {
            trace!("metavariable unification failed for sink match at {}; dropping finding", sink.range);
            return false;
        };
        trace!("sink match at {} sees {} candidate taint(s)", sink.range, combined.len());
        (self.config.handle_results)(AnalysisResult::ToSink {
            taints: combined.clone().into_iter().collect(),
            sink: sink.clone(),
            bindings,
        });
        true
    }

    fn drops_data_taint(&self, expr: &Expression) -> bool {
        match expr {
            Expression::Binary { op, .. } if op.is_comparison() => self.options.taint_assume_safe_comparisons,
            Expression::Binary { op, .. } if matches!(op, BinOp::And | BinOp::Or) => self.options.taint_assume_safe_booleans,
            Expression::Unary { op: UnOp::Not, .. } => self.options.taint_assume_safe_booleans,
            Expression::Binary { op, .. } if matches!(op, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div) => {
                self.options.taint_assume_safe_numbers
            }
            Expression::Unary { op: UnOp::Neg, .. } => self.options.taint_assume_safe_numbers,
            _ => false,
        }
    }

    /// Evaluate a callee/args pair shared by expression-level calls and the
    /// `Call`/`New` instruction handler cases (§4.6).
    pub fn check_call(&mut self, env: LvalEnv, callee: &Callee, args: &[Expression], range: SourceLocation) -> (TaintSet, Shape, LvalEnv) {
        // Arguments are checked before the receiver so that a `From`
        // propagator match on an argument has already deposited into its
        // channel by the time the receiver's `To` match tries to absorb it
        // (e.g. `x.foo(y)` with `from=$B to=$A`: `y`'s deposit must precede
        // `x`'s absorption within this same call).
        let mut env = env;
        let mut all_args_taints = TaintSet::new();
        let mut arg_states: Vec<(TaintSet, Shape)> = Vec::with_capacity(args.len());
        for arg in args {
            let (taints, shape, next_env) = self.check_expr_as_call_operand(env, arg, range);
            env = next_env;
            all_args_taints = taint::union(&all_args_taints, &taints);
            all_args_taints = taint::union(&all_args_taints, &gather_all_taints_in_shape(&shape));
            arg_states.push((taints, shape));
        }

        let mut this_state: Option<(TaintSet, Shape)> = None;
        if let Callee::Method { receiver, .. } = callee {
            let (taints, shape, next_env) = self.check_expr_as_call_operand(env, receiver, range);
            env = next_env;
            all_args_taints = taint::union(&all_args_taints, &taints);
            this_state = Some((taints, shape));
        }

        let pms = (self.config.oracle)(range);
        let call_sinks: Vec<SinkMatch> = pms
            .sinks
            .iter()
            .filter(|sink| !sink.spec.at_exit && !(sink.spec.has_focus && sink.spec.exact))
            .cloned()
            .collect();
        self.check_sinks(&call_sinks, &all_args_taints, &Shape::Bot, &env, &mut HashSet::new());

        let callee_name = callee.name();
        if let Some(name) = callee_name {
            if let Some(signature) = (self.config.function_taint_signature)(name) {
                return self.instantiate_signature(env, name, &signature, args, &arg_states, this_state.as_ref(), range);
            }
            if self.config.language == taint_ir::config::Language::Java {
                if let Some((prop, is_getter)) = java_accessor(name) {
                    if let Callee::Method { receiver, .. } = callee {
                        if let Expression::Lvalue(obj) = receiver.as_ref() {
                            if let Some(class_attr) = (self.config.find_attribute_in_class)(obj.base.as_str(), &prop) {
                                let field_lval = Lvalue::new(class_attr.clone()).extended(Offset::Field(prop.clone()));
                                if is_getter {
                                    let (taints, shape, _, env2) = self.check_lval(env, &field_lval, range);
                                    return (taints, shape, env2);
                                } else {
                                    env.add(&field_lval, &all_args_taints);
                                    return (TaintSet::new(), Shape::Bot, env);
                                }
                            }
                        }
                    }
                }
            }
        } else {
            warn!("call at {range} has no resolvable callee name; assuming it does not propagate taint through its result unless enabled");
        }

        if self.options.taint_assume_safe_functions {
            (TaintSet::new(), Shape::Bot, env)
        } else {
            (all_args_taints, Shape::Bot, env)
        }
    }

    /// §4.7 signature instantiation: replay a precomputed per-function
    /// summary at this call site, substituting every `Var`-origin taint with
    /// the concrete taint actually present at the corresponding
    /// argument/`this`/global. `ToReturn` entries accumulate into this call
    /// expression's own result taint; `ToSink` entries are re-checked against
    /// their sink's `requires` formula now that substitution may have
    /// resolved it, and emitted immediately if they still survive; `ToLval`
    /// entries are resolved back to a caller l-value and applied to `env`.
    fn instantiate_signature(
        &mut self,
        mut env: LvalEnv,
        callee_name: &str,
        signature: &FunctionSignature,
        args: &[Expression],
        arg_states: &[(TaintSet, Shape)],
        this_state: Option<&(TaintSet, Shape)>,
        range: SourceLocation,
    ) -> (TaintSet, Shape, LvalEnv) {
        trace!("instantiating taint signature `{callee_name}` at {range} ({} result(s))", signature.results.len());
        let frame = CallFrame::new(callee_name, range);
        let mut result_taints = TaintSet::new();
        for entry in &signature.results {
            match entry {
                AnalysisResult::ToReturn { taints, .. } => {
                    let substituted = self.substitute_sig_taints(taints, arg_states, this_state, &env, &frame);
                    result_taints = taint::union(&result_taints, &substituted);
                }
                AnalysisResult::ToSink { taints, sink, bindings } => {
                    let substituted = self.substitute_sig_taints(taints, arg_states, this_state, &env, &frame);
                    if substituted.is_empty() {
                        trace!("signature `{callee_name}`'s sink at {} lost all its taint on substitution; dropped", sink.range);
                        continue;
                    }
                    if matches!(taint::solve_precondition(&substituted, &sink.spec.requires), Some(false)) {
                        trace!("signature `{callee_name}`'s sink at {} does not survive substitution at {range}; dropped", sink.range);
                        continue;
                    }
                    (self.config.handle_results)(AnalysisResult::ToSink {
                        taints: substituted.into_iter().collect(),
                        sink: sink.clone(),
                        bindings: bindings.clone(),
                    });
                }
                AnalysisResult::ToLval { taints, lvalue } => {
                    let substituted = self.substitute_sig_taints(taints, arg_states, this_state, &env, &frame);
                    if substituted.is_empty() {
                        continue;
                    }
                    match resolve_sig_target_lval(lvalue, &signature.params, args) {
                        Some(target) => env.add(&target, &substituted),
                        None => trace!("signature `{callee_name}`'s `ToLval({lvalue})` has no caller-side target at {range}; dropped"),
                    }
                }
            }
        }
        (result_taints, Shape::Bot, env)
    }

    /// Replace every `Var`-origin token in `taints` with the concrete taint
    /// found at its signature l-value; non-`Var` tokens (a concrete taint the
    /// callee's own body introduced, independent of its arguments) pass
    /// through unchanged. Every surviving token gets `frame` prepended to its
    /// call-trace (a no-op for non-`Source` origins).
    fn substitute_sig_taints(
        &self,
        taints: &[TaintToken],
        arg_states: &[(TaintSet, Shape)],
        this_state: Option<&(TaintSet, Shape)>,
        env: &LvalEnv,
        frame: &CallFrame,
    ) -> TaintSet {
        let mut result = TaintSet::new();
        for token in taints {
            match &token.origin {
                Origin::Var(sig_lval) => {
                    for concrete in self.taints_of_sig_lval(sig_lval, arg_states, this_state, env) {
                        result.insert(concrete.with_call_frame(frame.clone()));
                    }
                }
                _ => {
                    result.insert(token.with_call_frame(frame.clone()));
                }
            }
        }
        result
    }

    /// `taints_of_sig_lval` (§4.7): the current concrete taints at the
    /// l-value a `SigLval` stands for. Walks `sig_lval`'s offsets into the
    /// matching argument/`this`/global's already-known shape. A global or a
    /// field of `this` with no local taint found synthesizes a fresh
    /// `Var(sig_lval)` as an implicit input taint — the summary may transit a
    /// caller that never writes that global/field itself, so the taint must
    /// keep flowing polymorphically rather than vanish.
    fn taints_of_sig_lval(
        &self,
        sig_lval: &SigLval,
        arg_states: &[(TaintSet, Shape)],
        this_state: Option<&(TaintSet, Shape)>,
        env: &LvalEnv,
    ) -> TaintSet {
        let (root_taints, root_shape) = match &sig_lval.base {
            VarBase::Arg(i) => match arg_states.get(*i) {
                Some((taints, shape)) => (taints.clone(), shape.clone()),
                None => {
                    warn!("signature references Arg({i}) but only {} argument(s) were passed; skipping", arg_states.len());
                    return TaintSet::new();
                }
            },
            VarBase::This => match this_state {
                Some((taints, shape)) => (taints.clone(), shape.clone()),
                None => return TaintSet::new(),
            },
            VarBase::Global(name) => match env.find_lval(&Lvalue::new(name.clone())) {
                Some(cell) => (cell.xtaint.taints(), cell.shape.clone()),
                None => (TaintSet::new(), Shape::Bot),
            },
        };
        let taints = if sig_lval.offsets.is_empty() {
            root_taints
        } else {
            match find_in_shape(&root_shape, &sig_lval.offsets) {
                Some(cell) => cell.xtaint.taints(),
                None => return TaintSet::new(),
            }
        };
        let implicit_input =
            matches!(sig_lval.base, VarBase::Global(_)) || (matches!(sig_lval.base, VarBase::This) && !sig_lval.offsets.is_empty());
        if taints.is_empty() && implicit_input {
            return [taint::singleton(Origin::Var(sig_lval.clone()))].into_iter().collect();
        }
        taints
    }
}

/// `lval_of_sig_lval`'s `ToLval`-resolution half (§4.7): translate a
/// signature's callee-local target back to the caller's own l-value. If
/// `lvalue`'s base is one of the callee's formal parameters, the matching
/// actual argument must itself be an l-value (a literal or nested call result
/// has nothing in the caller to write back into — §7 "signature
/// instantiation failure", this entry is skipped). Otherwise `lvalue` is
/// assumed to name a global, addressed identically in caller and callee.
fn resolve_sig_target_lval(lvalue: &Lvalue, params: &[taint_ir::lvalue::VariableName], args: &[Expression]) -> Option<Lvalue> {
    let Some(pos) = params.iter().position(|p| *p == lvalue.base) else {
        return Some(lvalue.clone());
    };
    let Expression::Lvalue(caller_base) = args.get(pos)? else { return None };
    let mut target = caller_base.clone();
    for offset in &lvalue.offsets {
        target = target.extended(offset.clone());
    }
    Some(target)
}

/// §4.5 `fix_poly_taint_with_field`: inherit polymorphic (`Var`) taint from
/// a shorter offset path by extending its `SigLval` with the current
/// offset, bounded by `MAX_POLY_OFFSET` and skipping repeated offsets
/// (guards `x = x.getX()`-style loops). Only field-style offsets
/// participate; computed/integer offsets are not inherited (§7 "unknown
/// offset kind").
fn fix_poly_taint_with_field(prefix_taints: &TaintSet, offset: &Offset) -> TaintSet {
    if !matches!(offset, Offset::Field(_)) {
        return TaintSet::new();
    }
    prefix_taints
        .iter()
        .filter_map(|token| match &token.origin {
            Origin::Var(sig_lval) => sig_lval.extended(offset.clone()).map(|extended| {
                debug_assert!(extended.offsets.len() < MAX_POLY_OFFSET);
                taint::singleton(Origin::Var(extended))
            }),
            _ => None,
        })
        .collect()
}

fn relabel(taints: &TaintSet, label: Option<taint_ir::label::Label>) -> TaintSet {
    let Some(label) = label else {
        return taints.clone();
    };
    taints
        .iter()
        .map(|token| {
            let origin = match &token.origin {
                Origin::Source { pm, precondition, call_trace, bindings, .. } => Origin::Source {
                    pm: *pm,
                    label: label.clone(),
                    precondition: precondition.clone(),
                    call_trace: call_trace.clone(),
                    bindings: bindings.clone(),
                },
                other => other.clone(),
            };
            let mut relabeled = token.clone();
            relabeled.origin = origin;
            relabeled
        })
        .collect()
}

fn expr_as_lvalue(expr: &Expression) -> Option<&Lvalue> {
    match expr {
        Expression::Lvalue(lval) => Some(lval),
        _ => None,
    }
}

/// Java getter/setter heuristic (§6): `getFoo`/`isFoo` reads property
/// `foo`, `setFoo` writes it. Returns the lower-camel-case property name
/// and whether this was a getter.
fn java_accessor(name: &str) -> Option<(String, bool)> {
    let (prefix, is_getter) = if let Some(rest) = name.strip_prefix("get") {
        (rest, true)
    } else if let Some(rest) = name.strip_prefix("is") {
        (rest, true)
    } else if let Some(rest) = name.strip_prefix("set") {
        (rest, false)
    } else {
        return None;
    };
    let mut chars = prefix.chars();
    let first = chars.next()?;
    if !first.is_ascii_uppercase() {
        return None;
    }
    let prop = first.to_ascii_lowercase().to_string() + chars.as_str();
    Some((prop, is_getter))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_java_accessor_names() {
        assert_eq!(java_accessor("getName"), Some(("name".to_string(), true)));
        assert_eq!(java_accessor("setName"), Some(("name".to_string(), false)));
        assert_eq!(java_accessor("isValid"), Some(("valid".to_string(), true)));
        assert_eq!(java_accessor("name"), None);
    }

    #[test]
    fn test_fix_poly_taint_with_field_skips_non_field_offsets() {
        use taint_ir::lvalue::VarBase;
        let taints: TaintSet = [taint::singleton(Origin::Var(taint_ir::lvalue::SigLval::new(VarBase::Arg(0))))].into_iter().collect();
        assert!(fix_poly_taint_with_field(&taints, &Offset::Index(0)).is_empty());
        assert_eq!(fix_poly_taint_with_field(&taints, &Offset::Field("x".into())).len(), 1);
    }

    fn empty_oracle(_: SourceLocation) -> taint_ir::matches::PatternMatches {
        taint_ir::matches::PatternMatches::default()
    }

    fn test_config(options: Options) -> Config {
        Config {
            filepath: "test".into(),
            rule_id: "test-rule".into(),
            language: taint_ir::config::Language::Other,
            track_control: true,
            unify_mvars: false,
            options,
            oracle: Box::new(empty_oracle),
            function_taint_signature: Box::new(|_| None),
            find_attribute_in_class: Box::new(|_, _| None),
            check_tainted_at_exit_sinks: Box::new(|_, _| None),
            handle_results: Box::new(|_| {}),
        }
    }

    /// `x[i]` where `x = {a: tainted, b: clean}` and `i` is unresolved
    /// (`Offset::Any`): with the default (non-"assume-safe") option every
    /// sibling field is conservatively folded in; with the option set, the
    /// unresolved index touches nothing.
    #[test]
    fn test_unresolved_index_touches_siblings_unless_assumed_safe() {
        let taint: TaintSet = [taint::singleton(Origin::Control)].into_iter().collect();
        let mut shape = Shape::empty_obj();
        shape.set(Offset::Field("a".into()), taint_ir::shape::Cell::new(XTaint::Tainted(taint.clone()), Shape::Bot));
        shape.set(Offset::Field("b".into()), taint_ir::shape::Cell::new(XTaint::Clean, Shape::Bot));

        let x = Lvalue::new("x");
        let mut env = LvalEnv::empty();
        env.add_shape(&x, &TaintSet::new(), shape);
        let indexed = x.extended(Offset::Any);

        let mut config = test_config(Options::default());
        let mut checker = Checker::new(&mut config, Options::default());
        let (taints, _, _, _) = checker.check_lval(env.clone(), &indexed, loc());
        assert_eq!(taints, taint);

        let safe_options = Options { taint_assume_safe_indexes: true, ..Options::default() };
        let mut config = test_config(safe_options);
        let mut checker = Checker::new(&mut config, safe_options);
        let (taints, _, _, _) = checker.check_lval(env, &indexed, loc());
        assert!(taints.is_empty());
    }

    fn loc() -> SourceLocation {
        SourceLocation::new(taint_ir::location::FileId(0), 0, 1)
    }

    /// `x.a.b` where `x`, `x.a` and `x.a.b` are all independently tainted:
    /// `check_lval`'s per-prefix loop visits the same oracle range three
    /// times, so one exact sink match would otherwise fire once per prefix
    /// depth. It must fire exactly once.
    #[test]
    fn test_check_lval_dedupes_sink_across_prefix_depths() {
        fn same_sink_oracle(_: SourceLocation) -> taint_ir::matches::PatternMatches {
            let mut pms = taint_ir::matches::PatternMatches::default();
            pms.sinks.push(taint_ir::matches::Match::new(
                PatternMatchId(7),
                loc(),
                Default::default(),
                taint_ir::matches::SinkSpec { requires: Precondition::True, at_exit: false, has_focus: false, exact: true },
            ));
            pms
        }

        let taint: TaintSet = [taint::singleton(Origin::Control)].into_iter().collect();
        let x = Lvalue::new("x");
        let x_a = x.extended(Offset::Field("a".into()));
        let x_a_b = x_a.extended(Offset::Field("b".into()));

        let mut env = LvalEnv::empty();
        env.add(&x, &taint);
        env.add(&x_a, &taint);
        env.add(&x_a_b, &taint);

        let findings = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = findings.clone();
        let mut config = Config {
            filepath: "test".into(),
            rule_id: "test-rule".into(),
            language: taint_ir::config::Language::Other,
            track_control: true,
            unify_mvars: false,
            options: Options::default(),
            oracle: Box::new(same_sink_oracle),
            function_taint_signature: Box::new(|_| None),
            find_attribute_in_class: Box::new(|_, _| None),
            check_tainted_at_exit_sinks: Box::new(|_, _| None),
            handle_results: Box::new(move |result: AnalysisResult| sink.borrow_mut().push(result)),
        };
        let mut checker = Checker::new(&mut config, Options::default());
        checker.check_lval(env, &x_a_b, loc());

        assert_eq!(findings.borrow().len(), 1);
    }
}
