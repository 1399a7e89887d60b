//! Hand-built scenarios that exercise the engine end to end, standing in for
//! the front end (lexer, parser, pattern-match compiler) that would
//! ordinarily build a [`Cfg`] and [`Config`] from real source. Grounded on
//! the hand-assembled `runner_from_src` fixtures in the teacher's own
//! `analysis_runner.rs` tests, generalized from parsing Circom source text
//! to constructing the IL directly, since this engine has no parser of its
//! own (§1 Out of scope).

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{anyhow, Result};

use taint_ir::cfg::basic_block::BasicBlock;
use taint_ir::cfg::ir::{Callee, Expression, Instruction, Terminator};
use taint_ir::cfg::Cfg;
use taint_ir::config::{Config, Language, Options};
use taint_ir::label::Precondition;
use taint_ir::location::{FileId, SourceLocation};
use taint_ir::lvalue::{Lvalue, Offset, SigLval, VarBase, VariableName};
use taint_ir::matches::{
    BySideEffect, Match, PatternMatchId, PatternMatches, SanitizerSpec, SinkSpec, SourceSpec,
};
use taint_ir::results::AnalysisResult;
use taint_ir::taint::{self, Origin};
use taint_ir::LvalEnv;

/// A runnable scenario: the CFG and config to run [`taint_engine::fixpoint`]
/// over, an optional seeded entry environment (simulating a caller's
/// already-tainted argument, §4.7), and the findings sink the config's
/// `handle_results` hook writes into as it runs.
pub struct Demo {
    pub name: &'static str,
    pub description: &'static str,
    pub cfg: Cfg,
    pub config: Config,
    pub in_env: Option<LvalEnv>,
    pub findings: Rc<RefCell<Vec<AnalysisResult>>>,
}

pub const NAMES: &[(&str, &str)] = &[
    ("basic", "a source reaches a sink through a plain assignment"),
    ("sanitized", "a sanitizer sits between the source and the sink"),
    ("signature", "a caller-supplied (Var-origin) argument taints a field and reaches a sink"),
    ("control", "a tainted branch condition taints an assignment under it"),
];

pub fn build(name: &str) -> Result<Demo> {
    match name {
        "basic" => basic(),
        "sanitized" => sanitized(),
        "signature" => signature(),
        "control" => control(),
        other => Err(anyhow!("unknown demo `{other}`; pick one of: {}", NAMES.iter().map(|(n, _)| *n).collect::<Vec<_>>().join(", "))),
    }
}

fn loc(start: usize) -> SourceLocation {
    SourceLocation::new(FileId(0), start, start + 1)
}

fn source_match(id: u64, range: SourceLocation) -> PatternMatches {
    let mut pms = PatternMatches::default();
    pms.sources.push(Match::new(
        PatternMatchId(id),
        range,
        Default::default(),
        SourceSpec {
            label: "tainted".into(),
            precondition: Precondition::True,
            by_side_effect: BySideEffect::Yes,
            exact: false,
            control: false,
        },
    ));
    pms
}

fn sink_match(id: u64, range: SourceLocation) -> PatternMatches {
    let mut pms = PatternMatches::default();
    pms.sinks.push(Match::new(
        PatternMatchId(id),
        range,
        Default::default(),
        SinkSpec { requires: Precondition::label("tainted"), at_exit: false, has_focus: false, exact: false },
    ));
    pms
}

fn sanitizer_match(id: u64, range: SourceLocation) -> PatternMatches {
    let mut pms = PatternMatches::default();
    pms.sanitizers.push(Match::new(
        PatternMatchId(id),
        range,
        Default::default(),
        SanitizerSpec { by_side_effect: BySideEffect::Yes, exact: false },
    ));
    pms
}

fn base_config(oracle: impl Fn(SourceLocation) -> PatternMatches + 'static) -> (Config, Rc<RefCell<Vec<AnalysisResult>>>) {
    let findings = Rc::new(RefCell::new(Vec::new()));
    let sink = findings.clone();
    let config = Config {
        filepath: "demo".into(),
        rule_id: "demo-rule".into(),
        language: Language::Other,
        track_control: true,
        unify_mvars: false,
        options: Options::default(),
        oracle: Box::new(oracle),
        function_taint_signature: Box::new(|_| None),
        find_attribute_in_class: Box::new(|_, _| None),
        check_tainted_at_exit_sinks: Box::new(|_, _| None),
        handle_results: Box::new(move |result: AnalysisResult| sink.borrow_mut().push(result)),
    };
    (config, findings)
}

/// `y = source(); sink(y);` — straight-line taint flow, `ToSink` expected.
fn basic() -> Result<Demo> {
    let y = Lvalue::new("y");
    let source_range = loc(1);
    let sink_range = loc(2);

    let assign = Instruction::Assign {
        lvalue: y.clone(),
        rhs: Expression::Call { callee: Callee::Named("source".into()), args: Vec::new(), range: source_range },
        range: source_range,
    };
    let call_sink = Instruction::Call {
        result: None,
        callee: Callee::Named("sink".into()),
        args: vec![Expression::Lvalue(y)],
        range: sink_range,
    };
    let block = BasicBlock::from_raw_parts(0, vec![assign, call_sink], Terminator::Exit, Default::default(), Default::default());
    let cfg = Cfg::new("basic", Vec::new(), vec![block])?;

    let (config, findings) = base_config(move |range| {
        if range == source_range {
            source_match(1, range)
        } else if range == sink_range {
            sink_match(2, range)
        } else {
            PatternMatches::default()
        }
    });

    Ok(Demo { name: "basic", description: "a source reaches a sink through a plain assignment", cfg, config, in_env: None, findings })
}

/// `y = source(); y = sanitize(y); sink(y);` — the sanitizer clears `y`
/// before it reaches the sink, no finding expected.
fn sanitized() -> Result<Demo> {
    let y = Lvalue::new("y");
    let source_range = loc(1);
    let sanitize_range = loc(2);
    let sink_range = loc(3);

    let assign_source = Instruction::Assign {
        lvalue: y.clone(),
        rhs: Expression::Call { callee: Callee::Named("source".into()), args: Vec::new(), range: source_range },
        range: source_range,
    };
    let assign_sanitized = Instruction::Assign {
        lvalue: y.clone(),
        rhs: Expression::Call {
            callee: Callee::Named("sanitize".into()),
            args: vec![Expression::Lvalue(y.clone())],
            range: sanitize_range,
        },
        range: sanitize_range,
    };
    let call_sink = Instruction::Call {
        result: None,
        callee: Callee::Named("sink".into()),
        args: vec![Expression::Lvalue(y)],
        range: sink_range,
    };
    let block = BasicBlock::from_raw_parts(
        0,
        vec![assign_source, assign_sanitized, call_sink],
        Terminator::Exit,
        Default::default(),
        Default::default(),
    );
    let cfg = Cfg::new("sanitized", Vec::new(), vec![block])?;

    let (config, findings) = base_config(move |range| {
        if range == source_range {
            source_match(1, range)
        } else if range == sanitize_range {
            sanitizer_match(2, range)
        } else if range == sink_range {
            sink_match(3, range)
        } else {
            PatternMatches::default()
        }
    });

    Ok(Demo { name: "sanitized", description: "a sanitizer sits between the source and the sink", cfg, config, in_env: None, findings })
}

/// A single-parameter function `f(x)`, analyzed with `x` entering as a
/// polymorphic `Var(Arg(0))` taint (the shape of taint a signature-building
/// pass would seed). The body writes a field of `x` from a local source and
/// also passes `x` straight to a sink: this demonstrates both the
/// side-effect (`ToLval`) and sink (`ToSink`) result kinds in one run.
fn signature() -> Result<Demo> {
    let x = Lvalue::new("x");
    let x_secret = x.extended(Offset::Field("secret".into()));
    let source_range = loc(1);
    let sink_range = loc(2);

    let assign_field = Instruction::Assign {
        lvalue: x_secret,
        rhs: Expression::Call { callee: Callee::Named("source".into()), args: Vec::new(), range: source_range },
        range: source_range,
    };
    let call_sink = Instruction::Call {
        result: None,
        callee: Callee::Named("sink".into()),
        args: vec![Expression::Lvalue(x.clone())],
        range: sink_range,
    };
    let block = BasicBlock::from_raw_parts(0, vec![assign_field, call_sink], Terminator::Exit, Default::default(), Default::default());
    let cfg = Cfg::new("f", vec![VariableName::new("x")], vec![block])?;

    let (config, findings) = base_config(move |range| {
        if range == source_range {
            source_match(1, range)
        } else if range == sink_range {
            sink_match(2, range)
        } else {
            PatternMatches::default()
        }
    });

    let mut in_env = LvalEnv::empty();
    let arg_taint = taint::singleton(Origin::Var(SigLval::new(VarBase::Arg(0))));
    in_env.add(&x, &[arg_taint].into_iter().collect());

    Ok(Demo {
        name: "signature",
        description: "a caller-supplied (Var-origin) argument taints a field and reaches a sink",
        cfg,
        config,
        in_env: Some(in_env),
        findings,
    })
}

/// `if (source()) { y = 1; } sink(y);` — `y`'s value does not carry data
/// taint, but the branch condition does, so with `track_control` enabled
/// `y` picks up control taint and the sink fires.
fn control() -> Result<Demo> {
    let y = Lvalue::new("y");
    let cond_range = loc(1);
    let sink_range = loc(2);

    let cond_block = BasicBlock::from_raw_parts(
        0,
        Vec::new(),
        Terminator::Cond {
            expr: Expression::Call { callee: Callee::Named("source".into()), args: Vec::new(), range: cond_range },
            range: cond_range,
            if_true: 1,
            if_false: Some(2),
        },
        Default::default(),
        [1, 2].into_iter().collect(),
    );
    let assign_block = BasicBlock::from_raw_parts(
        1,
        vec![Instruction::Assign { lvalue: y.clone(), rhs: Expression::Literal, range: loc(0) }],
        Terminator::Goto(2),
        [0].into_iter().collect(),
        [2].into_iter().collect(),
    );
    let join_block = BasicBlock::from_raw_parts(
        2,
        vec![Instruction::Call {
            result: None,
            callee: Callee::Named("sink".into()),
            args: vec![Expression::Lvalue(y)],
            range: sink_range,
        }],
        Terminator::Exit,
        [0, 1].into_iter().collect(),
        Default::default(),
    );
    let cfg = Cfg::new("control", Vec::new(), vec![cond_block, assign_block, join_block])?;

    let (config, findings) = base_config(move |range| {
        if range == cond_range {
            source_match(1, range)
        } else if range == sink_range {
            sink_match(2, range)
        } else {
            PatternMatches::default()
        }
    });

    Ok(Demo { name: "control", description: "a tainted branch condition taints an assignment under it", cfg, config, in_env: None, findings })
}
