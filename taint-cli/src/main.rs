use std::io::Write;
use std::process::ExitCode;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use log::debug;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use taint_engine::fixpoint;
use taint_ir::results::AnalysisResult;

mod demos;

#[derive(Parser, Debug)]
/// A demonstration harness for the interprocedural taint dataflow engine.
///
/// Runs one of a handful of hand-built scenarios through the fixpoint
/// driver and reports whatever sink/return/l-value findings it emits.
/// There is no front end wired up here (no parser, no pattern-match
/// compiler) — see `demos.rs` for how each scenario's `Cfg`/`Config` is
/// built directly against the engine's own types.
struct Cli {
    /// Name of the demo to run (omit to list all available demos)
    #[clap(name = "DEMO")]
    demo: Option<String>,

    /// Enable verbose (debug-level) logging
    #[clap(short = 'v', long = "verbose")]
    verbose: bool,
}

fn log_message(color: Color, message: &str) {
    let mut writer = StandardStream::stdout(ColorChoice::Auto);
    let _ = writer.set_color(ColorSpec::new().set_fg(Some(color)));
    let _ = write!(&mut writer, "taint-engine");
    let _ = writer.reset();
    let _ = writeln!(&mut writer, ": {message}");
}

fn print_finding(result: &AnalysisResult) {
    match result {
        AnalysisResult::ToSink { taints, sink, bindings } => {
            let mvars = if bindings.is_empty() {
                String::new()
            } else {
                format!(" ({} metavariable(s) bound)", bindings.len())
            };
            log_message(Color::Red, &format!("sink at {} reached by {} taint(s){mvars}", sink.range, taints.len()));
        }
        AnalysisResult::ToReturn { taints, location } => {
            log_message(Color::Yellow, &format!("tainted return at {location} ({} taint(s))", taints.len()));
        }
        AnalysisResult::ToLval { taints, lvalue } => {
            log_message(Color::Blue, &format!("`{lvalue}` gained {} new taint(s) as a side effect", taints.len()));
        }
    }
}

fn list_demos() {
    println!("available demos:");
    for (name, description) in demos::NAMES {
        println!("  {name:<12} {description}");
    }
}

fn run_demo(name: &str) -> Result<usize> {
    let demo = demos::build(name)?;
    let mut config = demo.config;
    log_message(Color::Green, &format!("running `{}`: {}", demo.name, demo.description));
    let result = fixpoint(&mut config, taint_ir::config::Options::default(), &demo.cfg, demo.in_env);
    debug!("fixpoint over `{}` converged: {}", demo.cfg.name(), !result.timed_out);

    let findings = demo.findings.borrow();
    for finding in findings.iter() {
        print_finding(finding);
    }
    if findings.is_empty() {
        log_message(Color::Green, "no findings");
    }
    Ok(findings.len())
}

fn main() -> ExitCode {
    let options = Cli::parse();
    if options.verbose && std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "debug");
    }
    pretty_env_logger::init();

    let Some(demo) = options.demo else {
        return match Cli::command().print_help() {
            Ok(()) => {
                println!();
                list_demos();
                ExitCode::SUCCESS
            }
            Err(_) => ExitCode::FAILURE,
        };
    };

    match run_demo(&demo) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(n) => {
            log_message(Color::Green, &format!("{n} finding(s) reported"));
            ExitCode::FAILURE
        }
        Err(error) => {
            log_message(Color::Red, &format!("error: {error:#}"));
            ExitCode::FAILURE
        }
    }
}
