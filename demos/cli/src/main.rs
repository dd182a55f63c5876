//! Command-line demo for the formula engine.
//!
//! Usage:
//!   calc-cli eval "1 + 2 * 3"
//!   calc-cli eval "x + y" --var x=1 --var y=2
//!   calc-cli steps steps.json

use anyhow::{Context, Result};
use calc_engine::{Engine, Environment, Value};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[clap(name = "calc-cli")]
#[clap(about = "Evaluate arithmetic/logical formulas and multi-step calculations")]
struct Args {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a single formula.
    Eval {
        /// The formula text, e.g. "1 + 2 * 3".
        formula: String,

        /// Variable bindings in `name=value` form; `value` is parsed as a
        /// number, `true`/`false`, or else kept as a string.
        #[clap(long = "var", value_parser = parse_binding)]
        vars: Vec<(String, Value)>,
    },
    /// Run a named sequence of formulas from a JSON request file, threading
    /// each step's result into the next as a variable.
    Steps {
        /// Path to a JSON file: `{"variables": {...}, "steps": [{"formula": "...", "result_variable": "..."}]}`.
        path: PathBuf,
    },
}

fn parse_binding(raw: &str) -> Result<(String, Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))?;
    let value = if let Ok(n) = value.parse::<f64>() {
        Value::Number(n)
    } else if value == "true" {
        Value::Boolean(true)
    } else if value == "false" {
        Value::Boolean(false)
    } else {
        Value::String(value.to_string())
    };
    Ok((name.to_string(), value))
}

#[derive(serde::Deserialize)]
struct StepsFile {
    #[serde(default)]
    variables: std::collections::BTreeMap<String, Value>,
    steps: Vec<StepSpec>,
}

#[derive(serde::Deserialize)]
struct StepSpec {
    formula: String,
    result_variable: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,calc_cli=debug".into()),
        )
        .init();

    let args = Args::parse();
    let engine = Engine::new().context("failed to build the formula engine")?;

    match args.command {
        Command::Eval { formula, vars } => {
            let mut env = Environment::new();
            for (name, value) in vars {
                env.set(name, value);
            }
            let result = engine
                .calculate(&formula, &env)
                .with_context(|| format!("failed to evaluate '{formula}'"))?;
            println!("{result}");
        }
        Command::Steps { path } => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let file: StepsFile =
                serde_json::from_str(&text).context("failed to parse steps file")?;

            let variables = Environment::from(file.variables);
            let steps = file
                .steps
                .into_iter()
                .map(|s| calc_engine::Step::new(s.formula, s.result_variable))
                .collect();

            info!(step_count = steps.len(), "running multi-step calculation");
            let request = calc_engine::MultiStepRequest { variables, steps };
            let outcome = engine
                .calculate_multi_step(request)
                .context("multi-step calculation failed")?;

            for (index, value) in outcome.per_step_results.iter().enumerate() {
                println!("step {index}: {value}");
            }
            if let Some(result) = outcome.final_env.get("result") {
                println!("result: {result}");
            }
        }
    }

    Ok(())
}
