//! Engine and multi-step calculator (§4.I, §6): the public orchestration
//! layer sitting on top of lex → parse → optimize → evaluate.
//!
//! `Engine` owns the three resources §5 requires be shared read-only across
//! concurrent calls — the grammar, the built parsing table, and the
//! function registry — plus a bounded, mutex-guarded LRU cache of compiled
//! (lexed+parsed+optimized) formulas, mirroring the teacher's
//! `Arc<Mutex<LruCache<String, Arc<Plan>>>>` compiled-plan cache.

use crate::ast::{is_valid_identifier, AstNode};
use crate::error::{Error, Result};
use crate::functions::{Arity, FunctionRegistry};
use crate::grammar::Grammar;
use crate::lexer::Lexer;
use crate::limits::Limits;
use crate::optimizer;
use crate::parser::Parser;
use crate::table::{ParsingTable, TableBuilder};
use crate::value::{Environment, Value};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument};


/// One step of a multi-step calculation request (§3).
#[derive(Debug, Clone)]
pub struct Step {
    pub formula: String,
    pub result_variable: Option<String>,
}

impl Step {
    pub fn new(formula: impl Into<String>, result_variable: Option<String>) -> Self {
        Self {
            formula: formula.into(),
            result_variable,
        }
    }
}

/// A multi-step calculation request (§3): an initial environment plus an
/// ordered chain of steps, each optionally binding its result under a name.
#[derive(Debug, Clone)]
pub struct MultiStepRequest {
    pub variables: Environment,
    pub steps: Vec<Step>,
}

/// The result of a successful multi-step calculation (§6): the ordered
/// per-step values and the environment as it stood after the final step.
#[derive(Debug, Clone)]
pub struct MultiStepResult {
    pub per_step_results: Vec<Value>,
    pub final_env: Environment,
}

const MAX_STEPS: usize = 50;
const MAX_FORMULA_BYTES: usize = 5_000;
const MAX_REQUEST_VARIABLES: usize = 100;
const IMPLICIT_RESULT_KEY: &str = "result";

/// The compiled-formula cache's key is the formula's own text: the simplest
/// fingerprint that still lets distinct formulas (even ones differing only
/// in whitespace) address independent cache slots, resolving §4.I's
/// open "fingerprint function" question in the plainest possible way.
struct FormulaCache {
    entries: Mutex<LruCache<String, Arc<AstNode>>>,
}

impl FormulaCache {
    fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn get(&self, key: &str) -> Option<Arc<AstNode>> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn insert(&self, key: String, value: Arc<AstNode>) {
        self.entries.lock().unwrap().put(key, value);
    }
}

/// The core engine: a built parsing table over the fixed grammar, a
/// function registry (built-ins plus whatever `register_function` adds),
/// and the compiled-formula cache. All three are safe to share across
/// threads; a single `Engine` may serve any number of concurrent
/// `calculate`/`calculate_multi_step` calls (§5).
pub struct Engine {
    grammar: Grammar,
    table: ParsingTable,
    functions: FunctionRegistry,
    limits: Limits,
    cache: FormulaCache,
}

impl Engine {
    /// Builds the grammar's canonical LR(1) table (§6 `BuildParsingTable`).
    /// Grammar conflicts surface synchronously here, not at parse time.
    pub fn new() -> Result<Self> {
        Self::with_limits(Limits::default())
    }

    pub fn with_limits(limits: Limits) -> Result<Self> {
        let grammar = Grammar::new();
        let table = TableBuilder::new(&grammar).build()?;
        debug!(
            states = table.num_states,
            action_density = table.stats.action_density(),
            goto_density = table.stats.goto_density(),
            "parsing table built"
        );
        Ok(Self {
            grammar,
            table,
            functions: FunctionRegistry::new(),
            limits,
            cache: FormulaCache::new(limits.formula_cache_capacity),
        })
    }

    /// Extends the function registry (§6 `RegisterFunction`). Must be
    /// called before any evaluation that references `name`; the registry
    /// has no notion of "already in use" versioning.
    pub fn register_function(
        &self,
        name: &str,
        arity: Arity,
        implementation: impl Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    ) -> Result<()> {
        self.functions.register(name, arity, implementation)
    }

    /// Lexes, parses, and optimizes `formula`, consulting and populating
    /// the formula cache keyed by the formula's own text.
    #[instrument(level = "debug", skip(self))]
    fn compile(&self, formula: &str) -> Result<Arc<AstNode>> {
        if let Some(cached) = self.cache.get(formula) {
            debug!("formula cache hit");
            return Ok(cached);
        }
        debug!("formula cache miss");
        let tokens = Lexer::new(formula, &self.limits)?.tokenize()?;
        let ast = Parser::new(&self.grammar, &self.table, &self.limits).parse(tokens)?;
        ast.validate_shape(&self.limits)?;
        let optimized = optimizer::optimize(ast, &self.limits);
        optimized.validate_shape(&self.limits)?;
        let compiled = Arc::new(optimized);
        self.cache.insert(formula.to_string(), compiled.clone());
        Ok(compiled)
    }

    /// `Calculate` (§6): lex, parse, optimize, and evaluate `formula`
    /// against `variables`.
    #[instrument(level = "debug", skip(self, variables))]
    pub fn calculate(&self, formula: &str, variables: &Environment) -> Result<Value> {
        let compiled = self.compile(formula)?;
        crate::evaluator::Evaluator::new(&self.functions, &self.limits)
            .evaluate(&compiled, variables)
    }

    /// `CalculateMultiStep` (§6, §4.I): runs each step's formula in order
    /// against a shared working environment, threading each step's result
    /// forward as a variable binding for subsequent steps.
    #[instrument(level = "debug", skip(self, request))]
    pub fn calculate_multi_step(&self, request: MultiStepRequest) -> Result<MultiStepResult> {
        self.validate_multi_step_request(&request)?;

        let mut env = request.variables.clone();
        let mut per_step_results = Vec::with_capacity(request.steps.len());

        for (index, step) in request.steps.iter().enumerate() {
            let step_number = index + 1;
            let value = self
                .calculate(&step.formula, &env)
                .map_err(|e| e.into_step_failure(step_number, step.formula.clone()))?;

            if let Some(name) = &step.result_variable {
                env.set(name.clone(), value.clone());
            }
            env.set(IMPLICIT_RESULT_KEY, value.clone());
            debug!(step = step_number, "step completed");
            per_step_results.push(value);
        }

        Ok(MultiStepResult {
            per_step_results,
            final_env: env,
        })
    }

    fn validate_multi_step_request(&self, request: &MultiStepRequest) -> Result<()> {
        if request.steps.is_empty() || request.steps.len() > MAX_STEPS {
            return Err(Error::StepLimitExceeded { max: MAX_STEPS });
        }
        if request.variables.len() > MAX_REQUEST_VARIABLES {
            return Err(Error::SizeExceeded {
                size: request.variables.len(),
                max: MAX_REQUEST_VARIABLES,
            });
        }
        for step in &request.steps {
            if step.formula.len() > MAX_FORMULA_BYTES {
                return Err(Error::InputTooLong {
                    max: MAX_FORMULA_BYTES,
                });
            }
            if let Some(name) = &step.result_variable {
                if !is_valid_identifier(name) {
                    return Err(Error::InvalidASTNode {
                        message: format!("'{name}' is not a valid result variable identifier"),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn table_stats(&self) -> &crate::table::TableStats {
        &self.table.stats
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn table(&self) -> &ParsingTable {
        &self.table
    }
}
