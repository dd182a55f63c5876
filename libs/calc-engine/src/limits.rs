//! Central table of resource limits
//!
//! Every numeric bound named across the pipeline (input shape, AST shape,
//! parser resources, optimizer passes, evaluator recursion, formula cache
//! capacity) is a field here rather than a literal scattered through the
//! modules that check it. Mirrors the single-options-struct convention the
//! compilation pipeline is built around upstream (`CompileOptions` /
//! `EvalOptions`), generalized to one struct threaded through every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum input length in bytes (§4.B).
    pub max_input_bytes: usize,
    /// Maximum number of lines in the input (§4.B).
    pub max_lines: usize,
    /// Maximum length of any single line, in characters (§4.B).
    pub max_line_len: usize,
    /// Maximum bracket nesting depth (§4.B).
    pub max_nesting_depth: usize,
    /// Maximum AST tree depth (§3 invariant 4).
    pub max_ast_depth: usize,
    /// Maximum AST node count (§3 invariant 4).
    pub max_ast_nodes: usize,
    /// Maximum shift/reduce steps per parse (§4.E).
    pub max_parser_steps: usize,
    /// Maximum parser stack depth (§4.E).
    pub max_parser_stack: usize,
    /// Maximum optimizer passes before giving up on reaching a fixed point (§4.G).
    pub max_optimizer_passes: usize,
    /// Maximum evaluator recursion depth (§5).
    pub max_eval_depth: usize,
    /// Default capacity of the multi-step calculator's formula cache (§4.I).
    pub formula_cache_capacity: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_input_bytes: 1_000_000,
            max_lines: 50_000,
            max_line_len: 10_000,
            max_nesting_depth: 100,
            max_ast_depth: 32,
            max_ast_nodes: 10_000,
            max_parser_steps: 100_000,
            max_parser_stack: 1_000,
            max_optimizer_passes: 100,
            max_eval_depth: 128,
            formula_cache_capacity: 1_024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let limits = Limits::default();
        assert_eq!(limits.max_input_bytes, 1_000_000);
        assert_eq!(limits.max_ast_depth, 32);
        assert_eq!(limits.max_ast_nodes, 10_000);
        assert_eq!(limits.max_eval_depth, 128);
        assert_eq!(limits.formula_cache_capacity, 1_024);
    }
}
