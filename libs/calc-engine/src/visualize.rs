//! Debug visualization for the AST and the parsing table (§9 design
//! notes: "implementers may instead expose a single optional observer
//! callback or omit observability entirely" — this crate keeps a
//! read-only rendering utility instead, used by the CLI demo and tests,
//! never consulted by the evaluator).
//!
//! Supports the same three output formats the teacher crate's compiler
//! pipeline visualizer used for its own intermediate representations:
//! Mermaid (renders inline in markdown/GitHub), DOT/Graphviz, and an
//! ASCII tree for terminal viewing.

use crate::ast::{AstNode, BinaryOperator, UnaryOperator};
use crate::table::ParsingTable;
use std::fmt::Write as FmtWrite;

/// Visualization output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualizationFormat {
    Mermaid,
    Dot,
    AsciiTree,
}

/// Types that can render themselves for debugging in one of the
/// supported formats.
pub trait Visualize {
    fn visualize(&self, format: VisualizationFormat) -> String;
}

impl Visualize for AstNode {
    fn visualize(&self, format: VisualizationFormat) -> String {
        match format {
            VisualizationFormat::Mermaid => visualize_ast_mermaid(self),
            VisualizationFormat::Dot => visualize_ast_dot(self),
            VisualizationFormat::AsciiTree => {
                let mut out = String::new();
                visualize_ast_ascii(self, 0, &mut out);
                out
            }
        }
    }
}

fn node_label(node: &AstNode) -> String {
    match node {
        AstNode::Number(n) => format!("Number({n})"),
        AstNode::Boolean(b) => format!("Boolean({b})"),
        AstNode::Variable(name) => format!("Variable({name})"),
        AstNode::BinaryOp { op, .. } => format!("BinaryOp({})", binary_op_symbol(*op)),
        AstNode::UnaryOp { op, .. } => format!("UnaryOp({})", unary_op_symbol(*op)),
        AstNode::FunctionCall { name, args } => format!("FunctionCall({name}, {} args)", args.len()),
        AstNode::If { .. } => "If".to_string(),
        AstNode::Arguments(list) => format!("Arguments({})", list.len()),
    }
}

fn binary_op_symbol(op: BinaryOperator) -> &'static str {
    op.as_str()
}

fn unary_op_symbol(op: UnaryOperator) -> &'static str {
    op.as_str()
}

fn visualize_ast_mermaid(root: &AstNode) -> String {
    let mut out = String::from("graph TD\n");
    let mut counter = 0usize;
    visit_ast_mermaid(root, &mut counter, None, &mut out);
    out
}

fn visit_ast_mermaid(
    node: &AstNode,
    counter: &mut usize,
    parent_id: Option<usize>,
    out: &mut String,
) {
    let id = *counter;
    *counter += 1;
    let label = node_label(node).replace('"', "'");
    let _ = writeln!(out, "  n{id}[\"{label}\"]");
    if let Some(parent) = parent_id {
        let _ = writeln!(out, "  n{parent} --> n{id}");
    }
    for child in node.children() {
        visit_ast_mermaid(child, counter, Some(id), out);
    }
}

fn visualize_ast_dot(root: &AstNode) -> String {
    let mut out = String::from("digraph AST {\n");
    let mut counter = 0usize;
    visit_ast_dot(root, &mut counter, None, &mut out);
    out.push_str("}\n");
    out
}

fn visit_ast_dot(node: &AstNode, counter: &mut usize, parent_id: Option<usize>, out: &mut String) {
    let id = *counter;
    *counter += 1;
    let label = node_label(node).replace('"', "'");
    let _ = writeln!(out, "  n{id} [label=\"{label}\"];");
    if let Some(parent) = parent_id {
        let _ = writeln!(out, "  n{parent} -> n{id};");
    }
    for child in node.children() {
        visit_ast_dot(child, counter, Some(id), out);
    }
}

fn visualize_ast_ascii(node: &AstNode, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    let _ = writeln!(out, "{indent}{}", node_label(node));
    for child in node.children() {
        visualize_ast_ascii(child, depth + 1, out);
    }
}

/// A compact text summary of a built parsing table's density/compression
/// statistics (§4.D), for diagnostics — not part of any required API.
pub fn describe_table(table: &ParsingTable) -> String {
    format!(
        "states={} action_density={:.3} goto_density={:.3}",
        table.num_states,
        table.stats.action_density(),
        table.stats.goto_density()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstNode;
    use crate::table::build_default_table;

    fn sample_tree() -> AstNode {
        AstNode::binary_op(
            AstNode::number(1.0).unwrap(),
            "+",
            AstNode::unary_op("-", AstNode::variable("x").unwrap()).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn ascii_tree_contains_every_node_label() {
        let rendered = sample_tree().visualize(VisualizationFormat::AsciiTree);
        assert!(rendered.contains("BinaryOp(+)"));
        assert!(rendered.contains("UnaryOp(-)"));
        assert!(rendered.contains("Variable(x)"));
        assert!(rendered.contains("Number(1)"));
    }

    #[test]
    fn mermaid_output_is_well_formed_graph() {
        let rendered = sample_tree().visualize(VisualizationFormat::Mermaid);
        assert!(rendered.starts_with("graph TD"));
        assert!(rendered.contains("-->"));
    }

    #[test]
    fn dot_output_is_well_formed_digraph() {
        let rendered = sample_tree().visualize(VisualizationFormat::Dot);
        assert!(rendered.starts_with("digraph AST {"));
        assert!(rendered.trim_end().ends_with('}'));
    }

    #[test]
    fn table_description_reports_nonzero_density() {
        let table = build_default_table().unwrap();
        let description = describe_table(&table);
        assert!(description.contains("states="));
    }
}
