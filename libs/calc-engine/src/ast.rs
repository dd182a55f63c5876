//! Abstract syntax tree model (§3, §4.F).
//!
//! `AstNode` is a closed, structurally-equal tree with no shared subtrees
//! (acyclic by construction: every constructor takes owned children).
//! Invariants that can't be expressed in the type system — finite numbers,
//! valid identifier syntax, closed operator sets, and tree-shape bounds —
//! are enforced in the factory functions rather than left to callers, the
//! same way the AST module upstream centralizes its node-shape invariants
//! in constructors instead of scattering `debug_assert!`s at call sites.

use crate::error::{Error, Result};
use crate::limits::Limits;
use smallvec::SmallVec;

/// Binary operators, closed over the set the grammar can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

impl BinaryOperator {
    fn from_str(op: &str) -> Option<Self> {
        Some(match op {
            "+" => Self::Add,
            "-" => Self::Subtract,
            "*" => Self::Multiply,
            "/" => Self::Divide,
            "%" => Self::Modulo,
            "^" => Self::Power,
            "==" => Self::Equal,
            "!=" => Self::NotEqual,
            "<" => Self::Less,
            "<=" => Self::LessEqual,
            ">" => Self::Greater,
            ">=" => Self::GreaterEqual,
            "&&" => Self::And,
            "||" => Self::Or,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::Power => "^",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Equal
                | Self::NotEqual
                | Self::Less
                | Self::LessEqual
                | Self::Greater
                | Self::GreaterEqual
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }
}

/// Unary operators, closed over the set the grammar can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Plus,
    Negate,
    Not,
}

impl UnaryOperator {
    fn from_str(op: &str) -> Option<Self> {
        Some(match op {
            "+" => Self::Plus,
            "-" => Self::Negate,
            "!" => Self::Not,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plus => "+",
            Self::Negate => "-",
            Self::Not => "!",
        }
    }
}

/// The AST node set (§3). `Arguments` is an internal-only variant used
/// solely to thread function-call argument lists through the parser's
/// reduction stack; it never appears in a tree returned to a caller.
#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    Number(f64),
    Boolean(bool),
    Variable(String),
    BinaryOp {
        op: BinaryOperator,
        left: Box<AstNode>,
        right: Box<AstNode>,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<AstNode>,
    },
    FunctionCall {
        name: String,
        args: SmallVec<[AstNode; 4]>,
    },
    If {
        condition: Box<AstNode>,
        then_branch: Box<AstNode>,
        else_branch: Box<AstNode>,
    },
    /// Parser-internal: a pending argument list. Never constructed through
    /// a public factory and never a valid leaf of a finished tree.
    Arguments(Vec<AstNode>),
}

/// A valid identifier: starts with a letter or underscore, followed by
/// letters, digits, or underscores (§3).
pub(crate) fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A valid function name: like `is_valid_identifier`, but the leading
/// character must be a letter; unlike variables, function names may not
/// start with an underscore (§3).
fn is_valid_function_name(name: &str) -> bool {
    matches!(name.chars().next(), Some(c) if c.is_ascii_alphabetic()) && is_valid_identifier(name)
}

impl AstNode {
    pub fn number(value: f64) -> Result<AstNode> {
        if !value.is_finite() {
            return Err(Error::InvalidASTNode {
                message: format!("number literal must be finite, got {value}"),
            });
        }
        Ok(AstNode::Number(value))
    }

    pub fn boolean(value: bool) -> AstNode {
        AstNode::Boolean(value)
    }

    pub fn variable(name: impl Into<String>) -> Result<AstNode> {
        let name = name.into();
        if !is_valid_identifier(&name) {
            return Err(Error::InvalidASTNode {
                message: format!("'{name}' is not a valid variable identifier"),
            });
        }
        Ok(AstNode::Variable(name))
    }

    pub fn binary_op(left: AstNode, op: &str, right: AstNode) -> Result<AstNode> {
        let op = BinaryOperator::from_str(op).ok_or_else(|| Error::InvalidASTNode {
            message: format!("'{op}' is not a valid binary operator"),
        })?;
        Ok(AstNode::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn unary_op(op: &str, operand: AstNode) -> Result<AstNode> {
        let op = UnaryOperator::from_str(op).ok_or_else(|| Error::InvalidASTNode {
            message: format!("'{op}' is not a valid unary operator"),
        })?;
        Ok(AstNode::UnaryOp {
            op,
            operand: Box::new(operand),
        })
    }

    pub fn function_call(name: impl Into<String>, args: Vec<AstNode>) -> Result<AstNode> {
        let name = name.into();
        // FUNCTION tokens carry the trailing '(' stripped by the lexer; the
        // identifier portion alone must still satisfy the naming rule, which
        // for function names additionally forbids a leading underscore.
        if !is_valid_function_name(&name) {
            return Err(Error::InvalidASTNode {
                message: format!("'{name}' is not a valid function name"),
            });
        }
        Ok(AstNode::FunctionCall {
            name,
            args: SmallVec::from_vec(args),
        })
    }

    pub fn if_node(condition: AstNode, then_branch: AstNode, else_branch: AstNode) -> Result<AstNode> {
        Ok(AstNode::If {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    /// Validates the finished tree against the shape limits (§3 invariant
    /// 4): depth and node count. Called once, on the root, after parsing
    /// completes — not on every intermediate reduction, since a
    /// within-limits whole can be built from momentarily-deep fragments
    /// only if the grammar allowed it, which it doesn't (expressions nest
    /// strictly through parens/arguments).
    pub fn validate_shape(&self, limits: &Limits) -> Result<()> {
        let depth = self.depth();
        if depth > limits.max_ast_depth {
            return Err(Error::DepthExceeded {
                depth,
                max: limits.max_ast_depth,
            });
        }
        let size = self.size();
        if size > limits.max_ast_nodes {
            return Err(Error::SizeExceeded {
                size,
                max: limits.max_ast_nodes,
            });
        }
        Ok(())
    }

    /// Direct children, in evaluation order.
    pub fn children(&self) -> Vec<&AstNode> {
        match self {
            AstNode::Number(_) | AstNode::Boolean(_) | AstNode::Variable(_) => Vec::new(),
            AstNode::BinaryOp { left, right, .. } => vec![left, right],
            AstNode::UnaryOp { operand, .. } => vec![operand],
            AstNode::FunctionCall { args, .. } => args.iter().collect(),
            AstNode::If {
                condition,
                then_branch,
                else_branch,
            } => vec![condition, then_branch, else_branch],
            AstNode::Arguments(list) => list.iter().collect(),
        }
    }

    /// Tree depth; a leaf has depth 1.
    pub fn depth(&self) -> usize {
        match self.children().iter().map(|c| c.depth()).max() {
            Some(max_child) => 1 + max_child,
            None => 1,
        }
    }

    /// Total node count, including `self`.
    pub fn size(&self) -> usize {
        1 + self.children().iter().map(|c| c.size()).sum::<usize>()
    }

    /// Free variables referenced anywhere in the tree, deduplicated.
    pub fn variables(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_variables(&mut names);
        names.sort();
        names.dedup();
        names
    }

    fn collect_variables(&self, out: &mut Vec<String>) {
        if let AstNode::Variable(name) = self {
            out.push(name.clone());
        }
        for child in self.children() {
            child.collect_variables(out);
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, AstNode::Number(_) | AstNode::Boolean(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_rejects_non_finite() {
        assert!(AstNode::number(f64::NAN).is_err());
        assert!(AstNode::number(f64::INFINITY).is_err());
        assert!(AstNode::number(1.5).is_ok());
    }

    #[test]
    fn variable_rejects_invalid_identifiers() {
        assert!(AstNode::variable("1abc").is_err());
        assert!(AstNode::variable("a-b").is_err());
        assert!(AstNode::variable("_valid9").is_ok());
    }

    #[test]
    fn function_names_must_start_with_a_letter() {
        assert!(AstNode::function_call("_helper", vec![]).is_err());
        assert!(AstNode::function_call("1abc", vec![]).is_err());
        assert!(AstNode::function_call("ROUND", vec![]).is_ok());
    }

    #[test]
    fn depth_and_size_of_leaf() {
        let leaf = AstNode::number(1.0).unwrap();
        assert_eq!(leaf.depth(), 1);
        assert_eq!(leaf.size(), 1);
    }

    #[test]
    fn depth_and_size_of_nested_tree() {
        let tree = AstNode::binary_op(
            AstNode::number(1.0).unwrap(),
            "+",
            AstNode::unary_op("-", AstNode::number(2.0).unwrap()).unwrap(),
        )
        .unwrap();
        assert_eq!(tree.depth(), 3);
        assert_eq!(tree.size(), 4);
    }

    #[test]
    fn free_variables_are_deduplicated_and_sorted() {
        let tree = AstNode::binary_op(
            AstNode::variable("b").unwrap(),
            "+",
            AstNode::variable("a").unwrap(),
        )
        .unwrap();
        let tree = AstNode::binary_op(tree, "*", AstNode::variable("b").unwrap()).unwrap();
        assert_eq!(tree.variables(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn validate_shape_rejects_excess_depth() {
        let mut node = AstNode::number(1.0).unwrap();
        for _ in 0..40 {
            node = AstNode::unary_op("-", node).unwrap();
        }
        let limits = Limits::default();
        assert!(matches!(
            node.validate_shape(&limits),
            Err(Error::DepthExceeded { .. })
        ));
    }
}
