//! AST optimizer (§4.G): a bottom-up, fixed-point rewrite pass.
//!
//! Children are optimized before their parent is considered, and the whole
//! tree is re-optimized pass after pass until nothing changes or
//! `Limits::max_optimizer_passes` is reached — mirroring the fixed-point
//! convention the table builder uses for FIRST-set computation
//! (`table.rs::compute_first_sets`), generalized here to tree rewriting
//! instead of set growth.

use crate::ast::{AstNode, BinaryOperator, UnaryOperator};
use crate::limits::Limits;

/// Optimizes `node` to a fixed point, capped at `limits.max_optimizer_passes`
/// whole-tree passes. Folding never happens for division/modulus-by-zero or
/// `0^0` — those nodes are preserved so the evaluator raises the matching
/// runtime error deterministically (§4.G).
pub fn optimize(node: AstNode, limits: &Limits) -> AstNode {
    let mut current = node;
    for _ in 0..limits.max_optimizer_passes {
        let (next, changed) = optimize_pass(current);
        current = next;
        if !changed {
            break;
        }
    }
    current
}

fn optimize_pass(node: AstNode) -> (AstNode, bool) {
    match node {
        AstNode::Number(_) | AstNode::Boolean(_) | AstNode::Variable(_) => (node, false),
        AstNode::Arguments(items) => {
            let mut changed = false;
            let optimized = items
                .into_iter()
                .map(|item| {
                    let (n, c) = optimize_pass(item);
                    changed |= c;
                    n
                })
                .collect();
            (AstNode::Arguments(optimized), changed)
        }
        AstNode::UnaryOp { op, operand } => {
            let (operand, child_changed) = optimize_pass(*operand);
            let (rewritten, self_changed) = fold_unary(op, operand);
            (rewritten, child_changed || self_changed)
        }
        AstNode::BinaryOp { op, left, right } => {
            let (left, left_changed) = optimize_pass(*left);
            let (right, right_changed) = optimize_pass(*right);
            let (rewritten, self_changed) = fold_binary(op, left, right);
            (rewritten, left_changed || right_changed || self_changed)
        }
        AstNode::If {
            condition,
            then_branch,
            else_branch,
        } => {
            let (condition, c1) = optimize_pass(*condition);
            let (then_branch, c2) = optimize_pass(*then_branch);
            let (else_branch, c3) = optimize_pass(*else_branch);
            let (rewritten, self_changed) = fold_if(condition, then_branch, else_branch);
            (rewritten, c1 || c2 || c3 || self_changed)
        }
        AstNode::FunctionCall { name, args } => {
            // Functions are late-bound to the evaluator's registry and are
            // never folded here even when every argument is constant (§4.G).
            let mut changed = false;
            let optimized = args
                .into_iter()
                .map(|arg| {
                    let (n, c) = optimize_pass(arg);
                    changed |= c;
                    n
                })
                .collect();
            (
                AstNode::FunctionCall {
                    name,
                    args: optimized,
                },
                changed,
            )
        }
    }
}

fn fold_unary(op: UnaryOperator, operand: AstNode) -> (AstNode, bool) {
    // Double negation / double-not: -(-x) -> x, !!x -> x.
    if let AstNode::UnaryOp {
        op: inner_op,
        operand: inner_operand,
    } = &operand
    {
        match (op, inner_op) {
            (UnaryOperator::Negate, UnaryOperator::Negate)
            | (UnaryOperator::Not, UnaryOperator::Not) => {
                return ((**inner_operand).clone(), true);
            }
            _ => {}
        }
    }
    match (op, &operand) {
        (UnaryOperator::Plus, AstNode::Number(n)) => (AstNode::Number(*n), true),
        (UnaryOperator::Negate, AstNode::Number(n)) => (AstNode::Number(-*n), true),
        (UnaryOperator::Not, AstNode::Boolean(b)) => (AstNode::Boolean(!*b), true),
        _ => {
            let rebuilt = AstNode::UnaryOp {
                op,
                operand: Box::new(operand),
            };
            (rebuilt, false)
        }
    }
}

fn is_zero(node: &AstNode) -> bool {
    matches!(node, AstNode::Number(n) if *n == 0.0)
}

fn is_one(node: &AstNode) -> bool {
    matches!(node, AstNode::Number(n) if *n == 1.0)
}

fn structurally_equal(a: &AstNode, b: &AstNode) -> bool {
    a == b
}

fn fold_binary(op: BinaryOperator, left: AstNode, right: AstNode) -> (AstNode, bool) {
    use BinaryOperator::*;

    // Constant folding over Number/Boolean operands, except the two cases
    // the evaluator must raise at runtime: division/modulus by zero and 0^0.
    if let (AstNode::Number(l), AstNode::Number(r)) = (&left, &right) {
        let (l, r) = (*l, *r);
        match op {
            Add => return (AstNode::Number(l + r), true),
            Subtract => return (AstNode::Number(l - r), true),
            Multiply => return (AstNode::Number(l * r), true),
            Divide if r != 0.0 => return (AstNode::Number(l / r), true),
            Modulo if r != 0.0 => return (AstNode::Number(l % r), true),
            Power if !(l == 0.0 && r == 0.0) => return (AstNode::Number(l.powf(r)), true),
            Equal => return (AstNode::Boolean(l == r), true),
            NotEqual => return (AstNode::Boolean(l != r), true),
            Less => return (AstNode::Boolean(l < r), true),
            LessEqual => return (AstNode::Boolean(l <= r), true),
            Greater => return (AstNode::Boolean(l > r), true),
            GreaterEqual => return (AstNode::Boolean(l >= r), true),
            _ => {}
        }
    }
    if let (AstNode::Boolean(l), AstNode::Boolean(r)) = (&left, &right) {
        let (l, r) = (*l, *r);
        match op {
            And => return (AstNode::Boolean(l && r), true),
            Or => return (AstNode::Boolean(l || r), true),
            Equal => return (AstNode::Boolean(l == r), true),
            NotEqual => return (AstNode::Boolean(l != r), true),
            _ => {}
        }
    }

    // Identities and absorbers (§4.G). `0^0` is excluded above so it falls
    // through here unfolded and is preserved as-is.
    match op {
        Add if is_zero(&left) => return (right, true),
        Add if is_zero(&right) => return (left, true),
        Subtract if is_zero(&right) => return (left, true),
        Subtract if is_zero(&left) => {
            return (
                AstNode::UnaryOp {
                    op: UnaryOperator::Negate,
                    operand: Box::new(right),
                },
                true,
            )
        }
        Subtract if structurally_equal(&left, &right) => return (AstNode::Number(0.0), true),
        Multiply if is_one(&left) => return (right, true),
        Multiply if is_one(&right) => return (left, true),
        Multiply if is_zero(&left) || is_zero(&right) => return (AstNode::Number(0.0), true),
        Divide if is_one(&right) => return (left, true),
        Power if is_zero(&right) && !is_zero(&left) => return (AstNode::Number(1.0), true),
        Power if is_one(&right) => return (left, true),
        Power if is_one(&left) => return (AstNode::Number(1.0), true),
        _ => {}
    }

    let rebuilt = AstNode::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    };
    (rebuilt, false)
}

fn fold_if(condition: AstNode, then_branch: AstNode, else_branch: AstNode) -> (AstNode, bool) {
    match condition {
        AstNode::Boolean(true) => (then_branch, true),
        AstNode::Boolean(false) => (else_branch, true),
        condition => {
            if structurally_equal(&then_branch, &else_branch) {
                (then_branch, true)
            } else {
                let rebuilt = AstNode::If {
                    condition: Box::new(condition),
                    then_branch: Box::new(then_branch),
                    else_branch: Box::new(else_branch),
                };
                (rebuilt, false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opt(node: AstNode) -> AstNode {
        optimize(node, &Limits::default())
    }

    #[test]
    fn folds_constant_arithmetic() {
        let tree = AstNode::binary_op(
            AstNode::number(1.0).unwrap(),
            "+",
            AstNode::binary_op(AstNode::number(2.0).unwrap(), "*", AstNode::number(3.0).unwrap())
                .unwrap(),
        )
        .unwrap();
        assert_eq!(opt(tree), AstNode::Number(7.0));
    }

    #[test]
    fn does_not_fold_division_by_zero() {
        let tree =
            AstNode::binary_op(AstNode::number(1.0).unwrap(), "/", AstNode::number(0.0).unwrap())
                .unwrap();
        let optimized = opt(tree.clone());
        assert_eq!(optimized, tree);
    }

    #[test]
    fn does_not_fold_zero_to_the_zero() {
        let tree =
            AstNode::binary_op(AstNode::number(0.0).unwrap(), "^", AstNode::number(0.0).unwrap())
                .unwrap();
        let optimized = opt(tree.clone());
        assert_eq!(optimized, tree);
    }

    #[test]
    fn identity_additive_and_multiplicative() {
        let x = AstNode::variable("x").unwrap();
        let plus_zero = AstNode::binary_op(x.clone(), "+", AstNode::number(0.0).unwrap()).unwrap();
        assert_eq!(opt(plus_zero), x);

        let times_one = AstNode::binary_op(x.clone(), "*", AstNode::number(1.0).unwrap()).unwrap();
        assert_eq!(opt(times_one), x);

        let times_zero = AstNode::binary_op(x.clone(), "*", AstNode::number(0.0).unwrap()).unwrap();
        assert_eq!(opt(times_zero), AstNode::Number(0.0));
    }

    #[test]
    fn self_subtraction_cancels() {
        let x = AstNode::variable("x").unwrap();
        let tree = AstNode::binary_op(x.clone(), "-", x).unwrap();
        assert_eq!(opt(tree), AstNode::Number(0.0));
    }

    #[test]
    fn double_negation_and_double_not_cancel() {
        let x = AstNode::variable("x").unwrap();
        let neg_neg = AstNode::unary_op("-", AstNode::unary_op("-", x.clone()).unwrap()).unwrap();
        assert_eq!(opt(neg_neg), x);

        let b = AstNode::variable("b").unwrap();
        let not_not = AstNode::unary_op("!", AstNode::unary_op("!", b.clone()).unwrap()).unwrap();
        assert_eq!(opt(not_not), b);
    }

    #[test]
    fn if_folds_on_constant_condition() {
        let then_branch = AstNode::number(1.0).unwrap();
        let else_branch = AstNode::number(2.0).unwrap();
        let tree = AstNode::if_node(
            AstNode::Boolean(true),
            then_branch.clone(),
            else_branch.clone(),
        )
        .unwrap();
        assert_eq!(opt(tree), then_branch);

        let tree = AstNode::if_node(AstNode::Boolean(false), then_branch, else_branch.clone())
            .unwrap();
        assert_eq!(opt(tree), else_branch);
    }

    #[test]
    fn if_folds_when_branches_are_structurally_equal() {
        let x = AstNode::variable("x").unwrap();
        let tree = AstNode::if_node(AstNode::variable("c").unwrap(), x.clone(), x.clone()).unwrap();
        assert_eq!(opt(tree), x);
    }

    #[test]
    fn function_calls_are_never_folded() {
        let tree =
            AstNode::function_call("ABS", vec![AstNode::number(-1.0).unwrap()]).unwrap();
        assert_eq!(opt(tree.clone()), tree);
    }

    #[test]
    fn optimizer_is_idempotent() {
        let tree = AstNode::binary_op(
            AstNode::variable("x").unwrap(),
            "+",
            AstNode::binary_op(AstNode::number(1.0).unwrap(), "+", AstNode::number(2.0).unwrap())
                .unwrap(),
        )
        .unwrap();
        let once = opt(tree);
        let twice = optimize(once.clone(), &Limits::default());
        assert_eq!(once, twice);
    }
}
