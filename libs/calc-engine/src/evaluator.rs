//! Evaluator (§4.H): a post-order tree walk producing a runtime `Value`
//! from an (optimized or raw) AST and a variable environment.
//!
//! `&&`/`||` are strict here per spec.md's explicit fixing of that open
//! question: both operands are always evaluated, never short-circuited.

use crate::ast::{AstNode, BinaryOperator, UnaryOperator};
use crate::error::{Error, Result};
use crate::functions::{self, FunctionRegistry};
use crate::limits::Limits;
use crate::value::{Environment, Value};

pub struct Evaluator<'a> {
    registry: &'a FunctionRegistry,
    limits: &'a Limits,
}

impl<'a> Evaluator<'a> {
    pub fn new(registry: &'a FunctionRegistry, limits: &'a Limits) -> Self {
        Self { registry, limits }
    }

    pub fn evaluate(&self, node: &AstNode, env: &Environment) -> Result<Value> {
        self.eval_depth(node, env, 0)
    }

    fn eval_depth(&self, node: &AstNode, env: &Environment, depth: usize) -> Result<Value> {
        if depth > self.limits.max_eval_depth {
            return Err(Error::StackOverflow {
                max: self.limits.max_eval_depth,
            });
        }
        match node {
            AstNode::Number(n) => Ok(Value::Number(*n)),
            AstNode::Boolean(b) => Ok(Value::Boolean(*b)),
            AstNode::Variable(name) => {
                if functions::is_reserved(name) {
                    return Err(Error::SecurityViolation { name: name.clone() });
                }
                env.get(name)
                    .cloned()
                    .ok_or_else(|| Error::UndefinedVariable { name: name.clone() })
            }
            AstNode::UnaryOp { op, operand } => {
                let value = self.eval_depth(operand, env, depth + 1)?;
                self.apply_unary(*op, value)
            }
            AstNode::BinaryOp { op, left, right } => {
                // Strict: both sides evaluate before the operator applies,
                // even for `&&`/`||` (§4.H).
                let left_value = self.eval_depth(left, env, depth + 1)?;
                let right_value = self.eval_depth(right, env, depth + 1)?;
                self.apply_binary(*op, left_value, right_value)
            }
            AstNode::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let cond = self.eval_depth(condition, env, depth + 1)?;
                match cond {
                    Value::Boolean(true) => self.eval_depth(then_branch, env, depth + 1),
                    Value::Boolean(false) => self.eval_depth(else_branch, env, depth + 1),
                    other => Err(Error::TypeMismatch {
                        message: format!("if condition must be boolean, got {}", other.type_name()),
                    }),
                }
            }
            AstNode::FunctionCall { name, args } => {
                if functions::is_reserved(name) {
                    return Err(Error::SecurityViolation { name: name.clone() });
                }
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval_depth(arg, env, depth + 1)?);
                }
                self.registry.call(name, &values)
            }
            AstNode::Arguments(_) => Err(Error::InvalidASTNode {
                message: "Arguments node reached the evaluator; parser produced an incomplete tree".into(),
            }),
        }
    }

    fn apply_unary(&self, op: UnaryOperator, value: Value) -> Result<Value> {
        match (op, value) {
            (UnaryOperator::Plus, Value::Number(n)) => Ok(Value::Number(n)),
            (UnaryOperator::Negate, Value::Number(n)) => Ok(Value::Number(-n)),
            (UnaryOperator::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
            (op, value) => Err(Error::TypeMismatch {
                message: format!(
                    "unary '{}' is not defined for {}",
                    op.as_str(),
                    value.type_name()
                ),
            }),
        }
    }

    fn apply_binary(&self, op: BinaryOperator, left: Value, right: Value) -> Result<Value> {
        use BinaryOperator::*;
        if op.is_logical() {
            return match (left, right) {
                (Value::Boolean(l), Value::Boolean(r)) => Ok(Value::Boolean(match op {
                    And => l && r,
                    Or => l || r,
                    _ => unreachable!(),
                })),
                (l, r) => Err(Error::TypeMismatch {
                    message: format!(
                        "'{}' requires boolean operands, got {} and {}",
                        op.as_str(),
                        l.type_name(),
                        r.type_name()
                    ),
                }),
            };
        }
        if op.is_comparison() {
            return self.apply_comparison(op, left, right);
        }
        let l = self.require_number(op, &left)?;
        let r = self.require_number(op, &right)?;
        match op {
            Add => Ok(Value::Number(l + r)),
            Subtract => Ok(Value::Number(l - r)),
            Multiply => Ok(Value::Number(l * r)),
            Divide => {
                if r == 0.0 {
                    Err(Error::DivisionByZero)
                } else {
                    Ok(Value::Number(l / r))
                }
            }
            Modulo => {
                if r == 0.0 {
                    Err(Error::DivisionByZero)
                } else {
                    Ok(Value::Number(l % r))
                }
            }
            Power => {
                if l == 0.0 && r == 0.0 {
                    Err(Error::DomainError {
                        message: "0 ^ 0 is undefined".into(),
                    })
                } else {
                    Ok(Value::Number(l.powf(r)))
                }
            }
            And | Or | Equal | NotEqual | Less | LessEqual | Greater | GreaterEqual => {
                unreachable!("handled above")
            }
        }
    }

    fn apply_comparison(&self, op: BinaryOperator, left: Value, right: Value) -> Result<Value> {
        use BinaryOperator::*;
        let result = match (&left, &right) {
            (Value::Number(l), Value::Number(r)) => match op {
                Equal => l == r,
                NotEqual => l != r,
                Less => l < r,
                LessEqual => l <= r,
                Greater => l > r,
                GreaterEqual => l >= r,
                _ => unreachable!(),
            },
            (Value::Boolean(l), Value::Boolean(r)) if matches!(op, Equal | NotEqual) => {
                if op == Equal {
                    l == r
                } else {
                    l != r
                }
            }
            (Value::String(l), Value::String(r)) if matches!(op, Equal | NotEqual) => {
                if op == Equal {
                    l == r
                } else {
                    l != r
                }
            }
            _ => {
                return Err(Error::TypeMismatch {
                    message: format!(
                        "cannot compare {} with {} using '{}'",
                        left.type_name(),
                        right.type_name(),
                        op.as_str()
                    ),
                })
            }
        };
        Ok(Value::Boolean(result))
    }

    fn require_number(&self, op: BinaryOperator, value: &Value) -> Result<f64> {
        value.as_number().ok_or_else(|| Error::TypeMismatch {
            message: format!(
                "'{}' requires numeric operands, got {}",
                op.as_str(),
                value.type_name()
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(node: &AstNode, env: &Environment) -> Result<Value> {
        let registry = FunctionRegistry::new();
        let limits = Limits::default();
        Evaluator::new(&registry, &limits).evaluate(node, env)
    }

    #[test]
    fn evaluates_literals() {
        assert_eq!(
            eval(&AstNode::Number(4.0), &Environment::new()).unwrap(),
            Value::Number(4.0)
        );
        assert_eq!(
            eval(&AstNode::Boolean(true), &Environment::new()).unwrap(),
            Value::Boolean(true)
        );
    }

    #[test]
    fn undefined_variable_errors() {
        let node = AstNode::variable("x").unwrap();
        let err = eval(&node, &Environment::new()).unwrap_err();
        assert!(matches!(err, Error::UndefinedVariable { .. }));
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let node =
            AstNode::binary_op(AstNode::number(1.0).unwrap(), "/", AstNode::number(0.0).unwrap())
                .unwrap();
        let err = eval(&node, &Environment::new()).unwrap_err();
        assert!(matches!(err, Error::DivisionByZero));
    }

    #[test]
    fn zero_pow_zero_is_a_domain_error() {
        let node =
            AstNode::binary_op(AstNode::number(0.0).unwrap(), "^", AstNode::number(0.0).unwrap())
                .unwrap();
        let err = eval(&node, &Environment::new()).unwrap_err();
        assert!(matches!(err, Error::DomainError { .. }));
    }

    #[test]
    fn if_requires_boolean_condition() {
        let node = AstNode::if_node(
            AstNode::number(1.0).unwrap(),
            AstNode::number(2.0).unwrap(),
            AstNode::number(3.0).unwrap(),
        )
        .unwrap();
        let err = eval(&node, &Environment::new()).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn logical_operators_are_strict_not_short_circuiting() {
        // Both sides must evaluate even though `false && x` could
        // short-circuit; an undefined variable on the right must still error.
        let node = AstNode::binary_op(
            AstNode::Boolean(false),
            "&&",
            AstNode::variable("undefined").unwrap(),
        )
        .unwrap();
        let err = eval(&node, &Environment::new()).unwrap_err();
        assert!(matches!(err, Error::UndefinedVariable { .. }));
    }

    #[test]
    fn security_violation_on_reserved_variable_name() {
        let node = AstNode::variable("eval").unwrap();
        let err = eval(&node, &Environment::new()).unwrap_err();
        assert!(matches!(err, Error::SecurityViolation { .. }));
    }

    #[test]
    fn function_call_dispatches_to_registry() {
        let node = AstNode::function_call("MAX", vec![
            AstNode::number(4.0).unwrap(),
            AstNode::number(5.0).unwrap(),
            AstNode::number(6.0).unwrap(),
        ])
        .unwrap();
        assert_eq!(
            eval(&node, &Environment::new()).unwrap(),
            Value::Number(6.0)
        );
    }

    #[test]
    fn recursion_depth_limit_is_enforced() {
        let mut node = AstNode::number(1.0).unwrap();
        for _ in 0..200 {
            node = AstNode::unary_op("-", node).unwrap();
        }
        let err = eval(&node, &Environment::new()).unwrap_err();
        assert!(matches!(err, Error::StackOverflow { .. }));
    }
}
