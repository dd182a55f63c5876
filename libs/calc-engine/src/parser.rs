//! LR(1) parser runtime (§4.E): a shift/reduce driver consuming a
//! pre-built `ParsingTable` and producing an `AstNode`.
//!
//! The driver owns two parallel stacks (states, fragments) and a cursor
//! into the token stream, exactly the "state stack + AST stack + cursor"
//! triple §4.E names. A single `Parser` is built fresh per parse; the table
//! and grammar it reads are shared, immutable, and safe to hand to any
//! number of concurrent parsers (§5).

use crate::ast::AstNode;
use crate::error::{Error, Result};
use crate::grammar::{Grammar, StackSymbol, Terminal};
use crate::limits::Limits;
use crate::table::{Action, ParsingTable};
use crate::token::{Token, TokenType};

pub struct Parser<'a> {
    grammar: &'a Grammar,
    table: &'a ParsingTable,
    limits: &'a Limits,
}

impl<'a> Parser<'a> {
    pub fn new(grammar: &'a Grammar, table: &'a ParsingTable, limits: &'a Limits) -> Self {
        Self {
            grammar,
            table,
            limits,
        }
    }

    /// Drives the table over `tokens`, returning the single AST fragment
    /// remaining on `Accept`. `tokens` must be terminated by a `Dollar`
    /// token (the lexer's contract).
    pub fn parse(&self, tokens: Vec<Token>) -> Result<AstNode> {
        let mut run = ParseRun {
            grammar: self.grammar,
            table: self.table,
            limits: self.limits,
            tokens,
            cursor: 0,
            state_stack: vec![0],
            fragment_stack: Vec::new(),
            steps: 0,
            errors_recovered: 0,
        };
        run.drive()
    }
}

struct ParseRun<'a> {
    grammar: &'a Grammar,
    table: &'a ParsingTable,
    limits: &'a Limits,
    tokens: Vec<Token>,
    cursor: usize,
    state_stack: Vec<usize>,
    fragment_stack: Vec<StackSymbol>,
    steps: usize,
    errors_recovered: usize,
}

/// Parser error recovery is bounded to 3 retries (§7, optional). Recovery
/// only ever changes which errors are reported together in one pass; it
/// never influences the AST a successful parse produces.
const MAX_ERROR_RECOVERIES: usize = 3;

impl<'a> ParseRun<'a> {
    fn current_token(&self) -> &Token {
        &self.tokens[self.cursor.min(self.tokens.len() - 1)]
    }

    fn current_terminal(&self) -> Result<Terminal> {
        let token = self.current_token();
        Terminal::from_token_type(token.token_type).ok_or_else(|| Error::UnexpectedToken {
            lexeme: token.lexeme.clone(),
            position: token.position,
        })
    }

    fn drive(&mut self) -> Result<AstNode> {
        loop {
            self.steps += 1;
            if self.steps > self.limits.max_parser_steps {
                return Err(Error::StepLimitExceeded {
                    max: self.limits.max_parser_steps,
                });
            }
            if self.state_stack.len() > self.limits.max_parser_stack {
                return Err(Error::StackOverflow {
                    max: self.limits.max_parser_stack,
                });
            }

            let state = *self.state_stack.last().unwrap();
            let terminal = match self.current_terminal() {
                Ok(t) => t,
                Err(e) => return self.handle_error(e),
            };

            match self.table.action(state, terminal).clone() {
                Action::Shift(next_state) => {
                    let token = self.tokens[self.cursor].clone();
                    self.fragment_stack.push(StackSymbol::Token(token));
                    self.state_stack.push(next_state);
                    self.cursor += 1;
                }
                Action::Reduce(production_id) => {
                    self.reduce(production_id)?;
                }
                Action::Accept => {
                    return self.finish();
                }
                Action::Error(message) => {
                    let token = self.current_token();
                    let err = message
                        .map(|m| Error::UnexpectedToken {
                            lexeme: m,
                            position: token.position,
                        })
                        .unwrap_or_else(|| self.classify_error(token));
                    return self.handle_error(err);
                }
            }
        }
    }

    fn reduce(&mut self, production_id: usize) -> Result<()> {
        let production = &self.grammar.productions[production_id];
        let arity = production.right.len();
        let split_at = self.fragment_stack.len() - arity;
        let popped: Vec<StackSymbol> = self.fragment_stack.split_off(split_at);
        self.state_stack.truncate(self.state_stack.len() - arity);

        let node = (production.builder)(popped)?;

        let exposed_state = *self.state_stack.last().unwrap();
        let goto_state = self
            .table
            .goto(exposed_state, production.left)
            .ok_or_else(|| Error::UnexpectedToken {
                lexeme: self.current_token().lexeme.clone(),
                position: self.current_token().position,
            })?;
        self.state_stack.push(goto_state);
        self.fragment_stack.push(StackSymbol::Node(node));
        Ok(())
    }

    fn finish(&mut self) -> Result<AstNode> {
        if self.fragment_stack.len() != 1 {
            return Err(Error::UnexpectedEndOfInput {
                position: self.current_token().position,
            });
        }
        self.fragment_stack.pop().unwrap().into_node()
    }

    /// Distinguishes an unmatched-parenthesis situation from a generic
    /// unexpected token, and a bare end-of-input from either (§7, property 7).
    fn classify_error(&self, token: &Token) -> Error {
        match token.token_type {
            TokenType::Dollar => {
                if self.has_unclosed_paren() {
                    Error::UnbalancedParentheses {
                        position: token.position,
                    }
                } else {
                    Error::UnexpectedEndOfInput {
                        position: token.position,
                    }
                }
            }
            TokenType::RightParen => Error::UnbalancedParentheses {
                position: token.position,
            },
            _ => Error::UnexpectedToken {
                lexeme: token.lexeme.clone(),
                position: token.position,
            },
        }
    }

    fn has_unclosed_paren(&self) -> bool {
        let mut depth = 0i64;
        for tok in &self.tokens[..self.cursor.min(self.tokens.len())] {
            match tok.token_type {
                TokenType::LeftParen => depth += 1,
                TokenType::RightParen => depth -= 1,
                _ => {}
            }
        }
        depth != 0
    }

    /// On the first few errors, skip the offending token and retry from
    /// the same state. Any error beyond `MAX_ERROR_RECOVERIES` is fatal (§7).
    fn handle_error(&mut self, err: Error) -> Result<AstNode> {
        if self.errors_recovered >= MAX_ERROR_RECOVERIES {
            return Err(err);
        }
        if self.cursor >= self.tokens.len() - 1 {
            // Already at or past the Dollar sentinel: nothing left to skip.
            return Err(err);
        }
        self.errors_recovered += 1;
        self.cursor += 1;
        self.drive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::table::TableBuilder;

    fn parse(input: &str) -> Result<AstNode> {
        let limits = Limits::default();
        let grammar = Grammar::new();
        let table = TableBuilder::new(&grammar).build().unwrap();
        let tokens = Lexer::new(input, &limits)?.tokenize()?;
        Parser::new(&grammar, &table, &limits).parse(tokens)
    }

    #[test]
    fn parses_simple_arithmetic() {
        let ast = parse("1 + 2 * 3").unwrap();
        assert!(matches!(ast, AstNode::BinaryOp { .. }));
    }

    #[test]
    fn parses_parenthesized_expression() {
        let ast = parse("(1 + 2) * 3").unwrap();
        match ast {
            AstNode::BinaryOp { op, .. } => {
                assert_eq!(op.as_str(), "*");
            }
            _ => panic!("expected top-level multiply"),
        }
    }

    #[test]
    fn parses_function_call_with_arguments() {
        let ast = parse("MIN(1, 2, 3)").unwrap();
        match ast {
            AstNode::FunctionCall { name, args } => {
                assert_eq!(name, "MIN");
                assert_eq!(args.len(), 3);
            }
            _ => panic!("expected function call"),
        }
    }

    #[test]
    fn parses_conditional_expression() {
        let ast = parse("if(a > b, a, b)").unwrap();
        assert!(matches!(ast, AstNode::If { .. }));
    }

    #[test]
    fn rejects_unbalanced_parentheses() {
        let err = parse("(1 + 2").unwrap_err();
        assert!(matches!(err, Error::UnbalancedParentheses { .. }));
    }

    #[test]
    fn parse_is_deterministic_across_runs() {
        let a = parse("1 + 2 * (3 - 4) / 5").unwrap();
        let b = parse("1 + 2 * (3 - 4) / 5").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn right_associative_power_nests_on_the_right() {
        let ast = parse("2 ^ 3 ^ 2").unwrap();
        match ast {
            AstNode::BinaryOp { left, right, .. } => {
                assert!(matches!(*left, AstNode::Number(n) if n == 2.0));
                assert!(matches!(*right, AstNode::BinaryOp { .. }));
            }
            _ => panic!("expected binary op"),
        }
    }

    #[test]
    fn empty_argument_list_parses() {
        let ast = parse("SUM()").unwrap();
        match ast {
            AstNode::FunctionCall { args, .. } => assert!(args.is_empty()),
            _ => panic!("expected function call"),
        }
    }
}
