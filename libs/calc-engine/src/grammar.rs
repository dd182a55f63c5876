//! Static grammar description: terminals, non-terminals, productions, and
//! the operator precedence/associativity table (§4.C).
//!
//! Expressed as `const`/`static` data and one `Grammar::new()` assembly
//! function, following the workspace's habit of building read-only lookup
//! tables once (see `functions.rs`'s `phf_map!` registry) rather than
//! re-deriving them on every use.

use crate::ast::AstNode;
use crate::error::{Error, Result};
use crate::token::{Token, TokenType};
use std::collections::HashMap;

/// Terminal symbols of the grammar (§3). `Dollar` is the end-of-input
/// sentinel; `Whitespace` is never produced by the lexer and has no
/// terminal counterpart here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Terminal {
    Number,
    Boolean,
    Variable,
    Plus,
    Minus,
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
    Not,
    LeftParen,
    RightParen,
    Comma,
    If,
    Function,
    Dollar,
}

pub const ALL_TERMINALS: &[Terminal] = &[
    Terminal::Number,
    Terminal::Boolean,
    Terminal::Variable,
    Terminal::Plus,
    Terminal::Minus,
    Terminal::Multiply,
    Terminal::Divide,
    Terminal::Modulo,
    Terminal::Power,
    Terminal::Equal,
    Terminal::NotEqual,
    Terminal::Less,
    Terminal::LessEqual,
    Terminal::Greater,
    Terminal::GreaterEqual,
    Terminal::And,
    Terminal::Or,
    Terminal::Not,
    Terminal::LeftParen,
    Terminal::RightParen,
    Terminal::Comma,
    Terminal::If,
    Terminal::Function,
    Terminal::Dollar,
];

impl Terminal {
    pub fn index(self) -> usize {
        ALL_TERMINALS.iter().position(|&t| t == self).expect("exhaustive")
    }

    pub fn from_token_type(tt: TokenType) -> Option<Terminal> {
        Some(match tt {
            TokenType::Number => Terminal::Number,
            TokenType::Boolean => Terminal::Boolean,
            TokenType::Variable => Terminal::Variable,
            TokenType::Plus => Terminal::Plus,
            TokenType::Minus => Terminal::Minus,
            TokenType::Multiply => Terminal::Multiply,
            TokenType::Divide => Terminal::Divide,
            TokenType::Modulo => Terminal::Modulo,
            TokenType::Power => Terminal::Power,
            TokenType::Equal => Terminal::Equal,
            TokenType::NotEqual => Terminal::NotEqual,
            TokenType::Less => Terminal::Less,
            TokenType::LessEqual => Terminal::LessEqual,
            TokenType::Greater => Terminal::Greater,
            TokenType::GreaterEqual => Terminal::GreaterEqual,
            TokenType::And => Terminal::And,
            TokenType::Or => Terminal::Or,
            TokenType::Not => Terminal::Not,
            TokenType::LeftParen => Terminal::LeftParen,
            TokenType::RightParen => Terminal::RightParen,
            TokenType::Comma => Terminal::Comma,
            TokenType::If => Terminal::If,
            TokenType::Function => Terminal::Function,
            TokenType::Dollar => Terminal::Dollar,
            TokenType::Whitespace => return None,
        })
    }
}

/// Non-terminal symbols of the grammar (§3), plus the augmented start
/// symbol `S'` used only internally by the table builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NonTerminal {
    AugmentedStart,
    Start,
    Expr,
    AndExpr,
    EqualityExpr,
    RelationalExpr,
    AdditiveExpr,
    MultiplicativeExpr,
    UnaryExpr,
    PowerExpr,
    PrimaryExpr,
    Atom,
    FunctionCall,
    Arguments,
    ArgumentList,
    ConditionalExpr,
}

pub const ALL_NON_TERMINALS: &[NonTerminal] = &[
    NonTerminal::AugmentedStart,
    NonTerminal::Start,
    NonTerminal::Expr,
    NonTerminal::AndExpr,
    NonTerminal::EqualityExpr,
    NonTerminal::RelationalExpr,
    NonTerminal::AdditiveExpr,
    NonTerminal::MultiplicativeExpr,
    NonTerminal::UnaryExpr,
    NonTerminal::PowerExpr,
    NonTerminal::PrimaryExpr,
    NonTerminal::Atom,
    NonTerminal::FunctionCall,
    NonTerminal::Arguments,
    NonTerminal::ArgumentList,
    NonTerminal::ConditionalExpr,
];

impl NonTerminal {
    pub fn index(self) -> usize {
        ALL_NON_TERMINALS
            .iter()
            .position(|&n| n == self)
            .expect("exhaustive")
    }
}

/// A grammar symbol: either a terminal or a non-terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Terminal(Terminal),
    NonTerminal(NonTerminal),
}

/// Operator associativity, used to break precedence ties during conflict
/// resolution (§4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Associativity {
    Left,
    Right,
}

/// An operator's precedence level and associativity (§4.C). Higher `level`
/// binds tighter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrecedenceEntry {
    pub level: u8,
    pub assoc: Associativity,
}

/// A fragment on the parser's AST stack: either a shifted token (its
/// lexeme/position may still be needed by a builder) or a reduced AST node.
/// `Arguments` nodes are an internal-only variant produced and consumed
/// entirely within this stack.
#[derive(Debug, Clone)]
pub enum StackSymbol {
    Token(Token),
    Node(AstNode),
}

impl StackSymbol {
    pub fn into_node(self) -> Result<AstNode> {
        match self {
            StackSymbol::Node(n) => Ok(n),
            StackSymbol::Token(t) => Err(Error::InvalidASTNode {
                message: format!("expected AST node fragment, found token '{}'", t.lexeme),
            }),
        }
    }

    pub fn into_token(self) -> Result<Token> {
        match self {
            StackSymbol::Token(t) => Ok(t),
            StackSymbol::Node(_) => Err(Error::InvalidASTNode {
                message: "expected token fragment, found AST node".into(),
            }),
        }
    }
}

pub type BuilderFn = fn(Vec<StackSymbol>) -> Result<AstNode>;

/// A single grammar production: `left -> right`, plus the AST-construction
/// action invoked at reduction time, and (for operator productions) the
/// precedence used to resolve shift/reduce conflicts against it.
pub struct Production {
    pub id: usize,
    pub left: NonTerminal,
    pub right: Vec<Symbol>,
    pub builder: BuilderFn,
    /// `Some` only for productions whose reduction is governed by an
    /// operator precedence (binary and unary operator productions).
    pub precedence: Option<PrecedenceEntry>,
}

impl Production {
    fn new(
        id: usize,
        left: NonTerminal,
        right: Vec<Symbol>,
        builder: BuilderFn,
        precedence: Option<PrecedenceEntry>,
    ) -> Self {
        Self {
            id,
            left,
            right,
            builder,
            precedence,
        }
    }
}

fn t(term: Terminal) -> Symbol {
    Symbol::Terminal(term)
}

fn nt(non_term: NonTerminal) -> Symbol {
    Symbol::NonTerminal(non_term)
}

fn prec(level: u8, assoc: Associativity) -> Option<PrecedenceEntry> {
    Some(PrecedenceEntry { level, assoc })
}

// ---- AST builders, one per production -------------------------------------

fn build_augmented_start(mut s: Vec<StackSymbol>) -> Result<AstNode> {
    s.pop().unwrap().into_node()
}

fn build_passthrough(mut s: Vec<StackSymbol>) -> Result<AstNode> {
    s.pop().unwrap().into_node()
}

macro_rules! binary_builder {
    ($name:ident, $op:literal) => {
        fn $name(mut s: Vec<StackSymbol>) -> Result<AstNode> {
            let right = s.pop().unwrap().into_node()?;
            let _operator_token = s.pop().unwrap().into_token()?;
            let left = s.pop().unwrap().into_node()?;
            AstNode::binary_op(left, $op, right)
        }
    };
}

macro_rules! unary_builder {
    ($name:ident, $op:literal) => {
        fn $name(mut s: Vec<StackSymbol>) -> Result<AstNode> {
            let operand = s.pop().unwrap().into_node()?;
            let _operator_token = s.pop().unwrap().into_token()?;
            AstNode::unary_op($op, operand)
        }
    };
}

binary_builder!(build_or, "||");
binary_builder!(build_and, "&&");
binary_builder!(build_eq, "==");
binary_builder!(build_neq, "!=");
binary_builder!(build_lt, "<");
binary_builder!(build_le, "<=");
binary_builder!(build_gt, ">");
binary_builder!(build_ge, ">=");
binary_builder!(build_add, "+");
binary_builder!(build_sub, "-");
binary_builder!(build_mul, "*");
binary_builder!(build_div, "/");
binary_builder!(build_mod, "%");
binary_builder!(build_pow, "^");

unary_builder!(build_pos, "+");
unary_builder!(build_neg, "-");
unary_builder!(build_not, "!");

fn build_paren(mut s: Vec<StackSymbol>) -> Result<AstNode> {
    let _rparen = s.pop().unwrap().into_token()?;
    let expr = s.pop().unwrap().into_node()?;
    let _lparen = s.pop().unwrap().into_token()?;
    Ok(expr)
}

fn build_atom_number(mut s: Vec<StackSymbol>) -> Result<AstNode> {
    let token = s.pop().unwrap().into_token()?;
    let value: f64 = token.lexeme.parse().map_err(|_| Error::InvalidNumberFormat {
        lexeme: token.lexeme.clone(),
        position: token.position,
    })?;
    AstNode::number(value)
}

fn build_atom_boolean(mut s: Vec<StackSymbol>) -> Result<AstNode> {
    let token = s.pop().unwrap().into_token()?;
    Ok(AstNode::Boolean(token.lexeme == "true"))
}

fn build_atom_variable(mut s: Vec<StackSymbol>) -> Result<AstNode> {
    let token = s.pop().unwrap().into_token()?;
    AstNode::variable(token.lexeme)
}

fn build_function_call(mut s: Vec<StackSymbol>) -> Result<AstNode> {
    let _rparen = s.pop().unwrap().into_token()?;
    let args = s.pop().unwrap().into_node()?;
    let _lparen = s.pop().unwrap().into_token()?;
    let function_token = s.pop().unwrap().into_token()?;
    let args = match args {
        AstNode::Arguments(list) => list,
        other => vec![other],
    };
    // FUNCTION lexeme includes the whole identifier, not the trailing '('.
    AstNode::function_call(function_token.lexeme, args)
}

fn build_arguments_nonempty(mut s: Vec<StackSymbol>) -> Result<AstNode> {
    s.pop().unwrap().into_node()
}

fn build_arguments_empty(_s: Vec<StackSymbol>) -> Result<AstNode> {
    Ok(AstNode::Arguments(Vec::new()))
}

fn build_argument_list_append(mut s: Vec<StackSymbol>) -> Result<AstNode> {
    let next = s.pop().unwrap().into_node()?;
    let _comma = s.pop().unwrap().into_token()?;
    let head = s.pop().unwrap().into_node()?;
    let mut list = match head {
        AstNode::Arguments(list) => list,
        other => vec![other],
    };
    list.push(next);
    Ok(AstNode::Arguments(list))
}

fn build_argument_list_single(mut s: Vec<StackSymbol>) -> Result<AstNode> {
    let expr = s.pop().unwrap().into_node()?;
    Ok(AstNode::Arguments(vec![expr]))
}

fn build_conditional(mut s: Vec<StackSymbol>) -> Result<AstNode> {
    let _rparen = s.pop().unwrap().into_token()?;
    let false_branch = s.pop().unwrap().into_node()?;
    let _comma2 = s.pop().unwrap().into_token()?;
    let true_branch = s.pop().unwrap().into_node()?;
    let _comma1 = s.pop().unwrap().into_token()?;
    let condition = s.pop().unwrap().into_node()?;
    let _lparen = s.pop().unwrap().into_token()?;
    let _if = s.pop().unwrap().into_token()?;
    AstNode::if_node(condition, true_branch, false_branch)
}

/// The static grammar: productions, the designated start/augmented-start
/// symbols, and the precedence/associativity table.
pub struct Grammar {
    pub productions: Vec<Production>,
    pub start: NonTerminal,
    pub augmented_start: NonTerminal,
    pub precedence: HashMap<Terminal, PrecedenceEntry>,
}

impl Grammar {
    pub fn new() -> Self {
        use NonTerminal::*;
        let mut p = Vec::new();
        let mut id = 0usize;
        let mut add = |left: NonTerminal,
                       right: Vec<Symbol>,
                       builder: BuilderFn,
                       precedence: Option<PrecedenceEntry>| {
            p.push(Production::new(id, left, right, builder, precedence));
            id += 1;
        };

        // P0: S' -> START
        add(AugmentedStart, vec![nt(Start)], build_augmented_start, None);
        // P1: START -> EXPR
        add(Start, vec![nt(Expr)], build_passthrough, None);
        // P2/P3: EXPR -> EXPR OR AND_EXPR | AND_EXPR
        add(
            Expr,
            vec![nt(Expr), t(Terminal::Or), nt(AndExpr)],
            build_or,
            prec(1, Associativity::Left),
        );
        add(Expr, vec![nt(AndExpr)], build_passthrough, None);
        // P4/P5: AND_EXPR -> AND_EXPR AND EQUALITY_EXPR | EQUALITY_EXPR
        add(
            AndExpr,
            vec![nt(AndExpr), t(Terminal::And), nt(EqualityExpr)],
            build_and,
            prec(2, Associativity::Left),
        );
        add(AndExpr, vec![nt(EqualityExpr)], build_passthrough, None);
        // P6-P8: EQUALITY_EXPR
        add(
            EqualityExpr,
            vec![nt(EqualityExpr), t(Terminal::Equal), nt(RelationalExpr)],
            build_eq,
            prec(3, Associativity::Left),
        );
        add(
            EqualityExpr,
            vec![nt(EqualityExpr), t(Terminal::NotEqual), nt(RelationalExpr)],
            build_neq,
            prec(3, Associativity::Left),
        );
        add(
            EqualityExpr,
            vec![nt(RelationalExpr)],
            build_passthrough,
            None,
        );
        // P9-P13: RELATIONAL_EXPR
        add(
            RelationalExpr,
            vec![nt(RelationalExpr), t(Terminal::Less), nt(AdditiveExpr)],
            build_lt,
            prec(4, Associativity::Left),
        );
        add(
            RelationalExpr,
            vec![nt(RelationalExpr), t(Terminal::LessEqual), nt(AdditiveExpr)],
            build_le,
            prec(4, Associativity::Left),
        );
        add(
            RelationalExpr,
            vec![nt(RelationalExpr), t(Terminal::Greater), nt(AdditiveExpr)],
            build_gt,
            prec(4, Associativity::Left),
        );
        add(
            RelationalExpr,
            vec![
                nt(RelationalExpr),
                t(Terminal::GreaterEqual),
                nt(AdditiveExpr),
            ],
            build_ge,
            prec(4, Associativity::Left),
        );
        add(
            RelationalExpr,
            vec![nt(AdditiveExpr)],
            build_passthrough,
            None,
        );
        // P14-P16: ADDITIVE_EXPR
        add(
            AdditiveExpr,
            vec![
                nt(AdditiveExpr),
                t(Terminal::Plus),
                nt(MultiplicativeExpr),
            ],
            build_add,
            prec(5, Associativity::Left),
        );
        add(
            AdditiveExpr,
            vec![
                nt(AdditiveExpr),
                t(Terminal::Minus),
                nt(MultiplicativeExpr),
            ],
            build_sub,
            prec(5, Associativity::Left),
        );
        add(
            AdditiveExpr,
            vec![nt(MultiplicativeExpr)],
            build_passthrough,
            None,
        );
        // P17-P20: MULTIPLICATIVE_EXPR
        add(
            MultiplicativeExpr,
            vec![
                nt(MultiplicativeExpr),
                t(Terminal::Multiply),
                nt(UnaryExpr),
            ],
            build_mul,
            prec(6, Associativity::Left),
        );
        add(
            MultiplicativeExpr,
            vec![nt(MultiplicativeExpr), t(Terminal::Divide), nt(UnaryExpr)],
            build_div,
            prec(6, Associativity::Left),
        );
        add(
            MultiplicativeExpr,
            vec![nt(MultiplicativeExpr), t(Terminal::Modulo), nt(UnaryExpr)],
            build_mod,
            prec(6, Associativity::Left),
        );
        add(
            MultiplicativeExpr,
            vec![nt(UnaryExpr)],
            build_passthrough,
            None,
        );
        // P21-P24: UNARY_EXPR
        add(
            UnaryExpr,
            vec![t(Terminal::Plus), nt(UnaryExpr)],
            build_pos,
            prec(7, Associativity::Right),
        );
        add(
            UnaryExpr,
            vec![t(Terminal::Minus), nt(UnaryExpr)],
            build_neg,
            prec(7, Associativity::Right),
        );
        add(
            UnaryExpr,
            vec![t(Terminal::Not), nt(UnaryExpr)],
            build_not,
            prec(7, Associativity::Right),
        );
        add(UnaryExpr, vec![nt(PowerExpr)], build_passthrough, None);
        // P25/P26: POWER_EXPR
        add(
            PowerExpr,
            vec![nt(PrimaryExpr), t(Terminal::Power), nt(PowerExpr)],
            build_pow,
            prec(8, Associativity::Right),
        );
        add(PowerExpr, vec![nt(PrimaryExpr)], build_passthrough, None);
        // P27-P30: PRIMARY_EXPR
        add(PrimaryExpr, vec![nt(Atom)], build_passthrough, None);
        add(
            PrimaryExpr,
            vec![t(Terminal::LeftParen), nt(Expr), t(Terminal::RightParen)],
            build_paren,
            None,
        );
        add(
            PrimaryExpr,
            vec![nt(FunctionCall)],
            build_passthrough,
            None,
        );
        add(
            PrimaryExpr,
            vec![nt(ConditionalExpr)],
            build_passthrough,
            None,
        );
        // P31-P33: ATOM
        add(Atom, vec![t(Terminal::Number)], build_atom_number, None);
        add(Atom, vec![t(Terminal::Boolean)], build_atom_boolean, None);
        add(Atom, vec![t(Terminal::Variable)], build_atom_variable, None);
        // P34: FUNCTION_CALL
        add(
            FunctionCall,
            vec![
                t(Terminal::Function),
                t(Terminal::LeftParen),
                nt(Arguments),
                t(Terminal::RightParen),
            ],
            build_function_call,
            None,
        );
        // P35/P36: ARGUMENTS
        add(
            Arguments,
            vec![nt(ArgumentList)],
            build_arguments_nonempty,
            None,
        );
        add(Arguments, vec![], build_arguments_empty, None);
        // P37/P38: ARGUMENT_LIST
        add(
            ArgumentList,
            vec![nt(ArgumentList), t(Terminal::Comma), nt(Expr)],
            build_argument_list_append,
            None,
        );
        add(
            ArgumentList,
            vec![nt(Expr)],
            build_argument_list_single,
            None,
        );
        // P39: CONDITIONAL_EXPR
        add(
            ConditionalExpr,
            vec![
                t(Terminal::If),
                t(Terminal::LeftParen),
                nt(Expr),
                t(Terminal::Comma),
                nt(Expr),
                t(Terminal::Comma),
                nt(Expr),
                t(Terminal::RightParen),
            ],
            build_conditional,
            None,
        );

        let mut precedence = HashMap::new();
        precedence.insert(
            Terminal::Or,
            PrecedenceEntry {
                level: 1,
                assoc: Associativity::Left,
            },
        );
        precedence.insert(
            Terminal::And,
            PrecedenceEntry {
                level: 2,
                assoc: Associativity::Left,
            },
        );
        for term in [Terminal::Equal, Terminal::NotEqual] {
            precedence.insert(
                term,
                PrecedenceEntry {
                    level: 3,
                    assoc: Associativity::Left,
                },
            );
        }
        for term in [
            Terminal::Less,
            Terminal::LessEqual,
            Terminal::Greater,
            Terminal::GreaterEqual,
        ] {
            precedence.insert(
                term,
                PrecedenceEntry {
                    level: 4,
                    assoc: Associativity::Left,
                },
            );
        }
        for term in [Terminal::Plus, Terminal::Minus] {
            precedence.insert(
                term,
                PrecedenceEntry {
                    level: 5,
                    assoc: Associativity::Left,
                },
            );
        }
        for term in [Terminal::Multiply, Terminal::Divide, Terminal::Modulo] {
            precedence.insert(
                term,
                PrecedenceEntry {
                    level: 6,
                    assoc: Associativity::Left,
                },
            );
        }
        precedence.insert(
            Terminal::Power,
            PrecedenceEntry {
                level: 8,
                assoc: Associativity::Right,
            },
        );

        Grammar {
            productions: p,
            start: Start,
            augmented_start: AugmentedStart,
            precedence,
        }
    }
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_count_matches_design() {
        let g = Grammar::new();
        assert_eq!(g.productions.len(), 40);
    }

    #[test]
    fn production_ids_are_sequential() {
        let g = Grammar::new();
        for (i, prod) in g.productions.iter().enumerate() {
            assert_eq!(prod.id, i);
        }
    }

    #[test]
    fn precedence_table_matches_spec_levels() {
        let g = Grammar::new();
        assert_eq!(g.precedence[&Terminal::Or].level, 1);
        assert_eq!(g.precedence[&Terminal::And].level, 2);
        assert_eq!(g.precedence[&Terminal::Equal].level, 3);
        assert_eq!(g.precedence[&Terminal::Less].level, 4);
        assert_eq!(g.precedence[&Terminal::Plus].level, 5);
        assert_eq!(g.precedence[&Terminal::Multiply].level, 6);
        assert_eq!(g.precedence[&Terminal::Power].level, 8);
        assert_eq!(g.precedence[&Terminal::Power].assoc, Associativity::Right);
    }

    #[test]
    fn terminal_index_is_injective() {
        let mut seen = std::collections::HashSet::new();
        for &term in ALL_TERMINALS {
            assert!(seen.insert(term.index()));
        }
    }
}
