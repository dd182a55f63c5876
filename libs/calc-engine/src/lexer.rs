//! Lexer (§4.B): turns formula text into a stream of tokens, applying
//! input-shape validation before scanning and resource-aware scanning
//! loops, in the same char-vector style as the upstream lexer.

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::token::{Position, Token, TokenType};

pub struct Lexer<'a> {
    chars: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    limits: &'a Limits,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &str, limits: &'a Limits) -> Result<Self> {
        validate_input_shape(input, limits)?;
        Ok(Self {
            chars: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            limits,
        })
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position + 1).copied()
    }

    fn here(&self) -> Position {
        Position::new(self.position, self.line, self.column)
    }

    fn advance(&mut self) {
        if let Some(c) = self.current() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        // Only the four characters the input contract names (§4.B) are
        // whitespace here, not `char::is_whitespace`'s full Unicode set —
        // anything else that looks blank (vertical tab, NEL, NBSP, ...)
        // falls through to the main dispatch instead of being silently
        // swallowed.
        while matches!(self.current(), Some(' ' | '\t' | '\r' | '\n')) {
            self.advance();
        }
    }

    /// Tokenizes the entire input, returning the token stream terminated by
    /// a `Dollar` sentinel. The per-token loop enforces `max_parser_steps`
    /// as a coarse anti-pathological-input guard (§4.B): a lexer emitting
    /// more tokens than the parser could ever consume signals something is
    /// structurally wrong with the input rather than just long.
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        let mut depth = 0usize;
        loop {
            self.skip_whitespace();
            let start = self.here();
            let Some(c) = self.current() else {
                tokens.push(Token::dollar(start));
                break;
            };
            if tokens.len() >= self.limits.max_parser_steps {
                return Err(Error::StepLimitExceeded {
                    max: self.limits.max_parser_steps,
                });
            }
            let token = match c {
                '(' => {
                    depth += 1;
                    if depth > self.limits.max_nesting_depth {
                        return Err(Error::NestingTooDeep {
                            position: start,
                            max: self.limits.max_nesting_depth,
                        });
                    }
                    self.advance();
                    Token::new(TokenType::LeftParen, "(", start)
                }
                ')' => {
                    depth = depth.saturating_sub(1);
                    self.advance();
                    Token::new(TokenType::RightParen, ")", start)
                }
                ',' => {
                    self.advance();
                    Token::new(TokenType::Comma, ",", start)
                }
                '+' => {
                    self.advance();
                    Token::new(TokenType::Plus, "+", start)
                }
                '-' => {
                    self.advance();
                    Token::new(TokenType::Minus, "-", start)
                }
                '*' => {
                    self.advance();
                    Token::new(TokenType::Multiply, "*", start)
                }
                '/' => {
                    self.advance();
                    Token::new(TokenType::Divide, "/", start)
                }
                '%' => {
                    self.advance();
                    Token::new(TokenType::Modulo, "%", start)
                }
                '^' => {
                    self.advance();
                    Token::new(TokenType::Power, "^", start)
                }
                '=' if self.peek() == Some('=') => {
                    self.advance();
                    self.advance();
                    Token::new(TokenType::Equal, "==", start)
                }
                '!' if self.peek() == Some('=') => {
                    self.advance();
                    self.advance();
                    Token::new(TokenType::NotEqual, "!=", start)
                }
                '!' => {
                    self.advance();
                    Token::new(TokenType::Not, "!", start)
                }
                '<' if self.peek() == Some('=') => {
                    self.advance();
                    self.advance();
                    Token::new(TokenType::LessEqual, "<=", start)
                }
                '<' => {
                    self.advance();
                    Token::new(TokenType::Less, "<", start)
                }
                '>' if self.peek() == Some('=') => {
                    self.advance();
                    self.advance();
                    Token::new(TokenType::GreaterEqual, ">=", start)
                }
                '>' => {
                    self.advance();
                    Token::new(TokenType::Greater, ">", start)
                }
                '&' if self.peek() == Some('&') => {
                    self.advance();
                    self.advance();
                    Token::new(TokenType::And, "&&", start)
                }
                '|' if self.peek() == Some('|') => {
                    self.advance();
                    self.advance();
                    Token::new(TokenType::Or, "||", start)
                }
                c if c.is_ascii_digit() => self.read_number(start)?,
                c if c.is_ascii_alphabetic() || c == '_' => self.read_word(start),
                _ => {
                    return Err(Error::UnexpectedCharacter {
                        lexeme: c.to_string(),
                        position: start,
                    })
                }
            };
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn read_number(&mut self, start: Position) -> Result<Token> {
        let begin = self.position;
        let mut seen_exponent = false;
        while let Some(c) = self.current() {
            if c.is_ascii_digit() {
                self.advance();
            } else if c == '.' && !seen_exponent && matches!(self.peek(), Some(d) if d.is_ascii_digit()) {
                // Only consume a '.' that is itself followed by a digit, per
                // the literal grammar (`[0-9]+(\.[0-9]+)?`). A trailing dot
                // with no following digit (`5.`) is left unconsumed here and
                // fails as its own unexpected-character token, rather than
                // being folded into a lexeme `f64::from_str` would accept
                // anyway. A second dot-digit group (`1.2.3`) still matches
                // this same check, so the whole run is consumed as one
                // malformed lexeme and rejected by the parse below instead
                // of silently splitting into two valid-looking numbers.
                self.advance();
            } else if (c == 'e' || c == 'E') && !seen_exponent {
                seen_exponent = true;
                self.advance();
                if matches!(self.current(), Some('+') | Some('-')) {
                    self.advance();
                }
            } else {
                break;
            }
        }
        let lexeme: String = self.chars[begin..self.position].iter().collect();
        if lexeme.parse::<f64>().is_err() {
            return Err(Error::InvalidNumberFormat {
                lexeme,
                position: start,
            });
        }
        Ok(Token::new(TokenType::Number, lexeme, start))
    }

    /// Reads an identifier-shaped word and classifies it as a boolean
    /// literal, the `if` keyword, a function call (identifier directly
    /// followed by `(`, no intervening whitespace), or a bare variable.
    /// `if`/`IF` and any case variant collapse to the same reserved `If`
    /// token whether spelled as a keyword or called like a function (§9):
    /// this is what gives the parser a single unified conditional
    /// production regardless of surface syntax.
    fn read_word(&mut self, start: Position) -> Token {
        let begin = self.position;
        while matches!(self.current(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.advance();
        }
        let lexeme: String = self.chars[begin..self.position].iter().collect();
        if lexeme.eq_ignore_ascii_case("if") {
            return Token::new(TokenType::If, lexeme, start);
        }
        if lexeme == "true" || lexeme == "false" {
            return Token::new(TokenType::Boolean, lexeme, start);
        }
        if self.current() == Some('(') {
            return Token::new(TokenType::Function, lexeme, start);
        }
        Token::new(TokenType::Variable, lexeme, start)
    }
}

/// Pre-validates gross input shape before any scanning begins (§4.B):
/// total length, line count, per-line length, and forbidden raw control
/// characters. Nesting depth is enforced incrementally during scanning
/// instead, since it requires walking parens in order.
fn validate_input_shape(input: &str, limits: &Limits) -> Result<()> {
    if input.len() > limits.max_input_bytes {
        return Err(Error::InputTooLong {
            max: limits.max_input_bytes,
        });
    }
    let mut line_count = 0usize;
    for (i, line) in input.split('\n').enumerate() {
        line_count += 1;
        if line.chars().count() > limits.max_line_len {
            return Err(Error::LineTooLong {
                line: i + 1,
                max: limits.max_line_len,
            });
        }
    }
    if line_count > limits.max_lines {
        return Err(Error::TooManyLines {
            max: limits.max_lines,
        });
    }
    // Control characters other than tab/CR/LF (the only ones the input
    // contract recognizes as whitespace) are rejected outright rather than
    // left for the main scan to trip over, the same way the upstream lexer
    // rejects raw control bytes before building any tokens from them.
    let mut line = 1usize;
    let mut column = 1usize;
    for (index, c) in input.chars().enumerate() {
        if c.is_control() && !matches!(c, '\t' | '\r' | '\n') {
            return Err(Error::ForbiddenCharacter {
                position: Position::new(index, line, column),
            });
        }
        if c == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    Ok(())
}
