//! Boolean condition language for pattern-dialect rules.
//!
//! A condition decides whether a rule fires given how often each of its
//! named strings matched. The grammar is deliberately tiny:
//!
//! ```text
//! expr      := or_expr
//! or_expr   := and_expr ( "or" and_expr )*
//! and_expr  := atom ( "and" atom )*
//! atom      := "any" "of" set | "all" "of" set | count | IDENT | "(" expr ")"
//! set       := "them" | "(" IDENT ("," IDENT)* ")"
//! count     := "#" IDENT CMP NUMBER        CMP in { < <= == >= > }
//! ```
//!
//! `them` expands to every string the rule defines. A bare identifier is
//! shorthand for "that string matched at least once".

use std::collections::HashMap;

/// Compiled condition AST, evaluated over `{string name -> match count}`.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// The named string matched at least once.
    Present(String),
    /// At least one of the named strings matched.
    AnyOf(Vec<String>),
    /// Every one of the named strings matched.
    AllOf(Vec<String>),
    /// The named string's match count satisfies the comparison.
    Count(String, Cmp, usize),
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
}

impl Cmp {
    fn apply(self, lhs: usize, rhs: usize) -> bool {
        match self {
            Cmp::Lt => lhs < rhs,
            Cmp::Le => lhs <= rhs,
            Cmp::Eq => lhs == rhs,
            Cmp::Ge => lhs >= rhs,
            Cmp::Gt => lhs > rhs,
        }
    }
}

impl Condition {
    /// Parses a condition expression.
    ///
    /// `string_names` are the rule's declared string identifiers; `them`
    /// expands to all of them, and referencing an undeclared identifier is a
    /// parse error so bad rules fail at load time instead of silently never
    /// matching.
    pub fn parse(input: &str, string_names: &[String]) -> Result<Condition, String> {
        let tokens = tokenize(input)?;
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            names: string_names,
        };
        let expr = parser.or_expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(format!(
                "unexpected trailing input at token {:?}",
                parser.tokens[parser.pos]
            ));
        }
        Ok(expr)
    }

    /// Evaluates the condition against per-string match counts. Strings
    /// absent from the map count as zero.
    pub fn evaluate(&self, counts: &HashMap<String, usize>) -> bool {
        let count_of = |name: &str| counts.get(name).copied().unwrap_or(0);
        match self {
            Condition::Present(name) => count_of(name) > 0,
            Condition::AnyOf(names) => names.iter().any(|n| count_of(n) > 0),
            Condition::AllOf(names) => names.iter().all(|n| count_of(n) > 0),
            Condition::Count(name, cmp, rhs) => cmp.apply(count_of(name), *rhs),
            Condition::And(parts) => parts.iter().all(|c| c.evaluate(counts)),
            Condition::Or(parts) => parts.iter().any(|c| c.evaluate(counts)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Hash,
    Number(usize),
    Cmp(Cmp),
    LParen,
    RParen,
    Comma,
    And,
    Or,
    Any,
    All,
    Of,
    Them,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(idx, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '#' => {
                chars.next();
                tokens.push(Token::Hash);
            }
            '<' | '>' | '=' => {
                chars.next();
                let eq = matches!(chars.peek(), Some((_, '=')));
                if eq {
                    chars.next();
                }
                let cmp = match (c, eq) {
                    ('<', false) => Cmp::Lt,
                    ('<', true) => Cmp::Le,
                    ('>', false) => Cmp::Gt,
                    ('>', true) => Cmp::Ge,
                    ('=', true) => Cmp::Eq,
                    _ => return Err(format!("bare '=' at offset {idx}; use '=='")),
                };
                tokens.push(Token::Cmp(cmp));
            }
            c if c.is_ascii_digit() => {
                let mut value = 0usize;
                while let Some(&(_, d)) = chars.peek() {
                    if let Some(digit) = d.to_digit(10) {
                        value = value * 10 + digit as usize;
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&(_, d)) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        word.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "any" => Token::Any,
                    "all" => Token::All,
                    "of" => Token::Of,
                    "them" => Token::Them,
                    _ => Token::Ident(word),
                });
            }
            other => return Err(format!("unexpected character '{other}' at offset {idx}")),
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    names: &'a [String],
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, expected: &Token) -> Result<(), String> {
        match self.next() {
            Some(tok) if tok == expected => Ok(()),
            other => Err(format!("expected {expected:?}, found {other:?}")),
        }
    }

    fn check_name(&self, name: &str) -> Result<(), String> {
        if self.names.iter().any(|n| n == name) {
            Ok(())
        } else {
            Err(format!("condition references undefined string '{name}'"))
        }
    }

    fn or_expr(&mut self) -> Result<Condition, String> {
        let mut parts = vec![self.and_expr()?];
        while matches!(self.peek(), Some(Token::Or)) {
            self.next();
            parts.push(self.and_expr()?);
        }
        Ok(if parts.len() == 1 {
            parts.pop().unwrap()
        } else {
            Condition::Or(parts)
        })
    }

    fn and_expr(&mut self) -> Result<Condition, String> {
        let mut parts = vec![self.atom()?];
        while matches!(self.peek(), Some(Token::And)) {
            self.next();
            parts.push(self.atom()?);
        }
        Ok(if parts.len() == 1 {
            parts.pop().unwrap()
        } else {
            Condition::And(parts)
        })
    }

    fn atom(&mut self) -> Result<Condition, String> {
        match self.next().cloned() {
            Some(Token::Any) => {
                self.expect(&Token::Of)?;
                Ok(Condition::AnyOf(self.name_set()?))
            }
            Some(Token::All) => {
                self.expect(&Token::Of)?;
                Ok(Condition::AllOf(self.name_set()?))
            }
            Some(Token::Hash) => {
                let name = match self.next().cloned() {
                    Some(Token::Ident(name)) => name,
                    other => return Err(format!("expected identifier after '#', found {other:?}")),
                };
                self.check_name(&name)?;
                let cmp = match self.next().cloned() {
                    Some(Token::Cmp(cmp)) => cmp,
                    other => return Err(format!("expected comparison operator, found {other:?}")),
                };
                let rhs = match self.next().cloned() {
                    Some(Token::Number(n)) => n,
                    other => return Err(format!("expected number, found {other:?}")),
                };
                Ok(Condition::Count(name, cmp, rhs))
            }
            Some(Token::Ident(name)) => {
                self.check_name(&name)?;
                Ok(Condition::Present(name))
            }
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            other => Err(format!("expected condition atom, found {other:?}")),
        }
    }

    /// `them` or `( ident, ident, ... )`
    fn name_set(&mut self) -> Result<Vec<String>, String> {
        match self.next().cloned() {
            Some(Token::Them) => Ok(self.names.to_vec()),
            Some(Token::LParen) => {
                let mut names = Vec::new();
                loop {
                    match self.next().cloned() {
                        Some(Token::Ident(name)) => {
                            self.check_name(&name)?;
                            names.push(name);
                        }
                        other => return Err(format!("expected identifier, found {other:?}")),
                    }
                    match self.next().cloned() {
                        Some(Token::Comma) => continue,
                        Some(Token::RParen) => break,
                        other => return Err(format!("expected ',' or ')', found {other:?}")),
                    }
                }
                Ok(names)
            }
            other => Err(format!("expected 'them' or '(', found {other:?}")),
        }
    }
}
