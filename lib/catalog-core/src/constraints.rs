//! Constraint expressions over service tags
//!
//! Grammar: ``Tag(`value`)``, `!expr`, `expr && expr`, `expr || expr` and
//! parentheses. `&&` binds tighter than `||`. An empty expression matches
//! every tag set.

use crate::{CoreError, Result};

#[derive(Clone, Debug, PartialEq)]
pub enum Constraint {
    Tag(String),
    Not(Box<Constraint>),
    And(Box<Constraint>, Box<Constraint>),
    Or(Box<Constraint>, Box<Constraint>),
}

impl Constraint {
    /// Parse an expression. `Ok(None)` for an empty expression.
    pub fn parse(expr: &str) -> Result<Option<Constraint>> {
        let tokens = tokenize(expr)?;
        if tokens.is_empty() {
            return Ok(None);
        }

        let mut parser = Parser { tokens, pos: 0 };
        let constraint = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            return Err(CoreError::InvalidConstraint(format!("unexpected {:?} in {:?}", token, expr)));
        }
        Ok(Some(constraint))
    }

    pub fn matches(&self, tags: &[String]) -> bool {
        match self {
            Constraint::Tag(value) => tags.iter().any(|t| t == value),
            Constraint::Not(inner) => !inner.matches(tags),
            Constraint::And(a, b) => a.matches(tags) && b.matches(tags),
            Constraint::Or(a, b) => a.matches(tags) || b.matches(tags),
        }
    }
}

/// Evaluate `expr` against `tags`.
pub fn match_tags(tags: &[String], expr: &str) -> Result<bool> {
    Ok(Constraint::parse(expr)?.map_or(true, |c| c.matches(tags)))
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Ident(String),
    Literal(String),
    LParen,
    RParen,
    Not,
    And,
    Or,
}

fn tokenize(expr: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = expr.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            '!' => tokens.push(Token::Not),
            '&' | '|' => {
                if chars.next_if(|&(_, n)| n == c).is_none() {
                    return Err(CoreError::InvalidConstraint(format!("single {:?} at offset {}", c, i)));
                }
                tokens.push(if c == '&' { Token::And } else { Token::Or });
            }
            '`' | '"' => {
                let mut value = String::new();
                let mut closed = false;
                for (_, n) in chars.by_ref() {
                    if n == c {
                        closed = true;
                        break;
                    }
                    value.push(n);
                }
                if !closed {
                    return Err(CoreError::InvalidConstraint(format!("unterminated literal at offset {}", i)));
                }
                tokens.push(Token::Literal(value));
            }
            c if c.is_ascii_alphabetic() => {
                let mut ident = String::from(c);
                while let Some((_, n)) = chars.next_if(|&(_, n)| n.is_ascii_alphanumeric()) {
                    ident.push(n);
                }
                tokens.push(Token::Ident(ident));
            }
            other => {
                return Err(CoreError::InvalidConstraint(format!("unexpected {:?} at offset {}", other, i)));
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        match self.next() {
            Some(ref t) if *t == expected => Ok(()),
            other => Err(CoreError::InvalidConstraint(format!("expected {:?}, got {:?}", expected, other))),
        }
    }

    fn parse_or(&mut self) -> Result<Constraint> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Constraint::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Constraint> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Constraint::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Constraint> {
        match self.next() {
            Some(Token::Not) => Ok(Constraint::Not(Box::new(self.parse_unary()?))),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                self.expect(Token::LParen)?;
                let value = match self.next() {
                    Some(Token::Literal(v)) => v,
                    other => {
                        return Err(CoreError::InvalidConstraint(format!("expected a literal, got {:?}", other)))
                    }
                };
                self.expect(Token::RParen)?;
                match name.as_str() {
                    "Tag" => Ok(Constraint::Tag(value)),
                    other => Err(CoreError::InvalidConstraint(format!("unsupported matcher {}", other))),
                }
            }
            other => Err(CoreError::InvalidConstraint(format!("unexpected {:?}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_expression_matches() {
        assert!(match_tags(&tags(&[]), "").unwrap());
        assert!(match_tags(&tags(&["a"]), "   ").unwrap());
    }

    #[test]
    fn test_tag_matcher() {
        let t = tags(&["env=prod", "web"]);
        assert!(match_tags(&t, "Tag(`web`)").unwrap());
        assert!(!match_tags(&t, "Tag(`Web`)").unwrap());
        assert!(match_tags(&t, "Tag(\"env=prod\")").unwrap());
    }

    #[test]
    fn test_operators_and_precedence() {
        let t = tags(&["a", "b"]);
        assert!(match_tags(&t, "Tag(`a`) && Tag(`b`)").unwrap());
        assert!(!match_tags(&t, "Tag(`a`) && !Tag(`b`)").unwrap());
        assert!(match_tags(&t, "Tag(`x`) || Tag(`a`) && Tag(`b`)").unwrap());
        assert!(!match_tags(&t, "(Tag(`x`) || Tag(`a`)) && Tag(`c`)").unwrap());
        assert!(match_tags(&t, "!(Tag(`x`))").unwrap());
    }

    #[test]
    fn test_invalid_expressions() {
        let t = tags(&["a"]);
        assert!(match_tags(&t, "Tag(`a`").is_err());
        assert!(match_tags(&t, "Tag(`a`) & Tag(`b`)").is_err());
        assert!(match_tags(&t, "Label(`a`)").is_err());
        assert!(match_tags(&t, "TagRegex(`a.*`)").is_err());
        assert!(match_tags(&t, "Tag(`a`) Tag(`b`)").is_err());
        assert!(match_tags(&t, "Tag(`a").is_err());
    }
}
