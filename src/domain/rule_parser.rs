//! Logic tree DSL parser.
//!
//! Recursive descent parser turning text such as
//! `AND(close > london.high, OR(H4:close >= prev_day.close, rsi_14 < 30))`
//! into a [`LogicNode`]. Errors carry the character offset of the problem.
//!
//! ```text
//! node      := "AND" "(" node ("," node)* ")"
//!            | "OR"  "(" node ("," node)* ")"
//!            | reference op reference
//! reference := number | column | timeframe ":" column | session "." field
//! op        := ">" | "<" | ">=" | "<=" | "==" | "!="
//! ```

use crate::domain::error::ParseError;
use crate::domain::rule::{CompareOp, LogicNode, Reference};
use crate::domain::session::SessionField;

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            position: self.pos,
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(self.error(format!("expected '{}', found '{}'", expected, ch))),
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    /// `keyword` followed by optional whitespace and an opening parenthesis.
    fn peek_group(&self, keyword: &str) -> bool {
        let remaining = self.remaining();
        remaining.starts_with(keyword)
            && remaining[keyword.len()..].trim_start().starts_with('(')
    }

    fn peek_word(&self) -> String {
        let word: String = self
            .remaining()
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        if word.is_empty() {
            self.peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string())
        } else {
            word
        }
    }

    fn parse_identifier(&mut self, what: &str) -> Result<String, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(self.error(format!("expected {}, found '{}'", what, self.peek_word())));
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        if self.peek() == Some('-') {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected number".to_string(),
                position: start,
            });
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<f64>().map_err(|_| ParseError {
            message: format!("invalid number: {}", num_str),
            position: start,
        })
    }

    fn parse_reference(&mut self) -> Result<Reference, ParseError> {
        self.skip_whitespace();

        if self
            .peek()
            .is_some_and(|ch| ch.is_ascii_digit() || ch == '-' || ch == '.')
        {
            return Ok(Reference::Literal(self.parse_number()?));
        }

        let first = self.parse_identifier("reference")?;
        match self.peek() {
            Some(':') => {
                self.advance();
                let column = self.parse_identifier("column name")?;
                Ok(Reference::Column {
                    timeframe: Some(first),
                    column,
                })
            }
            Some('.') => {
                self.advance();
                let field_pos = self.pos;
                let field_name = self.parse_identifier("session field")?;
                let field: SessionField = field_name.parse().map_err(|message| ParseError {
                    message,
                    position: field_pos,
                })?;
                Ok(Reference::Session {
                    session: first,
                    field,
                })
            }
            _ => Ok(Reference::Column {
                timeframe: None,
                column: first,
            }),
        }
    }

    fn parse_operator(&mut self) -> Result<CompareOp, ParseError> {
        self.skip_whitespace();
        for symbol in [">=", "<=", "==", "!=", ">", "<"] {
            if self.remaining().starts_with(symbol) {
                self.pos += symbol.len();
                return symbol.parse().map_err(|message: String| self.error(message));
            }
        }
        Err(self.error(format!(
            "expected operator (>, <, >=, <=, ==, !=), found '{}'",
            self.peek_word()
        )))
    }

    fn parse_condition(&mut self) -> Result<LogicNode, ParseError> {
        let left = self.parse_reference()?;
        let op = self.parse_operator()?;
        let right = self.parse_reference()?;
        Ok(LogicNode::condition(left, op, right))
    }

    fn parse_children(&mut self, keyword: &str) -> Result<Vec<LogicNode>, ParseError> {
        self.pos += keyword.len();
        self.expect_char('(')?;

        self.skip_whitespace();
        if self.peek() == Some(')') {
            return Err(self.error(format!("{} requires at least one child", keyword)));
        }

        let mut children = vec![self.parse_node()?];
        loop {
            self.skip_whitespace();
            if self.peek() == Some(')') {
                self.advance();
                break;
            }
            self.expect_char(',')?;
            children.push(self.parse_node()?);
        }
        Ok(children)
    }

    fn parse_node(&mut self) -> Result<LogicNode, ParseError> {
        self.skip_whitespace();

        if self.peek_group("AND") {
            return Ok(LogicNode::And(self.parse_children("AND")?));
        }
        if self.peek_group("OR") {
            return Ok(LogicNode::Or(self.parse_children("OR")?));
        }
        if self.peek().is_none() {
            return Err(self.error("expected condition, found end of input"));
        }

        self.parse_condition()
    }

    fn parse(&mut self) -> Result<LogicNode, ParseError> {
        let node = self.parse_node()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(self.error(format!(
                "unexpected input after logic tree: '{}'",
                self.remaining()
            )));
        }
        Ok(node)
    }
}

pub fn parse(input: &str) -> Result<LogicNode, ParseError> {
    let mut parser = Parser::new(input);
    parser.parse()
}
