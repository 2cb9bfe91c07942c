//! Recursive decoder for the nested bracket/paren literals embedded in
//! COMBATANT_INFO columns: lists of tuples of lists of integers, to
//! arbitrary depth (`[(192323,1,[...],(7,)),...]`).
//!
//! This is the structural layer only; shape interpretation (talents vs
//! items vs covenant block) lives in the combatant decoder.

use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Literal>),
    Tuple(Vec<Literal>),
}

impl Literal {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Literal::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The element sequence of a list or tuple.
    pub fn items(&self) -> Option<&[Literal]> {
        match self {
            Literal::List(items) | Literal::Tuple(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_tuple(&self) -> bool {
        matches!(self, Literal::Tuple(_))
    }

    /// Render for the raw-passthrough case (unrecognized expansion block).
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Literal::Int(v) => Value::from(*v),
            Literal::Float(v) => Value::from(*v),
            Literal::Str(s) => Value::String(s.clone()),
            Literal::List(items) | Literal::Tuple(items) => {
                Value::Array(items.iter().map(Literal::to_json).collect())
            }
        }
    }
}

/// Parse one complete literal out of a column token.
///
/// `label` names the block being decoded so failures carry context
/// ("class talents", "equipment", ...).
pub fn parse_literal(token: &str, label: &'static str) -> Result<Literal, ParseError> {
    let mut parser = Parser {
        bytes: token.as_bytes(),
        pos: 0,
        label,
    };
    parser.skip_ws();
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos != parser.bytes.len() {
        return Err(ParseError::MalformedLiteral { label });
    }
    Ok(value)
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
    label: &'static str,
}

impl<'a> Parser<'a> {
    fn fail(&self) -> ParseError {
        ParseError::MalformedLiteral { label: self.label }
    }

    fn skip_ws(&mut self) {
        while self.bytes.get(self.pos).is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn value(&mut self) -> Result<Literal, ParseError> {
        match self.bytes.get(self.pos) {
            Some(b'[') => self.sequence(b']').map(Literal::List),
            Some(b'(') => self.sequence(b')').map(Literal::Tuple),
            Some(_) => self.atom(),
            None => Err(self.fail()),
        }
    }

    fn sequence(&mut self, close: u8) -> Result<Vec<Literal>, ParseError> {
        self.pos += 1; // opener
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.bytes.get(self.pos) {
                Some(&b) if b == close => {
                    self.pos += 1;
                    return Ok(items);
                }
                Some(b',') => {
                    // Trailing/consecutive commas show up in the wild
                    // (single-element tuples, `[,(...)]` prefixes).
                    self.pos += 1;
                }
                Some(_) => items.push(self.value()?),
                None => return Err(self.fail()),
            }
        }
    }

    fn atom(&mut self) -> Result<Literal, ParseError> {
        let start = self.pos;
        while let Some(&b) = self.bytes.get(self.pos) {
            if matches!(b, b',' | b']' | b')' | b'[' | b'(') {
                break;
            }
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos])
            .map_err(|_| self.fail())?
            .trim();
        if text.is_empty() {
            return Err(self.fail());
        }
        if let Ok(v) = text.parse::<i64>() {
            return Ok(Literal::Int(v));
        }
        if let Ok(v) = text.parse::<f64>() {
            return Ok(Literal::Float(v));
        }
        Ok(Literal::Str(text.trim_matches('"').to_string()))
    }
}
