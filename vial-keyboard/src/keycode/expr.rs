//! Restricted keycode expression evaluator
//!
//! Accepts numbers, table identifiers, parentheses, the bitwise operators
//! `|`, `^`, `&` (lowest to highest precedence) and calls to a fixed
//! function set: mask wrappers (`LCTL(kc)`, `LSFT_T(kc)`, `LT1(kc)`),
//! `LT`, `MT`, `LM`, `OSM`, `TD` and the single-layer actions.

use super::{KeycodeTable, LayerAction};
use crate::error::KeycodeError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Number(u32),
    LParen,
    RParen,
    Comma,
    Or,
    Xor,
    And,
}

/// Parse a decimal or `0x` hex literal
pub(super) fn parse_number(text: &str) -> Option<u32> {
    if let Some(hex) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        if hex.is_empty() {
            return None;
        }
        return u32::from_str_radix(hex, 16).ok();
    }
    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
        return text.parse().ok();
    }
    None
}

fn tokenize(source: &str) -> Result<Vec<Token>, KeycodeError> {
    let invalid = || KeycodeError::InvalidKeycodeExpression(source.to_string());
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b' ' | b'\t' => i += 1,
            b'(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            b')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            b',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            b'|' => {
                tokens.push(Token::Or);
                i += 1;
            }
            b'^' => {
                tokens.push(Token::Xor);
                i += 1;
            }
            b'&' => {
                tokens.push(Token::And);
                i += 1;
            }
            b'0'..=b'9' => {
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_alphanumeric() {
                    i += 1;
                }
                let value = parse_number(&source[start..i]).ok_or_else(invalid)?;
                tokens.push(Token::Number(value));
            }
            b'A'..=b'Z' | b'a'..=b'z' | b'_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                tokens.push(Token::Ident(source[start..i].to_string()));
            }
            _ => return Err(invalid()),
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    table: &'a KeycodeTable,
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn invalid(&self) -> KeycodeError {
        KeycodeError::InvalidKeycodeExpression(self.source.to_string())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, token: Token) -> Result<(), KeycodeError> {
        match self.next() {
            Some(t) if t == token => Ok(()),
            _ => Err(self.invalid()),
        }
    }

    fn parse_or(&mut self) -> Result<u32, KeycodeError> {
        let mut value = self.parse_xor()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            value |= self.parse_xor()?;
        }
        Ok(value)
    }

    fn parse_xor(&mut self) -> Result<u32, KeycodeError> {
        let mut value = self.parse_and()?;
        while self.peek() == Some(&Token::Xor) {
            self.pos += 1;
            value ^= self.parse_and()?;
        }
        Ok(value)
    }

    fn parse_and(&mut self) -> Result<u32, KeycodeError> {
        let mut value = self.parse_atom()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            value &= self.parse_atom()?;
        }
        Ok(value)
    }

    fn parse_atom(&mut self) -> Result<u32, KeycodeError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(value)
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    let args = self.parse_args()?;
                    self.call(&name, &args)
                } else {
                    self.table
                        .lookup_name(&name)
                        .map(u32::from)
                        .ok_or_else(|| self.invalid())
                }
            }
            _ => Err(self.invalid()),
        }
    }

    /// Comma-separated arguments up to and including the closing paren
    fn parse_args(&mut self) -> Result<Vec<u32>, KeycodeError> {
        let mut args = vec![self.parse_or()?];
        loop {
            match self.next() {
                Some(Token::Comma) => args.push(self.parse_or()?),
                Some(Token::RParen) => return Ok(args),
                _ => return Err(self.invalid()),
            }
        }
    }

    fn call(&self, name: &str, args: &[u32]) -> Result<u32, KeycodeError> {
        let t = self.table;
        // Arguments are truncated to 16 bits by the composition helpers
        let arg = |i: usize| args[i] as u16;

        let value = match (name, args.len()) {
            ("LT", 2) => t.layer_tap(arg(0), arg(1)),
            ("MT", 2) => t.mod_tap(arg(0), arg(1)),
            ("LM", 2) => t.layer_mod(arg(0), arg(1)),
            ("OSM", 1) => t.one_shot_mod(arg(0)),
            ("TD", 1) => t.tap_dance(arg(0)),
            (_, 1) => {
                if let Some(action) = LayerAction::from_name(name) {
                    t.layer_action(action, arg(0))
                } else if let Some(base) = t.mask_base(name) {
                    if args[0] > 0xFFFF {
                        return Err(self.invalid());
                    }
                    // Modifier wrappers nest (`LCTL(LSFT(kc))`); tap-hold
                    // wrappers keep only the basic key
                    if base < t.constant("QK_MOD_TAP").min(t.constant("QK_LAYER_TAP")) {
                        base | arg(0)
                    } else {
                        base | (arg(0) & 0xFF)
                    }
                } else {
                    return Err(self.invalid());
                }
            }
            _ => return Err(self.invalid()),
        };
        Ok(u32::from(value))
    }
}

/// Evaluate `source` against `table`
pub(super) fn evaluate(table: &KeycodeTable, source: &str) -> Result<u16, KeycodeError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        table,
        source,
        tokens,
        pos: 0,
    };
    let value = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(parser.invalid());
    }
    u16::try_from(value).map_err(|_| parser.invalid())
}
