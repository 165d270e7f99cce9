//! Single-pass document parser
//!
//! Hand-rolled lexer + recursive-descent parser for the configuration
//! dialect:
//!
//! - `include 'path.gin'`
//! - `name = value` (macro binding)
//! - `[scope/]Class.param = value` (parameter binding, `Class` may be dotted)
//! - values: `None`, `True`, `False`, numbers, quoted strings, lists,
//!   tuples, dicts, `%name` references, `@Class()` / `@scope/Class()` calls
//!
//! `#` comments run to end of line. A statement ends at a newline, except
//! inside unclosed brackets, so dict and list values may span lines. Every
//! statement carries its file/line origin for diagnostics.

use crate::error::WeftError;
use crate::value::{Binding, ConstructorCall, Origin, RawValue};
use std::iter::Peekable;
use std::str::Chars;
use std::sync::Arc;

/// A parsed top-level statement
#[derive(Debug, Clone)]
pub enum Statement {
    Include { path: String, origin: Origin },
    Binding(Binding),
}

/// Parse a whole document. `file` is used for error origins only.
pub fn parse_document(src: &str, file: &str) -> Result<Vec<Statement>, WeftError> {
    let file: Arc<str> = Arc::from(file);
    let tokens = Lexer::new(src, Arc::clone(&file)).lex_all()?;
    Parser {
        tokens,
        pos: 0,
        file,
    }
    .parse()
}

// ─────────────────────────────────────────────────────────────
// Lexer
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Newline,
    Eq,
    Comma,
    Colon,
    Slash,
    Dot,
    Percent,
    At,
    Minus,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    LParen,
    RParen,
}

impl Tok {
    fn describe(&self) -> String {
        match self {
            Tok::Ident(name) => format!("identifier '{}'", name),
            Tok::Int(i) => format!("number '{}'", i),
            Tok::Float(x) => format!("number '{:?}'", x),
            Tok::Str(_) => "string".to_string(),
            Tok::Newline => "end of line".to_string(),
            Tok::Eq => "'='".to_string(),
            Tok::Comma => "','".to_string(),
            Tok::Colon => "':'".to_string(),
            Tok::Slash => "'/'".to_string(),
            Tok::Dot => "'.'".to_string(),
            Tok::Percent => "'%'".to_string(),
            Tok::At => "'@'".to_string(),
            Tok::Minus => "'-'".to_string(),
            Tok::LBracket => "'['".to_string(),
            Tok::RBracket => "']'".to_string(),
            Tok::LBrace => "'{'".to_string(),
            Tok::RBrace => "'}'".to_string(),
            Tok::LParen => "'('".to_string(),
            Tok::RParen => "')'".to_string(),
        }
    }
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    /// Open bracket depth - newlines inside brackets don't end statements
    depth: usize,
    file: Arc<str>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str, file: Arc<str>) -> Self {
        Self {
            chars: src.chars().peekable(),
            line: 1,
            depth: 0,
            file,
        }
    }

    fn err(&self, line: usize, detail: impl Into<String>) -> WeftError {
        WeftError::Parse {
            origin: Origin::new(Arc::clone(&self.file), line),
            detail: detail.into(),
        }
    }

    fn lex_all(mut self) -> Result<Vec<(Tok, usize)>, WeftError> {
        let mut out = Vec::new();
        while let Some(&ch) = self.chars.peek() {
            let line = self.line;
            match ch {
                '\n' => {
                    self.chars.next();
                    self.line += 1;
                    if self.depth == 0 {
                        // Collapse runs of blank lines into one token
                        if out.last().map(|(t, _)| t) != Some(&Tok::Newline) {
                            out.push((Tok::Newline, line));
                        }
                    }
                }
                ' ' | '\t' | '\r' => {
                    self.chars.next();
                }
                '#' => {
                    while let Some(&c) = self.chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.chars.next();
                    }
                }
                '\'' | '"' => out.push((self.lex_string()?, line)),
                '0'..='9' => out.push((self.lex_number()?, line)),
                c if c.is_alphabetic() || c == '_' => {
                    let mut ident = String::new();
                    while let Some(&c) = self.chars.peek() {
                        if c.is_alphanumeric() || c == '_' {
                            ident.push(c);
                            self.chars.next();
                        } else {
                            break;
                        }
                    }
                    out.push((Tok::Ident(ident), line));
                }
                _ => {
                    self.chars.next();
                    let tok = match ch {
                        '=' => Tok::Eq,
                        ',' => Tok::Comma,
                        ':' => Tok::Colon,
                        '/' => Tok::Slash,
                        '.' => Tok::Dot,
                        '%' => Tok::Percent,
                        '@' => Tok::At,
                        '-' => Tok::Minus,
                        '[' => {
                            self.depth += 1;
                            Tok::LBracket
                        }
                        '{' => {
                            self.depth += 1;
                            Tok::LBrace
                        }
                        '(' => {
                            self.depth += 1;
                            Tok::LParen
                        }
                        ']' => {
                            self.depth = self.depth.saturating_sub(1);
                            Tok::RBracket
                        }
                        '}' => {
                            self.depth = self.depth.saturating_sub(1);
                            Tok::RBrace
                        }
                        ')' => {
                            self.depth = self.depth.saturating_sub(1);
                            Tok::RParen
                        }
                        other => {
                            return Err(self.err(line, format!("unexpected character '{}'", other)))
                        }
                    };
                    out.push((tok, line));
                }
            }
        }
        Ok(out)
    }

    fn lex_string(&mut self) -> Result<Tok, WeftError> {
        let line = self.line;
        let quote = self.chars.next().expect("quote peeked");
        let mut out = String::new();
        loop {
            match self.chars.next() {
                Some('\\') => match self.chars.next() {
                    Some('\\') => out.push('\\'),
                    Some('\'') => out.push('\''),
                    Some('"') => out.push('"'),
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(other) => {
                        return Err(self.err(line, format!("unknown escape '\\{}'", other)))
                    }
                    None => return Err(self.err(line, "unterminated string")),
                },
                Some(c) if c == quote => return Ok(Tok::Str(out)),
                Some('\n') | None => return Err(self.err(line, "unterminated string")),
                Some(c) => out.push(c),
            }
        }
    }

    fn lex_number(&mut self) -> Result<Tok, WeftError> {
        let line = self.line;
        let mut raw = String::new();
        let mut is_float = false;
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() {
                raw.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        if self.chars.peek() == Some(&'.') {
            is_float = true;
            raw.push('.');
            self.chars.next();
            while let Some(&c) = self.chars.peek() {
                if c.is_ascii_digit() {
                    raw.push(c);
                    self.chars.next();
                } else {
                    break;
                }
            }
        }
        if matches!(self.chars.peek(), Some('e') | Some('E')) {
            is_float = true;
            raw.push('e');
            self.chars.next();
            if matches!(self.chars.peek(), Some('+') | Some('-')) {
                raw.push(*self.chars.peek().expect("sign peeked"));
                self.chars.next();
            }
            let mut digits = 0;
            while let Some(&c) = self.chars.peek() {
                if c.is_ascii_digit() {
                    raw.push(c);
                    self.chars.next();
                    digits += 1;
                } else {
                    break;
                }
            }
            if digits == 0 {
                return Err(self.err(line, format!("malformed exponent in '{}'", raw)));
            }
        }
        if is_float {
            raw.parse::<f64>()
                .map(Tok::Float)
                .map_err(|_| self.err(line, format!("malformed number '{}'", raw)))
        } else {
            raw.parse::<i64>()
                .map(Tok::Int)
                .map_err(|_| self.err(line, format!("integer out of range '{}'", raw)))
        }
    }
}

// ─────────────────────────────────────────────────────────────
// Parser
// ─────────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<(Tok, usize)>,
    pos: usize,
    file: Arc<str>,
}

/// A `[scope/]Seg.Seg...` key path split into slash and dot parts
struct KeyPath {
    slash_parts: Vec<String>,
    dot_parts: Vec<String>,
    line: usize,
}

impl Parser {
    fn err(&self, line: usize, detail: impl Into<String>) -> WeftError {
        WeftError::Parse {
            origin: Origin::new(Arc::clone(&self.file), line),
            detail: detail.into(),
        }
    }

    fn current_line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(_, line)| *line)
            .unwrap_or(1)
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn next(&mut self) -> Option<(Tok, usize)> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, want: Tok) -> Result<usize, WeftError> {
        match self.next() {
            Some((tok, line)) if tok == want => Ok(line),
            Some((tok, line)) => Err(self.err(
                line,
                format!("expected {}, got {}", want.describe(), tok.describe()),
            )),
            None => Err(self.err(
                self.current_line(),
                format!("expected {}, got end of document", want.describe()),
            )),
        }
    }

    fn expect_ident(&mut self) -> Result<(String, usize), WeftError> {
        match self.next() {
            Some((Tok::Ident(name), line)) => Ok((name, line)),
            Some((tok, line)) => {
                Err(self.err(line, format!("expected identifier, got {}", tok.describe())))
            }
            None => Err(self.err(
                self.current_line(),
                "expected identifier, got end of document",
            )),
        }
    }

    fn expect_statement_end(&mut self) -> Result<(), WeftError> {
        match self.next() {
            Some((Tok::Newline, _)) | None => Ok(()),
            Some((tok, line)) => Err(self.err(
                line,
                format!("expected end of line, got {}", tok.describe()),
            )),
        }
    }

    fn parse(mut self) -> Result<Vec<Statement>, WeftError> {
        let mut out = Vec::new();
        loop {
            while self.peek() == Some(&Tok::Newline) {
                self.next();
            }
            if self.peek().is_none() {
                return Ok(out);
            }
            out.push(self.parse_statement()?);
        }
    }

    fn parse_statement(&mut self) -> Result<Statement, WeftError> {
        let (first, line) = self.expect_ident()?;

        if first == "include" {
            if let Some(Tok::Str(_)) = self.peek() {
                let Some((Tok::Str(path), _)) = self.next() else {
                    unreachable!("peeked string");
                };
                self.expect_statement_end()?;
                return Ok(Statement::Include {
                    path,
                    origin: Origin::new(Arc::clone(&self.file), line),
                });
            }
            // fall through: `include` is also a legal macro name
        }

        let path = self.parse_key_path(first, line)?;
        self.expect(Tok::Eq)?;
        let value = self.parse_value()?;
        self.expect_statement_end()?;
        self.binding_from_path(path, value).map(Statement::Binding)
    }

    /// Collect `seg(/seg)*(.seg)*` - all slashes must precede all dots
    fn parse_key_path(&mut self, first: String, line: usize) -> Result<KeyPath, WeftError> {
        let mut slash_parts = vec![first];
        let mut dot_parts: Vec<String> = Vec::new();
        loop {
            match self.peek() {
                Some(Tok::Slash) => {
                    if !dot_parts.is_empty() {
                        return Err(self.err(line, "'/' may not follow '.' in a binding key"));
                    }
                    self.next();
                    let (seg, _) = self.expect_ident()?;
                    slash_parts.push(seg);
                }
                Some(Tok::Dot) => {
                    self.next();
                    let (seg, _) = self.expect_ident()?;
                    dot_parts.push(seg);
                }
                _ => break,
            }
        }
        Ok(KeyPath {
            slash_parts,
            dot_parts,
            line,
        })
    }

    fn binding_from_path(&self, path: KeyPath, value: RawValue) -> Result<Binding, WeftError> {
        let origin = Origin::new(Arc::clone(&self.file), path.line);
        if path.dot_parts.is_empty() {
            if path.slash_parts.len() > 1 {
                return Err(self.err(
                    path.line,
                    "macro bindings cannot be scoped (use 'name = value')",
                ));
            }
            let name = path.slash_parts.into_iter().next().expect("one segment");
            return Ok(Binding {
                scope: None,
                class: None,
                param: name,
                value,
                origin,
            });
        }

        // Last slash segment starts the dotted class path; last dot segment
        // is the parameter.
        let mut dotted = path.slash_parts;
        let scope = if dotted.len() > 1 {
            let scope_parts = dotted.drain(..dotted.len() - 1).collect::<Vec<_>>();
            Some(scope_parts.join("/"))
        } else {
            None
        };
        let mut class_parts = dotted;
        class_parts.extend(path.dot_parts);
        let param = class_parts.pop().expect("at least class and param");
        if class_parts.is_empty() {
            return Err(self.err(
                path.line,
                "parameter bindings need both class and parameter ('Class.param = value')",
            ));
        }
        Ok(Binding {
            scope,
            class: Some(class_parts.join(".")),
            param,
            value,
            origin,
        })
    }

    /// Parse `@[scope/]Class()` after the '@' token
    fn parse_call(&mut self) -> Result<ConstructorCall, WeftError> {
        let (first, line) = self.expect_ident()?;
        let path = self.parse_key_path(first, line)?;

        let mut class_parts = path.slash_parts;
        let scope = if class_parts.len() > 1 {
            let scope_parts = class_parts.drain(..class_parts.len() - 1).collect::<Vec<_>>();
            Some(scope_parts.join("/"))
        } else {
            None
        };
        class_parts.extend(path.dot_parts);
        let class = class_parts.join(".");

        if self.peek() != Some(&Tok::LParen) {
            return Err(self.err(
                line,
                format!("constructor references must be invoked: '@{}()'", class),
            ));
        }
        self.next();
        self.expect(Tok::RParen)?;
        Ok(ConstructorCall { scope, class })
    }

    fn parse_value(&mut self) -> Result<RawValue, WeftError> {
        let (tok, line) = self.next().ok_or_else(|| {
            self.err(self.current_line(), "expected a value, got end of document")
        })?;
        match tok {
            Tok::Ident(name) => match name.as_str() {
                "None" => Ok(RawValue::None),
                "True" => Ok(RawValue::Bool(true)),
                "False" => Ok(RawValue::Bool(false)),
                other => Err(self.err(
                    line,
                    format!("unexpected identifier '{}' (strings must be quoted)", other),
                )),
            },
            Tok::Int(i) => Ok(RawValue::Int(i)),
            Tok::Float(x) => Ok(RawValue::Float(x)),
            Tok::Minus => match self.next() {
                Some((Tok::Int(i), _)) => Ok(RawValue::Int(-i)),
                Some((Tok::Float(x), _)) => Ok(RawValue::Float(-x)),
                Some((tok, line)) => Err(self.err(
                    line,
                    format!("expected number after '-', got {}", tok.describe()),
                )),
                None => Err(self.err(line, "expected number after '-'")),
            },
            Tok::Str(s) => Ok(RawValue::Str(s)),
            Tok::Percent => {
                let (name, _) = self.expect_ident()?;
                Ok(RawValue::Ref(name))
            }
            Tok::At => Ok(RawValue::Call(self.parse_call()?)),
            Tok::LBracket => self.parse_sequence(Tok::RBracket),
            Tok::LParen => self.parse_sequence(Tok::RParen),
            Tok::LBrace => self.parse_dict(line),
            other => Err(self.err(line, format!("expected a value, got {}", other.describe()))),
        }
    }

    fn parse_sequence(&mut self, close: Tok) -> Result<RawValue, WeftError> {
        let mut items = Vec::new();
        loop {
            if self.peek() == Some(&close) {
                self.next();
                return Ok(RawValue::List(items));
            }
            items.push(self.parse_value()?);
            match self.peek() {
                Some(Tok::Comma) => {
                    self.next();
                }
                Some(tok) if *tok == close => {}
                Some(tok) => {
                    let line = self.current_line();
                    let detail = format!(
                        "expected ',' or {}, got {}",
                        close.describe(),
                        tok.describe()
                    );
                    return Err(self.err(line, detail));
                }
                None => {
                    return Err(self.err(
                        self.current_line(),
                        format!("unclosed sequence, expected {}", close.describe()),
                    ))
                }
            }
        }
    }

    fn parse_dict(&mut self, open_line: usize) -> Result<RawValue, WeftError> {
        let mut entries = Vec::new();
        loop {
            if self.peek() == Some(&Tok::RBrace) {
                self.next();
                return Ok(RawValue::Dict(entries));
            }
            let key = match self.next() {
                Some((Tok::Str(key), _)) => key,
                Some((tok, line)) => {
                    return Err(self.err(
                        line,
                        format!("dict keys must be quoted strings, got {}", tok.describe()),
                    ))
                }
                None => return Err(self.err(open_line, "unclosed dict")),
            };
            self.expect(Tok::Colon)?;
            let value = self.parse_value()?;
            entries.push((key, value));
            match self.peek() {
                Some(Tok::Comma) => {
                    self.next();
                }
                Some(Tok::RBrace) => {}
                Some(tok) => {
                    let line = self.current_line();
                    let detail = format!("expected ',' or '}}', got {}", tok.describe());
                    return Err(self.err(line, detail));
                }
                None => return Err(self.err(open_line, "unclosed dict")),
            }
        }
    }
}
