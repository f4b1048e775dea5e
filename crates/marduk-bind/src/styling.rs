//! Style sheets: named member defaults and `${name}` constants.
//!
//! A style is keyed either by a class name or by a free-form key that nodes
//! select with their `style` member. When a node is compiled, each of its
//! members that markup leaves unset takes the value of the first style that
//! has it: the node's explicit style key first, then its class and each base
//! class, most derived first.
//!
//! ```text
//! // constants
//! $accent = #ff8800ff;
//!
//! Text, Button { color = ${accent}; size = 14; }
//! heading      { size = 24; text = {title}; }
//! ```
//!
//! Values are markup values: `{...}` is a binding, anything else a literal.
//! Quoted values have their quotes removed.

use std::borrow::Cow;
use std::collections::HashMap;

use thiserror::Error;

use crate::error::StyleError;

/// Member defaults of one style, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Style {
    entries: Vec<(String, String)>,
}

impl Style {
    /// Set `member`, replacing an earlier value.
    pub fn set(&mut self, member: &str, value: &str) {
        match self.entries.iter_mut().find(|(m, _)| m == member) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.entries.push((member.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, member: &str) -> Option<&str> {
        self.entries.iter().find(|(m, _)| m == member).map(|(_, v)| v.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(m, v)| (m.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Styling {
    constants: HashMap<String, String>,
    styles: HashMap<String, Style>,
}

impl Styling {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant(mut self, name: &str, value: &str) -> Self {
        self.constants.insert(name.to_string(), value.to_string());
        self
    }

    pub fn style<'a>(mut self, key: &str, entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let style = self.styles.entry(key.to_string()).or_default();
        for (member, value) in entries {
            style.set(member, value);
        }
        self
    }

    /// Parse a style sheet.
    pub fn parse(src: &str) -> Result<Self, StyleError> {
        let mut styling = Self::new();
        styling.load(src)?;
        Ok(styling)
    }

    /// Add the declarations of another style sheet. Later values replace
    /// earlier ones.
    pub fn load(&mut self, src: &str) -> Result<(), StyleError> {
        SheetParser::new(src).parse_into(self)
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty() && self.styles.is_empty()
    }

    pub fn get_constant(&self, name: &str) -> Option<&str> {
        self.constants.get(name).map(String::as_str)
    }

    pub fn get_style(&self, key: &str) -> Option<&Style> {
        self.styles.get(key)
    }

    /// Value of `member` in the first of `keys` whose style sets it.
    pub fn lookup<'k>(&self, keys: impl IntoIterator<Item = &'k str>, member: &str) -> Option<&str> {
        keys.into_iter().find_map(|key| self.styles.get(key)?.get(member))
    }

    /// Replace every `${name}` in `text` by its constant. Fails with the first
    /// name that has no constant.
    pub fn expand<'t>(&self, text: &'t str) -> Result<Cow<'t, str>, UndefinedConstant> {
        if !text.contains("${") {
            return Ok(Cow::Borrowed(text));
        }
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                return Err(UndefinedConstant(after.to_string()));
            };
            let name = &after[..end];
            let value = self.constants.get(name).ok_or_else(|| UndefinedConstant(name.to_string()))?;
            out.push_str(value);
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(Cow::Owned(out))
    }
}

/// A `${name}` reference with no matching constant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("undefined constant `{0}`")]
pub struct UndefinedConstant(pub String);

// ── Sheet parser ──────────────────────────────────────────────────────────

struct SheetParser<'s> {
    src: &'s str,
    pos: usize,
    line: usize,
    col: usize,
}

impl<'s> SheetParser<'s> {
    fn new(src: &'s str) -> Self {
        Self { src, pos: 0, line: 1, col: 1 }
    }

    fn err(&self, message: impl Into<String>) -> StyleError {
        StyleError { message: message.into(), line: self.line, col: self.col }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn skip_trivia(&mut self) {
        loop {
            while matches!(self.peek(), Some(c) if c.is_whitespace()) {
                self.advance();
            }
            if self.src[self.pos..].starts_with("//") {
                while !matches!(self.peek(), None | Some('\n')) {
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn expect(&mut self, want: char) -> Result<(), StyleError> {
        self.skip_trivia();
        match self.peek() {
            Some(c) if c == want => {
                self.advance();
                Ok(())
            }
            Some(c) => Err(self.err(format!("expected `{want}`, found `{c}`"))),
            None => Err(self.err(format!("expected `{want}`, found end of input"))),
        }
    }

    fn ident(&mut self) -> Result<String, StyleError> {
        self.skip_trivia();
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_' || c == '-' || c == '.') {
            self.advance();
        }
        if start == self.pos {
            return Err(match self.peek() {
                Some(c) => self.err(format!("expected a name, found `{c}`")),
                None => self.err("expected a name, found end of input"),
            });
        }
        Ok(self.src[start..self.pos].to_string())
    }

    /// Raw value text up to the terminating `;`. Braces nest and quoted runs
    /// are taken verbatim.
    fn value(&mut self) -> Result<String, StyleError> {
        self.skip_trivia();
        let start = self.pos;
        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        loop {
            let end = self.pos;
            match self.advance() {
                None => return Err(self.err("unterminated value, expected `;`")),
                Some(c) if quote == Some(c) => quote = None,
                Some(_) if quote.is_some() => {}
                Some(c @ ('"' | '\'')) => quote = Some(c),
                Some('{') => depth += 1,
                Some('}') if depth > 0 => depth -= 1,
                Some('}') => return Err(self.err("unbalanced `}` in value")),
                Some(';') if depth == 0 => {
                    let raw = self.src[start..end].trim();
                    let unquoted = raw
                        .strip_prefix('"')
                        .and_then(|r| r.strip_suffix('"'))
                        .unwrap_or(raw);
                    return Ok(unquoted.to_string());
                }
                Some(_) => {}
            }
        }
    }

    fn parse_into(mut self, styling: &mut Styling) -> Result<(), StyleError> {
        loop {
            self.skip_trivia();
            match self.peek() {
                None => return Ok(()),
                Some('$') => {
                    self.advance();
                    let name = self.ident()?;
                    self.expect('=')?;
                    let at = self.err("");
                    let raw = self.value()?;
                    let value = styling
                        .expand(&raw)
                        .map_err(|e| StyleError { message: e.to_string(), ..at })?
                        .into_owned();
                    styling.constants.insert(name, value);
                }
                Some(_) => {
                    let mut keys = vec![self.ident()?];
                    loop {
                        self.skip_trivia();
                        if self.peek() != Some(',') {
                            break;
                        }
                        self.advance();
                        keys.push(self.ident()?);
                    }
                    self.expect('{')?;
                    let mut entries = Vec::new();
                    loop {
                        self.skip_trivia();
                        if self.peek() == Some('}') {
                            self.advance();
                            break;
                        }
                        let member = self.ident()?;
                        self.expect('=')?;
                        entries.push((member, self.value()?));
                    }
                    for key in keys {
                        let style = styling.styles.entry(key).or_default();
                        for (member, value) in &entries {
                            style.set(member, value);
                        }
                    }
                }
            }
        }
    }
}
