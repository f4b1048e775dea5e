//! Binding expression syntax.
//!
//! Value expressions:
//!
//! | Text | Meaning |
//! |------|---------|
//! | `{}` | the data context itself |
//! | `{title}` | member `title` of the data context |
//! | `{.text}` | member `text` of the binding's own node |
//! | `{label.text}` | member `text` of the node named `label` |
//! | `{../caption}` | member `caption` of the logical parent |
//! | `{../../header.text}` | node `header` searched from the grandparent |
//! | `{/title.text}` | named node searched from the document root |
//! | `{./close.visible}` | named node searched from the template root |
//! | `{²value}` | any of the above, two-way |
//!
//! Event expressions are either a method path (`{save}`, `{../form.submit}`)
//! or a `;`-separated list of `member = value` statements. A statement value
//! is a literal, a `'quoted string'` or a nested `{path}`.

use std::fmt;

use crate::error::ExpressionSyntaxError;

/// Marker that turns a value expression into a two-way binding.
pub const TWO_WAY: char = '²';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// The binding node's data context.
    DataContext,
    /// The node the binding is attached to.
    Target,
    /// Root of the document the node belongs to.
    DocumentRoot,
    /// The templated control that produced the node.
    TemplateRoot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    Parent,
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingPath {
    pub anchor: Anchor,
    pub steps: Vec<PathStep>,
    /// Named node searched from the node reached by `anchor` and `steps`.
    /// Empty means the reached node itself.
    pub selector: Option<String>,
    /// `None` binds the reached instance itself.
    pub member: Option<String>,
}

impl BindingPath {
    pub fn data_context() -> Self {
        Self { anchor: Anchor::DataContext, steps: Vec::new(), selector: None, member: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Unquoted text, converted to the target member's type.
    Literal(String),
    /// `'quoted'` text.
    Quoted(String),
    /// Value read from a path when the event fires.
    Path(BindingPath),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub target: BindingPath,
    pub value: Operand,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    Path(BindingPath),
    Handler(Vec<Statement>),
}

/// A parsed binding expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingExpr {
    /// Source text without the outer braces.
    pub text: String,
    pub two_way: bool,
    pub kind: ExprKind,
}

impl BindingExpr {
    /// Parse the expression of a property or field binding.
    pub fn parse_value(text: &str) -> Result<Self, ExpressionSyntaxError> {
        let trimmed = text.trim();
        let (two_way, body) = match trimmed.strip_prefix(TWO_WAY) {
            Some(rest) => (true, rest.trim()),
            None => (false, trimmed),
        };
        if let Some(pos) = find_top_level(body, '=') {
            return Err(ExpressionSyntaxError::new(
                text,
                format!("unexpected `=` at offset {pos}; assignments are only allowed on events"),
            ));
        }
        Ok(Self {
            text: text.to_string(),
            two_way,
            kind: ExprKind::Path(parse_path(body, text, Anchor::DataContext)?),
        })
    }

    /// Parse the expression attached to an event member.
    pub fn parse_event(text: &str) -> Result<Self, ExpressionSyntaxError> {
        let body = strip_braces(text.trim());
        if body.is_empty() {
            return Err(ExpressionSyntaxError::new(text, "empty event handler"));
        }
        if body.starts_with(TWO_WAY) {
            return Err(ExpressionSyntaxError::new(text, "event handlers cannot be two-way"));
        }
        let kind = if find_top_level(body, '=').is_some() {
            ExprKind::Handler(parse_statements(body, text)?)
        } else {
            ExprKind::Path(parse_path(body, text, Anchor::DataContext)?)
        };
        Ok(Self { text: text.to_string(), two_way: false, kind })
    }

    /// Parse an event attribute listing several handlers separated by `;`,
    /// as in `{save; close; status = 'done'}`. Each method path becomes its
    /// own expression; the assignments are grouped into one handler placed
    /// where the first of them appears.
    pub fn parse_events(text: &str) -> Result<Vec<Self>, ExpressionSyntaxError> {
        let body = strip_braces(text.trim());
        let segments: Vec<&str> = split_top_level(body, ';', text)?
            .into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        let methods = segments.iter().filter(|s| find_top_level(s, '=').is_none()).count();
        if segments.len() <= 1 || methods == 0 {
            return Ok(vec![Self::parse_event(text)?]);
        }

        let assignments: Vec<&str> =
            segments.iter().copied().filter(|s| find_top_level(s, '=').is_some()).collect();
        let mut exprs = Vec::with_capacity(methods + 1);
        let mut grouped = false;
        for segment in segments {
            if find_top_level(segment, '=').is_none() {
                let expr = Self::parse_event(segment)
                    .map_err(|e| ExpressionSyntaxError { expression: text.to_string(), ..e })?;
                exprs.push(expr);
            } else if !grouped {
                let joined = assignments.join("; ");
                exprs.push(Self {
                    kind: ExprKind::Handler(parse_statements(&joined, text)?),
                    text: joined,
                    two_way: false,
                });
                grouped = true;
            }
        }
        Ok(exprs)
    }

    pub fn is_handler(&self) -> bool {
        matches!(self.kind, ExprKind::Handler(_))
    }

    pub fn path(&self) -> Option<&BindingPath> {
        match &self.kind {
            ExprKind::Path(p) => Some(p),
            ExprKind::Handler(_) => None,
        }
    }
}

impl fmt::Display for BindingExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.text)
    }
}

// ── Paths ─────────────────────────────────────────────────────────────────

/// Parse a path. `bare` is the anchor of a single undotted token: the data
/// context for value paths, the sender for statement targets.
fn parse_path(body: &str, full: &str, bare: Anchor) -> Result<BindingPath, ExpressionSyntaxError> {
    if body.is_empty() {
        return Ok(BindingPath::data_context());
    }
    let err = |reason: &str| ExpressionSyntaxError::new(full, reason);

    let tokens: Vec<&str> = body.split('/').collect();
    let (last, prefix) = tokens.split_last().ok_or_else(|| err("empty path"))?;

    let mut anchor = Anchor::Target;
    let mut steps = Vec::new();
    let mut rest = prefix;
    if let Some((first, tail)) = prefix.split_first() {
        match *first {
            "" => {
                anchor = Anchor::DocumentRoot;
                rest = tail;
            }
            "." => {
                anchor = Anchor::TemplateRoot;
                rest = tail;
            }
            _ => {}
        }
    }
    for token in rest {
        match *token {
            ".." => steps.push(PathStep::Parent),
            "." => return Err(err("`.` may only start a path")),
            "" => return Err(err("empty path segment")),
            name => steps.push(PathStep::Named(ident(name, full)?.to_string())),
        }
    }

    if last.is_empty() || *last == ".." || *last == "." {
        return Err(err("path must end with a member name"));
    }
    let (selector, member) = split_final(last, full)?;
    if tokens.len() == 1 && selector.is_none() {
        anchor = bare;
    }
    Ok(BindingPath { anchor, steps, selector, member: Some(member) })
}

/// `member` or `selector.member`; at most one dot.
fn split_final(token: &str, full: &str) -> Result<(Option<String>, String), ExpressionSyntaxError> {
    let parts: Vec<&str> = token.split('.').collect();
    match parts.as_slice() {
        [member] => Ok((None, ident(member, full)?.to_string())),
        [selector, member] => {
            let selector = if selector.is_empty() {
                String::new()
            } else {
                ident(selector, full)?.to_string()
            };
            Ok((Some(selector), ident(member, full)?.to_string()))
        }
        _ => Err(ExpressionSyntaxError::new(full, "more than one `.` in the final segment")),
    }
}

fn ident<'a>(s: &'a str, full: &str) -> Result<&'a str, ExpressionSyntaxError> {
    if s.is_empty() {
        return Err(ExpressionSyntaxError::new(full, "missing name"));
    }
    match s.chars().find(|c| !(c.is_alphanumeric() || *c == '_')) {
        Some(c) => Err(ExpressionSyntaxError::new(full, format!("unexpected character `{c}` in `{s}`"))),
        None => Ok(s),
    }
}

// ── Handler statements ────────────────────────────────────────────────────

fn parse_statements(body: &str, full: &str) -> Result<Vec<Statement>, ExpressionSyntaxError> {
    split_top_level(body, ';', full)?
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|stmt| {
            let eq = find_top_level(stmt, '=').ok_or_else(|| {
                ExpressionSyntaxError::new(full, format!("expected `member = value` in `{stmt}`"))
            })?;
            let lhs = stmt[..eq].trim();
            let rhs = stmt[eq + 1..].trim();
            if lhs.is_empty() {
                return Err(ExpressionSyntaxError::new(full, "missing assignment target"));
            }
            let target = parse_path(lhs, full, Anchor::Target)?;
            Ok(Statement { target, value: parse_operand(rhs, full)? })
        })
        .collect()
}

fn parse_operand(rhs: &str, full: &str) -> Result<Operand, ExpressionSyntaxError> {
    if rhs.is_empty() {
        return Err(ExpressionSyntaxError::new(full, "missing assigned value"));
    }
    if let Some(inner) = rhs.strip_prefix('\'') {
        let text = inner
            .strip_suffix('\'')
            .ok_or_else(|| ExpressionSyntaxError::new(full, "unterminated quoted string"))?;
        return Ok(Operand::Quoted(text.to_string()));
    }
    if let Some(inner) = rhs.strip_prefix('{') {
        let path = inner
            .strip_suffix('}')
            .ok_or_else(|| ExpressionSyntaxError::new(full, "unbalanced `{`"))?;
        return Ok(Operand::Path(parse_path(path.trim(), full, Anchor::DataContext)?));
    }
    Ok(Operand::Literal(rhs.to_string()))
}

/// Strip one pair of braces enclosing the whole text.
fn strip_braces(text: &str) -> &str {
    match text.strip_prefix('{').and_then(|t| t.strip_suffix('}')) {
        Some(inner) if closing_brace(text) == Some(text.len() - 1) => inner.trim(),
        _ => text,
    }
}

/// Position of the brace closing the one at offset 0.
fn closing_brace(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quoted = false;
    for (i, c) in text.char_indices() {
        match c {
            '\'' => quoted = !quoted,
            '{' if !quoted => depth += 1,
            '}' if !quoted => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Offset of the first `needle` outside braces and quotes.
fn find_top_level(text: &str, needle: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut quoted = false;
    for (i, c) in text.char_indices() {
        match c {
            '\'' => quoted = !quoted,
            '{' if !quoted => depth += 1,
            '}' if !quoted => depth = depth.saturating_sub(1),
            c if c == needle && !quoted && depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

fn split_top_level<'a>(text: &'a str, sep: char, full: &str) -> Result<Vec<&'a str>, ExpressionSyntaxError> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '\'' => quoted = !quoted,
            '{' if !quoted => depth += 1,
            '}' if !quoted => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| ExpressionSyntaxError::new(full, "unbalanced `}`"))?;
            }
            c if c == sep && !quoted && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(ExpressionSyntaxError::new(full, "unbalanced `{`"));
    }
    if quoted {
        return Err(ExpressionSyntaxError::new(full, "unterminated quoted string"));
    }
    parts.push(&text[start..]);
    Ok(parts)
}
