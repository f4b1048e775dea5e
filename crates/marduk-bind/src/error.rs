//! Compile-time errors.
//!
//! Structural errors and binding-expression syntax errors abort compilation
//! of the whole description. Bindings whose source simply cannot be found
//! are not errors: they are reported through the log and the
//! [`DispatchReport`](crate::dispatch::DispatchReport).

use thiserror::Error;

use crate::value::ValueType;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] marduk_mkml::ParseError),
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error(transparent)]
    Expression(#[from] ExpressionSyntaxError),
}

/// Malformed style sheet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("style sheet {line}:{col}: {message}")]
pub struct StyleError {
    pub message: String,
    pub line: usize,
    pub col: usize,
}

/// A description that cannot be turned into a tree of the declared types.
///
/// `node` names the offending node as `Type at /address (line:col)`.
#[derive(Debug, Error)]
pub enum StructuralError {
    #[error("unknown type `{type_name}` for {node}")]
    UnknownType { type_name: String, node: String },

    #[error("{node}: type `{type_name}` has no member `{member}`")]
    UnknownMember { node: String, type_name: String, member: String },

    #[error("{node}: member `{member}` cannot be assigned")]
    ReadOnlyMember { node: String, member: String },

    #[error("{node}: member `{member}` is not public")]
    NonPublicMember { node: String, member: String },

    #[error("{node}: undefined constant `{name}` in `{member}`")]
    UndefinedConstant { node: String, member: String, name: String },

    #[error("{node}: `{literal}` is not a valid value for `{member}` ({reason})")]
    InvalidLiteral { node: String, member: String, literal: String, reason: String },

    #[error("{context}: {error}")]
    Conversion {
        context: String,
        #[source]
        error: ConversionError,
    },

    #[error("{node}: {reason}")]
    UnexpectedChild { node: String, reason: String },

    #[error("{node}: {reason}")]
    UnexpectedTemplate { node: String, reason: String },
}

/// No conversion strategy exists between two types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("cannot convert enum `{from}` to enum `{to}`")]
    EnumMismatch { from: ValueType, to: ValueType },

    #[error("type `{ty}` has no parse function")]
    MissingParse { ty: ValueType },

    #[error("unknown enum `{ty}`")]
    UnknownEnum { ty: ValueType },
}

/// Malformed binding expression text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid binding expression `{{{expression}}}`{}: {reason}", node_suffix(.node))]
pub struct ExpressionSyntaxError {
    pub expression: String,
    pub reason: String,
    /// Node the expression was attached to, filled in by the compiler.
    pub node: Option<String>,
}

impl ExpressionSyntaxError {
    pub fn new(expression: &str, reason: impl Into<String>) -> Self {
        Self { expression: expression.to_string(), reason: reason.into(), node: None }
    }

    pub fn on(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }
}

fn node_suffix(node: &Option<String>) -> String {
    node.as_ref().map(|n| format!(" on {n}")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expression_error_names_node() {
        let e = ExpressionSyntaxError::new("a.b.c", "more than one `.`").on("Text at /0 (3:5)");
        assert_eq!(
            e.to_string(),
            "invalid binding expression `{a.b.c}` on Text at /0 (3:5): more than one `.`"
        );
    }

    #[test]
    fn conversion_error_is_wrapped() {
        let e: CompileError = StructuralError::Conversion {
            context: "Text.align".into(),
            error: ConversionError::MissingParse { ty: ValueType::List },
        }
        .into();
        assert_eq!(e.to_string(), "Text.align: type `List` has no parse function");
    }
}
