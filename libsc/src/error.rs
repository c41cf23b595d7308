//! Error types for SC parsing and binding.

use std::fmt;

use thiserror::Error;

use crate::node::{NodeKind, Pos};

/// Result type for SC parsing operations.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Error returned by a user-supplied hook (custom decoder, text or key
/// conversion).
pub type HookError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A lexical error. The lexer emits it as the final token of the stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    /// A character that cannot start any token.
    #[error("unrecognized character scanned: {}", quote_rune(.0))]
    UnrecognizedChar(char),

    /// A `/` not followed by `/` or `*`; `None` when the input ends.
    #[error("unrecognized sequence scanned: /{}", char_or_eof(.0))]
    UnrecognizedSequence(Option<char>),

    /// End of input inside `/* ... */`.
    #[error("unclosed block comment")]
    UnclosedBlockComment,

    /// End of input or a newline inside a double-quoted string.
    #[error("unterminated string")]
    UnterminatedString,

    /// End of input inside a backtick string.
    #[error("unterminated raw string")]
    UnterminatedRawString,

    /// A number run directly into letters or digits, e.g. `12ab`.
    #[error("bad number syntax: {0:?}")]
    BadNumber(String),

    /// An identifier followed by a character that cannot end it.
    #[error("bad character {} in identifier", quote_rune(.0))]
    BadIdentifierChar(char),

    /// A `$` in value position not followed by `{`.
    #[error("bad character {} after '$', expected '{{'", quote_rune_or_eof(.0))]
    BadVariableStart(Option<char>),

    /// `${}` with nothing between the braces.
    #[error("variable name missing after '${{'")]
    MissingVariableName,

    /// A variable name starting with something other than a letter or `_`.
    #[error("bad character {} after '${{'", quote_rune(.0))]
    BadVariableNameStart(char),

    /// A character inside `${...}` that is not alphanumeric or `}`.
    #[error("bad character {} in variable name", quote_rune(.0))]
    BadVariableChar(char),
}

/// Render a character as `U+0040 '@'`.
fn quote_rune(c: &char) -> String {
    if c.is_control() {
        format!("U+{:04X}", *c as u32)
    } else {
        format!("U+{:04X} '{}'", *c as u32, c)
    }
}

fn quote_rune_or_eof(c: &Option<char>) -> String {
    c.as_ref().map_or_else(|| "EOF".to_string(), quote_rune)
}

fn char_or_eof(c: &Option<char>) -> String {
    c.map_or_else(|| "EOF".to_string(), String::from)
}

/// What went wrong during a parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("top level value in SC document must be a dictionary")]
    TopLevelNotDictionary,

    /// `found` is the rendered token, e.g. `<Number: "42">`.
    #[error("unexpected {found} in {context}")]
    Unexpected { found: String, context: &'static str },

    #[error("invalid number syntax: {0:?}")]
    InvalidNumber(String),

    #[error("integer overflow: {0:?}")]
    IntegerOverflow(String),

    #[error("invalid escape character '\\{0}' in string")]
    InvalidEscape(char),

    #[error("unterminated escape character")]
    UnterminatedEscape,

    #[error("invalid unicode escape sequence")]
    InvalidUnicodeEscape,

    /// A `"` or a control character inside a double-quoted string.
    #[error("invalid character in string: {0}")]
    InvalidStringChar(char),
}

/// A syntax error. Parsing stops at the first one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("sc: parse error: {pos}: {kind}")]
pub struct ParseError {
    pub pos: Pos,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(pos: Pos, kind: impl Into<ParseErrorKind>) -> Self {
        Self {
            pos,
            kind: kind.into(),
        }
    }
}

/// A single failure while binding a node to a Rust value.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The node cannot be stored in the destination type.
    #[error("sc: cannot unmarshal {kind} into {} of type {type_name}", describe_target(.record, .field))]
    Type {
        kind: NodeKind,
        type_name: String,
        pos: Pos,
        /// Innermost record being decoded, if any.
        record: Option<&'static str>,
        /// Dotted key path from the outermost record.
        field: String,
    },

    #[error("sc: unknown variable {name:?}")]
    UnknownVariable { name: String, pos: Pos },

    #[error("sc: unknown field {key:?}")]
    UnknownField { key: String, pos: Pos },

    #[error("sc: invalid base64 data at {pos}: {source}")]
    Base64 {
        pos: Pos,
        source: base64::DecodeError,
    },

    /// Returned by a custom hook. Aborts the rest of the bind.
    #[error("sc: {source}")]
    Hook { pos: Pos, source: HookError },
}

fn describe_target(record: &Option<&'static str>, field: &str) -> String {
    match record {
        Some(record) => format!("struct field {}.{}", record, field),
        None => "value".to_string(),
    }
}

impl DecodeError {
    /// Wrap an error produced by a hook.
    pub fn hook(pos: Pos, err: impl Into<HookError>) -> Self {
        DecodeError::Hook {
            pos,
            source: err.into(),
        }
    }

    pub fn pos(&self) -> Pos {
        match self {
            DecodeError::Type { pos, .. }
            | DecodeError::UnknownVariable { pos, .. }
            | DecodeError::UnknownField { pos, .. }
            | DecodeError::Base64 { pos, .. }
            | DecodeError::Hook { pos, .. } => *pos,
        }
    }
}

/// Every error collected during one bind, in the order the nodes were
/// visited.
#[derive(Debug, Default)]
pub struct Errors(pub(crate) Vec<DecodeError>);

impl Errors {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DecodeError> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<DecodeError> {
        self.0
    }
}

impl std::ops::Deref for Errors {
    type Target = [DecodeError];

    fn deref(&self) -> &[DecodeError] {
        &self.0
    }
}

impl IntoIterator for Errors {
    type Item = DecodeError;
    type IntoIter = std::vec::IntoIter<DecodeError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Errors {
    type Item = &'a DecodeError;
    type IntoIter = std::slice::Iter<'a, DecodeError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for Errors {}

/// Error produced while turning a Rust value into a node.
#[derive(Error, Debug)]
pub enum EncodeError {
    /// The top level value did not encode as a dictionary.
    #[error("sc: unsupported type: {0}")]
    UnsupportedType(String),

    #[error("sc: unsupported value: {0}")]
    UnsupportedValue(String),

    #[error("sc: {0}")]
    Hook(#[source] HookError),
}

/// Error returned by the `unmarshal` family.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Decode(#[from] Errors),

    #[error("sc: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lex_error_messages() {
        assert_eq!(
            LexError::UnrecognizedChar('@').to_string(),
            "unrecognized character scanned: U+0040 '@'"
        );
        assert_eq!(
            LexError::BadVariableStart(Some('f')).to_string(),
            "bad character U+0066 'f' after '$', expected '{'"
        );
        assert_eq!(
            LexError::BadVariableStart(None).to_string(),
            "bad character EOF after '$', expected '{'"
        );
        assert_eq!(
            LexError::MissingVariableName.to_string(),
            "variable name missing after '${'"
        );
        assert_eq!(
            LexError::UnrecognizedSequence(Some('x')).to_string(),
            "unrecognized sequence scanned: /x"
        );
        assert_eq!(
            LexError::BadIdentifierChar('\u{7}').to_string(),
            "bad character U+0007 in identifier"
        );
        assert_eq!(
            LexError::BadNumber("3n".into()).to_string(),
            "bad number syntax: \"3n\""
        );
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new(Pos::new(1, 9, 8), ParseErrorKind::InvalidEscape('z'));
        assert_eq!(
            err.to_string(),
            "sc: parse error: 1:9: invalid escape character '\\z' in string"
        );
    }

    #[test]
    fn test_type_error_display() {
        let err = DecodeError::Type {
            kind: NodeKind::Number,
            type_name: "i64".into(),
            pos: Pos::new(3, 11, 28),
            record: Some("V"),
            field: "FieldB".into(),
        };
        assert_eq!(
            err.to_string(),
            "sc: cannot unmarshal Number into struct field V.FieldB of type i64"
        );

        let err = DecodeError::Type {
            kind: NodeKind::Bool,
            type_name: "String".into(),
            pos: Pos::default(),
            record: None,
            field: String::new(),
        };
        assert_eq!(
            err.to_string(),
            "sc: cannot unmarshal Bool into value of type String"
        );
    }

    #[test]
    fn test_errors_join_lines() {
        let errs = Errors(vec![
            DecodeError::UnknownVariable {
                name: "num".into(),
                pos: Pos::default(),
            },
            DecodeError::UnknownField {
                key: "FieldF".into(),
                pos: Pos::default(),
            },
        ]);
        assert_eq!(
            errs.to_string(),
            "sc: unknown variable \"num\"\nsc: unknown field \"FieldF\""
        );
        assert_eq!(errs.len(), 2);
    }
}
