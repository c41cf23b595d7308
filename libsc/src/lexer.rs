//! SC lexer.
//!
//! The lexer is a state machine driven one token at a time: each call to
//! [`Iterator::next`] runs states until at least one token is queued. The
//! stream ends after the EOF token or the first error token.
//!
//! Two details shape the token stream:
//!
//! - **Automatic commas.** After a token that can end a value (`]`, `}`, a
//!   closing quote, a raw string, a number, an identifier or keyword) the
//!   next newline produces a synthetic comma, so one element per line needs
//!   no separators.
//! - **String mode.** Inside double quotes the lexer emits raw fragments up
//!   to the next `"` or `${`. Escapes are left for the parser to decode.

use std::collections::VecDeque;
use std::fmt;

use crate::error::LexError;
use crate::node::Pos;

/// Token kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Lexing failed; always the last token.
    Error(LexError),
    Eof,
    Bool,
    Number,
    /// A fragment of a double-quoted string, excluding the quotes.
    String,
    /// A backtick string, including the backticks.
    RawString,
    Identifier,
    Comment,
    LeftSquare,
    RightSquare,
    LeftCurly,
    RightCurly,
    /// `${`
    VariableStart,
    Quote,
    Colon,
    Comma,
    Null,
}

impl TokenKind {
    fn name(&self) -> &'static str {
        match self {
            TokenKind::Error(_) => "Error",
            TokenKind::Eof => "EOF",
            TokenKind::Bool => "Bool",
            TokenKind::Number => "Number",
            TokenKind::String => "String",
            TokenKind::RawString => "RawString",
            TokenKind::Identifier => "Identifier",
            TokenKind::Comment => "Comment",
            TokenKind::LeftSquare => "[",
            TokenKind::RightSquare => "]",
            TokenKind::LeftCurly => "{",
            TokenKind::RightCurly => "}",
            TokenKind::VariableStart => "${",
            TokenKind::Quote => "\"",
            TokenKind::Colon => ":",
            TokenKind::Comma => ",",
            TokenKind::Null => "null",
        }
    }
}

/// Text of the comma inserted at a newline.
const AUTOMATIC_COMMA: &str = "automatic ,";

/// A single token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
    /// Source text of the token. For error tokens, the error message.
    pub text: String,
}

impl Token {
    /// Whether this comma was inserted by the lexer at a newline.
    pub fn is_automatic(&self) -> bool {
        self.kind == TokenKind::Comma && self.text == AUTOMATIC_COMMA
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TokenKind::Eof => f.write_str("EOF"),
            TokenKind::Error(err) => write!(f, "{}", err),
            TokenKind::String | TokenKind::RawString | TokenKind::Identifier | TokenKind::Comment
                if self.text.chars().count() > 10 =>
            {
                let short: String = self.text.chars().take(10).collect();
                write!(f, "<{}: {:?}>...", self.kind.name(), short)
            }
            TokenKind::Bool
            | TokenKind::Number
            | TokenKind::String
            | TokenKind::RawString
            | TokenKind::Identifier
            | TokenKind::Comment => write!(f, "<{}: {:?}>", self.kind.name(), self.text),
            _ => write!(f, "<{}>", self.text),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    String,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Text,
    Space,
    Comment,
    LineComment,
    BlockComment,
    Quote,
    String,
    RawQuote,
    Number,
    Identifier,
    Variable,
}

/// Tokenize `input`.
pub fn lex(input: &[u8]) -> Lexer<'_> {
    Lexer::new(input)
}

/// Pull-based SC tokenizer.
pub struct Lexer<'a> {
    input: &'a [u8],
    /// Start of the token being scanned.
    start: usize,
    pos: usize,
    /// Width of the last character read, for `backup`.
    width: usize,
    line: usize,
    start_line: usize,
    insert_comma: bool,
    mode: Mode,
    state: Option<State>,
    pending: VecDeque<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            start: 0,
            pos: 0,
            width: 0,
            line: 1,
            start_line: 1,
            insert_comma: false,
            mode: Mode::Normal,
            state: Some(State::Text),
            pending: VecDeque::new(),
        }
    }

    /// Stop lexing. Queued tokens are discarded and the iterator is
    /// exhausted afterwards.
    pub fn close(&mut self) {
        self.state = None;
        self.pending.clear();
    }

    // =========================================================================
    // Input handling
    // =========================================================================

    fn next_char(&mut self) -> Option<char> {
        if self.pos >= self.input.len() {
            self.width = 0;
            return None;
        }
        let (c, width) = decode_char(&self.input[self.pos..]);
        self.width = width;
        self.pos += width;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    /// Step back one character. Only valid once per call of `next_char`.
    fn backup(&mut self) {
        self.pos -= self.width;
        if self.width == 1 && self.input[self.pos] == b'\n' {
            self.line -= 1;
        }
    }

    fn peek(&mut self) -> Option<char> {
        let c = self.next_char();
        self.backup();
        c
    }

    fn accept(&mut self, valid: &str) -> bool {
        match self.next_char() {
            Some(c) if valid.contains(c) => true,
            _ => {
                self.backup();
                false
            }
        }
    }

    fn accept_digits(&mut self) {
        while matches!(self.peek(), Some('0'..='9')) {
            self.next_char();
        }
    }

    fn accept_alphanumeric(&mut self) {
        while matches!(self.peek(), Some(c) if is_alphanumeric(c)) {
            self.next_char();
        }
    }

    /// The character after an identifier, if it is not a valid terminator.
    fn bad_terminator(&mut self) -> Option<char> {
        match self.peek() {
            None => None,
            Some(c) if is_space(c) || is_end_of_line(c) => None,
            Some(',' | ':' | '.' | ']' | '}') => None,
            Some(c) => Some(c),
        }
    }

    fn token_pos(&self) -> Pos {
        let line_start = self.input[..self.start]
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |i| i + 1);
        Pos {
            line: self.start_line,
            column: char_count(&self.input[line_start..self.start]) + 1,
            byte: self.start,
        }
    }

    // =========================================================================
    // Token output
    // =========================================================================

    fn emit(&mut self, kind: TokenKind) {
        let text = String::from_utf8_lossy(&self.input[self.start..self.pos]).into_owned();
        self.pending.push_back(Token {
            kind,
            pos: self.token_pos(),
            text,
        });
        self.start = self.pos;
        self.start_line = self.line;
    }

    /// Queue a comma if the last token ended a value. The comma does not
    /// consume any input.
    fn emit_automatic_comma(&mut self) {
        if !self.insert_comma {
            return;
        }
        self.insert_comma = false;
        self.pending.push_back(Token {
            kind: TokenKind::Comma,
            pos: self.token_pos(),
            text: AUTOMATIC_COMMA.to_string(),
        });
    }

    /// Skip the pending input.
    fn ignore(&mut self) {
        self.line += self.input[self.start..self.pos]
            .iter()
            .filter(|&&b| b == b'\n')
            .count();
        self.start = self.pos;
        self.start_line = self.line;
    }

    fn error(&mut self, err: LexError) -> Option<State> {
        self.pending.push_back(Token {
            kind: TokenKind::Error(err.clone()),
            pos: self.token_pos(),
            text: err.to_string(),
        });
        tracing::debug!(error = %err, line = self.start_line, "lex error");
        None
    }

    // =========================================================================
    // States
    // =========================================================================

    fn step(&mut self, state: State) -> Option<State> {
        match state {
            State::Text => self.lex_text(),
            State::Space => self.lex_space(),
            State::Comment => self.lex_comment(),
            State::LineComment => self.lex_line_comment(),
            State::BlockComment => self.lex_block_comment(),
            State::Quote => self.lex_quote(),
            State::String => self.lex_string(),
            State::RawQuote => self.lex_raw_quote(),
            State::Number => self.lex_number(),
            State::Identifier => self.lex_identifier(),
            State::Variable => self.lex_variable(),
        }
    }

    fn lex_text(&mut self) -> Option<State> {
        if self.mode == Mode::String {
            return Some(State::String);
        }
        match self.next_char() {
            None => {
                self.emit(TokenKind::Eof);
                return None;
            }
            Some(c) if is_space(c) || is_end_of_line(c) => {
                self.backup();
                return Some(State::Space);
            }
            Some('/') => return Some(State::Comment),
            Some(':') => {
                self.emit(TokenKind::Colon);
                self.insert_comma = false;
            }
            Some(',') => {
                self.emit(TokenKind::Comma);
                self.insert_comma = false;
            }
            Some('[') => self.emit(TokenKind::LeftSquare),
            Some(']') => {
                self.emit(TokenKind::RightSquare);
                self.insert_comma = true;
            }
            Some('{') => self.emit(TokenKind::LeftCurly),
            Some('}') => {
                self.emit(TokenKind::RightCurly);
                self.insert_comma = true;
            }
            Some('"') => return Some(State::Quote),
            Some('`') => return Some(State::RawQuote),
            Some('$') => return Some(State::Variable),
            Some('-' | '0'..='9') => {
                self.backup();
                return Some(State::Number);
            }
            Some(c) if is_alphanumeric(c) => {
                self.backup();
                return Some(State::Identifier);
            }
            Some(c) => return self.error(LexError::UnrecognizedChar(c)),
        }
        Some(State::Text)
    }

    fn lex_space(&mut self) -> Option<State> {
        loop {
            match self.peek() {
                Some(c) if is_end_of_line(c) => {
                    // '\r' and '\n' are one byte; `ignore` counts the lines
                    self.pos += 1;
                    self.emit_automatic_comma();
                }
                Some(c) if is_space(c) => {
                    self.next_char();
                }
                _ => break,
            }
        }
        self.ignore();
        Some(State::Text)
    }

    fn lex_comment(&mut self) -> Option<State> {
        match self.next_char() {
            Some('/') => Some(State::LineComment),
            Some('*') => Some(State::BlockComment),
            c => self.error(LexError::UnrecognizedSequence(c)),
        }
    }

    fn lex_line_comment(&mut self) -> Option<State> {
        // The comment runs to a newline or EOF, either of which ends the line.
        self.emit_automatic_comma();
        let newline = self.input[self.pos..].iter().position(|&b| b == b'\n');
        self.pos = newline.map_or(self.input.len(), |i| self.pos + i);
        self.emit(TokenKind::Comment);
        if newline.is_some() {
            self.pos += 1;
            self.ignore();
        }
        Some(State::Text)
    }

    fn lex_block_comment(&mut self) -> Option<State> {
        let Some(end) = self.input[self.pos..].windows(2).position(|w| w == b"*/") else {
            return self.error(LexError::UnclosedBlockComment);
        };
        self.pos += end + 2;
        let lines = self.input[self.start..self.pos]
            .iter()
            .filter(|&&b| b == b'\n')
            .count();
        if lines > 0 {
            self.emit_automatic_comma();
        }
        self.line += lines;
        self.emit(TokenKind::Comment);
        Some(State::Text)
    }

    fn lex_quote(&mut self) -> Option<State> {
        self.emit(TokenKind::Quote);
        match self.mode {
            Mode::Normal => {
                self.mode = Mode::String;
                Some(State::String)
            }
            Mode::String => {
                self.mode = Mode::Normal;
                self.insert_comma = true;
                Some(State::Text)
            }
        }
    }

    fn lex_string(&mut self) -> Option<State> {
        // A '}' right after a variable closes it, anywhere else it is text.
        if self.peek() == Some('}') {
            self.next_char();
            self.emit(TokenKind::RightCurly);
        }
        loop {
            match self.next_char() {
                Some('\\') => {
                    if matches!(self.next_char(), None | Some('\n')) {
                        return self.error(LexError::UnterminatedString);
                    }
                }
                None | Some('\n') => return self.error(LexError::UnterminatedString),
                Some('"' | '$') => {
                    self.backup();
                    break;
                }
                Some(_) => {}
            }
        }
        if self.pos > self.start {
            self.emit(TokenKind::String);
        }
        match self.next_char() {
            Some('"') => Some(State::Quote),
            Some('$') => Some(State::Variable),
            _ => self.error(LexError::UnterminatedString),
        }
    }

    fn lex_raw_quote(&mut self) -> Option<State> {
        loop {
            match self.next_char() {
                None => return self.error(LexError::UnterminatedRawString),
                Some('`') => break,
                Some(_) => {}
            }
        }
        self.emit(TokenKind::RawString);
        self.insert_comma = true;
        Some(State::Text)
    }

    fn lex_number(&mut self) -> Option<State> {
        self.accept("-");
        self.accept_digits();
        if self.accept(".") {
            self.accept_digits();
        }
        if self.accept("eE") {
            self.accept("+-");
            self.accept_digits();
        }
        if matches!(self.peek(), Some(c) if is_alphanumeric(c)) {
            self.next_char();
            let text = String::from_utf8_lossy(&self.input[self.start..self.pos]).into_owned();
            return self.error(LexError::BadNumber(text));
        }
        self.emit(TokenKind::Number);
        self.insert_comma = true;
        Some(State::Text)
    }

    fn lex_identifier(&mut self) -> Option<State> {
        self.accept_alphanumeric();
        if let Some(c) = self.bad_terminator() {
            return self.error(LexError::BadIdentifierChar(c));
        }
        let kind = match &self.input[self.start..self.pos] {
            b"null" => TokenKind::Null,
            b"true" | b"false" => TokenKind::Bool,
            _ => TokenKind::Identifier,
        };
        self.emit(kind);
        self.insert_comma = true;
        Some(State::Text)
    }

    fn lex_variable(&mut self) -> Option<State> {
        let c = self.next_char();
        if c != Some('{') {
            if self.mode == Mode::String {
                // A lone '$' is plain text inside a string.
                self.backup();
                return Some(State::String);
            }
            return self.error(LexError::BadVariableStart(c));
        }
        self.emit(TokenKind::VariableStart);

        if self.bad_terminator().is_none() {
            return self.error(LexError::MissingVariableName);
        }
        match self.next_char() {
            Some(c) if c == '_' || c.is_alphabetic() => {}
            Some(c) => return self.error(LexError::BadVariableNameStart(c)),
            None => return self.error(LexError::MissingVariableName),
        }
        self.accept_alphanumeric();
        if let Some(c) = self.bad_terminator() {
            return self.error(LexError::BadVariableChar(c));
        }
        self.emit(TokenKind::Identifier);
        Some(State::Text)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Some(token);
            }
            let state = self.state.take()?;
            self.state = self.step(state);
        }
    }
}

fn is_space(c: char) -> bool {
    c == ' ' || c == '\t'
}

fn is_end_of_line(c: char) -> bool {
    c == '\r' || c == '\n'
}

pub(crate) fn is_alphanumeric(c: char) -> bool {
    c == '_' || c.is_alphabetic() || is_decimal_digit(c)
}

/// First code point of every run of decimal digits (general category Nd).
/// Each run holds the digits 0 through 9, except the mathematical digits
/// at U+1D7CE, which repeat 0-9 in five styles.
const DIGIT_ZEROS: [u32; 64] = [
    0x0030, 0x0660, 0x06F0, 0x07C0, 0x0966, 0x09E6, 0x0A66, 0x0AE6, 0x0B66, 0x0BE6, 0x0C66,
    0x0CE6, 0x0D66, 0x0DE6, 0x0E50, 0x0ED0, 0x0F20, 0x1040, 0x1090, 0x17E0, 0x1810, 0x1946,
    0x19D0, 0x1A80, 0x1A90, 0x1B50, 0x1BB0, 0x1C40, 0x1C50, 0xA620, 0xA8D0, 0xA900, 0xA9D0,
    0xA9F0, 0xAA50, 0xABF0, 0xFF10, 0x104A0, 0x10D30, 0x11066, 0x110F0, 0x11136, 0x111D0,
    0x112F0, 0x11450, 0x114D0, 0x11650, 0x116C0, 0x11730, 0x118E0, 0x11950, 0x11C50, 0x11D50,
    0x11DA0, 0x11F50, 0x16A60, 0x16AC0, 0x16B50, 0x1D7CE, 0x1E140, 0x1E2F0, 0x1E4F0, 0x1E950,
    0x1FBF0,
];

/// Whether `c` is a decimal digit in any script. Superscripts, fractions
/// and other numeric symbols are not.
pub(crate) fn is_decimal_digit(c: char) -> bool {
    if c.is_ascii() {
        return c.is_ascii_digit();
    }
    let c = c as u32;
    let i = DIGIT_ZEROS.partition_point(|&zero| zero <= c);
    if i == 0 {
        return false;
    }
    let zero = DIGIT_ZEROS[i - 1];
    let run = if zero == 0x1D7CE { 50 } else { 10 };
    c - zero < run
}

/// Decode the first character of `bytes`. Invalid UTF-8 decodes as one
/// U+FFFD per byte.
fn decode_char(bytes: &[u8]) -> (char, usize) {
    let len = match bytes[0] {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf7 => 4,
        _ => return (char::REPLACEMENT_CHARACTER, 1),
    };
    match bytes.get(..len).and_then(|b| std::str::from_utf8(b).ok()) {
        Some(s) => match s.chars().next() {
            Some(c) => (c, len),
            None => (char::REPLACEMENT_CHARACTER, 1),
        },
        None => (char::REPLACEMENT_CHARACTER, 1),
    }
}

fn char_count(mut bytes: &[u8]) -> usize {
    let mut n = 0;
    while !bytes.is_empty() {
        let (_, width) = decode_char(bytes);
        bytes = &bytes[width..];
        n += 1;
    }
    n
}
