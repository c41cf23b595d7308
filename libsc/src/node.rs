//! SC syntax tree.
//!
//! The parser produces a [`DictionaryNode`] for every document. Each node
//! records where it started in the source and the comments the parser
//! attached to it, so the printer can reproduce them.
//!
//! Nodes can also be assembled by hand (the encoder does exactly that);
//! such nodes carry the zero position.

use std::fmt;

use crate::error::ParseErrorKind;
use crate::lexer::is_alphanumeric;
use crate::printer::escape_string;

/// Position of a token or node in the source text.
///
/// `line` and `column` are 1-based and `column` counts characters, not
/// bytes. `byte` is the raw offset into the input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
    pub byte: usize,
}

impl Pos {
    pub fn new(line: usize, column: usize, byte: usize) -> Self {
        Self { line, column, byte }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A single `//` or `/* */` comment. `text` excludes the delimiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub pos: Pos,
    pub text: String,
    pub is_block: bool,
}

impl Comment {
    pub fn line(text: impl Into<String>) -> Self {
        Self {
            pos: Pos::default(),
            text: text.into(),
            is_block: false,
        }
    }

    pub fn block(text: impl Into<String>) -> Self {
        Self {
            pos: Pos::default(),
            text: text.into(),
            is_block: true,
        }
    }
}

/// Comments attached to a node.
///
/// `head` comments precede the node, `inline` comments follow it on the
/// same line. `foot` holds comments between the last element of a
/// collection and its closing bracket, and `inner` holds the comments of
/// an empty collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentGroup {
    pub head: Vec<Comment>,
    pub inline: Vec<Comment>,
    pub foot: Vec<Comment>,
    pub inner: Vec<Comment>,
}

impl CommentGroup {
    pub fn is_empty(&self) -> bool {
        self.head.is_empty() && self.inline.is_empty() && self.foot.is_empty() && self.inner.is_empty()
    }

    fn clear_positions(&mut self) {
        for c in self
            .head
            .iter_mut()
            .chain(self.inline.iter_mut())
            .chain(self.foot.iter_mut())
            .chain(self.inner.iter_mut())
        {
            c.pos = Pos::default();
        }
    }
}

/// The kind of a node, used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Null,
    Bool,
    Number,
    String,
    InterpolatedString,
    RawString,
    Identifier,
    Variable,
    List,
    Member,
    Dictionary,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Null => "Null",
            NodeKind::Bool => "Bool",
            NodeKind::Number => "Number",
            NodeKind::String => "String",
            NodeKind::InterpolatedString => "InterpolatedString",
            NodeKind::RawString => "RawString",
            NodeKind::Identifier => "Identifier",
            NodeKind::Variable => "Variable",
            NodeKind::List => "List",
            NodeKind::Member => "Member",
            NodeKind::Dictionary => "Dictionary",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Scalars
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NullNode {
    pub pos: Pos,
    pub comments: CommentGroup,
}

impl NullNode {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolNode {
    pub pos: Pos,
    pub comments: CommentGroup,
    pub value: bool,
}

impl BoolNode {
    pub fn new(value: bool) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }
}

// -2^63, 2^63 and 2^64: the integer ranges as exact floats.
const I64_MIN: f64 = -9_223_372_036_854_775_808.0;
const I64_END: f64 = 9_223_372_036_854_775_808.0;
const U64_END: f64 = 18_446_744_073_709_551_616.0;

/// A number literal.
///
/// A literal is parsed once into every representation it fits: unsigned,
/// signed and floating point. `raw` keeps the source text so the printer
/// can reproduce it; it is empty for numbers built in code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumberNode {
    pub pos: Pos,
    pub comments: CommentGroup,
    pub is_uint: bool,
    pub is_int: bool,
    pub is_float: bool,
    pub uint64: u64,
    pub int64: i64,
    pub float64: f64,
    pub raw: String,
}

impl NumberNode {
    /// Parse a number literal as scanned by the lexer.
    pub fn parse(pos: Pos, raw: &str) -> Result<Self, ParseErrorKind> {
        let mut n = NumberNode {
            pos,
            raw: raw.to_string(),
            ..Self::default()
        };

        if let Ok(u) = raw.parse::<u64>() {
            n.is_uint = true;
            n.uint64 = u;
        }
        if let Ok(i) = raw.parse::<i64>() {
            n.is_int = true;
            n.int64 = i;
            if i == 0 {
                // "-0" is not a valid unsigned literal
                n.is_uint = true;
                n.uint64 = 0;
            }
        }

        if n.is_int {
            n.is_float = true;
            n.float64 = n.int64 as f64;
        } else if let Some(f) = raw.parse::<f64>().ok().filter(|f| f.is_finite()) {
            if !raw.contains(|c| matches!(c, '.' | 'e' | 'E')) {
                return Err(ParseErrorKind::IntegerOverflow(raw.to_string()));
            }
            n.is_float = true;
            n.float64 = f;

            // An exponent can still denote an integer, e.g. 1e4. `as`
            // saturates, so the range is checked before casting.
            if f.fract() == 0.0 {
                if !n.is_int && (I64_MIN..I64_END).contains(&f) {
                    n.is_int = true;
                    n.int64 = f as i64;
                }
                if !n.is_uint && (0.0..U64_END).contains(&f) {
                    n.is_uint = true;
                    n.uint64 = f as u64;
                }
            }
        }

        if !n.is_uint && !n.is_int && !n.is_float {
            return Err(ParseErrorKind::InvalidNumber(raw.to_string()));
        }
        Ok(n)
    }

    pub fn from_u64(v: u64) -> Self {
        Self {
            is_uint: true,
            uint64: v,
            ..Self::default()
        }
    }

    pub fn from_i64(v: i64) -> Self {
        Self {
            is_int: true,
            int64: v,
            ..Self::default()
        }
    }

    pub fn from_f64(v: f64) -> Self {
        Self {
            is_float: true,
            float64: v,
            ..Self::default()
        }
    }

    /// The literal as written, or a canonical rendering when the number
    /// was built in code.
    pub fn text(&self) -> String {
        if !self.raw.is_empty() {
            self.raw.clone()
        } else if self.is_uint {
            self.uint64.to_string()
        } else if self.is_int {
            self.int64.to_string()
        } else if self.is_float {
            float_literal(self.float64)
        } else {
            "0".to_string()
        }
    }
}

/// Decimal text for a float, with a `.0` added to whole numbers so the
/// literal reads back as a float instead of overflowing the integer parse.
pub(crate) fn float_literal(f: impl fmt::Display) -> String {
    let mut text = f.to_string();
    if !text.contains(|c: char| !(c.is_ascii_digit() || c == '-')) {
        text.push_str(".0");
    }
    text
}

/// A fragment of quoted text, already unescaped. Also used for quoted
/// dictionary keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringNode {
    pub pos: Pos,
    pub comments: CommentGroup,
    pub value: String,
}

impl StringNode {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }
}

/// One component of a double-quoted string.
#[derive(Debug, Clone, PartialEq)]
pub enum StringPart {
    Text(StringNode),
    Variable(VariableNode),
}

/// A double-quoted string: text fragments interleaved with `${name}`
/// references.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterpolatedStringNode {
    pub pos: Pos,
    pub comments: CommentGroup,
    pub parts: Vec<StringPart>,
}

impl InterpolatedStringNode {
    pub fn new(parts: Vec<StringPart>) -> Self {
        Self {
            parts,
            ..Self::default()
        }
    }

    /// A string holding only literal text.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(vec![StringPart::Text(StringNode::new(text))])
    }
}

/// A backtick string. `value` excludes the backticks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawStringNode {
    pub pos: Pos,
    pub comments: CommentGroup,
    pub value: String,
}

impl RawStringNode {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentifierNode {
    pub pos: Pos,
    pub comments: CommentGroup,
    pub name: String,
}

impl IdentifierNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// `${name}`. The node's position is the `${` token.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableNode {
    pub pos: Pos,
    pub comments: CommentGroup,
    pub identifier: IdentifierNode,
}

impl VariableNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            identifier: IdentifierNode::new(name),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.identifier.name
    }
}

// =============================================================================
// Collections
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListNode {
    pub pos: Pos,
    pub comments: CommentGroup,
    pub elements: Vec<Node>,
}

impl ListNode {
    pub fn new(elements: Vec<Node>) -> Self {
        Self {
            elements,
            ..Self::default()
        }
    }
}

/// A dictionary key.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyNode {
    Identifier(IdentifierNode),
    String(StringNode),
    RawString(RawStringNode),
}

impl KeyNode {
    /// Key for `name`, bare when it can be written unquoted.
    pub fn from_name(name: &str) -> Self {
        if is_bare_key(name) {
            KeyNode::Identifier(IdentifierNode::new(name))
        } else {
            KeyNode::String(StringNode::new(name))
        }
    }

    /// The key's text, without quotes.
    pub fn as_str(&self) -> &str {
        match self {
            KeyNode::Identifier(n) => &n.name,
            KeyNode::String(n) => &n.value,
            KeyNode::RawString(n) => &n.value,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            KeyNode::Identifier(_) => NodeKind::Identifier,
            KeyNode::String(_) => NodeKind::String,
            KeyNode::RawString(_) => NodeKind::RawString,
        }
    }

    pub fn pos(&self) -> Pos {
        match self {
            KeyNode::Identifier(n) => n.pos,
            KeyNode::String(n) => n.pos,
            KeyNode::RawString(n) => n.pos,
        }
    }

    pub fn comments(&self) -> &CommentGroup {
        match self {
            KeyNode::Identifier(n) => &n.comments,
            KeyNode::String(n) => &n.comments,
            KeyNode::RawString(n) => &n.comments,
        }
    }

    pub fn comments_mut(&mut self) -> &mut CommentGroup {
        match self {
            KeyNode::Identifier(n) => &mut n.comments,
            KeyNode::String(n) => &mut n.comments,
            KeyNode::RawString(n) => &mut n.comments,
        }
    }

    fn clear_positions(&mut self) {
        match self {
            KeyNode::Identifier(n) => n.pos = Pos::default(),
            KeyNode::String(n) => n.pos = Pos::default(),
            KeyNode::RawString(n) => n.pos = Pos::default(),
        }
        self.comments_mut().clear_positions();
    }
}

/// A `key: value` pair. Its position is the key's position.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberNode {
    pub pos: Pos,
    pub comments: CommentGroup,
    pub key: KeyNode,
    pub value: Node,
}

impl MemberNode {
    pub fn new(key: KeyNode, value: impl Into<Node>) -> Self {
        Self {
            pos: Pos::default(),
            comments: CommentGroup::default(),
            key,
            value: value.into(),
        }
    }
}

/// A dictionary. The root of every document is one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DictionaryNode {
    pub pos: Pos,
    pub comments: CommentGroup,
    pub members: Vec<MemberNode>,
}

impl DictionaryNode {
    pub fn new(members: Vec<MemberNode>) -> Self {
        Self {
            members,
            ..Self::default()
        }
    }

    /// The first member whose key is exactly `key`.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.members
            .iter()
            .find(|m| m.key.as_str() == key)
            .map(|m| &m.value)
    }

    /// Reset every position in the tree to zero. Useful for comparing a
    /// reparsed tree with the original.
    pub fn clear_positions(&mut self) {
        self.pos = Pos::default();
        self.comments.clear_positions();
        for m in &mut self.members {
            m.pos = Pos::default();
            m.comments.clear_positions();
            m.key.clear_positions();
            m.value.clear_positions();
        }
    }
}

// =============================================================================
// Node
// =============================================================================

/// Any value node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null(NullNode),
    Bool(BoolNode),
    Number(NumberNode),
    InterpolatedString(InterpolatedStringNode),
    RawString(RawStringNode),
    Variable(VariableNode),
    List(ListNode),
    Dictionary(DictionaryNode),
}

impl Default for Node {
    fn default() -> Self {
        Node::Null(NullNode::new())
    }
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Null(_) => NodeKind::Null,
            Node::Bool(_) => NodeKind::Bool,
            Node::Number(_) => NodeKind::Number,
            Node::InterpolatedString(_) => NodeKind::InterpolatedString,
            Node::RawString(_) => NodeKind::RawString,
            Node::Variable(_) => NodeKind::Variable,
            Node::List(_) => NodeKind::List,
            Node::Dictionary(_) => NodeKind::Dictionary,
        }
    }

    pub fn pos(&self) -> Pos {
        match self {
            Node::Null(n) => n.pos,
            Node::Bool(n) => n.pos,
            Node::Number(n) => n.pos,
            Node::InterpolatedString(n) => n.pos,
            Node::RawString(n) => n.pos,
            Node::Variable(n) => n.pos,
            Node::List(n) => n.pos,
            Node::Dictionary(n) => n.pos,
        }
    }

    pub(crate) fn set_pos(&mut self, pos: Pos) {
        match self {
            Node::Null(n) => n.pos = pos,
            Node::Bool(n) => n.pos = pos,
            Node::Number(n) => n.pos = pos,
            Node::InterpolatedString(n) => n.pos = pos,
            Node::RawString(n) => n.pos = pos,
            Node::Variable(n) => n.pos = pos,
            Node::List(n) => n.pos = pos,
            Node::Dictionary(n) => n.pos = pos,
        }
    }

    pub fn comments(&self) -> &CommentGroup {
        match self {
            Node::Null(n) => &n.comments,
            Node::Bool(n) => &n.comments,
            Node::Number(n) => &n.comments,
            Node::InterpolatedString(n) => &n.comments,
            Node::RawString(n) => &n.comments,
            Node::Variable(n) => &n.comments,
            Node::List(n) => &n.comments,
            Node::Dictionary(n) => &n.comments,
        }
    }

    pub fn comments_mut(&mut self) -> &mut CommentGroup {
        match self {
            Node::Null(n) => &mut n.comments,
            Node::Bool(n) => &mut n.comments,
            Node::Number(n) => &mut n.comments,
            Node::InterpolatedString(n) => &mut n.comments,
            Node::RawString(n) => &mut n.comments,
            Node::Variable(n) => &mut n.comments,
            Node::List(n) => &mut n.comments,
            Node::Dictionary(n) => &mut n.comments,
        }
    }

    pub fn clear_positions(&mut self) {
        match self {
            Node::Dictionary(n) => return n.clear_positions(),
            Node::List(n) => {
                for e in &mut n.elements {
                    e.clear_positions();
                }
            }
            Node::InterpolatedString(n) => {
                for part in &mut n.parts {
                    match part {
                        StringPart::Text(s) => {
                            s.pos = Pos::default();
                            s.comments.clear_positions();
                        }
                        StringPart::Variable(v) => v.clear_positions(),
                    }
                }
            }
            Node::Variable(v) => return v.clear_positions(),
            _ => {}
        }
        self.set_pos(Pos::default());
        self.comments_mut().clear_positions();
    }
}

impl VariableNode {
    fn clear_positions(&mut self) {
        self.pos = Pos::default();
        self.comments.clear_positions();
        self.identifier.pos = Pos::default();
        self.identifier.comments.clear_positions();
    }
}

macro_rules! impl_into_node {
    ($($ty:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Node {
                fn from(n: $ty) -> Self {
                    Node::$variant(n)
                }
            }
        )*
    };
}

impl_into_node! {
    NullNode => Null,
    BoolNode => Bool,
    NumberNode => Number,
    InterpolatedStringNode => InterpolatedString,
    RawStringNode => RawString,
    VariableNode => Variable,
    ListNode => List,
    DictionaryNode => Dictionary,
}

/// Whether `name` can be written as a dictionary key without quotes.
pub(crate) fn is_bare_key(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_alphabetic() => {}
        _ => return false,
    }
    if !chars.all(is_alphanumeric) {
        return false;
    }
    // keywords lex as literals, not identifiers
    !matches!(name, "null" | "true" | "false")
}

// =============================================================================
// Display
// =============================================================================
//
// Compact single-line rendering, mostly for diagnostics. `printer::format`
// produces the canonical multi-line layout.

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Null(_) => f.write_str("null"),
            Node::Bool(n) => write!(f, "{}", n.value),
            Node::Number(n) => f.write_str(&n.text()),
            Node::InterpolatedString(n) => write!(f, "{}", n),
            Node::RawString(n) => write!(f, "`{}`", n.value),
            Node::Variable(n) => write!(f, "{}", n),
            Node::List(n) => {
                f.write_str("[")?;
                for (i, e) in n.elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                f.write_str("]")
            }
            Node::Dictionary(n) => write!(f, "{}", n),
        }
    }
}

impl fmt::Display for DictionaryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, m) in self.members.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", m.key, m.value)?;
        }
        f.write_str("}")
    }
}

impl fmt::Display for KeyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyNode::Identifier(n) if is_bare_key(&n.name) => f.write_str(&n.name),
            KeyNode::RawString(n) => write!(f, "`{}`", n.value),
            key => write!(f, "\"{}\"", escape_string(key.as_str())),
        }
    }
}

impl fmt::Display for InterpolatedStringNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"")?;
        for part in &self.parts {
            match part {
                StringPart::Text(s) => f.write_str(&escape_string(&s.value))?,
                StringPart::Variable(v) => write!(f, "{}", v)?,
            }
        }
        f.write_str("\"")
    }
}

impl fmt::Display for VariableNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{{}}}", self.identifier.name)
    }
}
