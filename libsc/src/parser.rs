//! Recursive-descent parser for SC documents.
//!
//! The parser pulls tokens from the lexer with one token of lookahead and
//! stops at the first error. Comments are attached to the nodes around
//! them as they are read:
//!
//! - comments before a value or key become its head comments,
//! - comments on the same line after a value, key or comma become inline
//!   comments of that value,
//! - comments before a closing bracket become foot comments of the last
//!   element, or inner comments when the collection is empty.

use crate::error::{ParseError, ParseErrorKind, Result};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::node::{
    BoolNode, Comment, CommentGroup, DictionaryNode, IdentifierNode, InterpolatedStringNode,
    KeyNode, ListNode, MemberNode, Node, NullNode, NumberNode, Pos, RawStringNode, StringNode,
    StringPart, VariableNode,
};

/// Parse an SC document. The top level value must be a dictionary.
///
/// # Example
///
/// ```
/// use libsc::parse;
///
/// let doc = parse("{ name: \"svc\", memory: 256 }").unwrap();
/// assert_eq!(doc.members.len(), 2);
/// ```
pub fn parse(input: impl AsRef<[u8]>) -> Result<DictionaryNode> {
    let input = input.as_ref();
    tracing::trace!(len = input.len(), "parsing SC document");
    let mut parser = Parser::new(Lexer::new(input));
    let result = parser.parse_document();
    parser.lexer.close();
    if let Err(err) = &result {
        tracing::debug!(error = %err, "parse failed");
    }
    result
}

/// A value or member, or the closing bracket of the enclosing collection.
enum Element<T> {
    Item(T),
    End(End),
}

/// A closing bracket and the comments around it.
struct End {
    pos: Pos,
    comments: CommentGroup,
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    peeked: Option<Token>,
}

impl<'a> Parser<'a> {
    fn new(lexer: Lexer<'a>) -> Self {
        Self {
            lexer,
            peeked: None,
        }
    }

    // =========================================================================
    // Token handling
    // =========================================================================

    fn next(&mut self) -> Token {
        match self.peeked.take() {
            Some(token) => token,
            None => read(&mut self.lexer),
        }
    }

    fn peek(&mut self) -> &Token {
        let lexer = &mut self.lexer;
        self.peeked.get_or_insert_with(|| read(lexer))
    }

    fn peek_kind(&mut self) -> TokenKind {
        self.peek().kind.clone()
    }

    fn expect(&mut self, kind: TokenKind, context: &'static str) -> Result<Token> {
        let token = self.next();
        if token.kind != kind {
            return Err(unexpected(token, context));
        }
        Ok(token)
    }

    // =========================================================================
    // Document
    // =========================================================================

    fn parse_document(&mut self) -> Result<DictionaryNode> {
        let mut doc = match self.parse_value()? {
            Element::Item(Node::Dictionary(doc)) => doc,
            Element::Item(node) => {
                return Err(ParseError::new(
                    node.pos(),
                    ParseErrorKind::TopLevelNotDictionary,
                ))
            }
            Element::End(end) => {
                return Err(ParseError::new(
                    end.pos,
                    ParseErrorKind::TopLevelNotDictionary,
                ))
            }
        };

        // Only comments, one trailing comma and EOF may follow.
        let mut comma_line = None;
        loop {
            match self.peek_kind() {
                TokenKind::Eof => {
                    self.next();
                    break;
                }
                TokenKind::Comment => {
                    let comment = self.parse_comment();
                    if comma_line == Some(comment.pos.line) {
                        doc.comments.inline.push(comment);
                    } else {
                        doc.comments.foot.push(comment);
                    }
                }
                TokenKind::Comma if comma_line.is_none() => {
                    comma_line = Some(self.next().pos.line);
                }
                _ => return Err(unexpected(self.next(), "end of document")),
            }
        }
        Ok(doc)
    }

    // =========================================================================
    // Comments
    // =========================================================================

    fn parse_comment(&mut self) -> Comment {
        let token = self.next();
        let (text, is_block) = match token.text.strip_prefix("//") {
            Some(text) => (text, false),
            None => {
                let text = token.text.strip_prefix("/*").unwrap_or(&token.text);
                (text.strip_suffix("*/").unwrap_or(text), true)
            }
        };
        Comment {
            pos: token.pos,
            text: text.to_string(),
            is_block,
        }
    }

    fn head_comments(&mut self) -> Vec<Comment> {
        let mut comments = Vec::new();
        while self.peek().kind == TokenKind::Comment {
            comments.push(self.parse_comment());
        }
        comments
    }

    fn inline_comments(&mut self, line: usize) -> Vec<Comment> {
        let mut comments = Vec::new();
        loop {
            let token = self.peek();
            if token.kind != TokenKind::Comment || token.pos.line != line {
                break;
            }
            comments.push(self.parse_comment());
        }
        comments
    }

    // =========================================================================
    // Values
    // =========================================================================

    fn parse_value(&mut self) -> Result<Element<Node>> {
        let head = self.head_comments();

        let mut element = match self.peek_kind() {
            TokenKind::Null => Element::Item(Node::Null(NullNode {
                pos: self.next().pos,
                ..NullNode::default()
            })),
            TokenKind::Bool => {
                let token = self.next();
                Element::Item(Node::Bool(BoolNode {
                    pos: token.pos,
                    value: token.text == "true",
                    ..BoolNode::default()
                }))
            }
            TokenKind::Number => {
                let token = self.next();
                let number = NumberNode::parse(token.pos, &token.text)
                    .map_err(|kind| ParseError::new(token.pos, kind))?;
                Element::Item(Node::Number(number))
            }
            TokenKind::Quote => Element::Item(Node::InterpolatedString(self.parse_string()?)),
            TokenKind::RawString => {
                let token = self.next();
                Element::Item(Node::RawString(raw_string(token)))
            }
            TokenKind::VariableStart => {
                let start = self.next();
                Element::Item(Node::Variable(self.parse_variable(start)?))
            }
            TokenKind::LeftCurly => Element::Item(Node::Dictionary(self.parse_dictionary()?)),
            TokenKind::LeftSquare => Element::Item(Node::List(self.parse_list()?)),
            TokenKind::RightSquare => Element::End(End {
                pos: self.next().pos,
                comments: CommentGroup::default(),
            }),
            _ => return Err(unexpected(self.next(), "value")),
        };

        let line = match &element {
            Element::Item(node) => node.pos().line,
            Element::End(end) => end.pos.line,
        };
        let inline = self.inline_comments(line);
        let comments = match &mut element {
            Element::Item(node) => node.comments_mut(),
            Element::End(end) => &mut end.comments,
        };
        comments.head.extend(head);
        comments.inline.extend(inline);
        Ok(element)
    }

    fn parse_string(&mut self) -> Result<InterpolatedStringNode> {
        let start = self.next();
        let mut node = InterpolatedStringNode {
            pos: start.pos,
            ..InterpolatedStringNode::default()
        };
        // Adjacent fragments (including stray '}') merge into one.
        let mut text: Option<StringNode> = None;
        loop {
            let token = self.next();
            match token.kind {
                TokenKind::Quote => break,
                TokenKind::String | TokenKind::RightCurly => {
                    let value = unescape(&token.text).map_err(|k| ParseError::new(token.pos, k))?;
                    match &mut text {
                        Some(fragment) => fragment.value.push_str(&value),
                        None => {
                            text = Some(StringNode {
                                pos: token.pos,
                                value,
                                ..StringNode::default()
                            })
                        }
                    }
                }
                TokenKind::VariableStart => {
                    if let Some(fragment) = text.take() {
                        node.parts.push(StringPart::Text(fragment));
                    }
                    let variable = self.parse_variable(token)?;
                    node.parts.push(StringPart::Variable(variable));
                }
                _ => return Err(unexpected(token, "string value")),
            }
        }
        if let Some(fragment) = text {
            node.parts.push(StringPart::Text(fragment));
        }
        Ok(node)
    }

    fn parse_string_key(&mut self, start: Token) -> Result<StringNode> {
        let mut value = String::new();
        loop {
            let token = self.next();
            match token.kind {
                TokenKind::Quote => break,
                TokenKind::String | TokenKind::RightCurly => {
                    let text = unescape(&token.text).map_err(|k| ParseError::new(token.pos, k))?;
                    value.push_str(&text);
                }
                TokenKind::VariableStart => {
                    return Err(unexpected(
                        token,
                        "string key, dictionary keys cannot contain variables",
                    ))
                }
                _ => return Err(unexpected(token, "string key")),
            }
        }
        Ok(StringNode {
            pos: start.pos,
            value,
            ..StringNode::default()
        })
    }

    /// Parse the rest of `${name}` after the `${` token.
    fn parse_variable(&mut self, start: Token) -> Result<VariableNode> {
        let name = self.expect(TokenKind::Identifier, "variable")?;
        self.expect(TokenKind::RightCurly, "variable, expected '}'")?;
        Ok(VariableNode {
            pos: start.pos,
            comments: CommentGroup::default(),
            identifier: IdentifierNode {
                pos: name.pos,
                name: name.text,
                ..IdentifierNode::default()
            },
        })
    }

    // =========================================================================
    // Collections
    // =========================================================================

    fn parse_member(&mut self) -> Result<Element<MemberNode>> {
        let head = self.head_comments();

        let token = self.next();
        let mut key = match token.kind {
            TokenKind::RightCurly => {
                let inline = self.inline_comments(token.pos.line);
                return Ok(Element::End(End {
                    pos: token.pos,
                    comments: CommentGroup {
                        head,
                        inline,
                        ..CommentGroup::default()
                    },
                }));
            }
            TokenKind::Identifier => KeyNode::Identifier(IdentifierNode {
                pos: token.pos,
                name: token.text,
                ..IdentifierNode::default()
            }),
            TokenKind::Quote => KeyNode::String(self.parse_string_key(token)?),
            TokenKind::RawString => KeyNode::RawString(raw_string(token)),
            _ => {
                return Err(unexpected(
                    token,
                    "dictionary key, expected identifier or string",
                ))
            }
        };

        let inline = self.inline_comments(key.pos().line);
        let comments = key.comments_mut();
        comments.head = head;
        comments.inline = inline;
        self.expect(TokenKind::Colon, "dictionary element, expected ':'")?;

        let value = match self.parse_value()? {
            Element::Item(value) => value,
            Element::End(end) => {
                return Err(ParseError::new(
                    end.pos,
                    ParseErrorKind::Unexpected {
                        found: "<]>".to_string(),
                        context: "value",
                    },
                ))
            }
        };
        Ok(Element::Item(MemberNode {
            pos: key.pos(),
            comments: CommentGroup::default(),
            key,
            value,
        }))
    }

    fn parse_dictionary(&mut self) -> Result<DictionaryNode> {
        let start = self.next();
        let mut members: Vec<MemberNode> = Vec::new();
        let end = loop {
            let mut member = match self.parse_member()? {
                Element::Item(member) => member,
                Element::End(end) => break end,
            };
            // parse_member handles the closing bracket and its comments
            if self.peek().kind != TokenKind::RightCurly {
                let comma = self.expect(TokenKind::Comma, "dictionary, expected ','")?;
                // The value may span lines, so use the comma's line.
                let inline = self.inline_comments(comma.pos.line);
                member.value.comments_mut().inline.extend(inline);
            }
            members.push(member);
        };

        let mut dict = DictionaryNode {
            pos: start.pos,
            members,
            ..DictionaryNode::default()
        };
        dict.comments.inline = end.comments.inline;
        match dict.members.last_mut() {
            Some(last) => last.comments.foot = end.comments.head,
            None => dict.comments.inner = end.comments.head,
        }
        Ok(dict)
    }

    fn parse_list(&mut self) -> Result<ListNode> {
        let start = self.next();
        let mut elements: Vec<Node> = Vec::new();
        let end = loop {
            let mut element = match self.parse_value()? {
                Element::Item(element) => element,
                Element::End(end) => break end,
            };
            if self.peek().kind != TokenKind::RightSquare {
                let comma = self.expect(TokenKind::Comma, "list, expected ','")?;
                let inline = self.inline_comments(comma.pos.line);
                element.comments_mut().inline.extend(inline);
            }
            elements.push(element);
        };

        let mut list = ListNode {
            pos: start.pos,
            elements,
            ..ListNode::default()
        };
        list.comments.inline = end.comments.inline;
        match list.elements.last_mut() {
            Some(last) => last.comments_mut().foot = end.comments.head,
            None => list.comments.inner = end.comments.head,
        }
        Ok(list)
    }
}

/// Next token from the lexer. The stream always ends with EOF or an
/// error, both of which stop the parser, so running dry only happens
/// after the lexer was closed.
fn read(lexer: &mut Lexer<'_>) -> Token {
    lexer.next().unwrap_or_else(|| Token {
        kind: TokenKind::Eof,
        pos: Pos::default(),
        text: String::new(),
    })
}

fn unexpected(token: Token, context: &'static str) -> ParseError {
    match token.kind {
        TokenKind::Error(err) => ParseError::new(token.pos, err),
        _ => ParseError::new(
            token.pos,
            ParseErrorKind::Unexpected {
                found: token.to_string(),
                context,
            },
        ),
    }
}

fn raw_string(token: Token) -> RawStringNode {
    let value = token
        .text
        .strip_prefix('`')
        .and_then(|s| s.strip_suffix('`'))
        .unwrap_or(&token.text)
        .to_string();
    RawStringNode {
        pos: token.pos,
        value,
        ..RawStringNode::default()
    }
}

// =============================================================================
// String escapes
// =============================================================================

/// Decode the escape sequences of a quoted string fragment.
fn unescape(s: &str) -> std::result::Result<String, ParseErrorKind> {
    if !s.bytes().any(|b| b == b'\\' || b == b'"' || b < b' ') {
        return Ok(s.to_string());
    }

    let mut out = String::with_capacity(s.len() + 8);
    let mut i = 0;
    while let Some(c) = s[i..].chars().next() {
        match c {
            '\\' => {
                let escaped = s[i + 1..]
                    .chars()
                    .next()
                    .ok_or(ParseErrorKind::UnterminatedEscape)?;
                let decoded = match escaped {
                    '"' | '\\' | '/' | '\'' | '$' => escaped,
                    'b' => '\u{8}',
                    'f' => '\u{c}',
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    'u' => {
                        let (decoded, len) = unescape_unicode(&s[i..])?;
                        out.push(decoded);
                        i += len;
                        continue;
                    }
                    other => return Err(ParseErrorKind::InvalidEscape(other)),
                };
                out.push(decoded);
                i += 2;
            }
            '"' => return Err(ParseErrorKind::InvalidStringChar(c)),
            c if c < ' ' => return Err(ParseErrorKind::InvalidStringChar(c)),
            c => {
                out.push(c);
                i += c.len_utf8();
            }
        }
    }
    Ok(out)
}

/// Decode `\uXXXX` at the start of `s`, pairing UTF-16 surrogates when a
/// second escape follows. Returns the character and the input consumed.
fn unescape_unicode(s: &str) -> std::result::Result<(char, usize), ParseErrorKind> {
    let high = hex4(s).ok_or(ParseErrorKind::InvalidUnicodeEscape)?;
    if !(0xD800..0xE000).contains(&high) {
        return Ok((
            char::from_u32(high).unwrap_or(char::REPLACEMENT_CHARACTER),
            6,
        ));
    }
    let pair = hex4(&s[6..]).and_then(|low| {
        if (0xD800..0xDC00).contains(&high) && (0xDC00..0xE000).contains(&low) {
            char::from_u32(0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00))
        } else {
            None
        }
    });
    match pair {
        Some(c) => Ok((c, 12)),
        None => Ok((char::REPLACEMENT_CHARACTER, 6)),
    }
}

/// Parse the four hex digits of a `\uXXXX` escape at the start of `s`.
fn hex4(s: &str) -> Option<u32> {
    let bytes = s.as_bytes();
    if bytes.len() < 6 || bytes[0] != b'\\' || bytes[1] != b'u' {
        return None;
    }
    let digits = &bytes[2..6];
    if !digits.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    u32::from_str_radix(std::str::from_utf8(digits).ok()?, 16).ok()
}
