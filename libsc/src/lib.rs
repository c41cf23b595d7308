//! SC configuration language.
//!
//! SC is a small configuration format: a document is a dictionary of
//! `key: value` members holding null, booleans, numbers, strings, lists
//! and nested dictionaries. Double-quoted strings may refer to variables
//! (`"${home}/data"`), which are supplied when the document is bound, and
//! commas may be left out at the end of a line.
//!
//! # Pipeline
//!
//! 1. **Lexer**: turns source bytes into tokens, inserting the commas that
//!    line breaks stand for.
//!
//! 2. **Parser**: builds a syntax tree from the tokens, keeping comments
//!    attached to the nodes around them.
//!
//! 3. **Printer**: renders a tree in the canonical layout.
//!
//! 4. **Binding**: fills Rust values from a tree ([`Decode`]), substituting
//!    variables, and builds trees from Rust values ([`Encode`]).
//!
//! # Example
//!
//! ```
//! use libsc::{record, unmarshal_with, Options, Variables};
//!
//! #[derive(Debug, Default)]
//! struct Config {
//!     code: i64,
//!     path: String,
//! }
//!
//! record!(Config { code, path });
//!
//! let mut vars = Variables::new();
//! vars.insert("id", 145);
//! vars.insert("user", "ted");
//!
//! let mut config = Config::default();
//! unmarshal_with(
//!     "{ code: ${id}, path: \"/home/${user}/data\" }",
//!     &mut config,
//!     &Options::new().variables(vars),
//! )
//! .unwrap();
//! assert_eq!(config.code, 145);
//! assert_eq!(config.path, "/home/ted/data");
//! ```

mod decode;
mod encode;
mod error;
mod fields;
mod lexer;
mod node;
mod parser;
mod printer;
mod value;
mod variables;

use std::io::Read;

pub use decode::{Decode, Decoder, KeyDecode, Options, TextDecode};
pub use encode::{marshal, marshal_document, Encode, KeyEncode, TextEncode};
pub use error::{
    DecodeError, EncodeError, Error, Errors, HookError, LexError, ParseError, ParseErrorKind,
    Result,
};
pub use fields::{FieldDef, Record};
pub use lexer::{lex, Lexer, Token, TokenKind};
pub use node::{
    BoolNode, Comment, CommentGroup, DictionaryNode, IdentifierNode, InterpolatedStringNode,
    KeyNode, ListNode, MemberNode, Node, NodeKind, NullNode, NumberNode, Pos, RawStringNode,
    StringNode, StringPart, VariableNode,
};
pub use parser::parse;
pub use printer::format;
pub use value::{Bytes, Text, Value};
pub use variables::Variables;

#[doc(hidden)]
pub use decode::decode_record;
#[doc(hidden)]
pub use encode::encode_record;

/// Parse `input` and bind it into `dest` with default options.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
///
/// let mut map: HashMap<String, i64> = HashMap::new();
/// libsc::unmarshal("{ a: 1, b: 2 }", &mut map).unwrap();
/// assert_eq!(map["b"], 2);
/// ```
pub fn unmarshal<T: Decode + ?Sized>(
    input: impl AsRef<[u8]>,
    dest: &mut T,
) -> std::result::Result<(), Error> {
    unmarshal_with(input, dest, &Options::default())
}

/// Parse `input` and bind it into `dest`.
///
/// A syntax error is returned alone. Otherwise every binding error is
/// collected into [`Errors`]; `dest` then holds whatever could be bound.
pub fn unmarshal_with<T: Decode + ?Sized>(
    input: impl AsRef<[u8]>,
    dest: &mut T,
    options: &Options,
) -> std::result::Result<(), Error> {
    // Phase 1: Lex and parse into a syntax tree
    let doc = parse(input)?;

    // Phase 2: Bind the tree into the destination
    unmarshal_node(&Node::Dictionary(doc), dest, options)?;
    Ok(())
}

/// Bind an already parsed node into `dest`, for example one captured
/// earlier in a [`Node`] field.
pub fn unmarshal_node<T: Decode + ?Sized>(
    node: &Node,
    dest: &mut T,
    options: &Options,
) -> std::result::Result<(), Errors> {
    decode::bind(node, dest, options)
}

/// Read all of `reader`, then parse and bind it into `dest`.
pub fn from_reader<R: Read, T: Decode + ?Sized>(
    mut reader: R,
    dest: &mut T,
    options: &Options,
) -> std::result::Result<(), Error> {
    let mut input = Vec::new();
    reader.read_to_end(&mut input)?;
    unmarshal_with(input, dest, options)
}
