//! Dynamic values and hook wrappers.

use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::node::{
    float_literal, BoolNode, DictionaryNode, KeyNode, ListNode, MemberNode, Node, NullNode,
    NumberNode, Pos, RawStringNode,
};

/// An SC value of any shape.
///
/// Decoding into `Value` keeps whatever the document holds: numbers that
/// are valid signed integers become `Int`, every other number `Float`.
/// Variables are also supplied as `Value`s.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Dict(HashMap<String, Value>),
}

impl Value {
    /// Whether this is `Value::Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The boolean, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer, if this is an `Int`. Floats are not converted.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The value as a float. Integers are converted.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// The text, if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The elements, if this is a `List`.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    /// The entries, if this is a `Dict`.
    pub fn as_dict(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Dict(dict) => Some(dict),
            _ => None,
        }
    }

    /// Build the node a variable holding this value stands for. Every node
    /// in the result is placed at `pos`. Dictionary members are sorted by
    /// key.
    pub(crate) fn to_node(&self, pos: Pos) -> Node {
        match self {
            Value::Null => Node::Null(NullNode {
                pos,
                ..NullNode::default()
            }),
            Value::Bool(value) => Node::Bool(BoolNode {
                pos,
                value: *value,
                ..BoolNode::default()
            }),
            Value::Int(i) => Node::Number(number_node(pos, &i.to_string(), *i as f64)),
            Value::Float(f) => Node::Number(number_node(pos, &float_literal(f), *f)),
            Value::String(s) => Node::RawString(RawStringNode {
                pos,
                value: s.clone(),
                ..RawStringNode::default()
            }),
            Value::List(list) => Node::List(ListNode {
                pos,
                elements: list.iter().map(|v| v.to_node(pos)).collect(),
                ..ListNode::default()
            }),
            Value::Dict(dict) => {
                let mut keys: Vec<&String> = dict.keys().collect();
                keys.sort();
                let members = keys
                    .into_iter()
                    .map(|k| {
                        let mut member = MemberNode::new(KeyNode::from_name(k), dict[k].to_node(pos));
                        member.pos = pos;
                        member
                    })
                    .collect();
                Node::Dictionary(DictionaryNode {
                    pos,
                    members,
                    ..DictionaryNode::default()
                })
            }
        }
    }
}

/// A number node with every representation the literal fits. NaN and
/// infinities only have the float form.
fn number_node(pos: Pos, literal: &str, float: f64) -> NumberNode {
    let mut n = NumberNode::parse(pos, literal).unwrap_or_else(|_| NumberNode::from_f64(float));
    n.pos = pos;
    n.raw.clear();
    n
}

/// The text substituted for a variable inside a double-quoted string.
/// `Null` substitutes as nothing.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => f.write_str(s),
            Value::List(list) => {
                f.write_str("[")?;
                for (i, v) in list.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", v)?;
                }
                f.write_str("]")
            }
            Value::Dict(dict) => {
                let mut keys: Vec<&String> = dict.keys().collect();
                keys.sort();
                f.write_str("{")?;
                for (i, k) in keys.into_iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}:{}", k, dict[k])?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Int(i64::from(n))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f64::from(f))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(list: Vec<Value>) -> Self {
        Value::List(list)
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(dict: HashMap<String, Value>) -> Self {
        Value::Dict(dict)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

// =============================================================================
// Wrappers
// =============================================================================

/// Binds `T` through its text form (see [`TextDecode`](crate::TextDecode)
/// and [`TextEncode`](crate::TextEncode)). Strings are handed over after
/// variable substitution; raw strings as written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Text<T>(pub T);

impl<T> Text<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Text<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for Text<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T> From<T> for Text<T> {
    fn from(v: T) -> Self {
        Text(v)
    }
}

/// A byte string, written as standard padded base64 text. A list of
/// numbers is also accepted when decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Bytes(pub Vec<u8>);

impl Bytes {
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl Deref for Bytes {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.0
    }
}

impl DerefMut for Bytes {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.0
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(v: Vec<u8>) -> Self {
        Bytes(v)
    }
}

impl From<&[u8]> for Bytes {
    fn from(v: &[u8]) -> Self {
        Bytes(v.to_vec())
    }
}

impl From<&str> for Bytes {
    fn from(s: &str) -> Self {
        Bytes(s.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_for_interpolation() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::from(true).to_string(), "true");
        assert_eq!(Value::from(145).to_string(), "145");
        assert_eq!(Value::from(2.5).to_string(), "2.5");
        assert_eq!(Value::from("ted").to_string(), "ted");
        assert_eq!(
            Value::from(vec![Value::from(1), Value::from("x")]).to_string(),
            "[1 x]"
        );
        let dict: HashMap<String, Value> =
            [("b".to_string(), Value::from(2)), ("a".to_string(), Value::from(1))].into();
        assert_eq!(Value::from(dict).to_string(), "{a:1 b:2}");
    }

    #[test]
    fn test_accessors() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::from(3).as_i64(), Some(3));
        assert_eq!(Value::from(3).as_f64(), Some(3.0));
        assert_eq!(Value::from("s").as_str(), Some("s"));
        assert_eq!(Value::from("s").as_bool(), None);
        assert_eq!(Value::from(None::<i32>), Value::Null);
    }

    #[test]
    fn test_to_node_numbers() {
        let pos = Pos::new(2, 3, 4);
        match Value::Int(-3).to_node(pos) {
            Node::Number(n) => {
                assert_eq!(n.pos, pos);
                assert!(n.is_int && n.is_float && !n.is_uint);
                assert_eq!(n.int64, -3);
            }
            other => panic!("unexpected {:?}", other),
        }
        match Value::Float(4.0).to_node(pos) {
            Node::Number(n) => {
                assert!(n.is_int && n.is_uint && n.is_float);
                assert_eq!(n.uint64, 4);
                assert!(n.raw.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
        match Value::Float(1e20).to_node(pos) {
            Node::Number(n) => {
                assert!(n.is_float && !n.is_int && !n.is_uint);
                assert_eq!(n.text(), "100000000000000000000.0");
            }
            other => panic!("unexpected {:?}", other),
        }
        match Value::Float(f64::NAN).to_node(pos) {
            Node::Number(n) => assert!(n.is_float && !n.is_int && n.float64.is_nan()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_to_node_collections() {
        let dict: HashMap<String, Value> = [
            ("z".to_string(), Value::from("x")),
            ("a b".to_string(), Value::List(vec![Value::Null])),
        ]
        .into();
        let node = Value::Dict(dict).to_node(Pos::default());
        assert_eq!(node.to_string(), "{\"a b\": [null], z: `x`}");
    }

    #[test]
    fn test_wrappers_deref() {
        let mut t = Text(5);
        *t += 1;
        assert_eq!(t.into_inner(), 6);
        let b = Bytes::from("hi");
        assert_eq!(b.len(), 2);
        assert_eq!(b.into_vec(), b"hi".to_vec());
    }
}
