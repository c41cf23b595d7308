//! Turning Rust values into SC syntax trees.
//!
//! Encoded nodes carry no positions and no comments. Dictionary members
//! built from maps are sorted by key so the output is deterministic.

use std::collections::{BTreeMap, HashMap};

use base64::prelude::*;
use tracing::debug;

use crate::decode::short_type_name;
use crate::error::{EncodeError, HookError};
use crate::fields::{self, Record};
use crate::node::{
    float_literal, BoolNode, DictionaryNode, InterpolatedStringNode, KeyNode, ListNode,
    MemberNode, Node, NullNode, NumberNode,
};
use crate::printer::format;
use crate::value::{Bytes, Text, Value};

/// A type that can be written as an SC node.
pub trait Encode {
    fn encode(&self) -> Result<Node, EncodeError>;

    /// Whether a field tagged `omitempty` holding this value is left out.
    fn is_empty_value(&self) -> bool {
        false
    }
}

/// Conversion to text, for use with [`Text`]. The text is written as a
/// double-quoted string.
pub trait TextEncode {
    fn encode_text(&self) -> Result<String, HookError>;
}

/// Conversion to a dictionary key, for map keys.
pub trait KeyEncode {
    fn encode_key(&self) -> Result<String, HookError>;
}

impl KeyEncode for String {
    fn encode_key(&self) -> Result<String, HookError> {
        Ok(self.clone())
    }
}

impl<T: TextEncode> KeyEncode for Text<T> {
    fn encode_key(&self) -> Result<String, HookError> {
        self.0.encode_text()
    }
}

/// Encode `value` and format it as a document.
///
/// # Example
///
/// ```
/// use std::collections::BTreeMap;
///
/// let mut map = BTreeMap::new();
/// map.insert("b".to_string(), 1);
/// map.insert("a".to_string(), 2);
/// assert_eq!(libsc::marshal(&map).unwrap(), "{\n  a: 2\n  b: 1\n}\n");
/// ```
pub fn marshal<T: Encode + ?Sized>(value: &T) -> Result<String, EncodeError> {
    marshal_document(value).map(|doc| format(&doc))
}

/// Encode `value` as a document tree. The value must encode as a
/// dictionary.
pub fn marshal_document<T: Encode + ?Sized>(value: &T) -> Result<DictionaryNode, EncodeError> {
    let result = match value.encode() {
        Ok(Node::Dictionary(doc)) => Ok(doc),
        Ok(_) => Err(EncodeError::UnsupportedType(short_type_name(
            std::any::type_name::<T>(),
        ))),
        Err(err) => Err(err),
    };
    if let Err(err) = &result {
        debug!(error = %err, "marshal failed");
    }
    result
}

fn text(s: &str) -> Node {
    InterpolatedStringNode::from_text(s).into()
}

/// Encode the fields of a record in declaration order.
#[doc(hidden)]
pub fn encode_record<R: Record>(record: &R) -> Result<Node, EncodeError> {
    let fields = fields::cached::<R>();
    let mut members = Vec::new();
    for field in fields.iter() {
        // None when the field sits in an absent optional embedding
        let Some(value) = (field.get)(record) else {
            continue;
        };
        if field.omit_empty && value.is_empty_value() {
            continue;
        }
        members.push(MemberNode::new(KeyNode::from_name(field.name), value.encode()?));
    }
    Ok(DictionaryNode::new(members).into())
}

// =============================================================================
// Scalars
// =============================================================================

impl Encode for bool {
    fn encode(&self) -> Result<Node, EncodeError> {
        Ok(BoolNode::new(*self).into())
    }

    fn is_empty_value(&self) -> bool {
        !*self
    }
}

macro_rules! impl_encode_int {
    ($ctor:ident as $wide:ty: $($ty:ty),*) => {
        $(
            impl Encode for $ty {
                fn encode(&self) -> Result<Node, EncodeError> {
                    Ok(NumberNode::$ctor(*self as $wide).into())
                }

                fn is_empty_value(&self) -> bool {
                    *self == 0
                }
            }
        )*
    };
}

impl_encode_int!(from_i64 as i64: i8, i16, i32, i64, isize);
impl_encode_int!(from_u64 as u64: u8, u16, u32, u64, usize);

impl Encode for f64 {
    fn encode(&self) -> Result<Node, EncodeError> {
        if !self.is_finite() {
            return Err(EncodeError::UnsupportedValue(self.to_string()));
        }
        Ok(NumberNode::from_f64(*self).into())
    }

    fn is_empty_value(&self) -> bool {
        *self == 0.0
    }
}

impl Encode for f32 {
    fn encode(&self) -> Result<Node, EncodeError> {
        if !self.is_finite() {
            return Err(EncodeError::UnsupportedValue(self.to_string()));
        }
        // Widening adds digits (22.22 becomes 22.219999313354492), so keep
        // the shortest f32 rendering as the literal.
        let mut n = NumberNode::from_f64(f64::from(*self));
        n.raw = float_literal(self);
        Ok(n.into())
    }

    fn is_empty_value(&self) -> bool {
        *self == 0.0
    }
}

impl Encode for str {
    fn encode(&self) -> Result<Node, EncodeError> {
        Ok(text(self))
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl Encode for String {
    fn encode(&self) -> Result<Node, EncodeError> {
        Ok(text(self))
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

// =============================================================================
// Containers
// =============================================================================

impl<T: Encode> Encode for [T] {
    fn encode(&self) -> Result<Node, EncodeError> {
        let elements = self.iter().map(Encode::encode).collect::<Result<_, _>>()?;
        Ok(ListNode::new(elements).into())
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self) -> Result<Node, EncodeError> {
        self.as_slice().encode()
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T: Encode, const N: usize> Encode for [T; N] {
    fn encode(&self) -> Result<Node, EncodeError> {
        self.as_slice().encode()
    }

    fn is_empty_value(&self) -> bool {
        N == 0
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self) -> Result<Node, EncodeError> {
        match self {
            Some(v) => v.encode(),
            None => Ok(NullNode::new().into()),
        }
    }

    fn is_empty_value(&self) -> bool {
        self.is_none()
    }
}

impl<T: Encode + ?Sized> Encode for Box<T> {
    fn encode(&self) -> Result<Node, EncodeError> {
        (**self).encode()
    }

    fn is_empty_value(&self) -> bool {
        (**self).is_empty_value()
    }
}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self) -> Result<Node, EncodeError> {
        (**self).encode()
    }

    fn is_empty_value(&self) -> bool {
        (**self).is_empty_value()
    }
}

/// Members sorted by key.
fn encode_map<'a, K, V>(entries: impl Iterator<Item = (&'a K, &'a V)>) -> Result<Node, EncodeError>
where
    K: KeyEncode + 'a,
    V: Encode + 'a,
{
    let mut entries = entries
        .map(|(k, v)| Ok((k.encode_key().map_err(EncodeError::Hook)?, v)))
        .collect::<Result<Vec<_>, EncodeError>>()?;
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let members = entries
        .into_iter()
        .map(|(k, v)| Ok(MemberNode::new(KeyNode::from_name(&k), v.encode()?)))
        .collect::<Result<_, EncodeError>>()?;
    Ok(DictionaryNode::new(members).into())
}

impl<K: KeyEncode, V: Encode> Encode for HashMap<K, V> {
    fn encode(&self) -> Result<Node, EncodeError> {
        encode_map(self.iter())
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<K: KeyEncode, V: Encode> Encode for BTreeMap<K, V> {
    fn encode(&self) -> Result<Node, EncodeError> {
        encode_map(self.iter())
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

// =============================================================================
// Dynamic values and hooks
// =============================================================================

impl Encode for Value {
    fn encode(&self) -> Result<Node, EncodeError> {
        match self {
            Value::Null => Ok(NullNode::new().into()),
            Value::Bool(b) => b.encode(),
            Value::Int(i) => i.encode(),
            Value::Float(f) => f.encode(),
            Value::String(s) => s.encode(),
            Value::List(list) => list.encode(),
            Value::Dict(dict) => dict.encode(),
        }
    }

    fn is_empty_value(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => b.is_empty_value(),
            Value::Int(i) => i.is_empty_value(),
            Value::Float(f) => f.is_empty_value(),
            Value::String(s) => s.is_empty(),
            Value::List(list) => list.is_empty(),
            Value::Dict(dict) => dict.is_empty(),
        }
    }
}

impl Encode for Node {
    fn encode(&self) -> Result<Node, EncodeError> {
        Ok(self.clone())
    }
}

impl<T: TextEncode> Encode for Text<T> {
    fn encode(&self) -> Result<Node, EncodeError> {
        let s = self.0.encode_text().map_err(EncodeError::Hook)?;
        Ok(text(&s))
    }
}

impl Encode for Bytes {
    fn encode(&self) -> Result<Node, EncodeError> {
        Ok(text(&BASE64_STANDARD.encode(&self.0)))
    }

    fn is_empty_value(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(members: &[(&str, Value)]) -> HashMap<String, Value> {
        members
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_marshal_sorts_keys() {
        let map = doc(&[("b", Value::Int(1)), ("a", Value::Int(2))]);
        assert_eq!(marshal(&map).unwrap(), "{\n  a: 2\n  b: 1\n}\n");
    }

    #[test]
    fn test_marshal_scalars() {
        let map = doc(&[
            ("f", Value::Float(-1.5)),
            ("g", Value::Float(2.0)),
            ("n", Value::Null),
            ("s", Value::from("multiple\nlines")),
            ("t", Value::Bool(true)),
        ]);
        assert_eq!(
            marshal(&map).unwrap(),
            "{\n  f: -1.5\n  g: 2.0\n  n: null\n  s: \"multiple\\nlines\"\n  t: true\n}\n"
        );
    }

    #[test]
    fn test_f32_keeps_short_form() {
        let mut map = BTreeMap::new();
        map.insert("v".to_string(), 22.22f32);
        assert_eq!(marshal(&map).unwrap(), "{\n  v: 22.22\n}\n");
    }

    #[test]
    fn test_large_floats_print_as_decimals() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), 1e20f64);
        map.insert("b".to_string(), 1e-5f64);
        let out = marshal(&map).unwrap();
        assert_eq!(out, "{\n  a: 100000000000000000000.0\n  b: 0.00001\n}\n");

        let mut back = BTreeMap::<String, f64>::new();
        crate::unmarshal(&out, &mut back).unwrap();
        assert_eq!(back, map);

        let mut map = BTreeMap::new();
        map.insert("v".to_string(), 3e10f32);
        assert_eq!(marshal(&map).unwrap(), "{\n  v: 30000000000.0\n}\n");
    }

    #[test]
    fn test_non_finite_float() {
        let map = doc(&[("v", Value::Float(f64::NAN))]);
        let err = marshal(&map).unwrap_err();
        assert_eq!(err.to_string(), "sc: unsupported value: NaN");
    }

    #[test]
    fn test_top_level_must_be_dictionary() {
        let err = marshal(&vec![Value::Bool(true)]).unwrap_err();
        assert_eq!(err.to_string(), "sc: unsupported type: Vec<Value>");
        let err = marshal(&5u8).unwrap_err();
        assert_eq!(err.to_string(), "sc: unsupported type: u8");
    }

    #[test]
    fn test_quoted_keys() {
        let map = doc(&[
            ("multi\nline", Value::Bool(true)),
            ("non-alpha:.", Value::Int(2)),
            ("non-ascii🚀", Value::List(vec![])),
            ("null", Value::Null),
        ]);
        assert_eq!(
            marshal(&map).unwrap(),
            "{\n  \"multi\\nline\": true\n  \"non-alpha:.\": 2\n  \"non-ascii🚀\": []\n  \"null\": null\n}\n"
        );
    }

    #[test]
    fn test_bytes() {
        let mut map = BTreeMap::new();
        map.insert("b".to_string(), Bytes::from("hello world"));
        map.insert("r".to_string(), Bytes::from("bye world"));
        assert_eq!(
            marshal(&map).unwrap(),
            "{\n  b: \"aGVsbG8gd29ybGQ=\"\n  r: \"YnllIHdvcmxk\"\n}\n"
        );
    }

    #[derive(PartialEq, Eq, Hash)]
    struct Level(i32);

    impl TextEncode for Level {
        fn encode_text(&self) -> Result<String, HookError> {
            if self.0 > 100 {
                return Err("level too high".into());
            }
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_text_keys() {
        let mut map = HashMap::new();
        map.insert(Text(Level(0)), Value::Null);
        map.insert(Text(Level(2)), Value::from("foo"));
        map.insert(Text(Level(-5)), Value::Bool(true));
        assert_eq!(
            marshal(&map).unwrap(),
            "{\n  \"-5\": true\n  \"0\": null\n  \"2\": \"foo\"\n}\n"
        );

        map.insert(Text(Level(101)), Value::Null);
        let err = marshal(&map).unwrap_err();
        assert_eq!(err.to_string(), "sc: level too high");
    }

    #[test]
    fn test_empty_values() {
        assert!(false.is_empty_value());
        assert!(0u8.is_empty_value());
        assert!(0.0f64.is_empty_value());
        assert!(String::new().is_empty_value());
        assert!(Vec::<i32>::new().is_empty_value());
        assert!(None::<i32>.is_empty_value());
        assert!(Value::Null.is_empty_value());
        assert!(!Some(0).is_empty_value());
        assert!(![0u8; 1].is_empty_value());
        assert!(!Node::default().is_empty_value());
    }
}
