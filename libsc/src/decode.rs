//! Binding syntax trees to Rust values.
//!
//! Every destination implements [`Decode`]. The default [`Decode::decode`]
//! resolves variables and interpolated strings, then hands the node to
//! the hook for its kind (`decode_null`, `decode_bool`, ...). Hooks that
//! a type does not override record a type error and leave the value
//! alone, so binding carries on with the next field or element.
//!
//! Errors fall in two groups. Type errors, unknown fields, unknown
//! variables and bad base64 are collected by the [`Decoder`] and
//! reported together once the whole tree has been visited. An error
//! *returned* from a hook aborts the bind.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use base64::prelude::*;
use num_traits::cast;
use tracing::debug;

use crate::error::{DecodeError, Errors, HookError};
use crate::fields::{self, Record};
use crate::node::{
    BoolNode, DictionaryNode, InterpolatedStringNode, ListNode, Node, NodeKind, NullNode,
    NumberNode, Pos, StringPart, VariableNode,
};
use crate::value::{Bytes, Text, Value};
use crate::variables::Variables;

/// Settings for one bind.
#[derive(Debug, Clone, Default)]
pub struct Options {
    variables: Variables,
    disallow_unknown_fields: bool,
    disallow_unknown_variables: bool,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values for `${name}` references.
    pub fn variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    /// Report dictionary keys that match no record field.
    pub fn disallow_unknown_fields(mut self, yes: bool) -> Self {
        self.disallow_unknown_fields = yes;
        self
    }

    /// Report references to variables that were not supplied, instead of
    /// substituting nothing.
    pub fn disallow_unknown_variables(mut self, yes: bool) -> Self {
        self.disallow_unknown_variables = yes;
        self
    }
}

/// State of one bind: the options, the collected errors and where in the
/// destination the current node lands.
pub struct Decoder<'o> {
    options: &'o Options,
    errors: Vec<DecodeError>,
    /// Innermost record being decoded.
    record: Option<&'static str>,
    /// Field names from the outermost record down.
    path: Vec<String>,
    /// Kind reported in type errors when the node stands in for another.
    origin: Option<NodeKind>,
}

impl<'o> Decoder<'o> {
    pub(crate) fn new(options: &'o Options) -> Self {
        Decoder {
            options,
            errors: Vec::new(),
            record: None,
            path: Vec::new(),
            origin: None,
        }
    }

    pub fn variables(&self) -> &'o Variables {
        &self.options.variables
    }

    /// Record a non-fatal error.
    pub fn error(&mut self, err: DecodeError) {
        self.errors.push(err);
    }

    /// Record that a node of `kind` cannot be stored in `type_name`.
    pub fn type_error(&mut self, kind: NodeKind, pos: Pos, type_name: impl Into<String>) {
        self.errors.push(DecodeError::Type {
            kind: self.origin.unwrap_or(kind),
            type_name: type_name.into(),
            pos,
            record: self.record,
            field: self.path.join("."),
        });
    }

    /// The value of a variable. Unknown variables are reported in strict
    /// mode.
    pub fn lookup(&mut self, var: &VariableNode) -> Option<&'o Value> {
        let value = self.options.variables.get(var.name());
        if value.is_none() && self.options.disallow_unknown_variables {
            self.errors.push(DecodeError::UnknownVariable {
                name: var.name().to_string(),
                pos: var.pos,
            });
        }
        value
    }

    /// The text of an interpolated string with its variables substituted.
    /// Unknown variables substitute as nothing; in strict mode the first
    /// one is reported and the string is abandoned.
    pub fn interpolate(&mut self, s: &InterpolatedStringNode) -> Option<String> {
        let mut out = String::new();
        for part in &s.parts {
            match part {
                StringPart::Text(text) => out.push_str(&text.value),
                StringPart::Variable(var) => match self.lookup(var) {
                    Some(value) => out.push_str(&value.to_string()),
                    None if self.options.disallow_unknown_variables => return None,
                    None => {}
                },
            }
        }
        Some(out)
    }

    /// Hand `node` to the hook of `dest` for its kind.
    pub fn dispatch<T: Decode + ?Sized>(
        &mut self,
        node: &Node,
        dest: &mut T,
    ) -> Result<(), DecodeError> {
        match node {
            Node::Null(n) => dest.decode_null(n, self),
            Node::Bool(n) => dest.decode_bool(n, self),
            Node::Number(n) => dest.decode_number(n, self),
            Node::InterpolatedString(n) => match self.interpolate(n) {
                Some(s) => dest.decode_str(&s, node, self),
                None => Ok(()),
            },
            Node::RawString(n) => dest.decode_str(&n.value, node, self),
            Node::Variable(var) => {
                let Some(value) = self.lookup(var) else {
                    return Ok(());
                };
                let node = value.to_node(var.pos);
                let origin = self.origin.replace(NodeKind::Variable);
                let result = dest.decode(&node, self);
                self.origin = origin;
                result
            }
            Node::List(n) => dest.decode_list(n, self),
            Node::Dictionary(n) => dest.decode_dict(n, self),
        }
    }

    /// Build a [`Value`] from `node`, substituting variables.
    fn value_of(&mut self, node: &Node) -> Value {
        match node {
            Node::Null(_) => Value::Null,
            Node::Bool(n) => Value::Bool(n.value),
            Node::Number(n) if n.is_int => Value::Int(n.int64),
            Node::Number(n) => Value::Float(n.float64),
            Node::InterpolatedString(n) => self.interpolate(n).map_or(Value::Null, Value::String),
            Node::RawString(n) => Value::String(n.value.clone()),
            Node::Variable(var) => self.lookup(var).cloned().unwrap_or_default(),
            Node::List(n) => Value::List(n.elements.iter().map(|e| self.value_of(e)).collect()),
            Node::Dictionary(n) => Value::Dict(
                n.members
                    .iter()
                    .map(|m| (m.key.as_str().to_string(), self.value_of(&m.value)))
                    .collect(),
            ),
        }
    }
}

/// Bind `node` into `dest`, collecting every error.
pub(crate) fn bind<T: Decode + ?Sized>(
    node: &Node,
    dest: &mut T,
    options: &Options,
) -> Result<(), Errors> {
    let mut d = Decoder::new(options);
    if let Err(err) = dest.decode(node, &mut d) {
        d.errors.push(err);
    }
    if d.errors.is_empty() {
        return Ok(());
    }
    debug!(errors = d.errors.len(), "bind failed");
    Err(Errors(d.errors))
}

/// A type that can be filled from an SC node.
///
/// Override [`decode`](Decode::decode) to see every node unchanged,
/// variables included. Otherwise override the hooks for the node kinds
/// the type accepts.
pub trait Decode {
    fn decode(&mut self, node: &Node, d: &mut Decoder<'_>) -> Result<(), DecodeError> {
        d.dispatch(node, self)
    }

    /// Null leaves the value unchanged unless overridden.
    fn decode_null(&mut self, _node: &NullNode, _d: &mut Decoder<'_>) -> Result<(), DecodeError> {
        Ok(())
    }

    fn decode_bool(&mut self, node: &BoolNode, d: &mut Decoder<'_>) -> Result<(), DecodeError> {
        d.type_error(NodeKind::Bool, node.pos, self.type_name());
        Ok(())
    }

    fn decode_number(&mut self, node: &NumberNode, d: &mut Decoder<'_>) -> Result<(), DecodeError> {
        d.type_error(NodeKind::Number, node.pos, self.type_name());
        Ok(())
    }

    /// A string after variable substitution, or a raw string as written.
    /// `node` is the string node itself.
    fn decode_str(&mut self, _s: &str, node: &Node, d: &mut Decoder<'_>) -> Result<(), DecodeError> {
        d.type_error(node.kind(), node.pos(), self.type_name());
        Ok(())
    }

    fn decode_list(&mut self, node: &ListNode, d: &mut Decoder<'_>) -> Result<(), DecodeError> {
        d.type_error(NodeKind::List, node.pos, self.type_name());
        Ok(())
    }

    fn decode_dict(
        &mut self,
        node: &DictionaryNode,
        d: &mut Decoder<'_>,
    ) -> Result<(), DecodeError> {
        d.type_error(NodeKind::Dictionary, node.pos, self.type_name());
        Ok(())
    }

    /// Name used in type errors.
    fn type_name(&self) -> String {
        short_type_name(std::any::type_name::<Self>())
    }
}

/// Conversion from the text of a string, for use with [`Text`].
pub trait TextDecode: Sized {
    fn decode_text(text: &str) -> Result<Self, HookError>;
}

/// Conversion from a dictionary key, for map keys.
pub trait KeyDecode: Sized {
    fn decode_key(key: &str) -> Result<Self, HookError>;
}

impl KeyDecode for String {
    fn decode_key(key: &str) -> Result<Self, HookError> {
        Ok(key.to_string())
    }
}

impl<T: TextDecode> KeyDecode for Text<T> {
    fn decode_key(key: &str) -> Result<Self, HookError> {
        T::decode_text(key).map(Text)
    }
}

/// Strip module paths from a type name:
/// `alloc::vec::Vec<alloc::string::String>` becomes `Vec<String>`.
pub(crate) fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut start = 0;
    for (i, c) in full.char_indices() {
        if !(c.is_alphanumeric() || c == '_' || c == ':') {
            out.push_str(last_segment(&full[start..i]));
            out.push(c);
            start = i + c.len_utf8();
        }
    }
    out.push_str(last_segment(&full[start..]));
    out
}

fn last_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

/// Decode a dictionary into a record, field by field.
#[doc(hidden)]
pub fn decode_record<R: Record>(
    record: &mut R,
    dict: &DictionaryNode,
    d: &mut Decoder<'_>,
) -> Result<(), DecodeError> {
    let fields = fields::cached::<R>();
    for member in &dict.members {
        let key = member.key.as_str();
        let Some(field) = fields.find(key) else {
            if d.options.disallow_unknown_fields {
                d.errors.push(DecodeError::UnknownField {
                    key: key.to_string(),
                    pos: member.pos,
                });
            }
            continue;
        };

        let record_name = d.record.replace(R::NAME);
        d.path.push(field.name.to_string());
        let result = (field.get_mut)(record).decode(&member.value, d);
        d.path.pop();
        d.record = record_name;
        result?;
    }
    Ok(())
}

// =============================================================================
// Scalars
// =============================================================================

impl Decode for bool {
    fn decode_null(&mut self, _node: &NullNode, _d: &mut Decoder<'_>) -> Result<(), DecodeError> {
        *self = false;
        Ok(())
    }

    fn decode_bool(&mut self, node: &BoolNode, _d: &mut Decoder<'_>) -> Result<(), DecodeError> {
        *self = node.value;
        Ok(())
    }
}

macro_rules! impl_decode_int {
    ($flag:ident, $field:ident: $($ty:ty),*) => {
        $(
            impl Decode for $ty {
                fn decode_null(
                    &mut self,
                    _node: &NullNode,
                    _d: &mut Decoder<'_>,
                ) -> Result<(), DecodeError> {
                    *self = 0;
                    Ok(())
                }

                fn decode_number(
                    &mut self,
                    node: &NumberNode,
                    d: &mut Decoder<'_>,
                ) -> Result<(), DecodeError> {
                    match node.$flag.then(|| cast::<_, $ty>(node.$field)).flatten() {
                        Some(v) => *self = v,
                        None => d.type_error(NodeKind::Number, node.pos, self.type_name()),
                    }
                    Ok(())
                }
            }
        )*
    };
}

impl_decode_int!(is_int, int64: i8, i16, i32, i64, isize);
impl_decode_int!(is_uint, uint64: u8, u16, u32, u64, usize);

impl Decode for f64 {
    fn decode_null(&mut self, _node: &NullNode, _d: &mut Decoder<'_>) -> Result<(), DecodeError> {
        *self = 0.0;
        Ok(())
    }

    fn decode_number(&mut self, node: &NumberNode, d: &mut Decoder<'_>) -> Result<(), DecodeError> {
        if node.is_float {
            *self = node.float64;
        } else {
            d.type_error(NodeKind::Number, node.pos, self.type_name());
        }
        Ok(())
    }
}

impl Decode for f32 {
    fn decode_null(&mut self, _node: &NullNode, _d: &mut Decoder<'_>) -> Result<(), DecodeError> {
        *self = 0.0;
        Ok(())
    }

    fn decode_number(&mut self, node: &NumberNode, d: &mut Decoder<'_>) -> Result<(), DecodeError> {
        if node.is_float && node.float64.abs() <= f64::from(f32::MAX) {
            *self = node.float64 as f32;
        } else {
            d.type_error(NodeKind::Number, node.pos, self.type_name());
        }
        Ok(())
    }
}

impl Decode for String {
    fn decode_null(&mut self, _node: &NullNode, _d: &mut Decoder<'_>) -> Result<(), DecodeError> {
        self.clear();
        Ok(())
    }

    fn decode_str(&mut self, s: &str, _node: &Node, _d: &mut Decoder<'_>) -> Result<(), DecodeError> {
        s.clone_into(self);
        Ok(())
    }
}

// =============================================================================
// Containers
// =============================================================================

impl<T: Decode + Default> Decode for Vec<T> {
    fn decode_null(&mut self, _node: &NullNode, _d: &mut Decoder<'_>) -> Result<(), DecodeError> {
        self.clear();
        Ok(())
    }

    fn decode_list(&mut self, node: &ListNode, d: &mut Decoder<'_>) -> Result<(), DecodeError> {
        self.truncate(node.elements.len());
        for (i, element) in node.elements.iter().enumerate() {
            if i == self.len() {
                self.push(T::default());
            }
            self[i].decode(element, d)?;
        }
        Ok(())
    }
}

/// Elements beyond `N` are skipped; missing elements are reset to their
/// default. Null leaves the array unchanged.
impl<T: Decode + Default, const N: usize> Decode for [T; N] {
    fn decode_list(&mut self, node: &ListNode, d: &mut Decoder<'_>) -> Result<(), DecodeError> {
        for (slot, element) in self.iter_mut().zip(&node.elements) {
            slot.decode(element, d)?;
        }
        for slot in self.iter_mut().skip(node.elements.len()) {
            *slot = T::default();
        }
        Ok(())
    }
}

impl<T: Decode + Default> Decode for Option<T> {
    fn decode(&mut self, node: &Node, d: &mut Decoder<'_>) -> Result<(), DecodeError> {
        match node {
            Node::Null(_) => {
                *self = None;
                Ok(())
            }
            // resolve first so a variable holding null clears the option
            Node::Variable(_) => d.dispatch(node, self),
            _ => self.get_or_insert_with(T::default).decode(node, d),
        }
    }

    fn type_name(&self) -> String {
        short_type_name(std::any::type_name::<T>())
    }
}

impl<T: Decode + ?Sized> Decode for Box<T> {
    fn decode(&mut self, node: &Node, d: &mut Decoder<'_>) -> Result<(), DecodeError> {
        (**self).decode(node, d)
    }
}

impl<K, V> Decode for HashMap<K, V>
where
    K: KeyDecode + Eq + Hash,
    V: Decode + Default,
{
    fn decode_null(&mut self, _node: &NullNode, _d: &mut Decoder<'_>) -> Result<(), DecodeError> {
        self.clear();
        Ok(())
    }

    fn decode_dict(
        &mut self,
        node: &DictionaryNode,
        d: &mut Decoder<'_>,
    ) -> Result<(), DecodeError> {
        for member in &node.members {
            let mut value = V::default();
            value.decode(&member.value, d)?;
            let key = K::decode_key(member.key.as_str())
                .map_err(|err| DecodeError::hook(member.pos, err))?;
            self.insert(key, value);
        }
        Ok(())
    }
}

impl<K, V> Decode for BTreeMap<K, V>
where
    K: KeyDecode + Ord,
    V: Decode + Default,
{
    fn decode_null(&mut self, _node: &NullNode, _d: &mut Decoder<'_>) -> Result<(), DecodeError> {
        self.clear();
        Ok(())
    }

    fn decode_dict(
        &mut self,
        node: &DictionaryNode,
        d: &mut Decoder<'_>,
    ) -> Result<(), DecodeError> {
        for member in &node.members {
            let mut value = V::default();
            value.decode(&member.value, d)?;
            let key = K::decode_key(member.key.as_str())
                .map_err(|err| DecodeError::hook(member.pos, err))?;
            self.insert(key, value);
        }
        Ok(())
    }
}

// =============================================================================
// Dynamic values and hooks
// =============================================================================

impl Decode for Value {
    fn decode(&mut self, node: &Node, d: &mut Decoder<'_>) -> Result<(), DecodeError> {
        *self = d.value_of(node);
        Ok(())
    }
}

/// Keeps a copy of the node, unresolved.
impl Decode for Node {
    fn decode(&mut self, node: &Node, _d: &mut Decoder<'_>) -> Result<(), DecodeError> {
        *self = node.clone();
        Ok(())
    }
}

impl<T: TextDecode> Decode for Text<T> {
    fn decode_str(&mut self, s: &str, node: &Node, _d: &mut Decoder<'_>) -> Result<(), DecodeError> {
        self.0 = T::decode_text(s).map_err(|err| DecodeError::hook(node.pos(), err))?;
        Ok(())
    }

    fn type_name(&self) -> String {
        short_type_name(std::any::type_name::<T>())
    }
}

impl Decode for Bytes {
    fn decode_null(&mut self, _node: &NullNode, _d: &mut Decoder<'_>) -> Result<(), DecodeError> {
        self.0.clear();
        Ok(())
    }

    fn decode_str(&mut self, s: &str, node: &Node, d: &mut Decoder<'_>) -> Result<(), DecodeError> {
        match BASE64_STANDARD.decode(s) {
            Ok(bytes) => self.0 = bytes,
            Err(source) => d.error(DecodeError::Base64 {
                pos: node.pos(),
                source,
            }),
        }
        Ok(())
    }

    fn decode_list(&mut self, node: &ListNode, d: &mut Decoder<'_>) -> Result<(), DecodeError> {
        self.0.decode_list(node, d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn decode_into<T: Decode>(input: &str, dest: &mut T, options: &Options) -> Result<(), Errors> {
        let doc = parse(input).unwrap();
        bind(&Node::Dictionary(doc), dest, options)
    }

    /// Decode the value of member `v`.
    fn decode_value<T: Decode + Default>(input: &str) -> (T, Vec<DecodeError>) {
        let doc = parse(&format!("{{ v: {} }}", input)).unwrap();
        let node = doc.get("v").unwrap().clone();
        let mut dest = T::default();
        let errs = bind(&node, &mut dest, &Options::new())
            .err()
            .map(Errors::into_vec)
            .unwrap_or_default();
        (dest, errs)
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("i64"), "i64");
        assert_eq!(short_type_name("alloc::string::String"), "String");
        assert_eq!(
            short_type_name("std::collections::hash::map::HashMap<alloc::string::String, i64>"),
            "HashMap<String, i64>"
        );
        assert_eq!(short_type_name("[libsc::value::Value; 3]"), "[Value; 3]");
        assert_eq!(short_type_name("&mut crate::a::B"), "&mut B");
    }

    #[test]
    fn test_integers() {
        assert_eq!(decode_value::<i8>("-35").0, -35);
        assert_eq!(decode_value::<u16>("256").0, 256);
        assert_eq!(decode_value::<i64>("1e4").0, 10000);
        assert_eq!(decode_value::<u32>("-0").0, 0);

        let (v, errs) = decode_value::<i8>("300");
        assert_eq!(v, 0);
        assert_eq!(errs.len(), 1);
        assert_eq!(
            errs[0].to_string(),
            "sc: cannot unmarshal Number into value of type i8"
        );

        assert_eq!(decode_value::<u64>("-1").1.len(), 1);
        assert_eq!(decode_value::<i64>("12.5").1.len(), 1);
        assert_eq!(decode_value::<i64>("true").1.len(), 1);
    }

    #[test]
    fn test_floats() {
        assert_eq!(decode_value::<f64>("56.789").0, 56.789);
        assert_eq!(decode_value::<f64>("3").0, 3.0);
        assert_eq!(decode_value::<f32>("0.33").0, 0.33);
        assert_eq!(decode_value::<f32>("1e300").1.len(), 1);
    }

    #[test]
    fn test_strings() {
        assert_eq!(decode_value::<String>("\"a\\tb\"").0, "a\tb");
        assert_eq!(decode_value::<String>("`a\\tb`").0, "a\\tb");
        let (_, errs) = decode_value::<String>("1");
        assert_eq!(
            errs[0].to_string(),
            "sc: cannot unmarshal Number into value of type String"
        );
    }

    #[test]
    fn test_null_resets_scalars() {
        let doc = parse("{ v: null }").unwrap();
        let node = doc.get("v").unwrap();
        let mut n = 5i32;
        let mut s = "x".to_string();
        let mut list = vec![1u8];
        let mut opt = Some(1);
        bind(node, &mut n, &Options::new()).unwrap();
        bind(node, &mut s, &Options::new()).unwrap();
        bind(node, &mut list, &Options::new()).unwrap();
        bind(node, &mut opt, &Options::new()).unwrap();
        assert_eq!((n, s.as_str(), list.len(), opt), (0, "", 0, None));
    }

    #[test]
    fn test_lists() {
        let (v, errs) = decode_value::<Vec<i64>>("[1, 2, 3]");
        assert!(errs.is_empty());
        assert_eq!(v, [1, 2, 3]);

        let doc = parse("{ v: [7] }").unwrap();
        let mut v = vec![1, 2, 3];
        bind(doc.get("v").unwrap(), &mut v, &Options::new()).unwrap();
        assert_eq!(v, [7]);

        let mut arr = [9i64; 3];
        bind(doc.get("v").unwrap(), &mut arr, &Options::new()).unwrap();
        assert_eq!(arr, [7, 0, 0]);

        let (arr, _) = decode_value::<[i64; 2]>("[1, 2, 3]");
        assert_eq!(arr, [1, 2]);

        // errors in one element do not stop the others
        let (v, errs) = decode_value::<Vec<i64>>("[1, \"x\", 3]");
        assert_eq!(v, [1, 0, 3]);
        assert_eq!(errs.len(), 1);
    }

    #[test]
    fn test_dynamic_value() {
        let (v, errs) = decode_value::<Value>(
            "{ none: null, num1: 10, num2: 12.5, yes: true, str: \"hello\", vals: [1, true, \"foo\"] }",
        );
        assert!(errs.is_empty());
        let dict = v.as_dict().unwrap();
        assert_eq!(dict["none"], Value::Null);
        assert_eq!(dict["num1"], Value::Int(10));
        assert_eq!(dict["num2"], Value::Float(12.5));
        assert_eq!(dict["yes"], Value::Bool(true));
        assert_eq!(dict["str"], Value::from("hello"));
        assert_eq!(
            dict["vals"],
            Value::List(vec![Value::Int(1), Value::Bool(true), Value::from("foo")])
        );
    }

    #[test]
    fn test_variables() {
        let vars: Variables = [
            ("magic", Value::from(3)),
            ("y", Value::from("z")),
            ("dir", Value::from("bin/bar")),
        ]
        .into_iter()
        .collect();
        let options = Options::new().variables(vars);

        let mut map: HashMap<String, Value> = HashMap::new();
        decode_into(
            "{ num: ${magic}, x: ${y}, path: \"/foo/${dir}/baz\" }",
            &mut map,
            &options,
        )
        .unwrap();
        assert_eq!(map["num"], Value::Int(3));
        assert_eq!(map["x"], Value::from("z"));
        assert_eq!(map["path"], Value::from("/foo/bin/bar/baz"));

        let mut nums: HashMap<String, i64> = HashMap::new();
        decode_into("{ num: ${magic} }", &mut nums, &options).unwrap();
        assert_eq!(nums["num"], 3);

        let err = decode_into("{ num: ${y} }", &mut nums, &options).unwrap_err();
        assert_eq!(
            err.to_string(),
            "sc: cannot unmarshal Variable into value of type i64"
        );
    }

    #[test]
    fn test_unknown_variables() {
        let mut map: HashMap<String, String> = HashMap::new();
        decode_into("{ a: ${missing}, b: \"x${missing}y\" }", &mut map, &Options::new()).unwrap();
        assert_eq!(map["a"], "");
        assert_eq!(map["b"], "xy");

        let strict = Options::new().disallow_unknown_variables(true);
        let errs = decode_into("{ a: ${m1}, b: \"x${m2}${m3}\" }", &mut map, &strict)
            .unwrap_err()
            .into_vec();
        assert_eq!(errs.len(), 2);
        assert!(matches!(&errs[0], DecodeError::UnknownVariable { name, pos }
            if name == "m1" && *pos == Pos::new(1, 6, 5)));
        assert!(matches!(&errs[1], DecodeError::UnknownVariable { name, .. } if name == "m2"));
    }

    #[test]
    fn test_raw_node() {
        let (node, errs) = decode_value::<Node>("${later}");
        assert!(errs.is_empty());
        assert_eq!(node.kind(), NodeKind::Variable);
    }

    #[test]
    fn test_bytes() {
        let (b, errs) = decode_value::<Bytes>("\"aGVsbG8gd29ybGQ=\"");
        assert!(errs.is_empty());
        assert_eq!(b.as_slice(), b"hello world");

        let (b, _) = decode_value::<Bytes>("[104, 105]");
        assert_eq!(b.as_slice(), b"hi");

        let (_, errs) = decode_value::<Bytes>("\"not base64!\"");
        assert!(matches!(errs.as_slice(), [DecodeError::Base64 { .. }]));
    }

    #[derive(Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
    struct Port {
        src: u16,
        dst: u16,
    }

    impl TextDecode for Port {
        fn decode_text(text: &str) -> Result<Self, HookError> {
            let (src, dst) = text.split_once(':').ok_or("missing :")?;
            Ok(Port {
                src: src.parse()?,
                dst: dst.parse()?,
            })
        }
    }

    #[test]
    fn test_text_hook() {
        let (ports, errs) = decode_value::<Vec<Text<Port>>>("[\"8080:8777\", `9060:3030`]");
        assert!(errs.is_empty());
        assert_eq!(ports[0].0, Port { src: 8080, dst: 8777 });
        assert_eq!(ports[1].0, Port { src: 9060, dst: 3030 });

        // hook errors abort the bind
        let (_, errs) = decode_value::<Vec<Text<Port>>>("[\"8080\", 1]");
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].to_string(), "sc: missing :");
        assert_eq!(errs[0].pos(), Pos::new(1, 7, 6));

        let (_, errs) = decode_value::<Text<Port>>("true");
        assert_eq!(
            errs[0].to_string(),
            "sc: cannot unmarshal Bool into value of type Port"
        );
    }

    #[test]
    fn test_text_map_keys() {
        let mut map: BTreeMap<Text<Port>, bool> = BTreeMap::new();
        decode_into("{ \"1:2\": true, `3:4`: false }", &mut map, &Options::new()).unwrap();
        assert_eq!(map.get(&Text(Port { src: 1, dst: 2 })), Some(&true));
        assert_eq!(map.get(&Text(Port { src: 3, dst: 4 })), Some(&false));

        let errs = decode_into("{ nope: true }", &mut map, &Options::new())
            .unwrap_err()
            .into_vec();
        assert!(matches!(errs.as_slice(), [DecodeError::Hook { .. }]));
    }
}
