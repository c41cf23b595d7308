//! Types shared by the decode and encode tests.

#![allow(dead_code)]

use libsc::{
    record, Decode, DecodeError, Decoder, Encode, EncodeError, HookError, Node, TextDecode,
    TextEncode,
};

#[derive(Debug, Default, PartialEq)]
pub struct Top {
    pub depth0: i64,
    pub embed0: Embed0,
    pub embed1: Option<Box<Embed1>>,
    pub inner: Inner,
}

#[derive(Debug, Default, PartialEq)]
pub struct Embed0 {
    pub depth1a: i64,
    pub depth1b: i64,
    pub depth1c: i64,
    pub depth1d: i64,
    pub depth1e: i64,
}

#[derive(Debug, Default, PartialEq)]
pub struct Embed1 {
    pub depth1a: i64,
    pub depth1b: i64,
    pub depth1c: i64,
    pub depth1d: i64,
    pub depth1f: i64,
}

#[derive(Debug, Default, PartialEq)]
pub struct Inner {
    pub num: i64,
}

record!(Top {
    depth0,
    #[embed] embed0,
    #[embed_opt] embed1,
    #[embed] inner,
});

record!(Embed0 {
    depth1a,
    depth1b,
    depth1c,
    depth1d,
    depth1e => "x",
});

record!(Embed1 {
    depth1a => "depth1a",
    depth1b => "value1b",
    depth1c => "-",
    depth1d,
    depth1f => "x",
});

record!(Inner { num });

/// An embeddable record kept under a key of its own.
#[derive(Debug, Default, PartialEq)]
pub struct Top2 {
    pub depth0: i64,
    pub embed0: Option<Box<Embed0>>,
}

record!(Top2 {
    depth0,
    embed0 => "embed",
});

/// `src:dst` port mapping.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Port {
    pub src: u16,
    pub dst: u16,
}

impl TextDecode for Port {
    fn decode_text(text: &str) -> Result<Self, HookError> {
        let (src, dst) = text.split_once(':').ok_or("missing ':'")?;
        Ok(Port {
            src: src.parse()?,
            dst: dst.parse()?,
        })
    }
}

impl TextEncode for Port {
    fn encode_text(&self) -> Result<String, HookError> {
        Ok(format!("{}:{}", self.src, self.dst))
    }
}

/// A slash separated path, split into its components. Takes over decoding
/// entirely instead of going through the per-kind hooks.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PathComponents(pub Vec<String>);

impl PathComponents {
    fn set(&mut self, path: &str) {
        self.0 = path.split('/').map(str::to_string).collect();
    }
}

impl Decode for PathComponents {
    fn decode(&mut self, node: &Node, d: &mut Decoder<'_>) -> Result<(), DecodeError> {
        match node {
            Node::InterpolatedString(s) => {
                if let Some(path) = d.interpolate(s) {
                    self.set(&path);
                }
            }
            Node::RawString(s) => self.set(&s.value),
            _ => d.type_error(node.kind(), node.pos(), "PathComponents"),
        }
        Ok(())
    }
}

impl Encode for PathComponents {
    fn encode(&self) -> Result<Node, EncodeError> {
        self.0.join("/").encode()
    }

    fn is_empty_value(&self) -> bool {
        self.0.is_empty()
    }
}
