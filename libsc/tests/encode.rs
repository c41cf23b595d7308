//! Encoding Rust values as documents.

mod common;

use std::collections::{BTreeMap, HashMap};

use common::{Embed0, Embed1, Inner, PathComponents, Port, Top, Top2};
use libsc::{
    marshal, marshal_document, parse, record, unmarshal, Bytes, EncodeError, Text, Value,
};

#[derive(Debug, Default)]
struct Config {
    name: String,
    memory: u32,
    required: bool,
}

record!(Config {
    name,
    memory,
    required,
});

#[test]
fn test_marshal_record() {
    let config = Config {
        name: "foo".to_string(),
        memory: 256,
        required: true,
    };
    assert_eq!(
        marshal(&config).unwrap(),
        "{\n  name: \"foo\"\n  memory: 256\n  required: true\n}\n"
    );
}

#[derive(Debug, Default)]
struct Scalars {
    yes: bool,
    no: bool,
    small: i8,
    negative: i64,
    big: u64,
    half: f64,
    whole: f64,
    narrow: f32,
}

record!(Scalars {
    yes,
    no,
    small,
    negative,
    big,
    half,
    whole,
    narrow,
});

#[test]
fn test_marshal_scalars() {
    let v = Scalars {
        yes: true,
        no: false,
        small: -35,
        negative: -1239807320,
        big: u64::MAX,
        half: 0.5,
        whole: 3.0,
        narrow: 22.22,
    };
    assert_eq!(
        marshal(&v).unwrap(),
        "{
  yes: true
  no: false
  small: -35
  negative: -1239807320
  big: 18446744073709551615
  half: 0.5
  whole: 3.0
  narrow: 22.22
}
"
    );
}

#[derive(Debug, Default)]
struct Counter {
    count: u64,
}

record!(Counter { count });

#[test]
fn test_large_unsigned_does_not_read_back() {
    let out = marshal(&Counter {
        count: i64::MAX as u64,
    })
    .unwrap();
    let mut back = Counter::default();
    unmarshal(&out, &mut back).unwrap();
    assert_eq!(back.count, i64::MAX as u64);

    let out = marshal(&Counter { count: u64::MAX }).unwrap();
    assert_eq!(out, "{\n  count: 18446744073709551615\n}\n");
    let err = unmarshal(&out, &mut back).unwrap_err();
    assert_eq!(
        err.to_string(),
        "sc: parse error: 2:10: integer overflow: \"18446744073709551615\""
    );
}

#[test]
fn test_marshal_strings() {
    let mut v = BTreeMap::new();
    v.insert("plain".to_string(), "hello".to_string());
    v.insert("quoted".to_string(), "say \"hi\"\tnow".to_string());
    v.insert("template".to_string(), "${not} a variable".to_string());
    v.insert("empty".to_string(), String::new());
    assert_eq!(
        marshal(&v).unwrap(),
        r#"{
  empty: ""
  plain: "hello"
  quoted: "say \"hi\"\tnow"
  template: "\${not} a variable"
}
"#
    );
}

#[derive(Debug, Default)]
struct Collections {
    list: Vec<i64>,
    empty: Vec<String>,
    fixed: [bool; 2],
    map: HashMap<String, Value>,
    missing: Option<i64>,
}

record!(Collections {
    list,
    empty,
    fixed,
    map,
    missing,
});

#[test]
fn test_marshal_collections() {
    let v = Collections {
        list: vec![1, 2],
        empty: Vec::new(),
        fixed: [true, false],
        map: [
            ("b".to_string(), Value::from("x")),
            ("a".to_string(), Value::List(vec![Value::Null])),
        ]
        .into(),
        missing: None,
    };
    assert_eq!(
        marshal(&v).unwrap(),
        "{
  list: [
    1
    2
  ]
  empty: []
  fixed: [
    true
    false
  ]
  map: {
    a: [
      null
    ]
    b: \"x\"
  }
  missing: null
}
"
    );
}

#[derive(Debug, Default)]
struct Tagged {
    renamed: i64,
    skipped: i64,
    optional: String,
    optional_list: Vec<i64>,
    kept: Option<bool>,
}

record!(Tagged {
    renamed => "other",
    skipped => "-",
    optional => ",omitempty",
    optional_list => "list,omitempty",
    kept => "kept,omitempty",
});

#[test]
fn test_tag_options() {
    let v = Tagged {
        renamed: 1,
        skipped: 2,
        ..Tagged::default()
    };
    assert_eq!(marshal(&v).unwrap(), "{\n  other: 1\n}\n");

    let v = Tagged {
        optional: "x".to_string(),
        optional_list: vec![3],
        kept: Some(false),
        ..Tagged::default()
    };
    assert_eq!(
        marshal(&v).unwrap(),
        "{\n  other: 0\n  optional: \"x\"\n  list: [\n    3\n  ]\n  kept: false\n}\n"
    );
}

#[derive(Debug, Default)]
struct WithHooks {
    ports: Vec<Text<Port>>,
    ignored: Vec<PathComponents>,
    by_port: BTreeMap<Text<Port>, String>,
}

record!(WithHooks {
    ports,
    ignored,
    by_port => "byPort",
});

#[test]
fn test_marshal_hooks() {
    let port = Port { src: 8080, dst: 80 };
    let v = WithHooks {
        ports: vec![Text(port)],
        ignored: vec![PathComponents(vec!["src".into(), "vendor".into()])],
        by_port: [(Text(port), "web".to_string())].into(),
    };
    assert_eq!(
        marshal(&v).unwrap(),
        "{
  ports: [
    \"8080:80\"
  ]
  ignored: [
    \"src/vendor\"
  ]
  byPort: {
    \"8080:80\": \"web\"
  }
}
"
    );
}

#[test]
fn test_marshal_embedded() {
    let mut v = Top {
        depth0: 1,
        embed0: Embed0 {
            depth1a: 2,
            depth1b: 3,
            depth1c: 4,
            depth1d: 5,
            depth1e: 6,
        },
        embed1: None,
        inner: Inner { num: -21 },
    };
    assert_eq!(
        marshal(&v).unwrap(),
        "{\n  depth0: 1\n  depth1b: 3\n  depth1c: 4\n  num: -21\n}\n"
    );

    v.embed1 = Some(Box::new(Embed1 {
        depth1a: 7,
        depth1b: 8,
        depth1c: 9,
        depth1d: 10,
        depth1f: 11,
    }));
    assert_eq!(
        marshal(&v).unwrap(),
        "{
  depth0: 1
  depth1b: 3
  depth1c: 4
  depth1a: 7
  value1b: 8
  num: -21
}
"
    );
}

#[test]
fn test_marshal_named_embed() {
    let v = Top2 {
        depth0: 1,
        embed0: Some(Box::new(Embed0 {
            depth1e: 5,
            ..Embed0::default()
        })),
    };
    assert_eq!(
        marshal(&v).unwrap(),
        "{
  depth0: 1
  embed: {
    depth1a: 0
    depth1b: 0
    depth1c: 0
    depth1d: 0
    x: 5
  }
}
"
    );

    let v = Top2::default();
    assert_eq!(marshal(&v).unwrap(), "{\n  depth0: 0\n  embed: null\n}\n");
}

#[test]
fn test_marshal_errors() {
    let mut map = BTreeMap::new();
    map.insert("v".to_string(), f64::INFINITY);
    let err = marshal(&map).unwrap_err();
    assert!(matches!(err, EncodeError::UnsupportedValue(_)));
    assert_eq!(err.to_string(), "sc: unsupported value: inf");

    let err = marshal(&true).unwrap_err();
    assert_eq!(err.to_string(), "sc: unsupported type: bool");
}

#[derive(Debug, Default, PartialEq)]
struct Blob {
    data: Bytes,
    checksum: Vec<u8>,
}

record!(Blob { data, checksum });

#[test]
fn test_bytes_round_trip() {
    let v = Blob {
        data: Bytes::from("hello world"),
        checksum: vec![1, 2],
    };
    let out = marshal(&v).unwrap();
    assert_eq!(
        out,
        "{\n  data: \"aGVsbG8gd29ybGQ=\"\n  checksum: [\n    1\n    2\n  ]\n}\n"
    );

    let mut back = Blob::default();
    unmarshal(&out, &mut back).unwrap();
    assert_eq!(back, v);
}

#[test]
fn test_marshal_output_parses() {
    let v = Config {
        name: "line\nbreak".to_string(),
        memory: 1,
        required: false,
    };
    let out = libsc::format(&marshal_document(&v).unwrap());
    assert_eq!(out, marshal(&v).unwrap());
    assert_eq!(libsc::format(&parse(&out).unwrap()), out);

    let mut back = Config::default();
    unmarshal(&out, &mut back).unwrap();
    assert_eq!(back.name, "line\nbreak");
}
