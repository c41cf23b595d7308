//! SC printer.
//!
//! Renders a syntax tree in the canonical layout: one member or element
//! per line, two-space indentation, no separating commas. Comments are
//! kept next to the nodes they were attached to, but the original
//! whitespace and line breaks are not preserved.

use crate::node::{Comment, DictionaryNode, ListNode, MemberNode, Node, StringPart};

/// Format a document.
///
/// # Example
///
/// ```
/// use libsc::{format, parse};
///
/// let doc = parse("{ a: 1, b: [true] }").unwrap();
/// assert_eq!(format(&doc), "{\n  a: 1\n  b: [\n    true\n  ]\n}\n");
/// ```
pub fn format(doc: &DictionaryNode) -> String {
    let mut printer = Printer::new();
    printer.print_comments(&doc.comments.head);
    printer.print_dictionary(doc);
    printer.pending.extend(doc.comments.inline.iter().cloned());
    printer.newline();
    printer.print_comments(&doc.comments.foot);
    printer.output
}

struct Printer {
    output: String,
    /// Comments waiting for the end of the current line.
    pending: Vec<Comment>,
    margin: usize,
}

impl Printer {
    fn new() -> Self {
        Self {
            output: String::new(),
            pending: Vec::new(),
            margin: 0,
        }
    }

    fn write(&mut self, s: &str) {
        self.output.push_str(s);
    }

    /// End the line, flushing pending inline comments, and indent the next.
    fn newline(&mut self) {
        for comment in std::mem::take(&mut self.pending) {
            self.output.push(' ');
            self.print_comment(&comment);
        }
        self.output.push('\n');
        for _ in 0..self.margin {
            self.output.push_str("  ");
        }
    }

    fn print_comment(&mut self, comment: &Comment) {
        if comment.is_block {
            self.write("/*");
            self.write(&comment.text);
            self.write("*/");
        } else {
            let line = format!("//{}", comment.text);
            self.write(line.trim_end());
        }
    }

    /// Print each comment on its own line.
    fn print_comments(&mut self, comments: &[Comment]) {
        for comment in comments {
            self.print_comment(comment);
            self.newline();
        }
    }

    fn print_value(&mut self, node: &Node) {
        self.print_comments(&node.comments().head);
        match node {
            Node::Null(_) => self.write("null"),
            Node::Bool(n) => self.write(if n.value { "true" } else { "false" }),
            Node::Number(n) => self.write(&n.text()),
            Node::InterpolatedString(n) => {
                self.write("\"");
                for part in &n.parts {
                    match part {
                        StringPart::Text(s) => self.write(&escape_string(&s.value)),
                        StringPart::Variable(v) => self.write(&v.to_string()),
                    }
                }
                self.write("\"");
            }
            Node::RawString(n) => {
                self.write("`");
                self.write(&n.value);
                self.write("`");
            }
            Node::Variable(n) => self.write(&n.to_string()),
            Node::List(n) => self.print_list(n),
            Node::Dictionary(n) => self.print_dictionary(n),
        }
        self.pending.extend(node.comments().inline.iter().cloned());
    }

    /// Print the inner comments of an empty collection, one per line.
    fn print_inner(&mut self, inner: &[Comment]) {
        if inner.is_empty() {
            return;
        }
        self.margin += 1;
        for comment in inner {
            self.newline();
            self.print_comment(comment);
        }
        self.margin -= 1;
        self.newline();
    }

    fn print_list(&mut self, list: &ListNode) {
        self.write("[");
        if list.elements.is_empty() {
            self.print_inner(&list.comments.inner);
            self.write("]");
            return;
        }

        self.margin += 1;
        self.newline();
        self.print_comments(&list.comments.inner);
        for (i, element) in list.elements.iter().enumerate() {
            self.print_value(element);
            for comment in &element.comments().foot {
                self.newline();
                self.print_comment(comment);
            }
            if i + 1 < list.elements.len() {
                self.newline();
            }
        }
        self.margin -= 1;
        self.newline();
        self.write("]");
    }

    fn print_dictionary(&mut self, dict: &DictionaryNode) {
        self.write("{");
        if dict.members.is_empty() {
            self.print_inner(&dict.comments.inner);
            self.write("}");
            return;
        }

        self.margin += 1;
        self.newline();
        self.print_comments(&dict.comments.inner);
        for (i, member) in dict.members.iter().enumerate() {
            self.print_member(member);
            for comment in &member.comments.foot {
                self.newline();
                self.print_comment(comment);
            }
            if i + 1 < dict.members.len() {
                self.newline();
            }
        }
        self.margin -= 1;
        self.newline();
        self.write("}");
    }

    fn print_member(&mut self, member: &MemberNode) {
        self.print_comments(&member.comments.head);

        let key = &member.key;
        self.print_comments(&key.comments().head);
        // Display quotes identifiers that are not valid bare keys.
        self.write(&key.to_string());
        self.pending.extend(key.comments().inline.iter().cloned());

        // Anything between the key and the value pushes the value onto
        // its own, further indented line.
        let own_line = !self.pending.is_empty()
            || !key.comments().foot.is_empty()
            || !member.value.comments().head.is_empty();
        if own_line {
            self.write(":");
            self.margin += 1;
            self.newline();
        } else {
            self.write(": ");
        }
        self.print_comments(&key.comments().foot);

        self.print_value(&member.value);
        if own_line {
            self.margin -= 1;
        }
    }
}

/// Escape `s` for use between double quotes.
///
/// `$` is only escaped in front of `{`, where it would start a variable.
pub(crate) fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            c if c < ' ' => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}
