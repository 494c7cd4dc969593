//! Text exporter: document tree → VLX text.
//!
//! Mirrors the parser grammar in reverse:
//!
//! ```text
//! VLX version=100 encoding=ascii
//!
//! <Root>
//! {
//! 	ID = #root
//! 	count = 3
//! 	items = ( 1 2 3 )
//! 	child = <Child>
//! 	{
//! 		label = "hi"
//! 	}
//! 	empty = [ ]
//! }
//! ```
//!
//! # Key design decisions
//!
//! - **ID pruning**: with a [`UidUsage`] map, `ID = #x` is written only for
//!   structures some other node references. Without a map every non-null uid
//!   is written.
//! - **Shared structures**: the second time a structure is reached it is
//!   written as its bare `#uid`, so shared sub-graphs are not duplicated.
//! - **Repeated lists**: lists carry no uid, so a list reached a second time
//!   in one pass (a cycle or a list shared by two parents) is written as
//!   `[ ]` with a warning, which keeps the output well-formed.

use std::fmt::Write as _;

use crate::collector::{collect_uid_usage, UidUsage};
use crate::parser::{VLX_ENCODING, VLX_VERSION};
use crate::value::{
    ArrayIntegerRef, ArrayRealRef, ListRef, NodeId, Payload, RawtextRef, StructureRef, Value,
};
use crate::visitor::{VisitedSet, Visitor};

/// Layout knobs for the text exporter. Whitespace is insignificant to the
/// parser, so none of these affect what a reader gets back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextExportOptions {
    /// One copy per nesting level.
    pub indent: String,
    /// Array elements per line.
    pub array_chunk: usize,
    /// Name written at the start of the header line.
    pub format_name: String,
}

impl Default for TextExportOptions {
    fn default() -> Self {
        TextExportOptions {
            indent: "\t".to_string(),
            array_chunk: 10,
            format_name: "VLX".to_string(),
        }
    }
}

/// Export `root` with default options, writing `ID` only where referenced.
pub fn export_text(root: &StructureRef) -> String {
    let usage = collect_uid_usage(root);
    export_text_with(root, &TextExportOptions::default(), Some(&usage))
}

/// Export `root` with explicit options. `usage: None` writes every uid.
pub fn export_text_with(
    root: &StructureRef,
    options: &TextExportOptions,
    usage: Option<&UidUsage>,
) -> String {
    let mut exporter = TextExporter::new(options, usage);
    exporter.write_header();
    exporter.visit_structure(root);
    exporter.out.push('\n');
    exporter.out
}

/// Visitor that renders a document tree as VLX text.
pub struct TextExporter<'a> {
    options: &'a TextExportOptions,
    usage: Option<&'a UidUsage>,
    visited: VisitedSet,
    depth: usize,
    out: String,
}

impl<'a> TextExporter<'a> {
    pub fn new(options: &'a TextExportOptions, usage: Option<&'a UidUsage>) -> Self {
        TextExporter {
            options,
            usage,
            visited: VisitedSet::new(),
            depth: 0,
            out: String::new(),
        }
    }

    pub fn output(&self) -> &str {
        &self.out
    }

    pub fn into_output(self) -> String {
        self.out
    }

    /// `<format> version=100 encoding=ascii` followed by a blank line.
    pub fn write_header(&mut self) {
        let _ = write!(
            self.out,
            "{} version={} encoding={}\n\n",
            self.options.format_name, VLX_VERSION, VLX_ENCODING
        );
    }

    fn is_used(&self, uid: &str) -> bool {
        match self.usage {
            Some(usage) => usage.get(uid).copied().unwrap_or(0) > 0,
            None => true,
        }
    }

    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str(&self.options.indent);
        }
    }

    /// `<Tag>` followed by a newline and the current indent, or nothing for
    /// an untagged container.
    fn open_tagged_block(&mut self, tag: &str) {
        if !tag.is_empty() {
            self.out.push_str(tag);
            self.out.push('\n');
            self.indent();
        }
    }

    fn inline_tag(&mut self, tag: &str) {
        if !tag.is_empty() {
            self.out.push_str(tag);
            self.out.push(' ');
        }
    }

    fn write_value(&mut self, value: &Value) {
        match value.payload() {
            Payload::Bool(b) => self.out.push_str(if *b { "true" } else { "false" }),
            Payload::Integer(i) => {
                let _ = write!(self.out, "{i}");
            }
            Payload::Real(r) => self.out.push_str(&format_real(*r)),
            Payload::String(s) => self.out.push_str(&escape_string(s)),
            Payload::Identifier(s) => self.out.push_str(s),
            Payload::Uid(uid) => self.out.push_str(&uid.id),
            _ => value.accept(self),
        }
    }

    fn write_array<T, F>(&mut self, tag: &str, values: &[T], mut fmt: F)
    where
        F: FnMut(&T) -> String,
    {
        self.inline_tag(tag);
        let chunk = self.options.array_chunk.max(1);
        if values.is_empty() {
            self.out.push_str("( )");
            return;
        }
        if values.len() <= chunk {
            self.out.push_str("( ");
            for v in values {
                self.out.push_str(&fmt(v));
                self.out.push(' ');
            }
            self.out.push(')');
            return;
        }
        self.out.push('(');
        self.depth += 1;
        for line in values.chunks(chunk) {
            self.out.push('\n');
            self.indent();
            let items: Vec<String> = line.iter().map(&mut fmt).collect();
            self.out.push_str(&items.join(" "));
        }
        self.depth -= 1;
        self.out.push('\n');
        self.indent();
        self.out.push(')');
    }
}

impl Visitor for TextExporter<'_> {
    fn visited_set(&mut self) -> &mut VisitedSet {
        &mut self.visited
    }

    fn visit_structure(&mut self, structure: &StructureRef) {
        if self.is_visited(NodeId::of(structure)) {
            let s = structure.borrow();
            if !s.has_uid() {
                log::warn!(
                    "structure {} is referenced more than once but has no uid",
                    s.tag
                );
            }
            self.out.push_str(&s.uid);
            return;
        }

        let s = structure.borrow();
        self.open_tagged_block(&s.tag);
        self.out.push_str("{\n");
        self.depth += 1;
        if s.has_uid() && self.is_used(&s.uid) {
            self.indent();
            let _ = writeln!(self.out, "ID = {}", s.uid);
        }
        for kv in &s.pairs {
            self.indent();
            self.out.push_str(&kv.key);
            self.out.push_str(" = ");
            self.write_value(&kv.value);
            self.out.push('\n');
        }
        self.depth -= 1;
        self.indent();
        self.out.push('}');
    }

    fn visit_list(&mut self, list: &ListRef) {
        if self.is_visited(NodeId::of(list)) {
            log::warn!(
                "list {} reached again; written as an empty list",
                list.borrow().tag
            );
            self.out.push_str("[ ]");
            return;
        }

        let l = list.borrow();
        if l.values.is_empty() {
            self.inline_tag(&l.tag);
            self.out.push_str("[ ]");
            return;
        }
        self.open_tagged_block(&l.tag);
        self.out.push_str("[\n");
        self.depth += 1;
        for value in &l.values {
            self.indent();
            self.write_value(value);
            self.out.push('\n');
        }
        self.depth -= 1;
        self.indent();
        self.out.push(']');
    }

    fn visit_rawtext_block(&mut self, block: &RawtextRef) {
        let b = block.borrow();
        self.inline_tag(&b.tag);
        self.out.push_str("{<\n");
        self.out.push_str(&escape_rawtext(&b.text));
        self.out.push_str("\n>}");
    }

    fn visit_array_integer(&mut self, array: &ArrayIntegerRef) {
        let a = array.borrow();
        self.write_array(&a.tag, &a.values, |v| v.to_string());
    }

    fn visit_array_real(&mut self, array: &ArrayRealRef) {
        let a = array.borrow();
        self.write_array(&a.tag, &a.values, |v| format_real(*v));
    }
}

/// Shortest round-trip form that still lexes as a real (`1.0`, not `1`).
pub(crate) fn format_real(r: f64) -> String {
    if !r.is_finite() {
        log::warn!("non-finite real {r} written as 0.0");
        return "0.0".to_string();
    }
    // Debug formatting always keeps a `.` or an exponent.
    format!("{r:?}")
}

/// Quote and escape a string; the exact inverse of the tokenizer.
pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

/// Make a rawtext body safe to place between `{<` and `>}`: every `>}` is
/// written as `\>}`.
pub fn escape_rawtext(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch == '}' && out.ends_with('>') {
            out.pop();
            out.push_str("\\>");
        }
        out.push(ch);
    }
    out
}
