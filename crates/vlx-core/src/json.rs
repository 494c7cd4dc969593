//! A lossy JSON view of a document, for humans and `vlx inspect`.
//!
//! Structures become objects (keys in document order, `"@tag"` and `"@uid"`
//! first), lists and arrays become JSON arrays, UIDs and identifiers become
//! strings, rawtext becomes its body. Duplicate keys collapse to a JSON array
//! of every value under that key. Non-finite reals become `null`.
//!
//! The view is not parsed back; the text and binary formats are the
//! interchange formats.

use serde_json::{Map, Number, Value as Json};

use crate::value::{NodeId, Payload, StructureRef, Value};
use crate::visitor::VisitedSet;

/// Render a single value (and everything below it).
pub fn to_json(value: &Value) -> Json {
    JsonView::default().value(value)
}

/// Render a document root.
pub fn structure_to_json(root: &StructureRef) -> Json {
    JsonView::default().structure(root)
}

#[derive(Default)]
struct JsonView {
    visited: VisitedSet,
}

impl JsonView {
    fn value(&mut self, value: &Value) -> Json {
        match value.payload() {
            Payload::Bool(b) => Json::Bool(*b),
            Payload::Integer(i) => Json::from(*i),
            Payload::Real(r) => real(*r),
            Payload::String(s) | Payload::Identifier(s) => Json::String(s.clone()),
            Payload::Uid(uid) => Json::String(uid.id.clone()),
            Payload::RawtextBlock(block) => Json::String(block.borrow().text.clone()),
            Payload::Structure(s) => self.structure(s),
            Payload::List(list) => {
                if self.visited.visited(NodeId::of(list)) {
                    return Json::Array(Vec::new());
                }
                let list = list.borrow();
                Json::Array(list.values.iter().map(|v| self.value(v)).collect())
            }
            Payload::ArrayInteger(a) => {
                Json::Array(a.borrow().values.iter().map(|&i| Json::from(i)).collect())
            }
            Payload::ArrayReal(a) => {
                Json::Array(a.borrow().values.iter().map(|&r| real(r)).collect())
            }
        }
    }

    fn structure(&mut self, structure: &StructureRef) -> Json {
        let s = structure.borrow();
        // Shared structures are shown in full once, then by uid.
        if self.visited.visited(NodeId::of(structure)) {
            return Json::String(s.uid.clone());
        }

        let mut object = Map::new();
        if !s.tag.is_empty() {
            object.insert("@tag".to_string(), Json::String(s.tag.clone()));
        }
        if s.has_uid() {
            object.insert("@uid".to_string(), Json::String(s.uid.clone()));
        }
        for kv in &s.pairs {
            let rendered = self.value(&kv.value);
            if s.values(&kv.key).nth(1).is_none() {
                object.insert(kv.key.clone(), rendered);
            } else if let Json::Array(items) = object
                .entry(kv.key.clone())
                .or_insert_with(|| Json::Array(Vec::new()))
            {
                items.push(rendered);
            }
        }
        Json::Object(object)
    }
}

fn real(r: f64) -> Json {
    Number::from_f64(r).map_or(Json::Null, Json::Number)
}
