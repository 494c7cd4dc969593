//! Node counts for a document, as reported by `vlx stats`.

use serde::Serialize;

use crate::value::{
    ArrayIntegerRef, ArrayRealRef, ListRef, NodeId, Payload, RawtextRef, StructureRef, Value,
};
use crate::visitor::{VisitedSet, Visitor};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentStats {
    pub structures: usize,
    pub lists: usize,
    pub rawtext_blocks: usize,
    pub integer_arrays: usize,
    pub integer_elements: usize,
    pub real_arrays: usize,
    pub real_elements: usize,
    /// Bools, integers, reals, strings, and identifiers.
    pub scalars: usize,
    /// `#uid` leaf values, excluding `#NULL`.
    pub uid_references: usize,
    /// Structures carrying their own non-null uid.
    pub declared_uids: usize,
}

impl DocumentStats {
    /// Count every node reachable from `root`, each shared node once.
    pub fn collect(root: &StructureRef) -> Self {
        let mut counter = StatsCounter::default();
        counter.visit_structure(root);
        counter.stats
    }
}

#[derive(Default)]
struct StatsCounter {
    visited: VisitedSet,
    stats: DocumentStats,
}

impl StatsCounter {
    fn count_value(&mut self, value: &Value) {
        match value.payload() {
            Payload::Bool(_)
            | Payload::Integer(_)
            | Payload::Real(_)
            | Payload::String(_)
            | Payload::Identifier(_) => self.stats.scalars += 1,
            Payload::Uid(uid) => {
                if !uid.is_null() {
                    self.stats.uid_references += 1;
                }
            }
            _ => value.accept(self),
        }
    }
}

impl Visitor for StatsCounter {
    fn visited_set(&mut self) -> &mut VisitedSet {
        &mut self.visited
    }

    fn visit_structure(&mut self, structure: &StructureRef) {
        if self.is_visited(NodeId::of(structure)) {
            return;
        }
        let s = structure.borrow();
        self.stats.structures += 1;
        if s.has_uid() {
            self.stats.declared_uids += 1;
        }
        for kv in &s.pairs {
            self.count_value(&kv.value);
        }
    }

    fn visit_list(&mut self, list: &ListRef) {
        if self.is_visited(NodeId::of(list)) {
            return;
        }
        self.stats.lists += 1;
        for value in &list.borrow().values {
            self.count_value(value);
        }
    }

    fn visit_rawtext_block(&mut self, _block: &RawtextRef) {
        self.stats.rawtext_blocks += 1;
    }

    fn visit_array_integer(&mut self, array: &ArrayIntegerRef) {
        self.stats.integer_arrays += 1;
        self.stats.integer_elements += array.borrow().values.len();
    }

    fn visit_array_real(&mut self, array: &ArrayRealRef) {
        self.stats.real_arrays += 1;
        self.stats.real_elements += array.borrow().values.len();
    }
}
