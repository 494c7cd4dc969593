//! UID usage counting, run before export.
//!
//! Counts how often each uid is *referenced*: once per `#uid` leaf value and
//! once per repeated occurrence of a shared structure (which the exporters
//! write as a bare `#uid`). A structure's own `ID = ...` declaration is not a
//! reference. Exporters emit `ID` only for uids with a count of at least one.

use std::collections::HashMap;

use crate::value::{ListRef, NodeId, Payload, StructureRef, Value};
use crate::visitor::{VisitedSet, Visitor};

/// uid → number of references.
pub type UidUsage = HashMap<String, usize>;

/// Count the uid references reachable from `root`.
pub fn collect_uid_usage(root: &StructureRef) -> UidUsage {
    let mut collector = UidCollector::default();
    collector.visit_structure(root);
    collector.into_usage()
}

#[derive(Debug, Default)]
struct UidCollector {
    visited: VisitedSet,
    usage: UidUsage,
}

impl UidCollector {
    fn into_usage(self) -> UidUsage {
        self.usage
    }

    fn count(&mut self, uid: &str) {
        *self.usage.entry(uid.to_string()).or_insert(0) += 1;
    }

    fn collect_value(&mut self, value: &Value) {
        match value.payload() {
            Payload::Uid(uid) if !uid.is_null() => self.count(&uid.id),
            _ => value.accept(self),
        }
    }
}

impl Visitor for UidCollector {
    fn visited_set(&mut self) -> &mut VisitedSet {
        &mut self.visited
    }

    fn visit_structure(&mut self, structure: &StructureRef) {
        if self.is_visited(NodeId::of(structure)) {
            let s = structure.borrow();
            if s.has_uid() {
                self.count(&s.uid);
            }
            return;
        }
        for kv in &structure.borrow().pairs {
            self.collect_value(&kv.value);
        }
    }

    fn visit_list(&mut self, list: &ListRef) {
        if self.is_visited(NodeId::of(list)) {
            return;
        }
        for value in &list.borrow().values {
            self.collect_value(value);
        }
    }
}
