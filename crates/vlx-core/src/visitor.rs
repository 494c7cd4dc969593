//! Double-dispatch over the container kinds of a document.
//!
//! Every tree walker (text exporter, binary exporter, UID collector, linker
//! passes, statistics) implements [`Visitor`]. Each `visit_*` method defaults
//! to a no-op, so a walker only overrides the kinds it cares about; recursion
//! into children is the walker's own business.
//!
//! The [`VisitedSet`] each visitor owns bounds that recursion. A parsed
//! document can never contain a list cycle, but a tree mutated after parsing
//! can, and structures are legitimately reached more than once when a domain
//! export shares them.

use std::collections::HashSet;

use crate::value::{
    ArrayIntegerRef, ArrayRealRef, ListRef, NodeId, RawtextRef, StructureRef, TaggedNode, Value,
};

/// The nodes a visitor has already entered during one pass.
#[derive(Debug, Default, Clone)]
pub struct VisitedSet {
    nodes: HashSet<NodeId>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// `false` the first time `id` is seen (and marks it), `true` afterwards.
    pub fn visited(&mut self, id: NodeId) -> bool {
        !self.nodes.insert(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    /// Forget every visited node, ready for an independent pass.
    pub fn reset(&mut self) {
        self.nodes.clear();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

pub trait Visitor {
    fn visited_set(&mut self) -> &mut VisitedSet;

    fn is_visited(&mut self, id: NodeId) -> bool {
        self.visited_set().visited(id)
    }

    fn reset_visited_nodes(&mut self) {
        self.visited_set().reset();
    }

    fn visit_structure(&mut self, _structure: &StructureRef) {}

    fn visit_list(&mut self, _list: &ListRef) {}

    fn visit_rawtext_block(&mut self, _block: &RawtextRef) {}

    fn visit_array_integer(&mut self, _array: &ArrayIntegerRef) {}

    fn visit_array_real(&mut self, _array: &ArrayRealRef) {}
}

impl TaggedNode {
    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        match self {
            TaggedNode::Structure(s) => visitor.visit_structure(s),
            TaggedNode::List(l) => visitor.visit_list(l),
            TaggedNode::RawtextBlock(r) => visitor.visit_rawtext_block(r),
            TaggedNode::ArrayInteger(a) => visitor.visit_array_integer(a),
            TaggedNode::ArrayReal(a) => visitor.visit_array_real(a),
        }
    }
}

impl Value {
    /// Dispatch to the visitor if this value holds a container; scalars and
    /// UIDs are left to the caller.
    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        use crate::value::Payload;
        match self.payload() {
            Payload::Structure(s) => visitor.visit_structure(s),
            Payload::List(l) => visitor.visit_list(l),
            Payload::RawtextBlock(r) => visitor.visit_rawtext_block(r),
            Payload::ArrayInteger(a) => visitor.visit_array_integer(a),
            Payload::ArrayReal(a) => visitor.visit_array_real(a),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{List, Structure};

    #[derive(Default)]
    struct CountLists {
        visited: VisitedSet,
        lists: usize,
    }

    impl Visitor for CountLists {
        fn visited_set(&mut self) -> &mut VisitedSet {
            &mut self.visited
        }

        fn visit_list(&mut self, list: &ListRef) {
            if self.is_visited(NodeId::of(list)) {
                return;
            }
            self.lists += 1;
            for value in &list.borrow().values {
                value.accept(self);
            }
        }
    }

    #[test]
    fn visited_marks_on_first_call() {
        let mut set = VisitedSet::new();
        let s = Structure::new("<A>").into_ref();
        assert!(!set.visited(NodeId::of(&s)));
        assert!(set.visited(NodeId::of(&s)));
        set.reset();
        assert!(!set.visited(NodeId::of(&s)));
    }

    #[test]
    fn self_containing_list_terminates() {
        let list = List::new("<L>").into_ref();
        list.borrow_mut().push(Value::from(list.clone()));

        let mut counter = CountLists::default();
        TaggedNode::from(list.clone()).accept(&mut counter);
        assert_eq!(counter.lists, 1);

        // Break the Rc cycle so the test does not leak.
        list.borrow_mut().values.clear();
    }
}
