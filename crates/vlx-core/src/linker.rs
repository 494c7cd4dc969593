//! Two-pass UID linking.
//!
//! 1. **Mapper**: walk every structure reachable from every module and record
//!    `uid → structure`. A uid claimed by two different structures is a
//!    [`LinkError::DuplicateUid`].
//! 2. **Resolver**: walk again and attach a weak link to every `#uid` leaf
//!    value. A uid nobody declares is a [`LinkError::UnresolvedUid`].
//!
//! Both passes keep going after an error so a single run reports every
//! problem. Linking succeeds only if neither pass recorded one. Each pass
//! has its own [`VisitedSet`], so list cycles and shared structures are
//! walked once per pass.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{LinkError, Result, VlxError};
use crate::value::{ListRef, NodeId, Payload, StructureRef, TaggedNode, Value};
use crate::visitor::{VisitedSet, Visitor};

/// Link a single document in place.
pub fn link(root: &StructureRef) -> Result<()> {
    let mut linker = Linker::new();
    linker.add_module(Rc::clone(root));
    linker.link()
}

/// Resolves UIDs across one or more modules.
#[derive(Debug, Default)]
pub struct Linker {
    modules: Vec<TaggedNode>,
    uid_map: HashMap<String, StructureRef>,
    errors: Vec<LinkError>,
}

impl Linker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a module root. Uids resolve across every module added.
    pub fn add_module(&mut self, module: impl Into<TaggedNode>) {
        self.modules.push(module.into());
    }

    pub fn modules(&self) -> &[TaggedNode] {
        &self.modules
    }

    /// `uid → structure` as built by the last mapper pass.
    pub fn uid_map(&self) -> &HashMap<String, StructureRef> {
        &self.uid_map
    }

    /// Errors recorded by the passes run so far.
    pub fn errors(&self) -> &[LinkError] {
        &self.errors
    }

    /// Run both passes from scratch.
    pub fn link(&mut self) -> Result<()> {
        self.uid_map.clear();
        self.errors.clear();
        self.map_uids();
        self.resolve_uids();
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(VlxError::Link(self.errors.clone()))
        }
    }

    /// Pass 1. Adds to the current map; running it again over an unchanged
    /// tree adds nothing and reports nothing new.
    ///
    /// Returns `true` if this pass recorded no new error.
    pub fn map_uids(&mut self) -> bool {
        let before = self.errors.len();
        let mut mapper = LinkMapper {
            visited: VisitedSet::new(),
            uid_map: &mut self.uid_map,
            errors: &mut self.errors,
        };
        for module in &self.modules {
            module.accept(&mut mapper);
        }
        self.errors.len() == before
    }

    /// Pass 2, against the map built by [`Linker::map_uids`].
    ///
    /// Returns `true` if this pass recorded no new error.
    pub fn resolve_uids(&mut self) -> bool {
        let before = self.errors.len();
        let mut resolver = LinkResolver {
            visited: VisitedSet::new(),
            uid_map: &self.uid_map,
            errors: &mut self.errors,
        };
        for module in &self.modules {
            module.accept(&mut resolver);
        }
        self.errors.len() == before
    }
}

struct LinkMapper<'a> {
    visited: VisitedSet,
    uid_map: &'a mut HashMap<String, StructureRef>,
    errors: &'a mut Vec<LinkError>,
}

impl Visitor for LinkMapper<'_> {
    fn visited_set(&mut self) -> &mut VisitedSet {
        &mut self.visited
    }

    fn visit_structure(&mut self, structure: &StructureRef) {
        if self.is_visited(NodeId::of(structure)) {
            return;
        }
        let s = structure.borrow();
        if s.has_uid() {
            match self.uid_map.get(&s.uid) {
                Some(existing) if !Rc::ptr_eq(existing, structure) => {
                    let first_tag = existing.borrow().tag.clone();
                    log::error!(
                        "line {}: duplicate UID {} ({} and {})",
                        s.line,
                        s.uid,
                        first_tag,
                        s.tag
                    );
                    self.errors.push(LinkError::DuplicateUid {
                        uid: s.uid.clone(),
                        first_tag,
                        second_tag: s.tag.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    self.uid_map.insert(s.uid.clone(), Rc::clone(structure));
                }
            }
        }
        for kv in &s.pairs {
            kv.value.accept(self);
        }
    }

    fn visit_list(&mut self, list: &ListRef) {
        if self.is_visited(NodeId::of(list)) {
            log::warn!("list {} reached twice while mapping UIDs", list.borrow().tag);
            return;
        }
        for value in &list.borrow().values {
            value.accept(self);
        }
    }
}

struct LinkResolver<'a> {
    visited: VisitedSet,
    uid_map: &'a HashMap<String, StructureRef>,
    errors: &'a mut Vec<LinkError>,
}

impl LinkResolver<'_> {
    fn resolve_value(&mut self, value: &mut Value) {
        let line = value.line();
        if let Payload::Uid(uid) = value.payload_mut() {
            if uid.is_null() {
                return;
            }
            match self.uid_map.get(&uid.id) {
                Some(target) => uid.resolve(target),
                None => {
                    log::error!("line {line}: unresolved UID {}", uid.id);
                    self.errors.push(LinkError::UnresolvedUid {
                        uid: uid.id.clone(),
                        line,
                    });
                }
            }
            return;
        }
        value.accept(self);
    }
}

impl Visitor for LinkResolver<'_> {
    fn visited_set(&mut self) -> &mut VisitedSet {
        &mut self.visited
    }

    fn visit_structure(&mut self, structure: &StructureRef) {
        if self.is_visited(NodeId::of(structure)) {
            return;
        }
        for kv in structure.borrow_mut().pairs.iter_mut() {
            self.resolve_value(&mut kv.value);
        }
    }

    fn visit_list(&mut self, list: &ListRef) {
        if self.is_visited(NodeId::of(list)) {
            // The list may be mutably borrowed further up this walk.
            log::warn!("list {:?} reached twice while resolving UIDs", NodeId::of(list));
            return;
        }
        for value in list.borrow_mut().values.iter_mut() {
            self.resolve_value(value);
        }
    }
}
