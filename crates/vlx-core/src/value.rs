//! The VLX document model.
//!
//! A document is a tree of tagged containers ([`Structure`], [`List`],
//! [`RawtextBlock`], [`ArrayInteger`], [`ArrayReal`]) whose leaves are scalar
//! [`Value`]s. Containers are held through `Rc<RefCell<_>>` handles so that a
//! structure can be shared by several parents (domain export of a shared
//! object) and so that every node has a stable identity ([`NodeId`]) for the
//! visitors' cycle guard.
//!
//! The tree owns every node exactly once along its parent links. The only
//! other edges are the links the resolver attaches to [`UidRef`] values, and
//! those are [`Weak`]: dropping the tree drops each structure once, no matter
//! how many UIDs pointed at it.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// The uid of a structure that has no identity.
pub const NULL_UID: &str = "#NULL";

/// Shared handle to a [`Structure`]; every container is owned through one of these.
pub type StructureRef = Rc<RefCell<Structure>>;
pub type ListRef = Rc<RefCell<List>>;
pub type RawtextRef = Rc<RefCell<RawtextBlock>>;
pub type ArrayIntegerRef = Rc<RefCell<ArrayInteger>>;
pub type ArrayRealRef = Rc<RefCell<ArrayReal>>;

/// Identity of a container node, derived from its heap address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// Identity of the node behind `node`. Clones of one handle share an id.
    pub fn of<T>(node: &Rc<RefCell<T>>) -> Self {
        NodeId(Rc::as_ptr(node).cast::<()>() as usize)
    }
}

/// Discriminant of a [`Value`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Bool,
    Integer,
    Real,
    String,
    Identifier,
    Uid,
    RawtextBlock,
    List,
    Structure,
    ArrayInteger,
    ArrayReal,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Bool => "Bool",
            ValueType::Integer => "Integer",
            ValueType::Real => "Real",
            ValueType::String => "String",
            ValueType::Identifier => "Identifier",
            ValueType::Uid => "UID",
            ValueType::RawtextBlock => "RawtextBlock",
            ValueType::List => "List",
            ValueType::Structure => "Structure",
            ValueType::ArrayInteger => "ArrayInteger",
            ValueType::ArrayReal => "ArrayReal",
        };
        f.write_str(name)
    }
}

/// A `#name` reference. Before linking it is only text; after a successful
/// link `target` points (weakly) at the structure declaring that uid.
#[derive(Debug, Clone, Default)]
pub struct UidRef {
    pub id: String,
    target: Option<Weak<RefCell<Structure>>>,
}

impl UidRef {
    /// An unresolved reference to `id` (including the `#`).
    pub fn new(id: impl Into<String>) -> Self {
        UidRef {
            id: id.into(),
            target: None,
        }
    }

    /// `true` for the `#NULL` sentinel.
    pub fn is_null(&self) -> bool {
        self.id == NULL_UID
    }

    /// `true` while the linked structure is still alive.
    pub fn is_resolved(&self) -> bool {
        self.target().is_some()
    }

    /// The linked structure, if the link was resolved and the structure is
    /// still alive.
    pub fn target(&self) -> Option<StructureRef> {
        self.target.as_ref().and_then(Weak::upgrade)
    }

    /// Attach a weak link to `structure`. The reference never keeps it alive.
    pub fn resolve(&mut self, structure: &StructureRef) {
        self.target = Some(Rc::downgrade(structure));
    }

    pub fn unresolve(&mut self) {
        self.target = None;
    }
}

impl PartialEq for UidRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// The payload of a [`Value`]. Exactly one variant is active; replacing it
/// drops the previous payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Bool(bool),
    Integer(i64),
    Real(f64),
    String(String),
    Identifier(String),
    Uid(UidRef),
    RawtextBlock(RawtextRef),
    List(ListRef),
    Structure(StructureRef),
    ArrayInteger(ArrayIntegerRef),
    ArrayReal(ArrayRealRef),
}

/// A document value plus the source line it came from (0 when synthesized).
///
/// Equality compares payloads only; line numbers are diagnostics.
#[derive(Debug, Clone)]
pub struct Value {
    payload: Payload,
    line: usize,
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.payload == other.payload
    }
}

impl Value {
    /// Wrap `payload` with no source line (line 0).
    pub fn new(payload: Payload) -> Self {
        Value { payload, line: 0 }
    }

    /// Wrap `payload`, remembering the 1-based line it was parsed from.
    pub fn with_line(payload: Payload, line: usize) -> Self {
        Value { payload, line }
    }

    /// A `true`/`false` scalar.
    pub fn bool(b: bool) -> Self {
        Value::new(Payload::Bool(b))
    }

    /// A 64-bit integer scalar.
    pub fn integer(i: i64) -> Self {
        Value::new(Payload::Integer(i))
    }

    /// A real scalar. Non-finite values are written as `0.0` on text export.
    pub fn real(r: f64) -> Self {
        Value::new(Payload::Real(r))
    }

    /// A string scalar, stored unescaped.
    pub fn string(s: impl Into<String>) -> Self {
        Value::new(Payload::String(s.into()))
    }

    /// A bare identifier scalar such as `GL_TRIANGLES`.
    pub fn identifier(s: impl Into<String>) -> Self {
        Value::new(Payload::Identifier(s.into()))
    }

    /// A `#uid` reference leaf, unresolved until linked.
    pub fn uid(id: impl Into<String>) -> Self {
        Value::new(Payload::Uid(UidRef::new(id)))
    }

    /// Take ownership of `block` behind a fresh handle.
    ///
    /// The `list`, `structure` and array constructors below work the same way.
    pub fn rawtext(block: RawtextBlock) -> Self {
        Value::new(Payload::RawtextBlock(Rc::new(RefCell::new(block))))
    }

    pub fn list(list: List) -> Self {
        Value::new(Payload::List(Rc::new(RefCell::new(list))))
    }

    pub fn structure(structure: Structure) -> Self {
        Value::new(Payload::Structure(Rc::new(RefCell::new(structure))))
    }

    pub fn array_integer(array: ArrayInteger) -> Self {
        Value::new(Payload::ArrayInteger(Rc::new(RefCell::new(array))))
    }

    pub fn array_real(array: ArrayReal) -> Self {
        Value::new(Payload::ArrayReal(Rc::new(RefCell::new(array))))
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }

    /// Source line of the value, or 0 when it was built in memory.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Kind of the payload, without its data.
    pub fn value_type(&self) -> ValueType {
        match &self.payload {
            Payload::Bool(_) => ValueType::Bool,
            Payload::Integer(_) => ValueType::Integer,
            Payload::Real(_) => ValueType::Real,
            Payload::String(_) => ValueType::String,
            Payload::Identifier(_) => ValueType::Identifier,
            Payload::Uid(_) => ValueType::Uid,
            Payload::RawtextBlock(_) => ValueType::RawtextBlock,
            Payload::List(_) => ValueType::List,
            Payload::Structure(_) => ValueType::Structure,
            Payload::ArrayInteger(_) => ValueType::ArrayInteger,
            Payload::ArrayReal(_) => ValueType::ArrayReal,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.payload {
            Payload::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// Integer payload. Reals are not converted.
    pub fn as_integer(&self) -> Option<i64> {
        match self.payload {
            Payload::Integer(i) => Some(i),
            _ => None,
        }
    }

    /// Reals, and integers widened to reals.
    pub fn as_real(&self) -> Option<f64> {
        match self.payload {
            Payload::Real(r) => Some(r),
            Payload::Integer(i) => Some(i as f64),
            _ => None,
        }
    }

    /// String payload. Identifiers are not strings; see [`Value::as_identifier`].
    pub fn as_str(&self) -> Option<&str> {
        match &self.payload {
            Payload::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_identifier(&self) -> Option<&str> {
        match &self.payload {
            Payload::Identifier(s) => Some(s),
            _ => None,
        }
    }

    /// The `#uid` leaf, linked or not.
    pub fn as_uid(&self) -> Option<&UidRef> {
        match &self.payload {
            Payload::Uid(uid) => Some(uid),
            _ => None,
        }
    }

    pub fn as_rawtext(&self) -> Option<&RawtextRef> {
        match &self.payload {
            Payload::RawtextBlock(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListRef> {
        match &self.payload {
            Payload::List(l) => Some(l),
            _ => None,
        }
    }

    /// An inline structure. A linked `#uid` leaf is not one; use
    /// [`Value::resolved_structure`] for that.
    pub fn as_structure(&self) -> Option<&StructureRef> {
        match &self.payload {
            Payload::Structure(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array_integer(&self) -> Option<&ArrayIntegerRef> {
        match &self.payload {
            Payload::ArrayInteger(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_array_real(&self) -> Option<&ArrayRealRef> {
        match &self.payload {
            Payload::ArrayReal(a) => Some(a),
            _ => None,
        }
    }

    /// The structure this value stands for: either the structure itself or,
    /// for a linked UID, the structure it was resolved to.
    pub fn resolved_structure(&self) -> Option<StructureRef> {
        match &self.payload {
            Payload::Structure(s) => Some(Rc::clone(s)),
            Payload::Uid(uid) => uid.target(),
            _ => None,
        }
    }

    /// The container node behind this value, if it is one.
    pub fn as_node(&self) -> Option<TaggedNode> {
        match &self.payload {
            Payload::Structure(s) => Some(TaggedNode::Structure(Rc::clone(s))),
            Payload::List(l) => Some(TaggedNode::List(Rc::clone(l))),
            Payload::RawtextBlock(r) => Some(TaggedNode::RawtextBlock(Rc::clone(r))),
            Payload::ArrayInteger(a) => Some(TaggedNode::ArrayInteger(Rc::clone(a))),
            Payload::ArrayReal(a) => Some(TaggedNode::ArrayReal(Rc::clone(a))),
            _ => None,
        }
    }
}

impl From<StructureRef> for Value {
    fn from(s: StructureRef) -> Self {
        Value::new(Payload::Structure(s))
    }
}

impl From<ListRef> for Value {
    fn from(l: ListRef) -> Self {
        Value::new(Payload::List(l))
    }
}

/// A container node, as handed to the linker and the exporters.
#[derive(Debug, Clone)]
pub enum TaggedNode {
    Structure(StructureRef),
    List(ListRef),
    RawtextBlock(RawtextRef),
    ArrayInteger(ArrayIntegerRef),
    ArrayReal(ArrayRealRef),
}

impl TaggedNode {
    pub fn id(&self) -> NodeId {
        match self {
            TaggedNode::Structure(n) => NodeId::of(n),
            TaggedNode::List(n) => NodeId::of(n),
            TaggedNode::RawtextBlock(n) => NodeId::of(n),
            TaggedNode::ArrayInteger(n) => NodeId::of(n),
            TaggedNode::ArrayReal(n) => NodeId::of(n),
        }
    }

    pub fn tag(&self) -> String {
        match self {
            TaggedNode::Structure(n) => n.borrow().tag.clone(),
            TaggedNode::List(n) => n.borrow().tag.clone(),
            TaggedNode::RawtextBlock(n) => n.borrow().tag.clone(),
            TaggedNode::ArrayInteger(n) => n.borrow().tag.clone(),
            TaggedNode::ArrayReal(n) => n.borrow().tag.clone(),
        }
    }
}

impl From<StructureRef> for TaggedNode {
    fn from(s: StructureRef) -> Self {
        TaggedNode::Structure(s)
    }
}

impl From<ListRef> for TaggedNode {
    fn from(l: ListRef) -> Self {
        TaggedNode::List(l)
    }
}

/// One `key = value` entry of a [`Structure`].
#[derive(Debug, Clone, PartialEq)]
pub struct KeyValue {
    pub key: String,
    pub value: Value,
}

/// An ordered sequence of `key = value` pairs with a tag and a uid.
///
/// Keys are not required to be unique; duplicates keep their order and
/// lookups return the first match.
#[derive(Debug, Clone)]
pub struct Structure {
    pub tag: String,
    pub uid: String,
    pub line: usize,
    pub pairs: Vec<KeyValue>,
}

impl Default for Structure {
    fn default() -> Self {
        Structure {
            tag: String::new(),
            uid: NULL_UID.to_string(),
            line: 0,
            pairs: Vec::new(),
        }
    }
}

impl PartialEq for Structure {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && self.uid == other.uid && self.pairs == other.pairs
    }
}

impl Structure {
    /// An empty structure with the `#NULL` uid.
    pub fn new(tag: impl Into<String>) -> Self {
        Structure {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// An empty structure declaring `uid`.
    pub fn with_uid(tag: impl Into<String>, uid: impl Into<String>) -> Self {
        Structure {
            tag: tag.into(),
            uid: uid.into(),
            ..Default::default()
        }
    }

    pub fn into_ref(self) -> StructureRef {
        Rc::new(RefCell::new(self))
    }

    /// `true` unless the uid is `#NULL`.
    pub fn has_uid(&self) -> bool {
        self.uid != NULL_UID
    }

    pub fn set_uid(&mut self, uid: impl Into<String>) {
        self.uid = uid.into();
    }

    /// Append a pair. Duplicate keys are kept in order.
    pub fn push(&mut self, key: impl Into<String>, value: Value) {
        self.pairs.push(KeyValue {
            key: key.into(),
            value,
        });
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.pairs.iter().find(|kv| kv.key == key).map(|kv| &kv.value)
    }

    /// Mutable access to the first value stored under `key`.
    pub fn value_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.pairs
            .iter_mut()
            .find(|kv| kv.key == key)
            .map(|kv| &mut kv.value)
    }

    /// Every value stored under `key`, in document order.
    pub fn values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.pairs
            .iter()
            .filter(move |kv| kv.key == key)
            .map(|kv| &kv.value)
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.pairs.iter().any(|kv| kv.key == key)
    }

    /// Keys in document order, duplicates included.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|kv| kv.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// An ordered sequence of values without keys.
#[derive(Debug, Clone, Default)]
pub struct List {
    pub tag: String,
    pub line: usize,
    pub values: Vec<Value>,
}

impl PartialEq for List {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && self.values == other.values
    }
}

impl List {
    pub fn new(tag: impl Into<String>) -> Self {
        List {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn into_ref(self) -> ListRef {
        Rc::new(RefCell::new(self))
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Opaque text delimited by `{< ... >}`; never parsed.
#[derive(Debug, Clone, Default)]
pub struct RawtextBlock {
    pub tag: String,
    pub line: usize,
    pub text: String,
}

impl PartialEq for RawtextBlock {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && self.text == other.text
    }
}

impl RawtextBlock {
    pub fn new(tag: impl Into<String>, text: impl Into<String>) -> Self {
        RawtextBlock {
            tag: tag.into(),
            line: 0,
            text: text.into(),
        }
    }

    pub fn into_ref(self) -> RawtextRef {
        Rc::new(RefCell::new(self))
    }
}

/// Numeric element types that arrays can be bulk-copied to and from.
///
/// Conversions are plain `as` casts: narrowing truncates or saturates the way
/// Rust's numeric casts do.
pub trait ArrayScalar: Copy {
    fn from_i64(v: i64) -> Self;
    fn from_f64(v: f64) -> Self;
    fn to_i64(self) -> i64;
    fn to_f64(self) -> f64;
}

macro_rules! impl_array_scalar {
    ($($t:ty),*) => {
        $(
            impl ArrayScalar for $t {
                fn from_i64(v: i64) -> Self {
                    v as $t
                }
                fn from_f64(v: f64) -> Self {
                    v as $t
                }
                fn to_i64(self) -> i64 {
                    self as i64
                }
                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

impl_array_scalar!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

/// A flat array of integers, written `( 1 2 3 )`.
#[derive(Debug, Clone, Default)]
pub struct ArrayInteger {
    pub tag: String,
    pub line: usize,
    pub values: Vec<i64>,
}

impl PartialEq for ArrayInteger {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && self.values == other.values
    }
}

impl ArrayInteger {
    pub fn new(tag: impl Into<String>, values: Vec<i64>) -> Self {
        ArrayInteger {
            tag: tag.into(),
            line: 0,
            values,
        }
    }

    pub fn into_ref(self) -> ArrayIntegerRef {
        Rc::new(RefCell::new(self))
    }

    /// Replace the contents with `src`, converted element by element.
    pub fn copy_from<T: ArrayScalar>(&mut self, src: &[T]) {
        self.values = src.iter().map(|v| v.to_i64()).collect();
    }

    /// Copy as many elements as fit into `dst`; returns the number copied.
    pub fn copy_to<T: ArrayScalar>(&self, dst: &mut [T]) -> usize {
        let n = dst.len().min(self.values.len());
        for (d, s) in dst.iter_mut().zip(&self.values) {
            *d = T::from_i64(*s);
        }
        n
    }

    /// Every element converted to `T`.
    pub fn to_vec<T: ArrayScalar>(&self) -> Vec<T> {
        self.values.iter().map(|v| T::from_i64(*v)).collect()
    }
}

/// A flat array of reals, written `( 1.5 2.0 3e-3 )`.
#[derive(Debug, Clone, Default)]
pub struct ArrayReal {
    pub tag: String,
    pub line: usize,
    pub values: Vec<f64>,
}

impl PartialEq for ArrayReal {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && self.values == other.values
    }
}

impl ArrayReal {
    pub fn new(tag: impl Into<String>, values: Vec<f64>) -> Self {
        ArrayReal {
            tag: tag.into(),
            line: 0,
            values,
        }
    }

    pub fn into_ref(self) -> ArrayRealRef {
        Rc::new(RefCell::new(self))
    }

    /// Replace the contents with `src`, widened to `f64`.
    pub fn copy_from<T: ArrayScalar>(&mut self, src: &[T]) {
        self.values = src.iter().map(|v| v.to_f64()).collect();
    }

    /// Copy into `dst`, converting each element; returns the number copied.
    pub fn copy_to<T: ArrayScalar>(&self, dst: &mut [T]) -> usize {
        let n = dst.len().min(self.values.len());
        for (d, s) in dst.iter_mut().zip(&self.values) {
            *d = T::from_f64(*s);
        }
        n
    }

    pub fn to_vec<T: ArrayScalar>(&self) -> Vec<T> {
        self.values.iter().map(|v| T::from_f64(*v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structure_lookup_returns_first_duplicate() {
        let mut s = Structure::new("<Foo>");
        s.push("a", Value::integer(1));
        s.push("a", Value::integer(2));
        assert_eq!(s.value("a").and_then(Value::as_integer), Some(1));
        assert_eq!(s.values("a").count(), 2);
    }

    #[test]
    fn structure_value_mut_edits_first_match() {
        let mut s = Structure::new("<Foo>");
        s.push("a", Value::integer(1));
        s.push("a", Value::integer(2));
        assert!(s.has_key("a"));
        assert!(!s.has_key("b"));

        *s.value_mut("a").unwrap() = Value::string("x");
        let values: Vec<_> = s.values("a").collect();
        assert_eq!(values[0].as_str(), Some("x"));
        assert_eq!(values[1].as_integer(), Some(2));
        assert!(s.value_mut("b").is_none());
    }

    #[test]
    fn weak_uid_link_does_not_keep_structure_alive() {
        let target = Structure::with_uid("<T>", "#t").into_ref();
        let mut uid = UidRef::new("#t");
        uid.resolve(&target);
        assert!(uid.is_resolved());
        drop(target);
        assert!(!uid.is_resolved());
    }

    #[test]
    fn array_copy_narrows_and_widens() {
        let mut a = ArrayReal::default();
        a.copy_from(&[1.5f32, 2.25f32]);
        assert_eq!(a.values, vec![1.5, 2.25]);
        let mut ints = [0i32; 2];
        assert_eq!(a.copy_to(&mut ints), 2);
        assert_eq!(ints, [1, 2]);

        let mut b = ArrayInteger::default();
        b.copy_from(&[7u8, 255u8]);
        assert_eq!(b.to_vec::<f32>(), vec![7.0, 255.0]);
    }

    #[test]
    fn node_id_is_stable_per_handle() {
        let s = Structure::new("<A>").into_ref();
        let alias = Rc::clone(&s);
        assert_eq!(NodeId::of(&s), NodeId::of(&alias));
        assert_ne!(NodeId::of(&s), NodeId::of(&Structure::new("<A>").into_ref()));
    }
}
