//! Load/save orchestration between documents and domain objects.
//!
//! Loading runs parse → link → import; saving runs export → UID usage →
//! write. The mapping between a structure tag and the code that builds a
//! domain object from it (and back) lives in a caller-owned [`Registry`].
//!
//! # Key design decisions
//!
//! - **Identity caches**: each domain object is exported to exactly one
//!   structure and each structure is imported into exactly one object. A
//!   second export of the same object returns the same structure, gives it a
//!   generated uid if it has none, and the writers emit it as a `#uid`
//!   reference.
//! - **Sticky first error**: the first import or export failure is logged and
//!   kept. Every later call in the same session fails immediately with that
//!   same error, so one bad node does not flood the log.
//! - **Early registration**: importers and exporters of cyclic object graphs
//!   call [`Serializer::register_imported`] / [`Serializer::register_exported`]
//!   before recursing, so a back-reference hits the cache instead of
//!   recursing forever.

use std::any::Any;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use crate::binary::{export_binary, import_binary, is_binary};
use crate::error::{Result, VlxError};
use crate::linker::link;
use crate::parser::parse_text;
use crate::text_export::export_text;
use crate::value::{NodeId, StructureRef, Value};

/// A domain object that can be written to and read from a document.
pub trait Object: Any {
    /// The registry key for this object's type, e.g. `"<Mesh>"`.
    fn type_tag(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}

pub type ObjectRef = Rc<dyn Object>;

pub type ImportFn = dyn Fn(&mut Serializer<'_>, &StructureRef) -> Result<ObjectRef>;
pub type ExportFn = dyn Fn(&mut Serializer<'_>, &ObjectRef) -> Result<StructureRef>;

/// The import/export pair registered for one type tag.
pub struct ClassWrapper {
    import: Box<ImportFn>,
    export: Box<ExportFn>,
}

/// Type tag → import/export callables. Built by the caller and lent to each
/// [`Serializer`].
#[derive(Default)]
pub struct Registry {
    wrappers: HashMap<String, ClassWrapper>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handlers for `type_tag`.
    pub fn register<I, E>(&mut self, type_tag: impl Into<String>, import: I, export: E)
    where
        I: Fn(&mut Serializer<'_>, &StructureRef) -> Result<ObjectRef> + 'static,
        E: Fn(&mut Serializer<'_>, &ObjectRef) -> Result<StructureRef> + 'static,
    {
        self.wrappers.insert(
            type_tag.into(),
            ClassWrapper {
                import: Box::new(import),
                export: Box::new(export),
            },
        );
    }

    pub fn get(&self, type_tag: &str) -> Option<&ClassWrapper> {
        self.wrappers.get(type_tag)
    }

    pub fn contains(&self, type_tag: &str) -> bool {
        self.wrappers.contains_key(type_tag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializerStatus {
    NoError,
    ImportError,
    ExportError,
}

fn object_key(object: &ObjectRef) -> usize {
    Rc::as_ptr(object).cast::<()>() as usize
}

/// The bare message of a handler error, so nested failures are not
/// prefixed twice.
fn error_message(err: VlxError) -> String {
    match err {
        VlxError::Import(message) | VlxError::Export(message) => message,
        other => other.to_string(),
    }
}

/// `"<Mesh>"` → `"mesh_"`.
fn uid_prefix(tag: &str) -> String {
    let name = tag.trim_start_matches('<').trim_end_matches('>');
    if name.is_empty() {
        String::new()
    } else {
        format!("{}_", name.to_ascii_lowercase())
    }
}

pub struct Serializer<'r> {
    registry: &'r Registry,
    imported: HashMap<NodeId, (StructureRef, ObjectRef)>,
    exported: HashMap<usize, (ObjectRef, StructureRef)>,
    uid_counter: u64,
    status: SerializerStatus,
    first_error: Option<String>,
}

impl<'r> Serializer<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Serializer {
            registry,
            imported: HashMap::new(),
            exported: HashMap::new(),
            uid_counter: 0,
            status: SerializerStatus::NoError,
            first_error: None,
        }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn status(&self) -> SerializerStatus {
        self.status
    }

    /// The message of the first error in this session.
    pub fn first_error(&self) -> Option<&str> {
        self.first_error.as_deref()
    }

    /// Forget caches, uid counter, and error state.
    pub fn reset(&mut self) {
        self.imported.clear();
        self.exported.clear();
        self.uid_counter = 0;
        self.status = SerializerStatus::NoError;
        self.first_error = None;
    }

    /// `#<prefix>id<n>` with a counter that only grows within a session.
    pub fn generate_uid(&mut self, prefix: &str) -> String {
        let uid = format!("#{prefix}id{}", self.uid_counter);
        self.uid_counter += 1;
        uid
    }

    pub fn signal_import_error(&mut self, message: impl Into<String>) {
        self.signal(SerializerStatus::ImportError, message.into());
    }

    pub fn signal_export_error(&mut self, message: impl Into<String>) {
        self.signal(SerializerStatus::ExportError, message.into());
    }

    fn signal(&mut self, status: SerializerStatus, message: String) {
        if self.status != SerializerStatus::NoError {
            return;
        }
        log::error!("{message}");
        self.status = status;
        self.first_error = Some(message);
    }

    /// The sticky error as a [`VlxError`], if the session has failed.
    fn sticky_error(&self) -> Option<VlxError> {
        let message = self.first_error.clone().unwrap_or_default();
        match self.status {
            SerializerStatus::NoError => None,
            SerializerStatus::ImportError => Some(VlxError::Import(message)),
            SerializerStatus::ExportError => Some(VlxError::Export(message)),
        }
    }

    fn fail_import(&mut self, message: String) -> VlxError {
        self.signal_import_error(message);
        self.sticky_error()
            .unwrap_or_else(|| VlxError::Import("import failed".into()))
    }

    fn fail_export(&mut self, message: String) -> VlxError {
        self.signal_export_error(message);
        self.sticky_error()
            .unwrap_or_else(|| VlxError::Export("export failed".into()))
    }

    pub fn imported_object(&self, structure: &StructureRef) -> Option<ObjectRef> {
        self.imported
            .get(&NodeId::of(structure))
            .map(|(_, object)| Rc::clone(object))
    }

    pub fn exported_structure(&self, object: &ObjectRef) -> Option<StructureRef> {
        self.exported
            .get(&object_key(object))
            .map(|(_, structure)| Rc::clone(structure))
    }

    pub fn register_imported(&mut self, structure: &StructureRef, object: &ObjectRef) {
        self.imported.insert(
            NodeId::of(structure),
            (Rc::clone(structure), Rc::clone(object)),
        );
    }

    pub fn register_exported(&mut self, object: &ObjectRef, structure: &StructureRef) {
        self.exported.insert(
            object_key(object),
            (Rc::clone(object), Rc::clone(structure)),
        );
    }

    /// Import `structure` into a domain object, at most once per structure.
    pub fn import_object(&mut self, structure: &StructureRef) -> Result<ObjectRef> {
        if let Some(err) = self.sticky_error() {
            return Err(err);
        }
        if let Some(object) = self.imported_object(structure) {
            return Ok(object);
        }

        let (tag, line) = {
            let s = structure.borrow();
            (s.tag.clone(), s.line)
        };
        let registry = self.registry;
        let wrapper = match registry.get(&tag) {
            Some(wrapper) => wrapper,
            None => {
                return Err(self.fail_import(format!(
                    "line {line}: no importer registered for {tag}"
                )))
            }
        };

        match (wrapper.import)(self, structure) {
            Ok(object) => {
                if let Some(err) = self.sticky_error() {
                    return Err(err);
                }
                self.register_imported(structure, &object);
                Ok(object)
            }
            Err(err) => Err(self.fail_import(error_message(err))),
        }
    }

    /// Import the structure a value stands for: an inline structure or a
    /// linked `#uid`.
    pub fn import_value(&mut self, value: &Value) -> Result<ObjectRef> {
        match value.resolved_structure() {
            Some(structure) => self.import_object(&structure),
            None => Err(self.fail_import(format!(
                "line {}: expected a structure or a linked UID, found {}",
                value.line(),
                value.value_type()
            ))),
        }
    }

    /// Export `object` into a structure, at most once per object.
    pub fn export_object(&mut self, object: &ObjectRef) -> Result<StructureRef> {
        if let Some(err) = self.sticky_error() {
            return Err(err);
        }
        if let Some(structure) = self.exported_structure(object) {
            // Referenced a second time: it needs an identity now.
            let needs_uid = match structure.try_borrow() {
                Ok(s) => !s.has_uid(),
                Err(_) => {
                    return Err(self.fail_export(format!(
                        "{} is referenced while its structure is being written",
                        object.type_tag()
                    )))
                }
            };
            if needs_uid {
                let uid = self.generate_uid(&uid_prefix(object.type_tag()));
                structure.borrow_mut().set_uid(uid);
            }
            return Ok(structure);
        }

        let registry = self.registry;
        let wrapper = match registry.get(object.type_tag()) {
            Some(wrapper) => wrapper,
            None => {
                return Err(self.fail_export(format!(
                    "no exporter registered for {}",
                    object.type_tag()
                )))
            }
        };

        match (wrapper.export)(self, object) {
            Ok(structure) => {
                if let Some(err) = self.sticky_error() {
                    return Err(err);
                }
                self.register_exported(object, &structure);
                Ok(structure)
            }
            Err(err) => Err(self.fail_export(error_message(err))),
        }
    }

    /// [`Serializer::export_object`] wrapped as a value, ready to store
    /// under a key or in a list.
    pub fn export_value(&mut self, object: &ObjectRef) -> Result<Value> {
        self.export_object(object).map(Value::from)
    }

    /// Start a fresh session and import a linked document root.
    pub fn import_document(&mut self, root: &StructureRef) -> Result<ObjectRef> {
        self.reset();
        self.import_object(root)
    }

    /// Start a fresh session and export `object` as a document root.
    pub fn export_document(&mut self, object: &ObjectRef) -> Result<StructureRef> {
        self.reset();
        self.export_object(object)
    }

    pub fn load_text(&mut self, text: &str) -> Result<ObjectRef> {
        let root = parse_text(text).inspect_err(|err| log::error!("{err}"))?;
        link(&root)?;
        self.import_document(&root)
    }

    pub fn load_binary(&mut self, bytes: &[u8]) -> Result<ObjectRef> {
        let root = import_binary(bytes).inspect_err(|err| log::error!("{err}"))?;
        link(&root)?;
        self.import_document(&root)
    }

    /// Load text or binary, whichever `bytes` holds.
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<ObjectRef> {
        if is_binary(bytes) {
            return self.load_binary(bytes);
        }
        let text = std::str::from_utf8(bytes).map_err(|e| VlxError::Lex {
            line: 0,
            message: format!("input is neither binary VLX nor UTF-8 text: {e}"),
        })?;
        self.load_text(text)
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<ObjectRef> {
        let bytes = std::fs::read(path)?;
        self.load_bytes(&bytes)
    }

    pub fn save_text(&mut self, object: &ObjectRef) -> Result<String> {
        let root = self.export_document(object)?;
        Ok(export_text(&root))
    }

    pub fn save_binary(&mut self, object: &ObjectRef) -> Result<Vec<u8>> {
        let root = self.export_document(object)?;
        Ok(export_binary(&root))
    }

    pub fn save_text_file(&mut self, path: impl AsRef<Path>, object: &ObjectRef) -> Result<()> {
        let text = self.save_text(object)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn save_binary_file(&mut self, path: impl AsRef<Path>, object: &ObjectRef) -> Result<()> {
        let bytes = self.save_binary(object)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_uids_count_up() {
        let registry = Registry::new();
        let mut serializer = Serializer::new(&registry);
        assert_eq!(serializer.generate_uid("mesh_"), "#mesh_id0");
        assert_eq!(serializer.generate_uid(""), "#id1");
        serializer.reset();
        assert_eq!(serializer.generate_uid("x_"), "#x_id0");
    }

    #[test]
    fn uid_prefix_strips_angle_brackets() {
        assert_eq!(uid_prefix("<Mesh>"), "mesh_");
        assert_eq!(uid_prefix(""), "");
    }

    #[test]
    fn only_the_first_error_sticks() {
        let registry = Registry::new();
        let mut serializer = Serializer::new(&registry);
        serializer.signal_export_error("first");
        serializer.signal_import_error("second");
        assert_eq!(serializer.status(), SerializerStatus::ExportError);
        assert_eq!(serializer.first_error(), Some("first"));
    }
}
