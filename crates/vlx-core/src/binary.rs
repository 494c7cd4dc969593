//! Binary VLX encoding.
//!
//! ## Wire Format
//!
//! ```text
//! magic     AB 'V' 'L' 'X' BB 0D 0A 1A 0A
//! version   u16 LE (100)
//! encoding  "ascii" NUL
//! flags     u32 LE (0)
//! root      Structure chunk
//! ```
//!
//! Every node starts with a 1-byte chunk kind:
//!
//! | Kind | Chunk | Payload |
//! |------|-------|---------|
//! | 1 | Structure | tag, uid, varint count, count × (key, chunk) |
//! | 2 | List | tag, varint count, count × chunk |
//! | 3 | ArrayRealDouble | tag, varint count, count × f64 LE |
//! | 4 | ArrayRealFloat | tag, varint count, count × f32 LE |
//! | 5 | ArrayInteger | tag, varint count, varint byte length, varints |
//! | 6 | Rawtext | tag, text |
//! | 7 | String | text |
//! | 8 | Identifier | text |
//! | 9 | UID | text |
//! | 10 | RealDouble | f64 LE |
//! | 11 | Integer | varint |
//! | 12 | Bool | 1 byte |
//!
//! Strings (tags, uids, keys, text) are a varint byte length followed by the
//! raw UTF-8 bytes. Integers use the signed varint codec from
//! [`crate::varint`].
//!
//! Real arrays are written as float32 when every element survives the
//! `f64 → f32 → f64` trip unchanged, and as float64 otherwise. Readers accept
//! both and always produce `f64` elements.

use crate::collector::{collect_uid_usage, UidUsage};
use crate::error::{Result, VlxError};
use crate::parser::{VLX_ENCODING, VLX_VERSION};
use crate::value::{
    ArrayInteger, ArrayIntegerRef, ArrayReal, ArrayRealRef, List, ListRef, NodeId, Payload,
    RawtextBlock, RawtextRef, Structure, StructureRef, UidRef, Value, NULL_UID,
};
use crate::varint::{decode_varint, encode_varint};
use crate::visitor::{VisitedSet, Visitor};

/// File signature. The CR/LF/EOF bytes expose text-mode transfer damage the
/// same way the PNG signature does.
pub const MAGIC: [u8; 9] = [0xAB, b'V', b'L', b'X', 0xBB, 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChunkKind {
    Structure = 1,
    List = 2,
    ArrayRealDouble = 3,
    ArrayRealFloat = 4,
    ArrayInteger = 5,
    Rawtext = 6,
    String = 7,
    Identifier = 8,
    Uid = 9,
    RealDouble = 10,
    Integer = 11,
    Bool = 12,
}

impl TryFrom<u8> for ChunkKind {
    type Error = VlxError;

    fn try_from(byte: u8) -> Result<Self> {
        let kind = match byte {
            1 => ChunkKind::Structure,
            2 => ChunkKind::List,
            3 => ChunkKind::ArrayRealDouble,
            4 => ChunkKind::ArrayRealFloat,
            5 => ChunkKind::ArrayInteger,
            6 => ChunkKind::Rawtext,
            7 => ChunkKind::String,
            8 => ChunkKind::Identifier,
            9 => ChunkKind::Uid,
            10 => ChunkKind::RealDouble,
            11 => ChunkKind::Integer,
            12 => ChunkKind::Bool,
            other => {
                return Err(VlxError::BinaryDecode(format!(
                    "unknown chunk kind {other}"
                )))
            }
        };
        Ok(kind)
    }
}

/// Whether `bytes` starts with the binary VLX signature.
pub fn is_binary(bytes: &[u8]) -> bool {
    bytes.starts_with(&MAGIC)
}

/// Export `root`, writing uids only where referenced.
pub fn export_binary(root: &StructureRef) -> Vec<u8> {
    let usage = collect_uid_usage(root);
    export_binary_with(root, Some(&usage))
}

/// Export `root`; `usage: None` writes every uid.
pub fn export_binary_with(root: &StructureRef, usage: Option<&UidUsage>) -> Vec<u8> {
    let mut exporter = BinaryExporter::new(usage);
    exporter.write_header();
    exporter.visit_structure(root);
    exporter.out
}

/// Visitor that appends chunks to a byte buffer.
///
/// Call [`BinaryExporter::write_header`] first, then visit the root structure.
pub struct BinaryExporter<'a> {
    usage: Option<&'a UidUsage>,
    visited: VisitedSet,
    out: Vec<u8>,
}

impl<'a> BinaryExporter<'a> {
    /// A new exporter. With `usage`, only referenced uids are written; `None`
    /// writes every uid.
    pub fn new(usage: Option<&'a UidUsage>) -> Self {
        BinaryExporter {
            usage,
            visited: VisitedSet::new(),
            out: Vec::new(),
        }
    }

    /// The encoded document.
    pub fn into_bytes(self) -> Vec<u8> {
        self.out
    }

    /// Magic, version, encoding name and the (zero) flags word.
    pub fn write_header(&mut self) {
        self.out.extend_from_slice(&MAGIC);
        self.out
            .extend_from_slice(&(VLX_VERSION as u16).to_le_bytes());
        self.out.extend_from_slice(VLX_ENCODING.as_bytes());
        self.out.push(0);
        self.out.extend_from_slice(&0u32.to_le_bytes());
    }

    fn is_used(&self, uid: &str) -> bool {
        match self.usage {
            Some(usage) => usage.get(uid).copied().unwrap_or(0) > 0,
            None => true,
        }
    }

    fn write_kind(&mut self, kind: ChunkKind) {
        self.out.push(kind as u8);
    }

    fn write_count(&mut self, n: usize) {
        encode_varint(n as i64, &mut self.out);
    }

    fn write_string(&mut self, s: &str) {
        self.write_count(s.len());
        self.out.extend_from_slice(s.as_bytes());
    }

    fn write_value(&mut self, value: &Value) {
        match value.payload() {
            Payload::Bool(b) => {
                self.write_kind(ChunkKind::Bool);
                self.out.push(u8::from(*b));
            }
            Payload::Integer(i) => {
                self.write_kind(ChunkKind::Integer);
                encode_varint(*i, &mut self.out);
            }
            Payload::Real(r) => {
                self.write_kind(ChunkKind::RealDouble);
                self.out.extend_from_slice(&r.to_le_bytes());
            }
            Payload::String(s) => {
                self.write_kind(ChunkKind::String);
                self.write_string(s);
            }
            Payload::Identifier(s) => {
                self.write_kind(ChunkKind::Identifier);
                self.write_string(s);
            }
            Payload::Uid(uid) => {
                self.write_kind(ChunkKind::Uid);
                self.write_string(&uid.id);
            }
            _ => value.accept(self),
        }
    }
}

impl Visitor for BinaryExporter<'_> {
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
            self.write_kind(ChunkKind::Uid);
            self.write_string(&s.uid);
            return;
        }

        let s = structure.borrow();
        self.write_kind(ChunkKind::Structure);
        self.write_string(&s.tag);
        if s.has_uid() && self.is_used(&s.uid) {
            self.write_string(&s.uid);
        } else {
            self.write_string(NULL_UID);
        }
        self.write_count(s.pairs.len());
        for kv in &s.pairs {
            self.write_string(&kv.key);
            self.write_value(&kv.value);
        }
    }

    fn visit_list(&mut self, list: &ListRef) {
        if self.is_visited(NodeId::of(list)) {
            let l = list.borrow();
            log::warn!("list {} reached again; written as an empty list", l.tag);
            self.write_kind(ChunkKind::List);
            self.write_string(&l.tag);
            self.write_count(0);
            return;
        }

        let l = list.borrow();
        self.write_kind(ChunkKind::List);
        self.write_string(&l.tag);
        self.write_count(l.values.len());
        for value in &l.values {
            self.write_value(value);
        }
    }

    fn visit_rawtext_block(&mut self, block: &RawtextRef) {
        let b = block.borrow();
        self.write_kind(ChunkKind::Rawtext);
        self.write_string(&b.tag);
        self.write_string(&b.text);
    }

    fn visit_array_integer(&mut self, array: &ArrayIntegerRef) {
        let a = array.borrow();
        let mut encoded = Vec::with_capacity(a.values.len());
        for v in &a.values {
            encode_varint(*v, &mut encoded);
        }
        self.write_kind(ChunkKind::ArrayInteger);
        self.write_string(&a.tag);
        self.write_count(a.values.len());
        self.write_count(encoded.len());
        self.out.extend_from_slice(&encoded);
    }

    fn visit_array_real(&mut self, array: &ArrayRealRef) {
        let a = array.borrow();
        let fits_f32 = a.values.iter().all(|v| f64::from(*v as f32) == *v);
        if fits_f32 {
            self.write_kind(ChunkKind::ArrayRealFloat);
            self.write_string(&a.tag);
            self.write_count(a.values.len());
            for v in &a.values {
                self.out.extend_from_slice(&(*v as f32).to_le_bytes());
            }
        } else {
            self.write_kind(ChunkKind::ArrayRealDouble);
            self.write_string(&a.tag);
            self.write_count(a.values.len());
            for v in &a.values {
                self.out.extend_from_slice(&v.to_le_bytes());
            }
        }
    }
}

/// Decode a binary VLX document and return its root structure.
pub fn import_binary(bytes: &[u8]) -> Result<StructureRef> {
    let mut importer = BinaryImporter::new(bytes);
    importer.read_header()?;
    let root = match ChunkKind::try_from(importer.read_u8()?)? {
        ChunkKind::Structure => importer.read_structure()?,
        other => {
            return Err(VlxError::BinaryDecode(format!(
                "root chunk is {other:?}, expected Structure"
            )))
        }
    };
    if importer.pos != bytes.len() {
        return Err(VlxError::BinaryDecode(format!(
            "{} trailing bytes after root structure",
            bytes.len() - importer.pos
        )));
    }
    Ok(root)
}

struct BinaryImporter<'a> {
    bytes: &'a [u8],
    pos: usize,
}

fn truncated() -> VlxError {
    VlxError::BinaryDecode("unexpected end of data".into())
}

impl<'a> BinaryImporter<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        BinaryImporter { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or_else(truncated)?;
        let slice = self.bytes.get(self.pos..end).ok_or_else(truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    fn read_header(&mut self) -> Result<()> {
        if self.take(MAGIC.len()).ok() != Some(&MAGIC[..]) {
            return Err(VlxError::BinaryDecode("bad magic".into()));
        }
        let version = u16::from_le_bytes(self.read_array()?);
        if i64::from(version) != VLX_VERSION {
            return Err(VlxError::BinaryDecode(format!(
                "version {version} not supported"
            )));
        }
        let rest = &self.bytes[self.pos..];
        let nul = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(truncated)?;
        let encoding = &rest[..nul];
        if encoding != VLX_ENCODING.as_bytes() {
            return Err(VlxError::BinaryDecode(format!(
                "encoding '{}' not supported",
                String::from_utf8_lossy(encoding)
            )));
        }
        self.pos += nul + 1;
        // Reserved flags.
        self.read_array::<4>()?;
        Ok(())
    }

    fn read_varint(&mut self) -> Result<i64> {
        decode_varint(self.bytes, &mut self.pos)
    }

    fn read_count(&mut self) -> Result<usize> {
        let n = self.read_varint()?;
        usize::try_from(n).map_err(|_| VlxError::BinaryDecode(format!("negative count {n}")))
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.read_count()?;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec())
            .map_err(|_| VlxError::BinaryDecode("invalid UTF-8 string data".into()))
    }

    /// Capacity hint that cannot exceed what the remaining input could hold.
    fn capacity(&self, count: usize) -> usize {
        count.min(self.bytes.len() - self.pos)
    }

    fn read_value(&mut self) -> Result<Value> {
        let payload = match ChunkKind::try_from(self.read_u8()?)? {
            ChunkKind::Structure => Payload::Structure(self.read_structure()?),
            ChunkKind::List => {
                let mut list = List::new(self.read_string()?);
                let count = self.read_count()?;
                list.values.reserve(self.capacity(count));
                for _ in 0..count {
                    list.values.push(self.read_value()?);
                }
                Payload::List(list.into_ref())
            }
            ChunkKind::ArrayRealDouble => {
                let tag = self.read_string()?;
                let count = self.read_count()?;
                let mut values = Vec::with_capacity(self.capacity(count));
                for _ in 0..count {
                    values.push(f64::from_le_bytes(self.read_array()?));
                }
                Payload::ArrayReal(ArrayReal::new(tag, values).into_ref())
            }
            ChunkKind::ArrayRealFloat => {
                let tag = self.read_string()?;
                let count = self.read_count()?;
                let mut values = Vec::with_capacity(self.capacity(count));
                for _ in 0..count {
                    values.push(f64::from(f32::from_le_bytes(self.read_array()?)));
                }
                Payload::ArrayReal(ArrayReal::new(tag, values).into_ref())
            }
            ChunkKind::ArrayInteger => {
                let tag = self.read_string()?;
                let count = self.read_count()?;
                let byte_len = self.read_count()?;
                let end = self.pos.checked_add(byte_len).ok_or_else(truncated)?;
                if end > self.bytes.len() {
                    return Err(truncated());
                }
                let mut values = Vec::with_capacity(self.capacity(count));
                for _ in 0..count {
                    values.push(self.read_varint()?);
                }
                if self.pos != end {
                    return Err(VlxError::BinaryDecode(format!(
                        "integer array length mismatch: expected {byte_len} bytes"
                    )));
                }
                Payload::ArrayInteger(ArrayInteger::new(tag, values).into_ref())
            }
            ChunkKind::Rawtext => {
                let tag = self.read_string()?;
                let text = self.read_string()?;
                Payload::RawtextBlock(RawtextBlock::new(tag, text).into_ref())
            }
            ChunkKind::String => Payload::String(self.read_string()?),
            ChunkKind::Identifier => Payload::Identifier(self.read_string()?),
            ChunkKind::Uid => Payload::Uid(UidRef::new(self.read_string()?)),
            ChunkKind::RealDouble => Payload::Real(f64::from_le_bytes(self.read_array()?)),
            ChunkKind::Integer => Payload::Integer(self.read_varint()?),
            ChunkKind::Bool => Payload::Bool(self.read_u8()? != 0),
        };
        Ok(Value::new(payload))
    }

    /// Read a structure body; the chunk kind byte has been consumed.
    fn read_structure(&mut self) -> Result<StructureRef> {
        let tag = self.read_string()?;
        let uid = self.read_string()?;
        let mut structure = Structure::with_uid(tag, uid);
        let count = self.read_count()?;
        structure.pairs.reserve(self.capacity(count));
        for _ in 0..count {
            let key = self.read_string()?;
            let value = self.read_value()?;
            structure.push(key, value);
        }
        Ok(structure.into_ref())
    }
}
