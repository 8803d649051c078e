//! The low-level, runtime-checked document encoder.
//!
//! `CoreBuilder` appends typed elements into a single growable buffer and
//! keeps a stack of open scopes so nested length prefixes can be back-patched
//! once their byte extent is known. Sequencing violations (a value with no
//! pending key at document level, closing the wrong scope kind, appending
//! after finalization) are reported as errors and never produce a corrupt
//! buffer. The typed wrappers in [`crate::builder::stream`] push most of
//! these checks to compile time.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use log::trace;

use crate::document::{Array, Document, DocumentView};
use crate::err::{Error, Result};
use crate::value::{Value, tag};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Document,
    Array,
}

impl ScopeKind {
    fn name(self) -> &'static str {
        match self {
            ScopeKind::Document => "document",
            ScopeKind::Array => "array",
        }
    }
}

#[derive(Debug)]
struct Scope {
    /// Offset of this scope's 4-byte length prefix within the buffer.
    len_offset: usize,
    kind: ScopeKind,
    /// Next auto-generated index key, for array scopes.
    index: u32,
}

#[derive(Debug)]
pub struct CoreBuilder {
    buf: Vec<u8>,
    stack: Vec<Scope>,
    pending_key: Option<String>,
    finished: bool,
}

impl CoreBuilder {
    /// A builder rooted at a document; the initial state expects a key.
    pub fn new_document() -> CoreBuilder {
        CoreBuilder::new(ScopeKind::Document)
    }

    /// A builder rooted at an array; the initial state expects a value.
    pub fn new_array() -> CoreBuilder {
        CoreBuilder::new(ScopeKind::Array)
    }

    fn new(kind: ScopeKind) -> CoreBuilder {
        let mut buf = Vec::with_capacity(64);
        // Reserved for the root length prefix, patched on finalize.
        buf.extend_from_slice(&[0, 0, 0, 0]);
        CoreBuilder {
            buf,
            stack: vec![Scope {
                len_offset: 0,
                kind,
                index: 0,
            }],
            pending_key: None,
            finished: false,
        }
    }

    /// Stages `key` for the next appended value.
    ///
    /// Only legal at document level with no other key pending.
    pub fn key(&mut self, key: &str) -> Result<()> {
        self.check_open()?;
        if self.top().kind != ScopeKind::Document {
            // Array scopes generate their own index keys.
            return Err(Error::ScopeMismatch {
                open: "array",
                requested: "document key",
            });
        }
        if let Some(pending) = &self.pending_key {
            return Err(Error::ExpectedValue {
                key: pending.clone(),
            });
        }
        if key.as_bytes().contains(&0) {
            return Err(Error::InvalidKey {
                key: key.to_owned(),
            });
        }
        self.pending_key = Some(key.to_owned());
        Ok(())
    }

    pub fn append_f64(&mut self, value: f64) -> Result<()> {
        self.begin_element(tag::DOUBLE)?;
        self.buf.write_f64::<LittleEndian>(value)?;
        Ok(())
    }

    pub fn append_str(&mut self, value: &str) -> Result<()> {
        self.begin_element(tag::STRING)?;
        self.buf
            .write_i32::<LittleEndian>(value.len() as i32 + 1)?;
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.push(0);
        Ok(())
    }

    pub fn append_bool(&mut self, value: bool) -> Result<()> {
        self.begin_element(tag::BOOL)?;
        self.buf.push(u8::from(value));
        Ok(())
    }

    /// Milliseconds since the UNIX epoch, UTC.
    pub fn append_datetime(&mut self, millis: i64) -> Result<()> {
        self.begin_element(tag::DATE_TIME)?;
        self.buf.write_i64::<LittleEndian>(millis)?;
        Ok(())
    }

    pub fn append_null(&mut self) -> Result<()> {
        self.begin_element(tag::NULL)?;
        Ok(())
    }

    pub fn append_i32(&mut self, value: i32) -> Result<()> {
        self.begin_element(tag::INT32)?;
        self.buf.write_i32::<LittleEndian>(value)?;
        Ok(())
    }

    pub fn append_i64(&mut self, value: i64) -> Result<()> {
        self.begin_element(tag::INT64)?;
        self.buf.write_i64::<LittleEndian>(value)?;
        Ok(())
    }

    pub fn append_binary(&mut self, subtype: u8, bytes: &[u8]) -> Result<()> {
        self.begin_element(tag::BINARY)?;
        self.buf.write_i32::<LittleEndian>(bytes.len() as i32)?;
        self.buf.push(subtype);
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Embeds an already-finalized document blob.
    pub fn append_document(&mut self, value: DocumentView<'_>) -> Result<()> {
        self.begin_element(tag::DOCUMENT)?;
        self.buf.extend_from_slice(value.as_bytes());
        Ok(())
    }

    /// Embeds an already-finalized array blob.
    pub fn append_array(&mut self, value: crate::document::ArrayView<'_>) -> Result<()> {
        self.begin_element(tag::ARRAY)?;
        self.buf.extend_from_slice(value.as_bytes());
        Ok(())
    }

    /// Appends any decoded [`Value`], re-encoding it in place.
    pub fn append_value(&mut self, value: Value<'_>) -> Result<()> {
        match value {
            Value::Double(v) => self.append_f64(v),
            Value::String(v) => self.append_str(v),
            Value::Document(v) => self.append_document(v),
            Value::Array(v) => self.append_array(v),
            Value::Binary { subtype, bytes } => self.append_binary(subtype, bytes),
            Value::Bool(v) => self.append_bool(v),
            Value::DateTime(v) => self.append_datetime(v),
            Value::Null => self.append_null(),
            Value::Int32(v) => self.append_i32(v),
            Value::Int64(v) => self.append_i64(v),
        }
    }

    /// Opens a nested document scope in value position.
    pub fn open_document(&mut self) -> Result<()> {
        self.open_scope(ScopeKind::Document)
    }

    /// Opens a nested array scope in value position.
    pub fn open_array(&mut self) -> Result<()> {
        self.open_scope(ScopeKind::Array)
    }

    fn open_scope(&mut self, kind: ScopeKind) -> Result<()> {
        let element_tag = match kind {
            ScopeKind::Document => tag::DOCUMENT,
            ScopeKind::Array => tag::ARRAY,
        };
        self.begin_element(element_tag)?;
        trace!(
            "opening {} scope at offset {}, depth {}",
            kind.name(),
            self.buf.len(),
            self.stack.len()
        );
        self.stack.push(Scope {
            len_offset: self.buf.len(),
            kind,
            index: 0,
        });
        self.buf.extend_from_slice(&[0, 0, 0, 0]);
        Ok(())
    }

    pub fn close_document(&mut self) -> Result<()> {
        self.close_scope(ScopeKind::Document)
    }

    pub fn close_array(&mut self) -> Result<()> {
        self.close_scope(ScopeKind::Array)
    }

    fn close_scope(&mut self, kind: ScopeKind) -> Result<()> {
        self.check_open()?;
        if self.stack.len() == 1 {
            // The root scope is closed by `extract`/`view`, not explicitly.
            return Err(Error::NoOpenScope);
        }
        if let Some(pending) = &self.pending_key {
            return Err(Error::ExpectedValue {
                key: pending.clone(),
            });
        }
        if self.top().kind != kind {
            return Err(Error::ScopeMismatch {
                open: self.top().kind.name(),
                requested: kind.name(),
            });
        }

        let scope = self.stack.pop().unwrap();
        self.buf.push(0);
        let extent = self.buf.len() - scope.len_offset;
        LittleEndian::write_i32(
            &mut self.buf[scope.len_offset..scope.len_offset + 4],
            extent as i32,
        );
        trace!("closed {} scope, extent {} bytes", kind.name(), extent);
        Ok(())
    }

    /// True when only the root scope remains open and no key is pending.
    pub fn is_complete(&self) -> bool {
        !self.finished && self.stack.len() == 1 && self.pending_key.is_none()
    }

    /// Terminates the root scope and patches its length prefix. Idempotent.
    fn finalize(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        if self.stack.len() > 1 {
            return Err(Error::UnclosedScopes {
                depth: self.stack.len() - 1,
            });
        }
        if let Some(pending) = &self.pending_key {
            return Err(Error::ExpectedValue {
                key: pending.clone(),
            });
        }
        self.buf.push(0);
        let extent = self.buf.len();
        LittleEndian::write_i32(&mut self.buf[0..4], extent as i32);
        self.finished = true;
        Ok(())
    }

    /// Borrows the finalized bytes without giving up the buffer.
    ///
    /// Once viewed, the builder accepts no further appends.
    pub fn view(&mut self) -> Result<DocumentView<'_>> {
        self.finalize()?;
        Ok(DocumentView::from_bytes_unchecked(&self.buf))
    }

    /// One-time, move-only extraction of the finished buffer.
    pub fn extract_document(mut self) -> Result<Document> {
        if self.root_kind() != ScopeKind::Document {
            return Err(Error::ScopeMismatch {
                open: "array",
                requested: "document",
            });
        }
        self.finalize()?;
        Ok(Document::from_vec_unchecked(self.buf))
    }

    pub fn extract_array(mut self) -> Result<Array> {
        if self.root_kind() != ScopeKind::Array {
            return Err(Error::ScopeMismatch {
                open: "document",
                requested: "array",
            });
        }
        self.finalize()?;
        Ok(Array::from_vec_unchecked(self.buf))
    }

    fn root_kind(&self) -> ScopeKind {
        self.stack[0].kind
    }

    fn top(&self) -> &Scope {
        self.stack.last().expect("stack always has a root scope")
    }

    fn check_open(&self) -> Result<()> {
        if self.finished {
            return Err(Error::BuilderFinished);
        }
        Ok(())
    }

    /// Writes the element header (tag + key cstring) for the next value.
    fn begin_element(&mut self, element_tag: u8) -> Result<()> {
        self.check_open()?;
        match self.top().kind {
            ScopeKind::Document => {
                let key = self.pending_key.take().ok_or(Error::ExpectedKey)?;
                self.buf.push(element_tag);
                self.buf.extend_from_slice(key.as_bytes());
                self.buf.push(0);
            }
            ScopeKind::Array => {
                let index = self.top().index;
                self.stack.last_mut().unwrap().index += 1;
                self.buf.push(element_tag);
                self.buf.extend_from_slice(index.to_string().as_bytes());
                self.buf.push(0);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensure_env_logger_initialized;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_document() {
        let core = CoreBuilder::new_document();
        let doc = core.extract_document().unwrap();
        assert_eq!(doc.as_bytes(), &[5, 0, 0, 0, 0]);
    }

    #[test]
    fn test_known_hello_world_bytes() {
        ensure_env_logger_initialized();
        let mut core = CoreBuilder::new_document();
        core.key("hello").unwrap();
        core.append_str("world").unwrap();
        let doc = core.extract_document().unwrap();
        assert_eq!(
            doc.as_bytes(),
            &[
                0x16, 0x00, 0x00, 0x00, 0x02, b'h', b'e', b'l', b'l', b'o', 0x00, 0x06, 0x00, 0x00,
                0x00, b'w', b'o', b'r', b'l', b'd', 0x00, 0x00,
            ]
        );
    }

    #[test]
    fn test_nested_lengths_are_back_patched() {
        let mut core = CoreBuilder::new_document();
        core.key("outer").unwrap();
        core.open_document().unwrap();
        core.key("inner").unwrap();
        core.open_array().unwrap();
        core.append_i32(1).unwrap();
        core.append_i32(2).unwrap();
        core.close_array().unwrap();
        core.close_document().unwrap();
        let doc = core.extract_document().unwrap();

        // Every nested prefix must equal its scope's byte extent; the
        // validation walk asserts exactly that.
        crate::document::validate_document(doc.as_bytes()).unwrap();

        let outer = doc.as_view().get("outer").unwrap().as_document().unwrap();
        let inner = outer.get("inner").unwrap();
        let values: Vec<_> = inner
            .as_array()
            .unwrap()
            .values()
            .map(|v| v.unwrap())
            .collect();
        assert_eq!(values, vec![Value::Int32(1), Value::Int32(2)]);
    }

    #[test]
    fn test_array_keys_auto_increment() {
        let mut core = CoreBuilder::new_array();
        for i in 0..12 {
            core.append_i32(i).unwrap();
        }
        let arr = core.extract_array().unwrap();
        let keys: Vec<String> = arr
            .as_view()
            .as_document_view()
            .iter()
            .map(|el| el.unwrap().0.to_owned())
            .collect();
        assert_eq!(keys[0], "0");
        assert_eq!(keys[9], "9");
        assert_eq!(keys[10], "10");
        assert_eq!(keys[11], "11");
    }

    #[test]
    fn test_value_without_key_is_rejected() {
        let mut core = CoreBuilder::new_document();
        assert!(matches!(core.append_i32(1), Err(Error::ExpectedKey)));
        // The buffer must not have been touched.
        core.key("a").unwrap();
        core.append_i32(1).unwrap();
        let doc = core.extract_document().unwrap();
        crate::document::validate_document(doc.as_bytes()).unwrap();
    }

    #[test]
    fn test_two_keys_in_a_row_is_rejected() {
        let mut core = CoreBuilder::new_document();
        core.key("a").unwrap();
        assert!(matches!(
            core.key("b"),
            Err(Error::ExpectedValue { key }) if key == "a"
        ));
    }

    #[test]
    fn test_close_without_open_is_rejected() {
        let mut core = CoreBuilder::new_document();
        assert!(matches!(core.close_document(), Err(Error::NoOpenScope)));
    }

    #[test]
    fn test_mismatched_close_is_rejected() {
        let mut core = CoreBuilder::new_document();
        core.key("a").unwrap();
        core.open_array().unwrap();
        assert!(matches!(
            core.close_document(),
            Err(Error::ScopeMismatch { .. })
        ));
    }

    #[test]
    fn test_extract_with_open_scope_is_rejected() {
        let mut core = CoreBuilder::new_document();
        core.key("a").unwrap();
        core.open_document().unwrap();
        assert!(matches!(
            core.extract_document(),
            Err(Error::UnclosedScopes { depth: 1 })
        ));
    }

    #[test]
    fn test_interior_nul_key_is_rejected() {
        let mut core = CoreBuilder::new_document();
        assert!(matches!(core.key("a\0b"), Err(Error::InvalidKey { .. })));
    }

    #[test]
    fn test_duplicate_keys_round_trip() {
        let mut core = CoreBuilder::new_document();
        core.key("k").unwrap();
        core.append_i32(1).unwrap();
        core.key("k").unwrap();
        core.append_i32(2).unwrap();
        let doc = core.extract_document().unwrap();

        let elements: Vec<_> = doc.as_view().iter().map(|el| el.unwrap()).collect();
        assert_eq!(
            elements,
            vec![("k", Value::Int32(1)), ("k", Value::Int32(2))]
        );
    }

    #[test]
    fn test_view_then_append_is_rejected() {
        let mut core = CoreBuilder::new_document();
        core.key("a").unwrap();
        core.append_bool(true).unwrap();
        assert_eq!(core.view().unwrap().get("a"), Some(Value::Bool(true)));
        assert!(matches!(core.key("b"), Err(Error::BuilderFinished)));
    }
}
