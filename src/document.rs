//! Owned and borrowed forms of a finalized binary document.
//!
//! A `Document` owns its buffer and never mutates it once extracted from a
//! builder. `DocumentView` is a cheap, `Copy` reference into a buffer owned
//! elsewhere; iteration decodes elements lazily and in order, duplicate keys
//! included.

use byteorder::{ByteOrder, LittleEndian};

use crate::err::{Error, Result};
use crate::value::{Value, tag};

/// Byte length of the smallest valid document: a length prefix and a NUL.
pub const EMPTY_DOCUMENT_LEN: usize = 5;

/// An owned, immutable, validated document buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    data: Vec<u8>,
}

impl Document {
    /// Takes ownership of `data`, validating the full structure (length
    /// prefixes, terminators, tags, UTF-8) before accepting it.
    pub fn from_bytes(data: Vec<u8>) -> Result<Document> {
        validate_document(&data)?;
        Ok(Document { data })
    }

    /// Buffer produced by our own builder, already structurally sound.
    pub(crate) fn from_vec_unchecked(data: Vec<u8>) -> Document {
        debug_assert!(validate_document(&data).is_ok());
        Document { data }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    pub fn as_view(&self) -> DocumentView<'_> {
        DocumentView { data: &self.data }
    }
}

/// An owned, immutable array buffer (same wire layout as a document, with
/// base-10 indices for keys).
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    data: Vec<u8>,
}

impl Array {
    pub fn from_bytes(data: Vec<u8>) -> Result<Array> {
        validate_document(&data)?;
        Ok(Array { data })
    }

    pub(crate) fn from_vec_unchecked(data: Vec<u8>) -> Array {
        debug_assert!(validate_document(&data).is_ok());
        Array { data }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_view(&self) -> ArrayView<'_> {
        ArrayView(DocumentView { data: &self.data })
    }
}

/// A non-owning, read-only view of a document buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DocumentView<'a> {
    data: &'a [u8],
}

impl<'a> DocumentView<'a> {
    /// Validates `data` and wraps it. Use this for buffers of foreign origin.
    pub fn from_bytes(data: &'a [u8]) -> Result<DocumentView<'a>> {
        validate_document(data)?;
        Ok(DocumentView { data })
    }

    pub(crate) fn from_bytes_unchecked(data: &'a [u8]) -> DocumentView<'a> {
        DocumentView { data }
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    pub fn iter(&self) -> Elements<'a> {
        Elements {
            data: self.data,
            // Skip over the length prefix.
            pos: 4,
            failed: false,
        }
    }

    /// First value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<Value<'a>> {
        for element in self.iter() {
            match element {
                Ok((k, v)) if k == key => return Some(v),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
        None
    }

    pub fn to_document(&self) -> Document {
        Document {
            data: self.data.to_vec(),
        }
    }
}

impl<'a> IntoIterator for DocumentView<'a> {
    type Item = Result<(&'a str, Value<'a>)>;
    type IntoIter = Elements<'a>;

    fn into_iter(self) -> Elements<'a> {
        self.iter()
    }
}

/// A non-owning, read-only view of an array buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrayView<'a>(pub(crate) DocumentView<'a>);

impl<'a> ArrayView<'a> {
    pub fn from_bytes(data: &'a [u8]) -> Result<ArrayView<'a>> {
        Ok(ArrayView(DocumentView::from_bytes(data)?))
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.0.data
    }

    pub fn as_document_view(&self) -> DocumentView<'a> {
        self.0
    }

    /// Iterates over element values, discarding the index keys.
    pub fn values(&self) -> impl Iterator<Item = Result<Value<'a>>> {
        self.0.iter().map(|el| el.map(|(_, v)| v))
    }
}

/// In-order iterator over `(key, value)` pairs of a document level.
pub struct Elements<'a> {
    data: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> Iterator for Elements<'a> {
    type Item = Result<(&'a str, Value<'a>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.data.len() {
            return None;
        }

        if self.data[self.pos] == 0 {
            // Terminator; iteration is complete.
            return None;
        }

        match read_element(self.data, self.pos) {
            Ok((key, value, next_pos)) => {
                self.pos = next_pos;
                Some(Ok((key, value)))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

fn eof(offset: usize, t: &'static str) -> Error {
    Error::UnexpectedEof { offset, t }
}

fn read_i32_at(data: &[u8], offset: usize, t: &'static str) -> Result<i32> {
    if data.len() < offset + 4 {
        return Err(eof(offset, t));
    }
    Ok(LittleEndian::read_i32(&data[offset..offset + 4]))
}

/// Reads the element starting at `pos` (pointing at the tag byte).
/// Returns the key, the decoded value and the offset of the next element.
fn read_element(data: &[u8], pos: usize) -> Result<(&str, Value<'_>, usize)> {
    let tag_byte = data[pos];
    let key_start = pos + 1;

    let key_end = data[key_start..]
        .iter()
        .position(|&b| b == 0)
        .map(|rel| key_start + rel)
        .ok_or_else(|| eof(key_start, "element key"))?;
    let key = std::str::from_utf8(&data[key_start..key_end])
        .map_err(|_| Error::InvalidUtf8 { offset: key_start })?;

    let mut at = key_end + 1;

    let value = match tag_byte {
        tag::DOUBLE => {
            if data.len() < at + 8 {
                return Err(eof(at, "double"));
            }
            let v = LittleEndian::read_f64(&data[at..at + 8]);
            at += 8;
            Value::Double(v)
        }
        tag::STRING => {
            // The declared length is a raw i32: reject it before casting so a
            // negative value cannot wrap into a huge usize.
            let raw = read_i32_at(data, at, "string length")?;
            if raw < 1 {
                return Err(eof(at, "string payload"));
            }
            let len = raw as usize;
            let end = at
                .checked_add(4 + len)
                .filter(|&end| end <= data.len())
                .ok_or_else(|| eof(at, "string payload"))?;
            let bytes = &data[at + 4..end - 1];
            if data[end - 1] != 0 {
                return Err(Error::MissingTerminator { offset: end - 1 });
            }
            let s = std::str::from_utf8(bytes).map_err(|_| Error::InvalidUtf8 { offset: at + 4 })?;
            at = end;
            Value::String(s)
        }
        tag::DOCUMENT | tag::ARRAY => {
            let raw = read_i32_at(data, at, "embedded document length")?;
            if raw < EMPTY_DOCUMENT_LEN as i32 {
                return Err(eof(at, "embedded document"));
            }
            let len = raw as usize;
            let end = at
                .checked_add(len)
                .filter(|&end| end <= data.len())
                .ok_or_else(|| eof(at, "embedded document"))?;
            let slice = &data[at..end];
            at = end;
            if tag_byte == tag::DOCUMENT {
                Value::Document(DocumentView { data: slice })
            } else {
                Value::Array(ArrayView(DocumentView { data: slice }))
            }
        }
        tag::BINARY => {
            let raw = read_i32_at(data, at, "binary length")?;
            if raw < 0 {
                return Err(eof(at, "binary payload"));
            }
            let len = raw as usize;
            let end = at
                .checked_add(5 + len)
                .filter(|&end| end <= data.len())
                .ok_or_else(|| eof(at, "binary payload"))?;
            let subtype = data[at + 4];
            let bytes = &data[at + 5..end];
            at = end;
            Value::Binary { subtype, bytes }
        }
        tag::BOOL => {
            if data.len() < at + 1 {
                return Err(eof(at, "bool"));
            }
            let v = data[at] != 0;
            at += 1;
            Value::Bool(v)
        }
        tag::DATE_TIME => {
            if data.len() < at + 8 {
                return Err(eof(at, "datetime"));
            }
            let v = LittleEndian::read_i64(&data[at..at + 8]);
            at += 8;
            Value::DateTime(v)
        }
        tag::NULL => Value::Null,
        tag::INT32 => {
            let v = read_i32_at(data, at, "int32")?;
            at += 4;
            Value::Int32(v)
        }
        tag::INT64 => {
            if data.len() < at + 8 {
                return Err(eof(at, "int64"));
            }
            let v = LittleEndian::read_i64(&data[at..at + 8]);
            at += 8;
            Value::Int64(v)
        }
        other => {
            return Err(Error::InvalidElementTag {
                tag: other,
                offset: pos,
            });
        }
    };

    Ok((key, value, at))
}

/// Full structural validation walk: total length, every nested length prefix,
/// terminators, tags and UTF-8 payloads.
pub fn validate_document(data: &[u8]) -> Result<()> {
    if data.len() < EMPTY_DOCUMENT_LEN {
        return Err(eof(0, "document length prefix"));
    }

    let declared = LittleEndian::read_i32(&data[..4]);
    if declared < EMPTY_DOCUMENT_LEN as i32 || declared as usize != data.len() {
        return Err(Error::LengthMismatch {
            declared: declared.max(0) as usize,
            actual: data.len(),
        });
    }

    if data[data.len() - 1] != 0 {
        return Err(Error::MissingTerminator {
            offset: data.len() - 1,
        });
    }

    let mut pos = 4;
    while pos < data.len() - 1 {
        let (_, value, next) = read_element(data, pos)?;
        // Recurse into nested scopes so corrupt children are caught eagerly.
        match value {
            Value::Document(d) => validate_document(d.data)?,
            Value::Array(a) => validate_document(a.0.data)?,
            _ => {}
        }
        pos = next;
    }

    if pos != data.len() - 1 {
        return Err(Error::LengthMismatch {
            declared: declared as usize,
            actual: pos + 1,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // { "hello": "world" } encoded by hand.
    const HELLO_WORLD: &[u8] = &[
        0x16, 0x00, 0x00, 0x00, 0x02, b'h', b'e', b'l', b'l', b'o', 0x00, 0x06, 0x00, 0x00, 0x00,
        b'w', b'o', b'r', b'l', b'd', 0x00, 0x00,
    ];

    #[test]
    fn test_parses_a_known_document() {
        let view = DocumentView::from_bytes(HELLO_WORLD).unwrap();
        let elements: Vec<_> = view.iter().map(|el| el.unwrap()).collect();
        assert_eq!(elements, vec![("hello", Value::String("world"))]);
    }

    #[test]
    fn test_empty_document_is_valid() {
        let empty = [5, 0, 0, 0, 0];
        let view = DocumentView::from_bytes(&empty).unwrap();
        assert_eq!(view.iter().count(), 0);
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let mut data = HELLO_WORLD.to_vec();
        data[0] = 0x17;
        assert!(matches!(
            Document::from_bytes(data),
            Err(Error::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_missing_terminator() {
        let mut data = HELLO_WORLD.to_vec();
        let last = data.len() - 1;
        data[last] = 0x01;
        assert!(matches!(
            Document::from_bytes(data),
            Err(Error::MissingTerminator { .. })
        ));
    }

    #[test]
    fn test_rejects_invalid_tag() {
        let mut data = HELLO_WORLD.to_vec();
        data[4] = 0x7f;
        assert!(matches!(
            Document::from_bytes(data),
            Err(Error::InvalidElementTag { tag: 0x7f, .. })
        ));
    }

    // One element with key "a" followed by the terminator, wrapped in a
    // correct total length so decoding reaches the element payload.
    fn doc_with_element(element: &[u8]) -> Vec<u8> {
        let mut data = vec![0, 0, 0, 0];
        data.extend_from_slice(element);
        data.push(0);
        let total = data.len() as i32;
        LittleEndian::write_i32(&mut data[..4], total);
        data
    }

    #[test]
    fn test_rejects_negative_string_length() {
        let data = doc_with_element(&[tag::STRING, b'a', 0, 0xff, 0xff, 0xff, 0xff]);
        assert!(Document::from_bytes(data).is_err());
    }

    #[test]
    fn test_rejects_negative_binary_length() {
        let data = doc_with_element(&[tag::BINARY, b'a', 0, 0xff, 0xff, 0xff, 0xff, 0x00]);
        assert!(Document::from_bytes(data).is_err());
    }

    #[test]
    fn test_rejects_negative_embedded_document_length() {
        let data = doc_with_element(&[tag::DOCUMENT, b'a', 0, 0xff, 0xff, 0xff, 0xff]);
        assert!(Document::from_bytes(data).is_err());
    }

    #[test]
    fn test_rejects_oversized_string_length() {
        let data = doc_with_element(&[tag::STRING, b'a', 0, 0xff, 0xff, 0xff, 0x7f]);
        assert!(matches!(
            Document::from_bytes(data),
            Err(Error::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_get_returns_first_match() {
        let view = DocumentView::from_bytes(HELLO_WORLD).unwrap();
        assert_eq!(view.get("hello"), Some(Value::String("world")));
        assert_eq!(view.get("missing"), None);
    }
}
