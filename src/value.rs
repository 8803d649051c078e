use crate::document::{ArrayView, DocumentView};

/// Element type tags, as they appear on the wire.
pub mod tag {
    pub const DOUBLE: u8 = 0x01;
    pub const STRING: u8 = 0x02;
    pub const DOCUMENT: u8 = 0x03;
    pub const ARRAY: u8 = 0x04;
    pub const BINARY: u8 = 0x05;
    pub const BOOL: u8 = 0x08;
    pub const DATE_TIME: u8 = 0x09;
    pub const NULL: u8 = 0x0A;
    pub const INT32: u8 = 0x10;
    pub const INT64: u8 = 0x12;
}

/// A single decoded element value, borrowing from the underlying buffer.
///
/// Nested documents and arrays are lazy views, no child element is decoded
/// until it is iterated over.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Double(f64),
    String(&'a str),
    Document(DocumentView<'a>),
    Array(ArrayView<'a>),
    Binary { subtype: u8, bytes: &'a [u8] },
    Bool(bool),
    /// Milliseconds since the UNIX epoch, UTC.
    DateTime(i64),
    Null,
    Int32(i32),
    Int64(i64),
}

impl<'a> Value<'a> {
    pub fn element_tag(&self) -> u8 {
        match self {
            Value::Double(_) => tag::DOUBLE,
            Value::String(_) => tag::STRING,
            Value::Document(_) => tag::DOCUMENT,
            Value::Array(_) => tag::ARRAY,
            Value::Binary { .. } => tag::BINARY,
            Value::Bool(_) => tag::BOOL,
            Value::DateTime(_) => tag::DATE_TIME,
            Value::Null => tag::NULL,
            Value::Int32(_) => tag::INT32,
            Value::Int64(_) => tag::INT64,
        }
    }

    /// Accessors return borrows tied to the underlying buffer, not to this
    /// `Value`, so they stay usable after the `Value` itself is gone.
    pub fn as_str(&self) -> Option<&'a str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<DocumentView<'a>> {
        match self {
            Value::Document(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<ArrayView<'a>> {
        match self {
            Value::Array(a) => Some(*a),
            _ => None,
        }
    }
}

impl From<f64> for Value<'_> {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl<'a> From<&'a str> for Value<'a> {
    fn from(v: &'a str) -> Self {
        Value::String(v)
    }
}

impl From<bool> for Value<'_> {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value<'_> {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value<'_> {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl<'a> From<DocumentView<'a>> for Value<'a> {
    fn from(v: DocumentView<'a>) -> Self {
        Value::Document(v)
    }
}

impl<'a> From<ArrayView<'a>> for Value<'a> {
    fn from(v: ArrayView<'a>) -> Self {
        Value::Array(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::basic;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_accessors_outlive_the_value() {
        let doc = basic::document(|d| {
            d.append("name", "driver")?;
            d.append_document("info", |info| info.append("ok", true))?;
            d.append_array("tags", |a| a.push(1i32))
        })
        .unwrap();

        // Borrows obtained through temporary `Value`s must stay usable.
        let name = doc.as_view().get("name").unwrap().as_str().unwrap();
        let info = doc.as_view().get("info").unwrap().as_document().unwrap();
        let tags = doc.as_view().get("tags").unwrap().as_array().unwrap();

        assert_eq!(name, "driver");
        assert_eq!(info.get("ok"), Some(Value::Bool(true)));
        assert_eq!(tags.values().count(), 1);
    }
}
