//! Closure-driven builders: the ergonomic counterpart to the typestate
//! streams, used where a whole document is assembled in one place (fixture
//! conversion, the benchmark report).

use crate::builder::core::CoreBuilder;
use crate::document::{Array, Document};
use crate::err::Result;
use crate::value::Value;

/// Builds a document by handing a [`DocumentWriter`] to `f`.
pub fn document<F>(f: F) -> Result<Document>
where
    F: FnOnce(&mut DocumentWriter<'_>) -> Result<()>,
{
    let mut core = CoreBuilder::new_document();
    f(&mut DocumentWriter::new(&mut core))?;
    core.extract_document()
}

/// Builds an array by handing an [`ArrayWriter`] to `f`.
pub fn array<F>(f: F) -> Result<Array>
where
    F: FnOnce(&mut ArrayWriter<'_>) -> Result<()>,
{
    let mut core = CoreBuilder::new_array();
    f(&mut ArrayWriter::new(&mut core))?;
    core.extract_array()
}

pub struct DocumentWriter<'a> {
    core: &'a mut CoreBuilder,
}

impl<'a> DocumentWriter<'a> {
    pub(crate) fn new(core: &'a mut CoreBuilder) -> DocumentWriter<'a> {
        DocumentWriter { core }
    }

    pub fn append<'v>(&mut self, key: &str, value: impl Into<Value<'v>>) -> Result<()> {
        self.core.key(key)?;
        self.core.append_value(value.into())
    }

    pub fn append_null(&mut self, key: &str) -> Result<()> {
        self.core.key(key)?;
        self.core.append_null()
    }

    pub fn append_datetime(&mut self, key: &str, millis: i64) -> Result<()> {
        self.core.key(key)?;
        self.core.append_datetime(millis)
    }

    pub fn append_binary(&mut self, key: &str, subtype: u8, bytes: &[u8]) -> Result<()> {
        self.core.key(key)?;
        self.core.append_binary(subtype, bytes)
    }

    pub fn append_document<F>(&mut self, key: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut DocumentWriter<'_>) -> Result<()>,
    {
        self.core.key(key)?;
        self.core.open_document()?;
        f(&mut DocumentWriter::new(self.core))?;
        self.core.close_document()
    }

    pub fn append_array<F>(&mut self, key: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut ArrayWriter<'_>) -> Result<()>,
    {
        self.core.key(key)?;
        self.core.open_array()?;
        f(&mut ArrayWriter::new(self.core))?;
        self.core.close_array()
    }
}

pub struct ArrayWriter<'a> {
    core: &'a mut CoreBuilder,
}

impl<'a> ArrayWriter<'a> {
    pub(crate) fn new(core: &'a mut CoreBuilder) -> ArrayWriter<'a> {
        ArrayWriter { core }
    }

    pub fn push<'v>(&mut self, value: impl Into<Value<'v>>) -> Result<()> {
        self.core.append_value(value.into())
    }

    pub fn push_null(&mut self) -> Result<()> {
        self.core.append_null()
    }

    pub fn push_datetime(&mut self, millis: i64) -> Result<()> {
        self.core.append_datetime(millis)
    }

    pub fn push_document<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut DocumentWriter<'_>) -> Result<()>,
    {
        self.core.open_document()?;
        f(&mut DocumentWriter::new(self.core))?;
        self.core.close_document()
    }

    pub fn push_array<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut ArrayWriter<'_>) -> Result<()>,
    {
        self.core.open_array()?;
        f(&mut ArrayWriter::new(self.core))?;
        self.core.close_array()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_basic_document_with_nested_scopes() {
        let doc = document(|d| {
            d.append("name", "metrics")?;
            d.append_document("info", |info| info.append("test_name", "suite"))?;
            d.append_array("values", |a| {
                a.push(1i32)?;
                a.push_document(|m| m.append("type", "THROUGHPUT"))?;
                a.push_array(|inner| inner.push(false))
            })
        })
        .unwrap();

        crate::document::validate_document(doc.as_bytes()).unwrap();
        assert_eq!(doc.as_view().get("name"), Some(Value::String("metrics")));
        let values = doc.as_view().get("values").unwrap();
        assert_eq!(values.as_array().unwrap().values().count(), 3);
    }

    #[test]
    fn test_empty_array_helper() {
        let arr = array(|_| Ok(())).unwrap();
        assert_eq!(arr.as_bytes(), &[5, 0, 0, 0, 0]);
    }
}
