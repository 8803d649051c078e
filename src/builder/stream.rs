//! Compile-time checked streaming contexts over [`CoreBuilder`].
//!
//! Each context owns the core and is parameterized by the context it returns
//! to when its scope closes, so invalid call sequences (two values with no
//! key, closing a scope that was never opened, appending after `finish`) do
//! not type-check. The root contexts are the only ones exposing `finish`.
//!
//! ```
//! use docbson::builder::stream::DocumentBuilder;
//!
//! let doc = DocumentBuilder::new()
//!     .key("name")?
//!     .append("driver")?
//!     .key("tags")?
//!     .open_array()?
//!     .push(1i32)?
//!     .push(2i32)?
//!     .close_array()?
//!     .finish()?;
//! # Ok::<(), docbson::err::Error>(())
//! ```

use std::marker::PhantomData;

use crate::builder::basic::{ArrayWriter, DocumentWriter};
use crate::builder::core::CoreBuilder;
use crate::document::{Array, Document};
use crate::err::Result;
use crate::value::Value;

mod private {
    pub trait Sealed {}
}

/// A context a closed scope returns to. Implemented by the nestable contexts
/// only; root markers deliberately do not implement it, which is what forces
/// `finish` at the root instead of `close_*`.
pub trait Context: private::Sealed {
    #[doc(hidden)]
    fn from_core(core: CoreBuilder) -> Self;
}

/// Marker parent for a document-rooted builder.
pub struct RootDocument(());

/// Marker parent for an array-rooted builder.
pub struct RootArray(());

/// Document level: a key is expected next.
#[must_use]
pub struct KeyContext<P> {
    core: CoreBuilder,
    _parent: PhantomData<P>,
}

/// A key has been staged: exactly one value is expected next.
#[must_use]
pub struct ValueContext<P> {
    core: CoreBuilder,
    _parent: PhantomData<P>,
}

/// Array level: any number of values may be appended.
#[must_use]
pub struct ArrayContext<P> {
    core: CoreBuilder,
    _parent: PhantomData<P>,
}

impl<P> private::Sealed for KeyContext<P> {}
impl<P> private::Sealed for ArrayContext<P> {}

impl<P> Context for KeyContext<P> {
    fn from_core(core: CoreBuilder) -> Self {
        KeyContext {
            core,
            _parent: PhantomData,
        }
    }
}

impl<P> Context for ArrayContext<P> {
    fn from_core(core: CoreBuilder) -> Self {
        ArrayContext {
            core,
            _parent: PhantomData,
        }
    }
}

/// Entry point for a document-rooted stream builder.
pub struct DocumentBuilder;

impl DocumentBuilder {
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> KeyContext<RootDocument> {
        KeyContext::from_core(CoreBuilder::new_document())
    }
}

/// Entry point for an array-rooted stream builder.
pub struct ArrayBuilder;

impl ArrayBuilder {
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> ArrayContext<RootArray> {
        ArrayContext::from_core(CoreBuilder::new_array())
    }
}

impl<P> KeyContext<P> {
    pub fn key(mut self, key: &str) -> Result<ValueContext<P>> {
        self.core.key(key)?;
        Ok(ValueContext {
            core: self.core,
            _parent: PhantomData,
        })
    }
}

impl<P: Context> KeyContext<P> {
    /// Closes this subdocument, returning to the enclosing context.
    pub fn close_document(mut self) -> Result<P> {
        self.core.close_document()?;
        Ok(P::from_core(self.core))
    }
}

impl KeyContext<RootDocument> {
    /// Finalizes the root document and extracts the owned buffer.
    pub fn finish(self) -> Result<Document> {
        self.core.extract_document()
    }
}

impl<P> ValueContext<P> {
    /// Appends the staged key's value, returning to key position.
    pub fn append<'a>(mut self, value: impl Into<Value<'a>>) -> Result<KeyContext<P>> {
        self.core.append_value(value.into())?;
        Ok(KeyContext::from_core(self.core))
    }

    /// Opens a subdocument in value position.
    pub fn open_document(mut self) -> Result<KeyContext<KeyContext<P>>> {
        self.core.open_document()?;
        Ok(KeyContext::from_core(self.core))
    }

    /// Opens a subarray in value position.
    pub fn open_array(mut self) -> Result<ArrayContext<KeyContext<P>>> {
        self.core.open_array()?;
        Ok(ArrayContext::from_core(self.core))
    }

    /// Hands a [`SingleContext`] to `callback`, which must append exactly one
    /// value. The same callback is reusable in array element position via
    /// [`ArrayContext::push_with`].
    pub fn append_with<F>(mut self, callback: F) -> Result<KeyContext<P>>
    where
        F: FnOnce(SingleContext<'_>) -> Result<()>,
    {
        callback(SingleContext {
            core: &mut self.core,
        })?;
        Ok(KeyContext::from_core(self.core))
    }
}

impl<P> ArrayContext<P> {
    /// Appends one element; the position index auto-increments.
    pub fn push<'a>(mut self, value: impl Into<Value<'a>>) -> Result<ArrayContext<P>> {
        self.core.append_value(value.into())?;
        Ok(self)
    }

    pub fn open_document(mut self) -> Result<KeyContext<ArrayContext<P>>> {
        self.core.open_document()?;
        Ok(KeyContext::from_core(self.core))
    }

    pub fn open_array(mut self) -> Result<ArrayContext<ArrayContext<P>>> {
        self.core.open_array()?;
        Ok(ArrayContext::from_core(self.core))
    }

    /// Element-position equivalent of [`ValueContext::append_with`].
    pub fn push_with<F>(mut self, callback: F) -> Result<ArrayContext<P>>
    where
        F: FnOnce(SingleContext<'_>) -> Result<()>,
    {
        callback(SingleContext {
            core: &mut self.core,
        })?;
        Ok(self)
    }
}

impl<P: Context> ArrayContext<P> {
    /// Closes this subarray, returning to the enclosing context.
    pub fn close_array(mut self) -> Result<P> {
        self.core.close_array()?;
        Ok(P::from_core(self.core))
    }
}

impl ArrayContext<RootArray> {
    /// Finalizes the root array and extracts the owned buffer.
    pub fn finish(self) -> Result<Array> {
        self.core.extract_array()
    }
}

/// A one-shot slot expected to receive exactly one value or one nested
/// document/array. Exists so a generic callback can be reused in both
/// document-value and array-element position; under- or over-appending here
/// falls back to the core's runtime checks.
pub struct SingleContext<'a> {
    core: &'a mut CoreBuilder,
}

impl SingleContext<'_> {
    pub fn append<'v>(self, value: impl Into<Value<'v>>) -> Result<()> {
        self.core.append_value(value.into())
    }

    pub fn append_null(self) -> Result<()> {
        self.core.append_null()
    }

    pub fn document<F>(self, f: F) -> Result<()>
    where
        F: FnOnce(&mut DocumentWriter<'_>) -> Result<()>,
    {
        self.core.open_document()?;
        f(&mut DocumentWriter::new(self.core))?;
        self.core.close_document()
    }

    pub fn array<F>(self, f: F) -> Result<()>
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
    fn test_stream_builder_matches_core_output() -> crate::err::Result<()> {
        let doc = DocumentBuilder::new()
            .key("a")?
            .append(1i32)?
            .key("sub")?
            .open_document()?
            .key("b")?
            .append("two")?
            .close_document()?
            .key("arr")?
            .open_array()?
            .push(true)?
            .push(2.5f64)?
            .close_array()?
            .finish()?;

        let mut core = crate::builder::core::CoreBuilder::new_document();
        core.key("a")?;
        core.append_i32(1)?;
        core.key("sub")?;
        core.open_document()?;
        core.key("b")?;
        core.append_str("two")?;
        core.close_document()?;
        core.key("arr")?;
        core.open_array()?;
        core.append_bool(true)?;
        core.append_f64(2.5)?;
        core.close_array()?;
        let expected = core.extract_document()?;

        assert_eq!(doc.as_bytes(), expected.as_bytes());
        Ok(())
    }

    #[test]
    fn test_single_context_reusable_in_both_positions() {
        let write_flag = |slot: SingleContext<'_>| slot.append(true);

        let doc = DocumentBuilder::new()
            .key("flag")
            .unwrap()
            .append_with(write_flag)
            .unwrap()
            .key("flags")
            .unwrap()
            .open_array()
            .unwrap()
            .push_with(write_flag)
            .unwrap()
            .push_with(write_flag)
            .unwrap()
            .close_array()
            .unwrap()
            .finish()
            .unwrap();

        assert_eq!(doc.as_view().get("flag"), Some(Value::Bool(true)));
        let flags = doc.as_view().get("flags").unwrap();
        assert_eq!(flags.as_array().unwrap().values().count(), 2);
    }

    #[test]
    fn test_single_context_nested_document() {
        let doc = DocumentBuilder::new()
            .key("info")
            .unwrap()
            .append_with(|slot| slot.document(|d| d.append("test_name", "suite")))
            .unwrap()
            .finish()
            .unwrap();

        let info = doc.as_view().get("info").unwrap().as_document().unwrap();
        assert_eq!(info.get("test_name"), Some(Value::String("suite")));
    }

    #[test]
    fn test_deep_nesting_round_trips() {
        let doc = DocumentBuilder::new()
            .key("l1")
            .unwrap()
            .open_document()
            .unwrap()
            .key("l2")
            .unwrap()
            .open_document()
            .unwrap()
            .key("l3")
            .unwrap()
            .open_array()
            .unwrap()
            .open_document()
            .unwrap()
            .key("leaf")
            .unwrap()
            .append(Value::Null)
            .unwrap()
            .close_document()
            .unwrap()
            .close_array()
            .unwrap()
            .close_document()
            .unwrap()
            .close_document()
            .unwrap()
            .finish()
            .unwrap();

        crate::document::validate_document(doc.as_bytes()).unwrap();
    }

    #[test]
    fn test_empty_array_root() {
        let arr = ArrayBuilder::new().finish().unwrap();
        assert_eq!(arr.as_bytes(), &[5, 0, 0, 0, 0]);
    }
}
