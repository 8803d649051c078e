//! BSON document building and inspection, plus the driver microbenchmark
//! harness built on top of it.
//!
//! The builder layer produces spec-valid BSON byte buffers without an
//! intermediate tree: scopes are opened and closed in place and lengths are
//! back-patched on close. Three front ends share one core:
//!
//! - [`builder::DocumentBuilder`] / [`builder::ArrayBuilder`]: typestate
//!   streams where the compiler tracks key/value alternation and scope depth.
//! - [`builder::basic`]: closure-driven writers for one-shot assembly.
//! - [`builder::CoreBuilder`]: the dynamically checked core, for callers
//!   whose structure is only known at runtime.
//!
//! Finished buffers are inspected through [`document::DocumentView`], a
//! zero-copy cursor over the raw bytes.
//!
//! # Example
//!
//! ```
//! use docbson::builder::DocumentBuilder;
//! use docbson::value::Value;
//!
//! let doc = DocumentBuilder::new()
//!     .key("hello")?.append("world")?
//!     .finish()?;
//!
//! assert_eq!(doc.as_view().get("hello"), Some(Value::String("world")));
//! # Ok::<(), docbson::err::Error>(())
//! ```

pub mod bench;
pub mod builder;
pub mod document;
pub mod err;
pub mod json;
pub mod store;
pub mod value;

pub use builder::{ArrayBuilder, DocumentBuilder};
pub use document::{Array, ArrayView, Document, DocumentView, validate_document};
pub use err::{Error, Result};
pub use value::Value;

#[cfg(test)]
static LOGGER_INIT: std::sync::Once = std::sync::Once::new();

// Rust runs the tests concurrently, so unless we synchronize logging access
// it will crash when attempting to run `cargo test` with some logging facilities.
#[cfg(test)]
pub(crate) fn ensure_env_logger_initialized() {
    use std::io::Write;

    LOGGER_INIT.call_once(|| {
        let mut builder = env_logger::Builder::from_default_env();
        builder
            .format(|buf, record| writeln!(buf, "[{}] - {}", record.level(), record.args()))
            .init();
    });
}
