//! Document construction, layered from the bottom up:
//!
//! - [`core`]: the runtime-checked byte encoder and scope stack.
//! - [`stream`]: typestate contexts that make sequencing mistakes
//!   unrepresentable at compile time.
//! - [`basic`]: closure-driven writers for one-shot assembly.

pub mod basic;
pub mod core;
pub mod stream;

pub use self::core::CoreBuilder;
pub use basic::{ArrayWriter, DocumentWriter};
pub use stream::{ArrayBuilder, DocumentBuilder, SingleContext};
