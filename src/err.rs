use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Errors related to encoding (builder sequencing)
    #[error("builder expects a key at document level, cannot append a value")]
    ExpectedKey,

    #[error("builder expects a value for key `{key}`, cannot accept another key")]
    ExpectedValue { key: String },

    #[error("document key contains an interior NUL byte: `{key:?}`")]
    InvalidKey { key: String },

    #[error("no open subdocument or subarray to close")]
    NoOpenScope,

    #[error("tried to close a {requested} but the innermost open scope is a {open}")]
    ScopeMismatch {
        open: &'static str,
        requested: &'static str,
    },

    #[error("cannot finalize builder with {depth} open scope(s)")]
    UnclosedScopes { depth: usize },

    #[error("builder was already finalized, no further appends are possible")]
    BuilderFinished,

    /// Errors related to decoding
    #[error("offset {offset}: unexpected end of buffer while reading {t}")]
    UnexpectedEof { offset: usize, t: &'static str },

    #[error("offset {offset}: `{tag:#04x}` is not a valid element tag")]
    InvalidElementTag { tag: u8, offset: usize },

    #[error("document declares a length of {declared} bytes but spans {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("offset {offset}: document is missing its NUL terminator")]
    MissingTerminator { offset: usize },

    #[error("offset {offset}: string payload is not valid UTF-8")]
    InvalidUtf8 { offset: usize },

    /// Errors related to the benchmark harness
    #[error("fixture `{}` could not be read: {source}", path.display())]
    FixtureMissing {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("fixture `{value}` is not usable: {reason}")]
    InvalidFixture { value: String, reason: String },

    #[error("cannot write a report before every benchmark has completed")]
    SuiteIncomplete,

    #[error("failed to build the worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// Errors related to the document store
    #[error("collection `{name}` does not exist")]
    CollectionNotFound { name: String },

    #[error("no stored blob with id {id}")]
    BlobNotFound { id: u64 },

    #[error("an I/O error has occurred: {0}")]
    Io(#[from] std::io::Error),

    #[error("`serde_json` failed with error: {0}")]
    Json(#[from] serde_json::Error),
}
