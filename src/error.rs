//! Crate-wide error taxonomy.
//!
//! Mirrors the kinds enumerated in the system's error-handling design:
//! name errors, type errors, structural errors, I/O errors, predicate
//! errors, and capacity errors. Every fallible core operation returns
//! `Result<T, CoreError>`; nothing panics on caller-supplied bad input,
//! only on programmer errors documented per-function (e.g. a statically
//! typed read against a series of the wrong type).

use thiserror::Error;

/// Errors raised by the record store, string store, graph overlay, and
/// predicate engine.
#[derive(Debug, Error)]
pub enum CoreError {
    /// `add_series` called with a name already in use.
    #[error("series already exists: {0}")]
    SeriesExists(String),

    /// A lookup referenced a series that does not exist.
    #[error("series not found: {0}")]
    SeriesNotFound(String),

    /// A graph series name was missing its `node.`/`edge.` prefix.
    #[error("series name is not qualified with node./edge.: {0}")]
    UnqualifiedName(String),

    /// A graph series name carried a prefix other than `node`/`edge`.
    #[error("unknown series name prefix: {0}")]
    UnknownPrefix(String),

    /// A typed read or write targeted a series of a different type.
    #[error("type mismatch on series {series}: expected {expected}, found {found}")]
    TypeMismatch {
        series: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Ingest encountered a file column type with no mapping into the
    /// store's value taxonomy.
    #[error("unsupported source column type for {column}: {file_type}")]
    UnsupportedFileType { column: String, file_type: String },

    /// A cell was addressed by a record id that has not been allocated.
    #[error("record id {0} has not been allocated")]
    RecordNotAllocated(u64),

    /// `open` with `create_only` was given a path that already exists, or
    /// `open_only`/`open_read_only` was given a path that does not.
    #[error("datastore path error: {0}")]
    DatastorePath(String),

    /// The backing file could not be opened, read, or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A where-clause / JSONLogic predicate referenced a variable whose
    /// column exists nowhere in the graph.
    #[error("predicate references unknown column: {0}")]
    UnknownVariable(String),

    /// A JSONLogic rule tree failed to parse into a recognized AST.
    #[error("invalid predicate rule: {0}")]
    InvalidRule(String),

    /// The underlying allocator / arena failed to grow.
    #[error("allocation failure: {0}")]
    Capacity(String),

    /// A Parquet/Arrow error surfaced by the columnar file bridge.
    #[error("columnar file error: {0}")]
    Columnar(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
