//! Datastore open-mode configuration and process-wide tracing setup.
//! There is no external config-file format here — a datastore is opened
//! through plain constructor arguments rather than a file layer.

use std::path::PathBuf;

use crate::graph::OpenMode;

/// The arguments a caller needs to open a `Graph`'s backing datastore.
/// Kept as a plain struct rather than a parsed config file — nothing
/// here needs one.
#[derive(Debug, Clone)]
pub struct DatastoreOptions {
    pub path: PathBuf,
    pub mode: OpenMode,
    pub directed: bool,
}

impl DatastoreOptions {
    pub fn new(path: impl Into<PathBuf>, mode: OpenMode, directed: bool) -> Self {
        Self {
            path: path.into(),
            mode,
            directed,
        }
    }
}

/// Install a `tracing` subscriber reading `RUST_LOG` (defaulting to
/// `info`), once per process. Safe to call more than once — later calls
/// are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
