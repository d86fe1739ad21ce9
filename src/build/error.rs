use crate::index::IndexError;
use crate::shapefile::ShapefileError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building an index.
///
/// Everything except [`BuildError::SourceNotFound`] is scoped to a single
/// job: it is reported, the job's partial index is removed and a batch moves
/// on to the next file.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("failed to open source {}: {source}", path.display())]
    SourceOpen {
        path: PathBuf,
        source: ShapefileError,
    },

    #[error("failed to create index {}: {source}", path.display())]
    IndexCreate { path: PathBuf, source: IndexError },

    #[error("failed to read record {record}: {source}")]
    Read {
        /// 1-based position in the source
        record: usize,
        source: ShapefileError,
    },

    #[error("failed to insert record {id}: {source}")]
    Insert { id: String, source: IndexError },

    #[error("failed to finalize index {}: {source}", path.display())]
    Finalize { path: PathBuf, source: IndexError },
}

impl BuildError {
    /// Whether the error ends the whole invocation rather than one job
    pub fn is_fatal(&self) -> bool {
        matches!(self, BuildError::SourceNotFound(_))
    }
}
