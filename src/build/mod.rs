//! The index build pipeline.
//!
//! A [`BuildJob`] pairs one source file with its destination. [`run_job`]
//! opens the source, creates the store with a recommended page size, pushes
//! every record and closes both handles, removing the partial index if
//! anything fails. [`BatchRunner`] applies the same job to every `.shp`
//! file of a directory.
//!
//! Sources and stores are reached through the [`GeometrySource`],
//! [`IndexStore`] and [`IndexBackend`] traits; [`ShapefileBackend`] is the
//! production wiring.

pub mod batch;
pub mod cleanup;
pub mod contract;
pub mod error;
pub mod job;
pub mod output_path;
pub mod report;
pub mod representation;

pub use batch::{BatchRunner, find_sources};
pub use cleanup::{index_exists, remove_index_files};
pub use contract::{GeometrySource, IndexBackend, IndexStore, ShapefileBackend};
pub use error::BuildError;
pub use job::{BuildJob, PROGRESS_INTERVAL, run_job};
pub use output_path::resolve_output;
pub use report::{BatchReport, BuildObserver, JobOutcome, JobReport, SilentObserver};
pub use representation::{IndexEntry, select_record_kind};

use std::path::Path;

/// Build the index for `source`, a single file or a directory of them.
///
/// Only a missing source is an error here; per-file failures are in the
/// returned report.
pub fn build<B: IndexBackend>(
    backend: &B,
    source: &Path,
    output: Option<&Path>,
    overwrite: bool,
    observer: &mut dyn BuildObserver,
) -> Result<BatchReport, BuildError> {
    if !source.exists() {
        return Err(BuildError::SourceNotFound(source.to_path_buf()));
    }

    if source.is_dir() {
        return BatchRunner::new(backend, output, overwrite).run(source, observer);
    }

    let job = BuildJob::new(source, resolve_output(source, output), overwrite);
    Ok(BatchReport {
        jobs: vec![run_job(backend, &job, observer)],
    })
}
