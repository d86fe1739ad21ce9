use crate::build::contract::IndexBackend;
use crate::build::error::BuildError;
use crate::build::job::{BuildJob, run_job};
use crate::build::output_path::{batch_output_dir, resolve_output};
use crate::build::report::{BatchReport, BuildObserver};
use std::fs;
use std::path::{Path, PathBuf};

/// Extension of the source files picked up from a directory
pub const SOURCE_EXTENSION: &str = "shp";

/// Source files directly inside `dir`, sorted by file name
pub fn find_sources(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut sources = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_source = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(SOURCE_EXTENSION));
        if is_source && entry.file_type()?.is_file() {
            sources.push(path);
        }
    }
    sources.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(sources)
}

/// Builds one index per source file of a directory, one after another
pub struct BatchRunner<'a, B: IndexBackend> {
    backend: &'a B,
    output_dir: Option<PathBuf>,
    overwrite: bool,
}

impl<'a, B: IndexBackend> BatchRunner<'a, B> {
    pub fn new(backend: &'a B, output: Option<&Path>, overwrite: bool) -> Self {
        Self {
            backend,
            output_dir: batch_output_dir(output),
            overwrite,
        }
    }

    /// Job failures are recorded and the batch moves on
    pub fn run(&self, dir: &Path, observer: &mut dyn BuildObserver) -> Result<BatchReport, BuildError> {
        let sources = find_sources(dir).map_err(|e| BuildError::SourceOpen {
            path: dir.to_path_buf(),
            source: e.into(),
        })?;

        if let Some(out) = &self.output_dir {
            fs::create_dir_all(out).map_err(|e| BuildError::IndexCreate {
                path: out.clone(),
                source: e.into(),
            })?;
        }

        log::info!("{} source files in {}", sources.len(), dir.display());

        let total = sources.len();
        let mut report = BatchReport::default();
        for (i, source) in sources.iter().enumerate() {
            let position = i + 1;
            observer.batch_file_started(position, total, source);

            let destination = resolve_output(source, self.output_dir.as_deref());
            let job = BuildJob::new(source.clone(), destination, self.overwrite);
            report.jobs.push(run_job(self.backend, &job, observer));

            observer.batch_file_finished(position, total, source);
        }

        observer.batch_finished(&report);
        Ok(report)
    }
}
