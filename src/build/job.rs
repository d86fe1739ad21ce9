use crate::build::cleanup::{index_exists, remove_index_files};
use crate::build::contract::{GeometrySource, IndexBackend, IndexStore};
use crate::build::error::BuildError;
use crate::build::report::{BuildObserver, JobOutcome, JobReport};
use crate::build::representation::{IndexEntry, select_record_kind};
use crate::index::{IndexError, IndexFile, PageSize, RecordKind};
use std::path::{Path, PathBuf};

/// Insertions between two progress notifications
pub const PROGRESS_INTERVAL: usize = 32;

/// One source file and where its index goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildJob {
    source: PathBuf,
    destination: PathBuf,
    overwrite: bool,
}

impl BuildJob {
    /// The destination always ends in the structure file extension
    pub fn new(source: impl Into<PathBuf>, destination: impl AsRef<Path>, overwrite: bool) -> Self {
        Self {
            source: source.into(),
            destination: with_index_extension(destination.as_ref()),
            overwrite,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    /// File name of the destination, for messages
    pub fn name(&self) -> String {
        self.destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.destination.display().to_string())
    }
}

/// Append `.idx` unless the path already ends in it. Other suffixes are
/// kept: `roads.v2` becomes `roads.v2.idx`.
fn with_index_extension(path: &Path) -> PathBuf {
    let extension = IndexFile::Structure.extension();
    if path.extension().is_some_and(|e| e == extension) {
        return path.to_path_buf();
    }
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// Run one job to completion. Never leaves a handle open, and never
/// leaves a partial index behind on failure.
pub fn run_job<B: IndexBackend>(
    backend: &B,
    job: &BuildJob,
    observer: &mut dyn BuildObserver,
) -> JobReport {
    let outcome = match prepare_destination(job) {
        Ok(false) => {
            log::info!("skipping {}: index exists", job.destination().display());
            JobOutcome::Skipped
        }
        Ok(true) => match execute(backend, job, observer) {
            Ok(count) => {
                log::info!(
                    "built {} with {} records",
                    job.destination().display(),
                    count
                );
                JobOutcome::Succeeded { count }
            }
            Err(error) => JobOutcome::Failed { error },
        },
        Err(error) => JobOutcome::Failed { error },
    };

    let report = JobReport::new(job, outcome);
    observer.job_finished(&report);
    report
}

/// Returns false when the job should be skipped. With overwrite on, an
/// existing index is removed first.
fn prepare_destination(job: &BuildJob) -> Result<bool, BuildError> {
    if !index_exists(job.destination()) {
        return Ok(true);
    }
    if !job.overwrite() {
        return Ok(false);
    }

    remove_index_files(job.destination()).map_err(|e| BuildError::IndexCreate {
        path: job.destination().to_path_buf(),
        source: IndexError::Io(e),
    })?;
    log::debug!("removed previous index at {}", job.destination().display());
    Ok(true)
}

fn execute<B: IndexBackend>(
    backend: &B,
    job: &BuildJob,
    observer: &mut dyn BuildObserver,
) -> Result<u64, BuildError> {
    let mut source = backend
        .open_source(job.source())
        .map_err(|source| BuildError::SourceOpen {
            path: job.source().to_path_buf(),
            source,
        })?;

    let total = source.count();
    let kind = select_record_kind(source.shape_kind());
    let page_size = backend.recommend_page_size(total);
    log::debug!(
        "{}: {} records as {:?}, {:?}",
        job.source().display(),
        total,
        kind,
        page_size
    );

    let mut store = match create_store(backend, job.destination(), kind, page_size) {
        Ok(store) => store,
        Err(e) => {
            source.close();
            return Err(e);
        }
    };

    observer.job_started(job, total);
    let inserted = insert_all(&mut source, &mut store, kind, job, total, observer);

    // The store's own count is authoritative
    let count = store.count();
    source.close();
    let closed = store.close();
    drop(store);

    let result = match (inserted, closed) {
        (Ok(()), Ok(())) => return Ok(count),
        (Ok(()), Err(source)) => BuildError::Finalize {
            path: job.destination().to_path_buf(),
            source,
        },
        (Err(e), Ok(())) => e,
        (Err(e), Err(close_err)) => {
            log::warn!(
                "failed to close {} after error: {}",
                job.destination().display(),
                close_err
            );
            e
        }
    };

    if let Err(e) = remove_index_files(job.destination()) {
        log::warn!(
            "failed to clean up {}: {}",
            job.destination().display(),
            e
        );
    }
    Err(result)
}

fn create_store<B: IndexBackend>(
    backend: &B,
    destination: &Path,
    kind: RecordKind,
    page_size: PageSize,
) -> Result<B::Store, BuildError> {
    let create_error = |source: IndexError| BuildError::IndexCreate {
        path: destination.to_path_buf(),
        source,
    };

    backend
        .create_store(destination, kind, page_size)
        .map_err(&create_error)?;

    backend.open_store(destination).map_err(|e| {
        // Only files this job just created are removed here
        if let Err(cleanup) = remove_index_files(destination) {
            log::warn!(
                "failed to remove unopened index {}: {}",
                destination.display(),
                cleanup
            );
        }
        create_error(e)
    })
}

fn insert_all<S: GeometrySource, T: IndexStore>(
    source: &mut S,
    store: &mut T,
    kind: RecordKind,
    job: &BuildJob,
    total: usize,
    observer: &mut dyn BuildObserver,
) -> Result<(), BuildError> {
    let mut inserted = 0usize;

    for (position, record) in source.records().enumerate() {
        let feature = match record {
            Ok(Some(feature)) => feature,
            Ok(None) => continue,
            Err(error) => {
                return Err(BuildError::Read {
                    record: position + 1,
                    source: error,
                });
            }
        };

        let entry = IndexEntry::from_feature(&feature, kind);
        store
            .push(&entry.geometry, &entry.id)
            .map_err(|source| BuildError::Insert {
                id: entry.id.clone(),
                source,
            })?;

        inserted += 1;
        if inserted % PROGRESS_INTERVAL == 0 {
            observer.progress(job, inserted, total);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::contract::ShapefileBackend;
    use crate::build::report::SilentObserver;
    use crate::geometry::Point;
    use crate::shapefile::{ShapeType, ShapefileWriter};
    use tempfile::tempdir;

    #[derive(Default)]
    struct Recorder {
        progress: Vec<(usize, usize)>,
        started: Option<usize>,
    }

    impl BuildObserver for Recorder {
        fn job_started(&mut self, _job: &BuildJob, total: usize) {
            self.started = Some(total);
        }

        fn progress(&mut self, _job: &BuildJob, inserted: usize, total: usize) {
            self.progress.push((inserted, total));
        }
    }

    #[test]
    fn test_destination_gets_index_extension() {
        let job = BuildJob::new("a.shp", "out/custom", false);
        assert_eq!(job.destination(), Path::new("out/custom.idx"));
        assert_eq!(job.name(), "custom.idx");

        let job = BuildJob::new("a.shp", "out/a.idx", true);
        assert_eq!(job.destination(), Path::new("out/a.idx"));
        assert!(job.overwrite());
    }

    #[test]
    fn test_destination_keeps_other_suffixes() {
        let v1 = BuildJob::new("a.shp", "out/roads.v1", false);
        let v2 = BuildJob::new("a.shp", "out/roads.v2", false);
        assert_eq!(v1.destination(), Path::new("out/roads.v1.idx"));
        assert_eq!(v2.destination(), Path::new("out/roads.v2.idx"));
        assert_eq!(
            IndexFile::Ids.path_for(v2.destination()),
            Path::new("out/roads.v2.ids")
        );
    }

    #[test]
    fn test_progress_every_interval() {
        let dir = tempdir().unwrap();
        let shp = dir.path().join("pts.shp");
        let mut writer = ShapefileWriter::new(ShapeType::Point);
        for i in 0..100 {
            writer.add_point(Point::new(i as f64, 0.0));
        }
        writer.add_null();
        writer.write(&shp).unwrap();

        let job = BuildJob::new(&shp, dir.path().join("pts"), false);
        let mut recorder = Recorder::default();
        let report = run_job(&ShapefileBackend::default(), &job, &mut recorder);

        assert_eq!(report.count(), Some(100));
        assert_eq!(recorder.started, Some(101));
        assert_eq!(recorder.progress, vec![(32, 101), (64, 101), (96, 101)]);
    }

    #[test]
    fn test_unreadable_source_creates_nothing() {
        let dir = tempdir().unwrap();
        let shp = dir.path().join("bad.shp");
        std::fs::write(&shp, vec![0u8; 200]).unwrap();

        let job = BuildJob::new(&shp, dir.path().join("bad.idx"), false);
        let report = run_job(&ShapefileBackend::default(), &job, &mut SilentObserver);

        assert!(matches!(report.error(), Some(BuildError::SourceOpen { .. })));
        assert!(!index_exists(job.destination()));
    }

    #[test]
    fn test_existing_destination_is_skipped() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("kept.idx");
        std::fs::write(&dest, b"previous").unwrap();

        let job = BuildJob::new(dir.path().join("missing.shp"), &dest, false);
        let report = run_job(&ShapefileBackend::default(), &job, &mut SilentObserver);

        assert!(matches!(report.outcome, JobOutcome::Skipped));
        assert_eq!(std::fs::read(&dest).unwrap(), b"previous");
    }
}
