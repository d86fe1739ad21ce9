use crate::index::IndexFile;
use std::path::{Path, PathBuf};

/// Destination for the index built from `source`.
///
/// Without an output the index goes next to the source. An existing
/// directory receives `<source stem>.idx`. Anything else is used as given.
pub fn resolve_output(source: &Path, output: Option<&Path>) -> PathBuf {
    match output {
        None => change_extension(source, IndexFile::Structure.extension()),
        Some(dir) if dir.is_dir() => match source.file_name() {
            Some(name) => dir.join(change_extension(Path::new(name), IndexFile::Structure.extension())),
            None => dir.to_path_buf(),
        },
        Some(path) => path.to_path_buf(),
    }
}

/// Output directory shared by every file of a batch: the parent of an
/// existing file, otherwise the path itself
pub fn batch_output_dir(output: Option<&Path>) -> Option<PathBuf> {
    let output = output?;
    if output.is_file() {
        let parent = output.parent().filter(|p| !p.as_os_str().is_empty());
        Some(parent.unwrap_or(Path::new(".")).to_path_buf())
    } else {
        Some(output.to_path_buf())
    }
}

pub fn change_extension(path: &Path, extension: &str) -> PathBuf {
    path.with_extension(extension)
}
