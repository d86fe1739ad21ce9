use crate::index::IndexFile;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Remove every file of the index at `path`, returning the ones deleted.
/// Missing files are skipped.
pub fn remove_index_files(path: &Path) -> io::Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for file in IndexFile::ALL {
        let target = file.path_for(path);
        match fs::remove_file(&target) {
            Ok(()) => {
                log::debug!("removed {}", target.display());
                removed.push(target);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(removed)
}

/// Any file of the index at `path` exists
pub fn index_exists(path: &Path) -> bool {
    IndexFile::ALL.iter().any(|file| file.path_for(path).exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_removes_all_index_files() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("parcels.idx");
        fs::write(&base, b"x").unwrap();
        fs::write(base.with_extension("ids"), b"y").unwrap();
        fs::write(base.with_extension("shp"), b"z").unwrap();

        assert!(index_exists(&base));
        let removed = remove_index_files(&base).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(!index_exists(&base));
        assert!(base.with_extension("shp").exists());
    }

    #[test]
    fn test_missing_files_are_fine() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("none.idx");
        fs::write(base.with_extension("ids"), b"y").unwrap();

        assert_eq!(remove_index_files(&base).unwrap().len(), 1);
        assert!(remove_index_files(&base).unwrap().is_empty());
    }
}
