//! Expand command-line paths into the GRIB2 files of a collection.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Files named directly are kept as given; directories are walked and
/// filtered by extension. The result is sorted and free of duplicates.
pub fn collect_files(inputs: &[PathBuf], extensions: &[String], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let walker = WalkDir::new(input)
                .follow_links(true)
                .max_depth(if recursive { usize::MAX } else { 1 });
            for entry in walker {
                let entry = entry.with_context(|| format!("Failed to walk {}", input.display()))?;
                if entry.file_type().is_file() && has_extension(entry.path(), extensions) {
                    files.push(entry.into_path());
                }
            }
        } else {
            // a missing file is kept; the report notes it and moves on
            files.push(input.clone());
        }
    }

    files.sort();
    files.dedup();
    if files.is_empty() {
        bail!("no GRIB2 files found");
    }
    debug!(count = files.len(), "Collected files");
    Ok(files)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{temp_test_dir, write_test_file};

    fn extensions() -> Vec<String> {
        vec!["grib2".into()]
    }

    #[test]
    fn test_directory_filtered_by_extension() {
        let dir = temp_test_dir();
        write_test_file(dir.path(), "a.grib2", b"x");
        write_test_file(dir.path(), "b.GRIB2", b"x");
        write_test_file(dir.path(), "notes.txt", b"x");

        let files = collect_files(&[dir.path().to_path_buf()], &extensions(), true).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_recursion_can_be_disabled() {
        let dir = temp_test_dir();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        write_test_file(dir.path(), "top.grib2", b"x");
        write_test_file(&sub, "nested.grib2", b"x");

        let root = [dir.path().to_path_buf()];
        assert_eq!(collect_files(&root, &extensions(), true).unwrap().len(), 2);
        assert_eq!(collect_files(&root, &extensions(), false).unwrap().len(), 1);
    }

    #[test]
    fn test_named_files_kept_and_deduplicated() {
        let dir = temp_test_dir();
        let path = write_test_file(dir.path(), "data.bin", b"x");

        let files = collect_files(&[path.clone(), path.clone()], &extensions(), true).unwrap();
        assert_eq!(files, vec![path]);
    }

    #[test]
    fn test_empty_collection_rejected() {
        let dir = temp_test_dir();
        assert!(collect_files(&[dir.path().to_path_buf()], &extensions(), true).is_err());
    }
}
