//! Scanner module for discovering camera files in an input directory.
//!
//! Input directories are flat: only direct children are considered, matched
//! on a case-insensitive extension.

use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A candidate camera file discovered during a directory scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Full path to the file.
    pub path: PathBuf,
    /// Raw file name, as used for name derivation.
    pub file_name: String,
    /// File size in bytes at discovery time.
    pub size_bytes: u64,
}

/// Checks if a file name ends with `.<extension>` (case-insensitive).
pub fn has_extension(file_name: &str, extension: &str) -> bool {
    let suffix = format!(".{}", extension.trim_start_matches('.').to_lowercase());
    file_name.to_lowercase().ends_with(&suffix)
}

/// Lists the files directly inside `dir` whose name ends with `extension`.
///
/// Results are sorted by file name so dispatch order is reproducible.
/// Symlinks are followed, so a link to a file counts as a file.
/// Subdirectories, dangling links, non-UTF-8 names and entries whose metadata cannot be read
/// are skipped. Fails only if `dir` itself cannot be read.
pub fn list_candidates(dir: &Path, extension: &str) -> io::Result<Vec<SourceFile>> {
    if !dir.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a directory", dir.display()),
        ));
    }

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name();

    let mut candidates = Vec::new();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => {
                log::debug!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let Some(file_name) = entry.file_name().to_str() else {
            log::debug!("Skipping non-UTF-8 file name {}", entry.path().display());
            continue;
        };

        if !has_extension(file_name, extension) {
            continue;
        }

        if let Ok(metadata) = entry.metadata() {
            candidates.push(SourceFile {
                path: entry.path().to_path_buf(),
                file_name: file_name.to_string(),
                size_bytes: metadata.len(),
            });
        }
    }

    Ok(candidates)
}
