//! Publisher module for promoting a finished working file.
//!
//! A working file only becomes visible under its published name once the
//! engine has reported success. Promotion is a rename within the output
//! directory, so readers either see nothing or the complete file.

use filetime::FileTime;
use rand::RngCore;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Number of random bytes appended to a published artifact.
pub const FINGERPRINT_PAD_LEN: usize = 16;

/// Errors that can occur while publishing.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The working file could not be moved to its published name.
    #[error("Failed to promote working file: {0}")]
    PromoteFailed(std::io::Error),
}

/// Promotes a working file to its published name.
///
/// Steps:
/// 1. Rename `working_path` to `published_path`. Both live in the same output
///    directory, so the rename is atomic and a refused rename is an error
/// 2. Set access and modification times to now
/// 3. If `perturb_fingerprint` is set, append [`FINGERPRINT_PAD_LEN`] random
///    bytes so the artifact never hashes like any earlier output
///
/// Only step 1 can fail the publish. Steps 2 and 3 are logged and skipped on
/// error; the container stays playable either way since players ignore
/// trailing bytes.
pub fn publish_artifact(
    working_path: &Path,
    published_path: &Path,
    perturb_fingerprint: bool,
) -> Result<(), PublishError> {
    fs::rename(working_path, published_path).map_err(PublishError::PromoteFailed)?;

    let now = FileTime::now();
    if let Err(e) = filetime::set_file_times(published_path, now, now) {
        log::warn!(
            "Could not refresh timestamps of {}: {}",
            published_path.display(),
            e
        );
    }

    if perturb_fingerprint {
        if let Err(e) = append_random_pad(published_path) {
            log::warn!(
                "Could not append fingerprint pad to {}: {}",
                published_path.display(),
                e
            );
        }
    }

    Ok(())
}

fn append_random_pad(path: &Path) -> std::io::Result<()> {
    let mut pad = [0u8; FINGERPRINT_PAD_LEN];
    rand::thread_rng().fill_bytes(&mut pad);

    let mut file = OpenOptions::new().append(true).open(path)?;
    file.write_all(&pad)?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn write_working(dir: &Path, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        let old = FileTime::from_system_time(SystemTime::now() - Duration::from_secs(86_400));
        filetime::set_file_times(&path, old, old).unwrap();
        path
    }

    #[test]
    fn test_publish_moves_and_pads() {
        let temp_dir = TempDir::new().unwrap();
        let working = write_working(temp_dir.path(), "VID_20240309_001.mp4", b"encoded content");
        let published = temp_dir.path().join("VID_20240309_001.insv");

        publish_artifact(&working, &published, true).unwrap();

        assert!(!working.exists(), "working file should be gone");
        let content = fs::read(&published).unwrap();
        assert_eq!(content.len(), b"encoded content".len() + FINGERPRINT_PAD_LEN);
        assert!(content.starts_with(b"encoded content"));
    }

    #[test]
    fn test_publish_without_perturbation_keeps_bytes() {
        let temp_dir = TempDir::new().unwrap();
        let working = write_working(temp_dir.path(), "a.mp4", b"encoded content");
        let published = temp_dir.path().join("a.insv");

        publish_artifact(&working, &published, false).unwrap();

        assert_eq!(fs::read(&published).unwrap(), b"encoded content");
    }

    #[test]
    fn test_publish_refreshes_modification_time() {
        let temp_dir = TempDir::new().unwrap();
        let working = write_working(temp_dir.path(), "b.mp4", b"x");
        let published = temp_dir.path().join("b.insv");

        publish_artifact(&working, &published, false).unwrap();

        let modified = fs::metadata(&published).unwrap().modified().unwrap();
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        assert!(age < Duration::from_secs(60), "mtime not refreshed: {:?} old", age);
    }

    #[test]
    fn test_two_publishes_of_same_bytes_differ() {
        let temp_dir = TempDir::new().unwrap();
        let first = write_working(temp_dir.path(), "c.mp4", b"same bytes");
        let second = write_working(temp_dir.path(), "d.mp4", b"same bytes");
        let first_out = temp_dir.path().join("c.insv");
        let second_out = temp_dir.path().join("d.insv");

        publish_artifact(&first, &first_out, true).unwrap();
        publish_artifact(&second, &second_out, true).unwrap();

        assert_ne!(fs::read(&first_out).unwrap(), fs::read(&second_out).unwrap());
    }

    #[test]
    fn test_publish_missing_working_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let working = temp_dir.path().join("missing.mp4");
        let published = temp_dir.path().join("missing.insv");

        let result = publish_artifact(&working, &published, true);
        assert!(matches!(result, Err(PublishError::PromoteFailed(_))));
        assert!(!published.exists());
    }

    #[test]
    fn test_refused_rename_leaves_nothing_published() {
        let temp_dir = TempDir::new().unwrap();
        let working = write_working(temp_dir.path(), "e.mp4", b"encoded content");
        // A non-empty directory at the published name makes the rename fail
        let published = temp_dir.path().join("e.insv");
        fs::create_dir(&published).unwrap();
        fs::write(published.join("occupied"), b"x").unwrap();

        let result = publish_artifact(&working, &published, true);

        assert!(matches!(result, Err(PublishError::PromoteFailed(_))));
        assert!(published.is_dir(), "published name must not be overwritten by a copy");
        assert_eq!(fs::read(&working).unwrap(), b"encoded content");
    }
}
