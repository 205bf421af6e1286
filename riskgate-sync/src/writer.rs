//! Atomic file replacement.
//!
//! ## `atomic_copy` protocol
//!
//! 1. Ensure the destination's parent directory exists.
//! 2. Stream the source into `<dest>.<pid>.<seq>.riskgate.tmp` in the same
//!    directory and fsync it. `<seq>` is unique per call, so concurrent
//!    copies onto the same destination never share a temp file.
//! 3. Rename the temp file onto the destination (atomic on POSIX when both
//!    sit on the same volume).
//! 4. On rename failure remove the temp file; the destination is untouched.
//!
//! A reader of the destination path sees either the old file or the complete
//! new one, never a prefix. A process killed between 2 and 3 leaves only an
//! orphaned temp file behind.

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{io_err, SyncError};

/// Suffix shared by every temp file this crate creates.
pub const TMP_SUFFIX: &str = ".riskgate.tmp";

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Fresh temp path next to `dest`; no two calls in a process return the same one.
pub fn tmp_path_for(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    dest.with_file_name(format!("{name}.{}.{seq}{TMP_SUFFIX}", std::process::id()))
}

/// Destination-relative form of a listed file name.
///
/// Keeps only normal components, so absolute names and `..` can never
/// escape the destination directory.
pub fn destination_relative(name: &str) -> PathBuf {
    Path::new(name)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}

/// Steps 1–2: copy `source` into a fresh temp file beside `dest`.
pub fn stage_copy(source: &Path, dest: &Path) -> Result<PathBuf, SyncError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }

    let tmp = tmp_path_for(dest);
    let result = (|| -> io::Result<()> {
        let mut reader = File::open(source)?;
        let mut writer = File::create(&tmp)?;
        io::copy(&mut reader, &mut writer)?;
        writer.sync_all()
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(dest, e));
    }
    Ok(tmp)
}

/// Steps 3–4: move a staged temp file onto `dest`.
pub fn commit(tmp: &Path, dest: &Path) -> Result<(), SyncError> {
    if let Err(e) = fs::rename(tmp, dest) {
        let _ = fs::remove_file(tmp);
        return Err(io_err(dest, e));
    }
    Ok(())
}

/// Replace `dest` with the contents of `source`, atomically.
///
/// An existing destination is overwritten unconditionally; this is a whole
/// file replacement, never a merge.
pub fn atomic_copy(source: &Path, dest: &Path) -> Result<(), SyncError> {
    let tmp = stage_copy(source, dest)?;
    commit(&tmp, dest)?;
    tracing::debug!("replaced: {}", dest.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::TempDir;

    fn leftover_tmp(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(TMP_SUFFIX))
            .collect()
    }

    #[test]
    fn copies_into_new_nested_destination() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("src.md");
        fs::write(&source, "hello").unwrap();
        let dest = tmp.path().join("out").join("docs").join("src.md");

        atomic_copy(&source, &dest).unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "hello");
    }

    #[test]
    fn overwrites_existing_destination() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("src.md");
        let dest = tmp.path().join("dest.md");
        fs::write(&source, "new").unwrap();
        fs::write(&dest, "old and longer").unwrap();

        atomic_copy(&source, &dest).unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "new");
    }

    #[test]
    fn tmp_file_removed_after_copy() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("src.md");
        fs::write(&source, "data").unwrap();
        let dest = tmp.path().join("dest.md");

        atomic_copy(&source, &dest).unwrap();
        assert!(leftover_tmp(tmp.path()).is_empty(), "temp file must be renamed away");
    }

    #[test]
    fn staged_copy_leaves_destination_untouched() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("src.md");
        let dest = tmp.path().join("dest.md");
        fs::write(&source, "replacement").unwrap();
        fs::write(&dest, "original").unwrap();

        // Interrupted between temp write and rename.
        let staged = stage_copy(&source, &dest).unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "original");
        assert_eq!(fs::read_to_string(&staged).unwrap(), "replacement");
        assert_eq!(staged.parent(), dest.parent(), "temp must share the volume");
    }

    #[test]
    fn missing_source_cleans_tmp() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("dest.md");
        let err = stage_copy(&tmp.path().join("absent.md"), &dest).unwrap_err();
        assert!(matches!(err, SyncError::Io { .. }));
        assert!(leftover_tmp(tmp.path()).is_empty());
        assert!(!dest.exists());
    }

    #[test]
    fn rename_onto_directory_fails_and_cleans_tmp() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("src.md");
        fs::write(&source, "data").unwrap();
        let dest = tmp.path().join("blocked");
        fs::create_dir_all(dest.join("occupied")).unwrap();

        assert!(atomic_copy(&source, &dest).is_err());
        assert!(dest.is_dir());
        assert!(leftover_tmp(tmp.path()).is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn readonly_destination_dir_keeps_original() {
        use std::os::unix::fs::PermissionsExt;

        let root = TempDir::new().unwrap();
        let source = root.path().join("src.md");
        fs::write(&source, "new content").unwrap();
        let readonly_dir = root.path().join("readonly");
        fs::create_dir_all(&readonly_dir).unwrap();
        let dest = readonly_dir.join("file.md");
        fs::write(&dest, "original").unwrap();

        let mut perms = fs::metadata(&readonly_dir).unwrap().permissions();
        perms.set_mode(0o555);
        fs::set_permissions(&readonly_dir, perms).unwrap();

        let outcome = atomic_copy(&source, &dest);

        let mut perms = fs::metadata(&readonly_dir).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&readonly_dir, perms).unwrap();

        // Root bypasses directory permissions; only assert when it bit.
        if outcome.is_err() {
            assert_eq!(fs::read_to_string(&dest).unwrap(), "original");
            assert!(leftover_tmp(&readonly_dir).is_empty());
        }
    }

    #[test]
    fn tmp_paths_are_unique_per_call() {
        let dest = Path::new("/share/INDEX.md");
        let first = tmp_path_for(dest);
        let second = tmp_path_for(dest);
        assert_ne!(first, second);
        assert_eq!(first.parent(), dest.parent());
        assert!(first.to_string_lossy().ends_with(TMP_SUFFIX));
    }

    #[test]
    fn concurrent_copies_onto_one_destination_all_succeed() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("src.md");
        let payload = vec![b'x'; 1 << 20];
        fs::write(&source, &payload).unwrap();
        let dest = tmp.path().join("out").join("dest.md");

        let results: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| atomic_copy(&source, &dest)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(results.iter().all(Result::is_ok), "{results:?}");
        assert_eq!(fs::read(&dest).unwrap(), payload);
        assert!(leftover_tmp(&tmp.path().join("out")).is_empty());
    }

    #[test]
    fn destination_relative_strips_escapes() {
        assert_eq!(destination_relative("docs/INDEX.md"), PathBuf::from("docs/INDEX.md"));
        assert_eq!(destination_relative("/etc/passwd"), PathBuf::from("etc/passwd"));
        assert_eq!(destination_relative("../../x.md"), PathBuf::from("x.md"));
        assert_eq!(destination_relative("./a/./b.md"), PathBuf::from("a/b.md"));
    }
}
