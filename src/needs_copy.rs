/*!
 * Needs-Copy Predicate
 */

use std::path::Path;
use std::time::Duration;

/// Tolerance absorbing filesystem timestamp rounding across CIFS-to-local
/// boundaries. Asymmetric by design (see `dest_is_stale`): only a
/// destination that is *older* than the source by more than this amount
/// is considered stale.
pub const MTIME_TOLERANCE: Duration = Duration::from_secs(2);

/// Returns true iff `dest_path` must be (re-)copied from `source_path`.
///
/// A missing or unreadable destination is always "needs copy". Any stat
/// failure on the source is not handled here — the caller already knows
/// the source exists (it came from the directory walker); if it vanishes
/// between the walk and the copy, that surfaces as a copy failure, not a
/// `needs_copy` decision.
pub fn needs_copy(source_path: &Path, dest_path: &Path) -> bool {
    let dest_meta = match std::fs::metadata(dest_path) {
        Ok(meta) => meta,
        Err(_) => return true, // missing or otherwise unreadable: conservative re-copy
    };

    let source_meta = match std::fs::metadata(source_path) {
        Ok(meta) => meta,
        Err(_) => return true,
    };

    if dest_meta.len() != source_meta.len() {
        return true;
    }

    let (dest_mtime, source_mtime) = match (dest_meta.modified(), source_meta.modified()) {
        (Ok(d), Ok(s)) => (d, s),
        _ => return true,
    };

    match source_mtime.duration_since(dest_mtime) {
        // source is newer than dest by more than the tolerance
        Ok(delta) => delta > MTIME_TOLERANCE,
        // dest is newer than (or equal to) source: never stale on that basis
        Err(_) => false,
    }
}

/// Compute the destination path for a file found at `source_path` under
/// `source_root`, rooted instead at `dest_root`.
pub fn dest_path_for(source_root: &Path, dest_root: &Path, source_path: &Path) -> Option<std::path::PathBuf> {
    let rel = source_path.strip_prefix(source_root).ok()?;
    Some(dest_root.join(rel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{set_file_mtime, FileTime};
    use std::time::SystemTime;
    use tempfile::tempdir;

    #[test]
    fn missing_dest_needs_copy() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source.raw");
        std::fs::write(&source, b"data").unwrap();
        let dest = dir.path().join("dest.raw");

        assert!(needs_copy(&source, &dest));
    }

    #[test]
    fn size_mismatch_needs_copy() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source.raw");
        let dest = dir.path().join("dest.raw");
        std::fs::write(&source, b"longer data").unwrap();
        std::fs::write(&dest, b"short").unwrap();

        let now = FileTime::from_system_time(SystemTime::now());
        set_file_mtime(&source, now).unwrap();
        set_file_mtime(&dest, now).unwrap();

        assert!(needs_copy(&source, &dest));
    }

    #[test]
    fn stale_mtime_needs_copy() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source.raw");
        let dest = dir.path().join("dest.raw");
        std::fs::write(&source, b"data").unwrap();
        std::fs::write(&dest, b"data").unwrap();

        let base = FileTime::from_unix_time(1_000_000, 0);
        set_file_mtime(&dest, base).unwrap();
        let newer = FileTime::from_unix_time(1_000_010, 0); // 10s newer
        set_file_mtime(&source, newer).unwrap();

        assert!(needs_copy(&source, &dest));
    }

    #[test]
    fn within_tolerance_does_not_need_copy() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source.raw");
        let dest = dir.path().join("dest.raw");
        std::fs::write(&source, b"data").unwrap();
        std::fs::write(&dest, b"data").unwrap();

        let base = FileTime::from_unix_time(1_000_000, 0);
        set_file_mtime(&dest, base).unwrap();
        let within = FileTime::from_unix_time(1_000_001, 0); // 1s newer, within 2s tolerance
        set_file_mtime(&source, within).unwrap();

        assert!(!needs_copy(&source, &dest));
    }

    #[test]
    fn newer_dest_does_not_need_copy() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source.raw");
        let dest = dir.path().join("dest.raw");
        std::fs::write(&source, b"data").unwrap();
        std::fs::write(&dest, b"data").unwrap();

        let base = FileTime::from_unix_time(1_000_000, 0);
        set_file_mtime(&source, base).unwrap();
        let newer = FileTime::from_unix_time(2_000_000, 0);
        set_file_mtime(&dest, newer).unwrap();

        assert!(!needs_copy(&source, &dest));
    }

    #[test]
    fn stable_after_copy_round_trip() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source.raw");
        std::fs::write(&source, b"payload").unwrap();

        let dest = dir.path().join("dest.raw");
        std::fs::copy(&source, &dest).unwrap();
        let mtime = FileTime::from_last_modification_time(&std::fs::metadata(&source).unwrap());
        set_file_mtime(&dest, mtime).unwrap();

        assert!(!needs_copy(&source, &dest));
    }

    #[test]
    fn dest_path_mapping() {
        let root = Path::new("/mnt/WU01/E/Proj");
        let dest_root = Path::new("/data/Proj");
        let source = Path::new("/mnt/WU01/E/Proj/sub/dir/file.raw");

        let dest = dest_path_for(root, dest_root, source).unwrap();
        assert_eq!(dest, Path::new("/data/Proj/sub/dir/file.raw"));
    }
}
