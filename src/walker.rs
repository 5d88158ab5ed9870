/*!
 * Directory Walker
 *
 * Depth-first traversal of a rooted subtree, skipping a fixed list of
 * system/VCS directory names (case-insensitively) and polling a
 * cancellation token at each directory boundary so a long walk can be
 * aborted promptly.
 */

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::cancellation::CancellationToken;
use crate::error::{Result, UcxError};

const EXCLUDED_DIR_NAMES: &[&str] = &[
    "System Volume Information",
    "RECYCLER",
    "RECYCLED",
    "$RECYCLE.BIN",
    ".git",
    ".svn",
    "node_modules",
];

fn is_excluded(name: &str) -> bool {
    EXCLUDED_DIR_NAMES
        .iter()
        .any(|excluded| excluded.eq_ignore_ascii_case(name))
}

/// Walk `root`, returning every regular file beneath it. Directories whose
/// basename matches the exclusion list (case-insensitively) are skipped
/// entirely, along with their contents. Errors reading a subdirectory are
/// swallowed (that subtree simply contributes no files); an error reading
/// `root` itself is surfaced.
///
/// If `cancel` fires mid-walk, the partial list gathered so far is
/// returned rather than an error — cancellation is not a failure.
pub fn walk_files(root: &Path, cancel: &CancellationToken) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Err(UcxError::SourceNotFound(root.to_path_buf()));
    }

    let mut files = Vec::new();

    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        if entry.file_type().is_dir() && entry.depth() > 0 {
            let name = entry.file_name().to_string_lossy();
            !is_excluded(&name)
        } else {
            true
        }
    });

    let mut last_depth_checked = 0usize;
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            // An error at depth 0 means `root` itself couldn't be read
            // (e.g. permission denied) and must be surfaced, not swallowed;
            // anything deeper is a subdirectory read error, which
            // contributes no files but is not a failure of the walk.
            Err(err) if err.depth() == 0 => return Err(UcxError::Io(err.into())),
            Err(_) => continue,
        };

        // Poll cancellation at each directory boundary (depth change).
        if entry.depth() != last_depth_checked {
            last_depth_checked = entry.depth();
            if cancel.is_cancelled() {
                return Ok(files);
            }
        }

        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}
