/*!
 * Per-Source Task
 *
 * For one (node, share): scan the project subtree, enumerate stale files,
 * and drive copies under the engine's global parallelism budget. A task
 * is created when the engine dispatches it and destroyed when its
 * scan+copy pass finishes, whether that's success or cancellation.
 */

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crate::cancellation::CancellationToken;
use crate::concurrency::ConcurrencyLimiter;
use crate::copier;
use crate::needs_copy::{dest_path_for, needs_copy};
use crate::progress::{ProgressBus, ProgressEvent};
use crate::tracker::CaptureTracker;
use crate::types::{Node, Share};
use crate::walker::walk_files;

/// Atomic progress counters for one in-flight (node, share) scan+copy
/// pass. Readers (`Engine::status`) get an eventually-consistent snapshot;
/// small inter-field skew between, say, `copied_files` and `copied_bytes`
/// is acceptable.
pub struct TaskProgress {
    pub total_files: AtomicU32,
    pub copied_files: AtomicU32,
    pub failed_files: AtomicU32,
    pub total_bytes: AtomicU64,
    pub copied_bytes: AtomicU64,
    last_activity: Arc<std::sync::Mutex<Instant>>,
}

impl TaskProgress {
    pub fn new() -> Self {
        Self {
            total_files: AtomicU32::new(0),
            copied_files: AtomicU32::new(0),
            failed_files: AtomicU32::new(0),
            total_bytes: AtomicU64::new(0),
            copied_bytes: AtomicU64::new(0),
            last_activity: Arc::new(std::sync::Mutex::new(Instant::now())),
        }
    }

    fn touch(&self) {
        *self.last_activity.lock().unwrap() = Instant::now();
    }

    pub fn last_activity(&self) -> Instant {
        *self.last_activity.lock().unwrap()
    }

    /// Read-only snapshot for status reporting.
    pub fn snapshot(&self) -> TaskProgressSnapshot {
        TaskProgressSnapshot {
            total_files: self.total_files.load(Ordering::SeqCst),
            copied_files: self.copied_files.load(Ordering::SeqCst),
            failed_files: self.failed_files.load(Ordering::SeqCst),
            total_bytes: self.total_bytes.load(Ordering::SeqCst),
            copied_bytes: self.copied_bytes.load(Ordering::SeqCst),
        }
    }
}

impl Default for TaskProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TaskProgressSnapshot {
    pub total_files: u32,
    pub copied_files: u32,
    pub failed_files: u32,
    pub total_bytes: u64,
    pub copied_bytes: u64,
}

/// Everything one Per-Source Task needs from the engine that dispatched it.
pub struct TaskContext {
    pub node: Node,
    pub share: Share,
    pub source_root: PathBuf,
    pub dest_root: PathBuf,
    pub limiter: ConcurrencyLimiter,
    pub cancel: CancellationToken,
    pub tracker: Arc<CaptureTracker>,
    pub bus: ProgressBus,
}

/// Run one scan+copy pass for a single (node, share). Returns the final
/// progress snapshot. The source root not existing is the normal case for
/// (node, share) combinations that don't hold this project — the task
/// returns immediately with zero files, not an error.
pub fn run(ctx: TaskContext, progress: Arc<TaskProgress>) -> TaskProgressSnapshot {
    if !ctx.source_root.exists() {
        return progress.snapshot();
    }

    ctx.bus.publish(ProgressEvent::TaskStarted {
        node: ctx.node.to_string(),
        share: ctx.share.to_string(),
    });

    let files = match walk_files(&ctx.source_root, &ctx.cancel) {
        Ok(files) => files,
        Err(_) => Vec::new(), // root read error: nothing to copy this pass
    };

    let mut stale: Vec<(PathBuf, PathBuf)> = Vec::new();
    for source_path in files {
        let Some(dest_path) = dest_path_for(&ctx.source_root, &ctx.dest_root, &source_path) else {
            continue;
        };
        if needs_copy(&source_path, &dest_path) {
            stale.push((source_path, dest_path));
        }
    }

    let total_bytes: u64 = stale
        .iter()
        .map(|(source, _)| std::fs::metadata(source).map(|m| m.len()).unwrap_or(0))
        .sum();

    progress.total_files.store(stale.len() as u32, Ordering::SeqCst);
    progress.total_bytes.store(total_bytes, Ordering::SeqCst);

    let handles: Vec<_> = stale
        .into_iter()
        .map(|(source_path, dest_path)| {
            spawn_copy(&ctx, progress.clone(), source_path, dest_path)
        })
        .collect();

    for handle in handles {
        let _ = handle.join();
    }

    ctx.bus.publish(ProgressEvent::TaskFinished {
        node: ctx.node.to_string(),
        share: ctx.share.to_string(),
        copied_files: progress.copied_files.load(Ordering::SeqCst),
        failed_files: progress.failed_files.load(Ordering::SeqCst),
    });

    progress.snapshot()
}

fn spawn_copy(
    ctx: &TaskContext,
    progress: Arc<TaskProgress>,
    source_path: PathBuf,
    dest_path: PathBuf,
) -> thread::JoinHandle<()> {
    let limiter = ctx.limiter.clone();
    let cancel = ctx.cancel.clone();
    let tracker = ctx.tracker.clone();
    let bus = ctx.bus.clone();
    let node = ctx.node.clone();

    thread::spawn(move || {
        let permit = match limiter.acquire(&cancel) {
            Some(permit) => permit,
            None => return, // engine stopped while waiting for a slot
        };

        let outcome = copier::copy_file(&source_path, &dest_path, &cancel);
        drop(permit);

        match outcome {
            Ok(outcome) if outcome.cancelled => {
                // Cancellation is never counted as a failure; the next
                // pass's needs-copy check will retry the partial file.
            }
            Ok(outcome) => {
                progress.copied_files.fetch_add(1, Ordering::SeqCst);
                progress
                    .copied_bytes
                    .fetch_add(outcome.bytes_written, Ordering::SeqCst);
                progress.touch();

                if let Some(basename) = source_path.file_name().and_then(|n| n.to_str()) {
                    tracker.record_arrival(basename, &node, &bus);
                }
            }
            Err(_) => {
                progress.failed_files.fetch_add(1, Ordering::SeqCst);
            }
        }
    })
}

/// Derive the source root for one (node, share, project) triple, as
/// specified: `<baseMount>/<node>/<strip$(share)>/<project>`.
pub fn source_root(base_mount: &Path, node: &Node, share: &Share, project: &str) -> PathBuf {
    base_mount
        .join(node.as_str())
        .join(share.mount_subpath())
        .join(project)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn ctx(source_root: PathBuf, dest_root: PathBuf) -> (TaskContext, Arc<TaskProgress>) {
        let ctx = TaskContext {
            node: Node::from("WU01"),
            share: Share::from("E$"),
            source_root,
            dest_root,
            limiter: ConcurrencyLimiter::new(4),
            cancel: CancellationToken::new(),
            tracker: Arc::new(CaptureTracker::new()),
            bus: ProgressBus::new(),
        };
        (ctx, Arc::new(TaskProgress::new()))
    }

    #[test]
    fn missing_source_root_is_a_noop() {
        let dir = tempdir().unwrap();
        let (ctx, progress) = ctx(dir.path().join("does-not-exist"), dir.path().join("dest"));

        let snapshot = run(ctx, progress);
        assert_eq!(snapshot.total_files, 0);
        assert_eq!(snapshot.copied_files, 0);
    }

    #[test]
    fn copies_stale_files_and_notifies_tracker() {
        let dir = tempdir().unwrap();
        let source_root = dir.path().join("source");
        let dest_root = dir.path().join("dest");
        std::fs::create_dir_all(&source_root).unwrap();

        std::fs::write(
            source_root.join("Lvl00-00001-ProjectA-00-00-ABCD_1234.raw"),
            b"fragment data",
        )
        .unwrap();

        let (ctx, progress) = ctx(source_root.clone(), dest_root.clone());
        let tracker = ctx.tracker.clone();

        let snapshot = run(ctx, progress);

        assert_eq!(snapshot.total_files, 1);
        assert_eq!(snapshot.copied_files, 1);
        assert_eq!(snapshot.failed_files, 0);
        assert!(dest_root
            .join("Lvl00-00001-ProjectA-00-00-ABCD_1234.raw")
            .exists());
        assert!(tracker.is_pending("00001"));
    }

    #[test]
    fn source_root_path_matches_spec() {
        let root = source_root(
            Path::new("/mnt"),
            &Node::from("WU01"),
            &Share::from("E$"),
            "Alpha",
        );
        assert_eq!(root, PathBuf::from("/mnt/WU01/E/Alpha"));
    }
}
