/*!
 * Sync Engine and Project Discovery
 *
 * Owns the `{Idle, Running}` lifecycle, the per-run `CaptureTracker` and
 * `ConcurrencyLimiter`, and the sync loop that dispatches Per-Source Tasks.
 * `Start`/`Stop` enforce singleton semantics; everything else is read
 * through `status()` as a best-effort snapshot.
 */

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::cancellation::CancellationToken;
use crate::concurrency::{ConcurrencyLimiter, WaitGroup};
use crate::config::SyncConfig;
use crate::disk_space::{has_sufficient_space, DiskSpaceProvider};
use crate::error::{Result, UcxError};
use crate::progress::ProgressBus;
use crate::task::{self, TaskContext, TaskProgress, TaskProgressSnapshot};
use crate::tracker::CaptureTracker;
use crate::types::{Node, Share};

/// External collaborator: given a (node, share), yields the local readable
/// directory the remote CIFS/SMB share is mounted at, or `None` if the
/// mount isn't currently present. Mounting itself, credentials, and
/// `mount`/`umount` invocation all belong to whatever implements this.
pub trait MountProvider: Send + Sync {
    fn mount_root(&self, node: &Node, share: &Share) -> Option<PathBuf>;
}

/// Default implementation: `<base_mount>/<node>/<strip$(share)>`, present
/// iff that directory currently exists.
pub struct PathMountProvider {
    base_mount: PathBuf,
}

impl PathMountProvider {
    pub fn new(base_mount: PathBuf) -> Self {
        Self { base_mount }
    }
}

impl MountProvider for PathMountProvider {
    fn mount_root(&self, node: &Node, share: &Share) -> Option<PathBuf> {
        let root = self.base_mount.join(node.as_str()).join(share.mount_subpath());
        if root.is_dir() {
            Some(root)
        } else {
            None
        }
    }
}

const SYSTEM_PROJECT_NAMES: &[&str] = &[
    "system volume information",
    "recycler",
    "recycled",
    "$recycle.bin",
    "logs",
    "log",
    "temp",
    "tmp",
    "windows",
    "program files",
];

fn is_valid_project_name(name: &str) -> bool {
    if name.is_empty() || name.len() <= 1 {
        return false;
    }
    if name.starts_with('$') || name.starts_with('.') {
        return false;
    }
    !SYSTEM_PROJECT_NAMES.contains(&name.to_lowercase().as_str())
}

/// A discovered project candidate, with the first (node, share) it was
/// observed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectHint {
    pub name: String,
    pub node: Node,
    pub share: Share,
}

/// Consistent snapshot of one active (node, share) task for `Status`.
#[derive(Debug, Clone)]
pub struct ActiveTaskStatus {
    pub node: Node,
    pub share: Share,
    pub progress: TaskProgressSnapshot,
}

#[derive(Debug, Clone)]
pub struct Status {
    pub is_running: bool,
    pub project: Option<String>,
    pub destination: Option<PathBuf>,
    pub completed_captures: u32,
    pub completed_test_captures: u32,
    pub last_capture_number: Option<String>,
    pub last_test_capture_number: Option<String>,
    pub active_tasks: Vec<ActiveTaskStatus>,
}

type ActiveMap = Arc<RwLock<HashMap<(Node, Share), Arc<TaskProgress>>>>;

struct RunState {
    project: String,
    destination: PathBuf,
    cancel: CancellationToken,
    limiter: ConcurrencyLimiter,
    active: ActiveMap,
    tracker: Arc<CaptureTracker>,
    loop_handle: JoinHandle<()>,
    /// Tracks every dispatched Per-Source Task thread so `stop` can block
    /// until all of them have returned, not just the sync-loop ticker.
    task_wait_group: WaitGroup,
}

pub struct Engine {
    nodes: Vec<Node>,
    shares: Vec<Share>,
    mount_provider: Arc<dyn MountProvider>,
    disk_space_provider: Arc<dyn DiskSpaceProvider>,
    sync_config: SyncConfig,
    bus: ProgressBus,
    run: Mutex<Option<RunState>>,
}

impl Engine {
    pub fn new(
        nodes: Vec<Node>,
        shares: Vec<Share>,
        mount_provider: Arc<dyn MountProvider>,
        disk_space_provider: Arc<dyn DiskSpaceProvider>,
        sync_config: SyncConfig,
    ) -> Self {
        Self {
            nodes,
            shares,
            mount_provider,
            disk_space_provider,
            sync_config,
            bus: ProgressBus::new(),
            run: Mutex::new(None),
        }
    }

    pub fn bus(&self) -> &ProgressBus {
        &self.bus
    }

    /// Transition Idle -> Running. Rejects if already running.
    pub fn start(&self, project: String, destination: PathBuf, max_parallelism: usize) -> Result<()> {
        let mut run = self.run.lock().unwrap();
        if run.is_some() {
            return Err(UcxError::AlreadyRunning);
        }

        let project_root = destination.join(&project);
        std::fs::create_dir_all(&project_root)
            .map_err(|e| UcxError::DestinationCreateFailed(project_root.clone(), e))?;

        let cancel = CancellationToken::new();
        let limiter = ConcurrencyLimiter::new(max_parallelism);
        let active: ActiveMap = Arc::new(RwLock::new(HashMap::new()));
        let task_wait_group = WaitGroup::new();
        // Tracker and global counters reset on every Start, not Stop: see
        // the open-question resolution recorded in DESIGN.md.
        let tracker = Arc::new(CaptureTracker::new());

        info!(project = %project, destination = %destination.display(), max_parallelism, "engine starting");

        let loop_handle = self.spawn_sync_loop(
            project.clone(),
            project_root.clone(),
            cancel.clone(),
            limiter.clone(),
            active.clone(),
            tracker.clone(),
            task_wait_group.clone(),
        );

        *run = Some(RunState {
            project,
            destination,
            cancel,
            limiter,
            active,
            tracker,
            loop_handle,
            task_wait_group,
        });

        Ok(())
    }

    /// Transition Running -> Idle. Cancels the run context, awaits every
    /// in-flight task and the loop itself, then clears the active map.
    /// Never fails; calling `stop` while Idle is a no-op.
    pub fn stop(&self) {
        let run = self.run.lock().unwrap().take();
        let Some(run) = run else { return };

        run.cancel.cancel();
        let _ = run.loop_handle.join();
        run.task_wait_group.wait();
        run.active.write().unwrap().clear();

        info!(project = %run.project, "engine stopped");
    }

    pub fn status(&self) -> Status {
        let run = self.run.lock().unwrap();
        match run.as_ref() {
            None => Status {
                is_running: false,
                project: None,
                destination: None,
                completed_captures: 0,
                completed_test_captures: 0,
                last_capture_number: None,
                last_test_capture_number: None,
                active_tasks: Vec::new(),
            },
            Some(run) => {
                let counters = run.tracker.counters();
                let active_tasks = run
                    .active
                    .read()
                    .unwrap()
                    .iter()
                    .map(|((node, share), progress)| ActiveTaskStatus {
                        node: node.clone(),
                        share: share.clone(),
                        progress: progress.snapshot(),
                    })
                    .collect();

                Status {
                    is_running: true,
                    project: Some(run.project.clone()),
                    destination: Some(run.destination.clone()),
                    completed_captures: counters.completed_captures.load(std::sync::atomic::Ordering::SeqCst),
                    completed_test_captures: counters
                        .completed_test_captures
                        .load(std::sync::atomic::Ordering::SeqCst),
                    last_capture_number: counters.last_capture_number(),
                    last_test_capture_number: counters.last_test_capture_number(),
                    active_tasks,
                }
            }
        }
    }

    /// Enumerate candidate project names across every (node, share) mount,
    /// concurrently. Result order is unspecified.
    pub fn find_projects(&self, cancel: &CancellationToken) -> Vec<ProjectHint> {
        let handles: Vec<_> = self
            .nodes
            .iter()
            .flat_map(|node| self.shares.iter().map(move |share| (node.clone(), share.clone())))
            .map(|(node, share)| {
                let mount_provider = self.mount_provider.clone();
                let cancel = cancel.clone();
                thread::spawn(move || {
                    if cancel.is_cancelled() {
                        return Vec::new();
                    }
                    let Some(root) = mount_provider.mount_root(&node, &share) else {
                        return Vec::new();
                    };
                    list_project_names(&root)
                        .into_iter()
                        .map(|name| ProjectHint {
                            name,
                            node: node.clone(),
                            share: share.clone(),
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = std::collections::HashSet::new();
        let mut hints = Vec::new();
        for handle in handles {
            let Ok(found) = handle.join() else { continue };
            for hint in found {
                if seen.insert(hint.name.clone()) {
                    hints.push(hint);
                }
            }
        }
        hints
    }

    fn spawn_sync_loop(
        &self,
        project: String,
        destination: PathBuf,
        cancel: CancellationToken,
        limiter: ConcurrencyLimiter,
        active: ActiveMap,
        tracker: Arc<CaptureTracker>,
        task_wait_group: WaitGroup,
    ) -> JoinHandle<()> {
        let nodes = self.nodes.clone();
        let shares = self.shares.clone();
        let mount_provider = self.mount_provider.clone();
        let disk_space_provider = self.disk_space_provider.clone();
        let bus = self.bus.clone();
        let interval = self.sync_config.service_loop_interval;
        let min_free = self.sync_config.min_free_disk_space;
        let safety_margin = self.sync_config.disk_space_safety_margin;

        thread::spawn(move || {
            while !cancel.is_cancelled() {
                if !has_sufficient_space(&*disk_space_provider, &destination, min_free, safety_margin) {
                    warn!(destination = %destination.display(), "disk space precondition failed, skipping iteration");
                } else {
                    for node in &nodes {
                        for share in &shares {
                            dispatch_if_absent(
                                node,
                                share,
                                &project,
                                &destination,
                                &mount_provider,
                                &cancel,
                                &limiter,
                                &active,
                                &tracker,
                                &bus,
                                &task_wait_group,
                            );
                        }
                    }
                }

                cancel.wait_timeout(interval);
            }
        })
    }
}

#[allow(clippy::too_many_arguments)]
fn dispatch_if_absent(
    node: &Node,
    share: &Share,
    project: &str,
    destination: &Path,
    mount_provider: &Arc<dyn MountProvider>,
    cancel: &CancellationToken,
    limiter: &ConcurrencyLimiter,
    active: &ActiveMap,
    tracker: &Arc<CaptureTracker>,
    bus: &ProgressBus,
    task_wait_group: &WaitGroup,
) {
    let key = (node.clone(), share.clone());
    if active.read().unwrap().contains_key(&key) {
        return;
    }

    let Some(mount_root) = mount_provider.mount_root(node, share) else {
        return;
    };
    let source_root = mount_root.join(project);

    let progress = Arc::new(TaskProgress::default());
    active.write().unwrap().insert(key.clone(), progress.clone());

    let ctx = TaskContext {
        node: node.clone(),
        share: share.clone(),
        source_root,
        dest_root: destination.to_path_buf(),
        limiter: limiter.clone(),
        cancel: cancel.clone(),
        tracker: tracker.clone(),
        bus: bus.clone(),
    };

    let active = active.clone();
    task_wait_group.add();
    let task_wait_group = task_wait_group.clone();
    thread::spawn(move || {
        let _done_guard = TaskWaitGroupGuard(task_wait_group);
        debug!(node = %ctx.node, share = %ctx.share, "dispatching per-source task");
        let _ = task::run(ctx, progress);
        active.write().unwrap().remove(&key);
    });
}

/// Marks one Per-Source Task as finished on the engine's drain barrier when
/// the dispatching thread exits, including on panic, so `Engine::stop`
/// cannot block forever on a task that unwound unexpectedly.
struct TaskWaitGroupGuard(WaitGroup);

impl Drop for TaskWaitGroupGuard {
    fn drop(&mut self) {
        self.0.done();
    }
}

fn list_project_names(mount_root: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(mount_root) else {
        return Vec::new();
    };

    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| is_valid_project_name(name))
        .collect()
}
