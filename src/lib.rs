/*!
 * UCXSync - fleet-aware file synchronizer for a scientific capture cluster
 *
 * Mirrors a selected project's files from every (node, share) mount of a
 * worker fleet to one local destination, tracks per-file freshness with a
 * content-based predicate, and detects when a logical "capture" is
 * complete from the quorum of raw fragments and, for production captures,
 * the control unit's metadata file.
 *
 * Mounting, metrics sampling, the transport/control surface, and
 * configuration loading are external collaborators; this crate is the
 * synchronization engine and capture-completion tracker only.
 */

pub mod cancellation;
pub mod concurrency;
pub mod config;
pub mod copier;
pub mod disk_space;
pub mod engine;
pub mod error;
pub mod grammar;
pub mod logging;
pub mod needs_copy;
pub mod progress;
pub mod task;
pub mod tracker;
pub mod types;
pub mod walker;

pub use config::{EngineConfig, LogLevel, SyncConfig};
pub use disk_space::{AlwaysAvailableDiskSpaceProvider, DiskSpaceProvider, SysinfoDiskSpaceProvider};
pub use engine::{ActiveTaskStatus, Engine, MountProvider, PathMountProvider, ProjectHint, Status};
pub use error::{ErrorCategory, Result, UcxError};
pub use grammar::{parse as parse_capture_name, CaptureDescriptor, DataType};
pub use progress::{ProgressBus, ProgressEvent};
pub use tracker::{CaptureTracker, Classification};
pub use types::{Node, Share, WORKER_QUORUM};
