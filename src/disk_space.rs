/*!
 * Disk-space precondition
 *
 * spec.md leaves the disk-space precondition as an open design note: "the
 * source includes a stub that always returns true". This module resolves
 * that by providing both the stub and a real implementation, behind a
 * trait, so the engine's sync-loop can query "is there enough room to
 * start another Per-Source Task" without caring which is wired in.
 */

use std::path::Path;

use sysinfo::Disks;

/// External collaborator: platform-specific free-space queries. Mounting
/// and metrics sampling live outside the core; this is the one piece of
/// "how much room is left" information the engine actually consumes.
pub trait DiskSpaceProvider: Send + Sync {
    /// Bytes free on the filesystem backing `path`, or `None` if it
    /// cannot be determined.
    fn free_bytes(&self, path: &Path) -> Option<u64>;
}

/// Always reports that space is available. Matches the stub spec.md
/// describes; useful for tests and for embedding contexts that don't want
/// the precondition enforced.
pub struct AlwaysAvailableDiskSpaceProvider;

impl DiskSpaceProvider for AlwaysAvailableDiskSpaceProvider {
    fn free_bytes(&self, _path: &Path) -> Option<u64> {
        Some(u64::MAX)
    }
}

/// Queries the OS via `sysinfo`, matching the disk-space check pattern
/// used elsewhere in this codebase's lineage for pre-flight transfer
/// safety checks.
#[derive(Default)]
pub struct SysinfoDiskSpaceProvider;

impl DiskSpaceProvider for SysinfoDiskSpaceProvider {
    fn free_bytes(&self, path: &Path) -> Option<u64> {
        let disks = Disks::new_with_refreshed_list();

        disks
            .iter()
            .filter(|disk| {
                path.starts_with(disk.mount_point())
                    || path
                        .parent()
                        .map(|p| p.starts_with(disk.mount_point()))
                        .unwrap_or(false)
            })
            // Prefer the most specific (longest) matching mount point.
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .map(|disk| disk.available_space())
    }
}

/// Evaluate the engine's disk-space precondition before starting a new
/// Per-Source Task: refuse iff `free < min_free_disk_space + safety_margin`.
pub fn has_sufficient_space(
    provider: &dyn DiskSpaceProvider,
    destination: &Path,
    min_free_disk_space: u64,
    safety_margin: u64,
) -> bool {
    match provider.free_bytes(destination) {
        Some(free) => free >= min_free_disk_space.saturating_add(safety_margin),
        // Unable to determine free space: conservatively allow the pass,
        // matching the stub's always-true default rather than stalling
        // the whole sync loop on a metrics gap.
        None => true,
    }
}
