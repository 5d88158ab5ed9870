/*!
 * File Copier
 *
 * Streams one file whole, source to destination, in bounded chunks so a
 * cancellation token can be honored between chunks rather than only at
 * whole-file granularity. Preserves the source's mtime on the destination
 * after a successful transfer, which is what keeps the needs-copy
 * predicate stable across restarts.
 */

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use filetime::{set_file_mtime, FileTime};

use crate::cancellation::CancellationToken;
use crate::error::Result;

/// Chunk size for the streaming copy loop. Small enough that cancellation
/// is honored promptly even for very large capture fragments.
const CHUNK_SIZE: usize = 1024 * 1024;

pub struct CopyOutcome {
    pub bytes_written: u64,
    pub cancelled: bool,
}

/// Copy `source` to `dest`, creating intermediate destination directories
/// as needed. Returns the number of bytes written and whether the copy was
/// aborted by cancellation (in which case the partial destination file is
/// left in place for the next pass's needs-copy check to catch).
pub fn copy_file(source: &Path, dest: &Path, cancel: &CancellationToken) -> Result<CopyOutcome> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut reader = File::open(source)?;
    let mut writer = File::create(dest)?;

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut bytes_written: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            return Ok(CopyOutcome {
                bytes_written,
                cancelled: true,
            });
        }

        let read = reader.read(&mut buf)?;
        if read == 0 {
            break;
        }

        writer.write_all(&buf[..read])?;
        bytes_written += read as u64;
    }

    writer.flush()?;
    drop(writer);

    preserve_mtime(source, dest)?;

    Ok(CopyOutcome {
        bytes_written,
        cancelled: false,
    })
}

fn preserve_mtime(source: &Path, dest: &Path) -> Result<()> {
    let source_meta = fs::metadata(source)?;
    let mtime = FileTime::from_last_modification_time(&source_meta);
    set_file_mtime(dest, mtime)?;
    Ok(())
}
