//! Advisory file locks and atomic rewrites for the shared JSON files.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::Path;
use std::time::{Duration, Instant};

const GUARD_TIMEOUT: Duration = Duration::from_secs(5);
const GUARD_RETRY: Duration = Duration::from_millis(50);

/// Exclusive OS-level lock on a sidecar file, released on drop.
#[derive(Debug)]
pub struct FileGuard {
    file: File,
}

impl FileGuard {
    /// Blocks (polling) until the exclusive lock on `path` is held.
    ///
    /// Creates `path` and its parent directory if needed. Gives up with
    /// `ErrorKind::TimedOut` after five seconds.
    pub fn acquire(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let start = Instant::now();
        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => return Ok(Self { file }),
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    if start.elapsed() >= GUARD_TIMEOUT {
                        return Err(io::Error::new(
                            ErrorKind::TimedOut,
                            format!("Timed out waiting for {}", path.display()),
                        ));
                    }
                    std::thread::sleep(GUARD_RETRY);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Drop for FileGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Writes `content` to a sibling temp file, then renames it over `path`.
pub fn write_atomic(path: &Path, content: &str) -> io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, content)?;
    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }
    Ok(())
}
