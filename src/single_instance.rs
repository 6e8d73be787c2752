//! Single-instance guard built on a named POSIX shared-memory segment
//!
//! The segment only signals existence. An exclusive `flock` on it is held for
//! the lifetime of the owning process, which lets a new launch tell a live
//! instance apart from a segment left behind by a crash.

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg, OFlag};
use nix::sys::mman::{shm_open, shm_unlink};
use nix::sys::stat::Mode;
use nix::unistd::{ftruncate, getuid};
use std::fs::File;
use tracing::{debug, error, info, warn};

/// Size of the segment in bytes
const SEGMENT_SIZE: nix::libc::off_t = 1;

#[derive(Debug)]
pub enum InstanceLock {
    /// This process is the only instance; keep the guard alive until exit
    Acquired(InstanceGuard),
    /// Another live instance holds the segment
    AlreadyRunning,
}

#[derive(Debug)]
pub struct InstanceGuard {
    name: String,
    _lock: Flock<File>,
}

/// Segment name for `key`, scoped to the current user
pub fn segment_name(key: &str) -> String {
    format!("/{}-{}", key, getuid())
}

impl InstanceGuard {
    pub fn acquire(key: &str) -> Result<InstanceLock> {
        let name = segment_name(key);

        // Attach first: an existing segment means another instance may be alive
        match shm_open(name.as_str(), OFlag::O_RDWR, Mode::empty()) {
            Ok(fd) => {
                debug!(segment = %name, "Attached to existing instance segment");
                return match Flock::lock(File::from(fd), FlockArg::LockExclusiveNonblock) {
                    Ok(lock) => {
                        warn!(segment = %name, "Found stale instance segment, taking it over");
                        Ok(InstanceLock::Acquired(Self { name, _lock: lock }))
                    }
                    Err((_, errno)) if errno == Errno::EWOULDBLOCK => Ok(InstanceLock::AlreadyRunning),
                    Err((_, errno)) => Err(errno)
                        .context(format!("Failed to lock instance segment {}", name)),
                };
            }
            Err(Errno::ENOENT) => {}
            Err(errno) => {
                return Err(errno).context(format!("Failed to attach to instance segment {}", name));
            }
        }

        let fd = match shm_open(
            name.as_str(),
            OFlag::O_RDWR | OFlag::O_CREAT | OFlag::O_EXCL,
            Mode::S_IRUSR | Mode::S_IWUSR,
        ) {
            Ok(fd) => fd,
            // Lost a race against another launch
            Err(Errno::EEXIST) => return Ok(InstanceLock::AlreadyRunning),
            Err(errno) => {
                return Err(errno).context(format!("Failed to create instance segment {}", name));
            }
        };

        if let Err(errno) = ftruncate(&fd, SEGMENT_SIZE) {
            let _ = shm_unlink(name.as_str());
            return Err(errno).context(format!("Failed to size instance segment {}", name));
        }

        match Flock::lock(File::from(fd), FlockArg::LockExclusiveNonblock) {
            Ok(lock) => {
                info!(segment = %name, "Created instance segment");
                Ok(InstanceLock::Acquired(Self { name, _lock: lock }))
            }
            Err((_, errno)) if errno == Errno::EWOULDBLOCK => Ok(InstanceLock::AlreadyRunning),
            Err((_, errno)) => {
                let _ = shm_unlink(name.as_str());
                Err(errno).context(format!("Failed to lock instance segment {}", name))
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        if let Err(e) = shm_unlink(self.name.as_str()) {
            error!(segment = %self.name, error = %e, "Failed to remove instance segment");
        }
    }
}
