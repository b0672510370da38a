//! Advisory file locks for cooperating writers.
//!
//! Several processes can append records to the same output file as long as
//! each one holds an exclusive [`FileLock`] while it writes. The lock is
//! advisory: writers that do not take it are not held back.

use crate::error::{MarcError, Result};
use log::debug;
use nix::errno::Errno;
use nix::fcntl::{flock, FlockArg};
use std::fs::File;
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

/// How long to sleep between attempts while waiting with a timeout.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Kind of lock to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Many holders at once; excludes exclusive holders
    Shared,
    /// A single holder
    Exclusive,
}

impl LockMode {
    fn blocking(self) -> FlockArg {
        match self {
            LockMode::Shared => FlockArg::LockShared,
            LockMode::Exclusive => FlockArg::LockExclusive,
        }
    }

    fn non_blocking(self) -> FlockArg {
        match self {
            LockMode::Shared => FlockArg::LockSharedNonblock,
            LockMode::Exclusive => FlockArg::LockExclusiveNonblock,
        }
    }
}

/// An acquired advisory lock, released on drop.
#[derive(Debug)]
pub struct FileLock<'a> {
    file: &'a File,
}

impl<'a> FileLock<'a> {
    /// Lock `file`, waiting at most `timeout` (forever if `None`).
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::LockTimeout`] if the lock is still held by someone
    /// else when the timeout expires, [`MarcError::LockInterrupted`] if a
    /// signal interrupts a blocking wait, and [`MarcError::IoError`] for any
    /// other failure. In every error case no lock is held.
    pub fn acquire(file: &'a File, mode: LockMode, timeout: Option<Duration>) -> Result<Self> {
        let fd = file.as_raw_fd();
        match timeout {
            None => match flock(fd, mode.blocking()) {
                Ok(()) => {},
                Err(Errno::EINTR) => return Err(MarcError::LockInterrupted(describe(fd))),
                Err(e) => return Err(MarcError::IoError(e.into())),
            },
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                loop {
                    match flock(fd, mode.non_blocking()) {
                        Ok(()) => break,
                        Err(e) if e == Errno::EWOULDBLOCK || e == Errno::EINTR => {
                            if Instant::now() >= deadline {
                                return Err(MarcError::LockTimeout(describe(fd)));
                            }
                            std::thread::sleep(POLL_INTERVAL);
                        },
                        Err(e) => return Err(MarcError::IoError(e.into())),
                    }
                }
            },
        }
        debug!("acquired {mode:?} lock on {}", describe(fd));
        Ok(FileLock { file })
    }
}

impl Drop for FileLock<'_> {
    fn drop(&mut self) {
        let fd = self.file.as_raw_fd();
        if let Err(e) = flock(fd, FlockArg::Unlock) {
            debug!("failed to release lock on {}: {e}", describe(fd));
        }
    }
}

fn describe(fd: RawFd) -> String {
    format!("file descriptor {fd}")
}
