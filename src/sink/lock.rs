//! Exclusive advisory locks on mailbox files.

use std::fs::File;
use std::path::Path;

use nix::fcntl::{Flock, FlockArg};
use tracing::trace;

use crate::error::{FerryError, Result};

/// A file held under an exclusive `flock`. The lock is released when the
/// guard is dropped, whichever way the holder exits.
pub type LockedFile = Flock<File>;

/// Block until an exclusive lock on `file` is acquired.
pub fn lock_exclusive(file: File, path: &Path) -> Result<LockedFile> {
    trace!(path = %path.display(), "Acquiring exclusive lock");
    Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, errno)| FerryError::Lock {
        path: path.to_path_buf(),
        source: errno,
    })
}
