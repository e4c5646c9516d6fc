//! Advisory locks between processes that share a filesystem.
//!
//! A lock named `x` is held while the directory `x.lock` exists; directory
//! creation is atomic, so at most one process can create it. Acquisition
//! never blocks.
//!
//! There is no timeout and no owner check: a process that dies while
//! holding a lock leaves it held until someone removes the directory, and
//! any process can release any lock.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Error;

/// Path of the marker directory for lock `name`.
pub fn marker(name: impl AsRef<Path>) -> PathBuf {
    let mut path = name.as_ref().as_os_str().to_owned();
    path.push(".lock");
    PathBuf::from(path)
}

/// Tries to take lock `name`.
///
/// Fails with [`Error::LockHeld`] and no side effects if it is already
/// held.
pub fn acquire(name: impl AsRef<Path>) -> Result<(), Error> {
    let name = name.as_ref();
    match fs::create_dir(marker(name)) {
        Ok(()) => {
            debug!(lock = %name.display(), "acquired");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            Err(Error::LockHeld(name.display().to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Releases lock `name`. Releasing a lock that is not held is an error.
pub fn release(name: impl AsRef<Path>) -> Result<(), Error> {
    let name = name.as_ref();
    fs::remove_dir(marker(name))?;
    debug!(lock = %name.display(), "released");
    Ok(())
}
