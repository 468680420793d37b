//! Single-writer ledger lock.
//!
//! The persisted store supports exactly one writer. A lock file next to the
//! ledger, created with `create_new`, refuses a second concurrent run up
//! front instead of letting two orchestrators interleave writes. The lock is
//! released on drop, on every exit path including cancellation.

use std::io::Write;
use std::path::{Path, PathBuf};

use sendloom_core::error::{Result, SendloomError};

/// Held for the duration of one run. Dropping removes the lock file.
#[derive(Debug)]
pub struct LedgerLock {
    path: PathBuf,
}

impl LedgerLock {
    /// Acquire the lock for the given ledger path. Fails fast with
    /// `LedgerLocked` when another run holds it.
    pub fn acquire(ledger_path: &Path) -> Result<Self> {
        let path = ledger_path.with_extension("lock");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                // Record the owner pid to make a stale lock diagnosable.
                let _ = writeln!(file, "{}", std::process::id());
                tracing::debug!("Ledger lock acquired: {}", path.display());
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(SendloomError::LedgerLocked(format!(
                    "{} exists; another run appears to be active (delete it if that run crashed)",
                    path.display()
                )))
            }
            Err(e) => Err(SendloomError::Storage(format!(
                "Failed to create lock {}: {e}",
                path.display()
            ))),
        }
    }
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!("Failed to remove ledger lock {}: {e}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("sendloom-test-lock").join(name);
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("sent.json")
    }

    #[test]
    fn test_second_acquire_refused_until_drop() {
        let ledger = scratch("exclusive");
        let lock = LedgerLock::acquire(&ledger).unwrap();
        let err = LedgerLock::acquire(&ledger).unwrap_err();
        assert!(matches!(err, SendloomError::LedgerLocked(_)));

        drop(lock);
        let relock = LedgerLock::acquire(&ledger);
        assert!(relock.is_ok());
    }

    #[test]
    fn test_lock_file_removed_on_drop() {
        let ledger = scratch("drop");
        let lock_path = ledger.with_extension("lock");
        {
            let _lock = LedgerLock::acquire(&ledger).unwrap();
            assert!(lock_path.exists());
        }
        assert!(!lock_path.exists());
    }
}
