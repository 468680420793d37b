//! The persisted ledger store.
//!
//! Human-readable pretty JSON, one file per ledger. Every successful send is
//! persisted synchronously before the orchestrator moves on, so a crash
//! mid-run leaves the file consistent with what was actually delivered.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use sendloom_core::error::{Result, SendloomError};

use crate::fingerprint::fingerprint;

/// One recorded send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub recipient: String,
    pub fingerprint: String,
    pub timestamp: DateTime<Utc>,
    /// Arbitrary caller metadata (campaign name, template hash, ...).
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Derived read-only view over the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerStats {
    pub total_messages: usize,
    pub unique_recipients: usize,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LedgerFile {
    last_updated: DateTime<Utc>,
    entries: HashMap<String, LedgerEntry>,
}

impl Default for LedgerFile {
    fn default() -> Self {
        Self {
            last_updated: Utc::now(),
            entries: HashMap::new(),
        }
    }
}

/// In-memory ledger bound to its backing file.
#[derive(Debug)]
pub struct MessageLedger {
    path: PathBuf,
    file: LedgerFile,
}

impl MessageLedger {
    /// Load the ledger from disk. A missing file initializes an empty ledger
    /// and persists it immediately; a file that exists but cannot be parsed
    /// is a fatal storage error, never silently replaced.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            let ledger = Self {
                path: path.to_path_buf(),
                file: LedgerFile::default(),
            };
            ledger.save()?;
            tracing::info!("Ledger initialized at {}", path.display());
            return Ok(ledger);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            SendloomError::Storage(format!("Failed to read ledger {}: {e}", path.display()))
        })?;
        let file: LedgerFile = serde_json::from_str(&content).map_err(|e| {
            SendloomError::Storage(format!("Corrupt ledger {}: {e}", path.display()))
        })?;

        tracing::debug!(
            "Ledger loaded: {} entries from {}",
            file.entries.len(),
            path.display()
        );
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// True if this exact (recipient, message) pair was already sent.
    pub fn was_sent(&self, recipient: &str, message: &str) -> bool {
        self.file
            .entries
            .contains_key(&fingerprint(recipient, message))
    }

    /// Metadata for a previously-sent pair, if any.
    pub fn get_info(&self, recipient: &str, message: &str) -> Option<&LedgerEntry> {
        self.file.entries.get(&fingerprint(recipient, message))
    }

    /// Record a confirmed send and persist before returning. Overwrites any
    /// existing entry for the same fingerprint; never duplicates.
    pub fn mark_sent(
        &mut self,
        recipient: &str,
        message: &str,
        metadata: serde_json::Value,
    ) -> Result<()> {
        let fp = fingerprint(recipient, message);
        let entry = LedgerEntry {
            recipient: recipient.to_string(),
            fingerprint: fp.clone(),
            timestamp: Utc::now(),
            metadata,
        };
        self.file.entries.insert(fp, entry);
        self.save()
    }

    /// Derived stats view.
    pub fn stats(&self) -> LedgerStats {
        let recipients: HashSet<&str> = self
            .file
            .entries
            .values()
            .map(|e| e.recipient.as_str())
            .collect();
        LedgerStats {
            total_messages: self.file.entries.len(),
            unique_recipients: recipients.len(),
            last_updated: self.file.last_updated,
        }
    }

    /// Remove entries older than the retention window. Persists only when
    /// something was removed; returns the removed count. Administrative,
    /// never called on the send path.
    pub fn cleanup(&mut self, retention_days: i64) -> Result<usize> {
        let cutoff = Utc::now() - Duration::days(retention_days);
        let before = self.file.entries.len();
        self.file.entries.retain(|_, e| e.timestamp >= cutoff);
        let removed = before - self.file.entries.len();
        if removed > 0 {
            self.save()?;
            tracing::info!("Ledger cleanup: removed {removed} entries older than {retention_days}d");
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.file.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durable synchronous write: temp file, fsync, atomic rename.
    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let snapshot = LedgerFile {
            last_updated: Utc::now(),
            entries: self.file.entries.clone(),
        };
        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| SendloomError::Storage(format!("Serialize error: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        {
            use std::io::Write;
            let mut f = std::fs::File::create(&tmp).map_err(|e| {
                SendloomError::Storage(format!("Failed to create {}: {e}", tmp.display()))
            })?;
            f.write_all(json.as_bytes())
                .map_err(|e| SendloomError::Storage(format!("Write error: {e}")))?;
            f.sync_all()
                .map_err(|e| SendloomError::Storage(format!("Sync error: {e}")))?;
        }
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            SendloomError::Storage(format!("Failed to replace {}: {e}", self.path.display()))
        })?;
        tracing::debug!(
            "Ledger saved: {} entries to {}",
            snapshot.entries.len(),
            self.path.display()
        );
        Ok(())
    }
}
