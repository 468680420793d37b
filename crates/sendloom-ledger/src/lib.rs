//! # Sendloom Ledger
//! Durable mapping from send fingerprints to delivery metadata. The ledger
//! is the sole duplicate-detection authority: a (recipient, message) pair is
//! skipped on later runs exactly when its fingerprint is present here.

pub mod fingerprint;
pub mod lock;
pub mod store;

pub use fingerprint::fingerprint;
pub use lock::LedgerLock;
pub use store::{LedgerEntry, LedgerStats, MessageLedger};
