//! Sendloom error taxonomy.
//!
//! Three tiers: fatal setup errors (config, storage, transport init, ledger
//! lock) abort the run before any contact is processed; per-contact errors
//! (render, invalid recipient, retry exhaustion) are caught at the contact
//! boundary and turned into statistics; advisory failures are logged only
//! and never constructed as errors at all.

use thiserror::Error;

/// Convenience result alias used across all sendloom crates.
pub type Result<T> = std::result::Result<T, SendloomError>;

#[derive(Error, Debug)]
pub enum SendloomError {
    /// Missing or invalid configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// Ledger storage is unreadable or cannot be written.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Another run holds the ledger lock.
    #[error("Ledger locked: {0}")]
    LedgerLocked(String),

    /// Contact source could not be read or parsed.
    #[error("Contacts error: {0}")]
    Contacts(String),

    /// Template could not be rendered for a contact.
    #[error("Template error: {0}")]
    Template(String),

    /// A delivery attempt failed (session, navigation, confirmation).
    #[error("Transport error: {0}")]
    Transport(String),

    /// Recipient identifier rejected by the transport.
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    /// All retry attempts were consumed without a success.
    #[error("All {attempts} attempts failed: {last}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        last: Box<SendloomError>,
    },

    /// Run was cancelled cooperatively.
    #[error("Run cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SendloomError {
    /// True for errors that must abort the run before processing contacts.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SendloomError::Config(_)
                | SendloomError::Storage(_)
                | SendloomError::LedgerLocked(_)
                | SendloomError::Contacts(_)
        )
    }
}
