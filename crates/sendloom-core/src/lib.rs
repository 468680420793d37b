//! # Sendloom Core
//! Shared foundation: error taxonomy, configuration, contact types,
//! the Transport trait, and the cooperative cancellation token.

pub mod cancel;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use cancel::CancelToken;
pub use error::{Result, SendloomError};
