//! # Sendloom Engine
//! The send-orchestration core: a pacing gate enforcing the inter-send
//! interval, a retry governor with bounded exponential backoff, run
//! statistics, and the orchestrator that sequences contacts through the
//! duplicate ledger and the transport.

pub mod orchestrator;
pub mod pacing;
pub mod retry;
pub mod stats;

pub use orchestrator::{RunOutcome, Renderer, SendOptions, SendOrchestrator};
pub use pacing::PacingGate;
pub use retry::run_with_retry;
pub use stats::{FailureRecord, RunStats};
