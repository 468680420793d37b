//! The Transport trait — the seam between the orchestration engine and the
//! browser-driven delivery implementation.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::Result;
use crate::types::DeliveryRequest;

/// A message-delivery surface. One instance serves one run, sequentially;
/// the orchestrator owns it for the run's lifetime and closes it on every
/// exit path.
#[async_trait]
pub trait Transport: Send {
    /// Bring up the delivery surface. Called once before the first send;
    /// failure here is fatal for the run.
    async fn initialize(&mut self) -> Result<()>;

    /// Deliver one message. Must return Ok only on positively confirmed
    /// delivery (an observed delivery marker); absence of confirmation is a
    /// Transport error, not an assumed success.
    async fn send_message(&mut self, request: &DeliveryRequest) -> Result<()>;

    /// Best-effort diagnostic capture. Never fails the caller; returns the
    /// written path if the capture succeeded.
    async fn take_screenshot(&mut self, label: &str) -> Option<PathBuf>;

    /// Release all transport resources. Safe to call more than once.
    async fn close(&mut self) -> Result<()>;

    /// Liveness probe for the underlying session.
    async fn is_running(&self) -> bool;
}
