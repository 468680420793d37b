//! Send orchestrator — sequences contacts through render, duplicate check,
//! pacing, retry-governed delivery and ledger updates.
//!
//! Contacts are processed strictly sequentially in input order: the
//! transport holds a single browser session, and the pacing gate's global
//! minimum interval is only meaningful under sequential access. Each contact
//! ends in exactly one of Skipped, Sent (real or dry-run) or Failed;
//! per-contact failures never abort the run.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use sendloom_core::cancel::CancelToken;
use sendloom_core::config::RetryConfig;
use sendloom_core::error::{Result, SendloomError};
use sendloom_core::traits::Transport;
use sendloom_core::types::{Contact, DeliveryRequest};
use sendloom_ledger::{LedgerStats, MessageLedger};

use crate::pacing::PacingGate;
use crate::retry::run_with_retry;
use crate::stats::RunStats;

/// Produces the message text for one contact. Render failures are
/// per-contact errors, not fatal.
pub type Renderer = Box<dyn Fn(&Contact) -> Result<String> + Send + Sync>;

/// Per-run options.
pub struct SendOptions {
    /// Validate and log everything, deliver nothing, mutate no ledger.
    pub dry_run: bool,
    pub image: Option<PathBuf>,
    pub caption: Option<String>,
    /// Caller metadata merged into every ledger entry (campaign name etc).
    pub metadata: serde_json::Value,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            image: None,
            caption: None,
            metadata: serde_json::Value::Null,
        }
    }
}

/// Result of a completed (or cancelled) run.
pub struct RunOutcome {
    pub stats: RunStats,
    pub ledger_stats: LedgerStats,
    pub cancelled: bool,
}

enum ContactOutcome {
    Sent,
    Skipped,
    Failed(String),
    Cancelled,
}

pub struct SendOrchestrator {
    transport: Arc<Mutex<dyn Transport>>,
    ledger: MessageLedger,
    gate: PacingGate,
    retry: RetryConfig,
    cancel: CancelToken,
}

impl SendOrchestrator {
    pub fn new(
        transport: Arc<Mutex<dyn Transport>>,
        ledger: MessageLedger,
        gate: PacingGate,
        retry: RetryConfig,
        cancel: CancelToken,
    ) -> Self {
        Self {
            transport,
            ledger,
            gate,
            retry,
            cancel,
        }
    }

    /// Process all contacts in input order. Returns Err only for fatal setup
    /// failures (transport initialization); everything after the first
    /// contact starts is absorbed into the statistics.
    pub async fn run(
        &mut self,
        contacts: &[Contact],
        renderer: &Renderer,
        options: &SendOptions,
    ) -> Result<RunOutcome> {
        if !options.dry_run {
            let mut transport = self.transport.lock().await;
            if let Err(e) = transport.initialize().await {
                let _ = transport.close().await;
                return Err(e);
            }
        }

        let mut stats = RunStats::new();
        let mut cancelled = false;

        for contact in contacts {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            match self.process_contact(contact, renderer, options).await {
                ContactOutcome::Sent => stats.record_sent(),
                ContactOutcome::Skipped => stats.record_skipped(),
                ContactOutcome::Failed(reason) => {
                    stats.record_failed(&contact.phone, reason)
                }
                ContactOutcome::Cancelled => {
                    cancelled = true;
                    break;
                }
            }
        }

        if !options.dry_run {
            if let Err(e) = self.transport.lock().await.close().await {
                tracing::warn!("Transport close failed: {e}");
            }
        }

        if cancelled {
            tracing::warn!("Run cancelled after {} contacts", stats.total);
        }
        let ledger_stats = self.ledger.stats();
        tracing::info!(
            "Run complete: {} | ledger: {} messages, {} recipients",
            stats.summary(),
            ledger_stats.total_messages,
            ledger_stats.unique_recipients
        );

        Ok(RunOutcome {
            stats,
            ledger_stats,
            cancelled,
        })
    }

    async fn process_contact(
        &mut self,
        contact: &Contact,
        renderer: &Renderer,
        options: &SendOptions,
    ) -> ContactOutcome {
        let name = contact.display_name().to_string();

        let message = match renderer(contact) {
            Ok(m) => m,
            Err(e) => {
                tracing::error!("Render failed for {name} ({}): {e}", contact.phone);
                return ContactOutcome::Failed(format!("render: {e}"));
            }
        };

        if self.ledger.was_sent(&contact.phone, &message) {
            let when = self
                .ledger
                .get_info(&contact.phone, &message)
                .map(|e| e.timestamp.to_rfc3339())
                .unwrap_or_default();
            tracing::info!("Skipping {name} ({}): already sent {when}", contact.phone);
            return ContactOutcome::Skipped;
        }

        if options.dry_run {
            tracing::info!(
                "DRY RUN would send to {name} ({}): {message:?}",
                contact.phone
            );
            return ContactOutcome::Sent;
        }

        self.gate.wait().await;

        let request = DeliveryRequest {
            recipient: contact.phone.clone(),
            message: message.clone(),
            image: options.image.clone(),
            caption: options.caption.clone(),
        };

        let transport = self.transport.clone();
        let result = run_with_retry(
            || {
                let transport = transport.clone();
                let request = request.clone();
                async move { transport.lock().await.send_message(&request).await }
            },
            &self.retry,
            &self.cancel,
        )
        .await;

        match result {
            Ok(()) => {
                tracing::info!("Sent to {name} ({})", contact.phone);
                // Confirmed delivery must be recorded; a record failure is an
                // anomaly to surface loudly, not a reason to fail the contact.
                if let Err(e) =
                    self.ledger
                        .mark_sent(&contact.phone, &message, self.entry_metadata(&name, options))
                {
                    tracing::error!(
                        "Sent to {} but ledger update failed; next run may resend: {e}",
                        contact.phone
                    );
                }
                ContactOutcome::Sent
            }
            Err(SendloomError::Cancelled) => ContactOutcome::Cancelled,
            Err(e) => {
                tracing::error!("Delivery failed for {name} ({}): {e}", contact.phone);
                let label = format!("send-failed-{}", contact.phone.trim_start_matches('+'));
                if self.transport.lock().await.take_screenshot(&label).await.is_none() {
                    tracing::debug!("No diagnostic screenshot for {}", contact.phone);
                }
                ContactOutcome::Failed(e.to_string())
            }
        }
    }

    fn entry_metadata(&self, name: &str, options: &SendOptions) -> serde_json::Value {
        let mut meta = match &options.metadata {
            serde_json::Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };
        meta.insert("name".into(), serde_json::Value::String(name.to_string()));
        if let Some(image) = &options.image {
            meta.insert(
                "image".into(),
                serde_json::Value::String(image.display().to_string()),
            );
        }
        serde_json::Value::Object(meta)
    }

    /// The ledger, e.g. for reporting after the run.
    pub fn ledger(&self) -> &MessageLedger {
        &self.ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::path::Path;

    struct MockTransport {
        fail_recipients: HashSet<String>,
        sent: Vec<DeliveryRequest>,
        init_calls: u32,
        screenshots: Vec<String>,
        closed: bool,
    }

    impl MockTransport {
        fn new() -> Self {
            Self {
                fail_recipients: HashSet::new(),
                sent: Vec::new(),
                init_calls: 0,
                screenshots: Vec::new(),
                closed: false,
            }
        }

        fn failing_for(recipients: &[&str]) -> Self {
            let mut mock = Self::new();
            mock.fail_recipients = recipients.iter().map(|r| r.to_string()).collect();
            mock
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn initialize(&mut self) -> Result<()> {
            self.init_calls += 1;
            Ok(())
        }

        async fn send_message(&mut self, request: &DeliveryRequest) -> Result<()> {
            if self.fail_recipients.contains(&request.recipient) {
                return Err(SendloomError::Transport("no delivery marker".into()));
            }
            self.sent.push(request.clone());
            Ok(())
        }

        async fn take_screenshot(&mut self, label: &str) -> Option<PathBuf> {
            self.screenshots.push(label.to_string());
            Some(PathBuf::from(format!("/tmp/{label}.png")))
        }

        async fn close(&mut self) -> Result<()> {
            self.closed = true;
            Ok(())
        }

        async fn is_running(&self) -> bool {
            self.init_calls > 0 && !self.closed
        }
    }

    fn scratch_ledger(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join("sendloom-test-orch").join(name);
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("sent.json")
    }

    fn contacts() -> Vec<Contact> {
        vec![
            Contact::new(
                "+14155550100".into(),
                vec![("name".into(), "Ada".into())],
            ),
            Contact::new(
                "+14155550101".into(),
                vec![("name".into(), "Grace".into())],
            ),
        ]
    }

    fn renderer() -> Renderer {
        Box::new(|c: &Contact| Ok(format!("Hello {}", c.display_name())))
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
        }
    }

    fn orchestrator(
        mock: Arc<Mutex<MockTransport>>,
        ledger_path: &Path,
    ) -> SendOrchestrator {
        let ledger = MessageLedger::load(ledger_path).unwrap();
        SendOrchestrator::new(
            mock,
            ledger,
            PacingGate::per_minute(6000),
            fast_retry(),
            CancelToken::new(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_run_sends_everything() {
        let path = scratch_ledger("fresh");
        let mock = Arc::new(Mutex::new(MockTransport::new()));
        let mut orch = orchestrator(mock.clone(), &path);

        let outcome = orch
            .run(&contacts(), &renderer(), &SendOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.stats.total, 2);
        assert_eq!(outcome.stats.sent, 2);
        assert_eq!(outcome.stats.skipped, 0);
        assert_eq!(outcome.stats.failed, 0);
        assert_eq!(outcome.ledger_stats.total_messages, 2);

        let mock = mock.lock().await;
        assert_eq!(mock.init_calls, 1);
        assert!(mock.closed);
        // Input order preserved.
        assert_eq!(mock.sent[0].recipient, "+14155550100");
        assert_eq!(mock.sent[1].recipient, "+14155550101");
        assert_eq!(mock.sent[0].message, "Hello Ada");
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_run_skips_duplicates() {
        let path = scratch_ledger("duplicates");
        let mock = Arc::new(Mutex::new(MockTransport::new()));
        let mut orch = orchestrator(mock.clone(), &path);
        orch.run(&contacts(), &renderer(), &SendOptions::default())
            .await
            .unwrap();

        // Same contacts, same template, ledger reloaded from disk.
        let mock2 = Arc::new(Mutex::new(MockTransport::new()));
        let mut orch2 = orchestrator(mock2.clone(), &path);
        let outcome = orch2
            .run(&contacts(), &renderer(), &SendOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.stats.total, 2);
        assert_eq!(outcome.stats.sent, 0);
        assert_eq!(outcome.stats.skipped, 2);
        assert_eq!(outcome.stats.failed, 0);
        assert_eq!(outcome.ledger_stats.total_messages, 2);
        assert!(mock2.lock().await.sent.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_failure_does_not_abort_run() {
        let path = scratch_ledger("partial");
        let mock = Arc::new(Mutex::new(MockTransport::failing_for(&["+14155550100"])));
        let mut orch = orchestrator(mock.clone(), &path);

        let outcome = orch
            .run(&contacts(), &renderer(), &SendOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.stats.total, 2);
        assert_eq!(outcome.stats.sent, 1);
        assert_eq!(outcome.stats.failed, 1);
        assert_eq!(outcome.ledger_stats.total_messages, 1);
        assert_eq!(outcome.stats.failures.len(), 1);
        assert_eq!(outcome.stats.failures[0].recipient, "+14155550100");
        assert!(outcome.stats.failures[0].reason.contains("3 attempts"));

        let reloaded = MessageLedger::load(&path).unwrap();
        assert!(!reloaded.was_sent("+14155550100", "Hello Ada"));
        assert!(reloaded.was_sent("+14155550101", "Hello Grace"));

        // Best-effort diagnostic capture happened for the failed contact.
        assert_eq!(
            mock.lock().await.screenshots,
            vec!["send-failed-14155550100"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_dry_run_touches_nothing() {
        let path = scratch_ledger("dryrun");
        let mock = Arc::new(Mutex::new(MockTransport::new()));
        let mut orch = orchestrator(mock.clone(), &path);

        let options = SendOptions {
            dry_run: true,
            ..SendOptions::default()
        };
        let outcome = orch.run(&contacts(), &renderer(), &options).await.unwrap();

        assert_eq!(outcome.stats.total, 2);
        assert_eq!(outcome.stats.sent, 2);
        assert_eq!(outcome.stats.skipped, 0);
        assert_eq!(outcome.stats.failed, 0);
        // No ledger mutation, no transport contact at all.
        assert_eq!(outcome.ledger_stats.total_messages, 0);
        let mock = mock.lock().await;
        assert_eq!(mock.init_calls, 0);
        assert!(mock.sent.is_empty());
        assert!(MessageLedger::load(&path).unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_render_failure_is_per_contact() {
        let path = scratch_ledger("render");
        let mock = Arc::new(Mutex::new(MockTransport::new()));
        let mut orch = orchestrator(mock.clone(), &path);

        let renderer: Renderer = Box::new(|c: &Contact| {
            if c.phone == "+14155550100" {
                Err(SendloomError::Template("bad placeholder".into()))
            } else {
                Ok("Hello".into())
            }
        });
        let outcome = orch
            .run(&contacts(), &renderer, &SendOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.stats.total, 2);
        assert_eq!(outcome.stats.sent, 1);
        assert_eq!(outcome.stats.failed, 1);
        assert!(outcome.stats.failures[0].reason.contains("render"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_between_contacts() {
        let path = scratch_ledger("cancel");
        let mock = Arc::new(Mutex::new(MockTransport::new()));
        let cancel = CancelToken::new();
        let ledger = MessageLedger::load(&path).unwrap();
        let mut orch = SendOrchestrator::new(
            mock.clone(),
            ledger,
            PacingGate::per_minute(6000),
            fast_retry(),
            cancel.clone(),
        );

        cancel.cancel();
        let outcome = orch
            .run(&contacts(), &renderer(), &SendOptions::default())
            .await
            .unwrap();

        assert!(outcome.cancelled);
        assert_eq!(outcome.stats.total, 0);
        assert!(mock.lock().await.sent.is_empty());
        // Transport still released.
        assert!(mock.lock().await.closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_metadata_written_to_ledger() {
        let path = scratch_ledger("metadata");
        let mock = Arc::new(Mutex::new(MockTransport::new()));
        let mut orch = orchestrator(mock, &path);

        let options = SendOptions {
            metadata: serde_json::json!({"campaign": "spring"}),
            ..SendOptions::default()
        };
        orch.run(&contacts()[..1], &renderer(), &options)
            .await
            .unwrap();

        let ledger = MessageLedger::load(&path).unwrap();
        let entry = ledger.get_info("+14155550100", "Hello Ada").unwrap();
        assert_eq!(entry.metadata["campaign"], "spring");
        assert_eq!(entry.metadata["name"], "Ada");
    }
}
