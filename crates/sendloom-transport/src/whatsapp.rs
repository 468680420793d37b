//! WhatsApp Web transport.
//!
//! Drives web.whatsapp.com in a persistent browser profile. The profile
//! keeps the login across runs, so the QR scan is only needed once.
//! Delivery is confirmed positively: the send only counts once a delivery
//! marker (at least one grey check) is observed on the outgoing message;
//! an unconfirmed send is reported as a failure, never assumed.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::json;
use tokio::time::{sleep, Duration, Instant};

use sendloom_core::config::TransportConfig;
use sendloom_core::error::{Result, SendloomError};
use sendloom_core::traits::Transport;
use sendloom_core::types::DeliveryRequest;

use crate::webdriver::{WebDriverClient, KEY_ENTER};

const WHATSAPP_URL: &str = "https://web.whatsapp.com";
/// Chat list pane — present only when logged in.
const SEL_CHAT_LIST: &str = "#side";
/// QR canvas shown when the profile has no session yet.
const SEL_QR_CANVAS: &str = "canvas[aria-label]";
/// The message composer inside an open chat.
const SEL_COMPOSER: &str = "div[contenteditable='true'][data-tab='10']";
/// Attachment flow.
const SEL_ATTACH_INPUT: &str = "input[type='file']";
const SEL_SEND_BUTTON: &str = "span[data-icon='send']";

/// Checks the last outgoing message bubble for a delivery marker.
const DELIVERY_CHECK_SCRIPT: &str = r#"
    const out = document.querySelectorAll('div.message-out');
    if (out.length === 0) return false;
    const last = out[out.length - 1];
    return last.querySelector(
        "span[data-icon='msg-check'], span[data-icon='msg-dblcheck'], span[data-icon='msg-dblcheck-ack']"
    ) !== null;
"#;

pub struct WhatsAppWebTransport {
    config: TransportConfig,
    driver: WebDriverClient,
    initialized: bool,
}

impl WhatsAppWebTransport {
    pub fn new(config: TransportConfig) -> Self {
        let driver = WebDriverClient::new(&config.webdriver_url);
        Self {
            config,
            driver,
            initialized: false,
        }
    }

    fn capabilities(&self) -> serde_json::Value {
        let profile = shellexpand::tilde(&self.config.profile_dir).to_string();
        let mut args = vec![
            format!("--user-data-dir={profile}"),
            "--no-first-run".to_string(),
            "--disable-notifications".to_string(),
        ];
        if self.config.headless {
            args.push("--headless=new".to_string());
        }
        json!({
            "browserName": "chrome",
            "goog:chromeOptions": { "args": args }
        })
    }

    /// Poll until the chat list appears, i.e. WhatsApp Web is logged in.
    async fn wait_for_login(&self) -> Result<()> {
        let deadline = Instant::now() + Duration::from_secs(self.config.login_timeout_secs);
        let mut qr_announced = false;
        loop {
            if self.driver.find_optional(SEL_CHAT_LIST).await.is_some() {
                tracing::info!("WhatsApp Web: logged in");
                return Ok(());
            }
            if !qr_announced && self.driver.find_optional(SEL_QR_CANVAS).await.is_some() {
                tracing::info!("WhatsApp Web: waiting for QR scan...");
                qr_announced = true;
            }
            if Instant::now() >= deadline {
                return Err(SendloomError::Transport(format!(
                    "WhatsApp Web not logged in after {}s",
                    self.config.login_timeout_secs
                )));
            }
            sleep(Duration::from_secs(1)).await;
        }
    }

    /// Open the chat for a recipient and return the composer element id.
    /// A recipient WhatsApp does not know never produces a composer.
    async fn open_chat(&self, recipient: &str) -> Result<String> {
        let url = chat_url(recipient);
        self.driver.navigate(&url).await?;

        let deadline = Instant::now() + Duration::from_secs(self.config.send_timeout_secs);
        loop {
            if let Some(id) = self.driver.find_optional(SEL_COMPOSER).await {
                return Ok(id);
            }
            if Instant::now() >= deadline {
                return Err(SendloomError::InvalidRecipient(format!(
                    "No chat opened for {recipient}; number may not be on WhatsApp"
                )));
            }
            sleep(Duration::from_millis(500)).await;
        }
    }

    async fn attach_image(&self, image: &Path, caption: Option<&str>) -> Result<()> {
        let input = self
            .driver
            .find_optional(SEL_ATTACH_INPUT)
            .await
            .ok_or_else(|| SendloomError::Transport("Attachment input not found".into()))?;
        self.driver
            .send_keys(&input, &image.to_string_lossy())
            .await?;
        // Preview takes a moment to render before the caption box exists.
        sleep(Duration::from_secs(2)).await;

        if let Some(caption) = caption.filter(|c| !c.is_empty()) {
            if let Some(composer) = self.driver.find_optional(SEL_COMPOSER).await {
                self.driver.send_keys(&composer, caption).await?;
            }
        }

        let send = self.driver.find_element(SEL_SEND_BUTTON).await?;
        self.driver.click(&send).await?;
        Ok(())
    }

    /// Poll for the delivery marker on the last outgoing message.
    async fn confirm_delivery(&self, recipient: &str) -> Result<()> {
        let deadline = Instant::now() + Duration::from_secs(self.config.send_timeout_secs);
        loop {
            let confirmed = self
                .driver
                .execute_script(DELIVERY_CHECK_SCRIPT, json!([]))
                .await?
                .as_bool()
                .unwrap_or(false);
            if confirmed {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(SendloomError::Transport(format!(
                    "No delivery confirmation for {recipient} within {}s",
                    self.config.send_timeout_secs
                )));
            }
            sleep(Duration::from_millis(500)).await;
        }
    }
}

/// Validate a recipient: leading `+`, then digits only.
fn validate_recipient(recipient: &str) -> Result<()> {
    let rest = recipient
        .strip_prefix('+')
        .ok_or_else(|| SendloomError::InvalidRecipient(format!("Missing + prefix: {recipient}")))?;
    if rest.is_empty() || !rest.chars().all(|c| c.is_ascii_digit()) {
        return Err(SendloomError::InvalidRecipient(format!(
            "Non-digit characters in {recipient}"
        )));
    }
    Ok(())
}

/// Direct-chat URL for a normalized recipient.
fn chat_url(recipient: &str) -> String {
    format!(
        "{WHATSAPP_URL}/send?phone={}",
        recipient.trim_start_matches('+')
    )
}

#[async_trait]
impl Transport for WhatsAppWebTransport {
    async fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        tracing::info!(
            "Starting browser session via {}",
            self.config.webdriver_url
        );
        self.driver.new_session(self.capabilities()).await?;
        self.driver.navigate(WHATSAPP_URL).await?;
        self.wait_for_login().await?;
        self.initialized = true;
        Ok(())
    }

    async fn send_message(&mut self, request: &DeliveryRequest) -> Result<()> {
        validate_recipient(&request.recipient)?;

        if let Some(image) = &request.image {
            if !image.exists() {
                return Err(SendloomError::Transport(format!(
                    "Image file not found: {}",
                    image.display()
                )));
            }
        }
        if request.message.is_empty() && request.image.is_none() {
            return Err(SendloomError::Transport(
                "Nothing to send: empty message and no image".into(),
            ));
        }

        let composer = self.open_chat(&request.recipient).await?;

        if !request.message.is_empty() {
            self.driver.send_keys(&composer, &request.message).await?;
            self.driver
                .send_keys(&composer, &KEY_ENTER.to_string())
                .await?;
        }
        if let Some(image) = &request.image {
            self.attach_image(image, request.caption.as_deref()).await?;
        }

        self.confirm_delivery(&request.recipient).await?;
        tracing::debug!("Delivery confirmed for {}", request.recipient);
        Ok(())
    }

    async fn take_screenshot(&mut self, label: &str) -> Option<PathBuf> {
        let dir = PathBuf::from(shellexpand::tilde(&self.config.screenshot_dir).to_string());
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!("Screenshot dir unavailable: {e}");
            return None;
        }
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S");
        let path = dir.join(format!("{label}-{stamp}.png"));
        match self.driver.screenshot_png().await {
            Ok(bytes) => match std::fs::write(&path, bytes) {
                Ok(()) => {
                    tracing::info!("Screenshot saved: {}", path.display());
                    Some(path)
                }
                Err(e) => {
                    tracing::warn!("Screenshot write failed: {e}");
                    None
                }
            },
            Err(e) => {
                tracing::warn!("Screenshot capture failed: {e}");
                None
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.initialized = false;
        self.driver.delete_session().await
    }

    async fn is_running(&self) -> bool {
        self.driver.is_alive().await
    }
}
