//! Minimal W3C WebDriver client.
//!
//! Speaks the WebDriver wire protocol (plain HTTP + JSON) against a local
//! chromedriver. Only the handful of commands the WhatsApp transport needs:
//! session lifecycle, navigation, element lookup, keys, script execution and
//! screenshots.

use serde_json::{json, Value};

use sendloom_core::error::{Result, SendloomError};

/// W3C element identifier key in find-element responses.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Keyboard code point for the Enter key in WebDriver `sendKeys`.
pub const KEY_ENTER: char = '\u{E007}';

pub struct WebDriverClient {
    base_url: String,
    client: reqwest::Client,
    session_id: Option<String>,
}

impl WebDriverClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            session_id: None,
        }
    }

    pub fn has_session(&self) -> bool {
        self.session_id.is_some()
    }

    /// Start a session with the given capabilities.
    pub async fn new_session(&mut self, capabilities: Value) -> Result<()> {
        let body = json!({ "capabilities": { "alwaysMatch": capabilities } });
        let value = self.post("/session", &body).await?;
        let session_id = value["sessionId"]
            .as_str()
            .or_else(|| value["value"]["sessionId"].as_str())
            .ok_or_else(|| {
                SendloomError::Transport("WebDriver response missing sessionId".into())
            })?
            .to_string();
        tracing::debug!("WebDriver session started: {session_id}");
        self.session_id = Some(session_id);
        Ok(())
    }

    /// End the session. Safe to call when no session is active.
    pub async fn delete_session(&mut self) -> Result<()> {
        if let Some(id) = self.session_id.take() {
            let url = format!("{}/session/{id}", self.base_url);
            self.client
                .delete(&url)
                .send()
                .await
                .map_err(|e| SendloomError::Transport(format!("WebDriver disconnect failed: {e}")))?;
            tracing::debug!("WebDriver session closed: {id}");
        }
        Ok(())
    }

    /// Probe the driver and session liveness.
    pub async fn is_alive(&self) -> bool {
        let Some(id) = &self.session_id else {
            return false;
        };
        let url = format!("{}/session/{id}/url", self.base_url);
        matches!(self.client.get(&url).send().await, Ok(r) if r.status().is_success())
    }

    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.session_post("/url", &json!({ "url": url })).await?;
        Ok(())
    }

    /// Find a single element by CSS selector; returns the element id.
    pub async fn find_element(&self, css: &str) -> Result<String> {
        let value = self
            .session_post(
                "/element",
                &json!({ "using": "css selector", "value": css }),
            )
            .await?;
        value["value"][ELEMENT_KEY]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| SendloomError::Transport(format!("Element not found: {css}")))
    }

    /// Element lookup that maps "not found" to None instead of an error.
    pub async fn find_optional(&self, css: &str) -> Option<String> {
        self.find_element(css).await.ok()
    }

    pub async fn click(&self, element_id: &str) -> Result<()> {
        self.session_post(&format!("/element/{element_id}/click"), &json!({}))
            .await?;
        Ok(())
    }

    pub async fn send_keys(&self, element_id: &str, text: &str) -> Result<()> {
        self.session_post(
            &format!("/element/{element_id}/value"),
            &json!({ "text": text }),
        )
        .await?;
        Ok(())
    }

    /// Execute synchronous JavaScript in the page; returns the script value.
    pub async fn execute_script(&self, script: &str, args: Value) -> Result<Value> {
        let value = self
            .session_post("/execute/sync", &json!({ "script": script, "args": args }))
            .await?;
        Ok(value["value"].clone())
    }

    /// Capture the viewport as PNG bytes.
    pub async fn screenshot_png(&self) -> Result<Vec<u8>> {
        let id = self.require_session()?;
        let url = format!("{}/session/{id}/screenshot", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SendloomError::Transport(format!("Screenshot request failed: {e}")))?;
        let value: Value = response
            .json()
            .await
            .map_err(|e| SendloomError::Transport(format!("Invalid screenshot response: {e}")))?;
        let encoded = value["value"]
            .as_str()
            .ok_or_else(|| SendloomError::Transport("Screenshot response missing data".into()))?;
        use base64::Engine;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| SendloomError::Transport(format!("Screenshot decode failed: {e}")))
    }

    fn require_session(&self) -> Result<&str> {
        self.session_id
            .as_deref()
            .ok_or_else(|| SendloomError::Transport("No active WebDriver session".into()))
    }

    async fn session_post(&self, path: &str, body: &Value) -> Result<Value> {
        let id = self.require_session()?;
        self.post(&format!("/session/{id}{path}"), body).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| SendloomError::Transport(format!("WebDriver request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SendloomError::Transport(format!(
                "WebDriver error {status} on {path}: {error_text}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| SendloomError::Transport(format!("Invalid WebDriver response: {e}")))
    }
}
