//! Browser Driver boundary.
//!
//! Everything the automation core needs from a browser is expressed as the
//! [`BrowserDriver`] trait and injected into the engine; no global browser
//! handle. The production implementation is [`cdp::CdpDriver`] over a native
//! Chromium via `chromiumoxide`; tests drive the core with a scripted mock.
//!
//! Every method may fail; the core catches per-call and never assumes
//! success.

pub mod cdp;
pub mod launch;

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;

/// Raw snapshot of one DOM element, as probed through the driver. The field
/// classifier consumes these; it never touches the live DOM directly.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ElementInfo {
    /// Lower-cased tag name (`input`, `select`, `textarea`, …).
    pub tag: String,
    /// Attribute map (`type`, `name`, `id`, `placeholder`, `class`, …).
    pub attrs: HashMap<String, String>,
    /// Trimmed visible text content.
    pub text: String,
}

impl ElementInfo {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(|s| s.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("selector error for {selector}: {message}")]
    Selector { selector: String, message: String },
    #[error("element interaction failed for {selector}: {message}")]
    Interaction { selector: String, message: String },
    #[error("screenshot failed: {0}")]
    Screenshot(String),
    #[error("browser unavailable: {0}")]
    Unavailable(String),
}

/// The driver capability consumed by the automation core (detection,
/// classification, filling, CAPTCHA scanning). One instance per automation
/// pipeline; calls are never issued concurrently.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Navigate to `url` and wait for the load/network-idle signal.
    async fn goto(&self, url: &str) -> Result<(), DriverError>;

    async fn current_url(&self) -> Result<String, DriverError>;

    async fn title(&self) -> Result<String, DriverError>;

    /// Snapshot all elements matching a CSS selector.
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementInfo>, DriverError>;

    /// Whether the first element matching `selector` is rendered visible.
    async fn is_visible(&self, selector: &str) -> Result<bool, DriverError>;

    /// Trimmed text content of the first element matching `selector`.
    /// Errors when nothing matches.
    async fn text_content(&self, selector: &str) -> Result<String, DriverError>;

    async fn click(&self, selector: &str) -> Result<(), DriverError>;

    async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError>;

    async fn set_input_files(&self, selector: &str, path: &Path) -> Result<(), DriverError>;

    async fn check(&self, selector: &str) -> Result<(), DriverError>;

    async fn is_checked(&self, selector: &str) -> Result<bool, DriverError>;

    async fn select_by_label(&self, selector: &str, label: &str) -> Result<(), DriverError>;

    async fn select_by_value(&self, selector: &str, value: &str) -> Result<(), DriverError>;

    /// Wait for the DOM to settle after an in-page action (apply-button
    /// click, step navigation).
    async fn wait_until_settled(&self) -> Result<(), DriverError>;

    /// Capture a screenshot to `path`.
    async fn screenshot(&self, path: &Path) -> Result<(), DriverError>;

    /// Full visible text of the page body, for phrase-based scanning.
    async fn page_text(&self) -> Result<String, DriverError>;
}
