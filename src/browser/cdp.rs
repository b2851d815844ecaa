//! `chromiumoxide`-backed implementation of the [`BrowserDriver`] boundary.
//!
//! One `CdpDriver` owns one browser process and one page; the orchestration
//! loop never issues two calls concurrently, so no per-call locking is
//! needed beyond the browser handle itself. DOM probing goes through small
//! JS snippets evaluated in the page; the classifier works on the returned
//! snapshots, never on live handles.

use super::launch;
use super::{BrowserDriver, DriverError, ElementInfo};
use crate::core::config::PilotConfig;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use std::path::Path;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct CdpDriver {
    browser: Mutex<Browser>,
    page: Page,
    handler: JoinHandle<()>,
    settle_quiet_ms: u64,
    settle_timeout_ms: u64,
}

impl CdpDriver {
    /// Launch a browser process and open the automation page.
    pub async fn launch(config: &PilotConfig) -> Result<Self> {
        let exe = config
            .resolve_chrome_executable()
            .or_else(launch::find_chrome_executable)
            .ok_or_else(|| {
                anyhow!(
                    "No browser found. Install Chrome, Chromium, or Brave, or set \
                     CHROME_EXECUTABLE to the binary path."
                )
            })?;

        info!("launching browser: {} (headless: {})", exe, config.resolve_headless());

        let browser_config =
            launch::build_browser_config(&exe, config.resolve_headless(), 1280, 900)?;

        let (browser, mut cdp_handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| anyhow!("Failed to launch browser ({}): {}", exe, e))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = cdp_handler.next().await {
                if let Err(e) = event {
                    warn!("CDP handler error: {}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| anyhow!("Failed to open page: {}", e))?;

        Ok(Self {
            browser: Mutex::new(browser),
            page,
            handler,
            settle_quiet_ms: config.resolve_settle_quiet_ms(),
            settle_timeout_ms: config.resolve_settle_timeout_ms(),
        })
    }

    /// Gracefully close the browser process.
    pub async fn shutdown(&self) {
        let mut guard = self.browser.lock().await;
        if let Err(e) = guard.close().await {
            warn!("Browser close error (non-fatal): {}", e);
        }
        self.handler.abort();
    }

    /// Evaluate a JS expression and decode its JSON result.
    async fn eval_json(&self, js: &str) -> Result<serde_json::Value, DriverError> {
        self.page
            .evaluate(js)
            .await
            .map_err(|e| DriverError::Interaction {
                selector: "<eval>".into(),
                message: e.to_string(),
            })?
            .into_value::<serde_json::Value>()
            .map_err(|e| DriverError::Interaction {
                selector: "<eval>".into(),
                message: format!("result decode: {}", e),
            })
    }
}

/// Escape a Rust string into a JS string literal.
fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

#[async_trait]
impl BrowserDriver for CdpDriver {
    async fn goto(&self, url: &str) -> Result<(), DriverError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation(format!("{}: {}", url, e)))?;
        launch::wait_until_stable(&self.page, self.settle_quiet_ms, self.settle_timeout_ms)
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        self.page
            .url()
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?
            .ok_or_else(|| DriverError::Navigation("no current url".into()))
    }

    async fn title(&self) -> Result<String, DriverError> {
        Ok(self
            .page
            .get_title()
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?
            .unwrap_or_default())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<ElementInfo>, DriverError> {
        let js = format!(
            r#"(() => {{
    try {{
        return Array.from(document.querySelectorAll({sel})).map(el => {{
            const attrs = {{}};
            for (const a of el.attributes) attrs[a.name] = a.value;
            return {{
                tag: el.tagName.toLowerCase(),
                attrs,
                text: (el.innerText || el.textContent || '').trim().slice(0, 300),
            }};
        }});
    }} catch (e) {{
        return null;
    }}
}})()"#,
            sel = js_str(selector)
        );
        let value = self.eval_json(&js).await?;
        if value.is_null() {
            return Err(DriverError::Selector {
                selector: selector.to_string(),
                message: "unsupported selector syntax".into(),
            });
        }
        serde_json::from_value(value).map_err(|e| DriverError::Selector {
            selector: selector.to_string(),
            message: format!("snapshot decode: {}", e),
        })
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, DriverError> {
        let js = format!(
            r#"(() => {{
    const el = document.querySelector({sel});
    if (!el) return false;
    const style = window.getComputedStyle(el);
    if (style.display === 'none' || style.visibility === 'hidden') return false;
    if (parseFloat(style.opacity) === 0) return false;
    const rect = el.getBoundingClientRect();
    return rect.width > 1 && rect.height > 1;
}})()"#,
            sel = js_str(selector)
        );
        Ok(self.eval_json(&js).await?.as_bool().unwrap_or(false))
    }

    async fn text_content(&self, selector: &str) -> Result<String, DriverError> {
        let js = format!(
            r#"(() => {{
    const el = document.querySelector({sel});
    return el ? (el.innerText || el.textContent || '').trim() : null;
}})()"#,
            sel = js_str(selector)
        );
        match self.eval_json(&js).await? {
            serde_json::Value::String(s) => Ok(s),
            _ => Err(DriverError::Selector {
                selector: selector.to_string(),
                message: "no element matched".into(),
            }),
        }
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        let el = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| DriverError::Selector {
                selector: selector.to_string(),
                message: e.to_string(),
            })?;
        el.click().await.map_err(|e| DriverError::Interaction {
            selector: selector.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError> {
        // Focus first so the page's own handlers see a plausible sequence.
        let el = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| DriverError::Selector {
                selector: selector.to_string(),
                message: e.to_string(),
            })?;
        el.click().await.ok();

        // Set the value directly and fire input/change so framework-bound
        // forms (React/Vue controlled inputs) pick it up.
        let js = format!(
            r#"(() => {{
    const el = document.querySelector({sel});
    if (!el) return false;
    el.value = {val};
    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
    return true;
}})()"#,
            sel = js_str(selector),
            val = js_str(value)
        );
        if self.eval_json(&js).await?.as_bool() != Some(true) {
            return Err(DriverError::Interaction {
                selector: selector.to_string(),
                message: "element disappeared before fill".into(),
            });
        }
        Ok(())
    }

    async fn set_input_files(&self, selector: &str, path: &Path) -> Result<(), DriverError> {
        use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;

        let el = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| DriverError::Selector {
                selector: selector.to_string(),
                message: e.to_string(),
            })?;

        let params = SetFileInputFilesParams::builder()
            .files(vec![path.to_string_lossy().to_string()])
            .backend_node_id(el.backend_node_id)
            .build()
            .map_err(|e| DriverError::Interaction {
                selector: selector.to_string(),
                message: e,
            })?;

        self.page
            .execute(params)
            .await
            .map_err(|e| DriverError::Interaction {
                selector: selector.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn check(&self, selector: &str) -> Result<(), DriverError> {
        if self.is_checked(selector).await? {
            return Ok(());
        }
        self.click(selector).await
    }

    async fn is_checked(&self, selector: &str) -> Result<bool, DriverError> {
        let js = format!(
            "(() => {{ const el = document.querySelector({sel}); return el ? !!el.checked : false; }})()",
            sel = js_str(selector)
        );
        Ok(self.eval_json(&js).await?.as_bool().unwrap_or(false))
    }

    async fn select_by_label(&self, selector: &str, label: &str) -> Result<(), DriverError> {
        let js = format!(
            r#"(() => {{
    const el = document.querySelector({sel});
    if (!el || el.tagName.toLowerCase() !== 'select') return false;
    const want = {val}.trim().toLowerCase();
    for (const opt of el.options) {{
        if ((opt.label || opt.text || '').trim().toLowerCase() === want) {{
            el.value = opt.value;
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return true;
        }}
    }}
    return false;
}})()"#,
            sel = js_str(selector),
            val = js_str(label)
        );
        if self.eval_json(&js).await?.as_bool() == Some(true) {
            Ok(())
        } else {
            Err(DriverError::Interaction {
                selector: selector.to_string(),
                message: format!("no option with label {:?}", label),
            })
        }
    }

    async fn select_by_value(&self, selector: &str, value: &str) -> Result<(), DriverError> {
        let js = format!(
            r#"(() => {{
    const el = document.querySelector({sel});
    if (!el || el.tagName.toLowerCase() !== 'select') return false;
    const want = {val};
    for (const opt of el.options) {{
        if (opt.value === want) {{
            el.value = opt.value;
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return true;
        }}
    }}
    return false;
}})()"#,
            sel = js_str(selector),
            val = js_str(value)
        );
        if self.eval_json(&js).await?.as_bool() == Some(true) {
            Ok(())
        } else {
            Err(DriverError::Interaction {
                selector: selector.to_string(),
                message: format!("no option with value {:?}", value),
            })
        }
    }

    async fn wait_until_settled(&self) -> Result<(), DriverError> {
        launch::wait_until_stable(&self.page, self.settle_quiet_ms, self.settle_timeout_ms)
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))
    }

    async fn screenshot(&self, path: &Path) -> Result<(), DriverError> {
        use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
        use chromiumoxide::page::ScreenshotParams;

        let bytes = self
            .page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .full_page(false)
                    .build(),
            )
            .await
            .map_err(|e| DriverError::Screenshot(e.to_string()))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DriverError::Screenshot(format!("{}: {}", parent.display(), e)))?;
        }
        tokio::fs::write(path, &bytes)
            .await
            .map_err(|e| DriverError::Screenshot(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }

    async fn page_text(&self) -> Result<String, DriverError> {
        let js = "(() => (document.body && document.body.innerText) || '')()";
        match self.eval_json(js).await? {
            serde_json::Value::String(s) => Ok(s),
            _ => Ok(String::new()),
        }
    }
}
