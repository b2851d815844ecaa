//! Screenshot path generation and best-effort capture.

use crate::browser::BrowserDriver;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

/// Timestamped, collision-free screenshot path under `dir`.
pub fn screenshot_path(dir: &Path, tag: &str) -> PathBuf {
    let stamp = Utc::now().format("%Y%m%d-%H%M%S");
    let token = Uuid::new_v4().simple().to_string();
    dir.join(format!("{}-{}-{}.png", tag, stamp, &token[..8]))
}

/// Capture a screenshot, returning the saved path. Failures are logged and
/// swallowed; screenshots are diagnostics, never a reason to fail a run.
pub async fn capture(driver: &dyn BrowserDriver, dir: &Path, tag: &str) -> Option<String> {
    let path = screenshot_path(dir, tag);
    match driver.screenshot(&path).await {
        Ok(()) => Some(path.to_string_lossy().to_string()),
        Err(e) => {
            warn!("screenshot '{}' failed: {}", tag, e);
            None
        }
    }
}
