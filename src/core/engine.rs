//! The automation engine handle.
//!
//! Owns the injected browser driver and board registry and exposes the
//! per-page operations the surrounding application (and the batch loop)
//! consume. The driver is session-scoped and passed in at construction;
//! no global browser state.

use crate::automation::{captcha, detect, mapper};
use crate::boards::{BoardRegistry, JobBoardProfile, LocatorStrategy};
use crate::browser::BrowserDriver;
use crate::core::config::PilotConfig;
use crate::core::error::AutomationError;
use crate::core::types::{CaptchaDetection, DetectionResult, FillResult, UserProfile};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub struct AutomationEngine {
    driver: Arc<dyn BrowserDriver>,
    boards: Arc<BoardRegistry>,
    shot_dir: PathBuf,
}

impl AutomationEngine {
    pub fn new(driver: Arc<dyn BrowserDriver>, boards: Arc<BoardRegistry>, config: &PilotConfig) -> Self {
        Self {
            driver,
            boards,
            shot_dir: config.resolve_screenshot_dir(),
        }
    }

    pub fn boards(&self) -> &Arc<BoardRegistry> {
        &self.boards
    }

    pub fn driver(&self) -> &Arc<dyn BrowserDriver> {
        &self.driver
    }

    /// Resolve the job-board profile for a URL. `None` means "no resolvable
    /// profile" (the generic fallback is disabled); callers proceed under
    /// built-in generic defaults.
    pub fn board_profile_for(&self, url: &str) -> Option<JobBoardProfile> {
        self.boards.resolve(url)
    }

    /// Navigate to a job URL and detect its application form.
    pub async fn detect_job_page(&self, url: &str) -> DetectionResult {
        let board = self.boards.resolve(url);
        detect::detect_application_form(self.driver.as_ref(), url, board.as_ref(), &self.shot_dir)
            .await
    }

    /// Navigate, detect, map the detected fields against `profile`, and
    /// fill them. Returns the structured fill outcome; an empty profile or
    /// a failed navigation/detection is an error, never a silent no-op.
    pub async fn auto_fill_form(
        &self,
        url: &str,
        profile: &UserProfile,
        resume_path: Option<&Path>,
    ) -> Result<FillResult, AutomationError> {
        if profile.is_empty() && resume_path.is_none() {
            return Err(AutomationError::MissingProfile);
        }
        let detection = self.detect_job_page(url).await;
        if !detection.success {
            return Err(AutomationError::DetectionFailed(
                detection.errors.join("; "),
            ));
        }
        Ok(self
            .fill_detected(&detection.fields, profile, resume_path)
            .await)
    }

    /// Map and fill already-detected fields on the current page.
    pub async fn fill_detected(
        &self,
        fields: &[crate::core::types::FormField],
        profile: &UserProfile,
        resume_path: Option<&Path>,
    ) -> FillResult {
        let mappings = mapper::map_fields(fields, profile, resume_path);
        info!(
            "mapped {} of {} detected fields",
            mappings.len(),
            fields.len()
        );
        mapper::apply_mappings(self.driver.as_ref(), &mappings, &self.shot_dir).await
    }

    /// Navigate to a URL and scan it for anti-bot challenges.
    pub async fn detect_captcha(&self, url: &str) -> Result<CaptchaDetection, AutomationError> {
        self.driver
            .goto(url)
            .await
            .map_err(|e| AutomationError::Navigation(e.to_string()))?;
        Ok(self.scan_captcha().await)
    }

    /// Scan the currently loaded page for anti-bot challenges (pre-flight
    /// check inside the batch pipeline, no extra navigation).
    pub async fn scan_captcha(&self) -> CaptchaDetection {
        captcha::detect_captcha_on_page(self.driver.as_ref(), &self.shot_dir).await
    }

    /// Locate and click the submit/next control on the current page, using
    /// the board's navigation candidates ahead of the generic ones.
    pub async fn submit_application(
        &self,
        board: Option<&JobBoardProfile>,
    ) -> Result<(), AutomationError> {
        let mut strategies: Vec<LocatorStrategy> = board
            .map(|b| b.selectors.next_button.clone())
            .unwrap_or_default();
        strategies.extend(JobBoardProfile::generic().selectors.next_button);

        let selector = detect::locate_control(self.driver.as_ref(), &strategies)
            .await
            .ok_or_else(|| AutomationError::SubmitFailed("no submit control matched".into()))?;

        self.driver
            .click(&selector)
            .await
            .map_err(|e| AutomationError::SubmitFailed(format!("{}: {}", selector, e)))?;
        if let Err(e) = self.driver.wait_until_settled().await {
            info!("post-submit settle: {}", e);
        }
        Ok(())
    }
}
