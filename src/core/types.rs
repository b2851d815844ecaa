use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ───────────────────────────────────────────────────────────────────────────
// Form detection & classification
// ───────────────────────────────────────────────────────────────────────────

/// Semantic kind of a detected form input.
///
/// Inference precedence: explicit `type` attribute first (`email`, `tel`,
/// `file`, `checkbox`, `radio`), then tag (`textarea`, `select`), then `Text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Email,
    Phone,
    File,
    Checkbox,
    Radio,
    Select,
    Textarea,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Email => "email",
            FieldKind::Phone => "phone",
            FieldKind::File => "file",
            FieldKind::Checkbox => "checkbox",
            FieldKind::Radio => "radio",
            FieldKind::Select => "select",
            FieldKind::Textarea => "textarea",
        }
    }
}

/// One detected form input. Immutable once produced by the classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormField {
    pub kind: FieldKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub required: bool,
    /// Locator string valid against the browser driver.
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Outcome of attempting to open/locate an application form for one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    pub success: bool,
    pub apply_control_found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_control_selector: Option<String>,
    pub fields: Vec<FormField>,
    pub page_title: String,
    pub page_url: String,
    /// Paths in capture order: post-navigation, then post-click when an
    /// apply control was invoked. Opaque to callers.
    #[serde(default)]
    pub screenshots: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

// ───────────────────────────────────────────────────────────────────────────
// Field → profile mapping
// ───────────────────────────────────────────────────────────────────────────

/// Pairing of one detected field to one profile attribute with a confidence
/// score. Multiple mappings may reference the same profile field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMapping {
    pub field: FormField,
    /// Profile attribute identifier, e.g. `"email"`.
    pub profile_field: String,
    pub value: String,
    /// Fixed per-attribute confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Result of applying mappings to a live page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FillResult {
    pub success: bool,
    /// Selectors that were filled.
    pub filled: Vec<String>,
    /// Selectors that could not be filled (error or skipped upload).
    pub unfilled: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub screenshots: Vec<String>,
}

// ───────────────────────────────────────────────────────────────────────────
// CAPTCHA detection
// ───────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptchaKind {
    Recaptcha,
    Hcaptcha,
    Cloudflare,
    Turnstile,
    Unknown,
}

/// Anti-bot challenge detection result.
///
/// When `detected` is false, `kind` carries no meaning and must not be
/// trusted by callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptchaDetection {
    pub detected: bool,
    pub kind: CaptchaKind,
    pub confidence: f64,
    /// Matched selectors / matched visible-text phrases.
    pub indicators: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_path: Option<String>,
    pub page_url: String,
    pub detected_at: DateTime<Utc>,
}

// ───────────────────────────────────────────────────────────────────────────
// Applicant profile & job records
// ───────────────────────────────────────────────────────────────────────────

/// Applicant attributes the mapper draws values from. All optional; a
/// missing attribute simply produces no mapping for fields that match it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
    #[serde(default)]
    pub portfolio: Option<String>,
}

impl UserProfile {
    /// True when no attribute carries a value, i.e. there is nothing to fill.
    pub fn is_empty(&self) -> bool {
        [
            &self.first_name,
            &self.last_name,
            &self.email,
            &self.phone,
            &self.location,
            &self.linkedin,
            &self.portfolio,
        ]
        .iter()
        .all(|attr| attr.as_deref().map_or(true, |v| v.trim().is_empty()))
    }

    /// "First Last" when both parts are present, otherwise whichever exists.
    pub fn full_name(&self) -> Option<String> {
        match (&self.first_name, &self.last_name) {
            (Some(f), Some(l)) => Some(format!("{} {}", f, l)),
            (Some(f), None) => Some(f.clone()),
            (None, Some(l)) => Some(l.clone()),
            (None, None) => None,
        }
    }
}

/// Job row as consumed from the storage collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_hint: Option<String>,
}

/// Per detection/fill/submit attempt, written back to the storage
/// collaborator for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationAttempt {
    pub job_id: String,
    /// `detect` / `fill` / `submit`.
    pub stage: String,
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Request for a human to take over a job the engine cannot finish on its
/// own (an anti-bot challenge, typically). Persisted by the storage
/// collaborator; surfaced to the user out of scope of this engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualAssistRequest {
    pub job_id: String,
    pub url: String,
    pub reason: String,
    pub requested_at: DateTime<Utc>,
}

// ───────────────────────────────────────────────────────────────────────────
// Batch orchestration
// ───────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Running,
    Paused,
    Stopped,
    Completed,
    Failed,
}

impl BatchStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchStatus::Stopped | BatchStatus::Completed | BatchStatus::Failed
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSettings {
    /// Cap on successful applications for the session.
    pub max_applications: usize,
    /// Inter-job delay fallback bounds (seconds), used when the resolved
    /// board profile carries no rate limit.
    pub delay_min_seconds: u64,
    pub delay_max_seconds: u64,
    pub auto_submit: bool,
    pub stop_on_error: bool,
    /// Additional attempts per job after a first failure.
    pub retry_attempts: u32,
    pub dry_run: bool,
    /// Board profile ids eligible for processing. Jobs resolving to a
    /// profile outside this list are skipped; jobs with no resolvable
    /// profile are processed under generic defaults.
    pub enabled_board_ids: Vec<String>,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_applications: 50,
            delay_min_seconds: 30,
            delay_max_seconds: 120,
            auto_submit: false,
            stop_on_error: false,
            retry_attempts: 0,
            dry_run: false,
            enabled_board_ids: vec![
                "linkedin".into(),
                "indeed".into(),
                "greenhouse".into(),
                "lever".into(),
                "workday".into(),
                "generic".into(),
            ],
        }
    }
}

/// Per-board slice of the aggregated results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoardBreakdown {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub average_time_seconds: f64,
}

/// Computed once when the processing loop exits; never recomputed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResults {
    /// Percentage of processed (non-skipped) jobs that succeeded.
    pub success_rate: f64,
    pub average_time_per_job_seconds: f64,
    pub total_time_seconds: f64,
    pub common_failures: Vec<String>,
    pub job_board_breakdown: HashMap<String, BoardBreakdown>,
}

/// One batch run over a list of jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSession {
    pub id: String,
    pub status: BatchStatus,
    pub total_jobs: usize,
    pub completed_jobs: usize,
    pub failed_jobs: usize,
    pub skipped_jobs: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub settings: BatchSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<BatchResults>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Success,
}

/// Append-only batch event; emitted on the session event stream, not
/// stored as session state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchLog {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl BatchLog {
    pub fn new(level: LogLevel, message: impl Into<String>, job_id: Option<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            job_id,
            details: None,
        }
    }
}

/// Typed event-channel payload for live progress observation. Consumers
/// subscribe deliberately via `BatchManager::subscribe`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BatchEvent {
    Log { session_id: String, log: BatchLog },
    SessionUpdated { session: BatchSession },
}

/// Snapshot returned by `get_progress`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionProgress {
    pub percentage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_job_id: Option<String>,
    pub logs: Vec<BatchLog>,
}
