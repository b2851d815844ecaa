use crate::browser::DriverError;
use crate::core::types::CaptchaKind;
use crate::storage::StoreError;

/// Job-level errors thrown from the per-job pipeline. The batch loop
/// catches these, logs them, and either moves on or, with `stop_on_error`,
/// terminates the session. Field- and selector-level problems never
/// surface here; they are absorbed into result objects.
#[derive(Debug, thiserror::Error)]
pub enum AutomationError {
    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("job {0} has no url")]
    MissingUrl(String),

    #[error("user profile is empty — nothing to fill")]
    MissingProfile,

    #[error("application form not detected: {0}")]
    DetectionFailed(String),

    #[error("anti-bot challenge detected: {kind:?} (confidence {confidence})")]
    CaptchaDetected { kind: CaptchaKind, confidence: f64 },

    #[error("submit failed: {0}")]
    SubmitFailed(String),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
