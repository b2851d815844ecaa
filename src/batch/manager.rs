//! The batch session manager.
//!
//! Drives strictly-sequential processing of a job list through the
//! automation engine: profile resolution and board filtering, the
//! detect → captcha-check → fill → submit pipeline, per-job retries,
//! rate-limited inter-job delays, pause/resume/stop control, and result
//! aggregation. One session runs one pipeline; never two pages at once.

use super::session::{self, ControlSignal, SessionHandle};
use crate::boards::{JobBoardProfile, GENERIC_BOARD_ID};
use crate::core::engine::AutomationEngine;
use crate::core::error::AutomationError;
use crate::core::types::{
    AutomationAttempt, BatchEvent, BatchLog, BatchResults, BatchSession, BatchSettings,
    BatchStatus, BoardBreakdown, JobRecord, LogLevel, ManualAssistRequest, SessionProgress,
    UserProfile,
};
use crate::storage::JobStore;
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use uuid::Uuid;

pub struct BatchManager {
    engine: Arc<AutomationEngine>,
    store: Arc<dyn JobStore>,
    sessions: Mutex<HashMap<String, Arc<SessionHandle>>>,
    events: broadcast::Sender<BatchEvent>,
}

impl BatchManager {
    pub fn new(engine: Arc<AutomationEngine>, store: Arc<dyn JobStore>) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            engine,
            store,
            sessions: Mutex::new(HashMap::new()),
            events,
        })
    }

    /// Subscribe to the live event stream (`Log` + `SessionUpdated`).
    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.events.subscribe()
    }

    /// Create a session, transition it to `running`, and kick off
    /// asynchronous sequential processing. Returns the session id without
    /// waiting for completion; an error escaping the processing loop marks
    /// the session `failed`.
    pub fn start_session(
        self: &Arc<Self>,
        job_ids: Vec<String>,
        settings: BatchSettings,
        profile: UserProfile,
        resume_path: Option<PathBuf>,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        let session = BatchSession {
            id: id.clone(),
            status: BatchStatus::Pending,
            total_jobs: job_ids.len(),
            completed_jobs: 0,
            failed_jobs: 0,
            skipped_jobs: 0,
            current_job_id: None,
            started_at: None,
            completed_at: None,
            settings: settings.clone(),
            results: None,
        };

        let (control, _) = tokio::sync::watch::channel(ControlSignal::Run);
        let handle = Arc::new(SessionHandle {
            state: Mutex::new(session),
            control,
            recent_logs: Mutex::new(Default::default()),
        });
        self.sessions
            .lock()
            .unwrap()
            .insert(id.clone(), Arc::clone(&handle));

        session::try_start(&mut handle.state.lock().unwrap());
        self.log(
            &handle,
            LogLevel::Info,
            format!("batch session started ({} jobs)", job_ids.len()),
            None,
        );
        self.emit_session(&handle);

        let manager = Arc::clone(self);
        let task_handle = Arc::clone(&handle);
        tokio::spawn(async move {
            if let Err(e) = manager
                .run_loop(&task_handle, job_ids, settings, profile, resume_path)
                .await
            {
                {
                    let mut state = task_handle.state.lock().unwrap();
                    state.status = BatchStatus::Failed;
                    state.completed_at = Some(Utc::now());
                    state.current_job_id = None;
                }
                manager.log(
                    &task_handle,
                    LogLevel::Error,
                    format!("session failed: {}", e),
                    None,
                );
                manager.emit_session(&task_handle);
            }
        });

        id
    }

    /// `running → paused`. Takes effect at the next job boundary; the
    /// in-flight job finishes naturally. No-op from any other state.
    pub fn pause_session(&self, session_id: &str) {
        let Some(handle) = self.handle(session_id) else {
            return;
        };
        if session::try_pause(&mut handle.state.lock().unwrap()) {
            let _ = handle.control.send(ControlSignal::Pause);
            self.log(&handle, LogLevel::Info, "session paused", None);
            self.emit_session(&handle);
        }
    }

    /// `paused → running`. No-op from any other state.
    pub fn resume_session(&self, session_id: &str) {
        let Some(handle) = self.handle(session_id) else {
            return;
        };
        if session::try_resume(&mut handle.state.lock().unwrap()) {
            let _ = handle.control.send(ControlSignal::Run);
            self.log(&handle, LogLevel::Info, "session resumed", None);
            self.emit_session(&handle);
        }
    }

    /// `running|paused → stopped`, the only cancellation primitive, and it
    /// is cooperative: the loop observes it at the next boundary check.
    pub fn stop_session(&self, session_id: &str) {
        let Some(handle) = self.handle(session_id) else {
            return;
        };
        if session::try_stop(&mut handle.state.lock().unwrap()) {
            let _ = handle.control.send(ControlSignal::Stop);
            self.log(&handle, LogLevel::Info, "session stopped", None);
            self.emit_session(&handle);
        }
    }

    pub fn get_session(&self, session_id: &str) -> Option<BatchSession> {
        self.handle(session_id)
            .map(|h| h.state.lock().unwrap().clone())
    }

    pub fn get_progress(&self, session_id: &str) -> Option<SessionProgress> {
        let handle = self.handle(session_id)?;
        let (percentage, current_job_id) = {
            let state = handle.state.lock().unwrap();
            let visited = state.completed_jobs + state.failed_jobs + state.skipped_jobs;
            let pct = if state.total_jobs == 0 {
                100.0
            } else {
                visited as f64 / state.total_jobs as f64 * 100.0
            };
            (pct, state.current_job_id.clone())
        };
        let logs = handle.recent_logs.lock().unwrap().iter().cloned().collect();
        Some(SessionProgress {
            percentage,
            current_job_id,
            logs,
        })
    }

    /// Aggregated results, available once the session reached a terminal
    /// state.
    pub fn get_results(&self, session_id: &str) -> Option<BatchResults> {
        self.handle(session_id)
            .and_then(|h| h.state.lock().unwrap().results.clone())
    }

    fn handle(&self, session_id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.lock().unwrap().get(session_id).cloned()
    }

    // ── processing loop ─────────────────────────────────────────────────────

    async fn run_loop(
        &self,
        handle: &Arc<SessionHandle>,
        job_ids: Vec<String>,
        settings: BatchSettings,
        profile: UserProfile,
        resume_path: Option<PathBuf>,
    ) -> Result<(), anyhow::Error> {
        let session_start = Instant::now();
        let mut control_rx = handle.control.subscribe();
        let total = job_ids.len();

        let mut breakdown: HashMap<String, BoardBreakdown> = HashMap::new();
        let mut board_seconds: HashMap<String, f64> = HashMap::new();
        let mut job_seconds: Vec<f64> = Vec::new();
        let mut failures: Vec<String> = Vec::new();

        'jobs: for (index, job_id) in job_ids.iter().enumerate() {
            // Boundary check: stop breaks out; pause waits for a wake-up
            // and a stop received while paused also breaks out.
            loop {
                let signal = *control_rx.borrow_and_update();
                match signal {
                    ControlSignal::Stop => break 'jobs,
                    ControlSignal::Run => break,
                    ControlSignal::Pause => {
                        if control_rx.changed().await.is_err() {
                            break 'jobs;
                        }
                    }
                }
            }

            let completed_so_far = handle.state.lock().unwrap().completed_jobs;
            if completed_so_far >= settings.max_applications {
                self.log(
                    handle,
                    LogLevel::Info,
                    format!("application cap reached ({})", settings.max_applications),
                    None,
                );
                break 'jobs;
            }

            let job = match self.store.job(job_id).await {
                Ok(Some(job)) => job,
                Ok(None) => {
                    handle.state.lock().unwrap().skipped_jobs += 1;
                    self.log(
                        handle,
                        LogLevel::Warning,
                        "job not found — skipped",
                        Some(job_id.clone()),
                    );
                    self.emit_session(handle);
                    continue;
                }
                Err(e) => {
                    handle.state.lock().unwrap().skipped_jobs += 1;
                    self.log(
                        handle,
                        LogLevel::Warning,
                        format!("job lookup failed: {} — skipped", e),
                        Some(job_id.clone()),
                    );
                    self.emit_session(handle);
                    continue;
                }
            };

            let board = self.engine.board_profile_for(&job.url);
            if let Some(b) = &board {
                if !settings.enabled_board_ids.iter().any(|id| id == &b.id) {
                    handle.state.lock().unwrap().skipped_jobs += 1;
                    self.log(
                        handle,
                        LogLevel::Info,
                        format!("board '{}' not enabled — skipped", b.id),
                        Some(job.id.clone()),
                    );
                    self.emit_session(handle);
                    continue;
                }
            }
            let board_key = board
                .as_ref()
                .map(|b| b.id.clone())
                .unwrap_or_else(|| GENERIC_BOARD_ID.to_string());

            handle.state.lock().unwrap().current_job_id = Some(job.id.clone());
            self.log(
                handle,
                LogLevel::Info,
                format!("processing {}", job.url),
                Some(job.id.clone()),
            );
            self.emit_session(handle);

            let job_start = Instant::now();
            let outcome = if settings.dry_run {
                self.log(
                    handle,
                    LogLevel::Info,
                    format!("[dry run] would apply to {}", job.url),
                    Some(job.id.clone()),
                );
                Ok(())
            } else {
                let mut attempt = 0u32;
                loop {
                    match self
                        .process_job(&job, board.as_ref(), &settings, &profile, resume_path.as_deref())
                        .await
                    {
                        Ok(()) => break Ok(()),
                        Err(e) if attempt < settings.retry_attempts => {
                            attempt += 1;
                            self.log(
                                handle,
                                LogLevel::Warning,
                                format!(
                                    "attempt {} failed: {} — retrying ({} left)",
                                    attempt,
                                    e,
                                    settings.retry_attempts - attempt + 1
                                ),
                                Some(job.id.clone()),
                            );
                        }
                        Err(e) => break Err(e),
                    }
                }
            };

            let elapsed = job_start.elapsed().as_secs_f64();
            job_seconds.push(elapsed);
            *board_seconds.entry(board_key.clone()).or_default() += elapsed;
            let slot = breakdown.entry(board_key).or_default();
            slot.total += 1;

            let failed_now = match outcome {
                Ok(()) => {
                    slot.successful += 1;
                    {
                        let mut state = handle.state.lock().unwrap();
                        state.completed_jobs += 1;
                        state.current_job_id = None;
                    }
                    self.log(
                        handle,
                        LogLevel::Success,
                        format!("application completed ({:.1}s)", elapsed),
                        Some(job.id.clone()),
                    );
                    self.emit_session(handle);
                    false
                }
                Err(e) => {
                    slot.failed += 1;
                    failures.push(e.to_string());
                    {
                        let mut state = handle.state.lock().unwrap();
                        state.failed_jobs += 1;
                        state.current_job_id = None;
                    }
                    if matches!(e, AutomationError::CaptchaDetected { .. }) {
                        self.request_manual_assist(&job, &e).await;
                    }
                    self.log(
                        handle,
                        LogLevel::Error,
                        format!("application failed: {}", e),
                        Some(job.id.clone()),
                    );
                    self.emit_session(handle);
                    true
                }
            };

            if failed_now && settings.stop_on_error {
                self.log(
                    handle,
                    LogLevel::Warning,
                    "stopping batch: stop_on_error is set",
                    None,
                );
                break 'jobs;
            }

            // Rate-limit delay before the next job. Dry runs touch no site,
            // so no pacing is needed.
            if !failed_now && index + 1 < total && !settings.dry_run {
                let secs = inter_job_delay_seconds(board.as_ref(), &settings);
                if secs > 0 {
                    self.log(
                        handle,
                        LogLevel::Info,
                        format!("waiting {}s before next job", secs),
                        None,
                    );
                    self.sleep_or_stop(&mut control_rx, Duration::from_secs(secs))
                        .await;
                }
            }
        }

        let results = compute_results(
            session_start.elapsed().as_secs_f64(),
            &job_seconds,
            breakdown,
            &board_seconds,
            &failures,
        );

        {
            let mut state = handle.state.lock().unwrap();
            state.current_job_id = None;
            if state.status != BatchStatus::Stopped {
                state.status = BatchStatus::Completed;
            }
            state.completed_at = Some(Utc::now());
            state.results = Some(results);
        }
        self.log(handle, LogLevel::Success, "batch session finished", None);
        self.emit_session(handle);
        Ok(())
    }

    /// Sleep for `duration`, waking early only when a stop signal arrives.
    /// Pause signals do not interrupt the delay; the next boundary check
    /// handles them.
    async fn sleep_or_stop(
        &self,
        control_rx: &mut tokio::sync::watch::Receiver<ControlSignal>,
        duration: Duration,
    ) {
        let stop_seen = async {
            loop {
                if control_rx.changed().await.is_err() {
                    break;
                }
                if *control_rx.borrow() == ControlSignal::Stop {
                    break;
                }
            }
        };
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = stop_seen => {}
        }
    }

    /// One job through the pipeline: detect → captcha-check → fill →
    /// optional submit. Any stage error short-circuits as a job-level
    /// error; the batch loop decides what it means for the session.
    async fn process_job(
        &self,
        job: &JobRecord,
        board: Option<&JobBoardProfile>,
        settings: &BatchSettings,
        profile: &UserProfile,
        resume_path: Option<&Path>,
    ) -> Result<(), AutomationError> {
        if job.url.trim().is_empty() {
            return Err(AutomationError::MissingUrl(job.id.clone()));
        }

        let detection = self.engine.detect_job_page(&job.url).await;
        self.record_attempt(
            job,
            "detect",
            detection.success,
            format!(
                "{} fields, apply_control_found={}",
                detection.fields.len(),
                detection.apply_control_found
            ),
        )
        .await;
        if !detection.success {
            return Err(AutomationError::DetectionFailed(
                detection.errors.join("; "),
            ));
        }

        let captcha = self.engine.scan_captcha().await;
        if captcha.detected {
            self.record_attempt(
                job,
                "captcha",
                false,
                format!("{:?}: {}", captcha.kind, captcha.indicators.join(", ")),
            )
            .await;
            return Err(AutomationError::CaptchaDetected {
                kind: captcha.kind,
                confidence: captcha.confidence,
            });
        }

        let fill = self
            .engine
            .fill_detected(&detection.fields, profile, resume_path)
            .await;
        self.record_attempt(
            job,
            "fill",
            fill.success,
            format!("{} filled, {} unfilled", fill.filled.len(), fill.unfilled.len()),
        )
        .await;

        if settings.auto_submit {
            self.engine.submit_application(board).await?;
            self.record_attempt(job, "submit", true, "application submitted".to_string())
                .await;
        }

        Ok(())
    }

    /// Queue the job for human takeover when automation cannot proceed.
    async fn request_manual_assist(&self, job: &JobRecord, error: &AutomationError) {
        let request = ManualAssistRequest {
            job_id: job.id.clone(),
            url: job.url.clone(),
            reason: error.to_string(),
            requested_at: Utc::now(),
        };
        if let Err(e) = self.store.record_manual_assist(request).await {
            warn!("manual-assist write failed for job {}: {}", job.id, e);
        }
    }

    async fn record_attempt(&self, job: &JobRecord, stage: &str, success: bool, message: String) {
        let attempt = AutomationAttempt {
            job_id: job.id.clone(),
            stage: stage.to_string(),
            success,
            message,
            timestamp: Utc::now(),
        };
        if let Err(e) = self.store.record_attempt(attempt).await {
            warn!("attempt log write failed for job {}: {}", job.id, e);
        }
    }

    // ── events ──────────────────────────────────────────────────────────────

    fn log(&self, handle: &Arc<SessionHandle>, level: LogLevel, message: impl Into<String>, job_id: Option<String>) {
        let log = BatchLog::new(level, message, job_id);
        match level {
            LogLevel::Error => error!(job_id = ?log.job_id, "{}", log.message),
            LogLevel::Warning => warn!(job_id = ?log.job_id, "{}", log.message),
            _ => info!(job_id = ?log.job_id, "{}", log.message),
        }
        handle.push_log(log.clone());
        let session_id = handle.state.lock().unwrap().id.clone();
        let _ = self.events.send(BatchEvent::Log { session_id, log });
    }

    fn emit_session(&self, handle: &Arc<SessionHandle>) {
        let session = handle.state.lock().unwrap().clone();
        let _ = self.events.send(BatchEvent::SessionUpdated { session });
    }
}

/// Uniform inter-job delay: the resolved profile's rate limit when one
/// applies, otherwise `delay_min + random(0 ..= delay_max − delay_min)`
/// from the batch settings (saturating, so inverted bounds cannot panic).
fn inter_job_delay_seconds(board: Option<&JobBoardProfile>, settings: &BatchSettings) -> u64 {
    use rand::RngExt;
    let mut rng = rand::rng();
    match board {
        Some(b) => {
            let lo = b.rate_limit.min_delay_seconds;
            let hi = b.rate_limit.max_delay_seconds.max(lo);
            rng.random_range(lo..=hi)
        }
        None => {
            let spread = settings
                .delay_max_seconds
                .saturating_sub(settings.delay_min_seconds);
            settings.delay_min_seconds + rng.random_range(0..=spread)
        }
    }
}

/// Fold the per-loop accumulators into the final [`BatchResults`].
fn compute_results(
    total_seconds: f64,
    job_seconds: &[f64],
    mut breakdown: HashMap<String, BoardBreakdown>,
    board_seconds: &HashMap<String, f64>,
    failures: &[String],
) -> BatchResults {
    for (board, slot) in breakdown.iter_mut() {
        if slot.total > 0 {
            slot.average_time_seconds =
                board_seconds.get(board).copied().unwrap_or_default() / slot.total as f64;
        }
    }

    let successful: usize = breakdown.values().map(|b| b.successful).sum();
    let failed: usize = breakdown.values().map(|b| b.failed).sum();
    let processed = successful + failed;
    let success_rate = if processed == 0 {
        0.0
    } else {
        successful as f64 / processed as f64 * 100.0
    };

    let average_time_per_job_seconds = if job_seconds.is_empty() {
        0.0
    } else {
        job_seconds.iter().sum::<f64>() / job_seconds.len() as f64
    };

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for failure in failures {
        *counts.entry(failure.as_str()).or_default() += 1;
    }
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    let common_failures = ranked.into_iter().take(5).map(|(m, _)| m.to_string()).collect();

    BatchResults {
        success_rate,
        average_time_per_job_seconds,
        total_time_seconds: total_seconds,
        common_failures,
        job_board_breakdown: breakdown,
    }
}
