//! Session state machine primitives.
//!
//! Status transitions are guarded here as pure functions over the session
//! value; commands issued from an invalid source state are no-ops, not
//! errors. The processing loop observes pause/stop through a watch channel
//! and only at job boundaries; an in-flight page interaction is always
//! allowed to finish or fail naturally.

use crate::core::types::{BatchLog, BatchSession, BatchStatus};
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::watch;

/// Wake-up signal carried by the per-session control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Run,
    Pause,
    Stop,
}

/// Cap on the per-session recent-log ring served by `get_progress`. The
/// live stream is unbounded; this is only the replay window.
pub(crate) const RECENT_LOG_CAP: usize = 200;

/// Shared per-session state: the session value, its control channel, and
/// the recent-log ring.
pub(crate) struct SessionHandle {
    pub state: Mutex<BatchSession>,
    pub control: watch::Sender<ControlSignal>,
    pub recent_logs: Mutex<VecDeque<BatchLog>>,
}

impl SessionHandle {
    pub fn push_log(&self, log: BatchLog) {
        let mut ring = self.recent_logs.lock().unwrap();
        if ring.len() == RECENT_LOG_CAP {
            ring.pop_front();
        }
        ring.push_back(log);
    }
}

/// `pending → running`, stamping `started_at`.
pub(crate) fn try_start(session: &mut BatchSession) -> bool {
    if session.status != BatchStatus::Pending {
        return false;
    }
    session.status = BatchStatus::Running;
    session.started_at = Some(chrono::Utc::now());
    true
}

/// `running → paused`; anything else is a no-op.
pub(crate) fn try_pause(session: &mut BatchSession) -> bool {
    if session.status != BatchStatus::Running {
        return false;
    }
    session.status = BatchStatus::Paused;
    true
}

/// `paused → running`; anything else is a no-op.
pub(crate) fn try_resume(session: &mut BatchSession) -> bool {
    if session.status != BatchStatus::Paused {
        return false;
    }
    session.status = BatchStatus::Running;
    true
}

/// `running|paused → stopped`; terminal and pending states are no-ops.
pub(crate) fn try_stop(session: &mut BatchSession) -> bool {
    if !matches!(session.status, BatchStatus::Running | BatchStatus::Paused) {
        return false;
    }
    session.status = BatchStatus::Stopped;
    true
}
