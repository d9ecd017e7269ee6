//! Transient user-facing notices.
//!
//! Fire-and-forget: `notify` never fails and nothing reads the queue back to
//! make decisions.  The console subscribes and prints each notice as it
//! arrives; `active()` lists whatever hasn't expired yet.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::broadcast;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
}

impl Severity {
    fn lifetime(self) -> Duration {
        match self {
            Severity::Info | Severity::Success => Duration::from_secs(3),
            Severity::Error => Duration::from_secs(5),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Success => "ok",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub message: String,
    pub severity: Severity,
    pub raised_at: DateTime<Local>,
    expires: Instant,
}

impl Notice {
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires <= now
    }
}

const MAX_QUEUED: usize = 8;
const CHANNEL_CAPACITY: usize = 64;

pub struct Notifier {
    queue: Mutex<VecDeque<Notice>>,
    tx: broadcast::Sender<Notice>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            queue: Mutex::new(VecDeque::new()),
            tx,
        }
    }

    pub fn notify(&self, message: impl Into<String>, severity: Severity) {
        let notice = Notice {
            message: message.into(),
            severity,
            raised_at: Local::now(),
            expires: Instant::now() + severity.lifetime(),
        };
        {
            let mut queue = self.queue.lock().unwrap_or_else(|p| p.into_inner());
            let now = Instant::now();
            queue.retain(|n| !n.is_expired(now) && n.message != notice.message);
            queue.push_back(notice.clone());
            while queue.len() > MAX_QUEUED {
                queue.pop_front();
            }
        }
        // no subscribers is fine
        let _ = self.tx.send(notice);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.notify(message, Severity::Info);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.notify(message, Severity::Success);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(message, Severity::Error);
    }

    /// Notices that haven't timed out, oldest first.
    pub fn active(&self) -> Vec<Notice> {
        let now = Instant::now();
        let mut queue = self.queue.lock().unwrap_or_else(|p| p.into_inner());
        queue.retain(|n| !n.is_expired(now));
        queue.iter().cloned().collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }
}
