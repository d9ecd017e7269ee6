//! Status synchronizer: the periodic `/status` poll.
//!
//! One timer per context.  Each tick fetches a snapshot and, on success,
//! replaces the cache wholesale, reconciles the program machine and
//! publishes the new figures.  A failed poll flags the cached view as stale
//! and keeps the timer running; the next tick is the retry.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use whisper_proto::protocol::DeviceStatus;

use crate::context::{AppContext, UiEvent};
use crate::error::Result;

/// The running poll timer.
#[derive(Debug)]
pub struct PollSession {
    handle: JoinHandle<()>,
    started_at: DateTime<Local>,
    interval: Duration,
}

impl PollSession {
    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub(crate) fn cancel(self) {
        self.handle.abort();
    }

    #[cfg(test)]
    pub(crate) fn abort_handle(&self) -> tokio::task::AbortHandle {
        self.handle.abort_handle()
    }
}

impl AppContext {
    /// Start the poll timer.  Returns false if one is already running; a
    /// second timer is never created.
    pub fn start_polling(self: &Arc<Self>) -> bool {
        let mut session = self.poll_session.lock().unwrap_or_else(|p| p.into_inner());
        if session.as_ref().is_some_and(|s| !s.handle.is_finished()) {
            debug!("poller: already running");
            return false;
        }

        let interval = self.config.polling.interval();
        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                // first tick fires immediately: initial status on start
                ticker.tick().await;
                let Some(ctx) = weak.upgrade() else {
                    break;
                };
                let _ = ctx.poll().await;
            }
        });

        info!("poller: started, every {:?}", interval);
        *session = Some(PollSession {
            handle,
            started_at: Local::now(),
            interval,
        });
        true
    }

    /// Cancel the poll timer.  Returns false if nothing was running.
    pub fn stop_polling(&self) -> bool {
        let taken = self
            .poll_session
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        match taken {
            Some(session) => {
                session.cancel();
                info!("poller: stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poll_session
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .is_some_and(|s| !s.handle.is_finished())
    }

    /// One poll.  The cache is only ever written here.
    pub async fn poll(&self) -> Result<Arc<DeviceStatus>> {
        match self.gateway.status().await {
            Ok(status) => {
                let status = Arc::new(status);
                // cache, machine and volume move together; lock order is
                // status, then program, then volume
                let mode_changed = {
                    let mut cache = self.status.write().await;
                    cache.last_good = Some(Arc::clone(&status));
                    cache.error = None;
                    cache.polled_at = Some(Local::now());
                    let mode_changed = self.program.lock().await.reconcile(&status);
                    self.set_displayed_volume(status.volume).await;
                    mode_changed
                };
                debug!(
                    "poller: {:?} vol={} conn={}",
                    status.current_program, status.volume, status.connection_mode
                );
                self.publish(UiEvent::Status(Arc::clone(&status)));
                if mode_changed {
                    self.publish_program().await;
                }
                Ok(status)
            }
            Err(e) => {
                warn!("poller: status failed: {}", e);
                {
                    let mut cache = self.status.write().await;
                    cache.error = Some(e.to_string());
                    cache.polled_at = Some(Local::now());
                }
                self.publish(UiEvent::StatusError(e.to_string()));
                Err(e)
            }
        }
    }

    /// Out-of-band poll, outside the timer.
    pub async fn refresh_now(&self) -> Result<Arc<DeviceStatus>> {
        self.poll().await
    }

    /// Poll once after `delay`, e.g. to pick up a transport change the
    /// device needs a moment to settle.
    pub fn refresh_after(self: &Arc<Self>, delay: Duration) {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(ctx) = weak.upgrade() {
                let _ = ctx.poll().await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use whisper_proto::config::Config;

    fn unreachable_ctx() -> Arc<AppContext> {
        let mut config = Config::default();
        config.device.base_url = "http://127.0.0.1:9".to_string();
        config.polling.interval_secs = 60;
        AppContext::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_is_safe() {
        let ctx = unreachable_ctx();
        assert!(!ctx.stop_polling());
        assert!(ctx.start_polling());
        assert!(!ctx.start_polling());
        assert!(ctx.is_polling());
        let interval = ctx
            .poll_session
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| s.interval());
        assert_eq!(interval, Some(Duration::from_secs(60)));

        assert!(ctx.stop_polling());
        assert!(!ctx.is_polling());
        assert!(!ctx.stop_polling());
        // restart after stop gets a fresh session
        assert!(ctx.start_polling());
        ctx.teardown();
        assert!(!ctx.is_polling());
    }
}
