//! AppContext: the one place client state lives.
//!
//! Built once at startup (`init`) and torn down once (`teardown`).  Holds
//! the gateway, the mutation guard, the program state machine, the station
//! directory, the status cache and the poll session, and is shared as an
//! `Arc` with the poll task and the console.
//!
//! Locks here are never held across a gateway call; every state transition
//! happens between network awaits.

use std::sync::Arc;

use chrono::{DateTime, Local};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{info, warn};

use whisper_proto::config::Config;
use whisper_proto::protocol::{ConnectionMode, DeviceStatus, ProgramMode};

use crate::error::Result;
use crate::gateway::Gateway;
use crate::guard::MutationGuard;
use crate::notify::Notifier;
use crate::poller::PollSession;
use crate::program::ProgramMachine;
use crate::stations::{StationDirectory, StationInfo};

const EVENT_CAPACITY: usize = 256;

/// Display updates published to whoever renders state.
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// Fresh snapshot from a successful poll.
    Status(Arc<DeviceStatus>),
    /// Last poll failed; the previous snapshot is still shown.
    StatusError(String),
    Volume(u8),
    Program {
        mode: ProgramMode,
        switching: bool,
    },
    Stations(StationInfo),
}

/// Last poll outcome.  Only the poll path writes this.
#[derive(Debug, Default, Clone)]
pub struct StatusCache {
    pub last_good: Option<Arc<DeviceStatus>>,
    pub error: Option<String>,
    pub polled_at: Option<DateTime<Local>>,
}

pub struct AppContext {
    pub config: Config,
    pub gateway: Gateway,
    pub guard: Arc<MutationGuard>,
    pub program: Mutex<ProgramMachine>,
    pub stations: Mutex<StationDirectory>,
    pub notifier: Notifier,
    pub(crate) status: RwLock<StatusCache>,
    pub(crate) volume: Mutex<Option<u8>>,
    pub(crate) poll_session: std::sync::Mutex<Option<PollSession>>,
    events: broadcast::Sender<UiEvent>,
}

impl AppContext {
    /// Build the context without starting the poll loop (one-shot commands).
    pub fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let gateway = Gateway::new(&config.device)?;
        Ok(Self::with_gateway(config, gateway))
    }

    pub fn with_gateway(config: Config, gateway: Gateway) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            config,
            gateway,
            guard: Arc::new(MutationGuard::new()),
            program: Mutex::new(ProgramMachine::new()),
            stations: Mutex::new(StationDirectory::new()),
            notifier: Notifier::new(),
            status: RwLock::new(StatusCache::default()),
            volume: Mutex::new(None),
            poll_session: std::sync::Mutex::new(None),
            events,
        })
    }

    /// Application start: build the context and, unless disabled, start
    /// polling.  Must run inside a tokio runtime.
    pub fn init(config: Config) -> anyhow::Result<Arc<Self>> {
        let ctx = Self::new(config)?;
        info!("AppContext: device at {}", ctx.gateway.base_url());
        if ctx.config.polling.auto_polling {
            ctx.start_polling();
        }
        Ok(ctx)
    }

    /// Application teardown: cancel the poll timer.  Safe to call twice.
    pub fn teardown(&self) {
        if self.stop_polling() {
            info!("AppContext: poll session cancelled");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.events.subscribe()
    }

    pub(crate) fn publish(&self, event: UiEvent) {
        // no receivers is OK (one-shot mode)
        let _ = self.events.send(event);
    }

    pub async fn status_cache(&self) -> StatusCache {
        self.status.read().await.clone()
    }

    pub async fn cached_status(&self) -> Option<Arc<DeviceStatus>> {
        self.status.read().await.last_good.clone()
    }

    /// Unknown until the first successful poll.
    pub async fn connection_mode(&self) -> ConnectionMode {
        self.cached_status()
            .await
            .map(|s| s.connection_mode)
            .unwrap_or_default()
    }

    pub async fn displayed_volume(&self) -> Option<u8> {
        *self.volume.lock().await
    }

    pub(crate) async fn set_displayed_volume(&self, level: u8) {
        let changed = {
            let mut volume = self.volume.lock().await;
            let changed = *volume != Some(level);
            *volume = Some(level);
            changed
        };
        if changed {
            self.publish(UiEvent::Volume(level));
        }
    }

    /// Mode the UI should show: the optimistic target while a switch is in
    /// flight, otherwise the last confirmed mode.
    pub async fn displayed_mode(&self) -> ProgramMode {
        self.program.lock().await.displayed()
    }

    pub(crate) async fn publish_program(&self) {
        let (mode, switching) = {
            let machine = self.program.lock().await;
            (machine.displayed(), machine.is_switching())
        };
        self.publish(UiEvent::Program { mode, switching });
    }

    pub(crate) async fn publish_stations(&self) {
        let info = self.stations.lock().await.info();
        self.publish(UiEvent::Stations(info));
    }

    /// Turn a failed action into an error notice.  Lock conflicts stay quiet.
    pub(crate) fn surface<T>(&self, what: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_silent() {
                tracing::debug!("{}: dropped ({})", what, e);
            } else {
                warn!("{} failed: {}", what, e);
                self.notifier.error(format!("Error {}: {}", what, e));
            }
        }
        result
    }
}

impl Drop for AppContext {
    fn drop(&mut self) {
        let session = self
            .poll_session
            .get_mut()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(session) = session {
            session.cancel();
        }
    }
}
