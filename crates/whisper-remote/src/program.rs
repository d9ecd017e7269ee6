//! Program state machine.
//!
//! ```text
//!  (mode, Idle) --request_switch(target)--> (mode, Switching{target})
//!  (mode, Switching{target}) --reply ok--> (target, Idle)
//!  (mode, Switching{target}) --reply err--> (mode, Idle)
//!  (any, any) --poll reports m--> (m, same phase), optimistic target dropped
//! ```
//!
//! While a switch is in flight the target is shown optimistically.  The
//! device is authoritative: whatever a completed poll reports overwrites the
//! local mode, last writer wins.

use tracing::{debug, info};

use whisper_proto::protocol::{CommandReply, DeviceStatus, Endpoint, ProgramMode, Station};

use crate::context::AppContext;
use crate::error::{ClientError, Result};
use crate::guard::ResourceClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Switching { target: ProgramMode },
}

#[derive(Debug, Clone)]
pub struct ProgramMachine {
    current: ProgramMode,
    phase: Phase,
    optimistic: Option<ProgramMode>,
}

impl Default for ProgramMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramMachine {
    /// Generative/Idle, the device's boot state, until the first poll.
    pub fn new() -> Self {
        Self {
            current: ProgramMode::default(),
            phase: Phase::Idle,
            optimistic: None,
        }
    }

    pub fn current(&self) -> ProgramMode {
        self.current
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_switching(&self) -> bool {
        matches!(self.phase, Phase::Switching { .. })
    }

    pub fn displayed(&self) -> ProgramMode {
        self.optimistic.unwrap_or(self.current)
    }

    /// Enter `Switching`.  Callers hold the Program permit, so a second
    /// switch never gets here; if one does it is rejected, not queued.
    pub fn begin_switch(&mut self, target: ProgramMode) -> Result<()> {
        if self.is_switching() {
            return Err(ClientError::LockConflict(ResourceClass::Program));
        }
        self.phase = Phase::Switching { target };
        self.optimistic = Some(target);
        Ok(())
    }

    /// Device accepted the switch.
    pub fn complete_switch(&mut self) -> Option<ProgramMode> {
        let Phase::Switching { target } = self.phase else {
            return None;
        };
        self.current = target;
        self.phase = Phase::Idle;
        self.optimistic = None;
        Some(target)
    }

    /// Device refused or was unreachable; mode stays as it was.
    pub fn abort_switch(&mut self) {
        self.phase = Phase::Idle;
        self.optimistic = None;
    }

    /// Adopt the mode a poll reported.  Returns true if the displayed mode
    /// changed.  Snapshots that don't report a mode leave state alone.
    pub fn reconcile(&mut self, status: &DeviceStatus) -> bool {
        let Some(reported) = status.current_program else {
            return false;
        };
        let before = self.displayed();
        if before != reported || self.current != reported {
            debug!("program: poll reports {} (local {})", reported, before);
        }
        self.current = reported;
        self.optimistic = None;
        before != reported
    }
}

/// Extra arguments for a switch.
#[derive(Debug, Clone, Default)]
pub struct SwitchParams {
    /// Shuffle source folder; blank means the configured default.
    pub folder: Option<String>,
    /// Station to start when switching to stream.
    pub station: Option<Station>,
}

impl SwitchParams {
    pub fn folder(folder: impl Into<String>) -> Self {
        Self {
            folder: Some(folder.into()),
            ..Self::default()
        }
    }

    pub fn station(station: Station) -> Self {
        Self {
            station: Some(station),
            ..Self::default()
        }
    }
}

/// Endpoint for switching to `target`.  Parameters that don't apply to the
/// target are dropped.
pub fn switch_endpoint(
    target: ProgramMode,
    params: &SwitchParams,
    default_folder: &str,
) -> Endpoint {
    let folder = match target {
        ProgramMode::Shuffle => Some(
            params
                .folder
                .as_deref()
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .unwrap_or(default_folder)
                .to_string(),
        ),
        _ => None,
    };
    let station = match target {
        ProgramMode::Stream => params.station.as_ref().map(Into::into),
        _ => None,
    };
    Endpoint::Program {
        mode: target,
        folder,
        station,
    }
}

impl AppContext {
    /// Switch the device to `target`.  On success the new mode is adopted,
    /// a status refresh runs immediately, and a notice is raised.
    pub async fn request_switch(
        &self,
        target: ProgramMode,
        params: SwitchParams,
    ) -> Result<CommandReply> {
        let result = self.switch_inner(target, params).await;
        self.surface("switching program", result)
    }

    async fn switch_inner(
        &self,
        target: ProgramMode,
        params: SwitchParams,
    ) -> Result<CommandReply> {
        if target.needs_network() && !self.connection_mode().await.allows_streaming() {
            return Err(ClientError::StreamUnavailable);
        }
        let endpoint = switch_endpoint(target, &params, &self.config.shuffle.default_folder);

        // the Program permit is the lock; the phase only drives the display
        let _permit = self.permit(ResourceClass::Program)?;
        self.program.lock().await.begin_switch(target)?;
        self.publish_program().await;
        info!("program: switching to {} via {}", target, endpoint);

        match self.gateway.command(&endpoint).await {
            Ok(reply) => {
                self.program.lock().await.complete_switch();
                self.publish_program().await;
                self.notifier.success(format!("Switched to {} program", target));
                // out-of-band refresh; a failure here only flags the status view
                let _ = self.refresh_now().await;
                Ok(reply)
            }
            Err(e) => {
                self.program.lock().await.abort_switch();
                self.publish_program().await;
                Err(e)
            }
        }
    }
}
