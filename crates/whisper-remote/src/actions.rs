//! User actions: one method per control the panel offers.
//!
//! Every mutating action takes the permit for its resource class first and
//! gives up silently if another one of the same class is still in flight.
//! Outcomes are reported through the notifier; the `Result` is handed back
//! for callers that want it (one-shot CLI exit codes, tests).

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use whisper_proto::protocol::{
    CommandReply, Endpoint, MemeList, ProgramMode, ReplyStatus, Station, StationRequest,
};

use crate::context::AppContext;
use crate::error::{ClientError, Result};
use crate::guard::{MutationPermit, ResourceClass};
use crate::program::SwitchParams;
use crate::stations::StationInfo;

/// Transport changes settle quickly; new sources take a little longer.
const TRANSPORT_SETTLE: Duration = Duration::from_millis(500);
const SOURCE_SETTLE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeStep {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stop,
    Pause,
    Resume,
}

impl AppContext {
    pub(crate) fn permit(&self, class: ResourceClass) -> Result<MutationPermit> {
        self.guard
            .acquire(class)
            .ok_or(ClientError::LockConflict(class))
    }

    async fn ensure_streaming_allowed(&self) -> Result<()> {
        if self.connection_mode().await.allows_streaming() {
            Ok(())
        } else {
            Err(ClientError::StreamUnavailable)
        }
    }

    // ── Volume ───────────────────────────────────────────────────────────────

    pub async fn change_volume(&self, step: VolumeStep) -> Result<u8> {
        let result: Result<u8> = async {
            let _permit = self.permit(ResourceClass::Volume)?;
            let endpoint = match step {
                VolumeStep::Up => Endpoint::VolumeUp,
                VolumeStep::Down => Endpoint::VolumeDown,
            };
            let reply = self.gateway.volume(&endpoint).await?;
            self.set_displayed_volume(reply.volume).await;
            self.notifier.success(format!("Volume: {}%", reply.volume));
            Ok(reply.volume)
        }
        .await;
        self.surface("changing volume", result)
    }

    /// Absolute volume, 0–100.  Out-of-range levels never reach the device.
    pub async fn set_volume(&self, level: u32) -> Result<u8> {
        let result: Result<u8> = async {
            let level = u8::try_from(level)
                .ok()
                .filter(|l| *l <= 100)
                .ok_or(ClientError::VolumeOutOfRange(level))?;
            let _permit = self.permit(ResourceClass::Volume)?;
            let reply = self.gateway.volume(&Endpoint::VolumeSet { level }).await?;
            self.set_displayed_volume(reply.volume).await;
            Ok(reply.volume)
        }
        .await;
        self.surface("setting volume", result)
    }

    // ── Playback ─────────────────────────────────────────────────────────────

    /// Play a random file.  The device's own default folder is implied when
    /// `folder` is the configured default.
    pub async fn play_random(self: &Arc<Self>, folder: Option<&str>) -> Result<CommandReply> {
        let result: Result<CommandReply> = async {
            let _permit = self.permit(ResourceClass::Playback)?;
            let folder = folder
                .map(str::trim)
                .filter(|f| !f.is_empty() && *f != self.config.shuffle.default_folder)
                .map(str::to_string);
            let reply = self.gateway.command(&Endpoint::Random { folder }).await?;
            self.notifier.success(reply.message.clone());
            self.refresh_after(SOURCE_SETTLE);
            Ok(reply)
        }
        .await;
        self.surface("playing random file", result)
    }

    pub async fn transport(self: &Arc<Self>, action: Transport) -> Result<CommandReply> {
        let (endpoint, what) = match action {
            Transport::Stop => (Endpoint::Stop, "stopping playback"),
            Transport::Pause => (Endpoint::Pause, "pausing playback"),
            Transport::Resume => (Endpoint::Resume, "resuming playback"),
        };
        let result: Result<CommandReply> = async {
            let _permit = self.permit(ResourceClass::Playback)?;
            let reply = self.gateway.command(&endpoint).await?;
            match reply.status {
                ReplyStatus::Success => self.notifier.success(reply.message.clone()),
                _ => self.notifier.info(reply.message.clone()),
            }
            self.refresh_after(TRANSPORT_SETTLE);
            Ok(reply)
        }
        .await;
        self.surface(what, result)
    }

    // ── Shuffle / generative ─────────────────────────────────────────────────

    pub async fn shuffle_next(&self) -> Result<CommandReply> {
        let result: Result<CommandReply> = async {
            let _permit = self.permit(ResourceClass::Program)?;
            let reply = self.gateway.command(&Endpoint::ShuffleNext).await?;
            self.notifier.success("Playing next shuffle track");
            Ok(reply)
        }
        .await;
        self.surface("playing next track", result)
    }

    pub async fn change_shuffle_folder(&self, path: &str) -> Result<CommandReply> {
        let result: Result<CommandReply> = async {
            let _permit = self.permit(ResourceClass::Program)?;
            let endpoint = Endpoint::ShuffleFolder {
                path: path.to_string(),
            };
            let reply = self.gateway.command(&endpoint).await?;
            self.notifier
                .success(format!("Shuffle folder changed to: {}", path));
            Ok(reply)
        }
        .await;
        self.surface("changing folder", result)
    }

    pub async fn regenerate_sequence(&self) -> Result<CommandReply> {
        let result: Result<CommandReply> = async {
            let _permit = self.permit(ResourceClass::Program)?;
            let reply = self.gateway.command(&Endpoint::GenerativeRegenerate).await?;
            self.notifier.success("New sequence generated");
            Ok(reply)
        }
        .await;
        self.surface("regenerating sequence", result)
    }

    // ── Meme soundboard ──────────────────────────────────────────────────────

    pub async fn meme_list(&self) -> Result<MemeList> {
        let result = self.gateway.meme_list().await;
        self.surface("loading meme files", result)
    }

    /// The device answers in plain text; anything but "Playing meme N" means
    /// the file wasn't found.
    pub async fn play_meme(&self, number: u32) -> Result<String> {
        let result: Result<String> = async {
            let _permit = self.permit(ResourceClass::Playback)?;
            let endpoint = Endpoint::MemePlay { number };
            let text = self.gateway.text(&endpoint).await?;
            if !text.contains("Playing meme") {
                return Err(ClientError::Rejected {
                    endpoint: endpoint.to_string(),
                    message: text,
                });
            }
            self.notifier.success(text.clone());
            Ok(text)
        }
        .await;
        self.surface("playing meme", result)
    }

    // ── Stream stations ──────────────────────────────────────────────────────

    /// Fetch the station catalog.  On failure the fallback stations are
    /// installed and the error is still reported.
    pub async fn load_stations(&self) -> Result<usize> {
        self.notifier.info("Loading stations...");
        let fetched = self
            .gateway
            .fetch_catalog(&self.config.stations.catalog_url)
            .await;
        let (applied, count) = {
            let mut dir = self.stations.lock().await;
            let applied = dir.apply_catalog(fetched);
            (applied, dir.len())
        };
        self.publish_stations().await;
        match applied {
            Ok(()) => {
                self.notifier.success(format!("Loaded {} stations", count));
                Ok(count)
            }
            Err(e) => self.surface("loading stations", Err(e)),
        }
    }

    pub async fn station_info(&self) -> StationInfo {
        self.stations.lock().await.info()
    }

    /// Start stream mode on the current station.  With no stations yet,
    /// kicks off a catalog load and reports the directory as empty.
    pub async fn start_stream(self: &Arc<Self>) -> Result<CommandReply> {
        let current = self.stations.lock().await.current().cloned();
        let Some(station) = current else {
            self.notifier.info("No stations available - loading...");
            let _ = self.load_stations().await;
            return self.surface("starting stream", Err(ClientError::EmptyDirectory));
        };
        let permit: Result<MutationPermit> = async {
            self.ensure_streaming_allowed().await?;
            self.permit(ResourceClass::Station)
        }
        .await;
        let _permit = self.surface("starting stream", permit)?;

        // request_switch surfaces its own failures
        let result = self
            .request_switch(ProgramMode::Stream, SwitchParams::station(station.clone()))
            .await;
        // refresh whether or not the switch went through
        self.refresh_after(SOURCE_SETTLE);
        let reply = result?;
        self.notifier
            .success(format!("Stream started: {}", station.name));
        self.publish_stations().await;
        Ok(reply)
    }

    /// Advance to the next station and tell the device to play it.
    pub async fn next_station(self: &Arc<Self>) -> Result<Station> {
        let result: Result<Station> = async {
            self.ensure_streaming_allowed().await?;
            let _permit = self.permit(ResourceClass::Station)?;
            let station = self.stations.lock().await.advance()?;
            self.publish_stations().await;
            info!("stations: switching to {}", station.name);
            self.gateway
                .command(&Endpoint::StreamPlay(StationRequest::from(&station)))
                .await?;
            self.notifier
                .success(format!("Now playing: {}", station.name));
            self.refresh_after(SOURCE_SETTLE);
            Ok(station)
        }
        .await;
        self.surface("switching station", result)
    }

    // ── Diagnostics ──────────────────────────────────────────────────────────

    pub async fn volume_test(&self) -> Result<String> {
        let result = self.gateway.text(&Endpoint::VolumeTest).await;
        if result.is_ok() {
            self.notifier
                .success("Volume test completed. Check device log for results.");
        }
        self.surface("running volume test", result)
    }

    pub async fn memory_report(&self) -> Result<String> {
        let result = self.gateway.text(&Endpoint::MemoryReport).await;
        self.surface("requesting memory report", result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use whisper_proto::config::Config;

    fn unreachable_ctx() -> Arc<AppContext> {
        let mut config = Config::default();
        config.device.base_url = "http://127.0.0.1:9".to_string();
        AppContext::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_volume_out_of_range_never_sent() {
        let ctx = unreachable_ctx();
        for level in [101, 255, 1000] {
            let err = ctx.set_volume(level).await.unwrap_err();
            assert!(matches!(err, ClientError::VolumeOutOfRange(l) if l == level));
        }
        // validation fails before the permit is taken
        assert!(!ctx.guard.is_held(ResourceClass::Volume));
    }

    #[tokio::test]
    async fn test_lock_conflict_is_silent() {
        let ctx = unreachable_ctx();
        let _held = ctx.guard.acquire(ResourceClass::Volume).unwrap();
        let err = ctx.change_volume(VolumeStep::Up).await.unwrap_err();
        assert!(matches!(err, ClientError::LockConflict(ResourceClass::Volume)));
        assert!(ctx.notifier.active().is_empty());
    }

    #[tokio::test]
    async fn test_next_station_on_empty_directory() {
        let ctx = unreachable_ctx();
        let err = ctx.next_station().await.unwrap_err();
        assert!(matches!(err, ClientError::EmptyDirectory));
        assert!(!ctx.guard.is_held(ResourceClass::Station));
        assert_eq!(ctx.station_info().await.total, 0);
    }
}
