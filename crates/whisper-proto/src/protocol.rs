//! Wire types for the GhostWhisper device HTTP API.
//!
//! The device answers every control endpoint with a small JSON object; the
//! status endpoint returns a flat snapshot.  Field names follow the firmware
//! (`currentProgram`, `freeHeap`, ...), mapped onto snake_case here.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Mutually exclusive playback programs the device can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProgramMode {
    Shuffle,
    /// Device default after boot.
    #[default]
    Generative,
    Stream,
    NewStream,
}

impl ProgramMode {
    pub const ALL: [ProgramMode; 4] = [
        ProgramMode::Shuffle,
        ProgramMode::Generative,
        ProgramMode::Stream,
        ProgramMode::NewStream,
    ];

    /// Path segment under `/program/`.
    pub fn slug(&self) -> &'static str {
        match self {
            ProgramMode::Shuffle => "shuffle",
            ProgramMode::Generative => "generative",
            ProgramMode::Stream => "stream",
            ProgramMode::NewStream => "newstream",
        }
    }

    /// Name as the firmware reports it in `/status`.
    pub fn wire_name(&self) -> &'static str {
        match self {
            ProgramMode::Shuffle => "SHUFFLE",
            ProgramMode::Generative => "GENERATIVE",
            ProgramMode::Stream => "STREAM",
            ProgramMode::NewStream => "NEWSTREAM",
        }
    }

    /// Stream-backed programs need the device to be online.
    pub fn needs_network(&self) -> bool {
        matches!(self, ProgramMode::Stream | ProgramMode::NewStream)
    }
}

impl fmt::Display for ProgramMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownProgram(pub String);

impl fmt::Display for UnknownProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown program '{}'", self.0)
    }
}

impl std::error::Error for UnknownProgram {}

impl FromStr for ProgramMode {
    type Err = UnknownProgram;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        ProgramMode::ALL
            .into_iter()
            .find(|m| m.slug().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownProgram(trimmed.to_string()))
    }
}

/// Device-reported network reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectionMode {
    Online,
    Offline,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ConnectionMode {
    /// Stream controls are offered unless the device says it is offline.
    pub fn allows_streaming(&self) -> bool {
        !matches!(self, ConnectionMode::Offline)
    }
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionMode::Online => "ONLINE",
            ConnectionMode::Offline => "OFFLINE",
            ConnectionMode::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// One `/status` snapshot.  Never patched in place: each successful poll
/// replaces the previous snapshot as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    /// `None` when the firmware omitted the field or sent a name we don't know.
    #[serde(default, deserialize_with = "lenient_program")]
    pub current_program: Option<ProgramMode>,
    #[serde(default)]
    pub program_active: bool,
    /// Older firmware calls this `playbackActive`.
    #[serde(default, alias = "playbackActive")]
    pub audio_running: bool,
    pub volume: u8,
    #[serde(default)]
    pub connection_mode: ConnectionMode,
    #[serde(default, rename = "wifi")]
    pub wifi_address: String,
    #[serde(default, rename = "uptime")]
    pub uptime_seconds: u64,
    #[serde(default, rename = "freeHeap")]
    pub free_heap_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_heap: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flash_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_sketch_space: Option<u64>,
}

fn lenient_program<'de, D>(deserializer: D) -> Result<Option<ProgramMode>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| match s.parse::<ProgramMode>() {
        Ok(mode) => Some(mode),
        Err(e) => {
            tracing::warn!("status: ignoring {}", e);
            None
        }
    }))
}

impl DeviceStatus {
    /// Human summary lines, same order the web panel used.
    pub fn summary_lines(&self) -> Vec<String> {
        let yes_no = |b: bool| if b { "Yes" } else { "No" };
        vec![
            format!(
                "Current Program: {}",
                self.current_program
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Unknown".to_string())
            ),
            format!("Program Active: {}", yes_no(self.program_active)),
            format!("Audio Running: {}", yes_no(self.audio_running)),
            format!("Volume: {}%", self.volume),
            format!("WiFi: {}", self.wifi_address),
            format!("Connection Mode: {}", self.connection_mode),
            format!("Uptime: {}", format_uptime(self.uptime_seconds)),
            format!("Free Heap: {}", format_bytes(self.free_heap_bytes)),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub name: String,
    pub url: String,
}

impl Station {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Outcome tag on control replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Success,
    Info,
    Error,
    #[default]
    #[serde(other)]
    Unknown,
}

/// `{status, message}` reply to program switches, transport, shuffle and stream controls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandReply {
    #[serde(default)]
    pub status: ReplyStatus,
    #[serde(default)]
    pub message: String,
}

/// `{status, volume}` from the volume endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeReply {
    #[serde(default)]
    pub status: ReplyStatus,
    pub volume: u8,
}

/// `{files: [...]}` from `/meme/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MemeList {
    #[serde(default)]
    pub files: Vec<String>,
}

impl MemeList {
    /// `(number, label)` pairs; numbers are 1-based as `/meme/play?n=` expects.
    pub fn entries(&self) -> Vec<(u32, String)> {
        self.files
            .iter()
            .enumerate()
            .map(|(i, f)| (i as u32 + 1, meme_label(f)))
            .collect()
    }
}

pub fn meme_label(file: &str) -> String {
    let name = file.strip_prefix("/meme/").unwrap_or(file);
    name.strip_suffix(".mp3").unwrap_or(name).to_string()
}

/// JSON body for station playback (`POST /stream/play`, `POST /program/stream`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationRequest {
    pub url: String,
    pub name: String,
}

impl From<&Station> for StationRequest {
    fn from(s: &Station) -> Self {
        Self {
            url: s.url.clone(),
            name: s.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Every device endpoint the client talks to.
#[derive(Debug, Clone, PartialEq)]
pub enum Endpoint {
    Status,
    VolumeUp,
    VolumeDown,
    VolumeSet { level: u8 },
    Random { folder: Option<String> },
    Stop,
    Pause,
    Resume,
    Program {
        mode: ProgramMode,
        folder: Option<String>,
        station: Option<StationRequest>,
    },
    ShuffleNext,
    ShuffleFolder { path: String },
    GenerativeRegenerate,
    MemeList,
    MemePlay { number: u32 },
    StreamPlay(StationRequest),
    VolumeTest,
    MemoryReport,
}

impl Endpoint {
    pub fn method(&self) -> Method {
        match self {
            Endpoint::StreamPlay(_) => Method::Post,
            Endpoint::Program { station: Some(_), .. } => Method::Post,
            _ => Method::Get,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Endpoint::Status => "/status".into(),
            Endpoint::VolumeUp => "/volume/up".into(),
            Endpoint::VolumeDown => "/volume/down".into(),
            Endpoint::VolumeSet { .. } => "/volume/set".into(),
            Endpoint::Random { .. } => "/random".into(),
            Endpoint::Stop => "/stop".into(),
            Endpoint::Pause => "/pause".into(),
            Endpoint::Resume => "/resume".into(),
            Endpoint::Program { mode, .. } => format!("/program/{}", mode.slug()),
            Endpoint::ShuffleNext => "/shuffle/next".into(),
            Endpoint::ShuffleFolder { .. } => "/shuffle/folder".into(),
            Endpoint::GenerativeRegenerate => "/generative/regenerate".into(),
            Endpoint::MemeList => "/meme/list".into(),
            Endpoint::MemePlay { .. } => "/meme/play".into(),
            Endpoint::StreamPlay(_) => "/stream/play".into(),
            Endpoint::VolumeTest => "/test".into(),
            Endpoint::MemoryReport => "/memory".into(),
        }
    }

    pub fn query(&self) -> Vec<(&'static str, String)> {
        match self {
            Endpoint::VolumeSet { level } => vec![("level", level.to_string())],
            Endpoint::Random { folder: Some(f) } => vec![("folder", f.clone())],
            Endpoint::Program {
                folder: Some(f), ..
            } => vec![("folder", f.clone())],
            Endpoint::ShuffleFolder { path } => vec![("path", path.clone())],
            Endpoint::MemePlay { number } => vec![("n", number.to_string())],
            _ => Vec::new(),
        }
    }

    pub fn body(&self) -> Option<&StationRequest> {
        match self {
            Endpoint::StreamPlay(req) => Some(req),
            Endpoint::Program {
                station: Some(req), ..
            } => Some(req),
            _ => None,
        }
    }

    /// Endpoints that answer with `text/plain` instead of JSON.
    pub fn replies_with_text(&self) -> bool {
        matches!(
            self,
            Endpoint::MemePlay { .. } | Endpoint::VolumeTest | Endpoint::MemoryReport
        )
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let method = match self.method() {
            Method::Get => "GET",
            Method::Post => "POST",
        };
        write!(f, "{} {}", method, self.path())
    }
}

/// `3725` → `1h 2m 5s`; days appear once uptime passes 24h.
pub fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}
