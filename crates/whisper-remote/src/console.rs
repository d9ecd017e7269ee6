//! Line-oriented console front end.
//!
//! The same [`ConsoleCommand`] set is used for one-shot CLI invocations
//! (`ghostwhisper volume 40`) and for lines typed at the interactive prompt.
//! Commands run as their own tasks so a slow device never blocks input;
//! conflicting mutations are dropped by the guard, not queued here.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use whisper_proto::protocol::ProgramMode;

use crate::actions::{Transport, VolumeStep};
use crate::context::{AppContext, UiEvent};
use crate::error::Result;
use crate::notify::Notice;
use crate::program::SwitchParams;

/// Slider semantics: only the last of a burst of `volume N` lines is sent.
const VOLUME_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum ConsoleCommand {
    /// Refresh and show device status
    Status,
    /// Volume up one step
    Up,
    /// Volume down one step
    Down,
    /// Set volume (0-100)
    Volume { level: u32 },
    /// Switch program: shuffle, generative, stream, newstream
    Program {
        mode: ProgramMode,
        /// Shuffle source folder
        folder: Option<String>,
    },
    /// Play a random file
    Random { folder: Option<String> },
    /// Stop playback
    Stop,
    /// Pause playback
    Pause,
    /// Resume playback
    Resume,
    /// Next shuffle track
    Next,
    /// Change the shuffle folder
    Folder { path: String },
    /// Regenerate the generative sequence
    Regenerate,
    /// List meme files
    Memes,
    /// Play meme number N
    Meme { number: u32 },
    /// Reload and list stream stations
    Stations,
    /// Show the current station
    Station,
    /// Start streaming the current station
    Stream,
    /// Skip to the next station
    Skip,
    /// Poll the device now
    Refresh,
    /// Run the device's volume test
    Test,
    /// Ask the device for a memory report
    Memory,
    /// Leave the console
    #[command(alias = "exit")]
    Quit,
}

#[derive(Debug, Parser)]
#[command(no_binary_name = true, disable_version_flag = true)]
struct ConsoleLine {
    #[command(subcommand)]
    command: ConsoleCommand,
}

/// Parse one prompt line.  Blank lines are `Ok(None)`; the error carries
/// clap's rendered usage for anything else it can't make sense of.
pub fn parse_line(line: &str) -> std::result::Result<Option<ConsoleCommand>, clap::Error> {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() {
        return Ok(None);
    }
    ConsoleLine::try_parse_from(words).map(|l| Some(l.command))
}

/// Run one command to completion and return the lines to print.  Failures
/// have already been turned into notices by the time this returns.
pub async fn execute(ctx: &Arc<AppContext>, command: ConsoleCommand) -> Result<Vec<String>> {
    debug!("console: {:?}", command);
    let lines = match command {
        ConsoleCommand::Status => {
            let result = ctx.refresh_now().await;
            let status = ctx.surface("refreshing status", result)?;
            status.summary_lines()
        }
        ConsoleCommand::Refresh => {
            let result = ctx.refresh_now().await;
            ctx.surface("refreshing status", result)?;
            Vec::new()
        }
        ConsoleCommand::Up => {
            ctx.change_volume(VolumeStep::Up).await?;
            Vec::new()
        }
        ConsoleCommand::Down => {
            ctx.change_volume(VolumeStep::Down).await?;
            Vec::new()
        }
        ConsoleCommand::Volume { level } => {
            let volume = ctx.set_volume(level).await?;
            vec![format!("Volume: {}%", volume)]
        }
        ConsoleCommand::Program { mode, folder } => {
            if mode == ProgramMode::Stream {
                ctx.start_stream().await?;
            } else {
                let params = folder.map(SwitchParams::folder).unwrap_or_default();
                ctx.request_switch(mode, params).await?;
            }
            Vec::new()
        }
        ConsoleCommand::Random { folder } => {
            ctx.play_random(folder.as_deref()).await?;
            Vec::new()
        }
        ConsoleCommand::Stop => {
            ctx.transport(Transport::Stop).await?;
            Vec::new()
        }
        ConsoleCommand::Pause => {
            ctx.transport(Transport::Pause).await?;
            Vec::new()
        }
        ConsoleCommand::Resume => {
            ctx.transport(Transport::Resume).await?;
            Vec::new()
        }
        ConsoleCommand::Next => {
            ctx.shuffle_next().await?;
            Vec::new()
        }
        ConsoleCommand::Folder { path } => {
            ctx.change_shuffle_folder(&path).await?;
            Vec::new()
        }
        ConsoleCommand::Regenerate => {
            ctx.regenerate_sequence().await?;
            Vec::new()
        }
        ConsoleCommand::Memes => {
            let memes = ctx.meme_list().await?;
            let entries = memes.entries();
            if entries.is_empty() {
                vec!["No meme files found".to_string()]
            } else {
                entries
                    .into_iter()
                    .map(|(n, label)| format!("{:>3}. {}", n, label))
                    .collect()
            }
        }
        ConsoleCommand::Meme { number } => {
            ctx.play_meme(number).await?;
            Vec::new()
        }
        ConsoleCommand::Stations => {
            // a failed load still leaves the fallback list to show
            let _ = ctx.load_stations().await;
            station_listing(ctx).await
        }
        ConsoleCommand::Station => {
            let info = ctx.station_info().await;
            match (info.station, info.index) {
                (Some(name), Some(i)) => {
                    vec![format!("Station: {} ({}/{})", name, i + 1, info.total)]
                }
                _ => vec!["No station selected".to_string()],
            }
        }
        ConsoleCommand::Stream => {
            ctx.start_stream().await?;
            Vec::new()
        }
        ConsoleCommand::Skip => {
            ctx.next_station().await?;
            Vec::new()
        }
        ConsoleCommand::Test => {
            let text = ctx.volume_test().await?;
            text.lines().map(str::to_string).collect()
        }
        ConsoleCommand::Memory => {
            let text = ctx.memory_report().await?;
            text.lines().map(str::to_string).collect()
        }
        ConsoleCommand::Quit => Vec::new(),
    };
    Ok(lines)
}

async fn station_listing(ctx: &AppContext) -> Vec<String> {
    let dir = ctx.stations.lock().await;
    let current = dir.current_index();
    dir.stations()
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let marker = if Some(i) == current { '>' } else { ' ' };
            format!("{} {:>2}. {}", marker, i + 1, s.name)
        })
        .collect()
}

pub fn render_notice(notice: &Notice) -> String {
    format!(
        "{} [{}] {}",
        notice.raised_at.format("%H:%M:%S"),
        notice.severity,
        notice.message
    )
}

/// Events worth a console line.  Routine status snapshots are not printed;
/// `status` shows them on demand.
pub fn render_event(event: &UiEvent) -> Option<String> {
    match event {
        UiEvent::Status(_) => None,
        UiEvent::StatusError(e) => Some(format!("status unavailable: {}", e)),
        UiEvent::Volume(v) => Some(format!("volume {}%", v)),
        UiEvent::Program { mode, switching } => Some(if *switching {
            format!("program -> {} (switching)", mode)
        } else {
            format!("program {}", mode)
        }),
        UiEvent::Stations(info) => info.station.as_ref().map(|name| {
            format!(
                "station {} ({}/{})",
                name,
                info.index.map(|i| i + 1).unwrap_or(0),
                info.total
            )
        }),
    }
}

/// Holds back `volume N` until input goes quiet for [`VOLUME_DEBOUNCE`];
/// each push replaces the pending level.
pub struct VolumeDebounce {
    ctx: Arc<AppContext>,
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl VolumeDebounce {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self {
            ctx,
            delay: VOLUME_DEBOUNCE,
            pending: None,
        }
    }

    pub fn push(&mut self, level: u32) {
        self.cancel();
        let ctx = Arc::clone(&self.ctx);
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = ctx.set_volume(level).await;
        }));
    }

    /// Drop the pending level, if any, without sending it.
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}

impl Drop for VolumeDebounce {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Interactive prompt.  Returns on `quit`, EOF or Ctrl-C, after tearing the
/// context down.
pub async fn run(ctx: Arc<AppContext>) -> anyhow::Result<()> {
    let mut notices = ctx.notifier.subscribe();
    let mut events = ctx.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut volume = VolumeDebounce::new(Arc::clone(&ctx));
    let mut last_status_error: Option<String> = None;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    println!("Connected to {}. Type `help` for commands.", ctx.gateway.base_url());
    ctx.notifier.success("GhostWhisper remote ready");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_line(&line) {
                    Ok(None) => {}
                    Ok(Some(ConsoleCommand::Quit)) => break,
                    Ok(Some(ConsoleCommand::Volume { level })) => volume.push(level),
                    Ok(Some(command)) => {
                        let ctx = Arc::clone(&ctx);
                        tokio::spawn(async move {
                            if let Ok(output) = execute(&ctx, command).await {
                                for line in output {
                                    println!("{}", line);
                                }
                            }
                        });
                    }
                    Err(e) => print!("{}", e.render()),
                }
            }
            notice = notices.recv() => match notice {
                Ok(notice) => println!("{}", render_notice(&notice)),
                Err(RecvError::Lagged(n)) => debug!("console: skipped {} notices", n),
                Err(RecvError::Closed) => break,
            },
            event = events.recv() => match event {
                Ok(UiEvent::StatusError(e)) => {
                    // one line per outage, not one per tick
                    if last_status_error.as_deref() != Some(e.as_str()) {
                        println!("status unavailable: {}", e);
                        last_status_error = Some(e);
                    }
                }
                Ok(event) => {
                    if matches!(event, UiEvent::Status(_)) && last_status_error.take().is_some() {
                        println!("status back");
                    }
                    if let Some(line) = render_event(&event) {
                        println!("{}", line);
                    }
                }
                Err(RecvError::Lagged(n)) => debug!("console: skipped {} events", n),
                Err(RecvError::Closed) => break,
            },
            _ = &mut ctrl_c => {
                println!();
                break;
            }
        }
    }

    volume.cancel();
    info!("console: exiting");
    ctx.teardown();
    Ok(())
}
