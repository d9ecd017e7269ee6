use std::process::ExitCode;

use clap::Parser;

use whisper_proto::config::Config;
use whisper_remote::console::{self, ConsoleCommand};
use whisper_remote::AppContext;

#[derive(Debug, Parser)]
#[command(name = "ghostwhisper", version, about = "Remote control for a GhostWhisper player")]
struct Args {
    /// Device base URL, e.g. http://192.168.4.1
    #[arg(short, long)]
    device: Option<String>,

    /// Status poll interval in seconds
    #[arg(short, long)]
    interval: Option<u64>,

    /// Don't poll the device in the background
    #[arg(long)]
    no_poll: bool,

    /// Run one command and exit instead of opening the console
    #[command(subcommand)]
    command: Option<ConsoleCommand>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let log_path = whisper_proto::platform::log_path();
    std::fs::create_dir_all(whisper_proto::platform::data_dir())?;
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // RUST_LOG wins; otherwise keep HTTP client internals quiet.
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        "info,whisper_remote=debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string()
    });
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("ghostwhisper log: {}", log_path.display());
    tracing::info!("ghostwhisper starting");

    // ── Config ───────────────────────────────────────────────────────────────
    let mut config = Config::load().unwrap_or_else(|e| {
        tracing::warn!("config: {:#}, using defaults", e);
        Config::default()
    });
    if let Some(device) = args.device {
        config.device.base_url = device;
    }
    if let Some(secs) = args.interval {
        config.polling.interval_secs = secs;
    }
    if args.no_poll {
        config.polling.auto_polling = false;
    }

    // ── One-shot ─────────────────────────────────────────────────────────────
    if let Some(command) = args.command {
        let ctx = AppContext::new(config)?;
        let result = console::execute(&ctx, command).await;
        if let Ok(lines) = &result {
            for line in lines {
                println!("{}", line);
            }
        }
        for notice in ctx.notifier.active() {
            eprintln!("{}", console::render_notice(&notice));
        }
        return Ok(match result {
            Err(e) if !e.is_silent() => ExitCode::FAILURE,
            _ => ExitCode::SUCCESS,
        });
    }

    // ── Console ──────────────────────────────────────────────────────────────
    let ctx = AppContext::init(config)?;
    console::run(ctx).await?;
    tracing::info!("ghostwhisper stopped");
    Ok(ExitCode::SUCCESS)
}
