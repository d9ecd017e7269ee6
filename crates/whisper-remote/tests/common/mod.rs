#![allow(dead_code)]

//! In-process stand-in for the player's HTTP API.
//!
//! Serves the same routes and reply shapes as the firmware, records what it
//! was asked, and can be told to stall, refuse or fail.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use whisper_proto::config::Config;
use whisper_remote::AppContext;

pub const VOLUME_STEP: u8 = 5;

#[derive(Debug, Clone)]
pub struct DeviceModel {
    pub program: String,
    pub volume: u8,
    pub connection_mode: String,
    /// Applied before answering any control request (not `/status`).
    pub delay: Duration,
    pub fail_status: bool,
    /// `/status` answers 200 with a body that isn't JSON.
    pub garble_status: bool,
    pub reject_program: bool,
    /// `None` makes `/catalog` answer 500.
    pub catalog: Option<Value>,
    pub memes: Vec<String>,
    pub hits: HashMap<String, usize>,
    pub last_query: HashMap<String, String>,
    pub last_body: Option<Value>,
}

impl Default for DeviceModel {
    fn default() -> Self {
        Self {
            program: "GENERATIVE".to_string(),
            volume: 50,
            connection_mode: "ONLINE".to_string(),
            delay: Duration::ZERO,
            fail_status: false,
            garble_status: false,
            reject_program: false,
            catalog: Some(json!({"dayang": "https://streams.example/dayang.mp3"})),
            memes: vec!["/meme/airhorn.mp3".to_string(), "/meme/bruh.mp3".to_string()],
            hits: HashMap::new(),
            last_query: HashMap::new(),
            last_body: None,
        }
    }
}

#[derive(Clone, Default)]
pub struct MockDevice {
    model: Arc<Mutex<DeviceModel>>,
}

impl MockDevice {
    pub fn with<R>(&self, f: impl FnOnce(&mut DeviceModel) -> R) -> R {
        f(&mut self.model.lock().unwrap())
    }

    pub fn hits(&self, path: &str) -> usize {
        self.with(|m| m.hits.get(path).copied().unwrap_or(0))
    }

    fn count(&self, path: &str) {
        self.with(|m| *m.hits.entry(path.to_string()).or_default() += 1);
    }

    /// Count a control request and remember its query.  Returns the
    /// configured delay.
    fn record(&self, path: &str, query: &HashMap<String, String>) -> Duration {
        self.with(|m| {
            *m.hits.entry(path.to_string()).or_default() += 1;
            m.last_query = query.clone();
            m.delay
        })
    }
}

type Params = Query<HashMap<String, String>>;

fn success(message: impl Into<String>) -> Json<Value> {
    Json(json!({"status": "success", "message": message.into()}))
}

async fn status(State(dev): State<MockDevice>) -> Response {
    // polls don't touch last_query; tests inspect the control request before it
    dev.count("/status");
    dev.with(|m| {
        if m.fail_status {
            return (StatusCode::INTERNAL_SERVER_ERROR, "status unavailable").into_response();
        }
        if m.garble_status {
            return "<html>busy</html>".into_response();
        }
        Json(json!({
            "volume": m.volume,
            "wifi": "192.168.4.20",
            "uptime": 3725,
            "freeHeap": 234567,
            "playbackActive": true,
            "currentProgram": m.program,
            "programActive": true,
            "connectionMode": m.connection_mode,
        }))
        .into_response()
    })
}

async fn volume(
    State(dev): State<MockDevice>,
    Path(action): Path<String>,
    Query(q): Params,
) -> Response {
    let delay = dev.record(&format!("/volume/{}", action), &q);
    tokio::time::sleep(delay).await;
    let volume = dev.with(|m| {
        m.volume = match action.as_str() {
            "up" => m.volume.saturating_add(VOLUME_STEP).min(100),
            "down" => m.volume.saturating_sub(VOLUME_STEP),
            _ => q.get("level").and_then(|l| l.parse().ok()).unwrap_or(m.volume),
        };
        m.volume
    });
    Json(json!({"status": "success", "volume": volume})).into_response()
}

async fn switch(dev: MockDevice, mode: String, body: Option<Value>) -> Response {
    let delay = dev.with(|m| {
        m.last_body = body;
        m.delay
    });
    tokio::time::sleep(delay).await;
    dev.with(|m| {
        if m.reject_program {
            return Json(json!({"status": "error", "message": "Program switch failed"}))
                .into_response();
        }
        m.program = mode.to_uppercase();
        success(format!("Switched to {} program", m.program)).into_response()
    })
}

async fn program_get(
    State(dev): State<MockDevice>,
    Path(mode): Path<String>,
    Query(q): Params,
) -> Response {
    dev.record(&format!("/program/{}", mode), &q);
    switch(dev, mode, None).await
}

async fn program_post(
    State(dev): State<MockDevice>,
    Path(mode): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    dev.record(&format!("/program/{}", mode), &HashMap::new());
    switch(dev, mode, Some(body)).await
}

async fn control(
    State(dev): State<MockDevice>,
    Path(action): Path<String>,
    Query(q): Params,
) -> Response {
    let delay = dev.record(&format!("/{}", action), &q);
    tokio::time::sleep(delay).await;
    match action.as_str() {
        "pause" => {
            Json(json!({"status": "info", "message": "Nothing is playing"})).into_response()
        }
        "random" => success("Playing random file").into_response(),
        other => success(format!("{} ok", other)).into_response(),
    }
}

async fn shuffle(
    State(dev): State<MockDevice>,
    Path(action): Path<String>,
    Query(q): Params,
) -> Response {
    let delay = dev.record(&format!("/shuffle/{}", action), &q);
    tokio::time::sleep(delay).await;
    success("ok").into_response()
}

async fn regenerate(State(dev): State<MockDevice>) -> Response {
    dev.record("/generative/regenerate", &HashMap::new());
    success("New sequence generated").into_response()
}

async fn meme_list(State(dev): State<MockDevice>) -> Response {
    dev.record("/meme/list", &HashMap::new());
    let files = dev.with(|m| m.memes.clone());
    Json(json!({ "files": files })).into_response()
}

async fn meme_play(State(dev): State<MockDevice>, Query(q): Params) -> Response {
    dev.record("/meme/play", &q);
    let count = dev.with(|m| m.memes.len());
    match q.get("n").and_then(|n| n.parse::<usize>().ok()) {
        Some(n) if n >= 1 && n <= count => format!("Playing meme {}", n).into_response(),
        _ => "Meme file not found".into_response(),
    }
}

async fn stream_play(State(dev): State<MockDevice>, Json(body): Json<Value>) -> Response {
    let delay = dev.record("/stream/play", &HashMap::new());
    tokio::time::sleep(delay).await;
    dev.with(|m| {
        m.program = "STREAM".to_string();
        m.last_body = Some(body);
    });
    success("Stream started").into_response()
}

async fn catalog(State(dev): State<MockDevice>) -> Response {
    dev.count("/catalog");
    match dev.with(|m| m.catalog.clone()) {
        Some(body) => Json(body).into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "catalog down").into_response(),
    }
}

async fn volume_test(State(dev): State<MockDevice>) -> Response {
    dev.record("/test", &HashMap::new());
    "Volume test started".into_response()
}

async fn memory(State(dev): State<MockDevice>) -> Response {
    dev.record("/memory", &HashMap::new());
    "Free heap: 234567\nLargest block: 110000".into_response()
}

pub fn router(dev: MockDevice) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/volume/:action", get(volume))
        .route("/program/:mode", get(program_get).post(program_post))
        .route("/shuffle/:action", get(shuffle))
        .route("/generative/regenerate", get(regenerate))
        .route("/meme/list", get(meme_list))
        .route("/meme/play", get(meme_play))
        .route("/stream/play", axum::routing::post(stream_play))
        .route("/catalog", get(catalog))
        .route("/test", get(volume_test))
        .route("/memory", get(memory))
        .route("/:action", get(control))
        .with_state(dev)
}

pub struct Harness {
    pub device: MockDevice,
    pub addr: SocketAddr,
    pub ctx: Arc<AppContext>,
}

impl Harness {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

/// Start a mock device on an ephemeral port and a context pointed at it.
/// Background polling stays off; tests poll explicitly.
pub async fn start() -> Harness {
    start_with(DeviceModel::default()).await
}

pub async fn start_with(model: DeviceModel) -> Harness {
    let device = MockDevice {
        model: Arc::new(Mutex::new(model)),
    };
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(device.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let mut config = Config::default();
    config.device.base_url = format!("http://{}", addr);
    config.stations.catalog_url = format!("http://{}/catalog", addr);
    config.polling.auto_polling = false;
    config.polling.interval_secs = 1;
    let ctx = AppContext::new(config).unwrap();

    Harness { device, addr, ctx }
}
