//! Typed HTTP access to the device.
//!
//! One call = one round trip.  Nothing here retries; a failed request comes
//! back as a `ClientError::Network` and the caller decides what to show.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use whisper_proto::config::DeviceConfig;
use whisper_proto::protocol::{
    CommandReply, DeviceStatus, Endpoint, MemeList, Method, ReplyStatus, VolumeReply,
};

use crate::error::{ClientError, NetworkCause, Result};

/// Error bodies can be whole HTML pages; keep the log readable.
const MAX_ERROR_BODY: usize = 200;

#[derive(Clone)]
pub struct Gateway {
    client: Client,
    base_url: String,
}

impl Gateway {
    pub fn new(config: &DeviceConfig) -> std::result::Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("ghostwhisper-remote/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self::with_client(client, &config.base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, endpoint: &Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    /// Issue `endpoint` and return its body.  Text endpoints come back as a
    /// JSON string value so every caller sees the same shape.
    pub async fn send(&self, endpoint: &Endpoint) -> Result<Value> {
        let url = self.url_for(endpoint);
        let mut request = match endpoint.method() {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        let query = endpoint.query();
        if !query.is_empty() {
            request = request.query(&query);
        }
        if let Some(body) = endpoint.body() {
            request = request.json(body);
        }

        debug!("gateway: {}", endpoint);
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::network(endpoint, e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::network(endpoint, e))?;

        if !status.is_success() {
            warn!("gateway: {} answered {}", endpoint, status);
            return Err(ClientError::network(
                endpoint,
                NetworkCause::Status {
                    code: status.as_u16(),
                    body: clip(&text),
                },
            ));
        }

        if endpoint.replies_with_text() {
            return Ok(Value::String(text));
        }
        serde_json::from_str(&text).map_err(|e| ClientError::network(endpoint, e))
    }

    async fn send_as<T: DeserializeOwned>(&self, endpoint: &Endpoint) -> Result<T> {
        let value = self.send(endpoint).await?;
        serde_json::from_value(value).map_err(|e| ClientError::network(endpoint, e))
    }

    pub async fn status(&self) -> Result<DeviceStatus> {
        self.send_as(&Endpoint::Status).await
    }

    /// Volume up/down/set.
    pub async fn volume(&self, endpoint: &Endpoint) -> Result<VolumeReply> {
        self.send_as(endpoint).await
    }

    /// Any `{status, message}` endpoint.  `status: "error"` becomes
    /// `Rejected`; `info` is passed through for the caller to show as-is.
    pub async fn command(&self, endpoint: &Endpoint) -> Result<CommandReply> {
        let reply: CommandReply = self.send_as(endpoint).await?;
        if reply.status == ReplyStatus::Error {
            return Err(ClientError::Rejected {
                endpoint: endpoint.to_string(),
                message: reply.message,
            });
        }
        Ok(reply)
    }

    pub async fn meme_list(&self) -> Result<MemeList> {
        self.send_as(&Endpoint::MemeList).await
    }

    /// Plain-text endpoints (`/meme/play`, `/test`, `/memory`).
    pub async fn text(&self, endpoint: &Endpoint) -> Result<String> {
        match self.send(endpoint).await? {
            Value::String(s) => Ok(s),
            other => Ok(other.to_string()),
        }
    }

    /// Fetch the external station catalog.  Lives off-device, so it takes an
    /// absolute URL rather than an `Endpoint`.
    pub async fn fetch_catalog(&self, url: &str) -> Result<Value> {
        let label = format!("GET {}", url);
        debug!("gateway: {}", label);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ClientError::network(&label, e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::network(
                &label,
                NetworkCause::Status {
                    code: status.as_u16(),
                    body: clip(&body),
                },
            ));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::network(&label, e))?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::network(&label, e))
    }
}

fn clip(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let gw = Gateway::with_client(Client::new(), "http://10.0.0.5/");
        assert_eq!(gw.base_url(), "http://10.0.0.5");
        assert_eq!(gw.url_for(&Endpoint::VolumeUp), "http://10.0.0.5/volume/up");
    }

    #[test]
    fn test_clip_long_bodies() {
        let long = "x".repeat(500);
        let clipped = clip(&long);
        assert_eq!(clipped.chars().count(), MAX_ERROR_BODY + 1);
        assert_eq!(clip("  short \n"), "short");
    }
}
