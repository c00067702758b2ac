use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info};

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const RPC_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum KodiError {
    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("kodi rejected the call: {0}")]
    Rejected(StatusCode),
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<serde_json::Value>,
}

/// Kodi JSON-RPC client over the device's HTTP control port.
#[derive(Clone)]
pub struct KodiClient {
    client: Client,
    base_url: String,
    credentials: Option<(String, String)>,
}

impl KodiClient {
    pub fn new(base_url: &str, user: Option<String>, pass: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials: user.zip(pass),
        }
    }

    /// Liveness check of the control port. 401/405 still prove the HTTP
    /// stack is up, which is all the wake sequence needs.
    pub async fn probe(&self) -> bool {
        let response = self
            .client
            .get(&self.base_url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;

        match response {
            Ok(r) => matches!(
                r.status(),
                StatusCode::OK | StatusCode::UNAUTHORIZED | StatusCode::METHOD_NOT_ALLOWED
            ),
            Err(_) => false,
        }
    }

    /// Start playback of a plugin deep-link via `Player.Open`.
    pub async fn play_url(&self, plugin_url: &str) -> Result<(), KodiError> {
        info!(url = plugin_url, "dispatching playback");

        let payload = json!({
            "jsonrpc": "2.0",
            "method": "Player.Open",
            "params": { "item": { "file": plugin_url } },
            "id": 1,
        });

        let mut request = self
            .client
            .post(&self.base_url)
            .timeout(RPC_TIMEOUT)
            .json(&payload);

        if let Some((user, pass)) = &self.credentials {
            request = request.basic_auth(user, Some(pass));
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(KodiError::Rejected(response.status()));
        }

        let body: RpcResponse = response.json().await?;
        debug!(result = ?body.result, "kodi rpc answered");

        Ok(())
    }
}
