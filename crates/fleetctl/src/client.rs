//! HTTP client for the fleetgate API.

use std::time::Duration;

use anyhow::Context;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

/// Port the daemon listens on unless configured otherwise.
pub const DEFAULT_API_PORT: u16 = 12000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(360);

pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    /// `insecure` disables TLS certificate verification; `plain_http`
    /// talks to the daemon without TLS.
    pub fn new(control_plane: &str, port: u16, insecure: bool, plain_http: bool) -> anyhow::Result<Self> {
        let scheme = if plain_http { "http" } else { "https" };
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(insecure)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            base_url: format!("{scheme}://{control_plane}:{port}"),
            http,
        })
    }

    /// POST a JSON body and return the status with the decoded JSON reply.
    pub async fn post(&self, path: &str, body: &Value) -> anyhow::Result<(StatusCode, Value)> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "POST");
        let resp = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;
        let status = resp.status();
        let text = resp.text().await.context("reading response body")?;
        let reply = serde_json::from_str(&text).unwrap_or(Value::String(text));
        debug!(%url, %status, "response received");
        Ok((status, reply))
    }
}

/// Human-readable error out of an API reply.
pub fn error_message(reply: &Value) -> String {
    match reply.get("error").and_then(Value::as_str) {
        Some(error) => error.to_string(),
        None => reply.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_message_prefers_error_field() {
        assert_eq!(error_message(&json!({"status": "error", "error": "invalid token"})), "invalid token");
        assert_eq!(error_message(&json!("bad gateway")), "\"bad gateway\"");
    }

    #[test]
    fn base_url_follows_flags() {
        let client = ApiClient::new("10.0.0.1", DEFAULT_API_PORT, false, false).unwrap();
        assert_eq!(client.base_url, "https://10.0.0.1:12000");
        let client = ApiClient::new("cp.local", 8080, true, true).unwrap();
        assert_eq!(client.base_url, "http://cp.local:8080");
    }
}
