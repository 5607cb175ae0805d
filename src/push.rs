use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::config::HostConfig;

/// Client for the host platform's outbound send endpoint. The host owns
/// message routing; we only hand it a destination id and content.
pub struct HostClient {
    client: reqwest::Client,
    push_url: String,
    token: Option<String>,
}

impl HostClient {
    pub fn new(config: &HostConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            push_url: config.push_url.clone(),
            token: config.token.clone(),
        }
    }

    pub async fn send_text(&self, destination: &str, text: &str) -> Result<()> {
        self.send(serde_json::json!({
            "destination": destination,
            "text": text,
        }))
        .await
    }

    /// Send a caption plus a PNG, embedded base64 so the host needs no
    /// access to our filesystem.
    pub async fn send_card(&self, destination: &str, text: &str, png: &[u8]) -> Result<()> {
        self.send(serde_json::json!({
            "destination": destination,
            "text": text,
            "image_base64": BASE64.encode(png),
        }))
        .await
    }

    async fn send(&self, payload: serde_json::Value) -> Result<()> {
        let mut req = self.client.post(&self.push_url).json(&payload);
        if let Some(token) = &self.token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        let resp = req.send().await?;
        if !resp.status().is_success() {
            anyhow::bail!(
                "Host push failed: {} {}",
                resp.status(),
                resp.text().await.unwrap_or_default()
            );
        }
        Ok(())
    }
}
