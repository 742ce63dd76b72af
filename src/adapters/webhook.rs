use crate::core::Notifier;
use crate::utils::error::{MonitorError, Result};
use async_trait::async_trait;
use reqwest::Client;

#[derive(Debug, Clone)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

/// 以 JSON `{"destination", "text"}` POST 到任意 webhook
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
    auth: Option<BasicAuth>,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            auth: None,
        }
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(BasicAuth {
            username: username.into(),
            password: password.into(),
        });
        self
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, destination: &str, message: &str) -> Result<()> {
        let payload = serde_json::json!({
            "destination": destination,
            "text": message,
        });

        let mut request = self.client.post(&self.url).json(&payload);
        if let Some(auth) = &self.auth {
            request = request.basic_auth(&auth.username, Some(&auth.password));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MonitorError::NotificationError {
                message: format!("webhook {} returned {}", self.url, status),
            });
        }

        tracing::debug!("📨 Webhook notification delivered for {}", destination);
        Ok(())
    }
}
