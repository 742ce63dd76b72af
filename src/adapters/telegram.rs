use crate::core::commands::CommandDispatcher;
use crate::core::Notifier;
use crate::utils::error::{MonitorError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";
/// sendMessage 單則訊息的字元上限
const MAX_MESSAGE_CHARS: usize = 4096;

/// 透過 Bot API `sendMessage` 發送訊息；destination 為 chat id
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    token: String,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_api_base(DEFAULT_TELEGRAM_API, token)
    }

    pub fn with_api_base(api_base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }
}

impl TelegramNotifier {
    async fn send_chunk(&self, destination: &str, message: &str) -> Result<()> {
        let payload = serde_json::json!({
            "chat_id": destination,
            "text": message,
        });

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MonitorError::NotificationError {
                message: format!("sendMessage to {} returned {}: {}", destination, status, body),
            });
        }

        tracing::debug!("📨 Telegram message delivered to {}", destination);
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, destination: &str, message: &str) -> Result<()> {
        for chunk in split_message(message, MAX_MESSAGE_CHARS) {
            self.send_chunk(destination, chunk).await?;
        }
        Ok(())
    }
}

/// 依字元數切段，盡量在換行處斷開
fn split_message(text: &str, limit: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = text;
    while rest.chars().count() > limit {
        let cut = rest
            .char_indices()
            .nth(limit)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let end = match rest[..cut].rfind('\n') {
            Some(i) if i > 0 => i + 1,
            _ => cut,
        };
        chunks.push(&rest[..end]);
        rest = &rest[end..];
    }
    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest);
    }
    chunks
}

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

const REPLY_FAILED_TEXT: &str = "回覆內容傳送失敗，請稍後再試。";

/// 以 `getUpdates` long polling 接收命令，交給 dispatcher 後回覆到同一個 chat
pub struct TelegramBot {
    notifier: TelegramNotifier,
    dispatcher: Arc<CommandDispatcher>,
    poll_timeout: Duration,
    retry_delay: Duration,
}

impl TelegramBot {
    pub fn new(notifier: TelegramNotifier, dispatcher: Arc<CommandDispatcher>) -> Self {
        Self {
            notifier,
            dispatcher,
            poll_timeout: Duration::from_secs(30),
            retry_delay: Duration::from_secs(5),
        }
    }

    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// 取一批 update，處理後回傳下一個 offset
    pub async fn poll_once(&self, offset: i64) -> Result<i64> {
        let timeout_secs = self.poll_timeout.as_secs();
        let response = self
            .notifier
            .client
            .get(self.notifier.method_url("getUpdates"))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", timeout_secs.to_string()),
            ])
            .timeout(self.poll_timeout + Duration::from_secs(10))
            .send()
            .await?;

        let updates: UpdatesResponse = response.json().await?;
        if !updates.ok {
            return Err(MonitorError::SourceError {
                message: format!(
                    "getUpdates rejected: {}",
                    updates.description.unwrap_or_default()
                ),
            });
        }

        let mut next_offset = offset;
        for update in updates.result {
            next_offset = next_offset.max(update.update_id + 1);

            let Some(message) = update.message else {
                continue;
            };
            let Some(text) = message.text else {
                continue;
            };
            if !text.starts_with('/') {
                continue;
            }

            let chat_id = message.chat.id.to_string();
            tracing::info!("💬 Command from chat {}: {}", chat_id, text);
            let reply = self.dispatcher.handle_text(&text).await;
            if let Err(e) = self.notifier.send(&chat_id, &reply).await {
                tracing::warn!("⚠️ Reply to chat {} failed: {}", chat_id, e);
                if let Err(e) = self.notifier.send(&chat_id, REPLY_FAILED_TEXT).await {
                    tracing::warn!("⚠️ Fallback reply to chat {} failed: {}", chat_id, e);
                }
            }
        }
        Ok(next_offset)
    }

    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut offset = 0;
        tracing::info!("🤖 Telegram bot polling started");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("🛑 Telegram bot stopped");
                    return;
                }
                result = self.poll_once(offset) => {
                    match result {
                        Ok(next) => offset = next,
                        Err(e) => {
                            tracing::error!("❌ getUpdates failed: {} (Category: {:?})", e, e.category());
                            tokio::time::sleep(self.retry_delay).await;
                        }
                    }
                }
            }
        }
    }
}
