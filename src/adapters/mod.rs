// Adapters layer: concrete implementations of the domain ports (storage, TLS, chat, DNS provider).

pub mod cloudflare;
pub mod storage;
pub mod telegram;
pub mod tls;
pub mod webhook;

pub use cloudflare::CloudflareSource;
pub use storage::{LocalStorage, MemoryStorage};
pub use telegram::{TelegramBot, TelegramNotifier};
pub use tls::TlsProber;
pub use webhook::WebhookNotifier;
