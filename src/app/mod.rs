// Application wiring: builds adapters from `AppConfig` and hands them to the core services.

use crate::adapters::{
    CloudflareSource, LocalStorage, TelegramBot, TelegramNotifier, TlsProber, WebhookNotifier,
};
use crate::config::{AppConfig, NotifierKind};
use crate::core::commands::CommandDispatcher;
use crate::core::registry::DocumentRegistry;
use crate::core::scheduler::Scheduler;
use crate::core::service::RegistryService;
use crate::core::sweep::ExpirySweeper;
use crate::core::{CertificateProber, DomainRepository, Notifier, RecordSource};
use crate::utils::error::{MonitorError, Result};
use std::sync::Arc;

/// 一組已接好線的服務
pub struct Monitor {
    pub service: Arc<RegistryService>,
    pub sweeper: Arc<ExpirySweeper>,
    pub dispatcher: Arc<CommandDispatcher>,
    scheduler: Scheduler,
    bot: Option<TelegramBot>,
}

impl Monitor {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let repo: Arc<dyn DomainRepository> = Arc::new(DocumentRegistry::new(LocalStorage::new(
            config.storage.path.clone(),
        )));
        let prober: Arc<dyn CertificateProber> = Arc::new(
            TlsProber::new(config.probe_timeout()).with_port(config.probe.port),
        );
        Self::assemble(config, repo, prober)
    }

    /// 儲存與 prober 由呼叫端提供，其他依設定建立
    pub fn assemble(
        config: &AppConfig,
        repo: Arc<dyn DomainRepository>,
        prober: Arc<dyn CertificateProber>,
    ) -> Result<Self> {
        let telegram = config.telegram.as_ref().map(|t| match &t.api_base {
            Some(api_base) => TelegramNotifier::with_api_base(api_base.clone(), t.bot_token.clone()),
            None => TelegramNotifier::new(t.bot_token.clone()),
        });

        let notifier: Arc<dyn Notifier> = match config.notification.kind {
            NotifierKind::Telegram => match &telegram {
                Some(telegram) => Arc::new(telegram.clone()),
                None => {
                    return Err(MonitorError::MissingConfigError {
                        field: "telegram".to_string(),
                    })
                }
            },
            NotifierKind::Webhook => {
                let url = config.notification.webhook_url.clone().ok_or_else(|| {
                    MonitorError::MissingConfigError {
                        field: "notification.webhook_url".to_string(),
                    }
                })?;
                let mut webhook = WebhookNotifier::new(url);
                if let Some(username) = &config.notification.webhook_username {
                    let password = config.notification.webhook_password.clone().unwrap_or_default();
                    webhook = webhook.with_basic_auth(username.clone(), password);
                }
                Arc::new(webhook)
            }
        };

        let mut service = RegistryService::new(Arc::clone(&repo), Arc::clone(&prober))
            .with_concurrency(config.probe.concurrency);
        if let Some(cloudflare) = &config.cloudflare {
            let source: Arc<dyn RecordSource> = Arc::new(match &cloudflare.api_base {
                Some(api_base) => CloudflareSource::with_api_base(
                    api_base.clone(),
                    cloudflare.email.clone(),
                    cloudflare.api_key.clone(),
                ),
                None => CloudflareSource::new(cloudflare.email.clone(), cloudflare.api_key.clone()),
            });
            service = service.with_record_source(source);
        }
        let service = Arc::new(service);

        let sweeper = Arc::new(
            ExpirySweeper::new(repo, prober, notifier, config.destination()?)
                .with_policy(config.expiry_policy())
                .with_source_tag(config.notification.source_tag.clone())
                .with_concurrency(config.probe.concurrency),
        );

        let dispatcher = Arc::new(CommandDispatcher::new(
            Arc::clone(&service),
            Arc::clone(&sweeper),
        ));
        let scheduler = Scheduler::new(config.schedule()?, Arc::clone(&sweeper));
        let bot = telegram.map(|telegram| TelegramBot::new(telegram, Arc::clone(&dispatcher)));

        Ok(Self {
            service,
            sweeper,
            dispatcher,
            scheduler,
            bot,
        })
    }

    /// 同時跑排程與 bot，直到 `shutdown` 完成
    pub async fn serve<F>(&self, shutdown: F)
    where
        F: std::future::Future<Output = ()>,
    {
        let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
        let wait_for_stop = |mut rx: tokio::sync::watch::Receiver<bool>| async move {
            // sender 被丟棄也視為停止
            let _ = rx.wait_for(|stopped| *stopped).await;
        };

        let scheduler = self.scheduler.run_until(wait_for_stop(stop_rx.clone()));
        let bot = async {
            match &self.bot {
                Some(bot) => bot.run_until(wait_for_stop(stop_rx.clone())).await,
                None => tracing::info!("Telegram bot disabled, scheduler only"),
            }
        };
        let signal = async {
            shutdown.await;
            tracing::info!("🛑 Shutdown requested");
            let _ = stop_tx.send(true);
        };

        tokio::join!(scheduler, bot, signal);
    }
}
