use crate::core::expiry::ExpiryPolicy;
use crate::core::{CertificateProber, DomainRepository, ExpiryDecision, Notifier};
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_SOURCE_TAG: &str = "ssl-monitor";
pub const DEFAULT_SWEEP_CONCURRENCY: usize = 8;
pub const SWEEP_COMPLETE_MESSAGE: &str = "所有 domain 的 SSL 到期時間檢查完成。";
pub const SWEEP_FAILED_MESSAGE: &str = "SSL 到期時間檢查失敗";

/// 單一 subdomain 的到期通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryNotice {
    pub source_tag: String,
    pub domain: String,
    pub subdomain: String,
    pub expires_at: DateTime<Utc>,
    pub days_remaining: i64,
}

impl ExpiryNotice {
    pub fn new(source_tag: &str, domain: &str, subdomain: &str, decision: &ExpiryDecision) -> Self {
        Self {
            source_tag: source_tag.to_string(),
            domain: domain.to_string(),
            subdomain: subdomain.to_string(),
            expires_at: decision.expires_at,
            days_remaining: decision.days_remaining,
        }
    }
}

impl fmt::Display for ExpiryNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines = [
            format!("來源: {}", self.source_tag),
            "標題: 憑證到期".to_string(),
            format!("domain : {}", self.domain),
            format!("到期日: {}", self.expires_at.format("%Y-%m-%d")),
            format!("subdomain: {}", self.subdomain),
            format!("剩餘天數: {}", self.days_remaining),
        ];
        f.write_str(&lines.join("\n"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// 成功取得憑證的數量
    pub checked: usize,
    pub notified: usize,
    pub skipped_disabled: usize,
    /// 無法取得或解析憑證的 subdomain，附上原因
    pub failures: Vec<String>,
}

impl SweepReport {
    pub fn summary(&self) -> String {
        format!(
            "{}\n已檢查: {}，已通知: {}，停用略過: {}，失敗: {}",
            SWEEP_COMPLETE_MESSAGE,
            self.checked,
            self.notified,
            self.skipped_disabled,
            self.failures.len()
        )
    }
}

/// 掃過整個 registry，檢查所有 enable 的 subdomain 並發送到期通知。
///
/// 單一 subdomain 的失敗只記錄、不中斷；每次掃描只送出一則完成摘要。
pub struct ExpirySweeper {
    repo: Arc<dyn DomainRepository>,
    prober: Arc<dyn CertificateProber>,
    notifier: Arc<dyn Notifier>,
    policy: ExpiryPolicy,
    destination: String,
    source_tag: String,
    concurrency: usize,
}

impl ExpirySweeper {
    pub fn new(
        repo: Arc<dyn DomainRepository>,
        prober: Arc<dyn CertificateProber>,
        notifier: Arc<dyn Notifier>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            repo,
            prober,
            notifier,
            policy: ExpiryPolicy::default(),
            destination: destination.into(),
            source_tag: DEFAULT_SOURCE_TAG.to_string(),
            concurrency: DEFAULT_SWEEP_CONCURRENCY,
        }
    }

    pub fn with_policy(mut self, policy: ExpiryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_source_tag(mut self, source_tag: impl Into<String>) -> Self {
        self.source_tag = source_tag.into();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// 只有讀取整個 registry 失敗才會回傳錯誤
    pub async fn sweep(&self) -> Result<SweepReport> {
        tracing::info!("🔍 Starting certificate expiry sweep");
        let domains = self.repo.list_all().await?;

        let mut report = SweepReport::default();
        let mut targets = Vec::new();
        for domain in &domains {
            for subdomain in &domain.subdomains {
                if subdomain.is_enabled() {
                    targets.push((domain.name.clone(), subdomain.name.clone()));
                } else {
                    tracing::debug!("Skipping disabled subdomain {}", subdomain.name);
                    report.skipped_disabled += 1;
                }
            }
        }
        tracing::info!(
            "🔍 {} enabled subdomains across {} domains",
            targets.len(),
            domains.len()
        );

        let prober = &self.prober;
        let mut probes = stream::iter(targets)
            .map(|(domain, subdomain)| async move {
                let result = prober.certificate(&subdomain).await;
                (domain, subdomain, result)
            })
            .buffer_unordered(self.concurrency);

        while let Some((domain, subdomain, result)) = probes.next().await {
            let cert = match result {
                Ok(cert) => cert,
                Err(e) => {
                    tracing::warn!("⚠️ Skipping {}: {}", subdomain, e);
                    report.failures.push(format!("{}: {}", subdomain, e));
                    continue;
                }
            };
            report.checked += 1;

            let Some(decision) = self.policy.evaluate(&cert) else {
                report
                    .failures
                    .push(format!("{}: unparsable notAfter '{}'", subdomain, cert.not_after));
                continue;
            };

            if !decision.should_notify {
                tracing::debug!(
                    "{} expires on {} ({} days left)",
                    subdomain,
                    decision.expires_at.format("%Y-%m-%d"),
                    decision.days_remaining
                );
                continue;
            }

            let notice = ExpiryNotice::new(&self.source_tag, &domain, &subdomain, &decision);
            tracing::info!(
                "⏰ {} expires in {} days, notifying",
                subdomain,
                decision.days_remaining
            );
            match self.notifier.send(&self.destination, &notice.to_string()).await {
                Ok(()) => report.notified += 1,
                Err(e) => tracing::warn!("⚠️ Notification for {} failed: {}", subdomain, e),
            }
        }

        if let Err(e) = self.notifier.send(&self.destination, &report.summary()).await {
            tracing::warn!("⚠️ Sweep summary could not be delivered: {}", e);
        }

        tracing::info!(
            "✅ Sweep complete: checked={}, notified={}, skipped={}, failed={}",
            report.checked,
            report.notified,
            report.skipped_disabled,
            report.failures.len()
        );
        Ok(report)
    }

    /// 排程用：錯誤回報到通知頻道，不往上拋
    pub async fn run_and_report(&self) -> Option<SweepReport> {
        match self.sweep().await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!("❌ Sweep failed: {} (Category: {:?})", e, e.category());
                let message = format!("{}: {}", SWEEP_FAILED_MESSAGE, e.user_friendly_message());
                if let Err(send_err) = self.notifier.send(&self.destination, &message).await {
                    tracing::error!("❌ Could not report sweep failure: {}", send_err);
                }
                None
            }
        }
    }
}
