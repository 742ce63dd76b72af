use crate::core::{
    CertificateInfo, CertificateProber, CheckState, Domain, DomainRepository, RecordSource,
    SubdomainInfo,
};
use crate::utils::error::{ErrorCategory, MonitorError, Result};
use crate::utils::validation::validate_hostname;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_ADMISSION_CONCURRENCY: usize = 8;

/// `/cert_info` 的回覆內容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateReport {
    pub domain: String,
    pub issued_to: String,
    pub issued_by: String,
    pub valid_from: String,
    pub valid_until: String,
}

impl CertificateReport {
    pub fn new(domain: &str, cert: &CertificateInfo) -> Self {
        let date = |parsed: Option<chrono::DateTime<chrono::Utc>>, raw: &str| {
            parsed
                .map(|at| at.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| raw.to_string())
        };

        Self {
            domain: domain.to_string(),
            issued_to: cert.issued_to.clone(),
            issued_by: cert.issued_by.clone(),
            valid_from: date(cert.valid_from(), &cert.not_before),
            valid_until: date(cert.expires_at(), &cert.not_after),
        }
    }
}

impl fmt::Display for CertificateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Domain: {}\nIssued To: {}\nIssued By: {}\nValid From: {}\nValid Until: {}",
            self.domain, self.issued_to, self.issued_by, self.valid_from, self.valid_until
        )
    }
}

/// 一批寫入的結果
#[derive(Debug, Default)]
struct AdmissionReport {
    added: Vec<(String, String)>,
    /// 已存在而略過
    unchanged: Vec<(String, String)>,
    rejected: Vec<String>,
    /// 通過檢查但儲存層寫入失敗
    unwritten: Vec<String>,
}

/// Registry 的業務層：寫入前先做 TLS 檢查（admission control），
/// 並把 not-found / no-op 轉成使用者看得懂的錯誤。
pub struct RegistryService {
    repo: Arc<dyn DomainRepository>,
    prober: Arc<dyn CertificateProber>,
    source: Option<Arc<dyn RecordSource>>,
    concurrency: usize,
}

impl RegistryService {
    pub fn new(repo: Arc<dyn DomainRepository>, prober: Arc<dyn CertificateProber>) -> Self {
        Self {
            repo,
            prober,
            source: None,
            concurrency: DEFAULT_ADMISSION_CONCURRENCY,
        }
    }

    pub fn with_record_source(mut self, source: Arc<dyn RecordSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn repository(&self) -> Arc<dyn DomainRepository> {
        Arc::clone(&self.repo)
    }

    pub fn prober(&self) -> Arc<dyn CertificateProber> {
        Arc::clone(&self.prober)
    }

    pub async fn get_domain_info(&self, name: &str) -> Result<Domain> {
        self.repo
            .get_domain(name)
            .await
            .map_err(|e| surface("get_domain", e))?
            .ok_or_else(|| MonitorError::not_found("domain", name))
    }

    pub async fn get_subdomain_info(&self, name: &str) -> Result<SubdomainInfo> {
        self.repo
            .get_subdomain(name)
            .await
            .map_err(|e| surface("get_subdomain", e))?
            .ok_or_else(|| MonitorError::not_found("subdomain", name))
    }

    pub async fn list_all(&self) -> Result<Vec<Domain>> {
        self.repo.list_all().await.map_err(|e| surface("list_all", e))
    }

    /// 回傳 `true` 表示新增，`false` 表示已存在（不算錯誤）
    pub async fn add_subdomain(&self, domain: &str, subdomain: &str) -> Result<bool> {
        validate_hostname("domain", domain)?;
        validate_hostname("subdomain", subdomain)?;

        if !self.prober.is_reachable(subdomain).await {
            tracing::warn!("🚫 Rejected '{}': TLS check failed", subdomain);
            return Err(MonitorError::ValidationError {
                names: vec![subdomain.to_string()],
            });
        }

        self.repo
            .add_subdomain(domain, subdomain)
            .await
            .map_err(|e| surface("add_subdomain", e))
    }

    /// 逐一檢查後立即寫入，沒有跨批次的交易；只要有任何失敗，
    /// 整個呼叫回傳列出所有失敗名稱的錯誤，但已寫入的仍保留。
    pub async fn bulk_add_subdomains(&self, domain: &str, names: &[String]) -> Result<Vec<String>> {
        validate_hostname("domain", domain)?;

        let pairs: Vec<(String, String)> = names
            .iter()
            .map(|name| (domain.to_string(), name.clone()))
            .collect();
        let report = self.admit_all(pairs).await?;

        tracing::info!(
            "📦 Bulk add to '{}': {} added, {} already present, {} rejected",
            domain,
            report.added.len(),
            report.unchanged.len(),
            report.rejected.len()
        );

        if !report.rejected.is_empty() {
            return Err(MonitorError::ValidationError {
                names: report.rejected,
            });
        }
        Ok(report.added.into_iter().map(|(_, name)| name).collect())
    }

    pub async fn update_subdomain(&self, domain: &str, old_name: &str, new_name: &str) -> Result<()> {
        validate_hostname("subdomain", new_name)?;

        if !self.prober.is_reachable(new_name).await {
            tracing::warn!("🚫 Rejected rename to '{}': TLS check failed", new_name);
            return Err(MonitorError::ValidationError {
                names: vec![new_name.to_string()],
            });
        }

        self.repo
            .rename_subdomain(domain, old_name, new_name)
            .await
            .map_err(|e| surface("rename_subdomain", e))
    }

    pub async fn delete_subdomain(&self, name: &str) -> Result<()> {
        self.repo
            .remove_subdomain(name)
            .await
            .map_err(|e| surface("remove_subdomain", e))
    }

    pub async fn enable_subdomain(&self, name: &str) -> Result<()> {
        self.repo
            .set_check_state(name, CheckState::Enable)
            .await
            .map_err(|e| surface("enable_subdomain", e))
    }

    pub async fn disable_subdomain(&self, name: &str) -> Result<()> {
        self.repo
            .set_check_state(name, CheckState::Disable)
            .await
            .map_err(|e| surface("disable_subdomain", e))
    }

    /// 從外部 DNS 來源匯入；回傳至少有一筆成功寫入的 domain
    pub async fn import_from_external_source(&self) -> Result<BTreeSet<String>> {
        let source = self.source.as_ref().ok_or_else(|| MonitorError::ConfigError {
            message: "no external record source configured".to_string(),
        })?;

        tracing::info!("☁️ Importing records from {}", source.name());
        let records = source.fetch_records().await?;

        let mut grouped: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (domain, subdomain) in records {
            grouped.entry(domain).or_default().insert(subdomain);
        }

        let pairs: Vec<(String, String)> = grouped
            .into_iter()
            .flat_map(|(domain, subdomains)| {
                subdomains
                    .into_iter()
                    .map(move |subdomain| (domain.clone(), subdomain))
            })
            .collect();
        tracing::info!("☁️ {} candidate records from {}", pairs.len(), source.name());

        let report = self.admit_all(pairs).await?;
        let domains: BTreeSet<String> = report
            .added
            .into_iter()
            .map(|(domain, _)| domain)
            .collect();

        tracing::info!(
            "☁️ Import finished: {} domains updated, {} records rejected",
            domains.len(),
            report.rejected.len()
        );

        if !report.rejected.is_empty() {
            return Err(MonitorError::ValidationError {
                names: report.rejected,
            });
        }
        Ok(domains)
    }

    pub async fn get_certificate_report(&self, name: &str) -> Result<CertificateReport> {
        validate_hostname("domain", name)?;

        match self.prober.fetch_certificate(name).await {
            Some(cert) => Ok(CertificateReport::new(name, &cert)),
            None => Err(MonitorError::ValidationError {
                names: vec![name.to_string()],
            }),
        }
    }

    /// 並行做 TLS 檢查（保留輸入順序），再依序寫入。
    /// 寫入失敗不中斷後續名稱，整批結束後才回傳第一個儲存錯誤。
    async fn admit_all(&self, pairs: Vec<(String, String)>) -> Result<AdmissionReport> {
        let prober = &self.prober;
        let probed: Vec<((String, String), Option<Rejection>)> = stream::iter(pairs)
            .map(|(domain, subdomain)| async move {
                let rejection = if validate_hostname("subdomain", &subdomain).is_err()
                    || validate_hostname("domain", &domain).is_err()
                {
                    Some(Rejection::InvalidName)
                } else if !prober.is_reachable(&subdomain).await {
                    Some(Rejection::TlsCheckFailed)
                } else {
                    None
                };
                ((domain, subdomain), rejection)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = AdmissionReport::default();
        let mut storage_error = None;
        for ((domain, subdomain), rejection) in probed {
            if let Some(reason) = rejection {
                tracing::warn!("🚫 Rejected '{}': {}", subdomain, reason);
                report.rejected.push(subdomain);
                continue;
            }

            match self.repo.add_subdomain(&domain, &subdomain).await {
                Ok(true) => report.added.push((domain, subdomain)),
                Ok(false) => report.unchanged.push((domain, subdomain)),
                Err(e) => {
                    let e = surface("add_subdomain", e);
                    report.unwritten.push(subdomain);
                    storage_error.get_or_insert(e);
                }
            }
        }

        if let Some(err) = storage_error {
            tracing::error!(
                "❌ Admission incomplete: {} added, rejected {:?}, not written {:?}",
                report.added.len(),
                report.rejected,
                report.unwritten
            );
            return Err(err);
        }
        Ok(report)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    InvalidName,
    TlsCheckFailed,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::InvalidName => write!(f, "invalid host name"),
            Rejection::TlsCheckFailed => write!(f, "TLS check failed"),
        }
    }
}

/// 儲存層錯誤只在日誌留下細節
fn surface(operation: &str, err: MonitorError) -> MonitorError {
    if err.category() == ErrorCategory::Persistence {
        tracing::error!("❌ {} failed: {}", operation, err);
    }
    err
}
