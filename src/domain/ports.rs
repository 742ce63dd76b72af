use crate::domain::model::{
    CertificateInfo, CheckState, Domain, ProbeMode, ProbeOutcome, SubdomainInfo,
};
use crate::utils::error::Result;
use async_trait::async_trait;

/// 以路徑為鍵的文件儲存
pub trait Storage: Send + Sync {
    fn read_file(
        &self,
        path: &str,
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// 列出目錄下的檔名（不含目錄前綴）
    fn list_files(&self, dir: &str) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;
}

/// Domain/subdomain registry. Getters return `None` for absent entries; mutations
/// return `NotFound`/`NoStateChange` errors and storage failures as `PersistenceError`.
#[async_trait]
pub trait DomainRepository: Send + Sync {
    async fn get_domain(&self, name: &str) -> Result<Option<Domain>>;
    async fn get_subdomain(&self, name: &str) -> Result<Option<SubdomainInfo>>;
    async fn list_all(&self) -> Result<Vec<Domain>>;
    async fn add_subdomain(&self, domain: &str, subdomain: &str) -> Result<bool>;
    async fn rename_subdomain(&self, domain: &str, old_name: &str, new_name: &str) -> Result<()>;
    async fn remove_subdomain(&self, name: &str) -> Result<()>;
    async fn set_check_state(&self, name: &str, state: CheckState) -> Result<()>;
}

#[async_trait]
pub trait CertificateProber: Send + Sync {
    /// 只做 TCP + TLS 握手
    async fn check(&self, host: &str) -> Result<()>;

    /// 握手並取回對端憑證
    async fn certificate(&self, host: &str) -> Result<CertificateInfo>;

    async fn is_reachable(&self, host: &str) -> bool {
        match self.check(host).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("TLS check for {} failed: {}", host, e);
                false
            }
        }
    }

    async fn fetch_certificate(&self, host: &str) -> Option<CertificateInfo> {
        match self.certificate(host).await {
            Ok(cert) => Some(cert),
            Err(e) => {
                tracing::debug!("Certificate fetch for {} failed: {}", host, e);
                None
            }
        }
    }

    async fn probe(&self, host: &str, mode: ProbeMode) -> ProbeOutcome {
        match mode {
            ProbeMode::Boolean => ProbeOutcome::Reachable(self.is_reachable(host).await),
            ProbeMode::Full => ProbeOutcome::Certificate(self.fetch_certificate(host).await),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, destination: &str, message: &str) -> Result<()>;
}

/// 外部 DNS 記錄來源，產出 `(domain, subdomain)`
#[async_trait]
pub trait RecordSource: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch_records(&self) -> Result<Vec<(String, String)>>;
}
