use crate::domain::model::{format_cert_time, CertificateInfo};
use crate::domain::ports::CertificateProber;
use crate::utils::error::{MonitorError, Result};
use async_trait::async_trait;
use chrono::DateTime;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_native_tls::TlsStream;
use x509_parser::prelude::*;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_TLS_PORT: u16 = 443;

/// 對 `host:443` 做一次 TCP + TLS 握手，不重試。
///
/// 不驗證憑證鏈，過期或自簽的憑證也會被取回，到期判斷交給 `ExpiryPolicy`。
#[derive(Debug, Clone)]
pub struct TlsProber {
    timeout: Duration,
    port: u16,
}

impl Default for TlsProber {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

impl TlsProber {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            port: DEFAULT_TLS_PORT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    async fn handshake(&self, host: &str) -> Result<TlsStream<TcpStream>> {
        let connect = async {
            let stream = TcpStream::connect((host, self.port))
                .await
                .map_err(|e| MonitorError::probe(host, e))?;

            let connector = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()
                .map_err(|e| MonitorError::probe(host, e))?;

            tokio_native_tls::TlsConnector::from(connector)
                .connect(host, stream)
                .await
                .map_err(|e| MonitorError::probe(host, e))
        };

        tokio::time::timeout(self.timeout, connect)
            .await
            .map_err(|_| MonitorError::probe(host, format!("timed out after {:?}", self.timeout)))?
    }
}

#[async_trait]
impl CertificateProber for TlsProber {
    async fn check(&self, host: &str) -> Result<()> {
        let _stream = self.handshake(host).await?;
        tracing::debug!("🔐 TLS handshake with {} succeeded", host);
        Ok(())
    }

    async fn certificate(&self, host: &str) -> Result<CertificateInfo> {
        let stream = self.handshake(host).await?;
        let cert = stream
            .get_ref()
            .peer_certificate()
            .map_err(|e| MonitorError::probe(host, e))?
            .ok_or_else(|| MonitorError::probe(host, "no peer certificate"))?;
        let der = cert.to_der().map_err(|e| MonitorError::probe(host, e))?;

        parse_certificate_der(&der).map_err(|e| MonitorError::probe(host, e))
    }
}

/// 解析 DER 編碼的憑證；任何欄位無法轉換都整張失敗，不回傳不完整的結果
pub fn parse_certificate_der(der: &[u8]) -> std::result::Result<CertificateInfo, String> {
    let (_, cert) =
        parse_x509_certificate(der).map_err(|e| format!("certificate parse error: {}", e))?;

    let validity = cert.validity();
    let not_before = DateTime::from_timestamp(validity.not_before.timestamp(), 0)
        .ok_or_else(|| "notBefore out of range".to_string())?;
    let not_after = DateTime::from_timestamp(validity.not_after.timestamp(), 0)
        .ok_or_else(|| "notAfter out of range".to_string())?;

    Ok(CertificateInfo {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        issued_to: display_name(cert.subject()),
        issued_by: display_name(cert.issuer()),
        not_before: format_cert_time(not_before),
        not_after: format_cert_time(not_after),
    })
}

/// commonName，沒有時退回 organizationName
fn display_name(name: &X509Name<'_>) -> String {
    name.iter_common_name()
        .chain(name.iter_organization())
        .find_map(|attr| attr.as_str().ok())
        .unwrap_or_default()
        .to_string()
}
