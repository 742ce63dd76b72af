use crate::core::RecordSource;
use crate::utils::error::{MonitorError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

pub const DEFAULT_CLOUDFLARE_API: &str = "https://api.cloudflare.com/client/v4";
const ZONES_PER_PAGE: u32 = 50;
const RECORDS_PER_PAGE: u32 = 100;

#[derive(Debug, Deserialize)]
struct ApiPage<T> {
    success: bool,
    result: Option<Vec<T>>,
    #[serde(default)]
    result_info: Option<ResultInfo>,
    #[serde(default)]
    errors: Vec<ApiMessage>,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    total_pages: u32,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct DnsRecord {
    #[serde(rename = "type")]
    record_type: String,
    name: String,
}

/// 只有 A / CNAME 才會提供 HTTPS；`_` 開頭的是服務記錄（`_dmarc` 等）
fn is_importable(record: &DnsRecord) -> bool {
    matches!(record.record_type.as_str(), "A" | "CNAME") && !record.name.starts_with('_')
}

/// Cloudflare 帳號下所有 zone 的 DNS 記錄，產出 `(zone, record name)`
pub struct CloudflareSource {
    client: Client,
    api_base: String,
    email: String,
    api_key: String,
}

impl CloudflareSource {
    pub fn new(email: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_api_base(DEFAULT_CLOUDFLARE_API, email, api_key)
    }

    pub fn with_api_base(
        api_base: impl Into<String>,
        email: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            email: email.into(),
            api_key: api_key.into(),
        }
    }

    /// 依 `result_info.total_pages` 走完所有分頁
    async fn fetch_all<T: DeserializeOwned>(&self, path: &str, per_page: u32) -> Result<Vec<T>> {
        let url = format!("{}{}", self.api_base, path);
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            tracing::debug!("Fetching {} page {}", path, page);
            let response = self
                .client
                .get(&url)
                .header("X-Auth-Email", &self.email)
                .header("X-Auth-Key", &self.api_key)
                .header("Content-Type", "application/json")
                .query(&[("page", page), ("per_page", per_page)])
                .send()
                .await?;

            let status = response.status();
            let body: ApiPage<T> = response.json().await.map_err(|e| MonitorError::SourceError {
                message: format!("{} returned {} with unreadable body: {}", path, status, e),
            })?;

            if !status.is_success() || !body.success {
                let reasons: Vec<String> = body.errors.into_iter().map(|e| e.message).collect();
                return Err(MonitorError::SourceError {
                    message: format!("{} returned {}: {}", path, status, reasons.join("; ")),
                });
            }

            items.extend(body.result.unwrap_or_default());
            let total_pages = body.result_info.map(|info| info.total_pages).unwrap_or(1);
            if page >= total_pages {
                break;
            }
            page += 1;
        }

        Ok(items)
    }
}

#[async_trait]
impl RecordSource for CloudflareSource {
    fn name(&self) -> &str {
        "cloudflare"
    }

    async fn fetch_records(&self) -> Result<Vec<(String, String)>> {
        let zones: Vec<Zone> = self.fetch_all("/zones", ZONES_PER_PAGE).await?;
        tracing::info!("☁️ Found {} Cloudflare zones", zones.len());

        let mut records = Vec::new();
        for zone in zones {
            let path = format!("/zones/{}/dns_records", zone.id);
            let dns: Vec<DnsRecord> = self.fetch_all(&path, RECORDS_PER_PAGE).await?;
            let before = records.len();
            records.extend(
                dns.into_iter()
                    .filter(is_importable)
                    .map(|record| (zone.name.clone(), record.name)),
            );
            tracing::debug!(
                "Zone {}: {} importable records",
                zone.name,
                records.len() - before
            );
        }
        Ok(records)
    }
}
