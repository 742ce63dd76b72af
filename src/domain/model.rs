use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 憑證日期的文字格式，與 OpenSSL 的 `notAfter` 相同，例如 `Jun 15 00:00:00 2030 GMT`
pub const CERT_TIME_FORMAT: &str = "%b %e %H:%M:%S %Y GMT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    #[default]
    Enable,
    Disable,
}

impl CheckState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckState::Enable => "enable",
            CheckState::Disable => "disable",
        }
    }
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Subdomain {
    pub name: String,
    #[serde(default)]
    pub check: CheckState,
}

impl Subdomain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            check: CheckState::Enable,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.check == CheckState::Enable
    }
}

/// Registry 的根文件：一個 domain 對應一份儲存文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Domain {
    #[serde(rename = "domain")]
    pub name: String,
    #[serde(default)]
    pub subdomains: Vec<Subdomain>,
}

impl Domain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subdomains: Vec::new(),
        }
    }

    pub fn subdomain(&self, name: &str) -> Option<&Subdomain> {
        self.subdomains.iter().find(|s| s.name == name)
    }

    pub fn subdomain_mut(&mut self, name: &str) -> Option<&mut Subdomain> {
        self.subdomains.iter_mut().find(|s| s.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.subdomain(name).is_some()
    }

    /// set-add 語意：已存在時不變動並回傳 false
    pub fn add_subdomain(&mut self, name: &str) -> bool {
        if self.contains(name) {
            return false;
        }
        self.subdomains.push(Subdomain::new(name));
        true
    }

    pub fn remove_subdomain(&mut self, name: &str) -> bool {
        let before = self.subdomains.len();
        self.subdomains.retain(|s| s.name != name);
        self.subdomains.len() != before
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubdomainInfo {
    pub subdomain: String,
    pub domain: String,
    pub check: CheckState,
}

/// 從對端憑證取出的欄位
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateInfo {
    pub subject: String,
    pub issuer: String,
    pub issued_to: String,
    pub issued_by: String,
    pub not_before: String,
    pub not_after: String,
}

impl CertificateInfo {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        parse_cert_time(&self.not_after)
    }

    pub fn valid_from(&self) -> Option<DateTime<Utc>> {
        parse_cert_time(&self.not_before)
    }
}

pub fn parse_cert_time(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), CERT_TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn format_cert_time(value: DateTime<Utc>) -> String {
    value.format(CERT_TIME_FORMAT).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryDecision {
    pub days_remaining: i64,
    pub should_notify: bool,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMode {
    Boolean,
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable(bool),
    Certificate(Option<CertificateInfo>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_domain_document_layout() {
        let mut domain = Domain::new("acme.com");
        domain.add_subdomain("api.acme.com");
        domain.subdomains[0].check = CheckState::Disable;

        let json = serde_json::to_value(&domain).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "domain": "acme.com",
                "subdomains": [{"name": "api.acme.com", "check": "disable"}]
            })
        );
    }

    #[test]
    fn test_document_rejects_unknown_state() {
        let raw = r#"{"domain":"acme.com","subdomains":[{"name":"a.acme.com","check":"paused"}]}"#;
        assert!(serde_json::from_str::<Domain>(raw).is_err());

        let raw = r#"{"domain":"acme.com","owner":"ops"}"#;
        assert!(serde_json::from_str::<Domain>(raw).is_err());
    }

    #[test]
    fn test_missing_check_defaults_to_enable() {
        let raw = r#"{"domain":"acme.com","subdomains":[{"name":"a.acme.com"}]}"#;
        let domain: Domain = serde_json::from_str(raw).unwrap();
        assert!(domain.subdomains[0].is_enabled());
    }

    #[test]
    fn test_add_subdomain_is_set_add() {
        let mut domain = Domain::new("acme.com");
        assert!(domain.add_subdomain("a.acme.com"));
        assert!(!domain.add_subdomain("a.acme.com"));
        assert_eq!(domain.subdomains.len(), 1);
    }

    #[test]
    fn test_cert_time_format() {
        let at = Utc.with_ymd_and_hms(2030, 6, 5, 12, 30, 0).unwrap();
        let text = format_cert_time(at);
        assert_eq!(text, "Jun  5 12:30:00 2030 GMT");
        assert_eq!(parse_cert_time(&text), Some(at));
        assert!(parse_cert_time("Jun 15 00:00:00 2030 GMT").is_some());
        assert_eq!(parse_cert_time("2030-06-15"), None);
    }
}
