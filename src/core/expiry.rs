use crate::core::{CertificateInfo, ExpiryDecision};
use chrono::{DateTime, Utc};

pub const DEFAULT_THRESHOLD_DAYS: i64 = 30;

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    threshold_days: i64,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            threshold_days: DEFAULT_THRESHOLD_DAYS,
        }
    }
}

impl ExpiryPolicy {
    pub fn new(threshold_days: i64) -> Self {
        Self { threshold_days }
    }

    pub fn threshold_days(&self) -> i64 {
        self.threshold_days
    }

    pub fn evaluate(&self, cert: &CertificateInfo) -> Option<ExpiryDecision> {
        self.evaluate_at(cert, Utc::now())
    }

    /// `None` 代表無法判斷（notAfter 格式錯誤），呼叫端只記錄、不通知
    pub fn evaluate_at(&self, cert: &CertificateInfo, now: DateTime<Utc>) -> Option<ExpiryDecision> {
        let Some(expires_at) = cert.expires_at() else {
            tracing::warn!(
                "⚠️ Cannot parse notAfter '{}' for {}, no decision",
                cert.not_after,
                cert.issued_to
            );
            return None;
        };

        // 向下取整：已過期 1 秒也算 -1 天
        let days_remaining = (expires_at - now).num_seconds().div_euclid(SECONDS_PER_DAY);

        Some(ExpiryDecision {
            days_remaining,
            should_notify: days_remaining <= self.threshold_days,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::format_cert_time;
    use chrono::{Duration, TimeZone};

    fn cert_expiring(not_after: String) -> CertificateInfo {
        CertificateInfo {
            subject: "CN=shop.acme.com".to_string(),
            issuer: "CN=Test CA".to_string(),
            issued_to: "shop.acme.com".to_string(),
            issued_by: "Test CA".to_string(),
            not_before: "Jan  1 00:00:00 2024 GMT".to_string(),
            not_after,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_exactly_thirty_days_notifies() {
        let cert = cert_expiring(format_cert_time(now() + Duration::days(30)));
        let decision = ExpiryPolicy::default().evaluate_at(&cert, now()).unwrap();
        assert_eq!(decision.days_remaining, 30);
        assert!(decision.should_notify);
    }

    #[test]
    fn test_thirty_one_days_does_not_notify() {
        let cert = cert_expiring(format_cert_time(now() + Duration::days(31)));
        let decision = ExpiryPolicy::default().evaluate_at(&cert, now()).unwrap();
        assert_eq!(decision.days_remaining, 31);
        assert!(!decision.should_notify);
    }

    #[test]
    fn test_partial_day_is_floored() {
        let cert = cert_expiring(format_cert_time(
            now() + Duration::days(31) - Duration::seconds(1),
        ));
        let decision = ExpiryPolicy::default().evaluate_at(&cert, now()).unwrap();
        assert_eq!(decision.days_remaining, 30);
    }

    #[test]
    fn test_expired_certificate_is_negative() {
        let cert = cert_expiring(format_cert_time(now() - Duration::hours(1)));
        let decision = ExpiryPolicy::default().evaluate_at(&cert, now()).unwrap();
        assert_eq!(decision.days_remaining, -1);
        assert!(decision.should_notify);
    }

    #[test]
    fn test_malformed_date_is_no_decision() {
        let cert = cert_expiring("sometime next year".to_string());
        assert!(ExpiryPolicy::default().evaluate_at(&cert, now()).is_none());
    }

    #[test]
    fn test_custom_threshold() {
        let cert = cert_expiring(format_cert_time(now() + Duration::days(45)));
        let decision = ExpiryPolicy::new(60).evaluate_at(&cert, now()).unwrap();
        assert!(decision.should_notify);
    }
}
