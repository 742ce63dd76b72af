use crate::utils::error::{MonitorError, Result};
use chrono::NaiveTime;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field_name: &str, value: &str, reason: impl Into<String>) -> MonitorError {
    MonitorError::InvalidValue {
        field: field_name.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(invalid(field_name, url_str, "URL cannot be empty"));
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(invalid(
                field_name,
                url_str,
                format!("Unsupported URL scheme: {}", scheme),
            )),
        },
        Err(e) => Err(invalid(
            field_name,
            url_str,
            format!("Invalid URL format: {}", e),
        )),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(invalid(field_name, path, "Path cannot be empty"));
    }

    if path.contains('\0') {
        return Err(invalid(field_name, path, "Path contains null bytes"));
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(invalid(
            field_name,
            &value.to_string(),
            format!("Value must be at least {}", min_value),
        ));
    }
    Ok(())
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| MonitorError::MissingConfigError {
        field: field_name.to_string(),
    })
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(
            field_name,
            value,
            "Value cannot be empty or whitespace-only",
        ));
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(invalid(
            field_name,
            &value.to_string(),
            format!("Value must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

/// 解析 `HH:MM` 格式的每日排程時間
pub fn validate_trigger_time(field_name: &str, value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|e| invalid(field_name, value, format!("Expected HH:MM ({})", e)))
}

/// 主機名稱檢查：同時是 registry 文件的鍵，不能含路徑分隔字元
pub fn validate_hostname(field_name: &str, host: &str) -> Result<()> {
    validate_non_empty_string(field_name, host)?;

    if host.len() > 253 {
        return Err(invalid(field_name, host, "Host name longer than 253 characters"));
    }

    for label in host.split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err(invalid(
                field_name,
                host,
                "Each label must be 1 to 63 characters",
            ));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(invalid(
                field_name,
                host,
                "Labels cannot start or end with a hyphen",
            ));
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '*')
        {
            return Err(invalid(
                field_name,
                host,
                "Only letters, digits, hyphens, underscores and wildcards are allowed",
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("telegram.api_base", "https://api.telegram.org").is_ok());
        assert!(validate_url("telegram.api_base", "http://localhost:8080").is_ok());
        assert!(validate_url("telegram.api_base", "").is_err());
        assert!(validate_url("telegram.api_base", "invalid-url").is_err());
        assert!(validate_url("telegram.api_base", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("probe.concurrency", 5, 1).is_ok());
        assert!(validate_positive_number("probe.concurrency", 0, 1).is_err());
    }

    #[test]
    fn test_validate_trigger_time() {
        let time = validate_trigger_time("schedule.trigger_time", "09:00").unwrap();
        assert_eq!(time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert!(validate_trigger_time("schedule.trigger_time", "25:00").is_err());
        assert!(validate_trigger_time("schedule.trigger_time", "nine").is_err());
    }

    #[test]
    fn test_validate_hostname() {
        assert!(validate_hostname("subdomain", "api.acme.com").is_ok());
        assert!(validate_hostname("subdomain", "localhost").is_ok());
        assert!(validate_hostname("subdomain", "").is_err());
        assert!(validate_hostname("subdomain", "../etc/passwd").is_err());
        assert!(validate_hostname("subdomain", "a..b").is_err());
        assert!(validate_hostname("subdomain", "-bad.example").is_err());
        assert!(validate_hostname("subdomain", "has space.example").is_err());
    }
}
