use anyhow::{Result, anyhow};
use std::net::{IpAddr, SocketAddr};
use url::Url;

/// Shortest checker interval accepted from configuration, in seconds
pub const MIN_INTERVAL_SECS: u64 = 10;

/// Longest checker interval accepted from configuration, in seconds
pub const MAX_INTERVAL_SECS: u64 = 86_400;

/// Validation results with specific error messages
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub error: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self { is_valid: true, error: None }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self { is_valid: false, error: Some(msg.into()) }
    }

    /// Prefix the error message with the field it is about
    pub fn context(self, field: &str) -> Self {
        match self.error {
            Some(error) => Self::err(format!("{field}: {error}")),
            None => self,
        }
    }

    pub fn to_result(&self) -> Result<()> {
        if self.is_valid {
            Ok(())
        } else {
            Err(anyhow!(self.error.clone().unwrap_or_else(|| "Validation failed".to_string())))
        }
    }
}

/// Validate an HTTP/HTTPS base address (device store, event hub, health API)
pub fn validate_http_endpoint(address: &str) -> ValidationResult {
    if address.trim().is_empty() {
        return ValidationResult::err("Address cannot be empty");
    }

    match Url::parse(address) {
        Ok(url) => {
            let scheme = url.scheme();
            if scheme != "http" && scheme != "https" {
                return ValidationResult::err(format!(
                    "Invalid scheme '{scheme}'. Must be http or https"
                ));
            }

            if url.host_str().is_none() {
                return ValidationResult::err("URL must have a valid host");
            }

            if url.cannot_be_a_base() {
                return ValidationResult::err("URL cannot be used as a base address");
            }

            ValidationResult::ok()
        }
        Err(e) => {
            // If it fails to parse, check if it's missing a scheme
            if !address.contains("://") {
                ValidationResult::err("URL must include scheme (http:// or https://)")
            } else {
                ValidationResult::err(format!("Invalid URL: {e}"))
            }
        }
    }
}

/// Validate a device network address (IP address or hostname)
pub fn validate_device_address(address: &str) -> ValidationResult {
    if address.trim().is_empty() {
        return ValidationResult::err("Address cannot be empty");
    }

    if address.parse::<IpAddr>().is_ok() {
        return ValidationResult::ok();
    }

    if address.contains(' ') {
        return ValidationResult::err("Address cannot contain spaces");
    }

    if address.starts_with('-') || address.ends_with('-') {
        return ValidationResult::err("Hostname cannot start or end with hyphen");
    }

    if address.chars().all(|c| c.is_alphanumeric() || c == '.' || c == '-') {
        ValidationResult::ok()
    } else {
        ValidationResult::err("Invalid hostname. Use IP address or valid hostname")
    }
}

/// Validate a checker name
pub fn validate_checker_name(name: &str) -> ValidationResult {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return ValidationResult::err("Name cannot be empty");
    }

    if trimmed != name {
        return ValidationResult::err("Name cannot start or end with whitespace");
    }

    if trimmed.len() > 100 {
        return ValidationResult::err("Name too long (max 100 characters)");
    }

    ValidationResult::ok()
}

/// Validate a checker interval
pub fn validate_interval(interval_secs: u64) -> ValidationResult {
    if interval_secs < MIN_INTERVAL_SECS {
        return ValidationResult::err(format!("Interval must be at least {MIN_INTERVAL_SECS} seconds"));
    }

    if interval_secs > MAX_INTERVAL_SECS {
        return ValidationResult::err("Interval too long (max 24 hours)");
    }

    ValidationResult::ok()
}

/// Validate a probe timeout against the interval of the checker running it
pub fn validate_timeout(timeout_ms: u64, interval_secs: u64) -> ValidationResult {
    if timeout_ms == 0 {
        return ValidationResult::err("Timeout must be greater than zero");
    }

    if timeout_ms >= interval_secs.saturating_mul(1_000) {
        return ValidationResult::err("Timeout must be less than interval");
    }

    ValidationResult::ok()
}

/// Validate a system identifier of the form `BLDG-ROOM-CPn`
pub fn validate_system_id(system_id: &str) -> ValidationResult {
    let parts: Vec<&str> = system_id.split('-').collect();

    if parts.len() != 3 {
        return ValidationResult::err(format!(
            "Invalid system id '{system_id}'. Expected BUILDING-ROOM-DEVICE"
        ));
    }

    if parts.iter().any(|part| part.is_empty()) {
        return ValidationResult::err(format!("Invalid system id '{system_id}'. Empty segment"));
    }

    if !system_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return ValidationResult::err(format!(
            "Invalid system id '{system_id}'. Only letters, digits and '-' are allowed"
        ));
    }

    ValidationResult::ok()
}

/// Validate the listen address of the status API
pub fn validate_listen_address(listen: &str) -> ValidationResult {
    match listen.parse::<SocketAddr>() {
        Ok(_) => ValidationResult::ok(),
        Err(e) => ValidationResult::err(format!("Invalid listen address '{listen}': {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_validation() {
        assert!(validate_http_endpoint("http://localhost:5984").is_valid);
        assert!(validate_http_endpoint("https://couch.example.com").is_valid);
        assert!(validate_http_endpoint("http://192.168.1.1").is_valid);
        assert!(validate_http_endpoint("http://example.com:8080/path").is_valid);

        assert!(!validate_http_endpoint("").is_valid);
        assert!(!validate_http_endpoint("example.com").is_valid);
        assert!(!validate_http_endpoint("ftp://example.com").is_valid);
    }

    #[test]
    fn test_device_address_validation() {
        assert!(validate_device_address("192.168.1.1").is_valid);
        assert!(validate_device_address("fe80::1").is_valid);
        assert!(validate_device_address("ITB-1101-D1.byu.edu").is_valid);

        assert!(!validate_device_address("").is_valid);
        assert!(!validate_device_address("invalid hostname").is_valid);
        assert!(!validate_device_address("-leading.example.com").is_valid);
    }

    #[test]
    fn test_name_validation() {
        assert!(validate_checker_name("ping").is_valid);
        assert!(validate_checker_name("health").is_valid);

        assert!(!validate_checker_name("").is_valid);
        assert!(!validate_checker_name("   ").is_valid);
        assert!(!validate_checker_name(" ping").is_valid);
    }

    #[test]
    fn test_interval_validation() {
        assert!(validate_interval(10).is_valid);
        assert!(validate_interval(120).is_valid);
        assert!(validate_interval(86_400).is_valid);

        assert!(!validate_interval(0).is_valid);
        assert!(!validate_interval(9).is_valid);
        assert!(!validate_interval(86_401).is_valid);
    }

    #[test]
    fn test_timeout_validation() {
        assert!(validate_timeout(5_000, 120).is_valid);
        assert!(!validate_timeout(10_000, 10).is_valid);
        assert!(!validate_timeout(15_000, 10).is_valid);
        assert!(!validate_timeout(0, 10).is_valid);
    }

    #[test]
    fn test_system_id_validation() {
        assert!(validate_system_id("ITB-1101-CP1").is_valid);

        assert!(!validate_system_id("ITB-1101").is_valid);
        assert!(!validate_system_id("ITB--CP1").is_valid);
        assert!(!validate_system_id("ITB-1101-CP1-X").is_valid);
        assert!(!validate_system_id("ITB-11 01-CP1").is_valid);
    }

    #[test]
    fn test_listen_validation() {
        assert!(validate_listen_address("0.0.0.0:8080").is_valid);
        assert!(!validate_listen_address("localhost").is_valid);
    }

    #[test]
    fn test_context_prefixes_error() {
        let result = validate_interval(0).context("checkers[0].interval_secs");
        assert!(result.error.unwrap().starts_with("checkers[0].interval_secs: "));
        assert!(validate_interval(60).context("x").to_result().is_ok());
    }
}
