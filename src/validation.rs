//! Login request validation.
//!
//! Runs before the registry spends a capacity check or a network round-trip
//! on a request that can never succeed.

use std::net::IpAddr;
use std::sync::LazyLock;

use regex::Regex;
use secrecy::ExposeSecret;

use crate::remote::Credentials;

/// Validation error with field context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

// Underscores are not RFC 1123 but internal and container DNS hands them out.
static HOST_LABEL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9_]([a-zA-Z0-9_-]{0,61}[a-zA-Z0-9_])?$").unwrap()
});

/// Validate every field of a login request.
pub fn validate_login(credentials: &Credentials) -> Result<(), ValidationError> {
    validate_hostname(&credentials.host)?;
    validate_port(credentials.port)?;
    validate_username(&credentials.username)?;
    if credentials.password.expose_secret().is_empty() {
        return Err(ValidationError::new("password", "Password is required"));
    }
    Ok(())
}

/// Validate a hostname (DNS name or IP address).
pub fn validate_hostname(hostname: &str) -> Result<(), ValidationError> {
    let hostname = hostname.trim();

    if hostname.is_empty() {
        return Err(ValidationError::new("host", "Host is required"));
    }

    // DNS max is 253 characters
    if hostname.len() > 253 {
        return Err(ValidationError::new(
            "host",
            "Host exceeds maximum length of 253 characters",
        ));
    }

    if hostname.parse::<IpAddr>().is_ok() {
        return Ok(());
    }

    for label in hostname.split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err(ValidationError::new(
                "host",
                "Host labels must be 1-63 characters",
            ));
        }
        if !HOST_LABEL_REGEX.is_match(label) {
            return Err(ValidationError::new(
                "host",
                format!("Invalid host label '{}'", label),
            ));
        }
    }

    Ok(())
}

pub fn validate_port(port: u16) -> Result<(), ValidationError> {
    if port == 0 {
        return Err(ValidationError::new(
            "port",
            "Port must be between 1 and 65535",
        ));
    }
    Ok(())
}

/// Validate a remote login name. Unlike a local client there is no
/// "current user" to fall back to, so an empty name is rejected. What else
/// a name may contain is up to the server (`DOMAIN\user`, `first+last`,
/// long directory logins); only control characters are refused.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.trim().is_empty() {
        return Err(ValidationError::new("username", "Username is required"));
    }

    if username.chars().any(char::is_control) {
        return Err(ValidationError::new(
            "username",
            "Username must not contain control characters",
        ));
    }

    Ok(())
}
