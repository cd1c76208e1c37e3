//! Purpose: Resolve backend connection settings from flags and environment.
//! Exports: `Config`, environment variable names.
//! Role: Keeps credentials out of the binary; flags override environment.
//! Invariants: Missing URL or API key is a usage error naming the variable to set.

use crate::core::error::{Error, ErrorKind};
use std::time::Duration;

pub const ENV_URL: &str = "BAASLINE_URL";
pub const ENV_ANON_KEY: &str = "BAASLINE_ANON_KEY";
pub const ENV_EMAIL: &str = "BAASLINE_EMAIL";
pub const ENV_PASSWORD: &str = "BAASLINE_PASSWORD";

const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Debug)]
pub struct Config {
    pub base_url: String,
    pub apikey: String,
    pub email: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
}

impl Config {
    /// Resolve from CLI flags with environment fallback.
    pub fn resolve(
        base_url: Option<String>,
        apikey: Option<String>,
        email: Option<String>,
        password: Option<String>,
        timeout_secs: Option<u64>,
    ) -> Result<Self, Error> {
        Self::resolve_with(base_url, apikey, email, password, timeout_secs, |name| {
            std::env::var(name).ok()
        })
    }

    pub fn resolve_with(
        base_url: Option<String>,
        apikey: Option<String>,
        email: Option<String>,
        password: Option<String>,
        timeout_secs: Option<u64>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, Error> {
        let base_url = base_url
            .or_else(|| env(ENV_URL))
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                Error::new(ErrorKind::Usage)
                    .with_message("backend url is not configured")
                    .with_hint(format!("Pass --base-url or set {ENV_URL}."))
            })?;
        let apikey = apikey
            .or_else(|| env(ENV_ANON_KEY))
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                Error::new(ErrorKind::Usage)
                    .with_message("backend api key is not configured")
                    .with_hint(format!("Pass --apikey or set {ENV_ANON_KEY}."))
            })?;
        let email = email.or_else(|| env(ENV_EMAIL)).filter(|v| !v.is_empty());
        let password = password
            .or_else(|| env(ENV_PASSWORD))
            .filter(|v| !v.is_empty());
        let timeout = Duration::from_secs(timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
        Ok(Self {
            base_url,
            apikey,
            email,
            password,
            timeout,
        })
    }

    pub fn credentials(&self) -> Option<(String, String)> {
        match (&self.email, &self.password) {
            (Some(email), Some(password)) => Some((email.clone(), password.clone())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, ENV_ANON_KEY, ENV_URL};
    use crate::core::error::ErrorKind;
    use std::time::Duration;

    fn fake_env(name: &str) -> Option<String> {
        match name {
            "BAASLINE_URL" => Some("https://db.example.com".to_string()),
            "BAASLINE_ANON_KEY" => Some("env-key".to_string()),
            _ => None,
        }
    }

    #[test]
    fn flags_override_environment() {
        let config = Config::resolve_with(
            Some("https://other.example.com".to_string()),
            None,
            None,
            None,
            Some(30),
            fake_env,
        )
        .expect("config");
        assert_eq!(config.base_url, "https://other.example.com");
        assert_eq!(config.apikey, "env-key");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn missing_url_is_a_usage_error_naming_the_variable() {
        let err = Config::resolve_with(None, None, None, None, None, |_| None).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(err.hint().unwrap_or_default().contains(ENV_URL));
    }

    #[test]
    fn missing_apikey_is_a_usage_error_naming_the_variable() {
        let err = Config::resolve_with(
            Some("https://db.example.com".to_string()),
            None,
            None,
            None,
            None,
            |_| None,
        )
        .expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(err.hint().unwrap_or_default().contains(ENV_ANON_KEY));
    }

    #[test]
    fn credentials_require_both_halves() {
        let config = Config::resolve_with(
            Some("https://db.example.com".to_string()),
            Some("key".to_string()),
            Some("dev@example.com".to_string()),
            None,
            None,
            |_| None,
        )
        .expect("config");
        assert_eq!(config.credentials(), None);
    }
}
