//! Provider configuration

use std::time::Duration;

use thiserror::Error;

/// Default API endpoint
pub const DEFAULT_API_URL: &str = "https://api.gridscale.io";

/// Timeout of a single HTTP request
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(15 * 60);

pub const ENV_USER_UUID: &str = "GRIDSCALE_UUID";
pub const ENV_API_TOKEN: &str = "GRIDSCALE_TOKEN";
pub const ENV_API_URL: &str = "GRIDSCALE_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing provider setting '{0}' (set {1})")]
    Missing(&'static str, &'static str),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Credentials and endpoint of the gridscale API
#[derive(Clone)]
pub struct ProviderConfig {
    pub api_url: String,
    pub user_uuid: String,
    pub api_token: String,
    pub http_timeout: Duration,
}

// The API token must never show up in logs
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_url", &self.api_url)
            .field("user_uuid", &self.user_uuid)
            .field("api_token", &"<REDACTED>")
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl ProviderConfig {
    pub fn new(user_uuid: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            user_uuid: user_uuid.into(),
            api_token: api_token.into(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Read the configuration from `GRIDSCALE_UUID`, `GRIDSCALE_TOKEN` and
    /// (optionally) `GRIDSCALE_URL`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let user_uuid =
            non_empty(ENV_USER_UUID).ok_or(ConfigError::Missing("uuid", ENV_USER_UUID))?;
        let api_token =
            non_empty(ENV_API_TOKEN).ok_or(ConfigError::Missing("token", ENV_API_TOKEN))?;

        let mut config = Self::new(user_uuid, api_token);
        if let Some(url) = non_empty(ENV_API_URL) {
            config.api_url = url;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn from_lookup_uses_default_url() {
        let config =
            ProviderConfig::from_lookup(lookup(&[(ENV_USER_UUID, "u"), (ENV_API_TOKEN, "t")]))
                .unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.user_uuid, "u");
        assert_eq!(config.http_timeout, DEFAULT_HTTP_TIMEOUT);
    }

    #[test]
    fn from_lookup_overrides_url() {
        let config = ProviderConfig::from_lookup(lookup(&[
            (ENV_USER_UUID, "u"),
            (ENV_API_TOKEN, "t"),
            (ENV_API_URL, "http://localhost:8080"),
        ]))
        .unwrap();
        assert_eq!(config.api_url, "http://localhost:8080");
    }

    #[test]
    fn from_lookup_requires_credentials() {
        let err = ProviderConfig::from_lookup(lookup(&[(ENV_USER_UUID, "u"), (ENV_API_TOKEN, "")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("token", ENV_API_TOKEN)));
    }

    #[test]
    fn debug_hides_token() {
        let config = ProviderConfig::new("u", "secret-token");
        let printed = format!("{:?}", config);
        assert!(!printed.contains("secret-token"));
        assert!(printed.contains("<REDACTED>"));
    }
}
