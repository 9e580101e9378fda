//! Verification API client configuration.
//!
//! Plain data passed in by the host. Nothing in the client reads ambient
//! environment state except [`ClientConfig::from_env`], which exists for
//! the CLI and for deployments that configure through the environment.

use url::Url;
use zeroize::Zeroizing;

/// Production endpoint used when no base URL is supplied.
pub const DEFAULT_BASE_URL: &str = "https://api.idswyft.com";

/// Configuration for connecting to the verification API.
///
/// Custom `Debug` implementation redacts the `api_key` field
/// to prevent credential leakage in log output.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the verification API.
    pub base_url: Url,
    /// API key sent as `X-API-Key`. Zeroized on drop.
    pub api_key: Zeroizing<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Explicit sandbox flag. `None` means detect from the host name.
    pub sandbox: Option<bool>,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .field("sandbox", &self.sandbox)
            .finish()
    }
}

impl ClientConfig {
    /// Build a configuration with default timeout and sandbox detection.
    ///
    /// # Errors
    ///
    /// `ConfigError::MissingApiKey` for an empty key,
    /// `ConfigError::InvalidUrl` for an unparseable base URL.
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, ConfigError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        let base_url = Url::parse(base_url)
            .map_err(|e| ConfigError::InvalidUrl("base_url".to_string(), e.to_string()))?;
        Ok(Self {
            base_url,
            api_key: Zeroizing::new(api_key),
            timeout_secs: 30,
            sandbox: None,
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `IDV_API_KEY` (required)
    /// - `IDV_BASE_URL` (default: `https://api.idswyft.com`)
    /// - `IDV_TIMEOUT_SECS` (default: 30)
    /// - `IDV_SANDBOX` (optional `true`/`false`; absent means detect)
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("IDV_API_KEY").map_err(|_| ConfigError::MissingApiKey)?;
        let raw_url = std::env::var("IDV_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let mut config = Self::new(&raw_url, api_key).map_err(|e| match e {
            ConfigError::InvalidUrl(_, detail) => ConfigError::InvalidUrl("IDV_BASE_URL".into(), detail),
            other => other,
        })?;

        if let Ok(raw) = std::env::var("IDV_TIMEOUT_SECS") {
            config.timeout_secs = raw
                .parse()
                .map_err(|_| ConfigError::InvalidValue("IDV_TIMEOUT_SECS".into(), raw))?;
        }
        if let Ok(raw) = std::env::var("IDV_SANDBOX") {
            config.sandbox = Some(parse_bool(&raw).ok_or(ConfigError::InvalidValue(
                "IDV_SANDBOX".into(),
                raw,
            ))?);
        }
        Ok(config)
    }

    /// Create a configuration pointing at a local mock server (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if the localhost URL cannot be parsed.
    pub fn local_mock(port: u16, api_key: &str) -> Result<Self, ConfigError> {
        let mut config = Self::new(&format!("http://127.0.0.1:{port}"), api_key)?;
        config.timeout_secs = 5;
        Ok(config)
    }

    /// Whether requests should carry the `sandbox` flag.
    ///
    /// An explicit `sandbox` setting wins. Otherwise loopback hosts,
    /// `localhost`, `.local`/`.test` domains and hosts naming a sandbox,
    /// staging or dev environment are treated as non-production.
    pub fn is_sandbox(&self) -> bool {
        if let Some(explicit) = self.sandbox {
            return explicit;
        }
        match self.base_url.host() {
            Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
            Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
            Some(url::Host::Domain(host)) => {
                let host = host.to_ascii_lowercase();
                host == "localhost"
                    || host.ends_with(".local")
                    || host.ends_with(".test")
                    || host.contains("sandbox")
                    || host.contains("staging")
                    || host.starts_with("dev.")
                    || host.contains(".dev.")
            }
            None => false,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("an API key is required (set IDV_API_KEY)")]
    MissingApiKey,
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid value for {0}: {1:?}")]
    InvalidValue(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_requires_api_key() {
        assert_eq!(
            ClientConfig::new(DEFAULT_BASE_URL, "").unwrap_err(),
            ConfigError::MissingApiKey
        );
        assert_eq!(
            ClientConfig::new(DEFAULT_BASE_URL, "   ").unwrap_err(),
            ConfigError::MissingApiKey
        );
    }

    #[test]
    fn new_rejects_bad_url() {
        assert!(matches!(
            ClientConfig::new("not a url", "k"),
            Err(ConfigError::InvalidUrl(_, _))
        ));
    }

    #[test]
    fn defaults() {
        let cfg = ClientConfig::new(DEFAULT_BASE_URL, "test-key").unwrap();
        assert_eq!(cfg.timeout_secs, 30);
        assert_eq!(cfg.sandbox, None);
        assert_eq!(cfg.api_key.as_str(), "test-key");
    }

    #[test]
    fn local_mock_builds_valid_config() {
        let cfg = ClientConfig::local_mock(9000, "test-key").unwrap();
        assert_eq!(cfg.base_url.as_str(), "http://127.0.0.1:9000/");
        assert_eq!(cfg.timeout_secs, 5);
    }

    #[test]
    fn debug_redacts_api_key() {
        let cfg = ClientConfig::new(DEFAULT_BASE_URL, "super-secret").unwrap();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn sandbox_detection_from_host() {
        let detect = |url: &str| ClientConfig::new(url, "k").unwrap().is_sandbox();
        assert!(!detect("https://api.idswyft.com"));
        assert!(detect("http://localhost:3001"));
        assert!(detect("http://127.0.0.1:3001"));
        assert!(detect("https://sandbox.idswyft.com"));
        assert!(detect("https://api.staging.idswyft.com"));
        assert!(detect("https://verify.test"));
    }

    #[test]
    fn explicit_sandbox_wins() {
        let mut cfg = ClientConfig::new("http://localhost:3001", "k").unwrap();
        cfg.sandbox = Some(false);
        assert!(!cfg.is_sandbox());
        let mut cfg = ClientConfig::new(DEFAULT_BASE_URL, "k").unwrap();
        cfg.sandbox = Some(true);
        assert!(cfg.is_sandbox());
    }

    #[test]
    fn bool_parsing() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
