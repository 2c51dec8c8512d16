use std::time::Duration;

use ledgerprop_auth::{AuthError, Signing, TokenBuilder};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "http://localhost:7575/v1";
pub const DEFAULT_LEDGER_ID: &str = "sandbox";
pub const DEFAULT_APPLICATION_ID: &str = "pbt-tests";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("LEDGERPROP_HMAC_SECRET_HEX is not valid hex: {0}")]
    InvalidSecret(String),

    #[error("neither test mode nor an HMAC secret is configured")]
    NoSigning,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("cannot build HTTP client: {0}")]
    Http(String),
}

/// Where the ledger lives and how requests are signed.
#[derive(Clone)]
pub struct HarnessConfig {
    pub base_url: String,
    pub ledger_id: String,
    pub application_id: String,
    /// Allows unsigned (`alg: none`) tokens. Test ledgers only.
    pub test_mode: bool,
    pub hmac_secret: Option<Vec<u8>>,
    pub timeout_ms: u64,
}

impl std::fmt::Debug for HarnessConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HarnessConfig")
            .field("base_url", &self.base_url)
            .field("ledger_id", &self.ledger_id)
            .field("application_id", &self.application_id)
            .field("test_mode", &self.test_mode)
            .field("hmac_secret", &self.hmac_secret.as_ref().map(|_| "<redacted>"))
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            ledger_id: DEFAULT_LEDGER_ID.to_string(),
            application_id: DEFAULT_APPLICATION_ID.to_string(),
            test_mode: false,
            hmac_secret: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl HarnessConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        cfg.base_url = read_env_string("LEDGERPROP_BASE_URL", cfg.base_url);
        cfg.ledger_id = read_env_string("LEDGERPROP_LEDGER_ID", cfg.ledger_id);
        cfg.application_id = read_env_string("LEDGERPROP_APPLICATION_ID", cfg.application_id);
        cfg.test_mode = read_env_bool("LEDGERPROP_TEST_MODE", cfg.test_mode);
        cfg.timeout_ms = read_env_u64("LEDGERPROP_TIMEOUT_MS", cfg.timeout_ms);
        if let Ok(raw) = std::env::var("LEDGERPROP_HMAC_SECRET_HEX") {
            let raw = raw.trim();
            if !raw.is_empty() {
                let secret =
                    hex::decode(raw).map_err(|err| ConfigError::InvalidSecret(err.to_string()))?;
                cfg.hmac_secret = Some(secret);
            }
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Unsigned tokens against `base_url`; what the test suite uses.
    pub fn for_test_ledger(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            test_mode: true,
            ..Self::default()
        }
    }

    pub fn with_hmac_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.hmac_secret = Some(secret.into());
        self
    }

    /// HS256 when a secret is present, otherwise unsigned.
    pub fn signing(&self) -> Signing {
        match &self.hmac_secret {
            Some(secret) => Signing::Hs256(secret.clone()),
            None => Signing::Unsigned,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.test_mode && self.hmac_secret.is_none() {
            return Err(ConfigError::NoSigning);
        }
        Ok(())
    }

    pub fn token_builder(&self) -> Result<TokenBuilder, ConfigError> {
        self.validate()?;
        Ok(TokenBuilder::new(
            self.ledger_id.clone(),
            self.application_id.clone(),
            self.signing(),
            self.test_mode,
        )?)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// `base_url` joined with `path`, tolerating a trailing slash.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn read_env_string(name: &str, default: String) -> String {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
}

fn read_env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) if v == "1" || v.eq_ignore_ascii_case("true") => true,
        Ok(v) if v == "0" || v.eq_ignore_ascii_case("false") => false,
        _ => default,
    }
}

fn read_env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_json_api() {
        let cfg = HarnessConfig::default();
        assert_eq!(cfg.base_url, "http://localhost:7575/v1");
        assert_eq!(cfg.ledger_id, "sandbox");
        assert_eq!(cfg.application_id, "pbt-tests");
        assert_eq!(cfg.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn default_config_refuses_to_sign_nothing() {
        assert!(matches!(
            HarnessConfig::default().validate(),
            Err(ConfigError::NoSigning)
        ));
        assert!(HarnessConfig::default()
            .with_hmac_secret(b"k".to_vec())
            .token_builder()
            .is_ok());
        assert!(HarnessConfig::for_test_ledger("http://127.0.0.1:1/v1")
            .token_builder()
            .is_ok());
    }

    #[test]
    fn endpoint_joins_cleanly() {
        let cfg = HarnessConfig::for_test_ledger("http://h:1/v1/");
        assert_eq!(cfg.endpoint("/create"), "http://h:1/v1/create");
        assert_eq!(cfg.endpoint("parties/allocate"), "http://h:1/v1/parties/allocate");
    }

    #[test]
    fn debug_hides_secret() {
        let cfg = HarnessConfig::default().with_hmac_secret(b"super-secret".to_vec());
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("super"));
        assert!(rendered.contains("<redacted>"));
    }
}
