//! Runtime configuration, from code or from `PARLEY_*` environment variables.
//!
//! ```rust
//! use std::time::Duration;
//! use parley::RuntimeConfig;
//! use parley::pmemory::StoreConfig;
//!
//! let config = RuntimeConfig::new(["gsk-first", "gsk-second"])
//!     .with_model("llama-3.1-8b-instant")
//!     .with_request_timeout(Duration::from_secs(30))
//!     .with_store(StoreConfig::Memory);
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.api_keys.len(), 2);
//! ```

use std::fmt::{Debug, Formatter};
use std::time::Duration;

use pchat::{ChatPolicy, DEFAULT_CONTEXT_TURNS, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use pmemory::StoreConfig;
use pprovider::QuotaPolicy;
use pprovider::adapters::openai::DEFAULT_BASE_URL;

use crate::RuntimeError;
use crate::providers::ProviderBuildConfig;

pub const ENV_API_KEYS: &str = "PARLEY_API_KEYS";
pub const ENV_BASE_URL: &str = "PARLEY_BASE_URL";
pub const ENV_MODEL: &str = "PARLEY_MODEL";
pub const ENV_TIMEOUT_SECS: &str = "PARLEY_TIMEOUT_SECS";
pub const ENV_STORE: &str = "PARLEY_STORE";

#[derive(Clone, PartialEq)]
pub struct RuntimeConfig {
    pub api_keys: Vec<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub request_timeout: Option<Duration>,
    pub context_turns: usize,
    pub normalize: bool,
    pub quota: QuotaPolicy,
    /// How often expired quota windows are reset.
    pub sweep_interval: Duration,
    pub store: StoreConfig,
}

impl RuntimeConfig {
    pub fn new<I, S>(api_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let quota = QuotaPolicy::default();
        Self {
            api_keys: api_keys.into_iter().map(Into::into).collect(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            request_timeout: None,
            context_turns: DEFAULT_CONTEXT_TURNS,
            normalize: true,
            quota,
            sweep_interval: quota.window,
            store: StoreConfig::default(),
        }
    }

    pub fn from_env() -> Result<Self, RuntimeError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from `lookup`, which resolves variable names to values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RuntimeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let keys = lookup(ENV_API_KEYS)
            .map(|raw| parse_key_list(&raw))
            .unwrap_or_default();
        if keys.is_empty() {
            return Err(RuntimeError::missing_setting(format!(
                "{ENV_API_KEYS} must list at least one API key"
            )));
        }

        let mut config = Self::new(keys);

        if let Some(base_url) = non_blank(lookup(ENV_BASE_URL)) {
            config.base_url = base_url;
        }

        if let Some(model) = non_blank(lookup(ENV_MODEL)) {
            config.model = model;
        }

        if let Some(raw) = non_blank(lookup(ENV_TIMEOUT_SECS)) {
            let seconds = raw.parse::<u64>().map_err(|_| {
                RuntimeError::invalid_setting(format!(
                    "{ENV_TIMEOUT_SECS} must be a whole number of seconds, got '{raw}'"
                ))
            })?;
            config.request_timeout = Some(Duration::from_secs(seconds));
        }

        if let Some(raw) = non_blank(lookup(ENV_STORE)) {
            config.store = StoreConfig::parse(&raw).map_err(|error| {
                RuntimeError::invalid_setting(format!("{ENV_STORE}: {}", error.message))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_context_turns(mut self, context_turns: usize) -> Self {
        self.context_turns = context_turns;
        self
    }

    pub fn with_normalization(mut self, enabled: bool) -> Self {
        self.normalize = enabled;
        self
    }

    pub fn with_quota(mut self, quota: QuotaPolicy) -> Self {
        self.quota = quota;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.api_keys.is_empty() {
            return Err(RuntimeError::missing_setting(
                "at least one API key is required",
            ));
        }

        if self.api_keys.iter().any(|key| key.trim().is_empty()) {
            return Err(RuntimeError::invalid_setting("API keys must not be blank"));
        }

        if !(self.base_url.starts_with("https://") || self.base_url.starts_with("http://")) {
            return Err(RuntimeError::invalid_setting(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }

        if self.quota.max_calls_per_window == 0 || self.quota.window.is_zero() {
            return Err(RuntimeError::invalid_setting(
                "quota must allow at least one call in a non-empty window",
            ));
        }

        if self.sweep_interval.is_zero() {
            return Err(RuntimeError::invalid_setting(
                "sweep_interval must be greater than zero",
            ));
        }

        self.chat_policy().validate()?;
        Ok(())
    }

    /// HTTP client settings; the request timeout, when set, also bounds each exchange.
    pub fn provider_config(&self) -> ProviderBuildConfig {
        let config = ProviderBuildConfig::new(self.base_url.clone());
        match self.request_timeout {
            Some(timeout) => config.with_timeout(timeout),
            None => config,
        }
    }

    pub fn chat_policy(&self) -> ChatPolicy {
        let policy = ChatPolicy::default()
            .with_model(self.model.clone())
            .with_temperature(self.temperature)
            .with_context_turns(self.context_turns)
            .with_normalization(self.normalize);

        match self.request_timeout {
            Some(timeout) => policy.with_request_timeout(timeout),
            None => policy,
        }
    }
}

impl Debug for RuntimeConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("api_keys", &format_args!("[{} redacted]", self.api_keys.len()))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("request_timeout", &self.request_timeout)
            .field("context_turns", &self.context_turns)
            .field("normalize", &self.normalize)
            .field("quota", &self.quota)
            .field("sweep_interval", &self.sweep_interval)
            .field("store", &self.store)
            .finish()
    }
}

fn parse_key_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    use pmemory::StoreConfig;

    use super::RuntimeConfig;
    use crate::RuntimeErrorKind;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |name| values.get(name).cloned()
    }

    #[test]
    fn lookup_reads_every_supported_variable() {
        let config = RuntimeConfig::from_lookup(lookup_from(&[
            ("PARLEY_API_KEYS", " gsk-a , ,gsk-b "),
            ("PARLEY_BASE_URL", "http://localhost:8080/v1"),
            ("PARLEY_MODEL", "mixtral-8x7b-32768"),
            ("PARLEY_TIMEOUT_SECS", "45"),
            ("PARLEY_STORE", "fs:/tmp/parley-chats"),
        ]))
        .expect("config should load");

        assert_eq!(config.api_keys, vec!["gsk-a", "gsk-b"]);
        assert_eq!(config.base_url, "http://localhost:8080/v1");
        assert_eq!(config.model, "mixtral-8x7b-32768");
        assert_eq!(config.request_timeout, Some(Duration::from_secs(45)));
        assert_eq!(
            config.store,
            StoreConfig::Filesystem {
                root: PathBuf::from("/tmp/parley-chats")
            }
        );
    }

    #[test]
    fn defaults_apply_when_only_keys_are_set() {
        let config = RuntimeConfig::from_lookup(lookup_from(&[("PARLEY_API_KEYS", "gsk-a")]))
            .expect("config should load");

        assert_eq!(config.base_url, "https://api.groq.com/openai/v1");
        assert_eq!(config.model, "llama-3.3-70b-versatile");
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.context_turns, 5);
        assert!(config.normalize);
        assert_eq!(config.quota.max_calls_per_window, 30);
        assert_eq!(config.request_timeout, None);
    }

    #[test]
    fn missing_or_malformed_settings_are_reported() {
        let missing = RuntimeConfig::from_lookup(lookup_from(&[("PARLEY_API_KEYS", " , ")]))
            .expect_err("blank key list should fail");
        assert_eq!(missing.kind, RuntimeErrorKind::MissingSetting);

        let timeout = RuntimeConfig::from_lookup(lookup_from(&[
            ("PARLEY_API_KEYS", "gsk-a"),
            ("PARLEY_TIMEOUT_SECS", "soon"),
        ]))
        .expect_err("non-numeric timeout should fail");
        assert_eq!(timeout.kind, RuntimeErrorKind::InvalidSetting);

        let store = RuntimeConfig::from_lookup(lookup_from(&[
            ("PARLEY_API_KEYS", "gsk-a"),
            ("PARLEY_STORE", "redis://cache"),
        ]))
        .expect_err("unknown store should fail");
        assert_eq!(store.kind, RuntimeErrorKind::InvalidSetting);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let base = RuntimeConfig::new(["gsk-a"]).with_store(StoreConfig::Memory);
        assert!(base.validate().is_ok());

        assert_eq!(
            base.clone()
                .with_base_url("ftp://example.com")
                .validate()
                .expect_err("scheme")
                .kind,
            RuntimeErrorKind::InvalidSetting
        );
        assert_eq!(
            base.clone()
                .with_temperature(5.0)
                .validate()
                .expect_err("temperature")
                .kind,
            RuntimeErrorKind::Chat
        );
        assert_eq!(
            RuntimeConfig::new(["gsk-a", "  "])
                .validate()
                .expect_err("blank key")
                .kind,
            RuntimeErrorKind::InvalidSetting
        );
    }

    #[test]
    fn debug_output_redacts_keys() {
        let rendered = format!("{:?}", RuntimeConfig::new(["gsk-super-secret"]));
        assert!(!rendered.contains("gsk-super-secret"));
        assert!(rendered.contains("1 redacted"));
    }
}
