//! Runtime configuration.
//!
//! Read from a TOML file (all sections optional), then overridden by
//! environment variables:
//!
//! | Variable                      | Overrides              |
//! |-------------------------------|------------------------|
//! | `TOGETHER_API_KEY`            | `gateway.api_key`      |
//! | `PETITIONS_DATABASE_URL`      | `database.url`         |
//! | `PETITIONS_BIND`              | `server.bind`          |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | `logging.otlp_endpoint`|
//!
//! ```toml
//! [gateway]
//! default_model = "meta-llama/Meta-Llama-3.1-8B-Instruct-Turbo"
//! timeout_secs = 180
//!
//! [gateway.options]
//! max_tokens = 2000
//! temperature = 0.7
//!
//! [pipeline]
//! stage_timeout_secs = 120
//!
//! [pipeline.review]
//! legal = "juridico"
//! fallback_specialty = "geral"
//!
//! [database]
//! url = "sqlite://petitions.db"
//!
//! [logging]
//! format = "json"
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use nodes::ExecutorConfig;
use pipeline::{GenerationOptions, ModelId, PipelineError, ReviewChainConfig};
use serde::Deserialize;

/// File read when `--config` is not given; absence is not an error.
pub const DEFAULT_CONFIG_FILE: &str = "petitions.toml";

pub const DEFAULT_MODEL: &str = "meta-llama/Meta-Llama-3.1-8B-Instruct-Turbo";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub gateway: GatewaySection,
    pub pipeline: PipelineSection,
    pub database: DatabaseSection,
    pub server: ServerSection,
    pub logging: LoggingSection,
    pub catalog: CatalogSection,
}

#[derive(Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewaySection {
    pub base_url: String,
    /// Usually supplied through `TOGETHER_API_KEY` instead.
    pub api_key: Option<String>,
    /// HTTP client deadline; the per-stage timeout normally fires first.
    pub timeout_secs: u64,
    /// Model assigned to agents created by `init`.
    pub default_model: String,
    pub options: GenerationOptions,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            base_url: llm::DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout_secs: llm::DEFAULT_HTTP_TIMEOUT.as_secs(),
            default_model: DEFAULT_MODEL.to_string(),
            options: GenerationOptions::default(),
        }
    }
}

impl std::fmt::Debug for GatewaySection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySection")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("default_model", &self.default_model)
            .field("options", &self.options)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSection {
    pub stage_timeout_secs: u64,
    pub review: ReviewChainConfig,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            stage_timeout_secs: nodes::DEFAULT_STAGE_TIMEOUT.as_secs(),
            review: ReviewChainConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseSection {
    pub url: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: "sqlite://petitions.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub bind: SocketAddr,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    pub format: LogFormat,
    /// `EnvFilter` directives; `RUST_LOG` wins when set.
    pub filter: String,
    /// OTLP gRPC collector; spans are exported only when set.
    pub otlp_endpoint: Option<String>,
    pub service_name: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            filter: "info".to_string(),
            otlp_endpoint: None,
            service_name: "petitions".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogSection {
    /// Replaces the built-in catalog.
    pub path: Option<PathBuf>,
}

impl AppConfig {
    /// Loads `path`, or [`DEFAULT_CONFIG_FILE`] if present, applies the
    /// environment and validates the result.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Applies overrides from `lookup` (normally the process environment).
    pub fn apply_env<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = set("TOGETHER_API_KEY") {
            self.gateway.api_key = Some(key);
        }
        if let Some(url) = set("PETITIONS_DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(bind) = set("PETITIONS_BIND") {
            self.server.bind = bind
                .parse()
                .with_context(|| format!("PETITIONS_BIND is not a socket address: {bind}"))?;
        }
        if let Some(endpoint) = set("OTEL_EXPORTER_OTLP_ENDPOINT") {
            self.logging.otlp_endpoint = Some(endpoint);
        }
        Ok(())
    }

    /// Rejects values that would only fail later, mid-run.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |message: String| Err(PipelineError::ConfigurationError { message });

        if !self.gateway.base_url.starts_with("http://")
            && !self.gateway.base_url.starts_with("https://")
        {
            return invalid(format!(
                "gateway.base_url must be an http(s) URL, got '{}'",
                self.gateway.base_url
            ));
        }
        if self.gateway.timeout_secs == 0 {
            return invalid("gateway.timeout_secs must be positive".into());
        }
        if ModelId::new(self.gateway.default_model.as_str()).is_none() {
            return invalid("gateway.default_model must not be blank".into());
        }
        if self.gateway.options.max_tokens == 0 {
            return invalid("gateway.options.max_tokens must be positive".into());
        }
        if self.pipeline.stage_timeout_secs == 0 {
            return invalid("pipeline.stage_timeout_secs must be positive".into());
        }
        if self.database.url.trim().is_empty() {
            return invalid("database.url must not be empty".into());
        }
        Ok(())
    }

    pub fn default_model(&self) -> anyhow::Result<ModelId> {
        ModelId::new(self.gateway.default_model.as_str())
            .context("gateway.default_model must not be blank")
    }

    pub fn api_key(&self) -> anyhow::Result<&str> {
        self.gateway
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .context("TOGETHER_API_KEY is not set")
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            stage_timeout: Duration::from_secs(self.pipeline.stage_timeout_secs),
            options: self.gateway.options.clone(),
            review: self.pipeline.review.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(config.validate().is_ok());
        assert_eq!(config.executor_config(), ExecutorConfig::default());
        assert_eq!(config.gateway.default_model, DEFAULT_MODEL);
    }

    #[test]
    fn sections_override_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [gateway]
            default_model = "mistralai/Mixtral-8x7B-Instruct-v0.1"

            [gateway.options]
            max_tokens = 4000

            [pipeline]
            stage_timeout_secs = 30

            [pipeline.review]
            language = "gramatica"
            fallback_specialty = "geral"

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        let executor = config.executor_config();
        assert_eq!(executor.stage_timeout, Duration::from_secs(30));
        assert_eq!(executor.options.max_tokens, 4000);
        assert_eq!(executor.options.top_k, 50);
        assert_eq!(executor.review.language.as_str(), "gramatica");
        assert_eq!(executor.review.legal.as_str(), "juridico");
        assert_eq!(
            executor.review.fallback_specialty.map(|s| s.to_string()),
            Some("geral".to_string())
        );
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(AppConfig::from_toml_str("[gateway]\nmodel = \"x\"\n").is_err());
    }

    #[test]
    fn environment_overrides_the_file() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("TOGETHER_API_KEY", "secret"),
                ("PETITIONS_DATABASE_URL", "sqlite::memory:"),
                ("PETITIONS_BIND", "0.0.0.0:9000"),
                ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://collector:4317"),
            ]))
            .unwrap();

        assert_eq!(config.api_key().unwrap(), "secret");
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.server.bind.port(), 9000);
        assert_eq!(
            config.logging.otlp_endpoint.as_deref(),
            Some("http://collector:4317")
        );
    }

    #[test]
    fn bad_bind_address_is_reported() {
        let mut config = AppConfig::default();
        assert!(config.apply_env(env(&[("PETITIONS_BIND", "nowhere")])).is_err());
    }

    #[test]
    fn missing_api_key_is_an_error_only_when_needed() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.api_key().is_err());
    }

    #[test]
    fn invalid_values_are_configuration_errors() {
        let zero_timeout =
            AppConfig::from_toml_str("[pipeline]\nstage_timeout_secs = 0\n").unwrap();
        assert!(matches!(
            zero_timeout.validate(),
            Err(PipelineError::ConfigurationError { .. })
        ));


        let bad_url = AppConfig::from_toml_str("[gateway]\nbase_url = \"ftp://x\"\n").unwrap();
        assert!(bad_url.validate().is_err());
    }

    #[test]
    fn blank_review_specialties_fail_to_parse() {
        let err = AppConfig::from_toml_str("[pipeline.review]\nlegal = \"  \"\n").unwrap_err();
        assert!(err.to_string().contains("Specialty must not be blank"), "{err}");

        let blank_fallback = "[pipeline.review]\nfallback_specialty = \"\"\n";
        assert!(AppConfig::from_toml_str(blank_fallback).is_err());
    }

    #[test]
    fn debug_output_hides_the_key() {
        let mut config = AppConfig::default();
        config.gateway.api_key = Some("secret-key".into());
        assert!(!format!("{config:?}").contains("secret-key"));
    }
}
