//! Client configuration: defaults, builder methods and validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::ConfigError;
use crate::tools::{ToolDefinition, ToolRegistry};
use crate::transport::TransportOptions;

pub const DEFAULT_CLI_URL: &str = "localhost:4321";
pub const DEFAULT_LOG_LEVEL: &str = "error";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_CONN_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// How the sidecar authenticates with the model provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Platform token mode; the sidecar holds its own credentials.
    #[default]
    Github,
    /// Bring Your Own Key: provider credentials are supplied by the caller.
    Byok,
}

/// BYOK provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    #[default]
    Openai,
    Azure,
    Anthropic,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Openai => "openai",
            ProviderType::Azure => "azure",
            ProviderType::Anthropic => "anthropic",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderType::Openai),
            "azure" => Ok(ProviderType::Azure),
            "anthropic" => Ok(ProviderType::Anthropic),
            other => Err(ConfigError::invalid_option(format!(
                "unknown provider type '{}'",
                other
            ))),
        }
    }
}

/// Resolved client configuration.
///
/// Built once from [`ClientConfig::default`] plus `with_*` calls, validated by
/// [`crate::Client::new`], and read-only afterwards.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Address of the sidecar, in `host:port` form.
    pub cli_url: String,
    /// Log verbosity passed to the transport ("error", "info", "debug").
    pub log_level: String,
    pub model: String,
    pub auth_mode: AuthMode,
    /// Ask the agent for incremental delta events.
    pub streaming: bool,
    /// Upper bound of each connection attempt.
    pub conn_timeout: Duration,
    /// Number of connection attempts made by `start`.
    pub retry_attempts: u32,
    /// Delay before the second attempt; doubles after every failure.
    pub retry_delay: Duration,
    /// Appended to the agent's system prompt when non-empty.
    pub system_message: String,
    pub tools: ToolRegistry,
    pub provider_type: ProviderType,
    pub provider_base_url: String,
    pub provider_api_key: String,
    /// Only sent for [`ProviderType::Azure`], and only when non-empty.
    pub azure_api_version: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cli_url: DEFAULT_CLI_URL.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            auth_mode: AuthMode::Github,
            streaming: false,
            conn_timeout: DEFAULT_CONN_TIMEOUT,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            system_message: String::new(),
            tools: ToolRegistry::new(),
            provider_type: ProviderType::Openai,
            provider_base_url: String::new(),
            provider_api_key: String::new(),
            azure_api_version: String::new(),
        }
    }
}

impl ClientConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sidecar address.
    pub fn with_cli_url(mut self, url: impl Into<String>) -> Self {
        self.cli_url = url.into();
        self
    }

    /// Set the transport log level.
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the model. Required when using BYOK.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Enable or disable delta events.
    pub fn with_streaming(mut self, enabled: bool) -> Self {
        self.streaming = enabled;
        self
    }

    /// Set the per-attempt connection timeout.
    pub fn with_conn_timeout(mut self, timeout: Duration) -> Self {
        self.conn_timeout = timeout;
        self
    }

    /// Set how many connection attempts `start` makes.
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Set the base delay between connection attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set a system message appended to every session.
    pub fn with_system_message(mut self, message: impl Into<String>) -> Self {
        self.system_message = message.into();
        self
    }

    /// Register a tool the agent may call. Handlers run in this process.
    pub fn with_tool(mut self, tool: ToolDefinition) -> Self {
        self.tools.register(tool);
        self
    }

    /// Register several tools, keeping their order.
    pub fn with_tools(mut self, tools: impl IntoIterator<Item = ToolDefinition>) -> Self {
        for tool in tools {
            self.tools.register(tool);
        }
        self
    }

    /// Use platform token authentication. This is the default.
    pub fn with_github_auth(mut self) -> Self {
        self.auth_mode = AuthMode::Github;
        self
    }

    /// Use a caller-supplied provider. `api_key` may be empty for local providers.
    pub fn with_byok(
        mut self,
        provider_type: ProviderType,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        self.auth_mode = AuthMode::Byok;
        self.provider_type = provider_type;
        self.provider_base_url = base_url.into();
        self.provider_api_key = api_key.into();
        self
    }

    /// Set the Azure API version used with [`ProviderType::Azure`].
    pub fn with_azure_api_version(mut self, version: impl Into<String>) -> Self {
        self.azure_api_version = version.into();
        self
    }

    /// Check the configuration invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cli_url.is_empty() {
            return Err(ConfigError::MissingCliUrl);
        }
        if self.conn_timeout.is_zero() {
            return Err(ConfigError::invalid_option(
                "connection timeout must be positive",
            ));
        }
        if self.retry_attempts == 0 {
            return Err(ConfigError::invalid_option("retry attempts must be positive"));
        }
        if self.retry_delay.is_zero() {
            return Err(ConfigError::invalid_option("retry delay must be positive"));
        }
        if self.auth_mode == AuthMode::Byok {
            if self.model.is_empty() {
                return Err(ConfigError::MissingModel);
            }
            if self.provider_base_url.is_empty() {
                return Err(ConfigError::MissingProviderBaseUrl);
            }
        } else if self.model.is_empty() {
            return Err(ConfigError::invalid_option("model must not be empty"));
        }
        Ok(())
    }

    /// Options handed to the transport when the client is built.
    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            cli_url: self.cli_url.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.cli_url, "localhost:4321");
        assert_eq!(config.log_level, "error");
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.auth_mode, AuthMode::Github);
        assert_eq!(config.conn_timeout, Duration::from_secs(10));
        assert_eq!(config.retry_attempts, 5);
        assert_eq!(config.retry_delay, Duration::from_millis(500));
        assert_eq!(config.provider_type, ProviderType::Openai);
        assert!(!config.streaming);
        assert!(config.tools.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_errors() {
        let cases = vec![
            (ClientConfig::new().with_cli_url(""), ConfigError::MissingCliUrl),
            (
                ClientConfig::new().with_byok(ProviderType::Openai, "", "key"),
                ConfigError::MissingProviderBaseUrl,
            ),
            (
                ClientConfig::new()
                    .with_model("")
                    .with_byok(ProviderType::Openai, "https://api.openai.com/v1", ""),
                ConfigError::MissingModel,
            ),
            (
                ClientConfig::new().with_retry_attempts(0),
                ConfigError::invalid_option("retry attempts must be positive"),
            ),
            (
                ClientConfig::new().with_conn_timeout(Duration::ZERO),
                ConfigError::invalid_option("connection timeout must be positive"),
            ),
            (
                ClientConfig::new().with_retry_delay(Duration::ZERO),
                ConfigError::invalid_option("retry delay must be positive"),
            ),
        ];

        for (config, expected) in cases {
            assert_eq!(config.validate(), Err(expected));
        }
    }

    #[test]
    fn test_byok_with_local_provider_needs_no_key() {
        let config = ClientConfig::new()
            .with_model("llama3")
            .with_byok(ProviderType::Openai, "http://localhost:11434/v1", "");
        assert!(config.validate().is_ok());
        assert_eq!(config.auth_mode, AuthMode::Byok);
    }

    #[test]
    fn test_github_auth_overrides_byok() {
        let config = ClientConfig::new()
            .with_byok(ProviderType::Azure, "https://example.azure.com", "key")
            .with_github_auth();
        assert_eq!(config.auth_mode, AuthMode::Github);
    }

    #[test]
    fn test_provider_type_from_str() {
        assert_eq!("Azure".parse::<ProviderType>(), Ok(ProviderType::Azure));
        assert_eq!(
            "anthropic".parse::<ProviderType>().map(|p| p.to_string()),
            Ok("anthropic".to_string())
        );
        assert!("bedrock".parse::<ProviderType>().is_err());
    }

    #[test]
    fn test_transport_options() {
        let options = ClientConfig::new()
            .with_cli_url("sidecar:9000")
            .with_log_level("debug")
            .transport_options();
        assert_eq!(options.cli_url, "sidecar:9000");
        assert_eq!(options.log_level, "debug");
    }
}
