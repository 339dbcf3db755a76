//! Session configuration types sent when creating or resuming a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tools::Tool;

/// How a configured system message is combined with the agent's own prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemMessageMode {
    /// Append the content to the agent's default system prompt.
    Append,
    /// Replace the agent's default system prompt.
    Replace,
}

/// A system message directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemMessageConfig {
    pub mode: SystemMessageMode,
    pub content: String,
}

impl SystemMessageConfig {
    /// Create an append-mode directive.
    pub fn append(content: impl Into<String>) -> Self {
        Self {
            mode: SystemMessageMode::Append,
            content: content.into(),
        }
    }
}

/// Azure-specific provider options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureProviderOptions {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
}

/// A Bring-Your-Own-Key provider block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider type ("openai", "azure", "anthropic").
    #[serde(rename = "type")]
    pub provider_type: String,
    #[serde(rename = "baseUrl")]
    pub base_url: String,
    /// May be empty for local providers.
    #[serde(rename = "apiKey", skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureProviderOptions>,
}

/// Configuration used to create or resume a session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionConfig {
    pub model: String,
    pub streaming: bool,
    #[serde(rename = "systemMessage", skip_serializing_if = "Option::is_none")]
    pub system_message: Option<SystemMessageConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderConfig>,
    /// `None` when no tools are registered, never an empty list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
}

impl SessionConfig {
    /// Names of the configured tools in registration order.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools
            .iter()
            .flatten()
            .map(|tool| tool.name.as_str())
            .collect()
    }
}

/// Response to a ping request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingResponse {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl PingResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_omits_absent_blocks() {
        let config = SessionConfig {
            model: "gpt-4o".to_string(),
            ..Default::default()
        };

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["model"], "gpt-4o");
        assert_eq!(json["streaming"], false);
        assert!(json.get("systemMessage").is_none());
        assert!(json.get("provider").is_none());
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn test_system_message_append() {
        let message = SystemMessageConfig::append("be brief");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["mode"], "append");
        assert_eq!(json["content"], "be brief");
    }

    #[test]
    fn test_provider_serialization() {
        let provider = ProviderConfig {
            provider_type: "azure".to_string(),
            base_url: "https://example.openai.azure.com".to_string(),
            api_key: String::new(),
            azure: Some(AzureProviderOptions {
                api_version: "2024-10-21".to_string(),
            }),
        };

        let json = serde_json::to_value(&provider).unwrap();
        assert_eq!(json["type"], "azure");
        assert_eq!(json["azure"]["apiVersion"], "2024-10-21");
        assert!(json.get("apiKey").is_none());
    }
}
