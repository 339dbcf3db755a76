//! Session orchestration: turning a logical conversation into a live session.

use sidecar_types::{AzureProviderOptions, ProviderConfig, SessionConfig, SystemMessageConfig};
use std::sync::Arc;

use crate::client::Client;
use crate::config::{AuthMode, ClientConfig, ProviderType};
use crate::error::{ClientError, Result};
use crate::transport::AgentSession;

impl ClientConfig {
    /// Session configuration derived from the client configuration.
    ///
    /// Used unchanged for both creating and resuming sessions.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            model: self.model.clone(),
            streaming: self.streaming,
            system_message: (!self.system_message.is_empty())
                .then(|| SystemMessageConfig::append(self.system_message.clone())),
            provider: self.provider_config(),
            tools: self.tools.descriptors(),
        }
    }

    /// The BYOK provider block, present only in BYOK mode.
    pub fn provider_config(&self) -> Option<ProviderConfig> {
        if self.auth_mode != AuthMode::Byok {
            return None;
        }

        let azure = (self.provider_type == ProviderType::Azure
            && !self.azure_api_version.is_empty())
        .then(|| AzureProviderOptions {
            api_version: self.azure_api_version.clone(),
        });

        Some(ProviderConfig {
            provider_type: self.provider_type.as_str().to_string(),
            base_url: self.provider_base_url.clone(),
            api_key: self.provider_api_key.clone(),
            azure,
        })
    }
}

impl Client {
    /// Resume `session_id`, or create a new session when it is absent or empty.
    pub(crate) async fn resolve_session(
        &self,
        session_id: Option<&str>,
    ) -> Result<Arc<dyn AgentSession>> {
        let session_config = self.config().session_config();

        let session = match session_id.filter(|id| !id.is_empty()) {
            Some(id) => {
                log::debug!("Resuming session {}", id);
                self.transport().resume_session(id, session_config).await
            }
            None => {
                log::debug!(
                    "Creating session with model {} and tools {:?}",
                    session_config.model,
                    session_config.tool_names()
                );
                self.transport().create_session(session_config).await
            }
        };

        session.map_err(ClientError::SessionSetup)
    }
}
