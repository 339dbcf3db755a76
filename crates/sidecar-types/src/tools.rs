//! Tool descriptors and the invocation contract between the agent and the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::error::BoxError;

/// A tool call issued by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "toolCallId")]
    pub tool_call_id: String,
    #[serde(rename = "toolName")]
    pub tool_name: String,
    /// Raw arguments as produced by the model. Expected to be a JSON object.
    pub arguments: Value,
}

/// Outcome classification of a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolResultType {
    Success,
    Error,
}

/// The result returned to the agent for a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Text the model sees as the tool's output.
    #[serde(rename = "textResultForLlm")]
    pub text_result_for_llm: String,
    #[serde(rename = "resultType")]
    pub result_type: ToolResultType,
    /// Short audit line recorded in the session log.
    #[serde(rename = "sessionLog", skip_serializing_if = "Option::is_none")]
    pub session_log: Option<String>,
}

/// Executes tool calls on behalf of the agent.
///
/// An `Err` is a transport-level failure (for example malformed arguments).
/// Business failures should be reported as an `Ok` result with
/// [`ToolResultType::Error`] so the model can reason about them.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(&self, invocation: ToolInvocation) -> Result<ToolResult, BoxError>;
}

/// A tool as advertised to the agent: schema plus an in-process invoker.
#[derive(Clone, Serialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    /// JSON schema of the tool's arguments.
    pub parameters: Value,
    #[serde(skip)]
    pub handler: Arc<dyn ToolInvoker>,
}

impl Tool {
    /// Invoke the tool's handler.
    pub async fn invoke(&self, invocation: ToolInvocation) -> Result<ToolResult, BoxError> {
        self.handler.invoke(invocation).await
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}
