//! Tool execution pipeline: resolve, validate, authorize, run with a
//! timeout, and bound the output size.
//!
//! `execute` is infallible by design of the agent loop contract: every model
//! tool call must produce a result message, so failures become error payloads
//! instead of propagated errors.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::llm::provider::ToolCall;
use crate::tools::error::{ToolError, ToolErrorType};
use crate::tools::permissions::PermissionGate;
use crate::tools::registry::ToolRegistry;

/// Whether a tool call succeeded, recorded alongside the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolResultStatus {
    Ok,
    Error,
}

/// The answer to one tool call, ready to append to the conversation.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub call_id: String,
    pub tool_name: String,
    pub status: ToolResultStatus,
    pub payload: String,
}

#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    permissions: Arc<PermissionGate>,
    timeout: Duration,
    max_output_bytes: usize,
}

impl ToolExecutor {
    pub fn new(
        registry: Arc<ToolRegistry>,
        permissions: Arc<PermissionGate>,
        timeout: Duration,
        max_output_bytes: usize,
    ) -> Self {
        Self {
            registry,
            permissions,
            timeout,
            max_output_bytes,
        }
    }

    /// Execute one tool call to completion. Never returns an error; every
    /// failure mode is folded into an error-status outcome.
    pub async fn execute(&self, call: ToolCall) -> ToolOutcome {
        let tool_name = call.function.name.clone();
        let call_id = call.id.clone();

        let Some(tool) = self.registry.resolve(&tool_name) else {
            let known = self.registry.names().join(", ");
            return self.failed(
                call_id,
                tool_name.clone(),
                ToolErrorType::ToolNotFound,
                format!("unknown tool '{tool_name}' (available: {known})"),
            );
        };

        let args = match call.parsed_arguments() {
            Ok(args) => args,
            Err(err) => {
                return self.failed(
                    call_id,
                    tool_name,
                    ToolErrorType::InvalidArguments,
                    format!("arguments are not valid JSON: {err}"),
                );
            }
        };

        if let Err(message) = validate_arguments(&tool.parameters(), &args) {
            return self.failed(call_id, tool_name, ToolErrorType::InvalidArguments, message);
        }

        let target = tool.permission_target(&args).unwrap_or_default();
        if !self
            .permissions
            .authorize(&tool_name, tool.capability(), &target)
            .await
        {
            return self.failed(
                call_id,
                tool_name.clone(),
                ToolErrorType::PermissionDenied,
                format!("permission denied for {tool_name} on '{target}'"),
            );
        }

        debug!(tool = %tool_name, call_id = %call_id, "executing tool");
        let result = tokio::time::timeout(self.timeout, tool.execute(args)).await;
        match result {
            Ok(Ok(value)) => ToolOutcome {
                call_id,
                tool_name,
                status: ToolResultStatus::Ok,
                payload: self.render(value),
            },
            Ok(Err(err)) => self.failed(
                call_id,
                tool_name,
                ToolErrorType::ExecutionFailed,
                format!("{err:#}"),
            ),
            Err(_) => self.failed(
                call_id,
                tool_name,
                ToolErrorType::Timeout,
                format!("tool timed out after {}s", self.timeout.as_secs()),
            ),
        }
    }

    fn failed(
        &self,
        call_id: String,
        tool_name: String,
        error_type: ToolErrorType,
        message: String,
    ) -> ToolOutcome {
        let error = ToolError::new(tool_name.clone(), error_type, message);
        warn!(tool = %tool_name, "tool call failed: {error}");
        ToolOutcome {
            call_id,
            tool_name,
            status: ToolResultStatus::Error,
            payload: self.render(error.to_json_value()),
        }
    }

    /// Render a tool's result value as text and apply the output fuse.
    fn render(&self, value: Value) -> String {
        let text = match value {
            Value::String(text) => text,
            other => serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string()),
        };
        truncate_output(text, self.max_output_bytes)
    }
}

/// Cut output to at most `max_bytes`, on a char boundary, with an explicit
/// marker so the model knows the result is partial.
fn truncate_output(text: String, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text;
    }
    let mut cut = max_bytes;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let omitted = text.len() - cut;
    format!("{}\n[... output truncated, {omitted} bytes omitted ...]", &text[..cut])
}

/// Minimal JSON-schema check: required keys must be present and declared
/// property types must match. Unknown keys pass through untouched.
fn validate_arguments(schema: &Value, args: &Value) -> Result<(), String> {
    let Some(args_object) = args.as_object() else {
        return Err("arguments must be a JSON object".to_owned());
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if !args_object.contains_key(key) {
                return Err(format!("missing required argument '{key}'"));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (key, value) in args_object {
            let Some(expected) = properties.get(key).and_then(|p| p.get("type")) else {
                continue;
            };
            let matches = match expected.as_str() {
                Some("string") => value.is_string(),
                Some("integer") => value.is_i64() || value.is_u64(),
                Some("number") => value.is_number(),
                Some("boolean") => value.is_boolean(),
                Some("array") => value.is_array(),
                Some("object") => value.is_object(),
                _ => true,
            };
            if !matches {
                return Err(format!(
                    "argument '{key}' has wrong type (expected {expected})"
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::permissions::PermissionMode;
    use crate::tools::registry::ToolProvenance;
    use crate::tools::traits::Tool;
    use async_trait::async_trait;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echo the text argument back"
        }
        fn parameters(&self) -> Value {
            json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            })
        }
        async fn execute(&self, args: Value) -> anyhow::Result<Value> {
            Ok(args["text"].clone())
        }
    }

    struct TouchTool;

    #[async_trait]
    impl Tool for TouchTool {
        fn name(&self) -> &str {
            "touch"
        }
        fn description(&self) -> &str {
            "pretend to write something"
        }
        fn parameters(&self) -> Value {
            json!({
                "type": "object",
                "properties": {"path": {"type": "string"}},
                "required": ["path"]
            })
        }
        fn capability(&self) -> crate::tools::traits::ToolCapability {
            crate::tools::traits::ToolCapability::Mutating
        }
        async fn execute(&self, _args: Value) -> anyhow::Result<Value> {
            Ok(json!("touched"))
        }
    }

    struct SleepTool;

    #[async_trait]
    impl Tool for SleepTool {
        fn name(&self) -> &str {
            "sleep"
        }
        fn description(&self) -> &str {
            "sleep forever"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _args: Value) -> anyhow::Result<Value> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(json!("done"))
        }
    }

    fn executor(timeout: Duration) -> ToolExecutor {
        let registry = Arc::new(ToolRegistry::new());
        registry
            .register(Arc::new(EchoTool), ToolProvenance::Builtin)
            .unwrap();
        registry
            .register(Arc::new(SleepTool), ToolProvenance::Builtin)
            .unwrap();
        registry
            .register(Arc::new(TouchTool), ToolProvenance::Builtin)
            .unwrap();
        let gate = Arc::new(PermissionGate::new(PermissionMode::Auto, Vec::new()));
        ToolExecutor::new(registry, gate, timeout, 1_000)
    }

    #[tokio::test]
    async fn successful_call_returns_ok_payload() {
        let executor = executor(Duration::from_secs(5));
        let call = ToolCall::function("call_1", "echo", r#"{"text": "hello"}"#);
        let outcome = executor.execute(call).await;
        assert_eq!(outcome.status, ToolResultStatus::Ok);
        assert_eq!(outcome.payload, "hello");
        assert_eq!(outcome.call_id, "call_1");
    }

    #[tokio::test]
    async fn unknown_tool_becomes_error_outcome() {
        let executor = executor(Duration::from_secs(5));
        let call = ToolCall::function("call_2", "nonexistent", "{}");
        let outcome = executor.execute(call).await;
        assert_eq!(outcome.status, ToolResultStatus::Error);
        assert!(outcome.payload.contains("tool_not_found"));
        assert!(outcome.payload.contains("available"));
    }

    #[tokio::test]
    async fn malformed_arguments_become_error_outcome() {
        let executor = executor(Duration::from_secs(5));
        let call = ToolCall::function("call_3", "echo", "{not json");
        let outcome = executor.execute(call).await;
        assert_eq!(outcome.status, ToolResultStatus::Error);
        assert!(outcome.payload.contains("invalid_arguments"));
    }

    #[tokio::test]
    async fn missing_required_argument_is_rejected() {
        let executor = executor(Duration::from_secs(5));
        let call = ToolCall::function("call_4", "echo", "{}");
        let outcome = executor.execute(call).await;
        assert_eq!(outcome.status, ToolResultStatus::Error);
        assert!(outcome.payload.contains("missing required argument 'text'"));
    }

    #[tokio::test]
    async fn wrong_argument_type_is_rejected() {
        let executor = executor(Duration::from_secs(5));
        let call = ToolCall::function("call_5", "echo", r#"{"text": 42}"#);
        let outcome = executor.execute(call).await;
        assert_eq!(outcome.status, ToolResultStatus::Error);
        assert!(outcome.payload.contains("wrong type"));
    }

    #[tokio::test]
    async fn slow_tool_times_out() {
        let executor = executor(Duration::from_millis(50));
        let call = ToolCall::function("call_6", "sleep", "{}");
        let outcome = executor.execute(call).await;
        assert_eq!(outcome.status, ToolResultStatus::Error);
        assert!(outcome.payload.contains("timeout"));
    }

    #[tokio::test]
    async fn denied_mutating_tool_becomes_error_outcome() {
        let registry = Arc::new(ToolRegistry::new());
        registry
            .register(Arc::new(TouchTool), ToolProvenance::Builtin)
            .unwrap();
        let gate = Arc::new(PermissionGate::new(PermissionMode::Strict, Vec::new()));
        let executor = ToolExecutor::new(registry, gate, Duration::from_secs(5), 1_000);

        let call = ToolCall::function("call_8", "touch", r#"{"path": "src/lib.rs"}"#);
        let outcome = executor.execute(call).await;
        assert_eq!(outcome.status, ToolResultStatus::Error);
        assert!(outcome.payload.contains("permission_denied"));
        assert!(outcome.payload.contains("src/lib.rs"));
    }

    #[tokio::test]
    async fn oversized_output_is_truncated_with_marker() {
        let executor = executor(Duration::from_secs(5));
        let big = "x".repeat(5_000);
        let call = ToolCall::function("call_7", "echo", &format!(r#"{{"text": "{big}"}}"#));
        let outcome = executor.execute(call).await;
        assert_eq!(outcome.status, ToolResultStatus::Ok);
        assert!(outcome.payload.contains("output truncated"));
        assert!(outcome.payload.len() < 1_200);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "héllo wörld ".repeat(100);
        let truncated = truncate_output(text, 37);
        assert!(truncated.contains("output truncated"));
    }
}
