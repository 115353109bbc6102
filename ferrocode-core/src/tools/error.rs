//! Structured tool failure reporting.
//!
//! Tool failures are routed back to the model as JSON payloads rather than
//! propagated as process errors, so the agent loop can keep going.

use serde_json::{Value, json};

/// Category of a tool failure, carried in the payload handed to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolErrorType {
    InvalidArguments,
    ToolNotFound,
    PermissionDenied,
    Timeout,
    ExecutionFailed,
}

impl ToolErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolErrorType::InvalidArguments => "invalid_arguments",
            ToolErrorType::ToolNotFound => "tool_not_found",
            ToolErrorType::PermissionDenied => "permission_denied",
            ToolErrorType::Timeout => "timeout",
            ToolErrorType::ExecutionFailed => "execution_failed",
        }
    }
}

/// A failed tool invocation, ready to be serialized for the model.
#[derive(Debug, Clone)]
pub struct ToolError {
    pub tool_name: String,
    pub error_type: ToolErrorType,
    pub message: String,
}

impl ToolError {
    pub fn new(
        tool_name: impl Into<String>,
        error_type: ToolErrorType,
        message: impl Into<String>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            error_type,
            message: message.into(),
        }
    }

    /// Render the error in the shape tool results use on the wire.
    pub fn to_json_value(&self) -> Value {
        json!({
            "error": {
                "tool": self.tool_name,
                "type": self.error_type.as_str(),
                "message": self.message,
            }
        })
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}): {}",
            self.tool_name,
            self.error_type.as_str(),
            self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_payload_shape() {
        let err = ToolError::new("bash", ToolErrorType::Timeout, "command timed out after 60s");
        let value = err.to_json_value();
        assert_eq!(value["error"]["tool"], "bash");
        assert_eq!(value["error"]["type"], "timeout");
        assert!(
            value["error"]["message"]
                .as_str()
                .unwrap()
                .contains("timed out")
        );
    }
}
