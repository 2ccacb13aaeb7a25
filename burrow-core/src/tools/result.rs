//! Tagged tool results and the error taxonomy seen by callers
//!
//! Every tool call produces a [`ToolResultEnvelope`]: a success payload, a
//! structured [`ToolError`], or a cancellation, plus non-fatal warnings and
//! provenance. Component errors are folded into [`ToolErrorKind`] here so the
//! dispatch boundary can handle each failure class exhaustively.

use crate::error::BurrowError;
use crate::tools::CapabilitySet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Current schema version for result envelopes
pub const RESULT_SCHEMA_VERSION: u32 = 1;

/// Warning code attached when an edit matched nothing
pub const NO_MATCH: &str = "NO_MATCH";

/// Result of one tool call, with warnings and provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultEnvelope {
    /// Schema version for forward compatibility
    pub schema_version: u32,

    /// Result status and payload
    pub result: ToolResult,

    /// Warnings that occurred but didn't fail execution
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ToolWarning>,

    /// Provenance metadata for tracing
    pub provenance: ToolProvenance,
}

impl ToolResultEnvelope {
    /// Create a successful result envelope
    pub fn success(value: Value, provenance: ToolProvenance) -> Self {
        Self::with_result(ToolResult::Success { value }, provenance)
    }

    /// Create an error result envelope
    pub fn error(error: ToolError, provenance: ToolProvenance) -> Self {
        Self::with_result(ToolResult::Error { error }, provenance)
    }

    /// Create a cancelled result envelope
    pub fn cancelled(reason: impl Into<String>, provenance: ToolProvenance) -> Self {
        Self::with_result(
            ToolResult::Cancelled {
                reason: reason.into(),
            },
            provenance,
        )
    }

    fn with_result(result: ToolResult, provenance: ToolProvenance) -> Self {
        Self {
            schema_version: RESULT_SCHEMA_VERSION,
            result,
            warnings: Vec::new(),
            provenance,
        }
    }

    /// Add a warning to the envelope
    pub fn with_warning(mut self, warning: ToolWarning) -> Self {
        self.warnings.push(warning);
        self
    }

    /// Check if this result represents success
    pub fn is_success(&self) -> bool {
        matches!(self.result, ToolResult::Success { .. })
    }

    /// Check if this result represents an error
    pub fn is_error(&self) -> bool {
        matches!(self.result, ToolResult::Error { .. })
    }

    /// Check if this result represents cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self.result, ToolResult::Cancelled { .. })
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match &self.result {
            ToolResult::Error { error } => error.kind.is_retryable(),
            _ => false,
        }
    }

    /// Whether a warning with `code` was attached
    pub fn has_warning(&self, code: &str) -> bool {
        self.warnings.iter().any(|w| w.code == code)
    }

    /// Get the value if successful
    pub fn value(&self) -> Option<&Value> {
        match &self.result {
            ToolResult::Success { value } => Some(value),
            _ => None,
        }
    }

    /// Get the error if failed
    pub fn get_error(&self) -> Option<&ToolError> {
        match &self.result {
            ToolResult::Error { error } => Some(error),
            _ => None,
        }
    }
}

/// Tool execution result (success, error, or cancelled)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    /// Tool executed successfully
    Success {
        /// The result value
        value: Value,
    },

    /// Tool execution failed
    Error {
        /// Structured error information
        error: ToolError,
    },

    /// Tool execution was cancelled
    Cancelled {
        /// Reason for cancellation
        reason: String,
    },
}

/// Structured tool error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    /// Failure class
    pub kind: ToolErrorKind,

    /// Human-readable error message
    pub message: String,

    /// Stable machine-readable code
    pub code: Option<String>,

    /// Additional context
    pub context: Option<Value>,
}

impl ToolError {
    /// Create a new tool error
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
            context: None,
        }
    }

    /// Add an error code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Add context
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Create a validation error
    pub fn validation(errors: Vec<ValidationError>) -> Self {
        let message = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");

        Self::new(
            ToolErrorKind::Validation,
            format!("Invalid arguments: {}", message),
        )
        .with_code("VALIDATION_FAILED")
        .with_context(serde_json::to_value(&errors).unwrap_or_default())
    }

    /// Create a capability denied error
    pub fn capability_denied(denied: &CapabilitySet) -> Self {
        Self::new(
            ToolErrorKind::CapabilityDenied,
            format!("Denied by policy: {}", denied),
        )
        .with_code("CAPABILITY_DENIED")
        .with_context(serde_json::to_value(denied).unwrap_or_default())
    }

    /// Create a timeout error
    pub fn timeout(duration: Duration) -> Self {
        Self::new(
            ToolErrorKind::Timeout,
            format!("Tool execution timed out after {:?}", duration),
        )
        .with_code("TIMEOUT")
    }

    /// Create an execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Execution, message).with_code("EXECUTION_FAILED")
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Internal, message).with_code("INTERNAL_ERROR")
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ToolError {}

impl From<BurrowError> for ToolError {
    fn from(err: BurrowError) -> Self {
        let message = err.to_string();
        match err {
            BurrowError::Containment(path) => Self::new(ToolErrorKind::Containment, message)
                .with_code("CONTAINMENT")
                .with_context(Value::String(path.display().to_string())),
            BurrowError::NotADirectory(_) | BurrowError::FileNotFound(_) => {
                Self::new(ToolErrorKind::NotFound, message).with_code("NOT_FOUND")
            }
            BurrowError::ProcessNotFound(pid) => Self::new(ToolErrorKind::ProcessNotFound, message)
                .with_code("PROCESS_NOT_FOUND")
                .with_context(Value::from(pid)),
            BurrowError::Timeout(duration) => Self::timeout(duration),
            BurrowError::InvalidArgument(_) => {
                Self::new(ToolErrorKind::Validation, message).with_code("VALIDATION_FAILED")
            }
            BurrowError::Execution(_) | BurrowError::Io(_) => Self::execution(message),
            BurrowError::Configuration(_)
            | BurrowError::Serialization(_)
            | BurrowError::Other(_) => Self::internal(message),
        }
    }
}

/// Error kind taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// Arguments missing, mistyped, or out of range
    Validation,

    /// A required capability is denied by policy
    CapabilityDenied,

    /// Execution exceeded its deadline
    Timeout,

    /// File or directory does not exist
    NotFound,

    /// Path escapes the workspace root
    Containment,

    /// Pid is not registered
    ProcessNotFound,

    /// Command or script could not be run
    Execution,

    /// Bug or unexpected condition in the server
    Internal,

    /// Cancelled by the caller
    Cancelled,
}

impl ToolErrorKind {
    /// Check if this error kind is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, ToolErrorKind::Timeout)
    }
}

/// Validation error for a specific field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    /// Argument name
    pub field: String,

    /// Error message
    pub message: String,
}

impl ValidationError {
    /// Create a new validation error
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.field.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

/// Warning that occurred during execution but didn't cause failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolWarning {
    /// Warning code
    pub code: String,

    /// Human-readable message
    pub message: String,
}

impl ToolWarning {
    /// Create a new warning
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Warning for an edit whose address or substring matched nothing
    pub fn no_match(message: impl Into<String>) -> Self {
        Self::new(NO_MATCH, message)
    }
}

/// Provenance metadata for tracing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolProvenance {
    /// Tool name
    pub tool_name: String,

    /// Tool version (if available)
    pub tool_version: Option<String>,

    /// Hash prefix of the input arguments
    pub args_hash: String,

    /// Timestamp when execution started
    pub started_at: DateTime<Utc>,

    /// Execution duration
    #[serde(with = "duration_millis")]
    pub duration: Duration,

    /// Request/trace ID for correlation
    pub trace_id: Option<String>,

    /// Policy decisions that were applied
    pub policy_decisions: Vec<PolicyDecision>,
}

impl ToolProvenance {
    /// Create new provenance
    pub fn new(tool_name: impl Into<String>, args_hash: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            tool_version: None,
            args_hash: args_hash.into(),
            started_at: Utc::now(),
            duration: Duration::ZERO,
            trace_id: None,
            policy_decisions: Vec::new(),
        }
    }

    /// Set duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Set trace ID
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Add a policy decision
    pub fn with_policy_decision(mut self, decision: PolicyDecision) -> Self {
        self.policy_decisions.push(decision);
        self
    }
}

/// Record of a policy decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDecision {
    /// What was checked
    pub check: String,

    /// Whether it was allowed
    pub allowed: bool,

    /// Reason for decision
    pub reason: Option<String>,
}

impl PolicyDecision {
    /// Create a new policy decision
    pub fn new(check: impl Into<String>, allowed: bool) -> Self {
        Self {
            check: check.into(),
            allowed,
            reason: None,
        }
    }

    /// Add a reason
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod result_tests {
    use super::*;
    use crate::tools::Capability;
    use std::path::PathBuf;

    #[test]
    fn test_success_envelope() {
        let provenance = ToolProvenance::new("read_file", "abc123");
        let envelope = ToolResultEnvelope::success(Value::String("text".into()), provenance);

        assert!(envelope.is_success());
        assert!(!envelope.is_error());
        assert!(!envelope.is_cancelled());
        assert_eq!(envelope.value(), Some(&Value::String("text".into())));
    }

    #[test]
    fn test_only_timeouts_retry() {
        let provenance = ToolProvenance::new("run_command", "abc123");
        let envelope =
            ToolResultEnvelope::error(ToolError::timeout(Duration::from_secs(30)), provenance);
        assert!(envelope.is_retryable());

        for kind in [
            ToolErrorKind::Validation,
            ToolErrorKind::Containment,
            ToolErrorKind::NotFound,
            ToolErrorKind::Execution,
        ] {
            assert!(!kind.is_retryable(), "{:?}", kind);
        }
    }

    #[test]
    fn test_burrow_error_mapping() {
        let err: ToolError = BurrowError::Containment(PathBuf::from("/etc")).into();
        assert_eq!(err.kind, ToolErrorKind::Containment);
        assert_eq!(err.message, "Cannot leave the workspace directory: /etc");

        let err: ToolError = BurrowError::FileNotFound(PathBuf::from("/ws/a.txt")).into();
        assert_eq!(err.kind, ToolErrorKind::NotFound);

        let err: ToolError = BurrowError::ProcessNotFound(42).into();
        assert_eq!(err.kind, ToolErrorKind::ProcessNotFound);
        assert_eq!(err.context, Some(Value::from(42)));

        let err: ToolError = BurrowError::InvalidArgument("row".into()).into();
        assert_eq!(err.kind, ToolErrorKind::Validation);

        let err: ToolError = BurrowError::Timeout(Duration::from_secs(2)).into();
        assert!(err.kind.is_retryable());
    }

    #[test]
    fn test_warnings_serialize_only_when_present() {
        let plain = ToolResultEnvelope::success(Value::Null, ToolProvenance::new("t", "h"));
        let json = serde_json::to_value(&plain).unwrap();
        assert!(json.get("warnings").is_none());

        let warned = plain.with_warning(ToolWarning::no_match("nothing matched"));
        assert!(warned.has_warning(NO_MATCH));
        let json = serde_json::to_value(&warned).unwrap();
        assert_eq!(json["warnings"][0]["code"], NO_MATCH);
        assert_eq!(json["result"]["status"], "success");
    }

    #[test]
    fn test_validation_and_policy_errors() {
        let error = ToolError::validation(vec![ValidationError::new("filename", "missing")]);
        assert_eq!(error.kind, ToolErrorKind::Validation);
        assert_eq!(error.message, "Invalid arguments: filename: missing");

        let denied: CapabilitySet = [Capability::Subprocess].into_iter().collect();
        let error = ToolError::capability_denied(&denied);
        assert_eq!(error.message, "Denied by policy: subprocess");
        assert_eq!(error.context, Some(serde_json::json!(["subprocess"])));
    }
}
