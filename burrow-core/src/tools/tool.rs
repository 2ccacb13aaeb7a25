//! Tool trait and metadata definitions
//!
//! Each tool declares its capabilities and parameter schema. Most built-in
//! tools implement the smaller [`ToolHandler`] trait and are wrapped in a
//! [`HandlerTool`], which fills in provenance.

use super::capability::CapabilitySet;
use super::result::{ToolError, ToolProvenance, ToolResultEnvelope, ToolWarning, ValidationError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Tool metadata shown in listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetadata {
    /// Tool name (unique identifier)
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// What the tool returns
    pub returns: String,

    /// Tags for categorization
    pub tags: Vec<String>,
}

impl ToolMetadata {
    /// Create new metadata with required fields
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            returns: "Status text".to_string(),
            tags: Vec::new(),
        }
    }

    /// Set return description
    pub fn with_returns(mut self, returns: impl Into<String>) -> Self {
        self.returns = returns.into();
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// JSON Schema for tool parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// JSON Schema for input parameters
    pub parameters: Value,
}

impl ToolSchema {
    /// Create a schema from a JSON Schema value
    pub fn new(parameters: Value) -> Self {
        Self { parameters }
    }

    /// Create an empty schema (tool takes no parameters)
    pub fn empty() -> Self {
        Self::new(serde_json::json!({
            "type": "object",
            "properties": {}
        }))
    }

    /// Names listed under `required`
    pub fn required(&self) -> Vec<&str> {
        self.parameters
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// Context provided to tool execution
#[derive(Debug, Clone, Default)]
pub struct ToolExecutionContext {
    /// Trace ID for correlation
    pub trace_id: Option<String>,
}

impl ToolExecutionContext {
    /// Create a new context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set trace ID
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }
}

/// Core tool trait
///
/// The runtime checks the capability policy and calls `validate` before
/// `execute`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get tool metadata
    fn metadata(&self) -> &ToolMetadata;

    /// Get tool name (convenience method)
    fn name(&self) -> &str {
        &self.metadata().name
    }

    /// Get tool description (convenience method)
    fn description(&self) -> &str {
        &self.metadata().description
    }

    /// Get the JSON schema for this tool's parameters
    fn schema(&self) -> ToolSchema;

    /// Get required capabilities
    fn required_capabilities(&self) -> CapabilitySet {
        CapabilitySet::new()
    }

    /// Validate input arguments before execution.
    ///
    /// The default checks that arguments form an object carrying every
    /// schema-required field.
    fn validate(&self, args: &Value) -> Result<(), Vec<ValidationError>> {
        let empty = serde_json::Map::new();
        let object = match args {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => return Err(vec![ValidationError::new("", "arguments must be an object")]),
        };

        let missing: Vec<ValidationError> = self
            .schema()
            .required()
            .into_iter()
            .filter(|field| object.get(*field).is_none_or(Value::is_null))
            .map(|field| ValidationError::new(field, "is required"))
            .collect();

        if missing.is_empty() { Ok(()) } else { Err(missing) }
    }

    /// Execute the tool with given arguments
    async fn execute(
        &self,
        args: Value,
        ctx: &ToolExecutionContext,
    ) -> Result<ToolResultEnvelope, ToolError>;
}

/// Payload returned by a [`ToolHandler`]
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Result value
    pub value: Value,
    /// Non-fatal warnings
    pub warnings: Vec<ToolWarning>,
}

impl ToolOutput {
    /// Plain text result
    pub fn text(text: impl Into<String>) -> Self {
        Self::from(Value::String(text.into()))
    }

    /// Serialize a structured result
    pub fn json<T: Serialize>(value: &T) -> Result<Self, ToolError> {
        serde_json::to_value(value)
            .map(Self::from)
            .map_err(|e| ToolError::internal(e.to_string()))
    }

    /// Attach a warning
    pub fn with_warning(mut self, warning: ToolWarning) -> Self {
        self.warnings.push(warning);
        self
    }
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }
}

/// Handler trait for simpler tool implementations
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Execute and return a result payload
    async fn handle(&self, args: Value, ctx: &ToolExecutionContext)
    -> Result<ToolOutput, ToolError>;
}

/// Wrapper to convert a ToolHandler into a full Tool
pub struct HandlerTool<H: ToolHandler> {
    metadata: ToolMetadata,
    schema: ToolSchema,
    capabilities: CapabilitySet,
    handler: H,
}

impl<H: ToolHandler> HandlerTool<H> {
    /// Create a new handler tool
    pub fn new(metadata: ToolMetadata, schema: ToolSchema, handler: H) -> Self {
        Self {
            metadata,
            schema,
            capabilities: CapabilitySet::new(),
            handler,
        }
    }

    /// Set required capabilities
    pub fn with_capabilities(mut self, caps: CapabilitySet) -> Self {
        self.capabilities = caps;
        self
    }
}

#[async_trait]
impl<H: ToolHandler + 'static> Tool for HandlerTool<H> {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn schema(&self) -> ToolSchema {
        self.schema.clone()
    }

    fn required_capabilities(&self) -> CapabilitySet {
        self.capabilities.clone()
    }

    async fn execute(
        &self,
        args: Value,
        ctx: &ToolExecutionContext,
    ) -> Result<ToolResultEnvelope, ToolError> {
        let started_at = chrono::Utc::now();
        let args_hash = args_hash(&args);

        let result = self.handler.handle(args, ctx).await;

        let duration = (chrono::Utc::now() - started_at)
            .to_std()
            .unwrap_or_default();

        let mut provenance = ToolProvenance::new(&self.metadata.name, args_hash).with_duration(duration);
        if let Some(ref trace_id) = ctx.trace_id {
            provenance = provenance.with_trace_id(trace_id);
        }

        match result {
            Ok(output) => {
                let mut envelope = ToolResultEnvelope::success(output.value, provenance);
                envelope.warnings = output.warnings;
                Ok(envelope)
            }
            Err(error) => Ok(ToolResultEnvelope::error(error, provenance)),
        }
    }
}

/// Type alias for boxed tools
pub type BoxedTool = Arc<dyn Tool>;

/// First 16 hex digits of the SHA-256 of the serialized arguments
pub fn args_hash(args: &Value) -> String {
    let args_json = serde_json::to_string(args).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(args_json.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// Deserialize tool arguments into a typed struct.
///
/// A missing argument object is treated as `{}`.
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    let args = match args {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other,
    };
    serde_json::from_value(args)
        .map_err(|e| ToolError::validation(vec![ValidationError::new("", e.to_string())]))
}

#[cfg(test)]
mod tool_tests {
    use super::*;
    use crate::tools::ToolErrorKind;

    #[derive(Debug, Deserialize)]
    struct EchoArgs {
        message: String,
    }

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        async fn handle(
            &self,
            args: Value,
            _ctx: &ToolExecutionContext,
        ) -> Result<ToolOutput, ToolError> {
            let args: EchoArgs = parse_args(args)?;
            Ok(ToolOutput::text(args.message))
        }
    }

    fn echo_tool() -> HandlerTool<Echo> {
        HandlerTool::new(
            ToolMetadata::new("echo", "Echoes input back"),
            ToolSchema::new(serde_json::json!({
                "type": "object",
                "properties": { "message": { "type": "string" } },
                "required": ["message"]
            })),
            Echo,
        )
    }

    #[tokio::test]
    async fn test_handler_tool_fills_provenance() {
        let tool = echo_tool();
        let ctx = ToolExecutionContext::new().with_trace_id("trace-1");
        let args = serde_json::json!({ "message": "hello" });

        let envelope = tool.execute(args.clone(), &ctx).await.unwrap();

        assert!(envelope.is_success());
        assert_eq!(envelope.value().unwrap(), &serde_json::json!("hello"));
        assert_eq!(envelope.provenance.tool_name, "echo");
        assert_eq!(envelope.provenance.trace_id.as_deref(), Some("trace-1"));
        assert_eq!(envelope.provenance.args_hash, args_hash(&args));
        assert_eq!(envelope.provenance.args_hash.len(), 16);
    }

    #[test]
    fn test_default_validation_checks_required() {
        let tool = echo_tool();
        assert!(tool.validate(&serde_json::json!({"message": "x"})).is_ok());

        let errors = tool.validate(&serde_json::json!({})).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "message");

        assert!(tool.validate(&serde_json::json!({"message": null})).is_err());
        assert!(tool.validate(&serde_json::json!([1, 2])).is_err());
    }

    #[test]
    fn test_parse_args_type_error() {
        let err = parse_args::<EchoArgs>(serde_json::json!({"message": 3})).unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::Validation);
    }
}
