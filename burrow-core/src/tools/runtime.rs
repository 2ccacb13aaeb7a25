//! Tool runtime with safety enforcement
//!
//! The runtime wraps every tool call with:
//! - Capability policy enforcement
//! - Argument validation
//! - A caller deadline and cancellation
//!
//! Deadlines stop the caller from waiting; a synchronous child spawned with
//! `kill_on_drop` dies with the abandoned future, detached processes keep
//! running.

use super::capability::{Capability, CapabilityPolicy};
use super::result::{
    PolicyDecision, ToolError, ToolErrorKind, ToolProvenance, ToolResult, ToolResultEnvelope,
};
use super::tool::{Tool, ToolExecutionContext, args_hash};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Context for tool execution (passed through runtime)
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Trace ID for correlation
    pub trace_id: Option<String>,

    /// Cancellation token
    pub cancellation: Option<CancellationToken>,
}

impl ToolContext {
    /// Create a new context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set trace ID
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Set cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Check if cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .map(|t| t.is_cancelled())
            .unwrap_or(false)
    }

    /// Convert to tool execution context
    pub fn to_execution_context(&self) -> ToolExecutionContext {
        ToolExecutionContext {
            trace_id: self.trace_id.clone(),
        }
    }
}

/// Runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolRuntimeConfig {
    /// Default deadline for a tool call
    #[serde(with = "humantime_serde")]
    pub default_timeout: Duration,

    /// Per-tool deadline overrides
    pub tool_timeouts: HashMap<String, humantime_serde::Serde<Duration>>,

    /// Capabilities refused for every call
    pub deny: Vec<Capability>,
}

impl Default for ToolRuntimeConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(300),
            tool_timeouts: HashMap::new(),
            deny: Vec::new(),
        }
    }
}

impl ToolRuntimeConfig {
    /// Create a config with a specific timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Add a tool-specific timeout
    pub fn with_tool_timeout(mut self, tool_name: impl Into<String>, timeout: Duration) -> Self {
        self.tool_timeouts.insert(tool_name.into(), timeout.into());
        self
    }

    /// Deny a capability
    pub fn with_denied(mut self, cap: Capability) -> Self {
        self.deny.push(cap);
        self
    }

    /// Capability policy described by the deny list
    pub fn policy(&self) -> CapabilityPolicy {
        CapabilityPolicy::deny_many(self.deny.iter().copied())
    }
}

/// Tool runtime with safety enforcement
#[derive(Debug, Clone)]
pub struct ToolRuntime {
    policy: CapabilityPolicy,
    config: ToolRuntimeConfig,
}

impl ToolRuntime {
    /// Create a new runtime with the given policy
    pub fn new(policy: CapabilityPolicy) -> Self {
        Self::with_config(policy, ToolRuntimeConfig::default())
    }

    /// Create a runtime with custom configuration
    pub fn with_config(policy: CapabilityPolicy, config: ToolRuntimeConfig) -> Self {
        Self { policy, config }
    }

    /// Create a runtime whose policy comes from the config's deny list
    pub fn from_config(config: ToolRuntimeConfig) -> Self {
        Self::with_config(config.policy(), config)
    }

    /// Get the capability policy
    pub fn policy(&self) -> &CapabilityPolicy {
        &self.policy
    }

    /// Get the runtime config
    pub fn config(&self) -> &ToolRuntimeConfig {
        &self.config
    }

    /// Get timeout for a specific tool
    fn get_timeout(&self, tool_name: &str) -> Duration {
        self.config
            .tool_timeouts
            .get(tool_name)
            .map(|d| **d)
            .unwrap_or(self.config.default_timeout)
    }

    /// Execute a tool with all safety checks
    pub async fn execute(
        &self,
        tool: &dyn Tool,
        args: Value,
        ctx: &ToolContext,
    ) -> ToolResultEnvelope {
        let started_at = chrono::Utc::now();
        let tool_name = tool.name().to_string();

        let mut provenance = ToolProvenance::new(&tool_name, args_hash(&args));
        if let Some(ref trace_id) = ctx.trace_id {
            provenance = provenance.with_trace_id(trace_id);
        }

        if ctx.is_cancelled() {
            return ToolResultEnvelope::cancelled("Cancelled before execution", provenance);
        }

        let required = tool.required_capabilities();
        match self.policy.check_all(&required) {
            Ok(()) => {
                provenance = provenance.with_policy_decision(
                    PolicyDecision::new("capability_check", true)
                        .with_reason("All required capabilities allowed"),
                );
            }
            Err(denied) => {
                warn!("Tool {} refused, denied capabilities: {}", tool_name, denied);
                provenance = provenance.with_policy_decision(
                    PolicyDecision::new("capability_check", false)
                        .with_reason(format!("Denied capabilities: {}", denied)),
                );
                return ToolResultEnvelope::error(ToolError::capability_denied(&denied), provenance);
            }
        }

        if let Err(validation_errors) = tool.validate(&args) {
            debug!("Tool {} rejected arguments", tool_name);
            return ToolResultEnvelope::error(ToolError::validation(validation_errors), provenance);
        }

        let tool_timeout = self.get_timeout(&tool_name);
        let exec_ctx = ctx.to_execution_context();
        let execution = tool.execute(args, &exec_ctx);

        let result = if let Some(ref cancel_token) = ctx.cancellation {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    Err(ToolError::new(ToolErrorKind::Cancelled, "Execution cancelled"))
                }
                res = timeout(tool_timeout, execution) => flatten(res, tool_timeout),
            }
        } else {
            flatten(timeout(tool_timeout, execution).await, tool_timeout)
        };

        let duration = (chrono::Utc::now() - started_at)
            .to_std()
            .unwrap_or_default();
        provenance = provenance.with_duration(duration);

        let envelope = match result {
            Ok(mut envelope) => {
                envelope.provenance.policy_decisions.extend(provenance.policy_decisions);
                envelope.provenance.started_at = provenance.started_at;
                envelope.provenance.duration = duration;
                envelope.provenance.trace_id = provenance.trace_id;
                envelope
            }
            Err(error) if error.kind == ToolErrorKind::Cancelled => {
                ToolResultEnvelope::cancelled(error.message, provenance)
            }
            Err(error) => ToolResultEnvelope::error(error, provenance),
        };

        info!(
            tool = %tool_name,
            trace_id = envelope.provenance.trace_id.as_deref().unwrap_or("-"),
            duration_ms = duration.as_millis() as u64,
            success = envelope.is_success(),
            "Tool call finished"
        );

        envelope
    }

    /// Execute a tool and return just the value on success
    pub async fn execute_simple(
        &self,
        tool: &dyn Tool,
        args: Value,
        ctx: &ToolContext,
    ) -> Result<Value, ToolError> {
        let envelope = self.execute(tool, args, ctx).await;
        match envelope.result {
            ToolResult::Success { value } => Ok(value),
            ToolResult::Error { error } => Err(error),
            ToolResult::Cancelled { reason } => Err(ToolError::new(ToolErrorKind::Cancelled, reason)),
        }
    }
}

fn flatten(
    res: Result<Result<ToolResultEnvelope, ToolError>, tokio::time::error::Elapsed>,
    tool_timeout: Duration,
) -> Result<ToolResultEnvelope, ToolError> {
    match res {
        Ok(inner) => inner,
        Err(_) => Err(ToolError::timeout(tool_timeout)),
    }
}
