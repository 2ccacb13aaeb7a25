//! MCP Server Implementation
//!
//! Reads requests off a [`Transport`], runs each tool call on its own task
//! through the [`ToolRuntime`], and writes responses back as they finish.
//! Notifications are handled inline so a `notifications/cancelled` always
//! sees the call it names.

use super::protocol::*;
use super::transport::{Inbound, Transport};
use crate::config::{BurrowConfig, ServerConfig};
use crate::process::ProcessRegistry;
use crate::runner::CommandRunner;
use crate::tools::{
    ToolContext, ToolRegistry, ToolResult, ToolResultEnvelope, ToolRuntime, builtin_registry,
};
use crate::workspace::Workspace;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// MCP Server configuration
#[derive(Debug, Clone)]
pub struct McpServerConfig {
    /// Server name
    pub name: String,
    /// Server version
    pub version: String,
    /// Tool allowlist (None = expose every registered tool)
    pub tool_allowlist: Option<Vec<String>>,
    /// Free-form usage hints returned from `initialize`
    pub instructions: Option<String>,
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            name: "burrow".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            tool_allowlist: None,
            instructions: None,
        }
    }
}

impl From<&ServerConfig> for McpServerConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            name: config.name.clone(),
            version: config.version.clone(),
            tool_allowlist: config.tool_allowlist.clone(),
            instructions: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelledParams {
    request_id: RequestId,
    #[serde(default)]
    reason: Option<String>,
}

enum Event {
    Incoming(crate::error::Result<Option<Inbound>>),
    Outgoing(JsonRpcResponse),
}

/// MCP Server state
pub struct McpServer {
    config: McpServerConfig,
    tools: ToolRegistry,
    runtime: ToolRuntime,
    in_flight: Mutex<HashMap<RequestId, CancellationToken>>,
    shutdown: CancellationToken,
    initialized: AtomicBool,
}

impl std::fmt::Debug for McpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServer")
            .field("config", &self.config)
            .field("tools", &self.tools)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl McpServer {
    /// Create a new MCP server builder
    pub fn builder() -> McpServerBuilder {
        McpServerBuilder::new()
    }

    /// Assemble the full server for a workspace: built-in tools, process
    /// registry, and the runtime policy from `config`
    pub fn for_workspace(
        config: &BurrowConfig,
        workspace: Workspace,
    ) -> crate::error::Result<Self> {
        let runner = CommandRunner::new(
            Arc::new(workspace),
            ProcessRegistry::new(config.processes.log_tail_lines),
            config.runner.clone(),
        );
        let registry = builtin_registry(&runner)
            .map_err(|e| crate::error::BurrowError::Configuration(e.to_string()))?;

        if let Some(allowlist) = &config.server.tool_allowlist {
            for name in allowlist.iter().filter(|name| !registry.contains(name)) {
                warn!("Allowlisted tool {} does not exist", name);
            }
        }

        Ok(Self::builder()
            .config(McpServerConfig::from(&config.server))
            .instructions(format!(
                "Workspace root: {}. Relative paths resolve against the current directory; \
                 run_command and run_python always start at the root.",
                runner.workspace().root().display()
            ))
            .with_tools(registry)
            .with_runtime(ToolRuntime::from_config(config.tools.clone()))
            .build())
    }

    /// Server configuration
    pub fn config(&self) -> &McpServerConfig {
        &self.config
    }

    /// The exposed tools
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Whether a client has completed `initialize`
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Cancel every in-flight tool call
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Handle an incoming JSON-RPC message
    ///
    /// Returns `None` for notifications.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id.clone() else {
            self.handle_notification(request).await;
            return None;
        };

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(id, request.params),
            "ping" => JsonRpcResponse::success(id, Value::Object(Default::default())),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, request.params).await,
            other => {
                debug!("Unknown method {}", other);
                JsonRpcResponse::error(id, JsonRpcError::method_not_found())
            }
        };
        Some(response)
    }

    async fn handle_notification(&self, request: JsonRpcRequest) {
        match request.method.as_str() {
            "notifications/initialized" | "initialized" => {
                debug!("Client finished initialization");
            }
            "notifications/cancelled" => {
                let params = request
                    .params
                    .and_then(|p| serde_json::from_value::<CancelledParams>(p).ok());
                if let Some(params) = params {
                    if let Some(token) = self.in_flight.lock().await.get(&params.request_id) {
                        info!(
                            request_id = ?params.request_id,
                            reason = params.reason.as_deref().unwrap_or("-"),
                            "Client cancelled tool call"
                        );
                        token.cancel();
                    }
                }
            }
            other => debug!("Ignoring notification {}", other),
        }
    }

    fn handle_initialize(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        let params: InitializeParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::error(
                        id,
                        JsonRpcError::invalid_params(format!("Invalid initialize params: {}", e)),
                    );
                }
            },
            None => InitializeParams::default(),
        };

        if let Some(client) = &params.client_info {
            info!(
                client = %client.name,
                client_version = %client.version,
                protocol = params.protocol_version.as_deref().unwrap_or("-"),
                "Client connected"
            );
        }

        let result = InitializeResult {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability { list_changed: false }),
            },
            server_info: ServerInfo {
                name: self.config.name.clone(),
                version: self.config.version.clone(),
            },
            instructions: self.config.instructions.clone(),
        };

        self.initialized.store(true, Ordering::Release);
        to_response(id, &result)
    }

    fn handle_tools_list(&self, id: RequestId) -> JsonRpcResponse {
        let tools: Vec<McpTool> = self
            .tools
            .mcp_tools_filtered(self.runtime.policy())
            .into_iter()
            .map(McpTool::from)
            .collect();

        to_response(id, &ToolsListResult { tools })
    }

    async fn handle_tools_call(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        let response = self.dispatch_tool_call(id.clone(), params).await;
        self.in_flight.lock().await.remove(&id);
        response
    }

    async fn dispatch_tool_call(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        let params: ToolCallParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::error(
                        id,
                        JsonRpcError::invalid_params(format!("Invalid tool call params: {}", e)),
                    );
                }
            },
            None => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params("Missing tool call params"),
                );
            }
        };

        let Some(tool) = self.tools.get(&params.name).cloned() else {
            warn!("Call to unknown tool {}", params.name);
            return JsonRpcResponse::error(id, JsonRpcError::unknown_tool(&params.name));
        };

        let token = self.track(&id).await;
        let ctx = ToolContext::new()
            .with_trace_id(uuid::Uuid::new_v4().to_string())
            .with_cancellation(token);

        let envelope = self.runtime.execute(tool.as_ref(), params.arguments, &ctx).await;
        to_response(id, &render(&envelope))
    }

    /// Cancellation token for a call, registered under its request id
    async fn track(&self, id: &RequestId) -> CancellationToken {
        self.in_flight
            .lock()
            .await
            .entry(id.clone())
            .or_insert_with(|| self.shutdown.child_token())
            .clone()
    }

    /// Serve until the transport reaches end of input
    ///
    /// Calls still running at end of input are awaited and answered before
    /// returning.
    pub async fn run<T: Transport>(self: Arc<Self>, transport: &mut T) -> crate::error::Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<JsonRpcResponse>();

        loop {
            let event = tokio::select! {
                incoming = transport.receive() => Event::Incoming(incoming),
                Some(response) = rx.recv() => Event::Outgoing(response),
            };

            match event {
                Event::Outgoing(response) => transport.send(response).await?,
                Event::Incoming(Ok(Some(Inbound::Request(request)))) => {
                    if request.is_notification() {
                        self.handle_notification(request).await;
                        continue;
                    }
                    if request.method == "tools/call" {
                        if let Some(id) = &request.id {
                            self.track(id).await;
                        }
                    }

                    let server = Arc::clone(&self);
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        if let Some(response) = server.handle_request(request).await {
                            let _ = tx.send(response);
                        }
                    });
                }
                Event::Incoming(Ok(Some(Inbound::Malformed(reason)))) => {
                    warn!("Discarding malformed message: {}", reason);
                    let error = JsonRpcError::parse_error().with_data(Value::String(reason));
                    transport.send(JsonRpcResponse::error(RequestId::Null, error)).await?;
                }
                Event::Incoming(Ok(None)) => {
                    debug!("Transport closed");
                    break;
                }
                Event::Incoming(Err(e)) => {
                    error!("Transport error: {}", e);
                    break;
                }
            }
        }

        drop(tx);
        while let Some(response) = rx.recv().await {
            transport.send(response).await?;
        }
        Ok(())
    }
}

/// Render an envelope as MCP tool content
///
/// Text results go out verbatim, structured results as pretty JSON, and
/// errors or cancellations as `isError` text.
pub fn render(envelope: &ToolResultEnvelope) -> ToolCallResult {
    match &envelope.result {
        ToolResult::Success { value: Value::String(text) } => ToolCallResult::text(text.clone()),
        ToolResult::Success { value } => ToolCallResult::text(
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
        ),
        ToolResult::Error { error } => ToolCallResult::error(format!("Error: {}", error.message)),
        ToolResult::Cancelled { reason } => ToolCallResult::error(format!("Cancelled: {}", reason)),
    }
}

fn to_response<T: serde::Serialize>(id: RequestId, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(id, JsonRpcError::internal_error(e.to_string())),
    }
}

/// Builder for MCP Server
pub struct McpServerBuilder {
    config: McpServerConfig,
    tools: ToolRegistry,
    runtime: Option<ToolRuntime>,
}

impl McpServerBuilder {
    pub fn new() -> Self {
        Self {
            config: McpServerConfig::default(),
            tools: ToolRegistry::new(),
            runtime: None,
        }
    }

    pub fn config(mut self, config: McpServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.version = version.into();
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.config.instructions = Some(instructions.into());
        self
    }

    pub fn with_tools(mut self, registry: ToolRegistry) -> Self {
        self.tools = registry;
        self
    }

    pub fn with_runtime(mut self, runtime: ToolRuntime) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn with_tool_allowlist(mut self, tools: Vec<String>) -> Self {
        self.config.tool_allowlist = Some(tools);
        self
    }

    pub fn build(self) -> McpServer {
        let mut tools = self.tools;
        if let Some(allowlist) = &self.config.tool_allowlist {
            tools.retain(allowlist);
        }

        McpServer {
            config: self.config,
            tools,
            runtime: self
                .runtime
                .unwrap_or_else(|| ToolRuntime::from_config(Default::default())),
            in_flight: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
            initialized: AtomicBool::new(false),
        }
    }
}

impl Default for McpServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::transport::MemoryTransport;
    use crate::tools::{
        Capability, CapabilityPolicy, CapabilitySet, HandlerTool, ToolError,
        ToolExecutionContext, ToolHandler, ToolMetadata, ToolOutput, ToolSchema,
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        async fn handle(&self, args: Value, _: &ToolExecutionContext) -> Result<ToolOutput, ToolError> {
            match args.get("message").and_then(Value::as_str) {
                Some("fail") => Err(ToolError::execution("asked to fail")),
                Some(message) => Ok(ToolOutput::text(message)),
                None => Ok(ToolOutput::from(json!({"echo": null}))),
            }
        }
    }

    struct Hang;

    #[async_trait]
    impl ToolHandler for Hang {
        async fn handle(&self, _: Value, _: &ToolExecutionContext) -> Result<ToolOutput, ToolError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(ToolOutput::text("woke"))
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(HandlerTool::new(
                ToolMetadata::new("echo", "Echoes back the input"),
                ToolSchema::new(json!({
                    "type": "object",
                    "properties": { "message": { "type": "string" } }
                })),
                Echo,
            )))
            .unwrap();
        registry
            .register(Arc::new(
                HandlerTool::new(ToolMetadata::new("hang", "Never finishes"), ToolSchema::empty(), Hang)
                    .with_capabilities([Capability::Subprocess].into_iter().collect::<CapabilitySet>()),
            ))
            .unwrap();
        registry
    }

    fn server() -> McpServer {
        McpServer::builder().name("test-server").with_tools(registry()).build()
    }

    fn call(id: i64, name: &str, arguments: Value) -> JsonRpcRequest {
        JsonRpcRequest::new(id, "tools/call")
            .with_params(json!({ "name": name, "arguments": arguments }))
    }

    #[tokio::test]
    async fn test_initialize() {
        let server = server();
        let request = JsonRpcRequest::new(1i64, "initialize").with_params(json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": { "name": "test-client", "version": "1.0" }
        }));

        let response = server.handle_request(request).await.unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "test-server");
        assert!(result["capabilities"]["tools"].is_object());
        assert!(server.is_initialized());
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let server = server();
        let response = server
            .handle_request(JsonRpcRequest::notification("notifications/initialized"))
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_tools_list_respects_allowlist_and_policy() {
        let listed = |response: JsonRpcResponse| -> Vec<String> {
            response.result.unwrap()["tools"]
                .as_array()
                .unwrap()
                .iter()
                .map(|t| t["name"].as_str().unwrap().to_string())
                .collect()
        };

        let all = server().handle_request(JsonRpcRequest::new(1i64, "tools/list")).await;
        assert_eq!(listed(all.unwrap()), vec!["echo", "hang"]);

        let allowlisted = McpServer::builder()
            .with_tools(registry())
            .with_tool_allowlist(vec!["hang".to_string()])
            .build();
        let response = allowlisted.handle_request(JsonRpcRequest::new(1i64, "tools/list")).await;
        assert_eq!(listed(response.unwrap()), vec!["hang"]);

        let restricted = McpServer::builder()
            .with_tools(registry())
            .with_runtime(ToolRuntime::new(CapabilityPolicy::deny_many([Capability::Subprocess])))
            .build();
        let response = restricted.handle_request(JsonRpcRequest::new(1i64, "tools/list")).await;
        assert_eq!(listed(response.unwrap()), vec!["echo"]);
    }

    #[tokio::test]
    async fn test_tools_call_renders_text_and_errors() {
        let server = server();

        let ok = server.handle_request(call(1, "echo", json!({"message": "hi"}))).await.unwrap();
        let result = ok.result.unwrap();
        assert_eq!(result["content"][0]["text"], "hi");
        assert!(result.get("isError").is_none());

        let failed = server.handle_request(call(2, "echo", json!({"message": "fail"}))).await.unwrap();
        let result = failed.result.unwrap();
        assert_eq!(result["content"][0]["text"], "Error: asked to fail");
        assert_eq!(result["isError"], true);

        let structured = server.handle_request(call(3, "echo", json!({}))).await.unwrap();
        let text = structured.result.unwrap()["content"][0]["text"].as_str().unwrap().to_string();
        assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), json!({"echo": null}));
    }

    #[tokio::test]
    async fn test_unknown_tool_and_method() {
        let server = server();

        let response = server.handle_request(call(1, "nope", json!({}))).await.unwrap();
        assert_eq!(response.error.unwrap().code, JsonRpcError::UNKNOWN_TOOL);

        let response = server
            .handle_request(JsonRpcRequest::new(2i64, "resources/list"))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, JsonRpcError::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_run_answers_every_request() {
        let server = Arc::new(server());
        let mut transport = MemoryTransport::new();
        transport.push_request(JsonRpcRequest::new(1i64, "ping"));
        transport.push_line("this is not json");
        transport.push_request(JsonRpcRequest::notification("notifications/initialized"));
        transport.push_request(call(2, "echo", json!({"message": "later"})));

        server.run(&mut transport).await.unwrap();

        let responses = transport.responses();
        assert_eq!(responses.len(), 3);
        assert!(responses.iter().any(|r| r.id == RequestId::Null
            && r.error.as_ref().map(|e| e.code) == Some(JsonRpcError::PARSE_ERROR)));
        let echo = responses.iter().find(|r| r.id == RequestId::Number(2)).unwrap();
        assert_eq!(echo.result.as_ref().unwrap()["content"][0]["text"], "later");
    }

    #[tokio::test]
    async fn test_run_forgets_every_finished_call() {
        let server = Arc::new(server());
        let mut transport = MemoryTransport::new();
        transport.push_request(call(1, "nope", json!({})));
        transport.push_request(JsonRpcRequest::new(2i64, "tools/call"));
        transport.push_request(
            JsonRpcRequest::new(3i64, "tools/call").with_params(json!({"arguments": {}})),
        );
        transport.push_request(call(4, "echo", json!({"message": "done"})));

        Arc::clone(&server).run(&mut transport).await.unwrap();

        assert_eq!(transport.responses().len(), 4);
        assert!(server.in_flight.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_notification_stops_call() {
        let server = Arc::new(server());
        let mut transport = MemoryTransport::new();
        transport.push_request(call(7, "hang", json!({})));
        transport.push_request(
            JsonRpcRequest::notification("notifications/cancelled")
                .with_params(json!({"requestId": 7, "reason": "user abort"})),
        );

        tokio::time::timeout(Duration::from_secs(5), server.run(&mut transport))
            .await
            .expect("cancelled call should finish promptly")
            .unwrap();

        let response = transport.pop_response().unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"].as_str().unwrap().starts_with("Cancelled"));
    }
}
