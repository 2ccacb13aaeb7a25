//! End-to-end tests: JSON-RPC requests through the MCP server into a real
//! temporary workspace.

use burrow_core::prelude::*;
use burrow_core::tools::BUILTIN_TOOL_NAMES;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn test_config(dir: &TempDir) -> BurrowConfig {
    BurrowConfig::builder()
        .workspace_root(dir.path())
        .runner(RunnerConfig {
            shell: "sh".to_string(),
            python: "sh".to_string(),
            npm: "echo".to_string(),
            command_timeout: Duration::from_secs(5),
            python_timeout: Duration::from_secs(5),
        })
        .build()
}

fn server_with(dir: &TempDir, config: &BurrowConfig) -> McpServer {
    let workspace = Workspace::open(dir.path()).unwrap();
    McpServer::for_workspace(config, workspace).unwrap()
}

fn server(dir: &TempDir) -> McpServer {
    server_with(dir, &test_config(dir))
}

async fn call(server: &McpServer, id: i64, name: &str, arguments: Value) -> Value {
    let request = JsonRpcRequest::new(id, "tools/call")
        .with_params(json!({ "name": name, "arguments": arguments }));
    let response = server.handle_request(request).await.unwrap();
    assert_eq!(response.id, RequestId::Number(id));
    response.result.expect("tool calls answer with a result")
}

fn text(result: &Value) -> &str {
    result["content"][0]["text"].as_str().unwrap()
}

fn tool_names(response: JsonRpcResponse) -> Vec<String> {
    response.result.unwrap()["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|tool| tool["name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_handshake_and_catalogue() {
    let dir = TempDir::new().unwrap();
    let server = server(&dir);

    let init = server
        .handle_request(JsonRpcRequest::new(1i64, "initialize").with_params(json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": { "name": "it", "version": "0" }
        })))
        .await
        .unwrap();
    let result = init.result.unwrap();
    assert_eq!(result["serverInfo"]["name"], "burrow");
    assert!(result["instructions"].as_str().unwrap().contains("Workspace root"));

    let list = server.handle_request(JsonRpcRequest::new(2i64, "tools/list")).await.unwrap();
    assert_eq!(tool_names(list), BUILTIN_TOOL_NAMES.to_vec());
}

#[tokio::test]
async fn test_every_tool_schema_is_an_object() {
    let dir = TempDir::new().unwrap();
    let server = server(&dir);

    let list = server.handle_request(JsonRpcRequest::new(1i64, "tools/list")).await.unwrap();
    for tool in list.result.unwrap()["tools"].as_array().unwrap() {
        assert_eq!(tool["inputSchema"]["type"], "object", "{}", tool["name"]);
        assert!(!tool["description"].as_str().unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_edit_session() {
    let dir = TempDir::new().unwrap();
    let server = server(&dir);

    let written = call(&server, 1, "write_file", json!({"filename": "todo.txt", "content": "a\nb\nc\n"})).await;
    assert!(text(&written).ends_with("created with provided content."));

    call(&server, 2, "insert_file_content", json!({"filename": "todo.txt", "content": "first", "row": 0})).await;
    call(&server, 3, "delete_file_content", json!({"filename": "todo.txt", "substring": "b"})).await;
    call(&server, 4, "update_file_content", json!({"filename": "todo.txt", "content": "C", "row": 3})).await;

    let read = call(&server, 5, "read_file", json!({"filename": "todo.txt"})).await;
    assert_eq!(text(&read), "first\na\n\nC\n");
    assert_eq!(std::fs::read_to_string(dir.path().join("todo.txt")).unwrap(), "first\na\n\nC\n");
}

#[tokio::test]
async fn test_no_match_is_reported_as_text() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.txt"), "x\n").unwrap();
    let server = server(&dir);

    let result = call(&server, 1, "delete_file_content", json!({"filename": "a.txt", "substring": "zzz"})).await;
    assert!(result.get("isError").is_none());
    assert!(text(&result).starts_with("No matching rows or substrings found"));
}

#[tokio::test]
async fn test_escape_attempts_are_errors_not_crashes() {
    let dir = TempDir::new().unwrap();
    let server = server(&dir);

    for (id, args) in [
        (1, json!({"filename": "../../etc/passwd"})),
        (2, json!({"filename": "/etc/passwd"})),
        (3, json!({"filename": "a/../../secret"})),
    ] {
        let result = call(&server, id, "read_file", args).await;
        assert_eq!(result["isError"], true);
        assert!(text(&result).starts_with("Error: Cannot leave the workspace directory"));
    }

    let cd = call(&server, 4, "change_directory", json!({"path": ".."})).await;
    assert_eq!(cd["isError"], true);

    let cwd = call(&server, 5, "current_working_directory", json!({})).await;
    assert_eq!(
        std::fs::canonicalize(text(&cwd)).unwrap(),
        std::fs::canonicalize(dir.path()).unwrap()
    );
}

#[tokio::test]
async fn test_structured_results_are_pretty_json() {
    let dir = TempDir::new().unwrap();
    let server = server(&dir);

    let result = call(&server, 1, "stop_process", json!({"pid": 999_999})).await;
    assert!(result.get("isError").is_none());
    let payload: Value = serde_json::from_str(text(&result)).unwrap();
    assert_eq!(payload, json!({"success": false, "message": "No running process with PID 999999"}));
}

#[tokio::test]
async fn test_denied_capabilities_hide_and_refuse_tools() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.tools = ToolRuntimeConfig::default().with_denied(Capability::Subprocess);
    let server = server_with(&dir, &config);

    let names = tool_names(server.handle_request(JsonRpcRequest::new(1i64, "tools/list")).await.unwrap());
    assert!(!names.iter().any(|n| n == "run_command"));
    assert!(names.iter().any(|n| n == "read_file"));

    let refused = call(&server, 2, "run_command", json!({"command": "echo hi"})).await;
    assert_eq!(refused["isError"], true);
    assert!(text(&refused).contains("subprocess"));
}

#[tokio::test]
async fn test_allowlist_limits_tools() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.server.tool_allowlist = Some(vec!["read_file".to_string(), "list_files".to_string()]);
    let server = server_with(&dir, &config);

    let names = tool_names(server.handle_request(JsonRpcRequest::new(1i64, "tools/list")).await.unwrap());
    assert_eq!(names, vec!["list_files", "read_file"]);

    let response = server
        .handle_request(
            JsonRpcRequest::new(2i64, "tools/call")
                .with_params(json!({"name": "write_file", "arguments": {"filename": "x", "content": ""}})),
        )
        .await
        .unwrap();
    assert_eq!(response.error.unwrap().code, JsonRpcError::UNKNOWN_TOOL);
    assert!(!dir.path().join("x").exists());
}

#[tokio::test]
async fn test_run_loop_over_memory_transport() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.txt"), "hello\n").unwrap();
    let server = Arc::new(server(&dir));

    let mut transport = MemoryTransport::new();
    transport.push_request(JsonRpcRequest::new(1i64, "initialize").with_params(json!({})));
    transport.push_request(JsonRpcRequest::notification("notifications/initialized"));
    transport.push_request(
        JsonRpcRequest::new(2i64, "tools/call")
            .with_params(json!({"name": "read_file", "arguments": {"filename": "a.txt"}})),
    );
    transport.push_line("{\"jsonrpc\": \"2.0\", \"id\": 3");
    transport.push_request(JsonRpcRequest::new(4i64, "tools/list"));

    Arc::clone(&server).run(&mut transport).await.unwrap();

    let responses = transport.responses();
    assert_eq!(responses.len(), 4);
    let read = responses.iter().find(|r| r.id == RequestId::Number(2)).unwrap();
    assert_eq!(read.result.as_ref().unwrap()["content"][0]["text"], "hello\n");
    assert!(responses.iter().any(|r| r.id == RequestId::Null && r.is_error()));
    assert!(server.is_initialized());
}

#[cfg(unix)]
#[tokio::test]
async fn test_background_process_through_protocol() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("app.py"), "# import fastapi\necho up\nsleep 30\n").unwrap();
    let server = server(&dir);

    let started = call(&server, 1, "run_python", json!({"filename": "app.py"})).await;
    let payload: Value = serde_json::from_str(text(&started)).unwrap();
    assert_eq!(payload["success"], true);
    let pid = payload["pid"].as_u64().unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    let logs = call(&server, 2, "check_process_logs", json!({"pid": pid})).await;
    assert!(text(&logs).contains("is running"), "{}", text(&logs));

    let stopped = call(&server, 3, "stop_process", json!({"pid": pid})).await;
    let payload: Value = serde_json::from_str(text(&stopped)).unwrap();
    assert_eq!(payload["success"], true);
}
