//! End-to-end tests for the public API.
//!
//! HTTP-backed pieces (the `api_call` tool, the Gemini analyzer and the
//! OpenRouter client) talk to an axum server bound to a random local port.

use agent_tools::analysis::{GeminiConfig, GeminiTaskAnalyzer};
use agent_tools::prelude::*;
use agent_tools::tools::api_call::DEFAULT_USER_AGENT;
use axum::{Json, Router};
use axum::extract::Query;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::routing::{any, post};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ── Local axum server ────────────────────────────────────────────────

/// Serve `app` on port 0 and return its base URL.
async fn spawn_test_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Echoes the request back as JSON.
async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: String) -> Json<Value> {
    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "user_agent": header(&headers, "user-agent"),
        "token": header(&headers, "x-token"),
        "body": serde_json::from_str::<Value>(&body).unwrap_or(Value::Null),
    }))
}

/// Echo server with fixed replies on `/fail`, `/plain` and `/empty`.
fn echo_app() -> Router {
    Router::new()
        .route(
            "/fail",
            any(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "boom"})),
                )
            }),
        )
        .route("/plain", any(|| async { "hello there" }))
        .route("/empty", any(|| async { StatusCode::OK }))
        .fallback(echo)
}

fn api_manager() -> ToolManager {
    ToolManager::new().with("api_call", ApiCallTool::new(reqwest::Client::new()))
}

// ── Registry contract ────────────────────────────────────────────────

#[tokio::test]
async fn registered_tools_return_their_own_results() {
    let mut manager = ToolManager::new();
    for i in 0..5 {
        manager.register_tool(
            format!("tool{i}"),
            FnTool::new(move |_| async move { ToolCallResult::ok(json!({ "id": i })) }),
        );
    }
    assert_eq!(manager.len(), 5);
    for i in 0..5 {
        let result = manager.execute_tool(&format!("tool{i}"), &json!({})).await;
        assert_eq!(result, ToolCallResult::ok(json!({ "id": i })));
    }
}

#[tokio::test]
async fn echo_tool_returns_params() {
    let manager = ToolManager::new().with(
        "echo",
        FnTool::new(|params| async move { ToolCallResult::ok(params) }),
    );
    let result = manager.execute_tool("echo", &json!({"x": 1})).await;
    assert!(result.success);
    assert_eq!(result.result, json!({"x": 1}));
    assert_eq!(result.error, None);
}

#[tokio::test]
async fn empty_manager_reports_unknown_tool() {
    let result = ToolManager::new().execute_tool("missing", &json!({})).await;
    assert_eq!(
        result.to_json_string(),
        r#"{"success":false,"result":null,"error":"unknown tool: missing"}"#
    );
}

#[tokio::test]
async fn last_registration_wins() {
    let manager = ToolManager::new()
        .with("t", FnTool::new(|_| async { ToolCallResult::ok("old") }))
        .with("t", FnTool::new(|_| async { ToolCallResult::ok("new") }));
    assert_eq!(manager.names(), vec!["t"]);
    assert_eq!(
        manager.execute_tool("t", &json!({})).await.result,
        json!("new")
    );
}

// ── LLM service ──────────────────────────────────────────────────────

#[tokio::test]
async fn selected_role_prompt_reaches_backend() {
    let seen: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let caller = FnCaller::new(move |call: LlmCall| {
        sink.lock().unwrap().push(call.system_prompt.clone());
        async move { Ok(format!("handled: {}", call.prompt)) }
    });
    let roles = HashMap::from([
        ("default".to_string(), RoleConfig::new("generic")),
        ("reviewer".to_string(), RoleConfig::new("You review Rust code.")),
    ]);
    let mut service = LlmService::new(caller, roles);

    service
        .process_chat_request(&ChatRequest::from_user("one"))
        .await
        .unwrap();
    service.set_current_role("reviewer").unwrap();
    let reply = service
        .process_chat_request(&ChatRequest::from_user("two"))
        .await
        .unwrap();

    assert_eq!(reply.raw_response, "handled: two");
    assert_eq!(
        *seen.lock().unwrap(),
        vec!["generic".to_string(), "You review Rust code.".to_string()]
    );
}

// ── api_call against a local server ──────────────────────────────────

#[tokio::test]
async fn api_call_get_sends_query_and_default_agent() {
    let base = spawn_test_server(echo_app()).await;
    let result = api_manager()
        .execute_tool(
            "api_call",
            &json!({
                "url": format!("{base}/items"),
                "method": "get",
                "params": {"q": "rust", "page": 2}
            }),
        )
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.result["method"], "GET");
    assert_eq!(result.result["path"], "/items");
    assert_eq!(result.result["query"], "page=2&q=rust");
    assert_eq!(result.result["user_agent"], DEFAULT_USER_AGENT);
}

#[tokio::test]
async fn api_call_post_sends_json_body_and_headers() {
    let base = spawn_test_server(echo_app()).await;
    let result = api_manager()
        .execute_tool(
            "api_call",
            &json!({
                "url": format!("{base}/items"),
                "method": "POST",
                "headers": {"X-Token": "abc", "User-Agent": "custom/1.0"},
                "body": {"name": "widget"}
            }),
        )
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.result["body"], json!({"name": "widget"}));
    assert_eq!(result.result["token"], "abc");
    assert_eq!(result.result["user_agent"], "custom/1.0");
    assert_eq!(result.result["method"], "POST");
    assert_eq!(result.result["query"], Value::Null);
}

#[tokio::test]
async fn api_call_reports_http_errors() {
    let base = spawn_test_server(echo_app()).await;
    let result = api_manager()
        .execute_tool(
            "api_call",
            &json!({"url": format!("{base}/fail"), "method": "GET"}),
        )
        .await;
    assert!(!result.success);
    assert!(
        result
            .error
            .as_deref()
            .unwrap()
            .starts_with("request failed: HTTP 500")
    );
}

#[tokio::test]
async fn api_call_wraps_text_and_empty_bodies() {
    let base = spawn_test_server(echo_app()).await;
    let manager = api_manager();

    let text = manager
        .execute_tool(
            "api_call",
            &json!({"url": format!("{base}/plain"), "method": "GET"}),
        )
        .await;
    assert_eq!(text.result, json!({"text": "hello there"}));

    let empty = manager
        .execute_tool(
            "api_call",
            &json!({"url": format!("{base}/empty"), "method": "DELETE"}),
        )
        .await;
    assert_eq!(empty.result, json!({}));
}

#[tokio::test]
async fn api_call_validation_goes_through_manager() {
    let result = api_manager()
        .execute_tool("api_call", &json!({"url": "http://127.0.0.1:9"}))
        .await;
    assert_eq!(
        result.error.as_deref(),
        Some("invalid parameters: missing required parameters: method")
    );
    assert_eq!(result.details.unwrap()["tool"], "api_call");
}

// ── Parse-then-dispatch flows ─────────────────────────────────────────

#[tokio::test]
async fn model_reply_drives_file_tools() {
    let dir = tempfile::tempdir().unwrap();
    let reply = r#"I'll create both files.
```json
{"tool_calls": [
  {"tool_name": "file_operation", "parameters": {"operation": "create", "path": "a.txt", "content": "alpha"}},
  {"tool_name": "file_operation", "parameters": {"operation": "create", "path": "docs/b.txt", "content": "beta"}},
  {"tool_name": "shell", "parameters": {"cmd": "rm -rf /"}}
]}
```"#;
    let caller = FnCaller::new(move |_| async move { Ok(reply.to_string()) });
    let service = LlmService::new(caller, agent_tools::llm::default_roles());
    let manager = ToolManager::new().with("file_operation", FileOperationTool::new(dir.path()));

    let response = service
        .process_chat_request(&ChatRequest::from_user("make files"))
        .await
        .unwrap();
    let parsed = DefaultResponseParser.parse(&response.raw_response);
    assert_eq!(parsed.thought, "I'll create both files.");

    let results = manager.execute_calls(&parsed.tool_calls.unwrap()).await;
    assert!(results[0].success);
    assert!(results[1].success);
    assert_eq!(results[2].error.as_deref(), Some("unknown tool: shell"));

    assert_eq!(
        std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
        "alpha"
    );
    assert_eq!(
        std::fs::read_to_string(dir.path().join("docs/b.txt")).unwrap(),
        "beta"
    );
}

#[tokio::test]
async fn api_parser_output_executes_against_server() {
    let base = spawn_test_server(echo_app()).await;
    let reply = format!(
        "Checking the inventory.\n```json\n{{\"tool_calls\": [{{\"tool_name\": \"api_call\", \
         \"parameters\": {{\"url\": \"{base}/inventory\", \"method\": \"GET\"}}}}]}}\n```"
    );
    let parsed = ApiCallResponseParser.parse(&reply);
    assert_eq!(parsed.thought, "Checking the inventory.");
    let params = parsed.api_call.clone().unwrap();

    let result = api_manager().execute_tool("api_call", &params).await;
    assert_eq!(result.result["method"], "GET");
    assert_eq!(result.result["path"], "/inventory");
    assert_eq!(result.result["query"], Value::Null);
}

// ── OpenRouter client against a local server ─────────────────────────

/// Chat-completions stand-in. Replies with the received request body as the
/// message content; the model name selects the failure modes.
async fn completions(headers: HeaderMap, Json(request): Json<Value>) -> (StatusCode, Json<Value>) {
    if header(&headers, "authorization").as_deref() != Some("Bearer test-key") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"message": "invalid key"}})),
        );
    }
    let reply = match request["model"].as_str() {
        Some("broken/model") => json!({"error": {"message": "model unavailable"}}),
        Some("empty/model") => json!({"choices": []}),
        _ => json!({
            "choices": [{"message": {"role": "assistant", "content": request.to_string()}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        }),
    };
    (StatusCode::OK, Json(reply))
}

async fn openrouter_service(key: &str, roles: HashMap<String, RoleConfig>) -> LlmService {
    let base = spawn_test_server(Router::new().route("/v1/chat/completions", post(completions)))
        .await;
    let client = OpenRouterClient::new(key)
        .unwrap()
        .with_url(format!("{base}/v1/chat/completions"));
    LlmService::new(client, roles)
}

#[tokio::test]
async fn openrouter_sends_role_settings_and_defaults() {
    let roles = HashMap::from([
        ("default".to_string(), RoleConfig::new("generic")),
        (
            "coder".to_string(),
            RoleConfig::new("Write Rust.")
                .with_model("x/coder")
                .with_temperature(0.25)
                .with_max_tokens(50),
        ),
    ]);
    let mut service = openrouter_service("test-key", roles).await;

    let reply = service
        .process_chat_request(&ChatRequest::from_user("hello"))
        .await
        .unwrap();
    let sent: Value = serde_json::from_str(&reply.raw_response).unwrap();
    assert_eq!(sent["model"], "openai/gpt-4o-mini");
    assert_eq!(sent["max_tokens"], 4096);
    assert!((sent["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    assert_eq!(
        sent["messages"],
        json!([
            {"role": "system", "content": "generic"},
            {"role": "user", "content": "hello"}
        ])
    );

    service.set_current_role("coder").unwrap();
    let reply = service
        .process_chat_request(&ChatRequest::from_user("fn main"))
        .await
        .unwrap();
    let sent: Value = serde_json::from_str(&reply.raw_response).unwrap();
    assert_eq!(sent["model"], "x/coder");
    assert_eq!(sent["max_tokens"], 50);
    assert_eq!(sent["temperature"], 0.25);
    assert_eq!(sent["messages"][0]["content"], "Write Rust.");
}

#[tokio::test]
async fn openrouter_reports_http_status() {
    let service = openrouter_service("wrong-key", agent_tools::llm::default_roles()).await;
    let err = service
        .process_chat_request(&ChatRequest::from_user("hi"))
        .await
        .unwrap_err();
    assert!(err.starts_with("OpenRouter API HTTP 401"), "{err}");
    assert!(err.contains("invalid key"), "{err}");
}

#[tokio::test]
async fn openrouter_maps_error_body_and_missing_choices() {
    let roles = HashMap::from([
        (
            "default".to_string(),
            RoleConfig::new("s").with_model("broken/model"),
        ),
        (
            "empty".to_string(),
            RoleConfig::new("s").with_model("empty/model"),
        ),
    ]);
    let mut service = openrouter_service("test-key", roles).await;

    let err = service
        .process_chat_request(&ChatRequest::from_user("hi"))
        .await
        .unwrap_err();
    assert_eq!(err, "OpenRouter API error: model unavailable");

    service.set_current_role("empty").unwrap();
    let err = service
        .process_chat_request(&ChatRequest::from_user("hi"))
        .await
        .unwrap_err();
    assert_eq!(err, "OpenRouter API returned no choices");
}

// ── Analysis ──────────────────────────────────────────────────────────

/// Gemini `generateContent` stand-in. Answers COMPLETED for the analyzer's
/// short-verdict requests and rejects any key but `test-key`.
async fn gemini(
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    body: String,
) -> (StatusCode, Json<Value>) {
    if !uri.path().ends_with(":generateContent")
        || query.get("key").map(String::as_str) != Some("test-key")
    {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"error": {"message": "bad key"}})),
        );
    }
    let request: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    let verdict = if request["generationConfig"]["maxOutputTokens"] == 100 {
        "COMPLETED"
    } else {
        "CONTINUE"
    };
    (
        StatusCode::OK,
        Json(json!({
            "candidates": [{ "content": { "role": "model", "parts": [{ "text": verdict }] } }]
        })),
    )
}

fn gemini_app() -> Router {
    Router::new().fallback(gemini)
}

#[tokio::test]
async fn gemini_analyzer_uses_api_verdict() {
    let base = spawn_test_server(gemini_app()).await;
    let analyzer = GeminiTaskAnalyzer::new(
        GeminiConfig::default()
            .with_api_key("test-key")
            .with_base_url(base),
    )
    .unwrap();
    assert!(!analyzer.is_heuristic());

    let history = vec![Exchange::new("What is a trait?", "A trait is...")];
    assert_eq!(
        analyzer.analyze(&history, "A trait is...").await,
        TaskStatus::Completed
    );
}

#[tokio::test]
async fn gemini_api_errors_mean_continue() {
    let base = spawn_test_server(gemini_app()).await;
    let analyzer = GeminiTaskAnalyzer::new(
        GeminiConfig::default()
            .with_api_key("wrong-key")
            .with_base_url(base),
    )
    .unwrap();
    let history = vec![Exchange::new("q", "a")];
    assert_eq!(analyzer.analyze(&history, "a").await, TaskStatus::Continue);
}

#[tokio::test]
async fn analyzer_and_generator_defaults_cooperate() {
    let history = vec![
        Exchange::new("How do I read a file?", "Use std::fs."),
        Exchange::new("Show me", "First, open the file..."),
    ];
    let last = "First, open the file with tokio::fs";
    let status = default_analyzer().analyze(&history, last).await;
    assert_eq!(status, TaskStatus::Continue);

    let followup = default_generator()
        .generate(status, &history, last)
        .await
        .unwrap();
    assert!(followup.contains("explanation"));
}
