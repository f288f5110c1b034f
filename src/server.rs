//! MCP server implementation for Quire.
//!
//! This module provides the MCP server that handles tool requests and
//! manages communication via STDIO or SSE transports.

use crate::config::BlogConfig;
use crate::tools::fetch::FetchClient;
use crate::tools::post::{PostContentTool, validate_title};
use crate::tools::search::{PostSearch, SerpApiClient};
use crate::types::{
    GetPostContentArgs, QuireError, QuireResult, SearchPostsArgs, get_post_content_args_schema,
    search_posts_args_schema,
};
use crate::VERSION;
use axum::{
    Json, Router,
    extract::State,
    response::sse::{Event, Sse},
    routing::{get, post},
};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, instrument, warn};

/// MCP Protocol version
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Name of the post content tool
pub const GET_POST_CONTENT_TOOL: &str = "get_post_content";

/// Name of the search tool
pub const SEARCH_POSTS_TOOL: &str = "search_posts";

/// Transport type for the MCP server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportType {
    /// Standard input/output transport
    #[default]
    Stdio,
    /// Server-Sent Events over HTTP
    Sse {
        /// Port to listen on
        port: u16,
        /// Host to bind to
        host: [u8; 4],
    },
}

/// JSON-RPC 2.0 Request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Request ID (None for notifications)
    pub id: Option<Value>,
    /// Method name
    pub method: String,
    /// Method parameters
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Request ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Success result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 Error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Additional error data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: None,
            }),
        }
    }

    /// Create a `tools/call` result carrying a single text block
    pub fn tool_text(id: Option<Value>, text: String, is_error: bool) -> Self {
        Self::success(
            id,
            json!({
                "content": [{ "type": "text", "text": text }],
                "isError": is_error
            }),
        )
    }
}

/// MCP Tool definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpTool {
    /// Tool name
    pub name: String,
    /// Tool description
    pub description: Option<String>,
    /// JSON Schema for input
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Tool handler implementation
#[derive(Clone)]
pub struct QuireHandler {
    /// Name reported in `serverInfo`
    server_name: String,

    /// Post content tool
    posts: Arc<PostContentTool>,

    /// Search tool
    search: Arc<PostSearch>,
}

impl QuireHandler {
    /// Create a handler from resolved configuration
    pub fn new(config: &BlogConfig) -> QuireResult<Self> {
        let posts = PostContentTool::new(FetchClient::new()?, &config.base_url, config.scan_policy);
        let provider = Arc::new(SerpApiClient::new(&config.search_endpoint)?);
        let search = PostSearch::new(provider, &config.base_url, &config.serpapi_key);

        Ok(Self::with_tools(&config.server_name, posts, search))
    }

    /// Create a handler around already-built tools
    pub fn with_tools(server_name: &str, posts: PostContentTool, search: PostSearch) -> Self {
        Self {
            server_name: server_name.to_string(),
            posts: Arc::new(posts),
            search: Arc::new(search),
        }
    }

    /// Get server information for initialization
    pub fn get_server_info(&self) -> Value {
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": self.server_name,
                "version": VERSION
            }
        })
    }

    /// List available tools
    pub fn list_tools(&self) -> Vec<McpTool> {
        vec![
            McpTool {
                name: GET_POST_CONTENT_TOOL.to_string(),
                description: Some(
                    "Get the full markdown content of a blog post by its title. A distinctive part of the title is enough."
                        .to_string(),
                ),
                input_schema: get_post_content_args_schema(),
            },
            McpTool {
                name: SEARCH_POSTS_TOOL.to_string(),
                description: Some(
                    "Search through the blog's posts for content matching the query. Returns titles, links and snippets."
                        .to_string(),
                ),
                input_schema: search_posts_args_schema(),
            },
        ]
    }

    /// Execute the post content tool
    #[instrument(skip(self))]
    pub async fn execute_get_post_content(&self, args: GetPostContentArgs) -> String {
        self.posts.get_post_content(&args.title).await
    }

    /// Execute the search tool
    #[instrument(skip(self))]
    pub async fn execute_search_posts(&self, args: SearchPostsArgs) -> String {
        self.search.search_posts(&args.query).await
    }

    /// Handle a JSON-RPC request
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        debug!(method = %request.method, "Handling request");

        match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(request.id, self.get_server_info()),

            "initialized" | "notifications/initialized" => {
                JsonRpcResponse::success(request.id, json!({}))
            },

            "tools/list" => {
                let tools = self.list_tools();
                JsonRpcResponse::success(request.id, json!({ "tools": tools }))
            },

            "tools/call" => {
                let params = match request.params {
                    Some(p) => p,
                    None => {
                        return JsonRpcResponse::error(
                            request.id,
                            -32602,
                            "Missing parameters".to_string(),
                        );
                    },
                };

                let tool_name = params
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

                self.call_tool(request.id, tool_name, arguments).await
            },

            "ping" => JsonRpcResponse::success(request.id, json!({})),

            _ => JsonRpcResponse::error(
                request.id,
                -32601,
                format!("Method not found: {}", request.method),
            ),
        }
    }

    /// Call a specific tool
    async fn call_tool(&self, id: Option<Value>, name: &str, arguments: Value) -> JsonRpcResponse {
        info!(tool = %name, "Executing tool");

        match name {
            GET_POST_CONTENT_TOOL => {
                let args: GetPostContentArgs = match serde_json::from_value(arguments) {
                    Ok(a) => a,
                    Err(e) => {
                        return JsonRpcResponse::error(
                            id,
                            -32602,
                            format!("Invalid get_post_content arguments: {}", e),
                        );
                    },
                };

                if let Err(e) = validate_title(&args.title) {
                    warn!(error = %e, "Rejected tool arguments");
                    return JsonRpcResponse::tool_text(id, e.to_string(), true);
                }

                let text = self.execute_get_post_content(args).await;
                JsonRpcResponse::tool_text(id, text, false)
            },

            SEARCH_POSTS_TOOL => {
                let args: SearchPostsArgs = match serde_json::from_value(arguments) {
                    Ok(a) => a,
                    Err(e) => {
                        return JsonRpcResponse::error(
                            id,
                            -32602,
                            format!("Invalid search_posts arguments: {}", e),
                        );
                    },
                };

                let text = self.execute_search_posts(args).await;
                JsonRpcResponse::tool_text(id, text, false)
            },

            _ => JsonRpcResponse::error(id, -32601, format!("Unknown tool: {}", name)),
        }
    }
}

/// Main Quire MCP server
pub struct QuireServer {
    handler: QuireHandler,
}

impl QuireServer {
    /// Create a new server from resolved configuration
    pub fn new(config: &BlogConfig) -> QuireResult<Self> {
        Ok(Self {
            handler: QuireHandler::new(config)?,
        })
    }

    /// Run the server with the specified transport
    #[instrument(skip(self))]
    pub async fn run(self, transport: TransportType) -> QuireResult<()> {
        info!(
            server = %self.handler.server_name,
            version = VERSION,
            "Starting Quire MCP server"
        );

        match transport {
            TransportType::Stdio => self.run_stdio().await,
            TransportType::Sse { port, host } => self.run_sse(host, port).await,
        }
    }

    /// Run the server with STDIO transport
    async fn run_stdio(self) -> QuireResult<()> {
        info!("Starting STDIO transport");

        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let reader = BufReader::new(stdin);
        let mut lines = reader.lines();

        // One JSON-RPC message per line
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            debug!(request = %line, "Received request");

            let response = match serde_json::from_str::<JsonRpcRequest>(&line) {
                Ok(request) => self.handler.handle_request(request).await,
                Err(e) => JsonRpcResponse::error(None, -32700, format!("Parse error: {}", e)),
            };

            let response_str = serde_json::to_string(&response)?;
            debug!(response = %response_str, "Sending response");
            stdout.write_all(response_str.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }

        info!("STDIO server stopped");
        Ok(())
    }

    /// Run the server with SSE transport
    async fn run_sse(self, host: [u8; 4], port: u16) -> QuireResult<()> {
        let addr = std::net::SocketAddr::from((host, port));
        info!(addr = %addr, "Starting SSE transport");

        let app = router(Arc::new(self.handler));

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| QuireError::ServerError(format!("Failed to bind to {}: {}", addr, e)))?;

        info!("SSE server listening on http://{}", addr);

        axum::serve(listener, app)
            .await
            .map_err(|e| QuireError::ServerError(format!("Server error: {}", e)))?;

        Ok(())
    }
}

async fn health() -> &'static str {
    "OK"
}

// SSE endpoint for server-to-client messages
async fn sse_handler() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = stream::once(async { Ok(Event::default().data("connected")) });
    Sse::new(stream)
}

async fn rpc_handler(
    State(handler): State<Arc<QuireHandler>>,
    Json(request): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    Json(handler.handle_request(request).await)
}

/// HTTP routes: `/health`, `/sse` and `/rpc`
pub fn router(handler: Arc<QuireHandler>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sse", get(sse_handler))
        .route("/rpc", post(rpc_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::feed::ScanPolicy;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn handler() -> QuireHandler {
        QuireHandler::new(&BlogConfig::default()).unwrap()
    }

    fn request(method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(1)),
            method: method.to_string(),
            params,
        }
    }

    #[test]
    fn test_transport_type_default() {
        assert_eq!(TransportType::default(), TransportType::Stdio);
    }

    #[test]
    fn test_list_tools() {
        let tools = handler().list_tools();

        assert_eq!(tools.len(), 2);
        assert!(tools.iter().any(|t| t.name == "get_post_content"));
        assert!(tools.iter().any(|t| t.name == "search_posts"));
    }

    #[test]
    fn test_json_rpc_response_error() {
        let response =
            JsonRpcResponse::error(Some(json!(1)), -32600, "Invalid request".to_string());
        assert_eq!(response.jsonrpc, "2.0");
        assert!(response.result.is_none());
        assert_eq!(response.error.unwrap().code, -32600);
    }

    #[tokio::test]
    async fn test_handle_initialize() {
        let response = handler().handle_request(request("initialize", None)).await;
        let result = response.result.unwrap();

        assert_eq!(result["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "Blog Search Server");
        assert_eq!(result["serverInfo"]["version"], VERSION);
    }

    #[tokio::test]
    async fn test_handle_ping_and_notifications() {
        let handler = handler();
        for method in ["ping", "initialized", "notifications/initialized"] {
            let response = handler.handle_request(request(method, None)).await;
            assert!(response.result.is_some(), "{} should succeed", method);
            assert!(response.error.is_none());
        }
    }

    #[tokio::test]
    async fn test_handle_unknown_method() {
        let response = handler().handle_request(request("unknown/method", None)).await;
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn test_tools_call_missing_params() {
        let response = handler().handle_request(request("tools/call", None)).await;
        assert_eq!(response.error.unwrap().code, -32602);
    }

    #[tokio::test]
    async fn test_tools_call_unknown_tool() {
        let response = handler()
            .handle_request(request("tools/call", Some(json!({"name": "nope"}))))
            .await;
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn test_tools_call_invalid_arguments() {
        let response = handler()
            .handle_request(request(
                "tools/call",
                Some(json!({"name": "get_post_content", "arguments": {"name": "x"}})),
            ))
            .await;
        assert_eq!(response.error.unwrap().code, -32602);
    }

    #[tokio::test]
    async fn test_tools_call_empty_title() {
        let response = handler()
            .handle_request(request(
                "tools/call",
                Some(json!({"name": "get_post_content", "arguments": {"title": "  "}})),
            ))
            .await;
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"].as_str().unwrap().contains("title"));
    }

    #[tokio::test]
    async fn test_tools_call_get_post_content_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/llms.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("## All posts\n"))
            .expect(1)
            .mount(&server)
            .await;

        let config = BlogConfig {
            base_url: server.uri(),
            scan_policy: ScanPolicy::Scoped,
            ..Default::default()
        };
        let handler = QuireHandler::new(&config).unwrap();

        let response = handler
            .handle_request(request(
                "tools/call",
                Some(json!({"name": "get_post_content", "arguments": {"title": "Missing"}})),
            ))
            .await;
        let result = response.result.unwrap();

        assert_eq!(result["isError"], false);
        assert_eq!(
            result["content"][0]["text"],
            "Post with title 'Missing' not found in llms.txt"
        );
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn rpc(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/rpc")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_http_health() {
        let app = router(Arc::new(handler()));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"OK");
    }

    #[tokio::test]
    async fn test_http_rpc_tools_list() {
        let app = router(Arc::new(handler()));

        let response = app
            .oneshot(rpc(json!({"jsonrpc": "2.0", "id": "list-1", "method": "tools/list"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["id"], "list-1");
        assert_eq!(body["result"]["tools"][0]["name"], GET_POST_CONTENT_TOOL);
        assert_eq!(body["result"]["tools"][1]["name"], SEARCH_POSTS_TOOL);
    }

    #[tokio::test]
    async fn test_http_rpc_tools_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/llms.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("## All posts\n"))
            .expect(1)
            .mount(&server)
            .await;

        let config = BlogConfig {
            base_url: server.uri(),
            ..Default::default()
        };
        let app = router(Arc::new(QuireHandler::new(&config).unwrap()));

        let response = app
            .oneshot(rpc(json!({
                "jsonrpc": "2.0",
                "id": 9,
                "method": "tools/call",
                "params": {"name": "get_post_content", "arguments": {"title": "Rust"}}
            })))
            .await
            .unwrap();

        let body = body_json(response).await;
        assert_eq!(body["id"], 9);
        assert_eq!(body["result"]["isError"], false);
        assert_eq!(
            body["result"]["content"][0]["text"],
            "Post with title 'Rust' not found in llms.txt"
        );
    }

    #[tokio::test]
    async fn test_http_rpc_rejects_malformed_body() {
        let app = router(Arc::new(handler()));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/rpc")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }
}
