use anyhow::Result;
use photo_archive_rust::domain::ports::VectorStore;
use photo_archive_rust::domain::query::QueryService;
use photo_archive_rust::domain::tool::{PhotoSearchTool, TOOL_NAME};
use photo_archive_rust::outbound::auth::{token_exchange_from_env, CredentialManager};
use photo_archive_rust::outbound::connection::{ConnectionProvider, WeaviateConfig};
use photo_archive_rust::outbound::geocode::NominatimGeocoder;
use photo_archive_rust::outbound::weaviate::WeaviateStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};
use tracing_appender::rolling;
use tracing_subscriber::EnvFilter;

const PROTOCOL_VERSION: &str = "2024-11-05";

/// Main entry point.
#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to a file; stdout carries the protocol.
    let file_appender = rolling::never("logs", "serve.log");
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(file_appender)
        .with_target(false)
        .without_time()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let credentials = Arc::new(CredentialManager::new(token_exchange_from_env()?));
    let provider = Arc::new(ConnectionProvider::new(
        WeaviateConfig::from_env()?,
        credentials,
    ));
    let store: Arc<dyn VectorStore> = Arc::new(WeaviateStore::new(Arc::clone(&provider)));
    let tool = PhotoSearchTool::new(QueryService::new(
        store,
        Arc::new(NominatimGeocoder::new()),
    ));

    // Release the connection handle on Ctrl-C.
    let shutdown_provider = Arc::clone(&provider);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown_provider.close_client().await;
            std::process::exit(130);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    info!("Photo search tool server listening on stdio");

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let request: Value = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                warn!("Ignoring malformed request: {}", e);
                continue;
            }
        };

        let method = request
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        // Requests without an id are notifications and get no response.
        let id = match request.get("id") {
            Some(id) => id.clone(),
            None => {
                debug!("Ignoring notification: {}", method);
                continue;
            }
        };

        let message = match method.as_str() {
            "initialize" => rpc_result(
                &id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {"tools": {}},
                    "serverInfo": {
                        "name": "photo-archive-rust",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            ),
            "tools/list" => rpc_result(&id, json!({"tools": [PhotoSearchTool::definition()]})),
            "tools/call" => rpc_result(&id, handle_tool_call(&tool, request.get("params")).await),
            "ping" => rpc_result(&id, json!({})),
            other => {
                warn!("Unsupported method: {}", other);
                rpc_error(&id, -32601, "Method not found")
            }
        };

        stdout.write_all(message.to_string().as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    provider.close_client().await;
    Ok(())
}

async fn handle_tool_call(tool: &PhotoSearchTool, params: Option<&Value>) -> Value {
    let name = params
        .and_then(|params| params.get("name"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    if name != TOOL_NAME {
        return tool_content(format!("Unknown tool: {}", name), true);
    }

    let arguments = params
        .and_then(|params| params.get("arguments"))
        .cloned()
        .unwrap_or_else(|| json!({}));

    let response = tool.call(arguments).await;
    tool_content(response.content, response.is_error)
}

fn tool_content(text: String, is_error: bool) -> Value {
    json!({
        "content": [{"type": "text", "text": text}],
        "isError": is_error,
    })
}

fn rpc_result(id: &Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

fn rpc_error(id: &Value, code: i64, message: &str) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}})
}
