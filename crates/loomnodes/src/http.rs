use crate::template;
use async_trait::async_trait;
use loomcore::{Context, ExecutorContext, NodeError, NodeExecutor, NodeKind, NodeStatus};
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// HTTP request node.
///
/// Configuration: `variableName` (output key), `endpoint` (URL, may be a
/// template), `method` (default GET), `body` (template, sent as JSON for
/// methods that carry one).
pub struct HttpRequestExecutor {
    client: reqwest::Client,
}

impl HttpRequestExecutor {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpRequestExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Output payload stored under the node's variable name
#[derive(Debug, Serialize, Deserialize)]
struct HttpResponsePayload {
    status: u16,
    #[serde(rename = "statusText")]
    status_text: String,
    data: Value,
}

#[async_trait]
impl NodeExecutor for HttpRequestExecutor {
    fn kind(&self) -> NodeKind {
        NodeKind::HttpRequest
    }

    async fn execute(&self, ctx: ExecutorContext) -> Result<Context, NodeError> {
        ctx.publisher.publish(&ctx.node_id, NodeStatus::Loading);
        match self.perform(&ctx).await {
            Ok(context) => {
                ctx.publisher.publish(&ctx.node_id, NodeStatus::Success);
                Ok(context)
            }
            Err(error) => {
                ctx.publisher.publish(&ctx.node_id, NodeStatus::Error);
                Err(error)
            }
        }
    }
}

impl HttpRequestExecutor {
    async fn perform(&self, ctx: &ExecutorContext) -> Result<Context, NodeError> {
        let variable_name = ctx.string_field("variableName").ok_or_else(|| {
            NodeError::Configuration("HTTP Request node: Variable name is missing".to_string())
        })?;
        let endpoint = ctx.string_field("endpoint").ok_or_else(|| {
            NodeError::Configuration("HTTP Request node: Endpoint is missing".to_string())
        })?;

        let method_name = ctx
            .string_field("method")
            .unwrap_or_else(|| "GET".to_string())
            .to_uppercase();
        let method = match method_name.as_str() {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "PATCH" => Method::PATCH,
            "DELETE" => Method::DELETE,
            other => {
                return Err(NodeError::Configuration(format!(
                    "HTTP Request node: Unsupported method: {}",
                    other
                )))
            }
        };

        let url = template::render(&endpoint, &ctx.context)?;
        let body = match ctx.string_field("body") {
            Some(raw) => Some(template::render(&raw, &ctx.context)?),
            None => None,
        };

        tracing::debug!(node_id = %ctx.node_id, %method_name, %url, "Sending HTTP request");

        let client = self.client.clone();
        let payload: HttpResponsePayload = ctx
            .steps
            .run(&format!("{}:http-request", ctx.node_id), || async move {
                let mut request = client.request(method, url);
                if let Some(body) = body {
                    request = request.header(CONTENT_TYPE, "application/json").body(body);
                }
                let response = request.send().await.map_err(|e| {
                    NodeError::TransientProvider(format!("HTTP request failed: {}", e))
                })?;

                let status = response.status();
                let text = response.text().await.map_err(|e| {
                    NodeError::TransientProvider(format!("Failed to read response body: {}", e))
                })?;
                let data = serde_json::from_str(&text).unwrap_or(Value::String(text));

                Ok(HttpResponsePayload {
                    status: status.as_u16(),
                    status_text: status.canonical_reason().unwrap_or("").to_string(),
                    data,
                })
            })
            .await?;

        let payload = json!({
            "status": payload.status,
            "statusText": payload.status_text,
            "data": payload.data,
        });
        Ok(ctx.context.clone().with_entry(variable_name, payload))
    }
}
