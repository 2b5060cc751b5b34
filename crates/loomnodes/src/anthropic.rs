use crate::template;
use async_trait::async_trait;
use loomcore::{Context, ExecutorContext, NodeError, NodeExecutor, NodeKind, NodeStatus};
use serde_json::{json, Value};

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";
const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
const MAX_TOKENS: u32 = 1024;

/// Anthropic text-generation node. Same contract and configuration shape
/// as the Gemini node; only the provider call differs.
pub struct AnthropicExecutor {
    client: reqwest::Client,
    base_url: String,
}

impl AnthropicExecutor {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: ANTHROPIC_API_BASE.to_string(),
        }
    }

    /// Point the executor at a different API host. Used by tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl Default for AnthropicExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeExecutor for AnthropicExecutor {
    fn kind(&self) -> NodeKind {
        NodeKind::Anthropic
    }

    async fn execute(&self, ctx: ExecutorContext) -> Result<Context, NodeError> {
        ctx.publisher.publish(&ctx.node_id, NodeStatus::Loading);
        match self.generate(&ctx).await {
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

impl AnthropicExecutor {
    async fn generate(&self, ctx: &ExecutorContext) -> Result<Context, NodeError> {
        let variable_name = ctx.string_field("variableName").ok_or_else(|| {
            NodeError::Configuration("Anthropic node: Variable name is missing".to_string())
        })?;
        let credential_id = ctx
            .credential_id
            .clone()
            .or_else(|| ctx.string_field("credentialId"))
            .ok_or_else(|| {
                NodeError::Configuration("Anthropic node: Credential is required".to_string())
            })?;
        let user_prompt = ctx.string_field("userPrompt").ok_or_else(|| {
            NodeError::Configuration("Anthropic node: User prompt is missing".to_string())
        })?;

        let system_prompt = match ctx.string_field("systemPrompt") {
            Some(raw) => template::render(&raw, &ctx.context)?,
            None => DEFAULT_SYSTEM_PROMPT.to_string(),
        };
        let user_prompt = template::render(&user_prompt, &ctx.context)?;
        let model = ctx
            .string_field("model")
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let credentials = ctx.credentials.clone();
        let lookup_id = credential_id.clone();
        let api_key: String = ctx
            .steps
            .run(&format!("{}:get-credential", ctx.node_id), || async move {
                credentials.resolve(&lookup_id).await
            })
            .await?;

        let client = self.client.clone();
        let url = format!("{}/v1/messages", self.base_url);
        tracing::debug!(node_id = %ctx.node_id, %model, "Calling Anthropic");

        let text: String = ctx
            .steps
            .run(
                &format!("{}:anthropic-generate-text", ctx.node_id),
                || async move {
                    let response = client
                        .post(url)
                        .header("x-api-key", api_key)
                        .header("anthropic-version", ANTHROPIC_VERSION)
                        .json(&json!({
                            "model": model,
                            "max_tokens": MAX_TOKENS,
                            "system": system_prompt,
                            "messages": [
                                {"role": "user", "content": user_prompt}
                            ]
                        }))
                        .send()
                        .await
                        .map_err(|e| {
                            NodeError::TransientProvider(format!("Anthropic request failed: {}", e))
                        })?
                        .error_for_status()
                        .map_err(|e| {
                            NodeError::TransientProvider(format!(
                                "Anthropic returned an error: {}",
                                e
                            ))
                        })?;

                    let body: Value = response.json().await.map_err(|e| {
                        NodeError::TransientProvider(format!(
                            "Anthropic response unreadable: {}",
                            e
                        ))
                    })?;
                    body.pointer("/content/0/text")
                        .and_then(Value::as_str)
                        .map(String::from)
                        .ok_or_else(|| {
                            NodeError::TransientProvider(
                                "Anthropic response contained no text".to_string(),
                            )
                        })
                },
            )
            .await?;

        Ok(ctx
            .context
            .clone()
            .with_entry(variable_name, json!({"text": text})))
    }
}
