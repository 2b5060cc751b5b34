use crate::template;
use async_trait::async_trait;
use loomcore::{Context, ExecutorContext, NodeError, NodeExecutor, NodeKind, NodeStatus};
use serde_json::{json, Value};

const OPENAI_API_BASE: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// OpenAI text-generation node. Same contract and configuration shape as
/// the Gemini node; only the provider call differs.
pub struct OpenAiExecutor {
    client: reqwest::Client,
    base_url: String,
}

impl OpenAiExecutor {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: OPENAI_API_BASE.to_string(),
        }
    }

    /// Point the executor at a different API host. Used by tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl Default for OpenAiExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeExecutor for OpenAiExecutor {
    fn kind(&self) -> NodeKind {
        NodeKind::OpenAi
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

impl OpenAiExecutor {
    async fn generate(&self, ctx: &ExecutorContext) -> Result<Context, NodeError> {
        let variable_name = ctx.string_field("variableName").ok_or_else(|| {
            NodeError::Configuration("OpenAI node: Variable name is missing".to_string())
        })?;
        let credential_id = ctx
            .credential_id
            .clone()
            .or_else(|| ctx.string_field("credentialId"))
            .ok_or_else(|| {
                NodeError::Configuration("OpenAI node: Credential is required".to_string())
            })?;
        let user_prompt = ctx.string_field("userPrompt").ok_or_else(|| {
            NodeError::Configuration("OpenAI node: User prompt is missing".to_string())
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
        let url = format!("{}/v1/chat/completions", self.base_url);
        tracing::debug!(node_id = %ctx.node_id, %model, "Calling OpenAI");

        let text: String = ctx
            .steps
            .run(
                &format!("{}:openai-generate-text", ctx.node_id),
                || async move {
                    let response = client
                        .post(url)
                        .bearer_auth(api_key)
                        .json(&json!({
                            "model": model,
                            "messages": [
                                {"role": "system", "content": system_prompt},
                                {"role": "user", "content": user_prompt}
                            ]
                        }))
                        .send()
                        .await
                        .map_err(|e| {
                            NodeError::TransientProvider(format!("OpenAI request failed: {}", e))
                        })?
                        .error_for_status()
                        .map_err(|e| {
                            NodeError::TransientProvider(format!("OpenAI returned an error: {}", e))
                        })?;

                    let body: Value = response.json().await.map_err(|e| {
                        NodeError::TransientProvider(format!("OpenAI response unreadable: {}", e))
                    })?;
                    body.pointer("/choices/0/message/content")
                        .and_then(Value::as_str)
                        .map(String::from)
                        .ok_or_else(|| {
                            NodeError::TransientProvider(
                                "OpenAI response contained no text".to_string(),
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
