//! Node executor library
//!
//! One executor per node kind, all honoring the shared contract:
//! publish `loading` first, validate configuration, render template
//! fields against the context, do the work inside a durable step, and
//! publish a terminal `success`/`error` status.

mod anthropic;
mod gemini;
mod http;
mod openai;
pub mod template;
mod trigger;

pub use anthropic::AnthropicExecutor;
pub use gemini::GeminiExecutor;
pub use http::HttpRequestExecutor;
pub use openai::OpenAiExecutor;
pub use trigger::{GoogleFormTriggerExecutor, InitialExecutor, ManualTriggerExecutor};

use loomruntime::ExecutorRegistry;

/// Build the registry with the standard executor for every node kind.
pub fn registry() -> ExecutorRegistry {
    ExecutorRegistry {
        initial: Box::new(InitialExecutor),
        manual_trigger: Box::new(ManualTriggerExecutor),
        google_form_trigger: Box::new(GoogleFormTriggerExecutor),
        http_request: Box::new(HttpRequestExecutor::new()),
        gemini: Box::new(GeminiExecutor::new()),
        openai: Box::new(OpenAiExecutor::new()),
        anthropic: Box::new(AnthropicExecutor::new()),
    }
}
