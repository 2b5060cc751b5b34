//! Template rendering for prompt and request fields.
//!
//! Context keys are substitution variables: a node configured with
//! `{{summary.text}}` receives the literal value the upstream node
//! stored under `summary`. Escaping is disabled so substitution is
//! verbatim, and a `json` helper pretty-prints structured values for
//! prompts (`{{json someVar}}`).

use handlebars::{handlebars_helper, no_escape, Handlebars};
use loomcore::{Context, NodeError};
use std::sync::OnceLock;

handlebars_helper!(json: |value: Json| {
    serde_json::to_string_pretty(value).unwrap_or_default()
});

fn renderer() -> &'static Handlebars<'static> {
    static RENDERER: OnceLock<Handlebars<'static>> = OnceLock::new();
    RENDERER.get_or_init(|| {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(no_escape);
        registry.register_helper("json", Box::new(json));
        registry
    })
}

/// Render a template field against the current context.
///
/// A malformed template is a configuration problem, never retriable.
pub fn render(template: &str, context: &Context) -> Result<String, NodeError> {
    renderer()
        .render_template(template, context)
        .map_err(|e| NodeError::Configuration(format!("Template error: {}", e)))
}
