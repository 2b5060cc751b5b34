use loomcore::{NodeExecutor, NodeKind};

/// Closed mapping from node kind to executor implementation.
///
/// One field per kind, resolved through an exhaustive match: adding a
/// variant to [`NodeKind`] refuses to compile until an executor is wired
/// here. Unknown type tags are caught earlier, where the kind enum is
/// parsed from the stored workflow. Fields are public so tests can
/// substitute a single executor with struct-update syntax.
pub struct ExecutorRegistry {
    pub initial: Box<dyn NodeExecutor>,
    pub manual_trigger: Box<dyn NodeExecutor>,
    pub google_form_trigger: Box<dyn NodeExecutor>,
    pub http_request: Box<dyn NodeExecutor>,
    pub gemini: Box<dyn NodeExecutor>,
    pub openai: Box<dyn NodeExecutor>,
    pub anthropic: Box<dyn NodeExecutor>,
}

impl ExecutorRegistry {
    /// Resolve the executor for a node kind.
    pub fn resolve(&self, kind: NodeKind) -> &dyn NodeExecutor {
        let executor = match kind {
            NodeKind::Initial => self.initial.as_ref(),
            NodeKind::ManualTrigger => self.manual_trigger.as_ref(),
            NodeKind::GoogleFormTrigger => self.google_form_trigger.as_ref(),
            NodeKind::HttpRequest => self.http_request.as_ref(),
            NodeKind::Gemini => self.gemini.as_ref(),
            NodeKind::OpenAi => self.openai.as_ref(),
            NodeKind::Anthropic => self.anthropic.as_ref(),
        };
        debug_assert_eq!(executor.kind(), kind, "executor wired to the wrong slot");
        executor
    }
}
