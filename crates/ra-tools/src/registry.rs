//! Tool Registry — process-wide map from tool identifier to invokable
//! descriptor, populated once at startup by [`crate::builtin::register_builtin_tools`]
//! (or by tests registering fakes directly).

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use ra_domain::error::{Error, Result};
use ra_domain::source::{SearchResult, Source};
use ra_domain::tool::{ToolCategory, ToolDefinition};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ToolContext
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The slice of an Agent Context (C2, owned by `ra-gateway`) that a tool
/// executor is allowed to touch. `ra-tools` sits below `ra-gateway` in the
/// workspace layering, so it cannot name the concrete context type — this
/// trait is the seam the engine's context implements.
pub trait ToolContext: Send {
    /// Insert a source by URL if new (assigning the next dense number), or
    /// update an existing one's snippet/title in place. Returns the
    /// assigned/existing stable number.
    fn insert_source(&mut self, url: &str, title: &str, snippet: &str) -> u32;

    /// Attach extracted full-page content to a previously inserted source,
    /// looked up by number, recomputing its character count.
    fn set_source_content(&mut self, number: u32, content: String);

    /// Record a completed search, appending it to the searches list and
    /// incrementing `searches_used`.
    fn record_search(&mut self, result: SearchResult);

    /// Resolve a source by its stable number.
    fn get_source(&self, number: u32) -> Option<Source>;

    /// The per-job sandbox root for file/memory I/O tools.
    fn workspace_dir(&self) -> &Path;

    /// Invoked by the `clarification` system tool.
    fn request_clarification(&mut self, question: String);

    /// Invoked by the `final_answer` system tool. `succeeded` selects the
    /// terminal state (`COMPLETED` vs `FAILED`).
    fn set_final_answer(&mut self, answer: String, succeeded: bool);

    fn searches_used(&self) -> u32;
    fn sources_found(&self) -> u32;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ToolExecutor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An invokable tool body. Receives the parsed call arguments and a handle
/// to the calling agent's context, and returns a textual result (the
/// contract in §6 of the orchestration spec — possibly JSON-encoded).
///
/// Implementations MUST NOT mutate the context beyond what's documented on
/// [`ToolContext`] — adding sources, recording searches, or (for the two
/// system tools) setting the final answer / requesting clarification.
#[async_trait::async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, args: serde_json::Value, ctx: &mut dyn ToolContext) -> Result<String>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ToolRegistry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct RegisteredTool {
    definition: ToolDefinition,
    category: ToolCategory,
    executor: Arc<dyn ToolExecutor>,
}

/// Process-wide tool table. Cheap to clone (wraps an `Arc` internally via
/// its callers — the registry itself is held behind an `Arc` by `AppState`).
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, RegisteredTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under `definition.name`. Idempotent: registering the
    /// same name again replaces the previous entry (later registration
    /// wins), which lets tests override a single builtin without
    /// reconstructing the whole registry.
    pub fn register(
        &self,
        definition: ToolDefinition,
        category: ToolCategory,
        executor: Arc<dyn ToolExecutor>,
    ) {
        let name = definition.name.clone();
        self.tools.write().insert(
            name,
            RegisteredTool {
                definition,
                category,
                executor,
            },
        );
    }

    /// Resolve a list of tool identifiers to their descriptors. Identifiers
    /// with no registered tool are logged and silently skipped rather than
    /// failing the whole call.
    pub fn resolve(&self, identifiers: &[String]) -> Vec<ToolDefinition> {
        let tools = self.tools.read();
        identifiers
            .iter()
            .filter_map(|id| match tools.get(id) {
                Some(t) => Some(t.definition.clone()),
                None => {
                    tracing::warn!(tool = %id, "tool registry: unknown tool identifier, skipping");
                    None
                }
            })
            .collect()
    }

    /// All descriptors in a category (system or research), sorted by name
    /// for deterministic toolkit construction.
    pub fn list_by_category(&self, category: ToolCategory) -> Vec<ToolDefinition> {
        let tools = self.tools.read();
        let mut out: Vec<ToolDefinition> = tools
            .values()
            .filter(|t| t.category == category)
            .map(|t| t.definition.clone())
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// All registered descriptors, sorted by name.
    pub fn list_all(&self) -> Vec<ToolDefinition> {
        let tools = self.tools.read();
        let mut out: Vec<ToolDefinition> = tools.values().map(|t| t.definition.clone()).collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Invoke a tool by name. Returns `InvalidTool` if unregistered.
    pub async fn execute(
        &self,
        name: &str,
        args: serde_json::Value,
        ctx: &mut dyn ToolContext,
    ) -> Result<String> {
        let executor = {
            let tools = self.tools.read();
            tools
                .get(name)
                .map(|t| t.executor.clone())
                .ok_or_else(|| Error::InvalidTool(name.to_string()))?
        };
        executor.execute(args, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct EchoExecutor;

    #[async_trait::async_trait]
    impl ToolExecutor for EchoExecutor {
        async fn execute(&self, args: serde_json::Value, _ctx: &mut dyn ToolContext) -> Result<String> {
            Ok(args.to_string())
        }
    }

    struct FakeContext {
        workspace: PathBuf,
        sources: Vec<Source>,
        searches_used: u32,
        final_answer: Option<(String, bool)>,
        clarification: Option<String>,
    }

    impl FakeContext {
        fn new() -> Self {
            Self {
                workspace: PathBuf::from("/tmp"),
                sources: Vec::new(),
                searches_used: 0,
                final_answer: None,
                clarification: None,
            }
        }
    }

    impl ToolContext for FakeContext {
        fn insert_source(&mut self, url: &str, title: &str, snippet: &str) -> u32 {
            if let Some(existing) = self.sources.iter_mut().find(|s| s.url == url) {
                existing.title = title.to_string();
                return existing.number;
            }
            let number = self.sources.len() as u32 + 1;
            self.sources.push(Source::new(number, url, title, snippet));
            number
        }
        fn set_source_content(&mut self, number: u32, content: String) {
            if let Some(s) = self.sources.iter_mut().find(|s| s.number == number) {
                s.set_full_content(content);
            }
        }
        fn record_search(&mut self, _result: SearchResult) {
            self.searches_used += 1;
        }
        fn get_source(&self, number: u32) -> Option<Source> {
            self.sources.iter().find(|s| s.number == number).cloned()
        }
        fn workspace_dir(&self) -> &Path {
            &self.workspace
        }
        fn request_clarification(&mut self, question: String) {
            self.clarification = Some(question);
        }
        fn set_final_answer(&mut self, answer: String, succeeded: bool) {
            self.final_answer = Some((answer, succeeded));
        }
        fn searches_used(&self) -> u32 {
            self.searches_used
        }
        fn sources_found(&self) -> u32 {
            self.sources.len() as u32
        }
    }

    fn echo_def() -> ToolDefinition {
        ToolDefinition {
            name: "echo".into(),
            description: "echoes its arguments".into(),
            parameters: serde_json::json!({"type": "object"}),
            is_system_tool: false,
        }
    }

    #[test]
    fn register_is_idempotent_last_wins() {
        let registry = ToolRegistry::new();
        registry.register(echo_def(), ToolCategory::Research, Arc::new(EchoExecutor));
        let mut def = echo_def();
        def.description = "updated".into();
        registry.register(def, ToolCategory::Research, Arc::new(EchoExecutor));

        let resolved = registry.resolve(&["echo".to_string()]);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].description, "updated");
    }

    #[test]
    fn resolve_skips_unknown_identifiers() {
        let registry = ToolRegistry::new();
        registry.register(echo_def(), ToolCategory::Research, Arc::new(EchoExecutor));
        let resolved = registry.resolve(&["echo".to_string(), "does_not_exist".to_string()]);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].name, "echo");
    }

    #[test]
    fn list_by_category_filters_and_sorts() {
        let registry = ToolRegistry::new();
        registry.register(echo_def(), ToolCategory::Research, Arc::new(EchoExecutor));
        let mut system_def = echo_def();
        system_def.name = "final_answer".into();
        registry.register(system_def, ToolCategory::System, Arc::new(EchoExecutor));

        let research = registry.list_by_category(ToolCategory::Research);
        assert_eq!(research.len(), 1);
        assert_eq!(research[0].name, "echo");

        let system = registry.list_by_category(ToolCategory::System);
        assert_eq!(system.len(), 1);
        assert_eq!(system[0].name, "final_answer");
    }

    #[tokio::test]
    async fn execute_unknown_tool_is_invalid_tool_error() {
        let registry = ToolRegistry::new();
        let mut ctx = FakeContext::new();
        let err = registry.execute("nope", serde_json::json!({}), &mut ctx).await.unwrap_err();
        assert_eq!(err.kind(), ra_domain::error::ErrorKind::InvalidTool);
    }

    #[tokio::test]
    async fn execute_runs_registered_executor() {
        let registry = ToolRegistry::new();
        registry.register(echo_def(), ToolCategory::Research, Arc::new(EchoExecutor));
        let mut ctx = FakeContext::new();
        let result = registry
            .execute("echo", serde_json::json!({"a": 1}), &mut ctx)
            .await
            .unwrap();
        assert_eq!(result, r#"{"a":1}"#);
    }
}
