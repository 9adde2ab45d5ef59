//! Built-in tool executors: `web_search`, `extract_page`, file/memory I/O,
//! `create_report`, and the two system tools (`final_answer`, `clarification`).
//!
//! [`register_builtin_tools`] is the single entry point `ra-gateway`'s
//! bootstrap calls to populate a fresh [`crate::registry::ToolRegistry`].

pub mod create_report;
pub mod extract_page;
pub mod file_tools;
pub mod system;
pub mod web_search;

use std::sync::Arc;

use ra_domain::tool::ToolCategory;
use ra_providers::{PageExtractor, SearchProvider};

use crate::registry::ToolRegistry;

/// Register every built-in tool onto `registry`.
///
/// `search` and `extractor` are injected rather than constructed here — the
/// registry itself has no opinion on which search/extraction backend is
/// live, matching the pluggable-provider approach `ra-providers` uses for
/// LLM backends.
pub fn register_builtin_tools(
    registry: &ToolRegistry,
    search: Arc<dyn SearchProvider>,
    extractor: Arc<dyn PageExtractor>,
    default_search_results: u32,
) {
    registry.register(
        web_search::definition(),
        ToolCategory::Research,
        Arc::new(web_search::WebSearchExecutor::new(search, default_search_results)),
    );
    registry.register(
        extract_page::definition(),
        ToolCategory::Research,
        Arc::new(extract_page::ExtractPageExecutor::new(extractor)),
    );
    registry.register(
        create_report::definition(),
        ToolCategory::Research,
        Arc::new(create_report::CreateReportExecutor),
    );
    registry.register(
        file_tools::read_definition(),
        ToolCategory::Research,
        Arc::new(file_tools::FileReadExecutor),
    );
    registry.register(
        file_tools::write_definition(),
        ToolCategory::Research,
        Arc::new(file_tools::FileWriteExecutor),
    );
    registry.register(
        file_tools::append_definition(),
        ToolCategory::Research,
        Arc::new(file_tools::FileAppendExecutor),
    );
    registry.register(
        file_tools::list_definition(),
        ToolCategory::Research,
        Arc::new(file_tools::FileListExecutor),
    );
    registry.register(
        file_tools::delete_definition(),
        ToolCategory::Research,
        Arc::new(file_tools::FileDeleteExecutor),
    );
    registry.register(
        file_tools::move_definition(),
        ToolCategory::Research,
        Arc::new(file_tools::FileMoveExecutor),
    );
    registry.register(
        system::final_answer_definition(),
        ToolCategory::System,
        Arc::new(system::FinalAnswerExecutor),
    );
    registry.register(
        system::clarification_definition(),
        ToolCategory::System,
        Arc::new(system::ClarificationExecutor),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use ra_domain::error::Result;
    use ra_domain::source::SearchResult;

    struct NullSearch;
    #[async_trait::async_trait]
    impl SearchProvider for NullSearch {
        async fn search(&self, query: &str, _max_results: u32) -> Result<(SearchResult, Vec<ra_domain::source::Source>)> {
            Ok((
                SearchResult {
                    query: query.to_string(),
                    answer: None,
                    source_urls: vec![],
                    timestamp: chrono::DateTime::from_timestamp(0, 0).unwrap(),
                },
                vec![],
            ))
        }
        fn provider_id(&self) -> &str {
            "null"
        }
    }

    struct NullExtractor;
    #[async_trait::async_trait]
    impl PageExtractor for NullExtractor {
        async fn extract(&self, _url: &str) -> Result<String> {
            Ok(String::new())
        }
    }

    #[test]
    fn registers_expected_tool_names() {
        let registry = ToolRegistry::new();
        register_builtin_tools(&registry, Arc::new(NullSearch), Arc::new(NullExtractor), 5);

        let mut names: Vec<String> = registry.list_all().into_iter().map(|t| t.name).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "clarification",
                "create_report",
                "extract_page",
                "file_append",
                "file_delete",
                "file_list",
                "file_move",
                "file_read",
                "file_write",
                "final_answer",
                "web_search",
            ]
        );
    }

    #[test]
    fn system_tools_are_flagged_and_categorized() {
        let registry = ToolRegistry::new();
        register_builtin_tools(&registry, Arc::new(NullSearch), Arc::new(NullExtractor), 5);

        let system_tools = registry.list_by_category(ToolCategory::System);
        let system_names: Vec<&str> = system_tools.iter().map(|t| t.name.as_str()).collect();
        assert!(system_names.contains(&"final_answer"));
        assert!(system_names.contains(&"clarification"));
        assert!(system_tools.iter().all(|t| t.is_system_tool));

        let research_tools = registry.list_by_category(ToolCategory::Research);
        assert!(research_tools.iter().all(|t| !t.is_system_tool));
    }
}
