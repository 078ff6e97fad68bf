//! Documentation retriever tool.
//!
//! Searches the indexed documentation and renders the hits as numbered,
//! source-attributed snippets sized to fit the model's context window.

use crate::doc_store::{Document, DocumentSearch, SearchParams};
use async_trait::async_trait;
use docassist_core::error::ToolError;
use docassist_core::tool::{Tool, ToolResult};
use std::sync::Arc;
use tracing::debug;

/// Tool name the model uses to request a lookup.
pub const RETRIEVER_TOOL_NAME: &str = "retriever";

/// Output returned when a search finds nothing.
pub const EMPTY_RESULT_SENTINEL: &str = "DOCUMENTATION_SEARCH_RESULT: EMPTY";

/// Size limits applied when rendering search hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatLimits {
    pub max_docs: usize,
    pub max_doc_chars: usize,
    pub max_total_chars: usize,
}

impl Default for FormatLimits {
    fn default() -> Self {
        Self {
            max_docs: 4,
            max_doc_chars: 2_000,
            max_total_chars: 12_000,
        }
    }
}

/// Render search hits as `[i] SOURCE: <source>\n<content>` blocks.
///
/// Takes at most `max_docs` documents, truncates each to `max_doc_chars`
/// and stops before the running total would exceed `max_total_chars`.
/// No documents at all yields [`EMPTY_RESULT_SENTINEL`]; documents that
/// all overflow the budget yield an empty string.
pub fn format_results(docs: &[Document], limits: &FormatLimits) -> String {
    if docs.is_empty() {
        return EMPTY_RESULT_SENTINEL.to_string();
    }

    let mut blocks = Vec::new();
    let mut total_chars = 0;

    for (i, doc) in docs.iter().take(limits.max_docs).enumerate() {
        let content: String = doc.content.chars().take(limits.max_doc_chars).collect();
        let block = format!("[{}] SOURCE: {}\n{}", i + 1, doc.source, content);
        let block_chars = block.chars().count();

        if total_chars + block_chars > limits.max_total_chars {
            break;
        }
        total_chars += block_chars;
        blocks.push(block);
    }

    blocks.join("\n\n")
}

/// Extract the mandatory string `query` argument.
pub fn query_argument(arguments: &serde_json::Value) -> Result<&str, ToolError> {
    arguments
        .get("query")
        .and_then(|q| q.as_str())
        .ok_or_else(|| ToolError::InvalidArguments("Missing string 'query' argument".into()))
}

pub struct RetrieverTool {
    store: Arc<dyn DocumentSearch>,
    params: SearchParams,
    limits: FormatLimits,
}

impl RetrieverTool {
    pub fn new(store: Arc<dyn DocumentSearch>) -> Self {
        Self {
            store,
            params: SearchParams::default(),
            limits: FormatLimits::default(),
        }
    }

    pub fn with_params(mut self, params: SearchParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_limits(mut self, limits: FormatLimits) -> Self {
        self.limits = limits;
        self
    }

    fn run(&self, arguments: &serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = query_argument(arguments)?;
        let docs = self.store.search(query, &self.params)?;
        debug!(query, hits = docs.len(), "Retriever search");

        Ok(ToolResult {
            call_id: String::new(),
            success: !docs.is_empty(),
            output: format_results(&docs, &self.limits),
            data: None,
        })
    }
}

#[async_trait]
impl Tool for RetrieverTool {
    fn name(&self) -> &str {
        RETRIEVER_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Search the project documentation. Returns the most relevant snippets with their source file."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to look up in the documentation"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        self.run(&arguments)
    }

    fn execute_blocking(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        self.run(&arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc_store::KeywordStore;

    fn tool() -> RetrieverTool {
        let store = KeywordStore::from_documents([
            Document::new("bridge.md", "The bridge moves assets between chains."),
            Document::new("fees.md", "Bridge fees are charged on the destination chain."),
        ]);
        RetrieverTool::new(Arc::new(store))
    }

    #[test]
    fn format_numbers_and_attributes_blocks() {
        let docs = vec![Document::new("a.md", "alpha"), Document::new("b.md", "beta")];
        let out = format_results(&docs, &FormatLimits::default());
        assert_eq!(out, "[1] SOURCE: a.md\nalpha\n\n[2] SOURCE: b.md\nbeta");
    }

    #[test]
    fn format_truncates_each_document() {
        let docs = vec![Document::new("long.md", "x".repeat(50))];
        let limits = FormatLimits { max_doc_chars: 10, ..FormatLimits::default() };
        let out = format_results(&docs, &limits);
        assert_eq!(out, format!("[1] SOURCE: long.md\n{}", "x".repeat(10)));
    }

    #[test]
    fn format_caps_document_count() {
        let docs: Vec<Document> = (0..6).map(|i| Document::new(format!("{i}.md"), "text")).collect();
        let out = format_results(&docs, &FormatLimits::default());
        assert!(out.contains("[4] SOURCE"));
        assert!(!out.contains("[5] SOURCE"));
    }

    #[test]
    fn format_stops_before_exceeding_total_budget() {
        let docs = vec![Document::new("a.md", "a".repeat(20)), Document::new("b.md", "b".repeat(20))];
        // "[1] SOURCE: a.md\n" is 17 chars, so one block is 37
        let limits = FormatLimits { max_total_chars: 50, ..FormatLimits::default() };
        let out = format_results(&docs, &limits);
        assert!(out.starts_with("[1] SOURCE: a.md"));
        assert!(!out.contains("b.md"));

        let tiny = FormatLimits { max_total_chars: 5, ..FormatLimits::default() };
        assert_eq!(format_results(&docs, &tiny), "");
    }

    #[test]
    fn no_documents_yields_sentinel() {
        assert_eq!(format_results(&[], &FormatLimits::default()), EMPTY_RESULT_SENTINEL);
    }

    #[tokio::test]
    async fn execute_searches_store() {
        let result = tool().execute(serde_json::json!({"query": "bridge fees"})).await.unwrap();
        assert!(result.success);
        assert!(result.output.starts_with("[1] SOURCE: fees.md"));
    }

    #[test]
    fn execute_blocking_reports_empty_search_with_sentinel() {
        let result = tool().execute_blocking(serde_json::json!({"query": "validators"})).unwrap();
        assert!(!result.success);
        assert_eq!(result.output, EMPTY_RESULT_SENTINEL);
    }

    #[test]
    fn missing_query_is_invalid() {
        let err = tool().execute_blocking(serde_json::json!({"q": 1})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert!(query_argument(&serde_json::json!({"query": 3})).is_err());
    }
}
