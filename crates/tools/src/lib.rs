//! Documentation retrieval for docassist.
//!
//! The `retriever` tool is the only capability the assistant has: it looks
//! up snippets in an indexed documentation tree so answers stay grounded.

pub mod doc_store;
pub mod retriever;

pub use doc_store::{Document, DocumentSearch, KeywordStore, SearchParams, SearchType};
pub use retriever::{EMPTY_RESULT_SENTINEL, FormatLimits, RETRIEVER_TOOL_NAME, RetrieverTool};

use docassist_config::AppConfig;
use docassist_core::error::ToolError;
use docassist_core::tool::ToolRegistry;
use std::sync::Arc;

/// Search parameters from configuration.
pub fn search_params(config: &AppConfig) -> Result<SearchParams, ToolError> {
    Ok(SearchParams {
        k: config.retrieval.k,
        fetch_k: config.retrieval.fetch_k,
        search_type: config.retrieval.search_type.parse()?,
    })
}

/// Rendering limits from configuration.
pub fn format_limits(config: &AppConfig) -> FormatLimits {
    FormatLimits {
        max_docs: config.limits.max_retrieved_docs,
        max_doc_chars: config.limits.max_doc_chars,
        max_total_chars: config.limits.max_context_chars,
    }
}

/// Create the tool registry used by the agent.
///
/// Indexes `retrieval.docs_dir` when configured; otherwise the retriever
/// searches an empty store and always answers with the empty sentinel.
pub fn default_registry(config: &AppConfig) -> Result<ToolRegistry, ToolError> {
    let store = match &config.retrieval.docs_dir {
        Some(dir) => KeywordStore::load_dir(dir)?,
        None => {
            tracing::warn!("No retrieval.docs_dir configured; documentation search will find nothing");
            KeywordStore::new()
        }
    };
    registry_with_store(Arc::new(store), config)
}

/// Create the tool registry around an existing search backend.
pub fn registry_with_store(
    store: Arc<dyn DocumentSearch>,
    config: &AppConfig,
) -> Result<ToolRegistry, ToolError> {
    let tool = RetrieverTool::new(store)
        .with_params(search_params(config)?)
        .with_limits(format_limits(config));

    let mut registry = ToolRegistry::new();
    registry.register(Box::new(tool));
    Ok(registry)
}
