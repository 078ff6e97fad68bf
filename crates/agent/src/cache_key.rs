//! Deterministic cache keys.
//!
//! A key is `<category>:<sha256 hex>` where the digest covers the category
//! and a canonical JSON rendering of the operation's semantic inputs. Object
//! keys are sorted before hashing, so logically equal inputs hash the same
//! regardless of how they were built.

use docassist_core::message::Message;
use docassist_tools::SearchParams;
use serde_json::json;
use sha2::{Digest, Sha256};

pub const LLM_CATEGORY: &str = "llm";
pub const RETRIEVER_CATEGORY: &str = "retriever";

/// Fingerprint `inputs` under `category`.
pub fn generate_cache_key(category: &str, inputs: &serde_json::Value) -> String {
    let canonical = canonicalize(inputs).to_string();
    let mut hasher = Sha256::new();
    hasher.update(category.as_bytes());
    hasher.update([0u8]);
    hasher.update(canonical.as_bytes());
    format!("{category}:{}", hex::encode(hasher.finalize()))
}

fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            serde_json::Value::Object(
                keys.into_iter()
                    .map(|k| (k.clone(), canonicalize(&map[k])))
                    .collect(),
            )
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(canonicalize).collect())
        }
        other => other.clone(),
    }
}

/// Key for a model call: model id plus the ordered transcript.
///
/// Each turn contributes its role, content and requested tool calls (name
/// and parsed arguments). Message ids and timestamps are excluded.
pub fn llm_cache_key(model: &str, messages: &[Message]) -> String {
    let transcript: Vec<serde_json::Value> = messages
        .iter()
        .map(|m| {
            let calls: Vec<serde_json::Value> = m
                .tool_calls
                .iter()
                .map(|tc| json!({ "name": tc.name, "arguments": parsed_arguments(&tc.arguments) }))
                .collect();
            json!({
                "role": m.role.as_str(),
                "content": m.content,
                "tool_calls": calls,
            })
        })
        .collect();

    generate_cache_key(LLM_CATEGORY, &json!({ "model": model, "messages": transcript }))
}

/// Arguments that fail to parse are hashed verbatim.
fn parsed_arguments(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

/// Key for a retrieval: the query plus every search parameter.
pub fn retrieval_cache_key(query: &str, params: &SearchParams) -> String {
    generate_cache_key(
        RETRIEVER_CATEGORY,
        &json!({
            "query": query,
            "k": params.k,
            "fetch_k": params.fetch_k,
            "type": params.search_type.as_str(),
        }),
    )
}
