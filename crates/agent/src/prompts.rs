//! Fixed instruction and reply texts.

/// Instruction prepended to every model request.
pub const SYSTEM_PROMPT: &str = "\
You are a documentation assistant for developers.

Answer using only the documentation returned by the `retriever` tool. For any \
technical question, call `retriever` first; you may rephrase the query and \
search once more if the results look incomplete.

Cite sources by their number and file name, for example \"According to [1] `cli.md`\". \
If the documentation does not cover the question, say so plainly instead of guessing. \
Keep answers concise and put code in fenced Markdown blocks.";

pub const MAX_TURNS_REPLY: &str = "I reached the maximum reasoning steps for this request. \
Please rephrase or ask a more specific question.";

pub const MAX_CONTEXT_REPLY: &str = "The conversation is too long for me to answer safely. \
Please start a new question or narrow the scope.";

pub const RATE_LIMITED_REPLY: &str =
    "I'm temporarily rate-limited by the AI provider. Please wait a moment and try again.";

pub const TOOL_LIMIT_REPLY: &str = "Tool call limit reached. Unable to retrieve more context.";

/// `tool_call_id` of the synthetic turn added when the tool budget is already spent.
pub const TOOL_LIMIT_CALL_ID: &str = "limit";

pub fn llm_error_reply(error: &impl std::fmt::Display) -> String {
    format!("An internal error occurred while processing your request: {error}")
}

pub fn tool_error_reply(tool_name: &str, error: &impl std::fmt::Display) -> String {
    format!("Error executing tool {tool_name}: {error}")
}

pub fn invalid_tool_call_reply(reason: &str) -> String {
    format!("Invalid tool call: {reason}")
}
