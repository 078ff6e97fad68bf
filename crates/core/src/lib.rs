//! # docassist Core
//!
//! Domain types, traits, and error definitions for the docassist retrieval
//! agent. This crate has **no HTTP or storage dependencies**; it defines the
//! domain model that the provider, tool, and agent crates implement against.
//!
//! ## Design Philosophy
//!
//! The two external collaborators of the orchestration engine (the model
//! client and the retrieval tool) are traits defined here. Implementations
//! live in their respective crates, so tests can swap in scripted mocks.

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolDefinition};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
