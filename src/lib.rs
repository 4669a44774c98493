//! Tabletalk - Conversational NL→SQL Agent
//!
//! Tabletalk answers natural-language questions about a relational database.
//! A question is turned into SQL by a language model, executed, corrected
//! once on failure, and the result is shaped into a typed answer envelope:
//! plain text, a table, a chart specification, or a write-confirmation
//! request.
//!
//! # Core Principles
//! - One corrective retry, never more (bounded latency and model cost)
//! - Writes are proposed, never executed autonomously (two-step confirm)
//! - The core returns typed envelopes; only the boundary serializes them
//! - Explicit dependency injection (no global agent instance)
//!
//! # Module Organization
//! - [`error`] - Error types and handling
//! - [`context`] - Bounded conversation log
//! - [`envelope`] - Typed answer envelopes
//! - [`statement`] - Leading-keyword SQL classification
//! - [`capability`] - Fixed capability set with registration checks
//! - [`prompt`] - Prompt construction for all pipeline stages
//! - [`model`] - Language model trait and Gemini client
//! - [`engine`] - Data-source traits and SQLite/MySQL implementations
//! - [`pipeline`] - The orchestrator (`Agent`) and response shaping
//! - [`config`] - Configuration management
//! - [`rpc`] - Stdio JSON-RPC server

pub mod capability;
pub mod config;
pub mod context;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod prompt;
pub mod rpc;
pub mod statement;

// Re-export commonly used types for convenience
pub use capability::{AuxCapability, CapabilitySet};
pub use context::{Context, Role, Turn};
pub use engine::{
    DataSource, DatabaseKind, QueryExecutor, ResultRow, ResultSet, Rows, SchemaProvider, WriteAck,
};
pub use envelope::{ChartType, ResponseEnvelope};
pub use error::{Result, TabletalkError};
pub use model::{GeminiModel, LanguageModel};
pub use pipeline::{Agent, AgentOptions, ContextSummary};
pub use statement::StatementKind;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_exports() {
        // Verify that key types are accessible
        let _kind = DatabaseKind::SQLite;
        let _envelope = ResponseEnvelope::text("hello");
        let _statement = StatementKind::classify("SELECT 1");
    }
}
