//! Pipeline Orchestrator
//!
//! The [`Agent`] owns the conversational query pipeline: question → SQL
//! generation → execution → one self-correction on executor error →
//! write-intercept → response shaping. It also owns the conversation
//! context and the failure boundary around the whole sequence.
//!
//! # Retry Bound
//! At most two generation attempts and one classification call per
//! question. The single correction bounds latency and cost while still
//! recovering from the common model mistakes (wrong column name, syntax
//! slip). There is never a third attempt.
//!
//! # Failure Containment
//! `ask` never fails: unexpected internal errors are logged and converted
//! to a generic apology. The only error texts that reach the caller as
//! content are the sentinel ("cannot answer") responses and database error
//! text after a failed correction, which is diagnostic and
//! deliberately not hidden.

pub mod shape;

use serde::Serialize;
use tracing::{debug, error, warn};

use crate::capability::{AuxCapability, CapabilitySet};
use crate::context::{Context, Turn, DEFAULT_MAX_CONTEXT};
use crate::engine::{QueryExecutor, ResultSet, Rows, SchemaProvider, WriteAck};
use crate::envelope::ResponseEnvelope;
use crate::error::Result;
use crate::model::{strip_code_fence, LanguageModel};
use crate::prompt::{self, DEFAULT_GUIDANCE, NO_QUERY};
use crate::statement::StatementKind;

/// Fixed reply when the model declines with the sentinel
pub const CANNOT_ANSWER: &str = "I cannot answer that question with the available data.";

/// Generic user-safe reply for contained internal failures
pub const APOLOGY: &str =
    "Sorry, something went wrong while answering your question. Please try again.";

/// Outcome of one executed generation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The executor returned rows
    Success,
    /// The executor returned the error marker
    Failed,
}

/// One generation attempt, for diagnostics
///
/// At most two exist per question; attempt 2 only after attempt 1 failed
/// with something other than the sentinel.
#[derive(Debug, Clone)]
pub struct QueryAttempt {
    /// The SQL that was executed
    pub sql: String,
    /// 1 or 2
    pub attempt_number: u8,
    /// Whether execution produced rows
    pub outcome: AttemptOutcome,
}

impl QueryAttempt {
    fn new(sql: &str, attempt_number: u8, succeeded: bool) -> Self {
        debug_assert!(attempt_number == 1 || attempt_number == 2);
        Self {
            sql: sql.to_string(),
            attempt_number,
            outcome: if succeeded { AttemptOutcome::Success } else { AttemptOutcome::Failed },
        }
    }

    fn log(&self) {
        debug!(
            attempt = self.attempt_number,
            outcome = ?self.outcome,
            sql = %self.sql,
            "query attempt"
        );
    }
}

/// Administrative snapshot of the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextSummary {
    /// Turns currently retained
    pub turns: usize,
    /// Active data-source kind
    pub database: String,
    /// Registered capability names
    pub capabilities: Vec<String>,
}

/// Tunables decided once at construction
#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// Context cap (turns retained)
    pub max_context: usize,

    /// Trailing turns visible to every prompt stage; `None` = the full
    /// bounded context. Applied identically to generation, correction,
    /// and classification.
    pub prompt_window: Option<usize>,

    /// Table-selection guidance embedded in the generation prompt
    pub guidance: String,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            max_context: DEFAULT_MAX_CONTEXT,
            prompt_window: None,
            guidance: DEFAULT_GUIDANCE.to_string(),
        }
    }
}

/// The conversational query pipeline
///
/// One in-flight question per agent: `ask` takes `&mut self`, so shared
/// use must be serialized by the caller (one agent per session, or an
/// external mutex).
pub struct Agent<M, Q> {
    model: M,
    capabilities: CapabilitySet<Q>,
    context: Context,
    options: AgentOptions,
}

impl<M, Q> Agent<M, Q>
where
    M: LanguageModel,
    Q: SchemaProvider + QueryExecutor,
{
    /// Create an agent with default options
    pub fn new(model: M, query: Q) -> Self {
        Self::with_options(model, query, AgentOptions::default())
    }

    /// Create an agent with explicit options
    pub fn with_options(model: M, query: Q, options: AgentOptions) -> Self {
        Self {
            model,
            capabilities: CapabilitySet::new(query),
            context: Context::new(options.max_context),
            options,
        }
    }

    /// Answer a natural-language question
    ///
    /// The question is appended to the context before any model call; the
    /// final answer text is appended exactly once, whichever path produced
    /// it. Never fails: internal errors become the generic apology.
    pub async fn ask(&mut self, question: &str) -> ResponseEnvelope {
        self.context.push(Turn::user(question));
        let history = self.context.visible(self.options.prompt_window);

        let envelope = match self.run_pipeline(question, &history).await {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(code = e.error_code(), detail = %e.message(), "pipeline failed");
                ResponseEnvelope::text(APOLOGY)
            }
        };

        // A serialization failure here is contained the same way
        let (envelope, answer) = match envelope.answer_text() {
            Ok(answer) => (envelope, answer),
            Err(e) => {
                error!(detail = %e, "failed to serialize envelope");
                (ResponseEnvelope::text(APOLOGY), APOLOGY.to_string())
            }
        };

        self.context.push(Turn::assistant(answer));
        envelope
    }

    /// Apply a previously surfaced, user-confirmed write statement
    ///
    /// This is the only path that executes INSERT/UPDATE. Anything else is
    /// refused without touching the database.
    pub async fn execute_write(&self, sql: &str) -> WriteAck {
        if !StatementKind::classify(sql).requires_confirmation() {
            return WriteAck::failed(
                "only INSERT or UPDATE statements can be executed through the \
                 write confirmation flow",
            );
        }

        self.capabilities.query().execute_write(sql).await
    }

    /// Register an auxiliary capability (checked at registration time)
    pub fn register(&mut self, capability: Box<dyn AuxCapability>) -> Result<()> {
        self.capabilities.register(capability)
    }

    /// Report turn count, data-source kind, and capability names
    #[must_use]
    pub fn context_summary(&self) -> ContextSummary {
        ContextSummary {
            turns: self.context.len(),
            database: self.capabilities.query().kind().as_str().to_string(),
            capabilities: self.capabilities.names(),
        }
    }

    /// Reset the conversation log; capabilities are untouched
    pub fn clear_context(&mut self) {
        self.context.clear();
    }

    /// Close auxiliary capabilities holding resources
    pub fn close(&mut self) {
        self.capabilities.close_all();
    }

    /// The generate → execute → correct → shape sequence
    async fn run_pipeline(&self, question: &str, history: &[Turn]) -> Result<ResponseEnvelope> {
        let query = self.capabilities.query();
        let dialect = query.kind().dialect();
        let schema = query.describe_schema().await?;

        // Attempt 1
        let sql = self.generate_sql(dialect, &schema, question, history).await?;
        if sql == NO_QUERY {
            return Ok(ResponseEnvelope::text(CANNOT_ANSWER));
        }
        if StatementKind::classify(&sql).requires_confirmation() {
            return Ok(ResponseEnvelope::confirm(sql));
        }

        let (final_sql, rows) = match query.execute(&sql).await {
            ResultSet::Rows(rows) => {
                QueryAttempt::new(&sql, 1, true).log();
                (sql, rows)
            }
            ResultSet::Error(first_error) => {
                QueryAttempt::new(&sql, 1, false).log();
                warn!(error = %first_error, "first attempt failed, correcting once");
                match self.correct_once(dialect, question, &sql, &first_error, history).await? {
                    Corrected::Unanswerable => {
                        return Ok(ResponseEnvelope::text(format!(
                            "{CANNOT_ANSWER} The first attempt failed with: {first_error}"
                        )));
                    }
                    Corrected::NeedsConfirmation(sql) => {
                        return Ok(ResponseEnvelope::confirm(sql));
                    }
                    Corrected::Failed(second_error) => {
                        // Second error verbatim; no third attempt
                        return Ok(ResponseEnvelope::text(format!("Error: {second_error}")));
                    }
                    Corrected::Rows(sql, rows) => (sql, rows),
                }
            }
        };

        shape::shape_response(&self.model, question, &final_sql, &rows, history).await
    }

    /// The single permitted correction attempt
    async fn correct_once(
        &self,
        dialect: &str,
        question: &str,
        failed_sql: &str,
        error_text: &str,
        history: &[Turn],
    ) -> Result<Corrected> {
        let prompt = prompt::correction(dialect, question, failed_sql, error_text);
        let reply = self.model.ask(&prompt, history).await?;
        let sql = strip_code_fence(&reply);

        if sql == NO_QUERY {
            return Ok(Corrected::Unanswerable);
        }
        if StatementKind::classify(&sql).requires_confirmation() {
            return Ok(Corrected::NeedsConfirmation(sql));
        }

        match self.capabilities.query().execute(&sql).await {
            ResultSet::Rows(rows) => {
                QueryAttempt::new(&sql, 2, true).log();
                Ok(Corrected::Rows(sql, rows))
            }
            ResultSet::Error(second_error) => {
                QueryAttempt::new(&sql, 2, false).log();
                Ok(Corrected::Failed(second_error))
            }
        }
    }

    async fn generate_sql(
        &self,
        dialect: &str,
        schema: &str,
        question: &str,
        history: &[Turn],
    ) -> Result<String> {
        let prompt = prompt::generation(dialect, schema, &self.options.guidance, question);
        let reply = self.model.ask(&prompt, history).await?;
        Ok(strip_code_fence(&reply))
    }
}

/// Result of the correction attempt
enum Corrected {
    /// The model declined with the sentinel
    Unanswerable,
    /// The corrected statement is a write; route to confirmation
    NeedsConfirmation(String),
    /// The corrected statement also failed; the second error text
    Failed(String),
    /// The corrected statement produced rows
    Rows(String, Rows),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_outcome_mapping() {
        let ok = QueryAttempt::new("SELECT 1", 1, true);
        assert_eq!(ok.outcome, AttemptOutcome::Success);
        assert_eq!(ok.attempt_number, 1);

        let failed = QueryAttempt::new("SELECT nope", 2, false);
        assert_eq!(failed.outcome, AttemptOutcome::Failed);
        assert_eq!(failed.attempt_number, 2);
    }

    #[test]
    fn test_context_summary_serialization() {
        let summary = ContextSummary {
            turns: 4,
            database: "sqlite".to_string(),
            capabilities: vec!["query".to_string()],
        };

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains(r#""turns":4"#));
        assert!(json.contains(r#""database":"sqlite""#));
        assert!(json.contains(r#""capabilities":["query"]"#));
    }

    #[test]
    fn test_default_options() {
        let options = AgentOptions::default();
        assert_eq!(options.max_context, DEFAULT_MAX_CONTEXT);
        assert!(options.prompt_window.is_none());
        assert!(!options.guidance.is_empty());
    }
}
