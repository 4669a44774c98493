//! Response Envelope Types
//!
//! The shaped answer produced by the pipeline is a tagged variant: plain
//! text, a table, a chart specification, or a write-confirmation request.
//! Exactly one variant is active per answer.
//!
//! The core always returns the typed envelope. Only the boundary layer
//! (CLI, REPL, stdio server) serializes it: `text` renders as the plain
//! string, every other variant as its JSON object. Consumers attempt a
//! structured parse before display.
//!
//! # Output Contract
//! - Text: plain string (no JSON wrapping)
//! - Table: `{"type": "table", "title": "...", "content": [rows...]}`
//! - Chart: `{"type": "chart", "chart_type": "bar"|"line", "title": "...",
//!   "content": [rows...], "label_key": "...", "data_key": "..."}`
//! - Confirm: `{"type": "confirm", "title": "...", "message": "...",
//!   "sql_query": "..."}`

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Chart sub-type chosen by the classification stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    /// Categorical grouping
    Bar,
    /// Date-indexed series
    Line,
}

impl ChartType {
    /// Get the chart type as a string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bar => "bar",
            Self::Line => "line",
        }
    }
}

/// Shaped answer value, exactly one variant per answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResponseEnvelope {
    /// Conversational answer, plain text only (hyphen bullets, no markup)
    Text {
        /// The answer text
        content: String,
    },

    /// Row listing for enumeration-style questions
    Table {
        /// Short human-readable caption
        title: String,
        /// Result rows, one JSON object per row
        content: Vec<serde_json::Value>,
    },

    /// Chart specification for aggregation/report/trend questions
    Chart {
        /// Bar for categorical grouping, line for a date-indexed series
        chart_type: ChartType,
        /// Short human-readable caption
        title: String,
        /// Result rows backing the chart
        content: Vec<serde_json::Value>,
        /// Column name holding the category/date labels
        label_key: String,
        /// Column name holding the plotted values
        data_key: String,
    },

    /// Write-confirmation request: the statement was intercepted, not run
    Confirm {
        /// Short human-readable caption
        title: String,
        /// Explanation shown to the user before confirming
        message: String,
        /// The exact SQL text awaiting confirmation
        sql_query: String,
    },
}

impl ResponseEnvelope {
    /// Build a plain-text envelope
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text { content: content.into() }
    }

    /// Build a write-confirmation envelope carrying the exact SQL text
    pub fn confirm(sql_query: impl Into<String>) -> Self {
        let sql_query = sql_query.into();
        Self::Confirm {
            title: "Confirmation required".to_string(),
            message: "This statement modifies the database. Review the SQL below and \
                      confirm before it is executed."
                .to_string(),
            sql_query,
        }
    }

    /// Serialize the envelope into the answer text fed back to the caller
    /// and recorded in the conversation log
    ///
    /// Text renders as the bare string; every other variant as JSON.
    pub fn answer_text(&self) -> Result<String> {
        match self {
            Self::Text { content } => Ok(content.clone()),
            other => Ok(serde_json::to_string(other)?),
        }
    }

    /// Whether this is the confirmation variant
    #[must_use]
    pub const fn is_confirm(&self) -> bool {
        matches!(self, Self::Confirm { .. })
    }
}

/// Interpret the classification model's reply as an envelope
///
/// The model is asked to reply with either a bare JSON envelope object or
/// plain prose. Incidental ```json fences are removed first. Anything that
/// does not parse into a table or chart envelope is treated as text; the
/// model is trusted for intent, not for syntax. A `confirm` or nested
/// `text` object from the model is also demoted to plain text so the model
/// can never fabricate a write confirmation.
#[must_use]
pub fn parse_shaped_reply(raw: &str) -> ResponseEnvelope {
    let cleaned = crate::model::strip_code_fence(raw);

    if cleaned.starts_with('{') {
        if let Ok(envelope) = serde_json::from_str::<ResponseEnvelope>(&cleaned) {
            if matches!(
                envelope,
                ResponseEnvelope::Table { .. } | ResponseEnvelope::Chart { .. }
            ) {
                return envelope;
            }
        }
    }

    ResponseEnvelope::text(cleaned)
}
