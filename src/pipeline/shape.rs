//! Response Shaping Stage
//!
//! Turns an executed result set into a [`ResponseEnvelope`]: serialize the
//! rows (size-bounded), ask the model to classify the presentation as
//! text, table, or chart, and post-process the reply.

use crate::context::Turn;
use crate::engine::Rows;
use crate::envelope::{self, ResponseEnvelope};
use crate::error::Result;
use crate::model::LanguageModel;
use crate::prompt;

/// Cap on the serialized result text embedded in the classification prompt
pub const MAX_SERIALIZED_CHARS: usize = 3000;

/// Appended when the serialized results exceed the cap
pub const TRUNCATION_MARKER: &str = "... (truncated)";

/// Classify and format the executed result
pub async fn shape_response<M: LanguageModel>(
    model: &M,
    question: &str,
    sql: &str,
    rows: &Rows,
    history: &[Turn],
) -> Result<ResponseEnvelope> {
    let serialized = serialize_rows(rows)?;
    let prompt = prompt::classification(question, sql, &serialized);
    let reply = model.ask(&prompt, history).await?;

    Ok(envelope::parse_shaped_reply(&reply))
}

/// Serialize rows to size-bounded JSON text
///
/// Values are already normalized by the engines (decimals as numbers,
/// temporal values as ISO-8601 strings), so plain JSON encoding is
/// lossless here.
pub fn serialize_rows(rows: &Rows) -> Result<String> {
    let text = serde_json::to_string(&rows.to_json_objects())?;
    Ok(truncate(text))
}

/// Truncate at a char boundary and append the marker
fn truncate(text: String) -> String {
    if text.chars().count() <= MAX_SERIALIZED_CHARS {
        return text;
    }

    let cut: String = text.chars().take(MAX_SERIALIZED_CHARS).collect();
    format!("{cut}{TRUNCATION_MARKER}")
}
