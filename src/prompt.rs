//! Prompt Construction
//!
//! All prompt text sent to the language model is built here, so the three
//! pipeline stages (generation, correction, classification) stay consistent
//! about wording and constraints.
//!
//! The prompts are deliberately terse: the schema description usually
//! dominates the prompt length, so instructions are kept to the rules the
//! model actually has to obey.

/// Literal sentinel the model returns when no SQL can answer the question
pub const NO_QUERY: &str = "NO_QUERY";

/// Default table-selection guidance embedded in the generation prompt
///
/// Deployments with domain-specific preferred views or tables override
/// this via configuration.
pub const DEFAULT_GUIDANCE: &str = "\
- Prefer views over base tables when both expose the requested data.\n\
- For report or trend questions, aggregate with GROUP BY instead of returning raw rows.";

/// Build the SQL generation prompt
///
/// Combines the dialect-named role preamble, the schema description,
/// table-selection guidance, the question, and the output constraints
/// (single statement, sentinel, read-only by default).
#[must_use]
pub fn generation(dialect: &str, schema: &str, guidance: &str, question: &str) -> String {
    format!(
        "You are an expert {dialect} SQL engineer.\n\n\
         {schema}\n\
         Guidance:\n{guidance}\n\n\
         Question: {question}\n\n\
         Rules:\n\
         - Reply with a single {dialect} SQL statement and nothing else. No prose.\n\
         - If the question cannot be answered from this schema, reply with exactly: {NO_QUERY}\n\
         - Never produce destructive statements (DROP, ALTER, DELETE, TRUNCATE).\n\
         - Produce INSERT or UPDATE only when the user explicitly asks to add or \
           change data; otherwise stay read-only."
    )
}

/// Build the single correction prompt after an executor error
///
/// Embeds the question, the failed SQL, and the database error text
/// verbatim; the error message is usually what names the wrong column or
/// the syntax slip.
#[must_use]
pub fn correction(dialect: &str, question: &str, failed_sql: &str, error: &str) -> String {
    format!(
        "The following {dialect} SQL statement failed.\n\n\
         Question: {question}\n\n\
         Statement:\n{failed_sql}\n\n\
         Database error:\n{error}\n\n\
         Reply with a corrected {dialect} SQL statement and nothing else. \
         If the question cannot be answered, reply with exactly: {NO_QUERY}"
    )
}

/// Build the answer-classification prompt
///
/// The model chooses exactly one presentation: a chart or table envelope
/// as a bare JSON object, or a plain-text answer.
#[must_use]
pub fn classification(question: &str, sql: &str, serialized_results: &str) -> String {
    format!(
        "The user asked: {question}\n\n\
         This SQL was executed:\n{sql}\n\n\
         Results:\n{serialized_results}\n\n\
         Choose exactly ONE way to present the answer:\n\n\
         1. chart - only when the question asks for an aggregation, report, or trend \
         AND the results are a grouped or time-series aggregation with at least one row. \
         Reply with a bare JSON object:\n\
         {{\"type\": \"chart\", \"chart_type\": \"bar\", \"title\": \"...\", \
         \"content\": [the result rows], \"label_key\": \"...\", \"data_key\": \"...\"}}\n\
         Use \"bar\" for categorical groupings and \"line\" for date-indexed series. \
         label_key and data_key must name real columns from the results.\n\n\
         2. table - when the question asks for a listing and there are multiple rows \
         that are not an aggregation report. Reply with a bare JSON object:\n\
         {{\"type\": \"table\", \"title\": \"...\", \"content\": [the result rows]}}\n\n\
         3. text - the default: single values, empty results, or conversational \
         answers. Reply with plain text only. Never use markdown emphasis such as \
         ** or *. Present amounts and lists with line breaks and hyphen bullets, \
         for example:\n\
         Here are the suppliers:\n\
         - Supplier 1\n\
         - Supplier 2\n\n\
         If no rows came back, say so politely in plain text."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_embeds_all_sections() {
        let prompt = generation(
            "SQLite",
            "DATABASE SCHEMA (SQLite):\n\nTable: products\n",
            DEFAULT_GUIDANCE,
            "How many products are there?",
        );

        assert!(prompt.contains("expert SQLite SQL engineer"));
        assert!(prompt.contains("Table: products"));
        assert!(prompt.contains("Prefer views over base tables"));
        assert!(prompt.contains("Question: How many products are there?"));
        assert!(prompt.contains(NO_QUERY));
        assert!(prompt.contains("DROP, ALTER, DELETE"));
    }

    #[test]
    fn test_correction_embeds_sql_and_error_verbatim() {
        let prompt = correction(
            "MySQL",
            "List products",
            "SELECT nam FROM products",
            "Unknown column 'nam' in 'field list'",
        );

        assert!(prompt.contains("SELECT nam FROM products"));
        assert!(prompt.contains("Unknown column 'nam' in 'field list'"));
        assert!(prompt.contains(NO_QUERY));
    }

    #[test]
    fn test_classification_lists_three_presentations() {
        let prompt = classification("Daily sales report", "SELECT ...", "[{\"day\": 1}]");

        assert!(prompt.contains("\"type\": \"chart\""));
        assert!(prompt.contains("\"type\": \"table\""));
        assert!(prompt.contains("plain text"));
        assert!(prompt.contains("label_key"));
        assert!(prompt.contains("hyphen bullets"));
    }
}
