//! Pipeline Behavior Tests
//!
//! Exercises the full ask pipeline against scripted collaborators:
//! - Sentinel handling (no execution, fixed reply)
//! - The single correction attempt and its bound
//! - Write interception and the two-step confirm protocol
//! - Context capping and administrative operations
//! - Classification of text/table/chart answers
//!
//! The mocks record every prompt, executed statement, and write, so the
//! tests can assert what did NOT happen as well as what did.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;

use tabletalk::context::Turn;
use tabletalk::engine::{
    DatabaseKind, QueryExecutor, ResultRow, ResultSet, Rows, SchemaProvider, WriteAck,
};
use tabletalk::error::{Result, TabletalkError};
use tabletalk::model::LanguageModel;
use tabletalk::pipeline::{Agent, AgentOptions, APOLOGY, CANNOT_ANSWER};
use tabletalk::{AuxCapability, ResponseEnvelope};

// ============================================================================
// Scripted Collaborators
// ============================================================================

/// Model that replays scripted replies and records every prompt
#[derive(Clone, Default)]
struct ScriptedModel {
    replies: Arc<Mutex<VecDeque<String>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    history_lens: Arc<Mutex<Vec<usize>>>,
}

impl ScriptedModel {
    fn with_replies(replies: &[&str]) -> Self {
        let model = Self::default();
        model.replies.lock().unwrap().extend(replies.iter().map(ToString::to_string));
        model
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

impl LanguageModel for ScriptedModel {
    async fn ask(&self, prompt: &str, history: &[Turn]) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.history_lens.lock().unwrap().push(history.len());

        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TabletalkError::model_failed("no scripted reply left"))
    }
}

/// Data source that replays scripted results and records statements
#[derive(Clone, Default)]
struct ScriptedSource {
    results: Arc<Mutex<VecDeque<ResultSet>>>,
    executed: Arc<Mutex<Vec<String>>>,
    writes: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSource {
    fn with_results(results: Vec<ResultSet>) -> Self {
        let source = Self::default();
        source.results.lock().unwrap().extend(results);
        source
    }

    fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }
}

impl SchemaProvider for ScriptedSource {
    async fn describe_schema(&self) -> Result<String> {
        Ok("DATABASE SCHEMA (SQLite):\n\nTable: products\n  - id: INTEGER (PRIMARY KEY)\n  - name: TEXT\n  Row count: 5\n".to_string())
    }
}

impl QueryExecutor for ScriptedSource {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::SQLite
    }

    async fn execute(&self, sql: &str) -> ResultSet {
        self.executed.lock().unwrap().push(sql.to_string());
        self.results.lock().unwrap().pop_front().unwrap_or_else(ResultSet::empty)
    }

    async fn execute_write(&self, sql: &str) -> WriteAck {
        self.writes.lock().unwrap().push(sql.to_string());
        WriteAck::ok("1 row(s) affected")
    }
}

fn row(pairs: &[(&str, serde_json::Value)]) -> ResultRow {
    let mut map = ResultRow::new();
    for (key, value) in pairs {
        map.insert((*key).to_string(), value.clone());
    }
    map
}

fn rows(columns: &[&str], data: Vec<ResultRow>) -> ResultSet {
    ResultSet::Rows(Rows {
        columns: columns.iter().map(ToString::to_string).collect(),
        rows: data,
    })
}

// ============================================================================
// Sentinel Handling
// ============================================================================

#[tokio::test]
async fn sentinel_reply_skips_executor() {
    let model = ScriptedModel::with_replies(&["NO_QUERY"]);
    let source = ScriptedSource::default();
    let mut agent = Agent::new(model.clone(), source.clone());

    let envelope = agent.ask("What is the meaning of life?").await;

    assert_eq!(envelope, ResponseEnvelope::text(CANNOT_ANSWER));
    assert!(source.executed().is_empty(), "no executor call may happen");
    assert_eq!(model.call_count(), 1, "only the generation call");
}

#[tokio::test]
async fn fenced_sentinel_is_still_sentinel() {
    let model = ScriptedModel::with_replies(&["```\nNO_QUERY\n```"]);
    let source = ScriptedSource::default();
    let mut agent = Agent::new(model, source.clone());

    let envelope = agent.ask("Unanswerable?").await;

    assert_eq!(envelope, ResponseEnvelope::text(CANNOT_ANSWER));
    assert!(source.executed().is_empty());
}

// ============================================================================
// Self-Correction
// ============================================================================

#[tokio::test]
async fn one_correction_embeds_failed_sql_and_error() {
    let model = ScriptedModel::with_replies(&[
        "SELECT nam FROM products",
        "SELECT name FROM products",
        "Here are the products.",
    ]);
    let source = ScriptedSource::with_results(vec![
        ResultSet::error("no such column: nam"),
        rows(&["name"], vec![row(&[("name", serde_json::json!("Aspirin"))])]),
    ]);
    let mut agent = Agent::new(model.clone(), source.clone());

    let envelope = agent.ask("List product names").await;

    // Generation, correction, classification: three model calls
    assert_eq!(model.call_count(), 3);

    let prompts = model.prompts();
    assert!(prompts[1].contains("SELECT nam FROM products"), "correction embeds the failed SQL");
    assert!(prompts[1].contains("no such column: nam"), "correction embeds the error verbatim");

    assert_eq!(source.executed().len(), 2);
    assert_eq!(envelope, ResponseEnvelope::text("Here are the products."));
}

#[tokio::test]
async fn second_failure_surfaces_second_error_without_third_attempt() {
    let model = ScriptedModel::with_replies(&[
        "SELECT nam FROM products",
        "SELECT nme FROM products",
    ]);
    let source = ScriptedSource::with_results(vec![
        ResultSet::error("no such column: nam"),
        ResultSet::error("no such column: nme"),
    ]);
    let mut agent = Agent::new(model.clone(), source.clone());

    let envelope = agent.ask("List product names").await;

    match envelope {
        ResponseEnvelope::Text { content } => {
            assert!(content.contains("no such column: nme"), "second error appears");
            assert!(!content.contains("no such column: nam"), "first error does not");
        }
        other => panic!("expected text, got {other:?}"),
    }

    // Generation + correction only; no classification, no third generation
    assert_eq!(model.call_count(), 2);
    assert_eq!(source.executed().len(), 2);
}

#[tokio::test]
async fn corrected_sentinel_reports_original_error() {
    let model = ScriptedModel::with_replies(&["SELECT x FROM missing", "NO_QUERY"]);
    let source =
        ScriptedSource::with_results(vec![ResultSet::error("no such table: missing")]);
    let mut agent = Agent::new(model.clone(), source.clone());

    let envelope = agent.ask("Query a table that is not there").await;

    match envelope {
        ResponseEnvelope::Text { content } => {
            assert!(content.starts_with(CANNOT_ANSWER));
            assert!(content.contains("no such table: missing"), "original error is included");
        }
        other => panic!("expected text, got {other:?}"),
    }
    assert_eq!(source.executed().len(), 1);
}

// ============================================================================
// Write Interception
// ============================================================================

#[tokio::test]
async fn insert_is_intercepted_not_executed() {
    let sql = "INSERT INTO products (name) VALUES ('Ibuprofen')";
    let model = ScriptedModel::with_replies(&[sql]);
    let source = ScriptedSource::default();
    let mut agent = Agent::new(model, source.clone());

    let envelope = agent.ask("Add Ibuprofen to the products").await;

    match envelope {
        ResponseEnvelope::Confirm { sql_query, .. } => assert_eq!(sql_query, sql),
        other => panic!("expected confirm, got {other:?}"),
    }
    assert!(source.executed().is_empty(), "intercepted writes never reach execute");
    assert!(source.writes().is_empty(), "ask never calls execute_write");
}

#[tokio::test]
async fn update_from_correction_is_also_intercepted() {
    let update = "UPDATE products SET price = 2 WHERE id = 1";
    let model = ScriptedModel::with_replies(&["SELECT broken", update]);
    let source = ScriptedSource::with_results(vec![ResultSet::error("syntax error")]);
    let mut agent = Agent::new(model, source.clone());

    let envelope = agent.ask("Set the price of product 1 to 2").await;

    match envelope {
        ResponseEnvelope::Confirm { sql_query, .. } => assert_eq!(sql_query, update),
        other => panic!("expected confirm, got {other:?}"),
    }
    assert_eq!(source.executed().len(), 1, "only the failed first attempt ran");
    assert!(source.writes().is_empty());
}

#[tokio::test]
async fn execute_write_entry_point_applies_confirmed_statement() {
    let model = ScriptedModel::default();
    let source = ScriptedSource::default();
    let agent = Agent::new(model, source.clone());

    let ack = agent.execute_write("INSERT INTO products (name) VALUES ('x')").await;

    assert!(ack.success);
    assert_eq!(source.writes().len(), 1);
}

#[tokio::test]
async fn execute_write_refuses_non_write_statements() {
    let model = ScriptedModel::default();
    let source = ScriptedSource::default();
    let agent = Agent::new(model, source.clone());

    let ack = agent.execute_write("DROP TABLE products").await;

    assert!(!ack.success);
    assert!(source.writes().is_empty(), "refused statements never reach the database");
}

// ============================================================================
// Classification Boundaries
// ============================================================================

#[tokio::test]
async fn scalar_count_classifies_as_text() {
    let model = ScriptedModel::with_replies(&[
        "SELECT COUNT(*) AS count FROM products",
        "There are 5 products.",
    ]);
    let source = ScriptedSource::with_results(vec![rows(
        &["count"],
        vec![row(&[("count", serde_json::json!(5))])],
    )]);
    let mut agent = Agent::new(model, source);

    let envelope = agent.ask("How many products are there?").await;

    match envelope {
        ResponseEnvelope::Text { content } => assert!(content.contains('5')),
        other => panic!("expected text, got {other:?}"),
    }
}

#[tokio::test]
async fn listing_classifies_as_table_with_all_rows() {
    let listing: Vec<ResultRow> = (0..20)
        .map(|i| row(&[("name", serde_json::json!(format!("Product {i}")))]))
        .collect();

    let table_reply = serde_json::json!({
        "type": "table",
        "title": "Products",
        "content": listing.iter().cloned().map(serde_json::Value::Object).collect::<Vec<_>>(),
    })
    .to_string();

    let model = ScriptedModel::with_replies(&["SELECT name FROM products", &table_reply]);
    let source = ScriptedSource::with_results(vec![rows(&["name"], listing)]);
    let mut agent = Agent::new(model, source);

    let envelope = agent.ask("List the products").await;

    match envelope {
        ResponseEnvelope::Table { title, content } => {
            assert_eq!(title, "Products");
            assert_eq!(content.len(), 20, "all rows under content");
        }
        other => panic!("expected table, got {other:?}"),
    }
}

#[tokio::test]
async fn grouped_time_series_classifies_as_chart() {
    let series = vec![
        row(&[("day", serde_json::json!("2024-03-01")), ("total", serde_json::json!(120.5))]),
        row(&[("day", serde_json::json!("2024-03-02")), ("total", serde_json::json!(98.0))]),
    ];

    let chart_reply = serde_json::json!({
        "type": "chart",
        "chart_type": "line",
        "title": "Daily sales",
        "content": series.iter().cloned().map(serde_json::Value::Object).collect::<Vec<_>>(),
        "label_key": "day",
        "data_key": "total",
    })
    .to_string();

    let model = ScriptedModel::with_replies(&[
        "SELECT day, SUM(amount) AS total FROM sales GROUP BY day",
        &chart_reply,
    ]);
    let source = ScriptedSource::with_results(vec![rows(&["day", "total"], series)]);
    let mut agent = Agent::new(model, source);

    let envelope = agent.ask("Daily sales report").await;

    match envelope {
        ResponseEnvelope::Chart { chart_type, label_key, data_key, content, .. } => {
            assert_eq!(chart_type.as_str(), "line");
            assert_eq!(label_key, "day");
            assert_eq!(data_key, "total");
            assert!(!content.is_empty());
            // Keys name real columns from the result
            assert!(content[0].get("day").is_some());
            assert!(content[0].get("total").is_some());
        }
        other => panic!("expected chart, got {other:?}"),
    }
}

#[tokio::test]
async fn fenced_classification_reply_is_unwrapped() {
    let reply = "```json\n{\"type\": \"table\", \"title\": \"T\", \"content\": [{\"a\": 1}]}\n```";
    let model = ScriptedModel::with_replies(&["SELECT a FROM t", reply]);
    let source = ScriptedSource::with_results(vec![rows(
        &["a"],
        vec![row(&[("a", serde_json::json!(1))])],
    )]);
    let mut agent = Agent::new(model, source);

    let envelope = agent.ask("List t").await;
    assert!(matches!(envelope, ResponseEnvelope::Table { .. }));
}

// ============================================================================
// Context Management
// ============================================================================

#[tokio::test]
async fn context_is_capped() {
    let model = ScriptedModel::with_replies(&[
        "NO_QUERY", "NO_QUERY", "NO_QUERY", "NO_QUERY", "NO_QUERY",
    ]);
    let source = ScriptedSource::default();
    let options = AgentOptions { max_context: 4, ..AgentOptions::default() };
    let mut agent = Agent::with_options(model, source, options);

    for i in 0..5 {
        agent.ask(&format!("question {i}")).await;
    }

    // 10 turns appended, only the cap retained
    assert_eq!(agent.context_summary().turns, 4);
}

#[tokio::test]
async fn prompt_window_limits_visible_history() {
    let model = ScriptedModel::with_replies(&["NO_QUERY", "NO_QUERY"]);
    let source = ScriptedSource::default();
    let options = AgentOptions { prompt_window: Some(1), ..AgentOptions::default() };
    let mut agent = Agent::with_options(model.clone(), source, options);

    agent.ask("first question").await;
    agent.ask("second question").await;

    let lens = model.history_lens.lock().unwrap().clone();
    // Each generation call saw exactly one trailing turn (the question itself)
    assert_eq!(lens, vec![1, 1]);
}

#[tokio::test]
async fn clear_context_preserves_capabilities() {
    struct Notifier;
    impl AuxCapability for Notifier {
        fn name(&self) -> &str {
            "notify"
        }
    }

    let model = ScriptedModel::with_replies(&["NO_QUERY"]);
    let source = ScriptedSource::default();
    let mut agent = Agent::new(model, source);
    agent.register(Box::new(Notifier)).unwrap();

    agent.ask("anything").await;
    assert_eq!(agent.context_summary().turns, 2);

    agent.clear_context();

    let summary = agent.context_summary();
    assert_eq!(summary.turns, 0);
    assert_eq!(summary.database, "sqlite");
    assert_eq!(summary.capabilities, vec!["query", "notify"]);
}

// ============================================================================
// Failure Containment
// ============================================================================

#[tokio::test]
async fn model_failure_becomes_apology_and_is_recorded() {
    // No scripted replies: the model errors on the first call
    let model = ScriptedModel::default();
    let source = ScriptedSource::default();
    let mut agent = Agent::new(model, source.clone());

    let envelope = agent.ask("anything").await;

    assert_eq!(envelope, ResponseEnvelope::text(APOLOGY));
    assert!(source.executed().is_empty());
    // Question and apology are both in the log
    assert_eq!(agent.context_summary().turns, 2);
}

#[tokio::test]
async fn classification_failure_is_contained_too() {
    // Generation succeeds, execution succeeds, classification call errors
    let model = ScriptedModel::with_replies(&["SELECT name FROM products"]);
    let source = ScriptedSource::with_results(vec![rows(
        &["name"],
        vec![row(&[("name", serde_json::json!("Aspirin"))])],
    )]);
    let mut agent = Agent::new(model, source);

    let envelope = agent.ask("List products").await;
    assert_eq!(envelope, ResponseEnvelope::text(APOLOGY));
}

// ============================================================================
// Generation Post-Processing
// ============================================================================

#[tokio::test]
async fn fenced_sql_is_stripped_before_execution() {
    let model = ScriptedModel::with_replies(&[
        "```sql\nSELECT name FROM products\n```",
        "One product.",
    ]);
    let source = ScriptedSource::with_results(vec![rows(
        &["name"],
        vec![row(&[("name", serde_json::json!("Aspirin"))])],
    )]);
    let mut agent = Agent::new(model, source.clone());

    agent.ask("List products").await;

    assert_eq!(source.executed(), vec!["SELECT name FROM products"]);
}
