//! SQL Statement Classification
//!
//! Best-effort classification of a generated statement by its leading
//! keyword. This is a coarse guard, not a SQL parser: the model is trusted
//! for intent but not for syntax, so a prefix check is enough to route
//! INSERT/UPDATE statements into the write-confirmation protocol.
//!
//! Leading whitespace and leading SQL comments are removed before the
//! keyword is read, so a model reply like `-- add the row\nINSERT ...` is
//! still intercepted.

/// Coarse statement category derived from the leading keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// SELECT (or any other read-shaped statement the executor accepts)
    Read,
    /// INSERT: mutating, requires confirmation
    Insert,
    /// UPDATE: mutating, requires confirmation
    Update,
}

impl StatementKind {
    /// Classify a statement by its leading keyword (case-insensitive)
    #[must_use]
    pub fn classify(sql: &str) -> Self {
        let stripped = strip_leading_comments(sql);
        let keyword: String = stripped
            .trim_start()
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_uppercase();

        match keyword.as_str() {
            "INSERT" => Self::Insert,
            "UPDATE" => Self::Update,
            _ => Self::Read,
        }
    }

    /// Whether this statement must go through the propose/confirm protocol
    #[must_use]
    pub const fn requires_confirmation(&self) -> bool {
        matches!(self, Self::Insert | Self::Update)
    }
}

/// Remove leading line (`--`) and block (`/* */`) comments plus whitespace
fn strip_leading_comments(sql: &str) -> &str {
    let mut rest = sql.trim_start();

    loop {
        if let Some(after) = rest.strip_prefix("--") {
            // Line comment: skip until newline (or end of input)
            rest = match after.find('\n') {
                Some(pos) => after[pos + 1..].trim_start(),
                None => "",
            };
        } else if let Some(after) = rest.strip_prefix("/*") {
            // Block comment: skip until */
            rest = match after.find("*/") {
                Some(pos) => after[pos + 2..].trim_start(),
                None => "",
            };
        } else {
            return rest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_is_read() {
        assert_eq!(StatementKind::classify("SELECT * FROM products"), StatementKind::Read);
        assert!(!StatementKind::classify("SELECT 1").requires_confirmation());
    }

    #[test]
    fn test_insert_detected() {
        let kind = StatementKind::classify("INSERT INTO products (name) VALUES ('x')");
        assert_eq!(kind, StatementKind::Insert);
        assert!(kind.requires_confirmation());
    }

    #[test]
    fn test_update_detected() {
        let kind = StatementKind::classify("UPDATE products SET price = 2 WHERE id = 1");
        assert_eq!(kind, StatementKind::Update);
        assert!(kind.requires_confirmation());
    }

    #[test]
    fn test_case_insensitive_and_padded() {
        assert_eq!(
            StatementKind::classify("   insert into t values (1)  "),
            StatementKind::Insert
        );
        assert_eq!(StatementKind::classify("\n\tUpDaTe t SET a = 1"), StatementKind::Update);
    }

    #[test]
    fn test_leading_line_comment_skipped() {
        let sql = "-- add the new supplier\nINSERT INTO suppliers (name) VALUES ('Acme')";
        assert_eq!(StatementKind::classify(sql), StatementKind::Insert);
    }

    #[test]
    fn test_leading_block_comment_skipped() {
        let sql = "/* requested by user */ UPDATE suppliers SET city = 'Cali'";
        assert_eq!(StatementKind::classify(sql), StatementKind::Update);
    }

    #[test]
    fn test_other_statements_are_read() {
        // Non-intercepted kinds run through the executor and surface there
        assert_eq!(StatementKind::classify("WITH c AS (SELECT 1) SELECT * FROM c"), StatementKind::Read);
        assert_eq!(StatementKind::classify("PRAGMA table_info(products)"), StatementKind::Read);
        assert_eq!(StatementKind::classify("DELETE FROM products"), StatementKind::Read);
    }

    #[test]
    fn test_comment_only_input_is_read() {
        assert_eq!(StatementKind::classify("-- nothing here"), StatementKind::Read);
        assert_eq!(StatementKind::classify("/* unterminated"), StatementKind::Read);
    }

    #[test]
    fn test_insert_inside_text_not_matched() {
        // Only the LEADING keyword counts
        assert_eq!(
            StatementKind::classify("SELECT * FROM log WHERE action = 'INSERT'"),
            StatementKind::Read
        );
    }
}
