use once_cell::sync::Lazy;
use regex::Regex;

/// statement kinds accepted for execution
pub const ALLOWED_KEYWORDS: [&str; 6] = ["SELECT", "INSERT", "UPDATE", "DELETE", "CREATE", "DROP"];

/// fixed substitute returned whenever generated text fails validation;
/// surfaces the failure as a result row instead of a fault
pub const INVALID_GENERATION_SENTINEL: &str =
    "SELECT 'Invalid query generated. Please rephrase.' AS error;";

static FENCE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?:sql)?").unwrap());

/// reduce raw model output to exactly one terminated statement.
///
/// lines that are blank, fence markers or comments are dropped, the rest is
/// flattened to a single line, anything past the first terminator is cut,
/// and the leading keyword is checked against the allow-list. output is
/// always non-empty, single-statement and semicolon-terminated.
pub fn normalize_statement(raw: &str) -> String {
    let mut kept = Vec::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty()
            || line.starts_with("```")
            || line.starts_with('#')
            || line.starts_with("--")
        {
            continue;
        }
        kept.push(line);
    }

    let joined = kept.join(" ");
    let mut sql = FENCE_MARKER.replace_all(&joined, "").trim().to_string();

    // keep only the first statement
    if let Some(terminator) = sql.find(';') {
        sql.truncate(terminator);
        sql = sql.trim_end().to_string();
    }

    if !sql.is_empty() {
        sql.push(';');
    }

    if has_allowed_keyword(&sql) {
        sql
    } else {
        tracing::warn!(rejected = %sql, "generated text failed the keyword gate");
        INVALID_GENERATION_SENTINEL.to_string()
    }
}

fn has_allowed_keyword(sql: &str) -> bool {
    let upper = sql.to_uppercase();
    ALLOWED_KEYWORDS.iter().any(|kw| upper.starts_with(kw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_select_passes() {
        assert_eq!(normalize_statement("SELECT * FROM users;"), "SELECT * FROM users;");
    }

    #[test]
    fn test_missing_terminator_is_appended() {
        assert_eq!(normalize_statement("SELECT * FROM users"), "SELECT * FROM users;");
    }

    #[test]
    fn test_fenced_block_is_unwrapped() {
        let raw = "```sql\nDELETE FROM users;\n```";
        assert_eq!(normalize_statement(raw), "DELETE FROM users;");
    }

    #[test]
    fn test_multi_line_statement_is_flattened() {
        let raw = "SELECT id, name\nFROM users\nWHERE id > 3";
        assert_eq!(normalize_statement(raw), "SELECT id, name FROM users WHERE id > 3;");
    }

    #[test]
    fn test_comment_lines_are_dropped() {
        let raw = "# here is your query\n-- generated\nSELECT 1";
        assert_eq!(normalize_statement(raw), "SELECT 1;");
    }

    #[test]
    fn test_only_first_statement_is_kept() {
        let raw = "SELECT 1; DROP TABLE users;";
        assert_eq!(normalize_statement(raw), "SELECT 1;");
    }

    #[test]
    fn test_lowercase_keyword_is_accepted_unchanged() {
        assert_eq!(normalize_statement("select * from users"), "select * from users;");
    }

    #[test]
    fn test_refusal_text_becomes_sentinel() {
        let out = normalize_statement("I cannot help with that.");
        assert_eq!(out, INVALID_GENERATION_SENTINEL);
    }

    #[test]
    fn test_empty_output_becomes_sentinel() {
        assert_eq!(normalize_statement(""), INVALID_GENERATION_SENTINEL);
        assert_eq!(normalize_statement("\n\n```\n```\n"), INVALID_GENERATION_SENTINEL);
    }

    #[test]
    fn test_output_is_always_terminated_and_allow_listed() {
        let samples = [
            "SELECT * FROM t",
            "```sql\nINSERT INTO t VALUES (1)\n```",
            "update t set a = 1;",
            "nonsense",
            "",
            "EXPLAIN QUERY PLAN SELECT 1;",
            "PRAGMA table_info('t');",
        ];

        for raw in samples {
            let out = normalize_statement(raw);
            assert!(out.ends_with(';'), "not terminated: {}", out);
            let upper = out.to_uppercase();
            assert!(
                ALLOWED_KEYWORDS.iter().any(|kw| upper.starts_with(kw)),
                "keyword not allow-listed: {}",
                out
            );
        }
    }
}
