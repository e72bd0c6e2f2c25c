//! Read-only statement guard
//!
//! A keyword heuristic, not a parser. A statement passes when it starts with
//! `SELECT` and contains none of [`DISALLOWED_KEYWORDS`] as a token preceded
//! by a space or `;` and followed by a space.
//!
//! Known gaps, kept intentionally:
//! - a keyword at the very end of the text (`... ; DROP`) is not seen
//! - keywords inside string literals or comments are matched like any text
//! - keywords without surrounding spaces (`;DROP\tTABLE`) slip through
//!
//! The PostgreSQL driver prepares statements with the extended protocol,
//! which refuses multiple commands in one statement, so the gaps above do not
//! open a path to chained writes there.

/// Keywords that mark a statement as mutating
pub const DISALLOWED_KEYWORDS: [&str; 9] = [
    "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TRUNCATE", "GRANT", "REVOKE",
];

/// Check if a query is a read-only SELECT statement
pub fn is_read_only(query: &str) -> bool {
    let normalized = query.trim().to_uppercase();

    if !normalized.starts_with("SELECT") {
        return false;
    }

    !DISALLOWED_KEYWORDS.iter().any(|keyword| {
        normalized.contains(&format!(" {} ", keyword))
            || normalized.contains(&format!(";{} ", keyword))
    })
}
