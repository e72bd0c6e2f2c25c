//! Result helpers for MCP tool responses

use rmcp::model::{CallToolResult, Content};
use serde::Serialize;

use crate::error::{McpResult, ResultExt};

/// Create a successful tool response holding `data` as pretty-printed JSON
///
/// Serialization failures come back as an internal error rather than a
/// panic.
pub fn json_success<T: Serialize>(data: &T) -> McpResult<CallToolResult> {
    let json = serde_json::to_string_pretty(data).to_mcp_err()?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Table {
        columns: Vec<String>,
        rows: Vec<Vec<i64>>,
    }

    #[test]
    fn test_json_success() {
        let data = Table {
            columns: vec!["id".to_string()],
            rows: vec![vec![1], vec![2]],
        };
        let result = json_success(&data).unwrap();
        assert!(!result.is_error.unwrap_or(false));
        assert_eq!(result.content.len(), 1);
    }
}
