//! Search-query extraction and research fan-out
//!
//! Research steps ask the model for a list of search queries. Replies come
//! back in whatever shape the model felt like, so [`parse_queries`] accepts,
//! in order:
//!
//! 1. a JSON array of strings,
//! 2. a JSON object with a `queries` array,
//! 3. either of those embedded in prose or a fenced code block,
//! 4. bullet (`-`, `*`, `•`) or numbered (`1.`, `1)`) lines,
//! 5. failing all of the above, every non-empty line.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::{debug, warn};
use waypoint_core::SearchCaller;

/// Results requested per research query
pub const RESULTS_PER_QUERY: usize = 2;

fn list_item_regex() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s+(.+?)\s*$").ok())
        .as_ref()
}

/// Extract search queries from a model reply
pub fn parse_queries(reply: &str) -> Vec<String> {
    let text = reply.trim();
    if text.is_empty() {
        return Vec::new();
    }

    if let Some(queries) = from_json(text).or_else(|| embedded_json(text)) {
        return clean(queries);
    }

    let lines: Vec<&str> = text.lines().collect();
    let items: Vec<String> = match list_item_regex() {
        Some(re) => lines
            .iter()
            .filter_map(|line| re.captures(line))
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect(),
        None => Vec::new(),
    };
    if !items.is_empty() {
        return clean(items);
    }

    clean(
        lines
            .into_iter()
            .filter(|line| !line.trim_end().ends_with(':'))
            .map(str::to_string)
            .collect(),
    )
}

fn from_json(text: &str) -> Option<Vec<String>> {
    let items = match serde_json::from_str::<Value>(text).ok()? {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("queries")? {
            Value::Array(items) => items,
            _ => return None,
        },
        _ => return None,
    };
    Some(
        items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
    )
}

/// Widest `{...}` or `[...]` span in the text, parsed as JSON
fn embedded_json(text: &str) -> Option<Vec<String>> {
    let spans = [('{', '}'), ('[', ']')];
    spans.iter().find_map(|(open, close)| {
        let start = text.find(*open)?;
        let end = text.rfind(*close)?;
        (end > start)
            .then(|| &text[start..=end])
            .and_then(from_json)
    })
}

fn clean(queries: Vec<String>) -> Vec<String> {
    queries
        .into_iter()
        .map(|q| {
            q.trim()
                .trim_matches(|c| c == '"' || c == '\'' || c == '`')
                .trim()
                .to_string()
        })
        .filter(|q| !q.is_empty())
        .collect()
}

/// Run up to `limit` queries, collecting the content of every hit.
///
/// A failed search contributes nothing; the remaining queries still run.
pub async fn run_searches(search: &dyn SearchCaller, queries: &[String], limit: usize) -> Vec<String> {
    let mut content = Vec::new();
    for query in queries.iter().take(limit) {
        match search.search(query, RESULTS_PER_QUERY).await {
            Ok(results) => {
                debug!(query = %query, hits = results.len(), "Search completed");
                content.extend(results.into_iter().map(|r| r.content));
            }
            Err(e) => warn!(query = %query, error = %e, "Search failed, skipping query"),
        }
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use waypoint_core::testing::ScriptedSearch;

    #[test]
    fn test_json_shapes() {
        assert_eq!(parse_queries(r#"["a", "b"]"#), vec!["a", "b"]);
        assert_eq!(parse_queries(r#"{"queries": ["x", " y "]}"#), vec!["x", "y"]);
        assert_eq!(
            parse_queries("Here you go:\n```json\n{\"queries\": [\"bali weather\"]}\n```"),
            vec!["bali weather"]
        );
    }

    #[test]
    fn test_list_shapes() {
        let reply = "Search queries:\n1. rust ownership\n2) borrow checker\n- \"lifetimes\"\n";
        assert_eq!(
            parse_queries(reply),
            vec!["rust ownership", "borrow checker", "lifetimes"]
        );
    }

    #[test]
    fn test_plain_lines() {
        assert_eq!(
            parse_queries("Queries:\nfirst query\n\nsecond query"),
            vec!["first query", "second query"]
        );
        assert!(parse_queries("   ").is_empty());
    }

    #[tokio::test]
    async fn test_run_searches_respects_limit() {
        let search = ScriptedSearch::new(["r1", "r2", "r3"]);
        let queries: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();

        let content = run_searches(&search, &queries, 3).await;
        assert_eq!(search.queries(), vec!["a", "b", "c"]);
        assert_eq!(content.len(), 6);
    }

    #[tokio::test]
    async fn test_failed_search_is_skipped() {
        let search = ScriptedSearch::failing();
        let queries = vec!["a".to_string(), "b".to_string()];

        let content = run_searches(&search, &queries, 2).await;
        assert!(content.is_empty());
        assert_eq!(search.queries().len(), 2);
    }
}
