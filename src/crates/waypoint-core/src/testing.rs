//! Scripted collaborators for tests
//!
//! [`ScriptedModel`] replays canned replies in order and records every call;
//! [`ScriptedSearch`] answers every query from a fixed list (or fails). Neither
//! touches the network.

use crate::error::{GraphError, Result};
use crate::llm::{ModelCaller, ModelParams, SearchCaller, SearchResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// One recorded model invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub system_prompt: String,
    pub user_content: String,
    pub params: ModelParams,
}

/// Model double that returns queued replies in order
#[derive(Debug, Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedModel {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue another reply
    pub fn push_reply(&self, reply: impl Into<String>) {
        self.replies.lock().push_back(Ok(reply.into()));
    }

    /// Queue a failure
    pub fn push_failure(&self, message: impl Into<String>) {
        self.replies
            .lock()
            .push_back(Err(GraphError::step("model", message)));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().len()
    }
}

#[async_trait]
impl ModelCaller for ScriptedModel {
    async fn invoke(
        &self,
        system_prompt: &str,
        user_content: &str,
        params: ModelParams,
    ) -> Result<String> {
        self.calls.lock().push(RecordedCall {
            system_prompt: system_prompt.to_string(),
            user_content: user_content.to_string(),
            params,
        });
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(GraphError::step("model", "no scripted reply left")))
    }
}

/// Search double
#[derive(Debug, Default)]
pub struct ScriptedSearch {
    results: Vec<String>,
    fail: bool,
    queries: Mutex<Vec<String>>,
}

impl ScriptedSearch {
    /// Every query returns `results` (truncated to `max_results`)
    pub fn new<I, S>(results: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            results: results.into_iter().map(Into::into).collect(),
            fail: false,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Every query fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl SearchCaller for ScriptedSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        self.queries.lock().push(query.to_string());
        if self.fail {
            return Err(GraphError::step("search", "search provider unavailable"));
        }
        Ok(self
            .results
            .iter()
            .take(max_results)
            .map(SearchResult::new)
            .collect())
    }
}
