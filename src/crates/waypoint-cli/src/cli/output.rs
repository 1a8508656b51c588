//! Rendering command results as text or JSON

use crate::cli::args::OutputFormat;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write;
use waypoint_core::manager::truncate_value;
use waypoint_core::messages::messages_in;
use waypoint_core::{RunOutcome, RunStatus, StateMap, ThreadSnapshot};
use waypoint_prebuilt::GraphKind;

/// What a command produced, in both renderings
#[derive(Debug, Clone)]
pub struct Report {
    pub json: Value,
    pub text: String,
}

impl Report {
    pub fn new(json: Value, text: impl Into<String>) -> Self {
        Self {
            json,
            text: text.into(),
        }
    }

    /// Serialize `value` for JSON output
    pub fn from_serializable<T: Serialize>(value: &T, text: impl Into<String>) -> serde_json::Result<Self> {
        Ok(Self::new(serde_json::to_value(value)?, text))
    }

    pub fn render(&self, format: OutputFormat) -> serde_json::Result<String> {
        match format {
            OutputFormat::Json => serde_json::to_string_pretty(&self.json),
            OutputFormat::Text => Ok(self.text.clone()),
        }
    }
}

pub fn outcome_text(kind: GraphKind, outcome: &RunOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "thread:     {}", outcome.thread_id);
    let _ = writeln!(out, "status:     {}", outcome.status);
    let _ = writeln!(out, "next:       {}", next_label(&outcome.next));
    let _ = writeln!(out, "checkpoint: {}", outcome.checkpoint_id);
    let _ = writeln!(out, "steps:      {}", outcome.steps);

    if let Some(error) = &outcome.error {
        let _ = writeln!(out, "error:      {}", error);
        let _ = writeln!(out, "\nRun `waypoint run` again without input to retry.");
    }
    if outcome.status == RunStatus::Interrupted {
        write_pending(&mut out, kind, &outcome.state, &outcome.next);
    }
    if outcome.status == RunStatus::Completed {
        if let Some(output) = kind.final_output(&outcome.state) {
            let _ = writeln!(out, "\n{}", output);
        }
    }
    out.trim_end().to_string()
}

pub fn snapshot_text(kind: GraphKind, snapshot: &ThreadSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "thread:     {}", snapshot.thread_id);
    let _ = writeln!(out, "status:     {}", snapshot.status);
    let _ = writeln!(out, "next:       {}", next_label(&snapshot.next));
    let _ = writeln!(out, "checkpoint: {}", snapshot.checkpoint_id);
    let _ = writeln!(out, "step:       {}", snapshot.metadata.step);
    if let Some(error) = &snapshot.error {
        let _ = writeln!(out, "error:      {}", error);
    }

    let _ = writeln!(out);
    if kind == GraphKind::Agent {
        for message in messages_in(&snapshot.state, "messages") {
            let _ = writeln!(out, "{}", message.transcript_line());
        }
    } else {
        for (key, value) in &snapshot.state {
            if key.ends_with("_prompt") || key == "messages" {
                continue;
            }
            let _ = writeln!(out, "{}: {}", key, truncate_value(value, 200));
        }
    }
    out.trim_end().to_string()
}

fn write_pending(out: &mut String, kind: GraphKind, state: &StateMap, next: &[String]) {
    let Some(node) = next.first() else {
        return;
    };
    let _ = writeln!(out, "\nWaiting for approval before '{}'.", node);

    if kind == GraphKind::Agent {
        let pending = messages_in(state, "messages")
            .last()
            .map(|m| m.tool_calls().to_vec())
            .unwrap_or_default();
        for call in pending {
            let _ = writeln!(
                out,
                "  tool call: {} {}",
                call.name,
                Value::Object(call.args.clone())
            );
        }
    }
    let _ = writeln!(
        out,
        "Approve with `waypoint resume`, or pass --reject / --args '{{...}}'."
    );
}

fn next_label(next: &[String]) -> String {
    if next.is_empty() {
        "(end)".to_string()
    } else {
        next.join(", ")
    }
}
