//! Thread command handlers: run, resume, rewind, update and inspection

use crate::cli::args::ThreadArgs;
use crate::cli::output::{outcome_text, snapshot_text, Report};
use crate::context::AppContext;
use crate::error::CliError;
use anyhow::Result;
use serde_json::{json, Value};
use std::fmt::Write;
use tracing::info;
use waypoint_core::{Executor, GraphError, ResumeDecision, StateManager, StateMap};
use waypoint_prebuilt::GraphKind;

fn executor(ctx: &AppContext, target: &ThreadArgs) -> Result<Executor> {
    let interrupts = ctx.config().execution.interrupts && !target.no_interrupts;
    Ok(ctx.executor(target.graph, interrupts)?)
}

/// Latest state of a thread, or `None` when it does not exist yet
async fn existing_state(executor: &Executor, thread_id: &str) -> Result<Option<StateMap>> {
    match executor.get_state(thread_id).await {
        Ok(snapshot) => Ok(Some(snapshot.state)),
        Err(GraphError::ThreadNotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Handle run command
pub async fn handle_run(
    ctx: &AppContext,
    target: &ThreadArgs,
    input: Option<String>,
    max_revisions: Option<i64>,
) -> Result<Report> {
    let executor = executor(ctx, target)?;
    let existing = existing_state(&executor, &target.thread).await?;

    let update = match input {
        Some(text) => {
            let max_revisions = match (&existing, max_revisions) {
                (_, Some(max)) => Some(max),
                (None, None) => Some(ctx.config().execution.default_max_revisions),
                (Some(_), None) => None,
            };
            let max_revisions = max_revisions.filter(|_| target.graph != GraphKind::Agent);
            Some(target.graph.initial_input(&text, max_revisions, existing.as_ref())?)
        }
        None if existing.is_none() => {
            return Err(CliError::InvalidArgument(format!(
                "thread '{}' does not exist; pass --input to start it",
                target.thread
            ))
            .into());
        }
        None => None,
    };

    info!(graph = %target.graph, thread_id = %target.thread, "Running thread");
    let outcome = executor.run(&target.thread, update).await?;
    Ok(Report::from_serializable(&outcome, outcome_text(target.graph, &outcome))?)
}

/// Handle resume command
pub async fn handle_resume(
    ctx: &AppContext,
    target: &ThreadArgs,
    reject: bool,
    args: Option<String>,
) -> Result<Report> {
    let executor = executor(ctx, target)?;
    let decision = match (reject, args) {
        (true, _) => ResumeDecision::reject(),
        (false, Some(raw)) => ResumeDecision::approve_with_args(parse_args(&raw)?),
        (false, None) => ResumeDecision::approve(),
    };

    let outcome = executor.resume(&target.thread, decision).await?;
    Ok(Report::from_serializable(&outcome, outcome_text(target.graph, &outcome))?)
}

/// Handle rewind command
pub async fn handle_rewind(
    ctx: &AppContext,
    target: &ThreadArgs,
    checkpoint_id: &str,
    input: Option<String>,
) -> Result<Report> {
    let executor = executor(ctx, target)?;
    let update = match input {
        Some(text) => {
            let checkpoint = executor.get_checkpoint(&target.thread, checkpoint_id).await?;
            Some(target.graph.initial_input(&text, None, Some(&checkpoint.state))?)
        }
        None => None,
    };

    let outcome = executor
        .resume_from(&target.thread, checkpoint_id, update)
        .await?;
    Ok(Report::from_serializable(&outcome, outcome_text(target.graph, &outcome))?)
}

/// Handle update command
pub async fn handle_update(
    ctx: &AppContext,
    target: &ThreadArgs,
    field: &str,
    raw_value: &str,
    as_node: Option<&str>,
) -> Result<Report> {
    let executor = executor(ctx, target)?;
    let manager = StateManager::new(&executor, target.thread.as_str());
    let snapshot = manager
        .update_value(field, parse_value(raw_value), as_node)
        .await?;
    Ok(Report::from_serializable(&snapshot, snapshot_text(target.graph, &snapshot))?)
}

/// Handle state command
pub async fn handle_state(ctx: &AppContext, target: &ThreadArgs) -> Result<Report> {
    let executor = executor(ctx, target)?;
    let snapshot = executor.get_state(&target.thread).await?;
    Ok(Report::from_serializable(&snapshot, snapshot_text(target.graph, &snapshot))?)
}

/// Handle history command
pub async fn handle_history(ctx: &AppContext, target: &ThreadArgs, limit: Option<usize>) -> Result<Report> {
    let executor = executor(ctx, target)?;
    let entries = StateManager::new(&executor, target.thread.as_str())
        .history(limit)
        .await?;

    let mut text = format!(
        "{:<6} {:<38} {:<6} {:<8} {:<18} {}\n",
        "Index", "Checkpoint", "Step", "Source", "Writer", "Next"
    );
    let _ = writeln!(text, "{}", "-".repeat(96));
    for entry in &entries {
        let _ = writeln!(
            text,
            "{:<6} {:<38} {:<6} {:<8} {:<18} {}",
            entry.index,
            entry.checkpoint_id,
            entry.step,
            entry.source.as_str(),
            entry.writer.as_deref().unwrap_or("-"),
            if entry.next.is_empty() {
                "(end)".to_string()
            } else {
                entry.next.join(", ")
            }
        );
    }
    Ok(Report::from_serializable(&entries, text.trim_end())?)
}

/// Handle snapshots command
pub async fn handle_snapshots(ctx: &AppContext, target: &ThreadArgs, truncate: usize) -> Result<Report> {
    let executor = executor(ctx, target)?;
    let summary = StateManager::new(&executor, target.thread.as_str())
        .snapshots_summary(truncate)
        .await?;
    Ok(Report::new(json!({ "summary": summary }), summary.trim_end()))
}

/// Handle fields command
pub async fn handle_fields(ctx: &AppContext, target: &ThreadArgs) -> Result<Report> {
    let executor = executor(ctx, target)?;
    let fields = StateManager::new(&executor, target.thread.as_str())
        .fields_info()
        .await?;

    let mut text = String::new();
    for field in &fields {
        let _ = writeln!(
            text,
            "{} ({}, {}{}) = {}",
            field.name,
            field.kind.as_str(),
            field.policy.reducer().name(),
            if field.editable { "" } else { ", read-only" },
            waypoint_core::manager::truncate_value(&field.value, 60)
        );
    }
    Ok(Report::from_serializable(&fields, text.trim_end())?)
}

/// JSON object of replacement tool arguments
pub fn parse_args(raw: &str) -> Result<serde_json::Map<String, Value>> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(args)) => Ok(args),
        Ok(_) => Err(CliError::InvalidArgument("--args must be a JSON object".to_string()).into()),
        Err(e) => Err(CliError::InvalidArgument(format!("--args is not valid JSON: {}", e)).into()),
    }
}

/// A JSON value, or the raw text as a string
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
