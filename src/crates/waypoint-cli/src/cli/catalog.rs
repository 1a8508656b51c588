//! Prompt and graph catalog commands

use crate::cli::output::Report;
use crate::context::AppContext;
use crate::error::CliError;
use anyhow::Result;
use serde_json::json;
use std::fmt::Write;
use waypoint_core::state::StateUpdate;
use waypoint_prebuilt::GraphKind;

/// What `prompts` should do besides listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptEdit {
    None,
    Set { key: String, text: String },
    Reset { key: String },
}

/// Handle prompts command
pub async fn handle_prompts(
    ctx: &AppContext,
    kind: GraphKind,
    thread: Option<&str>,
    edit: PromptEdit,
) -> Result<Report> {
    let mut prompts = kind.prompts();
    let executor = ctx.executor(kind, ctx.config().execution.interrupts)?;

    if let Some(thread_id) = thread {
        let snapshot = executor.get_state(thread_id).await?;
        prompts = prompts.with_state(&snapshot.state);
    }

    let write = match &edit {
        PromptEdit::None => None,
        PromptEdit::Set { key, text } => {
            prompts.update(key, text.as_str())?;
            Some((key.clone(), prompts.get(key)?.to_string()))
        }
        PromptEdit::Reset { key } => {
            let text = prompts.reset_to_default(key)?;
            Some((key.clone(), text.to_string()))
        }
    };

    if let Some((key, text)) = write {
        let thread_id = thread.ok_or_else(|| {
            CliError::InvalidArgument("--thread is required to change a prompt".to_string())
        })?;
        executor
            .update_state(thread_id, StateUpdate::new().set(key.as_str(), text), None)
            .await?;
        tracing::info!(thread_id = %thread_id, key = %key, "Prompt updated");
    }

    let entries = prompts.all();
    let mut text = String::new();
    if entries.is_empty() {
        let _ = writeln!(text, "The {} graph has no editable prompts.", kind);
    }
    for entry in &entries {
        let _ = writeln!(
            text,
            "[{}] {} (node: {}){}",
            entry.key,
            entry.label,
            entry.node,
            if entry.is_default { "" } else { " *custom*" }
        );
        let _ = writeln!(text, "{}\n", entry.text.trim_end());
    }
    Ok(Report::from_serializable(&entries, text.trim_end())?)
}

/// Handle graphs command
pub fn handle_graphs(ctx: &AppContext, kind: Option<GraphKind>) -> Result<Report> {
    let kinds: Vec<GraphKind> = match kind {
        Some(kind) => vec![kind],
        None => GraphKind::ALL.to_vec(),
    };

    let mut infos = Vec::new();
    let mut text = String::new();
    for kind in kinds {
        let info = ctx
            .executor(kind, ctx.config().execution.interrupts)?
            .graph()
            .describe();

        let _ = writeln!(text, "{} - {}", kind, kind.description());
        let _ = writeln!(text, "  entry: {}", info.entry);
        for node in &info.nodes {
            let _ = writeln!(
                text,
                "  - {}{}{}",
                node.name,
                if node.interrupt_before { " [approval]" } else { "" },
                node.description
                    .as_deref()
                    .map(|d| format!(": {}", d))
                    .unwrap_or_default()
            );
        }
        let _ = writeln!(text);

        infos.push(json!({
            "graph": kind,
            "description": kind.description(),
            "info": info,
        }));
    }
    Ok(Report::new(json!(infos), text.trim_end()))
}
