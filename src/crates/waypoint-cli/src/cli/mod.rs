//! CLI command implementations
//!
//! Handlers return a [`Report`]; [`execute`] prints it in the requested format.

pub mod args;
pub mod catalog;
pub mod output;
pub mod thread;

pub use args::{Cli, Command, OutputFormat, ThreadArgs};
pub use catalog::{handle_graphs, handle_prompts, PromptEdit};
pub use output::Report;
pub use thread::{
    handle_fields, handle_history, handle_resume, handle_rewind, handle_run, handle_snapshots,
    handle_state, handle_update,
};

use crate::config::WaypointConfig;
use crate::context::AppContext;

/// Run one parsed command against an opened context
pub async fn dispatch(ctx: &AppContext, command: Command) -> anyhow::Result<Report> {
    match command {
        Command::Run {
            target,
            input,
            max_revisions,
        } => handle_run(ctx, &target, input, max_revisions).await,
        Command::Resume { target, reject, args } => handle_resume(ctx, &target, reject, args).await,
        Command::Rewind {
            target,
            checkpoint,
            input,
        } => handle_rewind(ctx, &target, &checkpoint, input).await,
        Command::Update {
            target,
            field,
            value,
            as_node,
        } => handle_update(ctx, &target, &field, &value, as_node.as_deref()).await,
        Command::State { target } => handle_state(ctx, &target).await,
        Command::History { target, limit } => handle_history(ctx, &target, limit).await,
        Command::Snapshots { target, truncate } => handle_snapshots(ctx, &target, truncate).await,
        Command::Fields { target } => handle_fields(ctx, &target).await,
        Command::Prompts {
            graph,
            thread,
            set,
            text,
            reset,
        } => {
            let edit = match (set, text, reset) {
                (Some(key), Some(text), _) => PromptEdit::Set { key, text },
                (_, _, Some(key)) => PromptEdit::Reset { key },
                _ => PromptEdit::None,
            };
            handle_prompts(ctx, graph, thread.as_deref(), edit).await
        }
        Command::Graphs { graph } => handle_graphs(ctx, graph),
    }
}

/// Open the store, run the command and print its report
pub async fn execute(config: WaypointConfig, cli: Cli) -> anyhow::Result<()> {
    let ctx = AppContext::open(config).await?;
    let result = dispatch(&ctx, cli.command).await;
    ctx.close().await;

    let report = result?;
    println!("{}", report.render(cli.format)?);
    Ok(())
}
