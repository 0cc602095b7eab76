//! Pipeline Commands
//!
//! `run`, `confirm`, `retry`, `skip` and `shortcut` all go through the
//! phase controller; they differ only in the command sent.

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::pipeline::{Command, PhaseController, RunOutcome};
use crate::types::Result;

pub async fn run(command: Command, yes: bool, format: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let controller = ctx.controller()?;
    let outcome = execute(&controller, command, ctx.unattended(yes)).await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        Output::new().outcome(&outcome);
    }
    Ok(())
}

/// Send one command; unattended runs confirm every review point
pub async fn execute(
    controller: &PhaseController,
    command: Command,
    unattended: bool,
) -> Result<RunOutcome> {
    if unattended {
        controller.execute_unattended(command).await
    } else {
        controller.execute(command).await
    }
}
