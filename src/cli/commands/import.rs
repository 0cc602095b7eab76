//! Import Command
//!
//! Load externally produced shot lists (JSON or YAML keyed by episode id).

use std::path::Path;

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::script::import_shots;
use crate::types::Result;

pub fn run(file: &Path) -> Result<()> {
    let ctx = CommandContext::load()?;
    let imported = import_shots(ctx.store.as_ref(), file)?;

    let out = Output::new();
    let ids: Vec<String> = imported.iter().map(u32::to_string).collect();
    out.success(&format!(
        "Imported shots for {} episode(s): {}",
        imported.len(),
        ids.join(", ")
    ));
    println!("  Imported episodes are skipped by shot generation.");
    Ok(())
}
