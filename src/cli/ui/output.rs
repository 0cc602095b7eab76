use console::style;

use crate::pipeline::RunOutcome;
use crate::types::ErrorClassifier;

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn header(&self, message: &str) {
        println!("\n{}", style(message).bold().underlined());
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    /// Aligned `label: value` line
    pub fn field(&self, label: &str, value: impl std::fmt::Display) {
        println!("  {:<14} {}", style(format!("{}:", label)).dim(), value);
    }

    /// Report where the pipeline stopped, with the command that continues it
    pub fn outcome(&self, outcome: &RunOutcome) {
        match outcome {
            RunOutcome::AwaitingConfirmation { phase, detail } => {
                self.info(&format!("[{}] {}", phase, detail));
                println!("  Next: 'scriptflow confirm'");
            }
            RunOutcome::Halted {
                phase,
                unit,
                message,
            } => {
                self.error(&format!("[{}] {} failed: {}", phase, unit, message));
                let category = ErrorClassifier::classify(message, "").category;
                println!("  {} {}", style("hint:").dim(), category.hint());
                println!("  Next: 'scriptflow retry' or, during analysis, 'scriptflow skip'");
            }
            RunOutcome::PhaseFinished { next } => {
                self.success(&format!("Entered {}", next));
                println!("  Next: 'scriptflow run'");
            }
            RunOutcome::Done => self.success("Pipeline complete. Run 'scriptflow export'."),
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
