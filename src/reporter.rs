//! User-facing terminal output.
//!
//! Color scheme (respects NO_COLOR):
//! - Green: success
//! - Red: errors
//! - Yellow: warnings, skipped items
//! - Cyan: paths and hints
//!
//! Diagnostics go through `tracing`; this module only prints what the user
//! asked for. Quiet mode silences everything except errors.

use crate::batch::{BatchReport, BatchSummary};
use colored::Colorize;
use std::fmt::Display;

/// Check if color output is disabled via NO_COLOR env var.
fn colors_enabled() -> bool {
    std::env::var("NO_COLOR").is_err()
}

/// Terminal reporter handed to every command.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter {
    quiet: bool,
}

impl Reporter {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    /// Reporter that prints nothing but errors.
    pub fn quiet() -> Self {
        Self::new(true)
    }

    /// `✓ message`
    pub fn success(&self, msg: &str) {
        if self.quiet {
            return;
        }
        if colors_enabled() {
            println!("{} {}", "✓".green(), msg);
        } else {
            println!("✓ {msg}");
        }
    }

    /// `✗ message` on stderr. Printed even in quiet mode.
    pub fn error(&self, msg: &str) {
        if colors_enabled() {
            eprintln!("{} {}", "✗".red(), msg);
        } else {
            eprintln!("✗ {msg}");
        }
    }

    /// `⚠ message`
    pub fn warn(&self, msg: &str) {
        if self.quiet {
            return;
        }
        if colors_enabled() {
            println!("{} {}", "⚠".yellow(), msg);
        } else {
            println!("⚠ {msg}");
        }
    }

    /// `→ message`
    pub fn hint(&self, msg: &str) {
        if self.quiet {
            return;
        }
        if colors_enabled() {
            println!("{} {}", "→".cyan(), msg.cyan());
        } else {
            println!("→ {msg}");
        }
    }

    /// Plain line.
    pub fn info(&self, msg: impl Display) {
        if !self.quiet {
            println!("{msg}");
        }
    }

    /// Format a path in cyan for inline use.
    pub fn path(&self, p: impl Display) -> String {
        if colors_enabled() {
            p.to_string().cyan().to_string()
        } else {
            p.to_string()
        }
    }

    /// One line per batch item followed by the summary.
    pub fn batch(&self, operation: &str, report: &BatchReport) {
        for result in &report.results {
            match (&result.error, result.success) {
                (_, true) if result.files_processed == 0 => {
                    self.info(format!("  {} {} (unchanged)", mark_skipped(), result.name));
                }
                (_, true) => self.info(format!("  {} {}", mark_ok(), result.name)),
                (Some(err), false) => {
                    self.error(&format!("{}: {}", result.name, err));
                }
                (None, false) => self.error(&format!("{}: failed", result.name)),
            }
        }
        self.summary(operation, &report.summary);
    }

    /// `encrypt: 3 total, 2 succeeded, 1 failed, 2 file(s) processed`
    pub fn summary(&self, operation: &str, summary: &BatchSummary) {
        let line = format!(
            "{operation}: {} total, {} succeeded, {} failed, {} file(s) processed",
            summary.total, summary.succeeded, summary.failed, summary.total_files_processed
        );
        if summary.overall_success {
            self.success(&line);
        } else {
            self.error(&line);
        }
    }
}

fn mark_ok() -> String {
    if colors_enabled() {
        "✓".green().to_string()
    } else {
        "✓".to_string()
    }
}

fn mark_skipped() -> String {
    if colors_enabled() {
        "=".yellow().to_string()
    } else {
        "=".to_string()
    }
}
