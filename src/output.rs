//! Terminal output for the command-line shell.
//!
//! Colored status lines, the one-shot scan progress bar, and the summary
//! and category tables all go through [`OutputFormatter`], so the library
//! modules never print.

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::file_category::{Category, ExtensionTable};
use crate::reconciler::CycleReport;

pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use order::output::OutputFormatter;
    /// OutputFormatter::info("Watching: /home/user/Downloads");
    /// ```
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Progress bar for a one-shot scan over `total` files.
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Prints moved files per category folder, then skips and failures.
    pub fn summary_table(report: &CycleReport) {
        Self::header("SUMMARY");

        let rows: Vec<(String, usize)> = report
            .moved
            .iter()
            .map(|(category, count)| (category.dir_name(), *count))
            .collect();

        let width = rows
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0)
            .max(8);

        println!(
            "{:<width$} | {}",
            "Folder".bold(),
            "Files".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 10));

        for (folder, count) in &rows {
            println!(
                "{:<width$} | {} {}",
                folder,
                count.to_string().green(),
                plural(*count),
                width = width
            );
        }

        println!("{}", "-".repeat(width + 10));
        let moved = report.moved_count();
        println!(
            "{:<width$} | {} {}",
            "Moved".bold(),
            moved.to_string().green().bold(),
            plural(moved),
            width = width
        );

        if report.skipped > 0 {
            println!(
                "{:<width$} | {} {}",
                "Skipped",
                report.skipped.to_string().yellow(),
                plural(report.skipped),
                width = width
            );
        }

        for (path, reason) in &report.failed {
            Self::error(&format!("{}: {}", path.display(), reason));
        }
    }

    /// Prints every category folder with the extensions routed to it.
    pub fn categories_table(table: &ExtensionTable) {
        Self::header("CATEGORIES");
        for category in Category::ALL {
            let extensions = table.extensions_for(category);
            let listed = if category == Category::Others {
                "(everything else)".dimmed().to_string()
            } else {
                extensions.join(" ")
            };
            println!("{:<20} {}", category.dir_name().bold(), listed);
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}
