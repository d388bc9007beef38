//! Terminal output for the interactive commands. Scrape bodies go to stdout
//! untouched; only summaries use these helpers.
use colored::Colorize;
use std::fmt::Display;

pub fn heading(text: &str) {
    println!("\n{}", text.bold().cyan());
    println!("{}", "-".repeat(text.chars().count()).cyan());
}

/// Prints a verdict line, green for `ok` and red otherwise.
pub fn verdict(ok: bool, text: &str) {
    if ok {
        println!("\n{} {}", "PASS".green().bold(), text.green());
    } else {
        println!("\n{} {}", "FAIL".red().bold(), text.red());
    }
}

pub fn field(depth: usize, label: &str, value: impl Display) {
    println!("{}", field_line(depth, label, value));
}

fn field_line(depth: usize, label: &str, value: impl Display) -> String {
    format!("{}{} {}", "  ".repeat(depth + 1), format!("{}:", label).bold(), value)
}

pub fn item(text: &str) {
    println!("  {} {}", "-".green(), text);
}

pub fn warning(text: &str) {
    println!("{} {}", "warning:".yellow().bold(), text.yellow());
}

pub fn hint(text: &str) {
    println!("{} {}", "hint:".blue().bold(), text);
}
