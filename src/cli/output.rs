// Output formatting and display for CLI

use crate::process::{Action, ProcessState, RunReport};
use chrono::{DateTime, Local};
use colored::*;
use std::time::Duration;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

/// What `vigil status` knows about one configured process
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRow {
    pub name: String,
    pub state: Option<ProcessState>,
    pub updated_at: Option<i64>,
    pub pid: Option<u32>,
    pub alive: bool,
}

/// Print the outcome of one pass over the watch list
pub fn print_report(action: Action, report: &RunReport) {
    if report.is_success() {
        println!(
            "{} {} done for {} process(es)",
            "✓".green().bold(),
            action,
            report.succeeded.len()
        );
    } else {
        println!(
            "{} {} failed for: {}",
            "✗".red().bold(),
            action,
            report.failed.join(", ").bold()
        );
    }
}

/// Print an error message to stderr
pub fn print_error(error: &str) {
    eprintln!("{} {}", "✗ Error:".red().bold(), error);
}

/// Print a formatted table of processes and their recorded state
pub fn print_status(rows: &[StatusRow], now: i64) {
    if rows.is_empty() {
        println!("{}", "No processes are configured".yellow());
        return;
    }

    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "State")]
        state: String,
        #[tabled(rename = "Since")]
        since: String,
        #[tabled(rename = "PID")]
        pid: String,
        #[tabled(rename = "Alive")]
        alive: String,
    }

    let table_rows: Vec<Row> = rows
        .iter()
        .map(|r| Row {
            name: truncate(&r.name, 24),
            state: format_state_colored(r.state),
            since: r
                .updated_at
                .map(|at| format_since(at, now))
                .unwrap_or_else(|| "-".to_string()),
            pid: r
                .pid
                .map(|pid| pid.to_string())
                .unwrap_or_else(|| "-".to_string()),
            alive: if r.alive {
                "yes".green().to_string()
            } else {
                "no".red().to_string()
            },
        })
        .collect();

    let mut table = Table::new(table_rows);
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));

    println!("\n{}\n", table);
    println!(
        "{}",
        format!("Total: {} process(es)", rows.len())
            .dimmed()
            .italic()
    );
}

/// Format a recorded state with color coding
fn format_state_colored(state: Option<ProcessState>) -> String {
    match state {
        None => "unknown".bright_black().to_string(),
        Some(state @ ProcessState::Started) => state.to_string().green().to_string(),
        Some(state @ ProcessState::Restarted) => state.to_string().cyan().to_string(),
        Some(state @ ProcessState::Stopped) => state.to_string().bright_black().to_string(),
        Some(state @ (ProcessState::AboveCpuLimit | ProcessState::AboveRamLimit)) => {
            state.to_string().red().bold().to_string()
        }
    }
}

/// Local time of a recorded transition and how long ago it was
fn format_since(updated_at: i64, now: i64) -> String {
    let ago = Duration::from_secs(now.saturating_sub(updated_at).max(0) as u64);
    match DateTime::from_timestamp(updated_at, 0) {
        Some(at) => format!(
            "{} ({} ago)",
            at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
            format_duration(&ago)
        ),
        None => format!("{} ago", format_duration(&ago)),
    }
}

/// Format a duration in human-readable format
fn format_duration(duration: &Duration) -> String {
    let secs = duration.as_secs();

    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        let mins = secs / 60;
        let secs = secs % 60;
        if secs > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}m", mins)
        }
    } else if secs < 86400 {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        if mins > 0 {
            format!("{}h {}m", hours, mins)
        } else {
            format!("{}h", hours)
        }
    } else {
        let days = secs / 86400;
        let hours = (secs % 86400) / 3600;
        if hours > 0 {
            format!("{}d {}h", days, hours)
        } else {
            format!("{}d", days)
        }
    }
}

/// Truncate a string to a maximum number of characters
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
