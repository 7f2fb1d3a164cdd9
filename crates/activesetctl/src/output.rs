//! Output formatting for CLI responses

use activeset::{SlotReport, SlotState, describe_reset_cause};
use anyhow::Error;
use colored::*;
use serde_json::json;

use crate::error::CliError;

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("Failed to format output as JSON: {}", e),
    }
}

/// Print error in JSON format
pub fn print_error_json(error: &Error) {
    let kind = error.downcast_ref::<CliError>().map_or("error", CliError::kind);
    let causes: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
    print_json(&json!({
        "success": false,
        "error": {
            "message": error.to_string(),
            "type": kind,
            "causes": causes,
        }
    }));
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {}", "error:".red().bold(), error);

    let mut source = error.source();
    while let Some(err) = source {
        eprintln!("  {} {}", "Caused by:".yellow(), err);
        source = err.source();
    }
}

/// Print the active index, `None` when it could not be determined
pub fn print_active(index: Option<usize>, json: bool) {
    if json {
        print_json(&json!({ "success": true, "active": index }));
        return;
    }
    match index {
        Some(index) => println!("active set idx: {}", index),
        None => println!("active set idx: {}", "unknown".yellow()),
    }
}

/// Print the result of an explicit switch
pub fn print_set(index: usize, json: bool) {
    if json {
        print_json(&json!({ "success": true, "active": index }));
    } else {
        println!("active set idx set to: {}", index);
    }
}

/// Print the outcome of the watchdog check
pub fn print_watchdog(cause: u32, rotated: Option<usize>, json: bool) {
    if json {
        print_json(&json!({
            "success": true,
            "reset_cause": cause,
            "reset_reasons": describe_reset_cause(cause),
            "rotated": rotated.is_some(),
            "active": rotated,
        }));
        return;
    }
    if let Some(index) = rotated {
        println!("active set idx set to: {}", index);
    }
}

/// Print a per-slot scan
pub fn print_status(reports: &[SlotReport], active: Option<usize>, json: bool) {
    if json {
        print_json(&json!({
            "success": true,
            "active": active,
            "slots": reports,
        }));
        return;
    }

    println!("{}", "Slots:".bold());
    for report in reports {
        let marker = if Some(report.slot) == active {
            "*".green().bold()
        } else {
            " ".normal()
        };
        println!(
            " {} {} @ {:#x}: {}",
            marker,
            report.slot,
            report.offset,
            format_state(&report.state)
        );
    }
}

fn format_state(state: &SlotState) -> ColoredString {
    match state {
        SlotState::Active => "active".green(),
        SlotState::Inactive => "inactive".normal(),
        SlotState::Corrupt { reason } => format!("corrupt ({})", reason).red(),
        SlotState::Unreadable { reason } => format!("unreadable ({})", reason).red(),
    }
}
