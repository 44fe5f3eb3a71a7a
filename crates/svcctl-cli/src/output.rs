use serde::Serialize;
use svcctl_core::orchestrator::{ExecutionReport, PhaseOutcome};

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let header_row: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
        .collect();
    println!("{}", header_row.join("  ").trim_end());

    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep.join("  "));

    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{:width$}", cell, width = w)
            })
            .collect();
        println!("{}", cells.join("  ").trim_end());
    }
}

/// Human-readable execution report: one row per executed command, then the
/// captured output of the command that stopped the phase.
pub fn print_report(report: &ExecutionReport) {
    let context = report.context();
    if report.steps.is_empty() {
        println!("{context}: no commands");
        return;
    }

    let rows: Vec<Vec<String>> = report
        .steps
        .iter()
        .map(|s| {
            vec![
                s.index.to_string(),
                s.status.to_string(),
                s.exit_code.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
                format!("{}ms", s.duration_ms),
                s.command.clone(),
            ]
        })
        .collect();
    print_table(&["#", "STATUS", "EXIT", "TIME", "COMMAND"], &rows);

    if let Some(step) = report.failed_step() {
        if !step.output.is_empty() {
            println!();
            for line in step.output.lines() {
                println!("  | {line}");
            }
        }
    }

    let summary = match &report.outcome {
        PhaseOutcome::Succeeded => "succeeded".to_string(),
        PhaseOutcome::Failed { index } => format!("failed at command #{index}"),
        PhaseOutcome::TimedOut { index, scope, .. } => {
            format!("{scope} timeout at command #{index}")
        }
        PhaseOutcome::Cancelled { index } => format!("cancelled at command #{index}"),
    };
    println!();
    println!(
        "{context} {summary} ({}/{} commands run, run {})",
        report.steps.len(),
        report.planned,
        report.run_id
    );
}
