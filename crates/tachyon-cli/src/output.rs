//! Human-readable rendering of client results.

use chrono::Duration;
use serde::Serialize;

use tachyon_client::{
    model_display_name, Dataset, EvaluationStatusReport, Golden, HistoryRow, KNOWN_MODELS,
};

/// Widest a free-text cell may get before it is cut.
const MAX_CELL: usize = 48;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Cut `text` to `max` characters, marking the cut with `...`.
pub fn truncate(text: &str, max: usize) -> String {
    let single_line = text.replace(['\n', '\r'], " ");
    if single_line.chars().count() <= max {
        return single_line;
    }
    let kept: String = single_line.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// `1h 02m 03s`, `4m 05s` or `6s`.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

fn render(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let line = |cells: Vec<String>| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{:<width$}", c, width = widths[i]))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = line(headers.iter().map(|h| h.to_string()).collect());
    for row in rows {
        out.push('\n');
        out.push_str(&line(row));
    }
    out
}

pub fn datasets_table(datasets: &[Dataset]) -> String {
    let rows = datasets
        .iter()
        .map(|d| {
            vec![
                d.id.clone(),
                truncate(&d.alias, MAX_CELL),
                d.num_goldens.to_string(),
                d.updated_at.clone(),
            ]
        })
        .collect();
    render(&["ID", "ALIAS", "GOLDENS", "UPDATED"], rows)
}

pub fn goldens_table(goldens: &[Golden]) -> String {
    let rows = goldens
        .iter()
        .map(|g| {
            vec![
                g.id.clone(),
                truncate(&g.input, MAX_CELL),
                truncate(&g.expected_output, MAX_CELL),
                g.tags.join(","),
            ]
        })
        .collect();
    render(&["ID", "INPUT", "EXPECTED", "TAGS"], rows)
}

pub fn history_table(rows: &[HistoryRow]) -> String {
    let rows = rows
        .iter()
        .map(|r| {
            vec![
                r.id.clone(),
                truncate(&r.evaluation_name, MAX_CELL),
                truncate(&r.dataset_name, MAX_CELL),
                model_display_name(&r.model_id).to_string(),
                r.status.to_string(),
                r.start_time.clone(),
                if r.end_time.is_some() {
                    format_duration(r.duration())
                } else {
                    "-".to_string()
                },
            ]
        })
        .collect();
    render(
        &["ID", "NAME", "DATASET", "MODEL", "STATUS", "STARTED", "DURATION"],
        rows,
    )
}

pub fn status_report(evaluation_id: &str, report: &EvaluationStatusReport) -> String {
    let details = &report.details;
    let mut out = format!(
        "{}: {} ({:.0}%, {}/{} goldens)",
        evaluation_id,
        report.status,
        report.progress,
        details.processed_goldens,
        details.total_goldens
    );
    if !report.message.is_empty() {
        out.push_str(&format!("\n  {}", report.message));
    }
    if let Some(eta) = &details.estimated_time_remaining {
        out.push_str(&format!("\n  remaining: {}", eta));
    }
    if let Some(current) = &details.current_golden {
        out.push_str(&format!(
            "\n  current: {} {}",
            current.id,
            truncate(&current.input, MAX_CELL)
        ));
    }
    out
}

pub fn models_table() -> String {
    let rows = KNOWN_MODELS
        .iter()
        .map(|(id, name)| vec![id.to_string(), name.to_string()])
        .collect();
    render(&["ID", "NAME"], rows)
}
