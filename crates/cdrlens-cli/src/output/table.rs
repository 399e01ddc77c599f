use cdrlens_core::model::{Call, ImportLogEntry, LegRecord};
use cdrlens_core::report::{ClinicSummary, DashboardMetrics};

/// Render rows as left-aligned columns sized to their widest cell.
fn render(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let mut lines = vec![format_line(headers.iter().copied(), &widths)];
    lines.push(format_line(rule.iter().map(String::as_str), &widths));
    for row in rows {
        lines.push(format_line(row.iter().map(String::as_str), &widths));
    }
    lines.join("\n")
}

fn format_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, w)| format!("{cell:<w$}", w = *w))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

fn yes_no(flag: bool) -> String {
    let text = if flag { "Yes" } else { "No" };
    text.to_string()
}

fn format_calls(calls: &[Call]) -> String {
    let rows: Vec<Vec<String>> = calls
        .iter()
        .map(|c| {
            vec![
                c.correlation_id.clone(),
                c.start_time.clone(),
                c.total_duration.to_string(),
                c.location.clone(),
                c.department.clone(),
                c.leg_count.to_string(),
                c.leg_type.to_string(),
                yes_no(c.was_answered),
                c.outcome.clone(),
            ]
        })
        .collect();
    render(
        &["CORRELATION", "START", "DUR(s)", "LOCATION", "DEPARTMENT", "LEGS", "TYPE", "ANSWERED", "OUTCOME"],
        &rows,
    )
}

pub fn print_calls(calls: &[Call]) {
    if calls.is_empty() {
        println!("No calls found.");
        return;
    }
    println!("{}", format_calls(calls));
}

pub fn print_legs(legs: &[LegRecord]) {
    if legs.is_empty() {
        println!("No legs found.");
        return;
    }
    let rows: Vec<Vec<String>> = legs
        .iter()
        .map(|l| {
            vec![
                l.start_time.clone(),
                l.correlation_id.clone(),
                l.caller_number.clone(),
                l.called_number.clone(),
                l.duration.to_string(),
                l.location.clone(),
                l.direction.to_string(),
                l.leg_type.to_string(),
                l.status.to_string(),
            ]
        })
        .collect();
    println!(
        "{}",
        render(
            &["START", "CORRELATION", "FROM", "TO", "DUR(s)", "LOCATION", "DIRECTION", "TYPE", "STATUS"],
            &rows,
        )
    );
}

pub fn print_clinics(summaries: &[ClinicSummary]) {
    if summaries.is_empty() {
        println!("No calls found.");
        return;
    }
    let rows: Vec<Vec<String>> = summaries
        .iter()
        .map(|s| {
            vec![
                s.location.clone(),
                s.call_count.to_string(),
                s.leg_count.to_string(),
                s.avg_duration.to_string(),
                s.answered_count.to_string(),
            ]
        })
        .collect();
    println!(
        "{}",
        render(&["LOCATION", "CALLS", "LEGS", "AVG DUR(s)", "ANSWERED"], &rows)
    );
}

pub fn print_metrics(metrics: &DashboardMetrics) {
    println!("Total calls:   {}", metrics.total_calls);
    println!("Answered:      {}", metrics.total_answered);
    println!("Missed:        {}", metrics.missed_calls);
    println!("Answer rate:   {}%", metrics.answer_rate);
    println!("Avg duration:  {}s", metrics.avg_duration);
}

pub fn print_import_logs(entries: &[ImportLogEntry]) {
    if entries.is_empty() {
        println!("No imports recorded.");
        return;
    }
    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|e| {
            vec![
                e.id.to_string(),
                e.timestamp.clone(),
                e.status.to_string(),
                e.rows_read.to_string(),
                e.rows_inserted.to_string(),
                e.rows_deduplicated.to_string(),
                e.calls_produced.to_string(),
                e.source_reference.clone(),
                e.error_message.clone().unwrap_or_default(),
            ]
        })
        .collect();
    println!(
        "{}",
        render(
            &["ID", "TIME", "STATUS", "READ", "INSERTED", "DUPES", "CALLS", "SOURCE", "ERROR"],
            &rows,
        )
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_aligns_columns() {
        let text = render(
            &["A", "LONG HEADER"],
            &[vec!["value".into(), "x".into()], vec!["v".into(), "y".into()]],
        );
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "A      LONG HEADER");
        assert_eq!(lines[1], "-----  -----------");
        assert_eq!(lines[2], "value  x");
        assert_eq!(lines[3], "v      y");
    }
}
