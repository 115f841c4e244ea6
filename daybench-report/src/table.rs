//! Human-readable Output

use crate::aggregate::AggregateReport;
use std::fmt::Write;

/// Render a terminal table of per-unit means with a total row
///
/// Spread columns are shown only when more than one run was measured.
pub fn render(report: &AggregateReport) -> String {
    let spread = report.runs_measured() > 1;
    let mut out = String::new();

    if spread {
        let _ = writeln!(
            out,
            "{:<6} {:>10} {:>10} {:>10} {:>10}",
            "day", "mean", "stddev", "min", "max"
        );
    } else {
        let _ = writeln!(out, "{:<6} {:>10}", "day", "mean");
    }

    for unit in report.units() {
        if spread {
            let _ = writeln!(
                out,
                "{:<6} {:>10} {:>10} {:>10} {:>10}",
                unit.id.key(),
                format_secs(unit.mean_secs),
                format_secs(unit.std_dev_secs),
                format_secs(unit.min_secs),
                format_secs(unit.max_secs),
            );
        } else {
            let _ = writeln!(out, "{:<6} {:>10}", unit.id.key(), format_secs(unit.mean_secs));
        }
    }

    let width = if spread { 50 } else { 17 };
    let _ = writeln!(out, "{}", "-".repeat(width));
    let _ = writeln!(out, "{:<6} {:>10}", "total", format_secs(report.total_secs()));

    if report.runs_discarded() > 0 || spread {
        let _ = writeln!(
            out,
            "\n{} run(s) measured, {} warm-up run(s) discarded",
            report.runs_measured(),
            report.runs_discarded()
        );
    }

    out
}

fn format_secs(secs: f64) -> String {
    format!("{:.3}s", secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::raw::parse;

    #[test]
    fn test_render_single_run() {
        let run = parse(r#"{"01": 2.0, "02": 3.0, "total": 5.0}"#).unwrap();
        let text = render(&aggregate(&[run], 0).unwrap());

        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("day"));
        assert!(lines[1].starts_with("01") && lines[1].ends_with("2.000s"));
        assert!(lines[2].starts_with("02") && lines[2].ends_with("3.000s"));
        assert!(lines.last().unwrap().starts_with("total"));
        assert!(lines.last().unwrap().ends_with("5.000s"));
        assert!(!text.contains("stddev"));
    }

    #[test]
    fn test_render_multiple_runs_shows_spread() {
        let runs = vec![
            parse(r#"{"01": 9.0, "total": 9.0}"#).unwrap(),
            parse(r#"{"01": 1.0, "total": 1.0}"#).unwrap(),
            parse(r#"{"01": 3.0, "total": 3.0}"#).unwrap(),
        ];
        let text = render(&aggregate(&runs, 1).unwrap());

        assert!(text.contains("stddev"));
        assert!(text.contains("2 run(s) measured, 1 warm-up run(s) discarded"));
    }
}
