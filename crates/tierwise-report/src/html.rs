//! HTML report generator.
//!
//! Produces a self-contained HTML file with all CSS/JS inlined.

use anyhow::{Context, Result};
use std::path::Path;

use tierwise_core::report::EvaluationReport;
use tierwise_core::results::EvaluationResult;
use tierwise_core::statistics::TopicStats;

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn opt_or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".into())
}

/// Generate an HTML report from an evaluation report.
pub fn generate_html(report: &EvaluationReport) -> String {
    let title = report.source.as_deref().unwrap_or("evaluation");
    let summary = &report.summary;
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>tierwise report: {} ({})</title>\n",
        html_escape(title),
        report.period
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    // Header
    html.push_str("<header>\n");
    html.push_str("<h1>tierwise report</h1>\n");
    html.push_str(&format!(
        "<p class=\"meta\">Source: <strong>{}</strong> | period {} | {} students | {} topics | {}</p>\n",
        html_escape(title),
        report.period,
        report.user_ids.len(),
        report.topic_ids.len(),
        report.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str(&format!(
        "<p class=\"meta\">{} pairs evaluated, {} failed, {} without attempts, {} degraded | up {} / down {} / stay {} / mastered {}</p>\n",
        summary.pairs_evaluated,
        summary.pairs_failed,
        summary.pairs_without_attempts,
        summary.degraded_pairs,
        summary.level_changes.up,
        summary.level_changes.down,
        summary.level_changes.stay,
        summary.level_changes.mastered,
    ));
    html.push_str("</header>\n");

    // Per-topic dashboard
    html.push_str("<section class=\"dashboard\">\n");
    html.push_str("<h2>Topics</h2>\n");
    html.push_str("<table class=\"summary\">\n");
    html.push_str("<thead><tr><th>Topic</th><th>Scored</th><th>Accuracy</th><th>Time</th><th>Progress</th><th>Motivation</th><th>Total</th><th>Promoted</th><th>Demoted</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    for stats in summary.per_topic.values() {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{:.3}</td><td>{:.3}</td><td>{:.3}</td><td>{:.3}</td><td>{:.3}</td><td>{}</td><td>{}</td></tr>\n",
            stats.topic_id,
            stats.students_scored,
            stats.mean_accuracy,
            stats.mean_time_score,
            stats.mean_progress,
            stats.mean_motivation,
            stats.mean_total,
            stats.promotions,
            stats.demotions,
        ));
    }
    html.push_str("</tbody></table>\n");

    if !summary.per_topic.is_empty() {
        let topics: Vec<&TopicStats> = summary.per_topic.values().collect();
        html.push_str(&generate_bar_chart(&topics));
    }

    html.push_str("</section>\n");

    // Per-pair results
    html.push_str("<section class=\"results\">\n");
    html.push_str("<h2>Results</h2>\n");
    html.push_str("<table class=\"results-table\" id=\"results\">\n");
    html.push_str("<thead><tr><th onclick=\"sortTable(0)\">Student</th><th onclick=\"sortTable(1)\">Topic</th><th onclick=\"sortTable(2)\">Before</th><th onclick=\"sortTable(3)\">After</th><th onclick=\"sortTable(4)\">Change</th><th onclick=\"sortTable(5)\">Total</th><th onclick=\"sortTable(6)\">Solved</th><th>Warnings</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    for r in &report.results {
        html.push_str(&result_row(r));
    }
    html.push_str("</tbody></table>\n");

    if !report.failures.is_empty() {
        html.push_str("<h2>Failures</h2>\n<ul class=\"failures\">\n");
        for f in &report.failures {
            html.push_str(&format!(
                "<li>student {} / topic {}: {}</li>\n",
                f.user_id,
                f.topic_id,
                html_escape(&f.error)
            ));
        }
        html.push_str("</ul>\n");
    }
    html.push_str("</section>\n");

    // Raw JSON
    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(&html_escape(
        &serde_json::to_string_pretty(report).unwrap_or_default(),
    ));
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    html.push_str("<script>\n");
    html.push_str(JS);
    html.push_str("</script>\n");

    html.push_str("</body>\n</html>");
    html
}

fn result_row(r: &EvaluationResult) -> String {
    let class = match (r.metrics.is_some(), r.is_degraded()) {
        (false, _) => "idle",
        (true, true) => "degraded",
        (true, false) => "ok",
    };
    let solved = r
        .metrics
        .as_ref()
        .map(|m| format!("{}/{}", m.tasks_solved, m.tasks_total));
    let total = r.total_score().map(|t| format!("{t:.3}"));
    let mut flags = r.warning_text().unwrap_or_default();
    if let Some(notes) = r.notes_text() {
        if !flags.is_empty() {
            flags.push_str("; ");
        }
        flags.push_str(&notes);
    }

    format!(
        "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
        class,
        r.user_id,
        r.topic_id,
        opt_or_dash(r.level_before),
        opt_or_dash(r.level_after),
        opt_or_dash(r.level_change),
        opt_or_dash(total),
        opt_or_dash(solved),
        html_escape(&flags),
    )
}

/// Horizontal bars of the mean total score per topic.
fn generate_bar_chart(topics: &[&TopicStats]) -> String {
    let bar_height = 30;
    let max_width = 400;
    let padding = 10;
    let label_width = 120;

    let total_height = topics.len() * (bar_height + padding) + padding;

    let mut svg = format!(
        "<svg width=\"{}\" height=\"{}\" xmlns=\"http://www.w3.org/2000/svg\">\n",
        label_width + max_width + 60,
        total_height
    );

    for (i, stats) in topics.iter().enumerate() {
        let score = stats.mean_total.clamp(0.0, 1.0);
        let y = i * (bar_height + padding) + padding;
        let width = (score * max_width as f64) as usize;

        let color = if score >= 0.7 {
            "#22c55e"
        } else if score >= 0.4 {
            "#eab308"
        } else {
            "#ef4444"
        };

        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"14\" fill=\"currentColor\" text-anchor=\"end\" dominant-baseline=\"middle\">topic {}</text>\n",
            label_width - 10,
            y + bar_height / 2,
            stats.topic_id
        ));
        svg.push_str(&format!(
            "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\" rx=\"4\"/>\n",
            label_width, y, width, bar_height, color
        ));
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"12\" fill=\"currentColor\" dominant-baseline=\"middle\">{:.3}</text>\n",
            label_width + width + 8,
            y + bar_height / 2,
            score
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

/// Write an HTML report to a file.
pub fn write_html_report(report: &EvaluationReport, path: &Path) -> Result<()> {
    let html = generate_html(report);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)
        .with_context(|| format!("failed to write HTML report to {}", path.display()))?;
    Ok(())
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --ok: #dcfce7; --degraded: #fef9c3; --idle: #f3f4f6; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --ok: #064e3b; --degraded: #713f12; --idle: #1f2937; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: #6b7280; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; }
th { background: var(--border); cursor: pointer; }
.ok { background: var(--ok); }
.degraded { background: var(--degraded); }
.idle { background: var(--idle); }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
svg { margin: 1rem 0; }
"#;

const JS: &str = r#"
function sortTable(col) {
  const table = document.getElementById('results');
  const tbody = table.querySelector('tbody');
  const rows = Array.from(tbody.querySelectorAll('tr'));
  const asc = table.dataset.sortCol == col && table.dataset.sortDir == 'asc' ? false : true;
  rows.sort((a, b) => {
    const va = a.cells[col].textContent;
    const vb = b.cells[col].textContent;
    const na = parseFloat(va), nb = parseFloat(vb);
    const cmp = isNaN(na) || isNaN(nb) ? va.localeCompare(vb) : na - nb;
    return asc ? cmp : -cmp;
  });
  table.dataset.sortCol = col;
  table.dataset.sortDir = asc ? 'asc' : 'desc';
  rows.forEach(r => tbody.appendChild(r));
}
"#;
