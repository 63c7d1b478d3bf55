//! Human-readable session artifacts: the summary text block and the HTML
//! report table.

use crate::{LogRow, ReportRow, SessionSummary};
use std::fmt::Write;

const REPORT_STYLE: &str = "\
body { font-family: 'Segoe UI', Tahoma, sans-serif; margin: 20px; background-color: #f9f9f9; color: #333; }
h2 { border-bottom: 2px solid #555; padding-bottom: 10px; }
table { width: 100%; border-collapse: collapse; box-shadow: 0 2px 5px rgba(0,0,0,0.1); }
th, td { border: 1px solid #ccc; padding: 10px; text-align: center; }
th { background-color: #e0e0e0; }
tr:nth-child(even) { background-color: #fdfdfd; }
tr:nth-child(odd) { background-color: #ffffff; }
tr.red { background-color: #ffe5e5; }
tr.yellow { background-color: #fffbe5; }
thead th { position: sticky; top: 0; background-color: #e0e0e0; z-index: 2; }
";

/// Convert logged rows into report rows
pub fn report_rows(rows: &[LogRow], bad_posture_duration_threshold: f64) -> Vec<ReportRow> {
    rows.iter()
        .map(|row| ReportRow::from_log_row(row, bad_posture_duration_threshold))
        .collect()
}

/// Render the key/value summary block
pub fn render_summary(summary: &SessionSummary) -> String {
    let max = summary
        .max_pressure
        .map(|p| format!("{:.2} kPa", p))
        .unwrap_or_else(|| "n/a".into());
    let avg = summary
        .avg_pressure
        .map(|p| format!("{:.2} kPa", p))
        .unwrap_or_else(|| "n/a".into());

    format!(
        "Session Summary\n\
         ---------------------\n\
         Total Time: {:.2} seconds\n\
         Bad Posture Duration: {:.2} seconds\n\
         Bad Posture Percentage: {:.1}%\n\
         Max Pressure: {}\n\
         Average Pressure: {}\n",
        summary.total_time, summary.bad_posture_time, summary.bad_posture_percent, max, avg
    )
}

/// Render the styled HTML report table
pub fn render_html(rows: &[ReportRow]) -> String {
    let mut html = String::with_capacity(1024 + rows.len() * 160);

    html.push_str("<html><head><meta charset=\"UTF-8\"><style>\n");
    html.push_str(REPORT_STYLE);
    html.push_str("</style></head><body>\n");
    html.push_str("<h2>Carpal Tunnel Posture Report</h2>\n");

    if rows.is_empty() {
        html.push_str("<p>No data recorded yet.</p>\n</body></html>\n");
        return html;
    }

    html.push_str("<table>\n");
    html.push_str(
        "<thead><tr><th>Timestamp</th><th>Flexion/Extension (°)</th><th>Radial/Ulnar (°)</th>\
         <th>Pressure (kPa)</th><th>Duration (s)</th><th>Status</th></tr></thead>\n",
    );
    html.push_str("<tbody>\n");

    for row in rows {
        // Writing into a String cannot fail
        let _ = writeln!(
            html,
            "<tr class='{}'><td>{}</td><td>{:.1}</td><td>{:.1}</td><td>{:.2}</td><td>{:.1}</td><td>{}</td></tr>",
            row.status.css_class(),
            row.timestamp.format("%Y-%m-%d %H:%M:%S"),
            row.flexion_extension,
            row.radial_ulnar,
            row.pressure,
            row.duration,
            row.status,
        );
    }

    html.push_str("</tbody></table></body></html>\n");
    html
}
