//! HTML report rendering.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::datasets::StagedDataset;
use crate::session::{Artifact, SessionReport};

struct InlinePatterns {
    bold: Regex,
    italic: Regex,
}

fn inline_patterns() -> Option<&'static InlinePatterns> {
    static PATTERNS: OnceLock<Option<InlinePatterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| match (Regex::new(r"\*\*(.+?)\*\*"), Regex::new(r"\*(.+?)\*")) {
            (Ok(bold), Ok(italic)) => Some(InlinePatterns { bold, italic }),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!("Invalid markdown pattern: {}", e);
                None
            }
        })
        .as_ref()
}

/// Escape text for inclusion in HTML content or attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn inline(text: &str) -> String {
    match inline_patterns() {
        Some(patterns) => {
            let bold = patterns.bold.replace_all(text, "<strong>$1</strong>");
            patterns
                .italic
                .replace_all(&bold, "<em>$1</em>")
                .into_owned()
        }
        None => text.to_string(),
    }
}

/// Convert the small markdown subset the model writes into HTML.
///
/// Supports `#`..`###` headings, `**bold**`, `*italic*`, `- ` bullet lists
/// and paragraphs; blank lines become `<br>`. Input is escaped first, so
/// raw HTML in the text is never rendered.
pub fn markdown_to_html(markdown: &str) -> String {
    if markdown.trim().is_empty() {
        return String::new();
    }

    let mut lines = Vec::new();
    let mut in_list = false;
    for raw in markdown.lines() {
        let line = escape_html(raw);
        let trimmed = line.trim();

        if let Some(item) = trimmed.strip_prefix("- ") {
            if !in_list {
                lines.push("<ul>".to_string());
                in_list = true;
            }
            lines.push(format!("<li>{}</li>", inline(item)));
            continue;
        }
        if in_list {
            lines.push("</ul>".to_string());
            in_list = false;
        }

        if trimmed.is_empty() {
            lines.push("<br>".to_string());
        } else if let Some(heading) = line.strip_prefix("### ") {
            lines.push(format!("<h3>{}</h3>", inline(heading)));
        } else if let Some(heading) = line.strip_prefix("## ") {
            lines.push(format!("<h2>{}</h2>", inline(heading)));
        } else if let Some(heading) = line.strip_prefix("# ") {
            lines.push(format!("<h1>{}</h1>", inline(heading)));
        } else {
            lines.push(format!("<p>{}</p>", inline(&line)));
        }
    }
    if in_list {
        lines.push("</ul>".to_string());
    }

    lines.join("\n")
}

const STYLE: &str = r#"
        body { font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; margin: 0; padding: 20px; background-color: #f5f5f5; }
        .container { max-width: 1000px; margin: 0 auto; background: white; padding: 30px; border-radius: 10px; box-shadow: 0 4px 6px rgba(0,0,0,0.1); }
        h1 { color: #2c3e50; border-bottom: 3px solid #3498db; padding-bottom: 15px; }
        h2 { color: #34495e; margin-top: 40px; }
        .summary, .data-files, .executive-summary, .focus-findings { padding: 20px; border-radius: 8px; margin: 20px 0; }
        .summary { background: #f8f9fa; border-left: 4px solid #3498db; }
        .data-files { background: #fff3cd; border-left: 4px solid #ffc107; }
        .executive-summary { background: #f0f8ff; border-left: 4px solid #4169e1; }
        .focus-findings { background: #fff0e6; border-left: 4px solid #ff8c00; }
        .chart-container { margin: 30px 0; text-align: center; background: #fafafa; padding: 20px; border-radius: 8px; }
        .chart-container img { max-width: 100%; height: auto; border: 1px solid #ddd; border-radius: 8px; }
        .footer { text-align: center; color: #7f8c8d; font-size: 14px; margin-top: 40px; padding-top: 20px; border-top: 2px solid #ecf0f1; }
"#;

/// Charts whose payload decodes as base64; the rest are logged and left out.
fn renderable_charts(artifacts: &[Artifact]) -> Vec<&Artifact> {
    artifacts
        .iter()
        .filter(|artifact| match artifact.decode_image() {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Skipping {}: invalid image payload ({})", artifact.title, e);
                false
            }
        })
        .collect()
}

/// Render the complete report document.
pub fn render_html_report(staged: &[StagedDataset], report: &SessionReport) -> String {
    let charts = renderable_charts(&report.artifacts);
    let files = staged
        .iter()
        .map(|d| format!("                <li><strong>{}</strong></li>", escape_html(&d.name)))
        .collect::<Vec<_>>()
        .join("\n");

    let mut html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Daily Analysis Report</title>
    <style>{style}</style>
</head>
<body>
    <div class="container">
        <h1>Daily Analysis Report</h1>

        <div class="summary">
            <h2>Analysis Summary</h2>
            <p><strong>Data Sources:</strong> {file_count} files analyzed</p>
            <p><strong>Visualizations Generated:</strong> {chart_count} charts</p>
        </div>

        <div class="data-files">
            <h3>Data Files Analyzed</h3>
            <ul>
{files}
            </ul>
        </div>
"#,
        style = STYLE,
        file_count = staged.len(),
        chart_count = charts.len(),
        files = files,
    );

    let summary = markdown_to_html(&report.findings.executive_summary);
    if !summary.is_empty() {
        html.push_str(&format!(
            "\n        <div class=\"executive-summary\">\n            <h2>Executive Summary</h2>\n{}\n        </div>\n",
            summary
        ));
    }

    let focus = markdown_to_html(&report.findings.focus_findings);
    if !focus.is_empty() {
        html.push_str(&format!(
            "\n        <div class=\"focus-findings\">\n            <h2>Focus Analysis Findings</h2>\n{}\n        </div>\n",
            focus
        ));
    }

    if !charts.is_empty() {
        html.push_str("\n        <h2>Visualizations</h2>\n");
    }
    for artifact in charts {
        html.push_str(&format!(
            r#"
        <div class="chart-container">
            <h3>{title}</h3>
            <img src="data:image/png;base64,{image}" alt="{alt}" />
        </div>
"#,
            title = escape_html(&artifact.title),
            image = escape_html(artifact.image_base64.trim()),
            alt = escape_html(&artifact.alt_text),
        ));
    }

    html.push_str(
        r#"
        <div class="footer">
            <p>Generated automatically by the end-of-day analyst</p>
        </div>
    </div>
</body>
</html>
"#,
    );
    html
}

/// File name for a report rendered at `timestamp`.
pub fn report_file_name(timestamp: chrono::DateTime<chrono::Local>) -> String {
    format!("daily_health_report_{}.html", timestamp.format("%Y%m%d_%H%M%S"))
}

/// Write `html` into `dir`, creating it if needed. Returns the file path.
pub async fn save_report(dir: &Path, html: &str) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(report_file_name(chrono::Local::now()));
    tokio::fs::write(&path, html).await?;
    tracing::info!("Saved report to {}", path.display());
    Ok(path)
}
