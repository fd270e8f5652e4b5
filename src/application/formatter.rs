//! Output formatting for archived messages.
//!
//! Markdown export for humans and LLMs, plus console tables and summaries.

use std::path::Path;

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};

use crate::domain::{Archive, MediaKind, Message, SyncReport};

/// Renders the whole archive as one Markdown document.
///
/// Messages are numbered newest first. Image paths under `media_dir` are
/// rewritten relative to the export (`media/<file>`).
pub fn format_archive_markdown(
    archive: &Archive,
    title: &str,
    media_dir: Option<&Path>,
    generated_at: &str,
) -> String {
    let mut out = String::new();

    out.push_str(&format!("# {title}: {}\n", archive.list_name));
    out.push_str(&format!("Generated: {generated_at}\n"));
    out.push_str(&format!("Total messages: {}\n\n", archive.len()));

    for (i, msg) in archive.sorted_by_date_desc().into_iter().enumerate() {
        out.push_str(&format_message_markdown(msg, i + 1, media_dir));
    }

    out
}

/// Formats a single message section.
pub fn format_message_markdown(msg: &Message, index: usize, media_dir: Option<&Path>) -> String {
    let mut lines = vec![
        "---".to_string(),
        format!("## {index}. {}", msg.title()),
        format!("- **Date:** {}", msg.date),
        format!("- **Status:** {}", msg.status().to_uppercase()),
    ];

    if let Some(source) = msg.source.as_deref().filter(|s| !s.is_empty()) {
        match msg.subchannel.as_deref().filter(|s| !s.is_empty()) {
            Some(sub) => lines.push(format!("- **Source:** {source} ({sub})")),
            None => lines.push(format!("- **Source:** {source}")),
        }
    }

    if let Some(preview) = msg.preview.as_deref().filter(|p| !p.is_empty()) {
        lines.push(format!("- **Preview:** *{preview}*"));
    }

    lines.push(format!("\n### Content\n\n{}\n", msg.content));

    if !msg.media.is_empty() {
        lines.push("\n### Media".to_string());
        for item in &msg.media {
            match item.kind {
                MediaKind::Image => {
                    let alt = item.alt.as_deref().unwrap_or("image");
                    let url = relative_media_url(&item.url, media_dir);
                    lines.push(format!("![{alt}]({url})"));
                }
                MediaKind::Link => lines.push(format!("- [External Link]({})", item.url)),
                MediaKind::Other => {}
            }
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');

    if let Some(social) = &msg.social {
        let mut extra = Vec::new();

        if let Some(link) = &social.link_attachment {
            extra.push("\n### Link Attachment".to_string());
            extra.push(format!(
                "- **Title:** {}",
                link.title.as_deref().unwrap_or("Untitled")
            ));
            extra.push(format!("- **URL:** {}", link.url.as_deref().unwrap_or("")));
            if let Some(text) = link.text.as_deref().filter(|t| !t.is_empty()) {
                extra.push(format!("- **Description:** {text}"));
            }
        }

        if let Some(metrics) = msg.metrics().filter(|m| !m.is_empty()) {
            extra.push("\n### Engagement Metrics".to_string());
            for (name, value) in metrics {
                let unit = if name.contains("Rate") { "%" } else { "" };
                extra.push(format!("- **{}:** {value}{unit}", metric_display_name(name)));
            }
        }

        out.push_str(&extra.join("\n"));
        out.push('\n');
    }

    out
}

/// Rewrites a local media path to `media/<file>` when it lives in `media_dir`.
fn relative_media_url(url: &str, media_dir: Option<&Path>) -> String {
    let path = Path::new(url);
    match (media_dir, path.file_name()) {
        (Some(dir), Some(name)) if path.starts_with(dir) => {
            format!("media/{}", name.to_string_lossy())
        }
        _ => url.to_string(),
    }
}

/// `engagementRate` → `Engagement Rate`, `impressions` → `Impressions`.
fn metric_display_name(name: &str) -> String {
    let spaced = name.replace("Rate", " Rate");
    let mut out = String::with_capacity(spaced.len());
    let mut prev_alpha = false;

    for c in spaced.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }

    out
}

/// Formats a table listing of archived messages, newest first.
pub fn format_messages_table(archive: &Archive, limit: usize, status: Option<&str>) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["ID", "Date", "Status", "Source", "Title"]);

    let status = status.map(str::to_lowercase);
    let rows = archive
        .sorted_by_date_desc()
        .into_iter()
        .filter(|m| status.as_deref().map_or(true, |s| m.status() == s))
        .take(limit);

    for msg in rows {
        let source = match (msg.source.as_deref(), msg.subchannel.as_deref()) {
            (Some(src), Some(sub)) => format!("{src}/{sub}"),
            (Some(src), None) => src.to_string(),
            _ => "-".to_string(),
        };

        table.add_row(vec![
            truncate(&msg.id, 12),
            truncate(&msg.date, 19),
            msg.status().to_string(),
            source,
            truncate(&msg.title(), 40),
        ]);
    }

    table.to_string()
}

/// Formats a sync report for display.
pub fn format_sync_report(report: &SyncReport, total: usize) -> String {
    let mut out = format!(
        "{}\n  Processed: {}\n  Skipped (already archived): {}\n  Failed: {}\n  Dropped before merge: {}\n  Total in archive: {}",
        "📊 Sync summary".bold(),
        report.processed.to_string().green(),
        report.skipped.to_string().cyan(),
        report.failed.to_string().red(),
        report.dropped.to_string().yellow(),
        total.to_string().cyan(),
    );

    if report.files_read > 0 {
        out.push_str(&format!("\n  Files read: {}", report.files_read));
    }

    if !report.categories_skipped.is_empty() {
        out.push_str(&format!(
            "\n  Categories skipped: {}",
            report.categories_skipped.join(", ").yellow()
        ));
    }

    out
}

/// Truncates a string to max characters with ellipsis.
fn truncate(s: &str, max_len: usize) -> String {
    let s = s.lines().next().unwrap_or(s);
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}
