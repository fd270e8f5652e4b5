//! Buffer GraphQL dump parsing.
//!
//! Reads saved `posts` responses (`data.posts.edges[].node`) and turns each
//! post into a LinkedIn [`Message`], downloading attached images into the
//! media directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::domain::{
    AppError, LinkAttachment, MediaItem, Message, Result, SocialExtension, SyncReport, EPOCH_DATE,
};
use crate::infrastructure::MediaFetcher;

#[derive(Debug, Default, Deserialize)]
struct RawDump {
    data: Option<RawData>,
}

#[derive(Debug, Default, Deserialize)]
struct RawData {
    posts: Option<RawPosts>,
}

/// Edges stay untyped so one malformed post does not reject the file.
#[derive(Debug, Default, Deserialize)]
struct RawPosts {
    edges: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNode {
    id: Option<String>,
    sent_at: Option<String>,
    due_at: Option<String>,
    created_at: Option<String>,
    text: Option<String>,
    status: Option<String>,
    assets: Option<Vec<RawAsset>>,
    metrics: Option<Vec<RawMetric>>,
    metadata: Option<RawMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAsset {
    source: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMetric {
    #[serde(rename = "type")]
    kind: Option<String>,
    value: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMetadata {
    link_attachment: Option<LinkAttachment>,
}

/// Dump files in `dir` whose names start with `prefix` and end in `.json`,
/// sorted by name.
///
/// A missing directory yields no files.
///
/// # Errors
/// Returns error if the directory exists but cannot be read.
pub fn find_dump_files(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        tracing::debug!(dir = %dir.display(), "Dump directory does not exist");
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(dir)
        .map_err(|e| AppError::io(format!("Failed to read {}", dir.display()), e))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|name| name.starts_with(prefix) && name.ends_with(".json"))
        })
        .collect();

    files.sort();
    Ok(files)
}

/// Parse one dump file into messages keyed by id.
///
/// Missing or malformed files are reported and yield no messages.
pub fn parse_dump_file<F: MediaFetcher + ?Sized>(
    path: &Path,
    fallback_status: &str,
    media_dir: &Path,
    fetcher: &F,
    report: &mut SyncReport,
) -> BTreeMap<String, Message> {
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            println!("ℹ️ File not found: {name}");
            return BTreeMap::new();
        }
        Err(e) => {
            println!("❌ Error reading {name}: {e}");
            return BTreeMap::new();
        }
    };

    println!("📖 Loading file: {name}...");
    let dump: RawDump = match serde_json::from_str(&content) {
        Ok(dump) => dump,
        Err(e) => {
            println!("❌ Error decoding JSON in {name}");
            tracing::debug!(file = %name, "{e}");
            return BTreeMap::new();
        }
    };
    report.files_read += 1;

    let edges = dump
        .data
        .and_then(|d| d.posts)
        .and_then(|p| p.edges)
        .unwrap_or_default();

    let mut messages = BTreeMap::new();
    for (i, mut edge) in edges.into_iter().enumerate() {
        let Some(node) = edge.get_mut("node").map(serde_json::Value::take) else {
            continue;
        };
        if node.is_null() {
            continue;
        }

        let node: RawNode = match serde_json::from_value(node) {
            Ok(node) => node,
            Err(e) => {
                tracing::warn!(file = %name, edge = i, "Malformed post, skipping: {e}");
                report.failed += 1;
                continue;
            }
        };

        let Some(message) = node_message(node, fallback_status, media_dir, fetcher, report) else {
            report.failed += 1;
            continue;
        };
        report.processed += 1;
        messages.insert(message.id.clone(), message);
    }

    messages
}

fn node_message<F: MediaFetcher + ?Sized>(
    node: RawNode,
    fallback_status: &str,
    media_dir: &Path,
    fetcher: &F,
    report: &mut SyncReport,
) -> Option<Message> {
    let Some(id) = node.id.filter(|id| !id.is_empty()) else {
        tracing::warn!("Post without id, skipping");
        return None;
    };

    let short: String = id.chars().take(10).collect();
    println!("   + Processing message: {short}...");

    let date = [node.sent_at, node.due_at, node.created_at]
        .into_iter()
        .flatten()
        .find(|d| !d.is_empty())
        .unwrap_or_else(|| EPOCH_DATE.to_string());

    let status = node
        .status
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| fallback_status.to_string());

    let mut media = Vec::new();
    for (i, asset) in node.assets.unwrap_or_default().into_iter().enumerate() {
        let Some(url) = asset.source.filter(|s| !s.is_empty()) else {
            continue;
        };
        println!("      ↓ Downloading image for message {short} (asset {i})...");
        match download_asset(fetcher, &url, media_dir, &id, i) {
            Some(local) => media.push(MediaItem::image(local.to_string_lossy())),
            None => report.failed += 1,
        }
    }

    let metrics: BTreeMap<String, f64> = node
        .metrics
        .unwrap_or_default()
        .into_iter()
        .filter_map(|m| {
            let kind = m.kind.filter(|k| !k.is_empty())?;
            let value = m.value.filter(|v| !v.is_null())?;
            match metric_value(&value) {
                Some(number) => Some((kind, number)),
                None => {
                    tracing::debug!(%id, metric = %kind, %value, "Non-numeric metric, skipping");
                    None
                }
            }
        })
        .collect();

    let link_attachment = node.metadata.and_then(|m| m.link_attachment);

    let mut message = Message::new(&id, &date, &status, node.text.unwrap_or_default())
        .with_source("buffer", "linkedin")
        .with_social(SocialExtension {
            metrics,
            link_attachment,
        });
    message.media = media;

    Some(message)
}

/// Numeric metric value; numbers may also arrive as strings.
fn metric_value(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// File extension guessed from an asset URL.
fn media_extension(url: &str) -> &'static str {
    let lower = url.to_lowercase();
    if lower.contains(".png") {
        ".png"
    } else if lower.contains(".gif") {
        ".gif"
    } else {
        ".jpg"
    }
}

/// Post ids end up in file names; keep them to a safe alphabet.
fn file_stem(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Download an asset to `media/<id>_<index><ext>`, reusing an existing file.
///
/// Returns `None` when the download or write fails.
fn download_asset<F: MediaFetcher + ?Sized>(
    fetcher: &F,
    url: &str,
    media_dir: &Path,
    id: &str,
    index: usize,
) -> Option<PathBuf> {
    let local = media_dir.join(format!("{}_{index}{}", file_stem(id), media_extension(url)));
    if local.exists() {
        return Some(local);
    }

    let bytes = match fetcher.fetch(url) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(%url, "Download failed: {e}");
            return None;
        }
    };

    if let Err(e) = fs::write(&local, bytes) {
        tracing::warn!(path = %local.display(), "Failed to save media: {e}");
        return None;
    }

    Some(local)
}
