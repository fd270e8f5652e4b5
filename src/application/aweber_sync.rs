//! AWeber broadcast synchronization.
//!
//! Walks the draft, scheduled and sent broadcast collections of the first
//! list of the first account, and normalizes each broadcast into a
//! [`Message`]. Broadcasts already archived as sent are never re-fetched.

use serde_json::Value;

use crate::domain::models::STATUS_SENT;
use crate::domain::{AppError, Archive, Message, Result, SyncOptions, SyncReport, EPOCH_DATE};
use crate::infrastructure::ApiTransport;

use super::html::clean_html;

/// Broadcast collections, in processing order.
pub const CATEGORIES: [&str; 3] = ["draft", "scheduled", "sent"];

const ID_FIELDS: [&str; 3] = ["id", "broadcast_id", "draft_id"];
const DATE_FIELDS: [&str; 3] = ["sent_at", "scheduled_for", "created_at"];

/// Result of handling one collection entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryOutcome {
    Processed,
    Skipped,
    Failed,
}

/// Syncs all broadcast categories into `archive`.
///
/// Account and list discovery failures are fatal; category and item
/// failures are logged and counted in the report.
///
/// # Errors
/// Returns error if the account or list cannot be resolved.
pub fn sync_broadcasts<T: ApiTransport + ?Sized>(
    transport: &mut T,
    archive: &mut Archive,
    options: &SyncOptions,
    api_base: &str,
) -> Result<SyncReport> {
    let threshold = options.threshold(&archive.last_sync);
    tracing::debug!(%threshold, full = options.full, "Incremental threshold");

    let accounts = fetch_required(transport, &format!("{api_base}/accounts"))?;
    let account = first_entry(&accounts, "accounts")?;

    let lists_link = account
        .get("lists_collection_link")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::InvalidData {
            message: "account has no lists_collection_link".into(),
        })?;
    let lists = fetch_required(transport, lists_link)?;
    let list = first_entry(&lists, "lists")?;

    if let Some(name) = list.get("name").and_then(Value::as_str) {
        archive.list_name = name.to_string();
    }

    let mut report = SyncReport::default();

    for status in CATEGORIES {
        println!("📥 Checking {status}...");

        let url = list
            .get(format!("{status}_broadcasts_link"))
            .and_then(Value::as_str)
            .map_or_else(
                || {
                    format!(
                        "{api_base}/accounts/{}/lists/{}/broadcasts",
                        id_string(account.get("id")).unwrap_or_default(),
                        id_string(list.get("id")).unwrap_or_default()
                    )
                },
                String::from,
            );

        sync_category(transport, archive, options, &threshold, status, &url, &mut report);
    }

    Ok(report)
}

/// Pages through one status collection.
fn sync_category<T: ApiTransport + ?Sized>(
    transport: &mut T,
    archive: &mut Archive,
    options: &SyncOptions,
    threshold: &str,
    status: &str,
    start_url: &str,
    report: &mut SyncReport,
) {
    let mut next = Some(start_url.to_string());

    while let Some(page_url) = next.take() {
        // The status filter only applies to the first page; next links carry their own query.
        let query: Vec<(&str, &str)> =
            if page_url == start_url && page_url.contains("broadcasts") && status != "draft" {
                vec![("status", status)]
            } else {
                Vec::new()
            };

        let reply = match transport.get_json(&page_url, &query) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(status, "Aborting category: {e}");
                report.categories_skipped.push(status.to_string());
                return;
            }
        };

        if reply.is_permission_denied() {
            tracing::warn!(
                status,
                code = reply.status,
                "No permission for this category, skipping"
            );
            report.categories_skipped.push(status.to_string());
            return;
        }

        if !reply.is_ok() {
            tracing::warn!(status, code = reply.status, "Unexpected response, aborting category");
            report.categories_skipped.push(status.to_string());
            return;
        }

        let entries = reply
            .body
            .get("entries")
            .and_then(Value::as_array)
            .map_or(&[][..], Vec::as_slice);

        for entry in entries {
            match process_entry(transport, archive, options, threshold, status, entry) {
                EntryOutcome::Processed => report.processed += 1,
                EntryOutcome::Skipped => report.skipped += 1,
                EntryOutcome::Failed => report.failed += 1,
            }
        }

        next = reply
            .body
            .get("next_collection_link")
            .and_then(Value::as_str)
            .filter(|link| !link.is_empty())
            .map(String::from);

        if next.as_deref() == Some(page_url.as_str()) {
            tracing::warn!(status, url = %page_url, "Next page points to itself, stopping");
            next = None;
        }
    }
}

/// Applies the skip rules to an entry and archives it when retained.
fn process_entry<T: ApiTransport + ?Sized>(
    transport: &mut T,
    archive: &mut Archive,
    options: &SyncOptions,
    threshold: &str,
    status: &str,
    entry: &Value,
) -> EntryOutcome {
    let Some(id) = ID_FIELDS.iter().find_map(|f| id_string(entry.get(*f))) else {
        tracing::warn!(status, "Broadcast without id, skipping");
        return EntryOutcome::Failed;
    };

    let date = DATE_FIELDS
        .iter()
        .find_map(|f| entry.get(*f).and_then(Value::as_str).filter(|s| !s.is_empty()))
        .unwrap_or(EPOCH_DATE);

    if !options.full {
        if status == STATUS_SENT && date < threshold {
            tracing::debug!(%id, date, "Sent before threshold, skipping");
            return EntryOutcome::Skipped;
        }
        if archive.is_sent(&id) {
            tracing::debug!(%id, "Already archived as sent, skipping");
            return EntryOutcome::Skipped;
        }
    }

    let subject_hint = entry
        .get("subject")
        .and_then(Value::as_str)
        .unwrap_or("No Subject");
    let short: String = subject_hint.chars().take(40).collect();
    println!("   + Processing: {short}...");

    let Some(self_link) = entry.get("self_link").and_then(Value::as_str) else {
        tracing::warn!(%id, "Broadcast without self_link, skipping");
        return EntryOutcome::Failed;
    };

    let detail = match transport.get_json(self_link, &[]) {
        Ok(reply) if reply.is_ok() => reply.body,
        Ok(reply) => {
            tracing::warn!(%id, code = reply.status, "Detail fetch failed, skipping");
            return EntryOutcome::Failed;
        }
        Err(e) => {
            tracing::warn!(%id, "Detail fetch failed, skipping: {e}");
            return EntryOutcome::Failed;
        }
    };

    archive.upsert(broadcast_message(&id, date, status, &detail));
    EntryOutcome::Processed
}

/// Builds a message from a broadcast detail document.
fn broadcast_message(id: &str, date: &str, category: &str, detail: &Value) -> Message {
    let cleaned = clean_html(detail.get("body_html").and_then(Value::as_str).unwrap_or(""));
    let status = detail
        .get("status")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(category);

    let mut message = Message::new(id, date, status, cleaned.body).with_source("aweber", "newsletter");
    message.subject = detail
        .get("subject")
        .and_then(Value::as_str)
        .map(String::from);
    message.preview = Some(cleaned.preview).filter(|p| !p.is_empty());

    message
}

/// GETs a document that the sync cannot continue without.
fn fetch_required<T: ApiTransport + ?Sized>(transport: &mut T, url: &str) -> Result<Value> {
    let reply = transport.get_json(url, &[])?;
    if !reply.is_ok() {
        return Err(AppError::Api {
            status: reply.status,
            message: format!("GET {url} failed"),
        });
    }
    Ok(reply.body)
}

fn first_entry<'a>(collection: &'a Value, what: &str) -> Result<&'a Value> {
    collection
        .get("entries")
        .and_then(Value::as_array)
        .and_then(|entries| entries.first())
        .ok_or_else(|| AppError::InvalidData {
            message: format!("no {what} returned by the API"),
        })
}

/// Stringifies a non-empty string or numeric identifier.
fn id_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}
