//! Domain models for archived messages.
//!
//! A [`Message`] is the normalized record every source adapter produces.
//! The [`Archive`] is the keyed collection persisted per source.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Date used when a source record carries no usable date.
pub const EPOCH_DATE: &str = "1970-01-01";

/// `last_sync` value of an archive that was never synced.
pub const EPOCH_SYNC: &str = "1970-01-01T00:00:00Z";

/// `list_name` of an archive that was never synced.
pub const UNKNOWN_LIST: &str = "Unknown";

/// The only terminal status.
pub const STATUS_SENT: &str = "sent";

/// Kind of attached media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Image, usually downloaded into the source's media directory.
    Image,
    /// External link.
    Link,
    /// Any other kind; kept but never rendered.
    #[serde(other)]
    Other,
}

/// A single attachment descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Attachment kind.
    #[serde(rename = "type")]
    pub kind: MediaKind,
    /// Local path or remote URL.
    pub url: String,
    /// Alternative text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

impl MediaItem {
    /// Create an image attachment.
    #[must_use]
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Image,
            url: url.into(),
            alt: None,
        }
    }
}

/// Link preview attached to a social post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkAttachment {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// Platform-specific fields carried by social posts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SocialExtension {
    /// Engagement metrics by metric name.
    pub metrics: BTreeMap<String, f64>,
    /// Optional link preview.
    pub link_attachment: Option<LinkAttachment>,
}

/// A normalized archived message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredMessage", into = "StoredMessage")]
pub struct Message {
    pub id: String,
    pub date: String,
    status: String,
    pub content: String,
    pub subject: Option<String>,
    pub preview: Option<String>,
    pub media: Vec<MediaItem>,
    pub source: Option<String>,
    pub subchannel: Option<String>,
    pub social: Option<SocialExtension>,
}

impl Message {
    /// Create a base message. The status is stored lowercase.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        date: impl Into<String>,
        status: &str,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            date: date.into(),
            status: status.to_lowercase(),
            content: content.into(),
            subject: None,
            preview: None,
            media: Vec::new(),
            source: None,
            subchannel: None,
            social: None,
        }
    }

    /// Set the provenance tags.
    #[must_use]
    pub fn with_source(mut self, source: &str, subchannel: &str) -> Self {
        self.source = Some(source.to_string());
        self.subchannel = Some(subchannel.to_string());
        self
    }

    /// Attach the social extension payload.
    #[must_use]
    pub fn with_social(mut self, social: SocialExtension) -> Self {
        self.social = Some(social);
        self
    }

    /// Lowercase status.
    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Whether this message reached the terminal `sent` state.
    #[must_use]
    pub fn is_sent(&self) -> bool {
        self.status == STATUS_SENT
    }

    /// Engagement metrics, for social posts.
    #[must_use]
    pub fn metrics(&self) -> Option<&BTreeMap<String, f64>> {
        self.social.as_ref().map(|s| &s.metrics)
    }

    /// Subject, or a date-based fallback title.
    #[must_use]
    pub fn title(&self) -> String {
        match self.subject.as_deref() {
            Some(subject) if !subject.is_empty() => subject.to_string(),
            _ => format!("Post {}", self.date),
        }
    }
}

/// On-disk record shape of a [`Message`].
///
/// Every field is listed explicitly; unknown fields are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoredMessage {
    id: String,
    #[serde(default)]
    date: Option<String>,
    status: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    preview: Option<String>,
    #[serde(default)]
    media: Option<Vec<MediaItem>>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    subchannel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metrics: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    link_attachment: Option<LinkAttachment>,
}

impl TryFrom<StoredMessage> for Message {
    type Error = String;

    fn try_from(raw: StoredMessage) -> Result<Self, Self::Error> {
        if raw.id.trim().is_empty() {
            return Err("message record has an empty id".to_string());
        }
        if raw.status.trim().is_empty() {
            return Err(format!("message {} has an empty status", raw.id));
        }

        // A metrics key marks a social post, even when the map is empty.
        let social = match (raw.metrics, raw.link_attachment) {
            (None, None) => None,
            (metrics, link_attachment) => Some(SocialExtension {
                metrics: metrics.unwrap_or_default(),
                link_attachment,
            }),
        };

        Ok(Self {
            id: raw.id,
            date: raw.date.unwrap_or_else(|| EPOCH_DATE.to_string()),
            status: raw.status.to_lowercase(),
            content: raw.content.unwrap_or_default(),
            subject: raw.subject,
            preview: raw.preview,
            media: raw.media.unwrap_or_default(),
            source: raw.source,
            subchannel: raw.subchannel,
            social,
        })
    }
}

impl From<Message> for StoredMessage {
    fn from(msg: Message) -> Self {
        let (metrics, link_attachment) = match msg.social {
            Some(social) => (Some(social.metrics), social.link_attachment),
            None => (None, None),
        };

        Self {
            id: msg.id,
            date: Some(msg.date),
            status: msg.status,
            content: Some(msg.content),
            subject: msg.subject,
            preview: msg.preview,
            media: Some(msg.media),
            source: msg.source,
            subchannel: msg.subchannel,
            metrics,
            link_attachment,
        }
    }
}

/// The per-source message store with its sync metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Archive {
    /// Timestamp of the last completed sync.
    #[serde(default = "default_last_sync")]
    pub last_sync: String,
    /// Human-readable label of the archived list or channel.
    #[serde(default = "default_list_name")]
    pub list_name: String,
    /// Messages keyed by id.
    #[serde(default)]
    pub messages: BTreeMap<String, Message>,
}

fn default_last_sync() -> String {
    EPOCH_SYNC.to_string()
}

fn default_list_name() -> String {
    UNKNOWN_LIST.to_string()
}

impl Default for Archive {
    fn default() -> Self {
        Self {
            last_sync: default_last_sync(),
            list_name: default_list_name(),
            messages: BTreeMap::new(),
        }
    }
}

impl Archive {
    /// Drop every message that is not `sent`.
    ///
    /// Returns the number of messages removed.
    pub fn retain_sent(&mut self) -> usize {
        let before = self.messages.len();
        self.messages.retain(|_, m| m.is_sent());
        before - self.messages.len()
    }

    /// Insert or replace a message by id.
    pub fn upsert(&mut self, message: Message) {
        self.messages.insert(message.id.clone(), message);
    }

    /// Merge a batch of messages, later writes winning.
    pub fn merge(&mut self, messages: impl IntoIterator<Item = Message>) {
        for message in messages {
            self.upsert(message);
        }
    }

    /// Whether the archive holds `id` in the `sent` state.
    #[must_use]
    pub fn is_sent(&self, id: &str) -> bool {
        self.messages.get(id).is_some_and(Message::is_sent)
    }

    /// Number of archived messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the archive holds no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages ordered by date, newest first.
    #[must_use]
    pub fn sorted_by_date_desc(&self) -> Vec<&Message> {
        let mut sorted: Vec<&Message> = self.messages.values().collect();
        sorted.sort_by(|a, b| b.date.cmp(&a.date));
        sorted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sent(id: &str, date: &str) -> Message {
        Message::new(id, date, "sent", "body")
    }

    #[test]
    fn test_status_is_lowercased() {
        let msg = Message::new("1", EPOCH_DATE, "SENT", "x");
        assert_eq!(msg.status(), "sent");
        assert!(msg.is_sent());

        let msg = Message::new("2", EPOCH_DATE, "Scheduled", "x");
        assert_eq!(msg.status(), "scheduled");
        assert!(!msg.is_sent());
    }

    #[test]
    fn test_title_falls_back_to_date() {
        let mut msg = Message::new("1", "2024-02-03", "draft", "");
        assert_eq!(msg.title(), "Post 2024-02-03");

        msg.subject = Some(String::new());
        assert_eq!(msg.title(), "Post 2024-02-03");

        msg.subject = Some("Hello".into());
        assert_eq!(msg.title(), "Hello");
    }

    #[test]
    fn test_base_message_json_has_no_social_keys() {
        let msg = sent("A", "2024-01-01").with_source("aweber", "newsletter");
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["status"], "sent");
        assert_eq!(json["source"], "aweber");
        assert!(json.get("metrics").is_none());
        assert!(json.get("link_attachment").is_none());
    }

    #[test]
    fn test_social_message_keeps_empty_metrics() {
        let msg = sent("X", "2024-05-01").with_social(SocialExtension::default());
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"metrics\":{}"));

        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.metrics(), Some(&BTreeMap::new()));
        assert_eq!(back, msg);
    }

    #[test]
    fn test_stored_record_defaults() {
        let json = r#"{"id": "7", "status": "DRAFT", "content": null}"#;
        let msg: Message = serde_json::from_str(json).unwrap();

        assert_eq!(msg.date, EPOCH_DATE);
        assert_eq!(msg.status(), "draft");
        assert_eq!(msg.content, "");
        assert!(msg.media.is_empty());
        assert!(msg.social.is_none());
    }

    #[test]
    fn test_stored_record_rejects_bad_input() {
        assert!(serde_json::from_str::<Message>(r#"{"id": "", "status": "sent"}"#).is_err());
        assert!(serde_json::from_str::<Message>(r#"{"id": "1", "status": ""}"#).is_err());
        assert!(serde_json::from_str::<Message>(r#"{"status": "sent"}"#).is_err());
        assert!(
            serde_json::from_str::<Message>(r#"{"id": "1", "status": "sent", "extra": 1}"#)
                .is_err()
        );
    }

    #[test]
    fn test_unknown_media_kind_is_kept() {
        let json = r#"{"id": "1", "status": "sent", "media": [{"type": "video", "url": "v"}]}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.media[0].kind, MediaKind::Other);
    }

    #[test]
    fn test_retain_sent_keeps_only_sent() {
        let mut archive = Archive::default();
        archive.upsert(sent("A", "2024-01-01"));
        archive.upsert(Message::new("B", "2024-01-02", "draft", ""));
        archive.upsert(Message::new("C", "2024-01-03", "scheduled", ""));

        assert_eq!(archive.retain_sent(), 2);
        assert_eq!(archive.len(), 1);
        assert!(archive.is_sent("A"));
    }

    #[test]
    fn test_merge_is_last_write_wins() {
        let mut archive = Archive::default();
        archive.upsert(Message::new("A", "2024-01-01", "draft", "old"));
        archive.merge(vec![
            Message::new("A", "2024-01-01", "scheduled", "mid"),
            Message::new("A", "2024-01-02", "sent", "new"),
        ]);

        assert_eq!(archive.len(), 1);
        let a = &archive.messages["A"];
        assert_eq!(a.content, "new");
        assert!(a.is_sent());
    }

    #[test]
    fn test_sorted_by_date_desc() {
        let mut archive = Archive::default();
        archive.upsert(sent("old", "2023-01-01"));
        archive.upsert(sent("new", "2024-06-01"));
        archive.upsert(sent("mid", "2024-01-01"));

        let ids: Vec<&str> = archive
            .sorted_by_date_desc()
            .iter()
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_archive_defaults_when_fields_missing() {
        let archive: Archive = serde_json::from_str("{}").unwrap();
        assert_eq!(archive.last_sync, EPOCH_SYNC);
        assert_eq!(archive.list_name, UNKNOWN_LIST);
        assert!(archive.is_empty());
    }
}
