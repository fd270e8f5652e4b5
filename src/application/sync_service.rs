//! Synchronization service for archived sources.
//!
//! Orchestrates one run per source: prepare the stored archive according to
//! the sync mode, pull new items, then persist the database and exports.

use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};

use crate::domain::{AppConfig, Archive, Result, Source, SyncOptions, SyncReport};
use crate::infrastructure::{
    ApiTransport, HttpMediaFetcher, JsonStore, MediaFetcher, OAuthSession, SourcePaths,
};

use super::archive_service::{persist_archive, write_markdown, write_pdf};
use super::aweber_sync::sync_broadcasts;
use super::dump_parser::{find_dump_files, parse_dump_file};

/// `list_name` recorded for the LinkedIn archive.
pub const LINKEDIN_LIST_NAME: &str = "LinkedIn (Buffer)";

/// Result of a sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub report: SyncReport,
    /// Messages in the archive after the run.
    pub total: usize,
    /// Whether the database and exports were written.
    pub saved: bool,
}

/// Service for synchronizing sources into their local archives.
pub struct SyncService {
    config: AppConfig,
}

impl SyncService {
    /// Create a sync service with the given configuration.
    #[must_use]
    pub const fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Resolved layout for a source, without creating anything.
    #[must_use]
    pub fn paths(&self, source: Source) -> SourcePaths {
        SourcePaths::new(&self.config.data_dir(), source)
    }

    /// Sync AWeber broadcasts over an authenticated session.
    ///
    /// # Errors
    /// Returns error if authentication, discovery or persistence fails.
    pub fn sync_aweber(&self, options: &SyncOptions, pdf: bool) -> Result<SyncOutcome> {
        let mut session =
            OAuthSession::establish(&self.config.aweber, self.config.token_file())?;
        self.sync_aweber_with(&mut session, options, pdf)
    }

    /// Sync AWeber broadcasts through the given transport.
    ///
    /// # Errors
    /// Returns error if discovery or persistence fails.
    pub fn sync_aweber_with<T: ApiTransport + ?Sized>(
        &self,
        transport: &mut T,
        options: &SyncOptions,
        pdf: bool,
    ) -> Result<SyncOutcome> {
        tracing::info!(full = options.full, "Starting AWeber sync...");
        warn_unapplied_to_date(options);

        let paths = SourcePaths::ensure(&self.config.data_dir(), Source::Aweber)?;
        let store = JsonStore::new(&paths.db);
        let (mut archive, dropped) = prepare_archive(&store, options)?;

        let mut report =
            sync_broadcasts(transport, &mut archive, options, &self.config.aweber.api_base)?;
        report.dropped = dropped;

        self.finish(&store, &mut archive, &paths, Source::Aweber, pdf)?;

        Ok(SyncOutcome {
            report,
            total: archive.len(),
            saved: true,
        })
    }

    /// Sync LinkedIn posts from saved Buffer dumps, downloading media over HTTP.
    ///
    /// # Errors
    /// Returns error if the store cannot be read or written.
    pub fn sync_linkedin(
        &self,
        options: &SyncOptions,
        pdf: bool,
        dumps_dir: Option<PathBuf>,
    ) -> Result<SyncOutcome> {
        let fetcher = HttpMediaFetcher::new()?;
        self.sync_linkedin_with(&fetcher, options, pdf, dumps_dir)
    }

    /// Sync LinkedIn posts from saved Buffer dumps with the given fetcher.
    ///
    /// # Errors
    /// Returns error if the store cannot be read or written.
    pub fn sync_linkedin_with<F: MediaFetcher + ?Sized>(
        &self,
        fetcher: &F,
        options: &SyncOptions,
        pdf: bool,
        dumps_dir: Option<PathBuf>,
    ) -> Result<SyncOutcome> {
        tracing::info!(full = options.full, "Starting LinkedIn sync...");
        warn_unapplied_to_date(options);

        let paths = SourcePaths::ensure(&self.config.data_dir(), Source::Linkedin)?;
        let store = JsonStore::new(&paths.db);
        let (mut archive, dropped) = prepare_archive(&store, options)?;

        let mut report = SyncReport {
            dropped,
            ..Default::default()
        };

        println!("📥 Scanning for GQL dumps...");
        let dir = dumps_dir.unwrap_or_else(|| self.config.dumps_dir());
        let sent_files = find_dump_files(&dir, &self.config.linkedin.sent_prefix)?;
        let queue_files = find_dump_files(&dir, &self.config.linkedin.queue_prefix)?;
        tracing::debug!(
            dir = %dir.display(),
            sent = sent_files.len(),
            queue = queue_files.len(),
            "Dump files found"
        );

        if sent_files.is_empty() && queue_files.is_empty() {
            println!("⚠️ No input files found matching patterns.");
            if archive.is_empty() {
                return Ok(SyncOutcome {
                    report,
                    total: 0,
                    saved: false,
                });
            }
        }

        let batches = sent_files
            .iter()
            .map(|f| (f, "sent"))
            .chain(queue_files.iter().map(|f| (f, "scheduled")));
        for (file, fallback_status) in batches {
            let messages = parse_dump_file(file, fallback_status, &paths.media, fetcher, &mut report);
            archive.merge(messages.into_values());
        }

        archive.list_name = LINKEDIN_LIST_NAME.to_string();
        self.finish(&store, &mut archive, &paths, Source::Linkedin, pdf)?;

        Ok(SyncOutcome {
            report,
            total: archive.len(),
            saved: true,
        })
    }

    /// Load the stored archive of a source.
    ///
    /// # Errors
    /// Returns error if the database cannot be read.
    pub fn load(&self, source: Source) -> Result<Archive> {
        JsonStore::new(self.paths(source).db).load()
    }

    /// Regenerate the exports of a source from its stored archive.
    ///
    /// # Errors
    /// Returns error if the database cannot be read or an export fails.
    pub fn export(&self, source: Source, pdf: bool) -> Result<usize> {
        let paths = SourcePaths::ensure(&self.config.data_dir(), source)?;
        let archive = JsonStore::new(&paths.db).load()?;

        write_markdown(&archive, &paths, source.archive_title())?;
        if pdf {
            write_pdf(&archive, &paths, source.archive_title(), &self.config.pdf)?;
        }

        Ok(archive.len())
    }

    /// Stamp the sync time, persist and export.
    fn finish(
        &self,
        store: &JsonStore,
        archive: &mut Archive,
        paths: &SourcePaths,
        source: Source,
        pdf: bool,
    ) -> Result<()> {
        archive.last_sync = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        persist_archive(store, archive, paths, source.archive_title())?;

        if pdf {
            write_pdf(archive, paths, source.archive_title(), &self.config.pdf)?;
        }

        tracing::info!(total = archive.len(), "Sync completed");
        Ok(())
    }
}

/// Load the archive the run starts from.
///
/// Full mode moves the database aside and starts empty; incremental mode
/// keeps only `sent` messages. Returns the archive and the dropped count.
fn prepare_archive(store: &JsonStore, options: &SyncOptions) -> Result<(Archive, usize)> {
    tracing::debug!(db = %store.path().display(), full = options.full, "Preparing archive");

    if options.full {
        if let Some(backup) = store.backup()? {
            println!("💾 Backup saved: {}", backup.display());
        }
    }

    let mut archive = store.load()?;
    let dropped = if options.full {
        0
    } else {
        archive.retain_sent()
    };

    if dropped > 0 {
        tracing::info!(dropped, "Dropped non-sent messages before refetch");
    }

    Ok((archive, dropped))
}

fn warn_unapplied_to_date(options: &SyncOptions) {
    if let Some(to_date) = options.to_date {
        tracing::warn!(%to_date, "--to-date is accepted but not applied");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AppError, Message, PdfConfig};
    use crate::infrastructure::http::ApiReply;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    const BASE: &str = "https://api.test/1.0";

    struct StaticApi(HashMap<String, Value>);

    impl ApiTransport for StaticApi {
        fn get_json(&mut self, url: &str, _query: &[(&str, &str)]) -> Result<ApiReply> {
            self.0
                .get(url)
                .cloned()
                .map(|body| ApiReply { status: 200, body })
                .ok_or_else(|| AppError::Api {
                    status: 404,
                    message: url.to_string(),
                })
        }
    }

    struct NoMedia;

    impl MediaFetcher for NoMedia {
        fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            Err(AppError::Api {
                status: 404,
                message: url.to_string(),
            })
        }
    }

    fn service(data_dir: &Path) -> SyncService {
        let mut config = AppConfig::default();
        config.paths.data_dir = Some(data_dir.to_path_buf());
        config.aweber.api_base = BASE.to_string();
        config.pdf = PdfConfig {
            compress: false,
            ..Default::default()
        };
        SyncService::new(config)
    }

    fn api() -> StaticApi {
        let mut routes = HashMap::new();
        routes.insert(
            format!("{BASE}/accounts"),
            json!({"entries": [{"id": 1, "lists_collection_link": "https://api.test/lists"}]}),
        );
        routes.insert(
            "https://api.test/lists".to_string(),
            json!({"entries": [{"id": 2, "name": "Letters",
                "draft_broadcasts_link": "https://api.test/drafts",
                "scheduled_broadcasts_link": "https://api.test/scheduled",
                "sent_broadcasts_link": "https://api.test/sent"}]}),
        );
        routes.insert(
            "https://api.test/drafts".to_string(),
            json!({"entries": [{"id": "D", "created_at": "2024-06-01", "self_link": "https://api.test/b/D"}]}),
        );
        routes.insert("https://api.test/scheduled".to_string(), json!({"entries": []}));
        routes.insert(
            "https://api.test/sent".to_string(),
            json!({"entries": [{"id": "S", "sent_at": "2024-05-01", "self_link": "https://api.test/b/S"}]}),
        );
        routes.insert(
            "https://api.test/b/D".to_string(),
            json!({"subject": "Draft", "status": "draft", "body_html": "<p>d</p>"}),
        );
        routes.insert(
            "https://api.test/b/S".to_string(),
            json!({"subject": "Sent", "status": "sent", "body_html": "<p>s</p>"}),
        );
        StaticApi(routes)
    }

    #[test]
    fn test_aweber_sync_is_idempotent() {
        let dir = tempdir().unwrap();
        let svc = service(dir.path());

        let first = svc
            .sync_aweber_with(&mut api(), &SyncOptions::default(), false)
            .unwrap();
        assert_eq!(first.total, 2);
        let after_first = svc.load(Source::Aweber).unwrap();
        assert_eq!(after_first.list_name, "Letters");

        let second = svc
            .sync_aweber_with(&mut api(), &SyncOptions::default(), false)
            .unwrap();
        let after_second = svc.load(Source::Aweber).unwrap();

        assert_eq!(after_first.messages, after_second.messages);
        assert_eq!(second.report.dropped, 1);
        assert!(svc.paths(Source::Aweber).export_md.exists());
    }

    #[test]
    fn test_incremental_keeps_sent_history() {
        let dir = tempdir().unwrap();
        let svc = service(dir.path());
        let paths = SourcePaths::ensure(dir.path(), Source::Aweber).unwrap();

        let mut stored = Archive::default();
        stored.upsert(Message::new("old", "2020-01-01", "sent", "history"));
        stored.upsert(Message::new("gone", "2020-01-02", "draft", "stale"));
        JsonStore::new(&paths.db).save(&stored).unwrap();

        let outcome = svc
            .sync_aweber_with(&mut api(), &SyncOptions::default(), false)
            .unwrap();
        let archive = svc.load(Source::Aweber).unwrap();

        assert!(archive.is_sent("old"));
        assert!(!archive.messages.contains_key("gone"));
        assert_eq!(outcome.report.dropped, 1);
        assert_ne!(archive.last_sync, Archive::default().last_sync);
    }

    #[test]
    fn test_full_sync_backs_up_and_starts_empty() {
        let dir = tempdir().unwrap();
        let svc = service(dir.path());
        let paths = SourcePaths::ensure(dir.path(), Source::Aweber).unwrap();

        let mut stored = Archive::default();
        stored.upsert(Message::new("old", "2020-01-01", "sent", "history"));
        let store = JsonStore::new(&paths.db);
        store.save(&stored).unwrap();

        let options = SyncOptions {
            full: true,
            ..Default::default()
        };
        svc.sync_aweber_with(&mut api(), &options, false).unwrap();

        let archive = svc.load(Source::Aweber).unwrap();
        assert!(!archive.messages.contains_key("old"));
        assert_eq!(archive.len(), 2);

        let backup = JsonStore::new(store.backup_path()).load().unwrap();
        assert!(backup.is_sent("old"));
    }

    #[test]
    fn test_linkedin_without_dumps_or_history_saves_nothing() {
        let dir = tempdir().unwrap();
        let svc = service(dir.path());

        let outcome = svc
            .sync_linkedin_with(&NoMedia, &SyncOptions::default(), false, None)
            .unwrap();

        assert!(!outcome.saved);
        assert!(!svc.paths(Source::Linkedin).db.exists());
    }

    #[test]
    fn test_linkedin_merges_sent_and_queue_dumps() {
        let dir = tempdir().unwrap();
        let svc = service(dir.path());
        let dumps = dir.path().join("dumps");
        fs::create_dir_all(&dumps).unwrap();
        fs::write(
            dumps.join("linkedIn-response.sent.json"),
            r#"{"data":{"posts":{"edges":[{"node":{"id":"P1","sentAt":"2024-05-01","text":"hi"}}]}}}"#,
        )
        .unwrap();
        fs::write(
            dumps.join("linkedIn-response.queue.json"),
            r#"{"data":{"posts":{"edges":[{"node":{"id":"P2","dueAt":"2024-07-01","text":"soon"}}]}}}"#,
        )
        .unwrap();

        let outcome = svc
            .sync_linkedin_with(&NoMedia, &SyncOptions::default(), false, Some(dumps))
            .unwrap();
        assert!(outcome.saved);
        assert_eq!(outcome.report.files_read, 2);

        let archive = svc.load(Source::Linkedin).unwrap();
        assert_eq!(archive.list_name, LINKEDIN_LIST_NAME);
        assert!(archive.is_sent("P1"));
        assert_eq!(archive.messages["P2"].status(), "scheduled");

        let md = fs::read_to_string(svc.paths(Source::Linkedin).export_md).unwrap();
        assert!(md.starts_with("# LinkedIn Archive: LinkedIn (Buffer)\n"));
    }

    #[test]
    fn test_export_regenerates_markdown() {
        let dir = tempdir().unwrap();
        let svc = service(dir.path());
        let paths = SourcePaths::ensure(dir.path(), Source::Linkedin).unwrap();

        let mut stored = Archive::default();
        stored.upsert(Message::new("A", "2024-01-01", "sent", "body"));
        JsonStore::new(&paths.db).save(&stored).unwrap();

        assert_eq!(svc.export(Source::Linkedin, false).unwrap(), 1);
        assert!(paths.export_md.exists());
    }
}
