//! Persistence and export of a finished archive.

use std::fs;

use chrono::Local;

use crate::domain::{AppError, Archive, PdfConfig, Result};
use crate::infrastructure::pdf::render_pdf;
use crate::infrastructure::{JsonStore, SourcePaths};

use super::formatter::format_archive_markdown;

/// Save the JSON database and regenerate the Markdown export.
///
/// # Errors
/// Returns error if either file cannot be written.
pub fn persist_archive(
    store: &JsonStore,
    archive: &Archive,
    paths: &SourcePaths,
    title: &str,
) -> Result<()> {
    store.save(archive)?;
    write_markdown(archive, paths, title)
}

/// Write the Markdown export for `archive`.
///
/// # Errors
/// Returns error if the export file cannot be written.
pub fn write_markdown(archive: &Archive, paths: &SourcePaths, title: &str) -> Result<()> {
    let generated_at = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let markdown = format_archive_markdown(archive, title, Some(&paths.media), &generated_at);

    fs::write(&paths.export_md, markdown).map_err(|e| {
        AppError::io(format!("Failed to write {}", paths.export_md.display()), e)
    })?;

    println!("📝 Markdown export: {}", paths.export_md.display());
    Ok(())
}

/// Render the PDF export for `archive`.
///
/// # Errors
/// Returns error if the document cannot be rendered or moved into place.
pub fn write_pdf(archive: &Archive, paths: &SourcePaths, title: &str, config: &PdfConfig) -> Result<()> {
    render_pdf(archive, &paths.export_pdf, title, config)?;
    println!("📄 PDF export: {}", paths.export_pdf.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Message, Source};
    use tempfile::tempdir;

    #[test]
    fn test_persist_writes_db_and_markdown() {
        let dir = tempdir().unwrap();
        let paths = SourcePaths::ensure(dir.path(), Source::Aweber).unwrap();
        let store = JsonStore::new(&paths.db);

        let mut archive = Archive::default();
        archive.upsert(Message::new("A", "2024-01-01", "sent", "hello"));

        persist_archive(&store, &archive, &paths, "AWeber Archive").unwrap();

        assert_eq!(store.load().unwrap(), archive);
        let md = fs::read_to_string(&paths.export_md).unwrap();
        assert!(md.starts_with("# AWeber Archive: Unknown\n"));
        assert!(md.contains("Total messages: 1"));
    }
}
