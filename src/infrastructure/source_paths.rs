//! Per-source file layout.
//!
//! Every source lives under `<data_dir>/<source>/` with its database,
//! exports and a `media/` directory.

use std::path::{Path, PathBuf};

use crate::domain::{AppError, Result, Source};

/// Resolved paths for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePaths {
    pub base: PathBuf,
    pub db: PathBuf,
    pub export_md: PathBuf,
    pub export_pdf: PathBuf,
    pub media: PathBuf,
}

impl SourcePaths {
    /// Compute the layout without touching the filesystem.
    #[must_use]
    pub fn new(data_dir: &Path, source: Source) -> Self {
        let slug = source.slug();
        let base = data_dir.join(slug);

        Self {
            db: base.join(format!("{slug}_db.json")),
            export_md: base.join(format!("{slug}_export_llm.md")),
            export_pdf: base.join(format!("{slug}_export_llm.pdf")),
            media: base.join("media"),
            base,
        }
    }

    /// Compute the layout and create the source and media directories.
    ///
    /// # Errors
    /// Returns error if the directories cannot be created.
    pub fn ensure(data_dir: &Path, source: Source) -> Result<Self> {
        let paths = Self::new(data_dir, source);

        std::fs::create_dir_all(&paths.media).map_err(|e| {
            AppError::io(
                format!("Failed to create media directory {}", paths.media.display()),
                e,
            )
        })?;

        tracing::debug!(base = %paths.base.display(), "Source directories ready");

        Ok(paths)
    }
}
