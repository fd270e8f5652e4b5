//! Sync-related domain types.
//!
//! Run options shared by every source adapter and the per-run report.

use chrono::NaiveDate;

/// Archived source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// AWeber newsletter broadcasts.
    Aweber,
    /// LinkedIn posts exported from Buffer.
    Linkedin,
}

impl Source {
    /// Directory and file name stem for this source.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Aweber => "aweber",
            Self::Linkedin => "linkedin",
        }
    }

    /// Title used in exports.
    #[must_use]
    pub const fn archive_title(self) -> &'static str {
        match self {
            Self::Aweber => "AWeber Archive",
            Self::Linkedin => "LinkedIn Archive",
        }
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "aweber" => Ok(Self::Aweber),
            "linkedin" | "buffer" => Ok(Self::Linkedin),
            _ => Err(format!("Unknown source: {s}. Use: aweber, linkedin")),
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

/// Options controlling a single sync run.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Destructive resync: back up and start from an empty archive.
    pub full: bool,
    /// Overrides the stored `last_sync` as the incremental threshold.
    pub from_date: Option<NaiveDate>,
    /// Accepted for compatibility; not applied to filtering.
    pub to_date: Option<NaiveDate>,
}

impl SyncOptions {
    /// Threshold below which already-sent items are not re-processed.
    #[must_use]
    pub fn threshold(&self, last_sync: &str) -> String {
        self.from_date.map_or_else(
            || last_sync.to_string(),
            |d| d.format("%Y-%m-%d").to_string(),
        )
    }
}

/// Outcome counters of a sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Stored non-sent messages dropped before merging.
    pub dropped: usize,
    /// Items normalized and merged.
    pub processed: usize,
    /// Items skipped by the incremental rules.
    pub skipped: usize,
    /// Items or assets that failed and were skipped.
    pub failed: usize,
    /// Status categories that were aborted or lacked permission.
    pub categories_skipped: Vec<String>,
    /// Input files read.
    pub files_read: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_prefers_from_date() {
        let opts = SyncOptions {
            from_date: NaiveDate::from_ymd_opt(2024, 3, 5),
            ..Default::default()
        };
        assert_eq!(opts.threshold("2025-01-01T00:00:00Z"), "2024-03-05");

        let opts = SyncOptions::default();
        assert_eq!(opts.threshold("2025-01-01T00:00:00Z"), "2025-01-01T00:00:00Z");
    }

    #[test]
    fn test_source_from_str() {
        assert!(matches!("AWeber".parse::<Source>(), Ok(Source::Aweber)));
        assert!(matches!("buffer".parse::<Source>(), Ok(Source::Linkedin)));
        assert!("twitter".parse::<Source>().is_err());
    }
}
