//! CLI interface using clap.
//!
//! Provides command-line arguments and subcommands for the tool.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::domain::{Source, SyncOptions};

/// Content Archiver - Mirror newsletters and social posts into local archives.
///
/// Quick start: content-archiver aweber | linkedin | list aweber | export linkedin --pdf
#[derive(Parser, Debug)]
#[command(name = "content-archiver")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file (defaults to ~/.content-archiver/config.toml).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sync AWeber broadcasts (drafts, scheduled and sent).
    Aweber {
        /// Back up the database and resync everything.
        #[arg(long)]
        full: bool,

        /// Skip sent broadcasts older than this date (YYYY-MM-DD) instead of the last sync.
        #[arg(long, value_name = "YYYY-MM-DD")]
        from_date: Option<NaiveDate>,

        /// Upper date bound; accepted but not applied yet.
        #[arg(long, value_name = "YYYY-MM-DD")]
        to_date: Option<NaiveDate>,

        /// Also render the PDF export.
        #[arg(long)]
        pdf: bool,
    },

    /// Import LinkedIn posts from saved Buffer GraphQL dumps.
    Linkedin {
        /// Back up the database and rebuild it from the dumps.
        #[arg(long)]
        full: bool,

        /// Also render the PDF export.
        #[arg(long)]
        pdf: bool,

        /// Directory holding the dump files.
        #[arg(long, value_name = "PATH")]
        dumps_dir: Option<PathBuf>,
    },

    /// List archived messages (summary table).
    List {
        /// Source archive: aweber or linkedin.
        source: Source,

        /// Maximum number of messages to show.
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Only show messages with this status.
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Regenerate the exports of a source from its database.
    Export {
        /// Source archive: aweber or linkedin.
        source: Source,

        /// Also render the PDF export.
        #[arg(long)]
        pdf: bool,
    },

    /// Show data, database and export paths being used.
    Paths,

    /// Write the default configuration file if missing.
    Init,
}

impl Commands {
    /// Sync options for the sync subcommands.
    #[must_use]
    pub fn sync_options(&self) -> SyncOptions {
        match *self {
            Self::Aweber {
                full,
                from_date,
                to_date,
                ..
            } => SyncOptions {
                full,
                from_date,
                to_date,
            },
            Self::Linkedin { full, .. } => SyncOptions {
                full,
                ..Default::default()
            },
            _ => SyncOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aweber_flags() {
        let cli = Cli::try_parse_from([
            "content-archiver",
            "-vv",
            "aweber",
            "--full",
            "--from-date",
            "2024-03-05",
            "--pdf",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let options = cli.command.sync_options();
        assert!(options.full);
        assert_eq!(options.from_date, NaiveDate::from_ymd_opt(2024, 3, 5));
        assert!(matches!(cli.command, Commands::Aweber { pdf: true, .. }));
    }

    #[test]
    fn test_parse_list_source() {
        let cli =
            Cli::try_parse_from(["content-archiver", "list", "buffer", "--status", "sent"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::List {
                source: Source::Linkedin,
                limit: 20,
                ..
            }
        ));

        assert!(Cli::try_parse_from(["content-archiver", "list", "twitter"]).is_err());
    }

    #[test]
    fn test_invalid_date_is_rejected() {
        assert!(Cli::try_parse_from(["content-archiver", "aweber", "--from-date", "05/03/2024"]).is_err());
    }
}
