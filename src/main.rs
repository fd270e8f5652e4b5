//! Content Archiver - Mirror newsletters and social posts into local archives.
//!
//! Pulls AWeber broadcasts over OAuth2 and LinkedIn posts from saved Buffer
//! GraphQL dumps into per-source JSON databases, with Markdown and optional
//! PDF exports for reading or LLM context.
//!
//!   content-archiver aweber                 # incremental newsletter sync
//!   content-archiver aweber --full --pdf    # back up, resync, render PDF
//!   content-archiver linkedin               # import new dump files
//!   content-archiver list linkedin -l 10    # newest archived posts
//!   content-archiver export aweber --pdf    # re-render exports only

mod application;
mod cli;
mod domain;
mod infrastructure;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use application::{format_messages_table, format_sync_report, SyncOutcome, SyncService};
use cli::{Cli, Commands};
use domain::{AppConfig, Source};
use infrastructure::{ensure_config_exists, load_config, SourcePaths};

fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Main application logic.
fn run(cli: Cli) -> domain::Result<()> {
    if matches!(cli.command, Commands::Init) {
        return cmd_init(cli.config.as_deref());
    }

    let config = load_config(cli.config.as_deref())?;
    let options = cli.command.sync_options();

    match cli.command {
        Commands::Aweber { pdf, .. } => {
            let outcome = SyncService::new(config).sync_aweber(&options, pdf)?;
            print_outcome(&outcome);
        }
        Commands::Linkedin { pdf, dumps_dir, .. } => {
            let outcome = SyncService::new(config).sync_linkedin(&options, pdf, dumps_dir)?;
            print_outcome(&outcome);
        }
        Commands::List {
            source,
            limit,
            status,
        } => {
            cmd_list(config, source, limit, status.as_deref())?;
        }
        Commands::Export { source, pdf } => {
            cmd_export(config, source, pdf)?;
        }
        Commands::Paths => {
            cmd_paths(&config);
        }
        Commands::Init => {}
    }

    Ok(())
}

fn print_outcome(outcome: &SyncOutcome) {
    println!();
    println!("{}", format_sync_report(&outcome.report, outcome.total));

    if outcome.saved {
        println!(
            "\n{} Sync complete. Total messages in archive: {}",
            "✅".green(),
            outcome.total
        );
    } else {
        println!("\n{} Nothing to archive yet.", "ℹ️".blue());
    }
}

/// List archived messages command.
fn cmd_list(
    config: AppConfig,
    source: Source,
    limit: usize,
    status: Option<&str>,
) -> domain::Result<()> {
    let archive = SyncService::new(config).load(source)?;

    if archive.is_empty() {
        println!("No messages archived for {source} yet.");
        return Ok(());
    }

    println!(
        "{} {} ({} messages, last sync {})",
        "📚".bold(),
        archive.list_name.cyan(),
        archive.len(),
        archive.last_sync
    );
    println!("{}", format_messages_table(&archive, limit, status));

    Ok(())
}

/// Regenerate exports command.
fn cmd_export(config: AppConfig, source: Source, pdf: bool) -> domain::Result<()> {
    let total = SyncService::new(config).export(source, pdf)?;
    println!(
        "{} Exported {} messages from the {} archive",
        "✓".green().bold(),
        total,
        source
    );
    Ok(())
}

/// Show resolved paths command.
fn cmd_paths(config: &AppConfig) {
    let data_dir = config.data_dir();

    println!("{}", "📂 Content Archiver Paths".bold());
    println!();
    println!("  Data dir:    {}", data_dir.display());
    println!("  Token cache: {}", config.token_file().display());
    println!("  Dumps dir:   {}", config.dumps_dir().display());

    for source in [Source::Aweber, Source::Linkedin] {
        let paths = SourcePaths::new(&data_dir, source);
        let marker = if paths.db.exists() {
            "present".green()
        } else {
            "missing".yellow()
        };

        println!();
        println!("  [{}]", source.to_string().cyan());
        println!("    Database: {} ({marker})", paths.db.display());
        println!("    Markdown: {}", paths.export_md.display());
        println!("    PDF:      {}", paths.export_pdf.display());
        println!("    Media:    {}", paths.media.display());
    }
}

/// Write the default config file command.
fn cmd_init(path: Option<&std::path::Path>) -> domain::Result<()> {
    let path = ensure_config_exists(path)?;
    println!("{} Configuration: {}", "✓".green().bold(), path.display());
    Ok(())
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
