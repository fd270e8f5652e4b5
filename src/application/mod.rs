//! Application layer - use cases and orchestration.
//!
//! This layer contains the source adapters, the sync workflow and the
//! export formatting.

pub mod archive_service;
pub mod aweber_sync;
pub mod dump_parser;
pub mod formatter;
pub mod html;
pub mod sync_service;

pub use formatter::{format_messages_table, format_sync_report};
pub use sync_service::{SyncOutcome, SyncService};
