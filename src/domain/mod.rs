//! Domain layer - core types and rules.
//!
//! This layer contains the message model, archive retention rules,
//! configuration and error types without any I/O.

pub mod config;
pub mod error;
pub mod models;
pub mod sync;

pub use config::{AppConfig, AweberConfig, PdfConfig};
pub use error::{AppError, Result};
pub use models::{
    Archive, LinkAttachment, MediaItem, MediaKind, Message, SocialExtension, EPOCH_DATE,
};
pub use sync::{Source, SyncOptions, SyncReport};
