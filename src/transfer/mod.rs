//! File operations and archive streaming over a session's connection.

mod archive;
mod engine;
pub mod language;
pub mod path;
mod types;

pub use archive::{ArchiveBuilder, ArchiveSummary, SkippedEntry};
pub use engine::{BatchDeleteReport, Preview, RemoteFile, TransferEngine, TransferSettings};
pub use types::{Breadcrumb, EntryFilter, FileCategory, FileEntry, SortOrder, breadcrumbs};
