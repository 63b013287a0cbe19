//! Listing read-model shared with the presentation layer

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::remote::RemoteMetadata;

use super::path;

/// Snapshot of one remote entry, built fresh from every stat or listing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub mode: u32,
    pub modified: Option<DateTime<Utc>>,
    pub is_dir: bool,
    pub is_symlink: bool,
}

impl FileEntry {
    pub fn from_metadata(name: String, path: String, metadata: &RemoteMetadata) -> Self {
        Self {
            name,
            path,
            size: metadata.size,
            mode: metadata.mode,
            modified: metadata.modified,
            is_dir: metadata.is_dir,
            is_symlink: metadata.is_symlink,
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }

    /// Lowercased file extension, if any. Dotfiles have none.
    pub fn extension(&self) -> Option<String> {
        if self.is_dir {
            None
        } else {
            path::extension(&self.name).map(|e| e.to_ascii_lowercase())
        }
    }
}

/// Sort order for file listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    NameAsc,
}

impl SortOrder {
    pub fn sort(&self, entries: &mut [FileEntry]) {
        entries.sort_by(|a, b| {
            // Directories before files
            if a.is_dir != b.is_dir {
                return if a.is_dir {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Greater
                };
            }

            match self {
                SortOrder::NameAsc => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            }
        });
    }
}

/// Coarse file categories accepted as listing filter keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    Images,
    Documents,
    Archives,
    Code,
}

impl FileCategory {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "images" => Some(FileCategory::Images),
            "documents" => Some(FileCategory::Documents),
            "archives" => Some(FileCategory::Archives),
            "code" => Some(FileCategory::Code),
            _ => None,
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        // Compound suffixes are checked before the plain extension.
        if *self == FileCategory::Archives
            && [".tar.gz", ".tar.bz2", ".tar.xz"]
                .iter()
                .any(|suffix| lower.ends_with(suffix))
        {
            return true;
        }
        let Some(ext) = path::extension(&lower) else {
            return false;
        };
        match self {
            FileCategory::Images => matches!(
                ext,
                "jpg" | "jpeg" | "png" | "gif" | "bmp" | "svg" | "webp" | "ico" | "tiff" | "tif"
            ),
            FileCategory::Documents => matches!(
                ext,
                "pdf" | "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx" | "txt" | "rtf" | "odt"
                    | "ods" | "odp"
            ),
            FileCategory::Archives => {
                matches!(ext, "zip" | "tar" | "gz" | "bz2" | "xz" | "7z" | "rar")
            }
            FileCategory::Code => super::language::is_code_extension(ext),
        }
    }
}

/// Predicate applied to listing results after the hidden-file rule.
#[derive(Clone, Default)]
pub enum EntryFilter {
    #[default]
    All,
    Category(FileCategory),
    /// Case-insensitive substring match on the entry name.
    Contains(String),
    Custom(Arc<dyn Fn(&FileEntry) -> bool + Send + Sync>),
}

impl std::fmt::Debug for EntryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryFilter::All => f.write_str("All"),
            EntryFilter::Category(c) => f.debug_tuple("Category").field(c).finish(),
            EntryFilter::Contains(s) => f.debug_tuple("Contains").field(s).finish(),
            EntryFilter::Custom(_) => f.write_str("Custom(<fn>)"),
        }
    }
}

impl EntryFilter {
    /// Parse the free-form filter box: category keyword, else substring.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim().to_lowercase();
        if raw.is_empty() {
            return EntryFilter::All;
        }
        match FileCategory::from_keyword(&raw) {
            Some(category) => EntryFilter::Category(category),
            None => EntryFilter::Contains(raw),
        }
    }

    pub fn custom(predicate: impl Fn(&FileEntry) -> bool + Send + Sync + 'static) -> Self {
        EntryFilter::Custom(Arc::new(predicate))
    }

    pub fn matches(&self, entry: &FileEntry) -> bool {
        match self {
            EntryFilter::All => true,
            EntryFilter::Category(category) => category.matches(&entry.name),
            EntryFilter::Contains(needle) => entry.name.to_lowercase().contains(needle.as_str()),
            EntryFilter::Custom(predicate) => predicate(entry),
        }
    }
}

/// One step of the navigation trail for a directory path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub name: String,
    pub path: String,
}

/// Build the navigation trail for `current`, always starting at the root.
pub fn breadcrumbs(current: &str) -> Vec<Breadcrumb> {
    let mut crumbs = vec![Breadcrumb {
        name: "Home".to_string(),
        path: "/".to_string(),
    }];

    let mut accumulated = String::new();
    for part in current.split('/').filter(|p| !p.is_empty()) {
        accumulated.push('/');
        accumulated.push_str(part);
        crumbs.push(Breadcrumb {
            name: part.to_string(),
            path: accumulated.clone(),
        });
    }

    crumbs
}
