//! Core data models used throughout keepsake.
//!
//! Documents move through the pipeline as [`SourceDocument`] (raw bytes),
//! [`ParsedDocument`] (normalized text) and finally [`DocumentRecord`], the
//! only entity published to disk. The payload types at the bottom mirror the
//! JSON artifacts field for field.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A candidate file produced by the walker.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Absolute (or root-joined) path on disk.
    pub path: PathBuf,
    /// Path relative to the logical source root, forward-slash separated.
    /// Auxiliary mounts appear under `<aux_parent>/<mount name>/…`.
    pub rel_path: String,
    /// Lowercased extension without the dot.
    pub extension: String,
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    /// File name without extension.
    pub fn stem(&self) -> &str {
        let name = self.file_name();
        match name.rfind('.') {
            Some(idx) if idx > 0 => &name[..idx],
            _ => name,
        }
    }

    pub fn file_name(&self) -> &str {
        self.rel_path.rsplit('/').next().unwrap_or(&self.rel_path)
    }

    /// Relative path of the enclosing folder (`""` for documents at the root).
    pub fn folder(&self) -> &str {
        match self.rel_path.rfind('/') {
            Some(idx) => &self.rel_path[..idx],
            None => "",
        }
    }
}

/// A document after text extraction.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub source: SourceDocument,
    pub text: String,
    /// Non-empty, whitespace-collapsed lines of `text`.
    pub lines: Vec<String>,
    pub error: Option<String>,
}

/// Where a selected date came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DateSource {
    Filename,
    Title,
    ContentLine,
    FolderName,
    FolderNameInferred,
    Override,
}

impl DateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateSource::Filename => "filename",
            DateSource::Title => "title",
            DateSource::ContentLine => "content-line",
            DateSource::FolderName => "folder-name",
            DateSource::FolderNameInferred => "folder-name-inferred",
            DateSource::Override => "override",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateSignal {
    pub date: NaiveDate,
    pub source: DateSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BirthdayBucket {
    Current,
    Future,
}

impl BirthdayBucket {
    pub const ALL: [BirthdayBucket; 2] = [BirthdayBucket::Current, BirthdayBucket::Future];

    pub fn as_str(&self) -> &'static str {
        match self {
            BirthdayBucket::Current => "current",
            BirthdayBucket::Future => "future",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "current" => Some(BirthdayBucket::Current),
            "future" => Some(BirthdayBucket::Future),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationResult {
    pub routes: Vec<String>,
    pub mood_ids: Vec<String>,
}

/// Published per-document entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: String,
    pub title: String,
    pub source_path: String,
    pub source_rel_path: String,
    pub source_folder: String,
    pub source_folder_code: Option<String>,
    pub source_folder_date: Option<String>,
    pub routes: Vec<String>,
    pub mood_ids: Vec<String>,
    pub mood_labels: Vec<String>,
    pub birthday_bucket: Option<BirthdayBucket>,
    pub written_at: Option<String>,
    pub written_at_source: Option<DateSource>,
    pub content_path: String,
    pub content_length: usize,
    /// Calendar date behind `written_at`, used for sorting.
    #[serde(skip)]
    pub written_date: Option<NaiveDate>,
    #[serde(skip)]
    pub extraction_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewItem {
    pub source_rel_path: String,
    pub title: String,
    pub issues: Vec<String>,
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteGuide {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodGuide {
    pub id: String,
    pub label: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSummary {
    pub total: usize,
    pub dated_count: usize,
    pub undated_count: usize,
    pub review_count: usize,
    pub route_counts: BTreeMap<String, usize>,
    pub birthday_current: usize,
    pub birthday_future: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderGroup {
    pub name: String,
    pub code: Option<String>,
    pub date: Option<String>,
    pub count: usize,
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexPayload {
    pub version: u32,
    pub generated_at: String,
    pub source_dir: String,
    pub routes: Vec<RouteGuide>,
    pub mood_guide: Vec<MoodGuide>,
    pub summary: IndexSummary,
    pub folders: Vec<FolderGroup>,
    pub docs: Vec<DocumentRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewPayload {
    pub version: u32,
    pub generated_at: String,
    pub unresolved_count: usize,
    pub unresolved: Vec<ReviewItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewPayload {
    pub version: u32,
    pub generated_at: String,
    pub route: String,
    pub label: String,
    pub total: usize,
    pub ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(rel: &str) -> SourceDocument {
        SourceDocument {
            path: PathBuf::from("/src").join(rel),
            rel_path: rel.to_string(),
            extension: "txt".to_string(),
            bytes: Vec::new(),
        }
    }

    #[test]
    fn path_parts() {
        let d = doc("03 旅行/sub/0929 notes.txt");
        assert_eq!(d.file_name(), "0929 notes.txt");
        assert_eq!(d.stem(), "0929 notes");
        assert_eq!(d.folder(), "03 旅行/sub");

        let root = doc(".hidden");
        assert_eq!(root.stem(), ".hidden");
        assert_eq!(root.folder(), "");
    }

    #[test]
    fn date_source_serializes_kebab_case() {
        let json = serde_json::to_string(&DateSource::FolderNameInferred).unwrap();
        assert_eq!(json, "\"folder-name-inferred\"");
        assert_eq!(DateSource::ContentLine.as_str(), "content-line");
    }
}
