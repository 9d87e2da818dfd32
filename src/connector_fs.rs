//! Filesystem walker.
//!
//! Enumerates candidate documents under the primary source root and any
//! auxiliary mounts. Auxiliary mounts are spliced into the logical tree as
//! `<aux_parent>/<name>/…`, so the rest of the pipeline never knows they live
//! elsewhere on disk.
//!
//! Traversal uses an explicit work-list rather than recursion, and the final
//! list is sorted with [`collate::compare`] so the output is independent of
//! directory iteration order.

use anyhow::Result;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};

use crate::collate;
use crate::config::Settings;
use crate::error::IngestError;
use crate::models::SourceDocument;

pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["txt", "md", "doc", "docx"];

const DEFAULT_EXCLUDES: [&str; 3] = ["**/~$*", "**/.*", "**/.*/**"];

/// A matching file found by the walker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub rel_path: String,
}

struct Filter {
    include: GlobSet,
    exclude: GlobSet,
}

impl Filter {
    fn new(settings: &Settings) -> Result<Self> {
        let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
        excludes.extend(settings.exclude_globs.iter().cloned());
        Ok(Self {
            include: build_globset(&settings.include_globs)?,
            exclude: build_globset(&excludes)?,
        })
    }

    fn matches(&self, rel_path: &str) -> bool {
        let ext_ok = extension_of(rel_path)
            .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false);
        ext_ok && self.include.is_match(rel_path) && !self.exclude.is_match(rel_path)
    }
}

fn extension_of(rel_path: &str) -> Option<String> {
    let name = rel_path.rsplit('/').next()?;
    let idx = name.rfind('.')?;
    if idx == 0 {
        return None;
    }
    Some(name[idx + 1..].to_lowercase())
}

/// Walk the primary root and all auxiliary mounts.
///
/// A missing or unreadable primary root is fatal; a missing mount is skipped.
pub fn scan_sources(settings: &Settings) -> Result<Vec<WalkEntry>> {
    let root = &settings.source_root;
    if !root.is_dir() {
        return Err(IngestError::SourceRootMissing(root.clone()).into());
    }
    if let Err(e) = std::fs::read_dir(root) {
        return Err(IngestError::SourceRootUnreadable {
            path: root.clone(),
            reason: e.to_string(),
        }
        .into());
    }

    let filter = Filter::new(settings)?;
    let mut entries = walk_tree(root, "", &filter);

    for mount in &settings.aux_mounts {
        if !mount.path.is_dir() {
            tracing::warn!(
                name = %mount.name,
                path = %mount.path.display(),
                "auxiliary source not found, skipping"
            );
            continue;
        }
        let prefix = format!("{}/{}", settings.aux_parent, mount.name);
        entries.extend(walk_tree(&mount.path, &prefix, &filter));
    }

    entries.sort_by(|a, b| collate::compare(&a.rel_path, &b.rel_path));
    entries.dedup_by(|later, earlier| {
        let dup = later.rel_path == earlier.rel_path;
        if dup {
            tracing::warn!(
                rel_path = %later.rel_path,
                shadowed = %later.path.display(),
                "duplicate relative path, keeping first"
            );
        }
        dup
    });

    Ok(entries)
}

fn walk_tree(base: &Path, prefix: &str, filter: &Filter) -> Vec<WalkEntry> {
    let mut out = Vec::new();
    let mut work: Vec<(PathBuf, String)> = vec![(base.to_path_buf(), prefix.to_string())];

    while let Some((dir, rel_dir)) = work.pop() {
        let read = match std::fs::read_dir(&dir) {
            Ok(read) => read,
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "cannot read directory");
                continue;
            }
        };

        let mut children: Vec<(String, PathBuf, bool)> = Vec::new();
        for entry in read.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            children.push((name, entry.path(), is_dir));
        }
        children.sort_by(|a, b| collate::compare(&a.0, &b.0));

        let mut subdirs = Vec::new();
        for (name, path, is_dir) in children {
            let rel = if rel_dir.is_empty() {
                name
            } else {
                format!("{}/{}", rel_dir, name)
            };
            if is_dir {
                subdirs.push((path, rel));
            } else if path.is_file() && filter.matches(&rel) {
                out.push(WalkEntry {
                    path,
                    rel_path: rel,
                });
            }
        }
        // Reverse so the first child directory is popped next.
        work.extend(subdirs.into_iter().rev());
    }

    out
}

/// Read a walked file into a [`SourceDocument`].
pub fn load_document(entry: &WalkEntry) -> std::io::Result<SourceDocument> {
    let mut doc = empty_document(entry);
    doc.bytes = std::fs::read(&entry.path)?;
    Ok(doc)
}

/// A document with no bytes, used when the file could not be read.
pub fn empty_document(entry: &WalkEntry) -> SourceDocument {
    SourceDocument {
        path: entry.path.clone(),
        rel_path: entry.rel_path.clone(),
        extension: extension_of(&entry.rel_path).unwrap_or_default(),
        bytes: Vec::new(),
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(
            GlobBuilder::new(pattern)
                .case_insensitive(true)
                .literal_separator(false)
                .build()?,
        );
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuxMount;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    fn rel_paths(entries: &[WalkEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.rel_path.as_str()).collect()
    }

    #[test]
    fn walks_supported_files_in_collation_order() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        touch(&src, "10 later/a.txt");
        touch(&src, "2 early/b.MD");
        touch(&src, "2 early/deep/er/c.docx");
        touch(&src, "2 early/skip.pdf");
        touch(&src, "2 early/~$lock.docx");
        touch(&src, ".git/config.txt");
        touch(&src, "root.doc");

        let settings = Settings::with_dirs(&src, tmp.path().join("out"));
        let entries = scan_sources(&settings).unwrap();
        assert_eq!(
            rel_paths(&entries),
            vec![
                "2 early/b.MD",
                "2 early/deep/er/c.docx",
                "10 later/a.txt",
                "root.doc"
            ]
        );
    }

    #[test]
    fn missing_root_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::with_dirs(tmp.path().join("nope"), tmp.path().join("out"));
        let err = scan_sources(&settings).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IngestError>(),
            Some(IngestError::SourceRootMissing(_))
        ));
    }

    #[test]
    fn aux_mounts_are_spliced_and_missing_ones_skipped() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let scans = tmp.path().join("scans");
        touch(&src, "extras/own.txt");
        touch(&scans, "0929.txt");

        let mut settings = Settings::with_dirs(&src, tmp.path().join("out"));
        settings.aux_mounts = vec![
            AuxMount {
                name: "scans".to_string(),
                path: scans,
            },
            AuxMount {
                name: "gone".to_string(),
                path: tmp.path().join("gone"),
            },
        ];
        let entries = scan_sources(&settings).unwrap();
        assert_eq!(
            rel_paths(&entries),
            vec!["extras/own.txt", "extras/scans/0929.txt"]
        );
    }

    #[test]
    fn load_document_lowercases_extension() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "Note.TXT");
        let entry = WalkEntry {
            path: tmp.path().join("Note.TXT"),
            rel_path: "Note.TXT".to_string(),
        };
        let doc = load_document(&entry).unwrap();
        assert_eq!(doc.extension, "txt");
        assert_eq!(doc.bytes, b"x");
    }
}
