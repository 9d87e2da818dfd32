//! Artifact writer.
//!
//! Everything under the output directory except `overrides.json` is derived
//! and rebuilt from scratch on every run:
//!
//! ```text
//! <out>/content/<id>.txt     normalized body, one per document
//! <out>/index.json           summary, folder groups, every record
//! <out>/views/<route>.json   ids per route, plus birthday-current/-future
//! <out>/review.json          records that need a human look
//! ```
//!
//! Content files left over from earlier runs are deleted once the new set is
//! written. JSON is pretty-printed with a trailing newline so unchanged input
//! yields byte-identical files apart from `generatedAt`.

use anyhow::{Context, Result};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::classify::{Taxonomy, ROUTE_BIRTHDAY};
use crate::collate;
use crate::models::{
    BirthdayBucket, DocumentRecord, FolderGroup, IndexPayload, IndexSummary, ReviewItem,
    ReviewPayload, ViewPayload,
};

pub const ARTIFACT_VERSION: u32 = 1;
pub const CONTENT_DIR: &str = "content";
pub const VIEWS_DIR: &str = "views";
pub const INDEX_FILE: &str = "index.json";
pub const REVIEW_FILE: &str = "review.json";

/// A record together with the body written to its content file.
#[derive(Debug, Clone)]
pub struct PublishedDocument {
    pub record: DocumentRecord,
    pub body: String,
}

/// Relative content path for an id, as stored in `contentPath`.
pub fn content_path(id: &str) -> String {
    format!("{}/{}.txt", CONTENT_DIR, id)
}

/// Newest first, undated last, ties by relative path.
pub fn compare_records(a: &DocumentRecord, b: &DocumentRecord) -> Ordering {
    match (a.written_date, b.written_date) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| collate::compare(&a.source_rel_path, &b.source_rel_path))
}

pub fn sorted_records(documents: &[PublishedDocument]) -> Vec<DocumentRecord> {
    let mut records: Vec<DocumentRecord> = documents.iter().map(|d| d.record.clone()).collect();
    records.sort_by(compare_records);
    records
}

pub fn build_summary(
    records: &[DocumentRecord],
    review_count: usize,
    taxonomy: &Taxonomy,
) -> IndexSummary {
    let mut route_counts: BTreeMap<String, usize> = taxonomy
        .route_guide()
        .into_iter()
        .map(|r| (r.id, 0))
        .collect();
    for record in records {
        for route in &record.routes {
            *route_counts.entry(route.clone()).or_insert(0) += 1;
        }
    }
    let dated_count = records.iter().filter(|r| r.written_at.is_some()).count();
    let bucket_count = |bucket: BirthdayBucket| {
        records
            .iter()
            .filter(|r| r.birthday_bucket == Some(bucket))
            .count()
    };

    IndexSummary {
        total: records.len(),
        dated_count,
        undated_count: records.len() - dated_count,
        review_count,
        route_counts,
        birthday_current: bucket_count(BirthdayBucket::Current),
        birthday_future: bucket_count(BirthdayBucket::Future),
    }
}

/// One group per enclosing folder, newest folder date first, then by name.
/// `records` must already be in index order.
pub fn build_folders(records: &[DocumentRecord]) -> Vec<FolderGroup> {
    let mut groups: Vec<FolderGroup> = Vec::new();
    for record in records {
        match groups.iter_mut().find(|g| g.name == record.source_folder) {
            Some(group) => {
                group.count += 1;
                group.ids.push(record.id.clone());
            }
            None => groups.push(FolderGroup {
                name: record.source_folder.clone(),
                code: record.source_folder_code.clone(),
                date: record.source_folder_date.clone(),
                count: 1,
                ids: vec![record.id.clone()],
            }),
        }
    }
    groups.sort_by(|a, b| {
        match (&a.date, &b.date) {
            (Some(x), Some(y)) => y.cmp(x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| collate::compare(&a.name, &b.name))
    });
    groups
}

/// View file stem and payload for every declared route and birthday bucket.
pub fn build_views(
    records: &[DocumentRecord],
    taxonomy: &Taxonomy,
    generated_at: &str,
) -> Vec<(String, ViewPayload)> {
    let view = |route: String, label: String, ids: Vec<String>| ViewPayload {
        version: ARTIFACT_VERSION,
        generated_at: generated_at.to_string(),
        route,
        label,
        total: ids.len(),
        ids,
    };

    let mut views = Vec::new();
    for guide in taxonomy.route_guide() {
        let ids = records
            .iter()
            .filter(|r| r.routes.contains(&guide.id))
            .map(|r| r.id.clone())
            .collect();
        views.push((guide.id.clone(), view(guide.id, guide.label, ids)));
    }

    let birthday_label = taxonomy.route_label(ROUTE_BIRTHDAY);
    for bucket in BirthdayBucket::ALL {
        let name = format!("{}-{}", ROUTE_BIRTHDAY, bucket.as_str());
        let ids = records
            .iter()
            .filter(|r| r.birthday_bucket == Some(bucket))
            .map(|r| r.id.clone())
            .collect();
        let label = format!("{} ({})", birthday_label, bucket.as_str());
        views.push((name.clone(), view(name, label, ids)));
    }
    views
}

/// Inputs for one artifact write.
pub struct ArtifactSet<'a> {
    pub generated_at: String,
    pub source_dir: String,
    pub taxonomy: &'a Taxonomy,
    pub documents: &'a [PublishedDocument],
    pub review: &'a [ReviewItem],
}

/// What [`write_artifacts`] changed on disk.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub content_written: usize,
    /// File names removed from the content directory.
    pub removed: Vec<String>,
}

pub fn write_artifacts(out_dir: &Path, set: &ArtifactSet<'_>) -> Result<WriteOutcome> {
    let content_dir = out_dir.join(CONTENT_DIR);
    let views_dir = out_dir.join(VIEWS_DIR);
    std::fs::create_dir_all(&content_dir)
        .with_context(|| format!("failed to create {}", content_dir.display()))?;
    std::fs::create_dir_all(&views_dir)
        .with_context(|| format!("failed to create {}", views_dir.display()))?;

    let existing = list_content_files(&content_dir)?;

    let mut written: HashSet<String> = HashSet::new();
    for doc in set.documents {
        let file_name = format!("{}.txt", doc.record.id);
        let path = content_dir.join(&file_name);
        std::fs::write(&path, &doc.body)
            .with_context(|| format!("failed to write {}", path.display()))?;
        written.insert(file_name);
    }

    let mut removed: Vec<String> = existing
        .into_iter()
        .filter(|name| !written.contains(name))
        .collect();
    removed.sort_by(|a, b| collate::compare(a, b));
    for name in &removed {
        let path = content_dir.join(name);
        std::fs::remove_file(&path)
            .with_context(|| format!("failed to remove {}", path.display()))?;
        tracing::info!(file = %name, "removed stale content file");
    }

    let records = sorted_records(set.documents);

    let index = IndexPayload {
        version: ARTIFACT_VERSION,
        generated_at: set.generated_at.clone(),
        source_dir: set.source_dir.clone(),
        routes: set.taxonomy.route_guide(),
        mood_guide: set.taxonomy.mood_guide(),
        summary: build_summary(&records, set.review.len(), set.taxonomy),
        folders: build_folders(&records),
        docs: records.clone(),
    };
    write_json(&out_dir.join(INDEX_FILE), &index)?;

    for (name, view) in build_views(&records, set.taxonomy, &set.generated_at) {
        write_json(&views_dir.join(format!("{}.json", name)), &view)?;
    }

    let review = ReviewPayload {
        version: ARTIFACT_VERSION,
        generated_at: set.generated_at.clone(),
        unresolved_count: set.review.len(),
        unresolved: set.review.to_vec(),
    };
    write_json(&out_dir.join(REVIEW_FILE), &review)?;

    tracing::info!(
        out = %out_dir.display(),
        documents = written.len(),
        removed = removed.len(),
        "artifacts written"
    );

    Ok(WriteOutcome {
        content_written: written.len(),
        removed,
    })
}

fn list_content_files(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let read = std::fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    for entry in read {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(".txt") {
            names.push(name);
        }
    }
    Ok(names)
}

/// Pretty JSON with a trailing newline.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
