//! Ingestion pipeline orchestration.
//!
//! Runs the whole batch sequentially: walk → extract → date → classify →
//! overrides → ids → artifacts. Documents are processed one at a time in
//! walker order; the only await point is the converter call inside
//! extraction, so output order never depends on timing.
//!
//! Fatal problems (missing source root, malformed overrides) surface before
//! anything is written. Per-document problems are carried on the record and
//! end up in the review manifest.

use anyhow::Result;
use chrono::SecondsFormat;

use crate::classify::{
    self, FolderSignals, Taxonomy, ROUTE_BIRTHDAY, ROUTE_MOOD, ROUTE_UNCLASSIFIED,
};
use crate::config::{Settings, OVERRIDES_FILE};
use crate::connector_fs::{self, WalkEntry};
use crate::dates::{self, CandidateInputs, DateParser, FolderCatalog};
use crate::export::{self, ArtifactSet, PublishedDocument, WriteOutcome};
use crate::extract::{self, TextExtractor};
use crate::ids::IdAssigner;
use crate::models::{DocumentRecord, IndexSummary, ParsedDocument, ReviewItem};
use crate::overrides::{Derived, OverrideStore};
use crate::policy;
use crate::progress::{ProgressEvent, ProgressReporter};

pub const ISSUE_EXTRACTION: &str = "extraction failed";
pub const ISSUE_EMPTY_BODY: &str = "empty body";
pub const ISSUE_MISSING_DATE: &str = "missing date";
pub const ISSUE_UNCLASSIFIED: &str = "unclassified";

/// Result of one pipeline run.
#[derive(Debug)]
pub struct IngestReport {
    /// In walker order.
    pub documents: Vec<PublishedDocument>,
    pub review: Vec<ReviewItem>,
    pub summary: IndexSummary,
    /// `None` on a dry run.
    pub written: Option<WriteOutcome>,
}

impl IngestReport {
    pub fn record(&self, rel_path: &str) -> Option<&DocumentRecord> {
        self.documents
            .iter()
            .map(|d| &d.record)
            .find(|r| r.source_rel_path == rel_path)
    }

    /// One human-readable line: totals, dating, review and routes.
    pub fn summary_line(&self) -> String {
        let s = &self.summary;
        let routes: Vec<String> = s
            .route_counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(route, count)| format!("{} {}", route, count))
            .collect();
        let mut line = format!(
            "ingested {} documents: {} dated, {} undated, {} for review",
            s.total, s.dated_count, s.undated_count, s.review_count
        );
        if !routes.is_empty() {
            line.push_str(" | ");
            line.push_str(&routes.join(", "));
        }
        if self.written.is_none() {
            line.push_str(" (dry run)");
        }
        line
    }
}

pub async fn run_ingest(
    settings: &Settings,
    extractor: &TextExtractor,
    progress: &dyn ProgressReporter,
    dry_run: bool,
) -> Result<IngestReport> {
    progress.report(ProgressEvent::Discovering {
        root: settings.source_root.display().to_string(),
    });
    let entries = connector_fs::scan_sources(settings)?;

    let taxonomy = Taxonomy::builtin();
    let parser = DateParser::new()?;
    let overrides = OverrideStore::load(&settings.overrides_path, &taxonomy, &parser)?;

    let total = entries.len() as u64;
    let mut parsed: Vec<ParsedDocument> = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        parsed.push(read_and_extract(entry, extractor).await);
        progress.report(ProgressEvent::Processing {
            n: i as u64 + 1,
            total,
        });
    }

    let catalog = FolderCatalog::build(
        &parser,
        parsed
            .iter()
            .map(|p| p.source.folder())
            .filter(|f| !f.is_empty()),
    );

    let mut assigner = IdAssigner::new();
    let mut documents = Vec::with_capacity(parsed.len());
    let mut review = Vec::new();
    for doc in parsed {
        let published = build_document(
            doc,
            settings,
            &taxonomy,
            &parser,
            &catalog,
            &overrides,
            &mut assigner,
        );
        if let Some(item) = review_item(&published) {
            review.push(item);
        }
        documents.push(published);
    }

    let summary = export::build_summary(
        &export::sorted_records(&documents),
        review.len(),
        &taxonomy,
    );

    let written = if dry_run {
        None
    } else {
        progress.report(ProgressEvent::Writing {
            out: settings.out_dir.display().to_string(),
        });
        let outcome = export::write_artifacts(
            &settings.out_dir,
            &ArtifactSet {
                generated_at: chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                source_dir: settings.source_root.display().to_string(),
                taxonomy: &taxonomy,
                documents: &documents,
                review: &review,
            },
        )?;
        overrides.save(&settings.overrides_path, &taxonomy)?;
        Some(outcome)
    };

    Ok(IngestReport {
        documents,
        review,
        summary,
        written,
    })
}

async fn read_and_extract(entry: &WalkEntry, extractor: &TextExtractor) -> ParsedDocument {
    match connector_fs::load_document(entry) {
        Ok(source) => extractor.extract(source).await,
        Err(e) => {
            tracing::warn!(path = %entry.rel_path, error = %e, "cannot read file");
            ParsedDocument {
                source: connector_fs::empty_document(entry),
                text: String::new(),
                lines: Vec::new(),
                error: Some(format!("read failed: {}", e)),
            }
        }
    }
}

fn build_document(
    doc: ParsedDocument,
    settings: &Settings,
    taxonomy: &Taxonomy,
    parser: &DateParser,
    catalog: &FolderCatalog,
    overrides: &OverrideStore,
    assigner: &mut IdAssigner,
) -> PublishedDocument {
    let source = &doc.source;
    let rel_path = source.rel_path.as_str();
    let stem = source.stem();
    let folder_rel = source.folder();
    let folder = catalog.get(folder_rel);
    let folder_name = folder_rel.rsplit('/').next().unwrap_or(folder_rel);

    let fallback = extract::fallback_title(stem);
    let title = extract::derive_title(&doc.lines, &fallback);

    let scoped = dates::scoped_path(parser, rel_path);
    let candidates = dates::build_candidates(&CandidateInputs {
        scoped_path: &scoped,
        file_stem: stem,
        fallback_title: &fallback,
        title: &title,
        lines: &doc.lines,
    });
    let date = dates::infer_date(parser, &candidates, folder);

    let haystacks =
        classify::build_haystacks(folder_name, stem, &title, &doc.lines, &settings.classify);
    let auto = classify::classify(
        taxonomy,
        &settings.classify,
        &haystacks,
        FolderSignals {
            name: folder_name,
            code: folder.and_then(|f| f.code.as_deref()),
        },
    );

    let mut derived = Derived {
        title,
        routes: auto.routes,
        mood_ids: auto.mood_ids,
        date,
        birthday_bucket: None,
    };
    if let Some(entry) = overrides.get(rel_path) {
        tracing::debug!(path = %rel_path, "applying override");
        entry.apply(&mut derived);
    }
    settle(&mut derived, taxonomy, &haystacks.mood, settings);

    if let Some(signal) = derived.date.as_mut() {
        if policy::birthday_window_applies(
            &derived.routes,
            derived.birthday_bucket,
            Some(signal.source),
            &settings.birthday,
        ) {
            signal.date = policy::apply_birthday_window(signal.date, &settings.birthday);
        }
    }

    let id = assigner.assign(rel_path, stem);
    tracing::debug!(
        path = %rel_path,
        id = %id,
        routes = ?derived.routes,
        date = ?derived.date.map(|d| d.date),
        "classified"
    );

    let record = DocumentRecord {
        content_path: export::content_path(&id),
        content_length: doc.text.chars().count(),
        id,
        title: derived.title,
        source_path: source.path.display().to_string(),
        source_rel_path: rel_path.to_string(),
        source_folder: folder_rel.to_string(),
        source_folder_code: folder.and_then(|f| f.code.clone()),
        source_folder_date: folder
            .and_then(|f| f.resolved)
            .map(|s| s.date.format("%Y-%m-%d").to_string()),
        mood_labels: derived
            .mood_ids
            .iter()
            .map(|m| taxonomy.mood_label(m))
            .collect(),
        routes: derived.routes,
        mood_ids: derived.mood_ids,
        birthday_bucket: derived.birthday_bucket,
        written_at: derived.date.map(|s| dates::local_midnight(s.date)),
        written_at_source: derived.date.map(|s| s.source),
        written_date: derived.date.map(|s| s.date),
        extraction_error: doc.error.clone(),
    };

    PublishedDocument {
        record,
        body: doc.text,
    }
}

/// Restore record invariants after overrides: routes never empty, moods
/// only with the mood route, a bucket only with the birthday route.
fn settle(derived: &mut Derived, taxonomy: &Taxonomy, mood_haystack: &str, settings: &Settings) {
    if derived.routes.is_empty() {
        derived.routes.push(ROUTE_UNCLASSIFIED.to_string());
    }
    let has_mood = derived.routes.iter().any(|r| r == ROUTE_MOOD);
    let has_birthday = derived.routes.iter().any(|r| r == ROUTE_BIRTHDAY);

    if has_mood {
        if derived.mood_ids.is_empty() {
            derived.mood_ids = classify::classify_moods(taxonomy, mood_haystack);
        }
    } else {
        derived.mood_ids.clear();
    }

    if has_birthday {
        if derived.birthday_bucket.is_none() {
            derived.birthday_bucket =
                Some(policy::birthday_bucket_for(mood_haystack, &settings.birthday));
        }
    } else {
        derived.birthday_bucket = None;
    }
}

fn review_item(doc: &PublishedDocument) -> Option<ReviewItem> {
    let record = &doc.record;
    let mut issues = Vec::new();
    let mut fields = Vec::new();

    if let Some(error) = &record.extraction_error {
        issues.push(format!("{}: {}", ISSUE_EXTRACTION, error));
        fields.push("title");
    } else if doc.body.is_empty() {
        issues.push(ISSUE_EMPTY_BODY.to_string());
        fields.push("title");
    }
    if record.written_at.is_none() {
        issues.push(ISSUE_MISSING_DATE.to_string());
        fields.push("writtenAt");
    }
    if record.routes.iter().any(|r| r == ROUTE_UNCLASSIFIED) {
        issues.push(ISSUE_UNCLASSIFIED.to_string());
        fields.push("routes");
    }

    if issues.is_empty() {
        return None;
    }
    Some(ReviewItem {
        source_rel_path: record.source_rel_path.clone(),
        title: record.title.clone(),
        issues,
        suggestion: format!(
            "add \"{}\" to {} with {}",
            record.source_rel_path,
            OVERRIDES_FILE,
            fields.join(", ")
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DateSource;
    use chrono::NaiveDate;

    fn record(rel: &str) -> DocumentRecord {
        DocumentRecord {
            id: "x".to_string(),
            title: "x".to_string(),
            source_path: rel.to_string(),
            source_rel_path: rel.to_string(),
            source_folder: String::new(),
            source_folder_code: None,
            source_folder_date: None,
            routes: vec!["diary".to_string()],
            mood_ids: Vec::new(),
            mood_labels: Vec::new(),
            birthday_bucket: None,
            written_at: Some("2024-01-01T00:00:00+00:00".to_string()),
            written_at_source: Some(DateSource::Filename),
            content_path: "content/x.txt".to_string(),
            content_length: 4,
            written_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            extraction_error: None,
        }
    }

    #[test]
    fn clean_record_needs_no_review() {
        let doc = PublishedDocument {
            record: record("a.txt"),
            body: "body".to_string(),
        };
        assert!(review_item(&doc).is_none());
    }

    #[test]
    fn review_lists_every_issue() {
        let mut r = record("a.doc");
        r.extraction_error = Some("no converter".to_string());
        r.written_at = None;
        r.routes = vec![ROUTE_UNCLASSIFIED.to_string()];
        let item = review_item(&PublishedDocument {
            record: r,
            body: String::new(),
        })
        .unwrap();
        assert_eq!(
            item.issues,
            vec![
                "extraction failed: no converter",
                ISSUE_MISSING_DATE,
                ISSUE_UNCLASSIFIED
            ]
        );
        assert!(item.suggestion.contains("overrides.json"));
        assert!(item.suggestion.contains("writtenAt"));
    }

    #[test]
    fn settle_restores_invariants() {
        let settings = Settings::with_dirs("/src", "/out");
        let taxonomy = Taxonomy::builtin();
        let mut derived = Derived {
            title: "t".to_string(),
            routes: vec!["letters".to_string()],
            mood_ids: vec!["happy".to_string()],
            date: None,
            birthday_bucket: Some(crate::models::BirthdayBucket::Future),
        };
        settle(&mut derived, &taxonomy, "", &settings);
        assert!(derived.mood_ids.is_empty());
        assert!(derived.birthday_bucket.is_none());

        derived.routes = vec![ROUTE_MOOD.to_string(), ROUTE_BIRTHDAY.to_string()];
        settle(&mut derived, &taxonomy, "明年的生日", &settings);
        assert_eq!(derived.mood_ids, vec![classify::DEFAULT_MOOD]);
        assert_eq!(
            derived.birthday_bucket,
            Some(crate::models::BirthdayBucket::Future)
        );

        derived.routes.clear();
        settle(&mut derived, &taxonomy, "", &settings);
        assert_eq!(derived.routes, vec![ROUTE_UNCLASSIFIED]);
    }
}
