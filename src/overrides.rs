//! Human-authored corrections.
//!
//! `overrides.json` is keyed by the document's relative path:
//!
//! ```json
//! {
//!   "version": 1,
//!   "guide": { "routes": [...], "moods": [...], "birthdayBuckets": [...], "fields": {...} },
//!   "overrides": {
//!     "03 letters/0929.txt": { "routes": ["letters"], "writtenAt": "2023-09-29" }
//!   }
//! }
//! ```
//!
//! Each field of an entry is validated on its own and dropped if invalid, so
//! one typo never discards the rest of an entry. A file that is not JSON, or
//! whose top level (or `overrides` member) is not an object, is fatal.
//!
//! The file is rewritten every run with a refreshed `guide`. Entries are
//! written back exactly as they were read.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::classify::{Taxonomy, ROUTE_UNCLASSIFIED};
use crate::dates::DateParser;
use crate::error::IngestError;
use crate::models::{BirthdayBucket, DateSignal, DateSource, MoodGuide, RouteGuide};

pub const OVERRIDES_VERSION: u32 = 1;

/// Validated fields of one entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Override {
    pub routes: Option<Vec<String>>,
    pub mood_ids: Option<Vec<String>>,
    pub written_at: Option<NaiveDate>,
    pub birthday_bucket: Option<BirthdayBucket>,
    pub title: Option<String>,
}

/// Automatically derived values an [`Override`] may replace.
#[derive(Debug, Clone, PartialEq)]
pub struct Derived {
    pub title: String,
    pub routes: Vec<String>,
    pub mood_ids: Vec<String>,
    pub date: Option<DateSignal>,
    pub birthday_bucket: Option<BirthdayBucket>,
}

impl Override {
    pub fn is_empty(&self) -> bool {
        *self == Override::default()
    }

    pub fn apply(&self, derived: &mut Derived) {
        if let Some(routes) = &self.routes {
            derived.routes = routes.clone();
        }
        if let Some(mood_ids) = &self.mood_ids {
            derived.mood_ids = mood_ids.clone();
        }
        if let Some(date) = self.written_at {
            derived.date = Some(DateSignal {
                date,
                source: DateSource::Override,
            });
        }
        if let Some(bucket) = self.birthday_bucket {
            derived.birthday_bucket = Some(bucket);
        }
        if let Some(title) = &self.title {
            derived.title = title.clone();
        }
    }
}

/// Turn path spellings users are likely to type into the walker's form.
pub fn normalize_key(key: &str) -> String {
    let mut key = key.trim().replace('\\', "/");
    while let Some(rest) = key.strip_prefix("./") {
        key = rest.to_string();
    }
    key.trim_start_matches('/').to_string()
}

#[derive(Debug, Default)]
pub struct OverrideStore {
    /// Entries as read, for the rewrite.
    raw: Map<String, Value>,
    entries: HashMap<String, Override>,
}

impl OverrideStore {
    pub fn load(path: &Path, taxonomy: &Taxonomy, parser: &DateParser) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
        };
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Self::parse(&content, taxonomy, parser).map_err(|reason| {
            IngestError::OverridesMalformed {
                path: path.to_path_buf(),
                reason,
            }
            .into()
        })
    }

    /// Parse file contents. The error is a human-readable reason.
    pub fn parse(content: &str, taxonomy: &Taxonomy, parser: &DateParser) -> Result<Self, String> {
        let value: Value = serde_json::from_str(content).map_err(|e| e.to_string())?;
        let Value::Object(mut top) = value else {
            return Err("top level must be a JSON object".to_string());
        };
        let raw = match top.remove("overrides") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => return Err("\"overrides\" must be a JSON object".to_string()),
        };

        let mut entries = HashMap::new();
        for (key, value) in &raw {
            let Some(fields) = value.as_object() else {
                tracing::debug!(key = %key, "override entry is not an object, ignoring");
                continue;
            };
            let entry = validate_entry(fields, taxonomy, parser);
            if !entry.is_empty() {
                entries.insert(normalize_key(key), entry);
            }
        }

        Ok(Self { raw, entries })
    }

    pub fn get(&self, rel_path: &str) -> Option<&Override> {
        self.entries.get(rel_path)
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Rewrite the file with a fresh guide and the entries as read.
    pub fn save(&self, path: &Path, taxonomy: &Taxonomy) -> Result<()> {
        let file = OverridesFile {
            version: OVERRIDES_VERSION,
            guide: OverridesGuide::new(taxonomy),
            overrides: &self.raw,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut json = serde_json::to_string_pretty(&file)?;
        json.push('\n');
        std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}

fn validate_entry(
    fields: &Map<String, Value>,
    taxonomy: &Taxonomy,
    parser: &DateParser,
) -> Override {
    let routes = id_list(fields.get("routes"), |id| taxonomy.is_route(id)).map(|mut routes| {
        if routes.len() > 1 {
            routes.retain(|r| r != ROUTE_UNCLASSIFIED);
        }
        routes
    });
    Override {
        routes,
        mood_ids: id_list(fields.get("moodIds"), |id| taxonomy.is_mood(id)),
        written_at: fields
            .get("writtenAt")
            .and_then(Value::as_str)
            .and_then(|s| parser.parse_full(s)),
        birthday_bucket: fields
            .get("birthdayBucket")
            .and_then(Value::as_str)
            .and_then(BirthdayBucket::parse),
        title: fields
            .get("title")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    }
}

/// Known ids from a JSON string array, deduplicated in order. `None` when
/// nothing valid is left.
fn id_list(value: Option<&Value>, known: impl Fn(&str) -> bool) -> Option<Vec<String>> {
    let items = value?.as_array()?;
    let mut ids: Vec<String> = Vec::new();
    for id in items.iter().filter_map(Value::as_str).map(str::trim) {
        if known(id) && !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
    }
    if ids.is_empty() {
        None
    } else {
        Some(ids)
    }
}

#[derive(Serialize)]
struct OverridesFile<'a> {
    version: u32,
    guide: OverridesGuide,
    overrides: &'a Map<String, Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverridesGuide {
    pub routes: Vec<RouteGuide>,
    pub moods: Vec<MoodGuide>,
    pub birthday_buckets: Vec<&'static str>,
    pub fields: BTreeMap<&'static str, &'static str>,
}

impl OverridesGuide {
    pub fn new(taxonomy: &Taxonomy) -> Self {
        let fields = BTreeMap::from([
            ("routes", "list of route ids; replaces the detected routes"),
            ("moodIds", "list of mood ids; kept only when routes include mood"),
            ("writtenAt", "date such as 2024-03-05 or 2024年3月5日"),
            ("birthdayBucket", "current or future"),
            ("title", "replaces the derived title"),
        ]);
        Self {
            routes: taxonomy.route_guide(),
            moods: taxonomy.mood_guide(),
            birthday_buckets: BirthdayBucket::ALL.iter().map(|b| b.as_str()).collect(),
            fields,
        }
    }
}
