//! Route and mood classification.
//!
//! Categories are declarative `{id, label, keywords}` records evaluated by a
//! single "any keyword is a case-insensitive substring" predicate. Matching
//! is multi-label: a document can land in several routes at once, and routes
//! keep the order they are declared in the [`Taxonomy`].
//!
//! Two folder-level signals can force membership independently of keywords;
//! both live in [`crate::policy`].

use crate::config::ClassifyConfig;
use crate::models::{ClassificationResult, MoodGuide, RouteGuide};
use crate::policy;

pub const ROUTE_DIARY: &str = "diary";
pub const ROUTE_LETTERS: &str = "letters";
pub const ROUTE_MEMO: &str = "memo";
pub const ROUTE_BIRTHDAY: &str = "birthday";
pub const ROUTE_MOOD: &str = "mood";
/// Sentinel route for documents no category claimed.
pub const ROUTE_UNCLASSIFIED: &str = "unclassified";

pub const DEFAULT_MOOD: &str = "mixed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: String,
    pub label: String,
    /// Lowercased.
    pub keywords: Vec<String>,
}

impl Category {
    pub fn new(id: &str, label: &str, keywords: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// `haystack` must already be lowercased.
    pub fn matches(&self, haystack: &str) -> bool {
        self.keywords
            .iter()
            .any(|k| !k.is_empty() && haystack.contains(k.as_str()))
    }
}

/// The fixed category tables, built once per run.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    pub routes: Vec<Category>,
    pub moods: Vec<Category>,
    pub unclassified_label: String,
    pub default_mood: String,
}

impl Taxonomy {
    pub fn builtin() -> Self {
        Self {
            routes: vec![
                Category::new(ROUTE_DIARY, "日记", &["日记", "日志", "diary", "journal"]),
                Category::new(
                    ROUTE_LETTERS,
                    "书信",
                    &["书信", "来信", "回信", "家书", "亲爱的", "letter", "dear "],
                ),
                Category::new(
                    ROUTE_MEMO,
                    "备忘",
                    &["备忘", "笔记", "清单", "待办", "memo", "note", "todo", "to-do"],
                ),
                Category::new(ROUTE_BIRTHDAY, "生日", &["生日", "寿辰", "birthday", "bday"]),
                Category::new(ROUTE_MOOD, "心情", &["心情", "情绪", "感受", "mood", "feeling"]),
            ],
            moods: vec![
                Category::new(
                    "happy",
                    "开心",
                    &["开心", "高兴", "快乐", "幸福", "happy", "joy", "glad"],
                ),
                Category::new("sad", "难过", &["难过", "伤心", "哭", "失落", "sad", "cry", "tears"]),
                Category::new(
                    "anxious",
                    "焦虑",
                    &["焦虑", "担心", "紧张", "不安", "anxious", "worried", "nervous"],
                ),
                Category::new("angry", "生气", &["生气", "愤怒", "烦躁", "angry", "furious", "annoyed"]),
                Category::new(
                    "calm",
                    "平静",
                    &["平静", "安静", "放松", "calm", "peaceful", "relaxed"],
                ),
                Category::new("longing", "想念", &["想念", "思念", "想你", "miss you", "longing"]),
                Category::new(DEFAULT_MOOD, "复杂", &["复杂", "mixed feelings"]),
            ],
            unclassified_label: "未分类".to_string(),
            default_mood: DEFAULT_MOOD.to_string(),
        }
    }

    /// Declared routes plus the unclassified sentinel.
    pub fn route_guide(&self) -> Vec<RouteGuide> {
        let mut out: Vec<RouteGuide> = self
            .routes
            .iter()
            .map(|c| RouteGuide {
                id: c.id.clone(),
                label: c.label.clone(),
            })
            .collect();
        out.push(RouteGuide {
            id: ROUTE_UNCLASSIFIED.to_string(),
            label: self.unclassified_label.clone(),
        });
        out
    }

    pub fn mood_guide(&self) -> Vec<MoodGuide> {
        self.moods
            .iter()
            .map(|c| MoodGuide {
                id: c.id.clone(),
                label: c.label.clone(),
                keywords: c.keywords.clone(),
            })
            .collect()
    }

    pub fn is_route(&self, id: &str) -> bool {
        id == ROUTE_UNCLASSIFIED || self.routes.iter().any(|c| c.id == id)
    }

    pub fn is_mood(&self, id: &str) -> bool {
        self.moods.iter().any(|c| c.id == id)
    }

    pub fn route_label(&self, id: &str) -> String {
        if id == ROUTE_UNCLASSIFIED {
            return self.unclassified_label.clone();
        }
        self.routes
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.label.clone())
            .unwrap_or_else(|| id.to_string())
    }

    pub fn mood_label(&self, id: &str) -> String {
        self.moods
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.label.clone())
            .unwrap_or_else(|| id.to_string())
    }
}

/// Lowercased text the classifiers search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Haystacks {
    pub route: String,
    /// Same sources as `route` over a wider line window.
    pub mood: String,
}

pub fn build_haystacks(
    folder_name: &str,
    file_stem: &str,
    title: &str,
    lines: &[String],
    config: &ClassifyConfig,
) -> Haystacks {
    let build = |window: usize| {
        let mut parts = vec![folder_name, file_stem, title];
        parts.extend(lines.iter().take(window).map(String::as_str));
        parts.join("\n").to_lowercase()
    };
    Haystacks {
        route: build(config.route_lines),
        mood: build(config.mood_lines),
    }
}

/// Folder facts the classifier's policies look at.
#[derive(Debug, Clone, Copy, Default)]
pub struct FolderSignals<'a> {
    pub name: &'a str,
    pub code: Option<&'a str>,
}

pub fn classify(
    taxonomy: &Taxonomy,
    config: &ClassifyConfig,
    haystacks: &Haystacks,
    folder: FolderSignals<'_>,
) -> ClassificationResult {
    let mut routes: Vec<String> = taxonomy
        .routes
        .iter()
        .filter(|c| c.matches(&haystacks.route))
        .map(|c| c.id.clone())
        .collect();

    if policy::folder_marker_forces_mood(folder.name, &config.mood_folder_marker)
        && !routes.iter().any(|r| r == ROUTE_MOOD)
    {
        routes.push(ROUTE_MOOD.to_string());
    }
    policy::apply_mood_only_codes(&mut routes, folder.code, &config.mood_only_codes);

    if routes.is_empty() {
        routes.push(ROUTE_UNCLASSIFIED.to_string());
    }

    let mood_ids = if routes.iter().any(|r| r == ROUTE_MOOD) {
        classify_moods(taxonomy, &haystacks.mood)
    } else {
        Vec::new()
    };

    ClassificationResult { routes, mood_ids }
}

/// Matching mood ids, or the default mood when none match.
pub fn classify_moods(taxonomy: &Taxonomy, haystack: &str) -> Vec<String> {
    let mut ids: Vec<String> = taxonomy
        .moods
        .iter()
        .filter(|c| c.matches(haystack))
        .map(|c| c.id.clone())
        .collect();
    if ids.is_empty() {
        ids.push(taxonomy.default_mood.clone());
    }
    ids
}
