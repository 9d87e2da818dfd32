//! Written-date inference.
//!
//! A document's date is picked from an explicit, ordered list of text
//! candidates (path, file name, titles, leading and trailing content lines)
//! and finally from its enclosing folder. Each textual format is a separate
//! [`DateStrategy`]; [`DateParser`] tries them in a fixed priority order.
//!
//! # Precedence
//!
//! 1. A full year-month-day in any candidate, in candidate order.
//! 2. A month-day in any candidate, combined with the folder's year, or
//!    failing that a bare year found among the candidates.
//! 3. The folder's own resolved date (`folder-name`), or a date joined from a
//!    sibling folder with the same numeric code and month-day
//!    (`folder-name-inferred`), or the nearest dated ancestor folder
//!    (`folder-name`).
//!
//! Years are restricted to 1900–2099. Every date is validated by building a
//! real calendar date, so `2023-02-29` and `2024-13-01` are rejected.

use anyhow::Result;
use chrono::{Datelike, Local, NaiveDate, NaiveTime, TimeZone};
use regex::Regex;
use std::collections::HashMap;

use crate::models::{DateSignal, DateSource};

const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2099;
/// Leap year used to validate month-day pairs without a known year.
const ANY_LEAP_YEAR: i32 = 2000;

/// One way of reading a date-like value out of free text.
pub trait DateStrategy: Send + Sync {
    type Output;

    fn name(&self) -> &'static str;
    fn try_parse(&self, text: &str) -> Option<Self::Output>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonthDay {
    pub month: u32,
    pub day: u32,
}

impl MonthDay {
    pub fn new(month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(ANY_LEAP_YEAR, month, day)?;
        Some(Self { month, day })
    }

    pub fn with_year(&self, year: i32) -> Option<NaiveDate> {
        make_date(year, self.month, self.day)
    }
}

fn make_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

fn is_digit_at(text: &str, idx: usize) -> bool {
    text.as_bytes().get(idx).is_some_and(|b| b.is_ascii_digit())
}

/// True when the match is not glued to neighbouring ASCII digits.
fn digit_bounded(text: &str, start: usize, end: usize) -> bool {
    let before = start > 0 && is_digit_at(text, start - 1);
    !before && !is_digit_at(text, end)
}

/// Maximal runs of ASCII digits.
fn digit_runs(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty())
}

fn num<T: std::str::FromStr>(s: &str) -> Option<T> {
    s.parse().ok()
}

/// A regex whose three captures are year, month and day.
struct PatternDate {
    name: &'static str,
    re: Regex,
}

impl DateStrategy for PatternDate {
    type Output = NaiveDate;

    fn name(&self) -> &'static str {
        self.name
    }

    fn try_parse(&self, text: &str) -> Option<NaiveDate> {
        for caps in self.re.captures_iter(text) {
            let whole = caps.get(0)?;
            if !digit_bounded(text, whole.start(), whole.end()) {
                continue;
            }
            let date = make_date(num(&caps[1])?, num(&caps[2])?, num(&caps[3])?);
            if date.is_some() {
                return date;
            }
        }
        None
    }
}

/// `YYYYMMDD` as a standalone digit run.
struct CompactDate;

impl DateStrategy for CompactDate {
    type Output = NaiveDate;

    fn name(&self) -> &'static str {
        "compact"
    }

    fn try_parse(&self, text: &str) -> Option<NaiveDate> {
        digit_runs(text)
            .filter(|run| run.len() == 8)
            .find_map(|run| make_date(num(&run[..4])?, num(&run[4..6])?, num(&run[6..])?))
    }
}

/// `YYYY?MMDD`: a nine-digit run with one stray digit typed after the year.
struct StrayDigitDate;

impl DateStrategy for StrayDigitDate {
    type Output = NaiveDate;

    fn name(&self) -> &'static str {
        "stray-digit"
    }

    fn try_parse(&self, text: &str) -> Option<NaiveDate> {
        digit_runs(text)
            .filter(|run| run.len() == 9)
            .find_map(|run| make_date(num(&run[..4])?, num(&run[5..7])?, num(&run[7..])?))
    }
}

/// A regex whose two captures are month and day.
struct PatternMonthDay {
    name: &'static str,
    re: Regex,
    /// Reject matches followed by a unit.
    quantity_guard: bool,
    /// Reject matches chained to another `.`/`-`/`/` digit group, as in
    /// version numbers.
    chain_guard: bool,
}

/// Units that turn a number pair into a quantity: `3-5 km`, `10.25 元`.
const QUANTITY_UNITS: [&str; 8] = ["%", "元", "块", "米", "公里", "斤", "度", "岁"];
const ASCII_UNITS: [&str; 9] = ["km", "kg", "cm", "mm", "ml", "lb", "min", "m", "h"];

fn followed_by_quantity(text: &str, end: usize) -> bool {
    let rest = text[end..].trim_start();
    let ascii_unit = ASCII_UNITS.iter().any(|unit| {
        rest.strip_prefix(unit)
            .is_some_and(|after| !after.starts_with(|c: char| c.is_ascii_alphanumeric()))
    });
    ascii_unit || QUANTITY_UNITS.iter().any(|unit| rest.starts_with(unit))
}

fn chained_group(text: &str, start: usize, end: usize) -> bool {
    let bytes = text.as_bytes();
    let sep = |b: u8| matches!(b, b'.' | b'-' | b'/');
    let before = start >= 2 && sep(bytes[start - 1]) && bytes[start - 2].is_ascii_digit();
    let after = bytes.get(end).is_some_and(|b| sep(*b)) && is_digit_at(text, end + 1);
    before || after
}

impl DateStrategy for PatternMonthDay {
    type Output = MonthDay;

    fn name(&self) -> &'static str {
        self.name
    }

    fn try_parse(&self, text: &str) -> Option<MonthDay> {
        for caps in self.re.captures_iter(text) {
            let whole = caps.get(0)?;
            let (start, end) = (whole.start(), whole.end());
            if !digit_bounded(text, start, end)
                || (self.quantity_guard && followed_by_quantity(text, end))
                || (self.chain_guard && chained_group(text, start, end))
            {
                continue;
            }
            if let Some(md) = MonthDay::new(num(&caps[1])?, num(&caps[2])?) {
                return Some(md);
            }
        }
        None
    }
}

/// `MMDD` as a standalone four-digit run.
struct CompactMonthDay;

impl DateStrategy for CompactMonthDay {
    type Output = MonthDay;

    fn name(&self) -> &'static str {
        "compact-month-day"
    }

    fn try_parse(&self, text: &str) -> Option<MonthDay> {
        digit_runs(text)
            .filter(|run| run.len() == 4)
            .find_map(|run| MonthDay::new(num(&run[..2])?, num(&run[2..])?))
    }
}

/// A bare four-digit year in range.
struct BareYear;

impl DateStrategy for BareYear {
    type Output = i32;

    fn name(&self) -> &'static str {
        "bare-year"
    }

    fn try_parse(&self, text: &str) -> Option<i32> {
        digit_runs(text)
            .filter(|run| run.len() == 4)
            .filter_map(num::<i32>)
            .find(|y| (MIN_YEAR..=MAX_YEAR).contains(y))
    }
}

type Strategies<T> = Vec<Box<dyn DateStrategy<Output = T>>>;

/// The ordered strategy lists. Built once per run.
pub struct DateParser {
    full: Strategies<NaiveDate>,
    month_day: Strategies<MonthDay>,
    year: Strategies<i32>,
}

impl DateParser {
    pub fn new() -> Result<Self> {
        let full: Strategies<NaiveDate> = vec![
            Box::new(PatternDate {
                name: "separated",
                re: Regex::new(r"((?:19|20)\d{2})\s*[-./_]\s*(\d{1,2})\s*[-./_]\s*(\d{1,2})")?,
            }),
            Box::new(PatternDate {
                name: "cjk",
                re: Regex::new(r"((?:19|20)\d{2})\s*年\s*(\d{1,2})\s*月\s*(\d{1,2})")?,
            }),
            Box::new(CompactDate),
            Box::new(StrayDigitDate),
        ];
        let month_day: Strategies<MonthDay> = vec![
            Box::new(PatternMonthDay {
                name: "cjk-month-day",
                re: Regex::new(r"(\d{1,2})\s*月\s*(\d{1,2})")?,
                quantity_guard: false,
                chain_guard: false,
            }),
            Box::new(PatternMonthDay {
                name: "separated-month-day",
                re: Regex::new(r"(\d{1,2})[-/](\d{1,2})")?,
                quantity_guard: true,
                chain_guard: false,
            }),
            // A dotted pair needs a two-digit day so decimals like `3.5` stay numbers.
            Box::new(PatternMonthDay {
                name: "dotted-month-day",
                re: Regex::new(r"(\d{1,2})\.(\d{2})")?,
                quantity_guard: true,
                chain_guard: true,
            }),
            Box::new(CompactMonthDay),
        ];
        let year: Strategies<i32> = vec![Box::new(BareYear)];
        Ok(Self {
            full,
            month_day,
            year,
        })
    }

    fn first<T>(strategies: &Strategies<T>, text: &str) -> Option<T> {
        strategies.iter().find_map(|s| {
            let found = s.try_parse(text);
            if found.is_some() {
                tracing::trace!(strategy = s.name(), text, "date strategy matched");
            }
            found
        })
    }

    /// Full year-month-day, also used for override values.
    pub fn parse_full(&self, text: &str) -> Option<NaiveDate> {
        Self::first(&self.full, text)
    }

    pub fn parse_month_day(&self, text: &str) -> Option<MonthDay> {
        Self::first(&self.month_day, text)
    }

    pub fn parse_year(&self, text: &str) -> Option<i32> {
        Self::first(&self.year, text)
    }
}

/// One piece of text a date may be read from, tagged with its provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate<'a> {
    pub source: DateSource,
    pub text: &'a str,
}

/// Inputs for [`build_candidates`].
pub struct CandidateInputs<'a> {
    /// Output of [`scoped_path`].
    pub scoped_path: &'a str,
    pub file_stem: &'a str,
    pub fallback_title: &'a str,
    pub title: &'a str,
    pub lines: &'a [String],
}

pub const HEAD_LINES: usize = 3;
pub const TAIL_LINES: usize = 2;

/// Candidate list in strict priority order: path, file name, fallback title,
/// derived title, first three lines, last two lines.
///
/// The path candidate omits the enclosing folder's own segment; that folder
/// is consulted last through the [`FolderCatalog`] instead.
pub fn build_candidates<'a>(inputs: &CandidateInputs<'a>) -> Vec<Candidate<'a>> {
    let mut out = vec![
        Candidate {
            source: DateSource::Filename,
            text: inputs.scoped_path,
        },
        Candidate {
            source: DateSource::Filename,
            text: inputs.file_stem,
        },
        Candidate {
            source: DateSource::Title,
            text: inputs.fallback_title,
        },
        Candidate {
            source: DateSource::Title,
            text: inputs.title,
        },
    ];
    for line in inputs.lines.iter().take(HEAD_LINES) {
        out.push(Candidate {
            source: DateSource::ContentLine,
            text: line,
        });
    }
    let tail_start = inputs.lines.len().saturating_sub(TAIL_LINES);
    for line in &inputs.lines[tail_start..] {
        out.push(Candidate {
            source: DateSource::ContentLine,
            text: line,
        });
    }
    out
}

/// The relative path with every folder that carries its own date removed.
///
/// The enclosing folder is always dropped, as are ancestors whose names hold
/// a full date or month-day; those are folder signals and are consulted
/// through the [`FolderCatalog`] instead. `2023-01-01 trip/day1/note.txt`
/// becomes `note.txt`, while `2024/09/day/29.txt` keeps `2024/09/29.txt`.
pub fn scoped_path(parser: &DateParser, rel_path: &str) -> String {
    let mut parts: Vec<&str> = rel_path.split('/').collect();
    let file = parts.pop().unwrap_or_default();
    parts.pop();
    parts.retain(|segment| !read_folder_name(parser, segment).1.is_dated());
    parts.push(file);
    parts.join("/")
}

/// Date-related facts about one folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderInfo {
    /// Folder path relative to the source root.
    pub rel_path: String,
    /// Last path segment.
    pub name: String,
    /// Leading numeric code (1–3 digits), e.g. `05` in `05 0929 家书`.
    pub code: Option<String>,
    pub month_day: Option<MonthDay>,
    /// Own year, or the nearest ancestor's.
    pub year: Option<i32>,
    pub resolved: Option<DateSignal>,
}

impl FolderInfo {
    /// Year usable to complete a document's month-day.
    pub fn year_hint(&self) -> Option<i32> {
        self.resolved.map(|s| s.date.year()).or(self.year)
    }
}

/// Split a folder name into its numeric code and the remainder.
///
/// Leading digits are a code only when a space or `_` separates them from
/// the rest, and the rest does not continue them as a date: `05 0929 家书`
/// has code `05`, `9月29日 旅行` and `12.25 2022` have none.
pub fn split_folder_code(name: &str) -> (Option<String>, &str) {
    let digits = name.bytes().take_while(|b| b.is_ascii_digit()).count();
    if !(1..=3).contains(&digits) {
        return (None, name);
    }
    let after = &name[digits..];
    let is_gap = |c: char| c.is_whitespace() || c == '_';
    if !after.is_empty() && !after.starts_with(is_gap) {
        return (None, name);
    }
    let rest = after.trim_start_matches(is_gap);
    if rest.starts_with(['年', '月', '日', '号']) {
        return (None, name);
    }
    (Some(name[..digits].to_string()), rest)
}

/// What one folder name says about dates, code excluded.
#[derive(Debug, Clone, Copy, Default)]
struct NameDates {
    full: Option<NaiveDate>,
    month_day: Option<MonthDay>,
    year: Option<i32>,
}

impl NameDates {
    fn is_dated(&self) -> bool {
        self.full.is_some() || self.month_day.is_some()
    }

    fn resolve(&self, year: Option<i32>) -> Option<NaiveDate> {
        self.full
            .or_else(|| self.month_day.and_then(|md| md.with_year(year?)))
    }
}

fn read_folder_name(parser: &DateParser, name: &str) -> (Option<String>, NameDates) {
    let (code, rest) = split_folder_code(name);
    let full = parser.parse_full(rest);
    let month_day = full
        .map(|d| MonthDay {
            month: d.month(),
            day: d.day(),
        })
        .or_else(|| parser.parse_month_day(rest));
    let year = full.map(|d| d.year()).or_else(|| parser.parse_year(rest));
    (
        code,
        NameDates {
            full,
            month_day,
            year,
        },
    )
}

fn folder_signal(date: NaiveDate) -> DateSignal {
    DateSignal {
        date,
        source: DateSource::FolderName,
    }
}

/// Resolved dates for every folder that contains a document.
#[derive(Debug, Default)]
pub struct FolderCatalog {
    folders: HashMap<String, FolderInfo>,
}

impl FolderCatalog {
    pub fn build<'a>(parser: &DateParser, folder_rels: impl IntoIterator<Item = &'a str>) -> Self {
        let mut folders: HashMap<String, FolderInfo> = HashMap::new();
        // Nearest dated ancestor, used once the folder's own name and its
        // siblings have nothing to offer.
        let mut ancestor_dates: HashMap<String, NaiveDate> = HashMap::new();
        for rel in folder_rels {
            if folders.contains_key(rel) {
                continue;
            }
            let name = rel.rsplit('/').next().unwrap_or(rel).to_string();
            let (code, own) = read_folder_name(parser, &name);
            let ancestors: Vec<NameDates> = rel
                .rsplit('/')
                .skip(1)
                .map(|segment| read_folder_name(parser, segment).1)
                .collect();
            let year = own.year.or_else(|| ancestors.iter().find_map(|a| a.year));
            if let Some(date) = ancestors.iter().find_map(|a| a.resolve(a.year)) {
                ancestor_dates.insert(rel.to_string(), date);
            }
            folders.insert(
                rel.to_string(),
                FolderInfo {
                    rel_path: rel.to_string(),
                    name,
                    code,
                    month_day: own.month_day,
                    year,
                    resolved: own.resolve(year).map(folder_signal),
                },
            );
        }

        // code + month + day -> year, from folders that carry a full date.
        // Sorted so the smallest path wins when siblings disagree.
        let mut keys: Vec<&String> = folders.keys().collect();
        keys.sort_by(|a, b| crate::collate::compare(a, b));
        let mut years: HashMap<(String, MonthDay), i32> = HashMap::new();
        for key in keys {
            let info = &folders[key];
            if let (Some(code), Some(md), Some(signal)) =
                (&info.code, info.month_day, info.resolved)
            {
                years
                    .entry((code.clone(), md))
                    .or_insert(signal.date.year());
            }
        }

        for info in folders.values_mut() {
            if info.resolved.is_some() {
                continue;
            }
            if let (Some(code), Some(md)) = (&info.code, info.month_day) {
                if let Some(year) = years.get(&(code.clone(), md)) {
                    info.resolved = md.with_year(*year).map(|date| DateSignal {
                        date,
                        source: DateSource::FolderNameInferred,
                    });
                }
            }
            if info.resolved.is_none() {
                info.resolved = ancestor_dates.get(&info.rel_path).copied().map(folder_signal);
            }
        }

        Self { folders }
    }

    pub fn get(&self, rel_path: &str) -> Option<&FolderInfo> {
        self.folders.get(rel_path)
    }
}

/// Pick at most one date for a document.
pub fn infer_date(
    parser: &DateParser,
    candidates: &[Candidate<'_>],
    folder: Option<&FolderInfo>,
) -> Option<DateSignal> {
    for candidate in candidates {
        if let Some(date) = parser.parse_full(candidate.text) {
            return Some(DateSignal {
                date,
                source: candidate.source,
            });
        }
    }

    let month_day = candidates
        .iter()
        .find_map(|c| parser.parse_month_day(c.text).map(|md| (md, c.source)));
    if let Some((md, source)) = month_day {
        let year = folder
            .and_then(FolderInfo::year_hint)
            .or_else(|| candidates.iter().find_map(|c| parser.parse_year(c.text)));
        if let Some(date) = year.and_then(|y| md.with_year(y)) {
            return Some(DateSignal { date, source });
        }
    }

    folder.and_then(|f| f.resolved)
}

/// Midnight local time as RFC 3339.
pub fn local_midnight(date: NaiveDate) -> String {
    let naive = date.and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&naive).earliest() {
        Some(dt) => dt.to_rfc3339(),
        None => naive.format("%Y-%m-%dT%H:%M:%S").to_string(),
    }
}
