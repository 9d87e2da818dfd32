//! Project-specific classification and dating rules.
//!
//! Each rule is a small named function so it can be read, tested and tuned
//! on its own. The parameters come from `[classify]` and `[policy.birthday]`
//! in the config file.

use chrono::{Datelike, NaiveDate};

use crate::classify::{ROUTE_BIRTHDAY, ROUTE_DIARY, ROUTE_LETTERS, ROUTE_MEMO, ROUTE_MOOD};
use crate::config::BirthdayPolicy;
use crate::models::{BirthdayBucket, DateSource};

/// Routes that keep a document out of the mood-only folder rule.
pub const PRIORITY_ROUTES: [&str; 4] = [ROUTE_MEMO, ROUTE_LETTERS, ROUTE_BIRTHDAY, ROUTE_DIARY];

/// The enclosing folder's literal name contains the mood marker.
pub fn folder_marker_forces_mood(folder_name: &str, marker: &str) -> bool {
    !marker.is_empty() && folder_name.contains(marker)
}

/// Documents in the designated numbered folders are mood-only unless a
/// priority route already matched. Returns true when the rule fired.
pub fn apply_mood_only_codes(
    routes: &mut Vec<String>,
    folder_code: Option<&str>,
    mood_only_codes: &[String],
) -> bool {
    let Some(code) = folder_code else {
        return false;
    };
    if !mood_only_codes.iter().any(|c| c == code) {
        return false;
    }
    if routes.iter().any(|r| PRIORITY_ROUTES.contains(&r.as_str())) {
        return false;
    }
    *routes = vec![ROUTE_MOOD.to_string()];
    true
}

/// Birthday documents mentioning the future go to the future bucket.
pub fn birthday_bucket_for(haystack: &str, policy: &BirthdayPolicy) -> BirthdayBucket {
    let future = policy
        .future_keywords
        .iter()
        .any(|k| !k.is_empty() && haystack.contains(&k.to_lowercase()));
    if future {
        BirthdayBucket::Future
    } else {
        BirthdayBucket::Current
    }
}

/// Whether the birthday window rule should move this document's date.
pub fn birthday_window_applies(
    routes: &[String],
    bucket: Option<BirthdayBucket>,
    source: Option<DateSource>,
    policy: &BirthdayPolicy,
) -> bool {
    policy.enabled
        && routes.iter().any(|r| r == ROUTE_BIRTHDAY)
        && bucket != Some(BirthdayBucket::Future)
        && source.is_some()
        && source != Some(DateSource::Override)
}

/// Move `date` into the target year and month, clamping the day to the
/// month's length.
pub fn apply_birthday_window(date: NaiveDate, policy: &BirthdayPolicy) -> NaiveDate {
    let last = days_in_month(policy.year, policy.month);
    let day = date.day().min(last);
    NaiveDate::from_ymd_opt(policy.year, policy.month, day).unwrap_or(date)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn marker_in_folder_name() {
        assert!(folder_marker_forces_mood("03 心情", "心情"));
        assert!(!folder_marker_forces_mood("03 日记", "心情"));
        assert!(!folder_marker_forces_mood("anything", ""));
    }

    #[test]
    fn mood_only_codes() {
        let codes = strings(&["05", "06"]);

        let mut routes: Vec<String> = Vec::new();
        assert!(apply_mood_only_codes(&mut routes, Some("05"), &codes));
        assert_eq!(routes, vec!["mood"]);

        let mut routes = strings(&["diary", "mood"]);
        assert!(!apply_mood_only_codes(&mut routes, Some("06"), &codes));
        assert_eq!(routes, vec!["diary", "mood"]);

        let mut routes = Vec::new();
        assert!(!apply_mood_only_codes(&mut routes, Some("07"), &codes));
        assert!(!apply_mood_only_codes(&mut routes, None, &codes));
        assert!(routes.is_empty());
    }

    #[test]
    fn bucket_from_future_keywords() {
        let policy = BirthdayPolicy::default();
        assert_eq!(
            birthday_bucket_for("给未来的你的生日信", &policy),
            BirthdayBucket::Future
        );
        assert_eq!(
            birthday_bucket_for("happy birthday", &policy),
            BirthdayBucket::Current
        );
    }

    #[test]
    fn window_clamps_day() {
        let policy = BirthdayPolicy {
            year: 2024,
            month: 2,
            ..BirthdayPolicy::default()
        };
        assert_eq!(apply_birthday_window(ymd(2019, 7, 31), &policy), ymd(2024, 2, 29));
        assert_eq!(apply_birthday_window(ymd(2019, 7, 3), &policy), ymd(2024, 2, 3));

        let september = BirthdayPolicy::default();
        assert_eq!(apply_birthday_window(ymd(2020, 1, 31), &september), ymd(2024, 9, 30));
    }

    #[test]
    fn window_skips_future_override_and_undated() {
        let policy = BirthdayPolicy::default();
        let routes = strings(&["birthday"]);
        assert!(birthday_window_applies(
            &routes,
            Some(BirthdayBucket::Current),
            Some(DateSource::Filename),
            &policy
        ));
        assert!(!birthday_window_applies(
            &routes,
            Some(BirthdayBucket::Future),
            Some(DateSource::Filename),
            &policy
        ));
        assert!(!birthday_window_applies(
            &routes,
            Some(BirthdayBucket::Current),
            Some(DateSource::Override),
            &policy
        ));
        assert!(!birthday_window_applies(&routes, None, None, &policy));
        assert!(!birthday_window_applies(
            &strings(&["diary"]),
            None,
            Some(DateSource::Filename),
            &policy
        ));
    }
}
