//! Relative time phrases resolved to concrete query windows.
//!
//! A date claim is only grounded when the answer can state the window the
//! tools were queried with. `resolve_timerange` turns phrases such as
//! "yesterday" or "last 3 weeks" into a start/end pair plus the matching
//! Jira, GitHub and Slack query parameters.

use chrono::{DateTime, Datelike, Duration, FixedOffset, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A resolved window with query parameters for each source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub description: String,
    /// JQL fragment for Jira searches
    pub jql_clause: String,
    /// RFC 3339 timestamp for the GitHub `since` parameter
    pub github_since: String,
    /// Unix seconds for the Slack `oldest` parameter
    pub slack_oldest: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phrase {
    Today,
    Yesterday,
    LastNDays,
    CoupleDays,
    ThisWeek,
    LastWeek,
    LastNWeeks,
    ThisMonth,
    LastMonth,
    CurrentSprint,
    LastSprint,
    Recent,
}

/// Approximate sprint length when no sprint data is available.
const SPRINT_DAYS: i64 = 14;

lazy_static! {
    /// Ordered phrase patterns, applied to the lowercased query. The first
    /// pattern that matches and resolves wins.
    static ref TIME_PATTERNS: Vec<(Regex, Phrase)> = vec![
        (Regex::new(r"\b(today)\b").unwrap(), Phrase::Today),
        (Regex::new(r"\b(yesterday)\b").unwrap(), Phrase::Yesterday),
        (Regex::new(r"\b(last|past)\s*(\d+)\s*days?\b").unwrap(), Phrase::LastNDays),
        (Regex::new(r"\b(couple|few)\s*days?\b").unwrap(), Phrase::CoupleDays),
        (Regex::new(r"\b(this\s+week)\b").unwrap(), Phrase::ThisWeek),
        (Regex::new(r"\b(last\s+week)\b").unwrap(), Phrase::LastWeek),
        (Regex::new(r"\b(past|last)\s*(\d+)\s*weeks?\b").unwrap(), Phrase::LastNWeeks),
        (Regex::new(r"\b(this\s+month)\b").unwrap(), Phrase::ThisMonth),
        (Regex::new(r"\b(last\s+month)\b").unwrap(), Phrase::LastMonth),
        (Regex::new(r"\b(current\s+sprint)\b").unwrap(), Phrase::CurrentSprint),
        (Regex::new(r"\b(last\s+sprint)\b").unwrap(), Phrase::LastSprint),
        (Regex::new(r"\b(recent|latest|newest)\b").unwrap(), Phrase::Recent),
    ];
}

/// Resolve the first time phrase in `query` against the current UTC time.
pub fn resolve_timerange(query: &str) -> Option<TimeRange> {
    resolve_timerange_at(query, Utc::now().fixed_offset())
}

/// Resolve the first time phrase in `query` relative to `now`.
///
/// Day, week and month boundaries fall at midnight in `now`'s offset, so a
/// caller wanting a user's local calendar passes `now` in that offset. Weeks
/// start on Monday.
///
/// # Returns
///
/// `None` when the query holds no recognised phrase, or when every matching
/// phrase is out of range (e.g. "last 99999999999 days").
pub fn resolve_timerange_at(query: &str, now: DateTime<FixedOffset>) -> Option<TimeRange> {
    let query = query.to_lowercase();

    for (pattern, phrase) in TIME_PATTERNS.iter() {
        let Some(caps) = pattern.captures(&query) else {
            continue;
        };
        let count = caps.get(2).map(|m| m.as_str());
        match resolve_phrase(*phrase, count, now) {
            Some(range) => return Some(range),
            None => tracing::warn!(
                pattern = pattern.as_str(),
                matched = caps.get(0).map(|m| m.as_str()).unwrap_or_default(),
                "time range could not be resolved"
            ),
        }
    }
    None
}

fn resolve_phrase(phrase: Phrase, count: Option<&str>, now: DateTime<FixedOffset>) -> Option<TimeRange> {
    let today = start_of_day(now)?;
    match phrase {
        Phrase::Today => Some(TimeRange::dated(
            today,
            now,
            format!("today ({})", ymd(today)),
            format!("created >= '{}'", ymd(today)),
        )),
        Phrase::Yesterday => {
            let start = today - Duration::days(1);
            let end = today - Duration::microseconds(1);
            Some(TimeRange::dated(
                start,
                end,
                format!("yesterday ({})", ymd(start)),
                format!("created >= '{}' AND created < '{}'", ymd(start), ymd(today)),
            ))
        }
        Phrase::LastNDays => last_n_days(now, parse_count(count)?),
        Phrase::CoupleDays => last_n_days(now, 2),
        Phrase::Recent => last_n_days(now, 7),
        Phrase::ThisWeek => {
            let monday = today - Duration::days(i64::from(now.weekday().num_days_from_monday()));
            Some(TimeRange::dated(
                monday,
                now,
                format!("this week ({} to {})", ymd(monday), ymd(now)),
                "created >= startOfWeek()".to_string(),
            ))
        }
        Phrase::LastWeek => {
            let this_monday = today - Duration::days(i64::from(now.weekday().num_days_from_monday()));
            let start = this_monday - Duration::days(7);
            let end = this_monday - Duration::seconds(1);
            Some(TimeRange::dated(
                start,
                end,
                format!("last week ({} to {})", ymd(start), ymd(end)),
                "created >= startOfWeek(-1) AND created < startOfWeek()".to_string(),
            ))
        }
        Phrase::LastNWeeks => {
            let n = parse_count(count)?;
            let start = start_of_day(now.checked_sub_signed(Duration::try_weeks(n)?)?)?;
            Some(TimeRange::dated(
                start,
                now,
                format!("last {} weeks ({} to {})", n, ymd(start), ymd(now)),
                format!("created >= '{}'", ymd(start)),
            ))
        }
        Phrase::ThisMonth => {
            let start = start_of_day(now.with_day(1)?)?;
            Some(TimeRange::dated(
                start,
                now,
                format!("this month ({} to {})", ymd(start), ymd(now)),
                "created >= startOfMonth()".to_string(),
            ))
        }
        Phrase::LastMonth => {
            let first_of_this_month = start_of_day(now.with_day(1)?)?;
            let end = first_of_this_month - Duration::seconds(1);
            let start = start_of_day(end.with_day(1)?)?;
            Some(TimeRange::dated(
                start,
                end,
                format!("last month ({} to {})", ymd(start), ymd(end)),
                "created >= startOfMonth(-1) AND created < startOfMonth()".to_string(),
            ))
        }
        Phrase::CurrentSprint => {
            let start = today - Duration::days(SPRINT_DAYS);
            Some(TimeRange::dated(
                start,
                now,
                format!("current sprint (approx. {} to {})", ymd(start), ymd(now)),
                "sprint in openSprints()".to_string(),
            ))
        }
        Phrase::LastSprint => {
            let end = today - Duration::days(SPRINT_DAYS);
            let start = end - Duration::days(SPRINT_DAYS);
            Some(TimeRange::dated(
                start,
                end,
                format!("last sprint (approx. {} to {})", ymd(start), ymd(end)),
                "sprint in closedSprints() ORDER BY created DESC".to_string(),
            ))
        }
    }
}

impl TimeRange {
    fn dated(
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
        description: String,
        jql_clause: String,
    ) -> Self {
        TimeRange {
            start,
            end,
            description,
            jql_clause,
            github_since: start.to_rfc3339(),
            slack_oldest: start.timestamp().to_string(),
        }
    }
}

fn last_n_days(now: DateTime<FixedOffset>, n: i64) -> Option<TimeRange> {
    let start = start_of_day(now.checked_sub_signed(Duration::try_days(n)?)?)?;
    Some(TimeRange::dated(
        start,
        now,
        format!("last {} days ({} to {})", n, ymd(start), ymd(now)),
        format!("created >= '{}'", ymd(start)),
    ))
}

fn parse_count(count: Option<&str>) -> Option<i64> {
    count?.parse().ok()
}

fn start_of_day(at: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
    at.date_naive()
        .and_hms_opt(0, 0, 0)?
        .and_local_timezone(*at.offset())
        .single()
}

fn ymd(at: DateTime<FixedOffset>) -> String {
    at.format("%Y-%m-%d").to_string()
}
