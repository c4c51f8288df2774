//! Dashboard statistics.
//!
//! The storage layer runs the grouped queries. This module folds raw group
//! counts into the shapes the dashboard shows: hour buckets, a Monday-first
//! week, month labels, percentages and the sector ranking.

use chrono::NaiveDate;
use serde::Serialize;

use crate::report::{Sector, Severity};

/// Number of sectors shown in the ranking.
pub const TOP_SECTORS: usize = 10;

/// Days covered by the trend series.
pub const TREND_DAYS: i64 = 365;

/// Hour-of-day buckets as `(start, end, label)`, end exclusive.
pub const HOUR_BUCKETS: [(u32, u32, &str); 7] = [
    (0, 6, "0-6h"),
    (6, 9, "6-9h"),
    (9, 12, "9-12h"),
    (12, 15, "12-15h"),
    (15, 18, "15-18h"),
    (18, 21, "18-21h"),
    (21, 24, "21-24h"),
];

/// Weekday labels, Monday first.
pub const WEEKDAY_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Short label for a month number (1-12).
pub fn month_label(month: u32) -> Option<&'static str> {
    MONTH_LABELS.get(month.checked_sub(1)? as usize).copied()
}

/// Index into [`HOUR_BUCKETS`] for an hour of the day.
///
/// Hours past 23 fall into the last bucket.
pub fn hour_bucket(hour: u32) -> usize {
    HOUR_BUCKETS
        .iter()
        .position(|(start, end, _)| (*start..*end).contains(&hour))
        .unwrap_or(HOUR_BUCKETS.len() - 1)
}

/// Round `part / whole * 100` half-to-even. `0` when `whole` is zero.
pub fn percentage(part: i64, whole: i64) -> i64 {
    if whole <= 0 {
        return 0;
    }
    ((part * 100) as f64 / whole as f64).round_ties_even() as i64
}

/// A labeled count in a chart series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabeledCount {
    pub label: String,
    pub count: i64,
}

impl LabeledCount {
    fn new(label: impl Into<String>, count: i64) -> Self {
        Self {
            label: label.into(),
            count,
        }
    }
}

/// Fold per-hour counts into [`HOUR_BUCKETS`]. Every bucket is present.
pub fn hour_histogram(per_hour: &[(u32, i64)]) -> Vec<LabeledCount> {
    let mut totals = [0i64; HOUR_BUCKETS.len()];
    for (hour, count) in per_hour {
        totals[hour_bucket(*hour)] += count;
    }

    HOUR_BUCKETS
        .iter()
        .zip(totals)
        .map(|((_, _, label), count)| LabeledCount::new(*label, count))
        .collect()
}

/// Fold per-weekday counts into a Monday-first week.
///
/// Weekdays are numbered the way SQLite's `strftime('%w')` does:
/// 0 is Sunday, 6 is Saturday.
pub fn weekday_histogram(per_weekday: &[(u32, i64)]) -> Vec<LabeledCount> {
    let mut sunday_first = [0i64; 7];
    for (day, count) in per_weekday {
        if let Some(slot) = sunday_first.get_mut(*day as usize) {
            *slot += count;
        }
    }
    sunday_first.rotate_left(1);

    WEEKDAY_LABELS
        .iter()
        .zip(sunday_first)
        .map(|(label, count)| LabeledCount::new(*label, count))
        .collect()
}

/// Reports counted in one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthCount {
    /// `YYYY-MM`.
    pub month: String,
    /// Short month name.
    pub label: String,
    pub count: i64,
}

impl MonthCount {
    /// Build from a `YYYY-MM` key. Returns `None` for malformed keys.
    pub fn from_key(key: &str, count: i64) -> Option<Self> {
        let (_, month) = key.split_once('-')?;
        let label = month_label(month.parse().ok()?)?;
        Some(Self {
            month: key.to_string(),
            label: label.to_string(),
            count,
        })
    }
}

/// First day of the trend window.
pub fn trend_start(today: NaiveDate) -> NaiveDate {
    today - chrono::Duration::days(TREND_DAYS)
}

/// Approved reports per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityDistribution {
    pub mild: i64,
    pub moderate: i64,
    pub severe: i64,
}

impl SeverityDistribution {
    pub fn from_counts(counts: &[(Severity, i64)]) -> Self {
        let mut dist = Self::default();
        for (severity, count) in counts {
            match severity {
                Severity::Mild => dist.mild += count,
                Severity::Moderate => dist.moderate += count,
                Severity::Severe => dist.severe += count,
            }
        }
        dist
    }
}

/// One row of the sector ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectorCount {
    pub sector: Sector,
    pub label: String,
    pub count: i64,
}

/// Sectors with the most approved reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectorRanking {
    pub entries: Vec<SectorCount>,
    /// Highest count, used to scale bars. 1 when there are no entries.
    pub max_count: i64,
}

impl SectorRanking {
    /// Build from counts already sorted by rank.
    pub fn new(ranked: Vec<(Sector, i64)>) -> Self {
        let entries: Vec<SectorCount> = ranked
            .into_iter()
            .take(TOP_SECTORS)
            .map(|(sector, count)| SectorCount {
                sector,
                label: sector.label().to_string(),
                count,
            })
            .collect();
        let max_count = entries.first().map(|e| e.count).unwrap_or(1);

        Self { entries, max_count }
    }
}

/// Headline numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HeroCounts {
    pub total: i64,
    pub approved: i64,
    pub pending: i64,
    pub severe: i64,
    pub sectors_affected: i64,
    pub this_month: i64,
}

/// Approval rate and photo coverage, in whole percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Quality {
    pub approval_rate: i64,
    pub photo_coverage: i64,
}

impl Quality {
    pub fn new(total: i64, approved: i64, approved_with_photo: i64) -> Self {
        Self {
            approval_rate: percentage(approved, total),
            photo_coverage: percentage(approved_with_photo, approved),
        }
    }
}

/// Everything the statistics dashboard shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub hero: HeroCounts,
    pub monthly: Vec<MonthCount>,
    pub severity: SeverityDistribution,
    pub sectors: SectorRanking,
    pub trend: Vec<MonthCount>,
    pub hours: Vec<LabeledCount>,
    pub weekdays: Vec<LabeledCount>,
    pub quality: Quality,
}
