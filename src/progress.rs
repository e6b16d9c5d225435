use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use crate::models::{FeedbackRecord, MergedTraining};

/// Tolerant date parsing: `YYYY-MM-DD`, with or without a time component.
/// Anything unparsable is treated the same as an absent date.
pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let prefix = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

/// Linear elapsed-fraction of the timeline window, as an integer percent.
///
/// Returns 0 when the window is missing or degenerate (`target <= start`)
/// and when `now` has not reached `start`. Elapsed time is clamped to the
/// window, so values past `target` saturate at 100.
pub fn expected_progress(
    now: NaiveDate,
    start: Option<NaiveDate>,
    target: Option<NaiveDate>,
) -> i64 {
    let (Some(start), Some(target)) = (start, target) else {
        return 0;
    };
    if target <= start || now <= start {
        return 0;
    }

    let window = (target - start).num_days();
    let elapsed = (now - start).num_days().min(window);
    ((elapsed as f64 / window as f64) * 100.0).round().clamp(0.0, 100.0) as i64
}

/// Average expected progress across level rows of the same skill. Rows
/// without a usable window are excluded from the mean, not counted as zero.
pub fn mean_expected_progress(
    now: NaiveDate,
    windows: &[(Option<NaiveDate>, Option<NaiveDate>)],
) -> i64 {
    let values: Vec<i64> = windows
        .iter()
        .filter(|(start, target)| matches!((start, target), (Some(s), Some(t)) if t > s))
        .map(|&(start, target)| expected_progress(now, start, target))
        .collect();

    if values.is_empty() {
        return 0;
    }
    let sum: i64 = values.iter().sum();
    (sum as f64 / values.len() as f64).round() as i64
}

/// Which data the caller has for realized progress. The two strategies
/// must agree when fed equivalent data.
pub enum ActualSource<'a> {
    /// Weighted score computed upstream (attendance, assignment score,
    /// feedback mix), trusted as-is.
    Precomputed(Option<i32>),
    /// Feedback history already scoped to one skill and one holder.
    History(&'a [FeedbackRecord]),
}

pub fn actual_progress(source: ActualSource<'_>) -> i64 {
    match source {
        ActualSource::Precomputed(score) => progress_from_weighted(score),
        ActualSource::History(records) => progress_from_history(records),
    }
}

pub fn progress_from_weighted(score: Option<i32>) -> i64 {
    i64::from(score.unwrap_or(0)).clamp(0, 100)
}

/// Derive progress from feedback history: per canonical level (L1 to L5)
/// keep only the most recently updated rated record, average those 1-5
/// ratings across whichever levels have one, and scale to a percent.
/// Unrated records never enter the average, so an incomplete evaluation
/// cannot deflate the score.
pub fn progress_from_history(records: &[FeedbackRecord]) -> i64 {
    let mut latest: HashMap<u8, &FeedbackRecord> = HashMap::new();

    for record in records {
        let Some(level) = canonical_level(&record.skill_category) else {
            continue;
        };
        if record.overall_performance.is_none() {
            continue;
        }
        match latest.entry(level) {
            Entry::Occupied(mut entry) => {
                if record.effective_at() > entry.get().effective_at() {
                    entry.insert(record);
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(record);
            }
        }
    }

    if latest.is_empty() {
        return 0;
    }

    let sum: i64 = latest
        .values()
        .filter_map(|record| record.overall_performance)
        .map(i64::from)
        .sum();
    let average = sum as f64 / latest.len() as f64;
    ((average / 5.0) * 100.0).round().clamp(0.0, 100.0) as i64
}

// Only the five canonical levels count; "Unknown" and free text are
// outside the average.
fn canonical_level(raw: &str) -> Option<u8> {
    match raw.trim().to_uppercase().as_str() {
        "L1" => Some(1),
        "L2" => Some(2),
        "L3" => Some(3),
        "L4" => Some(4),
        "L5" => Some(5),
        _ => None,
    }
}

/// Feedback rows for one skill of one holder. Trainings match on the
/// skill name case-insensitively after trimming; a merged session matches
/// through any of its member ids.
pub fn feedback_for_skill(
    skill: &str,
    trainings: &[MergedTraining],
    feedback: &[FeedbackRecord],
    employee_empid: &str,
) -> Vec<FeedbackRecord> {
    let wanted = skill.trim().to_lowercase();
    let mut training_ids: HashSet<i32> = HashSet::new();
    for training in trainings {
        if training.skill.trim().to_lowercase() == wanted {
            training_ids.extend(training.related_ids.iter().copied());
        }
    }

    feedback
        .iter()
        .filter(|record| {
            training_ids.contains(&record.training_id)
                && record.employee_empid == employee_empid
        })
        .cloned()
        .collect()
}

/// Earliest start, latest target across repeated rows of one competency.
pub fn merge_timeline_window(
    existing: (Option<NaiveDate>, Option<NaiveDate>),
    incoming: (Option<NaiveDate>, Option<NaiveDate>),
) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let start = match (existing.0, incoming.0) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
    let target = match (existing.1, incoming.1) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };
    (start, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn stamp(raw: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn rating(
        training_id: i32,
        category: &str,
        performance: Option<i32>,
        updated: &str,
    ) -> FeedbackRecord {
        FeedbackRecord {
            id: Uuid::new_v4(),
            training_id,
            employee_empid: "E100".to_string(),
            skill_category: category.to_string(),
            overall_performance: performance,
            created_at: stamp("2025-01-01 09:00:00"),
            updated_at: Some(stamp(updated)),
        }
    }

    #[test]
    fn midpoint_of_window_is_fifty_percent() {
        let value = expected_progress(
            date(2025, 1, 6),
            Some(date(2025, 1, 1)),
            Some(date(2025, 1, 11)),
        );
        assert_eq!(value, 50);
    }

    #[test]
    fn before_start_and_after_target_saturate() {
        let start = Some(date(2025, 1, 10));
        let target = Some(date(2025, 2, 10));
        assert_eq!(expected_progress(date(2025, 1, 2), start, target), 0);
        assert_eq!(expected_progress(date(2025, 6, 1), start, target), 100);
    }

    #[test]
    fn invalid_windows_fail_closed() {
        let day = date(2025, 3, 1);
        assert_eq!(expected_progress(day, None, Some(day)), 0);
        assert_eq!(expected_progress(day, Some(day), None), 0);
        assert_eq!(expected_progress(day, Some(day), Some(day)), 0);
        // target before start
        assert_eq!(
            expected_progress(day, Some(date(2025, 4, 1)), Some(date(2025, 3, 15))),
            0
        );
    }

    #[test]
    fn half_percent_boundaries_round_up() {
        // 1 of 8 days elapsed: 12.5 -> 13
        let value = expected_progress(
            date(2025, 1, 2),
            Some(date(2025, 1, 1)),
            Some(date(2025, 1, 9)),
        );
        assert_eq!(value, 13);

        // per-row values 50 and 51 average to 50.5 -> 51
        let now = date(2025, 1, 6);
        let windows = vec![
            (Some(date(2025, 1, 1)), Some(date(2025, 1, 11))),
            (Some(date(2024, 11, 16)), Some(date(2025, 2, 24))),
        ];
        assert_eq!(expected_progress(now, windows[1].0, windows[1].1), 51);
        assert_eq!(mean_expected_progress(now, &windows), 51);
    }

    #[test]
    fn expected_is_monotonic_within_window() {
        let start = Some(date(2025, 1, 1));
        let target = Some(date(2025, 1, 31));
        let mut previous = 0;
        for day in 1..=31 {
            let value = expected_progress(date(2025, 1, day), start, target);
            assert!(value >= previous);
            assert!((0..=100).contains(&value));
            previous = value;
        }
    }

    #[test]
    fn mean_skips_rows_without_a_window() {
        let now = date(2025, 1, 6);
        let windows = vec![
            (Some(date(2025, 1, 1)), Some(date(2025, 1, 11))), // 50
            (None, Some(date(2025, 1, 11))),                   // excluded
            (Some(date(2025, 1, 1)), Some(date(2025, 1, 6))),  // 100
        ];
        assert_eq!(mean_expected_progress(now, &windows), 75);
        assert_eq!(mean_expected_progress(now, &[(None, None)]), 0);
    }

    #[test]
    fn weighted_score_is_used_directly() {
        assert_eq!(progress_from_weighted(Some(73)), 73);
        assert_eq!(progress_from_weighted(None), 0);
        assert_eq!(progress_from_weighted(Some(140)), 100);
        assert_eq!(progress_from_weighted(Some(-5)), 0);
    }

    #[test]
    fn history_averages_latest_rating_per_level() {
        let records = vec![
            rating(1, "L1", Some(2), "2025-01-02 10:00:00"),
            rating(1, "L1", Some(4), "2025-01-05 10:00:00"), // supersedes
            rating(2, "L2", Some(2), "2025-01-03 10:00:00"),
            rating(2, "Unknown", Some(5), "2025-01-04 10:00:00"), // ignored
        ];
        // (4 + 2) / 2 = 3.0 -> 60%
        assert_eq!(progress_from_history(&records), 60);
    }

    #[test]
    fn unrated_records_never_enter_the_average() {
        let records = vec![
            rating(1, "L1", Some(5), "2025-01-02 10:00:00"),
            // newer edit without a rating must not shadow the rated one
            rating(1, "L1", None, "2025-01-09 10:00:00"),
        ];
        assert_eq!(progress_from_history(&records), 100);
        assert_eq!(
            progress_from_history(&[rating(1, "L3", None, "2025-01-02 10:00:00")]),
            0
        );
    }

    #[test]
    fn history_falls_back_to_created_at() {
        let mut older = rating(1, "L1", Some(1), "2025-01-02 10:00:00");
        older.updated_at = None;
        older.created_at = stamp("2025-01-08 10:00:00");
        let newer = rating(1, "L1", Some(5), "2025-01-04 10:00:00");
        // created_at of the first row is later than the second's update
        assert_eq!(progress_from_history(&[older, newer]), 20);
    }

    #[test]
    fn strategies_agree_on_equivalent_data() {
        let records = vec![
            rating(1, "L1", Some(4), "2025-01-05 10:00:00"),
            rating(2, "L2", Some(2), "2025-01-03 10:00:00"),
        ];
        let derived = actual_progress(ActualSource::History(&records));
        let precomputed = actual_progress(ActualSource::Precomputed(Some(60)));
        assert_eq!(derived, precomputed);
    }

    #[test]
    fn feedback_matching_is_case_insensitive_and_spans_related_ids() {
        let session = MergedTraining {
            id: 3,
            training_name: "rust basics".to_string(),
            skill: "Rust ".to_string(),
            training_date: "2025-01-10".to_string(),
            time_slot: "10:00".to_string(),
            trainer_name: "alice".to_string(),
            email: String::new(),
            related_ids: vec![3, 7],
            assigned_count: 0,
            attended_count: 0,
        };
        let feedback = vec![
            rating(7, "L1", Some(4), "2025-01-05 10:00:00"),
            rating(9, "L1", Some(1), "2025-01-05 10:00:00"),
        ];
        let matched = feedback_for_skill("rust", &[session], &feedback, "E100");
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].training_id, 7);
    }

    #[test]
    fn tolerant_date_parsing() {
        assert_eq!(
            parse_iso_date(" 2025-01-10T00:00:00Z "),
            Some(date(2025, 1, 10))
        );
        assert_eq!(parse_iso_date("2025-01-10"), Some(date(2025, 1, 10)));
        assert_eq!(parse_iso_date("next tuesday"), None);
        assert_eq!(parse_iso_date(""), None);
    }

    #[test]
    fn windows_merge_to_earliest_start_latest_target() {
        let merged = merge_timeline_window(
            (Some(date(2025, 2, 1)), Some(date(2025, 3, 1))),
            (Some(date(2025, 1, 15)), Some(date(2025, 4, 1))),
        );
        assert_eq!(merged, (Some(date(2025, 1, 15)), Some(date(2025, 4, 1))));
        let partial = merge_timeline_window((None, None), (Some(date(2025, 1, 1)), None));
        assert_eq!(partial, (Some(date(2025, 1, 1)), None));
    }
}
