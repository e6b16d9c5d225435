use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::models::{MergedTraining, TrainingRecord};

fn date_prefix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d{4}-\d{2}-\d{2})").expect("valid pattern"))
}

fn normalize_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Reduce any date representation to its `YYYY-MM-DD` prefix when one is
/// present; otherwise fall back to the trimmed text. Empty input stays
/// empty.
fn normalize_date(raw: &str) -> String {
    let trimmed = raw.trim();
    match date_prefix_pattern().find(trimmed) {
        Some(found) => found.as_str().to_string(),
        None => trimmed.to_string(),
    }
}

/// Collapse runs of whitespace and unify the period/colon separator the
/// export uses inconsistently ("10.00 AM" vs "10:00 AM").
fn normalize_time(raw: &str) -> String {
    raw.trim()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('.', ":")
}

fn identity_key(record: &TrainingRecord) -> String {
    // the time keeps its original case for display but not for identity
    // ("10:00 AM" and "10:00 am" are the same slot)
    format!(
        "{}|{}|{}",
        normalize_name(&record.training_name),
        normalize_date(&record.training_date),
        normalize_time(&record.time_slot).to_lowercase()
    )
}

/// Append the comma-separated names in `raw` to `joined`, skipping names
/// already present under a case-insensitive comparison.
fn merge_name_list(joined: &mut String, seen: &mut Vec<String>, raw: &str) {
    for part in raw.split(',') {
        let name = part.trim();
        if name.is_empty() {
            continue;
        }
        let folded = name.to_lowercase();
        if seen.contains(&folded) {
            continue;
        }
        seen.push(folded);
        if !joined.is_empty() {
            joined.push_str(", ");
        }
        joined.push_str(name);
    }
}

/// Merge training rows fragmented at import time (one row per trainer)
/// into single logical sessions keyed on normalized (name, date, time).
/// The smallest member id becomes canonical and every member id lands in
/// `related_ids`; trainer names and emails become duplicate-free unions in
/// first-seen order; counts are summed. Output keeps first-seen group
/// order; callers needing a display order re-sort afterward.
pub fn deduplicate(records: &[TrainingRecord]) -> Vec<MergedTraining> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, (MergedTraining, Vec<String>, Vec<String>)> = HashMap::new();

    for record in records {
        let key = identity_key(record);
        if let Some((merged, trainer_seen, email_seen)) = groups.get_mut(&key) {
            merge_name_list(&mut merged.trainer_name, trainer_seen, &record.trainer_name);
            merge_name_list(&mut merged.email, email_seen, &record.email);
            if record.id < merged.id {
                merged.id = record.id;
            }
            merged.related_ids.push(record.id);
            merged.assigned_count += record.assigned_count;
            merged.attended_count += record.attended_count;
        } else {
            let mut merged = MergedTraining {
                id: record.id,
                training_name: record.training_name.clone(),
                skill: record.skill.clone(),
                training_date: normalize_date(&record.training_date),
                time_slot: normalize_time(&record.time_slot),
                trainer_name: String::new(),
                email: String::new(),
                related_ids: vec![record.id],
                assigned_count: record.assigned_count,
                attended_count: record.attended_count,
            };
            // a single pre-merge row may already carry a comma-joined list
            let mut trainer_seen = Vec::new();
            let mut email_seen = Vec::new();
            merge_name_list(&mut merged.trainer_name, &mut trainer_seen, &record.trainer_name);
            merge_name_list(&mut merged.email, &mut email_seen, &record.email);
            order.push(key.clone());
            groups.insert(key, (merged, trainer_seen, email_seen));
        }
    }

    order
        .into_iter()
        .filter_map(|key| groups.remove(&key))
        .map(|(merged, _, _)| merged)
        .collect()
}
