use std::collections::HashMap;

use chrono::NaiveDate;

use crate::models::{
    FeedbackRecord, LegacyStatus, MergedTraining, SkillCompetency, SkillProgress, TimelineStatus,
};
use crate::progress::{
    actual_progress, feedback_for_skill, mean_expected_progress, ActualSource,
};

/// Classify a skill's timeline state. Total function; rule order matters,
/// earlier rules win:
///
/// 1. nothing achieved and the start date is still ahead  -> NotStarted
/// 2. fully achieved                                      -> Completed
/// 3. no usable window: NotStarted when nothing achieved, OnTrack otherwise
/// 4. window fully elapsed without completion             -> Behind
/// 5. behind the pace implied by elapsed time             -> Behind
/// 6. otherwise                                           -> OnTrack
pub fn classify(
    actual: i64,
    expected: i64,
    now: NaiveDate,
    start: Option<NaiveDate>,
    target: Option<NaiveDate>,
) -> TimelineStatus {
    if actual <= 0 {
        if let Some(start) = start {
            if now <= start {
                return TimelineStatus::NotStarted;
            }
        }
    }
    if actual >= 100 {
        return TimelineStatus::Completed;
    }

    let window_valid = matches!((start, target), (Some(s), Some(t)) if t > s);
    if !window_valid {
        return if actual <= 0 {
            TimelineStatus::NotStarted
        } else {
            TimelineStatus::OnTrack
        };
    }

    if let Some(target) = target {
        if now > target {
            return TimelineStatus::Behind;
        }
    }
    if expected > 0 && actual < expected {
        return TimelineStatus::Behind;
    }
    TimelineStatus::OnTrack
}

// Expertise labels come in two formats: L0-L5 and the older text labels.
pub fn level_rank(raw: &str) -> Option<i32> {
    let label = raw.trim().to_uppercase();
    if let Some(rest) = label.strip_prefix('L') {
        return rest.parse::<i32>().ok();
    }
    match label.as_str() {
        "BEGINNER" => Some(1),
        "INTERMEDIATE" => Some(2),
        "ADVANCED" => Some(3),
        "EXPERT" => Some(4),
        _ => None,
    }
}

/// Met when current expertise has reached the target, Gap when it has not,
/// Error when either label is missing or unparsable.
pub fn legacy_status(current: Option<&str>, target: Option<&str>) -> LegacyStatus {
    let (Some(current), Some(target)) = (current, target) else {
        return LegacyStatus::Error;
    };
    match (level_rank(current), level_rank(target)) {
        (Some(current), Some(target)) if current >= target => LegacyStatus::Met,
        (Some(_), Some(_)) => LegacyStatus::Gap,
        _ => LegacyStatus::Error,
    }
}

/// Full per-skill pipeline over a set of competency rows. Expected
/// progress is the mean over rows sharing a skill name (window-less rows
/// excluded); actual progress prefers the precomputed score and falls back
/// to feedback history. `now` is captured once by the caller so every row
/// of a pass agrees on it.
pub fn evaluate_skills(
    competencies: &[SkillCompetency],
    trainings: &[MergedTraining],
    feedback: &[FeedbackRecord],
    now: NaiveDate,
) -> Vec<SkillProgress> {
    let mut windows_by_skill: HashMap<String, Vec<(Option<NaiveDate>, Option<NaiveDate>)>> =
        HashMap::new();
    for competency in competencies {
        windows_by_skill
            .entry(competency.skill.trim().to_lowercase())
            .or_default()
            .push((
                competency.assignment_start_date,
                competency.target_completion_date,
            ));
    }

    competencies
        .iter()
        .map(|competency| {
            let skill_key = competency.skill.trim().to_lowercase();
            let expected = windows_by_skill
                .get(&skill_key)
                .map(|windows| mean_expected_progress(now, windows))
                .unwrap_or(0);

            let actual = match competency.weighted_progress {
                Some(score) => actual_progress(ActualSource::Precomputed(Some(score))),
                None => {
                    let history = feedback_for_skill(
                        &competency.skill,
                        trainings,
                        feedback,
                        &competency.employee_empid,
                    );
                    actual_progress(ActualSource::History(&history))
                }
            };

            let timeline_status = classify(
                actual,
                expected,
                now,
                competency.assignment_start_date,
                competency.target_completion_date,
            );

            SkillProgress {
                skill: competency.skill.clone(),
                competency: competency.competency.clone(),
                current_expertise: competency.current_expertise.clone(),
                target_expertise: competency.target_expertise.clone(),
                legacy_status: legacy_status(
                    competency.current_expertise.as_deref(),
                    competency.target_expertise.as_deref(),
                ),
                expected_progress: expected,
                actual_progress: actual,
                timeline_status,
            }
        })
        .collect()
}
