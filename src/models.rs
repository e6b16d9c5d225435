use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SkillCompetency {
    pub id: i32,
    pub employee_empid: String,
    pub skill: String,
    pub competency: String,
    pub current_expertise: Option<String>,
    pub target_expertise: Option<String>,
    pub assignment_start_date: Option<NaiveDate>,
    pub target_completion_date: Option<NaiveDate>,
    /// Precomputed weighted score; absent means derive from feedback history.
    pub weighted_progress: Option<i32>,
}

// Manager evaluations append rows rather than editing in place, so several
// rows may exist per (training, employee) pair.
#[derive(Debug, Clone)]
pub struct FeedbackRecord {
    pub id: Uuid,
    pub training_id: i32,
    pub employee_empid: String,
    pub skill_category: String,
    pub overall_performance: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

impl FeedbackRecord {
    pub fn effective_at(&self) -> NaiveDateTime {
        self.updated_at.unwrap_or(self.created_at)
    }
}

// Raw import row, one per trainer for fragmented sessions. Date and time
// stay as the free text the export carries.
#[derive(Debug, Clone)]
pub struct TrainingRecord {
    pub id: i32,
    pub training_name: String,
    pub skill: String,
    pub training_date: String,
    pub time_slot: String,
    pub trainer_name: String,
    pub email: String,
    pub assigned_count: i64,
    pub attended_count: i64,
}

/// One logical session after merging fragmented rows that share an
/// identity key (normalized name, date and time).
#[derive(Debug, Clone, Serialize)]
pub struct MergedTraining {
    /// Smallest id observed in the group.
    pub id: i32,
    pub training_name: String,
    pub skill: String,
    pub training_date: String,
    pub time_slot: String,
    pub trainer_name: String,
    pub email: String,
    /// Ids of every member row, for "any training in this group" lookups.
    pub related_ids: Vec<i32>,
    pub assigned_count: i64,
    pub attended_count: i64,
}

impl MergedTraining {
    /// Rate from the summed counts, never from averaging per-row rates.
    pub fn completion_rate(&self) -> i64 {
        if self.assigned_count <= 0 {
            return 0;
        }
        (self.attended_count as f64 / self.assigned_count as f64 * 100.0).round() as i64
    }
}

// Level-comparison status the data source historically supplied, retained
// alongside the computed timeline status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LegacyStatus {
    Met,
    Gap,
    Error,
}

impl std::fmt::Display for LegacyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LegacyStatus::Met => write!(f, "met"),
            LegacyStatus::Gap => write!(f, "gap"),
            LegacyStatus::Error => write!(f, "error"),
        }
    }
}

/// Derived timeline state. Never persisted, recomputed on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineStatus {
    NotStarted,
    Behind,
    OnTrack,
    Completed,
}

impl std::fmt::Display for TimelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimelineStatus::NotStarted => write!(f, "not started"),
            TimelineStatus::Behind => write!(f, "behind"),
            TimelineStatus::OnTrack => write!(f, "on track"),
            TimelineStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Per-skill output triple plus display context, consumed by dashboard
/// filters and counters.
#[derive(Debug, Clone, Serialize)]
pub struct SkillProgress {
    pub skill: String,
    pub competency: String,
    pub current_expertise: Option<String>,
    pub target_expertise: Option<String>,
    pub legacy_status: LegacyStatus,
    pub expected_progress: i64,
    pub actual_progress: i64,
    pub timeline_status: TimelineStatus,
}
