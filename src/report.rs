use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{LegacyStatus, MergedTraining, SkillProgress, TimelineStatus};

// Counts the dashboard filters and badge widgets run on.
#[derive(Debug, Clone, Default)]
pub struct StatusBreakdown {
    pub total: usize,
    pub not_started: usize,
    pub behind: usize,
    pub on_track: usize,
    pub completed: usize,
    pub met: usize,
    pub gap: usize,
}

impl StatusBreakdown {
    pub fn percent_complete(&self) -> i64 {
        if self.total == 0 {
            return 0;
        }
        (self.completed as f64 / self.total as f64 * 100.0).round() as i64
    }
}

pub fn status_breakdown(skills: &[SkillProgress]) -> StatusBreakdown {
    let mut breakdown = StatusBreakdown {
        total: skills.len(),
        ..StatusBreakdown::default()
    };

    for skill in skills {
        match skill.timeline_status {
            TimelineStatus::NotStarted => breakdown.not_started += 1,
            TimelineStatus::Behind => breakdown.behind += 1,
            TimelineStatus::OnTrack => breakdown.on_track += 1,
            TimelineStatus::Completed => breakdown.completed += 1,
        }
        match skill.legacy_status {
            LegacyStatus::Met => breakdown.met += 1,
            LegacyStatus::Gap => breakdown.gap += 1,
            LegacyStatus::Error => {}
        }
    }

    breakdown
}

// Admin-side training metrics. The attendance rate comes from the summed
// counts so fragmented rows cannot skew it.
#[derive(Debug, Clone, Default)]
pub struct TrainingTotals {
    pub sessions: usize,
    pub assigned: i64,
    pub attended: i64,
}

impl TrainingTotals {
    pub fn attendance_rate(&self) -> i64 {
        if self.assigned <= 0 {
            return 0;
        }
        (self.attended as f64 / self.assigned as f64 * 100.0).round() as i64
    }
}

pub fn training_totals(sessions: &[MergedTraining]) -> TrainingTotals {
    let mut totals = TrainingTotals {
        sessions: sessions.len(),
        ..TrainingTotals::default()
    };
    for session in sessions {
        totals.assigned += session.assigned_count;
        totals.attended += session.attended_count;
    }
    totals
}

pub fn build_report(
    scope: Option<&str>,
    as_of: NaiveDate,
    skills: &[SkillProgress],
    sessions: &[MergedTraining],
) -> String {
    let breakdown = status_breakdown(skills);
    let totals = training_totals(sessions);

    let mut output = String::new();
    let scope_label = scope.unwrap_or("all employees");

    let _ = writeln!(output, "# Skill Progress Report");
    let _ = writeln!(output, "Generated for {} (as of {})", scope_label, as_of);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Status Breakdown");

    if breakdown.total == 0 {
        let _ = writeln!(output, "No tracked skills in scope.");
    } else {
        let _ = writeln!(output, "- completed: {}", breakdown.completed);
        let _ = writeln!(output, "- on track: {}", breakdown.on_track);
        let _ = writeln!(output, "- behind: {}", breakdown.behind);
        let _ = writeln!(output, "- not started: {}", breakdown.not_started);
        let _ = writeln!(
            output,
            "- target levels met: {} of {} ({} gaps)",
            breakdown.met, breakdown.total, breakdown.gap
        );
        let _ = writeln!(
            output,
            "- {}% of tracked skills completed",
            breakdown.percent_complete()
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Behind Pace");

    let mut behind: Vec<&SkillProgress> = skills
        .iter()
        .filter(|skill| skill.timeline_status == TimelineStatus::Behind)
        .collect();
    behind.sort_by_key(|skill| skill.actual_progress - skill.expected_progress);

    if behind.is_empty() {
        let _ = writeln!(output, "No skills behind pace.");
    } else {
        for skill in behind {
            let _ = writeln!(
                output,
                "- {} ({}): actual {}% vs expected {}% (gap {})",
                skill.skill,
                skill.competency,
                skill.actual_progress,
                skill.expected_progress,
                skill.expected_progress - skill.actual_progress
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Training Sessions");

    if sessions.is_empty() {
        let _ = writeln!(output, "No training sessions recorded.");
    } else {
        let _ = writeln!(
            output,
            "{} merged sessions, {} assigned, {} attended ({}% attendance)",
            totals.sessions,
            totals.assigned,
            totals.attended,
            totals.attendance_rate()
        );
        let mut ordered: Vec<&MergedTraining> = sessions.iter().collect();
        ordered.sort_by(|a, b| a.training_date.cmp(&b.training_date));
        for session in ordered.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} on {} ({}): trainers {} [{} rows merged]",
                session.training_name,
                session.training_date,
                session.skill,
                session.trainer_name,
                session.related_ids.len()
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skill(status: TimelineStatus, legacy: LegacyStatus, actual: i64, expected: i64) -> SkillProgress {
        SkillProgress {
            skill: "Rust".to_string(),
            competency: "Core".to_string(),
            current_expertise: Some("L2".to_string()),
            target_expertise: Some("L4".to_string()),
            legacy_status: legacy,
            expected_progress: expected,
            actual_progress: actual,
            timeline_status: status,
        }
    }

    #[test]
    fn breakdown_tallies_every_state_once() {
        let skills = vec![
            skill(TimelineStatus::Completed, LegacyStatus::Met, 100, 80),
            skill(TimelineStatus::Behind, LegacyStatus::Gap, 20, 60),
            skill(TimelineStatus::Behind, LegacyStatus::Gap, 30, 60),
            skill(TimelineStatus::OnTrack, LegacyStatus::Error, 50, 40),
        ];
        let breakdown = status_breakdown(&skills);
        assert_eq!(breakdown.total, 4);
        assert_eq!(breakdown.completed, 1);
        assert_eq!(breakdown.behind, 2);
        assert_eq!(breakdown.on_track, 1);
        assert_eq!(breakdown.not_started, 0);
        assert_eq!(breakdown.met, 1);
        assert_eq!(breakdown.gap, 2);
        assert_eq!(breakdown.percent_complete(), 25);
    }

    #[test]
    fn empty_scope_yields_zeroes_not_division_errors() {
        let breakdown = status_breakdown(&[]);
        assert_eq!(breakdown.percent_complete(), 0);
        let totals = training_totals(&[]);
        assert_eq!(totals.attendance_rate(), 0);
    }

    #[test]
    fn rates_round_half_up_at_the_boundary() {
        // 1 of 8 completed: 12.5 -> 13
        let mut skills = vec![skill(TimelineStatus::Completed, LegacyStatus::Met, 100, 80)];
        for _ in 0..7 {
            skills.push(skill(TimelineStatus::OnTrack, LegacyStatus::Gap, 50, 40));
        }
        assert_eq!(status_breakdown(&skills).percent_complete(), 13);

        let totals = TrainingTotals {
            sessions: 1,
            assigned: 8,
            attended: 1,
        };
        assert_eq!(totals.attendance_rate(), 13);
    }

    #[test]
    fn totals_sum_across_sessions() {
        let sessions = vec![
            MergedTraining {
                id: 1,
                training_name: "Python L1".to_string(),
                skill: "Python".to_string(),
                training_date: "2025-01-10".to_string(),
                time_slot: "10:00 AM".to_string(),
                trainer_name: "alice".to_string(),
                email: String::new(),
                related_ids: vec![1, 2],
                assigned_count: 10,
                attended_count: 8,
            },
            MergedTraining {
                id: 3,
                training_name: "Rust Intro".to_string(),
                skill: "Rust".to_string(),
                training_date: "2025-02-01".to_string(),
                time_slot: "2:00 PM".to_string(),
                trainer_name: "carol".to_string(),
                email: String::new(),
                related_ids: vec![3],
                assigned_count: 10,
                attended_count: 7,
            },
        ];
        let totals = training_totals(&sessions);
        assert_eq!(totals.sessions, 2);
        assert_eq!(totals.assigned, 20);
        assert_eq!(totals.attended, 15);
        assert_eq!(totals.attendance_rate(), 75);
    }

    #[test]
    fn report_lists_behind_skills_with_their_gap() {
        let skills = vec![
            skill(TimelineStatus::Behind, LegacyStatus::Gap, 20, 60),
            skill(TimelineStatus::Completed, LegacyStatus::Met, 100, 80),
        ];
        let report = build_report(Some("E100"), NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(), &skills, &[]);
        assert!(report.contains("# Skill Progress Report"));
        assert!(report.contains("Generated for E100"));
        assert!(report.contains("actual 20% vs expected 60% (gap 40)"));
        assert!(report.contains("No training sessions recorded."));
    }
}
