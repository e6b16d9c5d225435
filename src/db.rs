use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{FeedbackRecord, SkillCompetency, TrainingRecord};
use crate::progress::{merge_timeline_window, parse_iso_date};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

async fn upsert_employee(
    pool: &PgPool,
    empid: &str,
    full_name: &str,
    manager_empid: Option<&str>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO skill_progress.employees (empid, full_name, manager_empid)
        VALUES ($1, $2, $3)
        ON CONFLICT (empid) DO UPDATE
        SET full_name = EXCLUDED.full_name,
            manager_empid = COALESCE(EXCLUDED.manager_empid, skill_progress.employees.manager_empid)
        "#,
    )
    .bind(empid)
    .bind(full_name)
    .bind(manager_empid)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let employees = vec![
        ("M100", "Priya Nair", None),
        ("E101", "Rohan Mehta", Some("M100")),
        ("E102", "Sara Iyer", Some("M100")),
    ];
    for (empid, full_name, manager) in employees {
        upsert_employee(pool, empid, full_name, manager).await?;
    }

    let competencies = vec![
        // no precomputed score: progress derives from feedback history
        (
            "E101",
            "Python",
            "Backend Development",
            "L2",
            "L4",
            NaiveDate::from_ymd_opt(2025, 1, 1),
            NaiveDate::from_ymd_opt(2025, 3, 1),
            None::<i32>,
        ),
        (
            "E101",
            "Rust",
            "Systems Programming",
            "L1",
            "L3",
            NaiveDate::from_ymd_opt(2025, 2, 1),
            NaiveDate::from_ymd_opt(2025, 5, 1),
            Some(35),
        ),
        // no timeline window at all
        ("E102", "Python", "Backend Development", "L3", "L3", None, None, None),
        (
            "E102",
            "Communication",
            "Soft Skills",
            "L2",
            "L4",
            NaiveDate::from_ymd_opt(2025, 1, 15),
            NaiveDate::from_ymd_opt(2025, 2, 15),
            Some(100),
        ),
    ];

    for (empid, skill, competency, current, target, start, target_date, weighted) in competencies {
        sqlx::query(
            r#"
            INSERT INTO skill_progress.competencies
            (employee_empid, skill, competency, current_expertise, target_expertise,
             assignment_start_date, target_completion_date, weighted_progress)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (employee_empid, skill, competency) DO UPDATE
            SET current_expertise = EXCLUDED.current_expertise,
                target_expertise = EXCLUDED.target_expertise,
                assignment_start_date = EXCLUDED.assignment_start_date,
                target_completion_date = EXCLUDED.target_completion_date,
                weighted_progress = EXCLUDED.weighted_progress
            "#,
        )
        .bind(empid)
        .bind(skill)
        .bind(competency)
        .bind(current)
        .bind(target)
        .bind(start)
        .bind(target_date)
        .bind(weighted)
        .execute(pool)
        .await?;
    }

    // The first two rows are the same session fragmented per trainer, with
    // the inconsistent date/time spellings the real export produces.
    let trainings = vec![
        (
            "seed-t-001",
            "Python L1",
            "Python",
            "2025-01-10T00:00:00",
            "10:00 AM",
            "Alice Varma",
            "alice.varma@example.com",
            12i64,
            10i64,
        ),
        (
            "seed-t-002",
            "python l1",
            "Python",
            "2025-01-10",
            "10.00  AM",
            "Bob Menon, Alice Varma",
            "bob.menon@example.com",
            8,
            5,
        ),
        (
            "seed-t-003",
            "Rust Fundamentals",
            "Rust",
            "2025-02-05",
            "2:00 PM",
            "Carol D'Souza",
            "carol.dsouza@example.com",
            15,
            11,
        ),
    ];

    for (source_key, name, skill, date, time, trainer, email, assigned, attended) in trainings {
        sqlx::query(
            r#"
            INSERT INTO skill_progress.trainings
            (training_name, skill, training_date, time_slot, trainer_name, email,
             assigned_count, attended_count, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(skill)
        .bind(date)
        .bind(time)
        .bind(trainer)
        .bind(email)
        .bind(assigned)
        .bind(attended)
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    // Feedback with an edit history: the second row supersedes the first
    // for E101's Python L1 rating.
    let feedback = vec![
        (
            "seed-f-001",
            "seed-t-001",
            "E101",
            "L1",
            Some(3),
            "2025-01-20 09:00:00",
            Some("2025-01-20 09:00:00"),
        ),
        (
            "seed-f-002",
            "seed-t-001",
            "E101",
            "L1",
            Some(4),
            "2025-01-20 09:00:00",
            Some("2025-02-01 10:00:00"),
        ),
        (
            "seed-f-003",
            "seed-t-002",
            "E101",
            "L2",
            Some(2),
            "2025-02-03 11:00:00",
            None,
        ),
    ];

    for (source_key, training_key, empid, category, performance, created, updated) in feedback {
        let training_id: i32 =
            sqlx::query("SELECT id FROM skill_progress.trainings WHERE source_key = $1")
                .bind(training_key)
                .fetch_one(pool)
                .await?
                .get("id");

        let created_at = NaiveDateTime::parse_from_str(created, "%Y-%m-%d %H:%M:%S")
            .context("invalid seed timestamp")?;
        let updated_at = updated
            .map(|value| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
            .transpose()
            .context("invalid seed timestamp")?;

        sqlx::query(
            r#"
            INSERT INTO skill_progress.performance_feedback
            (id, training_id, employee_empid, skill_category, overall_performance,
             created_at, updated_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(training_id)
        .bind(empid)
        .bind(category)
        .bind(performance)
        .bind(created_at)
        .bind(updated_at)
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn fetch_competencies(
    pool: &PgPool,
    employee: Option<&str>,
) -> anyhow::Result<Vec<SkillCompetency>> {
    let mut query = String::from(
        "SELECT id, employee_empid, skill, competency, current_expertise, \
         target_expertise, assignment_start_date, target_completion_date, \
         weighted_progress \
         FROM skill_progress.competencies",
    );
    if employee.is_some() {
        query.push_str(" WHERE employee_empid = $1");
    }
    query.push_str(" ORDER BY employee_empid, skill, competency");

    let mut rows = sqlx::query(&query);
    if let Some(value) = employee {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    let mut competencies = Vec::new();
    for row in records {
        competencies.push(SkillCompetency {
            id: row.get("id"),
            employee_empid: row.get("employee_empid"),
            skill: row.get("skill"),
            competency: row.get("competency"),
            current_expertise: row.get("current_expertise"),
            target_expertise: row.get("target_expertise"),
            assignment_start_date: row.get("assignment_start_date"),
            target_completion_date: row.get("target_completion_date"),
            weighted_progress: row.get("weighted_progress"),
        });
    }
    Ok(competencies)
}

pub async fn fetch_team_competencies(
    pool: &PgPool,
    manager: &str,
) -> anyhow::Result<Vec<SkillCompetency>> {
    let records = sqlx::query(
        "SELECT c.id, c.employee_empid, c.skill, c.competency, c.current_expertise, \
         c.target_expertise, c.assignment_start_date, c.target_completion_date, \
         c.weighted_progress \
         FROM skill_progress.competencies c \
         JOIN skill_progress.employees e ON e.empid = c.employee_empid \
         WHERE e.manager_empid = $1 \
         ORDER BY c.employee_empid, c.skill, c.competency",
    )
    .bind(manager)
    .fetch_all(pool)
    .await?;

    let mut competencies = Vec::new();
    for row in records {
        competencies.push(SkillCompetency {
            id: row.get("id"),
            employee_empid: row.get("employee_empid"),
            skill: row.get("skill"),
            competency: row.get("competency"),
            current_expertise: row.get("current_expertise"),
            target_expertise: row.get("target_expertise"),
            assignment_start_date: row.get("assignment_start_date"),
            target_completion_date: row.get("target_completion_date"),
            weighted_progress: row.get("weighted_progress"),
        });
    }
    Ok(competencies)
}

pub async fn fetch_trainings(
    pool: &PgPool,
    skill: Option<&str>,
) -> anyhow::Result<Vec<TrainingRecord>> {
    let mut query = String::from(
        "SELECT id, training_name, skill, training_date, time_slot, trainer_name, \
         email, assigned_count, attended_count \
         FROM skill_progress.trainings",
    );
    if skill.is_some() {
        query.push_str(" WHERE lower(trim(skill)) = lower(trim($1))");
    }
    query.push_str(" ORDER BY id");

    let mut rows = sqlx::query(&query);
    if let Some(value) = skill {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    let mut trainings = Vec::new();
    for row in records {
        trainings.push(TrainingRecord {
            id: row.get("id"),
            training_name: row.get("training_name"),
            skill: row.get("skill"),
            training_date: row.get("training_date"),
            time_slot: row.get("time_slot"),
            trainer_name: row.get("trainer_name"),
            email: row.get("email"),
            assigned_count: row.get("assigned_count"),
            attended_count: row.get("attended_count"),
        });
    }
    Ok(trainings)
}

pub async fn fetch_feedback(
    pool: &PgPool,
    employee: Option<&str>,
) -> anyhow::Result<Vec<FeedbackRecord>> {
    let mut query = String::from(
        "SELECT id, training_id, employee_empid, skill_category, \
         overall_performance, created_at, updated_at \
         FROM skill_progress.performance_feedback",
    );
    if employee.is_some() {
        query.push_str(" WHERE employee_empid = $1");
    }
    query.push_str(" ORDER BY created_at");

    let mut rows = sqlx::query(&query);
    if let Some(value) = employee {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    let mut feedback = Vec::new();
    for row in records {
        feedback.push(FeedbackRecord {
            id: row.get("id"),
            training_id: row.get("training_id"),
            employee_empid: row.get("employee_empid"),
            skill_category: row.get("skill_category"),
            overall_performance: row.get("overall_performance"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        });
    }
    Ok(feedback)
}

pub async fn import_trainings_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        training_name: String,
        skill: Option<String>,
        training_date: Option<String>,
        time_slot: Option<String>,
        trainer_name: String,
        email: Option<String>,
        assigned_count: Option<i64>,
        attended_count: Option<i64>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO skill_progress.trainings
            (training_name, skill, training_date, time_slot, trainer_name, email,
             assigned_count, attended_count, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(&row.training_name)
        .bind(row.skill.unwrap_or_default())
        .bind(row.training_date.unwrap_or_default())
        .bind(row.time_slot.unwrap_or_default())
        .bind(&row.trainer_name)
        .bind(row.email.unwrap_or_default())
        .bind(row.assigned_count.unwrap_or(0))
        .bind(row.attended_count.unwrap_or(0))
        .bind(source_key)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

pub async fn import_feedback_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        training_id: i32,
        employee_empid: String,
        employee_name: Option<String>,
        skill_category: String,
        overall_performance: Option<i32>,
        created_at: NaiveDateTime,
        updated_at: Option<NaiveDateTime>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let employee_name = row.employee_name.unwrap_or_else(|| row.employee_empid.clone());
        upsert_employee(pool, &row.employee_empid, &employee_name, None).await?;

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO skill_progress.performance_feedback
            (id, training_id, employee_empid, skill_category, overall_performance,
             created_at, updated_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(row.training_id)
        .bind(&row.employee_empid)
        .bind(&row.skill_category)
        .bind(row.overall_performance)
        .bind(row.created_at)
        .bind(row.updated_at)
        .bind(source_key)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

pub async fn import_competencies_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        employee_empid: String,
        employee_name: Option<String>,
        skill: String,
        competency: Option<String>,
        current_expertise: Option<String>,
        target_expertise: Option<String>,
        assignment_start_date: Option<String>,
        target_completion_date: Option<String>,
        weighted_progress: Option<i32>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut written = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let employee_name = row.employee_name.unwrap_or_else(|| row.employee_empid.clone());
        upsert_employee(pool, &row.employee_empid, &employee_name, None).await?;

        let competency = row.competency.unwrap_or_default();
        // tolerant parse; unparsable dates degrade to absent
        let incoming = (
            row.assignment_start_date
                .as_deref()
                .and_then(parse_iso_date),
            row.target_completion_date
                .as_deref()
                .and_then(parse_iso_date),
        );

        // Repeated rows for the same competency widen the window to the
        // earliest start and latest target rather than overwriting it.
        let existing = sqlx::query(
            r#"
            SELECT assignment_start_date, target_completion_date
            FROM skill_progress.competencies
            WHERE employee_empid = $1 AND skill = $2 AND competency = $3
            "#,
        )
        .bind(&row.employee_empid)
        .bind(&row.skill)
        .bind(&competency)
        .fetch_optional(pool)
        .await?;

        let window = match existing {
            Some(found) => merge_timeline_window(
                (
                    found.get("assignment_start_date"),
                    found.get("target_completion_date"),
                ),
                incoming,
            ),
            None => incoming,
        };

        sqlx::query(
            r#"
            INSERT INTO skill_progress.competencies
            (employee_empid, skill, competency, current_expertise, target_expertise,
             assignment_start_date, target_completion_date, weighted_progress)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (employee_empid, skill, competency) DO UPDATE
            SET current_expertise = EXCLUDED.current_expertise,
                target_expertise = EXCLUDED.target_expertise,
                assignment_start_date = EXCLUDED.assignment_start_date,
                target_completion_date = EXCLUDED.target_completion_date,
                weighted_progress = COALESCE(EXCLUDED.weighted_progress,
                                             skill_progress.competencies.weighted_progress)
            "#,
        )
        .bind(&row.employee_empid)
        .bind(&row.skill)
        .bind(&competency)
        .bind(row.current_expertise)
        .bind(row.target_expertise)
        .bind(window.0)
        .bind(window.1)
        .bind(row.weighted_progress)
        .execute(pool)
        .await?;

        written += 1;
    }

    Ok(written)
}
