use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;

mod db;
mod dedup;
mod models;
mod progress;
mod report;
mod status;

#[derive(Parser)]
#[command(name = "skill-progress")]
#[command(about = "Skill progress and timeline status tracker for Orbit Skill", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ImportKind {
    Trainings,
    Feedback,
    Competencies,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import rows from a CSV export
    Import {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, value_enum)]
        kind: ImportKind,
    },
    /// List training sessions after merging fragmented import rows
    Trainings {
        #[arg(long)]
        skill: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Compute per-skill progress and timeline status for one employee
    Status {
        #[arg(long)]
        employee: String,
        /// Evaluate as of this date instead of today
        #[arg(long)]
        as_of: Option<NaiveDate>,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown dashboard report
    #[command(group(
        ArgGroup::new("scope")
            .args(["employee", "manager"])
            .multiple(false)
    ))]
    Report {
        /// Report on one employee's skills
        #[arg(long)]
        employee: Option<String>,
        /// Report on every skill of a manager's team
        #[arg(long)]
        manager: Option<String>,
        #[arg(long)]
        as_of: Option<NaiveDate>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv, kind } => {
            let inserted = match kind {
                ImportKind::Trainings => db::import_trainings_csv(&pool, &csv).await?,
                ImportKind::Feedback => db::import_feedback_csv(&pool, &csv).await?,
                ImportKind::Competencies => db::import_competencies_csv(&pool, &csv).await?,
            };
            println!("Imported {inserted} rows from {}.", csv.display());
        }
        Commands::Trainings { skill, json } => {
            let raw = db::fetch_trainings(&pool, skill.as_deref()).await?;
            let mut sessions = dedup::deduplicate(&raw);
            sessions.sort_by(|a, b| a.training_date.cmp(&b.training_date));

            if json {
                println!("{}", serde_json::to_string_pretty(&sessions)?);
                return Ok(());
            }

            if sessions.is_empty() {
                println!("No training sessions found.");
                return Ok(());
            }

            println!("{} merged sessions ({} raw rows):", sessions.len(), raw.len());
            for session in &sessions {
                println!(
                    "- #{} {} on {} {} | trainers: {} | {}/{} attended ({}%) | {} rows",
                    session.id,
                    session.training_name,
                    session.training_date,
                    session.time_slot,
                    session.trainer_name,
                    session.attended_count,
                    session.assigned_count,
                    session.completion_rate(),
                    session.related_ids.len()
                );
            }
        }
        Commands::Status {
            employee,
            as_of,
            json,
        } => {
            // capture "now" once so every value in this pass agrees on it
            let now = as_of.unwrap_or_else(|| Utc::now().date_naive());
            let competencies = db::fetch_competencies(&pool, Some(employee.as_str())).await?;
            let raw_trainings = db::fetch_trainings(&pool, None).await?;
            let sessions = dedup::deduplicate(&raw_trainings);
            let feedback = db::fetch_feedback(&pool, Some(employee.as_str())).await?;

            let skills = status::evaluate_skills(&competencies, &sessions, &feedback, now);

            if skills.is_empty() {
                println!("No tracked skills for {employee}.");
                return Ok(());
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&skills)?);
            } else {
                println!("Skill status for {employee} (as of {now}):");
                for skill in &skills {
                    println!(
                        "- {} ({}): actual {}%, expected {}%, {} [levels: {}]",
                        skill.skill,
                        skill.competency,
                        skill.actual_progress,
                        skill.expected_progress,
                        skill.timeline_status,
                        skill.legacy_status
                    );
                }
                let breakdown = report::status_breakdown(&skills);
                println!(
                    "{} skills: {} completed, {} on track, {} behind, {} not started",
                    breakdown.total,
                    breakdown.completed,
                    breakdown.on_track,
                    breakdown.behind,
                    breakdown.not_started
                );
            }
        }
        Commands::Report {
            employee,
            manager,
            as_of,
            out,
        } => {
            let now = as_of.unwrap_or_else(|| Utc::now().date_naive());
            let competencies = match (&employee, &manager) {
                (Some(empid), _) => db::fetch_competencies(&pool, Some(empid.as_str())).await?,
                (None, Some(mgr)) => db::fetch_team_competencies(&pool, mgr.as_str()).await?,
                (None, None) => db::fetch_competencies(&pool, None).await?,
            };
            let raw_trainings = db::fetch_trainings(&pool, None).await?;
            let sessions = dedup::deduplicate(&raw_trainings);
            let feedback = db::fetch_feedback(&pool, employee.as_deref()).await?;

            let skills = status::evaluate_skills(&competencies, &sessions, &feedback, now);
            let scope = employee.as_deref().or(manager.as_deref());
            let report = report::build_report(scope, now, &skills, &sessions);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
