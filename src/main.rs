use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use result_ledger::config::Config;
use result_ledger::db::{self, PgStore};
use result_ledger::models::ScoreComponent;
use result_ledger::report;
use result_ledger::semester::{Semester, Session};
use result_ledger::service::{ResultService, ScoreUpload, StudentRef};

#[derive(Parser)]
#[command(name = "result-ledger")]
#[command(
    about = "Score recording, approval and academic analysis for university results",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Decision {
    Approve,
    Reject,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Record a test or exam score
    SubmitScore {
        #[arg(long)]
        uploader: Uuid,
        #[arg(long)]
        matric: String,
        #[arg(long)]
        course: String,
        #[arg(long)]
        semester: Semester,
        #[arg(long)]
        session: Session,
        #[arg(long)]
        component: ScoreComponent,
        #[arg(long)]
        score: f64,
        #[arg(long)]
        unit: u32,
    },
    /// Submit scores in bulk from a CSV file
    ImportScores {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        uploader: Uuid,
    },
    /// Approve a recorded result
    Approve {
        #[arg(long)]
        result: Uuid,
        #[arg(long)]
        approver: Uuid,
    },
    /// Delete an unapproved result
    Reject {
        #[arg(long)]
        result: Uuid,
        #[arg(long)]
        reviewer: Uuid,
    },
    /// Ask for permission to upload results for a course
    RequestPrivilege {
        #[arg(long)]
        lecturer: Uuid,
        #[arg(long)]
        course: String,
    },
    /// Approve or reject a pending privilege request
    HandleRequest {
        #[arg(long)]
        request: Uuid,
        #[arg(long)]
        actor: Uuid,
        #[arg(long, value_enum)]
        decision: Decision,
    },
    /// Withdraw one of your own pending privilege requests
    WithdrawRequest {
        #[arg(long)]
        lecturer: Uuid,
        #[arg(long)]
        course: String,
    },
    /// Add a semester/session and make it the active period
    OpenPeriod {
        #[arg(long)]
        actor: Uuid,
        #[arg(long)]
        semester: Semester,
        #[arg(long)]
        session: Session,
    },
    /// GPA, CGPA and course breakdown for a student
    Summary {
        #[arg(long)]
        matric: String,
        #[arg(long)]
        json: bool,
    },
    /// Approved results of one semester with GPA and CGPA
    SemesterView {
        #[arg(long)]
        matric: String,
        #[arg(long)]
        semester: Semester,
        #[arg(long)]
        session: Session,
        #[arg(long)]
        json: bool,
    },
    /// Statistics for one course in one session
    CourseAnalysis {
        #[arg(long)]
        course: String,
        #[arg(long)]
        session: Session,
        #[arg(long)]
        json: bool,
    },
    /// Department performance and top performers for a session
    SessionAnalysis {
        #[arg(long)]
        session: Session,
        #[arg(long)]
        json: bool,
    },
    /// Privilege requests of one lecturer, or every pending and approved request
    ListRequests {
        #[arg(long)]
        lecturer: Option<Uuid>,
        #[arg(long)]
        json: bool,
    },
    /// Sessions a student has results in
    ResultSessions {
        #[arg(long)]
        matric: String,
    },
    /// Every result an admin has uploaded
    Uploads {
        #[arg(long)]
        admin: Uuid,
        #[arg(long)]
        json: bool,
    },
    /// Latest results awaiting approval and latest approvals
    ReviewQueue {
        #[arg(long)]
        actor: Uuid,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// User, course, result and privilege request counts
    Dashboard {
        #[arg(long)]
        actor: Uuid,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown transcript or course report
    #[command(group(
        ArgGroup::new("scope")
            .args(["matric", "course"])
            .required(true)
            .multiple(false)
    ))]
    Report {
        #[arg(long)]
        matric: Option<String>,
        #[arg(long, requires = "session")]
        course: Option<String>,
        #[arg(long)]
        session: Option<Session>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let pool = db::connect(&config).await?;
    let store = Arc::new(PgStore::new(pool.clone()));
    let service = ResultService::new(store, config.service.clone());

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::SubmitScore {
            uploader,
            matric,
            course,
            semester,
            session,
            component,
            score,
            unit,
        } => {
            let upload = ScoreUpload {
                student: StudentRef::IdNumber(matric),
                course_code: course,
                semester,
                session,
                component,
                value: score,
                unit,
                uploader_id: uploader,
            };
            let record = service
                .submit_score(&upload)
                .await
                .context("failed to record score")?;
            println!(
                "Recorded {} for {} ({}): total {:.1}, grade {}, {:?}.",
                component,
                record.key.course_code,
                record.id,
                record.total_score(),
                record.grade(),
                record.state()
            );
        }
        Commands::ImportScores { csv, uploader } => {
            let summary = db::import_scores(&service, &csv, uploader).await?;
            println!("Recorded {} scores from {}.", summary.recorded, csv.display());
            for (line, reason) in &summary.failures {
                println!("- line {line}: {reason}");
            }
        }
        Commands::Approve { result, approver } => {
            let record = service
                .approve_result(result, approver)
                .await
                .context("failed to approve result")?;
            println!(
                "Approved {} {}: {:.1} ({}).",
                record.key.course_code,
                record.period_label(),
                record.total_score(),
                record.grade()
            );
        }
        Commands::Reject { result, reviewer } => {
            let record = service
                .reject_result(result, reviewer)
                .await
                .context("failed to reject result")?;
            println!("Rejected and removed {} {}.", record.key.course_code, record.period_label());
        }
        Commands::RequestPrivilege { lecturer, course } => {
            let request = service
                .privileges()
                .request(lecturer, &course)
                .await
                .context("failed to request privilege")?;
            println!("Requested upload privilege for {} ({}).", request.course_code, request.id);
        }
        Commands::HandleRequest {
            request,
            actor,
            decision,
        } => match decision {
            Decision::Approve => {
                let request = service
                    .approve_privilege(request, actor)
                    .await
                    .context("failed to approve privilege request")?;
                println!("Granted {} to {}.", request.course_code, request.lecturer_id);
            }
            Decision::Reject => {
                let request = service
                    .reject_privilege(request, actor)
                    .await
                    .context("failed to reject privilege request")?;
                println!("Rejected request for {}.", request.course_code);
            }
        },
        Commands::WithdrawRequest { lecturer, course } => {
            let request = service
                .privileges()
                .withdraw(lecturer, &course)
                .await
                .context("failed to withdraw privilege request")?;
            println!("Withdrew request for {}.", request.course_code);
        }
        Commands::OpenPeriod {
            actor,
            semester,
            session,
        } => {
            let period = service
                .open_period(actor, semester, session)
                .await
                .context("failed to open period")?;
            info!(id = %period.id, "period opened");
            println!("{} semester of {} is now active.", period.semester, period.session);
        }
        Commands::Summary { matric, json } => {
            let summary = service
                .student_summary(&StudentRef::IdNumber(matric))
                .await
                .context("failed to build student summary")?;
            if json {
                return print_json(&summary);
            }

            println!("{} ({})", summary.student.full_name(), summary.student.id_number);
            if let Some(level) = summary.level {
                println!("Level {level}");
            }
            println!(
                "GPA {:.2}, CGPA {:.2} over {} units",
                summary.gpa, summary.cgpa, summary.total_units
            );
            for semester in &summary.per_semester {
                println!("- {}: {:.2}", semester.label, semester.gpa);
            }
        }
        Commands::SemesterView {
            matric,
            semester,
            session,
            json,
        } => {
            let view = service
                .semester_view(&StudentRef::IdNumber(matric), semester, &session)
                .await
                .context("failed to load semester results")?;
            if json {
                return print_json(&view);
            }

            println!(
                "{} semester {}: GPA {:.2}, CGPA {:.2}, {} units",
                view.semester, view.session, view.gpa, view.cgpa, view.total_units
            );
            for row in &view.courses {
                println!(
                    "- {} {:.1} {} ({} units)",
                    row.course_code, row.total_score, row.grade, row.unit
                );
            }
        }
        Commands::CourseAnalysis {
            course,
            session,
            json,
        } => {
            let analysis = service
                .course_session_analysis(&course, &session)
                .await
                .context("failed to analyse course")?;
            if json {
                return print_json(&analysis);
            }
            print!("{}", report::build_course_report(&analysis));
        }
        Commands::SessionAnalysis { session, json } => {
            let analysis = service
                .session_analysis(&session)
                .await
                .context("failed to analyse session")?;
            if json {
                return print_json(&analysis);
            }

            if analysis.department_performance.is_empty() {
                println!("No approved results for {session}.");
                return Ok(());
            }
            println!("Department performance for {session}:");
            for department in &analysis.department_performance {
                println!(
                    "- {}: GPA {:.2}, pass rate {}% ({} students, {} results)",
                    department.department,
                    department.gpa,
                    department.pass_rate,
                    department.students,
                    department.results
                );
            }
            println!("Top performers:");
            for result in &analysis.top_performers {
                println!(
                    "- {} {} {:.1} ({})",
                    result.student_id, result.course_code, result.total_score, result.grade
                );
            }
        }
        Commands::ListRequests { lecturer, json } => {
            let privileges = service.privileges();
            let requests = match lecturer {
                Some(lecturer) => privileges.requests_for(lecturer).await,
                None => privileges.overview().await.map(|(mut pending, approved)| {
                    pending.extend(approved);
                    pending
                }),
            }
            .context("failed to list privilege requests")?;
            if json {
                return print_json(&requests);
            }

            if requests.is_empty() {
                println!("No privilege requests.");
            }
            for request in &requests {
                println!(
                    "- {} {} by {} ({}, {})",
                    request.id,
                    request.course_code,
                    request.lecturer_id,
                    request.status,
                    request.requested_at.format("%Y-%m-%d")
                );
            }
        }
        Commands::ResultSessions { matric } => {
            let sessions = service
                .result_sessions(&StudentRef::IdNumber(matric))
                .await
                .context("failed to list result sessions")?;
            if sessions.is_empty() {
                println!("No results recorded yet.");
            }
            for session in &sessions {
                println!("- {session}");
            }
        }
        Commands::Uploads { admin, json } => {
            let uploads = service
                .uploads_by(admin)
                .await
                .context("failed to list uploads")?;
            if json {
                return print_json(&uploads);
            }

            println!("{} uploaded results:", uploads.len());
            for record in &uploads {
                println!(
                    "- {} {} {}: {:.1} ({}, {:?})",
                    record.id,
                    record.key.course_code,
                    record.period_label(),
                    record.total_score(),
                    record.grade(),
                    record.state()
                );
            }
        }
        Commands::ReviewQueue { actor, limit, json } => {
            let queue = service
                .review_queue(actor, limit)
                .await
                .context("failed to load review queue")?;
            if json {
                return print_json(&queue);
            }

            println!("Awaiting approval:");
            for record in &queue.pending {
                println!(
                    "- {} {} {}: {:.1}",
                    record.id,
                    record.key.course_code,
                    record.period_label(),
                    record.total_score()
                );
            }
            println!("Recently approved:");
            for record in &queue.approved {
                println!(
                    "- {} {} {}: {:.1}",
                    record.id,
                    record.key.course_code,
                    record.period_label(),
                    record.total_score()
                );
            }
        }
        Commands::Dashboard { actor, json } => {
            let dashboard = service
                .dashboard(actor)
                .await
                .context("failed to load dashboard")?;
            if json {
                return print_json(&dashboard);
            }

            println!(
                "Users: {} students, {} lecturers, {} super admins; {} courses",
                dashboard.students, dashboard.lecturers, dashboard.super_admins, dashboard.courses
            );
            println!(
                "Results: {} total, {} awaiting approval, {} approved",
                dashboard.results_total, dashboard.results_pending, dashboard.results_approved
            );
            println!(
                "Privilege requests: {} total, {} pending, {} approved",
                dashboard.requests_total, dashboard.requests_pending, dashboard.requests_approved
            );
            match &dashboard.active_period {
                Some(period) => println!("Active period: {} {}", period.semester, period.session),
                None => println!("No active period."),
            }
            for department in &dashboard.departments {
                println!(
                    "- {}: {} students, {} results, {} approved",
                    department.department,
                    department.students,
                    department.results,
                    department.approved
                );
            }
        }
        Commands::Report {
            matric,
            course,
            session,
            out,
        } => {
            let report = match (matric, course, session) {
                (Some(matric), _, _) => {
                    let summary = service
                        .student_summary(&StudentRef::IdNumber(matric))
                        .await
                        .context("failed to build student summary")?;
                    report::build_student_report(&summary)
                }
                (None, Some(course), Some(session)) => {
                    let analysis = service
                        .course_session_analysis(&course, &session)
                        .await
                        .context("failed to analyse course")?;
                    report::build_course_report(&analysis)
                }
                _ => anyhow::bail!("--course needs --session"),
            };
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
