//! caseflow CLI — operator interface to the SLA/escalation engine.

use std::sync::Arc;

use caseflow_rs::audit::PgAudit;
use caseflow_rs::config::Config;
use caseflow_rs::db::Db;
use caseflow_rs::directory::PgDirectory;
use caseflow_rs::engine::{Engine, EvaluationOutcome, Scheduler, SchedulerConfig};
use caseflow_rs::model::assignment::{AssignmentId, CompletionAction, Status};
use caseflow_rs::model::process::Role;
use caseflow_rs::notify::TracingNotifier;
use caseflow_rs::telemetry::{TelemetryConfig, init_telemetry};
use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;

#[derive(Parser)]
#[command(name = "caseflow", about = "SLA tracking and auto-escalation engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the auto-escalation scheduler daemon
    Serve {
        /// Seconds between passes (overrides CASEFLOW_SCHEDULER_INTERVAL)
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Request operations
    Request {
        #[command(subcommand)]
        action: RequestAction,
    },
    /// Assignment operations
    Assignment {
        #[command(subcommand)]
        action: AssignmentAction,
    },
    /// Escalation operations
    Escalation {
        #[command(subcommand)]
        action: EscalationAction,
    },
    /// Delay reporting
    Delay {
        #[command(subcommand)]
        action: DelayAction,
    },
}

#[derive(Subcommand)]
enum RequestAction {
    /// Submit a new request into a process
    Submit {
        /// Process definition ID
        process_id: uuid::Uuid,
        /// Request title
        title: String,
        /// Submitting user ID
        submitted_by: uuid::Uuid,
    },
}

#[derive(Subcommand)]
enum AssignmentAction {
    /// Start a pending assignment (starts the SLA clock)
    Start {
        /// Assignment ID (full UUID or prefix)
        id: String,
    },
    /// Complete an in-progress assignment
    Complete {
        /// Assignment ID (full UUID or prefix)
        id: String,
        /// Outcome: approve | reject | forward
        action: String,
        /// Completion notes
        #[arg(long)]
        notes: Option<String>,
    },
    /// Forward an in-progress assignment to an explicit role
    Forward {
        /// Assignment ID (full UUID or prefix)
        id: String,
        /// Target role name
        role: String,
        /// Hand-off notes
        #[arg(long)]
        notes: Option<String>,
    },
    /// Delegate an open assignment to another user
    Delegate {
        /// Assignment ID (full UUID or prefix)
        id: String,
        /// Destination user ID
        to_user: uuid::Uuid,
    },
    /// List assignments
    List {
        /// Filter by status
        #[arg(long)]
        status: Option<String>,
        /// Maximum items to show
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Show an assignment
    Show {
        /// Assignment ID (full UUID or prefix)
        id: String,
    },
}

#[derive(Subcommand)]
enum EscalationAction {
    /// Run one evaluation pass now, or evaluate a single assignment
    Run {
        /// Evaluate only this assignment (full UUID or prefix)
        #[arg(long)]
        assignment: Option<String>,
    },
    /// Show escalation history for an assignment
    History {
        /// Assignment ID (full UUID or prefix)
        id: String,
    },
}

#[derive(Subcommand)]
enum DelayAction {
    /// List recent delays
    List {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Show accumulated delay-days per user
    Debt {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Serve { interval } => cmd_serve(config, interval).await,
        command => {
            let db = Arc::new(Db::connect(config.database_url.expose_secret()).await?);
            db.migrate().await?;
            let engine = build_engine(&config, Arc::clone(&db));

            match command {
                Command::Serve { .. } => unreachable!("handled above"),
                Command::Request { action } => match action {
                    RequestAction::Submit {
                        process_id,
                        title,
                        submitted_by,
                    } => {
                        let (request, assignment) =
                            engine.submit_request(process_id, title, submitted_by).await?;
                        println!("Request {} created", request.id);
                        println!(
                            "Assignment {} pending for user {} ({}s allowed)",
                            assignment.id, assignment.assigned_to, assignment.allowed_seconds
                        );
                        Ok(())
                    }
                },
                Command::Assignment { action } => cmd_assignment(&db, &engine, action).await,
                Command::Escalation { action } => {
                    cmd_escalation(&config, &db, engine, action).await
                }
                Command::Delay { action } => cmd_delay(&db, action).await,
            }
        }
    }
}

fn build_engine(config: &Config, db: Arc<Db>) -> Arc<Engine> {
    let directory = Arc::new(PgDirectory::new(&db));
    let audit = Arc::new(PgAudit::new(&db));
    let notifier = Arc::new(TracingNotifier);
    Arc::new(Engine::new(db, directory, audit, notifier, config.flags))
}

async fn cmd_serve(config: Config, interval: Option<u64>) -> anyhow::Result<()> {
    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "caseflow".to_string(),
    })?;

    let db = Arc::new(Db::connect(config.database_url.expose_secret()).await?);
    db.migrate().await?;

    let engine = build_engine(&config, Arc::clone(&db));
    let interval_seconds = interval.unwrap_or(config.scheduler_interval_seconds);
    let scheduler = Arc::new(Scheduler::new(
        engine,
        db,
        SchedulerConfig {
            interval: std::time::Duration::from_secs(interval_seconds),
        },
    ));

    let sched = Arc::clone(&scheduler);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        sched.shutdown();
    });

    scheduler.run().await?;
    Ok(())
}

async fn cmd_assignment(
    db: &Db,
    engine: &Engine,
    action: AssignmentAction,
) -> anyhow::Result<()> {
    match action {
        AssignmentAction::Start { id } => {
            let id = resolve_assignment_id(db, &id).await?;
            let a = engine.start(id).await?;
            let started = a
                .started_at
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("Assignment {} started at {started}", a.id);
            Ok(())
        }
        AssignmentAction::Complete { id, action, notes } => {
            let id = resolve_assignment_id(db, &id).await?;
            let action: CompletionAction = action.parse()?;
            let a = engine.complete(id, action, notes).await?;
            println!(
                "Assignment {} -> {} (actual {}s, allowed {}s)",
                a.id,
                a.status,
                a.actual_seconds.unwrap_or(0),
                a.allowed_seconds
            );
            Ok(())
        }
        AssignmentAction::Forward { id, role, notes } => {
            let id = resolve_assignment_id(db, &id).await?;
            let role: Role = role.parse()?;
            let (forwarded, successor) = engine.forward_to(id, role, notes).await?;
            println!(
                "Assignment {} forwarded; successor {} assigned to {}",
                forwarded.id, successor.id, successor.assigned_to
            );
            Ok(())
        }
        AssignmentAction::Delegate { id, to_user } => {
            let id = resolve_assignment_id(db, &id).await?;
            let a = engine.delegate(id, to_user).await?;
            println!("Assignment {} delegated to {}", a.id, a.assigned_to);
            Ok(())
        }
        AssignmentAction::List { status, limit } => {
            let status_filter: Option<Status> = match status {
                Some(s) => Some(
                    s.parse()
                        .map_err(|_| anyhow::anyhow!("invalid status: {s}"))?,
                ),
                None => None,
            };

            let items = db.list_assignments_by_status(status_filter, limit).await?;
            if items.is_empty() {
                println!("No assignments found.");
                return Ok(());
            }

            println!(
                "{:<8}  {:<11}  {:<8}  {:<8}  ASSIGNED",
                "ID", "STATUS", "ALLOWED", "ACTUAL"
            );
            println!("{}", "-".repeat(60));
            for a in &items {
                println!(
                    "{:<8}  {:<11}  {:<8}  {:<8}  {}",
                    a.id.to_string(),
                    a.status.to_string(),
                    a.allowed_seconds,
                    a.actual_seconds
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    a.assigned_at.format("%Y-%m-%d %H:%M")
                );
            }
            println!("\n{} assignment(s)", items.len());
            Ok(())
        }
        AssignmentAction::Show { id } => {
            let id = resolve_assignment_id(db, &id).await?;
            let a = db.get_assignment(id).await?;

            println!("ID:          {}", a.id);
            println!("Request:     {}", a.request_id);
            println!("Step:        {}", a.step_id);
            println!("Status:      {}", a.status);
            println!("Assigned To: {}", a.assigned_to);
            println!(
                "Assigned By: {}",
                a.assigned_by
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| "-".to_string())
            );
            println!("Allowed:     {}s", a.allowed_seconds);
            println!("Assigned:    {}", a.assigned_at);
            if let Some(started) = a.started_at {
                println!("Started:     {started}");
            }
            if let Some(completed) = a.completed_at {
                println!("Completed:   {completed}");
            }
            if let Some(actual) = a.actual_seconds {
                println!("Actual:      {actual}s");
            }
            if let Some(ref notes) = a.notes {
                println!("Notes:       {notes}");
            }

            let delays = db.delays_for_assignment(id).await?;
            for d in &delays {
                println!(
                    "Delay:       {}s ({} day(s)){} against {}",
                    d.delay_seconds,
                    d.delay_days,
                    if d.is_shadow { " [shadow]" } else { "" },
                    d.user_id
                );
            }
            Ok(())
        }
    }
}

async fn cmd_escalation(
    config: &Config,
    db: &Arc<Db>,
    engine: Arc<Engine>,
    action: EscalationAction,
) -> anyhow::Result<()> {
    match action {
        EscalationAction::Run { assignment } => {
            let interval_seconds = config.scheduler_interval_seconds as i64;
            match assignment {
                Some(id) => {
                    let id = resolve_assignment_id(db, &id).await?;
                    let outcome = engine.evaluate_by_id(id, interval_seconds).await?;
                    match outcome {
                        EvaluationOutcome::Escalated {
                            successor: Some(s), ..
                        } => println!("Escalated: successor {s}"),
                        EvaluationOutcome::Escalated {
                            successor: None, ..
                        } => println!("Escalated: dead end, no successor"),
                        EvaluationOutcome::Suppressed { reason } => {
                            println!("Suppressed: {reason}")
                        }
                        EvaluationOutcome::Skipped { reason } => println!("Skipped: {reason}"),
                    }
                }
                None => {
                    let scheduler = Scheduler::new(
                        engine,
                        Arc::clone(db),
                        SchedulerConfig {
                            interval: std::time::Duration::from_secs(
                                config.scheduler_interval_seconds,
                            ),
                        },
                    );
                    let summary = scheduler.run_pass(chrono::Utc::now()).await?;
                    println!(
                        "Pass: {} scanned, {} escalated, {} dead ends, {} suppressed, {} skipped, {} failed",
                        summary.scanned,
                        summary.escalated,
                        summary.dead_ends,
                        summary.suppressed,
                        summary.skipped,
                        summary.failed
                    );
                }
            }
            Ok(())
        }
        EscalationAction::History { id } => {
            let id = resolve_assignment_id(db, &id).await?;
            let rows = db.escalation_history_for(id).await?;
            if rows.is_empty() {
                println!("No escalations for assignment {id}.");
                return Ok(());
            }
            for h in &rows {
                println!(
                    "{}  from {}  to {}  {}{}",
                    h.escalated_at.format("%Y-%m-%d %H:%M:%S"),
                    h.escalated_from,
                    h.escalated_to_user
                        .map(|u| u.to_string())
                        .unwrap_or_else(|| "(dead end)".to_string()),
                    h.reason,
                    h.resolved_at
                        .map(|t| format!("  resolved {t}"))
                        .unwrap_or_default()
                );
            }
            Ok(())
        }
    }
}

async fn cmd_delay(db: &Db, action: DelayAction) -> anyhow::Result<()> {
    match action {
        DelayAction::List { limit } => {
            let delays = db.list_delays(limit).await?;
            if delays.is_empty() {
                println!("No delays recorded.");
                return Ok(());
            }
            println!(
                "{:<10}  {:<10}  {:<6}  {:<10}  DETECTED",
                "SECONDS", "DAYS", "SHADOW", "CATEGORY"
            );
            println!("{}", "-".repeat(60));
            for d in &delays {
                println!(
                    "{:<10}  {:<10}  {:<6}  {:<10}  {}",
                    d.delay_seconds,
                    d.delay_days,
                    if d.is_shadow { "yes" } else { "no" },
                    d.reason_category,
                    d.detected_at.format("%Y-%m-%d %H:%M")
                );
            }
            Ok(())
        }
        DelayAction::Debt { limit } => {
            let scores = db.debt_scores(limit).await?;
            if scores.is_empty() {
                println!("No delay debt accumulated.");
                return Ok(());
            }
            println!("{:<38}  {:<10}  BREACHES", "USER", "DELAY DAYS");
            println!("{}", "-".repeat(60));
            for s in &scores {
                println!(
                    "{:<38}  {:<10}  {}",
                    s.user_id, s.total_delay_days, s.breach_count
                );
            }
            Ok(())
        }
    }
}

/// Support prefix matching — find the assignment whose ID starts with the
/// given string.
async fn resolve_assignment_id(db: &Db, id_str: &str) -> anyhow::Result<AssignmentId> {
    if id_str.len() == 36 {
        return Ok(AssignmentId(uuid::Uuid::parse_str(id_str)?));
    }

    let items = db.list_assignments_by_status(None, 500).await?;
    let matches: Vec<_> = items
        .iter()
        .filter(|a| a.id.0.to_string().starts_with(id_str))
        .collect();
    match matches.len() {
        0 => anyhow::bail!("no assignment matching prefix '{id_str}'"),
        1 => Ok(matches[0].id),
        n => anyhow::bail!("{n} assignments match prefix '{id_str}' — be more specific"),
    }
}
