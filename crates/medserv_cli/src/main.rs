//! `medserv`: operator CLI for the maintenance scheduling core.
//!
//! # Responsibility
//! - Open/migrate the database and run the daily reminder sweep.
//! - Print role-scoped dashboards and request lists as JSON.
//! - `ping` and `version` check core linkage.

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use log::info;
use medserv_core::{
    default_log_level, init_logging, open_db, parse_date, parse_id, parse_status, schema_version,
    Actor, AdminService, DashboardService, NotificationService, RequestService, SchedulingPolicy,
};
use rusqlite::Connection;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Medical-device maintenance scheduling.
#[derive(Parser, Debug)]
#[command(name = "medserv", about = "Medical-device maintenance scheduling CLI")]
struct Cli {
    /// SQLite database file.
    #[arg(long, env = "MEDSERV_DB", global = true, default_value = "medserv.db")]
    db: PathBuf,

    /// JSON scheduling policy file; missing fields keep their defaults.
    #[arg(long, env = "MEDSERV_POLICY", global = true)]
    policy: Option<PathBuf>,

    /// Directory for rolling log files. Logging is off when unset.
    #[arg(long, env = "MEDSERV_LOG_DIR", global = true)]
    log_dir: Option<String>,

    /// trace|debug|info|warn|error (default depends on build profile).
    #[arg(long, env = "MEDSERV_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create or migrate the database.
    Init {
        /// Create the first administrator with this name.
        #[arg(long, requires = "admin_email")]
        admin_name: Option<String>,
        /// Email of the first administrator.
        #[arg(long, requires = "admin_name")]
        admin_email: Option<String>,
    },

    /// Write reminder notifications for devices due at the policy offsets.
    #[command(name = "notify-due")]
    NotifyDue {
        /// Sweep date (YYYY-MM-DD); defaults to today in UTC.
        #[arg(long)]
        today: Option<String>,
    },

    /// Print the dashboard summary visible to a user.
    Dashboard {
        /// Acting user id.
        #[arg(long = "as-user")]
        as_user: String,
        /// Reference date (YYYY-MM-DD); defaults to today in UTC.
        #[arg(long)]
        today: Option<String>,
        /// Also list overdue and due-soon devices.
        #[arg(long)]
        upcoming: bool,
    },

    /// List service requests visible to a user.
    Requests {
        /// Acting user id.
        #[arg(long = "as-user")]
        as_user: String,
        /// Only requests in this status.
        #[arg(long)]
        status: Option<String>,
    },

    /// Check core linkage.
    Ping,

    /// Show version.
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or_else(|| default_log_level());
        init_logging(level, log_dir).context("failed to start logging")?;
    }

    match cli.command {
        Commands::Ping => {
            println!("medserv_core ping={}", medserv_core::ping());
            Ok(())
        }
        Commands::Version => {
            println!("medserv_core version={}", medserv_core::core_version());
            Ok(())
        }
        Commands::Init {
            admin_name,
            admin_email,
        } => {
            let mut conn = open(&cli.db)?;
            if let (Some(name), Some(email)) = (admin_name, admin_email) {
                let admin = AdminService::new(&mut conn)
                    .bootstrap_admin(&name, &email)
                    .context("failed to create the first administrator")?;
                print_json(&admin)?;
            }
            println!(
                "database ready at {} (schema {})",
                cli.db.display(),
                schema_version(&conn)?
            );
            Ok(())
        }
        Commands::NotifyDue { today } => {
            let policy = load_policy(cli.policy.as_deref())?;
            let today = resolve_today(today.as_deref())?;
            let mut conn = open(&cli.db)?;
            let created = NotificationService::new(&mut conn, policy)
                .notify_upcoming_services(today)
                .context("reminder sweep failed")?;
            info!("event=cli_notify_due module=cli status=ok created={created}");
            print_json(&serde_json::json!({ "ok": true, "created": created }))
        }
        Commands::Dashboard {
            as_user,
            today,
            upcoming,
        } => {
            let policy = load_policy(cli.policy.as_deref())?;
            let today = resolve_today(today.as_deref())?;
            let mut conn = open(&cli.db)?;
            let actor = resolve_actor(&mut conn, &as_user)?;
            let due_soon_days = policy.due_soon_days;
            let dashboard = DashboardService::new(&conn, policy);

            let summary = dashboard.dashboard_summary(Some(&actor), today)?;
            if upcoming {
                let devices = dashboard.upcoming_devices(Some(&actor), today, due_soon_days)?;
                print_json(&serde_json::json!({ "summary": summary, "upcoming": devices }))
            } else {
                print_json(&summary)
            }
        }
        Commands::Requests { as_user, status } => {
            let policy = load_policy(cli.policy.as_deref())?;
            let status = status.as_deref().map(parse_status).transpose()?;
            let mut conn = open(&cli.db)?;
            let actor = resolve_actor(&mut conn, &as_user)?;
            let requests =
                RequestService::new(&mut conn, policy).list_requests(Some(&actor), status)?;
            print_json(&requests)
        }
    }
}

fn open(path: &Path) -> Result<Connection> {
    open_db(path).with_context(|| format!("failed to open database `{}`", path.display()))
}

fn load_policy(path: Option<&Path>) -> Result<SchedulingPolicy> {
    let Some(path) = path else {
        return Ok(SchedulingPolicy::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read policy `{}`", path.display()))?;
    let policy: SchedulingPolicy = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse policy `{}`", path.display()))?;
    policy.validate()?;
    Ok(policy)
}

fn resolve_today(value: Option<&str>) -> Result<NaiveDate> {
    match value {
        Some(text) => Ok(parse_date(text)?),
        None => Ok(Utc::now().date_naive()),
    }
}

fn resolve_actor(conn: &mut Connection, user_id: &str) -> Result<Actor> {
    let user_id = parse_id(user_id, "user id")?;
    match AdminService::new(conn).resolve_actor(user_id)? {
        Some(actor) => Ok(actor),
        None => bail!("no user with id {user_id}"),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
