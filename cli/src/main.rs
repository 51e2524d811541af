use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use quorum_core::config::{CoreConfig, load_config};
use quorum_core::queue::{prune_expired, reset_failed_action};
use quorum_sqlite_storage::QuorumSqliteStorage;
use quorum_storage_traits::queue::ActionQueueStorage;
use quorum_storage_traits::queue::types::{Action, ActionStatus};
use quorum_storage_traits::{ActionId, Timestamp};
use serde_json::json;

#[derive(Debug, Parser)]
#[command(name = "quorumq")]
#[command(about = "Inspect and maintain a Quorum action queue database")]
struct Cli {
    /// Queue database (SQLite)
    #[arg(long, env = "QUORUMQ_DB")]
    db: PathBuf,

    /// Configuration file (quorum_config.json); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Record counts by status
    Stats,

    /// List queued actions in processing order
    List {
        /// Only this status (pending, processing or failed)
        #[arg(long)]
        status: Option<ActionStatus>,

        /// Maximum number of actions
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// Show one action with its full payload
    Show {
        /// Action id
        id: ActionId,
    },

    /// Delete failed actions older than the configured maximum age
    Prune,

    /// Return actions stuck in `processing` to `pending`.
    ///
    /// Only run this while no client has the database open.
    ResetStuck,

    /// Give a failed action a fresh retry budget
    Retry {
        /// Action id
        id: ActionId,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => CoreConfig::default(),
    };
    quorum_core::init_logging(config.log_filter.as_deref().or(Some("warn")));

    let storage = QuorumSqliteStorage::new(&cli.db)
        .with_context(|| format!("open queue database {}", cli.db.display()))?;
    tracing::debug!(db = %cli.db.display(), "Opened queue database");

    let output = run(&storage, &config, &cli.cmd)?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print!("{}", render(&cli.cmd, &output));
    }
    Ok(())
}

fn run(
    storage: &QuorumSqliteStorage,
    config: &CoreConfig,
    cmd: &Command,
) -> anyhow::Result<serde_json::Value> {
    match cmd {
        Command::Stats => {
            let stats = storage.queue_stats()?;
            Ok(json!({
                "pending": stats.pending,
                "processing": stats.processing,
                "failed": stats.failed,
                "total": stats.total(),
            }))
        }
        Command::List { status, limit } => {
            let actions = list_actions(storage, *status, *limit)?;
            Ok(json!({ "actions": actions.iter().map(summary).collect::<Vec<_>>() }))
        }
        Command::Show { id } => {
            let action = storage
                .find_action(id)?
                .ok_or_else(|| anyhow!("action not found: {id}"))?;
            Ok(serde_json::to_value(action)?)
        }
        Command::Prune => {
            let pruned = prune_expired(storage, &config.queue, Timestamp::now())?;
            Ok(json!({ "pruned": pruned }))
        }
        Command::ResetStuck => {
            let reset = storage.reset_processing_actions()?;
            Ok(json!({ "reset": reset }))
        }
        Command::Retry { id } => {
            let action = reset_failed_action(storage, id, Timestamp::now())?;
            Ok(json!({ "id": id.to_string(), "retried": action.is_some() }))
        }
    }
}

fn list_actions(
    storage: &QuorumSqliteStorage,
    status: Option<ActionStatus>,
    limit: usize,
) -> anyhow::Result<Vec<Action>> {
    if let Some(status) = status {
        return Ok(storage.actions_by_status(status, limit)?);
    }

    let mut actions = storage.pending_actions()?;
    actions.truncate(limit);
    let remaining = limit - actions.len();
    if remaining > 0 {
        actions.extend(storage.actions_by_status(ActionStatus::Failed, remaining)?);
    }
    Ok(actions)
}

fn summary(action: &Action) -> serde_json::Value {
    json!({
        "id": action.id.to_string(),
        "type": action.action_type().as_str(),
        "status": action.status.as_str(),
        "attempts": action.attempts,
        "next_attempt_at": action.next_attempt_at.as_millis(),
        "last_error": action.last_error,
    })
}

fn render(cmd: &Command, output: &serde_json::Value) -> String {
    match cmd {
        Command::List { .. } => {
            let mut out = String::new();
            let actions = output["actions"].as_array().cloned().unwrap_or_default();
            if actions.is_empty() {
                out.push_str("no actions\n");
            }
            for action in actions {
                out.push_str(&format!(
                    "{}  {:<10}  {:<22}  attempts={}",
                    text(&action["id"]),
                    text(&action["status"]),
                    text(&action["type"]),
                    action["attempts"]
                ));
                if let Some(error) = action["last_error"].as_str() {
                    out.push_str(&format!("  error={error}"));
                }
                out.push('\n');
            }
            out
        }
        Command::Show { .. } => serde_json::to_string_pretty(output)
            .map(|s| s + "\n")
            .unwrap_or_default(),
        _ => match output.as_object() {
            Some(fields) => fields
                .iter()
                .map(|(key, value)| format!("{key}: {}\n", text(value)))
                .collect(),
            None => format!("{output}\n"),
        },
    }
}

fn text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
