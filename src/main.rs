use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, Utc};
use clap::builder::PossibleValuesParser;
use clap::{Parser, Subcommand};
use jira_api::{JiraClient, JiraError, UserWorklog};
use jira_timesheet::{
    format_elapsed, Config, ConfigManager, HistoryOutcome, HistoryRecorder, SystemClock, TimerId,
    TimerManager, TimerStore, WorklogTracker,
};

type CliResult<T = ()> = Result<T, Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "jira-timesheet", version, about = "Track time on Jira issues and log it as worklogs")]
struct Cli {
    /// Directory holding config and timer state (defaults to the platform dirs)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    #[command(flatten)]
    Timer(TimerCommand),
}

#[derive(Subcommand)]
enum TimerCommand {
    /// Start a new timer on an issue
    Start {
        /// Issue key, e.g. ABC-123
        issue_key: String,
        /// Free-text description shown next to the timer
        #[arg(long, default_value = "")]
        summary: String,
    },
    /// Pause a running timer
    Pause { id: String },
    /// Resume a paused timer
    Resume { id: String },
    /// Drop a timer without logging its time
    Discard { id: String },
    /// Stop a timer and log its time to Jira
    Log { id: String },
    /// Override the elapsed seconds of a running timer
    SetElapsed {
        id: String,
        #[arg(allow_negative_numbers = true)]
        seconds: i64,
    },
    /// List active timers
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show logged and discarded timers, newest first
    History {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Compare your Jira worklogs in a date range with local records
    Worklogs {
        /// First day (YYYY-MM-DD), defaults to today
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last day (YYYY-MM-DD), defaults to --from
        #[arg(long)]
        to: Option<NaiveDate>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (token masked)
    Show,
    /// Set a config value
    Set {
        #[arg(value_parser = PossibleValuesParser::new(Config::KEYS.iter().copied()))]
        key: String,
        value: String,
    },
}

/// Jira client, or the reason one could not be built.
enum CliTracker {
    Jira(JiraClient),
    Unconfigured(String),
}

impl CliTracker {
    fn from_config(config: &Config) -> Self {
        match config.tracker_config() {
            Ok(tracker_config) => match JiraClient::new(tracker_config) {
                Ok(client) => CliTracker::Jira(client),
                Err(err) => CliTracker::Unconfigured(err.to_string()),
            },
            Err(err) => CliTracker::Unconfigured(err.to_string()),
        }
    }

    fn ensure_ready(&self) -> CliResult {
        match self {
            CliTracker::Jira(_) => Ok(()),
            CliTracker::Unconfigured(reason) => Err(reason.clone().into()),
        }
    }
}

impl WorklogTracker for CliTracker {
    async fn submit_worklog(
        &self,
        issue_key: &str,
        seconds: u64,
        started: DateTime<Utc>,
    ) -> jira_api::Result<String> {
        match self {
            CliTracker::Jira(client) => client.submit_worklog(issue_key, seconds, started).await,
            CliTracker::Unconfigured(reason) => Err(JiraError::InvalidInput(reason.clone())),
        }
    }

    async fn list_worklogs_for_user(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> jira_api::Result<Vec<UserWorklog>> {
        match self {
            CliTracker::Jira(client) => client.list_worklogs_for_user(start, end).await,
            CliTracker::Unconfigured(reason) => Err(JiraError::InvalidInput(reason.clone())),
        }
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    jira_timesheet::init_logging();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> CliResult {
    let configs = match cli.home {
        Some(dir) => ConfigManager::in_dir(dir),
        None => ConfigManager::new()?,
    };

    match cli.command {
        Commands::Config { action } => run_config(&configs, action),
        Commands::Timer(command) => run_timer(&configs, command).await,
    }
}

async fn run_timer(configs: &ConfigManager, command: TimerCommand) -> CliResult {
    let config = configs.load().with_env_overrides();
    let tracker = Arc::new(CliTracker::from_config(&config));
    let manager = TimerManager::with_min_worklog_seconds(
        TimerStore::open(configs.timers_path(&config))?,
        HistoryRecorder::open(configs.history_path(&config))?,
        Arc::clone(&tracker),
        Arc::new(SystemClock::new()),
        config.min_worklog_seconds,
    );

    match command {
        TimerCommand::Start { issue_key, summary } => {
            let id = manager.start_timer(&issue_key, &summary)?;
            println!("{id}");
        }
        TimerCommand::Pause { id } => {
            let id = resolve_id(&manager, &id)?;
            manager.pause_timer(id)?;
            print_timer(&manager, id)?;
        }
        TimerCommand::Resume { id } => {
            let id = resolve_id(&manager, &id)?;
            manager.resume_timer(id)?;
            print_timer(&manager, id)?;
        }
        TimerCommand::Discard { id } => {
            let id = resolve_id(&manager, &id)?;
            manager.discard_timer(id)?;
            println!("discarded {id}");
        }
        TimerCommand::Log { id } => {
            tracker.ensure_ready()?;
            let id = resolve_id(&manager, &id)?;
            let seconds = manager.stop_and_log(id).await?;
            println!("logged {} ({}s)", format_elapsed(seconds), seconds);
        }
        TimerCommand::SetElapsed { id, seconds } => {
            let id = resolve_id(&manager, &id)?;
            manager.set_elapsed(id, seconds)?;
            print_timer(&manager, id)?;
        }
        TimerCommand::List { json } => {
            let timers = manager.list_active_timers();
            if json {
                println!("{}", serde_json::to_string_pretty(&timers)?);
            } else if timers.is_empty() {
                println!("no active timers");
            } else {
                for timer in timers {
                    println!(
                        "{}  {:<12} {:<14} {:>8}  {}",
                        timer.id,
                        timer.issue_key,
                        timer.status,
                        format_elapsed(timer.elapsed_seconds),
                        timer.summary
                    );
                }
            }
        }
        TimerCommand::History { limit } => {
            let entries = manager.list_history();
            let limit = limit.unwrap_or(entries.len());
            for entry in entries.into_iter().take(limit) {
                let outcome = match &entry.outcome {
                    HistoryOutcome::Logged {
                        external_worklog_id,
                    } => format!("logged #{external_worklog_id}"),
                    HistoryOutcome::Discarded => "discarded".to_string(),
                };
                println!(
                    "{}  {:<12} {:>8}  {}",
                    entry.recorded_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                    entry.issue_key,
                    format_elapsed(entry.seconds),
                    outcome
                );
            }
        }
        TimerCommand::Worklogs { from, to } => {
            tracker.ensure_ready()?;
            let start = from.unwrap_or_else(|| Local::now().date_naive());
            let end = to.unwrap_or(start);
            let report = manager.reconcile(start, end).await?;
            for entry in &report.entries {
                let marker = match &entry.local {
                    Some(local) if local.seconds_logged != entry.remote.time_spent_seconds => "~",
                    Some(_) => "=",
                    None => " ",
                };
                println!(
                    "{} {}  {:<12} {:>8}  {}",
                    marker,
                    entry.remote.date,
                    entry.remote.issue_key,
                    format_elapsed(entry.remote.time_spent_seconds),
                    entry.remote.summary
                );
            }
            for record in &report.local_only {
                println!(
                    "! {}  {:<12} {:>8}  missing in Jira (worklog #{})",
                    record.started_at.date_naive(),
                    record.issue_key,
                    format_elapsed(record.seconds_logged),
                    record.external_worklog_id
                );
            }
            println!("total {}", format_elapsed(report.remote_seconds()));
        }
    }
    Ok(())
}

fn run_config(configs: &ConfigManager, action: ConfigAction) -> CliResult {
    match action {
        ConfigAction::Show => {
            let config = configs.load().with_env_overrides();
            println!("{}", serde_json::to_string_pretty(&config.redacted())?);
            println!("config file: {}", configs.path().display());
            println!("data dir: {}", configs.data_dir(&config).display());
        }
        ConfigAction::Set { key, value } => {
            let mut config = configs.load();
            config.set(&key, &value)?;
            configs.save(&config)?;
            println!("ok");
        }
    }
    Ok(())
}

/// Accepts a full timer id or a unique prefix of an active timer's id.
fn resolve_id<T: WorklogTracker + 'static>(manager: &TimerManager<T>, text: &str) -> CliResult<TimerId> {
    if let Ok(id) = text.parse::<TimerId>() {
        return Ok(id);
    }
    let prefix = text.trim().to_ascii_lowercase();
    if prefix.is_empty() {
        return Err("timer id must not be empty".into());
    }
    let matches: Vec<TimerId> = manager
        .list_active_timers()
        .into_iter()
        .map(|timer| timer.id)
        .filter(|id| id.to_string().starts_with(&prefix))
        .collect();
    match matches.as_slice() {
        [id] => Ok(*id),
        [] => Err(format!("no active timer matches {text}").into()),
        _ => Err(format!("{text} matches {} timers; use more characters", matches.len()).into()),
    }
}

fn print_timer<T: WorklogTracker + 'static>(manager: &TimerManager<T>, id: TimerId) -> CliResult {
    let timer = manager.get_timer(id)?;
    println!(
        "{}  {}  {}  {}",
        timer.id,
        timer.issue_key,
        timer.status,
        format_elapsed(timer.elapsed_seconds)
    );
    Ok(())
}
