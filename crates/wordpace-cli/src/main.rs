//! Wordpace CLI
//!
//! Command-line interface for viewing daily word counts and managing the license.

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tabled::{settings::Style, Table, Tabled};
use wordpace_core::{
    export::{ExportFormat, Exporter},
    history::{History, TimeRange},
    Clock, JsonSettingsStore, LicenseCodec, LocalClock, Settings, SettingsStore, Vault,
};

#[derive(Parser)]
#[command(name = "wordpace")]
#[command(about = "Daily word counts for your markdown vault")]
#[command(version)]
struct Cli {
    /// Vault directory
    #[arg(short, long, global = true, env = "WORDPACE_VAULT")]
    vault: Option<PathBuf>,

    /// Settings file (overrides the per-vault default)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show today's word count and per-file progress
    Today,

    /// Show words written per day
    History {
        /// Time range (today, week, month, year, 7d, 30d, 90d, all)
        #[arg(short, long, default_value = "30d")]
        range: String,
    },

    /// Show a summary for a time range
    Stats {
        /// Time range (today, week, month, year, 7d, 30d, 90d, all)
        #[arg(short, long, default_value = "month")]
        range: String,
    },

    /// Export the day history to CSV or JSON
    Export {
        /// Output format (csv or json)
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Output file or directory (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Time range (today, week, month, year, 7d, 30d, 90d, all)
        #[arg(short, long, default_value = "all")]
        range: String,
    },

    /// Manage the license (stop the daemon first, it rewrites the settings file)
    License {
        #[command(subcommand)]
        command: LicenseCommand,
    },

    /// Open the license page in the browser
    Open {
        #[arg(long, env = "WORDPACE_LICENSE_URL")]
        url: String,
    },

    /// Show daemon status
    Status,

    /// Start the daemon for the vault
    Start,

    /// Stop the daemon
    Stop,
}

#[derive(Subcommand)]
enum LicenseCommand {
    /// Decode and store a license
    Activate {
        license: String,

        #[arg(long, env = "WORDPACE_LICENSE_SECRET", hide_env_values = true)]
        secret: String,
    },

    /// Show the stored license state
    Show,

    /// Remove the stored license
    Clear,
}

#[derive(Tabled)]
struct StatRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct DayRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Words")]
    words: String,
}

#[derive(Tabled)]
struct FileRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Start")]
    initial: u64,
    #[tabled(rename = "Now")]
    current: u64,
    #[tabled(rename = "Written")]
    delta: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wordpace_core=warn".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let today = LocalClock.today();

    match cli.command {
        Commands::Today => {
            let settings = settings_store(&cli)?.load()?;
            show_today(&settings, today)
        }

        Commands::History { ref range } => {
            let settings = settings_store(&cli)?.load()?;
            let time_range = TimeRange::parse(range).unwrap_or(TimeRange::Last30Days);
            show_history(&settings, time_range, today)
        }

        Commands::Stats { ref range } => {
            let settings = settings_store(&cli)?.load()?;
            let time_range = TimeRange::parse(range).unwrap_or(TimeRange::ThisMonth);
            show_stats(&settings, time_range, range, today)
        }

        Commands::Export {
            ref format,
            ref output,
            ref range,
        } => {
            let settings = settings_store(&cli)?.load()?;
            let time_range = TimeRange::parse(range).unwrap_or(TimeRange::AllTime);
            let export_format = ExportFormat::parse(format).unwrap_or(ExportFormat::Json);
            let exporter = Exporter::new(&settings.day_counts, today);

            let writer: Box<dyn Write> = match output {
                Some(path) => Box::new(File::create(export_path(path, today, export_format))?),
                None => Box::new(io::stdout()),
            };

            exporter.export(writer, time_range, export_format)?;
            Ok(())
        }

        Commands::License { ref command } => {
            let store = settings_store(&cli)?;
            manage_license(&store, command, running_daemon().is_some())
        }

        Commands::Open { ref url } => {
            open::that(url).with_context(|| format!("opening {url}"))?;
            println!("{} {}", "Opened".green(), url);
            Ok(())
        }

        Commands::Status => show_daemon_status(),
        Commands::Start => start_daemon(&cli),
        Commands::Stop => stop_daemon(),
    }
}

fn settings_store(cli: &Cli) -> Result<JsonSettingsStore> {
    if let Some(path) = &cli.settings {
        return Ok(JsonSettingsStore::new(path));
    }

    let root = cli
        .vault
        .as_ref()
        .ok_or_else(|| anyhow!("pass --vault <DIR> or --settings <FILE>"))?;
    let vault = Vault::open(root)?;
    let store = JsonSettingsStore::for_vault(vault.name());
    tracing::debug!(vault = %vault.name(), path = %store.path().display(), "settings file");
    Ok(store)
}

/// A directory output gets a dated file name inside it
fn export_path(output: &Path, today: NaiveDate, format: ExportFormat) -> PathBuf {
    if output.is_dir() {
        output.join(format!("wordpace-{}.{}", today.format("%Y-%m-%d"), format.extension()))
    } else {
        output.to_path_buf()
    }
}

fn show_today(settings: &Settings, today: NaiveDate) -> Result<()> {
    let key = today.format("%Y-%m-%d").to_string();
    let Some(total) = settings.day_counts.get(&key) else {
        println!("\n{}", "Nothing written yet today.".yellow());
        return Ok(());
    };

    println!(
        "\n{}",
        format!("✍️  {} words today", History::format_words(*total))
            .bold()
            .cyan()
    );

    let mut rows: Vec<FileRow> = settings
        .todays_word_count
        .iter()
        .map(|(path, wc)| FileRow {
            file: path.clone(),
            initial: wc.initial,
            current: wc.current,
            delta: wc.delta(),
        })
        .collect();
    rows.sort_by(|a, b| b.delta.cmp(&a.delta));

    if !rows.is_empty() {
        let table = Table::new(rows).with(Style::rounded()).to_string();
        println!("{}", table);
    }

    let streak = History::new(&settings.day_counts).current_streak(today);
    if streak > 1 {
        println!("{}", format!("🔥 {} day streak", streak).bold());
    }

    Ok(())
}

fn show_history(settings: &Settings, range: TimeRange, today: NaiveDate) -> Result<()> {
    let days = History::new(&settings.day_counts).daily(range, today);

    if days.is_empty() {
        println!("\n{}", "No words recorded for this period.".yellow());
        return Ok(());
    }

    println!("\n{}", "📅 Daily Word Counts".bold().cyan());
    println!("{}", "─".repeat(30));

    let rows: Vec<DayRow> = days
        .into_iter()
        .rev()
        .map(|(date, words)| DayRow {
            date: date.format("%Y-%m-%d %a").to_string(),
            words: History::format_words(words),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);

    Ok(())
}

fn show_stats(settings: &Settings, range: TimeRange, label: &str, today: NaiveDate) -> Result<()> {
    let history = History::new(&settings.day_counts);
    let summary = history.summary(range, today);

    println!("\n{}", format!("📊 Statistics ({})", label).bold().cyan());
    println!("{}", "─".repeat(40));

    let rows = vec![
        StatRow {
            metric: "Words".to_string(),
            value: History::format_words(summary.total_words),
        },
        StatRow {
            metric: "Active Days".to_string(),
            value: summary.active_days.to_string(),
        },
        StatRow {
            metric: "Avg per Active Day".to_string(),
            value: summary
                .average_per_active_day
                .map(|avg| format!("{:.0}", avg))
                .unwrap_or_else(|| "-".to_string()),
        },
        StatRow {
            metric: "Best Day".to_string(),
            value: summary
                .best_day
                .map(|(date, words)| format!("{} ({})", date, History::format_words(words)))
                .unwrap_or_else(|| "-".to_string()),
        },
        StatRow {
            metric: "Current Streak".to_string(),
            value: format!("{} days", history.current_streak(today)),
        },
    ];

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);

    Ok(())
}

fn manage_license(
    store: &JsonSettingsStore,
    command: &LicenseCommand,
    daemon_running: bool,
) -> Result<()> {
    let writes = matches!(command, LicenseCommand::Activate { .. } | LicenseCommand::Clear);
    // The daemon saves its in-memory license state over the file every few seconds
    if writes && daemon_running {
        bail!(
            "the daemon is running and would overwrite this change; \
             run `wordpace stop` first"
        );
    }

    let mut settings = store.load()?;

    match command {
        LicenseCommand::Activate { license, secret } => {
            let decoded = LicenseCodec::new(secret.as_str())
                .decrypt(license)
                .map_err(|e| anyhow!("invalid license: {e}"))?;
            settings.user_id = Some(decoded.user_id.clone());
            settings.license_key = Some(license.trim().to_string());
            store.write(&settings)?;
            println!(
                "{} (user {})",
                "✓ License activated".green(),
                decoded.user_id
            );
        }

        LicenseCommand::Show => match &settings.user_id {
            Some(user_id) => println!("{} (user {})", "✓ Licensed".green(), user_id),
            None => println!("{}", "No license activated".yellow()),
        },

        LicenseCommand::Clear => {
            settings.user_id = None;
            settings.license_key = None;
            store.write(&settings)?;
            println!("{}", "License removed".green());
        }
    }

    Ok(())
}

const DAEMON: &str = "wordpace-daemon";

/// Process ids of running daemons, if any
#[cfg(unix)]
fn running_daemon() -> Option<String> {
    let out = Command::new("pgrep").args(["-f", DAEMON]).output().ok()?;
    let pids = String::from_utf8_lossy(&out.stdout)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(", ");
    (!pids.is_empty()).then_some(pids)
}

#[cfg(windows)]
fn running_daemon() -> Option<String> {
    let image = format!("{DAEMON}.exe");
    let filter = format!("IMAGENAME eq {image}");
    let out = Command::new("tasklist")
        .args(["/FI", filter.as_str()])
        .output()
        .ok()?;
    String::from_utf8_lossy(&out.stdout)
        .contains(&image)
        .then_some(image)
}

fn show_daemon_status() -> Result<()> {
    match running_daemon() {
        Some(pids) => println!("{} (PID: {})", "✓ Daemon is running".green(), pids),
        None => println!("{}", "✗ Daemon is not running".red()),
    }
    Ok(())
}

fn start_daemon(cli: &Cli) -> Result<()> {
    let vault = cli
        .vault
        .as_ref()
        .ok_or_else(|| anyhow!("pass --vault <DIR> to start the daemon"))?;

    if running_daemon().is_some() {
        println!("{}", "Daemon is already running".yellow());
        return Ok(());
    }

    let mut command = Command::new(DAEMON);
    command.arg("--vault").arg(vault);
    if let Some(settings) = &cli.settings {
        command.arg("--settings").arg(settings);
    }

    match command.spawn() {
        Ok(child) => println!("{} (PID: {})", "✓ Daemon started".green(), child.id()),
        Err(e) => println!("{}: {}", "✗ Failed to start daemon".red(), e),
    }

    Ok(())
}

fn stop_daemon() -> Result<()> {
    // SIGINT lets the daemon run its final save
    #[cfg(unix)]
    let result = Command::new("pkill").args(["-INT", "-f", DAEMON]).output();

    #[cfg(windows)]
    let result = Command::new("taskkill")
        .args(["/IM", format!("{DAEMON}.exe").as_str(), "/F"])
        .output();

    match result {
        Ok(out) if out.status.success() => println!("{}", "✓ Daemon stopped".green()),
        _ => println!("{}", "Daemon was not running".yellow()),
    }

    Ok(())
}
