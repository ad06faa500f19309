//! Wordpace Daemon
//!
//! Background service that watches a vault for markdown changes and keeps the
//! daily word count. All tracker state is owned by the main task; the file
//! watcher, the timers and the telemetry dispatcher only send it messages.

use anyhow::{Context, Result};
use clap::Parser;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use wordpace_core::debounce::debounce;
use wordpace_core::{
    Clock, JsonSettingsStore, LicenseCodec, LocalClock, Rollover, SaveOutcome, SettingsStore,
    TelemetryDispatcher, Tracker, TrackerConfig, Vault, WebhookSink,
};

#[derive(Parser)]
#[command(name = "wordpace-daemon")]
#[command(about = "Track daily word counts for a markdown vault")]
#[command(version)]
struct Args {
    /// Vault directory to watch
    #[arg(short, long, env = "WORDPACE_VAULT")]
    vault: PathBuf,

    /// Settings file (defaults to the per-vault file in the data directory)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Webhook that receives telemetry; telemetry is off without it
    #[arg(long, env = "WORDPACE_WEBHOOK_URL")]
    webhook_url: Option<String>,

    /// Secret licenses are encrypted with
    #[arg(long, env = "WORDPACE_LICENSE_SECRET", hide_env_values = true)]
    license_secret: Option<String>,

    /// License to activate on startup
    #[arg(long)]
    license: Option<String>,

    /// Seconds between day rollover checks
    #[arg(long)]
    rollover_secs: Option<u64>,

    /// Seconds between settings saves
    #[arg(long)]
    save_secs: Option<u64>,

    /// Quiet period in milliseconds before an edit is counted
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Quiet period in seconds before telemetry is posted
    #[arg(long)]
    telemetry_debounce_secs: Option<u64>,
}

impl Args {
    fn config(&self) -> TrackerConfig {
        let defaults = TrackerConfig::default();
        TrackerConfig {
            rollover_interval: self
                .rollover_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.rollover_interval),
            save_interval: self
                .save_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.save_interval),
            edit_debounce: self
                .debounce_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.edit_debounce),
            telemetry_debounce: self
                .telemetry_debounce_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.telemetry_debounce),
            webhook_url: self.webhook_url.clone(),
            license_secret: self.license_secret.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wordpace_core=info".parse()?)
                .add_directive("wordpace_daemon=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = args.config();

    info!("wordpace daemon starting...");

    let vault = Vault::open(&args.vault)
        .with_context(|| format!("opening vault {}", args.vault.display()))?;
    let store = match &args.settings {
        Some(path) => JsonSettingsStore::new(path),
        None => JsonSettingsStore::for_vault(vault.name()),
    };
    info!(vault = %vault.root().display(), settings = %store.path().display(), "vault opened");

    let mut tracker = Tracker::load(store, LocalClock, vault.name())?;
    info!(vault = %tracker.vault_name(), status = %tracker.status_text(), "tracker loaded");

    if let Some(license) = &args.license {
        activate_license(&mut tracker, &config, license);
    }

    let telemetry = match config.webhook_url.as_deref() {
        Some(url) if config.telemetry_enabled() => {
            let sink = WebhookSink::new(url)?;
            Some(TelemetryDispatcher::spawn(
                Arc::new(sink),
                config.telemetry_debounce,
            ))
        }
        _ => {
            info!("no webhook configured, telemetry disabled");
            None
        }
    };

    if let Some(dispatcher) = &telemetry {
        send_plugins(&tracker, &vault, dispatcher);
    }

    // Bridge the watcher thread into the runtime
    let (fs_tx, mut fs_rx) = mpsc::channel(256);
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                let _ = fs_tx.blocking_send(event);
            }
            Err(e) => error!("watch error: {}", e),
        },
        notify::Config::default(),
    )
    .context("creating file watcher")?;
    watcher
        .watch(vault.root(), RecursiveMode::Recursive)
        .with_context(|| format!("watching {}", vault.root().display()))?;

    // One global slot: a burst of edits is counted once, with the last file touched
    let (edits, mut settled) = debounce::<(), PathBuf>(config.edit_debounce);

    let mut rollover = tokio::time::interval(config.rollover_interval);
    let mut save = tokio::time::interval(config.save_interval);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(status = %tracker.status_text(), "watching for changes (press Ctrl+C to stop)");

    loop {
        tokio::select! {
            Some(event) = fs_rx.recv() => {
                for path in tracked_paths(event, &vault) {
                    edits.push((), path);
                }
            }
            Some(((), path)) = settled.next() => {
                on_file_changed(&mut tracker, &vault, &path, telemetry.as_ref()).await;
            }
            _ = rollover.tick() => {
                let (rolled, saved) = tracker.tick();
                if let Rollover::Rolled { from, to } = rolled {
                    info!(from = %from, to = %to, status = %tracker.status_text(), "new day");
                }
                if let Err(e) = saved {
                    error!("Failed to save settings: {}", e);
                }
            }
            _ = save.tick() => {
                if let Err(e) = tracker.save() {
                    error!("Failed to save settings: {}", e);
                }
            }
            _ = &mut shutdown => {
                info!("shutdown requested");
                break;
            }
        }
    }

    // Flush remaining data on exit
    drop(watcher);
    match tracker.save() {
        Ok(SaveOutcome::Saved) => info!("settings saved"),
        Ok(SaveOutcome::SkippedEmpty) => info!("nothing recorded, settings left untouched"),
        Err(e) => error!("Failed to save settings: {}", e),
    }
    if let Some(dispatcher) = telemetry {
        dispatcher.shutdown().await;
    }

    info!("wordpace daemon stopped");
    Ok(())
}

fn activate_license<S: SettingsStore, C: Clock>(
    tracker: &mut Tracker<S, C>,
    config: &TrackerConfig,
    license: &str,
) {
    let Some(secret) = config.license_secret.as_deref() else {
        warn!("a license was given but no license secret is configured, ignoring it");
        return;
    };

    match tracker.activate_license(&LicenseCodec::new(secret), license) {
        Ok(decoded) => {
            info!(user_id = %decoded.user_id, "license accepted");
            if let Err(e) = tracker.save() {
                error!("Failed to save settings: {}", e);
            }
        }
        // Counting keeps working locally; only telemetry stays off
        Err(e) => warn!("Invalid license: {}", e),
    }
}

fn send_plugins<S: SettingsStore, C: Clock>(
    tracker: &Tracker<S, C>,
    vault: &Vault,
    dispatcher: &TelemetryDispatcher,
) {
    match vault.enabled_plugins() {
        Ok(plugins) => {
            if let Some(payload) = tracker.plugins_payload(&plugins) {
                dispatcher.send(payload);
            }
        }
        Err(e) => warn!("Failed to read plugin list: {}", e),
    }
}

/// Tracked markdown files touched by a create or modify event
fn tracked_paths(event: notify::Event, vault: &Vault) -> Vec<PathBuf> {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return Vec::new();
    }
    event
        .paths
        .into_iter()
        .filter(|path| vault.is_tracked(path))
        .collect()
}

async fn on_file_changed<S: SettingsStore, C: Clock>(
    tracker: &mut Tracker<S, C>,
    vault: &Vault,
    path: &Path,
    telemetry: Option<&TelemetryDispatcher>,
) {
    let Some(rel) = vault.relative_path(path) else {
        return;
    };

    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %rel, "file vanished before it was read");
            return;
        }
        Err(e) => {
            warn!(path = %rel, "Failed to read file: {}", e);
            return;
        }
    };

    let update = tracker.on_document_changed(&rel, &text);
    info!(path = %rel, total = update.total, "{}", tracker.status_text());

    if let (Some(dispatcher), Some(payload)) = (telemetry, update.telemetry) {
        dispatcher.send(payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, ModifyKind, RemoveKind};
    use std::fs;
    use wordpace_core::settings::MemorySettingsStore;
    use wordpace_core::WordCount;

    fn vault_with_note(text: &str) -> (tempfile::TempDir, Vault, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("notes")).unwrap();
        let vault = Vault::open(dir.path()).unwrap();
        let note = vault.root().join("notes").join("draft.md");
        fs::write(&note, text).unwrap();
        (dir, vault, note)
    }

    fn tracker() -> Tracker<MemorySettingsStore, LocalClock> {
        Tracker::load(MemorySettingsStore::default(), LocalClock, "vault").unwrap()
    }

    fn modified(paths: &[PathBuf]) -> notify::Event {
        paths.iter().fold(
            notify::Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            |event, path| event.add_path(path.clone()),
        )
    }

    #[test]
    fn test_config_defaults() {
        let args = Args::parse_from(["wordpace-daemon", "--vault", "/tmp/notes"]);
        let config = args.config();
        assert_eq!(config.rollover_interval, Duration::from_secs(5));
        assert_eq!(config.edit_debounce, Duration::from_secs(1));
    }

    #[test]
    fn test_config_overrides() {
        let args = Args::parse_from([
            "wordpace-daemon",
            "--vault",
            "/tmp/notes",
            "--save-secs",
            "10",
            "--debounce-ms",
            "250",
            "--webhook-url",
            "https://hooks.example.com/wp",
        ]);
        let config = args.config();
        assert_eq!(config.save_interval, Duration::from_secs(10));
        assert_eq!(config.edit_debounce, Duration::from_millis(250));
        assert!(config.telemetry_enabled());
    }

    #[tokio::test]
    async fn test_modified_note_updates_snapshot() {
        let (_dir, vault, note) = vault_with_note("one two");
        let mut tracker = tracker();

        on_file_changed(&mut tracker, &vault, &note, None).await;
        fs::write(&note, "one two three four five").unwrap();
        on_file_changed(&mut tracker, &vault, &note, None).await;

        let snapshots = tracker.aggregator().todays_word_count();
        assert_eq!(
            snapshots.get("notes/draft.md"),
            Some(&WordCount {
                initial: 2,
                current: 5,
            })
        );
        assert_eq!(tracker.current_word_count(), 3);
    }

    #[tokio::test]
    async fn test_deleted_note_is_ignored() {
        let (_dir, vault, note) = vault_with_note("one two three");
        let mut tracker = tracker();

        on_file_changed(&mut tracker, &vault, &note, None).await;
        let before = tracker.aggregator().todays_word_count().clone();

        fs::remove_file(&note).unwrap();
        on_file_changed(&mut tracker, &vault, &note, None).await;

        assert_eq!(tracker.aggregator().todays_word_count(), &before);
        assert_eq!(before["notes/draft.md"], WordCount::baseline(3));
    }

    #[test]
    fn test_only_tracked_notes_pass_the_filter() {
        let (_dir, vault, note) = vault_with_note("text");
        let config_note = vault.root().join(".obsidian").join("workspace.md");
        let attachment = vault.root().join("notes").join("image.png");

        let event = modified(&[config_note, attachment, note.clone()]);
        assert_eq!(tracked_paths(event, &vault), vec![note.clone()]);

        let created =
            notify::Event::new(EventKind::Create(CreateKind::File)).add_path(note.clone());
        assert_eq!(tracked_paths(created, &vault), vec![note.clone()]);

        let removed = notify::Event::new(EventKind::Remove(RemoveKind::File)).add_path(note);
        assert!(tracked_paths(removed, &vault).is_empty());
    }
}
