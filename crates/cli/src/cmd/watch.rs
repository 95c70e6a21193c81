//! Watch a directory and stream its transactions

use crate::util;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use shadow_core::EventKind;
use shadow_journal::{Journal, Transaction};
use shadow_watcher::{WatchError, Watcher, WatcherConfig};
use std::collections::HashSet;
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

enum Update {
    Applied(Transaction),
    Failed(WatchError),
}

pub async fn run(dir: &Path, journal_dir: Option<&Path>, config: Option<&Path>) -> Result<()> {
    let config = match config {
        Some(path) => WatcherConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => WatcherConfig::default(),
    };

    let (watcher, initial) = Watcher::new(dir, config)
        .with_context(|| format!("Failed to watch {}", dir.display()))?;

    let mut recorder = match journal_dir {
        Some(path) => Some(Recorder::open(path, &watcher)?),
        None => None,
    };

    let snapshot = watcher.snapshot();
    println!(
        "Watching {} ({} nodes)",
        watcher.root().display().to_string().cyan(),
        snapshot.node_count()
    );
    println!("{}", "Press Ctrl-C to stop".dimmed());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let events = watcher.events();
    let errors = watcher.errors();
    let forwarder = tokio::task::spawn_blocking(move || loop {
        let update = crossbeam_channel::select! {
            recv(events) -> msg => msg.map(Update::Applied),
            recv(errors) -> msg => msg.map(Update::Failed),
        };
        // Disconnected once the watcher stops
        let Ok(update) = update else { break };
        if tx.send(update).is_err() {
            break;
        }
    });

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut seen_initial = false;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Interrupted");
                break;
            }
            update = rx.recv() => match update {
                Some(Update::Applied(txn)) => {
                    // The initial import is already in the journal
                    if !seen_initial && txn == initial {
                        seen_initial = true;
                        continue;
                    }
                    println!("{}", util::describe(&txn));
                    if let Some(recorder) = recorder.as_mut() {
                        recorder.record(&watcher, &txn)?;
                    }
                }
                Some(Update::Failed(e)) => {
                    warn!("{}", e);
                    eprintln!("{} {}", "error:".red(), e);
                }
                None => break,
            },
        }
    }

    watcher.stop();
    if let Err(e) = forwarder.await {
        warn!("Event forwarder failed: {}", e);
    }
    if let Some(recorder) = &recorder {
        println!("Journal holds {} transactions", recorder.journal.count());
    }
    Ok(())
}

/// Journal writer that keeps replay free of duplicate creates
struct Recorder {
    journal: Journal,
    recorded: HashSet<Uuid>,
}

impl Recorder {
    /// Open `path`, drop its previous contents and record the current tree
    fn open(path: &Path, watcher: &Watcher) -> Result<Self> {
        let journal = Journal::open(path)
            .with_context(|| format!("Failed to open journal at {}", path.display()))?;
        let mut recorder = Self {
            journal,
            recorded: HashSet::new(),
        };
        recorder.reseed(watcher)?;
        Ok(recorder)
    }

    fn reseed(&mut self, watcher: &Watcher) -> Result<()> {
        let snapshot = Transaction::snapshot(&watcher.snapshot());
        self.journal.clear()?;
        self.journal.append_all(&snapshot)?;
        self.recorded = snapshot.iter().map(|t| t.uuid).collect();
        Ok(())
    }

    /// Append `txn`, expanding directory imports so replay sees every node
    fn record(&mut self, watcher: &Watcher, txn: &Transaction) -> Result<()> {
        if txn.kind != EventKind::Create {
            self.journal.append(txn)?;
            return Ok(());
        }
        if txn.is_root() {
            // Bulk import into the root
            return self.reseed(watcher);
        }

        let created = match watcher.search_by_uuid(txn.uuid) {
            Some(node) if txn.meta.is_dir => Transaction::snapshot(&node),
            _ => vec![txn.clone()],
        };
        let fresh: Vec<Transaction> = created
            .into_iter()
            .filter(|t| self.recorded.insert(t.uuid))
            .collect();
        self.journal.append_all(&fresh)?;
        Ok(())
    }
}
