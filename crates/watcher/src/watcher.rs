//! Filesystem-backed shadow tree
//!
//! A `Watcher` imports a directory, registers every directory below it with the OS and
//! runs two tasks on the current tokio runtime:
//!
//! - the watch loop, which queues raw notifications on the coalescer, tagging each with
//!   the fingerprint its parent node had at the time
//! - the drain loop, which every tick turns the queue into semantic events, applies them
//!   and publishes the resulting transactions (or errors)
//!
//! Renaming or moving a watched directory rebuilds the registration set on a fresh
//! notification source; the watch loop is told to switch over.

use crate::apply::{apply, Registrar};
use crate::coalesce::Coalescer;
use crate::config::WatcherConfig;
use crate::event::{RawEvent, SemanticEvent};
use crate::registry::{RawReceiver, WatchSet};
use crate::restore::Restore;
use crate::{Result, WatchError};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use shadow_core::node::parent_path;
use shadow_core::{ExtraPayload, Node, PathRef};
use shadow_journal::Transaction;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{watch, Notify};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct Watcher {
    inner: Arc<Inner>,
    events: Receiver<Transaction>,
    errors: Receiver<WatchError>,
    stop_tx: watch::Sender<bool>,
}

struct Inner {
    root: PathBuf,
    /// Parent of the root; tree paths are relative to it
    base: PathRef,
    tree: Mutex<Node>,
    coalescer: Coalescer,
    registry: Mutex<WatchSet>,
    /// Serializes event application
    handler_lock: Mutex<()>,
    events_tx: Mutex<Option<Sender<Transaction>>>,
    errors_tx: Mutex<Option<Sender<WatchError>>>,
    /// Source produced by the last registry rebuild, waiting for the watch loop
    next_source: Mutex<Option<RawReceiver>>,
    source_swapped: Notify,
    stopped: AtomicBool,
}

impl Watcher {
    /// Start watching the directory at `root`
    ///
    /// Must be called from within a tokio runtime. Returns the watcher and the root's
    /// `Create` transaction, which is also the first item on [`Watcher::events`].
    pub fn new(root: impl AsRef<Path>, config: WatcherConfig) -> Result<(Self, Transaction)> {
        let runtime = Handle::try_current().map_err(|_| WatchError::NoRuntime)?;
        let requested = root.as_ref();
        let root = std::fs::canonicalize(requested)
            .ok()
            .filter(|p| p.is_dir())
            .ok_or_else(|| WatchError::RootNotDirectory(requested.to_path_buf()))?;
        let source = PathRef::fs(&root);
        let base = source
            .parent()
            .ok_or_else(|| WatchError::RootNotDirectory(root.clone()))?;

        let (mut registry, raw_rx) = WatchSet::new()?;
        registry.add(&root)?;

        let capacity = config.event_buffer.max(1);
        let (events_tx, events) = crossbeam_channel::bounded(capacity);
        let (errors_tx, errors) = crossbeam_channel::bounded(capacity);

        let inner = Arc::new(Inner {
            root: root.clone(),
            base,
            tree: Mutex::new(Node::root(source.name())),
            coalescer: Coalescer::new(config.platform),
            registry: Mutex::new(registry),
            handler_lock: Mutex::new(()),
            events_tx: Mutex::new(Some(events_tx)),
            errors_tx: Mutex::new(Some(errors_tx)),
            next_source: Mutex::new(None),
            source_swapped: Notify::new(),
            stopped: AtomicBool::new(false),
        });

        // The root's parent isn't in the tree, so this imports the contents into the root
        let initial = inner.handle(&SemanticEvent::create(source), None)?;
        inner.emit(initial.clone());

        let (stop_tx, stop_rx) = watch::channel(false);
        runtime.spawn(watch_loop(Arc::clone(&inner), raw_rx, stop_rx.clone()));
        runtime.spawn(drain_loop(Arc::clone(&inner), config.tick(), stop_rx));

        info!(
            "Watching {} ({} nodes, {} directories, {:?} recognizers)",
            root.display(),
            inner.tree.lock().node_count(),
            inner.registry.lock().len(),
            inner.coalescer.platform()
        );

        Ok((
            Self {
                inner,
                events,
                errors,
                stop_tx,
            },
            initial,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Apply one semantic event directly
    ///
    /// The transaction is returned to the caller, not published on `events`.
    pub fn handler(
        &self,
        event: &SemanticEvent,
        extra: Option<&ExtraPayload>,
    ) -> Result<Transaction> {
        self.inner.handle(event, extra)
    }

    /// Stream of transactions applied by the drain loop
    pub fn events(&self) -> Receiver<Transaction> {
        self.events.clone()
    }

    /// Stream of errors raised while watching
    pub fn errors(&self) -> Receiver<WatchError> {
        self.errors.clone()
    }

    /// Stop both loops and drop every registration (idempotent)
    ///
    /// Both streams disconnect once drained.
    pub fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.stop_tx.send(true);
        self.inner.events_tx.lock().take();
        self.inner.errors_tx.lock().take();
        self.inner.registry.lock().clear();
        info!("Stopped watching {}", self.inner.root.display());
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    pub fn search(&self, path: &str) -> Option<Node> {
        self.inner.tree.lock().search(path).cloned()
    }

    pub fn search_by_uuid(&self, id: Uuid) -> Option<Node> {
        self.inner.tree.lock().search_by_uuid(id).cloned()
    }

    /// Directories currently registered with the OS
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.inner.registry.lock().paths()
    }

    /// Copy of the whole tree
    pub fn snapshot(&self) -> Node {
        self.inner.tree.lock().clone()
    }
}

impl Restore for Watcher {
    fn restore(&self, tree: Node) {
        let _guard = self.inner.handler_lock.lock();
        *self.inner.tree.lock() = tree;
        debug!("Tree restored for {}", self.inner.root.display());
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    fn handle(&self, event: &SemanticEvent, extra: Option<&ExtraPayload>) -> Result<Transaction> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(WatchError::Stopped);
        }
        let _guard = self.handler_lock.lock();
        apply(&self.tree, &self.base, event, extra, self)
    }

    /// Queue a notification, tagged with the current fingerprint of its parent node
    fn enqueue(&self, event: &notify::Event) {
        for raw in RawEvent::from_notify(event) {
            let parent_fingerprint = PathRef::fs(&raw.path)
                .relative_to(&self.base)
                .ok()
                .and_then(|path| {
                    let tree = self.tree.lock();
                    tree.search(&parent_path(&path))
                        .and_then(|parent| parent.meta.fingerprint)
                });
            let seq = self.coalescer.append(raw, parent_fingerprint);
            debug!("Queued raw event #{}", seq);
        }
    }

    /// Process the queue and apply what was recognized
    fn drain(&self) {
        for event in self.coalescer.process() {
            match self.handle(&event, None) {
                Ok(txn) => self.emit(txn),
                Err(WatchError::Stopped) => return,
                Err(e) => {
                    warn!("Failed to apply {}: {}", event, e);
                    self.report(e);
                }
            }
        }
    }

    fn emit(&self, txn: Transaction) {
        if let Some(tx) = self.events_tx.lock().as_ref() {
            if let Err(TrySendError::Full(txn)) = tx.try_send(txn) {
                warn!("Event stream full, dropping {} of {}", txn.kind, txn.name);
            }
        }
    }

    fn report(&self, err: WatchError) {
        if let Some(tx) = self.errors_tx.lock().as_ref() {
            if let Err(TrySendError::Full(err)) = tx.try_send(err) {
                warn!("Error stream full, dropping: {}", err);
            }
        }
    }
}

impl Registrar for Inner {
    fn register(&self, dir: &PathRef) {
        let Some(path) = dir.as_fs_path() else {
            return;
        };
        let added = self.registry.lock().add(path);
        if let Err(e) = added {
            warn!("Failed to watch {}: {}", path.display(), e);
            self.report(e);
        }
    }

    fn unregister_tree(&self, dir: &PathRef) {
        if let Some(path) = dir.as_fs_path() {
            self.registry.lock().remove_tree(path);
        }
    }

    fn migrate(&self, from: &PathRef, to: &PathRef) {
        let (Some(from), Some(to)) = (from.as_fs_path(), to.as_fs_path()) else {
            return;
        };
        let mut registry = self.registry.lock();
        match registry.rebuild(from, to) {
            Ok((next, rx)) => {
                *self.next_source.lock() = Some(rx);
                let old = std::mem::replace(&mut *registry, next);
                drop(registry);
                drop(old);
                self.source_swapped.notify_one();
                info!("Watch set migrated {} -> {}", from.display(), to.display());
            }
            Err(e) => {
                drop(registry);
                warn!("Failed to rebuild watch set for {}: {}", to.display(), e);
                self.report(e);
            }
        }
    }
}

async fn watch_loop(inner: Arc<Inner>, mut source: RawReceiver, mut stop: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = stop.changed() => break,
            _ = inner.source_swapped.notified() => {
                let next = inner.next_source.lock().take();
                if let Some(next) = next {
                    debug!("Watch loop switched to rebuilt source");
                    source = next;
                }
            }
            received = source.recv() => match received {
                Some(Ok(event)) => inner.enqueue(&event),
                Some(Err(e)) => {
                    warn!("Notification error: {}", e);
                    inner.report(WatchError::Source(e));
                }
                None => {
                    // The old source closed before the swap notification arrived
                    let next = inner.next_source.lock().take();
                    match next {
                        Some(next) => source = next,
                        None => break,
                    }
                }
            },
        }
    }
    debug!("Watch loop exited for {}", inner.root.display());
}

async fn drain_loop(inner: Arc<Inner>, tick: Duration, mut stop: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = stop.changed() => break,
            _ = ticker.tick() => {
                if inner.coalescer.is_empty() {
                    continue;
                }
                let worker = Arc::clone(&inner);
                if let Err(e) = tokio::task::spawn_blocking(move || worker.drain()).await {
                    warn!("Drain task failed: {}", e);
                }
            }
        }
    }
    debug!("Drain loop exited for {}", inner.root.display());
}
