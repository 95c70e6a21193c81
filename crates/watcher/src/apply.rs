//! Applying semantic events to a shadow tree
//!
//! Both the filesystem watcher and the virtual tree funnel their events through
//! [`apply`]. Expensive work (walking a new directory, hashing a written file) runs
//! without holding the tree lock; the lock is only taken to check and to commit.

use crate::event::SemanticEvent;
use crate::{Result, WatchError};
use parking_lot::Mutex;
use shadow_core::node::{join, parent_path};
use shadow_core::{EventKind, ExtraPayload, Node, PathRef, TreeError};
use shadow_journal::Transaction;
use tracing::debug;

/// Hooks for keeping OS watch registrations in step with the tree
pub trait Registrar: Sync {
    /// A directory entered the tree
    fn register(&self, dir: &PathRef);
    /// A directory (and everything below it) left the tree
    fn unregister_tree(&self, dir: &PathRef);
    /// A directory moved from `from` to `to`
    fn migrate(&self, from: &PathRef, to: &PathRef);
}

/// Registrar for trees with nothing to watch
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRegistrar;

impl Registrar for NoRegistrar {
    fn register(&self, _dir: &PathRef) {}
    fn unregister_tree(&self, _dir: &PathRef) {}
    fn migrate(&self, _from: &PathRef, _to: &PathRef) {}
}

/// Apply one event to `tree`, whose root sits directly under `base`
///
/// On error the tree is left as it was.
pub fn apply(
    tree: &Mutex<Node>,
    base: &PathRef,
    event: &SemanticEvent,
    extra: Option<&ExtraPayload>,
    registrar: &dyn Registrar,
) -> Result<Transaction> {
    let path = event.from.relative_to(base)?;
    match event.kind {
        EventKind::Create => create(tree, &event.from, &path, extra, registrar),
        EventKind::Remove => remove(tree, &event.from, &path, registrar),
        EventKind::Write => write(tree, &event.from, &path, extra),
        EventKind::Rename => {
            let to = destination(event)?;
            rename(tree, base, &event.from, &path, to, registrar)
        }
        EventKind::Move => {
            let to = destination(event)?;
            move_into(tree, base, &event.from, &path, to, registrar)
        }
    }
}

fn destination(event: &SemanticEvent) -> Result<&PathRef> {
    event
        .to
        .as_ref()
        .ok_or_else(|| WatchError::Unrecognized(format!("{} without a destination", event)))
}

fn create(
    tree: &Mutex<Node>,
    source: &PathRef,
    path: &str,
    extra: Option<&ExtraPayload>,
    registrar: &dyn Registrar,
) -> Result<Transaction> {
    if !source.exists() {
        return Err(TreeError::NotFound(source.to_string()).into());
    }
    let site = tree.lock().locate(path, source)?;
    let discovered = |p: &PathRef| {
        if p.is_dir() {
            registrar.register(p);
        }
    };
    let staged = site.stage(source, extra, &discovered)?;

    let mut tree = tree.lock();
    let committed = tree.commit(staged)?;
    Ok(Transaction::from_node(committed, EventKind::Create))
}

fn remove(
    tree: &Mutex<Node>,
    source: &PathRef,
    path: &str,
    registrar: &dyn Registrar,
) -> Result<Transaction> {
    let node = tree.lock().remove(path)?;
    if node.meta.is_dir {
        registrar.unregister_tree(source);
    }
    Ok(Transaction::from_node(&node, EventKind::Remove))
}

fn write(
    tree: &Mutex<Node>,
    source: &PathRef,
    path: &str,
    extra: Option<&ExtraPayload>,
) -> Result<Transaction> {
    if tree.lock().search(path).is_none() {
        return Err(TreeError::NotFound(path.to_string()).into());
    }
    let measured = Node::measure(source)?;
    let mut tree = tree.lock();
    let node = tree.refresh(path, measured, extra.and_then(|e| e.meta.clone()))?;
    Ok(Transaction::from_node(node, EventKind::Write))
}

fn rename(
    tree: &Mutex<Node>,
    base: &PathRef,
    source: &PathRef,
    path: &str,
    to: &PathRef,
    registrar: &dyn Registrar,
) -> Result<Transaction> {
    let to_path = to.relative_to(base)?;
    let (txn, is_dir) = {
        let mut tree = tree.lock();
        if parent_path(path) == parent_path(&to_path) {
            let node = tree.rename(path, &to_path)?;
            (Transaction::from_node(node, EventKind::Rename), node.meta.is_dir)
        } else {
            // Renamed into another directory
            let node = tree.relocate(path, &to_path)?;
            (Transaction::from_node(node, EventKind::Move), node.meta.is_dir)
        }
    };
    if is_dir {
        registrar.migrate(source, to);
    }
    Ok(txn)
}

fn move_into(
    tree: &Mutex<Node>,
    base: &PathRef,
    source: &PathRef,
    path: &str,
    to_dir: &PathRef,
    registrar: &dyn Registrar,
) -> Result<Transaction> {
    let target = to_dir.relative_to(base)?;
    let (txn, is_dir, name) = {
        let mut tree = tree.lock();
        let node = tree.move_to(path, &target)?;
        (
            Transaction::from_node(node, EventKind::Move),
            node.meta.is_dir,
            node.name.clone(),
        )
    };
    if is_dir {
        debug!("Moved directory {} into {}", path, join(&target, &name));
        registrar.migrate(source, &to_dir.join(&name, true));
    }
    Ok(txn)
}
