//! Shadow tree driven directly by caller events
//!
//! Nothing here touches the disk: paths are virtual, fingerprints stay empty and
//! identities or metadata come from the caller's [`ExtraPayload`].

use crate::apply::{apply, NoRegistrar};
use crate::event::SemanticEvent;
use crate::restore::Restore;
use crate::Result;
use parking_lot::Mutex;
use shadow_core::{EventKind, ExtraPayload, Meta, Node, PathRef};
use shadow_journal::Transaction;
use tracing::debug;
use uuid::Uuid;

pub struct VirtualTree {
    base: PathRef,
    tree: Mutex<Node>,
    handler_lock: Mutex<()>,
}

impl VirtualTree {
    /// Create a tree whose root is named `root`
    ///
    /// The root takes its uuid and metadata from `extra` when given. Returns the tree and
    /// the root's `Create` transaction.
    pub fn new(root: &str, extra: Option<&ExtraPayload>) -> (Self, Transaction) {
        let uuid = extra.and_then(|e| e.uuid).unwrap_or_else(Uuid::new_v4);
        let meta = extra
            .and_then(|e| e.meta.clone())
            .unwrap_or_else(Meta::directory);
        let node = Node::new(root.trim_matches('/'), uuid, None, meta);
        let txn = Transaction::from_node(&node, EventKind::Create);
        debug!("Virtual tree {} created", node.name);

        (
            Self {
                base: PathRef::virtual_path("", true),
                tree: Mutex::new(node),
                handler_lock: Mutex::new(()),
            },
            txn,
        )
    }

    /// Apply one event; paths are `/`-joined and start with the root's name
    pub fn handler(
        &self,
        event: &SemanticEvent,
        extra: Option<&ExtraPayload>,
    ) -> Result<Transaction> {
        let _guard = self.handler_lock.lock();
        apply(&self.tree, &self.base, event, extra, &NoRegistrar)
    }

    pub fn create(
        &self,
        path: &str,
        is_dir: bool,
        extra: Option<&ExtraPayload>,
    ) -> Result<Transaction> {
        self.handler(
            &SemanticEvent::create(PathRef::virtual_path(path, is_dir)),
            extra,
        )
    }

    pub fn remove(&self, path: &str) -> Result<Transaction> {
        self.handler(&SemanticEvent::remove(PathRef::virtual_path(path, false)), None)
    }

    /// Replace the metadata of the node at `path` with `extra.meta`
    pub fn write(&self, path: &str, extra: Option<&ExtraPayload>) -> Result<Transaction> {
        self.handler(&SemanticEvent::write(PathRef::virtual_path(path, false)), extra)
    }

    pub fn rename(&self, from: &str, to: &str) -> Result<Transaction> {
        self.handler(
            &SemanticEvent::rename(
                PathRef::virtual_path(from, false),
                PathRef::virtual_path(to, false),
            ),
            None,
        )
    }

    /// Move the node at `from` into the directory `to_dir`
    pub fn move_to(&self, from: &str, to_dir: &str) -> Result<Transaction> {
        self.handler(
            &SemanticEvent::move_to(
                PathRef::virtual_path(from, false),
                PathRef::virtual_path(to_dir, true),
            ),
            None,
        )
    }

    pub fn search(&self, path: &str) -> Option<Node> {
        self.tree.lock().search(path).cloned()
    }

    pub fn search_by_uuid(&self, id: Uuid) -> Option<Node> {
        self.tree.lock().search_by_uuid(id).cloned()
    }

    /// Copy of the whole tree
    pub fn snapshot(&self) -> Node {
        self.tree.lock().clone()
    }
}

impl Restore for VirtualTree {
    fn restore(&self, tree: Node) {
        let _guard = self.handler_lock.lock();
        *self.tree.lock() = tree;
    }
}
