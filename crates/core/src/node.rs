//! The shadow tree
//!
//! A `Node` owns its children outright, so the tree is a strict hierarchy with no back
//! references. Paths handed to the tree are `/`-joined segments whose first segment is the
//! root's own name (`root/sub/file.txt`); leading and trailing separators are ignored.
//!
//! Lookups descend one segment at a time. Wide levels are probed on the rayon pool and the
//! first match in child order wins, so results are deterministic.
//!
//! Operations that touch the disk (`import`, `measure`, `Site::stage`) are kept apart from
//! the structural edits (`attach`, `adopt`, `commit`, `refresh`) so a caller holding a lock
//! around the tree can do its I/O first and lock only for the edit. `create` and `update`
//! chain the two halves for callers without a lock.

use crate::error::{Result, TreeError};
use crate::hash::{fingerprint, Blake3Hash};
use crate::path::{PathRef, Stat};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};
use uuid::Uuid;

/// Levels narrower than this are searched sequentially
const PARALLEL_FANOUT: usize = 16;

/// Callback invoked for every location imported from disk
pub type OnDiscovered<'a> = &'a (dyn Fn(&PathRef) + Sync);

/// Node metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub is_dir: bool,
    /// Content digest; `None` for virtual nodes
    pub fingerprint: Option<Blake3Hash>,
    pub size: u64,
    /// Unix seconds
    pub created_at: i64,
    pub permission: String,
}

impl Meta {
    /// Metadata for a bare directory node
    pub fn directory() -> Self {
        Self {
            is_dir: true,
            ..Self::default()
        }
    }

    pub fn from_stat(stat: &Stat, fingerprint: Option<Blake3Hash>) -> Self {
        Self {
            is_dir: stat.is_dir,
            fingerprint,
            size: stat.size,
            created_at: stat.modified,
            permission: stat.permission.clone(),
        }
    }

    /// `created_at` as a `SystemTime`
    pub fn created_time(&self) -> SystemTime {
        let offset = Duration::from_secs(self.created_at.unsigned_abs());
        if self.created_at >= 0 {
            UNIX_EPOCH + offset
        } else {
            UNIX_EPOCH - offset
        }
    }

    /// `created_at` in Unix milliseconds
    pub fn created_at_millis(&self) -> i64 {
        self.created_at.saturating_mul(1000)
    }
}

/// Caller-supplied identity and metadata for a created node
///
/// The virtual tree uses this to keep UUIDs chosen outside the process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraPayload {
    pub uuid: Option<Uuid>,
    pub meta: Option<Meta>,
}

impl ExtraPayload {
    pub fn with_uuid(uuid: Uuid) -> Self {
        Self {
            uuid: Some(uuid),
            meta: None,
        }
    }
}

/// Where a created node will be committed, as decided by [`Node::locate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Site {
    /// Under the existing node at `parent`
    Child { parent: String, name: String },
    /// The parent isn't known; the contents go straight into the root with this uuid
    Root(Uuid),
}

/// Nodes built off-tree by [`Site::stage`], waiting for [`Node::commit`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staged {
    Child { parent: String, node: Node },
    Adopted(Vec<Node>),
}

impl Site {
    /// Build what gets committed at this site from `source`
    ///
    /// This is the half of a create that reads the disk; it doesn't need the tree.
    pub fn stage(
        self,
        source: &PathRef,
        extra: Option<&ExtraPayload>,
        on_discovered: OnDiscovered<'_>,
    ) -> Result<Staged> {
        match self {
            Site::Child { parent, name } => {
                let mut node = Node::import(source, extra, on_discovered)?;
                node.name = name;
                Ok(Staged::Child { parent, node })
            }
            Site::Root(uuid) => {
                on_discovered(source);
                let nodes = Node::import_children(source, uuid, on_discovered)?;
                Ok(Staged::Adopted(nodes))
            }
        }
    }
}

/// Size and fingerprint of a source as last read from disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measured {
    pub size: u64,
    pub fingerprint: Option<Blake3Hash>,
}

/// One entry of the shadow tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub uuid: Uuid,
    /// `None` only for the root
    pub parent_uuid: Option<Uuid>,
    pub children: Vec<Node>,
    pub meta: Meta,
}

impl Node {
    /// Create a detached node
    pub fn new(name: impl Into<String>, uuid: Uuid, parent_uuid: Option<Uuid>, meta: Meta) -> Self {
        Self {
            name: name.into(),
            uuid,
            parent_uuid,
            children: Vec::new(),
            meta,
        }
    }

    /// Create a root directory node with a fresh UUID
    pub fn root(name: impl Into<String>) -> Self {
        Self::new(name, Uuid::new_v4(), None, Meta::directory())
    }

    pub fn is_root(&self) -> bool {
        self.parent_uuid.is_none()
    }

    /// Direct child by name
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Number of nodes in this subtree, including `self`
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Node::node_count).sum::<usize>()
    }

    /// Look a node up by tree path
    pub fn search(&self, path: &str) -> Option<&Node> {
        self.find(&segments(path))
    }

    /// Mutable variant of [`Node::search`]
    pub fn search_mut(&mut self, path: &str) -> Option<&mut Node> {
        self.find_mut(&segments(path))
    }

    fn find(&self, segments: &[&str]) -> Option<&Node> {
        let (head, rest) = segments.split_first()?;
        if self.name != *head {
            return None;
        }
        if rest.is_empty() {
            return Some(self);
        }
        if self.children.len() < PARALLEL_FANOUT {
            self.children.iter().find_map(|child| child.find(rest))
        } else {
            self.children.par_iter().find_map_first(|child| child.find(rest))
        }
    }

    fn find_mut(&mut self, segments: &[&str]) -> Option<&mut Node> {
        let (head, rest) = segments.split_first()?;
        if self.name != *head {
            return None;
        }
        if rest.is_empty() {
            return Some(self);
        }
        if self.children.len() < PARALLEL_FANOUT {
            self.children.iter_mut().find_map(|child| child.find_mut(rest))
        } else {
            self.children
                .par_iter_mut()
                .find_map_first(|child| child.find_mut(rest))
        }
    }

    /// Look a node up by UUID anywhere in this subtree
    pub fn search_by_uuid(&self, id: Uuid) -> Option<&Node> {
        if self.uuid == id {
            return Some(self);
        }
        if self.children.len() < PARALLEL_FANOUT {
            self.children.iter().find_map(|child| child.search_by_uuid(id))
        } else {
            self.children
                .par_iter()
                .find_map_first(|child| child.search_by_uuid(id))
        }
    }

    /// Mutable variant of [`Node::search_by_uuid`]
    pub fn search_by_uuid_mut(&mut self, id: Uuid) -> Option<&mut Node> {
        if self.uuid == id {
            return Some(self);
        }
        if self.children.len() < PARALLEL_FANOUT {
            self.children
                .iter_mut()
                .find_map(|child| child.search_by_uuid_mut(id))
        } else {
            self.children
                .par_iter_mut()
                .find_map_first(|child| child.search_by_uuid_mut(id))
        }
    }

    /// Tree path of the node with the given UUID
    pub fn path_of(&self, id: Uuid) -> Option<String> {
        if self.uuid == id {
            return Some(self.name.clone());
        }
        self.children
            .iter()
            .find_map(|child| child.path_of(id))
            .map(|rest| format!("{}/{}", self.name, rest))
    }

    /// Build a detached node (and, for real directories, its subtree) from `source`
    ///
    /// Fingerprints every imported file and directory; virtual sources are not touched.
    /// `on_discovered` is called for `source` and every descendant.
    pub fn import(
        source: &PathRef,
        extra: Option<&ExtraPayload>,
        on_discovered: OnDiscovered<'_>,
    ) -> Result<Node> {
        let uuid = extra.and_then(|e| e.uuid).unwrap_or_else(Uuid::new_v4);
        let meta = match extra.and_then(|e| e.meta.clone()) {
            Some(meta) => meta,
            None => Meta::from_stat(&source.stat()?, fingerprint(source)?),
        };

        on_discovered(source);

        let children = if meta.is_dir && !source.is_virtual() && !source.is_symlink() {
            Node::import_children(source, uuid, on_discovered)?
        } else {
            Vec::new()
        };

        Ok(Node {
            name: source.name(),
            uuid,
            parent_uuid: None,
            children,
            meta,
        })
    }

    /// Import the current contents of directory `dir` as children of `parent_uuid`
    ///
    /// Entries are imported in name order, one pool task per entry. An entry that vanishes
    /// or can't be read mid-walk is skipped with a warning.
    pub fn import_children(
        dir: &PathRef,
        parent_uuid: Uuid,
        on_discovered: OnDiscovered<'_>,
    ) -> Result<Vec<Node>> {
        let Some(fs_dir) = dir.as_fs_path() else {
            return Ok(Vec::new());
        };

        let mut names: Vec<String> = fs::read_dir(fs_dir)
            .map_err(|e| TreeError::io(fs_dir, e))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort_unstable();

        let children = names
            .par_iter()
            .filter_map(|name| {
                let child_path = dir.join(name, false);
                match Node::import(&child_path, None, on_discovered) {
                    Ok(mut node) => {
                        node.parent_uuid = Some(parent_uuid);
                        Some(node)
                    }
                    Err(e) => {
                        warn!("Skipping {} during import: {}", child_path, e);
                        None
                    }
                }
            })
            .collect();

        Ok(children)
    }

    /// Attach a detached node under the node at `parent_path`
    pub fn attach(&mut self, parent_path: &str, mut node: Node) -> Result<&Node> {
        let parent = self
            .search_mut(parent_path)
            .ok_or_else(|| TreeError::NotFound(parent_path.to_string()))?;
        if parent.child(&node.name).is_some() {
            return Err(TreeError::AlreadyExists(join(parent_path, &node.name)));
        }

        node.parent_uuid = Some(parent.uuid);
        parent.children.push(node);
        let last = parent.children.len() - 1;
        Ok(&parent.children[last])
    }

    /// Append imported nodes directly under `self`, skipping names already present
    pub fn adopt(&mut self, nodes: Vec<Node>) -> &Node {
        for mut node in nodes {
            if self.child(&node.name).is_some() {
                debug!("Not adopting duplicate {} under {}", node.name, self.name);
                continue;
            }
            node.parent_uuid = Some(self.uuid);
            self.children.push(node);
        }
        self
    }

    /// Decide where a node created at `path` from `source` goes
    ///
    /// Fails if the name is taken. A missing parent (a nested path arrived before its
    /// ancestors) is only accepted for a real directory, whose contents are then imported
    /// into the root.
    pub fn locate(&self, path: &str, source: &PathRef) -> Result<Site> {
        let name = base_name(path).ok_or_else(|| TreeError::InvalidPath(path.to_string()))?;
        let parent = parent_path(path);
        match self.search(&parent) {
            Some(p) if p.child(name).is_some() => Err(TreeError::AlreadyExists(path.to_string())),
            Some(_) => Ok(Site::Child {
                parent,
                name: name.to_string(),
            }),
            None if source.is_dir() && !source.is_virtual() => {
                debug!("Parent of {} not in tree, importing {} into root", path, source);
                Ok(Site::Root(self.uuid))
            }
            None if parent.is_empty() => Err(TreeError::NotFound(path.to_string())),
            None => Err(TreeError::NotFound(parent)),
        }
    }

    /// Commit nodes built by [`Site::stage`]
    ///
    /// Adopted nodes commit as the root, which is what gets returned for them.
    pub fn commit(&mut self, staged: Staged) -> Result<&Node> {
        match staged {
            Staged::Child { parent, node } => self.attach(&parent, node),
            Staged::Adopted(nodes) => Ok(self.adopt(nodes)),
        }
    }

    /// Create a node at `path` from `source`; see [`Node::locate`] for where it lands
    pub fn create(
        &mut self,
        path: &str,
        source: &PathRef,
        extra: Option<&ExtraPayload>,
        on_discovered: OnDiscovered<'_>,
    ) -> Result<&Node> {
        let staged = self
            .locate(path, source)?
            .stage(source, extra, on_discovered)?;
        self.commit(staged)
    }

    /// Detach the node at `path` and return it with its subtree
    pub fn remove(&mut self, path: &str) -> Result<Node> {
        let name = base_name(path).ok_or_else(|| TreeError::InvalidPath(path.to_string()))?;
        let parent = self
            .search_mut(&parent_path(path))
            .ok_or_else(|| TreeError::NotFound(path.to_string()))?;
        let index = parent
            .children
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| TreeError::NotFound(path.to_string()))?;
        Ok(parent.children.remove(index))
    }

    /// Detach the child `id` of node `parent_uuid`
    pub fn remove_by_uuid(&mut self, id: Uuid, parent_uuid: Uuid) -> Result<Node> {
        let parent = self
            .search_by_uuid_mut(parent_uuid)
            .ok_or_else(|| TreeError::NotFound(parent_uuid.to_string()))?;
        let index = parent
            .children
            .iter()
            .position(|c| c.uuid == id)
            .ok_or_else(|| TreeError::NotFound(id.to_string()))?;
        Ok(parent.children.remove(index))
    }

    /// Rename the node at `from` to the last segment of `to`
    ///
    /// UUID, children and parent are unchanged.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<&Node> {
        let new_name = base_name(to)
            .ok_or_else(|| TreeError::InvalidPath(to.to_string()))?
            .to_string();
        let old_name = base_name(from).ok_or_else(|| TreeError::InvalidPath(from.to_string()))?;

        if old_name != new_name {
            if let Some(parent) = self.search(&parent_path(from)) {
                if parent.child(&new_name).is_some() {
                    return Err(TreeError::AlreadyExists(to.to_string()));
                }
            }
        }

        let node = self
            .search_mut(from)
            .ok_or_else(|| TreeError::NotFound(from.to_string()))?;
        node.name = new_name;
        Ok(&*node)
    }

    /// Re-parent the node at `from` under the node at `to`
    pub fn move_to(&mut self, from: &str, to: &str) -> Result<&Node> {
        let target = self
            .search(to)
            .ok_or_else(|| TreeError::NotFound(to.to_string()))?;
        let node = self
            .search(from)
            .ok_or_else(|| TreeError::NotFound(from.to_string()))?;

        let target_uuid = target.uuid;
        let node_uuid = node.uuid;
        if node.parent_uuid == Some(target_uuid) {
            return self
                .search_by_uuid(node_uuid)
                .ok_or_else(|| TreeError::NotFound(from.to_string()));
        }
        if node.is_root() || node.search_by_uuid(target_uuid).is_some() {
            return Err(TreeError::InvalidPath(format!("cannot move {} into {}", from, to)));
        }
        if target.child(&node.name).is_some() {
            return Err(TreeError::AlreadyExists(join(to, &node.name)));
        }

        let mut detached = self.remove(from)?;
        detached.parent_uuid = Some(target_uuid);
        let target = self
            .search_by_uuid_mut(target_uuid)
            .ok_or_else(|| TreeError::NotFound(to.to_string()))?;
        target.children.push(detached);
        debug!("Moved {} ({}) under {}", from, node_uuid, to);
        let last = target.children.len() - 1;
        Ok(&target.children[last])
    }

    /// Re-parent and rename in one step, so the node at `from` ends up at `to`
    ///
    /// All checks run before the tree is touched.
    pub fn relocate(&mut self, from: &str, to: &str) -> Result<&Node> {
        let new_name = base_name(to).ok_or_else(|| TreeError::InvalidPath(to.to_string()))?;
        let to_parent = parent_path(to);
        let target = self
            .search(&to_parent)
            .ok_or_else(|| TreeError::NotFound(to_parent.clone()))?;
        let node = self
            .search(from)
            .ok_or_else(|| TreeError::NotFound(from.to_string()))?;

        let target_uuid = target.uuid;
        if node.is_root() || node.search_by_uuid(target_uuid).is_some() {
            return Err(TreeError::InvalidPath(format!("cannot move {} to {}", from, to)));
        }
        if target.child(new_name).is_some_and(|c| c.uuid != node.uuid) {
            return Err(TreeError::AlreadyExists(to.to_string()));
        }

        let mut detached = self.remove(from)?;
        detached.name = new_name.to_string();
        detached.parent_uuid = Some(target_uuid);
        let target = self
            .search_by_uuid_mut(target_uuid)
            .ok_or_else(|| TreeError::NotFound(to_parent))?;
        target.children.push(detached);
        let last = target.children.len() - 1;
        Ok(&target.children[last])
    }

    /// Read the current size and fingerprint of `source`
    ///
    /// Virtual sources have nothing on disk to read.
    pub fn measure(source: &PathRef) -> Result<Option<Measured>> {
        if source.is_virtual() {
            return Ok(None);
        }
        let fingerprint = fingerprint(source)?;
        let size = source.stat()?.size;
        Ok(Some(Measured { size, fingerprint }))
    }

    /// Record a write to the node at `path`
    ///
    /// `meta` replaces the node's metadata wholesale, then `measured` overwrites its size
    /// and fingerprint.
    pub fn refresh(
        &mut self,
        path: &str,
        measured: Option<Measured>,
        meta: Option<Meta>,
    ) -> Result<&Node> {
        let node = self
            .search_mut(path)
            .ok_or_else(|| TreeError::NotFound(path.to_string()))?;
        if let Some(meta) = meta {
            node.meta = meta;
        }
        if let Some(Measured { size, fingerprint }) = measured {
            node.meta.size = size;
            node.meta.fingerprint = fingerprint;
        }
        Ok(&*node)
    }

    /// Apply a write of `source` to the node at `path`
    ///
    /// Metadata in `extra` is taken as given; a virtual source with no `extra` leaves the
    /// node unchanged.
    pub fn update(
        &mut self,
        path: &str,
        source: &PathRef,
        extra: Option<&ExtraPayload>,
    ) -> Result<&Node> {
        if self.search(path).is_none() {
            return Err(TreeError::NotFound(path.to_string()));
        }
        let measured = Node::measure(source)?;
        self.refresh(path, measured, extra.and_then(|e| e.meta.clone()))
    }

    /// Pretty-printed JSON dump of this subtree
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Non-empty segments of a tree path
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Tree path of the parent of `path` (empty for a single segment)
pub fn parent_path(path: &str) -> String {
    let segs = segments(path);
    match segs.split_last() {
        Some((_, parent)) => parent.join("/"),
        None => String::new(),
    }
}

/// Last segment of a tree path
pub fn base_name(path: &str) -> Option<&str> {
    path.split('/').filter(|s| !s.is_empty()).last()
}

/// Append one segment to a tree path
pub fn join(parent: &str, name: &str) -> String {
    let parent = parent.trim_matches('/');
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn ignore(_: &PathRef) {}

    fn dummy_tree() -> Node {
        let mut root = Node::root("alphabet");
        for name in ["a", "b", "c", "d"] {
            let child = Node::new(name, Uuid::new_v4(), Some(root.uuid), Meta::default());
            root.children.push(child);
        }
        root
    }

    fn virtual_dir(path: &str) -> PathRef {
        PathRef::virtual_path(path, true)
    }

    #[test]
    fn test_create_then_remove() {
        let mut root = Node::root("root");
        root.create("/root/sub", &virtual_dir("root/sub"), None, &ignore)
            .unwrap();
        assert_eq!(root.children.len(), 1);

        let removed = root.remove("/root/sub").unwrap();
        assert_eq!(removed.name, "sub");
        assert!(root.children.is_empty());
        assert!(root.search("/root/sub").is_none());
        assert!(root.remove("/root/sub").unwrap_err().is_not_found());
    }

    #[test]
    fn test_move_reparents_leaf() {
        let mut root = Node::root("root");
        root.create("root/a", &PathRef::virtual_path("root/a", false), None, &ignore)
            .unwrap();
        root.create("root/d", &PathRef::virtual_path("root/d", false), None, &ignore)
            .unwrap();
        let a_uuid = root.search("root/a").unwrap().uuid;

        let moved = root.move_to("root/d", "root/a").unwrap();
        assert_eq!(moved.name, "d");
        assert_eq!(moved.parent_uuid, Some(a_uuid));

        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].name, "a");
        assert_eq!(root.children[0].children.len(), 1);
        assert_eq!(root.children[0].children[0].name, "d");
        assert!(root.search("root/a/d").is_some());
    }

    #[test]
    fn test_move_missing_endpoint_fails() {
        let mut root = dummy_tree();
        assert!(root.move_to("alphabet/x", "alphabet/a").unwrap_err().is_not_found());
        assert!(root.move_to("alphabet/a", "alphabet/x").unwrap_err().is_not_found());
        assert_eq!(root.children.len(), 4);
    }

    #[test]
    fn test_move_into_own_descendant_is_rejected() {
        let mut root = Node::root("root");
        root.create("root/a", &virtual_dir("root/a"), None, &ignore).unwrap();
        root.create("root/a/b", &virtual_dir("root/a/b"), None, &ignore)
            .unwrap();

        let err = root.move_to("root/a", "root/a/b").unwrap_err();
        assert!(matches!(err, TreeError::InvalidPath(_)));
        assert!(root.search("root/a/b").is_some());
    }

    #[test]
    fn test_rename_keeps_identity() {
        let mut root = Node::root("root");
        root.create("root/a", &virtual_dir("root/a"), None, &ignore).unwrap();
        root.create("root/a/inner", &virtual_dir("root/a/inner"), None, &ignore)
            .unwrap();
        let uuid = root.search("root/a").unwrap().uuid;

        let renamed = root.rename("root/a", "root/z").unwrap();
        assert_eq!(renamed.name, "z");
        assert_eq!(renamed.uuid, uuid);
        assert_eq!(renamed.children.len(), 1);
        assert!(root.search("root/a").is_none());
        assert!(root.search("root/z/inner").is_some());
    }

    #[test]
    fn test_relocate_moves_and_renames() {
        let mut root = Node::root("root");
        root.create("root/a", &virtual_dir("root/a"), None, &ignore).unwrap();
        root.create("root/b", &virtual_dir("root/b"), None, &ignore).unwrap();
        root.create("root/a/x", &PathRef::virtual_path("root/a/x", false), None, &ignore)
            .unwrap();
        root.create("root/b/x", &PathRef::virtual_path("root/b/x", false), None, &ignore)
            .unwrap();
        let x_uuid = root.search("root/a/x").unwrap().uuid;
        let b_uuid = root.search("root/b").unwrap().uuid;

        // The plain move would collide with b/x; the final name doesn't
        let moved = root.relocate("root/a/x", "root/b/y").unwrap();
        assert_eq!(moved.uuid, x_uuid);
        assert_eq!(moved.parent_uuid, Some(b_uuid));
        assert!(root.search("root/a/x").is_none());
        assert!(root.search("root/b/y").is_some());

        let err = root.relocate("root/b/y", "root/b/x").unwrap_err();
        assert!(matches!(err, TreeError::AlreadyExists(_)));
        assert!(root.search("root/b/y").is_some());
    }

    #[test]
    fn test_json_dump_round_trips() {
        let mut root = Node::root("root");
        root.create("root/a", &virtual_dir("root/a"), None, &ignore).unwrap();

        let json = root.to_json_pretty().unwrap();
        assert!(json.contains("\"name\": \"a\""));
        let parsed: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, root);
    }

    #[test]
    fn test_sibling_names_are_unique() {
        let mut root = dummy_tree();
        let err = root
            .create("alphabet/a", &virtual_dir("alphabet/a"), None, &ignore)
            .unwrap_err();
        assert!(matches!(err, TreeError::AlreadyExists(_)));

        let err = root.rename("alphabet/a", "alphabet/b").unwrap_err();
        assert!(matches!(err, TreeError::AlreadyExists(_)));
        assert_eq!(root.children.len(), 4);
        assert_eq!(root.children[0].name, "a");
    }

    #[test]
    fn test_remove_by_uuid() {
        let mut root = dummy_tree();
        let c = root.children[2].clone();

        let removed = root.remove_by_uuid(c.uuid, root.uuid).unwrap();
        assert_eq!(removed.name, "c");
        assert!(root.search_by_uuid(c.uuid).is_none());
        assert!(root
            .remove_by_uuid(c.uuid, root.uuid)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_extra_payload_uuid_is_used() {
        let mut root = Node::root("root");
        let uuid = Uuid::new_v4();
        let extra = ExtraPayload::with_uuid(uuid);
        root.create("root/x", &virtual_dir("root/x"), Some(&extra), &ignore)
            .unwrap();
        assert_eq!(root.search("root/x").unwrap().uuid, uuid);
    }

    #[test]
    fn test_search_wide_level() {
        let mut root = Node::root("wide");
        for i in 0..200 {
            let child = Node::new(format!("n{}", i), Uuid::new_v4(), Some(root.uuid), Meta::default());
            root.children.push(child);
        }
        let target = root.children[150].uuid;
        assert_eq!(root.search("wide/n150").unwrap().uuid, target);
        assert_eq!(root.search_by_uuid(target).unwrap().name, "n150");
        assert!(root.search("wide/n999").is_none());

        root.search_mut("wide/n199").unwrap().name = "last".to_string();
        assert!(root.search("wide/last").is_some());
    }

    #[test]
    fn test_import_real_directory() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let base = temp_dir.path().join("fs-shadow");
        fs::create_dir_all(base.join("test"))?;
        fs::write(base.join("test").join("sub.txt"), b"sub")?;
        fs::write(base.join("a.txt"), b"a")?;

        let discovered = Mutex::new(Vec::new());
        let record = |p: &PathRef| discovered.lock().unwrap().push(p.clone());

        let node = Node::import(&PathRef::fs(&base), None, &record)?;
        assert_eq!(node.name, "fs-shadow");
        assert!(node.meta.is_dir);
        assert_eq!(node.children.len(), 2);
        assert_eq!(node.children[0].name, "a.txt");
        assert_eq!(node.children[1].name, "test");
        assert_eq!(node.children[1].children[0].name, "sub.txt");
        assert_eq!(node.children[1].parent_uuid, Some(node.uuid));
        assert_eq!(
            node.children[1].children[0].parent_uuid,
            Some(node.children[1].uuid)
        );
        assert_eq!(
            node.children[0].meta.fingerprint,
            Some(crate::hash::hash_bytes(b"a"))
        );
        assert_eq!(discovered.lock().unwrap().len(), 4);
        Ok(())
    }

    #[test]
    fn test_search_finds_every_node() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let base = temp_dir.path().join("tree");
        for dir in ["x/y/z", "x/w", "v"] {
            fs::create_dir_all(base.join(dir))?;
        }
        for file in ["x/y/z/1", "x/y/2", "x/w/3", "4"] {
            fs::write(base.join(file), file.as_bytes())?;
        }

        let tree = Node::import(&PathRef::fs(&base), None, &ignore)?;
        let mut stack = vec![&tree];
        let mut visited = 0;
        while let Some(node) = stack.pop() {
            visited += 1;
            let path = tree.path_of(node.uuid).unwrap();
            assert_eq!(tree.search(&path).unwrap().uuid, node.uuid);
            assert_eq!(tree.search_by_uuid(node.uuid).unwrap().name, node.name);
            stack.extend(node.children.iter());
        }
        assert_eq!(visited, tree.node_count());
        assert_eq!(visited, 10);
        Ok(())
    }

    #[test]
    fn test_create_without_parent_imports_into_root() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let base = temp_dir.path().join("root");
        fs::create_dir_all(base.join("sub"))?;
        fs::write(base.join("sub").join("f.txt"), b"f")?;

        let discovered = Mutex::new(Vec::new());
        let record = |p: &PathRef| discovered.lock().unwrap().push(p.clone());

        let mut root = Node::root("root");
        let returned = root.create("root", &PathRef::fs(&base), None, &record)?;
        assert!(returned.is_root());
        assert_eq!(root.children.len(), 1);
        assert!(root.search("root/sub/f.txt").is_some());
        // root dir, sub, f.txt
        assert_eq!(discovered.lock().unwrap().len(), 3);
        Ok(())
    }

    #[test]
    fn test_virtual_create_needs_its_parent() {
        let mut root = Node::root("root");
        let err = root
            .create("root/missing/f", &PathRef::virtual_path("root/missing/f", false), None, &ignore)
            .unwrap_err();
        assert!(matches!(err, TreeError::NotFound(ref parent) if parent == "root/missing"));

        // Virtual directories don't fall back to an import either
        let err = root
            .create("root/missing/d", &virtual_dir("root/missing/d"), None, &ignore)
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(root.node_count(), 1);
    }

    #[test]
    fn test_staged_create_commits_later() -> anyhow::Result<()> {
        let mut root = Node::root("root");
        let source = virtual_dir("root/a");
        let site = root.locate("root/a", &source)?;
        assert_eq!(
            site,
            Site::Child {
                parent: "root".to_string(),
                name: "a".to_string()
            }
        );

        let staged = site.stage(&source, None, &ignore)?;
        assert!(root.search("root/a").is_none());
        let root_uuid = root.uuid;
        let committed = root.commit(staged)?;
        assert_eq!(committed.name, "a");
        assert_eq!(committed.parent_uuid, Some(root_uuid));

        // A site found before a competing commit no longer fits
        let late = Node::root("root")
            .locate("root/a", &source)?
            .stage(&source, None, &ignore)?;
        assert!(matches!(root.commit(late), Err(TreeError::AlreadyExists(_))));
        assert!(matches!(
            root.locate("root/a", &source),
            Err(TreeError::AlreadyExists(_))
        ));
        Ok(())
    }

    #[test]
    fn test_update_applies_extra_meta() {
        let mut root = Node::root("root");
        root.create("root/f", &PathRef::virtual_path("root/f", false), None, &ignore)
            .unwrap();
        let source = PathRef::virtual_path("root/f", false);

        let unchanged = root.update("root/f", &source, None).unwrap().meta.clone();
        assert_eq!(unchanged, Meta::default());

        let extra = ExtraPayload {
            uuid: None,
            meta: Some(Meta {
                size: 9,
                ..Meta::default()
            }),
        };
        assert_eq!(root.update("root/f", &source, Some(&extra)).unwrap().meta.size, 9);
    }

    #[test]
    fn test_update_refreshes_fingerprint() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let base = temp_dir.path().join("root");
        fs::create_dir_all(&base)?;
        let file = base.join("f.txt");
        fs::write(&file, b"before")?;

        let mut root = Node::import(&PathRef::fs(&base), None, &ignore)?;
        let before = root.search("root/f.txt").unwrap().meta.fingerprint;

        fs::write(&file, b"after!!")?;
        let updated = root.update("root/f.txt", &PathRef::fs(&file), None)?;
        assert_ne!(updated.meta.fingerprint, before);
        assert_eq!(updated.meta.size, 7);

        assert!(root
            .update("root/missing", &PathRef::fs(base.join("missing")), None)
            .unwrap_err()
            .is_not_found());
        Ok(())
    }

    #[test]
    fn test_meta_created_time() {
        let meta = Meta {
            created_at: 1_262_304_000,
            ..Meta::default()
        };
        assert_eq!(
            meta.created_time(),
            UNIX_EPOCH + Duration::from_secs(1_262_304_000)
        );
        assert_eq!(meta.created_at_millis(), 1_262_304_000_000);
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(segments("/root/a/"), vec!["root", "a"]);
        assert_eq!(parent_path("root/a/b"), "root/a");
        assert_eq!(parent_path("root"), "");
        assert_eq!(base_name("/root/a/"), Some("a"));
        assert_eq!(base_name(""), None);
        assert_eq!(join("", "root"), "root");
        assert_eq!(join("root/", "a"), "root/a");
    }
}
