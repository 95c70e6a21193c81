//! Transaction records and their wire codec

use crate::Result;
use serde::{Deserialize, Serialize};
use shadow_core::{EventKind, Meta, Node};
use uuid::Uuid;

/// Flattened snapshot of one node mutation
///
/// Carries the node's state *after* the mutation: the new name for a rename, the new
/// parent for a move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub name: String,
    pub kind: EventKind,
    pub uuid: Uuid,
    pub parent_uuid: Option<Uuid>,
    pub meta: Meta,
}

impl Transaction {
    /// Record `node` as affected by a `kind` mutation
    pub fn from_node(node: &Node, kind: EventKind) -> Self {
        Self {
            name: node.name.clone(),
            kind,
            uuid: node.uuid,
            parent_uuid: node.parent_uuid,
            meta: node.meta.clone(),
        }
    }

    /// Pre-order `Create` transactions for `node` and its whole subtree
    ///
    /// Replaying the result rebuilds the subtree, given its parent already exists.
    pub fn snapshot(node: &Node) -> Vec<Transaction> {
        let mut out = Vec::with_capacity(node.node_count());
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            out.push(Self::from_node(current, EventKind::Create));
            stack.extend(current.children.iter().rev());
        }
        out
    }

    /// Serialize to bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    pub fn is_root(&self) -> bool {
        self.parent_uuid.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadow_core::hash::hash_bytes;

    #[test]
    fn test_codec_preserves_every_field() {
        let txn = Transaction {
            name: "report.txt".to_string(),
            kind: EventKind::Write,
            uuid: Uuid::new_v4(),
            parent_uuid: Some(Uuid::new_v4()),
            meta: Meta {
                is_dir: false,
                fingerprint: Some(hash_bytes(b"report")),
                size: 6,
                created_at: 1_700_000_000,
                permission: "644".to_string(),
            },
        };

        let bytes = txn.encode().unwrap();
        assert_eq!(Transaction::decode(&bytes).unwrap(), txn);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(Transaction::decode(&[0xff, 0x01]).is_err());
    }

    #[test]
    fn test_snapshot_is_preorder() {
        let mut root = Node::root("root");
        let mut a = Node::new("a", Uuid::new_v4(), Some(root.uuid), Meta::directory());
        let a1 = Node::new("a1", Uuid::new_v4(), Some(a.uuid), Meta::default());
        a.children.push(a1);
        let b = Node::new("b", Uuid::new_v4(), Some(root.uuid), Meta::default());
        root.children.push(a);
        root.children.push(b);

        let names: Vec<_> = Transaction::snapshot(&root)
            .into_iter()
            .map(|t| {
                assert_eq!(t.kind, EventKind::Create);
                t.name
            })
            .collect();
        assert_eq!(names, vec!["root", "a", "a1", "b"]);
    }
}
