//! Rebuild a shadow tree from an ordered transaction list
//!
//! Replay is a left-to-right fold over a UUID-keyed side table. Nodes are only
//! materialized into a `Node` tree once the whole sequence has been applied.
//!
//! The fold is lenient: a Create whose parent is unknown stays in the table unattached,
//! and edits of unknown nodes are skipped. Only a sequence that leaves no root fails.

use crate::{JournalError, Result, Transaction};
use ahash::AHashMap;
use shadow_core::{EventKind, Meta, Node};
use tracing::debug;
use uuid::Uuid;

struct Slot {
    name: String,
    meta: Meta,
    parent: Option<Uuid>,
    children: Vec<Uuid>,
}

#[derive(Default)]
struct Table {
    slots: AHashMap<Uuid, Slot>,
    root: Option<Uuid>,
}

impl Table {
    fn apply(&mut self, index: usize, txn: Transaction) {
        match txn.kind {
            EventKind::Create => self.create(index, txn),
            EventKind::Rename | EventKind::Write => match self.slots.get_mut(&txn.uuid) {
                Some(slot) => {
                    slot.name = txn.name;
                    slot.meta = txn.meta;
                }
                None => debug!("#{}: skipping {:?} of unknown {}", index, txn.kind, txn.uuid),
            },
            EventKind::Move => self.move_to(index, txn),
            EventKind::Remove => self.remove(index, txn.uuid),
        }
    }

    fn create(&mut self, index: usize, txn: Transaction) {
        if let Some(slot) = self.slots.get_mut(&txn.uuid) {
            // A bulk import into the root re-announces the root
            if txn.parent_uuid.is_none() && self.root == Some(txn.uuid) {
                slot.name = txn.name;
                slot.meta = txn.meta;
            } else {
                debug!("#{}: skipping duplicate create of {}", index, txn.uuid);
            }
            return;
        }

        match txn.parent_uuid {
            None => {
                if let Some(existing) = self.root {
                    debug!("#{}: root {} replaces {}", index, txn.uuid, existing);
                }
                self.root = Some(txn.uuid);
            }
            Some(parent) => match self.slots.get_mut(&parent) {
                Some(slot) => slot.children.push(txn.uuid),
                None => debug!("#{}: parent {} of {} unknown, not attaching", index, parent, txn.uuid),
            },
        }
        self.slots.insert(
            txn.uuid,
            Slot {
                name: txn.name,
                meta: txn.meta,
                parent: txn.parent_uuid,
                children: Vec::new(),
            },
        );
    }

    fn move_to(&mut self, index: usize, txn: Transaction) {
        let Some(old_parent) = self.slots.get(&txn.uuid).map(|slot| slot.parent) else {
            debug!("#{}: skipping move of unknown {}", index, txn.uuid);
            return;
        };
        let Some(new_parent) = txn.parent_uuid else {
            debug!("#{}: skipping move of {} without a destination", index, txn.uuid);
            return;
        };
        if self.root == Some(txn.uuid) {
            debug!("#{}: skipping move of the root", index);
            return;
        }

        if let Some(old_parent) = old_parent {
            self.detach(old_parent, txn.uuid);
        }
        match self.slots.get_mut(&new_parent) {
            Some(slot) => slot.children.push(txn.uuid),
            None => debug!("#{}: parent {} of {} unknown, not attaching", index, new_parent, txn.uuid),
        }
        if let Some(slot) = self.slots.get_mut(&txn.uuid) {
            slot.parent = Some(new_parent);
            slot.name = txn.name;
            slot.meta = txn.meta;
        }
    }

    fn remove(&mut self, index: usize, id: Uuid) {
        let Some(parent) = self.slots.get(&id).map(|slot| slot.parent) else {
            debug!("#{}: skipping remove of unknown {}", index, id);
            return;
        };
        match parent {
            Some(parent) => self.detach(parent, id),
            None if self.root == Some(id) => self.root = None,
            None => {}
        }

        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            if let Some(slot) = self.slots.remove(&current) {
                pending.extend(slot.children);
            }
        }
    }

    fn detach(&mut self, parent: Uuid, id: Uuid) {
        if let Some(slot) = self.slots.get_mut(&parent) {
            slot.children.retain(|c| *c != id);
        }
    }

    fn build(&mut self, id: Uuid) -> Option<Node> {
        let slot = self.slots.remove(&id)?;
        let children = slot
            .children
            .iter()
            .filter_map(|child| self.build(*child))
            .collect();
        Some(Node {
            name: slot.name,
            uuid: id,
            parent_uuid: slot.parent,
            children,
            meta: slot.meta,
        })
    }
}

/// Fold `transactions` into a fresh tree
///
/// The transaction with no parent defines the root; a later root with another uuid
/// replaces it. Fails only if the sequence never creates a root or ends with it removed.
pub fn replay<I>(transactions: I) -> Result<Node>
where
    I: IntoIterator<Item = Transaction>,
{
    let mut table = Table::default();
    let mut applied = 0usize;
    for (index, txn) in transactions.into_iter().enumerate() {
        table.apply(index, txn);
        applied += 1;
    }
    debug!("Replayed {} transactions", applied);

    let root = table
        .root
        .ok_or_else(|| JournalError::replay(applied, "sequence has no root"))?;
    table
        .build(root)
        .ok_or_else(|| JournalError::replay(applied, "root missing from table"))
}

/// Decode each encoded transaction in order and replay the result
pub fn decode_and_replay<B: AsRef<[u8]>>(encoded: &[B]) -> Result<Node> {
    let transactions = encoded
        .iter()
        .map(|bytes| Transaction::decode(bytes.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    replay(transactions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txn(name: &str, kind: EventKind, uuid: Uuid, parent_uuid: Option<Uuid>) -> Transaction {
        Transaction {
            name: name.to_string(),
            kind,
            uuid,
            parent_uuid,
            meta: Meta::default(),
        }
    }

    fn sample() -> (Vec<Transaction>, [Uuid; 4]) {
        let ids = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let [r1, s1, ss1, s2] = ids;
        let txns = vec![
            txn("test-1", EventKind::Create, r1, None),
            txn("s-test-1", EventKind::Create, s1, Some(r1)),
            txn("ss-test-1", EventKind::Create, ss1, Some(s1)),
            txn("s-test-2", EventKind::Create, s2, Some(r1)),
            txn("s-test-2-rename", EventKind::Rename, s2, Some(r1)),
            txn("s-test-2-rename", EventKind::Move, s2, Some(r1)),
        ];
        (txns, ids)
    }

    #[test]
    fn test_replay_builds_tree() {
        let (txns, [r1, s1, ss1, s2]) = sample();
        let tree = replay(txns).unwrap();

        assert_eq!(tree.name, "test-1");
        assert_eq!(tree.uuid, r1);
        assert_eq!(tree.children[0].name, "s-test-1");
        assert_eq!(tree.children[0].uuid, s1);
        assert_eq!(tree.children[0].children[0].uuid, ss1);
        assert_eq!(tree.children[1].name, "s-test-2-rename");
        assert_eq!(tree.children[1].uuid, s2);
        assert_eq!(tree.node_count(), 4);
    }

    #[test]
    fn test_replay_is_idempotent() {
        let (txns, _) = sample();
        assert_eq!(replay(txns.clone()).unwrap(), replay(txns).unwrap());
    }

    #[test]
    fn test_replay_decoded_bytes() {
        let (txns, _) = sample();
        let encoded: Vec<Vec<u8>> = txns.iter().map(|t| t.encode().unwrap()).collect();
        assert_eq!(decode_and_replay(&encoded).unwrap(), replay(txns).unwrap());
    }

    #[test]
    fn test_move_and_remove() {
        let (mut txns, [r1, s1, ss1, _]) = sample();
        txns.push(txn("ss-test-1", EventKind::Move, ss1, Some(r1)));
        txns.push(txn("s-test-1", EventKind::Remove, s1, Some(r1)));

        let tree = replay(txns).unwrap();
        let names: Vec<_> = tree.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["s-test-2-rename", "ss-test-1"]);
        assert_eq!(tree.children[1].parent_uuid, Some(r1));
    }

    #[test]
    fn test_remove_drops_subtree() {
        let (mut txns, [r1, s1, ss1, s2]) = sample();
        txns.push(txn("s-test-1", EventKind::Remove, s1, Some(r1)));
        // ss1 went with its parent
        txns.push(txn("ss-test-1", EventKind::Write, ss1, Some(s1)));

        let tree = replay(txns).unwrap();
        assert_eq!(tree.node_count(), 2);
        assert!(tree.search_by_uuid(ss1).is_none());
        assert!(tree.search_by_uuid(s2).is_some());
    }

    #[test]
    fn test_orphaned_create_is_not_attached() {
        let (mut txns, [r1, ..]) = sample();
        let before = replay(txns.clone()).unwrap();

        let (lost, orphan) = (Uuid::new_v4(), Uuid::new_v4());
        txns.push(txn("orphan", EventKind::Create, orphan, Some(lost)));
        txns.push(txn("orphan-2", EventKind::Rename, orphan, Some(lost)));
        assert_eq!(replay(txns.clone()).unwrap(), before);

        // Moving it under a known parent brings it in
        txns.push(txn("found", EventKind::Move, orphan, Some(r1)));
        let tree = replay(txns).unwrap();
        let found = tree.search_by_uuid(orphan).unwrap();
        assert_eq!(found.name, "found");
        assert_eq!(found.parent_uuid, Some(r1));
    }

    #[test]
    fn test_unknown_nodes_are_skipped() {
        let (mut txns, [r1, ..]) = sample();
        let before = replay(txns.clone()).unwrap();

        let ghost = Uuid::new_v4();
        txns.push(txn("ghost", EventKind::Write, ghost, Some(r1)));
        txns.push(txn("ghost", EventKind::Move, ghost, Some(r1)));
        txns.push(txn("ghost", EventKind::Remove, ghost, Some(r1)));
        assert_eq!(replay(txns).unwrap(), before);
    }

    #[test]
    fn test_repeated_root_create_updates_root() {
        let (mut txns, [r1, ..]) = sample();
        let mut again = txn("test-1", EventKind::Create, r1, None);
        again.meta.size = 7;
        txns.push(again);

        let tree = replay(txns).unwrap();
        assert_eq!(tree.uuid, r1);
        assert_eq!(tree.meta.size, 7);
        assert_eq!(tree.node_count(), 4);
    }

    #[test]
    fn test_snapshot_replays_to_same_tree() {
        let (txns, _) = sample();
        let tree = replay(txns).unwrap();
        assert_eq!(replay(Transaction::snapshot(&tree)).unwrap(), tree);
    }

    #[test]
    fn test_sequences_without_root_fail() {
        assert!(replay(Vec::new()).is_err());

        let orphan = txn("x", EventKind::Create, Uuid::new_v4(), Some(Uuid::new_v4()));
        assert!(matches!(
            replay(vec![orphan]),
            Err(JournalError::Replay { index: 1, .. })
        ));

        let (mut txns, [r1, ..]) = sample();
        txns.push(txn("test-1", EventKind::Remove, r1, None));
        assert!(replay(txns).is_err());
    }
}
