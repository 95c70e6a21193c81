//! Append-only transaction journal using sled

use crate::{replay, Result, Transaction};
use shadow_core::Node;
use sled::Db;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Append-only journal of transactions
///
/// Keys are big-endian sequence numbers, so sled's key order is append order.
pub struct Journal {
    /// Sled database
    db: Db,
    /// Next sequence number
    seq_counter: AtomicU64,
}

impl Journal {
    /// Open or create a journal in the given directory
    pub fn open(path: &Path) -> Result<Self> {
        let db = sled::open(path.join("transactions.db"))?;

        let next_seq = match db.last()? {
            Some((key, _)) => decode_seq(&key).map_or(0, |seq| seq + 1),
            None => 0,
        };
        debug!("Opened journal at {} (next seq {})", path.display(), next_seq);

        Ok(Self {
            db,
            seq_counter: AtomicU64::new(next_seq),
        })
    }

    /// Append a transaction, returning its sequence number
    pub fn append(&self, txn: &Transaction) -> Result<u64> {
        let seq = self.seq_counter.fetch_add(1, Ordering::SeqCst);
        self.db.insert(seq.to_be_bytes(), txn.encode()?)?;

        // Flush to ensure durability
        self.db.flush()?;

        Ok(seq)
    }

    /// Append several transactions with a single flush
    pub fn append_all(&self, txns: &[Transaction]) -> Result<()> {
        let mut batch = sled::Batch::default();
        for txn in txns {
            let seq = self.seq_counter.fetch_add(1, Ordering::SeqCst);
            batch.insert(seq.to_be_bytes().to_vec(), txn.encode()?);
        }
        self.db.apply_batch(batch)?;
        self.db.flush()?;
        Ok(())
    }

    /// Get a transaction by sequence number
    pub fn get(&self, seq: u64) -> Result<Option<Transaction>> {
        match self.db.get(seq.to_be_bytes())? {
            Some(value) => Ok(Some(Transaction::decode(&value)?)),
            None => Ok(None),
        }
    }

    /// Every transaction, in append order
    pub fn all(&self) -> Result<Vec<Transaction>> {
        self.db
            .iter()
            .values()
            .map(|value| Ok(Transaction::decode(&value?)?))
            .collect()
    }

    /// The last `count` transactions, oldest first
    pub fn last_n(&self, count: usize) -> Result<Vec<Transaction>> {
        let mut txns = self
            .db
            .iter()
            .values()
            .rev()
            .take(count)
            .map(|value| Ok(Transaction::decode(&value?)?))
            .collect::<Result<Vec<_>>>()?;
        txns.reverse();
        Ok(txns)
    }

    /// Get the total number of transactions
    pub fn count(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    /// Drop every transaction and restart the sequence
    pub fn clear(&self) -> Result<()> {
        self.db.clear()?;
        self.db.flush()?;
        self.seq_counter.store(0, Ordering::SeqCst);
        Ok(())
    }

    /// Rebuild the tree recorded by this journal
    pub fn replay(&self) -> Result<Node> {
        replay(self.all()?)
    }
}

fn decode_seq(key: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = key.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}
