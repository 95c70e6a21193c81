//! Rebuilding a watched tree from recorded transactions

use crate::Result;
use shadow_core::Node;

/// A shadow tree whose contents can be replaced wholesale
pub trait Restore {
    fn restore(&self, tree: Node);
}

/// Replay encoded transactions and install the result as `target`'s tree
///
/// Nothing is replaced if any transaction fails to decode or replay.
pub fn restore_with_transactions<R, B>(encoded: &[B], target: &R) -> Result<()>
where
    R: Restore + ?Sized,
    B: AsRef<[u8]>,
{
    let tree = shadow_journal::decode_and_replay(encoded)?;
    target.restore(tree);
    Ok(())
}
