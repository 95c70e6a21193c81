//! Rebuild a tree from a journal

use crate::util;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use shadow_journal::Journal;
use std::path::Path;

pub fn run(journal_dir: &Path, json: bool) -> Result<()> {
    let journal = Journal::open(journal_dir)
        .with_context(|| format!("Failed to open journal at {}", journal_dir.display()))?;
    if journal.is_empty() {
        anyhow::bail!("Journal at {} is empty", journal_dir.display());
    }

    let tree = journal
        .replay()
        .context("Failed to replay journal")?;

    if json {
        println!("{}", tree.to_json_pretty()?);
        return Ok(());
    }

    println!(
        "{} {} transactions, {} nodes",
        "Replayed".bold(),
        journal.count(),
        tree.node_count()
    );
    println!();
    print!("{}", util::render_tree(&tree));
    Ok(())
}
