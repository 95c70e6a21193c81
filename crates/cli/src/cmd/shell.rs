//! Interactive editing of a virtual tree

use crate::util;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use shadow_journal::{Journal, Transaction};
use shadow_watcher::{Restore, VirtualTree};
use std::io::{self, BufRead, Write};
use std::path::Path;

const HELP: &str = "\
commands:
  mkdir <path>         create a directory
  touch <path>         create a file
  rm <path>            remove a node and everything below it
  mv <from> <to>       rename (or move and rename)
  move <from> <dir>    move into a directory
  tree                 print the tree
  json                 print the tree as JSON
  help                 show this help
  quit                 leave the shell

paths are relative to the root";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Mkdir(String),
    Touch(String),
    Remove(String),
    Rename(String, String),
    Move(String, String),
    Tree,
    Json,
    Help,
    Quit,
}

fn parse(line: &str) -> Result<Option<Command>> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let command = match words.as_slice() {
        [] => return Ok(None),
        ["mkdir", path] => Command::Mkdir(path.to_string()),
        ["touch", path] => Command::Touch(path.to_string()),
        ["rm", path] => Command::Remove(path.to_string()),
        ["mv", from, to] => Command::Rename(from.to_string(), to.to_string()),
        ["move", from, dir] => Command::Move(from.to_string(), dir.to_string()),
        ["tree"] => Command::Tree,
        ["json"] => Command::Json,
        ["help"] => Command::Help,
        ["quit"] | ["exit"] => Command::Quit,
        [other, ..] => anyhow::bail!("unknown command or wrong arguments: {}", other),
    };
    Ok(Some(command))
}

/// Tree path for a user path relative to the root
fn qualify(root: &str, path: &str) -> String {
    let path = path.trim_matches('/');
    if path.is_empty() || path == "." {
        root.to_string()
    } else {
        format!("{}/{}", root, path)
    }
}

struct Session {
    tree: VirtualTree,
    root: String,
    journal: Option<Journal>,
}

impl Session {
    fn open(root: &str, journal_dir: Option<&Path>) -> Result<Self> {
        let (tree, root_txn) = VirtualTree::new(root, None);
        let journal = match journal_dir {
            Some(path) => {
                let journal = Journal::open(path)
                    .with_context(|| format!("Failed to open journal at {}", path.display()))?;
                if journal.is_empty() {
                    journal.append(&root_txn)?;
                } else {
                    tree.restore(journal.replay().context("Failed to replay journal")?);
                }
                Some(journal)
            }
            None => None,
        };
        let root = tree.snapshot().name;
        Ok(Self {
            tree,
            root,
            journal,
        })
    }

    /// Run one mutating command, returning its transaction
    fn apply(&self, command: &Command) -> Result<Option<Transaction>> {
        let q = |p: &str| qualify(&self.root, p);
        let txn = match command {
            Command::Mkdir(path) => self.tree.create(&q(path), true, None)?,
            Command::Touch(path) => self.tree.create(&q(path), false, None)?,
            Command::Remove(path) => self.tree.remove(&q(path))?,
            Command::Rename(from, to) => self.tree.rename(&q(from), &q(to))?,
            Command::Move(from, dir) => self.tree.move_to(&q(from), &q(dir))?,
            Command::Tree | Command::Json | Command::Help | Command::Quit => return Ok(None),
        };
        if let Some(journal) = &self.journal {
            journal.append(&txn)?;
        }
        Ok(Some(txn))
    }
}

pub fn run(root: &str, journal_dir: Option<&Path>) -> Result<()> {
    let session = Session::open(root, journal_dir)?;
    println!(
        "Virtual tree {} ({} nodes); type {} for commands",
        session.root.cyan(),
        session.tree.snapshot().node_count(),
        "help".bold()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut lines = stdin.lock().lines();
    loop {
        print!("{} ", ">".dimmed());
        stdout.flush()?;
        let Some(line) = lines.next() else { break };
        let command = match parse(&line?) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{} {}", "error:".red(), e);
                continue;
            }
        };

        match command {
            Command::Quit => break,
            Command::Help => println!("{}", HELP),
            Command::Tree => print!("{}", util::render_tree(&session.tree.snapshot())),
            Command::Json => println!("{}", session.tree.snapshot().to_json_pretty()?),
            _ => match session.apply(&command) {
                Ok(Some(txn)) => println!("{}", util::describe(&txn)),
                Ok(None) => {}
                Err(e) => eprintln!("{} {}", "error:".red(), e),
            },
        }
    }
    Ok(())
}
