//! Shared output helpers for CLI commands

use owo_colors::OwoColorize;
use shadow_core::{EventKind, Node};
use shadow_journal::Transaction;

/// One-line colored summary of a transaction
pub fn describe(txn: &Transaction) -> String {
    let label = format!("{:<6}", txn.kind.as_str());
    let kind = match txn.kind {
        EventKind::Create => label.green().to_string(),
        EventKind::Remove => label.red().to_string(),
        EventKind::Write => label.cyan().to_string(),
        EventKind::Rename | EventKind::Move => label.yellow().to_string(),
    };
    let name = if txn.meta.is_dir {
        format!("{}/", txn.name)
    } else {
        txn.name.clone()
    };
    let id = txn.uuid.to_string();
    format!("{} {} {}", kind, name.bold(), (&id[..8]).dimmed())
}

/// Plain-text drawing of `node` and its subtree, one entry per line
pub fn render_tree(node: &Node) -> String {
    let mut out = String::new();
    out.push_str(&entry_name(node));
    out.push('\n');
    render_children(node, "", &mut out);
    out
}

fn render_children(node: &Node, prefix: &str, out: &mut String) {
    let count = node.children.len();
    for (i, child) in node.children.iter().enumerate() {
        let last = i + 1 == count;
        let (branch, indent) = if last {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };
        out.push_str(prefix);
        out.push_str(branch);
        out.push_str(&entry_name(child));
        out.push('\n');
        render_children(child, &format!("{}{}", prefix, indent), out);
    }
}

fn entry_name(node: &Node) -> String {
    if node.meta.is_dir {
        format!("{}/", node.name)
    } else {
        node.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadow_core::Meta;
    use uuid::Uuid;

    #[test]
    fn test_render_tree() {
        let mut root = Node::root("fs-shadow");
        let mut docs = Node::new("docs", Uuid::new_v4(), Some(root.uuid), Meta::directory());
        docs.children
            .push(Node::new("a.txt", Uuid::new_v4(), Some(docs.uuid), Meta::default()));
        root.children.push(docs);
        root.children
            .push(Node::new("b.txt", Uuid::new_v4(), Some(root.uuid), Meta::default()));

        let expected = "fs-shadow/\n├── docs/\n│   └── a.txt\n└── b.txt\n";
        assert_eq!(render_tree(&root), expected);
    }

    #[test]
    fn test_describe_mentions_name_and_id() {
        let node = Node::new("notes", Uuid::new_v4(), Some(Uuid::new_v4()), Meta::directory());
        let line = describe(&Transaction::from_node(&node, EventKind::Create));
        assert!(line.contains("notes/"));
        assert!(line.contains(&node.uuid.to_string()[..8]));
    }
}
