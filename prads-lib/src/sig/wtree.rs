//! A generic "wildcard-at-every-level" signature tree shared by the ICMP
//! and UDP OS matchers (spec.md §4.D): descend an ordered key path, trying
//! the exact key and falling back to `*` at each level.

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Leaf {
    pub os: String,
    pub details: String,
}

#[derive(Default)]
enum Node {
    #[default]
    Empty,
    Branch(HashMap<String, Node>),
    Leaf(Leaf),
}

#[derive(Default)]
pub struct WildcardTree {
    root: Node,
}

impl WildcardTree {
    pub fn insert(&mut self, path: &[String], leaf: Leaf) {
        let mut node = &mut self.root;
        for key in path {
            if matches!(node, Node::Empty) {
                *node = Node::Branch(HashMap::new());
            }
            let Node::Branch(map) = node else {
                unreachable!("descended into a leaf mid-path")
            };
            node = map.entry(key.clone()).or_insert(Node::Empty);
        }
        *node = Node::Leaf(leaf);
    }

    /// Descend with the observed key path, trying the exact key then `*`
    /// at every level. Returns `None` on a miss at any level.
    pub fn lookup(&self, keys: &[String]) -> Option<&Leaf> {
        let mut node = &self.root;
        for key in keys {
            let Node::Branch(map) = node else {
                return None;
            };
            node = map.get(key).or_else(|| map.get("*"))?;
        }
        match node {
            Node::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    /// Every inserted `(path, leaf)` pair, for `--dump` (spec.md §6).
    pub fn entries(&self) -> Vec<(Vec<String>, &Leaf)> {
        let mut out = Vec::new();
        collect(&self.root, &mut Vec::new(), &mut out);
        out
    }
}

fn collect<'a>(node: &'a Node, path: &mut Vec<String>, out: &mut Vec<(Vec<String>, &'a Leaf)>) {
    match node {
        Node::Empty => {}
        Node::Leaf(leaf) => out.push((path.clone(), leaf)),
        Node::Branch(map) => {
            for (key, child) in map {
                path.push(key.clone());
                collect(child, path, out);
                path.pop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_then_wildcard_fallback() {
        let mut t = WildcardTree::default();
        t.insert(
            &["8".into(), "0".into(), "*".into()],
            Leaf { os: "Generic".into(), details: "ping".into() },
        );
        t.insert(
            &["8".into(), "0".into(), "64".into()],
            Leaf { os: "Linux".into(), details: "ping".into() },
        );

        let exact = t
            .lookup(&["8".into(), "0".into(), "64".into()])
            .unwrap();
        assert_eq!(exact.os, "Linux");

        let wild = t
            .lookup(&["8".into(), "0".into(), "128".into()])
            .unwrap();
        assert_eq!(wild.os, "Generic");

        assert!(t.lookup(&["3".into(), "0".into(), "64".into()]).is_none());
    }
}
