//! Shared fixtures: trees written as `kind(child, kind:"label", ...)`.

#![allow(dead_code)]

use gumnut::indextree::NodeId;
use gumnut::{HashStrategy, NodeData, Tree, TypeRegistry, prepare_trees};

/// Parse a tree from the compact notation.
///
/// A node is a type name, optionally followed by `:label` (bare word or
/// double-quoted string), optionally followed by a parenthesized,
/// comma-separated child list.
pub fn parse(types: &mut TypeRegistry, text: &str) -> Tree {
    let mut parser = Parser {
        bytes: text.as_bytes(),
        pos: 0,
        types,
    };
    let (kind, label) = parser.head();
    let mut tree = Tree::new(NodeData::new(kind, label));
    let root = tree.root.unwrap();
    parser.children(&mut tree, root);
    parser.skip_ws();
    assert_eq!(parser.pos, text.len(), "trailing input in {text:?}");
    tree
}

/// Parse both trees against one registry and prepare them.
pub fn pair(src: &str, dst: &str) -> (Tree, Tree) {
    pair_with(src, dst, HashStrategy::Rolling)
}

pub fn pair_with(src: &str, dst: &str, strategy: HashStrategy) -> (Tree, Tree) {
    let mut types = TypeRegistry::new();
    let mut src = parse(&mut types, src);
    let mut dst = parse(&mut types, dst);
    prepare_trees(&mut src, &mut dst, strategy);
    (src, dst)
}

/// Find the first node, in pre-order, with the given label.
pub fn by_label(tree: &Tree, label: &str) -> NodeId {
    tree.pre_order()
        .find(|&n| tree.label(n) == label)
        .unwrap_or_else(|| panic!("no node labeled {label:?}"))
}

/// Render a tree back into the compact notation, labels always quoted.
pub fn render(tree: &Tree, types: &TypeRegistry) -> String {
    fn go(tree: &Tree, types: &TypeRegistry, node: NodeId, out: &mut String) {
        out.push_str(types.name(tree.kind(node)).unwrap_or("?"));
        if !tree.label(node).is_empty() {
            out.push_str(&format!(":{:?}", tree.label(node)));
        }
        let children: Vec<_> = tree.children(node).collect();
        if !children.is_empty() {
            out.push('(');
            for (i, child) in children.into_iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                go(tree, types, child, out);
            }
            out.push(')');
        }
    }
    let mut out = String::new();
    if let Some(root) = tree.root {
        go(tree, types, root, &mut out);
    }
    out
}

/// A small deterministic generator for synthetic trees.
pub struct Lcg(pub u64);

impl Lcg {
    pub fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    pub fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

/// Random tree notation with at most `max_nodes` nodes, drawn from a small
/// alphabet of types and labels so that pairs share structure.
pub fn random_notation(rng: &mut Lcg, max_nodes: usize) -> String {
    const KINDS: [&str; 3] = ["block", "stmt", "expr"];
    const LABELS: [&str; 5] = ["", "x", "y", "total", "totals"];

    fn node(rng: &mut Lcg, budget: &mut usize, depth: usize, out: &mut String) {
        *budget -= 1;
        out.push_str(KINDS[rng.below(KINDS.len() as u64) as usize]);
        let label = LABELS[rng.below(LABELS.len() as u64) as usize];
        if !label.is_empty() {
            out.push_str(&format!(":\"{label}\""));
        }
        if depth < 4 && *budget > 0 {
            let children = rng.below(4).min(*budget as u64);
            if children > 0 {
                out.push('(');
                for i in 0..children {
                    if *budget == 0 {
                        break;
                    }
                    if i > 0 {
                        out.push_str(", ");
                    }
                    node(rng, budget, depth + 1, out);
                }
                out.push(')');
            }
        }
    }

    let mut budget = max_nodes.max(1);
    let mut out = String::new();
    node(rng, &mut budget, 0, &mut out);
    out
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
    types: &'a mut TypeRegistry,
}

impl Parser<'_> {
    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.bytes.get(self.pos).copied()
    }

    fn word(&mut self) -> String {
        self.skip_ws();
        let start = self.pos;
        while self.pos < self.bytes.len()
            && (self.bytes[self.pos].is_ascii_alphanumeric()
                || matches!(self.bytes[self.pos], b'_' | b'-' | b'.'))
        {
            self.pos += 1;
        }
        assert!(self.pos > start, "expected a name at byte {start}");
        String::from_utf8(self.bytes[start..self.pos].to_vec()).unwrap()
    }

    fn quoted(&mut self) -> String {
        assert_eq!(self.bytes[self.pos], b'"');
        self.pos += 1;
        let start = self.pos;
        while self.bytes[self.pos] != b'"' {
            self.pos += 1;
        }
        let label = String::from_utf8(self.bytes[start..self.pos].to_vec()).unwrap();
        self.pos += 1;
        label
    }

    fn head(&mut self) -> (gumnut::TypeId, String) {
        let name = self.word();
        let kind = self.types.intern(&name);
        let label = if self.peek() == Some(b':') {
            self.pos += 1;
            if self.peek() == Some(b'"') {
                self.quoted()
            } else {
                self.word()
            }
        } else {
            String::new()
        };
        (kind, label)
    }

    fn children(&mut self, tree: &mut Tree, parent: NodeId) {
        if self.peek() != Some(b'(') {
            return;
        }
        self.pos += 1;
        loop {
            let (kind, label) = self.head();
            let child = tree.add_child(parent, NodeData::new(kind, label));
            self.children(tree, child);
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b')') => {
                    self.pos += 1;
                    return;
                }
                other => panic!("unexpected {:?} at byte {}", other.map(char::from), self.pos),
            }
        }
    }
}
