//! Chawathe edit script generation.
//!
//! Generates an edit script (INSERT, DELETE, MOVE, UPDATE) from a mapping.
//! Based on "Change Detection in Hierarchically Structured Information"
//! (Chawathe et al., 1996).
//!
//! The destination tree is walked breadth-first while a working copy of the
//! source tree is edited in lockstep:
//! 1. An unmapped destination node is inserted under the partner of its parent.
//! 2. A mapped node gets an UPDATE when its label differs and a MOVE when its
//!    partner sits under another parent.
//! 3. The children of every visited pair are aligned: mapped children outside
//!    a longest common subsequence are moved into place.
//! 4. Working nodes left without a partner are deleted in post-order.

use indextree::NodeId;
use rapidhash::{RapidHashMap as HashMap, RapidHashSet as HashSet};

use super::work::WorkTree;
use super::{Action, EditScript};
use crate::mapping::MappingStore;
use crate::sequence::lcs;
use crate::tree::Tree;
use crate::{debug, trace};

/// Generate an edit script transforming `src` into `dst` under `mappings`.
///
/// The script replays against a copy of `src` (see [`super::replay`]):
/// inserts and moves come parents first, deletes children first. The
/// output is fully determined by the two trees and the mapping.
pub fn generate_edit_script(src: &Tree, dst: &Tree, mappings: &MappingStore) -> EditScript {
    debug!(matched_pairs = mappings.len(), "generate_edit_script start");
    let mut generator = Generator::new(src, dst, mappings);
    generator.run();
    debug!(
        total_actions = generator.script.len(),
        "generate_edit_script done"
    );
    generator.script
}

struct Generator<'a> {
    dst: &'a Tree,
    mappings: &'a MappingStore,
    work: WorkTree,
    work_to_dst: HashMap<NodeId, NodeId>,
    dst_to_work: HashMap<NodeId, NodeId>,
    /// Destination nodes whose partner is known to sit in the right place
    /// relative to its siblings.
    in_order: HashSet<NodeId>,
    script: EditScript,
}

impl<'a> Generator<'a> {
    fn new(src: &'a Tree, dst: &'a Tree, mappings: &'a MappingStore) -> Self {
        let work = WorkTree::from_tree(src);
        let mut work_to_dst = HashMap::default();
        let mut dst_to_work = HashMap::default();
        for (s, d) in mappings.pairs() {
            if let Some(w) = work.of_src(s) {
                work_to_dst.insert(w, d);
                dst_to_work.insert(d, w);
            }
        }
        Self {
            dst,
            mappings,
            work,
            work_to_dst,
            dst_to_work,
            in_order: HashSet::default(),
            script: EditScript::new(),
        }
    }

    fn run(&mut self) {
        let dst = self.dst;
        for x in dst.bfs() {
            let z = self.partner_of_parent(x);
            let partner = self.dst_to_work.get(&x).copied();

            let w = match (partner, self.mappings.get_src(x)) {
                (Some(w), Some(s)) => {
                    if self.work.get(w).label != dst.label(x) {
                        let old_label = core::mem::replace(
                            &mut self.work.get_mut(w).label,
                            dst.label(x).to_owned(),
                        );
                        self.script.push(Action::Update {
                            src: s,
                            dst: x,
                            old_label,
                            new_label: dst.label(x).to_owned(),
                        });
                    }
                    if self.work.parent(w) != Some(z) {
                        let position = self.find_pos(x);
                        self.script.push(Action::Move {
                            src: s,
                            dst: x,
                            parent: dst.parent(x),
                            position,
                        });
                        self.work.move_to(w, z, position);
                    }
                    w
                }
                _ => {
                    let position = self.find_pos(x);
                    let w = self.work.new_node(dst.kind(x), dst.label(x));
                    self.script.push(Action::Insert {
                        dst: x,
                        parent: dst.parent(x),
                        position,
                        kind: dst.kind(x),
                        label: dst.label(x).to_owned(),
                    });
                    self.work.insert_at(z, w, position);
                    self.work_to_dst.insert(w, x);
                    self.dst_to_work.insert(x, w);
                    w
                }
            };

            self.in_order.insert(x);
            self.align_children(w, x);
        }

        for w in self.work.post_order() {
            if self.work_to_dst.contains_key(&w) {
                continue;
            }
            if let Some(s) = self.work.get(w).src {
                self.script.push(Action::Delete { src: s });
            }
        }
    }

    /// Working node standing for the destination parent of `x`.
    fn partner_of_parent(&self, x: NodeId) -> NodeId {
        self.dst
            .parent(x)
            .and_then(|y| self.dst_to_work.get(&y).copied())
            .unwrap_or(self.work.root)
    }

    /// Position for the partner of `x`: right after the partner of the
    /// closest in-order sibling to its left, or first.
    fn find_pos(&self, x: NodeId) -> usize {
        let Some(y) = self.dst.parent(x) else {
            return 0;
        };
        let siblings: Vec<NodeId> = self.dst.children(y).collect();
        if siblings.iter().find(|c| self.in_order.contains(*c)) == Some(&x) {
            return 0;
        }

        let x_pos = self.dst.position(x);
        let Some(v) = siblings[..x_pos]
            .iter()
            .rev()
            .find(|c| self.in_order.contains(*c))
        else {
            return 0;
        };
        match self.dst_to_work.get(v) {
            Some(&u) => self.work.position(u) + 1,
            None => 0,
        }
    }

    fn align_children(&mut self, w: NodeId, x: NodeId) {
        let dst = self.dst;
        for c in dst.children(x) {
            self.in_order.remove(&c);
        }

        let s1: Vec<NodeId> = w
            .children(&self.work.arena)
            .filter(|c| {
                self.work_to_dst
                    .get(c)
                    .is_some_and(|&d| dst.parent(d) == Some(x))
            })
            .collect();
        let s2: Vec<NodeId> = dst
            .children(x)
            .filter(|c| {
                self.dst_to_work
                    .get(c)
                    .is_some_and(|&p| self.work.parent(p) == Some(w))
            })
            .collect();

        let common = lcs(&s1, &s2, |a, b| self.work_to_dst.get(a) == Some(b));
        let mut aligned: HashSet<NodeId> = HashSet::default();
        for &(i, j) in &common {
            aligned.insert(s1[i]);
            self.in_order.insert(s2[j]);
        }

        for &a in &s1 {
            if aligned.contains(&a) {
                continue;
            }
            let Some(&b) = self.work_to_dst.get(&a) else {
                continue;
            };
            let Some(s) = self.work.get(a).src else {
                continue;
            };
            let k = self.find_pos(b);
            let old = self.work.position(a);
            let position = if old < k { k - 1 } else { k };
            trace!(
                src = usize::from(s),
                dst = usize::from(b),
                old,
                position,
                "misaligned child"
            );
            self.script.push(Action::Move {
                src: s,
                dst: b,
                parent: Some(x),
                position,
            });
            self.work.move_to(a, w, position);
            self.in_order.insert(b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionKind;
    use crate::hash::HashStrategy;
    use crate::tree::{NodeData, TypeId};

    const ROOT: TypeId = TypeId::new(0);
    const BLOCK: TypeId = TypeId::new(1);
    const LEAF: TypeId = TypeId::new(2);

    fn flat(labels: &[&str]) -> (Tree, Vec<NodeId>) {
        let mut tree = Tree::new(NodeData::new(ROOT, "a"));
        let root = tree.root.unwrap();
        let children = labels
            .iter()
            .map(|label| tree.add_child(root, NodeData::new(LEAF, *label)))
            .collect();
        tree.prepare(HashStrategy::Rolling);
        (tree, children)
    }

    fn map_roots(src: &Tree, dst: &Tree, mappings: &mut MappingStore) {
        mappings.link(src, dst, src.root.unwrap(), dst.root.unwrap());
    }

    #[test]
    fn test_no_changes() {
        let (src, s) = flat(&["b", "c"]);
        let (dst, d) = flat(&["b", "c"]);
        let mut mappings = MappingStore::new();
        map_roots(&src, &dst, &mut mappings);
        mappings.link(&src, &dst, s[0], d[0]);
        mappings.link(&src, &dst, s[1], d[1]);
        assert!(generate_edit_script(&src, &dst, &mappings).is_empty());
    }

    #[test]
    fn test_swap_emits_one_move() {
        let (src, s) = flat(&["b", "c"]);
        let (dst, d) = flat(&["c", "b"]);
        let mut mappings = MappingStore::new();
        map_roots(&src, &dst, &mut mappings);
        mappings.link(&src, &dst, s[0], d[1]);
        mappings.link(&src, &dst, s[1], d[0]);

        let script = generate_edit_script(&src, &dst, &mappings);
        assert_eq!(script.len(), 1, "got {script:?}");
        assert_eq!(script.count(ActionKind::Move), 1);
    }

    #[test]
    fn test_insert_and_delete() {
        let (src, s) = flat(&["b", "gone"]);
        let (dst, d) = flat(&["b", "new"]);
        let mut mappings = MappingStore::new();
        map_roots(&src, &dst, &mut mappings);
        mappings.link(&src, &dst, s[0], d[0]);

        let script = generate_edit_script(&src, &dst, &mappings);
        assert_eq!(
            script.as_slice(),
            &[
                Action::Insert {
                    dst: d[1],
                    parent: dst.root,
                    position: 1,
                    kind: LEAF,
                    label: "new".to_owned(),
                },
                Action::Delete { src: s[1] },
            ]
        );
    }

    #[test]
    fn test_update_label() {
        let (src, s) = flat(&["count"]);
        let (dst, d) = flat(&["counter"]);
        let mut mappings = MappingStore::new();
        map_roots(&src, &dst, &mut mappings);
        mappings.link(&src, &dst, s[0], d[0]);

        let script = generate_edit_script(&src, &dst, &mappings);
        assert_eq!(
            script.as_slice(),
            &[Action::Update {
                src: s[0],
                dst: d[0],
                old_label: "count".to_owned(),
                new_label: "counter".to_owned(),
            }]
        );
    }

    #[test]
    fn test_move_to_other_parent() {
        // a(block(x), y) -> a(block(x, y))
        let mut src = Tree::new(NodeData::new(ROOT, "a"));
        let root = src.root.unwrap();
        let sb = src.add_child(root, NodeData::new(BLOCK, ""));
        let sx = src.add_child(sb, NodeData::new(LEAF, "x"));
        let sy = src.add_child(root, NodeData::new(LEAF, "y"));
        src.prepare(HashStrategy::Rolling);

        let mut dst = Tree::new(NodeData::new(ROOT, "a"));
        let root = dst.root.unwrap();
        let db = dst.add_child(root, NodeData::new(BLOCK, ""));
        let dx = dst.add_child(db, NodeData::new(LEAF, "x"));
        let dy = dst.add_child(db, NodeData::new(LEAF, "y"));
        dst.prepare(HashStrategy::Rolling);

        let mut mappings = MappingStore::new();
        map_roots(&src, &dst, &mut mappings);
        mappings.link(&src, &dst, sb, db);
        mappings.link(&src, &dst, sx, dx);
        mappings.link(&src, &dst, sy, dy);

        let script = generate_edit_script(&src, &dst, &mappings);
        assert_eq!(
            script.as_slice(),
            &[Action::Move {
                src: sy,
                dst: dy,
                parent: Some(db),
                position: 1,
            }]
        );
    }

    #[test]
    fn test_root_label_update() {
        let (src, _) = flat(&[]);
        let mut dst = Tree::new(NodeData::new(ROOT, "z"));
        dst.prepare(HashStrategy::Rolling);
        let mut mappings = MappingStore::new();
        map_roots(&src, &dst, &mut mappings);

        let script = generate_edit_script(&src, &dst, &mappings);
        assert_eq!(script.count(ActionKind::Update), 1);
        assert_eq!(script.len(), 1);
    }

    #[test]
    fn test_everything_deleted_against_empty_tree() {
        let (src, s) = flat(&["b", "c"]);
        let dst = Tree::empty();
        let script = generate_edit_script(&src, &dst, &MappingStore::new());
        assert_eq!(
            script.as_slice(),
            &[
                Action::Delete { src: s[0] },
                Action::Delete { src: s[1] },
                Action::Delete {
                    src: src.root.unwrap()
                },
            ]
        );
    }
}
