//! Greedy subtree matching.
//!
//! Anchors mappings between maximal isomorphic subtrees before any similarity
//! heuristic runs. Subtrees are visited by decreasing priority; at each
//! priority level candidates are grouped by hash and confirmed isomorphic.
//! Unambiguous pairs are mapped right away, ambiguous ones are ranked and
//! committed greedily once the whole trees have been scanned.

use std::collections::BTreeMap;

use indextree::NodeId;
use rapidhash::{RapidHashMap as HashMap, RapidHashSet as HashSet};

use super::Matcher;
use crate::config::{MatchingConfig, SubtreePriority};
use crate::hash::NodeHash;
use crate::mapping::{MappingStore, MultiMappingStore};
use crate::similarity::jaccard;
use crate::tree::Tree;
use crate::{debug, trace};

/// Greedy top-down matcher over isomorphic subtrees.
#[derive(Debug, Clone)]
pub struct GreedySubtreeMatcher {
    /// Subtrees with a lower priority are ignored.
    pub min_priority: usize,
    /// How subtrees are prioritized.
    pub priority: SubtreePriority,
}

impl Default for GreedySubtreeMatcher {
    fn default() -> Self {
        Self::from_config(&MatchingConfig::default())
    }
}

impl GreedySubtreeMatcher {
    /// Build from the run configuration.
    pub fn from_config(config: &MatchingConfig) -> Self {
        Self {
            min_priority: config.min_height,
            priority: config.priority,
        }
    }
}

/// Subtrees bucketed by priority, highest first.
struct PriorityTreeList<'a> {
    tree: &'a Tree,
    priority: SubtreePriority,
    min_priority: usize,
    buckets: BTreeMap<usize, Vec<NodeId>>,
}

impl<'a> PriorityTreeList<'a> {
    fn new(tree: &'a Tree, priority: SubtreePriority, min_priority: usize) -> Self {
        let mut list = Self {
            tree,
            priority,
            min_priority,
            buckets: BTreeMap::new(),
        };
        if let Some(root) = tree.root {
            list.push(root);
        }
        list
    }

    fn priority_of(&self, id: NodeId) -> usize {
        match self.priority {
            SubtreePriority::Height => self.tree.height(id),
            SubtreePriority::Size => self.tree.size(id),
        }
    }

    fn push(&mut self, id: NodeId) {
        let priority = self.priority_of(id);
        if priority >= self.min_priority {
            self.buckets.entry(priority).or_default().push(id);
        }
    }

    fn peek(&self) -> Option<usize> {
        self.buckets.keys().next_back().copied()
    }

    fn pop(&mut self) -> Vec<NodeId> {
        self.buckets
            .pop_last()
            .map(|(_, nodes)| nodes)
            .unwrap_or_default()
    }

    /// Replace a subtree by its children.
    fn open(&mut self, id: NodeId) {
        let children: Vec<NodeId> = self.tree.children(id).collect();
        for child in children {
            self.push(child);
        }
    }

    /// Replace every subtree of the highest bucket by its children.
    fn open_top(&mut self) {
        for id in self.pop() {
            self.open(id);
        }
    }
}

impl Matcher for GreedySubtreeMatcher {
    fn name(&self) -> &'static str {
        "greedy-subtree"
    }

    fn match_trees(&self, src: &Tree, dst: &Tree, mappings: &mut MappingStore) {
        debug!(matched = mappings.len(), "greedy subtree start");
        let mut multi = MultiMappingStore::new();
        let mut src_trees = PriorityTreeList::new(src, self.priority, self.min_priority);
        let mut dst_trees = PriorityTreeList::new(dst, self.priority, self.min_priority);

        while let (Some(src_priority), Some(dst_priority)) = (src_trees.peek(), dst_trees.peek()) {
            if src_priority != dst_priority {
                if src_priority > dst_priority {
                    src_trees.open_top();
                } else {
                    dst_trees.open_top();
                }
                continue;
            }

            let current_src = src_trees.pop();
            let current_dst = dst_trees.pop();
            let mut src_marks = vec![false; current_src.len()];
            let mut dst_marks = vec![false; current_dst.len()];

            let mut dst_by_hash: HashMap<NodeHash, Vec<usize>> = HashMap::default();
            for (j, &d) in current_dst.iter().enumerate() {
                dst_by_hash.entry(dst.hash(d)).or_default().push(j);
            }

            for (i, &s) in current_src.iter().enumerate() {
                let Some(same_hash) = dst_by_hash.get(&src.hash(s)) else {
                    continue;
                };
                for &j in same_hash {
                    let d = current_dst[j];
                    if src.is_isomorphic(s, dst, d) {
                        trace!(
                            src = usize::from(s),
                            dst = usize::from(d),
                            priority = src_priority,
                            "isomorphic candidates"
                        );
                        multi.add(s, d);
                        src_marks[i] = true;
                        dst_marks[j] = true;
                    }
                }
            }

            for (i, &s) in current_src.iter().enumerate() {
                if !src_marks[i] {
                    src_trees.open(s);
                }
            }
            for (j, &d) in current_dst.iter().enumerate() {
                if !dst_marks[j] {
                    dst_trees.open(d);
                }
            }
        }

        self.filter_mappings(src, dst, &multi, mappings);
        debug!(matched = mappings.len(), "greedy subtree done");
    }
}

impl GreedySubtreeMatcher {
    /// Map unique candidates recursively, then rank and greedily commit the ambiguous ones.
    fn filter_mappings(
        &self,
        src: &Tree,
        dst: &Tree,
        multi: &MultiMappingStore,
        mappings: &mut MappingStore,
    ) {
        let mut ambiguous: Vec<(NodeId, NodeId)> = Vec::new();
        let mut ignored: HashSet<NodeId> = HashSet::default();

        for s in multi.srcs() {
            let dsts = multi.dsts_of(s);
            if multi.is_src_unique(s) {
                mappings.add_recursively(src, dst, s, dsts[0]);
            } else if !ignored.contains(&s) {
                let srcs = multi.srcs_of(dsts[0]);
                for &candidate_src in srcs {
                    for &candidate_dst in dsts {
                        ambiguous.push((candidate_src, candidate_dst));
                    }
                }
                ignored.extend(srcs.iter().copied());
            }
        }

        debug!(ambiguous = ambiguous.len(), "ranking ambiguous candidates");

        let max_size = match (src.root, dst.root) {
            (Some(s), Some(d)) => src.size(s).max(dst.size(d)),
            _ => 1,
        };
        let mut ranked: Vec<(usize, f64, usize, usize, NodeId, NodeId)> = ambiguous
            .into_iter()
            .map(|(s, d)| {
                let score = sibling_score(src, dst, s, d, mappings, max_size);
                (
                    src.size(s),
                    score,
                    src.metrics(s).pre_order,
                    dst.metrics(d).pre_order,
                    s,
                    d,
                )
            })
            .collect();
        // Largest subtrees first, then best score, then pre-order positions.
        ranked.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| b.1.total_cmp(&a.1))
                .then_with(|| a.2.cmp(&b.2))
                .then_with(|| a.3.cmp(&b.3))
        });

        let mut src_ignored: HashSet<NodeId> = HashSet::default();
        let mut dst_ignored: HashSet<NodeId> = HashSet::default();
        for (_, _score, _, _, s, d) in ranked {
            if src_ignored.contains(&s) || dst_ignored.contains(&d) {
                continue;
            }
            if mappings.has_src(s) || mappings.has_dst(d) {
                continue;
            }
            trace!(
                src = usize::from(s),
                dst = usize::from(d),
                score = _score,
                "commit ambiguous"
            );
            mappings.add_recursively(src, dst, s, d);
            src_ignored.insert(s);
            dst_ignored.insert(d);
        }
    }
}

/// Context score of an ambiguous pair: parents' Jaccard similarity weighs
/// 100, relative position among siblings 10, absolute pre-order distance 1.
fn sibling_score(
    src: &Tree,
    dst: &Tree,
    s: NodeId,
    d: NodeId,
    mappings: &MappingStore,
    max_size: usize,
) -> f64 {
    let parents = match (src.parent(s), dst.parent(d)) {
        (Some(ps), Some(pd)) => jaccard(src, dst, ps, pd, mappings),
        _ => 0.0,
    };

    let (pos_src, len_src) = match src.parent(s) {
        Some(parent) => (src.position(s), src.child_count(parent)),
        None => (0, 1),
    };
    let (pos_dst, len_dst) = match dst.parent(d) {
        Some(parent) => (dst.position(d), dst.child_count(parent)),
        None => (0, 1),
    };
    let position = 1.0 - pos_src.abs_diff(pos_dst) as f64 / len_src.max(len_dst) as f64;

    let numbering = 1.0
        - src.metrics(s).pre_order.abs_diff(dst.metrics(d).pre_order) as f64 / max_size as f64;

    100.0 * parents + 10.0 * position + numbering
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::HashStrategy;
    use crate::tree::{NodeData, TypeId};

    const BLOCK: TypeId = TypeId::new(0);
    const STMT: TypeId = TypeId::new(1);
    const NAME: TypeId = TypeId::new(2);

    fn stmt(tree: &mut Tree, parent: NodeId, name: &str) -> NodeId {
        let s = tree.add_child(parent, NodeData::new(STMT, ""));
        tree.add_child(s, NodeData::new(NAME, name));
        s
    }

    #[test]
    fn test_identical_trees_fully_matched() {
        let mut src = Tree::new(NodeData::new(BLOCK, ""));
        let root = src.root.unwrap();
        stmt(&mut src, root, "a");
        stmt(&mut src, root, "b");
        src.prepare(HashStrategy::Rolling);
        let dst = src.clone();

        let mut mappings = MappingStore::new();
        GreedySubtreeMatcher::default().match_trees(&src, &dst, &mut mappings);
        assert_eq!(mappings.len(), 5);
        for (s, d) in src.pre_order().zip(dst.pre_order()) {
            assert!(mappings.has(s, d));
        }
    }

    #[test]
    fn test_ambiguous_duplicates_resolved_by_position() {
        // src: block(x, y, x)   dst: block(x, y, x, z)
        let mut src = Tree::new(NodeData::new(BLOCK, ""));
        let sr = src.root.unwrap();
        let s0 = stmt(&mut src, sr, "x");
        stmt(&mut src, sr, "y");
        let s2 = stmt(&mut src, sr, "x");
        src.prepare(HashStrategy::Rolling);

        let mut dst = Tree::new(NodeData::new(BLOCK, ""));
        let dr = dst.root.unwrap();
        let d0 = stmt(&mut dst, dr, "x");
        stmt(&mut dst, dr, "y");
        let d2 = stmt(&mut dst, dr, "x");
        stmt(&mut dst, dr, "z");
        dst.prepare(HashStrategy::Rolling);

        let mut mappings = MappingStore::new();
        GreedySubtreeMatcher::default().match_trees(&src, &dst, &mut mappings);
        assert!(mappings.has(s0, d0), "first x maps to first x");
        assert!(mappings.has(s2, d2), "second x maps to second x");
        assert!(!mappings.has_src(sr), "roots differ and are left to later phases");
    }

    #[test]
    fn test_matching_is_deterministic() {
        let mut src = Tree::new(NodeData::new(BLOCK, ""));
        let sr = src.root.unwrap();
        for name in ["a", "a", "b", "a"] {
            stmt(&mut src, sr, name);
        }
        src.prepare(HashStrategy::Rolling);
        let mut dst = Tree::new(NodeData::new(BLOCK, ""));
        let dr = dst.root.unwrap();
        for name in ["a", "b", "a", "a", "a"] {
            stmt(&mut dst, dr, name);
        }
        dst.prepare(HashStrategy::Rolling);

        let run = || {
            let mut mappings = MappingStore::new();
            GreedySubtreeMatcher::default().match_trees(&src, &dst, &mut mappings);
            mappings.pairs().collect::<Vec<_>>()
        };
        let first = run();
        assert_eq!(first.len(), 8);
        assert_eq!(first, run());
    }

    #[test]
    fn test_min_priority_skips_small_subtrees() {
        let mut src = Tree::new(NodeData::new(BLOCK, ""));
        let sr = src.root.unwrap();
        stmt(&mut src, sr, "a");
        src.add_child(sr, NodeData::new(NAME, "lonely"));
        src.prepare(HashStrategy::Rolling);
        let mut dst = Tree::new(NodeData::new(BLOCK, "changed"));
        let dr = dst.root.unwrap();
        stmt(&mut dst, dr, "a");
        dst.add_child(dr, NodeData::new(NAME, "lonely"));
        dst.prepare(HashStrategy::Rolling);

        let matcher = GreedySubtreeMatcher {
            min_priority: 2,
            priority: SubtreePriority::Height,
        };
        let mut mappings = MappingStore::new();
        matcher.match_trees(&src, &dst, &mut mappings);
        assert_eq!(mappings.len(), 2, "only the statement and its name");
    }

    #[test]
    fn test_empty_trees() {
        let src = Tree::empty();
        let mut dst = Tree::new(NodeData::new(BLOCK, ""));
        dst.prepare(HashStrategy::Rolling);
        let mut mappings = MappingStore::new();
        GreedySubtreeMatcher::default().match_trees(&src, &dst, &mut mappings);
        assert!(mappings.is_empty());
    }
}
