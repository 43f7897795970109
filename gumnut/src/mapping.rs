//! Node mappings between a source and a destination tree.

use indextree::NodeId;
use rapidhash::RapidHashMap as HashMap;
use smallvec::SmallVec;

use crate::trace;
use crate::tree::Tree;

/// A partial one-to-one mapping between source and destination nodes.
///
/// Uses Vec for O(1) lookups indexed by NodeId. Mapping a node that is
/// already mapped is a programming error and panics.
#[derive(Debug, Clone, Default)]
pub struct MappingStore {
    /// Map from source node to destination node (indexed by the source NodeId)
    src_to_dst: Vec<Option<NodeId>>,
    /// Map from destination node to source node (indexed by the destination NodeId)
    dst_to_src: Vec<Option<NodeId>>,
    /// All pairs in insertion order
    pairs: Vec<(NodeId, NodeId)>,
}

impl MappingStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store sized for the given trees.
    pub fn for_trees(src: &Tree, dst: &Tree) -> Self {
        Self {
            src_to_dst: vec![None; src.arena.count() + 1],
            dst_to_src: vec![None; dst.arena.count() + 1],
            pairs: Vec::new(),
        }
    }

    /// Record that `src` maps to `dst`.
    ///
    /// # Panics
    ///
    /// Panics if either node is already mapped.
    pub fn add(&mut self, src: NodeId, dst: NodeId) {
        let src_idx = usize::from(src);
        let dst_idx = usize::from(dst);

        if src_idx >= self.src_to_dst.len() {
            self.src_to_dst.resize(src_idx + 1, None);
        }
        if dst_idx >= self.dst_to_src.len() {
            self.dst_to_src.resize(dst_idx + 1, None);
        }

        if let Some(previous) = self.src_to_dst[src_idx] {
            panic!(
                "source node {} is already mapped to destination node {}, cannot map it to {}",
                src_idx,
                usize::from(previous),
                dst_idx
            );
        }
        if let Some(previous) = self.dst_to_src[dst_idx] {
            panic!(
                "destination node {} is already mapped to source node {}, cannot map it to {}",
                dst_idx,
                usize::from(previous),
                src_idx
            );
        }

        self.src_to_dst[src_idx] = Some(dst);
        self.dst_to_src[dst_idx] = Some(src);
        self.pairs.push((src, dst));
    }

    /// Record a mapping between two nodes of the given trees.
    ///
    /// # Panics
    ///
    /// Panics if the nodes have different types or either is already mapped.
    pub fn link(&mut self, src_tree: &Tree, dst_tree: &Tree, src: NodeId, dst: NodeId) {
        assert_eq!(
            src_tree.kind(src),
            dst_tree.kind(dst),
            "cannot map source node {} to destination node {} of another type",
            usize::from(src),
            usize::from(dst)
        );
        trace!(
            src = usize::from(src),
            dst = usize::from(dst),
            "link"
        );
        self.add(src, dst);
    }

    /// Map two isomorphic subtrees node for node.
    ///
    /// Walks both subtrees in parallel pre-order and skips pairs where either
    /// side is already mapped.
    pub fn add_recursively(&mut self, src_tree: &Tree, dst_tree: &Tree, src: NodeId, dst: NodeId) {
        for (s, d) in src_tree.subtree(src).zip(dst_tree.subtree(dst)) {
            if self.has_src(s) || self.has_dst(d) {
                continue;
            }
            self.link(src_tree, dst_tree, s, d);
        }
    }

    /// Whether both nodes are unmapped and share a type.
    pub fn is_mapping_allowed(
        &self,
        src_tree: &Tree,
        dst_tree: &Tree,
        src: NodeId,
        dst: NodeId,
    ) -> bool {
        src_tree.kind(src) == dst_tree.kind(dst) && !self.has_src(src) && !self.has_dst(dst)
    }

    /// Whether the source node is mapped.
    #[inline(always)]
    pub fn has_src(&self, src: NodeId) -> bool {
        self.get_dst(src).is_some()
    }

    /// Whether the destination node is mapped.
    #[inline(always)]
    pub fn has_dst(&self, dst: NodeId) -> bool {
        self.get_src(dst).is_some()
    }

    /// Whether exactly this pair is mapped.
    pub fn has(&self, src: NodeId, dst: NodeId) -> bool {
        self.get_dst(src) == Some(dst)
    }

    /// Partner of a source node.
    #[inline(always)]
    pub fn get_dst(&self, src: NodeId) -> Option<NodeId> {
        self.src_to_dst.get(usize::from(src)).copied().flatten()
    }

    /// Partner of a destination node.
    #[inline(always)]
    pub fn get_src(&self, dst: NodeId) -> Option<NodeId> {
        self.dst_to_src.get(usize::from(dst)).copied().flatten()
    }

    /// Whether no node of the subtree rooted at `src` is mapped.
    pub fn is_src_subtree_unmapped(&self, src_tree: &Tree, src: NodeId) -> bool {
        src_tree.subtree(src).all(|n| !self.has_src(n))
    }

    /// Whether no node of the subtree rooted at `dst` is mapped.
    pub fn is_dst_subtree_unmapped(&self, dst_tree: &Tree, dst: NodeId) -> bool {
        dst_tree.subtree(dst).all(|n| !self.has_dst(n))
    }

    /// All pairs in the order they were added.
    pub fn pairs(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.pairs.iter().copied()
    }

    /// Number of mapped pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Candidate pairs where a node may have several partners.
///
/// Used to collect isomorphic subtrees before ambiguities are resolved.
/// Iteration follows insertion order.
#[derive(Debug, Clone, Default)]
pub struct MultiMappingStore {
    src_to_dsts: HashMap<NodeId, SmallVec<[NodeId; 4]>>,
    dst_to_srcs: HashMap<NodeId, SmallVec<[NodeId; 4]>>,
    srcs: Vec<NodeId>,
}

impl MultiMappingStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a candidate pair. Duplicates are ignored.
    pub fn add(&mut self, src: NodeId, dst: NodeId) {
        let dsts = self.src_to_dsts.entry(src).or_default();
        if dsts.contains(&dst) {
            return;
        }
        if dsts.is_empty() {
            self.srcs.push(src);
        }
        dsts.push(dst);
        self.dst_to_srcs.entry(dst).or_default().push(src);
    }

    /// Source nodes with at least one candidate, in insertion order.
    pub fn srcs(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.srcs.iter().copied()
    }

    /// Candidate partners of a source node.
    pub fn dsts_of(&self, src: NodeId) -> &[NodeId] {
        self.src_to_dsts.get(&src).map_or(&[], |dsts| dsts.as_slice())
    }

    /// Candidate partners of a destination node.
    pub fn srcs_of(&self, dst: NodeId) -> &[NodeId] {
        self.dst_to_srcs.get(&dst).map_or(&[], |srcs| srcs.as_slice())
    }

    /// Whether `src` has a single candidate which in turn has `src` as its only candidate.
    pub fn is_src_unique(&self, src: NodeId) -> bool {
        match self.dsts_of(src) {
            [dst] => self.srcs_of(*dst).len() == 1,
            _ => false,
        }
    }

    /// Number of distinct source nodes.
    pub fn len(&self) -> usize {
        self.srcs.len()
    }

    /// Whether no candidate was recorded.
    pub fn is_empty(&self) -> bool {
        self.srcs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::HashStrategy;
    use crate::tree::{NodeData, TypeId};

    fn pair() -> (Tree, Tree) {
        let mut src = Tree::new(NodeData::new(TypeId::new(0), "r"));
        let root = src.root.unwrap();
        let a = src.add_child(root, NodeData::new(TypeId::new(1), ""));
        src.add_child(a, NodeData::new(TypeId::new(2), "x"));
        src.add_child(root, NodeData::new(TypeId::new(2), "y"));
        src.prepare(HashStrategy::Rolling);
        let dst = src.clone();
        (src, dst)
    }

    #[test]
    fn test_add_and_lookup() {
        let (src, dst) = pair();
        let mut store = MappingStore::for_trees(&src, &dst);
        let s = src.root.unwrap();
        let d = dst.root.unwrap();
        store.link(&src, &dst, s, d);
        assert!(store.has_src(s));
        assert!(store.has_dst(d));
        assert!(store.has(s, d));
        assert_eq!(store.get_dst(s), Some(d));
        assert_eq!(store.get_src(d), Some(s));
        assert_eq!(store.len(), 1);
    }

    #[test]
    #[should_panic(expected = "already mapped")]
    fn test_double_mapping_panics() {
        let (src, dst) = pair();
        let mut store = MappingStore::new();
        let s: Vec<_> = src.pre_order().collect();
        let d: Vec<_> = dst.pre_order().collect();
        store.add(s[2], d[2]);
        store.add(s[2], d[3]);
    }

    #[test]
    #[should_panic(expected = "another type")]
    fn test_type_mismatch_panics() {
        let (src, dst) = pair();
        let mut store = MappingStore::new();
        store.link(&src, &dst, src.root.unwrap(), dst.child(dst.root.unwrap(), 0).unwrap());
    }

    #[test]
    fn test_add_recursively_skips_mapped_nodes() {
        let (src, dst) = pair();
        let s: Vec<_> = src.pre_order().collect();
        let d: Vec<_> = dst.pre_order().collect();
        let mut store = MappingStore::new();
        // Leaf x already mapped somewhere else: the walk must tolerate it.
        store.add(s[2], d[2]);
        store.add_recursively(&src, &dst, s[0], d[0]);
        assert_eq!(store.len(), 4);
        for (a, b) in s.iter().zip(&d) {
            assert!(store.has(*a, *b));
        }
    }

    #[test]
    fn test_mapping_allowed() {
        let (src, dst) = pair();
        let s: Vec<_> = src.pre_order().collect();
        let d: Vec<_> = dst.pre_order().collect();
        let mut store = MappingStore::new();
        assert!(store.is_mapping_allowed(&src, &dst, s[2], d[3]));
        assert!(!store.is_mapping_allowed(&src, &dst, s[1], d[3]));
        store.add(s[2], d[2]);
        assert!(!store.is_mapping_allowed(&src, &dst, s[2], d[3]));
        assert!(!store.is_src_subtree_unmapped(&src, s[1]));
        assert!(store.is_dst_subtree_unmapped(&dst, d[3]));
    }

    #[test]
    fn test_multi_mapping_uniqueness() {
        let (src, dst) = pair();
        let s: Vec<_> = src.pre_order().collect();
        let d: Vec<_> = dst.pre_order().collect();
        let mut multi = MultiMappingStore::new();
        multi.add(s[1], d[1]);
        multi.add(s[2], d[2]);
        multi.add(s[2], d[3]);
        multi.add(s[3], d[3]);
        multi.add(s[3], d[3]);
        assert!(multi.is_src_unique(s[1]));
        assert!(!multi.is_src_unique(s[2]));
        assert!(!multi.is_src_unique(s[3]));
        assert_eq!(multi.srcs().collect::<Vec<_>>(), vec![s[1], s[2], s[3]]);
        assert_eq!(multi.srcs_of(d[3]), &[s[2], s[3]]);
    }
}
