//! Bottom-up similarity matching.
//!
//! Walks the source tree in post-order and pairs each unmapped inner node
//! with the destination candidate that shares the most mapped descendants.
//! The variants differ only in how candidates are proposed, how they are
//! scored and how the recovery step after an accepted pair works; the walk
//! itself lives in [`BottomUpMatcher`].

use indextree::NodeId;
use rapidhash::{RapidHashMap as HashMap, RapidHashSet as HashSet};

use super::Matcher;
use super::leaves::labels_close;
use super::zs::ZsMatcher;
use crate::config::MatchingConfig;
use crate::mapping::MappingStore;
use crate::sequence::lcs_by_isostructure;
use crate::similarity::SimilarityMetric;
use crate::tree::{Tree, TypeId};
use crate::{debug, trace};

/// Variant-specific parts of bottom-up matching.
pub trait BottomUpStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Destination nodes that `src_node` may be paired with.
    fn propose_candidates(
        &self,
        src: &Tree,
        dst: &Tree,
        src_node: NodeId,
        mappings: &MappingStore,
    ) -> Vec<NodeId>;

    /// Similarity of a candidate pair.
    fn score(
        &self,
        src: &Tree,
        dst: &Tree,
        src_node: NodeId,
        dst_node: NodeId,
        mappings: &MappingStore,
    ) -> f64;

    /// Whether a score is good enough to pair the nodes.
    fn accept(&self, score: f64) -> bool;

    /// Variant-specific recovery run right after `src_node` and `dst_node`
    /// were paired. Every pair it adds must go through `allowed`.
    fn last_chance(
        &self,
        _src: &Tree,
        _dst: &Tree,
        _src_node: NodeId,
        _dst_node: NodeId,
        _mappings: &mut MappingStore,
        _allowed: &dyn Fn(NodeId, NodeId, &MappingStore) -> bool,
    ) {
    }
}

/// Drives a [`BottomUpStrategy`] over the source tree.
#[derive(Debug, Clone)]
pub struct BottomUpMatcher<S> {
    strategy: S,
    label_sim: f64,
}

impl<S: BottomUpStrategy> BottomUpMatcher<S> {
    /// Wrap a strategy; leaf pairs with different labels recovered along the
    /// way must clear `config.cd_label_sim`.
    pub fn new(strategy: S, config: &MatchingConfig) -> Self {
        Self {
            strategy,
            label_sim: config.cd_label_sim,
        }
    }

    /// The wrapped strategy.
    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    fn recover(
        &self,
        src: &Tree,
        dst: &Tree,
        src_node: NodeId,
        dst_node: NodeId,
        mappings: &mut MappingStore,
    ) {
        let allowed = |s: NodeId, d: NodeId, mappings: &MappingStore| {
            mappings.is_mapping_allowed(src, dst, s, d)
                && labels_close(src, dst, s, d, self.label_sim)
        };
        let before = mappings.len();
        self.strategy
            .last_chance(src, dst, src_node, dst_node, mappings, &allowed);
        map_unique_type_children(src, dst, src_node, dst_node, mappings, &allowed);
        trace!(
            src = usize::from(src_node),
            dst = usize::from(dst_node),
            recovered = mappings.len() - before,
            "last chance"
        );
    }
}

impl<S: BottomUpStrategy> Matcher for BottomUpMatcher<S> {
    fn name(&self) -> &'static str {
        self.strategy.name()
    }

    fn match_trees(&self, src: &Tree, dst: &Tree, mappings: &mut MappingStore) {
        let (Some(src_root), Some(dst_root)) = (src.root, dst.root) else {
            return;
        };
        debug!(
            variant = self.strategy.name(),
            matched = mappings.len(),
            "bottom-up start"
        );

        for node in src.post_order() {
            if node == src_root {
                if mappings.is_mapping_allowed(src, dst, src_root, dst_root) {
                    mappings.link(src, dst, src_root, dst_root);
                }
                if mappings.has(src_root, dst_root) {
                    self.recover(src, dst, src_root, dst_root, mappings);
                }
                break;
            }
            if mappings.has_src(node) || src.is_leaf(node) {
                continue;
            }

            let mut best = None;
            let mut max = -1.0;
            for candidate in self.strategy.propose_candidates(src, dst, node, mappings) {
                let score = self.strategy.score(src, dst, node, candidate, mappings);
                trace!(
                    src = usize::from(node),
                    dst = usize::from(candidate),
                    score,
                    "bottom-up candidate"
                );
                if score > max && self.strategy.accept(score) {
                    max = score;
                    best = Some(candidate);
                }
            }

            if let Some(best) = best {
                mappings.link(src, dst, node, best);
                self.recover(src, dst, node, best, mappings);
            }
        }

        debug!(
            variant = self.strategy.name(),
            matched = mappings.len(),
            "bottom-up done"
        );
    }
}

/// Unmapped destination ancestors of the partners of `src_node`'s mapped
/// descendants that share its type. Ordered by discovery.
fn ancestors_of_images(
    src: &Tree,
    dst: &Tree,
    src_node: NodeId,
    mappings: &MappingStore,
    allow_root: bool,
) -> Vec<NodeId> {
    let kind = src.kind(src_node);
    let mut candidates = Vec::new();
    let mut visited: HashSet<NodeId> = HashSet::default();
    for seed in src.descendants(src_node).filter_map(|s| mappings.get_dst(s)) {
        let mut current = seed;
        while let Some(parent) = dst.parent(current) {
            if !visited.insert(parent) {
                break;
            }
            if dst.kind(parent) == kind
                && !mappings.has_dst(parent)
                && (allow_root || !dst.is_root(parent))
            {
                candidates.push(parent);
            }
            current = parent;
        }
    }
    candidates
}

/// Pair children whose type occurs exactly once among the children on both sides.
fn map_unique_type_children(
    src: &Tree,
    dst: &Tree,
    src_node: NodeId,
    dst_node: NodeId,
    mappings: &mut MappingStore,
    allowed: &dyn Fn(NodeId, NodeId, &MappingStore) -> bool,
) {
    let src_kinds = children_by_kind(src, src_node);
    let dst_kinds = children_by_kind(dst, dst_node);
    for s in src.children(src_node) {
        let kind = src.kind(s);
        let (Some(&(1, _)), Some(&(1, d))) = (src_kinds.get(&kind), dst_kinds.get(&kind)) else {
            continue;
        };
        if allowed(s, d, mappings) {
            mappings.link(src, dst, s, d);
        }
    }
}

/// Per type: how many children have it, and the first such child.
fn children_by_kind(tree: &Tree, node: NodeId) -> HashMap<TypeId, (usize, NodeId)> {
    let mut kinds: HashMap<TypeId, (usize, NodeId)> = HashMap::default();
    for child in tree.children(node) {
        kinds
            .entry(tree.kind(child))
            .and_modify(|(count, _)| *count += 1)
            .or_insert((1, child));
    }
    kinds
}

/// Classic GumTree bottom-up: Dice similarity, recovery through an optimal
/// edit mapping of the paired subtrees when both are small enough.
#[derive(Debug, Clone)]
pub struct GreedyBottomUp {
    /// Minimum Dice similarity.
    pub min_sim: f64,
    /// The optimal recovery runs only when both subtrees are smaller than
    /// this, so a single oversized side is enough to skip it.
    pub max_size: usize,
}

impl GreedyBottomUp {
    /// Build from the run configuration.
    pub fn from_config(config: &MatchingConfig) -> Self {
        Self {
            min_sim: config.bu_min_sim,
            max_size: config.bu_max_size,
        }
    }
}

impl BottomUpStrategy for GreedyBottomUp {
    fn name(&self) -> &'static str {
        "greedy-bottom-up"
    }

    fn propose_candidates(
        &self,
        src: &Tree,
        dst: &Tree,
        src_node: NodeId,
        mappings: &MappingStore,
    ) -> Vec<NodeId> {
        ancestors_of_images(src, dst, src_node, mappings, false)
    }

    fn score(
        &self,
        src: &Tree,
        dst: &Tree,
        src_node: NodeId,
        dst_node: NodeId,
        mappings: &MappingStore,
    ) -> f64 {
        SimilarityMetric::Dice.score(src, dst, src_node, dst_node, mappings)
    }

    fn accept(&self, score: f64) -> bool {
        score >= self.min_sim
    }

    fn last_chance(
        &self,
        src: &Tree,
        dst: &Tree,
        src_node: NodeId,
        dst_node: NodeId,
        mappings: &mut MappingStore,
        allowed: &dyn Fn(NodeId, NodeId, &MappingStore) -> bool,
    ) {
        optimal_recovery(self.max_size, src, dst, src_node, dst_node, mappings, allowed);
    }
}

/// Map the pairs of an optimal edit mapping between the two subtrees, when
/// both are smaller than `max_size`.
fn optimal_recovery(
    max_size: usize,
    src: &Tree,
    dst: &Tree,
    src_node: NodeId,
    dst_node: NodeId,
    mappings: &mut MappingStore,
    allowed: &dyn Fn(NodeId, NodeId, &MappingStore) -> bool,
) {
    if src.size(src_node) >= max_size || dst.size(dst_node) >= max_size {
        return;
    }
    let optimal = ZsMatcher::match_subtrees(src, dst, src_node, dst_node);
    for (s, d) in optimal.pairs() {
        if allowed(s, d, mappings) {
            mappings.link(src, dst, s, d);
        }
    }
}

/// Overlap similarity, recovery through an LCS of isostructural children.
#[derive(Debug, Clone)]
pub struct SimpleBottomUp {
    /// Minimum overlap similarity.
    pub min_sim: f64,
}

impl SimpleBottomUp {
    /// Build from the run configuration.
    pub fn from_config(config: &MatchingConfig) -> Self {
        Self {
            min_sim: config.bu_min_sim,
        }
    }
}

impl BottomUpStrategy for SimpleBottomUp {
    fn name(&self) -> &'static str {
        "simple-bottom-up"
    }

    fn propose_candidates(
        &self,
        src: &Tree,
        dst: &Tree,
        src_node: NodeId,
        mappings: &MappingStore,
    ) -> Vec<NodeId> {
        ancestors_of_images(src, dst, src_node, mappings, false)
    }

    fn score(
        &self,
        src: &Tree,
        dst: &Tree,
        src_node: NodeId,
        dst_node: NodeId,
        mappings: &MappingStore,
    ) -> f64 {
        SimilarityMetric::Overlap.score(src, dst, src_node, dst_node, mappings)
    }

    fn accept(&self, score: f64) -> bool {
        score >= self.min_sim
    }

    fn last_chance(
        &self,
        src: &Tree,
        dst: &Tree,
        src_node: NodeId,
        dst_node: NodeId,
        mappings: &mut MappingStore,
        allowed: &dyn Fn(NodeId, NodeId, &MappingStore) -> bool,
    ) {
        let src_children: Vec<NodeId> = src.children(src_node).collect();
        let dst_children: Vec<NodeId> = dst.children(dst_node).collect();
        for (i, j) in lcs_by_isostructure(src, &src_children, dst, &dst_children) {
            let (s, d) = (src_children[i], dst_children[j]);
            if !mappings.is_src_subtree_unmapped(src, s) || !mappings.is_dst_subtree_unmapped(dst, d)
            {
                continue;
            }
            for (a, b) in src.subtree(s).zip(dst.subtree(d)) {
                if allowed(a, b, mappings) {
                    mappings.link(src, dst, a, b);
                }
            }
        }
    }
}

/// Jaccard similarity over candidates that may include the destination root.
#[derive(Debug, Clone)]
pub struct XyBottomUp {
    /// Minimum Jaccard similarity.
    pub min_sim: f64,
}

impl XyBottomUp {
    /// Build from the run configuration.
    pub fn from_config(config: &MatchingConfig) -> Self {
        Self {
            min_sim: config.xy_min_sim,
        }
    }
}

impl BottomUpStrategy for XyBottomUp {
    fn name(&self) -> &'static str {
        "xy-bottom-up"
    }

    fn propose_candidates(
        &self,
        src: &Tree,
        dst: &Tree,
        src_node: NodeId,
        mappings: &MappingStore,
    ) -> Vec<NodeId> {
        ancestors_of_images(src, dst, src_node, mappings, true)
    }

    fn score(
        &self,
        src: &Tree,
        dst: &Tree,
        src_node: NodeId,
        dst_node: NodeId,
        mappings: &MappingStore,
    ) -> f64 {
        SimilarityMetric::Jaccard.score(src, dst, src_node, dst_node, mappings)
    }

    fn accept(&self, score: f64) -> bool {
        score >= self.min_sim
    }
}

/// Pairs every unmapped inner node that has a candidate at all: the most
/// Jaccard-similar one wins whatever its score, then the optimal recovery
/// runs as in [`GreedyBottomUp`].
#[derive(Debug, Clone)]
pub struct CompleteBottomUp {
    /// Subtrees at least this large skip the optimal recovery.
    pub max_size: usize,
}

impl CompleteBottomUp {
    /// Build from the run configuration.
    pub fn from_config(config: &MatchingConfig) -> Self {
        Self {
            max_size: config.bu_max_size,
        }
    }
}

impl BottomUpStrategy for CompleteBottomUp {
    fn name(&self) -> &'static str {
        "complete-bottom-up"
    }

    fn propose_candidates(
        &self,
        src: &Tree,
        dst: &Tree,
        src_node: NodeId,
        mappings: &MappingStore,
    ) -> Vec<NodeId> {
        ancestors_of_images(src, dst, src_node, mappings, false)
    }

    fn score(
        &self,
        src: &Tree,
        dst: &Tree,
        src_node: NodeId,
        dst_node: NodeId,
        mappings: &MappingStore,
    ) -> f64 {
        SimilarityMetric::Jaccard.score(src, dst, src_node, dst_node, mappings)
    }

    fn accept(&self, score: f64) -> bool {
        score >= 0.0
    }

    fn last_chance(
        &self,
        src: &Tree,
        dst: &Tree,
        src_node: NodeId,
        dst_node: NodeId,
        mappings: &mut MappingStore,
        allowed: &dyn Fn(NodeId, NodeId, &MappingStore) -> bool,
    ) {
        optimal_recovery(self.max_size, src, dst, src_node, dst_node, mappings, allowed);
    }
}
