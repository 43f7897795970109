//! Leaf matching by label similarity.
//!
//! Every unmapped source leaf is scored against every unmapped destination
//! leaf of the same type. Pairs above the threshold are committed globally,
//! best first, each leaf at most once.

use indextree::NodeId;
use rayon::prelude::*;

use super::Matcher;
use crate::config::MatchingConfig;
use crate::mapping::MappingStore;
use crate::similarity::label_similarity;
use crate::tree::Tree;
use crate::{debug, trace};

/// Whether a pair may be mapped as far as labels go: anything but two leaves
/// with different labels passes, those need a label similarity above `threshold`.
pub(crate) fn labels_close(src: &Tree, dst: &Tree, s: NodeId, d: NodeId, threshold: f64) -> bool {
    if !(src.is_leaf(s) && dst.is_leaf(d)) {
        return true;
    }
    let (a, b) = (src.label(s), dst.label(d));
    a == b || label_similarity(a, b) > threshold
}

/// Global greedy leaf matcher.
#[derive(Debug, Clone)]
pub struct LeavesMatcher {
    /// Pairs need a label similarity strictly above this value.
    pub threshold: f64,
    /// Score the cross product on the rayon pool.
    pub parallel: bool,
}

impl Default for LeavesMatcher {
    fn default() -> Self {
        Self::from_config(&MatchingConfig::default())
    }
}

impl LeavesMatcher {
    /// Build from the run configuration.
    pub fn from_config(config: &MatchingConfig) -> Self {
        Self {
            threshold: config.cd_label_sim,
            parallel: config.parallel_leaves,
        }
    }

    /// Candidate pairs in discovery order: source leaves in post-order, each
    /// against destination leaves in post-order.
    fn candidates(
        &self,
        src: &Tree,
        dst: &Tree,
        mappings: &MappingStore,
    ) -> Vec<(NodeId, NodeId, f64)> {
        let src_leaves: Vec<NodeId> = src
            .post_order()
            .filter(|&n| src.is_leaf(n) && !mappings.has_src(n))
            .collect();
        let dst_leaves: Vec<NodeId> = dst
            .post_order()
            .filter(|&n| dst.is_leaf(n) && !mappings.has_dst(n))
            .collect();

        let score_row = |&s: &NodeId| -> Vec<(NodeId, NodeId, f64)> {
            dst_leaves
                .iter()
                .filter(|&&d| src.kind(s) == dst.kind(d))
                .filter_map(|&d| {
                    let sim = label_similarity(src.label(s), dst.label(d));
                    (sim > self.threshold).then_some((s, d, sim))
                })
                .collect()
        };

        let rows: Vec<Vec<(NodeId, NodeId, f64)>> = if self.parallel {
            src_leaves.par_iter().map(score_row).collect()
        } else {
            src_leaves.iter().map(score_row).collect()
        };
        rows.concat()
    }
}

impl Matcher for LeavesMatcher {
    fn name(&self) -> &'static str {
        "leaves"
    }

    fn match_trees(&self, src: &Tree, dst: &Tree, mappings: &mut MappingStore) {
        let mut candidates = self.candidates(src, dst, mappings);
        debug!(
            candidates = candidates.len(),
            parallel = self.parallel,
            "leaves start"
        );

        // Stable: equal scores keep discovery order.
        candidates.sort_by(|a, b| b.2.total_cmp(&a.2));

        for (s, d, sim) in candidates {
            if mappings.has_src(s) || mappings.has_dst(d) {
                continue;
            }
            trace!(
                src = usize::from(s),
                dst = usize::from(d),
                sim,
                "leaf pair"
            );
            mappings.link(src, dst, s, d);
        }
        debug!(matched = mappings.len(), "leaves done");
    }
}
