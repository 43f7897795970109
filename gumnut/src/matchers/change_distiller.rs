//! Change-distiller inner node matching.
//!
//! Runs after the leaf pass. Every unmapped inner source node, in post-order,
//! is paired with the first unmapped inner destination node of the same type
//! (also in post-order) whose Chawathe similarity clears the threshold for
//! its leaf count.

use indextree::NodeId;

use super::Matcher;
use crate::config::MatchingConfig;
use crate::mapping::MappingStore;
use crate::similarity::chawathe;
use crate::tree::Tree;
use crate::{debug, trace};

/// Bottom-up phase of the change-distiller pipeline.
#[derive(Debug, Clone)]
pub struct ChangeDistillerBottomUpMatcher {
    /// Nodes with more leaves than this use `large_threshold`.
    pub max_leaves: usize,
    /// Threshold for nodes with more than `max_leaves` leaves.
    pub large_threshold: f64,
    /// Threshold for the remaining nodes.
    pub small_threshold: f64,
}

impl Default for ChangeDistillerBottomUpMatcher {
    fn default() -> Self {
        Self::from_config(&MatchingConfig::default())
    }
}

impl ChangeDistillerBottomUpMatcher {
    /// Build from the run configuration.
    pub fn from_config(config: &MatchingConfig) -> Self {
        Self {
            max_leaves: config.cd_max_leaves,
            large_threshold: config.cd_struct_sim1,
            small_threshold: config.cd_struct_sim2,
        }
    }

    fn threshold(&self, leaves: usize) -> f64 {
        if leaves > self.max_leaves {
            self.large_threshold
        } else {
            self.small_threshold
        }
    }
}

impl Matcher for ChangeDistillerBottomUpMatcher {
    fn name(&self) -> &'static str {
        "change-distiller-bottom-up"
    }

    fn match_trees(&self, src: &Tree, dst: &Tree, mappings: &mut MappingStore) {
        debug!(matched = mappings.len(), "change-distiller start");
        let dst_inner: Vec<NodeId> = dst.post_order().filter(|&d| !dst.is_leaf(d)).collect();

        for s in src.post_order() {
            if src.is_leaf(s) || mappings.has_src(s) {
                continue;
            }
            let threshold = self.threshold(src.leaves(s).count());
            for &d in &dst_inner {
                if !mappings.is_mapping_allowed(src, dst, s, d) {
                    continue;
                }
                let sim = chawathe(src, dst, s, d, mappings);
                if sim >= threshold {
                    trace!(
                        src = usize::from(s),
                        dst = usize::from(d),
                        sim,
                        "change-distiller pair"
                    );
                    mappings.link(src, dst, s, d);
                    break;
                }
            }
        }

        if let (Some(s), Some(d)) = (src.root, dst.root)
            && mappings.is_mapping_allowed(src, dst, s, d)
        {
            mappings.link(src, dst, s, d);
        }
        debug!(matched = mappings.len(), "change-distiller done");
    }
}
