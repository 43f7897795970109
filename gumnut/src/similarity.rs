//! Similarity metrics used to score candidate pairs.
//!
//! Structural metrics compare the *mapped* descendants of two nodes: a source
//! descendant is common when its partner is a descendant of the destination
//! node. Label similarity compares leaf labels through q-gram distance.

use indextree::NodeId;
use str_distance::{DistanceMetric, QGram};

use crate::mapping::MappingStore;
use crate::tree::Tree;

/// Size of the q-grams used for label similarity.
pub const QGRAM_SIZE: usize = 3;

/// Number of descendants of `src` whose partner is a descendant of `dst`.
pub fn common_descendants(
    src_tree: &Tree,
    dst_tree: &Tree,
    src: NodeId,
    dst: NodeId,
    mappings: &MappingStore,
) -> usize {
    src_tree
        .descendants(src)
        .filter(|&s| {
            mappings
                .get_dst(s)
                .is_some_and(|d| dst_tree.is_descendant(dst, d))
        })
        .count()
}

/// Structural similarity metric over mapped descendants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarityMetric {
    /// `2c / (s + d)`
    Dice,
    /// `c / (s + d - c)`
    Jaccard,
    /// `c / max(s, d)`
    Chawathe,
    /// `c / min(s, d)`
    Overlap,
}

impl SimilarityMetric {
    /// Score a pair given the number of common descendants and both descendant counts.
    ///
    /// Returns 0.0 when the denominator is zero.
    pub fn from_counts(self, common: usize, src_count: usize, dst_count: usize) -> f64 {
        let (numerator, denominator) = match self {
            SimilarityMetric::Dice => (2 * common, src_count + dst_count),
            SimilarityMetric::Jaccard => (common, (src_count + dst_count).saturating_sub(common)),
            SimilarityMetric::Chawathe => (common, src_count.max(dst_count)),
            SimilarityMetric::Overlap => (common, src_count.min(dst_count)),
        };
        if denominator == 0 {
            0.0
        } else {
            numerator as f64 / denominator as f64
        }
    }

    /// Score `src` against `dst` under the current mappings.
    pub fn score(
        self,
        src_tree: &Tree,
        dst_tree: &Tree,
        src: NodeId,
        dst: NodeId,
        mappings: &MappingStore,
    ) -> f64 {
        let common = common_descendants(src_tree, dst_tree, src, dst, mappings);
        self.from_counts(common, src_tree.size(src) - 1, dst_tree.size(dst) - 1)
    }
}

/// Jaccard similarity of two nodes.
pub fn jaccard(src_tree: &Tree, dst_tree: &Tree, src: NodeId, dst: NodeId, mappings: &MappingStore) -> f64 {
    SimilarityMetric::Jaccard.score(src_tree, dst_tree, src, dst, mappings)
}

/// Chawathe similarity of two nodes.
pub fn chawathe(src_tree: &Tree, dst_tree: &Tree, src: NodeId, dst: NodeId, mappings: &MappingStore) -> f64 {
    SimilarityMetric::Chawathe.score(src_tree, dst_tree, src, dst, mappings)
}

/// Similarity of two labels in `[0, 1]`, `1 - normalized q-gram distance`.
///
/// The q-gram size is [`QGRAM_SIZE`], shrunk to the length of the shorter
/// label so that one- and two-character labels still produce q-grams. The
/// distance is normalized by the total number of q-grams of both labels.
/// Identical labels score 1.0; an empty label against a non-empty one scores 0.0.
pub fn label_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let (len_a, len_b) = (a.chars().count(), b.chars().count());
    if len_a == 0 || len_b == 0 {
        return 0.0;
    }
    let q = QGRAM_SIZE.min(len_a).min(len_b);
    let grams = (len_a + 1 - q) + (len_b + 1 - q);
    let distance = QGram::new(q).distance(a.chars(), b.chars());
    (1.0 - distance as f64 / grams as f64).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::HashStrategy;
    use crate::tree::{NodeData, TypeId};

    #[test]
    fn test_metrics_from_counts() {
        assert_eq!(SimilarityMetric::Dice.from_counts(2, 3, 5), 0.5);
        assert_eq!(SimilarityMetric::Jaccard.from_counts(2, 3, 5), 1.0 / 3.0);
        assert_eq!(SimilarityMetric::Chawathe.from_counts(2, 3, 5), 0.4);
        assert_eq!(SimilarityMetric::Overlap.from_counts(3, 3, 5), 1.0);
        for metric in [
            SimilarityMetric::Dice,
            SimilarityMetric::Jaccard,
            SimilarityMetric::Chawathe,
            SimilarityMetric::Overlap,
        ] {
            assert_eq!(metric.from_counts(0, 0, 0), 0.0, "{metric:?} on two leaves");
        }
    }

    #[test]
    fn test_common_descendants_follow_mappings() {
        // src: p(a, b, c)   dst: q(a, b), r(c)
        let kind = TypeId::new(0);
        let mut src = Tree::new(NodeData::new(kind, "p"));
        let sp = src.root.unwrap();
        let sa = src.add_child(sp, NodeData::new(kind, "a"));
        let sb = src.add_child(sp, NodeData::new(kind, "b"));
        let sc = src.add_child(sp, NodeData::new(kind, "c"));
        src.prepare(HashStrategy::Rolling);

        let mut dst = Tree::new(NodeData::new(kind, "root"));
        let droot = dst.root.unwrap();
        let dq = dst.add_child(droot, NodeData::new(kind, "q"));
        let da = dst.add_child(dq, NodeData::new(kind, "a"));
        let db = dst.add_child(dq, NodeData::new(kind, "b"));
        let dr = dst.add_child(droot, NodeData::new(kind, "r"));
        let dc = dst.add_child(dr, NodeData::new(kind, "c"));
        dst.prepare(HashStrategy::Rolling);

        let mut mappings = MappingStore::new();
        mappings.add(sa, da);
        mappings.add(sb, db);
        mappings.add(sc, dc);

        assert_eq!(common_descendants(&src, &dst, sp, dq, &mappings), 2);
        let score = |metric: SimilarityMetric| metric.score(&src, &dst, sp, dq, &mappings);
        assert_eq!(score(SimilarityMetric::Dice), 0.8);
        assert_eq!(jaccard(&src, &dst, sp, dq, &mappings), 2.0 / 3.0);
        assert_eq!(chawathe(&src, &dst, sp, dq, &mappings), 2.0 / 3.0);
        assert_eq!(score(SimilarityMetric::Overlap), 1.0);
        assert_eq!(common_descendants(&src, &dst, sp, droot, &mappings), 3);
    }

    #[test]
    fn test_label_similarity() {
        assert_eq!(label_similarity("counter", "counter"), 1.0);
        assert_eq!(label_similarity("", ""), 1.0);
        assert_eq!(label_similarity("", "x"), 0.0);
        assert!(label_similarity("counter", "counters") > 0.5);
        assert!(label_similarity("alpha", "omega") < 0.5);
    }

    #[test]
    fn test_short_labels_shrink_the_gram_size() {
        let s = label_similarity("ab", "abc");
        assert!(s > 0.0 && s < 1.0, "ab/abc scored {s}");
        assert!(label_similarity("id", "ids") > 0.5);
        assert_eq!(label_similarity("x", "x"), 1.0);
        assert_eq!(label_similarity("x", "y"), 0.0);
        assert_eq!(label_similarity("i", "jk"), 0.0);
    }
}
