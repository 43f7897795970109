//! Longest common subsequence over node sequences.

use indextree::NodeId;

use crate::tree::Tree;

/// Index pairs `(i, j)` of a longest common subsequence of `a` and `b`, in
/// increasing order, under the equivalence `eq`.
///
/// On ties the backtrack drops elements of `a` first, then elements of `b`,
/// so the result is fully determined by the inputs.
pub fn lcs<A, B>(a: &[A], b: &[B], mut eq: impl FnMut(&A, &B) -> bool) -> Vec<(usize, usize)> {
    let width = b.len() + 1;
    let mut lengths = vec![0usize; (a.len() + 1) * width];
    for i in 0..a.len() {
        for j in 0..b.len() {
            lengths[(i + 1) * width + j + 1] = if eq(&a[i], &b[j]) {
                lengths[i * width + j] + 1
            } else {
                lengths[(i + 1) * width + j].max(lengths[i * width + j + 1])
            };
        }
    }

    let mut pairs = Vec::new();
    let (mut x, mut y) = (a.len(), b.len());
    while x != 0 && y != 0 {
        let here = lengths[x * width + y];
        if here == lengths[(x - 1) * width + y] {
            x -= 1;
        } else if here == lengths[x * width + y - 1] {
            y -= 1;
        } else {
            pairs.push((x - 1, y - 1));
            x -= 1;
            y -= 1;
        }
    }
    pairs.reverse();
    pairs
}

/// LCS of two node sequences where nodes match when their subtrees share shape and types.
pub fn lcs_by_isostructure(
    src_tree: &Tree,
    src: &[NodeId],
    dst_tree: &Tree,
    dst: &[NodeId],
) -> Vec<(usize, usize)> {
    lcs(src, dst, |&s, &d| src_tree.is_isostructural(s, dst_tree, d))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lcs_basic() {
        let a = ['a', 'b', 'c', 'd'];
        let b = ['b', 'x', 'd'];
        assert_eq!(lcs(&a, &b, |x, y| x == y), vec![(1, 0), (3, 2)]);
    }

    #[test]
    fn test_lcs_empty() {
        let a: [u8; 0] = [];
        assert!(lcs(&a, &[1u8, 2], |x, y| x == y).is_empty());
    }

    #[test]
    fn test_lcs_swap_is_deterministic() {
        let a = ['b', 'c'];
        let b = ['c', 'b'];
        let first = lcs(&a, &b, |x, y| x == y);
        assert_eq!(first.len(), 1);
        assert_eq!(first, lcs(&a, &b, |x, y| x == y));
        assert_eq!(first, vec![(0, 1)]);
    }

    #[test]
    fn test_node_sequences() {
        use crate::hash::HashStrategy;
        use crate::tree::{NodeData, TypeId};

        let (block, leaf) = (TypeId::new(0), TypeId::new(1));
        let build = |labels: &[&str]| {
            let mut tree = Tree::new(NodeData::new(block, ""));
            let root = tree.root.unwrap();
            for label in labels {
                tree.add_child(root, NodeData::new(leaf, *label));
            }
            tree.prepare(HashStrategy::Rolling);
            let children: Vec<NodeId> = tree.children(root).collect();
            (tree, children)
        };
        let (src, s) = build(&["x", "y", "z"]);
        let (dst, d) = build(&["y", "w"]);

        assert_eq!(lcs_by_isostructure(&src, &s, &dst, &d), vec![(0, 0), (1, 1)]);
    }
}
