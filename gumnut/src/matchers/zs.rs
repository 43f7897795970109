//! Zhang-Shasha tree edit distance.
//!
//! Computes a minimum-cost edit mapping with unit insertion and deletion
//! costs and an update cost of 0 (same type, same label), 1 (same type,
//! different label) or infinite (different types).
//!
//! Runs in O(n1 * n2 * min(h1, l1) * min(h2, l2)) time and O(n1 * n2) memory.
//! Callers bound the subtree sizes handed to it.

use indextree::NodeId;

use super::Matcher;
use crate::mapping::MappingStore;
use crate::tree::Tree;
use crate::{debug, trace};

const DISALLOWED: u32 = u32::MAX;

/// Optimal matcher over whole trees or a pair of subtrees.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZsMatcher;

impl ZsMatcher {
    /// Optimal mapping between the subtrees rooted at `s` and `d`.
    ///
    /// On equal-cost ties the backtrack prefers a deletion, then an
    /// insertion, then a substitution.
    pub fn match_subtrees(src: &Tree, dst: &Tree, s: NodeId, d: NodeId) -> MappingStore {
        let mut mappings = MappingStore::for_trees(src, dst);
        let mut zs = Distances::new(ZsTree::new(src, s), ZsTree::new(dst, d));
        zs.compute();
        for (si, di) in zs.backtrack() {
            let (sn, dn) = (zs.src.nodes[si], zs.dst.nodes[di]);
            assert_eq!(
                src.kind(sn),
                dst.kind(dn),
                "optimal alignment substitutes source node {} with destination node {} of another type",
                usize::from(sn),
                usize::from(dn)
            );
            mappings.link(src, dst, sn, dn);
        }
        mappings
    }

    /// Edit distance between the subtrees rooted at `s` and `d`.
    pub fn distance(src: &Tree, dst: &Tree, s: NodeId, d: NodeId) -> u32 {
        let mut zs = Distances::new(ZsTree::new(src, s), ZsTree::new(dst, d));
        zs.compute();
        zs.tree_dist(zs.src.len(), zs.dst.len())
    }
}

impl Matcher for ZsMatcher {
    fn name(&self) -> &'static str {
        "zs"
    }

    fn match_trees(&self, src: &Tree, dst: &Tree, mappings: &mut MappingStore) {
        let (Some(s), Some(d)) = (src.root, dst.root) else {
            return;
        };
        debug!(src_size = src.size(s), dst_size = dst.size(d), "zs start");
        let optimal = Self::match_subtrees(src, dst, s, d);
        for (sn, dn) in optimal.pairs() {
            if mappings.is_mapping_allowed(src, dst, sn, dn) {
                mappings.link(src, dst, sn, dn);
            }
        }
        debug!(matched = mappings.len(), "zs done");
    }
}

/// A subtree numbered in post-order from 1.
struct ZsTree<'a> {
    tree: &'a Tree,
    /// `nodes[i]` is the i-th node in post-order; slot 0 is unused.
    nodes: Vec<NodeId>,
    /// Post-order number of the left-most leaf descendant of node `i`.
    lld: Vec<usize>,
    /// Nodes whose left-most leaf differs from every later node's, ascending.
    key_roots: Vec<usize>,
}

impl<'a> ZsTree<'a> {
    fn new(tree: &'a Tree, root: NodeId) -> Self {
        let mut nodes = vec![root];
        let mut lld = vec![0];
        for node in tree.post_order_from(root) {
            let i = nodes.len();
            nodes.push(node);
            lld.push(i + 1 - tree.size(node));
        }

        let n = nodes.len() - 1;
        let mut visited = vec![false; n + 1];
        let mut key_roots = Vec::new();
        for i in (1..=n).rev() {
            if !visited[lld[i]] {
                visited[lld[i]] = true;
                key_roots.push(i);
            }
        }
        key_roots.reverse();

        Self {
            tree,
            nodes,
            lld,
            key_roots,
        }
    }

    fn len(&self) -> usize {
        self.nodes.len() - 1
    }
}

struct Distances<'a> {
    src: ZsTree<'a>,
    dst: ZsTree<'a>,
    cols: usize,
    tree_dist: Vec<u32>,
    forest_dist: Vec<u32>,
}

impl<'a> Distances<'a> {
    fn new(src: ZsTree<'a>, dst: ZsTree<'a>) -> Self {
        let cols = dst.len() + 1;
        let cells = (src.len() + 1) * cols;
        Self {
            src,
            dst,
            cols,
            tree_dist: vec![0; cells],
            forest_dist: vec![0; cells],
        }
    }

    #[inline]
    fn tree_dist(&self, i: usize, j: usize) -> u32 {
        self.tree_dist[i * self.cols + j]
    }

    #[inline]
    fn fd(&self, i: usize, j: usize) -> u32 {
        self.forest_dist[i * self.cols + j]
    }

    #[inline]
    fn set_fd(&mut self, i: usize, j: usize, value: u32) {
        self.forest_dist[i * self.cols + j] = value;
    }

    fn update_cost(&self, i: usize, j: usize) -> u32 {
        let (s, d) = (self.src.nodes[i], self.dst.nodes[j]);
        let (src, dst) = (self.src.tree, self.dst.tree);
        if src.kind(s) != dst.kind(d) {
            DISALLOWED
        } else if src.label(s) == dst.label(d) {
            0
        } else {
            1
        }
    }

    fn compute(&mut self) {
        // Both key root lists end with the roots, so the last forest table
        // filled here is the one for the whole pair.
        let src_roots = self.src.key_roots.clone();
        let dst_roots = self.dst.key_roots.clone();
        for &i in &src_roots {
            for &j in &dst_roots {
                self.forest(i, j);
            }
        }
    }

    fn forest(&mut self, i: usize, j: usize) {
        let li = self.src.lld[i];
        let lj = self.dst.lld[j];

        self.set_fd(li - 1, lj - 1, 0);
        for di in li..=i {
            let value = self.fd(di - 1, lj - 1) + 1;
            self.set_fd(di, lj - 1, value);
        }
        for dj in lj..=j {
            let value = self.fd(li - 1, dj - 1) + 1;
            self.set_fd(li - 1, dj, value);
        }

        for di in li..=i {
            for dj in lj..=j {
                let delete = self.fd(di - 1, dj).saturating_add(1);
                let insert = self.fd(di, dj - 1).saturating_add(1);
                if self.src.lld[di] == li && self.dst.lld[dj] == lj {
                    let update = self
                        .fd(di - 1, dj - 1)
                        .saturating_add(self.update_cost(di, dj));
                    let best = delete.min(insert).min(update);
                    self.set_fd(di, dj, best);
                    self.tree_dist[di * self.cols + dj] = best;
                } else {
                    let prefix = self.fd(self.src.lld[di] - 1, self.dst.lld[dj] - 1);
                    let substitute = prefix.saturating_add(self.tree_dist(di, dj));
                    self.set_fd(di, dj, delete.min(insert).min(substitute));
                }
            }
        }
    }

    /// Post-order index pairs of the optimal alignment, in discovery order.
    fn backtrack(&mut self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        let mut stack = vec![(self.src.len(), self.dst.len())];
        let mut whole_pair = true;

        while let Some((last_row, last_col)) = stack.pop() {
            if !whole_pair {
                self.forest(last_row, last_col);
            }
            whole_pair = false;

            let first_row = self.src.lld[last_row] - 1;
            let first_col = self.dst.lld[last_col] - 1;
            let (mut row, mut col) = (last_row, last_col);

            while row > first_row || col > first_col {
                let current = self.fd(row, col);
                if row > first_row && self.fd(row - 1, col).saturating_add(1) == current {
                    row -= 1;
                } else if col > first_col && self.fd(row, col - 1).saturating_add(1) == current {
                    col -= 1;
                } else if self.src.lld[row] - 1 == first_row && self.dst.lld[col] - 1 == first_col {
                    trace!(src = row, dst = col, "zs substitution");
                    pairs.push((row, col));
                    row -= 1;
                    col -= 1;
                } else {
                    stack.push((row, col));
                    row = self.src.lld[row] - 1;
                    col = self.dst.lld[col] - 1;
                }
            }
        }
        pairs
    }
}
