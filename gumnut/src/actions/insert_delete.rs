//! Edit scripts made of inserts and deletes only.
//!
//! A mapped pair survives only when its label is unchanged, its parents
//! survive as a pair too, and it sits in a longest common subsequence of
//! its siblings. Everything else is deleted from the source and inserted
//! again from the destination, so the script carries no update or move.

use indextree::NodeId;

use super::{EditScript, generate_edit_script, simplify_edit_script};
use crate::mapping::MappingStore;
use crate::sequence::lcs;
use crate::tree::Tree;
use crate::{debug, trace};

/// Generate a script of `Insert`, `Delete`, `InsertTree` and `DeleteTree`
/// actions transforming `src` into `dst`.
///
/// The script replays with [`super::replay`] under `mappings` as well as
/// under the reduced mapping it was generated from.
pub fn generate_insert_delete_script(
    src: &Tree,
    dst: &Tree,
    mappings: &MappingStore,
) -> EditScript {
    let kept = keep_stable_pairs(src, dst, mappings);
    debug!(
        matched_pairs = mappings.len(),
        kept_pairs = kept.len(),
        "generate_insert_delete_script"
    );
    simplify_edit_script(generate_edit_script(src, dst, &kept), src, dst)
}

/// Pairs reachable from the mapped roots through unchanged, in-order pairs.
fn keep_stable_pairs(src: &Tree, dst: &Tree, mappings: &MappingStore) -> MappingStore {
    let mut kept = MappingStore::for_trees(src, dst);
    let (Some(src_root), Some(dst_root)) = (src.root, dst.root) else {
        return kept;
    };
    if !mappings.has(src_root, dst_root) || src.label(src_root) != dst.label(dst_root) {
        return kept;
    }

    kept.link(src, dst, src_root, dst_root);
    let mut stack = vec![(src_root, dst_root)];
    while let Some((s, d)) = stack.pop() {
        let src_children: Vec<NodeId> = src.children(s).collect();
        let dst_children: Vec<NodeId> = dst.children(d).collect();
        let stable = lcs(&src_children, &dst_children, |&a, &b| {
            mappings.get_dst(a) == Some(b) && src.label(a) == dst.label(b)
        });
        for (i, j) in stable {
            let (a, b) = (src_children[i], dst_children[j]);
            trace!(src = usize::from(a), dst = usize::from(b), "keep pair");
            kept.link(src, dst, a, b);
            stack.push((a, b));
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ActionKind, replay};
    use crate::hash::HashStrategy;
    use crate::tree::{NodeData, TypeId};

    const ROOT: TypeId = TypeId::new(0);
    const INNER: TypeId = TypeId::new(1);
    const LEAF: TypeId = TypeId::new(2);

    fn flat(labels: &[&str]) -> (Tree, Vec<NodeId>) {
        let mut tree = Tree::new(NodeData::new(ROOT, "r"));
        let root = tree.root.unwrap();
        let children = labels
            .iter()
            .map(|label| tree.add_child(root, NodeData::new(LEAF, *label)))
            .collect();
        tree.prepare(HashStrategy::Rolling);
        (tree, children)
    }

    fn map_all(src: &Tree, dst: &Tree, pairs: &[(NodeId, NodeId)]) -> MappingStore {
        let mut mappings = MappingStore::new();
        mappings.link(src, dst, src.root.unwrap(), dst.root.unwrap());
        for &(s, d) in pairs {
            mappings.link(src, dst, s, d);
        }
        mappings
    }

    fn assert_rebuilds(src: &Tree, dst: &Tree, mappings: &MappingStore, script: &EditScript) {
        let rebuilt = replay(src, dst, mappings, script).unwrap();
        assert!(rebuilt.is_isomorphic(rebuilt.root.unwrap(), dst, dst.root.unwrap()));
    }

    #[test]
    fn test_renamed_leaf_is_reinserted() {
        let (src, s) = flat(&["a", "old"]);
        let (dst, d) = flat(&["a", "new"]);
        let mappings = map_all(&src, &dst, &[(s[0], d[0]), (s[1], d[1])]);

        let script = generate_insert_delete_script(&src, &dst, &mappings);
        assert_eq!(script.count(ActionKind::Update), 0);
        assert_eq!(script.count(ActionKind::Insert), 1);
        assert_eq!(script.count(ActionKind::Delete), 1);
        assert_rebuilds(&src, &dst, &mappings, &script);
    }

    #[test]
    fn test_swapped_leaves_are_reinserted() {
        let (src, s) = flat(&["a", "b"]);
        let (dst, d) = flat(&["b", "a"]);
        let mappings = map_all(&src, &dst, &[(s[0], d[1]), (s[1], d[0])]);

        let script = generate_insert_delete_script(&src, &dst, &mappings);
        assert_eq!(script.count(ActionKind::Move), 0);
        assert_eq!(script.count(ActionKind::Insert), 1);
        assert_eq!(script.count(ActionKind::Delete), 1);
        assert_rebuilds(&src, &dst, &mappings, &script);
    }

    #[test]
    fn test_moved_subtree_becomes_whole_tree_actions() {
        // r(p(x, y), q) -> r(q(p(x, y)))
        let mut src = Tree::new(NodeData::new(ROOT, "r"));
        let sr = src.root.unwrap();
        let sp = src.add_child(sr, NodeData::new(INNER, "p"));
        let sx = src.add_child(sp, NodeData::new(LEAF, "x"));
        let sy = src.add_child(sp, NodeData::new(LEAF, "y"));
        let sq = src.add_child(sr, NodeData::new(INNER, "q"));
        src.prepare(HashStrategy::Rolling);

        let mut dst = Tree::new(NodeData::new(ROOT, "r"));
        let dr = dst.root.unwrap();
        let dq = dst.add_child(dr, NodeData::new(INNER, "q"));
        let dp = dst.add_child(dq, NodeData::new(INNER, "p"));
        let dx = dst.add_child(dp, NodeData::new(LEAF, "x"));
        let dy = dst.add_child(dp, NodeData::new(LEAF, "y"));
        dst.prepare(HashStrategy::Rolling);

        let mappings = map_all(&src, &dst, &[(sp, dp), (sx, dx), (sy, dy), (sq, dq)]);
        let script = generate_insert_delete_script(&src, &dst, &mappings);
        assert_eq!(script.count(ActionKind::Move), 0);
        assert_eq!(script.count(ActionKind::InsertTree), 1);
        assert_eq!(script.count(ActionKind::DeleteTree), 1);
        assert_rebuilds(&src, &dst, &mappings, &script);
    }

    #[test]
    fn test_unmapped_roots_rebuild_everything() {
        let (src, _) = flat(&["a"]);
        let (dst, _) = flat(&["a"]);
        let script = generate_insert_delete_script(&src, &dst, &MappingStore::new());
        assert_eq!(script.count(ActionKind::InsertTree), 1);
        assert_eq!(script.count(ActionKind::DeleteTree), 1);
        assert_rebuilds(&src, &dst, &MappingStore::new(), &script);
    }
}
