//! Edit script simplification.
//!
//! Consolidates operations covering whole subtrees:
//! - When every node of a destination subtree is inserted, report one
//!   `InsertTree` for its root instead of one insert per node
//! - When every node of a source subtree is deleted, report one
//!   `DeleteTree` for its root instead of one delete per node
//!
//! Other actions are kept as they are, in their original order.

use indextree::NodeId;
use rapidhash::RapidHashSet as HashSet;

use super::{Action, EditScript};
use crate::tree::Tree;
use crate::{debug, trace};

/// Simplify an edit script by consolidating subtree inserts and deletes.
///
/// The result replays to the same tree as the input.
pub fn simplify_edit_script(script: EditScript, src: &Tree, dst: &Tree) -> EditScript {
    debug!(actions = script.len(), "simplify_edit_script start");

    let mut inserted: HashSet<NodeId> = HashSet::default();
    let mut deleted: HashSet<NodeId> = HashSet::default();
    for action in &script {
        match action {
            Action::Insert { dst, .. } => {
                inserted.insert(*dst);
            }
            Action::Delete { src } => {
                deleted.insert(*src);
            }
            _ => {}
        }
    }

    let fully_inserted = |node: NodeId| dst.subtree(node).all(|n| inserted.contains(&n));
    let fully_deleted = |node: NodeId| src.subtree(node).all(|n| deleted.contains(&n));

    let mut simplified = EditScript::new();
    for action in script {
        match action {
            Action::Insert {
                dst: node,
                parent,
                position,
                ..
            } if fully_inserted(node) => {
                if parent.is_some_and(|p| inserted.contains(&p) && fully_inserted(p)) {
                    trace!(dst = usize::from(node), "simplify: inside inserted tree");
                } else if dst.is_leaf(node) {
                    simplified.push(action);
                } else {
                    simplified.push(Action::InsertTree {
                        dst: node,
                        parent,
                        position,
                        size: dst.size(node),
                    });
                }
            }
            Action::Delete { src: node } if fully_deleted(node) => {
                if src
                    .parent(node)
                    .is_some_and(|p| deleted.contains(&p) && fully_deleted(p))
                {
                    trace!(src = usize::from(node), "simplify: inside deleted tree");
                } else if src.is_leaf(node) {
                    simplified.push(action);
                } else {
                    simplified.push(Action::DeleteTree {
                        src: node,
                        size: src.size(node),
                    });
                }
            }
            other => simplified.push(other),
        }
    }

    debug!(actions = simplified.len(), "simplify_edit_script done");
    simplified
}
