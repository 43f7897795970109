//! Replaying an edit script against a copy of the source tree.

use indextree::NodeId;
use rapidhash::RapidHashMap as HashMap;

use super::work::WorkTree;
use super::{Action, EditScript};
use crate::error::{Error, Result};
use crate::mapping::MappingStore;
use crate::tree::Tree;
use crate::{debug, trace};

/// Apply `script` to a copy of `src` and return the resulting tree, prepared
/// with the hash strategy of `dst`.
///
/// Destination nodes named by the script are resolved through `mappings`
/// (for nodes that existed in `src`) or through earlier inserts. Deletes
/// must target leaves of the working tree at the time they run, and a move
/// may not land inside the subtree it carries.
pub fn replay(
    src: &Tree,
    dst: &Tree,
    mappings: &MappingStore,
    script: &EditScript,
) -> Result<Tree> {
    debug!(actions = script.len(), "replay start");
    let mut replay = Replay {
        dst,
        mappings,
        work: WorkTree::from_tree(src),
        inserted: HashMap::default(),
    };
    for action in script {
        trace!(%action, "replay");
        replay.apply(action)?;
    }

    let tops: Vec<NodeId> = replay.work.tops().collect();
    let mut tree = match tops.as_slice() {
        [] => Tree::empty(),
        [top] => replay.work.to_tree(*top),
        _ => return Err(Error::DanglingRoots { roots: tops.len() }),
    };
    tree.prepare(dst.hash_strategy().unwrap_or_default());
    debug!(nodes = tree.len(), "replay done");
    Ok(tree)
}

struct Replay<'a> {
    dst: &'a Tree,
    mappings: &'a MappingStore,
    work: WorkTree,
    /// Working nodes created for inserted destination nodes.
    inserted: HashMap<NodeId, NodeId>,
}

impl Replay<'_> {
    fn apply(&mut self, action: &Action) -> Result<()> {
        match action {
            Action::Insert {
                dst,
                parent,
                position,
                kind,
                label,
            } => {
                let parent = self.resolve_parent(*parent)?;
                self.check_position(parent, *position)?;
                let node = self.work.new_node(*kind, label.as_str());
                self.work.insert_at(parent, node, *position);
                self.inserted.insert(*dst, node);
            }
            Action::InsertTree {
                dst: top,
                parent,
                position,
                ..
            } => {
                let parent = self.resolve_parent(*parent)?;
                self.check_position(parent, *position)?;
                let node = self.copy_dst_subtree(*top);
                self.work.insert_at(parent, node, *position);
            }
            Action::Delete { src } => {
                let node = self.resolve_src(*src)?;
                if self.work.child_count(node) > 0 {
                    return Err(Error::NotALeaf {
                        node: usize::from(*src),
                    });
                }
                node.remove(&mut self.work.arena);
            }
            Action::DeleteTree { src, .. } => {
                let node = self.resolve_src(*src)?;
                node.remove_subtree(&mut self.work.arena);
            }
            Action::Move {
                src,
                parent,
                position,
                ..
            } => {
                let node = self.resolve_src(*src)?;
                let parent = self.resolve_parent(*parent)?;
                if parent.ancestors(&self.work.arena).any(|a| a == node) {
                    return Err(Error::MoveIntoSubtree {
                        node: usize::from(*src),
                    });
                }
                let remaining = self.work.child_count(parent)
                    - usize::from(self.work.parent(node) == Some(parent));
                if *position > remaining {
                    return Err(Error::PositionOutOfBounds {
                        position: *position,
                        len: remaining,
                    });
                }
                self.work.move_to(node, parent, *position);
            }
            Action::Update { src, new_label, .. } => {
                let node = self.resolve_src(*src)?;
                self.work.get_mut(node).label.clone_from(new_label);
            }
        }
        Ok(())
    }

    fn resolve_src(&self, src: NodeId) -> Result<NodeId> {
        self.work.of_src(src).ok_or(Error::MissingNode {
            node: usize::from(src),
        })
    }

    /// Working node for a destination node, either inserted earlier or the
    /// copy of its source partner.
    fn resolve_dst(&self, dst: NodeId) -> Result<NodeId> {
        if let Some(&node) = self.inserted.get(&dst) {
            return Ok(node);
        }
        self.mappings
            .get_src(dst)
            .and_then(|s| self.work.of_src(s))
            .ok_or(Error::MissingNode {
                node: usize::from(dst),
            })
    }

    fn resolve_parent(&self, parent: Option<NodeId>) -> Result<NodeId> {
        match parent {
            Some(p) => self.resolve_dst(p),
            None => Ok(self.work.root),
        }
    }

    fn check_position(&self, parent: NodeId, position: usize) -> Result<()> {
        let len = self.work.child_count(parent);
        if position > len {
            return Err(Error::PositionOutOfBounds { position, len });
        }
        Ok(())
    }

    /// Copy a destination subtree into the working arena, detached, and
    /// register every copied node as inserted.
    fn copy_dst_subtree(&mut self, top: NodeId) -> NodeId {
        let dst = self.dst;
        let root = self.work.new_node(dst.kind(top), dst.label(top));
        self.inserted.insert(top, root);
        let mut stack = vec![(top, root)];
        while let Some((d, w)) = stack.pop() {
            for child in dst.children(d) {
                let copy = self.work.new_node(dst.kind(child), dst.label(child));
                w.append(copy, &mut self.work.arena);
                self.inserted.insert(child, copy);
                stack.push((child, copy));
            }
        }
        root
    }
}
