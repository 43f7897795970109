//! Mutable copy of a source tree that edit actions are played against.
//!
//! The copy hangs under a synthetic root so that a top-level node can be
//! moved or replaced like any other child.

use indextree::{Arena, NodeId};

use crate::tree::{NodeData, Tree, TypeId};

#[derive(Debug, Clone)]
pub(crate) struct WorkNode {
    pub kind: TypeId,
    pub label: String,
    /// Source node this copy was made from, `None` for inserted nodes.
    pub src: Option<NodeId>,
}

#[derive(Debug)]
pub(crate) struct WorkTree {
    pub arena: Arena<WorkNode>,
    pub root: NodeId,
    /// Working copy of each source node, indexed by source NodeId.
    src_to_work: Vec<Option<NodeId>>,
}

impl WorkTree {
    /// Copy `src` node for node under a fresh synthetic root.
    pub fn from_tree(src: &Tree) -> Self {
        let mut arena = Arena::with_capacity(src.arena.count() + 1);
        let root = arena.new_node(WorkNode {
            kind: TypeId::new(u32::MAX),
            label: String::new(),
            src: None,
        });
        let mut src_to_work = vec![None; src.arena.count() + 1];

        for s in src.pre_order() {
            let copy = arena.new_node(WorkNode {
                kind: src.kind(s),
                label: src.label(s).to_owned(),
                src: Some(s),
            });
            let parent = match src.parent(s) {
                Some(p) => src_to_work[usize::from(p)].unwrap_or(root),
                None => root,
            };
            parent.append(copy, &mut arena);
            src_to_work[usize::from(s)] = Some(copy);
        }

        Self {
            arena,
            root,
            src_to_work,
        }
    }

    /// The live working copy of a source node.
    pub fn of_src(&self, src: NodeId) -> Option<NodeId> {
        self.src_to_work
            .get(usize::from(src))
            .copied()
            .flatten()
            .filter(|w| !w.is_removed(&self.arena))
    }

    pub fn get(&self, id: NodeId) -> &WorkNode {
        self.arena[id].get()
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut WorkNode {
        self.arena[id].get_mut()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id].parent()
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        id.children(&self.arena).count()
    }

    /// Index of a node among its siblings.
    pub fn position(&self, id: NodeId) -> usize {
        id.preceding_siblings(&self.arena).count() - 1
    }

    pub fn new_node(&mut self, kind: TypeId, label: impl Into<String>) -> NodeId {
        self.arena.new_node(WorkNode {
            kind,
            label: label.into(),
            src: None,
        })
    }

    /// Attach a detached node as the `position`-th child of `parent`,
    /// appending when `position` is past the end.
    pub fn insert_at(&mut self, parent: NodeId, child: NodeId, position: usize) {
        match parent.children(&self.arena).nth(position) {
            Some(sibling) => sibling.insert_before(child, &mut self.arena),
            None => parent.append(child, &mut self.arena),
        }
    }

    /// Detach a node and reattach it as the `position`-th child of `parent`,
    /// `position` counted once the node has left its old slot.
    pub fn move_to(&mut self, node: NodeId, parent: NodeId, position: usize) {
        node.detach(&mut self.arena);
        self.insert_at(parent, node, position);
    }

    /// Top-level nodes, normally at most one.
    pub fn tops(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.root.children(&self.arena)
    }

    /// Live nodes in post-order, synthetic root excluded.
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut order: Vec<NodeId> = self
            .root
            .traverse(&self.arena)
            .filter_map(|edge| match edge {
                indextree::NodeEdge::End(node) => Some(node),
                indextree::NodeEdge::Start(_) => None,
            })
            .collect();
        order.pop();
        order
    }

    /// Build a standalone tree from the subtree rooted at `top`.
    pub fn to_tree(&self, top: NodeId) -> Tree {
        let data = self.get(top);
        let mut tree = Tree::new(NodeData::new(data.kind, data.label.clone()));
        let Some(root) = tree.root else {
            return tree;
        };
        let mut stack = vec![(top, root)];
        while let Some((work, built)) = stack.pop() {
            for child in work.children(&self.arena) {
                let data = self.get(child);
                let id = tree.add_child(built, NodeData::new(data.kind, data.label.clone()));
                stack.push((child, id));
            }
        }
        tree
    }
}
