//! Edit actions and edit scripts.
//!
//! Source-side nodes are [`NodeId`]s of the source tree, destination-side
//! nodes and parents are [`NodeId`]s of the destination tree. A `None`
//! parent means the top level, above the root.

use core::fmt;

use indextree::NodeId;

use crate::debug;
use crate::tree::TypeId;

mod apply;
mod chawathe;
mod insert_delete;
mod simplify;
mod work;

pub use apply::replay;
pub use chawathe::generate_edit_script;
pub use insert_delete::generate_insert_delete_script;
pub use simplify::simplify_edit_script;

/// An edit operation.
///
/// Applied in script order against a copy of the source tree, positions are
/// indexes among the parent's current children.
#[derive(Clone, PartialEq, Eq)]
pub enum Action {
    /// Insert a new leaf.
    Insert {
        /// The new node in the destination tree
        dst: NodeId,
        /// Parent in the destination tree
        parent: Option<NodeId>,
        /// Position among siblings (0-indexed)
        position: usize,
        /// The node's type
        kind: TypeId,
        /// The node's label
        label: String,
    },

    /// Delete a leaf.
    Delete {
        /// The node in the source tree
        src: NodeId,
    },

    /// Move a node, with its subtree, to a new location.
    Move {
        /// The node in the source tree
        src: NodeId,
        /// The corresponding node in the destination tree
        dst: NodeId,
        /// New parent in the destination tree
        parent: Option<NodeId>,
        /// Position once the node has left its old slot
        position: usize,
    },

    /// Change a node's label.
    Update {
        /// The node in the source tree
        src: NodeId,
        /// The corresponding node in the destination tree
        dst: NodeId,
        /// Label before the update
        old_label: String,
        /// Label after the update
        new_label: String,
    },

    /// Insert a whole destination subtree at once.
    InsertTree {
        /// Root of the inserted subtree in the destination tree
        dst: NodeId,
        /// Parent in the destination tree
        parent: Option<NodeId>,
        /// Position among siblings (0-indexed)
        position: usize,
        /// Number of nodes inserted
        size: usize,
    },

    /// Delete a whole source subtree at once.
    DeleteTree {
        /// Root of the deleted subtree in the source tree
        src: NodeId,
        /// Number of nodes deleted
        size: usize,
    },
}

struct Parent(Option<NodeId>);

impl fmt::Display for Parent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(id) => write!(f, "dst:{}", usize::from(id)),
            None => write!(f, "top"),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Insert {
                dst,
                parent,
                position,
                kind,
                label,
            } => write!(
                f,
                "Insert(dst:{} {} {:?} @{} under {})",
                usize::from(*dst),
                kind,
                label,
                position,
                Parent(*parent)
            ),
            Action::Delete { src } => write!(f, "Delete(src:{})", usize::from(*src)),
            Action::Move {
                src,
                dst,
                parent,
                position,
            } => write!(
                f,
                "Move(src:{} → dst:{} @{} under {})",
                usize::from(*src),
                usize::from(*dst),
                position,
                Parent(*parent)
            ),
            Action::Update {
                src,
                old_label,
                new_label,
                ..
            } => write!(
                f,
                "Update(src:{} {:?} → {:?})",
                usize::from(*src),
                old_label,
                new_label
            ),
            Action::InsertTree {
                dst,
                parent,
                position,
                size,
            } => write!(
                f,
                "InsertTree(dst:{} size={} @{} under {})",
                usize::from(*dst),
                size,
                position,
                Parent(*parent)
            ),
            Action::DeleteTree { src, size } => {
                write!(f, "DeleteTree(src:{} size={})", usize::from(*src), size)
            }
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Kind of an [`Action`], for counting and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// [`Action::Insert`]
    Insert,
    /// [`Action::Delete`]
    Delete,
    /// [`Action::Move`]
    Move,
    /// [`Action::Update`]
    Update,
    /// [`Action::InsertTree`]
    InsertTree,
    /// [`Action::DeleteTree`]
    DeleteTree,
}

impl Action {
    /// The action's kind.
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Insert { .. } => ActionKind::Insert,
            Action::Delete { .. } => ActionKind::Delete,
            Action::Move { .. } => ActionKind::Move,
            Action::Update { .. } => ActionKind::Update,
            Action::InsertTree { .. } => ActionKind::InsertTree,
            Action::DeleteTree { .. } => ActionKind::DeleteTree,
        }
    }
}

/// An ordered list of actions.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct EditScript {
    actions: Vec<Action>,
}

impl EditScript {
    /// An empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action, logging it.
    pub fn push(&mut self, action: Action) {
        debug!(%action, "emit");
        self.actions.push(action);
    }

    /// Number of actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the script is empty.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Actions in order.
    pub fn iter(&self) -> core::slice::Iter<'_, Action> {
        self.actions.iter()
    }

    /// Actions as a slice.
    pub fn as_slice(&self) -> &[Action] {
        &self.actions
    }

    /// Number of actions of the given kind.
    pub fn count(&self, kind: ActionKind) -> usize {
        self.actions.iter().filter(|a| a.kind() == kind).count()
    }
}

impl From<Vec<Action>> for EditScript {
    fn from(actions: Vec<Action>) -> Self {
        Self { actions }
    }
}

impl IntoIterator for EditScript {
    type Item = Action;
    type IntoIter = std::vec::IntoIter<Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.into_iter()
    }
}

impl<'a> IntoIterator for &'a EditScript {
    type Item = &'a Action;
    type IntoIter = core::slice::Iter<'a, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}

impl fmt::Debug for EditScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.actions).finish()
    }
}
