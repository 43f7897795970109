//! Arena-backed ordered labeled trees.
//!
//! Nodes live in an [`indextree::Arena`]; parents own their children through the
//! arena and keep a non-owning back reference. Derived metrics (size, height,
//! depth, hashes, traversal indices) are computed once by [`Tree::prepare`] and
//! are read-only afterwards.

use core::fmt;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};

use indextree::{Arena, NodeEdge, NodeId};
use rapidhash::{RapidHashMap as HashMap, RapidHasher};

use crate::debug;
use crate::hash::{HashGenerator, HashStrategy, NodeHash};

/// Integer identifier of a node's syntactic category.
///
/// Two nodes are matchable only when they carry the same `TypeId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    /// Wrap a raw type number.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw type number.
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Interns type names so that equal names resolve to equal [`TypeId`]s.
///
/// Build both trees of a comparison against the same registry.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    names: Vec<String>,
    ids: HashMap<String, TypeId>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `name`, registering it if it was never seen.
    pub fn intern(&mut self, name: &str) -> TypeId {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = TypeId(self.names.len() as u32);
        self.names.push(name.to_owned());
        self.ids.insert(name.to_owned(), id);
        id
    }

    /// Look up a name without registering it.
    pub fn get(&self, name: &str) -> Option<TypeId> {
        self.ids.get(name).copied()
    }

    /// The name a type id was registered under.
    pub fn name(&self, id: TypeId) -> Option<&str> {
        self.names.get(id.0 as usize).map(String::as_str)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no type has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Metrics derived from the shape of a node's subtree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeMetrics {
    /// Number of nodes in the subtree, the node included.
    pub size: usize,
    /// Number of nodes on the longest downward path; leaves have height 1.
    pub height: usize,
    /// Distance from the root; the root has depth 0.
    pub depth: usize,
    /// Digest of types and labels of the whole subtree.
    pub hash: NodeHash,
    /// Digest of types and shape of the subtree, labels ignored.
    pub structure_hash: NodeHash,
    /// 0-based index in a pre-order walk of the tree.
    pub pre_order: usize,
    /// 0-based index in a post-order walk of the tree.
    pub post_order: usize,
}

/// Data stored in each node.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// Syntactic category.
    pub kind: TypeId,
    /// Label, possibly empty.
    pub label: String,
    /// Start offset in the original source.
    pub pos: usize,
    /// Length in the original source.
    pub length: usize,
    /// Derived metrics, valid once the tree is prepared.
    pub metrics: NodeMetrics,
}

impl NodeData {
    /// Create node data with the given type and label.
    pub fn new(kind: TypeId, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            pos: 0,
            length: 0,
            metrics: NodeMetrics::default(),
        }
    }

    /// Attach a source span.
    pub fn with_position(mut self, pos: usize, length: usize) -> Self {
        self.pos = pos;
        self.length = length;
        self
    }
}

/// A rooted, ordered, labeled tree.
#[derive(Debug, Clone)]
pub struct Tree {
    /// Node storage.
    pub arena: Arena<NodeData>,
    /// The root, or `None` for the empty tree.
    pub root: Option<NodeId>,
    prepared: Option<HashStrategy>,
}

impl Tree {
    /// Create a tree with a single root node.
    pub fn new(root_data: NodeData) -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(root_data);
        Self {
            arena,
            root: Some(root),
            prepared: None,
        }
    }

    /// Create the empty tree.
    pub fn empty() -> Self {
        Self {
            arena: Arena::new(),
            root: None,
            prepared: Some(HashStrategy::default()),
        }
    }

    /// Append a child to `parent` and return its id.
    ///
    /// Invalidates previously computed metrics.
    pub fn add_child(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let child = self.arena.new_node(data);
        parent.append(child, &mut self.arena);
        self.prepared = None;
        child
    }

    /// Set the source span of a node.
    pub fn set_position(&mut self, id: NodeId, pos: usize, length: usize) {
        let data = self.arena[id].get_mut();
        data.pos = pos;
        data.length = length;
    }

    /// Get a node's data.
    pub fn get(&self, id: NodeId) -> &NodeData {
        self.arena[id].get()
    }

    /// A node's type.
    pub fn kind(&self, id: NodeId) -> TypeId {
        self.get(id).kind
    }

    /// A node's label.
    pub fn label(&self, id: NodeId) -> &str {
        &self.get(id).label
    }

    /// A node's derived metrics.
    pub fn metrics(&self, id: NodeId) -> &NodeMetrics {
        &self.get(id).metrics
    }

    /// Number of nodes in the subtree rooted at `id`.
    pub fn size(&self, id: NodeId) -> usize {
        self.get(id).metrics.size
    }

    /// Height of the subtree rooted at `id`; leaves have height 1.
    pub fn height(&self, id: NodeId) -> usize {
        self.get(id).metrics.height
    }

    /// Subtree hash of `id`.
    pub fn hash(&self, id: NodeId) -> NodeHash {
        self.get(id).metrics.hash
    }

    /// Parent of a node, `None` for the root.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id].parent()
    }

    /// Children of a node, in order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    /// Number of children of a node.
    pub fn child_count(&self, id: NodeId) -> usize {
        id.children(&self.arena).count()
    }

    /// The `index`-th child of a node.
    pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        id.children(&self.arena).nth(index)
    }

    /// Index of a node among its siblings; 0 for the root.
    pub fn position(&self, id: NodeId) -> usize {
        id.preceding_siblings(&self.arena).count() - 1
    }

    /// Whether a node has no children.
    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.arena[id].first_child().is_none()
    }

    /// Whether a node is the root of this tree.
    pub fn is_root(&self, id: NodeId) -> bool {
        self.root == Some(id)
    }

    /// Number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.root.map_or(0, |root| root.descendants(&self.arena).count())
    }

    /// Whether the tree has no root.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Lazy pre-order walk of the whole tree.
    pub fn pre_order(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.root
            .into_iter()
            .flat_map(|root| root.descendants(&self.arena))
    }

    /// Lazy post-order walk of the whole tree.
    pub fn post_order(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.root
            .into_iter()
            .flat_map(|root| self.post_order_from(root))
    }

    /// Lazy post-order walk of the subtree rooted at `id`, `id` last.
    pub fn post_order_from(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.traverse(&self.arena).filter_map(|edge| match edge {
            NodeEdge::End(node) => Some(node),
            NodeEdge::Start(_) => None,
        })
    }

    /// Pre-order walk of the subtree rooted at `id`, `id` first.
    pub fn subtree(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.descendants(&self.arena)
    }

    /// Pre-order walk of the proper descendants of `id`.
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.descendants(&self.arena).skip(1)
    }

    /// Leaves of the subtree rooted at `id`, left to right.
    pub fn leaves(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.subtree(id).filter(|&n| self.is_leaf(n))
    }

    /// Breadth-first walk of the whole tree.
    pub fn bfs(&self) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut queue: VecDeque<NodeId> = self.root.into_iter().collect();
        while let Some(id) = queue.pop_front() {
            order.push(id);
            queue.extend(self.children(id));
        }
        order
    }

    /// Whether [`Tree::prepare`] ran since the last structural edit.
    pub fn is_prepared(&self) -> bool {
        self.prepared.is_some()
    }

    /// Hash strategy used by the last [`Tree::prepare`].
    pub fn hash_strategy(&self) -> Option<HashStrategy> {
        self.prepared
    }

    /// Whether `node` lies strictly below `ancestor`. Requires a prepared tree.
    pub fn is_descendant(&self, ancestor: NodeId, node: NodeId) -> bool {
        let a = self.metrics(ancestor);
        let n = self.metrics(node).pre_order;
        n > a.pre_order && n < a.pre_order + a.size
    }

    /// Compute every derived metric in one pre-order and one post-order pass.
    pub fn prepare(&mut self, strategy: HashStrategy) {
        let mut generator = strategy.generator();
        self.prepare_with(generator.as_mut());
    }

    /// Like [`Tree::prepare`], hashing with a caller-provided generator so
    /// its caches can be shared by both trees of a run.
    pub fn prepare_with(&mut self, generator: &mut dyn HashGenerator) {
        let strategy = generator.strategy();
        let Some(root) = self.root else {
            self.prepared = Some(strategy);
            return;
        };

        let pre_order: Vec<NodeId> = root.descendants(&self.arena).collect();
        for (index, &id) in pre_order.iter().enumerate() {
            let depth = match self.arena[id].parent() {
                Some(parent) => self.arena[parent].get().metrics.depth + 1,
                None => 0,
            };
            let metrics = &mut self.arena[id].get_mut().metrics;
            metrics.pre_order = index;
            metrics.depth = depth;
        }

        let post_order: Vec<NodeId> = self.post_order_from(root).collect();
        for (index, &id) in post_order.iter().enumerate() {
            let mut size = 1;
            let mut height = 0;
            let mut structure = RapidHasher::default();
            self.kind(id).hash(&mut structure);
            for child in id.children(&self.arena) {
                let child_metrics = &self.arena[child].get().metrics;
                size += child_metrics.size;
                height = height.max(child_metrics.height);
                child_metrics.structure_hash.hash(&mut structure);
            }
            self.child_count(id).hash(&mut structure);

            let metrics = &mut self.arena[id].get_mut().metrics;
            metrics.post_order = index;
            metrics.size = size;
            metrics.height = height + 1;
            metrics.structure_hash = NodeHash(structure.finish());

            let hash = generator.hash_node(self, id);
            self.arena[id].get_mut().metrics.hash = hash;
        }

        self.prepared = Some(strategy);
        debug!(
            nodes = post_order.len(),
            strategy = ?strategy,
            "tree prepared"
        );
    }

    /// Whether the subtree at `id` and the subtree at `other_id` in `other`
    /// have the same types, labels and shape.
    ///
    /// Compares hashes first and confirms with a node-by-node walk.
    pub fn is_isomorphic(&self, id: NodeId, other: &Tree, other_id: NodeId) -> bool {
        if self.hash(id) != other.hash(other_id) || self.size(id) != other.size(other_id) {
            return false;
        }
        self.subtree(id)
            .zip(other.subtree(other_id))
            .all(|(a, b)| {
                self.kind(a) == other.kind(b)
                    && self.label(a) == other.label(b)
                    && self.child_count(a) == other.child_count(b)
            })
    }

    /// Whether the two subtrees have the same types and shape, labels ignored.
    pub fn is_isostructural(&self, id: NodeId, other: &Tree, other_id: NodeId) -> bool {
        if self.metrics(id).structure_hash != other.metrics(other_id).structure_hash
            || self.size(id) != other.size(other_id)
        {
            return false;
        }
        self.subtree(id)
            .zip(other.subtree(other_id))
            .all(|(a, b)| {
                self.kind(a) == other.kind(b) && self.child_count(a) == other.child_count(b)
            })
    }
}
