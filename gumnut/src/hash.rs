//! Subtree digests.
//!
//! Two strategies produce the same equivalence classes: two subtrees get the
//! same hash when they have the same types, labels and shape.
//!
//! - [`ContentHashGenerator`] digests a full serialization of each subtree.
//! - [`RollingHashGenerator`] combines the children's digests with the node's
//!   own entry and exit seeds in constant extra work per node.

use core::fmt;
use std::hash::Hasher;

use indextree::{NodeEdge, NodeId};
use rapidhash::{RapidHashMap as HashMap, RapidHasher};

use crate::tree::{Tree, TypeId};

/// A subtree digest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHash(pub u64);

impl fmt::Display for NodeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Which hash generator prepares a tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HashStrategy {
    /// Digest of the serialized subtree.
    Content,
    /// Polynomial rolling hash over child digests.
    #[default]
    Rolling,
}

impl HashStrategy {
    /// A fresh generator for this strategy.
    pub fn generator(self) -> Box<dyn HashGenerator> {
        match self {
            HashStrategy::Content => Box::new(ContentHashGenerator),
            HashStrategy::Rolling => Box::new(RollingHashGenerator::new()),
        }
    }
}

/// Computes the hash of one node.
///
/// Called in post-order: when `hash_node` runs for `id`, every child of `id`
/// already carries its hash and size.
pub trait HashGenerator {
    /// The strategy this generator implements.
    fn strategy(&self) -> HashStrategy;

    /// Compute the digest of the subtree rooted at `id`.
    fn hash_node(&mut self, tree: &Tree, id: NodeId) -> NodeHash;
}

const OPEN: u8 = 0x01;
const CLOSE: u8 = 0x02;

/// Hashes a canonical pre-order serialization of the subtree.
///
/// Every node contributes an open marker, its type, its label (length
/// prefixed) and a close marker once its children are written.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentHashGenerator;

impl HashGenerator for ContentHashGenerator {
    fn strategy(&self) -> HashStrategy {
        HashStrategy::Content
    }

    fn hash_node(&mut self, tree: &Tree, id: NodeId) -> NodeHash {
        let mut hasher = RapidHasher::default();
        for edge in id.traverse(&tree.arena) {
            match edge {
                NodeEdge::Start(node) => {
                    let data = tree.get(node);
                    hasher.write_u8(OPEN);
                    hasher.write_u32(data.kind.as_u32());
                    hasher.write_usize(data.label.len());
                    hasher.write(data.label.as_bytes());
                }
                NodeEdge::End(_) => hasher.write_u8(CLOSE),
            }
        }
        NodeHash(hasher.finish())
    }
}

const BASE: u64 = 33;
const SEED_OPEN: &str = "[(";
const SEED_CLOSE: &str = ")]";
const SEED_SEP: &str = "@@";

/// Entry and exit seeds per `(type, label)`, shared across the trees of a run.
#[derive(Debug, Default, Clone)]
pub struct SeedCache {
    seeds: HashMap<TypeId, HashMap<String, (u64, u64)>>,
}

impl SeedCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry and exit seeds of a node with the given type and label.
    pub fn seeds(&mut self, kind: TypeId, label: &str) -> (u64, u64) {
        let per_kind = self.seeds.entry(kind).or_default();
        if let Some(&seeds) = per_kind.get(label) {
            return seeds;
        }
        let entry = digest(&format!("{SEED_OPEN}{label}{SEED_SEP}{}", kind.as_u32()));
        let exit = digest(&format!("{}{SEED_SEP}{label}{SEED_CLOSE}", kind.as_u32()));
        per_kind.insert(label.to_owned(), (entry, exit));
        (entry, exit)
    }

    /// Number of cached `(type, label)` pairs.
    pub fn len(&self) -> usize {
        self.seeds.values().map(HashMap::len).sum()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn digest(seed: &str) -> u64 {
    let mut hasher = RapidHasher::default();
    hasher.write(seed.as_bytes());
    hasher.finish()
}

/// Rolling hash in base 33 with wrapping arithmetic.
///
/// A node spanning `n` nodes is read as the token sequence
/// `in(node) children... out(node)` of length `2n`, so its digest is
/// `in * BASE^(2n-1) + sum(child * BASE^k) + out` where each child's exponent
/// is the number of tokens that follow it.
#[derive(Debug, Clone)]
pub struct RollingHashGenerator {
    seeds: SeedCache,
    powers: Vec<u64>,
}

impl Default for RollingHashGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl RollingHashGenerator {
    /// Create a generator with empty caches.
    pub fn new() -> Self {
        Self::with_cache(SeedCache::new())
    }

    /// Create a generator reusing an existing seed cache.
    pub fn with_cache(seeds: SeedCache) -> Self {
        Self {
            seeds,
            powers: vec![1],
        }
    }

    /// Give the seed cache back.
    pub fn into_cache(self) -> SeedCache {
        self.seeds
    }

    fn pow(&mut self, exponent: usize) -> u64 {
        while self.powers.len() <= exponent {
            let last = self.powers[self.powers.len() - 1];
            self.powers.push(last.wrapping_mul(BASE));
        }
        self.powers[exponent]
    }
}

impl HashGenerator for RollingHashGenerator {
    fn strategy(&self) -> HashStrategy {
        HashStrategy::Rolling
    }

    fn hash_node(&mut self, tree: &Tree, id: NodeId) -> NodeHash {
        let data = tree.get(id);
        let (entry, exit) = self.seeds.seeds(data.kind, &data.label);
        let mut exponent = 2 * data.metrics.size - 1;
        let mut hash = entry.wrapping_mul(self.pow(exponent));
        for child in tree.children(id) {
            exponent -= 2 * tree.size(child);
            hash = hash.wrapping_add(tree.hash(child).0.wrapping_mul(self.pow(exponent)));
        }
        NodeHash(hash.wrapping_add(exit))
    }
}
