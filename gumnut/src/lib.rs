//! # Gumnut
//!
//! GumTree-style matching of ordered labeled trees and Chawathe edit script
//! generation.
//!
//! ## Algorithm Overview
//!
//! Gumnut implements tree differencing based on:
//! - **GumTree** (Falleri et al., ASE 2014) for node matching
//! - **Zhang-Shasha** (1989) for optimal matching of small subtrees
//! - **Chawathe algorithm** (1996) for edit script generation
//!
//! A run works in phases:
//!
//! 1. **Preparation**: compute sizes, heights, orders and subtree hashes
//! 2. **Top-down matching**: map identical subtrees, tallest first, by hash
//! 3. **Bottom-up matching**: map containers by the overlap of their mapped
//!    descendants, then recover their children
//! 4. **Leaf matching**: pair leftover leaves by label similarity
//! 5. **Edit script generation**: produce INSERT, DELETE, UPDATE and MOVE actions
//!
//! The phases run by a pipeline are picked by id from a [`MatcherRegistry`].
//!
//! ## Usage
//!
//! ```
//! use gumnut::{MatchingConfig, NodeData, Tree, TypeRegistry, diff_trees, prepare_trees};
//!
//! let mut types = TypeRegistry::new();
//! let call = types.intern("call");
//! let name = types.intern("name");
//!
//! let mut src = Tree::new(NodeData::new(call, ""));
//! let root = src.root.unwrap();
//! src.add_child(root, NodeData::new(name, "print"));
//!
//! let mut dst = Tree::new(NodeData::new(call, ""));
//! let root = dst.root.unwrap();
//! dst.add_child(root, NodeData::new(name, "println"));
//!
//! let config = MatchingConfig::default();
//! prepare_trees(&mut src, &mut dst, config.hash);
//! let diff = diff_trees(&src, &dst, &config).unwrap();
//! for action in &diff.actions {
//!     println!("{action}");
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::std_instead_of_core)]

pub use indextree;

mod tracing_macros;
pub(crate) use tracing_macros::{debug, trace};

/// Edit actions, script generation and replay
pub mod actions;
/// Knobs honored by the matchers
pub mod config;
mod error;
/// Subtree hashing
pub mod hash;
/// Mapping stores
pub mod mapping;
/// Matching phases and pipelines
pub mod matchers;
/// Longest common subsequences over node sequences
pub mod sequence;
/// Similarity metrics
pub mod similarity;
/// Tree representation
pub mod tree;

pub use actions::{
    Action, ActionKind, EditScript, generate_edit_script, generate_insert_delete_script, replay,
    simplify_edit_script,
};
pub use config::{MatchingConfig, SubtreePriority};
pub use error::{Error, Result};
pub use hash::{HashStrategy, NodeHash};
pub use mapping::{MappingStore, MultiMappingStore};
pub use matchers::{Matcher, MatcherRegistry};
pub use tree::{NodeData, NodeMetrics, Tree, TypeId, TypeRegistry};

/// Result of diffing two trees.
#[derive(Debug, Clone)]
pub struct Diff {
    /// Node mappings between the source and the destination tree.
    pub mappings: MappingStore,
    /// Actions transforming the source tree into the destination tree.
    pub actions: EditScript,
}

/// Prepare both trees of a run with one hash generator, so that caches it
/// keeps are shared between them.
pub fn prepare_trees(src: &mut Tree, dst: &mut Tree, strategy: HashStrategy) {
    let mut generator = strategy.generator();
    src.prepare_with(generator.as_mut());
    dst.prepare_with(generator.as_mut());
}

/// Map the nodes of two prepared trees with the matcher named by
/// `config.matcher` in the default registry.
pub fn compute_mappings(src: &Tree, dst: &Tree, config: &MatchingConfig) -> Result<MappingStore> {
    compute_mappings_with(&MatcherRegistry::default(), src, dst, config)
}

/// Like [`compute_mappings`], resolving the matcher in `registry`.
pub fn compute_mappings_with(
    registry: &MatcherRegistry,
    src: &Tree,
    dst: &Tree,
    config: &MatchingConfig,
) -> Result<MappingStore> {
    if !src.is_prepared() || !dst.is_prepared() {
        return Err(Error::UnpreparedTree);
    }
    let matcher = registry.create(&config.matcher, config)?;
    let mut mappings = MappingStore::for_trees(src, dst);
    debug!(
        matcher = matcher.name(),
        src_nodes = src.len(),
        dst_nodes = dst.len(),
        "compute_mappings start"
    );
    matcher.match_trees(src, dst, &mut mappings);
    debug!(matched = mappings.len(), "compute_mappings done");
    Ok(mappings)
}

/// Compute a diff between two prepared trees.
///
/// This is the main entry point. It:
/// 1. Computes the mappings with the configured pipeline
/// 2. Generates an edit script using Chawathe's algorithm
pub fn diff_trees(src: &Tree, dst: &Tree, config: &MatchingConfig) -> Result<Diff> {
    diff_trees_with(&MatcherRegistry::default(), src, dst, config)
}

/// Like [`diff_trees`], resolving the matcher in `registry`.
pub fn diff_trees_with(
    registry: &MatcherRegistry,
    src: &Tree,
    dst: &Tree,
    config: &MatchingConfig,
) -> Result<Diff> {
    let mappings = compute_mappings_with(registry, src, dst, config)?;
    let actions = generate_edit_script(src, dst, &mappings);
    Ok(Diff { mappings, actions })
}
