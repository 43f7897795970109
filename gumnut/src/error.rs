//! Recoverable errors surfaced to callers.
//!
//! Broken matcher preconditions (mapping a node twice, pairing nodes of
//! different types) are not represented here: they panic.

use facet::Facet;

/// Errors that can occur while configuring a run, diffing, or replaying a script.
#[derive(Facet, Debug)]
#[facet(derive(Error))]
#[repr(u8)]
pub enum Error {
    /// no matcher registered under id {id}
    UnknownMatcher { id: String },

    /// unknown configuration option {key}
    UnknownOption { key: String },

    /// invalid value {value} for configuration option {key}
    InvalidOption { key: String, value: String },

    /// tree metrics have not been computed, call Tree::prepare first
    UnpreparedTree,

    /// action references node {node} which is not present in the working tree
    MissingNode { node: usize },

    /// position {position} is out of bounds for a parent with {len} children
    PositionOutOfBounds { position: usize, len: usize },

    /// node {node} still has children and cannot be deleted on its own
    NotALeaf { node: usize },

    /// node {node} cannot be moved under itself or one of its descendants
    MoveIntoSubtree { node: usize },

    /// replay left {roots} top-level nodes instead of a single root
    DanglingRoots { roots: usize },
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;
