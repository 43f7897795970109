//! Matchers populate a [`MappingStore`] between two prepared trees.
//!
//! Concrete pipelines are [`CompositeMatcher`]s chaining phases; the
//! [`MatcherRegistry`] resolves a pipeline from its string id.

use crate::config::MatchingConfig;
use crate::debug;
use crate::error::{Error, Result};
use crate::mapping::MappingStore;
use crate::tree::Tree;

mod bottom_up;
mod change_distiller;
mod leaves;
mod subtree;
mod zs;

pub use bottom_up::{
    BottomUpMatcher, BottomUpStrategy, CompleteBottomUp, GreedyBottomUp, SimpleBottomUp,
    XyBottomUp,
};
pub use change_distiller::ChangeDistillerBottomUpMatcher;
pub use leaves::LeavesMatcher;
pub use subtree::GreedySubtreeMatcher;
pub use zs::ZsMatcher;

/// A matching phase.
///
/// Implementations only add mappings: they never remove or replace a
/// mapping made by an earlier phase.
pub trait Matcher: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Extend `mappings` with pairs between `src` and `dst`.
    fn match_trees(&self, src: &Tree, dst: &Tree, mappings: &mut MappingStore);
}

/// Runs several matchers in sequence on the same mapping store.
pub struct CompositeMatcher {
    name: &'static str,
    stages: Vec<Box<dyn Matcher>>,
}

impl CompositeMatcher {
    /// Build a pipeline from its stages, run in order.
    pub fn new(name: &'static str, stages: Vec<Box<dyn Matcher>>) -> Self {
        Self { name, stages }
    }

    /// Names of the stages, in order.
    pub fn stage_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.stages.iter().map(|stage| stage.name())
    }
}

impl Matcher for CompositeMatcher {
    fn name(&self) -> &'static str {
        self.name
    }

    fn match_trees(&self, src: &Tree, dst: &Tree, mappings: &mut MappingStore) {
        for stage in &self.stages {
            debug!(pipeline = self.name, stage = stage.name(), "stage start");
            stage.match_trees(src, dst, mappings);
            debug!(
                pipeline = self.name,
                stage = stage.name(),
                matched = mappings.len(),
                "stage done"
            );
        }
    }
}

/// Builds a matcher from the run configuration.
pub type MatcherFactory = fn(&MatchingConfig) -> Box<dyn Matcher>;

/// Maps matcher ids to constructors.
pub struct MatcherRegistry {
    entries: Vec<(&'static str, MatcherFactory)>,
}

impl Default for MatcherRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl MatcherRegistry {
    /// A registry with nothing registered.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// A registry with the built-in pipelines:
    ///
    /// | id | phases |
    /// |---|---|
    /// | `gumtree` | greedy subtree, greedy bottom-up, leaves |
    /// | `gumtree-simple` | greedy subtree, simple bottom-up, leaves |
    /// | `gumtree-complete` | greedy subtree, complete bottom-up |
    /// | `xy` | greedy subtree, xy bottom-up, leaves |
    /// | `change-distiller` | leaves, change-distiller bottom-up |
    /// | `zs` | Zhang-Shasha on the whole trees |
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("gumtree", gumtree);
        registry.register("gumtree-simple", gumtree_simple);
        registry.register("gumtree-complete", gumtree_complete);
        registry.register("xy", xy);
        registry.register("change-distiller", change_distiller);
        registry.register("zs", |_| Box::new(ZsMatcher));
        registry
    }

    /// Register a constructor, replacing any previous one under the same id.
    pub fn register(&mut self, id: &'static str, factory: MatcherFactory) {
        if let Some(entry) = self.entries.iter_mut().find(|(known, _)| *known == id) {
            entry.1 = factory;
        } else {
            self.entries.push((id, factory));
        }
    }

    /// Build the matcher registered under `id`.
    pub fn create(&self, id: &str, config: &MatchingConfig) -> Result<Box<dyn Matcher>> {
        self.entries
            .iter()
            .find(|(known, _)| *known == id)
            .map(|(_, factory)| factory(config))
            .ok_or_else(|| Error::UnknownMatcher { id: id.to_owned() })
    }

    /// Registered ids, in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }
}

fn gumtree(config: &MatchingConfig) -> Box<dyn Matcher> {
    Box::new(CompositeMatcher::new(
        "gumtree",
        vec![
            Box::new(GreedySubtreeMatcher::from_config(config)),
            Box::new(BottomUpMatcher::new(GreedyBottomUp::from_config(config), config)),
            Box::new(LeavesMatcher::from_config(config)),
        ],
    ))
}

fn gumtree_simple(config: &MatchingConfig) -> Box<dyn Matcher> {
    Box::new(CompositeMatcher::new(
        "gumtree-simple",
        vec![
            Box::new(GreedySubtreeMatcher::from_config(config)),
            Box::new(BottomUpMatcher::new(SimpleBottomUp::from_config(config), config)),
            Box::new(LeavesMatcher::from_config(config)),
        ],
    ))
}

fn gumtree_complete(config: &MatchingConfig) -> Box<dyn Matcher> {
    Box::new(CompositeMatcher::new(
        "gumtree-complete",
        vec![
            Box::new(GreedySubtreeMatcher::from_config(config)),
            Box::new(BottomUpMatcher::new(CompleteBottomUp::from_config(config), config)),
        ],
    ))
}

fn xy(config: &MatchingConfig) -> Box<dyn Matcher> {
    Box::new(CompositeMatcher::new(
        "xy",
        vec![
            Box::new(GreedySubtreeMatcher::from_config(config)),
            Box::new(BottomUpMatcher::new(XyBottomUp::from_config(config), config)),
            Box::new(LeavesMatcher::from_config(config)),
        ],
    ))
}

fn change_distiller(config: &MatchingConfig) -> Box<dyn Matcher> {
    Box::new(CompositeMatcher::new(
        "change-distiller",
        vec![
            Box::new(LeavesMatcher::from_config(config)),
            Box::new(ChangeDistillerBottomUpMatcher::from_config(config)),
        ],
    ))
}
