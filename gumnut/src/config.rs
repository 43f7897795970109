//! Knobs honored by the matching pipeline.

use core::str::FromStr;

use crate::error::{Error, Result};
use crate::hash::HashStrategy;

/// Priority used to order subtrees in the greedy subtree matcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubtreePriority {
    /// Longest downward path; leaves have priority 1.
    #[default]
    Height,
    /// Number of nodes in the subtree.
    Size,
}

/// Configuration for the matching algorithm.
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    /// Registry id of the matcher to run (see [`crate::MatcherRegistry`]).
    pub matcher: String,

    /// Hash strategy used when preparing trees.
    pub hash: HashStrategy,

    /// Minimum priority for a subtree to be considered by the greedy
    /// subtree matcher. Smaller subtrees are left for later phases.
    pub min_height: usize,

    /// How subtrees are prioritized by the greedy subtree matcher.
    pub priority: SubtreePriority,

    /// Minimum similarity for the greedy and simple bottom-up matchers.
    pub bu_min_sim: f64,

    /// Subtrees at least this large on either side are never handed to the
    /// optimal last-chance recovery.
    pub bu_max_size: usize,

    /// Minimum Jaccard similarity for the xy bottom-up matcher.
    pub xy_min_sim: f64,

    /// Two leaves with different labels are only paired when their label
    /// similarity is strictly above this value.
    pub cd_label_sim: f64,

    /// Leaf count above which the change-distiller matcher uses `cd_struct_sim1`.
    pub cd_max_leaves: usize,

    /// Change-distiller threshold for large inner nodes.
    pub cd_struct_sim1: f64,

    /// Change-distiller threshold for small inner nodes.
    pub cd_struct_sim2: f64,

    /// Score leaf pairs on the rayon thread pool.
    pub parallel_leaves: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            matcher: "gumtree".to_owned(),
            hash: HashStrategy::Rolling,
            min_height: 1,
            priority: SubtreePriority::Height,
            bu_min_sim: 0.5,
            bu_max_size: 1000,
            xy_min_sim: 0.5,
            cd_label_sim: 0.5,
            cd_max_leaves: 4,
            cd_struct_sim1: 0.6,
            cd_struct_sim2: 0.4,
            parallel_leaves: false,
        }
    }
}

impl MatchingConfig {
    /// Set an option from its textual key and value.
    ///
    /// Keys: `matcher`, `hash` (`content` or `rolling`), `st_minprio`,
    /// `st_priocalc` (`height` or `size`), `bu_minsim`, `bu_minsize`,
    /// `xy_minsim`, `cd_labsim`, `cd_maxleaves`, `cd_structsim1`,
    /// `cd_structsim2`, `parallel_leaves`.
    pub fn set_option(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "matcher" => self.matcher = value.to_owned(),
            "hash" => {
                self.hash = match value {
                    "content" => HashStrategy::Content,
                    "rolling" => HashStrategy::Rolling,
                    _ => return Err(invalid(key, value)),
                }
            }
            "st_minprio" => self.min_height = parse(key, value)?,
            "st_priocalc" => {
                self.priority = match value {
                    "height" => SubtreePriority::Height,
                    "size" => SubtreePriority::Size,
                    _ => return Err(invalid(key, value)),
                }
            }
            "bu_minsim" => self.bu_min_sim = parse_ratio(key, value)?,
            "bu_minsize" => self.bu_max_size = parse(key, value)?,
            "xy_minsim" => self.xy_min_sim = parse_ratio(key, value)?,
            "cd_labsim" => self.cd_label_sim = parse_ratio(key, value)?,
            "cd_maxleaves" => self.cd_max_leaves = parse(key, value)?,
            "cd_structsim1" => self.cd_struct_sim1 = parse_ratio(key, value)?,
            "cd_structsim2" => self.cd_struct_sim2 = parse_ratio(key, value)?,
            "parallel_leaves" => self.parallel_leaves = parse(key, value)?,
            _ => {
                return Err(Error::UnknownOption {
                    key: key.to_owned(),
                });
            }
        }
        Ok(())
    }
}

fn invalid(key: &str, value: &str) -> Error {
    Error::InvalidOption {
        key: key.to_owned(),
        value: value.to_owned(),
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

fn parse_ratio(key: &str, value: &str) -> Result<f64> {
    let ratio: f64 = parse(key, value)?;
    if (0.0..=1.0).contains(&ratio) {
        Ok(ratio)
    } else {
        Err(invalid(key, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MatchingConfig::default();
        assert_eq!(config.matcher, "gumtree");
        assert_eq!(config.min_height, 1);
        assert_eq!(config.bu_min_sim, 0.5);
        assert_eq!(config.bu_max_size, 1000);
        assert_eq!(config.cd_max_leaves, 4);
        assert_eq!(config.hash, HashStrategy::Rolling);
    }

    #[test]
    fn test_set_option() {
        let mut config = MatchingConfig::default();
        config.set_option("bu_minsim", "0.3").unwrap();
        config.set_option("bu_minsize", "50").unwrap();
        config.set_option("hash", "content").unwrap();
        config.set_option("st_priocalc", "size").unwrap();
        config.set_option("matcher", "xy").unwrap();
        config.set_option("parallel_leaves", "true").unwrap();
        assert_eq!(config.bu_min_sim, 0.3);
        assert_eq!(config.bu_max_size, 50);
        assert_eq!(config.hash, HashStrategy::Content);
        assert_eq!(config.priority, SubtreePriority::Size);
        assert_eq!(config.matcher, "xy");
        assert!(config.parallel_leaves);
    }

    #[test]
    fn test_set_option_errors() {
        let mut config = MatchingConfig::default();
        assert!(matches!(
            config.set_option("nope", "1"),
            Err(Error::UnknownOption { .. })
        ));
        assert!(matches!(
            config.set_option("bu_minsim", "high"),
            Err(Error::InvalidOption { .. })
        ));
        assert!(matches!(
            config.set_option("cd_labsim", "1.5"),
            Err(Error::InvalidOption { .. })
        ));
        assert!(matches!(
            config.set_option("hash", "md5"),
            Err(Error::InvalidOption { .. })
        ));
        assert_eq!(config.bu_min_sim, 0.5, "failed sets leave the value untouched");
    }
}
