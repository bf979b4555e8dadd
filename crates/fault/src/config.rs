//! The `config` module contains the [TraceConfig].

use crate::MAX_POSITION_DEPTH;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// The [TraceConfig] struct describes the shape of a game tree. Whether a game is flat or split
/// is chosen here, explicitly, rather than inferred from the providers in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceConfig {
    /// The maximum depth of the game tree.
    pub max_depth: u64,
    /// The depth of the top game's leaves in a split game.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_depth: Option<u64>,
}

impl TraceConfig {
    /// Creates a new [TraceConfig] for a flat game.
    pub fn new(max_depth: u64) -> Self {
        Self {
            max_depth,
            split_depth: None,
        }
    }

    /// Creates a new [TraceConfig] for a split game.
    pub fn split(max_depth: u64, split_depth: u64) -> Self {
        Self {
            max_depth,
            split_depth: Some(split_depth),
        }
    }

    /// Validates the [TraceConfig].
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 || self.max_depth > MAX_POSITION_DEPTH {
            bail!(
                "max depth must be within [1, {}], got {}",
                MAX_POSITION_DEPTH,
                self.max_depth
            );
        }
        if let Some(split_depth) = self.split_depth {
            if split_depth >= self.max_depth {
                bail!(
                    "split depth {} must be smaller than max depth {}",
                    split_depth,
                    self.max_depth
                );
            }
        }
        Ok(())
    }

    /// Returns the depth of the bottom game trees, if the game is split.
    pub fn bottom_depth(&self) -> Option<u64> {
        self.split_depth
            .map(|split_depth| self.max_depth.saturating_sub(split_depth + 1))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn validation() {
        assert!(TraceConfig::new(4).validate().is_ok());
        assert!(TraceConfig::split(4, 2).validate().is_ok());
        assert!(TraceConfig::new(0).validate().is_err());
        assert!(TraceConfig::new(MAX_POSITION_DEPTH + 1).validate().is_err());
        assert!(TraceConfig::split(4, 4).validate().is_err());
    }

    #[test]
    fn bottom_depth() {
        assert_eq!(TraceConfig::new(4).bottom_depth(), None);
        assert_eq!(TraceConfig::split(8, 4).bottom_depth(), Some(3));
    }

    #[test]
    fn from_json() {
        let config: TraceConfig = serde_json::from_str(r#"{"max_depth":8}"#).unwrap();
        assert_eq!(config, TraceConfig::new(8));

        let config: TraceConfig =
            serde_json::from_str(r#"{"max_depth":8,"split_depth":4}"#).unwrap();
        assert_eq!(config, TraceConfig::split(8, 4));
    }
}
