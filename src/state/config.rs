//! Match configuration.
//!
//! Passed explicitly to the board and orchestrator. Deserializes from
//! partial JSON; missing fields fall back to the defaults below.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::board::{COLUMNS_PER_SIDE, DRAW_PILE_SIZE};

/// Cards dealt into each tableau column.
pub const DEFAULT_COLUMN_CAPACITY: usize = 3;

/// Seconds between the end of the deal and the start of play.
pub const DEFAULT_DEAL_PRESENTATION_DELAY: f64 = 3.0;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("column capacity must be at least 1")]
    ZeroColumnCapacity,
    #[error("{columns} columns of {capacity} cards plus a foundation seed exceed a {pile}-card draw pile")]
    TooManyTableauCards {
        columns: usize,
        capacity: usize,
        pile: usize,
    },
    #[error("delay must be a non-negative number of seconds, got {0}")]
    InvalidDelay(f64),
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Cards per tableau column after the deal
    pub column_capacity: usize,

    /// Wait between dealing and play, in seconds
    pub deal_presentation_delay: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            column_capacity: DEFAULT_COLUMN_CAPACITY,
            deal_presentation_delay: DEFAULT_DEAL_PRESENTATION_DELAY,
        }
    }
}

impl MatchConfig {
    /// Parse and validate.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_column_capacity(mut self, capacity: usize) -> Self {
        self.column_capacity = capacity;
        self
    }

    pub fn with_deal_delay(mut self, seconds: f64) -> Self {
        self.deal_presentation_delay = seconds;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.column_capacity == 0 {
            return Err(ConfigError::ZeroColumnCapacity);
        }
        // One card per side is reserved for the opening foundation
        if COLUMNS_PER_SIDE * self.column_capacity + 1 > DRAW_PILE_SIZE {
            return Err(ConfigError::TooManyTableauCards {
                columns: COLUMNS_PER_SIDE,
                capacity: self.column_capacity,
                pile: DRAW_PILE_SIZE,
            });
        }
        if !self.deal_presentation_delay.is_finite() || self.deal_presentation_delay < 0.0 {
            return Err(ConfigError::InvalidDelay(self.deal_presentation_delay));
        }
        Ok(())
    }

    /// Cards left in each draw pile once the deal and foundation seed are done.
    pub fn reserve_size(&self) -> usize {
        DRAW_PILE_SIZE - COLUMNS_PER_SIDE * self.column_capacity - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_valid() {
        let config = MatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.reserve_size(), 10);
    }

    #[test]
    fn test_partial_json() {
        let config = MatchConfig::from_json(r#"{"column_capacity": 4}"#).unwrap();
        assert_eq!(config.column_capacity, 4);
        assert_eq!(config.deal_presentation_delay, DEFAULT_DEAL_PRESENTATION_DELAY);
        assert_eq!(config.reserve_size(), 5);
    }

    #[test]
    fn test_rejects_oversized_columns() {
        // 5 * 5 + 1 = 26 still fits
        assert!(MatchConfig::default().with_column_capacity(5).validate().is_ok());
        assert!(matches!(
            MatchConfig::default().with_column_capacity(6).validate(),
            Err(ConfigError::TooManyTableauCards { capacity: 6, .. })
        ));
        assert!(matches!(
            MatchConfig::default().with_column_capacity(0).validate(),
            Err(ConfigError::ZeroColumnCapacity)
        ));
    }

    #[test]
    fn test_rejects_negative_delay() {
        assert!(matches!(
            MatchConfig::from_json(r#"{"deal_presentation_delay": -1.0}"#),
            Err(ConfigError::InvalidDelay(_))
        ));
        assert!(matches!(
            MatchConfig::from_json("not json"),
            Err(ConfigError::Json(_))
        ));
    }
}
