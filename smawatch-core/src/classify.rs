//! Overbought / neutral / oversold labelling of a deviation.
//!
//! Thresholds are positive magnitudes: `deviation >= overbought` is
//! overbought, `deviation <= -oversold` is oversold, both inclusive.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Deviation at or above +50% of the 200-week average.
pub const DEFAULT_OVERBOUGHT: f64 = 0.50;
/// Deviation at or below -30% of the 200-week average.
pub const DEFAULT_OVERSOLD: f64 = 0.30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Overbought,
    Neutral,
    Oversold,
}

impl Classification {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Overbought => "overbought",
            Self::Neutral => "neutral",
            Self::Oversold => "oversold",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ThresholdError {
    #[error("{name} threshold must be finite, got {value}")]
    NotFinite { name: &'static str, value: f64 },

    #[error("{name} threshold must be non-negative, got {value}")]
    Negative { name: &'static str, value: f64 },
}

/// Runtime classification thresholds, as fractions (0.5 = 50%).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub overbought: f64,
    pub oversold: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            overbought: DEFAULT_OVERBOUGHT,
            oversold: DEFAULT_OVERSOLD,
        }
    }
}

impl Thresholds {
    pub fn new(overbought: f64, oversold: f64) -> Result<Self, ThresholdError> {
        let t = Self {
            overbought,
            oversold,
        };
        t.validate()?;
        Ok(t)
    }

    pub fn validate(&self) -> Result<(), ThresholdError> {
        for (name, value) in [("overbought", self.overbought), ("oversold", self.oversold)] {
            if !value.is_finite() {
                return Err(ThresholdError::NotFinite { name, value });
            }
            if value < 0.0 {
                return Err(ThresholdError::Negative { name, value });
            }
        }
        Ok(())
    }

    pub fn classify(&self, deviation: f64) -> Classification {
        classify(deviation, self.overbought, self.oversold)
    }
}

/// Label a deviation. Pure; boundaries are inclusive.
pub fn classify(deviation: f64, overbought: f64, oversold: f64) -> Classification {
    if deviation >= overbought {
        Classification::Overbought
    } else if deviation <= -oversold {
        Classification::Oversold
    } else {
        Classification::Neutral
    }
}
