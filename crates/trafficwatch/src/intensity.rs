//! Traffic intensity classification.
//!
//! A segment's intensity is derived from its current speed and the current
//! threshold pair. Faster traffic means lower intensity:
//!
//! | speed                              | intensity |
//! |------------------------------------|-----------|
//! | absent                             | `no_data` |
//! | `speed > medium_max`               | `low`     |
//! | `medium_min < speed <= medium_max` | `medium`  |
//! | `speed <= medium_min`              | `high`    |

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Lower medium boundary used when no threshold record exists.
pub const DEFAULT_MEDIUM_MIN: f64 = 20.0;

/// Upper medium boundary used when no threshold record exists.
pub const DEFAULT_MEDIUM_MAX: f64 = 50.0;

/// Traffic intensity category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficIntensity {
    /// The segment has no speed reading.
    NoData,
    /// Free-flowing traffic.
    Low,
    /// Moderate traffic.
    Medium,
    /// Congested traffic.
    High,
}

impl TrafficIntensity {
    /// Classify a speed against a validated threshold pair.
    #[must_use]
    pub fn classify(speed: Option<f64>, thresholds: Thresholds) -> Self {
        match speed {
            None => Self::NoData,
            Some(speed) if speed > thresholds.medium_max => Self::Low,
            Some(speed) if speed > thresholds.medium_min => Self::Medium,
            Some(_) => Self::High,
        }
    }

    /// The wire name of this category.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoData => "no_data",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for TrafficIntensity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TrafficIntensity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "no_data" => Ok(Self::NoData),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(Error::InvalidRequest(format!(
                "unknown traffic intensity: {other}"
            ))),
        }
    }
}

/// A validated `medium_min < medium_max` boundary pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    medium_min: f64,
    medium_max: f64,
}

impl Thresholds {
    /// Build a threshold pair, rejecting `medium_min >= medium_max` and NaN.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidThreshold`] when the pair is not strictly ordered.
    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    pub fn new(medium_min: f64, medium_max: f64) -> Result<Self> {
        // Written as a negation so that NaN on either side is rejected too.
        if !(medium_min < medium_max) {
            return Err(Error::InvalidThreshold {
                medium_min,
                medium_max,
            });
        }
        Ok(Self {
            medium_min,
            medium_max,
        })
    }

    /// Lower medium boundary (inclusive upper bound of `high`).
    #[must_use]
    pub fn medium_min(&self) -> f64 {
        self.medium_min
    }

    /// Upper medium boundary (inclusive upper bound of `medium`).
    #[must_use]
    pub fn medium_max(&self) -> f64 {
        self.medium_max
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            medium_min: DEFAULT_MEDIUM_MIN,
            medium_max: DEFAULT_MEDIUM_MAX,
        }
    }
}
