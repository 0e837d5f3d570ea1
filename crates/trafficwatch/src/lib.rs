//! `trafficwatch` - Road-segment speed tracking and traffic sightings
//!
//! This library stores road segments with their speed readings, classifies
//! each segment's traffic intensity against configurable thresholds, ingests
//! car sightings reported by roadside sensors and answers where a car was
//! seen recently. The [`api`] module exposes all of it over HTTP.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod import;
pub mod ingest;
pub mod intensity;
pub mod logging;
pub mod model;
pub mod query;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
pub use intensity::{Thresholds, TrafficIntensity};
pub use logging::init_logging;
pub use storage::{Storage, StorageStats};
