//! Seasonality analysis.
//!
//! Observations for a site are gap-filled with per-detector, per-interval
//! baselines and then summed across detectors into one row per day. The
//! pipeline in [`analyzer`] wraps that core with request validation and the
//! store lookup.

pub mod aggregate;
pub mod analyzer;
pub mod types;
pub mod utility;
