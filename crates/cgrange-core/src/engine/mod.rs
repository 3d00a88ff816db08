//! # Engine Module
//!
//! The stateful part of range finding. It owns the per-class sampling state while a trajectory
//! is scanned, finalizes the sampled ranges, builds histograms from the recorded distributions
//! and Boltzmann-inverts them into the first rows of the force-matching system.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - output locations, frame limits and thermodynamic inputs
//! - **Sampling** ([`sampling`]) - per-class strategy selection and single-sample evaluation
//! - **Range Finder** ([`finder`]) - the scan context: frames in, range files and histograms out
//! - **Inversion** ([`inversion`]) - histogram counts to densities and potentials
//! - **Linear System** ([`matrix`]) - the accumulator interface fed by the inversion, with a
//!   dense piecewise-linear implementation
//! - **Progress Monitoring** ([`progress`]) - optional callback for phase and frame events
//! - **Error Handling** ([`error`]) - the single error type returned by every engine operation
//!
//! ## Phases
//!
//! A [`finder::RangeFinder`] is created once, fed every frame, then consumed by
//! [`finder::RangeFinder::finish`]. The resulting [`finder::FinishedRanges`] carries the final
//! bounds into [`inversion::calculate_boltzmann_inversion`]. Nothing is shared between runs.

pub mod config;
pub mod error;
pub mod finder;
pub mod inversion;
pub mod matrix;
pub mod progress;
pub mod sampling;
