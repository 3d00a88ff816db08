//! # cgrange Core Library
//!
//! Range finding and Boltzmann-inversion seeding for coarse-grained force matching.
//!
//! Given a trajectory of coarse-grained sites and an interaction model, the library finds the
//! sampled range of every bond distance, angle, dihedral and nonbonded pair distance, records
//! their distributions, and turns the histograms into initial potentials of mean force.
//!
//! ## Architecture
//!
//! - **[`core`]: The Foundation.** Stateless data models (topology, frames, interaction
//!   classes, range trackers), minimum-image geometry, and the text file readers and writers.
//!
//! - **[`engine`]: The Logic Core.** The scan context that samples every interaction instance
//!   per frame, the range and histogram finalization, and the Boltzmann inversion feeding a
//!   pluggable linear system.
//!
//! - **[`workflows`]: The Public API.** Runs the complete pipeline over a frame source with
//!   progress reporting.

pub mod core;
pub mod engine;
pub mod workflows;
