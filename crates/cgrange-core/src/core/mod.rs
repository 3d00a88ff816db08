//! # Core Module
//!
//! Stateless building blocks of the range-finding pipeline: the data models describing a
//! coarse-grained system and its interaction classes, the geometric evaluators, and the
//! readers/writers for every text output.
//!
//! - **Models** ([`models`]) - topology, frames, interaction classes and sampled ranges
//! - **File I/O** ([`io`]) - distribution, histogram and range files
//! - **Utilities** ([`utils`]) - minimum-image distance, angle and dihedral evaluation

pub mod io;
pub mod models;
pub mod utils;
