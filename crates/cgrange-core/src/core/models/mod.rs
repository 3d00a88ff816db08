//! Data models consumed and mutated by the range-finding pipeline.
//!
//! - [`topology`] - coarse-grained site types and per-type counts
//! - [`frame`] - one trajectory frame and its periodic box
//! - [`interaction`] - interaction classes, defined interactions and their sampling state
//! - [`model`] - the ordered class list of a coarse-grained model
//! - [`range`] - per-interaction sampled bounds and their sentinels

pub mod frame;
pub mod interaction;
pub mod model;
pub mod range;
pub mod topology;
