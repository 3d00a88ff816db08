//! # Workflows Module
//!
//! End-to-end entry points. [`range_finding`] scans a frame source, writes the range files,
//! histograms and distribution functions, and seeds the linear system with the inverted
//! potentials.

pub mod range_finding;
