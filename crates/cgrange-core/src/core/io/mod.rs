//! Text outputs of the range-finding pipeline.
//!
//! Every file is plain, newline-terminated text:
//!
//! - `rmin.in` / `rmin_b.in` ([`ranges`]) - one `<name> <lower> <upper> <fm|none>` line per interaction
//! - `<basename>.dist` ([`distribution`]) - one raw sampled value per line
//! - `<basename>.hist` ([`histogram`]) - `#center<TAB>counts` table of half-width bins
//! - `<basename>.rdf` - `# r gofr` table written by the Boltzmann inversion

pub mod distribution;
pub mod error;
pub mod histogram;
pub mod ranges;
