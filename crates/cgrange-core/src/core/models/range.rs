/// Magnitude of the sentinel used for untouched bounds and for clamping inverted potentials.
pub const VERY_LARGE: f64 = 1.0e6;

/// Tolerance used when comparing against sentinels and when placing values on the bin grid.
pub const VERY_SMALL_F: f64 = 1.0e-6;

/// Value written to both bounds of an interaction that has no usable sampling.
pub const UNSAMPLED: f64 = -1.0;

/// Running `[lower, upper]` bounds of the sampled parameter for every defined interaction
/// of one class.
///
/// Bounds start at `+VERY_LARGE` / `-VERY_LARGE` so the first observation sets both. After the
/// range writer has run, `upper == UNSAMPLED` marks an interaction without usable sampling.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RangeTracker {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl RangeTracker {
    pub fn new(n_defined: usize) -> Self {
        Self {
            lower: vec![VERY_LARGE; n_defined],
            upper: vec![-VERY_LARGE; n_defined],
        }
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    /// Resizes to `n_defined` interactions and resets every bound to its sentinel.
    pub fn reset(&mut self, n_defined: usize) {
        self.lower.clear();
        self.lower.resize(n_defined, VERY_LARGE);
        self.upper.clear();
        self.upper.resize(n_defined, -VERY_LARGE);
    }

    /// Tightens the bounds of interaction `index` with one sample. Ties leave the bound alone.
    #[inline]
    pub fn observe(&mut self, index: usize, value: f64) {
        if self.lower[index] > value {
            self.lower[index] = value;
        }
        if self.upper[index] < value {
            self.upper[index] = value;
        }
    }

    pub fn lower(&self, index: usize) -> f64 {
        self.lower[index]
    }

    pub fn upper(&self, index: usize) -> f64 {
        self.upper[index]
    }

    pub fn bounds(&self, index: usize) -> (f64, f64) {
        (self.lower[index], self.upper[index])
    }

    /// True while the upper bound still holds its initial sentinel.
    pub fn never_observed(&self, index: usize) -> bool {
        (self.upper[index] + VERY_LARGE).abs() < VERY_SMALL_F
    }

    /// True unless the interaction was marked unsampled by the range writer.
    pub fn is_sampled(&self, index: usize) -> bool {
        self.upper[index] != UNSAMPLED
    }

    pub fn mark_unsampled(&mut self, index: usize) {
        self.lower[index] = UNSAMPLED;
        self.upper[index] = UNSAMPLED;
    }

    pub fn clamp_upper(&mut self, index: usize, limit: f64) {
        if self.upper[index] > limit {
            self.upper[index] = limit;
        }
    }

    /// Snaps the bounds outward onto multiples of `binwidth`.
    pub fn align_to_grid(&mut self, index: usize, binwidth: f64) {
        self.lower[index] = binwidth * (self.lower[index] / binwidth + VERY_SMALL_F).floor();
        self.upper[index] = binwidth * (self.upper[index] / binwidth - VERY_SMALL_F).ceil();
    }
}
