//! P² quantile estimator
//!
//! Implementation of the P² ("P-square") algorithm of Jain and Chlamtac for
//! estimating a fixed set of quantiles without storing observations. The
//! estimator keeps `k + 2` markers (one per requested quantile plus the
//! minimum and maximum) and nudges their heights with a piecewise-parabolic
//! prediction as the stream advances.
//!
//! Memory and per-update time are O(k), independent of the stream length.

use crate::quantiles::{check_finite, clamp_phi, nearest_rank, sort_values};
use crate::traits::{QuantileError, QuantileSketch, Sketch};

#[cfg(feature = "std")]
use std::vec::Vec;

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Snapshot of one P² marker
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Marker {
    /// Quantile this marker tracks (0 and 1 for the extreme markers)
    pub phi: f64,
    /// Current estimate of the quantile value
    pub height: f64,
    /// Number of observations at or below this marker
    pub position: i64,
    /// Real-valued position the marker should occupy, `1 + phi * (n - 1)`
    pub desired: f64,
}

/// P² streaming quantile estimator
///
/// Tracks the quantiles supplied at construction. Until `k + 2` values have
/// been observed the raw values are buffered and queries answer with the
/// empirical quantile of the buffer; afterwards each marker's height is the
/// running estimate.
///
/// # Example
///
/// ```
/// use streamquant::quantiles::P2Estimator;
/// use streamquant::traits::QuantileSketch;
///
/// let mut p2 = P2Estimator::new(&[0.5, 0.95]).unwrap();
///
/// for i in 1..=1000 {
///     p2.insert(i as f64).unwrap();
/// }
///
/// let p50 = p2.quantile(0.5);
/// let p95 = p2.quantile(0.95);
/// assert!(p50 > 450.0 && p50 < 550.0);
/// assert!(p95 > 900.0 && p95 <= 1000.0);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct P2Estimator {
    /// Requested quantiles, sorted ascending
    targets: Vec<f64>,
    /// Desired-position increment per observation: 0, targets.., 1
    increments: Vec<f64>,
    /// Marker heights
    heights: Vec<f64>,
    /// Marker integer positions (1-based ranks)
    positions: Vec<i64>,
    /// Marker desired positions
    desired: Vec<f64>,
    /// Raw observations collected before the markers are seeded
    buffer: Vec<f64>,
    /// Total count of values
    count: u64,
}

impl P2Estimator {
    /// Create an estimator for the given quantiles
    ///
    /// # Arguments
    ///
    /// * `quantiles` - Non-empty set of targets, each strictly inside (0, 1),
    ///   sorted ascending. Duplicates are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`QuantileError::InvalidArgument`] if the set is empty,
    /// unsorted, or contains a value outside (0, 1).
    pub fn new(quantiles: &[f64]) -> Result<Self, QuantileError> {
        if quantiles.is_empty() {
            return Err(QuantileError::InvalidArgument(
                "quantile set must not be empty".into(),
            ));
        }
        if let Some(&phi) = quantiles
            .iter()
            .find(|&&phi| !(phi.is_finite() && phi > 0.0 && phi < 1.0))
        {
            return Err(QuantileError::InvalidArgument(format!(
                "quantile must be in (0, 1), got {}",
                phi
            )));
        }
        if quantiles.windows(2).any(|w| w[0] > w[1]) {
            return Err(QuantileError::InvalidArgument(
                "quantiles must be sorted ascending".into(),
            ));
        }

        let m = quantiles.len() + 2;
        let mut increments = Vec::with_capacity(m);
        increments.push(0.0);
        increments.extend_from_slice(quantiles);
        increments.push(1.0);

        Ok(Self {
            targets: quantiles.to_vec(),
            increments,
            heights: vec![0.0; m],
            positions: vec![0; m],
            desired: vec![0.0; m],
            buffer: Vec::with_capacity(m),
            count: 0,
        })
    }

    /// Quantiles this estimator was built for
    pub fn targets(&self) -> &[f64] {
        &self.targets
    }

    /// Number of markers, `k + 2`
    pub fn num_markers(&self) -> usize {
        self.heights.len()
    }

    /// Whether enough values have arrived to seed the markers
    pub fn is_initialized(&self) -> bool {
        self.count >= self.heights.len() as u64
    }

    /// Snapshot of the markers, empty until the estimator is initialized
    pub fn markers(&self) -> Vec<Marker> {
        if !self.is_initialized() {
            return Vec::new();
        }
        (0..self.heights.len())
            .map(|i| Marker {
                phi: self.increments[i],
                height: self.heights[i],
                position: self.positions[i],
                desired: self.desired[i],
            })
            .collect()
    }

    /// Add a value to the estimator
    ///
    /// # Errors
    ///
    /// Returns [`QuantileError::NonFiniteValue`] for NaN or infinite input;
    /// the estimator is left untouched.
    pub fn insert(&mut self, value: f64) -> Result<(), QuantileError> {
        check_finite(value)?;

        let seeded = self.is_initialized();
        self.count += 1;

        if seeded {
            self.observe(value);
        } else {
            self.buffer.push(value);
            if self.buffer.len() == self.heights.len() {
                self.seed_markers();
            }
        }
        Ok(())
    }

    /// Seed marker heights from the sorted initial buffer.
    ///
    /// With exactly `m` observations and strictly increasing integer
    /// positions, the rounded target ranks are forced to `1..=m`.
    fn seed_markers(&mut self) {
        sort_values(&mut self.buffer);
        let m = self.heights.len();
        let span = (m - 1) as f64;
        for i in 0..m {
            self.heights[i] = self.buffer[i];
            self.positions[i] = i as i64 + 1;
            self.desired[i] = 1.0 + self.increments[i] * span;
        }
        self.buffer.clear();
        tracing::trace!(markers = m, "p2 markers initialized");
    }

    fn observe(&mut self, value: f64) {
        let last = self.heights.len() - 1;

        let cell = if value < self.heights[0] {
            self.heights[0] = value;
            0
        } else if value >= self.heights[last] {
            self.heights[last] = value;
            last - 1
        } else {
            // heights[0] <= value < heights[last]
            self.heights[1..last].partition_point(|&h| h <= value)
        };

        for pos in &mut self.positions[cell + 1..] {
            *pos += 1;
        }
        for (desired, inc) in self.desired.iter_mut().zip(&self.increments) {
            *desired += inc;
        }

        for i in 1..last {
            self.adjust(i);
        }
    }

    fn adjust(&mut self, i: usize) {
        let d = self.desired[i] - self.positions[i] as f64;
        let gap_next = self.positions[i + 1] - self.positions[i];
        let gap_prev = self.positions[i - 1] - self.positions[i];

        if (d >= 1.0 && gap_next > 1) || (d <= -1.0 && gap_prev < -1) {
            let step: i64 = if d > 0.0 { 1 } else { -1 };
            let candidate = self.parabolic(i, step as f64);
            if !candidate.is_nan() {
                self.heights[i] = candidate.clamp(self.heights[i - 1], self.heights[i + 1]);
            }
            self.positions[i] += step;
        }
    }

    /// Piecewise-parabolic prediction of marker `i` moved by `d` (±1).
    fn parabolic(&self, i: usize, d: f64) -> f64 {
        let q = self.heights[i];
        let q_prev = self.heights[i - 1];
        let q_next = self.heights[i + 1];
        let n = self.positions[i] as f64;
        let n_prev = self.positions[i - 1] as f64;
        let n_next = self.positions[i + 1] as f64;

        q + d / (n_next - n_prev)
            * ((n - n_prev + d) * (q_next - q) / (n_next - n)
                + (n_next - n - d) * (q - q_prev) / (n - n_prev))
    }

    /// Index of the marker whose quantile is closest to `phi`
    fn marker_for(&self, phi: f64) -> usize {
        self.increments
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                crate::math::abs(*a - phi).total_cmp(&crate::math::abs(*b - phi))
            })
            .map(|(i, _)| i)
            .unwrap_or(0)
    }
}

impl Sketch for P2Estimator {
    type Item = f64;

    fn update(&mut self, item: &f64) -> Result<(), QuantileError> {
        self.insert(*item)
    }

    fn clear(&mut self) {
        self.heights.iter_mut().for_each(|h| *h = 0.0);
        self.positions.iter_mut().for_each(|p| *p = 0);
        self.desired.iter_mut().for_each(|d| *d = 0.0);
        self.buffer.clear();
        self.count = 0;
    }

    fn size_bytes(&self) -> usize {
        core::mem::size_of::<Self>()
            + (self.targets.capacity()
                + self.increments.capacity()
                + self.heights.capacity()
                + self.desired.capacity()
                + self.buffer.capacity())
                * core::mem::size_of::<f64>()
            + self.positions.capacity() * core::mem::size_of::<i64>()
    }

    fn count(&self) -> u64 {
        self.count
    }
}

impl QuantileSketch for P2Estimator {
    /// Marker height for `phi`, or the empirical quantile of the buffered
    /// values before initialization.
    ///
    /// Only the quantiles given at construction, 0 and 1 are tracked; any
    /// other `phi` is answered by the marker with the nearest quantile.
    fn quantile(&self, phi: f64) -> f64 {
        let Some(phi) = clamp_phi(phi) else {
            return f64::NAN;
        };
        if self.count == 0 {
            return f64::NAN;
        }

        if !self.is_initialized() {
            let mut sorted = self.buffer.clone();
            sort_values(&mut sorted);
            return nearest_rank(&sorted, phi);
        }

        self.heights[self.marker_for(phi)]
    }

    fn min(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else if !self.is_initialized() {
            self.buffer.iter().copied().reduce(f64::min)
        } else {
            Some(self.heights[0])
        }
    }

    fn max(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else if !self.is_initialized() {
            self.buffer.iter().copied().reduce(f64::max)
        } else {
            self.heights.last().copied()
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Marker {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("Marker", 4)?;
        state.serialize_field("phi", &self.phi)?;
        state.serialize_field("height", &self.height)?;
        state.serialize_field("position", &self.position)?;
        state.serialize_field("desired", &self.desired)?;
        state.end()
    }
}
