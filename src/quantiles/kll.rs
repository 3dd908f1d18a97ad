//! Simplified KLL quantile sketch
//!
//! Values land in level 0. When a level holds more than `capacity` values it
//! is sorted, adjacent values are paired, and a fair coin keeps one value of
//! each pair; the survivors are promoted to the next level. A value in level
//! `i` therefore stands for roughly `2^i` original observations.
//!
//! This simplified variant answers [`quantile`] by treating every retained
//! value as equally weighted, which understates the higher levels. The level
//! weighting of the full KLL sketch is available separately through
//! [`weighted_quantile`].
//!
//! The coin flips come from an injectable [`Rng`]; the default is a
//! [`SmallRng`] seeded with [`DEFAULT_SEED`], so results are reproducible.
//!
//! [`quantile`]: crate::traits::QuantileSketch::quantile
//! [`weighted_quantile`]: KllSketch::weighted_quantile

use crate::quantiles::{check_finite, clamp_phi, nearest_rank, sort_values};
use crate::traits::{QuantileError, QuantileSketch, Sketch};
use core::fmt::Debug;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

#[cfg(feature = "std")]
use std::vec::Vec;

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Number of (empty) levels allocated up front
pub const INITIAL_LEVELS: usize = 4;

/// Level count past which growth is logged as unusual
///
/// Levels keep growing beyond this; reaching it requires on the order of
/// `capacity * 2^64` observations.
pub const SOFT_MAX_LEVELS: usize = 64;

/// Seed used by [`KllSketch::new`]
pub const DEFAULT_SEED: u64 = 0xD1B5_4A32_C192_ED03;

/// Simplified KLL sketch with randomized level compaction
///
/// # Example
///
/// ```
/// use streamquant::quantiles::KllSketch;
/// use streamquant::traits::QuantileSketch;
///
/// let mut kll = KllSketch::with_seed(128, 7).unwrap();
/// for i in 0..10_000 {
///     kll.insert((i % 100) as f64).unwrap();
/// }
///
/// let p50 = kll.quantile(0.5);
/// assert!(p50 > 35.0 && p50 < 65.0);
/// assert!(kll.levels().iter().all(|level| level.len() <= 128));
/// ```
#[derive(Clone, Debug)]
pub struct KllSketch<R = SmallRng> {
    /// Maximum number of values a level may hold after an update
    capacity: usize,
    /// Level buffers, level `i` holding values promoted `i` times
    levels: Vec<Vec<f64>>,
    /// Total count of values
    count: u64,
    /// Minimum value seen
    min: f64,
    /// Maximum value seen
    max: f64,
    /// Coin source for compaction
    rng: R,
}

impl KllSketch<SmallRng> {
    /// Create a sketch seeded with [`DEFAULT_SEED`]
    ///
    /// # Errors
    ///
    /// Returns [`QuantileError::InvalidArgument`] when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, QuantileError> {
        Self::with_seed(capacity, DEFAULT_SEED)
    }

    /// Create a sketch whose compaction coin is seeded with `seed`
    ///
    /// # Errors
    ///
    /// Returns [`QuantileError::InvalidArgument`] when `capacity` is zero.
    pub fn with_seed(capacity: usize, seed: u64) -> Result<Self, QuantileError> {
        Self::with_rng(capacity, SmallRng::seed_from_u64(seed))
    }
}

impl<R: Rng> KllSketch<R> {
    /// Create a sketch drawing compaction coins from `rng`
    ///
    /// # Errors
    ///
    /// Returns [`QuantileError::InvalidArgument`] when `capacity` is zero.
    pub fn with_rng(capacity: usize, rng: R) -> Result<Self, QuantileError> {
        if capacity == 0 {
            return Err(QuantileError::InvalidArgument(
                "capacity must be positive".into(),
            ));
        }

        Ok(Self {
            capacity,
            levels: (0..INITIAL_LEVELS).map(|_| Vec::new()).collect(),
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            rng,
        })
    }

    /// Per-level capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of allocated levels, including empty ones
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// The level buffers, lowest level first
    pub fn levels(&self) -> &[Vec<f64>] {
        &self.levels
    }

    /// Total number of values retained across all levels
    pub fn retained(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    /// Add a value
    ///
    /// # Errors
    ///
    /// Returns [`QuantileError::NonFiniteValue`] for NaN or infinite input;
    /// the sketch is left untouched.
    pub fn insert(&mut self, value: f64) -> Result<(), QuantileError> {
        check_finite(value)?;

        self.levels[0].push(value);
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);

        self.compact();
        Ok(())
    }

    /// Compact every overflowing level, lowest first.
    ///
    /// Compacting level `i` only grows level `i + 1`, so one upward pass
    /// leaves every level within capacity.
    fn compact(&mut self) {
        let mut level = 0;
        while level < self.levels.len() {
            if self.levels[level].len() > self.capacity {
                self.compact_level(level);
            }
            level += 1;
        }
    }

    fn compact_level(&mut self, level: usize) {
        if level + 1 == self.levels.len() {
            self.levels.push(Vec::new());
            let levels = self.levels.len();
            if levels > SOFT_MAX_LEVELS {
                tracing::warn!(levels, soft_max = SOFT_MAX_LEVELS, "kll level count past soft cap");
            } else {
                tracing::trace!(levels, count = self.count, "kll level allocated");
            }
        }

        let mut buffer = core::mem::take(&mut self.levels[level]);
        sort_values(&mut buffer);
        let leftover = if buffer.len() % 2 == 1 {
            buffer.pop()
        } else {
            None
        };

        let rng = &mut self.rng;
        self.levels[level + 1].extend(
            buffer
                .chunks_exact(2)
                .map(|pair| if rng.gen::<bool>() { pair[0] } else { pair[1] }),
        );

        buffer.clear();
        buffer.extend(leftover);
        self.levels[level] = buffer;
    }

    /// Quantile with level-`i` values weighted `2^i`
    ///
    /// This is the weighting the full KLL sketch relies on for its error
    /// guarantee. Returns NaN for an empty sketch.
    pub fn weighted_quantile(&self, phi: f64) -> f64 {
        let Some(phi) = clamp_phi(phi) else {
            return f64::NAN;
        };
        if self.retained() == 0 {
            return f64::NAN;
        }

        let mut weighted: Vec<(f64, u128)> = Vec::with_capacity(self.retained());
        for (level, values) in self.levels.iter().enumerate() {
            let weight = 1u128.checked_shl(level as u32).unwrap_or(u128::MAX);
            weighted.extend(values.iter().map(|&v| (v, weight)));
        }
        weighted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        let total: f64 = weighted.iter().map(|&(_, w)| w as f64).sum();
        let target = (phi * total).max(1.0);

        let mut cumulative = 0.0;
        for &(value, weight) in &weighted {
            cumulative += weight as f64;
            if cumulative >= target {
                return value;
            }
        }
        weighted.last().map_or(f64::NAN, |&(v, _)| v)
    }
}

impl<R: Rng + Clone + Debug> Sketch for KllSketch<R> {
    type Item = f64;

    fn update(&mut self, item: &f64) -> Result<(), QuantileError> {
        self.insert(*item)
    }

    fn clear(&mut self) {
        self.levels.clear();
        self.levels.resize_with(INITIAL_LEVELS, Vec::new);
        self.count = 0;
        self.min = f64::INFINITY;
        self.max = f64::NEG_INFINITY;
    }

    fn size_bytes(&self) -> usize {
        core::mem::size_of::<Self>()
            + self.levels.capacity() * core::mem::size_of::<Vec<f64>>()
            + self
                .levels
                .iter()
                .map(|level| level.capacity() * core::mem::size_of::<f64>())
                .sum::<usize>()
    }

    fn count(&self) -> u64 {
        self.count
    }
}

impl<R: Rng + Clone + Debug> QuantileSketch for KllSketch<R> {
    /// Nearest-rank quantile over all retained values, equally weighted
    fn quantile(&self, phi: f64) -> f64 {
        let Some(phi) = clamp_phi(phi) else {
            return f64::NAN;
        };

        let mut all: Vec<f64> = self.levels.concat();
        if all.is_empty() {
            return f64::NAN;
        }
        sort_values(&mut all);
        nearest_rank(&all, phi)
    }

    fn min(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.min)
        }
    }

    fn max(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.max)
        }
    }
}
