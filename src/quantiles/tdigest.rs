//! Simplified t-digest quantile estimator
//!
//! A reduced variant of the t-digest: every observation is folded into the
//! centroid whose mean is nearest, by weighted averaging. The packing
//! parameter `delta` is stored but does **not** bound the number of
//! centroids, and centroids are never split or relocated. This variant
//! therefore does not carry the accuracy or mergeability guarantees of the
//! published t-digest; it is kept deliberately small.
//!
//! Queries sort the centroids by mean and walk their cumulative weights,
//! interpolating between adjacent means inside heavy centroids. The exact
//! minimum and maximum are tracked so the extreme quantiles are exact.

use crate::math;
use crate::quantiles::{check_finite, clamp_phi};
use crate::traits::{QuantileError, QuantileSketch, Sketch};

#[cfg(feature = "std")]
use std::vec::Vec;

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// A centroid in the t-digest
///
/// Centroids represent clusters of values with a mean and count.
#[derive(Clone, Debug, PartialEq)]
pub struct Centroid {
    /// Mean value of the centroid
    pub mean: f64,
    /// Number of values in the centroid
    pub weight: u64,
}

impl Centroid {
    /// Create a new centroid
    pub fn new(mean: f64, weight: u64) -> Self {
        Self { mean, weight }
    }

    /// Add a value to the centroid, updating the weighted mean
    pub fn add(&mut self, value: f64, count: u64) {
        let new_weight = self.weight + count;
        self.mean = (self.mean * self.weight as f64 + value * count as f64) / new_weight as f64;
        self.weight = new_weight;
    }
}

/// Simplified t-digest quantile sketch
///
/// # Example
///
/// ```
/// use streamquant::quantiles::{Centroid, TDigest};
/// use streamquant::traits::QuantileSketch;
///
/// let centroids = (1..=10).map(|i| Centroid::new(i as f64 * 10.0, 1)).collect();
/// let digest = TDigest::from_centroids(100.0, centroids).unwrap();
///
/// assert_eq!(digest.quantile(0.5), 50.0);
/// assert_eq!(digest.quantile(0.1), 10.0);
/// assert_eq!(digest.cdf(50.0), 0.5);
/// ```
#[derive(Clone, Debug)]
pub struct TDigest {
    /// Packing parameter, stored for reference only
    delta: f64,
    /// Centroids, in no particular order
    centroids: Vec<Centroid>,
    /// Total count of values
    count: u64,
    /// Minimum value seen
    min: f64,
    /// Maximum value seen
    max: f64,
}

impl TDigest {
    /// Create an empty digest
    ///
    /// # Arguments
    ///
    /// * `delta` - Packing parameter. Must be finite and positive. It does
    ///   not limit the centroid count in this simplified variant.
    ///
    /// # Errors
    ///
    /// Returns [`QuantileError::InvalidArgument`] if `delta` is not finite
    /// and positive.
    pub fn new(delta: f64) -> Result<Self, QuantileError> {
        if !(delta.is_finite() && delta > 0.0) {
            return Err(QuantileError::InvalidArgument(format!(
                "delta must be finite and positive, got {}",
                delta
            )));
        }

        Ok(Self {
            delta,
            centroids: Vec::new(),
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        })
    }

    /// Create a digest from precomputed centroids
    ///
    /// Centroids may come in any order. The minimum and maximum are taken
    /// from the smallest and largest centroid means.
    ///
    /// # Errors
    ///
    /// Returns [`QuantileError::InvalidArgument`] for an invalid `delta`, a
    /// non-finite mean, or a zero weight.
    pub fn from_centroids(delta: f64, centroids: Vec<Centroid>) -> Result<Self, QuantileError> {
        let mut digest = Self::new(delta)?;

        for c in &centroids {
            if !c.mean.is_finite() {
                return Err(QuantileError::InvalidArgument(format!(
                    "centroid mean must be finite, got {}",
                    c.mean
                )));
            }
            if c.weight == 0 {
                return Err(QuantileError::InvalidArgument(
                    "centroid weight must be positive".into(),
                ));
            }
        }

        for c in &centroids {
            digest.count += c.weight;
            digest.min = digest.min.min(c.mean);
            digest.max = digest.max.max(c.mean);
        }
        digest.centroids = centroids;
        Ok(digest)
    }

    /// Get the packing parameter
    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// Get the current number of centroids
    pub fn num_centroids(&self) -> usize {
        self.centroids.len()
    }

    /// The centroids, in insertion order
    pub fn centroids(&self) -> &[Centroid] {
        &self.centroids
    }

    /// Add a value
    ///
    /// The first value creates a centroid; every later value merges into
    /// the centroid with the nearest mean.
    ///
    /// # Errors
    ///
    /// Returns [`QuantileError::NonFiniteValue`] for NaN or infinite input;
    /// the digest is left untouched.
    pub fn insert(&mut self, value: f64) -> Result<(), QuantileError> {
        check_finite(value)?;

        let nearest = self
            .centroids
            .iter_mut()
            .min_by(|a, b| math::abs(a.mean - value).total_cmp(&math::abs(b.mean - value)));

        match nearest {
            Some(centroid) => centroid.add(value, 1),
            None => self.centroids.push(Centroid::new(value, 1)),
        }

        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        Ok(())
    }

    /// Estimated fraction of values less than or equal to `value`
    ///
    /// Returns NaN for an empty digest or a NaN `value`.
    pub fn cdf(&self, value: f64) -> f64 {
        if self.count == 0 || value.is_nan() {
            return f64::NAN;
        }
        Self::cdf_impl(&self.sorted_centroids(), self.count, self.min, self.max, value)
    }

    fn sorted_centroids(&self) -> Vec<Centroid> {
        let mut sorted = self.centroids.clone();
        sorted.sort_by(|a, b| a.mean.total_cmp(&b.mean));
        sorted
    }

    /// Quantile query over the cumulative centroid weights.
    ///
    /// The target rank `q * count` falls inside the first centroid whose
    /// cumulative weight reaches it. A unit-weight centroid answers with its
    /// mean; a heavier one interpolates from the previous centroid's mean
    /// in proportion to how far the target reaches into its weight. The
    /// exact minimum and maximum answer `q = 0` and `q = 1`.
    fn quantile_impl(centroids: &[Centroid], count: u64, min: f64, max: f64, q: f64) -> f64 {
        if q <= 0.0 {
            return min;
        }
        if q >= 1.0 {
            return max;
        }

        let target_rank = q * count as f64;

        let mut before = 0.0_f64;
        let mut prev_mean: Option<f64> = None;

        for centroid in centroids {
            let weight = centroid.weight as f64;
            if before + weight >= target_rank {
                return match prev_mean {
                    Some(prev) if centroid.weight > 1 => {
                        let t = (target_rank - before) / weight;
                        prev + t * (centroid.mean - prev)
                    }
                    _ => centroid.mean,
                };
            }
            before += weight;
            prev_mean = Some(centroid.mean);
        }

        // weights sum to count, so only rounding lands here
        max
    }

    /// Fraction of the weight at or below `value`.
    ///
    /// Interpolates linearly between the two centroids bracketing `value`,
    /// crediting the upper centroid's weight in proportion to the distance
    /// covered. Below the first centroid the exact minimum anchors the line.
    fn cdf_impl(centroids: &[Centroid], count: u64, min: f64, max: f64, value: f64) -> f64 {
        // >= max first so a single repeated value reports 1.0
        if value >= max {
            return 1.0;
        }
        if value <= min {
            return 0.0;
        }

        let mut before = 0.0_f64;
        let mut prev_mean = min;

        for centroid in centroids {
            let weight = centroid.weight as f64;
            if value < centroid.mean {
                // prev_mean <= value < centroid.mean
                let t = (value - prev_mean) / (centroid.mean - prev_mean);
                return (before + t * weight) / count as f64;
            }
            before += weight;
            prev_mean = centroid.mean;
        }

        1.0
    }
}

impl Sketch for TDigest {
    type Item = f64;

    fn update(&mut self, item: &f64) -> Result<(), QuantileError> {
        self.insert(*item)
    }

    fn clear(&mut self) {
        self.centroids.clear();
        self.count = 0;
        self.min = f64::INFINITY;
        self.max = f64::NEG_INFINITY;
    }

    fn size_bytes(&self) -> usize {
        core::mem::size_of::<Self>() + self.centroids.capacity() * core::mem::size_of::<Centroid>()
    }

    fn count(&self) -> u64 {
        self.count
    }
}

impl QuantileSketch for TDigest {
    fn quantile(&self, phi: f64) -> f64 {
        let Some(q) = clamp_phi(phi) else {
            return f64::NAN;
        };
        if self.count == 0 {
            return f64::NAN;
        }
        Self::quantile_impl(&self.sorted_centroids(), self.count, self.min, self.max, q)
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

#[cfg(feature = "serde")]
impl serde::Serialize for Centroid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeTuple;
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.mean)?;
        tuple.serialize_element(&self.weight)?;
        tuple.end()
    }
}
