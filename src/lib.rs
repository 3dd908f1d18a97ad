//! # Streamquant
//!
//! Bounded-memory quantile estimation over data streams.
//!
//! Streamquant provides four independent estimators for percentiles of an
//! unbounded sequence of `f64` observations, plus an adapter that runs one
//! estimator per cell of an `ndarray` array.
//!
//! ## Features
//!
//! - **P²**: O(1) memory marker interpolation for a fixed set of quantiles
//! - **Greenwald-Khanna**: deterministic ε·n rank error guarantee
//! - **t-digest**: centroid summary with exact extremes
//! - **KLL**: randomized level compaction with a per-level capacity
//! - **Batch**: element-wise estimation over 1-D and 2-D arrays
//!
//! ## Quick Start
//!
//! ```rust
//! use streamquant::prelude::*;
//!
//! let mut p2 = P2Estimator::new(&[0.5, 0.99]).unwrap();
//! let mut gk = GkSummary::new(0.01).unwrap();
//!
//! for latency_ms in [12.0, 15.0, 11.0, 250.0, 14.0, 13.0, 16.0] {
//!     p2.update(&latency_ms).unwrap();
//!     gk.update(&latency_ms).unwrap();
//! }
//!
//! println!("p50 ~ {}", p2.median());
//! println!("p99 ~ {}", gk.quantile(0.99));
//! ```
//!
//! ## Contract
//!
//! All estimators implement [`Sketch`](traits::Sketch) and
//! [`QuantileSketch`](traits::QuantileSketch):
//!
//! - updates reject NaN and infinities before touching any state
//! - queries take `&self`, clamp `phi` into `[0, 1]`, and return `f64::NAN`
//!   for an empty estimator or a NaN `phi`
//!
//! ```rust
//! use streamquant::quantiles::TDigest;
//! use streamquant::traits::{QuantileSketch, Sketch};
//!
//! let mut digest = TDigest::new(100.0).unwrap();
//! assert!(digest.median().is_nan());
//!
//! digest.update(&1.0).unwrap();
//! assert!(digest.update(&f64::NAN).is_err());
//! assert_eq!(digest.count(), 1);
//! ```
//!
//! ## Feature Flags
//!
//! Estimator families (all default except `batch`):
//! - `p2`: P² estimator
//! - `gk`: Greenwald-Khanna summary
//! - `tdigest`: simplified t-digest
//! - `kll`: simplified KLL sketch (pulls in `rand`)
//! - `batch`: `ndarray` adapter
//! - `full`: everything, including `serde`
//!
//! Platform features:
//! - `std` (default): Standard library support
//! - `serde`: `Serialize` for the public state types

#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(not(feature = "std"))]
#[macro_use]
extern crate alloc;

// Core traits always available
pub mod traits;

pub(crate) mod math;

pub mod quantiles;

#[cfg(feature = "batch")]
#[cfg_attr(docsrs, doc(cfg(feature = "batch")))]
pub mod batch;

pub mod prelude {
    pub use crate::traits::*;

    #[cfg(feature = "p2")]
    pub use crate::quantiles::P2Estimator;

    #[cfg(feature = "gk")]
    pub use crate::quantiles::GkSummary;

    #[cfg(feature = "tdigest")]
    pub use crate::quantiles::TDigest;

    #[cfg(feature = "kll")]
    pub use crate::quantiles::KllSketch;

    #[cfg(feature = "batch")]
    pub use crate::batch::{EstimatorArray, EstimatorMatrix, EstimatorVector};
}

pub use traits::QuantileError;

#[cfg(feature = "p2")]
pub use quantiles::P2Estimator;

#[cfg(feature = "gk")]
pub use quantiles::GkSummary;

#[cfg(feature = "tdigest")]
pub use quantiles::TDigest;

#[cfg(feature = "kll")]
pub use quantiles::KllSketch;
