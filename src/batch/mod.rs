//! Element-wise estimation over arrays of streams
//!
//! An [`EstimatorArray`] holds one independent estimator per cell of an
//! `ndarray` array. Each update supplies an array of the same shape, and
//! every cell absorbs the value at its own index. This suits tracking a
//! per-pixel or per-sensor quantile over a sequence of frames.
//!
//! # Example
//!
//! ```
//! use ndarray::arr2;
//! use streamquant::batch::EstimatorMatrix;
//! use streamquant::quantiles::P2Estimator;
//!
//! let mut grid: EstimatorMatrix<P2Estimator> = EstimatorMatrix::p2(&[0.5], (2, 2)).unwrap();
//!
//! grid.update(&arr2(&[[1.0, 10.0], [100.0, 1000.0]])).unwrap();
//! grid.update(&arr2(&[[3.0, 30.0], [300.0, 3000.0]])).unwrap();
//! grid.update(&arr2(&[[2.0, 20.0], [200.0, 2000.0]])).unwrap();
//!
//! let medians = grid.median();
//! assert_eq!(medians, arr2(&[[2.0, 20.0], [200.0, 2000.0]]));
//!
//! // a frame of the wrong shape is rejected without touching any cell
//! assert!(grid.update(&arr2(&[[1.0, 2.0, 3.0]])).is_err());
//! assert_eq!(grid.count(), 3);
//! ```

mod array;

pub use array::{EstimatorArray, EstimatorMatrix, EstimatorVector};
