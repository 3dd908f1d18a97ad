//! `ndarray`-backed grid of independent estimators

use crate::traits::{QuantileError, QuantileSketch, Sketch};
use ndarray::{Array, ArrayBase, Data, Dimension, Ix1, Ix2, NdIndex, ShapeBuilder, Zip};

#[cfg(feature = "p2")]
use crate::quantiles::P2Estimator;

#[cfg(feature = "std")]
use std::vec::Vec;

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// One estimator per array cell, updated element-wise
///
/// The shape and every value of an update are validated before the first
/// cell is touched.
#[derive(Clone, Debug)]
pub struct EstimatorArray<E, D: Dimension> {
    cells: Array<E, D>,
    /// Number of accepted updates
    updates: u64,
}

/// Estimators over a one-dimensional array
pub type EstimatorVector<E> = EstimatorArray<E, Ix1>;

/// Estimators over a two-dimensional array
pub type EstimatorMatrix<E> = EstimatorArray<E, Ix2>;

impl<E: QuantileSketch, D: Dimension> EstimatorArray<E, D> {
    /// Fill every cell with a clone of `prototype`
    pub fn from_elem<Sh>(shape: Sh, prototype: E) -> Self
    where
        Sh: ShapeBuilder<Dim = D>,
    {
        Self {
            cells: Array::from_elem(shape, prototype),
            updates: 0,
        }
    }

    /// Build each cell from its index
    pub fn from_shape_fn<Sh, F>(shape: Sh, f: F) -> Self
    where
        Sh: ShapeBuilder<Dim = D>,
        F: FnMut(D::Pattern) -> E,
    {
        Self {
            cells: Array::from_shape_fn(shape, f),
            updates: 0,
        }
    }

    /// Shape of the grid
    pub fn shape(&self) -> &[usize] {
        self.cells.shape()
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the grid has no cells
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of accepted updates
    ///
    /// With the built-in estimators every cell has absorbed exactly this
    /// many values.
    pub fn count(&self) -> u64 {
        self.updates
    }

    /// The underlying estimators
    pub fn cells(&self) -> &Array<E, D> {
        &self.cells
    }

    /// Estimator at `index`, if in bounds
    pub fn get<I: NdIndex<D>>(&self, index: I) -> Option<&E> {
        self.cells.get(index)
    }

    /// Feed one value into every cell
    ///
    /// # Errors
    ///
    /// - [`QuantileError::DimensionMismatch`] when `values` does not have the
    ///   grid's shape
    /// - [`QuantileError::NonFiniteValue`] when any value is NaN or infinite
    /// - the first error returned by a cell's own `update`
    ///
    /// Both checks above run before any cell changes, and the built-in
    /// estimators reject nothing else, so for them a failed update leaves
    /// every cell as it was. An estimator whose `update` can fail for other
    /// reasons may already have absorbed the value in other cells when its
    /// error is returned; [`count`](Self::count) is not advanced then.
    pub fn update<S>(&mut self, values: &ArrayBase<S, D>) -> Result<(), QuantileError>
    where
        S: Data<Elem = f64>,
    {
        if values.shape() != self.cells.shape() {
            tracing::debug!(
                expected = ?self.cells.shape(),
                found = ?values.shape(),
                "batch update rejected"
            );
            return Err(QuantileError::DimensionMismatch {
                expected: self.cells.shape().to_vec(),
                found: values.shape().to_vec(),
            });
        }

        if let Some(&bad) = values.iter().find(|v| !v.is_finite()) {
            tracing::debug!(value = bad, "batch update rejected");
            return Err(QuantileError::NonFiniteValue(bad));
        }

        let mut result = Ok(());
        Zip::from(&mut self.cells)
            .and(values)
            .for_each(|cell, &value| {
                if let Err(err) = cell.update(&value) {
                    if result.is_ok() {
                        result = Err(err);
                    }
                }
            });
        result?;

        self.updates += 1;
        Ok(())
    }

    /// Quantile `phi` of every cell, in the grid's shape
    pub fn query_all(&self, phi: f64) -> Array<f64, D> {
        self.cells.map(|cell| cell.quantile(phi))
    }

    /// Median of every cell
    pub fn median(&self) -> Array<f64, D> {
        self.query_all(0.5)
    }

    /// Several quantiles of every cell, one array per `phi`
    pub fn query_many(&self, phis: &[f64]) -> Vec<Array<f64, D>> {
        phis.iter().map(|&phi| self.query_all(phi)).collect()
    }

    /// Reset every cell, keeping the shape and cell configuration
    pub fn clear(&mut self) {
        self.cells.iter_mut().for_each(Sketch::clear);
        self.updates = 0;
    }

    /// Memory used by the grid and all of its cells
    pub fn size_bytes(&self) -> usize {
        core::mem::size_of::<Self>()
            + self.cells.iter().map(Sketch::size_bytes).sum::<usize>()
    }
}

#[cfg(feature = "p2")]
impl<D: Dimension> EstimatorArray<P2Estimator, D> {
    /// A grid of P² estimators all tracking `quantiles`
    ///
    /// # Errors
    ///
    /// Fails with [`QuantileError::InvalidArgument`] under the same
    /// conditions as [`P2Estimator::new`].
    pub fn p2<Sh>(quantiles: &[f64], shape: Sh) -> Result<Self, QuantileError>
    where
        Sh: ShapeBuilder<Dim = D>,
    {
        let prototype = P2Estimator::new(quantiles)?;
        Ok(Self::from_elem(shape, prototype))
    }
}
