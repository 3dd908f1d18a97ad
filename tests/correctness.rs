//! Correctness and invariant tests for streamquant
//!
//! These tests verify accuracy guarantees, structural invariants and edge
//! cases across all estimators. They complement the unit tests in each module
//! by checking behavior through the public API only.
//!
//! Run with: cargo test --test correctness --features full

// Require every estimator family
#[cfg(not(all(feature = "p2", feature = "gk", feature = "tdigest", feature = "kll")))]
compile_error!(
    "Correctness tests require all estimator features. Run: cargo test --test correctness --features full"
);

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp, Normal};
use streamquant::quantiles::{GkSummary, KllSketch, P2Estimator, TDigest};
use streamquant::traits::{QuantileError, QuantileSketch, Sketch};

/// Values 1..=n in a reproducible random order
fn shuffled(n: u32, seed: u64) -> Vec<f64> {
    let mut values: Vec<f64> = (1..=n).map(f64::from).collect();
    values.shuffle(&mut StdRng::seed_from_u64(seed));
    values
}

/// Range of 1-based ranks `value` occupies in `sorted`
fn rank_range(sorted: &[f64], value: f64) -> (f64, f64) {
    let below = sorted.partition_point(|&x| x < value);
    let through = sorted.partition_point(|&x| x <= value);
    ((below + 1) as f64, through as f64)
}

fn feed<S: QuantileSketch>(sketch: &mut S, values: &[f64]) {
    for v in values {
        sketch.update(v).unwrap();
    }
}

// ============================================================================
// Shared contract
// ============================================================================

mod contract {
    use super::*;

    fn all_estimators() -> (P2Estimator, GkSummary, TDigest, KllSketch) {
        (
            P2Estimator::new(&[0.5]).unwrap(),
            GkSummary::new(0.01).unwrap(),
            TDigest::new(100.0).unwrap(),
            KllSketch::new(64).unwrap(),
        )
    }

    fn check_empty<S: QuantileSketch>(sketch: &S) {
        assert!(sketch.is_empty());
        assert!(sketch.quantile(0.0).is_nan());
        assert!(sketch.quantile(0.5).is_nan());
        assert!(sketch.quantile(1.0).is_nan());
        assert!(sketch.min().is_none());
        assert!(sketch.max().is_none());
    }

    fn check_rejects_non_finite<S: QuantileSketch>(sketch: &mut S) {
        sketch.update(&1.0).unwrap();
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            match sketch.update(&bad) {
                Err(QuantileError::NonFiniteValue(_)) => {}
                other => panic!("expected NonFiniteValue for {}, got {:?}", bad, other),
            }
        }
        assert_eq!(sketch.count(), 1, "rejected values must not be counted");
        assert_eq!(sketch.quantile(0.5), 1.0);
    }

    fn check_phi_handling<S: QuantileSketch>(sketch: &mut S) {
        feed(sketch, &shuffled(100, 1));
        assert!(sketch.quantile(f64::NAN).is_nan());
        assert_eq!(sketch.quantile(-3.0), sketch.quantile(0.0));
        assert_eq!(sketch.quantile(7.0), sketch.quantile(1.0));
    }

    fn check_clear<S: QuantileSketch>(sketch: &mut S) {
        feed(sketch, &shuffled(500, 2));
        assert_eq!(sketch.count(), 500);
        sketch.clear();
        check_empty(sketch);
        feed(sketch, &[4.0]);
        assert_eq!(sketch.quantile(0.5), 4.0);
    }

    #[test]
    fn empty_estimators_answer_nan() {
        let (p2, gk, td, kll) = all_estimators();
        check_empty(&p2);
        check_empty(&gk);
        check_empty(&td);
        check_empty(&kll);
    }

    #[test]
    fn non_finite_updates_are_rejected_without_mutation() {
        let (mut p2, mut gk, mut td, mut kll) = all_estimators();
        check_rejects_non_finite(&mut p2);
        check_rejects_non_finite(&mut gk);
        check_rejects_non_finite(&mut td);
        check_rejects_non_finite(&mut kll);
    }

    #[test]
    fn phi_is_clamped_and_nan_propagates() {
        let (mut p2, mut gk, mut td, mut kll) = all_estimators();
        check_phi_handling(&mut p2);
        check_phi_handling(&mut gk);
        check_phi_handling(&mut td);
        check_phi_handling(&mut kll);
    }

    #[test]
    fn clear_restores_empty_state() {
        let (mut p2, mut gk, mut td, mut kll) = all_estimators();
        check_clear(&mut p2);
        check_clear(&mut gk);
        check_clear(&mut td);
        check_clear(&mut kll);
    }

    #[test]
    fn queries_do_not_mutate() {
        let (mut p2, mut gk, mut td, mut kll) = all_estimators();
        let values = shuffled(1_000, 3);
        feed(&mut p2, &values);
        feed(&mut gk, &values);
        feed(&mut td, &values);
        feed(&mut kll, &values);

        for phi in [0.1, 0.5, 0.9] {
            assert_eq!(p2.quantile(phi), p2.quantile(phi));
            assert_eq!(gk.quantile(phi), gk.quantile(phi));
            assert_eq!(td.quantile(phi), td.quantile(phi));
            assert_eq!(kll.quantile(phi), kll.quantile(phi));
        }
        assert_eq!(gk.count(), 1_000);
    }

    #[test]
    fn estimators_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<P2Estimator>();
        assert_send_sync::<GkSummary>();
        assert_send_sync::<TDigest>();
        assert_send_sync::<KllSketch>();
    }

    #[test]
    fn shared_reads_across_threads() {
        let mut gk = GkSummary::new(0.01).unwrap();
        feed(&mut gk, &shuffled(10_000, 4));
        let expected = gk.median();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| assert_eq!(gk.median(), expected));
            }
        });
    }

    #[test]
    fn invalid_construction_fails_immediately() {
        assert!(P2Estimator::new(&[]).is_err());
        assert!(P2Estimator::new(&[0.0]).is_err());
        assert!(P2Estimator::new(&[1.0]).is_err());
        assert!(P2Estimator::new(&[0.9, 0.5]).is_err());
        assert!(GkSummary::new(0.0).is_err());
        assert!(GkSummary::new(1.0).is_err());
        assert!(GkSummary::new(f64::NAN).is_err());
        assert!(TDigest::new(0.0).is_err());
        assert!(TDigest::new(-5.0).is_err());
        assert!(KllSketch::new(0).is_err());
    }
}

// ============================================================================
// Boundary behavior
// ============================================================================

mod boundaries {
    use super::*;

    #[test]
    fn p2_and_tdigest_extremes_are_exact() {
        let values = shuffled(1_000, 10);
        let mut p2 = P2Estimator::new(&[0.25, 0.5, 0.75]).unwrap();
        let mut td = TDigest::new(100.0).unwrap();
        feed(&mut p2, &values);
        feed(&mut td, &values);

        assert_eq!(p2.quantile(0.0), 1.0);
        assert_eq!(p2.quantile(1.0), 1_000.0);
        assert_eq!(td.quantile(0.0), 1.0);
        assert_eq!(td.quantile(1.0), 1_000.0);
    }

    #[test]
    fn gk_extremes_within_rank_bound() {
        let values = shuffled(1_000, 11);
        let mut gk = GkSummary::new(0.01).unwrap();
        feed(&mut gk, &values);

        // εn = 10 ranks
        assert!(gk.quantile(0.0) <= 11.0, "q0={}", gk.quantile(0.0));
        assert!(gk.quantile(1.0) >= 990.0, "q1={}", gk.quantile(1.0));
        assert_eq!(gk.min(), Some(1.0));
        assert_eq!(gk.max(), Some(1_000.0));
    }

    #[test]
    fn kll_extremes_approximate() {
        let values = shuffled(10_000, 12);
        let mut kll = KllSketch::with_seed(128, 12).unwrap();
        feed(&mut kll, &values);

        assert!(kll.quantile(0.0) <= 500.0, "q0={}", kll.quantile(0.0));
        assert!(kll.quantile(1.0) >= 9_500.0, "q1={}", kll.quantile(1.0));
        assert_eq!(kll.min(), Some(1.0));
        assert_eq!(kll.max(), Some(10_000.0));
    }

    #[test]
    fn single_value_answers_everything() {
        let mut p2 = P2Estimator::new(&[0.5]).unwrap();
        let mut gk = GkSummary::new(0.05).unwrap();
        let mut td = TDigest::new(100.0).unwrap();
        let mut kll = KllSketch::new(8).unwrap();
        feed(&mut p2, &[42.0]);
        feed(&mut gk, &[42.0]);
        feed(&mut td, &[42.0]);
        feed(&mut kll, &[42.0]);

        for phi in [0.0, 0.3, 1.0] {
            assert_eq!(p2.quantile(phi), 42.0);
            assert_eq!(gk.quantile(phi), 42.0);
            assert_eq!(td.quantile(phi), 42.0);
            assert_eq!(kll.quantile(phi), 42.0);
        }
    }
}

// ============================================================================
// Concrete scenarios
// ============================================================================

mod scenarios {
    use super::*;

    #[test]
    fn gk_median_of_one_to_ninety_nine() {
        let mut gk = GkSummary::new(0.01).unwrap();
        for i in 1..100 {
            gk.insert(i as f64).unwrap();
        }
        let median = gk.median();
        assert!(
            [49.0, 50.0, 51.0].contains(&median),
            "median of 1..99 should be 49, 50 or 51, got {}",
            median
        );
    }

    #[test]
    fn p2_uses_empirical_fallback_until_seeded() {
        let mut p2 = P2Estimator::new(&[0.5]).unwrap();

        p2.insert(5.0).unwrap();
        assert_eq!(p2.median(), 5.0);
        p2.insert(1.0).unwrap();
        assert!(!p2.is_initialized());
        assert_eq!(p2.median(), 1.0);

        p2.insert(3.0).unwrap();
        assert!(p2.is_initialized());
        assert_eq!(p2.median(), 3.0);

        p2.insert(2.0).unwrap();
        p2.insert(4.0).unwrap();
        assert_eq!(p2.median(), 3.0);
    }

    #[test]
    fn kll_compacts_on_fifth_insert_with_capacity_four() {
        let mut kll = KllSketch::with_seed(4, 2024).unwrap();
        for i in 1..=8 {
            kll.insert(i as f64).unwrap();
            assert!(kll.levels()[0].len() <= 4, "level 0 over capacity after {}", i);
            if i == 4 {
                assert!(kll.levels()[1].is_empty());
            }
            if i == 5 {
                assert_eq!(kll.levels()[1].len(), 2);
            }
        }
        assert!(kll.levels()[1]
            .iter()
            .all(|&v| (1.0..=5.0).contains(&v)));
        assert_eq!(kll.count(), 8);
    }
}

// ============================================================================
// Accuracy
// ============================================================================

mod accuracy {
    use super::*;

    #[test]
    fn gk_rank_error_within_epsilon_n() {
        for (epsilon, n, seed) in [(0.01, 10_000, 20), (0.05, 2_000, 21), (0.001, 20_000, 22)] {
            let values = shuffled(n, seed);
            let mut gk = GkSummary::new(epsilon).unwrap();
            feed(&mut gk, &values);

            let mut sorted = values.clone();
            sorted.sort_by(f64::total_cmp);
            let tolerance = (epsilon * n as f64).max(1.0);

            for phi in [0.01, 0.1, 0.25, 0.5, 0.75, 0.9, 0.99] {
                let estimate = gk.quantile(phi);
                let (lo, hi) = rank_range(&sorted, estimate);
                let target = phi * n as f64;
                assert!(
                    lo - tolerance <= target && target <= hi + tolerance,
                    "eps={} phi={} estimate={} ranks=[{}, {}] target={}",
                    epsilon,
                    phi,
                    estimate,
                    lo,
                    hi,
                    target
                );
            }
            assert!(
                gk.len() < n as usize / 2,
                "summary should compress: {} tuples for {} values",
                gk.len(),
                n
            );
        }
    }

    #[test]
    fn gk_error_bounds_bracket_true_value() {
        let values = shuffled(5_000, 23);
        let mut gk = GkSummary::new(0.01).unwrap();
        feed(&mut gk, &values);

        for phi in [0.1, 0.5, 0.9] {
            let bounds = gk.error_bounds(phi);
            let truth = (phi * 5_000.0).ceil();
            assert!(bounds.lower <= bounds.estimate && bounds.estimate <= bounds.upper);
            assert!(
                bounds.lower <= truth + 1.0 && truth - 1.0 <= bounds.upper,
                "phi={} bounds={:?}",
                phi,
                bounds
            );
        }
    }

    #[test]
    fn normal_median_converges() {
        let mut rng = StdRng::seed_from_u64(30);
        let normal = Normal::new(0.0, 1.0).unwrap();

        let mut p2 = P2Estimator::new(&[0.5, 0.9]).unwrap();
        let mut gk = GkSummary::new(0.005).unwrap();
        let mut td = TDigest::new(100.0).unwrap();
        let mut kll = KllSketch::with_seed(256, 30).unwrap();

        for _ in 0..50_000 {
            let x = normal.sample(&mut rng);
            p2.update(&x).unwrap();
            gk.update(&x).unwrap();
            td.update(&x).unwrap();
            kll.update(&x).unwrap();
        }

        assert!(p2.median().abs() < 0.1, "p2 median={}", p2.median());
        assert!(gk.median().abs() < 0.05, "gk median={}", gk.median());
        assert!(td.median().abs() < 0.05, "tdigest median={}", td.median());
        assert!(kll.median().abs() < 0.1, "kll median={}", kll.median());

        // true p90 of N(0, 1) is 1.2816
        assert!((p2.quantile(0.9) - 1.2816).abs() < 0.1, "p2 p90={}", p2.quantile(0.9));
        assert!((gk.quantile(0.9) - 1.2816).abs() < 0.05, "gk p90={}", gk.quantile(0.9));
    }

    #[test]
    fn p2_tracks_skewed_tail() {
        let mut rng = StdRng::seed_from_u64(31);
        let exp = Exp::new(1.0).unwrap();
        let mut p2 = P2Estimator::new(&[0.5, 0.95, 0.99]).unwrap();

        for _ in 0..100_000 {
            p2.update(&exp.sample(&mut rng)).unwrap();
        }

        // Exp(1) quantiles: -ln(1 - phi)
        for phi in [0.5_f64, 0.95, 0.99] {
            let truth = -(1.0 - phi).ln();
            let estimate = p2.quantile(phi);
            assert!(
                (estimate - truth).abs() / truth < 0.1,
                "phi={} estimate={} truth={}",
                phi,
                estimate,
                truth
            );
        }
    }

    #[test]
    fn tdigest_queries_follow_cumulative_weight() {
        use streamquant::quantiles::Centroid;

        let unit: Vec<Centroid> = (1..=10)
            .rev()
            .map(|i| Centroid::new(10.0 * i as f64, 1))
            .collect();
        let digest = TDigest::from_centroids(100.0, unit).unwrap();
        assert_eq!(digest.quantile(0.0), 10.0);
        assert_eq!(digest.quantile(0.1), 10.0);
        assert_eq!(digest.median(), 50.0);
        assert_eq!(digest.quantile(1.0), 100.0);
        assert!((digest.cdf(55.0) - 0.55).abs() < 1e-9);

        let heavy = vec![Centroid::new(10.0, 4), Centroid::new(20.0, 4)];
        let digest = TDigest::from_centroids(100.0, heavy).unwrap();
        assert_eq!(digest.median(), 10.0);
        assert!((digest.quantile(0.75) - 15.0).abs() < 1e-9);
        assert!((digest.cdf(15.0) - 0.75).abs() < 1e-9);
    }
}

// ============================================================================
// Structural invariants
// ============================================================================

mod invariants {
    use super::*;

    #[test]
    fn p2_markers_stay_ordered() {
        let mut rng = StdRng::seed_from_u64(40);
        let mut p2 = P2Estimator::new(&[0.1, 0.5, 0.9]).unwrap();

        for _ in 0..20_000 {
            p2.update(&rng.gen_range(-1_000.0..1_000.0)).unwrap();
            let markers = p2.markers();
            for pair in markers.windows(2) {
                assert!(pair[0].position < pair[1].position);
                assert!(pair[0].height <= pair[1].height);
            }
        }
    }

    #[test]
    fn gk_weights_sum_to_count() {
        let mut gk = GkSummary::new(0.02).unwrap();
        for (i, v) in shuffled(5_000, 41).into_iter().enumerate() {
            gk.insert(v).unwrap();
            if i % 97 == 0 {
                let total: u64 = gk.tuples().iter().map(|t| t.g).sum();
                assert_eq!(total, gk.count());
            }
        }
        assert!(gk.tuples().windows(2).all(|w| w[0].v <= w[1].v));
    }

    #[test]
    fn kll_levels_never_exceed_capacity() {
        let mut rng = StdRng::seed_from_u64(42);
        for capacity in [1, 2, 7, 32] {
            let mut kll = KllSketch::with_seed(capacity, 42).unwrap();
            for _ in 0..20_000 {
                kll.update(&rng.gen::<f64>()).unwrap();
                assert!(kll.levels().iter().all(|level| level.len() <= capacity));
            }
        }
    }

    #[test]
    fn kll_same_seed_same_state() {
        let values = shuffled(10_000, 43);
        let mut a = KllSketch::with_seed(32, 9).unwrap();
        let mut b = KllSketch::with_seed(32, 9).unwrap();
        feed(&mut a, &values);
        feed(&mut b, &values);
        assert_eq!(a.levels(), b.levels());
    }

    #[test]
    fn tdigest_weights_sum_to_count() {
        let mut td = TDigest::new(50.0).unwrap();
        feed(&mut td, &shuffled(3_000, 44));
        let total: u64 = td.centroids().iter().map(|c| c.weight).sum();
        assert_eq!(total, td.count());
    }
}

// ============================================================================
// Batch adapter
// ============================================================================

#[cfg(feature = "batch")]
mod batch {
    use super::*;
    use ndarray::{arr1, Array2};
    use streamquant::batch::{EstimatorArray, EstimatorMatrix, EstimatorVector};

    #[test]
    fn shape_mismatch_leaves_every_cell_unchanged() {
        let mut grid = EstimatorMatrix::p2(&[0.5], (3, 2)).unwrap();
        grid.update(&Array2::from_elem((3, 2), 1.0)).unwrap();
        grid.update(&Array2::from_elem((3, 2), 2.0)).unwrap();
        let before = grid.median();

        for bad_shape in [(2, 3), (3, 1), (1, 2)] {
            match grid.update(&Array2::from_elem(bad_shape, 9.0)) {
                Err(QuantileError::DimensionMismatch { expected, found }) => {
                    assert_eq!(expected, vec![3, 2]);
                    assert_eq!(found, vec![bad_shape.0, bad_shape.1]);
                }
                other => panic!("expected DimensionMismatch, got {:?}", other),
            }
        }

        assert_eq!(grid.count(), 2);
        assert_eq!(grid.median(), before);
    }

    #[test]
    fn any_estimator_can_fill_the_grid() {
        let mut grid: EstimatorVector<KllSketch> =
            EstimatorArray::from_elem(4, KllSketch::with_seed(16, 1).unwrap());
        let mut rng = StdRng::seed_from_u64(50);

        for _ in 0..2_000 {
            let base: f64 = rng.gen();
            grid.update(&arr1(&[base, base + 10.0, base + 20.0, base + 30.0]))
                .unwrap();
        }

        let medians = grid.median();
        for (i, m) in medians.iter().enumerate() {
            let center = 0.5 + 10.0 * i as f64;
            assert!((m - center).abs() < 0.15, "cell {} median {}", i, m);
        }
        assert!(grid
            .cells()
            .iter()
            .all(|cell| cell.levels().iter().all(|level| level.len() <= 16)));
    }

    #[test]
    fn per_cell_quantiles_match_single_estimators() {
        let mut grid = EstimatorVector::p2(&[0.5], 2).unwrap();
        let mut left = P2Estimator::new(&[0.5]).unwrap();
        let mut right = P2Estimator::new(&[0.5]).unwrap();

        for v in shuffled(1_000, 51) {
            grid.update(&arr1(&[v, -v])).unwrap();
            left.update(&v).unwrap();
            right.update(&-v).unwrap();
        }

        assert_eq!(grid.query_all(0.5), arr1(&[left.median(), right.median()]));
    }
}

// ============================================================================
// Serialization
// ============================================================================

#[cfg(feature = "serde")]
mod serialization {
    use super::*;
    use streamquant::quantiles::{Centroid, Tuple};

    #[test]
    fn gk_tuple_serializes_as_array() {
        let json = serde_json::to_string(&Tuple::new(2.5, 3, 1)).unwrap();
        assert_eq!(json, "[2.5,3,1]");
    }

    #[test]
    fn centroid_serializes_as_pair() {
        let json = serde_json::to_string(&Centroid::new(4.0, 7)).unwrap();
        assert_eq!(json, "[4.0,7]");
    }

    #[test]
    fn p2_markers_serialize_with_names() {
        let mut p2 = P2Estimator::new(&[0.5]).unwrap();
        feed(&mut p2, &[3.0, 1.0, 2.0]);

        let value = serde_json::to_value(p2.markers()).unwrap();
        let markers = value.as_array().unwrap();
        assert_eq!(markers.len(), 3);
        assert_eq!(markers[1]["phi"], 0.5);
        assert_eq!(markers[1]["height"], 2.0);
        assert_eq!(markers[1]["position"], 2);
        assert_eq!(markers[1]["desired"], 2.0);
    }

    #[test]
    fn summary_tuples_round_out_to_json() {
        let mut gk = GkSummary::new(0.1).unwrap();
        feed(&mut gk, &shuffled(200, 60));
        let json = serde_json::to_value(gk.tuples()).unwrap();
        let tuples = json.as_array().unwrap();
        assert_eq!(tuples.len(), gk.len());
        let total: u64 = tuples.iter().map(|t| t[1].as_u64().unwrap()).sum();
        assert_eq!(total, 200);
    }
}
