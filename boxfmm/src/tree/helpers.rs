//! Helper functions used in testing tree implementations, specifically test point generators.
use rand::{distributions::uniform::SampleUniform, prelude::*};

use crate::traits::types::FmmScalar;

/// Points fixture for testing, uniformly samples in each axis from min to max.
///
/// Returns coordinates in row major order `[x_0, y_0, x_1, y_1, ...]`.
///
/// # Arguments
/// * `n_points` - The number of points to sample.
/// * `min` - The minimum coordinate value along each axis, defaults to 0.
/// * `max` - The maximum coordinate value along each axis, defaults to 1.
/// * `seed` - Random seed, defaults to 0.
pub fn points_fixture<T: FmmScalar + SampleUniform>(
    n_points: usize,
    min: Option<T>,
    max: Option<T>,
    seed: Option<u64>,
) -> Vec<T> {
    let mut range = StdRng::seed_from_u64(seed.unwrap_or(0));

    let between = if let (Some(min), Some(max)) = (min, max) {
        rand::distributions::Uniform::from(min..max)
    } else {
        rand::distributions::Uniform::from(T::zero()..T::one())
    };

    (0..2 * n_points)
        .map(|_| between.sample(&mut range))
        .collect()
}

/// Points fixture for testing adaptive trees, a uniform background over the unit square with
/// a dense cluster inside the square `[0, width]^2`.
///
/// # Arguments
/// * `n_background` - Number of points spread over the unit square.
/// * `n_cluster` - Number of points in the cluster.
/// * `width` - Side of the cluster, at most 1.
/// * `seed` - Random seed, defaults to 0.
pub fn points_fixture_clustered<T: FmmScalar + SampleUniform>(
    n_background: usize,
    n_cluster: usize,
    width: T,
    seed: Option<u64>,
) -> Vec<T> {
    let seed = seed.unwrap_or(0);
    let mut points = points_fixture(n_background, None, None, Some(seed));
    points.extend(points_fixture(
        n_cluster,
        Some(T::zero()),
        Some(width),
        Some(seed + 1),
    ));
    points
}

/// Weights fixture for testing, uniformly samples from `[0, 1)`.
///
/// # Arguments
/// * `n_weights` - Number of weights.
/// * `seed` - Random seed, defaults to 0.
pub fn weights_fixture<T: FmmScalar + SampleUniform>(n_weights: usize, seed: Option<u64>) -> Vec<T> {
    let mut range = StdRng::seed_from_u64(seed.unwrap_or(0));
    let between = rand::distributions::Uniform::from(T::zero()..T::one());
    (0..n_weights).map(|_| between.sample(&mut range)).collect()
}
