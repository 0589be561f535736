#![allow(dead_code)]

use ndarray::Array2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Installs the subscriber once per test binary; later calls are no-ops.
pub fn init_logging() {
    let _ = spatnull_config::init_tracing();
}

/// Evenly spread centroids on one side of the unit sphere (`side` = -1 left, +1 right).
pub fn hemisphere(n: usize, side: f64) -> Array2<f64> {
    let golden = std::f64::consts::PI * (3.0 - 5f64.sqrt());
    let mut out = Array2::zeros((n, 3));
    for i in 0..n {
        let y = 1.0 - 2.0 * (i as f64 + 0.5) / n as f64;
        let radius = (1.0 - y * y).sqrt();
        let theta = golden * i as f64;
        let x = side * (0.1 + (radius * theta.cos()).abs());
        let z = radius * theta.sin();
        let norm = (x * x + y * y + z * z).sqrt();
        out[[i, 0]] = x / norm;
        out[[i, 1]] = y / norm;
        out[[i, 2]] = z / norm;
    }
    out
}

pub fn gaussian(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.sample(StandardNormal)).collect()
}

pub fn uniform_cloud(n: usize, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((n, 3), |_| rng.gen_range(-10.0..10.0))
}
