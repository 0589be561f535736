mod common;

use approx::assert_relative_eq;
use nalgebra::DMatrix;
use spatnull::correlation::{mean, pearson, sample_std};
use spatnull::{
    compute_spectral_basis, inverse_distance_weights, MoranConfig, MoranRandomization,
    NullModelError, Procedure, SpectrumMode,
};

#[test]
fn subcortical_weights_lose_one_component() {
    let cloud = common::uniform_cloud(16, 9);
    let w = inverse_distance_weights(cloud.view()).unwrap();
    for spectrum in [SpectrumMode::NonZero, SpectrumMode::All] {
        let basis = compute_spectral_basis(&w, spectrum, 1e-10).unwrap();
        assert_eq!(basis.n_components(), 15);
        assert_eq!(basis.eigenvalues.len(), 15);
    }
}

#[test]
fn identity_weights_keep_the_centered_subspace() {
    let w = DMatrix::<f64>::identity(4, 4);
    let basis = compute_spectral_basis(&w, SpectrumMode::NonZero, 1e-10).unwrap();
    assert_eq!(basis.n_components(), 3);

    let err = compute_spectral_basis(&w, SpectrumMode::NonZero, -1.0).unwrap_err();
    assert!(matches!(err, NullModelError::InvalidArgument(_)));
}

#[test]
fn badly_scaled_weights_report_a_missing_zero_eigenvalue() {
    let cloud = common::uniform_cloud(10, 2);
    let w = inverse_distance_weights(cloud.view()).unwrap() * 1e20;
    let err = compute_spectral_basis(&w, SpectrumMode::NonZero, 1e-10).unwrap_err();
    assert!(matches!(err, NullModelError::NoZeroEigenvalue { .. }));
    assert!(err.to_string().contains("no zero eigenvalue"));
}

#[test]
fn surrogates_match_moments_for_every_variable() {
    let cloud = common::uniform_cloud(20, 4);
    let w = inverse_distance_weights(cloud.view()).unwrap();
    let a = common::gaussian(20, 10);
    let b: Vec<f64> = common::gaussian(20, 11).iter().map(|v| 3.0 * v - 7.0).collect();
    let mut x = DMatrix::zeros(20, 2);
    x.set_column(0, &nalgebra::DVector::from_vec(a.clone()));
    x.set_column(1, &nalgebra::DVector::from_vec(b.clone()));

    for procedure in [Procedure::Singleton, Procedure::Pair] {
        for joint in [false, true] {
            let moran = MoranRandomization::fit(
                MoranConfig {
                    procedure,
                    joint,
                    n_rep: 25,
                    seed: Some(5),
                    ..MoranConfig::default()
                },
                &w,
            )
            .unwrap();
            let surrogates = moran.randomize(&x).unwrap();
            assert_eq!(surrogates.len(), 25);
            for s in &surrogates {
                assert_eq!(s.shape(), (20, 2));
                for (var, original) in [&a, &b].into_iter().enumerate() {
                    let col: Vec<f64> = s.column(var).iter().copied().collect();
                    assert_relative_eq!(mean(&col), mean(original), epsilon = 1e-9);
                    assert_relative_eq!(sample_std(&col), sample_std(original), epsilon = 1e-9);
                }
            }
        }
    }
}

#[test]
fn fitted_basis_is_reused_across_calls() {
    let cloud = common::uniform_cloud(12, 21);
    let w = inverse_distance_weights(cloud.view()).unwrap();
    let moran = MoranRandomization::fit(
        MoranConfig {
            n_rep: 10,
            seed: Some(99),
            ..MoranConfig::default()
        },
        &w,
    )
    .unwrap();
    let x = common::gaussian(12, 3);
    let first = moran.randomize_map(&x).unwrap();
    let second = moran.randomize_map(&x).unwrap();
    assert_eq!(first, second);
    // Surrogates are not just the input again.
    assert!(first.iter().any(|s| pearson(s, &x) < 0.999));
}

#[test]
fn spectral_null_yields_a_p_value() {
    let cloud = common::uniform_cloud(24, 13);
    let w = inverse_distance_weights(cloud.view()).unwrap();
    let moran = MoranRandomization::fit(
        MoranConfig {
            procedure: Procedure::Pair,
            n_rep: 200,
            seed: Some(1),
            ..MoranConfig::default()
        },
        &w,
    )
    .unwrap();
    let x = common::gaussian(24, 30);
    let y = common::gaussian(24, 31);
    let rho = pearson(&x, &y);
    let null: Vec<f64> = moran
        .randomize_map(&x)
        .unwrap()
        .iter()
        .map(|s| pearson(s, &y))
        .collect();
    let p = spatnull::significance::tail_fraction(&null, rho);
    assert!((0.0..=1.0).contains(&p));
}
