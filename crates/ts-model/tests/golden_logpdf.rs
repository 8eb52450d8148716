//! Golden likelihood values for the two-bin counting setup, checked
//! against the original implementation to 5e-5 relative tolerance, and
//! checked to agree across engines.

use std::sync::Arc;

use ts_core::traits::LikelihoodModel;
use ts_model::simplemodels::{correlated_background, uncorrelated_background};
use ts_tensor::{
    set_backend, DenseBackend, LinalgBackend, ParallelBackend, Precision, SimdBackend,
};

fn rel_close(a: f64, b: f64, rel: f64) -> bool {
    (a - b).abs() <= rel * b.abs()
}

#[test]
fn test_logpdf_correlated_background_golden() {
    let model =
        correlated_background(&[30.0, 95.0], &[100.0, 150.0], &[102.0, 190.0], &[98.0, 100.0])
            .unwrap();
    let mut data = vec![120.0, 180.0];
    data.extend(model.auxdata());

    let logpdf = LikelihoodModel::logpdf(&model, &model.suggested_init(), &data).unwrap();
    assert!(
        rel_close(logpdf, -17.648827643136507, 5e-5),
        "logpdf = {logpdf}, expected ≈ -17.648827643136507"
    );
}

#[test]
fn test_logpdf_uncorrelated_background_golden() {
    let model = uncorrelated_background(&[30.0, 95.0], &[100.0, 150.0], &[10.0, 10.0]).unwrap();
    let mut data = vec![120.0, 180.0];
    data.extend(model.auxdata());

    let logpdf = LikelihoodModel::logpdf(&model, &model.suggested_init(), &data).unwrap();
    assert!(
        rel_close(logpdf, -23.579605171119738, 5e-5),
        "logpdf = {logpdf}, expected ≈ -23.579605171119738"
    );
}

/// The same model code must produce the same likelihood on every engine.
/// Backend swapping is process-wide state, so the sweep stays in one test.
#[test]
fn test_logpdf_identical_across_engines() {
    let model = uncorrelated_background(&[30.0, 95.0], &[100.0, 150.0], &[10.0, 10.0]).unwrap();
    let mut data = vec![120.0, 180.0];
    data.extend(model.auxdata());
    let init = model.suggested_init();

    set_backend(Arc::new(DenseBackend::new(Precision::B64)));
    let reference = LikelihoodModel::logpdf(&model, &init, &data).unwrap();

    set_backend(Arc::new(SimdBackend::new(Precision::B64)));
    let simd = LikelihoodModel::logpdf(&model, &init, &data).unwrap();
    assert!((simd - reference).abs() < 1e-9, "simd: {simd} vs {reference}");

    set_backend(Arc::new(ParallelBackend::new(Precision::B64)));
    let parallel = LikelihoodModel::logpdf(&model, &init, &data).unwrap();
    assert!((parallel - reference).abs() < 1e-9, "parallel: {parallel} vs {reference}");

    set_backend(Arc::new(LinalgBackend::new(Precision::B64)));
    let linalg = LikelihoodModel::logpdf(&model, &init, &data).unwrap();
    assert!((linalg - reference).abs() < 1e-9, "nalgebra: {linalg} vs {reference}");

    set_backend(Arc::new(DenseBackend::new(Precision::B64)));
}
