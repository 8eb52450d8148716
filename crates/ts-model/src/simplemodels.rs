//! Simple model builders for quick experiments and tests.
//!
//! Convenience functions that construct a [`Model`] from minimal inputs:
//! one channel, one signal sample with a free normalization named `mu`,
//! and one background sample with either uncorrelated per-bin
//! uncertainties or a correlated up/down shape variation.

use ts_core::Result;

use crate::model::Model;
use crate::spec::{Channel, Modifier, ModelSpec, Sample};

/// Build a single-channel model with one signal sample and one background
/// sample whose per-bin uncertainties are **uncorrelated** (Barlow-Beeston
/// Poisson constraints).
///
/// # Arguments
/// * `signal` — expected signal yields per bin.
/// * `bkg` — expected background yields per bin.
/// * `bkg_uncertainty` — absolute per-bin background uncertainties (σ).
///
/// # Panics
/// Panics if the three slices have different lengths or are empty.
pub fn uncorrelated_background(
    signal: &[f64],
    bkg: &[f64],
    bkg_uncertainty: &[f64],
) -> Result<Model> {
    assert!(!signal.is_empty(), "signal must not be empty");
    assert_eq!(signal.len(), bkg.len(), "signal and bkg must have the same length");
    assert_eq!(
        signal.len(),
        bkg_uncertainty.len(),
        "signal and bkg_uncertainty must have the same length"
    );

    let spec = ModelSpec {
        channels: vec![Channel {
            name: "singlechannel".to_string(),
            samples: vec![
                Sample {
                    name: "signal".to_string(),
                    data: signal.to_vec(),
                    modifiers: vec![Modifier::NormFactor { name: "mu".to_string() }],
                },
                Sample {
                    name: "background".to_string(),
                    data: bkg.to_vec(),
                    modifiers: vec![Modifier::ShapeSys {
                        name: "uncorr_bkguncrt".to_string(),
                        data: bkg_uncertainty.to_vec(),
                    }],
                },
            ],
        }],
    };
    Model::from_spec(&spec, Some("mu"))
}

/// Build a single-channel model with one signal sample and one background
/// sample whose shape uncertainty is **correlated** across bins (one
/// Normal-constrained interpolation parameter).
///
/// # Arguments
/// * `signal` — expected signal yields per bin.
/// * `bkg` — expected (nominal) background yields per bin.
/// * `bkg_up` — background template at +1σ.
/// * `bkg_down` — background template at −1σ.
///
/// # Panics
/// Panics if the four slices have different lengths or are empty.
pub fn correlated_background(
    signal: &[f64],
    bkg: &[f64],
    bkg_up: &[f64],
    bkg_down: &[f64],
) -> Result<Model> {
    assert!(!signal.is_empty(), "signal must not be empty");
    assert_eq!(signal.len(), bkg.len(), "signal and bkg must have the same length");
    assert_eq!(signal.len(), bkg_up.len(), "signal and bkg_up must have the same length");
    assert_eq!(signal.len(), bkg_down.len(), "signal and bkg_down must have the same length");

    let spec = ModelSpec {
        channels: vec![Channel {
            name: "singlechannel".to_string(),
            samples: vec![
                Sample {
                    name: "signal".to_string(),
                    data: signal.to_vec(),
                    modifiers: vec![Modifier::NormFactor { name: "mu".to_string() }],
                },
                Sample {
                    name: "background".to_string(),
                    data: bkg.to_vec(),
                    modifiers: vec![Modifier::HistoSys {
                        name: "corr_bkguncrt".to_string(),
                        hi_data: bkg_up.to_vec(),
                        lo_data: bkg_down.to_vec(),
                    }],
                },
            ],
        }],
    };
    Model::from_spec(&spec, Some("mu"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ts_core::traits::LikelihoodModel;

    #[test]
    fn test_uncorrelated_background_roundtrip() {
        let model = uncorrelated_background(&[5.0, 10.0], &[50.0, 60.0], &[7.0, 8.0]).unwrap();
        assert!(model.config().poi_index().is_some());
        assert_eq!(model.n_parameters(), 3);
        let expected = model.expected_data(&model.suggested_init()).unwrap();
        assert_eq!(expected, vec![55.0, 70.0]);
    }

    #[test]
    fn test_correlated_background_roundtrip() {
        let model =
            correlated_background(&[5.0, 10.0], &[50.0, 60.0], &[55.0, 65.0], &[45.0, 55.0])
                .unwrap();
        assert!(model.config().poi_index().is_some());
        assert_eq!(model.n_parameters(), 2);
        let expected = model.expected_data(&model.suggested_init()).unwrap();
        assert_eq!(expected, vec![55.0, 70.0]);
    }

    #[test]
    #[should_panic(expected = "signal must not be empty")]
    fn test_uncorrelated_empty_panics() {
        let _ = uncorrelated_background(&[], &[], &[]);
    }
}
