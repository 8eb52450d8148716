//! Profile-likelihood test statistics.
//!
//! Five statistics built from the same pair of fits — an unconstrained
//! maximum-likelihood fit and a fit with the POI held at the tested value:
//!
//! - [`tmu`] / [`tmu_tilde`] — the two-sided likelihood-ratio statistic,
//!   for unbounded / zero-bounded POI configurations respectively
//! - [`q0`] — the discovery statistic (background-only test)
//! - [`qmu`] / [`qmu_tilde`] — the one-sided upper-limit statistics
//!
//! Each statistic validates that the model declares a POI before any fit
//! runs, and emits WARNING-level usage advisories on the
//! `ts::test_statistics` channel when invoked with a POI-bound convention
//! that does not match its definition. Advisories never alter control flow.

use ts_core::traits::LikelihoodModel;
use ts_core::{Error, Result};
use ts_tensor::tensorlib;

use crate::mle;
use crate::optimizer::Optimizer;

const LOG_TARGET: &str = "ts::test_statistics";

const UNSPECIFIED_POI_MSG: &str =
    "No POI is defined. A POI is required for profile likelihood based test statistics.";

/// The two fitted parameter vectors behind a test statistic.
#[derive(Debug, Clone)]
pub struct ProfileFits {
    /// Unconstrained best-fit parameters
    pub best_fit: Vec<f64>,
    /// Parameters of the fit with the POI held at the tested value
    pub constrained_fit: Vec<f64>,
}

fn validate_poi<M: LikelihoodModel>(model: &M, par_bounds: &[(f64, f64)]) -> Result<usize> {
    let poi_index = model
        .poi_index()
        .ok_or_else(|| Error::UnspecifiedPoi(UNSPECIFIED_POI_MSG.to_string()))?;
    if poi_index >= par_bounds.len() {
        return Err(Error::Validation(format!(
            "POI index {} out of range for {} bounds",
            poi_index,
            par_bounds.len()
        )));
    }
    Ok(poi_index)
}

/// Shared core: run both fits and form `constrained_2NLL - free_2NLL`
/// through the active backend's arithmetic.
#[allow(clippy::too_many_arguments)]
fn tmu_like<M: LikelihoodModel>(
    mu: f64,
    data: &[f64],
    model: &M,
    init_pars: &[f64],
    par_bounds: &[(f64, f64)],
    fixed_params: &[bool],
    optimizer: &dyn Optimizer,
) -> Result<(f64, ProfileFits)> {
    let (best_fit, twice_nll_free) =
        mle::fit(model, data, init_pars, par_bounds, fixed_params, optimizer)?;
    let (constrained_fit, twice_nll_constrained) =
        mle::fixed_poi_fit(mu, model, data, init_pars, par_bounds, fixed_params, optimizer)?;

    let tb = tensorlib();
    let stat = tb
        .sub(&tb.scalar(twice_nll_constrained)?, &tb.scalar(twice_nll_free)?)?
        .scalar_f64()?;
    Ok((stat, ProfileFits { best_fit, constrained_fit }))
}

/// One-sided variant: the statistic is zeroed when the best-fit POI lies
/// above the tested value.
#[allow(clippy::too_many_arguments)]
fn qmu_like<M: LikelihoodModel>(
    mu: f64,
    data: &[f64],
    model: &M,
    init_pars: &[f64],
    par_bounds: &[(f64, f64)],
    fixed_params: &[bool],
    optimizer: &dyn Optimizer,
    poi_index: usize,
) -> Result<(f64, ProfileFits)> {
    let (tmu_stat, fits) =
        tmu_like(mu, data, model, init_pars, par_bounds, fixed_params, optimizer)?;
    let muhat = fits.best_fit[poi_index];

    let tb = tensorlib();
    let excess = tb.gt(&tb.scalar(muhat)?, &tb.scalar(mu)?)?;
    let stat = tb
        .where_cond(&excess, &tb.scalar(0.0)?, &tb.scalar(tmu_stat)?)?
        .scalar_f64()?;
    Ok((stat, fits))
}

/// The discovery test statistic `q0`, with fitted parameter vectors.
///
/// Zeroed when the best-fit POI is negative.
#[allow(clippy::too_many_arguments)]
pub fn q0_with_fitted_pars<M: LikelihoodModel>(
    mu: f64,
    data: &[f64],
    model: &M,
    init_pars: &[f64],
    par_bounds: &[(f64, f64)],
    fixed_params: &[bool],
    optimizer: &dyn Optimizer,
) -> Result<(f64, ProfileFits)> {
    let poi_index = validate_poi(model, par_bounds)?;
    if mu != 0.0 {
        log::warn!(
            target: LOG_TARGET,
            "q0 test statistic only used for fit configuration with POI set to zero"
        );
    }

    let (tmu_stat, fits) =
        tmu_like(mu, data, model, init_pars, par_bounds, fixed_params, optimizer)?;
    let muhat = fits.best_fit[poi_index];

    let tb = tensorlib();
    let upward = tb.gt(&tb.scalar(muhat)?, &tb.scalar(0.0)?)?;
    let stat = tb
        .where_cond(&upward, &tb.scalar(tmu_stat)?, &tb.scalar(0.0)?)?
        .scalar_f64()?;
    Ok((stat, fits))
}

/// The discovery test statistic `q0` for the background-only hypothesis.
pub fn q0<M: LikelihoodModel>(
    mu: f64,
    data: &[f64],
    model: &M,
    init_pars: &[f64],
    par_bounds: &[(f64, f64)],
    fixed_params: &[bool],
    optimizer: &dyn Optimizer,
) -> Result<f64> {
    Ok(q0_with_fitted_pars(mu, data, model, init_pars, par_bounds, fixed_params, optimizer)?.0)
}

/// The one-sided upper-limit statistic `qmu`, with fitted parameter
/// vectors. Expects a POI whose lower bound is away from zero; use
/// [`qmu_tilde`] for the zero-bounded convention.
#[allow(clippy::too_many_arguments)]
pub fn qmu_with_fitted_pars<M: LikelihoodModel>(
    mu: f64,
    data: &[f64],
    model: &M,
    init_pars: &[f64],
    par_bounds: &[(f64, f64)],
    fixed_params: &[bool],
    optimizer: &dyn Optimizer,
) -> Result<(f64, ProfileFits)> {
    let poi_index = validate_poi(model, par_bounds)?;
    if par_bounds[poi_index].0 == 0.0 {
        log::warn!(
            target: LOG_TARGET,
            "qmu test statistic used for fit configuration with POI bounded at zero.\nUse the qmu_tilde test statistic instead."
        );
    }
    qmu_like(mu, data, model, init_pars, par_bounds, fixed_params, optimizer, poi_index)
}

/// The one-sided upper-limit statistic `qmu`.
pub fn qmu<M: LikelihoodModel>(
    mu: f64,
    data: &[f64],
    model: &M,
    init_pars: &[f64],
    par_bounds: &[(f64, f64)],
    fixed_params: &[bool],
    optimizer: &dyn Optimizer,
) -> Result<f64> {
    Ok(qmu_with_fitted_pars(mu, data, model, init_pars, par_bounds, fixed_params, optimizer)?.0)
}

/// The one-sided upper-limit statistic for a non-negative signal strength,
/// with fitted parameter vectors. Requires the POI lower bound at zero; the
/// bounded constrained fit realizes the piecewise definition in the region
/// where the unconstrained best fit would be negative.
#[allow(clippy::too_many_arguments)]
pub fn qmu_tilde_with_fitted_pars<M: LikelihoodModel>(
    mu: f64,
    data: &[f64],
    model: &M,
    init_pars: &[f64],
    par_bounds: &[(f64, f64)],
    fixed_params: &[bool],
    optimizer: &dyn Optimizer,
) -> Result<(f64, ProfileFits)> {
    let poi_index = validate_poi(model, par_bounds)?;
    if par_bounds[poi_index].0 != 0.0 {
        log::warn!(
            target: LOG_TARGET,
            "qmu_tilde test statistic used for fit configuration with POI not bounded at zero.\nUse the qmu test statistic instead."
        );
    }
    qmu_like(mu, data, model, init_pars, par_bounds, fixed_params, optimizer, poi_index)
}

/// The one-sided upper-limit statistic for a non-negative signal strength.
pub fn qmu_tilde<M: LikelihoodModel>(
    mu: f64,
    data: &[f64],
    model: &M,
    init_pars: &[f64],
    par_bounds: &[(f64, f64)],
    fixed_params: &[bool],
    optimizer: &dyn Optimizer,
) -> Result<f64> {
    Ok(qmu_tilde_with_fitted_pars(mu, data, model, init_pars, par_bounds, fixed_params, optimizer)?
        .0)
}

/// The two-sided statistic `tmu`, with fitted parameter vectors. No floor
/// or sign adjustment is applied.
#[allow(clippy::too_many_arguments)]
pub fn tmu_with_fitted_pars<M: LikelihoodModel>(
    mu: f64,
    data: &[f64],
    model: &M,
    init_pars: &[f64],
    par_bounds: &[(f64, f64)],
    fixed_params: &[bool],
    optimizer: &dyn Optimizer,
) -> Result<(f64, ProfileFits)> {
    let poi_index = validate_poi(model, par_bounds)?;
    if par_bounds[poi_index].0 == 0.0 {
        log::warn!(
            target: LOG_TARGET,
            "tmu test statistic used for fit configuration with POI bounded at zero.\nUse the tmu_tilde test statistic instead."
        );
    }
    tmu_like(mu, data, model, init_pars, par_bounds, fixed_params, optimizer)
}

/// The two-sided statistic `tmu` for an unbounded POI.
pub fn tmu<M: LikelihoodModel>(
    mu: f64,
    data: &[f64],
    model: &M,
    init_pars: &[f64],
    par_bounds: &[(f64, f64)],
    fixed_params: &[bool],
    optimizer: &dyn Optimizer,
) -> Result<f64> {
    Ok(tmu_with_fitted_pars(mu, data, model, init_pars, par_bounds, fixed_params, optimizer)?.0)
}

/// The two-sided statistic for a zero-bounded POI, with fitted parameter
/// vectors. The bound convention is enforced by the caller's model
/// configuration (`par_bounds`).
#[allow(clippy::too_many_arguments)]
pub fn tmu_tilde_with_fitted_pars<M: LikelihoodModel>(
    mu: f64,
    data: &[f64],
    model: &M,
    init_pars: &[f64],
    par_bounds: &[(f64, f64)],
    fixed_params: &[bool],
    optimizer: &dyn Optimizer,
) -> Result<(f64, ProfileFits)> {
    let poi_index = validate_poi(model, par_bounds)?;
    if par_bounds[poi_index].0 != 0.0 {
        log::warn!(
            target: LOG_TARGET,
            "tmu_tilde test statistic used for fit configuration with POI not bounded at zero.\nUse the tmu test statistic instead."
        );
    }
    tmu_like(mu, data, model, init_pars, par_bounds, fixed_params, optimizer)
}

/// The two-sided statistic for a zero-bounded POI.
pub fn tmu_tilde<M: LikelihoodModel>(
    mu: f64,
    data: &[f64],
    model: &M,
    init_pars: &[f64],
    par_bounds: &[(f64, f64)],
    fixed_params: &[bool],
    optimizer: &dyn Optimizer,
) -> Result<f64> {
    Ok(tmu_tilde_with_fitted_pars(mu, data, model, init_pars, par_bounds, fixed_params, optimizer)?
        .0)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoPoiModel;

    impl LikelihoodModel for NoPoiModel {
        fn n_parameters(&self) -> usize {
            1
        }

        fn poi_index(&self) -> Option<usize> {
            None
        }

        fn suggested_init(&self) -> Vec<f64> {
            vec![1.0]
        }

        fn suggested_bounds(&self) -> Vec<(f64, f64)> {
            vec![(0.0, 10.0)]
        }

        fn suggested_fixed(&self) -> Vec<bool> {
            vec![false]
        }

        fn auxdata(&self) -> Vec<f64> {
            vec![]
        }

        fn logpdf(&self, _params: &[f64], _data: &[f64]) -> Result<f64> {
            Ok(0.0)
        }
    }

    #[test]
    fn test_validate_poi_message() {
        let err = validate_poi(&NoPoiModel, &[(0.0, 10.0)]).unwrap_err();
        assert!(err.to_string().contains(
            "No POI is defined. A POI is required for profile likelihood based test statistics."
        ));
    }
}
