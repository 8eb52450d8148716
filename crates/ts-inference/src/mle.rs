//! Maximum-likelihood fit helpers.
//!
//! Builds twice-NLL objectives from a [`LikelihoodModel`] and delegates the
//! minimization to the optimizer contract. Optimizer failures propagate
//! unchanged; nothing here retries or masks them.

use ts_core::traits::LikelihoodModel;
use ts_core::{Error, Result};

use crate::optimizer::{ObjectiveFunction, Optimizer};

/// Twice the negative log-likelihood of `params` given `data`.
pub fn twice_nll<M: LikelihoodModel>(model: &M, params: &[f64], data: &[f64]) -> Result<f64> {
    Ok(-2.0 * model.logpdf(params, data)?)
}

/// Twice-NLL objective over a fixed dataset.
struct TwiceNll<'a, M: LikelihoodModel> {
    model: &'a M,
    data: &'a [f64],
}

impl<'a, M: LikelihoodModel> ObjectiveFunction for TwiceNll<'a, M> {
    fn eval(&self, params: &[f64]) -> Result<f64> {
        twice_nll(self.model, params, self.data)
    }
}

/// Unconstrained maximum-likelihood fit.
///
/// Returns the best-fit parameters and the twice-NLL at the minimum.
pub fn fit<M: LikelihoodModel>(
    model: &M,
    data: &[f64],
    init_pars: &[f64],
    par_bounds: &[(f64, f64)],
    fixed_params: &[bool],
    optimizer: &dyn Optimizer,
) -> Result<(Vec<f64>, f64)> {
    let objective = TwiceNll { model, data };
    optimizer.minimize(&objective, init_pars, par_bounds, fixed_params)
}

/// Maximum-likelihood fit with the POI additionally held at `poi_value`.
pub fn fixed_poi_fit<M: LikelihoodModel>(
    poi_value: f64,
    model: &M,
    data: &[f64],
    init_pars: &[f64],
    par_bounds: &[(f64, f64)],
    fixed_params: &[bool],
    optimizer: &dyn Optimizer,
) -> Result<(Vec<f64>, f64)> {
    let poi_index = model.poi_index().ok_or_else(|| {
        Error::UnspecifiedPoi(
            "No POI is defined. A POI is required to fit with a fixed POI.".to_string(),
        )
    })?;

    let mut init = init_pars.to_vec();
    let mut fixed = fixed_params.to_vec();
    if poi_index >= init.len() || poi_index >= fixed.len() {
        return Err(Error::Validation(format!(
            "POI index {} out of range for {} parameters",
            poi_index,
            init.len()
        )));
    }
    init[poi_index] = poi_value;
    fixed[poi_index] = true;

    let objective = TwiceNll { model, data };
    optimizer.minimize(&objective, &init, par_bounds, &fixed)
}
