//! Name-based test-statistic lookup.

use ts_core::traits::LikelihoodModel;
use ts_core::{Error, Result};

use crate::optimizer::Optimizer;
use crate::test_statistics;

/// The test-statistic families addressable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStatKind {
    /// Discovery statistic (`"q0"`)
    Q0,
    /// One-sided upper-limit statistic (`"q"`)
    Q,
    /// One-sided upper-limit statistic with zero-bounded POI (`"qtilde"`)
    QTilde,
}

/// Resolve a test-statistic name to its kind.
///
/// Accepted names are `"q0"`, `"q"`, and `"qtilde"`; anything else fails
/// with [`Error::InvalidTestStatistic`].
pub fn get_test_stat(name: &str) -> Result<TestStatKind> {
    match name {
        "q0" => Ok(TestStatKind::Q0),
        "q" => Ok(TestStatKind::Q),
        "qtilde" => Ok(TestStatKind::QTilde),
        _ => Err(Error::InvalidTestStatistic(name.to_string())),
    }
}

impl TestStatKind {
    /// Evaluate this statistic.
    #[allow(clippy::too_many_arguments)]
    pub fn evaluate<M: LikelihoodModel>(
        &self,
        mu: f64,
        data: &[f64],
        model: &M,
        init_pars: &[f64],
        par_bounds: &[(f64, f64)],
        fixed_params: &[bool],
        optimizer: &dyn Optimizer,
    ) -> Result<f64> {
        match self {
            TestStatKind::Q0 => test_statistics::q0(
                mu, data, model, init_pars, par_bounds, fixed_params, optimizer,
            ),
            TestStatKind::Q => test_statistics::qmu(
                mu, data, model, init_pars, par_bounds, fixed_params, optimizer,
            ),
            TestStatKind::QTilde => test_statistics::qmu_tilde(
                mu, data, model, init_pars, par_bounds, fixed_params, optimizer,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_test_stat_known_names() {
        assert_eq!(get_test_stat("q0").unwrap(), TestStatKind::Q0);
        assert_eq!(get_test_stat("q").unwrap(), TestStatKind::Q);
        assert_eq!(get_test_stat("qtilde").unwrap(), TestStatKind::QTilde);
    }

    #[test]
    fn test_get_test_stat_unknown_name() {
        let err = get_test_stat("look at me i'm not real").unwrap_err();
        assert!(matches!(err, Error::InvalidTestStatistic(_)));
    }
}
