//! Optimization backend.
//!
//! This module provides the optimizer contract consumed by the fit
//! machinery, plus an L-BFGS implementation on top of argmin with box
//! constraints via clamping and a projected-gradient treatment at active
//! bounds.

use argmin::core::{CostFunction, Executor, Gradient, State, TerminationReason, TerminationStatus};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use ts_core::{Error, Result};

/// Configuration for the L-BFGS optimizer
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Maximum number of iterations
    pub max_iter: u64,
    /// Convergence tolerance for gradient norm
    pub tol: f64,
    /// Number of corrections to approximate inverse Hessian
    pub m: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self { max_iter: 1000, tol: 1e-6, m: 10 }
    }
}

/// Result of optimization
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Best-fit parameters
    pub parameters: Vec<f64>,
    /// Function value at minimum
    pub fval: f64,
    /// Number of iterations
    pub n_iter: u64,
    /// Number of objective (cost) evaluations.
    pub n_fev: usize,
    /// Number of gradient evaluations.
    pub n_gev: usize,
    /// Convergence status
    pub converged: bool,
    /// Termination message
    pub message: String,
}

impl fmt::Display for OptimizationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OptimizationResult(fval={:.6}, n_iter={}, n_fev={}, n_gev={}, converged={})",
            self.fval, self.n_iter, self.n_fev, self.n_gev, self.converged
        )
    }
}

/// Objective function trait for optimization
pub trait ObjectiveFunction: Send + Sync {
    /// Evaluate function at given parameters
    fn eval(&self, params: &[f64]) -> Result<f64>;

    /// Compute gradient at given parameters (numerical if not overridden)
    fn gradient(&self, params: &[f64]) -> Result<Vec<f64>> {
        // Default: central differences with adaptive step size
        let n = params.len();
        let mut grad = vec![0.0; n];

        for i in 0..n {
            // Adaptive step size: eps = sqrt(machine_epsilon) * max(|x_i|, 1)
            let eps = 1e-8 * params[i].abs().max(1.0);

            let mut params_plus = params.to_vec();
            params_plus[i] += eps;
            let f_plus = self.eval(&params_plus)?;

            let mut params_minus = params.to_vec();
            params_minus[i] -= eps;
            let f_minus = self.eval(&params_minus)?;

            grad[i] = (f_plus - f_minus) / (2.0 * eps);
        }

        Ok(grad)
    }
}

/// The fixed contract the fit machinery consumes: minimize `objective`
/// from `init_pars` under inclusive per-parameter bounds, holding masked
/// parameters at their initial values.
///
/// Returns the best-fit parameter vector and the objective value (by
/// convention twice the negative log-likelihood) at the minimum.
pub trait Optimizer: Send + Sync {
    /// Perform the minimization.
    fn minimize(
        &self,
        objective: &dyn ObjectiveFunction,
        init_pars: &[f64],
        par_bounds: &[(f64, f64)],
        fixed_params: &[bool],
    ) -> Result<(Vec<f64>, f64)>;
}

/// Wrapper to make ObjectiveFunction compatible with argmin
struct ArgminProblem<'a> {
    objective: &'a dyn ObjectiveFunction,
    bounds: &'a [(f64, f64)],
    counts: Arc<FuncCounts>,
}

fn clamp_params(params: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    params.iter().zip(bounds.iter()).map(|(&v, &(lo, hi))| v.clamp(lo, hi)).collect()
}

#[derive(Default)]
struct FuncCounts {
    cost: AtomicUsize,
    grad: AtomicUsize,
}

impl<'a> CostFunction for ArgminProblem<'a> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
        self.counts.cost.fetch_add(1, Ordering::Relaxed);
        let clamped = clamp_params(params, self.bounds);
        self.objective.eval(&clamped).map_err(|e| argmin::core::Error::msg(e.to_string()))
    }
}

impl<'a> Gradient for ArgminProblem<'a> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(
        &self,
        params: &Self::Param,
    ) -> std::result::Result<Self::Gradient, argmin::core::Error> {
        self.counts.grad.fetch_add(1, Ordering::Relaxed);
        let clamped = clamp_params(params, self.bounds);
        let mut g = self
            .objective
            .gradient(&clamped)
            .map_err(|e| argmin::core::Error::msg(e.to_string()))?;

        // If a parameter sits at a bound and the gradient would push it
        // further outside, zero that component so the line search does not
        // keep stepping into the flat clamped region.
        const EPS: f64 = 1e-12;
        for (i, (&x, &(lo, hi))) in clamped.iter().zip(self.bounds.iter()).enumerate() {
            if x <= lo + EPS && g[i] > 0.0 {
                g[i] = 0.0;
            }
            if x >= hi - EPS && g[i] < 0.0 {
                g[i] = 0.0;
            }
        }

        Ok(g)
    }
}

/// L-BFGS optimizer with box constraints
pub struct LbfgsOptimizer {
    config: OptimizerConfig,
}

impl LbfgsOptimizer {
    /// Create a new L-BFGS optimizer with given configuration
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Minimize objective function with bounds
    ///
    /// # Arguments
    /// * `objective` - Objective function to minimize
    /// * `init_params` - Initial parameter values
    /// * `bounds` - Parameter bounds as (lower, upper) for each parameter
    ///
    /// # Returns
    /// Optimization result with best-fit parameters
    pub fn minimize_bounded(
        &self,
        objective: &dyn ObjectiveFunction,
        init_params: &[f64],
        bounds: &[(f64, f64)],
    ) -> Result<OptimizationResult> {
        if init_params.len() != bounds.len() {
            return Err(Error::Validation(format!(
                "Parameter and bounds length mismatch: {} != {}",
                init_params.len(),
                bounds.len()
            )));
        }

        let init_clamped = clamp_params(init_params, bounds);

        let counts = Arc::new(FuncCounts::default());
        let problem = ArgminProblem { objective, bounds, counts: counts.clone() };

        let linesearch = MoreThuenteLineSearch::new();
        // Argmin's default cost tolerance is ~EPS, which is too strict for
        // likelihood scales and leads to unnecessary max-iter terminations.
        let tol_cost =
            if self.config.tol == 0.0 { 0.0 } else { (0.1 * self.config.tol).max(1e-12) };
        let solver = LBFGS::new(linesearch, self.config.m)
            .with_tolerance_grad(self.config.tol)
            .map_err(|e| {
                Error::Validation(format!("Invalid optimizer configuration (tol): {e}"))
            })?;
        let solver = solver.with_tolerance_cost(tol_cost).map_err(|e| {
            Error::Validation(format!("Invalid optimizer configuration (tol_cost): {e}"))
        })?;

        let res = Executor::new(problem, solver)
            .configure(|state| state.param(init_clamped).max_iters(self.config.max_iter))
            .run()
            .map_err(|e| Error::Optimization(format!("Optimization failed: {}", e)))?;

        let state = res.state();
        let best_params_unclamped = state
            .get_best_param()
            .ok_or_else(|| Error::Optimization("No best parameters found".to_string()))?
            .clone();
        let best_params = clamp_params(&best_params_unclamped, bounds);
        let fval = state.get_best_cost();
        let n_iter = state.get_iter();
        let n_fev = counts.cost.load(Ordering::Relaxed);
        let n_gev = counts.grad.load(Ordering::Relaxed);

        let termination = state.get_termination_status();
        let converged = matches!(
            termination,
            TerminationStatus::Terminated(TerminationReason::SolverConverged)
                | TerminationStatus::Terminated(TerminationReason::TargetCostReached)
        );
        let message = termination.to_string();

        Ok(OptimizationResult {
            parameters: best_params,
            fval,
            n_iter,
            n_fev,
            n_gev,
            converged,
            message,
        })
    }
}

impl Default for LbfgsOptimizer {
    fn default() -> Self {
        Self::new(OptimizerConfig::default())
    }
}

impl Optimizer for LbfgsOptimizer {
    fn minimize(
        &self,
        objective: &dyn ObjectiveFunction,
        init_pars: &[f64],
        par_bounds: &[(f64, f64)],
        fixed_params: &[bool],
    ) -> Result<(Vec<f64>, f64)> {
        if init_pars.len() != fixed_params.len() {
            return Err(Error::Validation(format!(
                "Parameter and fixed-mask length mismatch: {} != {}",
                init_pars.len(),
                fixed_params.len()
            )));
        }
        // A fixed parameter is held at its initial value via degenerate
        // bounds; the projected gradient keeps the solver off it.
        let bounds: Vec<(f64, f64)> = par_bounds
            .iter()
            .zip(fixed_params.iter().zip(init_pars.iter()))
            .map(|(&b, (&fixed, &init))| if fixed { (init, init) } else { b })
            .collect();

        let result = self.minimize_bounded(objective, init_pars, &bounds)?;
        if !result.converged {
            log::warn!(
                "Fit did not converge: {} (continuing with best-found parameters)",
                result.message
            );
        }
        Ok((result.parameters, result.fval))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // Simple test function: f(x, y) = (x - 2)^2 + (y - 3)^2
    // Minimum at (2, 3) with f = 0
    struct QuadraticFunction;

    impl ObjectiveFunction for QuadraticFunction {
        fn eval(&self, params: &[f64]) -> Result<f64> {
            let x = params[0];
            let y = params[1];
            Ok((x - 2.0).powi(2) + (y - 3.0).powi(2))
        }

        fn gradient(&self, params: &[f64]) -> Result<Vec<f64>> {
            let x = params[0];
            let y = params[1];
            Ok(vec![2.0 * (x - 2.0), 2.0 * (y - 3.0)])
        }
    }

    #[test]
    fn test_optimizer_quadratic() {
        let config = OptimizerConfig { max_iter: 100, tol: 1e-6, m: 10 };
        let optimizer = LbfgsOptimizer::new(config);

        let init = vec![0.0, 0.0];
        let bounds = vec![(-10.0, 10.0), (-10.0, 10.0)];

        let result = optimizer.minimize_bounded(&QuadraticFunction, &init, &bounds).unwrap();

        assert!(result.converged, "Optimizer should converge");
        assert_relative_eq!(result.parameters[0], 2.0, epsilon = 1e-4);
        assert_relative_eq!(result.parameters[1], 3.0, epsilon = 1e-4);
        assert_relative_eq!(result.fval, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_optimizer_converges_at_bound_when_minimum_outside() {
        // Unconstrained min at (-1, 3); bounds force (0, 2).
        struct ShiftedQuadratic;

        impl ObjectiveFunction for ShiftedQuadratic {
            fn eval(&self, params: &[f64]) -> Result<f64> {
                let x = params[0];
                let y = params[1];
                Ok((x + 1.0).powi(2) + (y - 3.0).powi(2))
            }

            fn gradient(&self, params: &[f64]) -> Result<Vec<f64>> {
                let x = params[0];
                let y = params[1];
                Ok(vec![2.0 * (x + 1.0), 2.0 * (y - 3.0)])
            }
        }

        let optimizer = LbfgsOptimizer::default();
        let init = vec![3.0, 1.0];
        let bounds = vec![(0.0, 5.0), (0.0, 2.0)];

        let result = optimizer.minimize_bounded(&ShiftedQuadratic, &init, &bounds).unwrap();

        assert_relative_eq!(result.parameters[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(result.parameters[1], 2.0, epsilon = 1e-6);
        assert_relative_eq!(result.fval, 2.0, epsilon = 1e-6);
        assert!(
            result.converged,
            "Optimizer should converge at boundary, not hit MaxIter. Status: {}",
            result.message
        );
    }

    #[test]
    fn test_optimizer_numerical_gradient_fallback() {
        // No gradient override: exercises the central-difference default.
        struct NoGradQuadratic;

        impl ObjectiveFunction for NoGradQuadratic {
            fn eval(&self, params: &[f64]) -> Result<f64> {
                Ok((params[0] - 1.5).powi(2))
            }
        }

        let optimizer = LbfgsOptimizer::default();
        let result = optimizer
            .minimize_bounded(&NoGradQuadratic, &[0.0], &[(-10.0, 10.0)])
            .unwrap();
        assert_relative_eq!(result.parameters[0], 1.5, epsilon = 1e-4);
    }

    #[test]
    fn test_fixed_params_held_at_init() {
        let optimizer = LbfgsOptimizer::default();
        let (params, _fval) = optimizer
            .minimize(
                &QuadraticFunction,
                &[0.5, 0.0],
                &[(-10.0, 10.0), (-10.0, 10.0)],
                &[true, false],
            )
            .unwrap();
        assert_relative_eq!(params[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(params[1], 3.0, epsilon = 1e-4);
    }
}
