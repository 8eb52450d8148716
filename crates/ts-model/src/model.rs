//! Binned model representation.
//!
//! Converts a [`ModelSpec`] into an internal model suitable for inference.
//! Rate building (modifier application) is plain index arithmetic; the
//! likelihood itself is evaluated through the active tensor backend, so the
//! same model code runs unmodified over any registered engine.

use std::collections::HashMap;

use ts_core::traits::LikelihoodModel;
use ts_core::{Error, Result};
use ts_tensor::{tensorlib, DType, Tensor, TensorValue};

use crate::spec::{Modifier, ModelSpec};

const POS_LO: f64 = 1e-10;
const POS_HI: f64 = 10.0;

/// Expected rates are clamped here before entering a logarithm.
const RATE_FLOOR: f64 = 1e-10;

/// Model parameter
#[derive(Debug, Clone)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Initial value
    pub init: f64,
    /// Bounds (min, max)
    pub bounds: (f64, f64),
    /// Suggested fixed status
    pub fixed: bool,
}

/// Constraint term tied to auxiliary observations.
///
/// The auxiliary observations live at the tail of the full data vector, in
/// the order these constraints are stored.
#[derive(Debug, Clone)]
enum Constraint {
    /// Normal-constrained parameter; the aux expectation is the parameter
    /// value itself.
    Normal { param_idx: usize, width: f64 },
    /// Poisson (Barlow-Beeston) constraint; the aux expectation per bin is
    /// `gamma_i * tau_i`.
    Poisson { param_indices: Vec<usize>, tau: Vec<f64> },
}

/// Model channel
#[derive(Debug, Clone)]
struct ModelChannel {
    #[allow(dead_code)]
    name: String,
    samples: Vec<ModelSample>,
    n_bins: usize,
}

/// Model sample
#[derive(Debug, Clone)]
struct ModelSample {
    #[allow(dead_code)]
    name: String,
    nominal: Vec<f64>,
    modifiers: Vec<ModelModifier>,
}

/// Model modifier (processed)
#[derive(Debug, Clone)]
enum ModelModifier {
    /// Free normalization factor
    NormFactor { param_idx: usize },
    /// Per-bin multiplicative gammas (Barlow-Beeston)
    ShapeSys { param_indices: Vec<usize> },
    /// Correlated template interpolation (piecewise linear in alpha)
    HistoSys { param_idx: usize, hi_template: Vec<f64>, lo_template: Vec<f64> },
    /// Normalization interpolation (piecewise exponential in alpha)
    NormSys { param_idx: usize, hi: f64, lo: f64 },
}

/// Model configuration: the parameter table and derived quantities.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    parameters: Vec<Parameter>,
    poi_index: Option<usize>,
    auxdata: Vec<f64>,
}

impl ModelConfig {
    /// Index of the parameter of interest, if declared.
    pub fn poi_index(&self) -> Option<usize> {
        self.poi_index
    }

    /// Number of parameters.
    pub fn n_parameters(&self) -> usize {
        self.parameters.len()
    }

    /// The parameter table.
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Suggested initial parameter values.
    pub fn suggested_init(&self) -> Vec<f64> {
        self.parameters.iter().map(|p| p.init).collect()
    }

    /// Suggested per-parameter bounds.
    pub fn suggested_bounds(&self) -> Vec<(f64, f64)> {
        self.parameters.iter().map(|p| p.bounds).collect()
    }

    /// Suggested fixed-parameter mask.
    pub fn suggested_fixed(&self) -> Vec<bool> {
        self.parameters.iter().map(|p| p.fixed).collect()
    }

    /// Auxiliary observations implied by the constraint terms, in the
    /// model's canonical constraint order.
    pub fn auxdata(&self) -> &[f64] {
        &self.auxdata
    }
}

/// A binned statistical model.
#[derive(Debug, Clone)]
pub struct Model {
    config: ModelConfig,
    channels: Vec<ModelChannel>,
    constraints: Vec<Constraint>,
    n_main_bins: usize,
}

/// Piecewise exponential normalization interpolation.
fn normsys_factor(alpha: f64, hi: f64, lo: f64) -> f64 {
    if alpha >= 0.0 {
        hi.powf(alpha)
    } else {
        lo.powf(-alpha)
    }
}

/// Piecewise linear template interpolation (delta in nominal space).
fn histosys_delta(alpha: f64, lo: f64, nominal: f64, hi: f64) -> f64 {
    if alpha >= 0.0 {
        alpha * (hi - nominal)
    } else {
        alpha * (nominal - lo)
    }
}

impl Model {
    /// Build a model from a specification.
    ///
    /// `poi_name` names the normfactor parameter serving as the parameter
    /// of interest; `None` builds a model without a POI. Channels are
    /// ordered by name; the POI, when declared, is parameter 0.
    pub fn from_spec(spec: &ModelSpec, poi_name: Option<&str>) -> Result<Self> {
        let mut parameters: Vec<Parameter> = Vec::new();
        let mut param_map: HashMap<String, usize> = HashMap::new();

        let mut poi_index = None;
        if let Some(poi) = poi_name {
            param_map.insert(poi.to_string(), 0);
            parameters.push(Parameter {
                name: poi.to_string(),
                init: 1.0,
                bounds: (0.0, POS_HI),
                fixed: false,
            });
            poi_index = Some(0);
        }
        let mut poi_seen = poi_name.is_none();

        // Constraint registration, keyed by modifier base name.
        let mut histosys_params: Vec<(String, usize)> = Vec::new();
        let mut normsys_params: Vec<(String, usize)> = Vec::new();
        let mut shapesys_params: Vec<(String, Vec<usize>, Vec<f64>)> = Vec::new();

        let mut sorted_channels: Vec<&crate::spec::Channel> = spec.channels.iter().collect();
        sorted_channels.sort_by(|a, b| a.name.cmp(&b.name));

        let mut channels = Vec::new();
        let mut n_main_bins = 0usize;

        for channel in sorted_channels {
            let n_bins = channel.samples.first().map(|s| s.data.len()).unwrap_or(0);
            let mut samples = Vec::new();

            for sample in &channel.samples {
                if sample.data.len() != n_bins {
                    return Err(Error::Validation(format!(
                        "Sample '{}' has {} bins, channel '{}' has {}",
                        sample.name,
                        sample.data.len(),
                        channel.name,
                        n_bins
                    )));
                }

                let mut modifiers = Vec::new();
                for modifier in &sample.modifiers {
                    match modifier {
                        Modifier::NormFactor { name } => {
                            let idx = *param_map.entry(name.clone()).or_insert_with(|| {
                                parameters.push(Parameter {
                                    name: name.clone(),
                                    init: 1.0,
                                    bounds: (0.0, POS_HI),
                                    fixed: false,
                                });
                                parameters.len() - 1
                            });
                            if poi_name == Some(name.as_str()) {
                                poi_seen = true;
                            }
                            modifiers.push(ModelModifier::NormFactor { param_idx: idx });
                        }
                        Modifier::ShapeSys { name, data } => {
                            if data.len() != n_bins {
                                return Err(Error::Validation(format!(
                                    "ShapeSys '{}' has {} uncertainties for {} bins",
                                    name,
                                    data.len(),
                                    n_bins
                                )));
                            }
                            let mut param_indices = Vec::with_capacity(n_bins);
                            let mut tau = Vec::with_capacity(n_bins);
                            for (bin, &sigma) in data.iter().enumerate() {
                                if sigma <= 0.0 {
                                    return Err(Error::Validation(format!(
                                        "ShapeSys '{}' uncertainty must be positive, got {} in bin {}",
                                        name, sigma, bin
                                    )));
                                }
                                let pname = format!("{name}[{bin}]");
                                let idx = *param_map.entry(pname.clone()).or_insert_with(|| {
                                    parameters.push(Parameter {
                                        name: pname.clone(),
                                        init: 1.0,
                                        bounds: (POS_LO, POS_HI),
                                        fixed: false,
                                    });
                                    parameters.len() - 1
                                });
                                param_indices.push(idx);
                                tau.push((sample.data[bin] / sigma).powi(2));
                            }
                            match shapesys_params.iter().position(|(n, _, _)| n == name) {
                                None => shapesys_params.push((
                                    name.clone(),
                                    param_indices.clone(),
                                    tau.clone(),
                                )),
                                Some(pos) => {
                                    let (_, known_idx, known_tau) = &shapesys_params[pos];
                                    if known_idx != &param_indices || known_tau != &tau {
                                        return Err(Error::Validation(format!(
                                            "Inconsistent ShapeSys definition for '{}'",
                                            name
                                        )));
                                    }
                                }
                            }
                            modifiers.push(ModelModifier::ShapeSys { param_indices });
                        }
                        Modifier::HistoSys { name, hi_data, lo_data } => {
                            if hi_data.len() != n_bins || lo_data.len() != n_bins {
                                return Err(Error::Validation(format!(
                                    "HistoSys '{}' template lengths do not match {} bins",
                                    name, n_bins
                                )));
                            }
                            let idx = *param_map.entry(name.clone()).or_insert_with(|| {
                                parameters.push(Parameter {
                                    name: name.clone(),
                                    init: 0.0,
                                    bounds: (-5.0, 5.0),
                                    fixed: false,
                                });
                                parameters.len() - 1
                            });
                            if !histosys_params.iter().any(|(n, _)| n == name) {
                                histosys_params.push((name.clone(), idx));
                            }
                            modifiers.push(ModelModifier::HistoSys {
                                param_idx: idx,
                                hi_template: hi_data.clone(),
                                lo_template: lo_data.clone(),
                            });
                        }
                        Modifier::NormSys { name, hi, lo } => {
                            let idx = *param_map.entry(name.clone()).or_insert_with(|| {
                                parameters.push(Parameter {
                                    name: name.clone(),
                                    init: 0.0,
                                    bounds: (-5.0, 5.0),
                                    fixed: false,
                                });
                                parameters.len() - 1
                            });
                            if !normsys_params.iter().any(|(n, _)| n == name) {
                                normsys_params.push((name.clone(), idx));
                            }
                            modifiers.push(ModelModifier::NormSys {
                                param_idx: idx,
                                hi: *hi,
                                lo: *lo,
                            });
                        }
                    }
                }

                samples.push(ModelSample {
                    name: sample.name.clone(),
                    nominal: sample.data.clone(),
                    modifiers,
                });
            }

            n_main_bins += n_bins;
            channels.push(ModelChannel { name: channel.name.clone(), samples, n_bins });
        }

        if !poi_seen {
            return Err(Error::Validation(format!(
                "POI '{}' does not appear as a normfactor modifier",
                poi_name.unwrap_or_default()
            )));
        }

        // Canonical constraint order: histosys, normsys, shapesys, names
        // sorted within each kind. The auxdata layout follows this order.
        histosys_params.sort_by(|a, b| a.0.cmp(&b.0));
        normsys_params.sort_by(|a, b| a.0.cmp(&b.0));
        shapesys_params.sort_by(|a, b| a.0.cmp(&b.0));

        let mut constraints = Vec::new();
        let mut auxdata = Vec::new();
        for (_, idx) in &histosys_params {
            constraints.push(Constraint::Normal { param_idx: *idx, width: 1.0 });
            auxdata.push(0.0);
        }
        for (_, idx) in &normsys_params {
            constraints.push(Constraint::Normal { param_idx: *idx, width: 1.0 });
            auxdata.push(0.0);
        }
        for (_, param_indices, tau) in shapesys_params {
            auxdata.extend(tau.iter().copied());
            constraints.push(Constraint::Poisson { param_indices, tau });
        }

        Ok(Self {
            config: ModelConfig { parameters, poi_index, auxdata },
            channels,
            constraints,
            n_main_bins,
        })
    }

    /// Model configuration.
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Total number of main bins across channels.
    pub fn n_main_bins(&self) -> usize {
        self.n_main_bins
    }

    fn validate_params_len(&self, got: usize) -> Result<()> {
        let expected = self.config.parameters.len();
        if got != expected {
            return Err(Error::Validation(format!(
                "Parameter length mismatch: expected {}, got {}",
                expected, got
            )));
        }
        Ok(())
    }

    fn param(&self, params: &[f64], idx: usize) -> Result<f64> {
        params.get(idx).copied().ok_or_else(|| {
            Error::Validation(format!(
                "Modifier param index out of range: idx={} len={}",
                idx,
                params.len()
            ))
        })
    }

    /// Expected main-bin rates at the given parameter values, channels in
    /// name order.
    pub fn expected_data(&self, params: &[f64]) -> Result<Vec<f64>> {
        self.validate_params_len(params.len())?;
        let mut result = Vec::with_capacity(self.n_main_bins);

        for channel in &self.channels {
            let mut expected = vec![0.0f64; channel.n_bins];

            for sample in &channel.samples {
                // expected = (nominal + sum(deltas)) * product(factors)
                let mut deltas = vec![0.0f64; channel.n_bins];
                let mut factors = vec![1.0f64; channel.n_bins];

                for modifier in &sample.modifiers {
                    match modifier {
                        ModelModifier::NormFactor { param_idx } => {
                            let norm = self.param(params, *param_idx)?;
                            for f in &mut factors {
                                *f *= norm;
                            }
                        }
                        ModelModifier::ShapeSys { param_indices } => {
                            for (bin, &idx) in param_indices.iter().enumerate() {
                                factors[bin] *= self.param(params, idx)?;
                            }
                        }
                        ModelModifier::NormSys { param_idx, hi, lo } => {
                            let alpha = self.param(params, *param_idx)?;
                            let factor = normsys_factor(alpha, *hi, *lo);
                            for f in &mut factors {
                                *f *= factor;
                            }
                        }
                        ModelModifier::HistoSys { param_idx, hi_template, lo_template } => {
                            let alpha = self.param(params, *param_idx)?;
                            for (bin, d) in deltas.iter_mut().enumerate() {
                                *d += histosys_delta(
                                    alpha,
                                    lo_template[bin],
                                    sample.nominal[bin],
                                    hi_template[bin],
                                );
                            }
                        }
                    }
                }

                for (bin, e) in expected.iter_mut().enumerate() {
                    *e += (sample.nominal[bin] + deltas[bin]) * factors[bin];
                }
            }

            result.extend(expected);
        }

        Ok(result)
    }

    /// Log-likelihood of `params` given the full data vector (main
    /// observations followed by auxiliary observations). Returns a
    /// one-element tensor from the active backend.
    pub fn logpdf(&self, params: &[f64], data: &[f64]) -> Result<Tensor> {
        self.validate_params_len(params.len())?;
        let expected_data_len = self.n_main_bins + self.config.auxdata.len();
        if data.len() != expected_data_len {
            return Err(Error::Shape(format!(
                "Data length mismatch: expected {} (main + aux), got {}",
                expected_data_len,
                data.len()
            )));
        }

        let tb = tensorlib();

        // Main Poisson terms.
        let rates: Vec<f64> =
            self.expected_data(params)?.into_iter().map(|r| r.max(RATE_FLOOR)).collect();
        let lam = tb.astensor(&TensorValue::from(rates), DType::Float)?;
        let observed =
            tb.astensor(&TensorValue::from(data[..self.n_main_bins].to_vec()), DType::Float)?;
        let mut total = tb.sum(&tb.poisson_logpdf(&observed, &lam)?, None)?;

        // Constraint terms consume the auxiliary tail in canonical order.
        let mut aux_offset = self.n_main_bins;
        for constraint in &self.constraints {
            match constraint {
                Constraint::Normal { param_idx, width } => {
                    let aux = data[aux_offset];
                    aux_offset += 1;
                    let term = tb.normal_logpdf(
                        &tb.scalar(aux)?,
                        &tb.scalar(self.param(params, *param_idx)?)?,
                        &tb.scalar(*width)?,
                    )?;
                    total = tb.add(&total, &term)?;
                }
                Constraint::Poisson { param_indices, tau } => {
                    let aux = data[aux_offset..aux_offset + tau.len()].to_vec();
                    aux_offset += tau.len();
                    let mut rates = Vec::with_capacity(tau.len());
                    for (&idx, &tau_i) in param_indices.iter().zip(tau.iter()) {
                        rates.push((self.param(params, idx)? * tau_i).max(RATE_FLOOR));
                    }
                    let lam_aux = tb.astensor(&TensorValue::from(rates), DType::Float)?;
                    let obs_aux = tb.astensor(&TensorValue::from(aux), DType::Float)?;
                    let term = tb.sum(&tb.poisson_logpdf(&obs_aux, &lam_aux)?, None)?;
                    total = tb.add(&total, &term)?;
                }
            }
        }

        tb.reshape(&total, &[1])
    }
}

impl LikelihoodModel for Model {
    fn n_parameters(&self) -> usize {
        self.config.n_parameters()
    }

    fn poi_index(&self) -> Option<usize> {
        self.config.poi_index()
    }

    fn suggested_init(&self) -> Vec<f64> {
        self.config.suggested_init()
    }

    fn suggested_bounds(&self) -> Vec<(f64, f64)> {
        self.config.suggested_bounds()
    }

    fn suggested_fixed(&self) -> Vec<bool> {
        self.config.suggested_fixed()
    }

    fn auxdata(&self) -> Vec<f64> {
        self.config.auxdata().to_vec()
    }

    fn logpdf(&self, params: &[f64], data: &[f64]) -> Result<f64> {
        Model::logpdf(self, params, data)?.scalar_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{Channel, Sample};

    fn two_bin_spec() -> ModelSpec {
        ModelSpec {
            channels: vec![Channel {
                name: "singlechannel".to_string(),
                samples: vec![
                    Sample {
                        name: "signal".to_string(),
                        data: vec![30.0, 95.0],
                        modifiers: vec![Modifier::NormFactor { name: "mu".to_string() }],
                    },
                    Sample {
                        name: "background".to_string(),
                        data: vec![100.0, 150.0],
                        modifiers: vec![Modifier::ShapeSys {
                            name: "uncorr_bkguncrt".to_string(),
                            data: vec![10.0, 10.0],
                        }],
                    },
                ],
            }],
        }
    }

    #[test]
    fn test_parameter_table() {
        let model = Model::from_spec(&two_bin_spec(), Some("mu")).unwrap();
        assert_eq!(model.config().n_parameters(), 3);
        assert_eq!(model.config().poi_index(), Some(0));
        assert_eq!(model.config().suggested_init(), vec![1.0, 1.0, 1.0]);
        let bounds = model.config().suggested_bounds();
        assert_eq!(bounds[0], (0.0, 10.0));
        assert_eq!(bounds[1], (1e-10, 10.0));
        assert!(model.config().suggested_fixed().iter().all(|&f| !f));
    }

    #[test]
    fn test_auxdata_is_tau() {
        let model = Model::from_spec(&two_bin_spec(), Some("mu")).unwrap();
        // tau_i = (nominal_i / sigma_i)^2
        assert_eq!(model.config().auxdata(), &[100.0, 225.0]);
    }

    #[test]
    fn test_expected_data_at_init() {
        let model = Model::from_spec(&two_bin_spec(), Some("mu")).unwrap();
        let expected = model.expected_data(&model.config().suggested_init()).unwrap();
        assert_eq!(expected, vec![130.0, 245.0]);
    }

    #[test]
    fn test_expected_data_scales_with_poi() {
        let model = Model::from_spec(&two_bin_spec(), Some("mu")).unwrap();
        let expected = model.expected_data(&[2.0, 1.0, 1.0]).unwrap();
        assert_eq!(expected, vec![160.0, 340.0]);
    }

    #[test]
    fn test_no_poi_model() {
        let spec = ModelSpec {
            channels: vec![Channel {
                name: "channel".to_string(),
                samples: vec![Sample {
                    name: "sample".to_string(),
                    data: vec![10.0],
                    modifiers: vec![Modifier::NormSys {
                        name: "shape".to_string(),
                        hi: 0.5,
                        lo: 1.5,
                    }],
                }],
            }],
        };
        let model = Model::from_spec(&spec, None).unwrap();
        assert_eq!(model.config().poi_index(), None);
        assert_eq!(model.config().n_parameters(), 1);
        assert_eq!(model.config().auxdata(), &[0.0]);
    }

    #[test]
    fn test_missing_poi_fails() {
        let r = Model::from_spec(&two_bin_spec(), Some("nonexistent"));
        assert!(matches!(r, Err(Error::Validation(_))));
    }

    #[test]
    fn test_logpdf_data_length_checked() {
        let model = Model::from_spec(&two_bin_spec(), Some("mu")).unwrap();
        let init = model.config().suggested_init();
        assert!(matches!(model.logpdf(&init, &[120.0, 180.0]), Err(Error::Shape(_))));
    }

    #[test]
    fn test_normsys_factor_interpolation() {
        assert_eq!(normsys_factor(0.0, 1.2, 0.8), 1.0);
        assert_eq!(normsys_factor(1.0, 1.2, 0.8), 1.2);
        assert_eq!(normsys_factor(-1.0, 1.2, 0.8), 0.8);
    }

    #[test]
    fn test_histosys_delta_interpolation() {
        assert_eq!(histosys_delta(0.0, 98.0, 100.0, 102.0), 0.0);
        assert_eq!(histosys_delta(1.0, 98.0, 100.0, 102.0), 2.0);
        assert_eq!(histosys_delta(-1.0, 98.0, 100.0, 102.0), -2.0);
    }
}
