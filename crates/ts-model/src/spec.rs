//! In-code model specification structs.
//!
//! These describe a binned model as data: channels of samples, each sample
//! carrying per-bin nominal rates and a list of rate modifiers. Parsing a
//! serialized workspace format into these structs is a concern of external
//! tooling; here they are assembled directly in code.

use serde::{Deserialize, Serialize};

/// A complete model specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Channels (disjoint event selections)
    pub channels: Vec<Channel>,
}

/// A channel: one binned observable region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    /// Channel name
    pub name: String,
    /// Samples contributing expected events to this channel
    pub samples: Vec<Sample>,
}

/// A sample: per-bin nominal rates plus modifiers acting on them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    /// Sample name
    pub name: String,
    /// Nominal expected counts per bin
    pub data: Vec<f64>,
    /// Rate modifiers applied to this sample
    pub modifiers: Vec<Modifier>,
}

/// A rate modifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Modifier {
    /// Free multiplicative normalization (unconstrained)
    NormFactor {
        /// Parameter name
        name: String,
    },
    /// Per-bin multiplicative uncertainty with Poisson (Barlow-Beeston)
    /// constraints; `data` holds the absolute per-bin uncertainties.
    ShapeSys {
        /// Parameter base name (one gamma per bin)
        name: String,
        /// Absolute per-bin uncertainties
        data: Vec<f64>,
    },
    /// Correlated shape variation between two templates, Normal-constrained.
    HistoSys {
        /// Parameter name
        name: String,
        /// Template at +1σ
        hi_data: Vec<f64>,
        /// Template at −1σ
        lo_data: Vec<f64>,
    },
    /// Normalization uncertainty with log-normal-style interpolation,
    /// Normal-constrained.
    NormSys {
        /// Parameter name
        name: String,
        /// Multiplier at +1σ
        hi: f64,
        /// Multiplier at −1σ
        lo: f64,
    },
}

impl Modifier {
    /// The modifier's parameter (base) name.
    pub fn name(&self) -> &str {
        match self {
            Modifier::NormFactor { name }
            | Modifier::ShapeSys { name, .. }
            | Modifier::HistoSys { name, .. }
            | Modifier::NormSys { name, .. } => name,
        }
    }
}
