use serde::{Deserialize, Serialize};

use crate::error::{QpError, Result};

/// Tuning parameters for the active-set QP solver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverParams {
    /// Tolerance on constraint violation, also the tie-break epsilon
    /// when deciding which constraints to add
    pub convergence_threshold: f64,

    /// Tolerance applied to Lagrange multipliers when deciding which
    /// active constraints to release
    pub convergence_threshold_for_lagrange_multipliers: f64,

    /// Maximum number of active-set revisions per solve
    pub max_number_of_iterations: usize,

    /// Seed the active set from the previous solve when the problem
    /// shape is unchanged
    pub use_warm_start: bool,

    /// Fraction of the worst violation a constraint must reach before
    /// it is added (1.0 adds every violated constraint)
    pub violation_fraction_to_add: f64,

    /// Fraction of the most negative multiplier an active constraint
    /// must reach before it is removed (1.0 removes every negative one)
    pub violation_fraction_to_remove: f64,
}

impl Default for SolverParams {
    fn default() -> Self {
        SolverParams {
            convergence_threshold: 1e-10,
            convergence_threshold_for_lagrange_multipliers: 1e-10,
            max_number_of_iterations: 10,
            use_warm_start: false,
            violation_fraction_to_add: 0.8,
            violation_fraction_to_remove: 0.95,
        }
    }
}

impl SolverParams {
    /// Parse parameters from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let params: SolverParams = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.convergence_threshold >= 0.0) || !self.convergence_threshold.is_finite() {
            return Err(QpError::ConfigError(format!(
                "convergence_threshold must be finite and non-negative, got {}",
                self.convergence_threshold
            )));
        }

        let multiplier_threshold = self.convergence_threshold_for_lagrange_multipliers;
        if !(multiplier_threshold >= 0.0) || !multiplier_threshold.is_finite() {
            return Err(QpError::ConfigError(format!(
                "convergence_threshold_for_lagrange_multipliers must be finite and non-negative, got {}",
                multiplier_threshold
            )));
        }

        if self.max_number_of_iterations == 0 {
            return Err(QpError::ConfigError(
                "max_number_of_iterations must be at least 1".to_string(),
            ));
        }

        for (name, fraction) in [
            ("violation_fraction_to_add", self.violation_fraction_to_add),
            ("violation_fraction_to_remove", self.violation_fraction_to_remove),
        ] {
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(QpError::ConfigError(format!(
                    "{} must be in (0, 1], got {}",
                    name, fraction
                )));
            }
        }

        Ok(())
    }
}
