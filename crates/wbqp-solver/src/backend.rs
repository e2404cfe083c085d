use serde::{Deserialize, Serialize};
use wbqp_types::Result;

use crate::qp_problem::QpProblem;

/// QP solver status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QpStatus {
    Optimal,
    /// Active-set revision cap reached; `x` is all NaN
    MaxIterations,
    /// The promoted equality system was rank deficient; `x` is all NaN
    SingularActiveSet,
    PrimalInfeasible,
    DualInfeasible,
    Unsolved,
}

/// Solution from a QP solver.
///
/// Multiplier vectors follow the sign convention of the Lagrangian
/// `0.5 x^T Q x + q^T x + λ^T (J x - d)`: inequality and bound multipliers
/// are non-negative at a KKT point and zero for inactive rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QpSolution {
    pub x: Vec<f64>,
    pub equality_multipliers: Vec<f64>,
    pub inequality_multipliers: Vec<f64>,
    pub lower_bound_multipliers: Vec<f64>,
    pub upper_bound_multipliers: Vec<f64>,
    pub status: QpStatus,
    pub objective: f64,
    /// Number of active-set revisions (or interior-point iterations)
    pub iterations: usize,
}

impl QpSolution {
    pub fn new() -> Self {
        QpSolution {
            x: Vec::new(),
            equality_multipliers: Vec::new(),
            inequality_multipliers: Vec::new(),
            lower_bound_multipliers: Vec::new(),
            upper_bound_multipliers: Vec::new(),
            status: QpStatus::Unsolved,
            objective: f64::NAN,
            iterations: 0,
        }
    }

    /// True when `x` is a usable answer. Callers on the control path should
    /// check this before consuming `x` and fall back otherwise.
    pub fn is_converged(&self) -> bool {
        self.status == QpStatus::Optimal && self.x.iter().all(|v| !v.is_nan())
    }
}

impl Default for QpSolution {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for QP solver backends
pub trait QpSolverBackend: Send {
    /// Load `problem` and solve it
    fn solve_qp(&mut self, problem: &QpProblem) -> Result<QpSolution>;
}
