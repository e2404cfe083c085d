use serde::{Deserialize, Serialize};
use std::fmt;

/// Shape of a QP: variable count and row count of every constraint family.
///
/// Two consecutive problems with equal dimensions are eligible for warm
/// starting, since every active-set index of the first is valid in the second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProblemDimensions {
    pub variables: usize,
    pub equality_constraints: usize,
    pub inequality_constraints: usize,
    /// 0 when no lower bounds were set, otherwise equal to `variables`
    pub lower_bounds: usize,
    /// 0 when no upper bounds were set, otherwise equal to `variables`
    pub upper_bounds: usize,
}

impl ProblemDimensions {
    /// True when the problem has neither inequality rows nor bounds, so the
    /// first closed-form solve is already the answer.
    pub fn is_equality_only(&self) -> bool {
        self.inequality_constraints == 0 && self.lower_bounds == 0 && self.upper_bounds == 0
    }
}

impl fmt::Display for ProblemDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n={} eq={} ineq={} lb={} ub={}",
            self.variables,
            self.equality_constraints,
            self.inequality_constraints,
            self.lower_bounds,
            self.upper_bounds
        )
    }
}
