use nalgebra::{DMatrix, DVector};

use wbqp_types::{ProblemDimensions, QpError, Result};

/// QP in the form solved once per control tick:
/// minimize 0.5 * x^T Q x + q^T x + c
/// subject to A x = b, C x <= d, lb <= x <= ub
///
/// Empty `lower_bounds` / `upper_bounds` mean the variables are unbounded on
/// that side; individual entries may also be `-inf` / `+inf`.
#[derive(Debug, Clone, PartialEq)]
pub struct QpProblem {
    /// Cost Hessian Q (n x n, PSD after symmetrization)
    pub cost_quadratic: DMatrix<f64>,
    /// Linear cost term q
    pub cost_linear: DVector<f64>,
    /// Constant cost offset c
    pub cost_offset: f64,
    /// Equality constraint matrix A
    pub equality_matrix: DMatrix<f64>,
    /// Equality right-hand side b
    pub equality_vector: DVector<f64>,
    /// Inequality constraint matrix C
    pub inequality_matrix: DMatrix<f64>,
    /// Inequality right-hand side d
    pub inequality_vector: DVector<f64>,
    pub lower_bounds: DVector<f64>,
    pub upper_bounds: DVector<f64>,
}

impl QpProblem {
    /// Create an unconstrained problem
    pub fn new(cost_quadratic: DMatrix<f64>, cost_linear: DVector<f64>, cost_offset: f64) -> Self {
        let n = cost_quadratic.ncols();
        QpProblem {
            cost_quadratic,
            cost_linear,
            cost_offset,
            equality_matrix: DMatrix::zeros(0, n),
            equality_vector: DVector::zeros(0),
            inequality_matrix: DMatrix::zeros(0, n),
            inequality_vector: DVector::zeros(0),
            lower_bounds: DVector::zeros(0),
            upper_bounds: DVector::zeros(0),
        }
    }

    pub fn with_equality_constraints(mut self, a: DMatrix<f64>, b: DVector<f64>) -> Self {
        self.equality_matrix = a;
        self.equality_vector = b;
        self
    }

    /// Add inequality constraints C x <= d
    pub fn with_inequality_constraints(mut self, c: DMatrix<f64>, d: DVector<f64>) -> Self {
        self.inequality_matrix = c;
        self.inequality_vector = d;
        self
    }

    pub fn with_lower_bounds(mut self, lb: DVector<f64>) -> Self {
        self.lower_bounds = lb;
        self
    }

    pub fn with_upper_bounds(mut self, ub: DVector<f64>) -> Self {
        self.upper_bounds = ub;
        self
    }

    /// Get number of variables
    pub fn num_vars(&self) -> usize {
        self.cost_quadratic.nrows()
    }

    pub fn dimensions(&self) -> ProblemDimensions {
        ProblemDimensions {
            variables: self.num_vars(),
            equality_constraints: self.equality_matrix.nrows(),
            inequality_constraints: self.inequality_matrix.nrows(),
            lower_bounds: self.lower_bounds.len(),
            upper_bounds: self.upper_bounds.len(),
        }
    }

    /// Validate model dimensions
    pub fn validate(&self) -> Result<()> {
        let n = self.num_vars();

        if self.cost_quadratic.ncols() != n {
            return Err(QpError::DimensionMismatch(format!(
                "Q must be square, got {}x{}",
                n,
                self.cost_quadratic.ncols()
            )));
        }
        if self.cost_linear.len() != n {
            return Err(QpError::dimension("q length", n, self.cost_linear.len()));
        }

        // A zero-row A or C means "no constraints" whatever its column count
        if self.equality_matrix.nrows() > 0 && self.equality_matrix.ncols() != n {
            return Err(QpError::dimension("A columns", n, self.equality_matrix.ncols()));
        }
        if self.equality_vector.len() != self.equality_matrix.nrows() {
            return Err(QpError::dimension(
                "b length",
                self.equality_matrix.nrows(),
                self.equality_vector.len(),
            ));
        }

        if self.inequality_matrix.nrows() > 0 && self.inequality_matrix.ncols() != n {
            return Err(QpError::dimension("C columns", n, self.inequality_matrix.ncols()));
        }
        if self.inequality_vector.len() != self.inequality_matrix.nrows() {
            return Err(QpError::dimension(
                "d length",
                self.inequality_matrix.nrows(),
                self.inequality_vector.len(),
            ));
        }

        for (name, bounds) in [("lower bounds", &self.lower_bounds), ("upper bounds", &self.upper_bounds)] {
            if !bounds.is_empty() && bounds.len() != n {
                return Err(QpError::dimension(name, n, bounds.len()));
            }
        }

        Ok(())
    }

    /// Compute objective: 0.5 * x^T Q x + q^T x + c
    pub fn objective(&self, x: &DVector<f64>) -> f64 {
        0.5 * x.dot(&(&self.cost_quadratic * x)) + self.cost_linear.dot(x) + self.cost_offset
    }
}
