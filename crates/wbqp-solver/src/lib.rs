mod qp_problem;
mod backend;
mod active_set;
mod active_set_solver;
mod clarabel_backend;

pub use qp_problem::QpProblem;
pub use backend::{QpSolverBackend, QpSolution, QpStatus};
pub use active_set::ActiveSet;
pub use active_set_solver::SimpleActiveSetQpSolver;
pub use clarabel_backend::ClarabelQpSolver;

#[cfg(test)]
mod tests;
