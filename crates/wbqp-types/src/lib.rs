mod dimensions;
mod error;
mod params;

pub use dimensions::ProblemDimensions;
pub use error::{QpError, Result};
pub use params::SolverParams;
