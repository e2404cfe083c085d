mod matrix_utils;

pub use matrix_utils::{
    contains_nan, copy_matrix_into, copy_vector_into, reshape_matrix, reshape_vector,
    symmetrize_into, validate_psd, with_cholesky,
};
