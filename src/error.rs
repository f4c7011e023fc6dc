//! Module containing the universal error type for this crate
use thiserror::Error;

/// Universal error type for `isoline`
#[derive(Error, Debug)]
pub enum Error {
    #[error("instruction {index} reads input {input}, which is not earlier in the tape")]
    InvalidTape { index: usize, input: i32 },

    #[error("slice lengths are mismatched")]
    MismatchedSlices,

    #[error("batch size {0} exceeds evaluator capacity {1}")]
    BatchTooLarge(usize, usize),
}
