use crate::codec::DecodeError;
use crate::core::selectors::SelectorOutOfRangeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EasyCalcError {
    #[error("Request was considered invalid due to error: {0}")]
    InvalidRequest(#[from] anyhow::Error),
    #[error("Error identified during easyCalc calculation: {0}")]
    FailureInCalculation(#[from] SelectorOutOfRangeError),
    #[error("Input code could not be decoded: {0}")]
    InvalidInputCode(#[from] DecodeError),
    #[error("Error during results postprocessing: {0}")]
    ErrorInPostprocessing(PostprocessingError),
}

#[derive(Debug, Error)]
#[error(transparent)]
pub struct PostprocessingError {
    error: anyhow::Error,
}

impl PostprocessingError {
    pub fn new(error: anyhow::Error) -> Self {
        Self { error }
    }
}
