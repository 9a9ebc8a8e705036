pub mod codec;
pub mod core;
pub mod errors;
pub mod input;
pub mod output;
pub mod results;
mod statistics;


#[cfg(test)]
#[macro_use]
extern crate is_close;

use crate::codec::DecodeError;
use crate::core::selectors::SelectorOutOfRangeError;
use crate::core::uncertainty::UncertaintyBudget;
use crate::core::water_balance::WaterBalance;
pub use crate::errors::EasyCalcError;
use crate::errors::PostprocessingError;
use crate::input::{ingest_input, ingest_input_code, InputRecord};
use crate::output::{write_results, write_results_json, Output};
pub use crate::results::OutputRecord;
use bitflags::bitflags;
use rayon::prelude::*;
use std::io::Read;
use tracing::{debug, info};

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    pub struct ProjectFlags: u32 {
        /// The input stream holds a serialized input code rather than a JSON record.
        const ENCODED_INPUT = 0b1;
        /// Also write the merged record as JSON alongside the CSV results.
        const JSON_OUTPUT = 0b10;
    }
}

/// Runs the water balance and its uncertainty for one input record and merges the results
/// onto it.
pub fn calculate(input: &InputRecord) -> Result<OutputRecord, SelectorOutOfRangeError> {
    let normalized = input.normalize();
    let balance = WaterBalance::calculate(&normalized)?;
    let budget = UncertaintyBudget::calculate(&normalized, &balance)?;
    let computed = results::computed_fields(&balance, &budget);
    debug!(fields = computed.len(), "merging computed fields onto input record");

    Ok(OutputRecord::new(input.clone(), computed))
}

/// Calculates independent records in parallel, keeping their order.
pub fn calculate_batch(
    inputs: &[InputRecord],
) -> Vec<Result<OutputRecord, SelectorOutOfRangeError>> {
    inputs.par_iter().map(calculate).collect()
}

pub fn run_project(
    input: impl Read,
    output: impl Output,
    flags: &ProjectFlags,
) -> Result<OutputRecord, EasyCalcError> {
    let input = if flags.contains(ProjectFlags::ENCODED_INPUT) {
        ingest_input_code(input).map_err(|err| match err.downcast::<DecodeError>() {
            Ok(err) => EasyCalcError::InvalidInputCode(err),
            Err(err) => EasyCalcError::InvalidRequest(err),
        })?
    } else {
        ingest_input(input)?
    };

    let record = calculate(&input)?;

    if !output.is_noop() {
        info!("writing results");
        write_results(&output, "results", &record)
            .map_err(|err| EasyCalcError::ErrorInPostprocessing(PostprocessingError::new(err)))?;
        if flags.contains(ProjectFlags::JSON_OUTPUT) {
            write_results_json(&output, "results", &record).map_err(|err| {
                EasyCalcError::ErrorInPostprocessing(PostprocessingError::new(err))
            })?;
        }
    }

    Ok(record)
}
