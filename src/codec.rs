//! Compact positional encoding of an input record, small enough to be carried by a QR code.
//!
//! The encoded form is a JSON array: the version tag followed by the input fields in the
//! fixed order of [`SERIALIZED_FIELDS`]. Values are positional, not keyed, so the order is
//! part of the format and can only change together with [`EASYCALC_VERSION`].

use crate::input::InputRecord;
use serde_json::{Map, Number, Value};
use thiserror::Error;
use tracing::warn;

pub const EASYCALC_VERSION: &str = "EC-2018-12";

/// Input fields carried by an encoded record, in wire order.
///
/// `supplyTimeValue` is not part of the format, so an explicit supply time does not survive
/// an encode/decode round trip. An absent `customerMeterUnderRegistrationValue` is written as
/// `null` and reads back as 0.
pub const SERIALIZED_FIELDS: [&str; 22] = [
    "systemInputVolume",
    "systemInputVolumeChoice",
    "systemInputVolumeValue",
    "billingConsumptionMetered",
    "billingConsumptionUnmetered",
    "unbilledConsumptionMetered",
    "unbilledConsumptionUnmeteredValue",
    "unbilledConsumptionUnmeteredChoice",
    "customerMeterUnderRegistrationChoice",
    "customerMeterUnderRegistrationValue",
    "illegalConnectionsChoice",
    "pipelineLength",
    "numberOfCustomerAccounts",
    "numberOfServiceConnections",
    "supplyTimeChoice",
    "pressureChoice",
    "pressureValue",
    "currency",
    "averageTariff",
    "variableProductionAndDistributionCost",
    "annualOperatingCost",
    "howToValueRecoveredLosses",
];

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("the easyCalc version should be {expected} but {received} was given")]
    VersionMismatch {
        expected: &'static str,
        received: String,
    },
    #[error("input code could not be read: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("input code is not an array of values")]
    NotAnArray,
}

pub fn encode_input(input: &InputRecord) -> String {
    let values: Vec<Value> = [Value::String(EASYCALC_VERSION.into())]
        .into_iter()
        .chain([
            encode_number(input.system_input_volume),
            encode_number(input.system_input_volume_choice),
            encode_number(input.system_input_volume_value),
            encode_number(input.billing_consumption_metered),
            encode_number(input.billing_consumption_unmetered),
            encode_number(input.unbilled_consumption_metered),
            encode_number(input.unbilled_consumption_unmetered_value),
            encode_number(input.unbilled_consumption_unmetered_choice),
            encode_number(input.customer_meter_under_registration_choice),
            encode_number(input.customer_meter_under_registration_value),
            encode_number(input.illegal_connections_choice),
            encode_number(input.pipeline_length),
            encode_number(input.number_of_customer_accounts),
            encode_number(input.number_of_service_connections),
            encode_number(input.supply_time_choice),
            encode_number(input.pressure_choice),
            encode_number(input.pressure_value),
            input.currency.clone().map_or(Value::Null, Value::String),
            encode_number(input.average_tariff),
            encode_number(input.variable_production_and_distribution_cost),
            encode_number(input.annual_operating_cost),
            encode_number(input.how_to_value_recovered_losses),
        ])
        .collect();

    Value::Array(values).to_string()
}

/// Whole numbers are written without a fractional part to keep codes short.
fn encode_number(value: Option<f64>) -> Value {
    match value {
        Some(value) if value.fract() == 0. && value.abs() < i64::MAX as f64 => {
            Value::Number(Number::from(value as i64))
        }
        Some(value) => Number::from_f64(value).map_or(Value::Null, Value::Number),
        None => Value::Null,
    }
}

pub fn decode_input(code: &str) -> Result<InputRecord, DecodeError> {
    let values = match serde_json::from_str::<Value>(code)? {
        Value::Array(values) => values,
        _ => return Err(DecodeError::NotAnArray),
    };

    let mut values = values.into_iter();
    let version = values.next().unwrap_or(Value::Null);
    if version.as_str() != Some(EASYCALC_VERSION) {
        let received = match version {
            Value::String(text) => text,
            other => other.to_string(),
        };
        warn!(%received, "rejected input code with unknown version");
        return Err(DecodeError::VersionMismatch {
            expected: EASYCALC_VERSION,
            received,
        });
    }

    let fields: Map<String, Value> = SERIALIZED_FIELDS
        .iter()
        .map(|name| name.to_string())
        .zip(values)
        .collect();

    Ok(serde_json::from_value(Value::Object(fields))?)
}
