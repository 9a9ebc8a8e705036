use crate::codec::decode_input;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::io::{BufReader, Read};
use tracing::warn;

pub fn ingest_input(json: impl Read) -> anyhow::Result<InputRecord> {
    Ok(serde_json::from_reader(BufReader::new(json))?)
}

/// Reads a serialized input code (as carried by a QR code) and decodes it into an input record.
pub fn ingest_input_code(mut code: impl Read) -> anyhow::Result<InputRecord> {
    let mut buffer = String::new();
    code.read_to_string(&mut buffer)?;
    Ok(decode_input(buffer.trim())?)
}

/// The flat record of audit inputs as collected from a user.
///
/// Every field is optional. Numeric fields accept JSON numbers, numeric strings and booleans;
/// text that is not a number is read as NaN. Keys this record doesn't know about are kept in
/// `other` so they can be passed through to the output record untouched.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[serde(rename_all = "camelCase")]
pub struct InputRecord {
    /// Total volume entering the distribution network, in m³/day
    #[serde(default, deserialize_with = "deserialize_numeric", skip_serializing_if = "Option::is_none")]
    pub system_input_volume: Option<f64>,
    /// Accuracy band of the system input volume: 0 = 1%, 1 = 5%, 2 = 15%, 3 = custom
    #[serde(default, deserialize_with = "deserialize_numeric", skip_serializing_if = "Option::is_none")]
    pub system_input_volume_choice: Option<f64>,
    /// Custom system input volume error, in percent
    #[serde(default, deserialize_with = "deserialize_numeric", skip_serializing_if = "Option::is_none")]
    pub system_input_volume_value: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_numeric", skip_serializing_if = "Option::is_none")]
    pub billing_consumption_metered: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_numeric", skip_serializing_if = "Option::is_none")]
    pub billing_consumption_unmetered: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_numeric", skip_serializing_if = "Option::is_none")]
    pub unbilled_consumption_metered: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_numeric", skip_serializing_if = "Option::is_none")]
    pub unbilled_consumption_unmetered_value: Option<f64>,
    /// 0 = use `unbilledConsumptionUnmeteredValue`, anything else = default share of system input volume
    #[serde(default, deserialize_with = "deserialize_numeric", skip_serializing_if = "Option::is_none")]
    pub unbilled_consumption_unmetered_choice: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_numeric", skip_serializing_if = "Option::is_none")]
    pub customer_meter_under_registration_choice: Option<f64>,
    /// An explicit `null` reads as 0; only a missing key leaves the value unset
    #[serde(default, deserialize_with = "deserialize_numeric_null_as_zero", skip_serializing_if = "Option::is_none")]
    pub customer_meter_under_registration_value: Option<f64>,
    /// 0 = low, 1 = medium, anything else = high
    #[serde(default, deserialize_with = "deserialize_numeric", skip_serializing_if = "Option::is_none")]
    pub illegal_connections_choice: Option<f64>,
    /// Length of mains, in km
    #[serde(default, deserialize_with = "deserialize_numeric", skip_serializing_if = "Option::is_none")]
    pub pipeline_length: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_numeric", skip_serializing_if = "Option::is_none")]
    pub number_of_customer_accounts: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_numeric", skip_serializing_if = "Option::is_none")]
    pub number_of_service_connections: Option<f64>,
    /// 0-5 index the supply hours table, 6 = `supplyTimeValue`
    #[serde(default, deserialize_with = "deserialize_numeric", skip_serializing_if = "Option::is_none")]
    pub supply_time_choice: Option<f64>,
    /// Hours of supply per day, in h
    #[serde(default, deserialize_with = "deserialize_numeric", skip_serializing_if = "Option::is_none")]
    pub supply_time_value: Option<f64>,
    /// 0-3 pick 10, 20, 30 or 40 m, 4 = `pressureValue`
    #[serde(default, deserialize_with = "deserialize_numeric", skip_serializing_if = "Option::is_none")]
    pub pressure_choice: Option<f64>,
    /// Average operating pressure, in m
    #[serde(default, deserialize_with = "deserialize_numeric", skip_serializing_if = "Option::is_none")]
    pub pressure_value: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_text", skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Average tariff per m³
    #[serde(default, deserialize_with = "deserialize_numeric", skip_serializing_if = "Option::is_none")]
    pub average_tariff: Option<f64>,
    /// Variable production and distribution cost per m³
    #[serde(default, deserialize_with = "deserialize_numeric", skip_serializing_if = "Option::is_none")]
    pub variable_production_and_distribution_cost: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_numeric", skip_serializing_if = "Option::is_none")]
    pub annual_operating_cost: Option<f64>,
    /// Value per m³ at which recovered physical losses are counted
    #[serde(default, deserialize_with = "deserialize_numeric", skip_serializing_if = "Option::is_none")]
    pub how_to_value_recovered_losses: Option<f64>,
    #[serde(flatten)]
    #[cfg_attr(feature = "arbitrary", arbitrary(default))]
    pub other: IndexMap<String, Value>,
}

fn deserialize_numeric<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .filter(|value| !value.is_null())
        .map(|value| coerce_to_number(&value)))
}

fn deserialize_numeric_null_as_zero<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Some(
        Option::<Value>::deserialize(deserializer)?
            .map_or(0., |value| coerce_to_number(&value)),
    ))
}

fn deserialize_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<Value>::deserialize(deserializer)?.and_then(|value| match value {
            Value::Null => None,
            Value::String(text) => Some(text),
            other => Some(other.to_string()),
        }),
    )
}

/// Reads a scalar the way the input forms deliver it: numbers as they are, numeric text
/// (surrounding whitespace ignored, blank text as zero), booleans as 1 or 0. Anything else is NaN.
pub(crate) fn coerce_to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.,
        Value::Bool(flag) => {
            if *flag {
                1.
            } else {
                0.
            }
        }
        Value::Number(number) => number.as_f64().unwrap_or(f64::NAN),
        Value::String(text) => {
            let text = text.trim();
            if text.is_empty() {
                0.
            } else {
                text.parse().unwrap_or(f64::NAN)
            }
        }
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

/// Zero for absent values. Unreadable values stay NaN.
fn or_zero(value: Option<f64>) -> f64 {
    value.unwrap_or(0.)
}

impl InputRecord {
    /// Produces the typed state the calculation works on.
    ///
    /// Absent numbers become 0 and unreadable ones stay NaN, propagating through every metric
    /// derived from them. An absent `customerMeterUnderRegistrationValue` is NaN as well.
    pub fn normalize(&self) -> NormalizedInput {
        let customer_meter_under_registration_value = self
            .customer_meter_under_registration_value
            .unwrap_or(f64::NAN);
        if self.customer_meter_under_registration_value.is_none() {
            warn!("customerMeterUnderRegistrationValue is missing; commercial losses will not be a number");
        }

        NormalizedInput {
            system_input_volume: or_zero(self.system_input_volume),
            system_input_volume_choice: or_zero(self.system_input_volume_choice),
            system_input_volume_value: or_zero(self.system_input_volume_value),
            billing_consumption_metered: or_zero(self.billing_consumption_metered),
            billing_consumption_unmetered: or_zero(self.billing_consumption_unmetered),
            unbilled_consumption_metered: or_zero(self.unbilled_consumption_metered),
            unbilled_consumption_unmetered_value: or_zero(
                self.unbilled_consumption_unmetered_value,
            ),
            unbilled_consumption_unmetered_choice: or_zero(
                self.unbilled_consumption_unmetered_choice,
            ),
            customer_meter_under_registration_choice: or_zero(
                self.customer_meter_under_registration_choice,
            ),
            customer_meter_under_registration_value,
            illegal_connections_choice: or_zero(self.illegal_connections_choice),
            pipeline_length: or_zero(self.pipeline_length),
            number_of_customer_accounts: or_zero(self.number_of_customer_accounts),
            number_of_service_connections: or_zero(self.number_of_service_connections),
            supply_time_choice: or_zero(self.supply_time_choice),
            supply_time_value: or_zero(self.supply_time_value),
            pressure_choice: or_zero(self.pressure_choice),
            pressure_value: or_zero(self.pressure_value),
            currency: self.currency.clone(),
            average_tariff: or_zero(self.average_tariff),
            variable_production_and_distribution_cost: or_zero(
                self.variable_production_and_distribution_cost,
            ),
            annual_operating_cost: or_zero(self.annual_operating_cost),
            how_to_value_recovered_losses: or_zero(self.how_to_value_recovered_losses),
        }
    }
}

/// Input values after defaulting, ready for the water balance.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormalizedInput {
    pub system_input_volume: f64,
    pub system_input_volume_choice: f64,
    pub system_input_volume_value: f64,
    pub billing_consumption_metered: f64,
    pub billing_consumption_unmetered: f64,
    pub unbilled_consumption_metered: f64,
    pub unbilled_consumption_unmetered_value: f64,
    pub unbilled_consumption_unmetered_choice: f64,
    pub customer_meter_under_registration_choice: f64,
    pub customer_meter_under_registration_value: f64,
    pub illegal_connections_choice: f64,
    pub pipeline_length: f64,
    pub number_of_customer_accounts: f64,
    pub number_of_service_connections: f64,
    pub supply_time_choice: f64,
    pub supply_time_value: f64,
    pub pressure_choice: f64,
    pub pressure_value: f64,
    pub currency: Option<String>,
    pub average_tariff: f64,
    pub variable_production_and_distribution_cost: f64,
    pub annual_operating_cost: f64,
    pub how_to_value_recovered_losses: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use serde_json::json;
    use std::fs::File;
    use walkdir::WalkDir;

    #[rstest]
    fn should_successfully_parse_all_demo_files() {
        for entry in WalkDir::new("./demos/input")
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| {
                !e.file_type().is_dir() && e.file_name().to_str().unwrap().ends_with("json")
            })
        {
            let parsed = ingest_input(File::open(entry.path()).unwrap());
            assert!(
                parsed.is_ok(),
                "error was {:?} when parsing file {}",
                parsed.err().unwrap(),
                entry.file_name().to_str().unwrap()
            );
        }
    }

    #[rstest]
    fn should_coerce_numeric_text_and_flags() {
        let record: InputRecord = serde_json::from_value(json!({
            "systemInputVolume": " 1200.5 ",
            "pipelineLength": "",
            "pressureChoice": true,
            "averageTariff": "free",
            "numberOfServiceConnections": null,
            "currency": "EUR"
        }))
        .unwrap();

        assert_eq!(record.system_input_volume, Some(1200.5));
        assert_eq!(record.pipeline_length, Some(0.));
        assert_eq!(record.pressure_choice, Some(1.));
        assert!(record.average_tariff.unwrap().is_nan());
        assert_eq!(record.number_of_service_connections, None);
        assert_eq!(record.currency.as_deref(), Some("EUR"));
    }

    #[rstest]
    fn should_keep_unknown_keys() {
        let record: InputRecord = serde_json::from_value(json!({
            "systemInputVolume": 10,
            "activeStep": 3
        }))
        .unwrap();

        assert_eq!(record.other.get("activeStep"), Some(&json!(3)));
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"systemInputVolume": 10.0, "activeStep": 3})
        );
    }

    #[rstest]
    fn should_render_non_text_currency_as_text() {
        let record: InputRecord = serde_json::from_value(json!({"currency": 978})).unwrap();
        assert_eq!(record.currency.as_deref(), Some("978"));
    }

    #[rstest]
    fn should_default_missing_numbers_to_zero_and_keep_unreadable_ones() {
        let record = InputRecord {
            system_input_volume: Some(f64::NAN),
            pressure_value: Some(37.),
            customer_meter_under_registration_value: Some(2.),
            ..Default::default()
        };
        let normalized = record.normalize();

        assert!(normalized.system_input_volume.is_nan());
        assert_eq!(normalized.pressure_value, 37.);
        assert_eq!(normalized.pipeline_length, 0.);
        assert_eq!(normalized.customer_meter_under_registration_value, 2.);
        assert_eq!(normalized.currency, None);
    }

    #[rstest]
    fn unreadable_text_should_normalize_to_nan() {
        let record: InputRecord =
            serde_json::from_value(json!({"averageTariff": "free", "pipelineLength": ""}))
                .unwrap();
        let normalized = record.normalize();

        assert!(normalized.average_tariff.is_nan());
        assert_eq!(normalized.pipeline_length, 0.);
    }

    #[rstest]
    fn null_customer_meter_under_registration_value_should_read_as_zero() {
        let record: InputRecord =
            serde_json::from_value(json!({"customerMeterUnderRegistrationValue": null})).unwrap();

        assert_eq!(record.customer_meter_under_registration_value, Some(0.));
        assert_eq!(record.normalize().customer_meter_under_registration_value, 0.);
    }

    #[rstest]
    fn missing_customer_meter_under_registration_value_should_stay_nan() {
        let normalized = InputRecord::default().normalize();
        assert!(normalized
            .customer_meter_under_registration_value
            .is_nan());
    }

    #[rstest]
    fn zero_customer_meter_under_registration_value_should_stay_zero() {
        let record = InputRecord {
            customer_meter_under_registration_value: Some(0.),
            ..Default::default()
        };
        assert_eq!(record.normalize().customer_meter_under_registration_value, 0.);
    }
}
