use crate::core::uncertainty::{Uncertainty, UncertaintyBudget};
use crate::core::water_balance::WaterBalance;
use crate::input::InputRecord;
use indexmap::IndexMap;
use serde::Serialize;

/// The input record as received, followed by every computed metric.
///
/// Computed values are kept as `f64` so that `NaN` and infinities from degenerate inputs stay
/// distinguishable through [`OutputRecord::number`]; they serialize to `null`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OutputRecord {
    #[serde(flatten)]
    input: InputRecord,
    #[serde(flatten)]
    computed: IndexMap<&'static str, f64>,
}

impl OutputRecord {
    pub fn new(mut input: InputRecord, computed: IndexMap<&'static str, f64>) -> Self {
        // computed values win over pass-through keys of the same name
        for name in computed.keys() {
            input.other.shift_remove(*name);
        }

        Self { input, computed }
    }

    pub fn input(&self) -> &InputRecord {
        &self.input
    }

    pub fn computed(&self) -> &IndexMap<&'static str, f64> {
        &self.computed
    }

    /// A computed metric by its output key, falling back to numeric input fields.
    pub fn number(&self, name: &str) -> Option<f64> {
        if let Some(value) = self.computed.get(name) {
            return Some(*value);
        }

        serde_json::to_value(&self.input)
            .ok()?
            .get(name)?
            .as_f64()
    }
}

/// Flattens the balance and its uncertainty into the output keys, in report order.
pub fn computed_fields(
    balance: &WaterBalance,
    budget: &UncertaintyBudget,
) -> IndexMap<&'static str, f64> {
    let mut fields = IndexMap::from([
        ("billedConsumptionTotal", balance.billed_consumption_total),
        ("unbilledConsumptionTotal", balance.unbilled_consumption_total),
        (
            "totalAuthorizedConsumption",
            balance.total_authorized_consumption,
        ),
        (
            "customerMeterUnderRegistration",
            balance.customer_meter_under_registration,
        ),
        ("unauthorizedConsumption", balance.unauthorized_consumption),
        ("commercialLossesTotal", balance.commercial_losses_total),
        ("physicalLosses", balance.physical_losses),
        ("waterLosses", balance.water_losses),
        ("nrw", balance.nrw),
        (
            "totalNumberOfServiceConnections",
            balance.total_number_of_service_connections,
        ),
        ("pressure", balance.pressure),
        ("supplyTime", balance.supply_time),
        ("capl", balance.capl),
        ("mapl", balance.mapl),
        ("ili", balance.ili),
        (
            "litersPerConnectionPerDay",
            balance.liters_per_connection_per_day,
        ),
        (
            "litersPerConnectionPerDayPerMeterPressure",
            balance.liters_per_connection_per_day_per_meter_pressure,
        ),
        (
            "cubicmeterPerKilometerMainsPerHour",
            balance.cubicmeter_per_kilometer_mains_per_hour,
        ),
        (
            "commercialLossesExpressedInPercentOfAuthorizedConsumption",
            balance.commercial_losses_expressed_in_percent_of_authorized_consumption,
        ),
        (
            "litersPerConnectionPerDayCommercialLoss",
            balance.liters_per_connection_per_day_commercial_loss,
        ),
        (
            "litersPerCustomerPerDayCommercialLoss",
            balance.liters_per_customer_per_day_commercial_loss,
        ),
        (
            "volumeOfNonRevenueWater",
            balance.volume_of_non_revenue_water,
        ),
        (
            "litersPerConnectionPerDayNRW",
            balance.liters_per_connection_per_day_nrw,
        ),
    ]);

    insert_triple(
        &mut fields,
        [
            "systemInputVolumeERR",
            "systemInputVolumeSTD",
            "systemInputVolumeVAR",
        ],
        &budget.system_input_volume,
    );
    fields.insert(
        "unbilledConsumptionUnmetered",
        balance.unbilled_consumption_unmetered,
    );
    insert_triple(
        &mut fields,
        [
            "unbilledConsumptionUnmeteredERR",
            "unbilledConsumptionUnmeteredSTD",
            "unbilledConsumptionUnmeteredVAR",
        ],
        &budget.unbilled_consumption_unmetered,
    );
    insert_triple(
        &mut fields,
        [
            "unbilledConsumptionTotalERR",
            "unbilledConsumptionTotalSTD",
            "unbilledConsumptionTotalVAR",
        ],
        &budget.unbilled_consumption_total,
    );
    insert_triple(
        &mut fields,
        [
            "totalAuthorizedConsumptionERR",
            "totalAuthorizedConsumptionSTD",
            "totalAuthorizedConsumptionVAR",
        ],
        &budget.total_authorized_consumption,
    );
    insert_triple(
        &mut fields,
        [
            "customerMeterUnderRegistrationERR",
            "customerMeterUnderRegistrationSTD",
            "customerMeterUnderRegistrationVAR",
        ],
        &budget.customer_meter_under_registration,
    );
    insert_triple(
        &mut fields,
        [
            "unauthorizedConsumptionERR",
            "unauthorizedConsumptionSTD",
            "unauthorizedConsumptionVAR",
        ],
        &budget.unauthorized_consumption,
    );
    insert_triple(
        &mut fields,
        [
            "commercialLossesTotalERR",
            "commercialLossesTotalSTD",
            "commercialLossesTotalVAR",
        ],
        &budget.commercial_losses_total,
    );
    insert_triple(
        &mut fields,
        [
            "physicalLossesERR",
            "physicalLossesSTD",
            "physicalLossesVAR",
        ],
        &budget.physical_losses,
    );
    insert_triple(
        &mut fields,
        ["waterLossesERR", "waterLossesSTD", "waterLossesVAR"],
        &budget.water_losses,
    );
    insert_triple(
        &mut fields,
        ["nrwERR", "nrwSTD", "nrwVAR"],
        &budget.nrw,
    );

    fields.extend([
        ("caplERR", budget.capl_err),
        ("maplERR", budget.mapl_err),
        (
            "numberOfIllegalConnections",
            balance.number_of_illegal_connections,
        ),
    ]);
    insert_triple(
        &mut fields,
        [
            "numberOfIllegalConnectionsERR",
            "numberOfIllegalConnectionsSTD",
            "numberOfIllegalConnectionsVAR",
        ],
        &budget.number_of_illegal_connections,
    );
    insert_triple(
        &mut fields,
        [
            "totalNumberOfServiceConnectionsERR",
            "totalNumberOfServiceConnectionsSTD",
            "totalNumberOfServiceConnectionsVAR",
        ],
        &budget.total_number_of_service_connections,
    );

    fields.extend([
        ("iliERR", budget.ili_err),
        (
            "litersPerConnectionPerDayERR",
            budget.liters_per_connection_per_day_err,
        ),
        (
            "litersPerConnectionPerDayPerMeterPressureERR",
            budget.liters_per_connection_per_day_per_meter_pressure_err,
        ),
        (
            "cubicmeterPerKilometerMainsPerHourERR",
            budget.cubicmeter_per_kilometer_mains_per_hour_err,
        ),
        (
            "commercialLossesExpressedInPercentOfAuthorizedConsumptionERR",
            budget.commercial_losses_expressed_in_percent_of_authorized_consumption_err,
        ),
        (
            "litersPerConnectionPerDayCommercialLossERR",
            budget.liters_per_connection_per_day_commercial_loss_err,
        ),
        (
            "litersPerCustomerPerDayCommercialLossERR",
            budget.liters_per_customer_per_day_commercial_loss_err,
        ),
        (
            "volumeOfNonRevenueWaterERR",
            budget.volume_of_non_revenue_water_err,
        ),
        (
            "litersPerConnectionPerDayNRWERR",
            budget.liters_per_connection_per_day_nrw_err,
        ),
        ("valueOfNrw", balance.value_of_nrw),
        ("valueOfNrwERR", budget.value_of_nrw_err),
        (
            "valueOfNRWInPercentOfOperatingCosts",
            balance.value_of_nrw_in_percent_of_operating_costs,
        ),
        (
            "valueOfNRWInPercentOfOperatingCostsERR",
            budget.value_of_nrw_in_percent_of_operating_costs_err,
        ),
        ("valueOfCommercialLosses", balance.value_of_commercial_losses),
        (
            "valueOfCommercialLossesERR",
            budget.value_of_commercial_losses_err,
        ),
        (
            "costValueOfPhyiscalLosses",
            balance.cost_value_of_physical_losses,
        ),
        (
            "costValueOfPhyiscalLossesERR",
            budget.cost_value_of_physical_losses_err,
        ),
    ]);

    fields
}

fn insert_triple(
    fields: &mut IndexMap<&'static str, f64>,
    [err, std, var]: [&'static str; 3],
    uncertainty: &Uncertainty,
) {
    fields.insert(err, uncertainty.err);
    fields.insert(std, uncertainty.std);
    fields.insert(var, uncertainty.var);
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::NormalizedInput;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use serde_json::json;

    #[fixture]
    fn input() -> InputRecord {
        serde_json::from_value(json!({
            "systemInputVolume": 1_000_000,
            "systemInputVolumeChoice": 1,
            "billingConsumptionMetered": 700_000,
            "unbilledConsumptionUnmeteredChoice": 1,
            "customerMeterUnderRegistrationValue": 2,
            "numberOfServiceConnections": 1000,
            "numberOfCustomerAccounts": 1000,
            "pipelineLength": 50,
            "pressureChoice": 2,
            "activeStep": 3
        }))
        .unwrap()
    }

    #[fixture]
    fn output(input: InputRecord) -> OutputRecord {
        let normalized: NormalizedInput = input.normalize();
        let balance = WaterBalance::calculate(&normalized).unwrap();
        let budget = UncertaintyBudget::calculate(&normalized, &balance).unwrap();
        OutputRecord::new(input, computed_fields(&balance, &budget))
    }

    #[rstest]
    fn should_report_every_metric_once(output: OutputRecord) {
        assert_eq!(output.computed().len(), 80);
        assert_eq!(
            output.computed().keys().next(),
            Some(&"billedConsumptionTotal")
        );
        assert_eq!(
            output.computed().keys().last(),
            Some(&"costValueOfPhyiscalLossesERR")
        );
    }

    #[rstest]
    fn should_keep_input_fields_before_computed_fields(output: OutputRecord) {
        let serialized = serde_json::to_value(&output).unwrap();
        assert_eq!(serialized["systemInputVolume"], json!(1_000_000.));
        assert_eq!(serialized["activeStep"], json!(3));
        assert_eq!(serialized["nrw"], json!(output.number("nrw").unwrap()));
    }

    #[rstest]
    fn computed_value_should_replace_pass_through_key(input: InputRecord) {
        let mut input = input;
        input.other.insert("nrw".into(), json!("stale"));
        let normalized = input.normalize();
        let balance = WaterBalance::calculate(&normalized).unwrap();
        let budget = UncertaintyBudget::calculate(&normalized, &balance).unwrap();
        let output = OutputRecord::new(input, computed_fields(&balance, &budget));

        let serialized = serde_json::to_string(&output).unwrap();
        assert_eq!(serialized.matches("\"nrw\":").count(), 1);
        assert!(!serialized.contains("stale"));
    }

    #[rstest]
    fn number_should_fall_back_to_input_fields(output: OutputRecord) {
        assert_eq!(output.number("pipelineLength"), Some(50.));
        assert_eq!(output.number("activeStep"), Some(3.));
        assert_eq!(output.number("noSuchField"), None);
    }

    #[rstest]
    fn non_finite_values_should_serialize_to_null(input: InputRecord) {
        let input = InputRecord {
            customer_meter_under_registration_value: None,
            ..input
        };
        let normalized = input.normalize();
        let balance = WaterBalance::calculate(&normalized).unwrap();
        let budget = UncertaintyBudget::calculate(&normalized, &balance).unwrap();
        let output = OutputRecord::new(input, computed_fields(&balance, &budget));

        assert!(output.number("customerMeterUnderRegistration").unwrap().is_nan());
        let serialized = serde_json::to_value(&output).unwrap();
        assert_eq!(serialized["customerMeterUnderRegistration"], json!(null));
    }
}
