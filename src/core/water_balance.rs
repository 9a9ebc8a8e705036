//! The IWA water balance: consumption, losses, non-revenue water, the performance
//! indicators built on them and their financial value.
//!
//! Volumes are in m³/day. Every metric is a pure function of the normalized input and the
//! metrics it depends on, passed in explicitly. [`WaterBalance::calculate`] evaluates them
//! once each, in dependency order.

use crate::core::selectors::{
    IllegalConnectionsLevel, MeterUnderRegistrationPolicy, PressureChoice,
    SelectorOutOfRangeError, SupplyTimeChoice, UnbilledUnmeteredPolicy,
};
use crate::core::units::{daily_to_annual, HOURS_PER_DAY, LITRES_PER_CUBIC_METRE, PERCENT};
use crate::input::NormalizedInput;
use tracing::debug;

/// Default unmetered unbilled consumption, in percent of system input volume.
const DEFAULT_UNBILLED_UNMETERED_PERCENT: f64 = 0.8;

// unavoidable background leakage terms for the minimum achievable physical losses
const MAINS_LEAKAGE_LITRES_PER_KM: f64 = 18.;
const SERVICE_CONNECTION_LEAKAGE_LITRES: f64 = 0.8;

#[derive(Clone, Debug, PartialEq)]
pub struct WaterBalance {
    pub unbilled_consumption_unmetered: f64,
    pub billed_consumption_total: f64,
    pub unbilled_consumption_total: f64,
    pub total_authorized_consumption: f64,
    pub customer_meter_under_registration: f64,
    pub unauthorized_consumption: f64,
    pub commercial_losses_total: f64,
    pub physical_losses: f64,
    pub water_losses: f64,
    pub nrw: f64,
    pub total_number_of_service_connections: f64,
    pub number_of_illegal_connections: f64,
    pub pressure: f64,
    pub supply_time: f64,
    pub capl: f64,
    pub mapl: f64,
    pub ili: f64,
    pub liters_per_connection_per_day: f64,
    pub liters_per_connection_per_day_per_meter_pressure: f64,
    pub cubicmeter_per_kilometer_mains_per_hour: f64,
    pub commercial_losses_expressed_in_percent_of_authorized_consumption: f64,
    pub liters_per_connection_per_day_commercial_loss: f64,
    pub liters_per_customer_per_day_commercial_loss: f64,
    pub volume_of_non_revenue_water: f64,
    pub liters_per_connection_per_day_nrw: f64,
    pub value_of_nrw: f64,
    pub value_of_nrw_in_percent_of_operating_costs: f64,
    pub value_of_commercial_losses: f64,
    pub cost_value_of_physical_losses: f64,
}

impl WaterBalance {
    pub fn calculate(input: &NormalizedInput) -> Result<Self, SelectorOutOfRangeError> {
        let pressure = pressure(input)?;
        let supply_time = supply_time(input)?;

        let unbilled_consumption_unmetered = unbilled_consumption_unmetered(input);
        let billed_consumption_total = billed_consumption_total(input);
        let unbilled_consumption_total =
            unbilled_consumption_total(input, unbilled_consumption_unmetered);
        let total_authorized_consumption =
            total_authorized_consumption(billed_consumption_total, unbilled_consumption_total);

        let customer_meter_under_registration = customer_meter_under_registration(input);
        let unauthorized_consumption = unauthorized_consumption(input, billed_consumption_total);
        let commercial_losses_total =
            commercial_losses_total(customer_meter_under_registration, unauthorized_consumption);
        let physical_losses = physical_losses(
            input,
            billed_consumption_total,
            unbilled_consumption_total,
            commercial_losses_total,
        );
        let water_losses = water_losses(commercial_losses_total, physical_losses);
        let nrw = nrw(unbilled_consumption_total, water_losses);

        let total_number_of_service_connections = total_number_of_service_connections(input);
        let number_of_illegal_connections =
            number_of_illegal_connections(input, total_number_of_service_connections);

        let capl = capl(physical_losses);
        let mapl = mapl(
            input,
            total_number_of_service_connections,
            pressure,
            supply_time,
        );
        let ili = ili(capl, mapl);

        let liters_per_connection_per_day =
            liters_per_connection_per_day(capl, total_number_of_service_connections, supply_time);
        let value_of_nrw = value_of_nrw(
            input,
            unbilled_consumption_total,
            commercial_losses_total,
            physical_losses,
        );

        let balance = Self {
            unbilled_consumption_unmetered,
            billed_consumption_total,
            unbilled_consumption_total,
            total_authorized_consumption,
            customer_meter_under_registration,
            unauthorized_consumption,
            commercial_losses_total,
            physical_losses,
            water_losses,
            nrw,
            total_number_of_service_connections,
            number_of_illegal_connections,
            pressure,
            supply_time,
            capl,
            mapl,
            ili,
            liters_per_connection_per_day,
            liters_per_connection_per_day_per_meter_pressure:
                liters_per_connection_per_day_per_meter_pressure(
                    liters_per_connection_per_day,
                    pressure,
                ),
            cubicmeter_per_kilometer_mains_per_hour: cubicmeter_per_kilometer_mains_per_hour(
                input,
                capl,
                supply_time,
            ),
            commercial_losses_expressed_in_percent_of_authorized_consumption:
                commercial_losses_expressed_in_percent_of_authorized_consumption(
                    commercial_losses_total,
                    total_authorized_consumption,
                ),
            liters_per_connection_per_day_commercial_loss:
                liters_per_connection_per_day_commercial_loss(
                    commercial_losses_total,
                    total_number_of_service_connections,
                ),
            liters_per_customer_per_day_commercial_loss:
                liters_per_customer_per_day_commercial_loss(input, commercial_losses_total),
            volume_of_non_revenue_water: volume_of_non_revenue_water(input, nrw),
            liters_per_connection_per_day_nrw: liters_per_connection_per_day_nrw(
                nrw,
                total_number_of_service_connections,
                supply_time,
            ),
            value_of_nrw,
            value_of_nrw_in_percent_of_operating_costs: value_of_nrw_in_percent_of_operating_costs(
                input,
                value_of_nrw,
            ),
            value_of_commercial_losses: value_of_commercial_losses(input, commercial_losses_total),
            cost_value_of_physical_losses: cost_value_of_physical_losses(input, physical_losses),
        };

        debug!(
            nrw = balance.nrw,
            physical_losses = balance.physical_losses,
            ili = balance.ili,
            "calculated water balance"
        );

        Ok(balance)
    }
}

pub fn unbilled_consumption_unmetered(input: &NormalizedInput) -> f64 {
    match UnbilledUnmeteredPolicy::from(input.unbilled_consumption_unmetered_choice) {
        UnbilledUnmeteredPolicy::Explicit => input.unbilled_consumption_unmetered_value,
        UnbilledUnmeteredPolicy::ShareOfSystemInputVolume => {
            input.system_input_volume * DEFAULT_UNBILLED_UNMETERED_PERCENT / PERCENT
        }
    }
}

pub fn billed_consumption_total(input: &NormalizedInput) -> f64 {
    input.billing_consumption_metered + input.billing_consumption_unmetered
}

pub fn unbilled_consumption_total(
    input: &NormalizedInput,
    unbilled_consumption_unmetered: f64,
) -> f64 {
    input.unbilled_consumption_metered + unbilled_consumption_unmetered
}

pub fn total_authorized_consumption(
    billed_consumption_total: f64,
    unbilled_consumption_total: f64,
) -> f64 {
    billed_consumption_total + unbilled_consumption_total
}

/// Volume that customer meters fail to register, obtained by inflating metered billed
/// consumption by the registration error of the selected policy.
pub fn customer_meter_under_registration(input: &NormalizedInput) -> f64 {
    let metered = input.billing_consumption_metered;
    let value = input.customer_meter_under_registration_value;
    let under_registration_percent =
        match MeterUnderRegistrationPolicy::from(input.customer_meter_under_registration_choice) {
            MeterUnderRegistrationPolicy::Percentage => value,
            MeterUnderRegistrationPolicy::HalvedPercentage => value * 0.5,
            MeterUnderRegistrationPolicy::PerCustomerAccount => {
                value / input.number_of_customer_accounts * 0.5
            }
        };

    metered / (1. - under_registration_percent / PERCENT) - metered
}

/// Banded under-registration percentage for a meter of the given age, in years.
///
/// Not used by [`customer_meter_under_registration`]: which registration rule is
/// authoritative for age-based input has not been settled, so this band table is kept
/// available on its own.
pub fn percentage_of_customer_meter_under_registration(age: f64) -> f64 {
    if age <= 3. {
        2.
    } else if age <= 10. {
        age - 1.
    } else {
        10.
    }
}

pub fn unauthorized_consumption(input: &NormalizedInput, billed_consumption_total: f64) -> f64 {
    let level = IllegalConnectionsLevel::from(input.illegal_connections_choice);
    let base = match level {
        IllegalConnectionsLevel::Low => input.system_input_volume,
        IllegalConnectionsLevel::Medium | IllegalConnectionsLevel::High => {
            billed_consumption_total
        }
    };

    base * level.unauthorized_consumption_percent() / PERCENT
}

pub fn commercial_losses_total(
    customer_meter_under_registration: f64,
    unauthorized_consumption: f64,
) -> f64 {
    customer_meter_under_registration + unauthorized_consumption
}

pub fn physical_losses(
    input: &NormalizedInput,
    billed_consumption_total: f64,
    unbilled_consumption_total: f64,
    commercial_losses_total: f64,
) -> f64 {
    input.system_input_volume
        - billed_consumption_total
        - unbilled_consumption_total
        - commercial_losses_total
}

pub fn water_losses(commercial_losses_total: f64, physical_losses: f64) -> f64 {
    commercial_losses_total + physical_losses
}

pub fn nrw(unbilled_consumption_total: f64, water_losses: f64) -> f64 {
    unbilled_consumption_total + water_losses
}

/// Registered service connections plus the estimated illegal ones.
pub fn total_number_of_service_connections(input: &NormalizedInput) -> f64 {
    input.number_of_service_connections
        * IllegalConnectionsLevel::from(input.illegal_connections_choice)
            .service_connection_factor()
}

pub fn number_of_illegal_connections(
    input: &NormalizedInput,
    total_number_of_service_connections: f64,
) -> f64 {
    total_number_of_service_connections - input.number_of_service_connections
}

/// Average operating pressure, in m.
pub fn pressure(input: &NormalizedInput) -> Result<f64, SelectorOutOfRangeError> {
    let choice = PressureChoice::try_from(input.pressure_choice)?;
    debug!(%choice, "resolving pressure");
    Ok(choice.metres(input.pressure_value))
}

/// Average hours of supply per day.
pub fn supply_time(input: &NormalizedInput) -> Result<f64, SelectorOutOfRangeError> {
    Ok(SupplyTimeChoice::try_from(input.supply_time_choice)?.hours_per_day(input.supply_time_value))
}

/// Current annual volume of physical losses.
pub fn capl(physical_losses: f64) -> f64 {
    physical_losses
}

/// Minimum achievable volume of physical losses.
pub fn mapl(
    input: &NormalizedInput,
    total_number_of_service_connections: f64,
    pressure: f64,
    supply_time: f64,
) -> f64 {
    (MAINS_LEAKAGE_LITRES_PER_KM * input.pipeline_length
        + SERVICE_CONNECTION_LEAKAGE_LITRES * total_number_of_service_connections)
        * pressure
        / HOURS_PER_DAY as f64
        * supply_time
        / LITRES_PER_CUBIC_METRE as f64
}

/// Infrastructure leakage index.
pub fn ili(capl: f64, mapl: f64) -> f64 {
    capl / mapl
}

pub fn liters_per_connection_per_day(
    capl: f64,
    total_number_of_service_connections: f64,
    supply_time: f64,
) -> f64 {
    capl * LITRES_PER_CUBIC_METRE as f64 / total_number_of_service_connections / supply_time
        * HOURS_PER_DAY as f64
}

pub fn liters_per_connection_per_day_per_meter_pressure(
    liters_per_connection_per_day: f64,
    pressure: f64,
) -> f64 {
    liters_per_connection_per_day / pressure
}

pub fn cubicmeter_per_kilometer_mains_per_hour(
    input: &NormalizedInput,
    capl: f64,
    supply_time: f64,
) -> f64 {
    capl / input.pipeline_length / supply_time
}

pub fn commercial_losses_expressed_in_percent_of_authorized_consumption(
    commercial_losses_total: f64,
    total_authorized_consumption: f64,
) -> f64 {
    commercial_losses_total / total_authorized_consumption * PERCENT
}

pub fn liters_per_connection_per_day_commercial_loss(
    commercial_losses_total: f64,
    total_number_of_service_connections: f64,
) -> f64 {
    commercial_losses_total / total_number_of_service_connections * LITRES_PER_CUBIC_METRE as f64
}

pub fn liters_per_customer_per_day_commercial_loss(
    input: &NormalizedInput,
    commercial_losses_total: f64,
) -> f64 {
    commercial_losses_total / input.number_of_customer_accounts * LITRES_PER_CUBIC_METRE as f64
}

/// Non-revenue water as a fraction of system input volume.
pub fn volume_of_non_revenue_water(input: &NormalizedInput, nrw: f64) -> f64 {
    nrw / input.system_input_volume
}

pub fn liters_per_connection_per_day_nrw(
    nrw: f64,
    total_number_of_service_connections: f64,
    supply_time: f64,
) -> f64 {
    nrw / total_number_of_service_connections / supply_time * HOURS_PER_DAY as f64
        * LITRES_PER_CUBIC_METRE as f64
}

/// Yearly value of non-revenue water: unbilled consumption at production cost, commercial
/// losses at the tariff and physical losses at the chosen recovery value.
pub fn value_of_nrw(
    input: &NormalizedInput,
    unbilled_consumption_total: f64,
    commercial_losses_total: f64,
    physical_losses: f64,
) -> f64 {
    daily_to_annual(
        unbilled_consumption_total * input.variable_production_and_distribution_cost
            + commercial_losses_total * input.average_tariff
            + physical_losses * input.how_to_value_recovered_losses,
    )
}

pub fn value_of_nrw_in_percent_of_operating_costs(input: &NormalizedInput, value_of_nrw: f64) -> f64 {
    value_of_nrw / input.annual_operating_cost * PERCENT
}

pub fn value_of_commercial_losses(input: &NormalizedInput, commercial_losses_total: f64) -> f64 {
    daily_to_annual(commercial_losses_total * input.average_tariff)
}

pub fn cost_value_of_physical_losses(input: &NormalizedInput, physical_losses: f64) -> f64 {
    daily_to_annual(physical_losses * input.how_to_value_recovered_losses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn input() -> NormalizedInput {
        NormalizedInput {
            system_input_volume: 1_000_000.,
            billing_consumption_metered: 700_000.,
            unbilled_consumption_unmetered_choice: 1.,
            customer_meter_under_registration_value: 2.,
            number_of_service_connections: 1000.,
            number_of_customer_accounts: 1000.,
            pipeline_length: 50.,
            pressure_choice: 2.,
            ..Default::default()
        }
    }

    #[rstest]
    fn should_apply_default_unbilled_unmetered_share(input: NormalizedInput) {
        assert_eq!(unbilled_consumption_unmetered(&input), 8000.);
    }

    #[rstest]
    fn should_use_explicit_unbilled_unmetered_value(input: NormalizedInput) {
        let input = NormalizedInput {
            unbilled_consumption_unmetered_choice: 0.,
            unbilled_consumption_unmetered_value: 1234.,
            ..input
        };
        assert_eq!(unbilled_consumption_unmetered(&input), 1234.);
    }

    #[rstest]
    fn should_sum_billed_consumption(input: NormalizedInput) {
        let input = NormalizedInput {
            billing_consumption_unmetered: 5000.,
            ..input
        };
        assert_eq!(billed_consumption_total(&input), 705_000.);
    }

    #[rstest]
    #[case(0., 700_000. / 0.98 - 700_000.)]
    #[case(1., 700_000. / 0.99 - 700_000.)]
    fn should_inflate_metered_consumption_by_registration_error(
        input: NormalizedInput,
        #[case] choice: f64,
        #[case] expected: f64,
    ) {
        let input = NormalizedInput {
            customer_meter_under_registration_choice: choice,
            ..input
        };
        assert_relative_eq!(
            customer_meter_under_registration(&input),
            expected,
            max_relative = 1e-9
        );
    }

    #[rstest]
    fn should_spread_registration_value_over_customer_accounts(input: NormalizedInput) {
        let input = NormalizedInput {
            customer_meter_under_registration_choice: 2.,
            customer_meter_under_registration_value: 4000.,
            ..input
        };
        // 4000 / 1000 accounts * 0.5 = 2%
        assert_relative_eq!(
            customer_meter_under_registration(&input),
            700_000. / 0.98 - 700_000.,
            max_relative = 1e-9
        );
    }

    #[rstest]
    fn missing_registration_value_should_propagate_nan(input: NormalizedInput) {
        let input = NormalizedInput {
            customer_meter_under_registration_value: f64::NAN,
            ..input
        };
        assert!(customer_meter_under_registration(&input).is_nan());
    }

    #[rstest]
    #[case(0., 2.)]
    #[case(3., 2.)]
    #[case(4., 3.)]
    #[case(10., 9.)]
    #[case(10.5, 10.)]
    #[case(25., 10.)]
    fn should_band_meter_age(#[case] age: f64, #[case] expected: f64) {
        assert_eq!(percentage_of_customer_meter_under_registration(age), expected);
    }

    #[rstest]
    #[case(0., 2500.)]
    #[case(1., 21_000.)]
    #[case(2., 49_000.)]
    #[case(9., 49_000.)]
    fn should_estimate_unauthorized_consumption(
        input: NormalizedInput,
        #[case] choice: f64,
        #[case] expected: f64,
    ) {
        let input = NormalizedInput {
            illegal_connections_choice: choice,
            ..input
        };
        assert_eq!(unauthorized_consumption(&input, 700_000.), expected);
    }

    #[rstest]
    #[case(0., 1005.)]
    #[case(1., 1030.)]
    #[case(2., 1075.)]
    fn should_include_illegal_service_connections(
        input: NormalizedInput,
        #[case] choice: f64,
        #[case] expected: f64,
    ) {
        let input = NormalizedInput {
            illegal_connections_choice: choice,
            ..input
        };
        assert_relative_eq!(
            total_number_of_service_connections(&input),
            expected,
            max_relative = 1e-12
        );
    }

    #[rstest]
    fn pressure_should_follow_ladder_or_explicit_value(input: NormalizedInput) {
        assert_eq!(pressure(&input).unwrap(), 30.);

        let custom = NormalizedInput {
            pressure_choice: 4.,
            pressure_value: 37.,
            ..input.clone()
        };
        assert_eq!(pressure(&custom).unwrap(), 37.);

        let negative = NormalizedInput {
            pressure_choice: -1.,
            ..input
        };
        assert_eq!(pressure(&negative).unwrap_err().field(), "pressureChoice");
    }

    #[rstest]
    fn supply_time_should_follow_table_or_explicit_value(input: NormalizedInput) {
        assert_eq!(supply_time(&input).unwrap(), 24.);

        let custom = NormalizedInput {
            supply_time_choice: 6.,
            supply_time_value: 11.,
            ..input.clone()
        };
        assert_eq!(supply_time(&custom).unwrap(), 11.);

        let out_of_range = NormalizedInput {
            supply_time_choice: 7.,
            ..input
        };
        assert!(supply_time(&out_of_range).is_err());
    }

    #[rstest]
    fn should_calculate_mapl_from_network_size(input: NormalizedInput) {
        // (18 * 50 + 0.8 * 1005) * 30 / 24 * 24 / 1000
        assert_relative_eq!(mapl(&input, 1005., 30., 24.), 51.12, max_relative = 1e-12);
    }

    #[rstest]
    fn should_calculate_whole_balance(input: NormalizedInput) {
        let balance = WaterBalance::calculate(&input).unwrap();

        assert_eq!(balance.unbilled_consumption_unmetered, 8000.);
        assert_eq!(balance.billed_consumption_total, 700_000.);
        assert_eq!(balance.unauthorized_consumption, 2500.);
        assert_relative_eq!(
            balance.total_number_of_service_connections,
            1005.,
            max_relative = 1e-12
        );
        assert_eq!(
            balance.total_authorized_consumption,
            balance.billed_consumption_total + balance.unbilled_consumption_total
        );
        assert_eq!(
            balance.nrw,
            balance.unbilled_consumption_total
                + (balance.commercial_losses_total + balance.physical_losses)
        );
        assert_eq!(balance.ili, balance.capl / balance.mapl);
        assert_relative_eq!(
            balance.number_of_illegal_connections,
            5.,
            max_relative = 1e-9
        );
    }

    #[rstest]
    fn should_value_losses_over_a_year(input: NormalizedInput) {
        let input = NormalizedInput {
            average_tariff: 2.,
            variable_production_and_distribution_cost: 0.5,
            how_to_value_recovered_losses: 1.,
            annual_operating_cost: 1e9,
            ..input
        };
        assert_eq!(value_of_nrw(&input, 100., 10., 1000.), (50. + 20. + 1000.) * 365.);
        assert_eq!(value_of_commercial_losses(&input, 10.), 7300.);
        assert_eq!(cost_value_of_physical_losses(&input, 1000.), 365_000.);
        assert_eq!(
            value_of_nrw_in_percent_of_operating_costs(&input, 1e7),
            1.
        );
    }

    #[rstest]
    fn zero_customer_accounts_should_give_infinite_rate(input: NormalizedInput) {
        let input = NormalizedInput {
            number_of_customer_accounts: 0.,
            ..input
        };
        assert!(liters_per_customer_per_day_commercial_loss(&input, 100.).is_infinite());
    }
}
