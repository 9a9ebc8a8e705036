//! Propagation of measurement uncertainty through the water balance.
//!
//! Each uncertain quantity carries a relative error (ERR, a fraction at 95% confidence), a
//! standard deviation (STD) and a variance (VAR). Sums and differences of quantities combine
//! by adding variances; ratios and products combine by adding squared relative errors. The
//! choice between the two is fixed per metric by the IWA audit methodology and is not uniform:
//! several ratio-type indicators mix both rules, and `nrw` normalizes its error by water
//! losses rather than by its own value.

use crate::core::selectors::{SelectorOutOfRangeError, SupplyTimeChoice, SystemInputVolumeAccuracy};
use crate::core::units::{percent_to_fraction, HOURS_PER_DAY, MINIMUM_TABULATED_SUPPLY_HOURS};
use crate::core::water_balance::WaterBalance;
use crate::input::NormalizedInput;
use crate::statistics::{calc_std, calc_var, err_from_std, quadrature, sum_of_variances};
use tracing::debug;

const UNBILLED_UNMETERED_ERROR_PERCENT: f64 = 50.;
const CUSTOMER_METER_UNDER_REGISTRATION_ERROR_PERCENT: f64 = 30.;
const UNAUTHORIZED_CONSUMPTION_ERROR_PERCENT: f64 = 50.;
const ILLEGAL_CONNECTIONS_ERROR_PERCENT: f64 = 50.;
/// Error of the pressure estimate, applied to pressure-normalized indicators.
const PRESSURE_ERROR_PERCENT: f64 = 20.;
/// Error of an explicit supply time of zero hours per day.
const INTERMITTENT_SUPPLY_ERROR_INTERCEPT_PERCENT: f64 = 54.545454;
/// Error percentage spread linearly between the tabulated minimum supply hours and 24 h.
const INTERMITTENT_SUPPLY_ERROR_SPAN_PERCENT: f64 = 50.;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Uncertainty {
    pub err: f64,
    pub std: f64,
    pub var: f64,
}

impl Uncertainty {
    /// Uncertainty of a value known to within the relative error `err`.
    pub fn from_relative_error(value: f64, err: f64) -> Self {
        let std = calc_std(value, err);
        Self {
            err,
            std,
            var: calc_var(std),
        }
    }

    /// Uncertainty of a value whose variance has been accumulated from its components.
    pub fn from_variance(value: f64, var: f64) -> Self {
        let std = var.sqrt();
        Self {
            err: err_from_std(std, value),
            std,
            var,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UncertaintyBudget {
    pub system_input_volume: Uncertainty,
    pub unbilled_consumption_unmetered: Uncertainty,
    pub unbilled_consumption_total: Uncertainty,
    pub total_authorized_consumption: Uncertainty,
    pub customer_meter_under_registration: Uncertainty,
    pub unauthorized_consumption: Uncertainty,
    pub commercial_losses_total: Uncertainty,
    pub physical_losses: Uncertainty,
    pub water_losses: Uncertainty,
    pub nrw: Uncertainty,
    pub number_of_illegal_connections: Uncertainty,
    pub total_number_of_service_connections: Uncertainty,
    pub capl_err: f64,
    pub mapl_err: f64,
    pub ili_err: f64,
    pub liters_per_connection_per_day_err: f64,
    pub liters_per_connection_per_day_per_meter_pressure_err: f64,
    pub cubicmeter_per_kilometer_mains_per_hour_err: f64,
    pub commercial_losses_expressed_in_percent_of_authorized_consumption_err: f64,
    pub liters_per_connection_per_day_commercial_loss_err: f64,
    pub liters_per_customer_per_day_commercial_loss_err: f64,
    pub volume_of_non_revenue_water_err: f64,
    pub liters_per_connection_per_day_nrw_err: f64,
    pub value_of_nrw_err: f64,
    pub value_of_nrw_in_percent_of_operating_costs_err: f64,
    pub value_of_commercial_losses_err: f64,
    pub cost_value_of_physical_losses_err: f64,
}

impl UncertaintyBudget {
    pub fn calculate(
        input: &NormalizedInput,
        balance: &WaterBalance,
    ) -> Result<Self, SelectorOutOfRangeError> {
        let system_input_volume = system_input_volume(input)?;
        let supply_time_err = supply_time_err(input)?;

        let unbilled_consumption_unmetered = Uncertainty::from_relative_error(
            balance.unbilled_consumption_unmetered,
            percent_to_fraction(UNBILLED_UNMETERED_ERROR_PERCENT),
        );
        let unbilled_consumption_total =
            unbilled_consumption_total(&unbilled_consumption_unmetered, balance);
        let total_authorized_consumption = Uncertainty::from_variance(
            balance.total_authorized_consumption,
            unbilled_consumption_total.var,
        );

        let customer_meter_under_registration = Uncertainty::from_relative_error(
            balance.customer_meter_under_registration,
            percent_to_fraction(CUSTOMER_METER_UNDER_REGISTRATION_ERROR_PERCENT),
        );
        let unauthorized_consumption = Uncertainty::from_relative_error(
            balance.unauthorized_consumption,
            percent_to_fraction(UNAUTHORIZED_CONSUMPTION_ERROR_PERCENT),
        );
        let commercial_losses_total = Uncertainty::from_variance(
            balance.commercial_losses_total,
            sum_of_variances(&[
                customer_meter_under_registration.var,
                unauthorized_consumption.var,
            ]),
        );
        let physical_losses = Uncertainty::from_variance(
            balance.physical_losses,
            sum_of_variances(&[
                commercial_losses_total.var,
                system_input_volume.var,
                total_authorized_consumption.var,
            ]),
        );
        let water_losses = Uncertainty::from_variance(
            balance.water_losses,
            sum_of_variances(&[system_input_volume.var, total_authorized_consumption.var]),
        );
        let nrw = nrw(&system_input_volume, balance);

        let number_of_illegal_connections = Uncertainty::from_relative_error(
            balance.number_of_illegal_connections,
            percent_to_fraction(ILLEGAL_CONNECTIONS_ERROR_PERCENT),
        );
        let total_number_of_service_connections = Uncertainty::from_variance(
            balance.total_number_of_service_connections,
            number_of_illegal_connections.var,
        );
        let connections_err = total_number_of_service_connections.err;

        let capl_err = physical_losses.err;
        let mapl_err = quadrature(&[
            supply_time_err,
            percent_to_fraction(PRESSURE_ERROR_PERCENT),
            connections_err,
        ]);
        let liters_per_connection_per_day_err =
            quadrature(&[supply_time_err, capl_err, connections_err]);
        let volume_of_non_revenue_water_err = nrw.err;
        let value_of_nrw_err = nrw.err;

        let budget = Self {
            system_input_volume,
            unbilled_consumption_unmetered,
            unbilled_consumption_total,
            total_authorized_consumption,
            customer_meter_under_registration,
            unauthorized_consumption,
            commercial_losses_total,
            physical_losses,
            water_losses,
            nrw,
            number_of_illegal_connections,
            total_number_of_service_connections,
            capl_err,
            mapl_err,
            ili_err: quadrature(&[capl_err, mapl_err, connections_err]),
            liters_per_connection_per_day_err,
            liters_per_connection_per_day_per_meter_pressure_err: quadrature(&[
                liters_per_connection_per_day_err,
                percent_to_fraction(PRESSURE_ERROR_PERCENT),
            ]),
            cubicmeter_per_kilometer_mains_per_hour_err: quadrature(&[supply_time_err, capl_err]),
            commercial_losses_expressed_in_percent_of_authorized_consumption_err: err_from_std(
                sum_of_variances(&[total_authorized_consumption.var, commercial_losses_total.var])
                    .sqrt(),
                balance.commercial_losses_total,
            ),
            liters_per_connection_per_day_commercial_loss_err: quadrature(&[
                connections_err,
                commercial_losses_total.err,
            ]),
            liters_per_customer_per_day_commercial_loss_err: commercial_losses_total.err,
            volume_of_non_revenue_water_err,
            liters_per_connection_per_day_nrw_err: quadrature(&[
                volume_of_non_revenue_water_err,
                capl_err,
                connections_err,
            ]),
            value_of_nrw_err,
            value_of_nrw_in_percent_of_operating_costs_err: value_of_nrw_err,
            value_of_commercial_losses_err: commercial_losses_total.err,
            cost_value_of_physical_losses_err: physical_losses.err,
        };

        debug!(
            nrw_err = budget.nrw.err,
            ili_err = budget.ili_err,
            "propagated uncertainty"
        );

        Ok(budget)
    }
}

pub fn system_input_volume(input: &NormalizedInput) -> Result<Uncertainty, SelectorOutOfRangeError> {
    let accuracy = SystemInputVolumeAccuracy::try_from(input.system_input_volume_choice)?;
    Ok(Uncertainty::from_relative_error(
        input.system_input_volume,
        percent_to_fraction(accuracy.error_percent(input.system_input_volume_value)),
    ))
}

/// Unbilled consumption only inherits the uncertainty of its unmetered part; metered unbilled
/// consumption is taken as exact.
pub fn unbilled_consumption_total(
    unbilled_consumption_unmetered: &Uncertainty,
    balance: &WaterBalance,
) -> Uncertainty {
    let var = unbilled_consumption_unmetered.var;
    Uncertainty {
        err: err_from_std(var.sqrt(), balance.unbilled_consumption_total),
        std: unbilled_consumption_unmetered.std,
        var,
    }
}

/// Non-revenue water carries the system input volume variance, expressed relative to
/// water losses.
pub fn nrw(system_input_volume: &Uncertainty, balance: &WaterBalance) -> Uncertainty {
    let var = system_input_volume.var;
    let std = var.sqrt();
    Uncertainty {
        err: err_from_std(std, balance.water_losses),
        std,
        var,
    }
}

/// Relative error of an explicit supply time, in percent, falling linearly with the hours of
/// supply per day.
pub fn intermittent_supply_error_percent(supply_hours_per_day: f64) -> f64 {
    INTERMITTENT_SUPPLY_ERROR_INTERCEPT_PERCENT
        - INTERMITTENT_SUPPLY_ERROR_SPAN_PERCENT
            / (HOURS_PER_DAY as f64 - MINIMUM_TABULATED_SUPPLY_HOURS)
            * supply_hours_per_day
}

/// Relative error contributed by the level of supply, as a fraction.
pub fn supply_time_err(input: &NormalizedInput) -> Result<f64, SelectorOutOfRangeError> {
    let choice = SupplyTimeChoice::try_from(input.supply_time_choice)?;
    Ok(percent_to_fraction(choice.error_percent(
        intermittent_supply_error_percent(input.supply_time_value),
    )))
}
