//! Typed views over the numeric "choice" selectors of the input record.
//!
//! Selectors travel through the input record as plain numbers. They are only turned into
//! one of the enums below at the point a formula needs them, so an out-of-range selector
//! surfaces as an error from the formula that dereferences it.
//!
//! Two kinds exist: ranged selectors (`TryFrom<f64>`) whose valid set is closed and
//! anything else is a [`SelectorOutOfRangeError`], and fall-through selectors (`From<f64>`)
//! where every value outside the listed ones takes the last branch.

use std::fmt::{Display, Formatter};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
#[error("{field} must be {valid} and not {value}")]
pub struct SelectorOutOfRangeError {
    field: &'static str,
    value: f64,
    valid: &'static str,
}

impl SelectorOutOfRangeError {
    pub(crate) fn new(field: &'static str, value: f64, valid: &'static str) -> Self {
        Self {
            field,
            value,
            valid,
        }
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

/// Reads a selector as an index into `0..=max`, rejecting fractions, NaN and anything outside.
fn selector_index(value: f64, max: u8) -> Option<u8> {
    if value.fract() == 0. && (0. ..=max as f64).contains(&value) {
        Some(value as u8)
    } else {
        None
    }
}

/// Accuracy band of the system input volume measurement (`systemInputVolumeChoice`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SystemInputVolumeAccuracy {
    OnePercent,
    FivePercent,
    FifteenPercent,
    /// The error percentage given in `systemInputVolumeValue`.
    Custom,
}

impl SystemInputVolumeAccuracy {
    /// The band's error in percent, `custom_percent` being used for [`Self::Custom`].
    pub fn error_percent(&self, custom_percent: f64) -> f64 {
        match self {
            Self::OnePercent => 1.,
            Self::FivePercent => 5.,
            Self::FifteenPercent => 15.,
            Self::Custom => custom_percent,
        }
    }
}

impl TryFrom<f64> for SystemInputVolumeAccuracy {
    type Error = SelectorOutOfRangeError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        match selector_index(value, 3) {
            Some(0) => Ok(Self::OnePercent),
            Some(1) => Ok(Self::FivePercent),
            Some(2) => Ok(Self::FifteenPercent),
            Some(3) => Ok(Self::Custom),
            _ => Err(SelectorOutOfRangeError::new(
                "systemInputVolumeChoice",
                value,
                "0, 1, 2 or 3",
            )),
        }
    }
}

/// How unmetered unbilled consumption is obtained (`unbilledConsumptionUnmeteredChoice`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UnbilledUnmeteredPolicy {
    /// Use `unbilledConsumptionUnmeteredValue` as given.
    Explicit,
    /// A fixed share of the system input volume.
    ShareOfSystemInputVolume,
}

impl From<f64> for UnbilledUnmeteredPolicy {
    fn from(value: f64) -> Self {
        if value == 0. {
            Self::Explicit
        } else {
            Self::ShareOfSystemInputVolume
        }
    }
}

/// Which registration error policy applies to customer meters
/// (`customerMeterUnderRegistrationChoice`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MeterUnderRegistrationPolicy {
    /// The value is the under-registration in percent.
    Percentage,
    /// Half of the value is the under-registration in percent.
    HalvedPercentage,
    /// The value is divided across customer accounts before being halved.
    PerCustomerAccount,
}

impl From<f64> for MeterUnderRegistrationPolicy {
    fn from(value: f64) -> Self {
        if value == 0. {
            Self::Percentage
        } else if value == 1. {
            Self::HalvedPercentage
        } else {
            Self::PerCustomerAccount
        }
    }
}

/// Prevalence of illegal connections (`illegalConnectionsChoice`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum IllegalConnectionsLevel {
    Low,
    Medium,
    High,
}

impl IllegalConnectionsLevel {
    /// Share of billed consumption (or of system input volume for [`Self::Low`]) lost to
    /// unauthorized use, in percent.
    pub fn unauthorized_consumption_percent(&self) -> f64 {
        match self {
            Self::Low => 0.25,
            Self::Medium => 3.,
            Self::High => 7.,
        }
    }

    /// Factor applied to the registered service connections to include illegal ones.
    pub fn service_connection_factor(&self) -> f64 {
        match self {
            Self::Low => 1.005,
            Self::Medium => 1.03,
            Self::High => 1.075,
        }
    }
}

impl From<f64> for IllegalConnectionsLevel {
    fn from(value: f64) -> Self {
        if value == 0. {
            Self::Low
        } else if value == 1. {
            Self::Medium
        } else {
            Self::High
        }
    }
}

/// Average hours of supply per day (`supplyTimeChoice`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SupplyTimeChoice {
    Continuous,
    TwoHours,
    FourAndAHalfHours,
    NineHours,
    FifteenHours,
    TwentyOneHours,
    /// Hours given in `supplyTimeValue`.
    Custom,
}

impl SupplyTimeChoice {
    pub fn hours_per_day(&self, custom_hours: f64) -> f64 {
        match self {
            Self::Continuous => 24.,
            Self::TwoHours => 2.,
            Self::FourAndAHalfHours => 4.5,
            Self::NineHours => 9.,
            Self::FifteenHours => 15.,
            Self::TwentyOneHours => 21.,
            Self::Custom => custom_hours,
        }
    }

    /// Error in percent contributed by intermittent supply, `custom_error_percent` being used
    /// for [`Self::Custom`].
    pub fn error_percent(&self, custom_error_percent: f64) -> f64 {
        match self {
            Self::Continuous => 0.,
            Self::TwoHours => 50.,
            Self::FourAndAHalfHours | Self::NineHours => 33.33,
            Self::FifteenHours => 20.,
            Self::TwentyOneHours => 14.3,
            Self::Custom => custom_error_percent,
        }
    }
}

impl TryFrom<f64> for SupplyTimeChoice {
    type Error = SelectorOutOfRangeError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        match selector_index(value, 6) {
            Some(0) => Ok(Self::Continuous),
            Some(1) => Ok(Self::TwoHours),
            Some(2) => Ok(Self::FourAndAHalfHours),
            Some(3) => Ok(Self::NineHours),
            Some(4) => Ok(Self::FifteenHours),
            Some(5) => Ok(Self::TwentyOneHours),
            Some(6) => Ok(Self::Custom),
            _ => Err(SelectorOutOfRangeError::new(
                "supplyTimeChoice",
                value,
                "0-6",
            )),
        }
    }
}

/// Average operating pressure (`pressureChoice`): a fixed ladder of 10, 20, 30 or 40 m, or an
/// explicit value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PressureChoice {
    Ladder(u8),
    /// Pressure given in `pressureValue`.
    Custom,
}

impl PressureChoice {
    pub fn metres(&self, custom_metres: f64) -> f64 {
        match self {
            Self::Ladder(step) => 10. + *step as f64 * 10.,
            Self::Custom => custom_metres,
        }
    }
}

impl TryFrom<f64> for PressureChoice {
    type Error = SelectorOutOfRangeError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        match selector_index(value, 4) {
            Some(4) => Ok(Self::Custom),
            Some(step) => Ok(Self::Ladder(step)),
            None => Err(SelectorOutOfRangeError::new("pressureChoice", value, "0-4")),
        }
    }
}

impl Display for PressureChoice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ladder(step) => write!(f, "{}", step),
            Self::Custom => write!(f, "custom"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    #[case(0., 10.)]
    #[case(1., 20.)]
    #[case(2., 30.)]
    #[case(3., 40.)]
    fn pressure_ladder_should_step_by_ten_metres(#[case] choice: f64, #[case] expected: f64) {
        assert_eq!(PressureChoice::try_from(choice).unwrap().metres(99.), expected);
    }

    #[rstest]
    fn custom_pressure_should_use_explicit_value() {
        assert_eq!(PressureChoice::try_from(4.).unwrap().metres(37.), 37.);
    }

    #[rstest]
    #[case(-1.)]
    #[case(5.)]
    #[case(1.5)]
    #[case(f64::NAN)]
    fn pressure_choice_outside_range_should_error(#[case] choice: f64) {
        let error = PressureChoice::try_from(choice).unwrap_err();
        assert_eq!(error.field(), "pressureChoice");
    }

    #[rstest]
    fn out_of_range_error_should_name_field_and_value() {
        let error = SupplyTimeChoice::try_from(7.).unwrap_err();
        assert_eq!(error.to_string(), "supplyTimeChoice must be 0-6 and not 7");
        assert_eq!(error.value(), 7.);
    }

    #[rstest]
    #[case(0., 24.)]
    #[case(1., 2.)]
    #[case(2., 4.5)]
    #[case(3., 9.)]
    #[case(4., 15.)]
    #[case(5., 21.)]
    #[case(6., 11.)]
    fn supply_time_table(#[case] choice: f64, #[case] expected_hours: f64) {
        assert_eq!(
            SupplyTimeChoice::try_from(choice)
                .unwrap()
                .hours_per_day(11.),
            expected_hours
        );
    }

    #[rstest]
    fn system_input_volume_bands() {
        let bands = [0., 1., 2., 3.].map(|choice| {
            SystemInputVolumeAccuracy::try_from(choice)
                .unwrap()
                .error_percent(8.)
        });
        assert_eq!(bands, [1., 5., 15., 8.]);
        assert!(SystemInputVolumeAccuracy::try_from(4.).is_err());
        assert!(SystemInputVolumeAccuracy::try_from(-1.).is_err());
    }

    #[rstest]
    fn fall_through_selectors_should_take_last_branch() {
        assert_eq!(IllegalConnectionsLevel::from(5.), IllegalConnectionsLevel::High);
        assert_eq!(IllegalConnectionsLevel::from(1.), IllegalConnectionsLevel::Medium);
        assert_eq!(
            MeterUnderRegistrationPolicy::from(-3.),
            MeterUnderRegistrationPolicy::PerCustomerAccount
        );
        assert_eq!(
            UnbilledUnmeteredPolicy::from(0.),
            UnbilledUnmeteredPolicy::Explicit
        );
        assert_eq!(
            UnbilledUnmeteredPolicy::from(2.),
            UnbilledUnmeteredPolicy::ShareOfSystemInputVolume
        );
    }
}
