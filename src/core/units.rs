pub const LITRES_PER_CUBIC_METRE: u32 = 1_000;
pub const HOURS_PER_DAY: u32 = 24;
pub const DAYS_PER_YEAR: u32 = 365;
pub const PERCENT: f64 = 100.;

/// Two-sided z-factor for a 95% confidence interval, used for every STD <-> ERR conversion.
pub const Z_FACTOR_95: f64 = 1.96;

/// Supply hours below which the level of service counts as fully intermittent when
/// interpolating the explicit supply-time error.
pub(crate) const MINIMUM_TABULATED_SUPPLY_HOURS: f64 = 2.;

pub(crate) fn percent_to_fraction(percent: f64) -> f64 {
    percent / PERCENT
}

/// Converts a daily volume in m³ to a yearly one.
pub(crate) fn daily_to_annual(value_per_day: f64) -> f64 {
    value_per_day * DAYS_PER_YEAR as f64
}
