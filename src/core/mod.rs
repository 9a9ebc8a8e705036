pub mod selectors;
pub mod uncertainty;
pub mod units;
pub mod water_balance;
