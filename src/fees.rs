//! # Stability fee and liquidation penalty
//!
//! Fee accrual is a recomputation from the number of epochs elapsed since the position was last
//! touched. Every call site goes through `accrue_debt`, so the truncation is identical everywhere.

use scrypto::prelude::*;

/// Fixed-point scale of `stability_fee_percent` (3 decimals) times the percent base.
pub const FEE_SCALE: u64 = 100_000;

/// Epochs per year with five-minute epochs.
pub const DEFAULT_BLOCKS_PER_YEAR: u64 = 105_120;

/// Debt including the stability fee accrued over `elapsed_blocks` epochs.
///
/// # Input
/// - `debt`: debt as of the last update
/// - `stability_fee_percent`: annual fee, 3 decimals (1900 = 1.9%)
/// - `elapsed_blocks`: epochs since the last update
/// - `blocks_per_year`: epochs per year used to annualize the fee
///
/// # Output
/// - `debt + debt * fee * elapsed / (100_000 * blocks_per_year)`, truncated
pub fn accrue_debt(
    debt: Decimal,
    stability_fee_percent: u64,
    elapsed_blocks: u64,
    blocks_per_year: u64,
) -> Decimal {
    if debt.is_zero() || elapsed_blocks == 0 || stability_fee_percent == 0 || blocks_per_year == 0 {
        return debt;
    }

    let fee = debt * Decimal::from(stability_fee_percent) * Decimal::from(elapsed_blocks)
        / (Decimal::from(FEE_SCALE) * Decimal::from(blocks_per_year));

    debt + fee
}

/// Liquidation penalty owed on top of `debt` at buyout.
pub fn liquidation_penalty(debt: Decimal, liquidation_fee_percent: u64) -> Decimal {
    debt * Decimal::from(liquidation_fee_percent) / dec!(100)
}

/// `debt` plus its liquidation penalty.
pub fn debt_with_penalty(debt: Decimal, liquidation_fee_percent: u64) -> Decimal {
    debt + liquidation_penalty(debt, liquidation_fee_percent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_time_no_fee() {
        assert_eq!(accrue_debt(dec!(70), 1900, 0, DEFAULT_BLOCKS_PER_YEAR), dec!(70));
    }

    #[test]
    fn zero_debt_stays_zero() {
        assert_eq!(
            accrue_debt(Decimal::ZERO, 1900, 5_000, DEFAULT_BLOCKS_PER_YEAR),
            Decimal::ZERO
        );
    }

    #[test]
    fn full_year_charges_the_annual_rate() {
        // 1.9% of 1000
        assert_eq!(
            accrue_debt(dec!(1000), 1900, DEFAULT_BLOCKS_PER_YEAR, DEFAULT_BLOCKS_PER_YEAR),
            dec!(1019)
        );
    }

    #[test]
    fn fee_is_linear_in_elapsed_epochs() {
        let one = accrue_debt(dec!(1000), 2000, 10, 100) - dec!(1000);
        let two = accrue_debt(dec!(1000), 2000, 20, 100) - dec!(1000);
        assert_eq!(one, dec!(2));
        assert_eq!(two, dec!(4));
    }

    #[test]
    fn penalty_is_a_percent_of_debt() {
        assert_eq!(liquidation_penalty(dec!(70), 10), dec!(7));
        assert_eq!(debt_with_penalty(dec!(70), 10), dec!(77));
        assert_eq!(debt_with_penalty(dec!(70), 0), dec!(70));
    }
}
