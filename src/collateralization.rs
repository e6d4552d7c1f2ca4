//! # Collateralization checks
//!
//! Pure valuation of a position against oracle prices. The VaultManager runs `check` on the
//! state a position would have after an operation, before anything is committed.

use crate::errors::CdpError;
use crate::shared_structs::*;
use scrypto::prelude::*;

/// Ratio threshold a check is run against
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// opening or changing a position, stricter `initial_collateral_ratio_percent`
    Initial,
    /// deciding whether a position may be liquidated, `liquidation_ratio_percent`
    Liquidation,
}

/// Value of the main collateral and the COL stack of a position
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Backing {
    pub main_value: Decimal,
    pub col_value: Decimal,
}

impl Backing {
    pub fn of(position: &Position, valuation: &Valuation) -> Self {
        Self {
            main_value: valuation.main_price * position.main_collateral,
            col_value: valuation.col_price * position.col_token,
        }
    }

    pub fn total(&self) -> Decimal {
        self.main_value + self.col_value
    }
}

/// Checks a position's collateralization.
///
/// # Input
/// - `position`: the position state to check (usually the state after the pending operation)
/// - `params`: risk parameters of the position's asset
/// - `valuation`: oracle prices of the main collateral and COL
/// - `mode`: which ratio threshold to check against
///
/// # Output
/// - `Ok(())` if the position is adequately collateralized
/// - `UNDERCOLLATERALIZED` if `debt > totalValue * 100 / threshold`
/// - `INCORRECT_COLLATERALIZATION` if the COL share is out of bounds (Initial mode only)
pub fn check(
    position: &Position,
    params: &AssetParameters,
    valuation: &Valuation,
    mode: Mode,
) -> Result<(), CdpError> {
    let backing = Backing::of(position, valuation);

    let threshold = match mode {
        Mode::Initial => params.initial_collateral_ratio_percent,
        Mode::Liquidation => params.liquidation_ratio_percent,
    };
    if threshold == 0 {
        return Err(CdpError::InvalidParameters);
    }

    let max_debt = backing.total() * dec!(100) / Decimal::from(threshold);
    if position.debt > max_debt {
        return Err(CdpError::Undercollateralized);
    }

    if mode == Mode::Initial {
        check_col_share(position, params, &backing)?;
    }

    Ok(())
}

fn check_col_share(
    position: &Position,
    params: &AssetParameters,
    backing: &Backing,
) -> Result<(), CdpError> {
    if !params.uses_col() {
        return match position.col_token.is_zero() {
            true => Ok(()),
            false => Err(CdpError::IncorrectCollateralization),
        };
    }

    let total = backing.total();
    if position.debt.is_zero() || total.is_zero() {
        return Ok(());
    }

    let col_percent = backing.col_value * dec!(100) / total;
    if col_percent < Decimal::from(params.min_col_percent)
        || col_percent > Decimal::from(params.max_col_percent)
    {
        return Err(CdpError::IncorrectCollateralization);
    }

    Ok(())
}

/// Main collateral unit price at which the position becomes eligible for liquidation.
/// `None` for positions without main collateral or debt.
pub fn liquidation_price(
    position: &Position,
    params: &AssetParameters,
    valuation: &Valuation,
) -> Option<Decimal> {
    if position.main_collateral.is_zero() || position.debt.is_zero() {
        return None;
    }

    let required_value =
        position.debt * Decimal::from(params.liquidation_ratio_percent) / dec!(100);
    let col_value = valuation.col_price * position.col_token;
    if col_value >= required_value {
        return Some(Decimal::ZERO);
    }

    Some((required_value - col_value) / position.main_collateral)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(min_col: u64, max_col: u64) -> AssetParameters {
        AssetParameters {
            stability_fee_percent: 1900,
            liquidation_fee_percent: 10,
            initial_collateral_ratio_percent: 150,
            liquidation_ratio_percent: 120,
            liquidation_discount_percent: 10,
            devaluation_period_blocks: 3300,
            debt_limit: dec!(100000),
            min_col_percent: min_col,
            max_col_percent: max_col,
            oracle_types: vec![OracleType::FixedFeed],
        }
    }

    fn position(main: Decimal, col: Decimal, debt: Decimal) -> Position {
        Position {
            main_collateral: main,
            col_token: col,
            debt,
            last_update_block: 0,
            oracle_type: OracleType::FixedFeed,
            liquidation: None,
            registry_id: 0,
        }
    }

    fn prices(main: Decimal, col: Decimal) -> Valuation {
        Valuation {
            main_price: main,
            col_price: col,
        }
    }

    #[test]
    fn debt_at_the_initial_ratio_passes() {
        // 150 value / 150% = 100 max debt
        let result = check(
            &position(dec!(150), dec!(0), dec!(100)),
            &params(0, 0),
            &prices(dec!(1), dec!(0)),
            Mode::Initial,
        );
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn debt_above_the_initial_ratio_fails() {
        let result = check(
            &position(dec!(150), dec!(0), dec!("100.000000000000000001")),
            &params(0, 0),
            &prices(dec!(1), dec!(0)),
            Mode::Initial,
        );
        assert_eq!(result, Err(CdpError::Undercollateralized));
    }

    #[test]
    fn liquidation_mode_uses_the_looser_ratio() {
        let p = position(dec!(130), dec!(0), dec!(100));
        let valuation = prices(dec!(1), dec!(0));
        assert_eq!(
            check(&p, &params(0, 0), &valuation, Mode::Initial),
            Err(CdpError::Undercollateralized)
        );
        assert_eq!(check(&p, &params(0, 0), &valuation, Mode::Liquidation), Ok(()));
    }

    #[test]
    fn missing_col_on_col_asset_is_incorrect() {
        let result = check(
            &position(dec!(100), dec!(0), dec!(20)),
            &params(3, 10),
            &prices(dec!(1), dec!(1)),
            Mode::Initial,
        );
        assert_eq!(result, Err(CdpError::IncorrectCollateralization));
    }

    #[test]
    fn col_share_within_bounds_passes() {
        // col value 5 of 100 total
        let result = check(
            &position(dec!(95), dec!(5), dec!(20)),
            &params(3, 10),
            &prices(dec!(1), dec!(1)),
            Mode::Initial,
        );
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn withdrawing_all_main_collateral_is_undercollateralized() {
        // the COL left is out of bounds too, the missing backing is reported first
        let result = check(
            &position(dec!(0), dec!(5), dec!(20)),
            &params(3, 10),
            &prices(dec!(1), dec!(1)),
            Mode::Initial,
        );
        assert_eq!(result, Err(CdpError::Undercollateralized));
    }

    #[test]
    fn col_share_above_max_is_incorrect() {
        let result = check(
            &position(dec!(80), dec!(20), dec!(20)),
            &params(3, 10),
            &prices(dec!(1), dec!(1)),
            Mode::Initial,
        );
        assert_eq!(result, Err(CdpError::IncorrectCollateralization));
    }

    #[test]
    fn col_on_asset_without_col_is_incorrect() {
        let result = check(
            &position(dec!(100), dec!(1), dec!(0)),
            &params(0, 0),
            &prices(dec!(1), dec!(1)),
            Mode::Initial,
        );
        assert_eq!(result, Err(CdpError::IncorrectCollateralization));
    }

    #[test]
    fn col_bounds_are_ignored_without_debt() {
        let result = check(
            &position(dec!(100), dec!(0), dec!(0)),
            &params(3, 10),
            &prices(dec!(1), dec!(1)),
            Mode::Initial,
        );
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn col_bounds_are_ignored_in_liquidation_mode() {
        let result = check(
            &position(dec!(100), dec!(0), dec!(20)),
            &params(3, 10),
            &prices(dec!(1), dec!(1)),
            Mode::Liquidation,
        );
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn liquidation_price_matches_the_liquidation_threshold() {
        // 100 debt * 120% = 120 value needed from 60 main
        let p = position(dec!(60), dec!(0), dec!(100));
        let price = liquidation_price(&p, &params(0, 0), &prices(dec!(3), dec!(0)));
        assert_eq!(price, Some(dec!(2)));
        assert_eq!(
            check(&p, &params(0, 0), &prices(dec!(2), dec!(0)), Mode::Liquidation),
            Ok(())
        );
        assert_eq!(
            check(&p, &params(0, 0), &prices(dec!("1.99"), dec!(0)), Mode::Liquidation),
            Err(CdpError::Undercollateralized)
        );
    }

    #[test]
    fn no_liquidation_price_without_debt() {
        let p = position(dec!(60), dec!(0), dec!(0));
        assert_eq!(liquidation_price(&p, &params(0, 0), &prices(dec!(1), dec!(0))), None);
    }
}
