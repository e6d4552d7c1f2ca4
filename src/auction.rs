//! # Liquidation auction
//!
//! A triggered position is sold as a whole through a descending-price auction. The price starts at
//! the discounted value of the collateral stack frozen at trigger time and decays linearly to zero
//! over the asset's devaluation period. The oracle is never consulted after the trigger.

use crate::fees::debt_with_penalty;
use scrypto::prelude::*;

/// Auction starting price of a collateral stack worth `total_value`.
pub fn starting_price(total_value: Decimal, liquidation_discount_percent: u64) -> Decimal {
    let kept = 100u64.saturating_sub(liquidation_discount_percent);
    total_value * Decimal::from(kept) / dec!(100)
}

/// Current auction price, `blocks_past` epochs after the trigger.
///
/// # Input
/// - `starting_price`: price frozen at trigger time
/// - `devaluation_period_blocks`: epochs until the price reaches zero
/// - `blocks_past`: epochs elapsed since the trigger
///
/// # Output
/// - `starting_price * (period - blocks_past) / period`, or zero once the period has passed
pub fn auction_price(
    starting_price: Decimal,
    devaluation_period_blocks: u64,
    blocks_past: u64,
) -> Decimal {
    if blocks_past >= devaluation_period_blocks {
        return Decimal::ZERO;
    }

    starting_price * Decimal::from(devaluation_period_blocks - blocks_past)
        / Decimal::from(devaluation_period_blocks)
}

/// Outcome of a buyout: who pays what and where the collateral goes
#[derive(ScryptoSbor, Clone, Debug, PartialEq, Eq)]
pub struct BuyoutSplit {
    /// stable asset the liquidator pays
    pub repayment: Decimal,
    pub main_to_liquidator: Decimal,
    pub col_to_liquidator: Decimal,
    pub main_to_owner: Decimal,
    pub col_to_owner: Decimal,
    /// part of the repayment that settles the position's debt, burned
    pub debt_burned: Decimal,
    /// part of the repayment above the debt, kept by the protocol
    pub penalty: Decimal,
    /// debt left unsettled when the auction price fell below the debt
    pub bad_debt: Decimal,
}

/// Splits a triggered position between liquidator and owner at the current auction price.
///
/// # Input
/// - `main_collateral`, `col_token`, `debt`: the position, debt frozen at trigger
/// - `liquidation_fee_percent`: penalty on the debt
/// - `current_price`: output of `auction_price`
///
/// # Output
/// - the `BuyoutSplit`
///
/// # Logic
/// - if the price exceeds debt plus penalty, the liquidator pays debt plus penalty and gets the
///   matching share of the collateral; the owner keeps the rest
/// - otherwise the liquidator pays the price and gets everything
pub fn settle_buyout(
    main_collateral: Decimal,
    col_token: Decimal,
    debt: Decimal,
    liquidation_fee_percent: u64,
    current_price: Decimal,
) -> BuyoutSplit {
    let debt_with_penalty = debt_with_penalty(debt, liquidation_fee_percent);

    let (repayment, main_to_liquidator, col_to_liquidator) = if current_price > debt_with_penalty
    {
        (
            debt_with_penalty,
            main_collateral * debt_with_penalty / current_price,
            col_token * debt_with_penalty / current_price,
        )
    } else {
        (current_price, main_collateral, col_token)
    };

    let debt_burned = if repayment < debt { repayment } else { debt };

    BuyoutSplit {
        repayment,
        main_to_liquidator,
        col_to_liquidator,
        main_to_owner: main_collateral - main_to_liquidator,
        col_to_owner: col_token - col_to_liquidator,
        debt_burned,
        penalty: repayment - debt_burned,
        bad_debt: debt - debt_burned,
    }
}
