//! # Shared structs
//! Structs used by the VaultManager, OracleRegistry and CdpProxy blueprints, and by the pure
//! accounting modules.

use crate::errors::CdpError;
use scrypto::prelude::*;

/// Price source selected for a position at spawn time
#[derive(ScryptoSbor, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OracleType {
    /// Price set directly by the registry owner
    FixedFeed,
    /// Time-weighted average of the observations pushed to the registry
    Twap,
}

/// Key of a position: one position per collateral asset and owner badge
#[derive(ScryptoSbor, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PositionKey {
    pub asset: ResourceAddress,
    pub owner: NonFungibleLocalId,
}

impl PositionKey {
    pub fn new(asset: ResourceAddress, owner: NonFungibleLocalId) -> Self {
        Self { asset, owner }
    }
}

/// A collateralized debt position
#[derive(ScryptoSbor, Clone, Debug, PartialEq, Eq)]
pub struct Position {
    /// amount of main collateral locked
    pub main_collateral: Decimal,
    /// amount of COL (bonding collateral) locked
    pub col_token: Decimal,
    /// stable asset owed, including stability fee accrued up to `last_update_block`
    pub debt: Decimal,
    /// epoch at which the stability fee was last folded into `debt`
    pub last_update_block: u64,
    /// price source chosen at spawn
    pub oracle_type: OracleType,
    /// set once the position has been triggered for liquidation
    pub liquidation: Option<LiquidationAuction>,
    /// key of the position in its asset's position registry
    pub registry_id: u64,
}

impl Position {
    pub fn status(&self) -> PositionStatus {
        match self.liquidation {
            Some(_) => PositionStatus::Triggered,
            None => PositionStatus::Active,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.main_collateral.is_zero() && self.col_token.is_zero() && self.debt.is_zero()
    }
}

/// Liquidation snapshot taken when a position is triggered
#[derive(ScryptoSbor, Clone, Copy, Debug, PartialEq, Eq)]
pub struct LiquidationAuction {
    /// epoch of the trigger
    pub trigger_block: u64,
    /// value of the whole collateral stack at trigger time, after the liquidation discount
    pub starting_price: Decimal,
    /// key of the position in the auction book
    pub auction_id: u64,
}

/// Lifecycle of a position. `Closed` positions have no record.
#[derive(ScryptoSbor, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PositionStatus {
    Active,
    Triggered,
    Closed,
}

/// Risk parameters of a collateral asset
#[derive(ScryptoSbor, Clone, Debug, PartialEq, Eq)]
pub struct AssetParameters {
    /// annual stability fee, 3 decimals (1900 = 1.9%)
    pub stability_fee_percent: u64,
    /// penalty added to the debt on buyout, in percent of the debt
    pub liquidation_fee_percent: u64,
    /// collateral value / debt in percent required when opening or changing a position
    pub initial_collateral_ratio_percent: u64,
    /// collateral value / debt in percent below which a position can be triggered
    pub liquidation_ratio_percent: u64,
    /// discount applied to the collateral value to get the auction starting price
    pub liquidation_discount_percent: u64,
    /// epochs over which the auction price decays to zero
    pub devaluation_period_blocks: u64,
    /// maximum total debt minted against this asset
    pub debt_limit: Decimal,
    /// minimum share of COL in the position value (percent)
    pub min_col_percent: u64,
    /// maximum share of COL in the position value (percent), 0 disables COL for this asset
    pub max_col_percent: u64,
    /// price sources a position in this asset may use
    pub oracle_types: Vec<OracleType>,
}

impl AssetParameters {
    pub fn uses_col(&self) -> bool {
        self.max_col_percent > 0
    }

    pub fn allows(&self, oracle_type: OracleType) -> bool {
        self.oracle_types.contains(&oracle_type)
    }

    /// Rejects parameter sets the ledger can't operate with
    pub fn validate(&self) -> Result<(), CdpError> {
        let valid = self.liquidation_ratio_percent > 0
            && self.initial_collateral_ratio_percent >= self.liquidation_ratio_percent
            && self.min_col_percent <= self.max_col_percent
            && self.max_col_percent <= 100
            && self.liquidation_discount_percent < 100
            && self.devaluation_period_blocks > 0
            && self.debt_limit >= Decimal::ZERO
            && !self.oracle_types.is_empty();

        match valid {
            true => Ok(()),
            false => Err(CdpError::InvalidParameters),
        }
    }
}

/// Prices read from the oracle registry for a single valuation
#[derive(ScryptoSbor, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Valuation {
    pub main_price: Decimal,
    pub col_price: Decimal,
}

/// Collateral owed to a position owner after a buyout
#[derive(ScryptoSbor, Clone, Debug, PartialEq, Eq, Default)]
pub struct Leftover {
    pub main_collateral: Decimal,
    pub col_token: Decimal,
}

/// Data of the badge identifying a position owner
#[derive(ScryptoSbor, NonFungibleData)]
pub struct OwnerBadge {
    /// epoch the badge was issued in
    pub issued_at: u64,
}

/// Global protocol parameters
#[derive(ScryptoSbor, Clone, Debug)]
pub struct ProtocolParameters {
    /// epochs per year, used to annualize the stability fee
    pub blocks_per_year: u64,
}
