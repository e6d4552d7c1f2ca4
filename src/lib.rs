//! # CDP package
//!
//! This package contains the components of a collateralized debt position (CDP) protocol. Owners
//! lock collateral assets and mint a USD pegged stable asset (USDP) against them. Positions that
//! become undercollateralized are sold through a descending-price liquidation auction.
//!
//! The package consists of the following components:
//! - `vault_manager`: The main component, the ledger of all positions. It holds the collateral,
//!   mints and burns the stable asset and runs the liquidation auctions.
//! - `proxy`: Interacting with the VaultManager component goes through the proxy component. This is used to:
//!     - Issue owner badges, identifying position owners and liquidators.
//!     - Ensure that the VaultManager component is only interacted with by authorized callers.
//!     - Ensure potential upgrades to the VaultManager component can be done without disrupting the rest of the system.
//! - `oracle`: A registry of collateral prices, either set directly or averaged over time.
//!
//! The accounting itself is done by pure modules:
//! - `collateralization`: collateral valuation and ratio checks
//! - `fees`: stability fee accrual and liquidation penalties
//! - `auction`: the decaying auction price and the split of a bought out position
//!
//! More information on each component can be found in their respective modules.

pub mod auction;
pub mod collateralization;
pub mod errors;
pub mod events;
pub mod fees;
pub mod oracle;
pub mod proxy;
pub mod shared_structs;
pub mod vault_manager;
