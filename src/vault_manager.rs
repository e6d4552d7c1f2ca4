//! # The VaultManager Blueprint
//!
//! This module contains the VaultManager component, the ledger of collateralized debt positions.
//! A position locks a collateral asset (and, for some assets, COL tokens) and mints the stable
//! asset against it. There is at most one position per collateral asset and owner.
//!
//! A position must stay above the asset's initial collateral ratio after every change made by its
//! owner. The stability fee is folded into the debt whenever the position is touched.
//!
//! If the collateral value falls below the liquidation ratio, anyone can trigger the position. Its
//! collateral is then frozen and sold through a descending-price auction: the price starts at the
//! discounted collateral value and decays linearly to zero over the asset's devaluation period.
//! The first buyer pays the debt plus a penalty (or the whole price if that is lower) and receives
//! the matching share of the collateral. What's left belongs to the owner, who can retrieve it
//! later.
//!
//! The life cycle of a position, and the accompanying methods called on it:
//! - Open a position: `spawn`
//! - Add collateral and/or borrow more: `join`
//! - Withdraw collateral and/or repay: `exit`
//! - Repay everything and close, also possible while being liquidated: `repay_all_and_withdraw`
//! - Start the liquidation auction: `trigger_liquidation`
//! - Buy the collateral of a triggered position: `buyout`
//! - Retrieve what's left after a buyout: `retrieve_leftover_collateral`
//!
//! All methods changing state are restricted to holders of the controller badge, which are expected
//! to verify who the owner of a position is (see the CdpProxy blueprint).

use crate::auction::*;
use crate::collateralization::{self, Backing, Mode};
use crate::errors::*;
use crate::events::*;
use crate::fees::*;
use crate::oracle::oracle::*;
use crate::shared_structs::*;
use scrypto::prelude::*;
use scrypto_avltree::AvlTree;

#[blueprint]
#[types(
    ResourceAddress,
    Decimal,
    u64,
    NonFungibleLocalId,
    PositionKey,
    Position,
    CollateralInfo,
    Leftover,
    AssetParameters,
    AvlTree<u64, NonFungibleLocalId>
)]
#[events(
    EventSpawn,
    EventJoin,
    EventExit,
    EventDestroy,
    EventLiquidationTriggered,
    EventBuyout,
    EventSetCollateral
)]
mod vault_manager {
    enable_method_auth! {
        methods {
            spawn => restrict_to: [OWNER];
            join => restrict_to: [OWNER];
            exit => restrict_to: [OWNER];
            repay_all_and_withdraw => restrict_to: [OWNER];
            trigger_liquidation => restrict_to: [OWNER];
            buyout => restrict_to: [OWNER];
            retrieve_leftover_collateral => restrict_to: [OWNER];
            set_collateral => restrict_to: [OWNER];
            set_blocks_per_year => restrict_to: [OWNER];
            set_oracle => restrict_to: [OWNER];
            withdraw_penalties => restrict_to: [OWNER];
            mint_controller_badge => restrict_to: [OWNER];
            get_position => PUBLIC;
            get_position_status => PUBLIC;
            get_total_debt => PUBLIC;
            get_liquidation_price => PUBLIC;
            get_current_auction_price => PUBLIC;
            get_collateral_parameters => PUBLIC;
            get_asset_debt => PUBLIC;
            get_leftovers => PUBLIC;
            get_positions => PUBLIC;
            get_liquidating_positions => PUBLIC;
            get_circulating_stable => PUBLIC;
            get_bad_debt => PUBLIC;
            get_penalties => PUBLIC;
            get_stable_address => PUBLIC;
        }
    }

    struct VaultManager {
        /// KVS storing all open positions
        positions: KeyValueStore<PositionKey, Position>,
        /// KVS storing all accepted collaterals, their parameters and vaults
        collaterals: KeyValueStore<ResourceAddress, CollateralInfo>,
        /// KVS storing an AVL tree of open positions per collateral asset, by registry id
        position_registry: KeyValueStore<ResourceAddress, AvlTree<u64, NonFungibleLocalId>>,
        /// Counter for the registry ids
        position_counter: u64,
        /// KVS storing collateral owed to owners of bought out positions
        leftovers: KeyValueStore<PositionKey, Leftover>,
        /// AVL tree storing all triggered positions by auction id
        auctions: AvlTree<u64, PositionKey>,
        /// Counter for the auction ids
        auction_counter: u64,
        /// The COL token (bonding collateral)
        col_token: ResourceAddress,
        /// Vault holding the COL of all positions
        col_vault: Vault,
        /// Vault holding the COL owed to owners of bought out positions
        col_leftovers: Vault,
        /// The resource manager for the stable asset
        stable_manager: ResourceManager,
        /// The resource manager for the controller badge
        controller_badge_manager: ResourceManager,
        /// Liquidation penalties paid by buyers
        penalty_treasury: Vault,
        /// The circulating supply of the stable asset
        circulating_stable: Decimal,
        /// Debt written off because an auction closed below the position's debt
        bad_debt: Decimal,
        /// The price registry
        oracle: Global<OracleRegistry>,
        /// The protocol parameters
        parameters: ProtocolParameters,
    }

    impl VaultManager {
        /// Instantiates the VaultManager component
        ///
        /// # Input
        /// - `oracle_address`: The address of the OracleRegistry component
        /// - `col_token`: The resource used as bonding collateral
        ///
        /// # Output
        /// - The global instance of the VaultManager component
        /// - The controller badge for the VaultManager component
        ///
        /// # Logic
        /// - Assigns a component address
        /// - Creates the controller badge
        /// - Creates the stable asset manager
        /// - Creates the VaultManager component
        pub fn instantiate(
            oracle_address: ComponentAddress,
            col_token: ResourceAddress,
        ) -> (Global<VaultManager>, Bucket) {
            let (address_reservation, component_address) =
                Runtime::allocate_component_address(VaultManager::blueprint_id());

            let controller_role: Bucket = ResourceBuilder::new_fungible(OwnerRole::Fixed(rule!(
                require(global_caller(component_address))
            )))
            .divisibility(DIVISIBILITY_MAXIMUM)
            .metadata(metadata! (
                init {
                    "name" => "controller badge vault manager", locked;
                    "symbol" => "cdpCTRL", locked;
                }
            ))
            .mint_roles(mint_roles!(
                minter => rule!(require(global_caller(component_address)));
                minter_updater => rule!(deny_all);
            ))
            .mint_initial_supply(10)
            .into();

            let controller_badge_manager: ResourceManager = controller_role.resource_manager();

            let stable_manager: ResourceManager = ResourceBuilder::new_fungible(OwnerRole::Fixed(
                rule!(require(controller_role.resource_address())),
            ))
            .divisibility(DIVISIBILITY_MAXIMUM)
            .metadata(metadata! (
                init {
                    "name" => "USD Pegged", updatable;
                    "symbol" => "USDP", updatable;
                }
            ))
            .mint_roles(mint_roles!(
                minter => rule!(require(global_caller(component_address))
                || require_amount(
                    dec!("0.75"),
                    controller_role.resource_address()
                ));
                minter_updater => rule!(require_amount(
                    dec!("0.75"),
                    controller_role.resource_address()
                ));
            ))
            .burn_roles(burn_roles!(
                burner => rule!(require(global_caller(component_address))
                || require_amount(
                    dec!("0.75"),
                    controller_role.resource_address()
                ));
                burner_updater => rule!(require_amount(
                    dec!("0.75"),
                    controller_role.resource_address()
                ));
            ))
            .create_with_no_initial_supply()
            .into();

            let penalty_treasury: Vault = Vault::new(stable_manager.address());

            let vault_manager = Self {
                positions: VaultManagerKeyValueStore::new_with_registered_type(),
                collaterals: VaultManagerKeyValueStore::new_with_registered_type(),
                position_registry: VaultManagerKeyValueStore::new_with_registered_type(),
                position_counter: 0,
                leftovers: VaultManagerKeyValueStore::new_with_registered_type(),
                auctions: AvlTree::new(),
                auction_counter: 0,
                col_token,
                col_vault: Vault::new(col_token),
                col_leftovers: Vault::new(col_token),
                stable_manager,
                controller_badge_manager,
                penalty_treasury,
                circulating_stable: dec!(0),
                bad_debt: dec!(0),
                oracle: Global::from(oracle_address),
                parameters: ProtocolParameters {
                    blocks_per_year: DEFAULT_BLOCKS_PER_YEAR,
                },
            }
            .instantiate()
            .prepare_to_globalize(OwnerRole::Fixed(rule!(require_amount(
                dec!("0.75"),
                controller_role.resource_address()
            ))))
            .with_address(address_reservation)
            .globalize();

            (vault_manager, controller_role)
        }

        /// Opens a position, borrowing the stable asset against collateral
        ///
        /// # Input
        /// - `asset`: The collateral asset
        /// - `owner`: The owner of the position
        /// - `main`: The collateral to lock (may be empty)
        /// - `col`: The COL to lock
        /// - `debt`: The amount of the stable asset to mint
        /// - `oracle_type`: The price source the position will be valued with
        ///
        /// # Output
        /// - The minted stable asset
        ///
        /// # Logic
        /// - Check there's no position for this asset and owner yet
        /// - Check something is actually deposited or borrowed
        /// - Check the asset accepts the chosen oracle type
        /// - Check the buckets hold the right resources
        /// - Check collateralization against the initial ratio and the asset's debt limit
        /// - Store and register the position, emit the event
        /// - Deposit the collateral and mint the debt
        pub fn spawn(
            &mut self,
            asset: ResourceAddress,
            owner: NonFungibleLocalId,
            main: Bucket,
            col: Option<Bucket>,
            debt: Decimal,
            oracle_type: OracleType,
        ) -> Bucket {
            let operation = Operation::Spawn;
            let key = PositionKey::new(asset, owner.clone());
            let main_amount = main.amount();
            let col_amount = bucket_amount(&col);

            assert!(debt >= Decimal::ZERO, "Debt can't be negative.");
            ensure(
                self.positions.get(&key).is_none(),
                CdpError::SpawnedPosition,
                operation,
            );
            ensure(
                !(main_amount.is_zero() && col_amount.is_zero() && debt.is_zero()),
                CdpError::UselessTx,
                operation,
            );

            let parameters = self
                .asset_parameters(asset)
                .filter(|parameters| parameters.allows(oracle_type))
                .ok_or(CdpError::WrongOracleType)
                .or_abort(operation);

            self.check_deposit(asset, &main, &col, operation);

            let position = Position {
                main_collateral: main_amount,
                col_token: col_amount,
                debt,
                last_update_block: current_block(),
                oracle_type,
                liquidation: None,
                registry_id: self.position_counter,
            };

            self.check_collateralization(asset, &position, &parameters, Mode::Initial)
                .or_abort(operation);
            if debt > Decimal::ZERO {
                self.check_debt_limit(asset, &parameters, debt)
                    .or_abort(operation);
            }

            self.position_counter += 1;
            self.register_position(asset, position.registry_id, owner.clone());
            self.positions.insert(key, position);
            self.change_asset_debt(asset, debt);

            Runtime::emit_event(EventSpawn {
                asset,
                owner,
                main: main_amount,
                col: col_amount,
                debt,
                oracle_type,
            });

            self.put_collateral(asset, main, col);
            self.mint_stable(debt)
        }

        /// Adds collateral to a position and/or borrows more against it
        ///
        /// # Input
        /// - `asset`, `owner`: The position
        /// - `main`: Collateral to add (may be empty)
        /// - `col`: COL to add
        /// - `debt`: Additional stable asset to mint
        ///
        /// # Output
        /// - The minted stable asset
        ///
        /// # Logic
        /// - Check the position exists and isn't being liquidated
        /// - Fold the accrued stability fee into the debt, then add the deltas
        /// - Check the resulting position against the initial ratio and the debt limit
        /// - Store the position, emit the event, deposit and mint
        pub fn join(
            &mut self,
            asset: ResourceAddress,
            owner: NonFungibleLocalId,
            main: Bucket,
            col: Option<Bucket>,
            debt: Decimal,
        ) -> Bucket {
            let operation = Operation::Join;
            let key = PositionKey::new(asset, owner.clone());
            let mut position = self.active_position(&key, operation);
            let main_amount = main.amount();
            let col_amount = bucket_amount(&col);

            assert!(debt >= Decimal::ZERO, "Debt can't be negative.");
            ensure(
                !(main_amount.is_zero() && col_amount.is_zero() && debt.is_zero()),
                CdpError::UselessTx,
                operation,
            );
            self.check_deposit(asset, &main, &col, operation);

            let parameters = self.parameters_of(asset, operation);
            let fee = self.accrue(&mut position, &parameters);

            position.main_collateral += main_amount;
            position.col_token += col_amount;
            position.debt += debt;

            self.check_collateralization(asset, &position, &parameters, Mode::Initial)
                .or_abort(operation);
            if debt > Decimal::ZERO {
                self.check_debt_limit(asset, &parameters, fee + debt)
                    .or_abort(operation);
            }

            self.positions.insert(key, position);
            self.change_asset_debt(asset, fee + debt);

            Runtime::emit_event(EventJoin {
                asset,
                owner,
                main: main_amount,
                col: col_amount,
                debt,
            });

            self.put_collateral(asset, main, col);
            self.mint_stable(debt)
        }

        /// Withdraws collateral from a position and/or repays part of its debt
        ///
        /// # Input
        /// - `asset`, `owner`: The position
        /// - `main`: Collateral to withdraw
        /// - `col`: COL to withdraw
        /// - `debt`: Debt to repay
        /// - `repayment`: The stable asset to repay with, at least `debt`
        ///
        /// # Output
        /// - The withdrawn collateral
        /// - The withdrawn COL
        /// - The unused part of the repayment
        ///
        /// # Logic
        /// - Check the position exists and isn't being liquidated
        /// - Fold the accrued stability fee into the debt
        /// - Check the withdrawals and the repayment don't exceed the position
        /// - If the position is now empty, remove it, otherwise check it against the initial ratio
        /// - Burn the repaid debt and pay out the collateral
        pub fn exit(
            &mut self,
            asset: ResourceAddress,
            owner: NonFungibleLocalId,
            main: Decimal,
            col: Decimal,
            debt: Decimal,
            mut repayment: Bucket,
        ) -> (Bucket, Bucket, Bucket) {
            let operation = Operation::Exit;
            let key = PositionKey::new(asset, owner.clone());
            let mut position = self.active_position(&key, operation);

            assert!(
                main >= Decimal::ZERO && col >= Decimal::ZERO && debt >= Decimal::ZERO,
                "Amounts can't be negative."
            );
            ensure(
                !(main.is_zero() && col.is_zero() && debt.is_zero()),
                CdpError::UselessTx,
                operation,
            );

            let parameters = self.parameters_of(asset, operation);
            let fee = self.accrue(&mut position, &parameters);

            ensure(
                debt <= position.debt,
                CdpError::RepaymentExceedsDebt,
                operation,
            );
            ensure(
                main <= position.main_collateral && col <= position.col_token,
                CdpError::WithdrawalExceedsCollateral,
                operation,
            );
            self.check_payment(&repayment, debt, operation);

            position.main_collateral -= main;
            position.col_token -= col;
            position.debt -= debt;

            if position.is_empty() {
                self.positions.remove(&key);
                self.unregister_position(asset, position.registry_id);
                info!("Position of {:?} in {:?} closed", owner, asset);
                Runtime::emit_event(EventDestroy { asset, owner });
            } else {
                self.check_collateralization(asset, &position, &parameters, Mode::Initial)
                    .or_abort(operation);
                self.positions.insert(key, position);
                Runtime::emit_event(EventExit {
                    asset,
                    owner,
                    main,
                    col,
                    debt,
                });
            }
            self.change_asset_debt(asset, fee - debt);

            self.burn_stable(repayment.take(debt));
            let (main_bucket, col_bucket) = self.take_collateral(asset, main, col);

            (main_bucket, col_bucket, repayment)
        }

        /// Repays the full debt of a position and withdraws all of its collateral
        ///
        /// # Input
        /// - `asset`, `owner`: The position
        /// - `payment`: The stable asset to repay with
        ///
        /// # Output
        /// - The collateral
        /// - The COL
        /// - The unused part of the payment
        ///
        /// # Logic
        /// - For a triggered position, the debt frozen at trigger time is owed and the auction is
        ///   cancelled
        /// - Otherwise the accrued stability fee is folded in first
        pub fn repay_all_and_withdraw(
            &mut self,
            asset: ResourceAddress,
            owner: NonFungibleLocalId,
            mut payment: Bucket,
        ) -> (Bucket, Bucket, Bucket) {
            let operation = Operation::RepayAll;
            let key = PositionKey::new(asset, owner.clone());
            let mut position = self.existing_position(&key, operation);
            let parameters = self.parameters_of(asset, operation);

            let fee = match position.liquidation {
                Some(_) => Decimal::ZERO,
                None => self.accrue(&mut position, &parameters),
            };
            self.check_payment(&payment, position.debt, operation);

            if let Some(auction) = position.liquidation {
                self.auctions.remove(&auction.auction_id);
                info!("Auction {} cancelled by repayment", auction.auction_id);
            }
            self.positions.remove(&key);
            self.unregister_position(asset, position.registry_id);
            self.change_asset_debt(asset, fee - position.debt);

            info!("Position of {:?} in {:?} repaid", owner, asset);
            Runtime::emit_event(EventDestroy { asset, owner });

            self.burn_stable(payment.take(position.debt));
            let (main_bucket, col_bucket) =
                self.take_collateral(asset, position.main_collateral, position.col_token);

            (main_bucket, col_bucket, payment)
        }

        /// Starts the liquidation auction of an undercollateralized position
        ///
        /// # Input
        /// - `asset`, `owner`: The position
        ///
        /// # Output
        /// - None
        ///
        /// # Logic
        /// - Fold the accrued stability fee into the debt, no fee accrues afterwards
        /// - Check the position is below the liquidation ratio
        /// - Freeze the starting price: the collateral value minus the liquidation discount
        /// - Add the position to the auction book
        pub fn trigger_liquidation(&mut self, asset: ResourceAddress, owner: NonFungibleLocalId) {
            let operation = Operation::Trigger;
            let key = PositionKey::new(asset, owner.clone());
            let mut position = self.active_position(&key, operation);
            let parameters = self.parameters_of(asset, operation);

            let fee = self.accrue(&mut position, &parameters);
            let valuation = self.valuation(asset, &position).or_abort(operation);

            match collateralization::check(&position, &parameters, &valuation, Mode::Liquidation) {
                Ok(()) => abort(CdpError::SafePosition.during(operation)),
                Err(CdpError::Undercollateralized) => {}
                Err(error) => abort(error.during(operation)),
            }

            let trigger_block = position.last_update_block;
            let starting_price = starting_price(
                Backing::of(&position, &valuation).total(),
                parameters.liquidation_discount_percent,
            );
            let auction_id = self.auction_counter;
            self.auction_counter += 1;

            position.liquidation = Some(LiquidationAuction {
                trigger_block,
                starting_price,
                auction_id,
            });
            self.positions.insert(key.clone(), position);
            self.auctions.insert(auction_id, key);
            self.change_asset_debt(asset, fee);

            info!(
                "Position of {:?} in {:?} triggered at epoch {}, starting price {}",
                owner, asset, trigger_block, starting_price
            );
            Runtime::emit_event(EventLiquidationTriggered {
                asset,
                owner,
                starting_price,
                trigger_block,
            });
        }

        /// Buys the collateral of a triggered position at the current auction price
        ///
        /// # Input
        /// - `asset`, `owner`: The position
        /// - `liquidator`: The buyer
        /// - `payment`: The stable asset to pay with
        ///
        /// # Output
        /// - The bought collateral
        /// - The bought COL
        /// - The unused part of the payment
        ///
        /// # Logic
        /// - Calculate the current auction price and split the position (see `settle_buyout`)
        /// - Remove the position and its auction
        /// - Park the owner's share as leftovers
        /// - Burn the part of the payment settling the debt, keep the penalty, write off any shortfall
        pub fn buyout(
            &mut self,
            asset: ResourceAddress,
            owner: NonFungibleLocalId,
            liquidator: NonFungibleLocalId,
            mut payment: Bucket,
        ) -> (Bucket, Bucket, Bucket) {
            let operation = Operation::Buyout;
            let key = PositionKey::new(asset, owner.clone());
            let position = self.existing_position(&key, operation);
            let auction = position
                .liquidation
                .ok_or(CdpError::NotTriggered)
                .or_abort(operation);
            let parameters = self.parameters_of(asset, operation);

            let blocks_past = current_block().saturating_sub(auction.trigger_block);
            let current_price = auction_price(
                auction.starting_price,
                parameters.devaluation_period_blocks,
                blocks_past,
            );
            let split = settle_buyout(
                position.main_collateral,
                position.col_token,
                position.debt,
                parameters.liquidation_fee_percent,
                current_price,
            );

            self.check_payment(&payment, split.repayment, operation);

            self.positions.remove(&key);
            self.unregister_position(asset, position.registry_id);
            self.auctions.remove(&auction.auction_id);
            self.change_asset_debt(asset, -position.debt);
            self.bad_debt += split.bad_debt;

            if split.main_to_owner > Decimal::ZERO || split.col_to_owner > Decimal::ZERO {
                let mut leftover = self
                    .leftovers
                    .get(&key)
                    .map(|leftover| leftover.clone())
                    .unwrap_or_default();
                leftover.main_collateral += split.main_to_owner;
                leftover.col_token += split.col_to_owner;
                self.leftovers.insert(key, leftover);
            }

            info!(
                "Auction {} bought by {:?} at price {}, repayment {}",
                auction.auction_id, liquidator, current_price, split.repayment
            );
            if split.bad_debt > Decimal::ZERO {
                debug!("Bad debt of {} written off", split.bad_debt);
            }
            Runtime::emit_event(EventBuyout {
                asset,
                owner,
                buyer: liquidator,
            });

            self.burn_stable(payment.take(split.debt_burned));
            self.penalty_treasury.put(payment.take(split.penalty));

            let (main_bucket, col_bucket) =
                self.take_collateral(asset, split.main_to_liquidator, split.col_to_liquidator);
            let (main_leftover, col_leftover) =
                self.take_collateral(asset, split.main_to_owner, split.col_to_owner);
            self.collateral_mut(asset).leftovers.put(main_leftover);
            self.col_leftovers.put(col_leftover);

            (main_bucket, col_bucket, payment)
        }

        /// Retrieves the collateral left to an owner after buyouts of their position
        ///
        /// # Output
        /// - The leftover collateral
        /// - The leftover COL
        pub fn retrieve_leftover_collateral(
            &mut self,
            asset: ResourceAddress,
            owner: NonFungibleLocalId,
        ) -> (Bucket, Bucket) {
            let leftover = self
                .leftovers
                .remove(&PositionKey::new(asset, owner))
                .ok_or(CdpError::NoLeftovers)
                .or_abort(Operation::RetrieveLeftovers);

            let main_bucket = self
                .collateral_mut(asset)
                .leftovers
                .take(leftover.main_collateral);
            let col_bucket = self.col_leftovers.take(leftover.col_token);

            (main_bucket, col_bucket)
        }

        //==================================================================
        //                         ADMIN METHODS
        //==================================================================

        /// Accepts a new collateral asset or replaces the parameters of an accepted one
        pub fn set_collateral(&mut self, asset: ResourceAddress, parameters: AssetParameters) {
            parameters.validate().or_abort(Operation::SetCollateral);

            let updated = self
                .collaterals
                .get_mut(&asset)
                .map(|mut info| info.parameters = parameters.clone());

            if updated.is_none() {
                self.collaterals.insert(
                    asset,
                    CollateralInfo {
                        parameters: parameters.clone(),
                        vault: Vault::new(asset),
                        leftovers: Vault::new(asset),
                        total_debt: dec!(0),
                    },
                );
                self.position_registry.insert(asset, AvlTree::new());
            }

            info!("Collateral {:?} set: {:?}", asset, parameters);
            Runtime::emit_event(EventSetCollateral { asset, parameters });
        }

        /// Sets the number of epochs per year the stability fee is annualized over
        pub fn set_blocks_per_year(&mut self, blocks_per_year: u64) {
            assert!(blocks_per_year > 0, "A year must have at least one epoch.");
            self.parameters.blocks_per_year = blocks_per_year;
        }

        /// Sets the price registry
        pub fn set_oracle(&mut self, oracle_address: ComponentAddress) {
            self.oracle = Global::from(oracle_address);
        }

        /// Takes collected liquidation penalties out of the treasury
        pub fn withdraw_penalties(&mut self, amount: Decimal) -> Bucket {
            self.penalty_treasury.take(amount)
        }

        /// Mint a controller badge
        pub fn mint_controller_badge(&self, amount: Decimal) -> Bucket {
            self.controller_badge_manager.mint(amount)
        }

        //==================================================================
        //                         GETTER METHODS
        //==================================================================

        pub fn get_position(
            &self,
            asset: ResourceAddress,
            owner: NonFungibleLocalId,
        ) -> Option<Position> {
            self.positions
                .get(&PositionKey::new(asset, owner))
                .map(|position| position.clone())
        }

        pub fn get_position_status(
            &self,
            asset: ResourceAddress,
            owner: NonFungibleLocalId,
        ) -> PositionStatus {
            self.positions
                .get(&PositionKey::new(asset, owner))
                .map(|position| position.status())
                .unwrap_or(PositionStatus::Closed)
        }

        /// Debt of a position including the stability fee accrued up to now
        pub fn get_total_debt(&self, asset: ResourceAddress, owner: NonFungibleLocalId) -> Decimal {
            match self.get_position(asset, owner) {
                Some(position) => self.accrued_debt(asset, &position),
                None => dec!(0),
            }
        }

        /// Collateral price below which a position can be triggered
        pub fn get_liquidation_price(
            &self,
            asset: ResourceAddress,
            owner: NonFungibleLocalId,
        ) -> Option<Decimal> {
            let mut position = self.get_position(asset, owner)?;
            let parameters = self.asset_parameters(asset)?;
            position.debt = self.accrued_debt(asset, &position);

            let valuation = Valuation {
                main_price: dec!(0),
                col_price: self
                    .price_of(self.col_token, position.col_token, position.oracle_type)
                    .ok()?,
            };

            collateralization::liquidation_price(&position, &parameters, &valuation)
        }

        /// Price a buyout of a triggered position would cost right now
        pub fn get_current_auction_price(
            &self,
            asset: ResourceAddress,
            owner: NonFungibleLocalId,
        ) -> Option<Decimal> {
            let auction = self.get_position(asset, owner)?.liquidation?;
            let parameters = self.asset_parameters(asset)?;

            Some(auction_price(
                auction.starting_price,
                parameters.devaluation_period_blocks,
                current_block().saturating_sub(auction.trigger_block),
            ))
        }

        pub fn get_collateral_parameters(&self, asset: ResourceAddress) -> Option<AssetParameters> {
            self.asset_parameters(asset)
        }

        /// Total debt minted against an asset
        pub fn get_asset_debt(&self, asset: ResourceAddress) -> Decimal {
            self.collaterals
                .get(&asset)
                .map(|info| info.total_debt)
                .unwrap_or(dec!(0))
        }

        pub fn get_leftovers(&self, asset: ResourceAddress, owner: NonFungibleLocalId) -> Leftover {
            self.leftovers
                .get(&PositionKey::new(asset, owner))
                .map(|leftover| leftover.clone())
                .unwrap_or_default()
        }

        /// Open positions in an asset in the order they were spawned, starting at registry id `from`
        ///
        /// Triggered positions stay listed until they're bought out or repaid.
        pub fn get_positions(
            &self,
            asset: ResourceAddress,
            from: u64,
            limit: u64,
        ) -> Vec<(u64, PositionKey)> {
            let mut open: Vec<(u64, PositionKey)> = vec![];

            if let Some(registry) = self.position_registry.get(&asset) {
                for (registry_id, owner, _next_key) in registry.range(from..) {
                    if open.len() as u64 >= limit {
                        break;
                    }
                    open.push((registry_id.clone(), PositionKey::new(asset, owner.clone())));
                }
            }

            open
        }

        /// Triggered positions in auction order, starting at auction id `from`
        pub fn get_liquidating_positions(&self, from: u64, limit: u64) -> Vec<(u64, PositionKey)> {
            let mut triggered: Vec<(u64, PositionKey)> = vec![];

            for (auction_id, key, _next_key) in self.auctions.range(from..) {
                if triggered.len() as u64 >= limit {
                    break;
                }
                triggered.push((auction_id.clone(), key.clone()));
            }

            triggered
        }

        pub fn get_circulating_stable(&self) -> Decimal {
            self.circulating_stable
        }

        pub fn get_bad_debt(&self) -> Decimal {
            self.bad_debt
        }

        pub fn get_penalties(&self) -> Decimal {
            self.penalty_treasury.amount()
        }

        pub fn get_stable_address(&self) -> ResourceAddress {
            self.stable_manager.address()
        }

        //==================================================================
        //                         HELPER METHODS
        //==================================================================

        fn asset_parameters(&self, asset: ResourceAddress) -> Option<AssetParameters> {
            self.collaterals
                .get(&asset)
                .map(|info| info.parameters.clone())
        }

        fn parameters_of(&self, asset: ResourceAddress, operation: Operation) -> AssetParameters {
            self.asset_parameters(asset)
                .ok_or(CdpError::PositionDoesNotExist)
                .or_abort(operation)
        }

        fn existing_position(&self, key: &PositionKey, operation: Operation) -> Position {
            self.positions
                .get(key)
                .map(|position| position.clone())
                .ok_or(CdpError::PositionDoesNotExist)
                .or_abort(operation)
        }

        /// A position that exists and hasn't been triggered
        fn active_position(&self, key: &PositionKey, operation: Operation) -> Position {
            let position = self.existing_position(key, operation);
            ensure(
                position.liquidation.is_none(),
                CdpError::AlreadyLiquidating,
                operation,
            );
            position
        }

        /// Folds the accrued stability fee into the debt, returns the fee
        fn accrue(&self, position: &mut Position, parameters: &AssetParameters) -> Decimal {
            let now = current_block();
            let accrued = accrue_debt(
                position.debt,
                parameters.stability_fee_percent,
                now.saturating_sub(position.last_update_block),
                self.parameters.blocks_per_year,
            );
            let fee = accrued - position.debt;

            position.debt = accrued;
            position.last_update_block = now;

            fee
        }

        fn accrued_debt(&self, asset: ResourceAddress, position: &Position) -> Decimal {
            if position.liquidation.is_some() {
                return position.debt;
            }

            let stability_fee_percent = self
                .asset_parameters(asset)
                .map(|parameters| parameters.stability_fee_percent)
                .unwrap_or(0);

            accrue_debt(
                position.debt,
                stability_fee_percent,
                current_block().saturating_sub(position.last_update_block),
                self.parameters.blocks_per_year,
            )
        }

        fn price_of(
            &self,
            resource: ResourceAddress,
            amount: Decimal,
            oracle_type: OracleType,
        ) -> Result<Decimal, CdpError> {
            if amount.is_zero() {
                return Ok(dec!(0));
            }

            self.oracle
                .price(resource, oracle_type)
                .ok_or(CdpError::OraclePriceUnavailable)
        }

        fn valuation(&self, asset: ResourceAddress, position: &Position) -> Result<Valuation, CdpError> {
            Ok(Valuation {
                main_price: self.price_of(asset, position.main_collateral, position.oracle_type)?,
                col_price: self.price_of(self.col_token, position.col_token, position.oracle_type)?,
            })
        }

        fn check_collateralization(
            &self,
            asset: ResourceAddress,
            position: &Position,
            parameters: &AssetParameters,
            mode: Mode,
        ) -> Result<(), CdpError> {
            let valuation = self.valuation(asset, position)?;
            collateralization::check(position, parameters, &valuation, mode)
        }

        fn check_debt_limit(
            &self,
            asset: ResourceAddress,
            parameters: &AssetParameters,
            added_debt: Decimal,
        ) -> Result<(), CdpError> {
            match self.get_asset_debt(asset) + added_debt > parameters.debt_limit {
                true => Err(CdpError::AssetDebtLimit),
                false => Ok(()),
            }
        }

        /// Checks deposited buckets hold the position's asset and the COL token
        fn check_deposit(
            &self,
            asset: ResourceAddress,
            main: &Bucket,
            col: &Option<Bucket>,
            operation: Operation,
        ) {
            let col_matches = col
                .as_ref()
                .map(|col| col.resource_address() == self.col_token)
                .unwrap_or(true);

            ensure(
                main.resource_address() == asset && col_matches,
                CdpError::TransferFailure,
                operation,
            );
        }

        /// Checks a stable asset payment covers `amount`
        fn check_payment(&self, payment: &Bucket, amount: Decimal, operation: Operation) {
            ensure(
                payment.resource_address() == self.stable_manager.address()
                    && payment.amount() >= amount,
                CdpError::TransferFailure,
                operation,
            );
        }

        fn register_position(
            &mut self,
            asset: ResourceAddress,
            registry_id: u64,
            owner: NonFungibleLocalId,
        ) {
            match self.position_registry.get_mut(&asset) {
                Some(mut registry) => {
                    registry.insert(registry_id, owner);
                }
                None => panic!("Collateral {:?} is not accepted.", asset),
            }
        }

        fn unregister_position(&mut self, asset: ResourceAddress, registry_id: u64) {
            if let Some(mut registry) = self.position_registry.get_mut(&asset) {
                registry.remove(&registry_id);
            }
        }

        fn change_asset_debt(&mut self, asset: ResourceAddress, delta: Decimal) {
            self.collateral_mut(asset).total_debt += delta;
        }

        fn collateral_mut(&mut self, asset: ResourceAddress) -> KeyValueEntryRefMut<'_, CollateralInfo> {
            match self.collaterals.get_mut(&asset) {
                Some(info) => info,
                None => panic!("Collateral {:?} is not accepted.", asset),
            }
        }

        /// Put collateral in the correct vaults
        fn put_collateral(&mut self, asset: ResourceAddress, main: Bucket, col: Option<Bucket>) {
            self.collateral_mut(asset).vault.put(main);
            if let Some(col) = col {
                self.col_vault.put(col);
            }
        }

        /// Take collateral out of the correct vaults
        fn take_collateral(
            &mut self,
            asset: ResourceAddress,
            main: Decimal,
            col: Decimal,
        ) -> (Bucket, Bucket) {
            let main_bucket = self.collateral_mut(asset).vault.take(main);
            let col_bucket = self.col_vault.take(col);
            (main_bucket, col_bucket)
        }

        fn mint_stable(&mut self, amount: Decimal) -> Bucket {
            if amount.is_zero() {
                return Bucket::new(self.stable_manager.address());
            }
            self.circulating_stable += amount;
            self.stable_manager.mint(amount)
        }

        fn burn_stable(&mut self, bucket: Bucket) {
            if bucket.is_empty() {
                bucket.drop_empty();
                return;
            }
            self.circulating_stable -= bucket.amount();
            bucket.burn();
        }
    }
}

/// All info about a collateral asset accepted by the ledger
#[derive(ScryptoSbor)]
pub struct CollateralInfo {
    pub parameters: AssetParameters,
    /// collateral of all positions in this asset
    pub vault: Vault,
    /// collateral owed to owners of bought out positions
    pub leftovers: Vault,
    /// debt of all positions in this asset, fee accrued as of their last update
    pub total_debt: Decimal,
}

fn current_block() -> u64 {
    Runtime::current_epoch().number()
}

fn bucket_amount(bucket: &Option<Bucket>) -> Decimal {
    bucket
        .as_ref()
        .map(|bucket| bucket.amount())
        .unwrap_or(Decimal::ZERO)
}
