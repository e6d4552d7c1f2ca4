//! # CDP proxy component blueprint
//!
//! The proxy component is the public entry point of the protocol. It is used to:
//! - Issue owner badges. The local id of an owner badge identifies its holder as the owner of
//!   positions and as a liquidator.
//! - Ensure the VaultManager component is only interacted with by authorized callers: owner badge
//!   proofs are checked here, as they cannot be passed along to other components. The ID of the
//!   badge is then passed along instead.
//! - Ensure potential upgrades to the VaultManager component can be done without disrupting the
//!   rest of the system.
//!
//! The proxy holds the controller badge of the VaultManager component and authorizes every
//! forwarded call with it.

use crate::shared_structs::*;
use crate::vault_manager::vault_manager::*;
use scrypto::prelude::*;

#[blueprint]
mod proxy {
    enable_method_auth! {
        methods {
            open_account => PUBLIC;
            spawn => PUBLIC;
            join => PUBLIC;
            exit => PUBLIC;
            repay_all_and_withdraw => PUBLIC;
            retrieve_leftover_collateral => PUBLIC;
            trigger_liquidation => PUBLIC;
            buyout => PUBLIC;
            receive_badges => PUBLIC;
            get_owner_badge_address => PUBLIC;
            set_collateral => restrict_to: [OWNER];
            set_blocks_per_year => restrict_to: [OWNER];
            set_oracle => restrict_to: [OWNER];
            withdraw_penalties => restrict_to: [OWNER];
            send_badges => restrict_to: [OWNER];
        }
    }

    struct CdpProxy {
        /// The vault for the controller badge, used to authorize method calls to the VaultManager component
        badge_vault: FungibleVault,
        /// The global instance of the VaultManager component
        vault_manager: Global<VaultManager>,
        /// The resource manager for the owner badges
        owner_badge_manager: ResourceManager,
        /// Counter for the owner badges
        owner_badge_counter: u64,
    }

    impl CdpProxy {
        /// Instantiates the CdpProxy component
        ///
        /// # Input
        /// - `controller_badge`: The controller badge of the VaultManager component
        /// - `owner_role`: The owner role of the proxy
        /// - `vault_manager_address`: The address of the VaultManager component
        ///
        /// # Output
        /// - The global instance of the CdpProxy component
        ///
        /// # Logic
        /// - Assigns a component address
        /// - Creates the owner badge manager
        /// - Stores the controller badge
        pub fn instantiate(
            controller_badge: Bucket,
            owner_role: OwnerRole,
            vault_manager_address: ComponentAddress,
        ) -> Global<CdpProxy> {
            let (address_reservation, component_address) =
                Runtime::allocate_component_address(CdpProxy::blueprint_id());

            let controller_address: ResourceAddress = controller_badge.resource_address();

            let owner_badge_manager: ResourceManager =
                ResourceBuilder::new_integer_non_fungible::<OwnerBadge>(OwnerRole::Fixed(rule!(
                    require_amount(dec!("0.75"), controller_address)
                )))
                .metadata(metadata!(
                    init {
                        "name" => "CDP Owner Badge", locked;
                        "symbol" => "cdpOWN", locked;
                        "description" => "Identifies the owner of collateralized debt positions", updatable;
                    }
                ))
                .mint_roles(mint_roles!(
                    minter => rule!(require(global_caller(component_address))
                    || require_amount(
                        dec!("0.75"),
                        controller_address
                    ));
                    minter_updater => rule!(require_amount(
                        dec!("0.75"),
                        controller_address
                    ));
                ))
                .create_with_no_initial_supply()
                .into();

            Self {
                badge_vault: FungibleVault::with_bucket(controller_badge.as_fungible()),
                vault_manager: Global::from(vault_manager_address),
                owner_badge_manager,
                owner_badge_counter: 0,
            }
            .instantiate()
            .prepare_to_globalize(owner_role)
            .with_address(address_reservation)
            .globalize()
        }

        /// Mints a new owner badge
        pub fn open_account(&mut self) -> Bucket {
            self.owner_badge_counter += 1;

            self.owner_badge_manager.mint_non_fungible(
                &NonFungibleLocalId::integer(self.owner_badge_counter),
                OwnerBadge {
                    issued_at: Runtime::current_epoch().number(),
                },
            )
        }

        pub fn spawn(
            &mut self,
            owner_proof: NonFungibleProof,
            asset: ResourceAddress,
            main: Bucket,
            col: Option<Bucket>,
            debt: Decimal,
            oracle_type: OracleType,
        ) -> Bucket {
            let owner = self.owner_id(owner_proof);

            self.badge_vault.authorize_with_amount(dec!("0.75"), || {
                self.vault_manager
                    .spawn(asset, owner, main, col, debt, oracle_type)
            })
        }

        pub fn join(
            &mut self,
            owner_proof: NonFungibleProof,
            asset: ResourceAddress,
            main: Bucket,
            col: Option<Bucket>,
            debt: Decimal,
        ) -> Bucket {
            let owner = self.owner_id(owner_proof);

            self.badge_vault.authorize_with_amount(dec!("0.75"), || {
                self.vault_manager.join(asset, owner, main, col, debt)
            })
        }

        pub fn exit(
            &mut self,
            owner_proof: NonFungibleProof,
            asset: ResourceAddress,
            main: Decimal,
            col: Decimal,
            debt: Decimal,
            repayment: Bucket,
        ) -> (Bucket, Bucket, Bucket) {
            let owner = self.owner_id(owner_proof);

            self.badge_vault.authorize_with_amount(dec!("0.75"), || {
                self.vault_manager
                    .exit(asset, owner, main, col, debt, repayment)
            })
        }

        pub fn repay_all_and_withdraw(
            &mut self,
            owner_proof: NonFungibleProof,
            asset: ResourceAddress,
            payment: Bucket,
        ) -> (Bucket, Bucket, Bucket) {
            let owner = self.owner_id(owner_proof);

            self.badge_vault.authorize_with_amount(dec!("0.75"), || {
                self.vault_manager
                    .repay_all_and_withdraw(asset, owner, payment)
            })
        }

        pub fn retrieve_leftover_collateral(
            &mut self,
            owner_proof: NonFungibleProof,
            asset: ResourceAddress,
        ) -> (Bucket, Bucket) {
            let owner = self.owner_id(owner_proof);

            self.badge_vault.authorize_with_amount(dec!("0.75"), || {
                self.vault_manager.retrieve_leftover_collateral(asset, owner)
            })
        }

        /// Anyone can trigger an undercollateralized position
        pub fn trigger_liquidation(&mut self, asset: ResourceAddress, owner: NonFungibleLocalId) {
            self.badge_vault.authorize_with_amount(dec!("0.75"), || {
                self.vault_manager.trigger_liquidation(asset, owner)
            })
        }

        /// Buys a triggered position, the liquidator is identified by their owner badge
        pub fn buyout(
            &mut self,
            liquidator_proof: NonFungibleProof,
            asset: ResourceAddress,
            owner: NonFungibleLocalId,
            payment: Bucket,
        ) -> (Bucket, Bucket, Bucket) {
            let liquidator = self.owner_id(liquidator_proof);

            self.badge_vault.authorize_with_amount(dec!("0.75"), || {
                self.vault_manager.buyout(asset, owner, liquidator, payment)
            })
        }

        /// Receives controller badges
        pub fn receive_badges(&mut self, badge_bucket: Bucket) {
            self.badge_vault.put(badge_bucket.as_fungible());
        }

        pub fn get_owner_badge_address(&self) -> ResourceAddress {
            self.owner_badge_manager.address()
        }

        //==================================================================
        //                         ADMIN METHODS
        //==================================================================

        pub fn set_collateral(&mut self, asset: ResourceAddress, parameters: AssetParameters) {
            self.badge_vault.authorize_with_amount(dec!("0.75"), || {
                self.vault_manager.set_collateral(asset, parameters)
            })
        }

        pub fn set_blocks_per_year(&mut self, blocks_per_year: u64) {
            self.badge_vault.authorize_with_amount(dec!("0.75"), || {
                self.vault_manager.set_blocks_per_year(blocks_per_year)
            })
        }

        pub fn set_oracle(&mut self, oracle_address: ComponentAddress) {
            self.badge_vault.authorize_with_amount(dec!("0.75"), || {
                self.vault_manager.set_oracle(oracle_address)
            })
        }

        pub fn withdraw_penalties(&mut self, amount: Decimal) -> Bucket {
            self.badge_vault.authorize_with_amount(dec!("0.75"), || {
                self.vault_manager.withdraw_penalties(amount)
            })
        }

        /// Sends badges to another component
        pub fn send_badges(&mut self, amount: Decimal, receiver_address: ComponentAddress) {
            let receiver: Global<AnyComponent> = Global::from(receiver_address);
            let badge_bucket: Bucket = self.badge_vault.take(amount).into();
            receiver.call_raw("receive_badges", scrypto_args!(badge_bucket))
        }

        //==================================================================
        //                         HELPER METHODS
        //==================================================================

        /// Checks an owner badge proof and returns the badge's id
        fn owner_id(&self, owner_proof: NonFungibleProof) -> NonFungibleLocalId {
            let owner_proof = owner_proof.check_with_message(
                self.owner_badge_manager.address(),
                "Incorrect proof! Are you sure you hold an owner badge?",
            );
            let badge = owner_proof.non_fungible::<OwnerBadge>();
            badge.local_id().clone()
        }
    }
}
