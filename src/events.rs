use scrypto::prelude::*;
use crate::shared_structs::*;

#[derive(ScryptoSbor, ScryptoEvent, Clone)]
pub struct EventSpawn {
    pub asset: ResourceAddress,
    pub owner: NonFungibleLocalId,
    pub main: Decimal,
    pub col: Decimal,
    pub debt: Decimal,
    pub oracle_type: OracleType,
}

#[derive(ScryptoSbor, ScryptoEvent, Clone)]
pub struct EventJoin {
    pub asset: ResourceAddress,
    pub owner: NonFungibleLocalId,
    pub main: Decimal,
    pub col: Decimal,
    pub debt: Decimal,
}

#[derive(ScryptoSbor, ScryptoEvent, Clone)]
pub struct EventExit {
    pub asset: ResourceAddress,
    pub owner: NonFungibleLocalId,
    pub main: Decimal,
    pub col: Decimal,
    pub debt: Decimal,
}

#[derive(ScryptoSbor, ScryptoEvent, Clone)]
pub struct EventDestroy {
    pub asset: ResourceAddress,
    pub owner: NonFungibleLocalId,
}

#[derive(ScryptoSbor, ScryptoEvent, Clone)]
pub struct EventLiquidationTriggered {
    pub asset: ResourceAddress,
    pub owner: NonFungibleLocalId,
    pub starting_price: Decimal,
    pub trigger_block: u64,
}

#[derive(ScryptoSbor, ScryptoEvent, Clone)]
pub struct EventBuyout {
    pub asset: ResourceAddress,
    pub owner: NonFungibleLocalId,
    pub buyer: NonFungibleLocalId,
}

#[derive(ScryptoSbor, ScryptoEvent, Clone)]
pub struct EventSetCollateral {
    pub asset: ResourceAddress,
    pub parameters: AssetParameters,
}
