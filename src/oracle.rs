//! # Oracle Blueprint
//! Registry of collateral prices. Each asset has a fixed feed set by the owner and a series of
//! observations that are averaged over a time window. A position reads the source matching the
//! `OracleType` it was spawned with.

use crate::shared_structs::*;
use scrypto::prelude::*;

#[blueprint]
#[types(ResourceAddress, PriceFeed, Decimal, u64)]
mod oracle {
    enable_method_auth! {
        methods {
            price => PUBLIC;
            get_twap_window => PUBLIC;
            set_price => restrict_to: [OWNER];
            push_observation => restrict_to: [OWNER];
            set_twap_window => restrict_to: [OWNER];
        }
    }

    struct OracleRegistry {
        /// KVS storing the price sources of every asset
        feeds: KeyValueStore<ResourceAddress, PriceFeed>,
        /// Number of epochs the time-weighted average looks back
        twap_window: u64,
    }

    impl OracleRegistry {
        pub fn instantiate(owner_role: OwnerRole) -> Global<OracleRegistry> {
            Self {
                feeds: OracleRegistryKeyValueStore::new_with_registered_type(),
                twap_window: DEFAULT_TWAP_WINDOW,
            }
            .instantiate()
            .prepare_to_globalize(owner_role)
            .globalize()
        }

        /// Current price of `asset` according to the source selected by `oracle_type`
        ///
        /// # Output
        /// - `None` if the source has no price for the asset
        pub fn price(&self, asset: ResourceAddress, oracle_type: OracleType) -> Option<Decimal> {
            let feed = self.feeds.get(&asset)?;

            match oracle_type {
                OracleType::FixedFeed => feed.fixed,
                OracleType::Twap => time_weighted_average(
                    &feed.observations,
                    Runtime::current_epoch().number(),
                    self.twap_window,
                ),
            }
        }

        pub fn get_twap_window(&self) -> u64 {
            self.twap_window
        }

        /// Sets the fixed price of an asset
        pub fn set_price(&mut self, asset: ResourceAddress, price: Decimal) {
            assert!(price >= Decimal::ZERO, "Price can't be negative.");

            let existing = self.feeds.get_mut(&asset).map(|mut feed| {
                feed.fixed = Some(price);
            });
            if existing.is_none() {
                self.feeds.insert(
                    asset,
                    PriceFeed {
                        fixed: Some(price),
                        observations: vec![],
                    },
                );
            }
        }

        /// Records a price observation at the current epoch
        ///
        /// # Logic
        /// - A second observation within the same epoch replaces the first
        /// - Observations that no longer affect the window are dropped, except the latest one
        pub fn push_observation(&mut self, asset: ResourceAddress, price: Decimal) {
            assert!(price >= Decimal::ZERO, "Price can't be negative.");

            let now = Runtime::current_epoch().number();
            let observation = PriceObservation { price, epoch: now };
            let window_start = now.saturating_sub(self.twap_window);

            let existing = self.feeds.get_mut(&asset).map(|mut feed| {
                match feed.observations.last_mut() {
                    Some(last) if last.epoch == now => *last = observation,
                    _ => feed.observations.push(observation),
                }
                prune_observations(&mut feed.observations, window_start);
            });
            if existing.is_none() {
                self.feeds.insert(
                    asset,
                    PriceFeed {
                        fixed: None,
                        observations: vec![observation],
                    },
                );
            }
        }

        pub fn set_twap_window(&mut self, window: u64) {
            assert!(window > 0, "Window must span at least one epoch.");
            self.twap_window = window;
        }
    }
}

pub const DEFAULT_TWAP_WINDOW: u64 = 12;

/// Price sources of a single asset
#[derive(ScryptoSbor, Clone, Debug)]
pub struct PriceFeed {
    pub fixed: Option<Decimal>,
    /// ordered by epoch, at most one per epoch
    pub observations: Vec<PriceObservation>,
}

#[derive(ScryptoSbor, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PriceObservation {
    pub price: Decimal,
    pub epoch: u64,
}

/// Average of the observed prices over `[now - window, now]`, each price weighted by the number of
/// epochs it was the latest observation.
///
/// If no time has passed inside the window, the latest observation is returned as is.
pub fn time_weighted_average(
    observations: &[PriceObservation],
    now: u64,
    window: u64,
) -> Option<Decimal> {
    let latest = observations.last()?;
    let window_start = now.saturating_sub(window);

    let mut weighted_sum = Decimal::ZERO;
    let mut total_epochs: u64 = 0;

    for (index, observation) in observations.iter().enumerate() {
        let until = observations
            .get(index + 1)
            .map(|next| next.epoch)
            .unwrap_or(now)
            .min(now);
        let from = observation.epoch.max(window_start);

        if until > from {
            weighted_sum += observation.price * Decimal::from(until - from);
            total_epochs += until - from;
        }
    }

    if total_epochs == 0 {
        return Some(latest.price);
    }

    Some(weighted_sum / Decimal::from(total_epochs))
}

/// Drops observations that ended before `window_start`.
fn prune_observations(observations: &mut Vec<PriceObservation>, window_start: u64) {
    let stale = observations
        .windows(2)
        .take_while(|pair| pair[1].epoch <= window_start)
        .count();
    observations.drain(..stale);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(price: Decimal, epoch: u64) -> PriceObservation {
        PriceObservation { price, epoch }
    }

    #[test]
    fn no_observations_no_price() {
        assert_eq!(time_weighted_average(&[], 10, 5), None);
    }

    #[test]
    fn fresh_observation_is_returned_as_is() {
        let observations = [observation(dec!(2), 10)];
        assert_eq!(time_weighted_average(&observations, 10, 5), Some(dec!(2)));
    }

    #[test]
    fn prices_are_weighted_by_duration() {
        // 1 for epochs 0..3, 4 for epochs 3..4
        let observations = [observation(dec!(1), 0), observation(dec!(4), 3)];
        assert_eq!(time_weighted_average(&observations, 4, 10), Some(dec!("1.75")));
    }

    #[test]
    fn window_cuts_off_old_prices() {
        // only epochs 6..10 count: 1 for 6..8, 3 for 8..10
        let observations = [observation(dec!(100), 0), observation(dec!(1), 5), observation(dec!(3), 8)];
        assert_eq!(time_weighted_average(&observations, 10, 4), Some(dec!(2)));
    }

    #[test]
    fn pruning_keeps_the_observation_active_at_window_start() {
        let mut observations = vec![
            observation(dec!(100), 0),
            observation(dec!(1), 5),
            observation(dec!(3), 8),
        ];
        prune_observations(&mut observations, 6);
        assert_eq!(observations, vec![observation(dec!(1), 5), observation(dec!(3), 8)]);

        prune_observations(&mut observations, 20);
        assert_eq!(observations, vec![observation(dec!(3), 8)]);
    }
}
