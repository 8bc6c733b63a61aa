//! Network currency rules.
//!
//! The subset of consensus parameters the transaction core consults: fee
//! floor, dust classification, spend-time locks, address encoding, and the
//! canonical denomination split used for change outputs.

use crate::address::{Address, AddressError};
use crate::{Amount, Height, Timestamp};
use serde::{Deserialize, Serialize};

/// Atomic units per coin.
pub const COIN: Amount = 100_000_000;

/// Fee floor for any transfer.
pub const MINIMUM_FEE: Amount = 1_000_000;

/// Fee quantum. Change residues below it are absorbed into the fee.
pub const DEFAULT_DUST_THRESHOLD: Amount = 1_000_000;

/// unlock_time values below this are block heights, above are timestamps.
pub const UNLOCK_TIME_THRESHOLD: u64 = 500_000_000;

/// Target seconds between blocks.
pub const DIFFICULTY_TARGET: u64 = 120;

/// Blocks of slack when judging height-based unlocks.
pub const LOCKED_TX_ALLOWED_DELTA_BLOCKS: u64 = 1;

/// Seconds of slack when judging time-based unlocks.
pub const LOCKED_TX_ALLOWED_DELTA_SECONDS: u64 = DIFFICULTY_TARGET * LOCKED_TX_ALLOWED_DELTA_BLOCKS;

/// Transaction version emitted by the builder.
pub const CURRENT_TRANSACTION_VERSION: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
    Mainnet,
    Testnet,
    Stagenet,
}

/// Base58 address prefix tag for a network.
pub fn address_prefix(network: Network) -> u64 {
    match network {
        Network::Mainnet => 0x1cad9,
        Network::Testnet => 0x1dad9,
        Network::Stagenet => 0x1ead9,
    }
}

/// Chain parameters as seen by the wallet core.
///
/// Fields are public so tests can tailor fee and dust constants.
#[derive(Debug, Clone)]
pub struct Currency {
    pub network: Network,
    pub current_transaction_version: u64,
    pub minimum_fee: Amount,
    pub default_dust_threshold: Amount,
    pub address_prefix_tag: u64,
}

impl Currency {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            current_transaction_version: CURRENT_TRANSACTION_VERSION,
            minimum_fee: MINIMUM_FEE,
            default_dust_threshold: DEFAULT_DUST_THRESHOLD,
            address_prefix_tag: address_prefix(network),
        }
    }

    /// Whether an amount is dust: anything that is not a canonical
    /// denomination `d * 10^k` with `d` in 1..=9.
    pub fn is_dust(amount: Amount) -> bool {
        if amount == 0 {
            return true;
        }
        let mut rest = amount;
        while rest % 10 == 0 {
            rest /= 10;
        }
        rest > 9
    }

    /// Split an amount into canonical denominations, units upward.
    ///
    /// Every element satisfies `!is_dust`; the parts sum to the input.
    pub fn decompose_amount(mut amount: Amount) -> Vec<Amount> {
        let mut parts = Vec::new();
        let mut digit_amount: Amount = 1;
        while amount > 0 {
            let digit = amount % 10;
            if digit != 0 {
                parts.push(digit * digit_amount);
            }
            amount /= 10;
            digit_amount = digit_amount.saturating_mul(10);
        }
        parts
    }

    /// Whether an output with the given unlock_time is spendable at the
    /// given chain tip.
    pub fn is_transaction_spend_time_unlocked(
        &self,
        unlock_time: u64,
        block_height: Height,
        block_time: Timestamp,
    ) -> bool {
        if unlock_time < UNLOCK_TIME_THRESHOLD {
            block_height + LOCKED_TX_ALLOWED_DELTA_BLOCKS >= unlock_time
        } else {
            block_time + LOCKED_TX_ALLOWED_DELTA_SECONDS >= unlock_time
        }
    }

    pub fn parse_account_address_string(&self, address: &str) -> Result<Address, AddressError> {
        Address::parse(address, self.address_prefix_tag)
    }

    pub fn account_address_as_string(&self, address: &Address) -> String {
        address.to_base58(self.address_prefix_tag)
    }
}
