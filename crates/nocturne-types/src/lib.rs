//! Core value types and chain parameters for the Nocturne wallet stack.
//!
//! Amounts, account addresses (CryptoNote base58), wallet key records, and
//! the currency rules the transaction-construction core consults.

pub mod address;
pub mod base58;
pub mod currency;
pub mod keys;

pub use address::{Address, AddressError};
pub use currency::{Currency, Network};
pub use keys::{AccountKeys, KeyPair, WalletRecord};

/// Amount in atomic units (10^8 per coin).
pub type Amount = u64;

/// Block height.
pub type Height = u64;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Compressed Ed25519 point.
pub type PublicKey = [u8; 32];

/// Ed25519 scalar.
pub type SecretKey = [u8; 32];

/// Key image of a spent output.
pub type KeyImage = [u8; 32];

/// Keccak-256 digest.
pub type Hash = [u8; 32];
