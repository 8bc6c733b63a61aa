//! Account addresses.
//!
//! A Nocturne address is a (spend, view) public key pair rendered as a
//! CryptoNote base58 string carrying the network prefix tag and a
//! Keccak checksum.

use crate::base58::{self, Base58Error};
use crate::PublicKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const KEY_SIZE: usize = 32;

#[derive(Debug, Error)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,

    #[error("base58 decode error: {0}")]
    Base58(#[from] Base58Error),

    #[error("unexpected address prefix tag {0:#x}")]
    WrongPrefix(u64),

    #[error("address payload must be {expected} bytes, got {actual}")]
    WrongPayloadLength { expected: usize, actual: usize },
}

/// Public half of an account: where funds can be sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub spend_public_key: PublicKey,
    pub view_public_key: PublicKey,
}

impl Address {
    /// Parse a base58 address string, checking the expected prefix tag.
    pub fn parse(address: &str, prefix_tag: u64) -> Result<Self, AddressError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(AddressError::Empty);
        }
        let (tag, data) = base58::decode_address(address)?;
        if tag != prefix_tag {
            return Err(AddressError::WrongPrefix(tag));
        }
        if data.len() != KEY_SIZE * 2 {
            return Err(AddressError::WrongPayloadLength {
                expected: KEY_SIZE * 2,
                actual: data.len(),
            });
        }
        let mut spend_public_key = [0u8; KEY_SIZE];
        spend_public_key.copy_from_slice(&data[..KEY_SIZE]);
        let mut view_public_key = [0u8; KEY_SIZE];
        view_public_key.copy_from_slice(&data[KEY_SIZE..]);
        Ok(Self {
            spend_public_key,
            view_public_key,
        })
    }

    /// Render as a base58 string under the given prefix tag.
    pub fn to_base58(&self, prefix_tag: u64) -> String {
        let mut data = Vec::with_capacity(KEY_SIZE * 2);
        data.extend_from_slice(&self.spend_public_key);
        data.extend_from_slice(&self.view_public_key);
        base58::encode_address(prefix_tag, &data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAG: u64 = 0x1cad9;

    #[test]
    fn roundtrip() {
        let address = Address {
            spend_public_key: [0x11; 32],
            view_public_key: [0x22; 32],
        };
        let encoded = address.to_base58(TAG);
        let parsed = Address::parse(&encoded, TAG).unwrap();
        assert_eq!(parsed, address);
    }

    #[test]
    fn rejects_wrong_prefix() {
        let address = Address::default().to_base58(TAG);
        assert!(matches!(
            Address::parse(&address, TAG + 1),
            Err(AddressError::WrongPrefix(t)) if t == TAG
        ));
    }

    #[test]
    fn rejects_empty() {
        assert!(matches!(Address::parse("  ", TAG), Err(AddressError::Empty)));
    }

    #[test]
    fn rejects_truncated_payload() {
        let encoded = base58::encode_address(TAG, &[0xcc; 40]);
        assert!(matches!(
            Address::parse(&encoded, TAG),
            Err(AddressError::WrongPayloadLength { expected: 64, actual: 40 })
        ));
    }
}
