//! Wallet key material records.

use crate::address::Address;
use crate::{PublicKey, SecretKey};
use serde::{Deserialize, Serialize};

/// A secret scalar with its public point (`public = secret * G`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyPair {
    pub public: PublicKey,
    pub secret: SecretKey,
}

/// Everything needed to recognize and spend outputs owned by one address.
#[derive(Debug, Clone)]
pub struct AccountKeys {
    pub address: Address,
    pub spend_secret_key: SecretKey,
    pub view_secret_key: SecretKey,
}

/// Spend keypair of one sub-wallet, as held by the wallet container.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WalletRecord {
    pub spend_public_key: PublicKey,
    pub spend_secret_key: SecretKey,
}
