//! Typed transaction structures and RPC-boundary records.

use nocturne_crypto::ring::RingSignature;
use nocturne_types::{Amount, Height, KeyImage, PublicKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A consumed output: ring references plus the linking key image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInput {
    pub amount: Amount,
    /// Ring member global indexes in relative form: first absolute, rest
    /// deltas over the previous entry.
    pub output_indexes: Vec<u64>,
    pub key_image: KeyImage,
}

/// Transaction input (tagged on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxInput {
    /// Coinbase input. The wallet core never emits these.
    Gen { height: Height },
    /// Key input spending a previous output.
    Key(KeyInput),
}

impl TxInput {
    pub fn amount(&self) -> Amount {
        match self {
            TxInput::Gen { .. } => 0,
            TxInput::Key(input) => input.amount,
        }
    }
}

/// Transaction output. Only stealth key outputs exist on this chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxOutput {
    Key { amount: Amount, key: PublicKey },
}

impl TxOutput {
    pub fn amount(&self) -> Amount {
        match self {
            TxOutput::Key { amount, .. } => *amount,
        }
    }

    pub fn key(&self) -> &PublicKey {
        match self {
            TxOutput::Key { key, .. } => key,
        }
    }
}

/// Unsigned portion of a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPrefix {
    pub version: u64,
    pub unlock_time: u64,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    /// Tagged blob, see [`crate::extra`].
    pub extra: Vec<u8>,
}

/// A full transaction: prefix plus one ring-signature vector per input.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub prefix: TransactionPrefix,
    pub signatures: Vec<Vec<RingSignature>>,
}

/// One on-chain output as seen by the wallet and by the random-outputs RPC.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnspentOutput {
    pub amount: Amount,
    /// Chain-wide ordinal among outputs of the same amount.
    pub global_index: u64,
    pub transaction_public_key: PublicKey,
    pub index_in_transaction: u32,
    /// The output's stealth key.
    pub public_key: PublicKey,
    /// Precomputed by the wallet during sync.
    pub key_image: KeyImage,
    pub height: Height,
    pub unlock_time: u64,
    /// Owning sub-wallet address (base58).
    pub address: String,
    pub dust: bool,
}

/// Node response to a random-outputs request: a decoy pool per amount.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RandomOutputsResponse {
    pub outputs: BTreeMap<Amount, Vec<UnspentOutput>>,
}
