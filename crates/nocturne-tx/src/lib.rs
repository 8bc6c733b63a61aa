//! Nocturne transaction construction core.
//!
//! The two-part engine behind a transfer: the [`UnspentSelector`] decides
//! which unspent outputs to consume (digit-decomposition coin selection
//! with fee iteration), and the [`TransactionBuilder`] assembles ring-mixed
//! inputs and stealth outputs into a deterministic ring-signed transaction.

pub mod builder;
pub mod estimate;
pub mod extra;
pub mod selector;
pub mod serialize;
pub mod types;

pub use builder::TransactionBuilder;
pub use selector::{OptimizationLevel, SelectionError, UnspentSelector};
pub use types::{
    KeyInput, RandomOutputsResponse, Transaction, TransactionPrefix, TxInput, TxOutput,
    UnspentOutput,
};

use nocturne_types::Amount;
use thiserror::Error;

/// Construction and validation errors of the transaction core.
///
/// The corrupted-state variants are fatal: the partially assembled
/// transaction must be discarded and no funds sent.
#[derive(Debug, Error)]
pub enum TxError {
    #[error("generating key image failed: {0}")]
    KeyImageDerivation(nocturne_crypto::CryptoError),

    #[error("generated key image does not match the unspent record")]
    KeyImageMismatch,

    #[error("mixin outputs with different amounts are not allowed (expected {expected}, got {got})")]
    MixAmountMismatch { expected: Amount, got: Amount },

    #[error("duplicate ring member at global index {0}")]
    DuplicateRingMember(u64),

    #[error("output keys detected as corrupted during output key derivation")]
    OutputKeyCorrupted,

    #[error("output keys detected as corrupted during ring signing")]
    RingSignatureCorrupted,

    #[error("not enough anonymity outputs for amount {0}")]
    NotEnoughRandomOutputs(Amount),

    #[error("could not parse address {0}")]
    InvalidAddress(String),

    #[error("no keys in wallet for address {0}")]
    UnknownSpendKey(String),
}
