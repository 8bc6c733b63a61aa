//! Ed25519 primitives for the Nocturne transaction core.
//!
//! Keccak-based hashing to scalars and curve points, CryptoNote key
//! derivation and key images, and the classic ring signature scheme.
//! Scalar and point arithmetic is curve25519-dalek throughout.

pub mod derivation;
mod fe;
pub mod ring;

pub use derivation::{
    derive_output_public_key, derive_public_key, derive_secret_key, generate_key_derivation,
    generate_key_image, generate_key_image_for_output, KeyDerivation,
};
pub use ring::{check_ring_signature, generate_ring_signature, RingSignature};

use curve25519_dalek::constants::ED25519_BASEPOINT_TABLE;
use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use nocturne_types::keys::KeyPair;
use nocturne_types::{Hash, PublicKey, SecretKey};
use thiserror::Error;
use tiny_keccak::{Hasher, Keccak};

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid curve point")]
    InvalidPoint,

    #[error("ring index {index} out of range for ring of {ring_len}")]
    BadRingIndex { index: usize, ring_len: usize },
}

/// Keccak-256 (the CryptoNote `cn_fast_hash`, NOT SHA3).
pub fn keccak256(data: &[u8]) -> Hash {
    let mut keccak = Keccak::v256();
    let mut output = [0u8; 32];
    keccak.update(data);
    keccak.finalize(&mut output);
    output
}

/// Hash to scalar: Keccak-256 over the concatenated chunks, reduced mod L.
pub fn hash_to_scalar(chunks: &[&[u8]]) -> Scalar {
    let mut keccak = Keccak::v256();
    for chunk in chunks {
        keccak.update(chunk);
    }
    let mut output = [0u8; 32];
    keccak.finalize(&mut output);
    Scalar::from_bytes_mod_order(output)
}

/// Hash to point: Keccak-256, Elligator-2 field map, cofactor clearing.
pub fn hash_to_point(data: &[u8; 32]) -> EdwardsPoint {
    let hash = keccak256(data);
    fe::map_to_curve(&hash).mul_by_cofactor()
}

/// Uniform random scalar from OS randomness.
pub fn random_scalar() -> Scalar {
    let mut bytes = [0u8; 64];
    getrandom::getrandom(&mut bytes).expect("os randomness unavailable");
    Scalar::from_bytes_mod_order_wide(&bytes)
}

/// Public point of a secret scalar.
pub fn secret_to_public(secret: &SecretKey) -> PublicKey {
    let scalar = Scalar::from_bytes_mod_order(*secret);
    (ED25519_BASEPOINT_TABLE * &scalar).compress().to_bytes()
}

/// Fresh random keypair.
pub fn random_keypair() -> KeyPair {
    let secret = random_scalar().to_bytes();
    KeyPair {
        public: secret_to_public(&secret),
        secret,
    }
}

/// Whether bytes decompress to a valid curve point.
pub fn check_key(key: &PublicKey) -> bool {
    decompress(key).is_ok()
}

pub(crate) fn decompress(bytes: &[u8; 32]) -> Result<EdwardsPoint, CryptoError> {
    CompressedEdwardsY(*bytes)
        .decompress()
        .ok_or(CryptoError::InvalidPoint)
}
