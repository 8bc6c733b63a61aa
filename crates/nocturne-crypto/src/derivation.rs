//! CryptoNote key derivation and key images.
//!
//! Both directions of the stealth-output scheme. A shared derivation
//! `D = 8 * s * P` feeds `Hs(D || varint(i))`, which offsets the
//! recipient's spend key per output; the matching ephemeral secret keys
//! the key image that links a spend on chain.

use crate::{decompress, hash_to_scalar, CryptoError};
use curve25519_dalek::constants::ED25519_BASEPOINT_TABLE;
use curve25519_dalek::scalar::Scalar;
use nocturne_types::address::Address;
use nocturne_types::keys::{AccountKeys, KeyPair};
use nocturne_types::{KeyImage, PublicKey, SecretKey};

/// Shared ECDH secret between a transaction key and a view key.
pub type KeyDerivation = [u8; 32];

fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// D = 8 * secret * P. Fails if `public` is not a valid point.
pub fn generate_key_derivation(
    public: &PublicKey,
    secret: &SecretKey,
) -> Result<KeyDerivation, CryptoError> {
    let point = decompress(public)?;
    let scalar = Scalar::from_bytes_mod_order(*secret);
    Ok((scalar * point).mul_by_cofactor().compress().to_bytes())
}

/// Hs(D || varint(output_index)).
fn derivation_to_scalar(derivation: &KeyDerivation, output_index: usize) -> Scalar {
    let mut buf = Vec::with_capacity(40);
    buf.extend_from_slice(derivation);
    write_varint(&mut buf, output_index as u64);
    hash_to_scalar(&[&buf])
}

/// Ephemeral public key: Hs(D || i) * G + spend_public.
pub fn derive_public_key(
    derivation: &KeyDerivation,
    output_index: usize,
    spend_public: &PublicKey,
) -> Result<PublicKey, CryptoError> {
    let base = decompress(spend_public)?;
    let scalar = derivation_to_scalar(derivation, output_index);
    Ok((ED25519_BASEPOINT_TABLE * &scalar + base).compress().to_bytes())
}

/// Ephemeral secret key: Hs(D || i) + spend_secret.
pub fn derive_secret_key(
    derivation: &KeyDerivation,
    output_index: usize,
    spend_secret: &SecretKey,
) -> SecretKey {
    let scalar = derivation_to_scalar(derivation, output_index)
        + Scalar::from_bytes_mod_order(*spend_secret);
    scalar.to_bytes()
}

/// Key image: secret * Hp(public).
pub fn generate_key_image(public: &PublicKey, secret: &SecretKey) -> KeyImage {
    let scalar = Scalar::from_bytes_mod_order(*secret);
    (scalar * crate::hash_to_point(public)).compress().to_bytes()
}

/// Sender side: the stealth key of output `i` paid to `to` under tx secret
/// `tx_secret`.
pub fn derive_output_public_key(
    to: &Address,
    tx_secret: &SecretKey,
    output_index: usize,
) -> Result<PublicKey, CryptoError> {
    let derivation = generate_key_derivation(&to.view_public_key, tx_secret)?;
    derive_public_key(&derivation, output_index, &to.spend_public_key)
}

/// Owner side: recover the ephemeral keypair of a received output and its
/// key image.
pub fn generate_key_image_for_output(
    keys: &AccountKeys,
    tx_public_key: &PublicKey,
    output_index: usize,
) -> Result<(KeyPair, KeyImage), CryptoError> {
    let derivation = generate_key_derivation(tx_public_key, &keys.view_secret_key)?;
    let public = derive_public_key(&derivation, output_index, &keys.address.spend_public_key)?;
    let secret = derive_secret_key(&derivation, output_index, &keys.spend_secret_key);
    let key_image = generate_key_image(&public, &secret);
    Ok((KeyPair { public, secret }, key_image))
}
