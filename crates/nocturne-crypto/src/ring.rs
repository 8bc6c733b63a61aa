//! Classic CryptoNote ring signatures.
//!
//! One (c, r) pair per ring member. The challenge commits to the prefix
//! hash and the per-member (L, R) points; the key image links the real
//! member without revealing its position.

use crate::{decompress, hash_to_point, hash_to_scalar, random_scalar, CryptoError};
use curve25519_dalek::constants::ED25519_BASEPOINT_TABLE;
use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::VartimeMultiscalarMul;
use nocturne_types::{Hash, KeyImage, PublicKey, SecretKey};

/// One ring entry of a signature vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RingSignature {
    pub c: [u8; 32],
    pub r: [u8; 32],
}

/// Sign `prefix_hash` with the ring member at `secret_index`.
///
/// The returned vector has one entry per ring member.
pub fn generate_ring_signature(
    prefix_hash: &Hash,
    key_image: &KeyImage,
    ring: &[PublicKey],
    secret: &SecretKey,
    secret_index: usize,
) -> Result<Vec<RingSignature>, CryptoError> {
    if secret_index >= ring.len() {
        return Err(CryptoError::BadRingIndex {
            index: secret_index,
            ring_len: ring.len(),
        });
    }
    let image = decompress(key_image)?;
    let x = Scalar::from_bytes_mod_order(*secret);
    let k = random_scalar();

    let mut signatures = vec![RingSignature::default(); ring.len()];
    let mut c_sum = Scalar::ZERO;
    let mut transcript = Vec::with_capacity(32 + ring.len() * 64);
    transcript.extend_from_slice(prefix_hash);

    for (i, member) in ring.iter().enumerate() {
        let (l, r) = if i == secret_index {
            (ED25519_BASEPOINT_TABLE * &k, k * hash_to_point(member))
        } else {
            let c = random_scalar();
            let s = random_scalar();
            signatures[i] = RingSignature {
                c: c.to_bytes(),
                r: s.to_bytes(),
            };
            c_sum += c;
            let point = decompress(member)?;
            (
                EdwardsPoint::vartime_double_scalar_mul_basepoint(&c, &point, &s),
                EdwardsPoint::vartime_multiscalar_mul([s, c], [hash_to_point(member), image]),
            )
        };
        transcript.extend_from_slice(l.compress().as_bytes());
        transcript.extend_from_slice(r.compress().as_bytes());
    }

    let challenge = hash_to_scalar(&[&transcript]);
    let c_real = challenge - c_sum;
    signatures[secret_index] = RingSignature {
        c: c_real.to_bytes(),
        r: (k - c_real * x).to_bytes(),
    };
    Ok(signatures)
}

/// Verify a ring signature vector over `prefix_hash`.
pub fn check_ring_signature(
    prefix_hash: &Hash,
    key_image: &KeyImage,
    ring: &[PublicKey],
    signatures: &[RingSignature],
) -> bool {
    if ring.is_empty() || signatures.len() != ring.len() {
        return false;
    }
    let Ok(image) = decompress(key_image) else {
        return false;
    };
    // a torsioned key image would let one output produce several images
    if !image.is_torsion_free() {
        return false;
    }

    let mut c_sum = Scalar::ZERO;
    let mut transcript = Vec::with_capacity(32 + ring.len() * 64);
    transcript.extend_from_slice(prefix_hash);

    for (member, signature) in ring.iter().zip(signatures) {
        let Some(c) = Option::<Scalar>::from(Scalar::from_canonical_bytes(signature.c)) else {
            return false;
        };
        let Some(s) = Option::<Scalar>::from(Scalar::from_canonical_bytes(signature.r)) else {
            return false;
        };
        let Ok(point) = decompress(member) else {
            return false;
        };
        let l = EdwardsPoint::vartime_double_scalar_mul_basepoint(&c, &point, &s);
        let r = EdwardsPoint::vartime_multiscalar_mul([s, c], [hash_to_point(member), image]);
        transcript.extend_from_slice(l.compress().as_bytes());
        transcript.extend_from_slice(r.compress().as_bytes());
        c_sum += c;
    }

    hash_to_scalar(&[&transcript]) == c_sum
}
