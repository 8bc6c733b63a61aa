//! Transaction extra: a tagged blob carrying the transaction public key
//! and an optional nonce.
//!
//! Field order inside the blob is fixed (public key, then nonce). A
//! payment id travels as a nonce whose first byte tags it.

use nocturne_types::{Hash, PublicKey};
use thiserror::Error;

pub const TAG_PUBLIC_KEY: u8 = 0x01;
pub const TAG_NONCE: u8 = 0x02;

/// Nonce payload tag for a 32-byte payment id.
pub const NONCE_PAYMENT_ID: u8 = 0x00;

/// Nonce length travels as a single byte.
pub const MAX_NONCE_SIZE: usize = 255;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtraError {
    #[error("truncated field for extra tag {0:#04x}")]
    Truncated(u8),

    #[error("unknown extra tag {0:#04x}")]
    UnknownTag(u8),

    #[error("extra nonce longer than {MAX_NONCE_SIZE} bytes")]
    NonceTooLong,
}

/// Typed view of the extra blob, mutated field-wise and serialized whole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionExtra {
    public_key: Option<PublicKey>,
    nonce: Option<Vec<u8>>,
}

impl TransactionExtra {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or replace) the transaction public key.
    pub fn set_public_key(&mut self, key: PublicKey) {
        self.public_key = Some(key);
    }

    /// Install (or replace) the raw nonce field.
    pub fn set_nonce(&mut self, nonce: Vec<u8>) -> Result<(), ExtraError> {
        if nonce.len() > MAX_NONCE_SIZE {
            return Err(ExtraError::NonceTooLong);
        }
        self.nonce = Some(nonce);
        Ok(())
    }

    /// Install a payment id as the nonce. Other fields are untouched.
    pub fn set_payment_id(&mut self, payment_id: &Hash) {
        let mut nonce = Vec::with_capacity(1 + payment_id.len());
        nonce.push(NONCE_PAYMENT_ID);
        nonce.extend_from_slice(payment_id);
        self.nonce = Some(nonce);
    }

    pub fn public_key(&self) -> Option<&PublicKey> {
        self.public_key.as_ref()
    }

    pub fn nonce(&self) -> Option<&[u8]> {
        self.nonce.as_deref()
    }

    /// The payment id, if the nonce carries one.
    pub fn payment_id(&self) -> Option<Hash> {
        let nonce = self.nonce.as_ref()?;
        if nonce.len() != 33 || nonce[0] != NONCE_PAYMENT_ID {
            return None;
        }
        let mut id = [0u8; 32];
        id.copy_from_slice(&nonce[1..]);
        Some(id)
    }

    /// Serialize to the wire blob.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        if let Some(key) = &self.public_key {
            buf.push(TAG_PUBLIC_KEY);
            buf.extend_from_slice(key);
        }
        if let Some(nonce) = &self.nonce {
            buf.push(TAG_NONCE);
            buf.push(nonce.len() as u8);
            buf.extend_from_slice(nonce);
        }
        buf
    }

    /// Parse a wire blob back into fields.
    pub fn parse(bytes: &[u8]) -> Result<Self, ExtraError> {
        let mut extra = Self::default();
        let mut rest = bytes;
        while let Some((&tag, tail)) = rest.split_first() {
            rest = match tag {
                TAG_PUBLIC_KEY => {
                    if tail.len() < 32 {
                        return Err(ExtraError::Truncated(tag));
                    }
                    let mut key = [0u8; 32];
                    key.copy_from_slice(&tail[..32]);
                    extra.public_key = Some(key);
                    &tail[32..]
                }
                TAG_NONCE => {
                    let (&len, tail) = tail.split_first().ok_or(ExtraError::Truncated(tag))?;
                    let len = usize::from(len);
                    if tail.len() < len {
                        return Err(ExtraError::Truncated(tag));
                    }
                    extra.nonce = Some(tail[..len].to_vec());
                    &tail[len..]
                }
                other => return Err(ExtraError::UnknownTag(other)),
            };
        }
        Ok(extra)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_extra_is_empty_blob() {
        assert!(TransactionExtra::new().to_bytes().is_empty());
    }

    #[test]
    fn roundtrip_public_key_and_nonce() {
        let mut extra = TransactionExtra::new();
        extra.set_public_key([0xaa; 32]);
        extra.set_nonce(vec![1, 2, 3]).unwrap();
        let parsed = TransactionExtra::parse(&extra.to_bytes()).unwrap();
        assert_eq!(parsed, extra);
    }

    #[test]
    fn payment_id_roundtrip() {
        let mut extra = TransactionExtra::new();
        extra.set_payment_id(&[0x5c; 32]);
        assert_eq!(extra.payment_id(), Some([0x5c; 32]));
        let parsed = TransactionExtra::parse(&extra.to_bytes()).unwrap();
        assert_eq!(parsed.payment_id(), Some([0x5c; 32]));
    }

    #[test]
    fn payment_id_overwrites_previous() {
        let mut extra = TransactionExtra::new();
        extra.set_public_key([0xaa; 32]);
        extra.set_payment_id(&[0x01; 32]);
        extra.set_payment_id(&[0x02; 32]);
        assert_eq!(extra.payment_id(), Some([0x02; 32]));
        // the public key survives payment id updates
        assert_eq!(extra.public_key(), Some(&[0xaa; 32]));
    }

    #[test]
    fn nonce_too_long_is_rejected() {
        let mut extra = TransactionExtra::new();
        assert_eq!(extra.set_nonce(vec![0; 256]), Err(ExtraError::NonceTooLong));
    }

    #[test]
    fn parse_rejects_unknown_tag() {
        assert_eq!(
            TransactionExtra::parse(&[0x7f, 1, 2]),
            Err(ExtraError::UnknownTag(0x7f))
        );
    }

    #[test]
    fn parse_rejects_truncated_key() {
        assert_eq!(
            TransactionExtra::parse(&[TAG_PUBLIC_KEY, 1, 2, 3]),
            Err(ExtraError::Truncated(TAG_PUBLIC_KEY))
        );
    }

    #[test]
    fn parse_rejects_truncated_nonce() {
        assert_eq!(
            TransactionExtra::parse(&[TAG_NONCE, 4, 1, 2]),
            Err(ExtraError::Truncated(TAG_NONCE))
        );
    }
}
