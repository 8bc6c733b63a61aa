//! CryptoNote base58 encoding.
//!
//! Unlike Bitcoin's base58check, data is split into independent 8-byte
//! blocks that encode to exactly 11 characters each; a trailing partial
//! block maps through a fixed size table. Address envelopes prepend a
//! varint prefix tag and append a 4-byte Keccak-256 checksum before
//! encoding.

use thiserror::Error;
use tiny_keccak::{Hasher, Keccak};

const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

const FULL_BLOCK_SIZE: usize = 8;
const FULL_ENCODED_BLOCK_SIZE: usize = 11;

/// Encoded character count for a partial block of N bytes.
const ENCODED_SIZES: [usize; 9] = [0, 2, 3, 5, 6, 7, 9, 10, 11];

/// First 4 bytes of Keccak-256 over tag + payload.
pub const CHECKSUM_SIZE: usize = 4;

#[derive(Debug, Error)]
pub enum Base58Error {
    #[error("invalid base58 character {0:?}")]
    InvalidCharacter(char),

    #[error("invalid encoded block length {0}")]
    InvalidBlockLength(usize),

    #[error("block value does not fit its decoded size")]
    Overflow,

    #[error("payload too short to carry a checksum")]
    TooShort,

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("malformed varint")]
    BadVarint,
}

fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut keccak = Keccak::v256();
    let mut output = [0u8; 32];
    keccak.update(data);
    keccak.finalize(&mut output);
    output
}

/// Decoded byte count for an encoded block length, if valid.
fn decoded_size(encoded_len: usize) -> Option<usize> {
    ENCODED_SIZES.iter().position(|&n| n == encoded_len)
}

fn encode_block(block: &[u8], out: &mut String) {
    let mut num = block.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
    let size = ENCODED_SIZES[block.len()];
    let mut chars = [ALPHABET[0]; FULL_ENCODED_BLOCK_SIZE];
    for slot in chars[..size].iter_mut().rev() {
        *slot = ALPHABET[(num % 58) as usize];
        num /= 58;
    }
    out.push_str(std::str::from_utf8(&chars[..size]).expect("alphabet is ascii"));
}

fn decode_block(block: &[u8], out: &mut Vec<u8>) -> Result<(), Base58Error> {
    let size = decoded_size(block.len()).ok_or(Base58Error::InvalidBlockLength(block.len()))?;
    let mut num: u64 = 0;
    for &ch in block {
        let digit = ALPHABET
            .iter()
            .position(|&a| a == ch)
            .ok_or(Base58Error::InvalidCharacter(ch as char))? as u64;
        num = num
            .checked_mul(58)
            .and_then(|n| n.checked_add(digit))
            .ok_or(Base58Error::Overflow)?;
    }
    if size < FULL_BLOCK_SIZE && num >> (8 * size) != 0 {
        return Err(Base58Error::Overflow);
    }
    for i in (0..size).rev() {
        out.push((num >> (8 * i)) as u8);
    }
    Ok(())
}

/// Encode binary data to CryptoNote base58.
pub fn encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(FULL_BLOCK_SIZE) * FULL_ENCODED_BLOCK_SIZE);
    for block in data.chunks(FULL_BLOCK_SIZE) {
        encode_block(block, &mut out);
    }
    out
}

/// Decode a CryptoNote base58 string.
pub fn decode(encoded: &str) -> Result<Vec<u8>, Base58Error> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() / FULL_ENCODED_BLOCK_SIZE * FULL_BLOCK_SIZE + FULL_BLOCK_SIZE);
    for block in bytes.chunks(FULL_ENCODED_BLOCK_SIZE) {
        decode_block(block, &mut out)?;
    }
    Ok(out)
}

/// Encode an unsigned LEB128 varint.
pub fn encode_varint(mut value: u64) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(10);
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        bytes.push(byte);
        if value == 0 {
            break;
        }
    }
    bytes
}

/// Decode a varint from the start of `data`; returns (value, bytes read).
pub fn decode_varint(data: &[u8]) -> Result<(u64, usize), Base58Error> {
    let mut value: u64 = 0;
    for (i, &byte) in data.iter().enumerate().take(10) {
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(Base58Error::BadVarint)
}

/// Encode an address envelope: varint tag, payload, Keccak checksum.
pub fn encode_address(tag: u64, data: &[u8]) -> String {
    let mut payload = encode_varint(tag);
    payload.extend_from_slice(data);
    let checksum = keccak256(&payload);
    payload.extend_from_slice(&checksum[..CHECKSUM_SIZE]);
    encode(&payload)
}

/// Decode an address envelope, verifying the checksum; returns (tag, payload).
pub fn decode_address(address: &str) -> Result<(u64, Vec<u8>), Base58Error> {
    let decoded = decode(address)?;
    if decoded.len() <= CHECKSUM_SIZE {
        return Err(Base58Error::TooShort);
    }
    let (payload, checksum) = decoded.split_at(decoded.len() - CHECKSUM_SIZE);
    if keccak256(payload)[..CHECKSUM_SIZE] != *checksum {
        return Err(Base58Error::ChecksumMismatch);
    }
    let (tag, read) = decode_varint(payload)?;
    Ok((tag, payload[read..].to_vec()))
}
