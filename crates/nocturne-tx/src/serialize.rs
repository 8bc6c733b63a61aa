//! Consensus binary encoding of transactions.
//!
//! Varint-based layout shared with the block format. The prefix hash
//! computed here is what every ring signature commits to, and the inputs
//! hash seeds the deterministic transaction key.

use crate::types::{Transaction, TransactionPrefix, TxInput, TxOutput};
use nocturne_crypto::keccak256;
use nocturne_types::Hash;

/// Wire tag for coinbase inputs.
pub const TAG_INPUT_GEN: u8 = 0xff;
/// Wire tag for key inputs.
pub const TAG_INPUT_KEY: u8 = 0x02;
/// Wire tag for key outputs.
pub const TAG_OUTPUT_KEY: u8 = 0x02;

pub fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
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

fn write_input(buf: &mut Vec<u8>, input: &TxInput) {
    match input {
        TxInput::Gen { height } => {
            buf.push(TAG_INPUT_GEN);
            write_varint(buf, *height);
        }
        TxInput::Key(key) => {
            buf.push(TAG_INPUT_KEY);
            write_varint(buf, key.amount);
            write_varint(buf, key.output_indexes.len() as u64);
            for &offset in &key.output_indexes {
                write_varint(buf, offset);
            }
            buf.extend_from_slice(&key.key_image);
        }
    }
}

fn write_output(buf: &mut Vec<u8>, output: &TxOutput) {
    match output {
        TxOutput::Key { amount, key } => {
            write_varint(buf, *amount);
            buf.push(TAG_OUTPUT_KEY);
            buf.extend_from_slice(key);
        }
    }
}

/// Serialized prefix bytes.
pub fn transaction_prefix_bytes(prefix: &TransactionPrefix) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128 + prefix.inputs.len() * 64 + prefix.outputs.len() * 48);
    write_varint(&mut buf, prefix.version);
    write_varint(&mut buf, prefix.unlock_time);
    write_varint(&mut buf, prefix.inputs.len() as u64);
    for input in &prefix.inputs {
        write_input(&mut buf, input);
    }
    write_varint(&mut buf, prefix.outputs.len() as u64);
    for output in &prefix.outputs {
        write_output(&mut buf, output);
    }
    write_varint(&mut buf, prefix.extra.len() as u64);
    buf.extend_from_slice(&prefix.extra);
    buf
}

/// Keccak over the serialized input list alone.
pub fn transaction_inputs_hash(prefix: &TransactionPrefix) -> Hash {
    let mut buf = Vec::with_capacity(8 + prefix.inputs.len() * 64);
    write_varint(&mut buf, prefix.inputs.len() as u64);
    for input in &prefix.inputs {
        write_input(&mut buf, input);
    }
    keccak256(&buf)
}

/// Keccak over the serialized prefix. Signatures commit to this.
pub fn transaction_prefix_hash(prefix: &TransactionPrefix) -> Hash {
    keccak256(&transaction_prefix_bytes(prefix))
}

/// Full broadcastable bytes: prefix, then one 64-byte (c, r) entry per
/// ring member of each input. No counts; sizes are implied by the prefix.
pub fn transaction_bytes(tx: &Transaction) -> Vec<u8> {
    let mut buf = transaction_prefix_bytes(&tx.prefix);
    for ring in &tx.signatures {
        for signature in ring {
            buf.extend_from_slice(&signature.c);
            buf.extend_from_slice(&signature.r);
        }
    }
    buf
}
