//! Transaction size estimation.
//!
//! A pure structural upper bound over the wire format in [`crate::serialize`].
//! The selector uses it to keep transactions under the effective median
//! block size and to price the size-proportional fee, so it must never
//! underestimate.

/// Upper bound of a varint-encoded u64.
const VARINT_MAX_SIZE: usize = 10;

/// Upper bound of a varint-encoded global output index.
///
/// The first ring offset is absolute, so the bound must cover any chain
/// position; later deltas are smaller but share the bound.
const GLOBAL_INDEX_MAX_SIZE: usize = 7;

/// One (c, r) ring signature entry.
const SIGNATURE_SIZE: usize = 64;

/// version + unlock_time + vin/vout counts.
const PREFIX_OVERHEAD: usize = 2 + VARINT_MAX_SIZE + 2 + 2;

/// extra length prefix, tagged tx public key, tagged payment-id nonce.
const EXTRA_OVERHEAD: usize = 2 + (1 + 32) + (2 + 1 + 32);

/// Worst-case serialized size of a transaction of the given shape.
///
/// `anonymity` is the decoy count per input; every input carries
/// `anonymity + 1` ring offsets and as many signature entries.
pub fn max_transaction_size(inputs_count: usize, outputs_count: usize, anonymity: usize) -> usize {
    let ring_size = anonymity + 1;
    // tag + amount + offset count + offsets + key image, then signatures
    let per_input = 1
        + VARINT_MAX_SIZE
        + 2
        + ring_size * GLOBAL_INDEX_MAX_SIZE
        + 32
        + ring_size * SIGNATURE_SIZE;
    // amount + tag + stealth key
    let per_output = VARINT_MAX_SIZE + 1 + 32;
    PREFIX_OVERHEAD + EXTRA_OVERHEAD + inputs_count * per_input + outputs_count * per_output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_with_inputs() {
        assert!(max_transaction_size(2, 2, 6) > max_transaction_size(1, 2, 6));
    }

    #[test]
    fn grows_with_outputs() {
        assert!(max_transaction_size(2, 8, 6) > max_transaction_size(2, 2, 6));
    }

    #[test]
    fn grows_with_anonymity() {
        assert!(max_transaction_size(2, 2, 10) > max_transaction_size(2, 2, 0));
    }

    #[test]
    fn anonymity_costs_offsets_and_signatures_per_input() {
        let base = max_transaction_size(3, 2, 4);
        let more = max_transaction_size(3, 2, 5);
        assert_eq!(more - base, 3 * (GLOBAL_INDEX_MAX_SIZE + SIGNATURE_SIZE));
    }

    #[test]
    fn covers_a_real_small_transaction() {
        // 1 input, ring of 1, 1 output: tag-level worst case comfortably
        // above the actual ~150 byte encoding
        let size = max_transaction_size(1, 1, 0);
        assert!(size > 150);
        assert!(size < 400);
    }
}
