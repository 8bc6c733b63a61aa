//! Transaction builder.
//!
//! Assembles ring-mixed key inputs and stealth outputs, then finalizes
//! into a ring-signed transaction in one `sign` pass. Input and output
//! order is randomized before signing; the transaction secret is derived
//! from the finalized input list and a per-wallet seed, so the wallet can
//! reconstruct everything it sent without storing per-transaction
//! randomness.

use crate::extra::TransactionExtra;
use crate::serialize::{transaction_inputs_hash, transaction_prefix_hash};
use crate::types::{KeyInput, Transaction, TransactionPrefix, TxInput, TxOutput, UnspentOutput};
use crate::TxError;
use nocturne_crypto::{derivation, ring, secret_to_public};
use nocturne_types::keys::{AccountKeys, KeyPair};
use nocturne_types::{Address, Amount, Currency, Hash, PublicKey};
use rand::rngs::OsRng;
use rand::seq::SliceRandom;

struct InputDesc {
    input: KeyInput,
    /// Full ring, sorted by global index, real output included.
    outputs: Vec<UnspentOutput>,
    real_output_index: usize,
    ephemeral_keys: KeyPair,
}

struct OutputDesc {
    amount: Amount,
    address: Address,
}

/// Builds one transaction. Created empty, fed inputs and outputs, consumed
/// by [`TransactionBuilder::sign`].
pub struct TransactionBuilder {
    prefix: TransactionPrefix,
    extra: TransactionExtra,
    input_descs: Vec<InputDesc>,
    output_descs: Vec<OutputDesc>,
    inputs_amount: Amount,
    outputs_amount: Amount,
}

impl TransactionBuilder {
    pub fn new(currency: &Currency, unlock_time: u64) -> Self {
        Self {
            prefix: TransactionPrefix {
                version: currency.current_transaction_version,
                unlock_time,
                ..TransactionPrefix::default()
            },
            extra: TransactionExtra::new(),
            input_descs: Vec::new(),
            output_descs: Vec::new(),
            inputs_amount: 0,
            outputs_amount: 0,
        }
    }

    /// Install a payment id. Replaces any previous payment id; other extra
    /// fields are untouched.
    pub fn set_payment_id(&mut self, payment_id: &Hash) {
        self.extra.set_payment_id(payment_id);
        self.prefix.extra = self.extra.to_bytes();
    }

    /// Install a raw extra nonce.
    pub fn set_extra_nonce(&mut self, nonce: Vec<u8>) -> Result<(), crate::extra::ExtraError> {
        self.extra.set_nonce(nonce)?;
        self.prefix.extra = self.extra.to_bytes();
        Ok(())
    }

    /// Append a pending output; returns its pre-shuffle index.
    pub fn add_output(&mut self, amount: Amount, to: &Address) -> usize {
        self.outputs_amount += amount;
        self.output_descs.push(OutputDesc {
            amount,
            address: *to,
        });
        self.output_descs.len() - 1
    }

    /// Append a pending input; returns its pre-shuffle index.
    ///
    /// Derives the ephemeral spend keys and the key image for the real
    /// output and checks it against the wallet's record: a mismatch means
    /// corrupted wallet state or wrong keys and aborts the build. All ring
    /// members must carry the real output's amount and distinct global
    /// indexes.
    pub fn add_input(
        &mut self,
        sender_keys: &AccountKeys,
        real_output: UnspentOutput,
        mix_outputs: Vec<UnspentOutput>,
    ) -> Result<usize, TxError> {
        let (ephemeral_keys, key_image) = derivation::generate_key_image_for_output(
            sender_keys,
            &real_output.transaction_public_key,
            real_output.index_in_transaction as usize,
        )
        .map_err(TxError::KeyImageDerivation)?;
        if key_image != real_output.key_image {
            return Err(TxError::KeyImageMismatch);
        }

        let amount = real_output.amount;
        let mut outputs = mix_outputs;
        outputs.sort_by_key(|output| output.global_index);
        let real_output_index =
            outputs.partition_point(|output| output.global_index < real_output.global_index);
        outputs.insert(real_output_index, real_output);

        let mut absolute = Vec::with_capacity(outputs.len());
        for output in &outputs {
            if output.amount != amount {
                return Err(TxError::MixAmountMismatch {
                    expected: amount,
                    got: output.amount,
                });
            }
            if absolute.last() == Some(&output.global_index) {
                return Err(TxError::DuplicateRingMember(output.global_index));
            }
            absolute.push(output.global_index);
        }

        let input = KeyInput {
            amount,
            output_indexes: absolute_output_offsets_to_relative(&absolute),
            key_image,
        };
        self.inputs_amount += amount;
        self.input_descs.push(InputDesc {
            input,
            outputs,
            real_output_index,
            ephemeral_keys,
        });
        Ok(self.input_descs.len() - 1)
    }

    /// Sum of added input amounts.
    pub fn inputs_amount(&self) -> Amount {
        self.inputs_amount
    }

    /// Sum of added output amounts. The implicit fee is the difference.
    pub fn outputs_amount(&self) -> Amount {
        self.outputs_amount
    }

    /// Transaction keypair for a given finalized input list and wallet
    /// seed: `secret = Hs(inputs_hash || seed)`.
    pub fn deterministic_tx_keys(inputs_hash: &Hash, tx_derivation_seed: &Hash) -> KeyPair {
        let secret = nocturne_crypto::hash_to_scalar(&[inputs_hash, tx_derivation_seed]).to_bytes();
        KeyPair {
            public: secret_to_public(&secret),
            secret,
        }
    }

    /// Finalize: shuffle, derive the transaction key, fill stealth output
    /// keys, hash the prefix and ring-sign every input.
    ///
    /// Ordering is load-bearing: extra must be complete before the prefix
    /// hash, and the prefix hash must exist before signing because the
    /// signatures commit to it.
    pub fn sign(mut self, tx_derivation_seed: &Hash) -> Result<Transaction, TxError> {
        self.output_descs.shuffle(&mut OsRng);
        self.input_descs.shuffle(&mut OsRng);

        self.prefix.inputs = self
            .input_descs
            .iter()
            .map(|desc| TxInput::Key(desc.input.clone()))
            .collect();
        let inputs_hash = transaction_inputs_hash(&self.prefix);
        let tx_keys = Self::deterministic_tx_keys(&inputs_hash, tx_derivation_seed);

        self.extra.set_public_key(tx_keys.public);
        self.prefix.extra = self.extra.to_bytes();

        self.prefix.outputs = Vec::with_capacity(self.output_descs.len());
        for (index, desc) in self.output_descs.iter().enumerate() {
            let key = derivation::derive_output_public_key(&desc.address, &tx_keys.secret, index)
                .map_err(|_| TxError::OutputKeyCorrupted)?;
            self.prefix.outputs.push(TxOutput::Key {
                amount: desc.amount,
                key,
            });
        }

        let prefix_hash = transaction_prefix_hash(&self.prefix);
        let mut signatures = Vec::with_capacity(self.input_descs.len());
        for desc in &self.input_descs {
            let ring_keys: Vec<PublicKey> =
                desc.outputs.iter().map(|output| output.public_key).collect();
            let ring = ring::generate_ring_signature(
                &prefix_hash,
                &desc.input.key_image,
                &ring_keys,
                &desc.ephemeral_keys.secret,
                desc.real_output_index,
            )
            .map_err(|_| TxError::RingSignatureCorrupted)?;
            signatures.push(ring);
        }

        Ok(Transaction {
            prefix: self.prefix,
            signatures,
        })
    }
}

/// Convert sorted absolute ring indexes to the wire's relative form.
///
/// `[10, 50, 80, 100]` becomes `[10, 40, 30, 20]`.
pub fn absolute_output_offsets_to_relative(indexes: &[u64]) -> Vec<u64> {
    let mut offsets = indexes.to_vec();
    for i in (1..offsets.len()).rev() {
        offsets[i] -= offsets[i - 1];
    }
    offsets
}

/// Inverse of [`absolute_output_offsets_to_relative`].
pub fn relative_output_offsets_to_absolute(offsets: &[u64]) -> Vec<u64> {
    let mut absolute = offsets.to_vec();
    for i in 1..absolute.len() {
        absolute[i] += absolute[i - 1];
    }
    absolute
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::transaction_prefix_bytes;
    use nocturne_crypto::ring::check_ring_signature;
    use nocturne_crypto::{generate_key_derivation, derive_public_key, random_keypair};
    use nocturne_types::{Currency, Network};

    fn make_currency() -> Currency {
        Currency::new(Network::Mainnet)
    }

    fn make_account(currency: &Currency) -> (AccountKeys, String) {
        let spend = random_keypair();
        let view = random_keypair();
        let keys = AccountKeys {
            address: Address {
                spend_public_key: spend.public,
                view_public_key: view.public,
            },
            spend_secret_key: spend.secret,
            view_secret_key: view.secret,
        };
        let address_string = currency.account_address_as_string(&keys.address);
        (keys, address_string)
    }

    /// An output genuinely paid to `keys`, with a correct key image.
    fn make_owned_output(
        keys: &AccountKeys,
        address_string: &str,
        amount: Amount,
        global_index: u64,
    ) -> UnspentOutput {
        let tx_keys = random_keypair();
        let index_in_transaction = 0u32;
        let (ephemeral, key_image) = derivation::generate_key_image_for_output(
            keys,
            &tx_keys.public,
            index_in_transaction as usize,
        )
        .unwrap();
        UnspentOutput {
            amount,
            global_index,
            transaction_public_key: tx_keys.public,
            index_in_transaction,
            public_key: ephemeral.public,
            key_image,
            height: 1,
            unlock_time: 0,
            address: address_string.to_owned(),
            dust: Currency::is_dust(amount),
        }
    }

    fn make_decoy(amount: Amount, global_index: u64) -> UnspentOutput {
        UnspentOutput {
            amount,
            global_index,
            public_key: random_keypair().public,
            ..UnspentOutput::default()
        }
    }

    #[test]
    fn offsets_roundtrip() {
        assert_eq!(
            absolute_output_offsets_to_relative(&[10, 50, 80, 100]),
            vec![10, 40, 30, 20]
        );
        assert_eq!(
            relative_output_offsets_to_absolute(&[10, 40, 30, 20]),
            vec![10, 50, 80, 100]
        );
        let absolute = vec![3, 7, 12, 400, 401];
        assert_eq!(
            relative_output_offsets_to_absolute(&absolute_output_offsets_to_relative(&absolute)),
            absolute
        );
        assert!(absolute_output_offsets_to_relative(&[]).is_empty());
    }

    #[test]
    fn add_input_rejects_key_image_mismatch() {
        let currency = make_currency();
        let (keys, address) = make_account(&currency);
        let mut output = make_owned_output(&keys, &address, 100, 7);
        output.key_image[0] ^= 0x01;
        let mut builder = TransactionBuilder::new(&currency, 0);
        assert!(matches!(
            builder.add_input(&keys, output, vec![]),
            Err(TxError::KeyImageMismatch)
        ));
    }

    #[test]
    fn add_input_rejects_foreign_output() {
        let currency = make_currency();
        let (keys, _) = make_account(&currency);
        let (other_keys, other_address) = make_account(&currency);
        let output = make_owned_output(&other_keys, &other_address, 100, 7);
        let mut builder = TransactionBuilder::new(&currency, 0);
        // wrong keys derive a different image
        assert!(matches!(
            builder.add_input(&keys, output, vec![]),
            Err(TxError::KeyImageMismatch)
        ));
    }

    #[test]
    fn add_input_rejects_mixed_amounts() {
        let currency = make_currency();
        let (keys, address) = make_account(&currency);
        let output = make_owned_output(&keys, &address, 100, 7);
        let mut builder = TransactionBuilder::new(&currency, 0);
        assert!(matches!(
            builder.add_input(&keys, output, vec![make_decoy(200, 3)]),
            Err(TxError::MixAmountMismatch { expected: 100, got: 200 })
        ));
    }

    #[test]
    fn add_input_rejects_duplicate_ring_members() {
        let currency = make_currency();
        let (keys, address) = make_account(&currency);
        let output = make_owned_output(&keys, &address, 100, 7);
        let mut builder = TransactionBuilder::new(&currency, 0);
        assert!(matches!(
            builder.add_input(&keys, output, vec![make_decoy(100, 3), make_decoy(100, 3)]),
            Err(TxError::DuplicateRingMember(3))
        ));
    }

    #[test]
    fn add_input_builds_sorted_relative_offsets() {
        let currency = make_currency();
        let (keys, address) = make_account(&currency);
        let output = make_owned_output(&keys, &address, 100, 11);
        let mut builder = TransactionBuilder::new(&currency, 0);
        builder
            .add_input(&keys, output, vec![make_decoy(100, 20), make_decoy(100, 5)])
            .unwrap();
        let tx = builder.sign(&[0x11; 32]).unwrap();
        let TxInput::Key(input) = &tx.prefix.inputs[0] else {
            panic!("expected a key input");
        };
        assert_eq!(input.output_indexes, vec![5, 6, 9]);
        let absolute = relative_output_offsets_to_absolute(&input.output_indexes);
        assert!(absolute.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn sign_produces_verifiable_ring_signatures() {
        let currency = make_currency();
        let (keys, address) = make_account(&currency);
        let real = make_owned_output(&keys, &address, 1_000, 11);
        let decoys = vec![make_decoy(1_000, 5), make_decoy(1_000, 20)];

        let mut builder = TransactionBuilder::new(&currency, 0);
        builder.add_input(&keys, real.clone(), decoys.clone()).unwrap();
        let recipient = make_account(&currency).0;
        builder.add_output(900, &recipient.address);
        let tx = builder.sign(&[0x22; 32]).unwrap();

        assert_eq!(tx.signatures.len(), 1);
        assert_eq!(tx.signatures[0].len(), 3);
        // ring order is by global index: 5, 11, 20
        let ring = vec![decoys[0].public_key, real.public_key, decoys[1].public_key];
        let prefix_hash = transaction_prefix_hash(&tx.prefix);
        assert!(check_ring_signature(
            &prefix_hash,
            &real.key_image,
            &ring,
            &tx.signatures[0]
        ));
    }

    #[test]
    fn sign_balances_inputs_against_outputs_plus_fee() {
        let currency = make_currency();
        let (keys, address) = make_account(&currency);
        let recipient = make_account(&currency).0;
        let mut builder = TransactionBuilder::new(&currency, 0);
        builder
            .add_input(&keys, make_owned_output(&keys, &address, 1_000, 1), vec![])
            .unwrap();
        builder
            .add_input(&keys, make_owned_output(&keys, &address, 500, 2), vec![])
            .unwrap();
        builder.add_output(700, &recipient.address);
        builder.add_output(400, &recipient.address);
        assert_eq!(builder.inputs_amount(), 1_500);
        assert_eq!(builder.outputs_amount(), 1_100);

        let tx = builder.sign(&[0x33; 32]).unwrap();
        let input_sum: Amount = tx.prefix.inputs.iter().map(|i| i.amount()).sum();
        let output_sum: Amount = tx.prefix.outputs.iter().map(|o| o.amount()).sum();
        // the 400-unit fee is implicit
        assert_eq!(input_sum, 1_500);
        assert_eq!(output_sum, 1_100);
    }

    #[test]
    fn recipient_can_recognize_their_output() {
        let currency = make_currency();
        let (keys, address) = make_account(&currency);
        let recipient = make_account(&currency).0;
        let mut builder = TransactionBuilder::new(&currency, 0);
        builder
            .add_input(&keys, make_owned_output(&keys, &address, 1_000, 1), vec![])
            .unwrap();
        builder.add_output(900, &recipient.address);
        let tx = builder.sign(&[0x44; 32]).unwrap();

        let extra = crate::extra::TransactionExtra::parse(&tx.prefix.extra).unwrap();
        let tx_public_key = *extra.public_key().unwrap();
        let derivation =
            generate_key_derivation(&tx_public_key, &recipient.view_secret_key).unwrap();
        let expected =
            derive_public_key(&derivation, 0, &recipient.address.spend_public_key).unwrap();
        assert_eq!(tx.prefix.outputs[0].key(), &expected);
    }

    #[test]
    fn payment_id_survives_signing() {
        let currency = make_currency();
        let (keys, address) = make_account(&currency);
        let recipient = make_account(&currency).0;
        let mut builder = TransactionBuilder::new(&currency, 0);
        builder.set_payment_id(&[0x5c; 32]);
        builder
            .add_input(&keys, make_owned_output(&keys, &address, 1_000, 1), vec![])
            .unwrap();
        builder.add_output(900, &recipient.address);
        let tx = builder.sign(&[0x55; 32]).unwrap();
        let extra = crate::extra::TransactionExtra::parse(&tx.prefix.extra).unwrap();
        assert_eq!(extra.payment_id(), Some([0x5c; 32]));
        assert!(extra.public_key().is_some());
    }

    #[test]
    fn same_seed_and_inputs_rebuild_the_same_transaction() {
        let currency = make_currency();
        let (keys, address) = make_account(&currency);
        let recipient = make_account(&currency).0;
        let real = make_owned_output(&keys, &address, 1_000, 1);
        let seed = [0x66; 32];

        let build = || {
            let mut builder = TransactionBuilder::new(&currency, 0);
            builder.add_input(&keys, real.clone(), vec![]).unwrap();
            builder.add_output(900, &recipient.address);
            builder.sign(&seed).unwrap()
        };
        // single input and output: the shuffles are trivial, so the prefix
        // (tx public key and stealth keys included) is byte-identical
        let first = build();
        let second = build();
        assert_eq!(
            transaction_prefix_bytes(&first.prefix),
            transaction_prefix_bytes(&second.prefix)
        );
    }

    #[test]
    fn different_seeds_give_different_tx_keys() {
        let inputs_hash = [0x01; 32];
        let a = TransactionBuilder::deterministic_tx_keys(&inputs_hash, &[0x02; 32]);
        let b = TransactionBuilder::deterministic_tx_keys(&inputs_hash, &[0x03; 32]);
        assert_ne!(a.public, b.public);
    }

    #[test]
    fn version_and_unlock_time_come_from_construction() {
        let currency = make_currency();
        let (keys, address) = make_account(&currency);
        let recipient = make_account(&currency).0;
        let mut builder = TransactionBuilder::new(&currency, 777);
        builder
            .add_input(&keys, make_owned_output(&keys, &address, 1_000, 1), vec![])
            .unwrap();
        builder.add_output(900, &recipient.address);
        let tx = builder.sign(&[0x77; 32]).unwrap();
        assert_eq!(tx.prefix.version, currency.current_transaction_version);
        assert_eq!(tx.prefix.unlock_time, 777);
    }
}
