//! End-to-end transfer construction: select unspents, mix in decoys,
//! build, sign, and verify every consensus invariant on the result.

use std::collections::HashMap;

use nocturne_crypto::ring::check_ring_signature;
use nocturne_crypto::{derivation, generate_key_derivation, derive_public_key, random_keypair};
use nocturne_tx::builder::relative_output_offsets_to_absolute;
use nocturne_tx::extra::TransactionExtra;
use nocturne_tx::serialize::{transaction_bytes, transaction_prefix_bytes, transaction_prefix_hash};
use nocturne_tx::{
    OptimizationLevel, RandomOutputsResponse, SelectionError, TransactionBuilder, TxInput,
    UnspentOutput, UnspentSelector,
};
use nocturne_types::keys::{AccountKeys, WalletRecord};
use nocturne_types::{Address, Amount, Currency, Network, PublicKey};

const ANONYMITY: usize = 3;

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
    let address = currency.account_address_as_string(&keys.address);
    (keys, address)
}

fn make_owned_coin(
    keys: &AccountKeys,
    address: &str,
    amount: Amount,
    global_index: u64,
) -> UnspentOutput {
    let tx_keys = random_keypair();
    let (ephemeral, key_image) =
        derivation::generate_key_image_for_output(keys, &tx_keys.public, 0).unwrap();
    UnspentOutput {
        amount,
        global_index,
        transaction_public_key: tx_keys.public,
        index_in_transaction: 0,
        public_key: ephemeral.public,
        key_image,
        height: 10,
        unlock_time: 0,
        address: address.to_owned(),
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

/// Outputs of `tx` recognizable with `view_secret` and `spend_public`.
fn recognized_amounts(
    prefix_extra: &[u8],
    outputs: &[nocturne_tx::TxOutput],
    view_secret: &[u8; 32],
    spend_public: &PublicKey,
) -> Amount {
    let extra = TransactionExtra::parse(prefix_extra).unwrap();
    let tx_public_key = *extra.public_key().unwrap();
    let derivation = generate_key_derivation(&tx_public_key, view_secret).unwrap();
    outputs
        .iter()
        .enumerate()
        .filter(|(index, output)| {
            derive_public_key(&derivation, *index, spend_public).unwrap() == *output.key()
        })
        .map(|(_, output)| output.amount())
        .sum()
}

#[test]
fn transfer_end_to_end() {
    let currency = Currency::new(Network::Mainnet);
    let (keys, address) = make_account(&currency);
    let (recipient, _) = make_account(&currency);

    let pool = vec![
        make_owned_coin(&keys, &address, 100_000_000, 0),
        make_owned_coin(&keys, &address, 100_000_000, 1),
        make_owned_coin(&keys, &address, 100_000_000, 2),
        make_owned_coin(&keys, &address, 20_000_000, 0),
        make_owned_coin(&keys, &address, 20_000_000, 1),
        make_owned_coin(&keys, &address, 3_000_000, 0),
        make_owned_coin(&keys, &address, 7_000_000, 0),
    ];
    let decoy_directory: HashMap<(Amount, u64), PublicKey> = pool
        .iter()
        .map(|coin| ((coin.amount, coin.global_index), coin.public_key))
        .collect();

    let total_amount: Amount = 150_000_000;
    let mut selector = UnspentSelector::new(currency.clone(), pool);
    let change = selector
        .select_optimal_outputs(
            100,
            1_700_000_000,
            50, // every pool coin sits at height 10, well confirmed
            1_000_000,
            ANONYMITY,
            total_amount,
            1,
            0,
            OptimizationLevel::Normal,
        )
        .unwrap();

    // the committed picks cover the target plus the minimum fee
    assert!(selector.used_total() >= total_amount + currency.minimum_fee);
    assert_eq!(
        change,
        selector.used_total() - total_amount - currency.minimum_fee
    );
    assert_eq!(selector.ra_amounts().len(), selector.used_unspents().len());

    // decoy pool per selected amount, indexes far away from the real ones
    let mut decoy_directory = decoy_directory;
    let mut response = RandomOutputsResponse::default();
    for &amount in selector.ra_amounts() {
        let entry = response.outputs.entry(amount).or_default();
        if entry.is_empty() {
            for i in 0..(ANONYMITY as u64 + 2) * 4 {
                let decoy = make_decoy(amount, 1_000 + i);
                decoy_directory.insert((amount, decoy.global_index), decoy.public_key);
                entry.push(decoy);
            }
        }
    }

    let wallet_records = HashMap::from([(
        keys.address.spend_public_key,
        WalletRecord {
            spend_public_key: keys.address.spend_public_key,
            spend_secret_key: keys.spend_secret_key,
        },
    )]);

    let mut builder = TransactionBuilder::new(&currency, 0);
    builder.set_payment_id(&[0x42; 32]);
    selector
        .add_mixed_inputs(
            &keys.view_secret_key,
            &wallet_records,
            &mut builder,
            ANONYMITY,
            response,
        )
        .unwrap();
    assert_eq!(builder.inputs_amount(), selector.used_total());

    // denominated outputs for the recipient, denominated change to self
    for part in Currency::decompose_amount(total_amount) {
        builder.add_output(part, &recipient.address);
    }
    for part in Currency::decompose_amount(change) {
        builder.add_output(part, &keys.address);
    }

    let tx = builder.sign(&[0xab; 32]).unwrap();

    // balance: inputs = outputs + implicit fee
    let input_sum: Amount = tx.prefix.inputs.iter().map(|input| input.amount()).sum();
    let output_sum: Amount = tx.prefix.outputs.iter().map(|output| output.amount()).sum();
    assert_eq!(input_sum, selector.used_total());
    assert_eq!(input_sum, output_sum + currency.minimum_fee);

    // every input: strictly increasing absolute offsets, verifiable ring
    let prefix_hash = transaction_prefix_hash(&tx.prefix);
    assert_eq!(tx.signatures.len(), tx.prefix.inputs.len());
    for (input, signatures) in tx.prefix.inputs.iter().zip(&tx.signatures) {
        let TxInput::Key(key_input) = input else {
            panic!("the wallet core only emits key inputs");
        };
        let absolute = relative_output_offsets_to_absolute(&key_input.output_indexes);
        assert!(absolute.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(absolute.len(), ANONYMITY + 1);

        let ring: Vec<PublicKey> = absolute
            .iter()
            .map(|&index| decoy_directory[&(key_input.amount, index)])
            .collect();
        assert_eq!(signatures.len(), ring.len());
        assert!(check_ring_signature(
            &prefix_hash,
            &key_input.key_image,
            &ring,
            signatures
        ));
    }

    // the extra blob carries the tx key and the payment id
    let extra = TransactionExtra::parse(&tx.prefix.extra).unwrap();
    assert!(extra.public_key().is_some());
    assert_eq!(extra.payment_id(), Some([0x42; 32]));

    // recipient and sender each recognize exactly their outputs
    assert_eq!(
        recognized_amounts(
            &tx.prefix.extra,
            &tx.prefix.outputs,
            &recipient.view_secret_key,
            &recipient.address.spend_public_key,
        ),
        total_amount
    );
    assert_eq!(
        recognized_amounts(
            &tx.prefix.extra,
            &tx.prefix.outputs,
            &keys.view_secret_key,
            &keys.address.spend_public_key,
        ),
        change
    );

    // serialized form: prefix then 64 bytes per ring entry
    let bytes = transaction_bytes(&tx);
    let prefix_bytes = transaction_prefix_bytes(&tx.prefix);
    let ring_entries: usize = tx.signatures.iter().map(Vec::len).sum();
    assert_eq!(bytes.len(), prefix_bytes.len() + ring_entries * 64);
}

#[test]
fn empty_wallet_reports_not_enough_funds() {
    let currency = Currency::new(Network::Mainnet);
    let mut selector = UnspentSelector::new(currency, Vec::new());
    let status = selector.select_optimal_outputs(
        100,
        1_700_000_000,
        50,
        1_000_000,
        0,
        1,
        1,
        0,
        OptimizationLevel::Normal,
    );
    assert_eq!(status, Err(SelectionError::NotEnoughFunds));
    assert_eq!(status.unwrap_err().to_string(), "NOT_ENOUGH_FUNDS");
}
