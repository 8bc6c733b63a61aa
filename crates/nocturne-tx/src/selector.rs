//! Unspent output selection.
//!
//! Chooses which of the wallet's unspent outputs to consume for a
//! transfer. Coins on this chain are canonical denominations `d * 10^k`,
//! so the pool is organized as per-digit stacks of equal coins; selection
//! balances the target amount, the block size limit, the
//! size-proportional fee, dust consumption, and a digit-rounding pass
//! that keeps the wallet's future change concentrated in few high
//! denominations.

use crate::builder::TransactionBuilder;
use crate::estimate::max_transaction_size;
use crate::types::{RandomOutputsResponse, UnspentOutput};
use crate::TxError;
use nocturne_types::keys::{AccountKeys, WalletRecord};
use nocturne_types::{Amount, Currency, Height, PublicKey, SecretKey, Timestamp};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;
use tracing::{debug, trace};

/// Expected selection outcomes that are not construction errors.
///
/// The rendered tokens are stable and user-facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("NOT_ENOUGH_FUNDS")]
    NotEnoughFunds,

    #[error("TRANSACTION_DOES_NOT_FIT_IN_BLOCK")]
    TransactionDoesNotFitInBlock,
}

/// How hard the selector may work at consolidating the coin stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptimizationLevel {
    /// Some dust consumption, never stack compaction.
    Minimal,
    #[default]
    Normal,
    Aggressive,
}

impl OptimizationLevel {
    /// Level from its RPC name; anything unrecognized is `Normal`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "minimal" => Self::Minimal,
            "aggressive" => Self::Aggressive,
            _ => Self::Normal,
        }
    }

    /// Upper bound on optimization picks per transaction. The minimal
    /// budget still allows dust pickup but stays under the ten-coin
    /// stack-compaction step.
    fn optimizations(self) -> usize {
        match self {
            Self::Minimal => 9,
            Self::Normal => 50,
            Self::Aggressive => 200,
        }
    }

    /// Percentage of the effective median an optimized transaction may
    /// occupy before picks are rolled back.
    fn median_percent(self) -> usize {
        match self {
            Self::Aggressive => 10,
            _ => 5,
        }
    }
}

/// If any coin stack is taller, spend ten of its coins.
const STACK_OPTIMIZATION_THRESHOLD: usize = 20;

/// Minimum stack height before a two-coin digit fill is considered
/// (e.g. 7 + 9 to fill a 6).
const TWO_THRESHOLD: usize = 10;

/// Change outputs the denomination split may add.
const MAX_CHANGE_OUTPUTS: usize = 8;

/// Defensive bound on the fee adjustment loop.
const MAX_FEE_ITERATIONS: usize = 32;

type CoinStack = Vec<UnspentOutput>;

/// digit -> leading digit (1..=9) -> stack of equal coins.
type HaveCoins = BTreeMap<usize, BTreeMap<usize, CoinStack>>;

/// amount -> stack, ordered so a range scan finds the smallest cover.
type DustCoins = BTreeMap<Amount, CoinStack>;

/// Picks unspent outputs. Owns the candidate pool; committed picks
/// accumulate in `used_unspents` until [`UnspentSelector::reset`].
pub struct UnspentSelector {
    currency: Currency,
    unspents: Vec<UnspentOutput>,
    used_unspents: Vec<UnspentOutput>,
    optimization_unspents: Vec<UnspentOutput>,
    used_total: Amount,
    inputs_count: usize,
    ra_amounts: Vec<Amount>,
}

impl UnspentSelector {
    pub fn new(currency: Currency, unspents: Vec<UnspentOutput>) -> Self {
        Self {
            currency,
            unspents,
            used_unspents: Vec::new(),
            optimization_unspents: Vec::new(),
            used_total: 0,
            inputs_count: 0,
            ra_amounts: Vec::new(),
        }
    }

    /// Replace the pool and clear all accumulated selection state.
    pub fn reset(&mut self, unspents: Vec<UnspentOutput>) {
        self.unspents = unspents;
        self.used_unspents.clear();
        self.optimization_unspents.clear();
        self.used_total = 0;
        self.inputs_count = 0;
        self.ra_amounts.clear();
    }

    /// Committed picks, in pick order.
    pub fn used_unspents(&self) -> &[UnspentOutput] {
        &self.used_unspents
    }

    /// Sum of committed and provisional picks.
    pub fn used_total(&self) -> Amount {
        self.used_total
    }

    pub fn inputs_count(&self) -> usize {
        self.inputs_count
    }

    /// Amounts to request random mix outputs for, one per committed pick.
    pub fn ra_amounts(&self) -> &[Amount] {
        &self.ra_amounts
    }

    /// Core entry: choose inputs covering `total_amount` plus a
    /// size-proportional fee, and return the change.
    ///
    /// Iterates on the fee: each round selects coins for the current fee,
    /// sizes the would-be transaction (reserving room for change
    /// denominations), rolls optimization picks back when the transaction
    /// outgrows the optimization median, and bumps the fee in dust-quantum
    /// steps until the carried fee covers the size fee.
    #[allow(clippy::too_many_arguments)]
    pub fn select_optimal_outputs(
        &mut self,
        block_height: Height,
        block_time: Timestamp,
        confirmed_height: Height,
        effective_median_size: usize,
        anonymity: usize,
        total_amount: Amount,
        total_outputs: usize,
        fee_per_byte: Amount,
        optimization_level: OptimizationLevel,
    ) -> Result<Amount, SelectionError> {
        let (mut have_coins, mut dust_coins, max_digit) =
            self.create_have_coins(block_height, block_time, confirmed_height);
        let mut fee = self.currency.minimum_fee;
        let mut optimizations = optimization_level.optimizations();
        let optimization_median =
            effective_median_size * optimization_level.median_percent() / 100;
        for _ in 0..MAX_FEE_ITERATIONS {
            if !self.select_coins(
                &mut have_coins,
                &mut dust_coins,
                max_digit,
                total_amount + fee,
                anonymity,
                optimizations,
            ) {
                return Err(SelectionError::NotEnoughFunds);
            }
            let change_dust_fee =
                (self.used_total - total_amount - fee) % self.currency.default_dust_threshold;
            let tx_size = max_transaction_size(
                self.inputs_count,
                total_outputs + MAX_CHANGE_OUTPUTS,
                anonymity,
            );
            if tx_size > optimization_median && optimizations > 0 {
                self.unoptimize_amounts(&mut have_coins, &mut dust_coins);
                optimizations /= 2;
                if optimizations < 10 {
                    // no point retrying for so few picks
                    optimizations = 0;
                }
                continue;
            }
            if tx_size > effective_median_size {
                return Err(SelectionError::TransactionDoesNotFitInBlock);
            }
            let size_fee = fee_per_byte * tx_size as Amount;
            if fee + change_dust_fee >= size_fee {
                let change = self.used_total - total_amount - fee - change_dust_fee;
                self.combine_optimized_unspents();
                debug!(
                    used_total = self.used_total,
                    total_amount, fee, change_dust_fee, change, "selection committed"
                );
                return Ok(change);
            }
            fee = (size_fee - change_dust_fee).div_ceil(self.currency.default_dust_threshold)
                * self.currency.default_dust_threshold;
            trace!(fee, size_fee, "fee below size fee, retrying");
            self.unoptimize_amounts(&mut have_coins, &mut dust_coins);
        }
        Err(SelectionError::NotEnoughFunds)
    }

    /// For every committed pick, pop `anonymity` decoys of the same amount
    /// from the node-provided pool and feed the input to the builder.
    ///
    /// Decoys colliding with the real output's global index, or repeating
    /// one another, are discarded; the pool must hold enough spares.
    pub fn add_mixed_inputs(
        &self,
        view_secret_key: &SecretKey,
        wallet_records: &HashMap<PublicKey, WalletRecord>,
        builder: &mut TransactionBuilder,
        anonymity: usize,
        mut response: RandomOutputsResponse,
    ) -> Result<(), TxError> {
        for unspent in &self.used_unspents {
            let pool = response.outputs.entry(unspent.amount).or_default();
            let mut mix_outputs: Vec<UnspentOutput> = Vec::with_capacity(anonymity);
            let mut taken = BTreeSet::new();
            while mix_outputs.len() < anonymity {
                let Some(output) = pool.pop() else {
                    return Err(TxError::NotEnoughRandomOutputs(unspent.amount));
                };
                if output.global_index == unspent.global_index
                    || !taken.insert(output.global_index)
                {
                    continue;
                }
                mix_outputs.push(output);
            }
            let address = self
                .currency
                .parse_account_address_string(&unspent.address)
                .map_err(|_| TxError::InvalidAddress(unspent.address.clone()))?;
            let record = wallet_records
                .get(&address.spend_public_key)
                .filter(|record| record.spend_public_key == address.spend_public_key)
                .ok_or_else(|| TxError::UnknownSpendKey(unspent.address.clone()))?;
            let sender_keys = AccountKeys {
                address,
                spend_secret_key: record.spend_secret_key,
                view_secret_key: *view_secret_key,
            };
            builder.add_input(&sender_keys, unspent.clone(), mix_outputs)?;
        }
        Ok(())
    }

    /// Partition the pool into denomination stacks and dust, skipping
    /// unconfirmed and still-locked outputs.
    fn create_have_coins(
        &self,
        block_height: Height,
        block_time: Timestamp,
        confirmed_height: Height,
    ) -> (HaveCoins, DustCoins, usize) {
        let mut have_coins = HaveCoins::new();
        let mut dust_coins = DustCoins::new();
        let mut max_digit = 0;
        for unspent in self.unspents.iter().rev() {
            if unspent.height >= confirmed_height {
                continue; // unconfirmed
            }
            if !self.currency.is_transaction_spend_time_unlocked(
                unspent.unlock_time,
                block_height,
                block_time,
            ) {
                continue;
            }
            if Currency::is_dust(unspent.amount) {
                dust_coins.entry(unspent.amount).or_default().push(unspent.clone());
            } else {
                let (digit, leading) = digit_decompose(unspent.amount);
                max_digit = max_digit.max(digit);
                have_coins
                    .entry(digit)
                    .or_default()
                    .entry(leading)
                    .or_default()
                    .push(unspent.clone());
            }
        }
        (have_coins, dust_coins, max_digit)
    }

    /// Record a provisional pick.
    fn take_coin(&mut self, coin: UnspentOutput) {
        self.used_total += coin.amount;
        self.inputs_count += 1;
        self.optimization_unspents.push(coin);
    }

    /// Commit provisional picks and remember their amounts for the
    /// random-outputs request.
    fn combine_optimized_unspents(&mut self) {
        for unspent in self.optimization_unspents.drain(..) {
            self.ra_amounts.push(unspent.amount);
            self.used_unspents.push(unspent);
        }
    }

    /// Return every provisional pick to its stack, exactly.
    fn unoptimize_amounts(&mut self, have_coins: &mut HaveCoins, dust_coins: &mut DustCoins) {
        for unspent in self.optimization_unspents.drain(..) {
            self.used_total -= unspent.amount;
            self.inputs_count -= 1;
            if Currency::is_dust(unspent.amount) {
                dust_coins.entry(unspent.amount).or_default().push(unspent);
            } else {
                let (digit, leading) = digit_decompose(unspent.amount);
                have_coins
                    .entry(digit)
                    .or_default()
                    .entry(leading)
                    .or_default()
                    .push(unspent);
            }
        }
    }

    /// One selection round against a fixed target. Returns false when the
    /// pool cannot cover it; provisional picks then remain for the caller
    /// to roll back or discard.
    fn select_coins(
        &mut self,
        have_coins: &mut HaveCoins,
        dust_coins: &mut DustCoins,
        max_digit: usize,
        target: Amount,
        anonymity: usize,
        mut optimization_count: usize,
    ) -> bool {
        trace!(target_amount = target, used_total = self.used_total, "selecting coins");
        if anonymity == 0 {
            if self.used_total < target {
                // a single dust coin covering the shortfall outright
                let shortfall = target - self.used_total;
                if let Some((&amount, _)) = dust_coins.range(shortfall..).next() {
                    let coin = pop_dust_coin(dust_coins, amount).expect("stack exists");
                    trace!(amount = coin.amount, "single large dust coin");
                    self.take_coin(coin);
                }
            }
            // sweep dust largest-first, bounded by the optimization budget
            while self.used_total < target && optimization_count >= 1 {
                let Some((&amount, _)) = dust_coins.iter().next_back() else {
                    break;
                };
                let coin = pop_dust_coin(dust_coins, amount).expect("stack exists");
                trace!(amount = coin.amount, "dust sweep coin");
                self.take_coin(coin);
                optimization_count -= 1;
            }
        }
        // compact oversized stacks of identical coins, ten at a time
        while optimization_count >= 10 {
            let mut best: Option<(usize, usize, usize)> = None; // (height, digit, leading)
            for (&digit, stacks) in have_coins.iter() {
                for (&leading, stack) in stacks.iter() {
                    if stack.len() > STACK_OPTIMIZATION_THRESHOLD
                        && best.map_or(true, |(height, _, _)| stack.len() > height)
                    {
                        best = Some((stack.len(), digit, leading));
                    }
                }
            }
            let Some((_, digit, leading)) = best else {
                break;
            };
            for _ in 0..10 {
                let coin = pop_have_coin(have_coins, digit, leading)
                    .expect("stack is above the threshold");
                trace!(amount = coin.amount, "stack compaction coin");
                self.take_coin(coin);
                optimization_count -= 1;
            }
        }
        self.optimize_amounts(have_coins, max_digit, target);
        if self.used_total >= target {
            return true;
        }
        // the smallest single coin covering the remaining shortfall
        let mut digit_amount: Amount = 1;
        'cover: for digit in 0..=max_digit {
            if let Some(stacks) = have_coins.get(&digit) {
                for &leading in stacks.keys() {
                    if leading as Amount * digit_amount >= target - self.used_total {
                        let coin = pop_have_coin(have_coins, digit, leading).expect("stack exists");
                        trace!(amount = coin.amount, "single covering coin");
                        self.take_coin(coin);
                        break 'cover;
                    }
                }
            }
            digit_amount = digit_amount.saturating_mul(10);
        }
        if self.used_total >= target {
            return true;
        }
        // fall back to the largest coins, dust included at zero anonymity
        self.unoptimize_amounts(have_coins, dust_coins);
        while self.used_total < target {
            let have_top = have_coins.iter().next_back().and_then(|(&digit, stacks)| {
                stacks
                    .iter()
                    .next_back()
                    .map(|(&leading, stack)| (digit, leading, stack.last().expect("non-empty").amount))
            });
            let have_amount = have_top.map_or(0, |(_, _, amount)| amount);
            let dust_amount = if anonymity == 0 {
                dust_coins.keys().next_back().copied().unwrap_or(0)
            } else {
                0
            };
            if have_amount == 0 && dust_amount == 0 {
                return false;
            }
            if have_amount > dust_amount {
                let (digit, leading, _) = have_top.expect("non-zero amount");
                let coin = pop_have_coin(have_coins, digit, leading).expect("stack exists");
                trace!(amount = coin.amount, "filler coin");
                self.take_coin(coin);
            } else {
                let coin = pop_dust_coin(dust_coins, dust_amount).expect("stack exists");
                trace!(amount = coin.amount, "filler dust coin");
                self.take_coin(coin);
            }
        }
        self.optimize_amounts(have_coins, max_digit, target);
        true
    }

    /// Digit rounding: for each decimal position, pick coins whose leading
    /// digits push that digit of `used_total` up to the next round value.
    ///
    /// Keeping `used_total - target` round concentrates the change in few
    /// high denominations, shrinking future transactions and preserving
    /// denomination variety in the wallet.
    fn optimize_amounts(&mut self, have_coins: &mut HaveCoins, max_digit: usize, target: Amount) {
        trace!(target_amount = target, used_total = self.used_total, "digit rounding");
        let mut digit_amount: i128 = 1;
        for digit in 0..=max_digit {
            // no rounding far beyond the requested sum
            if self.used_total >= target && digit_amount > self.used_total as i128 {
                break;
            }
            // coins of this denomination needed to reach the next round value
            let shortfall = target as i128 + digit_amount - 1 - self.used_total as i128;
            let am = (10 - shortfall.div_euclid(digit_amount).rem_euclid(10)) as usize;
            let Some(stacks) = have_coins.get(&digit) else {
                digit_amount *= 10;
                continue;
            };
            // prefer draining a pair of tall stacks whose digits sum to the fill
            let mut best_pair = None;
            let mut best_weight = 0;
            for (&a, stack_a) in stacks.iter() {
                for (&b, stack_b) in stacks.iter() {
                    if (a + b + am) % 10 == 0
                        && (stack_a.len() >= TWO_THRESHOLD || stack_b.len() >= TWO_THRESHOLD)
                        && stack_a.len() + stack_b.len() > best_weight
                    {
                        best_weight = stack_a.len() + stack_b.len();
                        best_pair = Some((a, b));
                    }
                }
            }
            if let Some((a, b)) = best_pair {
                debug!(digit, fill = 10 - am, pair = ?(a, b), weight = best_weight, "digit pair");
                for leading in [a, b] {
                    let coin =
                        pop_have_coin(have_coins, digit, leading).expect("pair stack exists");
                    self.take_coin(coin);
                }
                digit_amount *= 10;
                continue;
            }
            if am == 10 {
                digit_amount *= 10;
                continue;
            }
            // otherwise a single coin: an exact fill, or the tallest overshoot
            let mut best_single = 0;
            let mut best_weight = 0;
            for (&a, stack) in stacks.iter() {
                if (a + am) % 10 == 0 {
                    best_single = a;
                    break;
                }
                if a > 10 - am && stack.len() > best_weight {
                    best_weight = stack.len();
                    best_single = a;
                }
            }
            if best_single != 0 {
                debug!(digit, fill = 10 - am, coin = best_single, "digit single");
                let coin = pop_have_coin(have_coins, digit, best_single).expect("stack exists");
                self.take_coin(coin);
            }
            digit_amount *= 10;
        }
        trace!(used_total = self.used_total, "digit rounding done");
    }
}

/// Decimal position and leading digit of a canonical amount `d * 10^k`.
fn digit_decompose(amount: Amount) -> (usize, usize) {
    let mut digit = 0;
    let mut leading = amount;
    while leading > 9 {
        digit += 1;
        leading /= 10;
    }
    (digit, leading as usize)
}

fn pop_have_coin(have_coins: &mut HaveCoins, digit: usize, leading: usize) -> Option<UnspentOutput> {
    let stacks = have_coins.get_mut(&digit)?;
    let coin = {
        let stack = stacks.get_mut(&leading)?;
        let coin = stack.pop();
        if stack.is_empty() {
            stacks.remove(&leading);
        }
        coin
    };
    if stacks.is_empty() {
        have_coins.remove(&digit);
    }
    coin
}

fn pop_dust_coin(dust_coins: &mut DustCoins, amount: Amount) -> Option<UnspentOutput> {
    let stack = dust_coins.get_mut(&amount)?;
    let coin = stack.pop();
    if stack.is_empty() {
        dust_coins.remove(&amount);
    }
    coin
}
