// Fees - Dynamic base fee
use crate::types::{Balance, ChainRules, Header};

/// Base fee of the child of `parent`.
///
/// The first dynamic-fee block gets the initial base fee. Afterwards the fee
/// moves by at most 1/denominator per block, up when the parent used more
/// than its gas target and down when it used less.
pub fn calc_base_fee(rules: &ChainRules, parent: &Header) -> Balance {
    let parent_base_fee = match parent.base_fee {
        Some(fee) if rules.is_london(parent.number) => fee,
        _ => return rules.initial_base_fee,
    };

    let elasticity = rules.elasticity_multiplier.max(1);
    let denominator = rules.base_fee_change_denominator.max(1) as Balance;
    let target = (parent.gas_limit / elasticity) as Balance;
    let used = parent.gas_used as Balance;

    if target == 0 || used == target {
        return parent_base_fee;
    }

    if used > target {
        let delta = (parent_base_fee.saturating_mul(used - target) / target / denominator).max(1);
        parent_base_fee.saturating_add(delta)
    } else {
        let delta = parent_base_fee.saturating_mul(target - used) / target / denominator;
        parent_base_fee.saturating_sub(delta)
    }
}
