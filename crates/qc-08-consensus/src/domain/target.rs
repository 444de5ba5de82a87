//! # Targets and Weights
//!
//! A target is the largest block ID, read as a big-endian 256-bit integer,
//! that counts as a solution. Lower targets are harder. The weight of a
//! block is the expected number of attempts needed to meet its target.

use primitive_types::{U256, U512};
use shared_types::{Block, BlockId};

/// Largest per-block change of the target, as `num / den`.
const MAX_ADJUSTMENT_UP: (u64, u64) = (1001, 1000);
const MAX_ADJUSTMENT_DOWN: (u64, u64) = (1000, 1001);

/// True if `id` is a solution for `target`.
pub fn meets_target(id: &BlockId, target: &U256) -> bool {
    U256::from_big_endian(id.as_bytes()) <= *target
}

/// Expected work to meet `target`.
pub fn block_weight(target: &U256) -> U256 {
    if target.is_zero() {
        return U256::MAX;
    }
    U256::MAX / *target
}

fn mul_div(value: &U256, num: u64, den: u64) -> U256 {
    let product: U512 = value.full_mul(U256::from(num));
    let quotient = product / U512::from(den.max(1));
    U256::try_from(quotient).unwrap_or(U256::MAX)
}

/// Target for the children of a block whose own target is `current`.
///
/// `elapsed` is the time the last `blocks` blocks took; the target scales
/// by `elapsed / (blocks * frequency)`, limited to a factor of 1001/1000 in
/// either direction and never easier than `root_target`.
pub fn adjust_target(
    current: &U256,
    elapsed: u64,
    blocks: u64,
    frequency: u64,
    root_target: &U256,
) -> U256 {
    let expected = blocks.saturating_mul(frequency);
    if expected == 0 {
        return (*current).min(*root_target);
    }
    let scaled = mul_div(current, elapsed, expected);
    let ceiling = mul_div(current, MAX_ADJUSTMENT_UP.0, MAX_ADJUSTMENT_UP.1);
    let floor = mul_div(current, MAX_ADJUSTMENT_DOWN.0, MAX_ADJUSTMENT_DOWN.1);
    scaled.clamp(floor, ceiling).min(*root_target)
}

/// Grind the nonce until the block ID meets `target`.
///
/// Returns false, leaving the last tried nonce in place, if no solution is
/// found within `max_attempts`.
pub fn solve_block(block: &mut Block, target: &U256, max_attempts: u64) -> bool {
    let mut header = block.header();
    for _ in 0..max_attempts {
        if meets_target(&header.id(), target) {
            block.nonce = header.nonce;
            return true;
        }
        header.nonce = header.nonce.wrapping_add(1);
    }
    block.nonce = header.nonce;
    false
}
