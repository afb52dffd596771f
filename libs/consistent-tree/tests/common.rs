#![allow(unused, reason = "not used by all tests")]

use std::collections::BTreeSet;

use rand::seq::SliceRandom;

/// `n` distinct values starting at `start`, in random order.
pub fn shuffled(start: i32, n: usize) -> Vec<i32> {
    let end = start + i32::try_from(n).unwrap();
    let mut values: Vec<_> = (start..end).collect();
    values.shuffle(&mut rand::rng());
    values
}

/// `n` values drawn from `range`, duplicates included.
pub fn sampled(range: std::ops::Range<i32>, n: usize) -> Vec<i32> {
    use rand::Rng;

    let mut rng = rand::rng();
    (0..n).map(|_| rng.random_range(range.clone())).collect()
}

pub fn sorted(set: &BTreeSet<i32>) -> Vec<i32> {
    set.iter().copied().collect()
}
