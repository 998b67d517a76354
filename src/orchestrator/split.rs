//! Stratified, seeded train / held-out split of the base corpus

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;

use crate::types::{Example, Label};

/// Split `examples` into `(train, held_out)`.
///
/// Each label contributes `round(n * fraction)` examples to the held-out
/// slice, capped so at least one stays in training. Labels with a single
/// example are never held out. Both halves keep the input order, and the
/// result depends only on the inputs and `seed`.
pub fn stratified_split(examples: &[Example], fraction: f64, seed: u64) -> (Vec<Example>, Vec<Example>) {
    let mut by_label: BTreeMap<Label, Vec<usize>> = BTreeMap::new();
    for (i, example) in examples.iter().enumerate() {
        by_label.entry(example.label).or_default().push(i);
    }

    let fraction = fraction.clamp(0.0, 1.0);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut held_out_idx = Vec::new();

    for indices in by_label.values_mut() {
        indices.shuffle(&mut rng);
        let n = indices.len();
        let wanted = (n as f64 * fraction).round() as usize;
        let take = wanted.min(n.saturating_sub(1));
        held_out_idx.extend_from_slice(&indices[..take]);
    }

    held_out_idx.sort_unstable();
    let mut train = Vec::with_capacity(examples.len() - held_out_idx.len());
    let mut held_out = Vec::with_capacity(held_out_idx.len());
    let mut next = held_out_idx.iter().peekable();
    for (i, example) in examples.iter().enumerate() {
        if next.peek() == Some(&&i) {
            next.next();
            held_out.push(example.clone());
        } else {
            train.push(example.clone());
        }
    }
    (train, held_out)
}
