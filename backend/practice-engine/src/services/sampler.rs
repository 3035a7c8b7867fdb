//! Weighted sampling without replacement.

use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use std::collections::HashSet;

use crate::models::{QuestionKey, ScoredCandidate};

pub trait Weighted {
    fn weight(&self) -> f64;
    fn key(&self) -> QuestionKey;
}

impl Weighted for ScoredCandidate {
    fn weight(&self) -> f64 {
        self.score
    }

    fn key(&self) -> QuestionKey {
        ScoredCandidate::key(self)
    }
}

/// Negative and NaN weights count as zero.
fn effective_weight<T: Weighted>(item: &T) -> f64 {
    item.weight().max(0.0)
}

/// Draws up to `k` distinct items, each draw biased by weight.
///
/// The threshold of every draw is taken against the total weight of the
/// whole pool, including items already drawn. Later draws can therefore
/// overshoot what is left and land in the uniform fallback, which favours
/// the remaining items more evenly than a renormalised draw would.
///
/// Zero-weight items are only ever returned when the whole pool weighs
/// nothing, in which case the draw degrades to a uniform shuffle.
pub fn sample<T, R>(pool: &[T], k: usize, rng: &mut R) -> Vec<T>
where
    T: Weighted + Clone,
    R: Rng + ?Sized,
{
    if pool.is_empty() || k == 0 {
        return Vec::new();
    }

    let total_weight: f64 = pool.iter().map(effective_weight).sum();
    let mut used: HashSet<QuestionKey> = HashSet::new();

    if total_weight <= 0.0 {
        let mut shuffled: Vec<&T> = pool.iter().collect();
        shuffled.shuffle(rng);
        return shuffled
            .into_iter()
            .filter(|item| used.insert(item.key()))
            .take(k)
            .cloned()
            .collect();
    }

    let mut selected = Vec::with_capacity(k.min(pool.len()));
    while selected.len() < k {
        let threshold = rng.random::<f64>() * total_weight;
        let index = match draw_index(pool, &used, threshold) {
            Some(index) => index,
            None => {
                let remaining: Vec<usize> = pool
                    .iter()
                    .enumerate()
                    .filter(|(_, item)| {
                        effective_weight(*item) > 0.0 && !used.contains(&item.key())
                    })
                    .map(|(index, _)| index)
                    .collect();
                match remaining.choose(rng) {
                    Some(&index) => index,
                    None => break,
                }
            }
        };

        let item = &pool[index];
        used.insert(item.key());
        selected.push(item.clone());
    }

    selected
}

/// Walks unused, positively weighted items and returns the first whose
/// running weight reaches `threshold`.
fn draw_index<T: Weighted>(pool: &[T], used: &HashSet<QuestionKey>, threshold: f64) -> Option<usize> {
    let mut cumulative = 0.0;
    for (index, item) in pool.iter().enumerate() {
        let weight = effective_weight(item);
        if weight <= 0.0 || used.contains(&item.key()) {
            continue;
        }
        cumulative += weight;
        if cumulative >= threshold {
            return Some(index);
        }
    }
    None
}
