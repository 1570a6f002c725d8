use rand::seq::SliceRandom;
use rand::Rng;

use crate::{Assignments, ParticipantId};

/// Shuffles a copy of `ids` and links every position to the next one,
/// wrapping around. The result is a single cycle over all ids, so nobody
/// draws themselves. Fewer than two ids yields an empty map; callers
/// reject that case before drawing.
pub fn generate_assignments<R>(ids: &[ParticipantId], rng: &mut R) -> Assignments
where
    R: Rng + ?Sized,
{
    if ids.len() < 2 {
        return Assignments::new();
    }
    let mut order = ids.to_vec();
    order.shuffle(rng);
    assign_cycle(&order)
}

/// Pairs `order[i]` with `order[(i + 1) % n]`.
pub fn assign_cycle(order: &[ParticipantId]) -> Assignments {
    if order.len() < 2 {
        return Assignments::new();
    }
    order
        .iter()
        .enumerate()
        .map(|(i, giver)| (giver.clone(), order[(i + 1) % order.len()].clone()))
        .collect()
}
