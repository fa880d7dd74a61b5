//! Deployment planner.
//!
//! Each side deploys into the two grid columns at its own edge. Allies hold
//! columns `0` (back) and `1` (front); enemies hold `size - 2` (front) and
//! `size - 1` (back). Ally squads are placed by a formation policy, enemy
//! squads by a slot order shuffled once per battle.
//!
//! Deployment never fails: when slots run out, excess squads clamp to the
//! last slot in the list.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::math::GridPos;
use crate::squad::{Side, Squad};

/// Ally-side formation policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FormationPolicy {
    /// Centre-weighted, mild front bias: front and back columns fill together.
    #[default]
    Balance,
    /// Front column first.
    Assault,
    /// Back column first.
    Defense,
    /// Caller-pinned slots: roster index -> slot index in [`deployment_slots`] order.
    Custom(BTreeMap<usize, usize>),
}

/// A cell a squad can deploy into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSlot {
    /// Cell of the slot.
    pub position: GridPos,
    /// Whether the slot is in the column facing the enemy.
    pub front: bool,
}

/// Front and back deployment columns for a side.
#[must_use]
pub const fn deployment_columns(side: Side, grid_size: u32) -> (i32, i32) {
    let size = grid_size as i32;
    match side {
        Side::Ally => (1, 0),
        Side::Enemy => (size - 2, size - 1),
    }
}

/// Legal slots for a side in canonical order: the front column top to bottom,
/// then the back column top to bottom.
#[must_use]
pub fn deployment_slots(side: Side, grid_size: u32) -> Vec<DeploymentSlot> {
    let (front, back) = deployment_columns(side, grid_size);
    let rows = grid_size as i32;
    let mut slots = Vec::with_capacity((rows * 2) as usize);
    for (column, is_front) in [(front, true), (back, false)] {
        for y in 0..rows {
            slots.push(DeploymentSlot {
                position: GridPos::new(column, y),
                front: is_front,
            });
        }
    }
    slots
}

/// Ordering score for a slot under a policy; lower fills first.
fn slot_score(slot: &DeploymentSlot, policy: &FormationPolicy, grid_size: u32) -> u32 {
    let centrality = (2 * slot.position.y - (grid_size as i32 - 1)).unsigned_abs();
    let column = match (policy, slot.front) {
        (FormationPolicy::Assault, true) | (FormationPolicy::Defense, false) => 0,
        (FormationPolicy::Assault, false) | (FormationPolicy::Defense, true) => 1000,
        (_, true) => 0,
        (_, false) => 1,
    };
    column + centrality
}

/// Compute deployment cells for `count` squads of one side, in roster order.
#[must_use]
pub fn plan_deployment(
    count: usize,
    side: Side,
    policy: &FormationPolicy,
    grid_size: u32,
) -> Vec<GridPos> {
    let slots = deployment_slots(side, grid_size);
    if slots.is_empty() {
        return vec![GridPos::default(); count];
    }

    match policy {
        FormationPolicy::Custom(pins) => plan_pinned(count, &slots, pins),
        _ => {
            let mut order: Vec<usize> = (0..slots.len()).collect();
            order.sort_by_key(|&i| (slot_score(&slots[i], policy, grid_size), i));
            plan_in_order(count, &slots, &order)
        }
    }
}

fn plan_in_order(count: usize, slots: &[DeploymentSlot], order: &[usize]) -> Vec<GridPos> {
    let last = order
        .last()
        .map_or(slots[slots.len() - 1].position, |&i| slots[i].position);
    if count > order.len() {
        tracing::warn!(
            squads = count,
            slots = order.len(),
            "Not enough deployment slots, excess squads clamp to the last slot"
        );
    }
    (0..count)
        .map(|n| order.get(n).map_or(last, |&i| slots[i].position))
        .collect()
}

fn plan_pinned(
    count: usize,
    slots: &[DeploymentSlot],
    pins: &BTreeMap<usize, usize>,
) -> Vec<GridPos> {
    let mut claimed = vec![false; slots.len()];
    let mut placed: Vec<Option<GridPos>> = vec![None; count];

    // Honour pins first so an unpinned squad never steals a pinned slot.
    for (roster_index, slot) in placed.iter_mut().enumerate() {
        if let Some(&pin) = pins.get(&roster_index) {
            if pin < slots.len() && !claimed[pin] {
                claimed[pin] = true;
                *slot = Some(slots[pin].position);
            }
        }
    }

    let last = slots[slots.len() - 1].position;
    for slot in &mut placed {
        if slot.is_some() {
            continue;
        }
        match claimed.iter().position(|taken| !taken) {
            Some(free) => {
                claimed[free] = true;
                *slot = Some(slots[free].position);
            }
            None => {
                tracing::warn!("Deployment slots exhausted, clamping squad to the last slot");
                *slot = Some(last);
            }
        }
    }

    placed.into_iter().map(|p| p.unwrap_or(last)).collect()
}

/// Shuffle the slot indices for enemy deployment.
///
/// Rolled once per battle; every later re-deployment reuses the same order.
pub fn shuffled_slot_order<R: Rng>(side: Side, grid_size: u32, rng: &mut R) -> Vec<usize> {
    let mut order: Vec<usize> = (0..deployment_slots(side, grid_size).len()).collect();
    order.shuffle(rng);
    order
}

/// Place one side's squads (roster order) according to a formation policy.
pub fn deploy(squads: &mut [Squad], side: Side, policy: &FormationPolicy, grid_size: u32) {
    let cells = plan_deployment(squads.len(), side, policy, grid_size);
    for (squad, cell) in squads.iter_mut().zip(cells) {
        squad.position = cell;
    }
}

/// Place one side's squads (roster order) into slots following a fixed order.
pub fn deploy_in_order(squads: &mut [Squad], side: Side, order: &[usize], grid_size: u32) {
    let slots = deployment_slots(side, grid_size);
    if slots.is_empty() {
        return;
    }
    let order: Vec<usize> = order.iter().copied().filter(|&i| i < slots.len()).collect();
    let cells = plan_in_order(squads.len(), &slots, &order);
    for (squad, cell) in squads.iter_mut().zip(cells) {
        squad.position = cell;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashSet;

    fn front_count(cells: &[GridPos], side: Side) -> usize {
        let (front, _) = deployment_columns(side, 10);
        cells.iter().filter(|c| c.x == front).count()
    }

    #[test]
    fn test_slots_are_two_edge_columns() {
        let ally = deployment_slots(Side::Ally, 10);
        assert_eq!(ally.len(), 20);
        assert!(ally.iter().all(|s| s.position.x == 0 || s.position.x == 1));
        assert!(ally[0].front && ally[0].position == GridPos::new(1, 0));

        let enemy = deployment_slots(Side::Enemy, 10);
        assert!(enemy.iter().all(|s| s.position.x == 8 || s.position.x == 9));
        assert!(enemy[0].front && enemy[0].position.x == 8);
    }

    #[test]
    fn test_assault_fills_front_first() {
        let cells = plan_deployment(6, Side::Ally, &FormationPolicy::Assault, 10);
        assert_eq!(front_count(&cells, Side::Ally), 6);
    }

    #[test]
    fn test_defense_fills_back_first() {
        let cells = plan_deployment(6, Side::Ally, &FormationPolicy::Defense, 10);
        assert_eq!(front_count(&cells, Side::Ally), 0);
    }

    #[test]
    fn test_balance_mixes_columns_around_centre() {
        let cells = plan_deployment(4, Side::Ally, &FormationPolicy::Balance, 10);
        assert_eq!(front_count(&cells, Side::Ally), 2);
        assert!(cells.iter().all(|c| c.y == 4 || c.y == 5));
    }

    #[test]
    fn test_assault_front_share_exceeds_defense() {
        for count in 1..20 {
            let assault = plan_deployment(count, Side::Enemy, &FormationPolicy::Assault, 10);
            let defense = plan_deployment(count, Side::Enemy, &FormationPolicy::Defense, 10);
            assert!(
                front_count(&assault, Side::Enemy) > front_count(&defense, Side::Enemy),
                "count {count}"
            );
        }
    }

    #[test]
    fn test_cells_unique_up_to_capacity() {
        for policy in [
            FormationPolicy::Balance,
            FormationPolicy::Assault,
            FormationPolicy::Defense,
        ] {
            let cells = plan_deployment(20, Side::Ally, &policy, 10);
            let unique: HashSet<_> = cells.iter().collect();
            assert_eq!(unique.len(), 20, "{policy:?}");
        }
    }

    #[test]
    fn test_custom_pins_and_fallback() {
        let slots = deployment_slots(Side::Ally, 10);
        let mut pins = BTreeMap::new();
        pins.insert(1, 0); // squad 1 pinned to slot 0
        pins.insert(2, 0); // squad 2 wants the same slot
        pins.insert(3, 99); // out of range
        let cells = plan_deployment(4, Side::Ally, &FormationPolicy::Custom(pins), 10);

        assert_eq!(cells[1], slots[0].position);
        // Squad 0 is unpinned and takes the first free slot after the pin.
        assert_eq!(cells[0], slots[1].position);
        assert_eq!(cells[2], slots[2].position);
        assert_eq!(cells[3], slots[3].position);
    }

    #[test]
    fn test_exhaustion_clamps_to_last_slot() {
        let cells = plan_deployment(22, Side::Ally, &FormationPolicy::Assault, 10);
        assert_eq!(cells.len(), 22);
        assert_eq!(cells[20], cells[19]);
        assert_eq!(cells[21], cells[19]);
    }

    #[test]
    fn test_shuffled_order_is_permutation() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut order = shuffled_slot_order(Side::Enemy, 10, &mut rng);
        order.sort_unstable();
        assert_eq!(order, (0..20).collect::<Vec<_>>());
    }
}
