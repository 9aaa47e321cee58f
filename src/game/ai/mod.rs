//! NPC and companion intelligence.

pub mod companion;
pub mod monster;

use crate::world::{heading_toward, World};

/// One-tile step toward a goal: the direct heading first, then the two
/// side-step candidates. Returns the chosen tile, or `None` when all
/// three are blocked.
///
/// `ignore_occupants` is the companions' last-resort pass (they slip
/// through NPCs but not players).
pub(crate) fn step_toward(
    world: &World,
    map: u32,
    from: (i32, i32),
    to: (i32, i32),
    ignore_occupants: bool,
) -> Option<(i32, i32, u8)> {
    let direct = heading_toward(from.0, from.1, to.0, to.1);
    for dir in [direct, (direct + 1) & 7, (direct + 7) & 7] {
        let (dx, dy) = crate::data::map::HEADING_DELTAS[dir as usize];
        let cand = (from.0 + dx, from.1 + dy);
        let ok = if ignore_occupants {
            world
                .map_data
                .is_passable_ignore_occupant(map, cand.0, cand.1, dir)
        } else {
            world.map_data.is_passable(map, cand.0, cand.1, dir)
        };
        if ok {
            return Some((cand.0, cand.1, dir));
        }
    }
    None
}
