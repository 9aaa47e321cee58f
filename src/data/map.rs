//! Directional passability and map regions.
//!
//! Passability is a per-tile bitmask of blocked headings plus a dynamic
//! occupancy overlay. The overlay is what entities toggle as they move or
//! die; the wall bits come from the external map loader and never change
//! at runtime.

use std::collections::{HashMap, HashSet};

/// A rectangular region where aggression is suppressed.
#[derive(Debug, Clone)]
pub struct SafetyZone {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl SafetyZone {
    fn contains(&self, x: i32, y: i32) -> bool {
        (self.x1..=self.x2).contains(&x) && (self.y1..=self.y2).contains(&y)
    }
}

/// One map's bounds, wall bits, zones, and occupancy overlay.
#[derive(Debug)]
pub struct MapGrid {
    pub map_id: u32,
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
    /// Blocked-heading bitmask per tile; bit h set = heading h blocked.
    walls: HashMap<(i32, i32), u8>,
    zones: Vec<SafetyZone>,
    occupied: HashSet<(i32, i32)>,
}

/// Heading deltas, 0 = north, clockwise.
pub const HEADING_DELTAS: [(i32, i32); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

impl MapGrid {
    /// An open map with the given bounds.
    pub fn new(map_id: u32, x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            map_id,
            x1,
            y1,
            x2,
            y2,
            walls: HashMap::new(),
            zones: Vec::new(),
            occupied: HashSet::new(),
        }
    }

    /// Block crossing into (x, y) from the given heading.
    pub fn add_wall(&mut self, x: i32, y: i32, heading: u8) {
        *self.walls.entry((x, y)).or_insert(0) |= 1 << (heading & 7);
    }

    pub fn add_safety_zone(&mut self, zone: SafetyZone) {
        self.zones.push(zone);
    }

    fn in_bounds(&self, x: i32, y: i32) -> bool {
        (self.x1..=self.x2).contains(&x) && (self.y1..=self.y2).contains(&y)
    }

    fn wall_blocked(&self, x: i32, y: i32, heading: u8) -> bool {
        self.walls
            .get(&(x, y))
            .is_some_and(|m| m & (1 << (heading & 7)) != 0)
    }
}

/// All loaded maps.
#[derive(Debug, Default)]
pub struct MapData {
    maps: HashMap<u32, MapGrid>,
}

impl MapData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, grid: MapGrid) {
        self.maps.insert(grid.map_id, grid);
    }

    /// Whether (x, y) can be entered from `heading`: in bounds, no wall
    /// bit, no occupant.
    pub fn is_passable(&self, map: u32, x: i32, y: i32, heading: u8) -> bool {
        self.is_passable_ignore_occupant(map, x, y, heading)
            && self
                .maps
                .get(&map)
                .is_some_and(|g| !g.occupied.contains(&(x, y)))
    }

    /// Wall-and-bounds check only. Companions use this to pass through NPCs.
    pub fn is_passable_ignore_occupant(&self, map: u32, x: i32, y: i32, heading: u8) -> bool {
        match self.maps.get(&map) {
            Some(g) => g.in_bounds(x, y) && !g.wall_blocked(x, y, heading),
            None => false,
        }
    }

    /// Toggle the occupancy overlay for a tile.
    pub fn set_impassable(&mut self, map: u32, x: i32, y: i32, blocked: bool) {
        if let Some(g) = self.maps.get_mut(&map) {
            if blocked {
                g.occupied.insert((x, y));
            } else {
                g.occupied.remove(&(x, y));
            }
        }
    }

    pub fn is_safety_zone(&self, map: u32, x: i32, y: i32) -> bool {
        self.maps
            .get(&map)
            .is_some_and(|g| g.zones.iter().any(|z| z.contains(x, y)))
    }

    pub fn is_in_map(&self, map: u32, x: i32, y: i32) -> bool {
        self.maps.get(&map).is_some_and(|g| g.in_bounds(x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_map() -> MapData {
        let mut md = MapData::new();
        md.insert(MapGrid::new(4, 0, 0, 200, 200));
        md
    }

    #[test]
    fn occupancy_blocks_only_the_normal_check() {
        let mut md = open_map();
        md.set_impassable(4, 10, 10, true);
        assert!(!md.is_passable(4, 10, 10, 0));
        assert!(md.is_passable_ignore_occupant(4, 10, 10, 0));
        md.set_impassable(4, 10, 10, false);
        assert!(md.is_passable(4, 10, 10, 0));
    }

    #[test]
    fn walls_block_by_heading() {
        let mut md = open_map();
        if let Some(g) = md.maps.get_mut(&4) {
            g.add_wall(5, 5, 2);
        }
        assert!(!md.is_passable(4, 5, 5, 2));
        assert!(md.is_passable(4, 5, 5, 6));
    }

    #[test]
    fn out_of_bounds_and_unknown_maps_fail() {
        let md = open_map();
        assert!(!md.is_passable(4, -1, 0, 0));
        assert!(!md.is_passable(99, 5, 5, 0));
        assert!(!md.is_in_map(99, 5, 5));
    }

    #[test]
    fn safety_zones_contain_their_rect() {
        let mut md = open_map();
        if let Some(g) = md.maps.get_mut(&4) {
            g.add_safety_zone(SafetyZone {
                x1: 0,
                y1: 0,
                x2: 20,
                y2: 20,
            });
        }
        assert!(md.is_safety_zone(4, 10, 10));
        assert!(!md.is_safety_zone(4, 30, 30));
    }
}
