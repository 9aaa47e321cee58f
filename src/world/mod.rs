//! World state.
//!
//! The `World` is the explicitly-constructed root object owning every
//! gameplay collection. It is moved onto the tick thread at startup and
//! never touched from anywhere else; network tasks speak to it only
//! through session queues.

pub mod buff;
pub mod clan;
pub mod companion;
pub mod ground;
pub mod inventory;
pub mod npc;
pub mod party;
pub mod player;
pub mod trade;

pub use buff::{ActiveBuff, BuffMap};
pub use clan::{Clan, ClanManager, ClanMember};
pub use companion::{Companion, CompanionKind, CompanionStatus, FollowerOrigin};
pub use ground::{Door, GroundItem};
pub use inventory::{Inventory, ItemInstance, ADENA, MITHRIL};
pub use npc::{HateList, Npc, NpcDebuff, NpcPoison};
pub use party::{LeaveOutcome, Party, PartyManager};
pub use player::{
    Bookmark, Known, ObjKind, Paralysis, PendingDialog, Player, Poison, PoisonKind, OBJ_KINDS,
};
pub use trade::{Trade, TradeBook, TradeSide};

use crate::data::MapData;
use std::collections::{HashMap, HashSet, VecDeque};

/// Milliseconds per tick at 5 Hz.
pub const TICK_MS: u64 = 200;

/// Runtime object ids (NPCs, companions, ground items) start here so they
/// never collide with database character ids.
const RUNTIME_ID_BASE: u32 = 0x4000_0000;

/// Chebyshev distance between two tiles.
pub fn chebyshev(x1: i32, y1: i32, x2: i32, y2: i32) -> i32 {
    (x1 - x2).abs().max((y1 - y2).abs())
}

/// Heading from one tile toward another, 0 = north, clockwise.
pub fn heading_toward(x1: i32, y1: i32, x2: i32, y2: i32) -> u8 {
    let dx = (x2 - x1).signum();
    let dy = (y2 - y1).signum();
    match (dx, dy) {
        (0, -1) => 0,
        (1, -1) => 1,
        (1, 0) => 2,
        (1, 1) => 3,
        (0, 1) => 4,
        (-1, 1) => 5,
        (-1, 0) => 6,
        (-1, -1) => 7,
        _ => 0,
    }
}

/// What a world object id resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRef {
    Player(u32),
    Npc(u32),
    Companion(u32),
}

/// A queued attack, drained FIFO in the update phase.
#[derive(Debug, Clone, Copy)]
pub struct CombatRequest {
    pub attacker: u64,
    pub target: u32,
    pub ranged: bool,
}

/// A queued skill cast, drained FIFO in the update phase.
#[derive(Debug, Clone, Copy)]
pub struct SkillRequest {
    pub caster: u64,
    pub skill_id: u16,
    pub target: u32,
    pub x: i32,
    pub y: i32,
}

/// Handler-filled queues; execution happens in phase order, after all
/// input for the tick has been drained.
#[derive(Debug, Default)]
pub struct ActionQueues {
    pub combat: VecDeque<CombatRequest>,
    pub skill: VecDeque<SkillRequest>,
}

/// Deferred destruction; drained in the cleanup phase so ids stay
/// dereferenceable for the rest of the tick that killed them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destroy {
    Npc(u32),
    Companion(u32),
    Ground(u32),
}

/// A dead spawn waiting to come back.
#[derive(Debug, Clone, Copy)]
pub struct PendingRespawn {
    pub npc_id: u32,
    pub map: u32,
    pub x: i32,
    pub y: i32,
    pub ticks_left: u32,
}

/// Events systems emit for out-of-core consumers (quest hooks, logs).
#[derive(Debug, Clone, Copy)]
pub enum WorldEvent {
    EntityKilled { npc_obj: u32, killer_session: u64 },
}

/// One ranking line, recomputed periodically.
#[derive(Debug, Clone)]
pub struct RankEntry {
    pub name: String,
    pub level: u16,
    pub exp: u64,
}

/// Per-map membership sets backing proximity queries.
#[derive(Debug, Default)]
struct MapIndex {
    players: HashSet<u32>,
    npcs: HashSet<u32>,
    companions: HashSet<u32>,
    grounds: HashSet<u32>,
    doors: HashSet<u32>,
}

/// The root object.
pub struct World {
    pub tick: u64,
    pub map_data: MapData,

    pub players: HashMap<u32, Player>,
    session_chars: HashMap<u64, u32>,
    pub npcs: HashMap<u32, Npc>,
    pub companions: HashMap<u32, Companion>,
    pub grounds: HashMap<u32, GroundItem>,
    pub doors: HashMap<u32, Door>,
    index: HashMap<u32, MapIndex>,

    pub parties: PartyManager,
    pub chat_parties: PartyManager,
    pub clans: ClanManager,
    pub trades: TradeBook,

    pub queues: ActionQueues,
    pub destroy_queue: Vec<Destroy>,
    pub respawns: Vec<PendingRespawn>,
    pub events: Vec<WorldEvent>,
    pub ranking: Vec<RankEntry>,

    /// Warehouse memory caches keyed by (kind byte, owner); row deltas in
    /// the database mirror these for every completed operation.
    pub warehouses: HashMap<(u8, String), Vec<ItemInstance>>,
    /// Highest WAL row id whose memory effects are visible; persistence
    /// marks up to here once the involved players are saved.
    pub wal_high_water: i64,

    next_obj_id: u32,
}

impl World {
    pub fn new(map_data: MapData) -> Self {
        Self {
            tick: 0,
            map_data,
            players: HashMap::new(),
            session_chars: HashMap::new(),
            npcs: HashMap::new(),
            companions: HashMap::new(),
            grounds: HashMap::new(),
            doors: HashMap::new(),
            index: HashMap::new(),
            parties: PartyManager::new(),
            chat_parties: PartyManager::new(),
            clans: ClanManager::new(),
            trades: TradeBook::new(),
            queues: ActionQueues::default(),
            destroy_queue: Vec::new(),
            respawns: Vec::new(),
            events: Vec::new(),
            ranking: Vec::new(),
            warehouses: HashMap::new(),
            wal_high_water: 0,
            next_obj_id: RUNTIME_ID_BASE,
        }
    }

    /// World clock in milliseconds, derived from the tick counter.
    pub fn now_ms(&self) -> u64 {
        self.tick * TICK_MS
    }

    pub fn alloc_obj_id(&mut self) -> u32 {
        let id = self.next_obj_id;
        self.next_obj_id += 1;
        id
    }

    /// Keep fresh allocations above ids already persisted on disk.
    pub fn reserve_obj_ids(&mut self, floor: u32) {
        self.next_obj_id = self.next_obj_id.max(floor.saturating_add(1));
    }

    fn index_mut(&mut self, map: u32) -> &mut MapIndex {
        self.index.entry(map).or_default()
    }

    // --- Players ---

    pub fn add_player(&mut self, player: Player) {
        let (map, x, y) = (player.map, player.x, player.y);
        self.session_chars.insert(player.session_id, player.char_id);
        self.index_mut(map).players.insert(player.char_id);
        self.map_data.set_impassable(map, x, y, true);
        self.players.insert(player.char_id, player);
    }

    pub fn remove_player(&mut self, char_id: u32) -> Option<Player> {
        let player = self.players.remove(&char_id)?;
        self.session_chars.remove(&player.session_id);
        if let Some(ix) = self.index.get_mut(&player.map) {
            ix.players.remove(&char_id);
        }
        self.map_data
            .set_impassable(player.map, player.x, player.y, false);
        Some(player)
    }

    pub fn char_by_session(&self, session: u64) -> Option<u32> {
        self.session_chars.get(&session).copied()
    }

    pub fn player_by_session(&self, session: u64) -> Option<&Player> {
        self.char_by_session(session)
            .and_then(|c| self.players.get(&c))
    }

    pub fn player_by_session_mut(&mut self, session: u64) -> Option<&mut Player> {
        let c = self.char_by_session(session)?;
        self.players.get_mut(&c)
    }

    pub fn player_by_name(&self, name: &str) -> Option<&Player> {
        self.players.values().find(|p| p.name == name)
    }

    /// Move a player, maintaining occupancy and the map index on map
    /// changes (teleports).
    pub fn relocate_player(&mut self, char_id: u32, map: u32, x: i32, y: i32) {
        let Some(p) = self.players.get_mut(&char_id) else {
            return;
        };
        let (old_map, old_x, old_y) = (p.map, p.x, p.y);
        p.map = map;
        p.x = x;
        p.y = y;
        self.map_data.set_impassable(old_map, old_x, old_y, false);
        self.map_data.set_impassable(map, x, y, true);
        if old_map != map {
            if let Some(ix) = self.index.get_mut(&old_map) {
                ix.players.remove(&char_id);
            }
            self.index_mut(map).players.insert(char_id);
        }
    }

    // --- NPCs ---

    pub fn add_npc(&mut self, npc: Npc) {
        self.index_mut(npc.map).npcs.insert(npc.obj_id);
        self.map_data.set_impassable(npc.map, npc.x, npc.y, true);
        self.npcs.insert(npc.obj_id, npc);
    }

    pub fn remove_npc(&mut self, obj_id: u32) -> Option<Npc> {
        let npc = self.npcs.remove(&obj_id)?;
        if let Some(ix) = self.index.get_mut(&npc.map) {
            ix.npcs.remove(&obj_id);
        }
        Some(npc)
    }

    /// Drop a dead NPC out of the proximity index without deleting it; the
    /// corpse stays renderable until the delete timer fires.
    pub fn unindex_npc(&mut self, obj_id: u32) {
        if let Some(npc) = self.npcs.get(&obj_id) {
            let map = npc.map;
            let id = npc.obj_id;
            if let Some(ix) = self.index.get_mut(&map) {
                ix.npcs.remove(&id);
            }
        }
    }

    pub fn relocate_npc(&mut self, obj_id: u32, x: i32, y: i32) {
        let Some(n) = self.npcs.get_mut(&obj_id) else {
            return;
        };
        let (map, old_x, old_y) = (n.map, n.x, n.y);
        n.x = x;
        n.y = y;
        self.map_data.set_impassable(map, old_x, old_y, false);
        self.map_data.set_impassable(map, x, y, true);
    }

    // --- Companions ---

    pub fn add_companion(&mut self, c: Companion) {
        if let Some(p) = self.players.get_mut(&c.master) {
            p.companions.push(c.obj_id);
        }
        self.index_mut(c.map).companions.insert(c.obj_id);
        self.companions.insert(c.obj_id, c);
    }

    pub fn remove_companion(&mut self, obj_id: u32) -> Option<Companion> {
        let c = self.companions.remove(&obj_id)?;
        if let Some(ix) = self.index.get_mut(&c.map) {
            ix.companions.remove(&obj_id);
        }
        if let Some(p) = self.players.get_mut(&c.master) {
            p.companions.retain(|&o| o != obj_id);
        }
        Some(c)
    }

    pub fn relocate_companion(&mut self, obj_id: u32, map: u32, x: i32, y: i32) {
        let Some(c) = self.companions.get_mut(&obj_id) else {
            return;
        };
        let old_map = c.map;
        c.map = map;
        c.x = x;
        c.y = y;
        if old_map != map {
            if let Some(ix) = self.index.get_mut(&old_map) {
                ix.companions.remove(&obj_id);
            }
            self.index_mut(map).companions.insert(obj_id);
        }
    }

    // --- Ground items & doors ---

    pub fn add_ground(&mut self, g: GroundItem) {
        self.index_mut(g.map).grounds.insert(g.obj_id);
        self.grounds.insert(g.obj_id, g);
    }

    pub fn remove_ground(&mut self, obj_id: u32) -> Option<GroundItem> {
        let g = self.grounds.remove(&obj_id)?;
        if let Some(ix) = self.index.get_mut(&g.map) {
            ix.grounds.remove(&obj_id);
        }
        Some(g)
    }

    pub fn add_door(&mut self, d: Door) {
        self.index_mut(d.map).doors.insert(d.obj_id);
        self.doors.insert(d.obj_id, d);
    }

    // --- Queries ---

    pub fn nearby_players(&self, map: u32, x: i32, y: i32, radius: i32) -> Vec<u32> {
        let Some(ix) = self.index.get(&map) else {
            return Vec::new();
        };
        ix.players
            .iter()
            .filter(|id| {
                self.players
                    .get(id)
                    .is_some_and(|p| chebyshev(p.x, p.y, x, y) <= radius)
            })
            .copied()
            .collect()
    }

    /// Session ids of nearby players, the broadcast fan-out list.
    pub fn nearby_player_sessions(&self, map: u32, x: i32, y: i32, radius: i32) -> Vec<u64> {
        self.nearby_players(map, x, y, radius)
            .into_iter()
            .filter_map(|c| self.players.get(&c).map(|p| p.session_id))
            .collect()
    }

    pub fn nearby_npcs(&self, map: u32, x: i32, y: i32, radius: i32) -> Vec<u32> {
        let Some(ix) = self.index.get(&map) else {
            return Vec::new();
        };
        ix.npcs
            .iter()
            .filter(|id| {
                self.npcs
                    .get(id)
                    .is_some_and(|n| chebyshev(n.x, n.y, x, y) <= radius)
            })
            .copied()
            .collect()
    }

    pub fn nearby_companions(&self, map: u32, x: i32, y: i32, radius: i32) -> Vec<u32> {
        let Some(ix) = self.index.get(&map) else {
            return Vec::new();
        };
        ix.companions
            .iter()
            .filter(|id| {
                self.companions
                    .get(id)
                    .is_some_and(|c| chebyshev(c.x, c.y, x, y) <= radius)
            })
            .copied()
            .collect()
    }

    pub fn nearby_grounds(&self, map: u32, x: i32, y: i32, radius: i32) -> Vec<u32> {
        let Some(ix) = self.index.get(&map) else {
            return Vec::new();
        };
        ix.grounds
            .iter()
            .filter(|id| {
                self.grounds
                    .get(id)
                    .is_some_and(|g| chebyshev(g.x, g.y, x, y) <= radius)
            })
            .copied()
            .collect()
    }

    pub fn nearby_doors(&self, map: u32, x: i32, y: i32, radius: i32) -> Vec<u32> {
        let Some(ix) = self.index.get(&map) else {
            return Vec::new();
        };
        ix.doors
            .iter()
            .filter(|id| {
                self.doors
                    .get(id)
                    .is_some_and(|d| chebyshev(d.x, d.y, x, y) <= radius)
            })
            .copied()
            .collect()
    }

    /// What an object id names right now. Dead-but-undeleted NPCs still
    /// resolve; callers check liveness themselves.
    pub fn resolve_target(&self, obj_id: u32) -> Option<TargetRef> {
        if self.players.contains_key(&obj_id) {
            return Some(TargetRef::Player(obj_id));
        }
        if self.npcs.contains_key(&obj_id) {
            return Some(TargetRef::Npc(obj_id));
        }
        if self.companions.contains_key(&obj_id) {
            return Some(TargetRef::Companion(obj_id));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MapGrid;

    fn world() -> World {
        let mut md = MapData::new();
        md.insert(MapGrid::new(4, 0, 0, 500, 500));
        World::new(md)
    }

    fn player(char_id: u32, session: u64, x: i32, y: i32) -> Player {
        let mut p = Player::new(char_id, session, "acc".into(), format!("p{char_id}"));
        p.map = 4;
        p.x = x;
        p.y = y;
        p
    }

    #[test]
    fn add_remove_player_maintains_index_and_occupancy() {
        let mut w = world();
        w.add_player(player(1, 100, 50, 50));
        assert!(!w.map_data.is_passable(4, 50, 50, 0));
        assert_eq!(w.nearby_players(4, 55, 50, 10), vec![1]);
        assert_eq!(w.char_by_session(100), Some(1));

        w.remove_player(1);
        assert!(w.map_data.is_passable(4, 50, 50, 0));
        assert!(w.nearby_players(4, 55, 50, 10).is_empty());
        assert_eq!(w.char_by_session(100), None);
    }

    #[test]
    fn relocate_player_moves_occupancy() {
        let mut w = world();
        w.add_player(player(1, 100, 10, 10));
        w.relocate_player(1, 4, 11, 10);
        assert!(w.map_data.is_passable(4, 10, 10, 0));
        assert!(!w.map_data.is_passable(4, 11, 10, 0));
    }

    #[test]
    fn nearby_uses_chebyshev() {
        let mut w = world();
        w.add_player(player(1, 100, 50, 50));
        w.add_player(player(2, 101, 70, 50));
        assert_eq!(w.nearby_players(4, 50, 50, 20).len(), 2);
        assert_eq!(w.nearby_players(4, 50, 50, 19).len(), 1);
    }

    #[test]
    fn runtime_ids_avoid_char_id_space() {
        let mut w = world();
        let id = w.alloc_obj_id();
        assert!(id >= RUNTIME_ID_BASE);
        assert_ne!(w.alloc_obj_id(), id);
    }
}
