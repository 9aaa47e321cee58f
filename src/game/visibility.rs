//! Area-of-interest diffing and party position broadcast.
//!
//! Every second tick, each viewer's known sets are diffed against what is
//! actually nearby: one create on entry, one remove on exit, cached
//! positions refreshed for everything that stays. Corpses are the one
//! asymmetry - a dead NPC leaves the proximity results but keeps its
//! entry until the corpse is really deleted, so the removal reaches
//! clients exactly once.

use super::{Env, System};
use crate::world::{Known, ObjKind, World};
use bytes::Bytes;
use runegate_proto::server;
use std::collections::HashMap;

/// Diff cadence: every 2 ticks (400 ms).
const VIS_TICKS: u64 = 2;
/// Party position cadence.
const PARTY_POS_TICKS: u64 = 10;

pub struct VisibilitySystem;

impl System for VisibilitySystem {
    fn name(&self) -> &'static str {
        "visibility"
    }

    fn update(&mut self, world: &mut World, env: &Env) {
        if world.tick % VIS_TICKS != 0 {
            return;
        }
        let chars: Vec<u32> = world.players.keys().copied().collect();
        for viewer in chars {
            refresh_viewer(world, env, viewer);
        }
    }
}

fn refresh_viewer(world: &mut World, env: &Env, viewer: u32) {
    let (map, x, y, session) = match world.players.get(&viewer) {
        Some(p) => (p.map, p.x, p.y, p.session_id),
        None => return,
    };
    let radius = env.config.game.visibility_radius;

    // Detach the known sets so the diff can read the world freely.
    let mut known = match world.players.get_mut(&viewer) {
        Some(p) => std::mem::take(&mut p.known),
        None => return,
    };

    diff_players(world, env, viewer, session, map, x, y, radius, &mut known);
    diff_npcs(world, env, session, map, x, y, radius, &mut known);
    diff_companions(world, env, session, map, x, y, radius, &mut known);
    diff_grounds(world, env, session, map, x, y, radius, &mut known);
    diff_doors(world, env, session, map, x, y, radius, &mut known);

    if let Some(p) = world.players.get_mut(&viewer) {
        p.known = known;
    }
}

/// Generic diff: emit creates for entries, removes for exits, refresh
/// cached positions for stayers. `keep_unlisted` lets corpses linger.
#[allow(clippy::too_many_arguments)]
fn apply_diff<F, K>(
    env: &Env,
    session: u64,
    known: &mut Known,
    kind: ObjKind,
    current: HashMap<u32, (i32, i32)>,
    mut create: F,
    mut keep_unlisted: K,
) where
    F: FnMut(u32) -> Vec<Bytes>,
    K: FnMut(u32) -> bool,
{
    let set = known.kind_mut(kind);

    // Exits first: gone from the current set and not held back.
    let gone: Vec<u32> = set
        .keys()
        .filter(|id| !current.contains_key(*id) && !keep_unlisted(**id))
        .copied()
        .collect();
    for id in gone {
        set.remove(&id);
        env.sessions.send_to(session, &server::remove_object(id));
    }

    // Entries and refreshes.
    for (id, pos) in current {
        match set.insert(id, pos) {
            None => {
                for pkt in create(id) {
                    env.sessions.send_to(session, &pkt);
                }
            }
            Some(_) => {
                // Cached prev-xy refreshed by the insert above.
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn diff_players(
    world: &World,
    env: &Env,
    viewer: u32,
    session: u64,
    map: u32,
    x: i32,
    y: i32,
    radius: i32,
    known: &mut Known,
) {
    let current: HashMap<u32, (i32, i32)> = world
        .nearby_players(map, x, y, radius)
        .into_iter()
        .filter(|&c| c != viewer)
        .filter_map(|c| world.players.get(&c))
        .filter(|p| p.invisible == 0)
        .map(|p| (p.char_id, (p.x, p.y)))
        .collect();

    apply_diff(
        env,
        session,
        known,
        ObjKind::Player,
        current,
        |id| {
            let Some(p) = world.players.get(&id) else {
                return Vec::new();
            };
            let gfx = p
                .poly_id
                .and_then(|poly| env.tables.polymorph(poly))
                .map(|t| t.gfx)
                .unwrap_or(100 + p.class as u16);
            let view = server::ObjectView {
                obj_id: p.char_id,
                kind: 1,
                x: p.x,
                y: p.y,
                heading: p.heading,
                gfx,
                status: if p.dead { 8 } else { 0 },
                lawful: p.lawful,
                name: p.name.clone(),
                poison_color: p.poison_color(),
            };
            let mut pkts = vec![server::put_object(&view)];
            // Colored poison/curse status resends so tints stay in sync.
            if view.poison_color != 0 {
                pkts.push(server::poison_color(p.char_id, view.poison_color));
            }
            pkts
        },
        |_| false,
    );
}

#[allow(clippy::too_many_arguments)]
fn diff_npcs(
    world: &World,
    env: &Env,
    session: u64,
    map: u32,
    x: i32,
    y: i32,
    radius: i32,
    known: &mut Known,
) {
    let current: HashMap<u32, (i32, i32)> = world
        .nearby_npcs(map, x, y, radius)
        .into_iter()
        .filter_map(|o| world.npcs.get(&o))
        .map(|n| (n.obj_id, (n.x, n.y)))
        .collect();

    apply_diff(
        env,
        session,
        known,
        ObjKind::Npc,
        current,
        |id| {
            let Some(n) = world.npcs.get(&id) else {
                return Vec::new();
            };
            let t = env.tables.npc(n.template);
            let view = server::ObjectView {
                obj_id: n.obj_id,
                kind: 2,
                x: n.x,
                y: n.y,
                heading: n.heading,
                gfx: t.map_or(0, |t| t.gfx),
                status: if n.dead { 8 } else { 0 },
                lawful: t.map_or(0, |t| t.lawful),
                name: t.map(|t| t.name.clone()).unwrap_or_default(),
                poison_color: n.poison_color,
            };
            let mut pkts = vec![server::put_object(&view)];
            if n.poison_color != 0 {
                pkts.push(server::poison_color(n.obj_id, n.poison_color));
            }
            pkts
        },
        // Corpses linger: a dead NPC drops out of the proximity index but
        // keeps its entry until deletion removes it from the world.
        |id| world.npcs.get(&id).is_some_and(|n| n.dead),
    );
}

#[allow(clippy::too_many_arguments)]
fn diff_companions(
    world: &World,
    env: &Env,
    session: u64,
    map: u32,
    x: i32,
    y: i32,
    radius: i32,
    known: &mut Known,
) {
    use crate::world::CompanionKind;
    let nearby = world.nearby_companions(map, x, y, radius);
    for kind in [
        CompanionKind::Summon,
        CompanionKind::Doll,
        CompanionKind::Follower,
        CompanionKind::Pet,
    ] {
        let current: HashMap<u32, (i32, i32)> = nearby
            .iter()
            .filter_map(|o| world.companions.get(o))
            .filter(|c| c.kind == kind)
            .map(|c| (c.obj_id, (c.x, c.y)))
            .collect();
        let obj_kind = match kind {
            CompanionKind::Summon => ObjKind::Summon,
            CompanionKind::Doll => ObjKind::Doll,
            CompanionKind::Follower => ObjKind::Follower,
            CompanionKind::Pet => ObjKind::Pet,
        };
        apply_diff(
            env,
            session,
            known,
            obj_kind,
            current,
            |id| {
                let Some(c) = world.companions.get(&id) else {
                    return Vec::new();
                };
                let view = server::CompanionView {
                    obj_id: c.obj_id,
                    master_id: c.master,
                    name: c.name.clone(),
                    level: c.level,
                    hp: (c.cur_hp, c.max_hp),
                    status: c.status.wire(),
                };
                vec![match kind {
                    CompanionKind::Summon => server::summon_pack(&view),
                    CompanionKind::Doll => server::doll_pack(&view),
                    CompanionKind::Follower => server::follower_pack(&view),
                    CompanionKind::Pet => server::pet_pack(&view),
                }]
            },
            |_| false,
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn diff_grounds(
    world: &World,
    env: &Env,
    session: u64,
    map: u32,
    x: i32,
    y: i32,
    radius: i32,
    known: &mut Known,
) {
    let current: HashMap<u32, (i32, i32)> = world
        .nearby_grounds(map, x, y, radius)
        .into_iter()
        .filter_map(|o| world.grounds.get(&o))
        .map(|g| (g.obj_id, (g.x, g.y)))
        .collect();

    apply_diff(
        env,
        session,
        known,
        ObjKind::GroundItem,
        current,
        |id| {
            let Some(g) = world.grounds.get(&id) else {
                return Vec::new();
            };
            vec![server::drop_item(
                g.obj_id,
                g.item.item_id,
                g.x,
                g.y,
                g.item.count,
            )]
        },
        |_| false,
    );
}

#[allow(clippy::too_many_arguments)]
fn diff_doors(
    world: &World,
    env: &Env,
    session: u64,
    map: u32,
    x: i32,
    y: i32,
    radius: i32,
    known: &mut Known,
) {
    let current: HashMap<u32, (i32, i32)> = world
        .nearby_doors(map, x, y, radius)
        .into_iter()
        .filter_map(|o| world.doors.get(&o))
        .map(|d| (d.obj_id, (d.x, d.y)))
        .collect();

    apply_diff(
        env,
        session,
        known,
        ObjKind::Door,
        current,
        |id| {
            let Some(d) = world.doors.get(&id) else {
                return Vec::new();
            };
            vec![server::door_perceive(d.obj_id, d.x, d.y, d.open)]
        },
        |_| false,
    );
}

/// Party member coordinates, refreshed every couple of seconds.
pub struct PartyPositionSystem;

impl System for PartyPositionSystem {
    fn name(&self) -> &'static str {
        "party-positions"
    }

    fn update(&mut self, world: &mut World, env: &Env) {
        if world.tick % PARTY_POS_TICKS != 0 {
            return;
        }
        let chars: Vec<u32> = world.players.keys().copied().collect();
        let mut seen_parties = std::collections::HashSet::new();
        for char_id in chars {
            let Some(party_id) = world.players.get(&char_id).and_then(|p| p.party) else {
                continue;
            };
            if !seen_parties.insert(party_id) {
                continue;
            }
            let Some(party) = world.parties.get(party_id) else {
                continue;
            };
            let positions: Vec<(u32, i32, i32)> = party
                .members
                .iter()
                .filter_map(|m| world.players.get(m))
                .map(|p| (p.char_id, p.x, p.y))
                .collect();
            let pkt = server::party_positions(&positions);
            for &member in &party.members {
                if let Some(m) = world.players.get(&member) {
                    env.sessions.send_to(m.session_id, &pkt);
                }
            }
        }
    }
}
