//! NPC corpse deletion and respawn, plus ground-item decay.

use super::{Env, System};
use crate::world::{Destroy, Npc, PendingRespawn, World};
use tracing::{debug, warn};

pub struct RespawnSystem;

impl System for RespawnSystem {
    fn name(&self) -> &'static str {
        "respawn"
    }

    fn update(&mut self, world: &mut World, env: &Env) {
        // Respawn timers first, so a corpse deleted this tick waits its
        // full delay starting next tick.
        let mut due: Vec<PendingRespawn> = Vec::new();
        world.respawns.retain_mut(|r| {
            r.ticks_left = r.ticks_left.saturating_sub(1);
            if r.ticks_left == 0 {
                due.push(*r);
                false
            } else {
                true
            }
        });
        for r in due {
            spawn_npc(world, env, r.npc_id, r.map, r.x, r.y);
        }

        // Corpse timers: deletion is deferred to the cleanup phase so the
        // id stays dereferenceable for the rest of this tick.
        let mut to_delete: Vec<u32> = Vec::new();
        for (&obj, n) in world.npcs.iter_mut() {
            if let Some(t) = n.delete_ticks.as_mut() {
                *t = t.saturating_sub(1);
                if *t == 0 {
                    to_delete.push(obj);
                }
            }
        }
        for obj in to_delete {
            let Some(n) = world.npcs.get(&obj) else { continue };
            let template = n.template;
            let (map, x, y) = (n.map, n.spawn_x, n.spawn_y);
            let delay = env
                .tables
                .npc(template)
                .map(|t| t.respawn_delay_secs * 5)
                .unwrap_or(150);
            world.respawns.push(PendingRespawn {
                npc_id: template,
                map,
                x,
                y,
                ticks_left: delay,
            });
            world.destroy_queue.push(Destroy::Npc(obj));
        }

        // Ground items rot.
        let mut expired: Vec<u32> = Vec::new();
        for (&obj, g) in world.grounds.iter_mut() {
            g.ttl = g.ttl.saturating_sub(1);
            if g.ttl == 0 {
                expired.push(obj);
            }
        }
        for obj in expired {
            world.destroy_queue.push(Destroy::Ground(obj));
        }
    }
}

/// Spawn one NPC from its template. A missing template is logged and
/// skipped; the spawn point stays empty.
pub fn spawn_npc(world: &mut World, env: &Env, npc_id: u32, map: u32, x: i32, y: i32) -> Option<u32> {
    let Some(template) = env.tables.npc(npc_id) else {
        warn!(npc = %npc_id, "Respawn skipped: no template");
        return None;
    };
    let obj_id = world.alloc_obj_id();
    let npc = Npc::new(obj_id, npc_id, map, x, y, template.hp, template.mp);
    world.add_npc(npc);
    debug!(npc = %npc_id, obj = %obj_id, map = %map, "NPC spawned");
    crate::metrics::LIVE_NPCS.set(world.npcs.values().filter(|n| !n.dead).count() as i64);
    Some(obj_id)
}

/// Populate the world from the spawn table at startup.
pub fn spawn_world(world: &mut World, env: &Env) {
    let spawns: Vec<_> = env.tables.spawns().to_vec();
    for s in spawns {
        for _ in 0..s.count {
            spawn_npc(world, env, s.npc_id, s.map, s.x, s.y);
        }
    }
}
