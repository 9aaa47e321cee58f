//! Cleanup phase: drain the deferred destroy queue and the event buffer.
//!
//! Entities queued for destruction earlier in the tick stay
//! dereferenceable until here; the removal broadcast goes out as they go.

use super::{broadcast_nearby, Env, System};
use crate::world::{Destroy, World, WorldEvent};
use runegate_proto::server;
use tracing::debug;

pub struct CleanupSystem;

impl System for CleanupSystem {
    fn name(&self) -> &'static str {
        "cleanup"
    }

    fn update(&mut self, world: &mut World, env: &Env) {
        let queued: Vec<Destroy> = world.destroy_queue.drain(..).collect();
        for d in queued {
            match d {
                Destroy::Npc(obj) => {
                    if let Some(n) = world.remove_npc(obj) {
                        let pkt = server::remove_object(obj);
                        broadcast_nearby(world, env, n.map, n.x, n.y, &pkt);
                    }
                }
                Destroy::Companion(obj) => {
                    if let Some(c) = world.remove_companion(obj) {
                        let pkt = server::remove_object(obj);
                        broadcast_nearby(world, env, c.map, c.x, c.y, &pkt);
                    }
                }
                Destroy::Ground(obj) => {
                    if let Some(g) = world.remove_ground(obj) {
                        let pkt = server::remove_object(obj);
                        broadcast_nearby(world, env, g.map, g.x, g.y, &pkt);
                    }
                }
            }
        }

        for event in world.events.drain(..) {
            match event {
                WorldEvent::EntityKilled {
                    npc_obj,
                    killer_session,
                } => {
                    debug!(npc = %npc_obj, killer = %killer_session, "Entity killed");
                }
            }
        }
    }
}
