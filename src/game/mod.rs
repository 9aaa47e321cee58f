//! The simulation: phases, systems, and everything they run.
//!
//! Systems mutate the `World` exclusively from the tick thread and reach
//! the outside through the immutable [`Env`] bundle. Within a phase,
//! systems run in registration order; queued requests drain FIFO.

pub mod ai;
pub mod cleanup;
pub mod combat;
pub mod death;
pub mod disconnect;
pub mod input;
pub mod messages;
pub mod output;
pub mod packets;
pub mod persist;
pub mod procs;
pub mod ranking;
pub mod regen;
pub mod respawn;
pub mod skills;
pub mod tick;
pub mod trade;
pub mod visibility;
pub mod warehouse;

use crate::config::Config;
use crate::data::DataTables;
use crate::db::Database;
use crate::net::SessionRegistry;
use crate::script::FormulaEngine;
use crate::world::{Player, World};
use bytes::Bytes;
use std::sync::Arc;

/// The six tick phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Input,
    Update,
    PostUpdate,
    Output,
    Persist,
    Cleanup,
}

/// Immutable dependencies handed to every system.
pub struct Env {
    pub config: Arc<Config>,
    pub tables: Arc<DataTables>,
    pub engine: Arc<dyn FormulaEngine>,
    pub sessions: Arc<SessionRegistry>,
    pub db: Database,
    /// Handle into the tokio runtime for bounded, synchronous DB calls
    /// from the tick thread.
    pub rt: tokio::runtime::Handle,
}

/// A registered system.
pub trait System: Send {
    fn name(&self) -> &'static str;

    /// One tick of work in this system's phase.
    fn update(&mut self, world: &mut World, env: &Env);

    /// Called once during graceful shutdown, after the final input drain.
    fn shutdown(&mut self, _world: &mut World, _env: &Env) {}
}

/// Broadcast a payload to every player session within the visibility
/// radius of a tile.
pub fn broadcast_nearby(world: &World, env: &Env, map: u32, x: i32, y: i32, payload: &Bytes) {
    let radius = env.config.game.visibility_radius;
    for session in world.nearby_player_sessions(map, x, y, radius) {
        env.sessions.send_to(session, payload);
    }
}

/// Same, minus one session (usually the actor, who gets a tailored packet).
pub fn broadcast_nearby_except(
    world: &World,
    env: &Env,
    map: u32,
    x: i32,
    y: i32,
    payload: &Bytes,
    except: u64,
) {
    let radius = env.config.game.visibility_radius;
    for session in world.nearby_player_sessions(map, x, y, radius) {
        if session != except {
            env.sessions.send_to(session, payload);
        }
    }
}

/// Own-HP refresh.
pub fn send_hp(env: &Env, p: &Player) {
    env.sessions
        .send_to(p.session_id, &runegate_proto::server::hp(p.cur_hp, p.max_hp));
}

/// Own-MP refresh.
pub fn send_mp(env: &Env, p: &Player) {
    env.sessions
        .send_to(p.session_id, &runegate_proto::server::mp(p.cur_mp, p.max_mp));
}

/// Full own-status block.
pub fn send_status(env: &Env, p: &Player, weight_pct: u8) {
    let view = runegate_proto::server::StatusView {
        obj_id: p.char_id,
        level: p.level,
        exp: p.exp,
        hp: (p.cur_hp, p.max_hp),
        mp: (p.cur_mp, p.max_mp),
        ac: p.ac as i16,
        lawful: p.lawful,
        weight_pct,
        move_speed: p.move_speed,
        brave_speed: p.brave_speed,
    };
    env.sessions
        .send_to(p.session_id, &runegate_proto::server::player_status(&view));
}

/// The six primary scores plus unspent grants.
pub fn send_ability_scores(env: &Env, p: &Player) {
    env.sessions.send_to(
        p.session_id,
        &runegate_proto::server::ability_scores(
            p.str_.clamp(0, 255) as u8,
            p.dex.clamp(0, 255) as u8,
            p.con.clamp(0, 255) as u8,
            p.int.clamp(0, 255) as u8,
            p.wis.clamp(0, 255) as u8,
            p.cha.clamp(0, 255) as u8,
            p.attr_grants,
        ),
    );
}

/// Numbered server message to one session.
pub fn server_message(env: &Env, session: u64, id: u16) {
    env.sessions
        .send_to(session, &runegate_proto::server::server_message(id));
}

/// Carried-weight percentage against a flat STR-scaled capacity.
pub fn weight_pct(p: &Player, tables: &DataTables) -> u8 {
    let capacity = 1500 + (p.str_.max(0) as u64) * 150;
    let w = p.inventory.weight(tables);
    ((w * 100 / capacity.max(1)).min(100)) as u8
}
