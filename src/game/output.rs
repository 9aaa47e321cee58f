//! Output phase: hand every session's coalesced flush buffer to its
//! writer task.

use super::{Env, System};
use crate::world::World;

pub struct OutputSystem;

impl System for OutputSystem {
    fn name(&self) -> &'static str {
        "output"
    }

    fn update(&mut self, _world: &mut World, env: &Env) {
        for id in env.sessions.ids() {
            if let Some(session) = env.sessions.get(id) {
                session.flush();
            }
        }
    }

    fn shutdown(&mut self, _world: &mut World, env: &Env) {
        // One last flush so farewell packets leave before the writers die.
        for id in env.sessions.ids() {
            if let Some(session) = env.sessions.get(id) {
                session.flush();
            }
        }
    }
}
