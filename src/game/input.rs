//! Input phase: drain session queues, dispatch packets, reap the closed.

use super::packets::{Ctx, Registry};
use super::{disconnect, Env, System};
use crate::error::Disposition;
use crate::world::World;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

/// Phase 0 system: per-session bounded packet drain, then one reap pass.
/// Closed sessions get this tick's drain before cleanup, so late packets
/// such as a client-side save-on-quit still execute.
pub struct InputSystem {
    registry: Registry,
}

impl InputSystem {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
        }
    }
}

impl Default for InputSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for InputSystem {
    fn name(&self) -> &'static str {
        "input"
    }

    fn update(&mut self, world: &mut World, env: &Env) {
        let budget = env.config.game.packets_per_tick;

        for id in env.sessions.ids() {
            let Some(session) = env.sessions.get(id) else {
                continue;
            };

            for _ in 0..budget {
                let Some(payload) = session.try_recv() else {
                    break;
                };
                let state = session.state();
                crate::metrics::PACKETS_DISPATCHED.inc();

                // The dispatch boundary is also the panic boundary: a
                // handler blowing up closes its session, the tick goes on.
                let mut ctx = Ctx {
                    world: &mut *world,
                    env,
                    session_id: id,
                };
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    self.registry.dispatch(&mut ctx, state, &payload)
                }))
                .unwrap_or_else(|_| {
                    warn!(session = %id, "Handler panicked");
                    Err(crate::error::HandlerError::HandlerPanic)
                });

                if let Err(err) = outcome {
                    crate::metrics::HANDLER_ERRORS.inc();
                    debug!(session = %id, code = %err.error_code(), "Handler error");
                    match err.disposition() {
                        Disposition::Ignore => {}
                        Disposition::ServerMessage(msg) => {
                            super::server_message(env, id, msg);
                        }
                        Disposition::CloseSession => {
                            session.mark_closing();
                            break;
                        }
                    }
                }
            }

            // Reap after the final drain.
            if session.is_closing() {
                disconnect::cleanup_session(world, env, id);
                env.sessions.remove(id);
                crate::metrics::PLAYERS_IN_WORLD.set(world.players.len() as i64);
            }
        }
    }
}
