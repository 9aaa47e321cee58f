//! The tick scheduler.
//!
//! Fixed 5 Hz cadence on a dedicated thread. One tick per wake; a backlog
//! of more than two ticks is dropped outright, never burst-replayed -
//! gameplay that was not simulated cannot be re-broadcast.

use super::{Env, Phase, System};
use crate::world::World;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Tick period at 5 Hz.
pub const TICK_PERIOD: Duration = Duration::from_millis(200);

/// Backlog beyond this many ticks is dropped.
const MAX_BACKLOG: u32 = 2;

/// Phase-ordered system lists.
pub struct TickScheduler {
    input: Vec<Box<dyn System>>,
    update: Vec<Box<dyn System>>,
    post_update: Vec<Box<dyn System>>,
    output: Vec<Box<dyn System>>,
    persist: Vec<Box<dyn System>>,
    cleanup: Vec<Box<dyn System>>,
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TickScheduler {
    pub fn new() -> Self {
        Self {
            input: Vec::new(),
            update: Vec::new(),
            post_update: Vec::new(),
            output: Vec::new(),
            persist: Vec::new(),
            cleanup: Vec::new(),
        }
    }

    /// Register a system; within a phase, execution follows registration
    /// order.
    pub fn register(&mut self, phase: Phase, system: Box<dyn System>) {
        match phase {
            Phase::Input => self.input.push(system),
            Phase::Update => self.update.push(system),
            Phase::PostUpdate => self.post_update.push(system),
            Phase::Output => self.output.push(system),
            Phase::Persist => self.persist.push(system),
            Phase::Cleanup => self.cleanup.push(system),
        }
    }

    fn phases_mut(&mut self) -> [&mut Vec<Box<dyn System>>; 6] {
        [
            &mut self.input,
            &mut self.update,
            &mut self.post_update,
            &mut self.output,
            &mut self.persist,
            &mut self.cleanup,
        ]
    }

    /// Run one full tick.
    pub fn run_tick(&mut self, world: &mut World, env: &Env) {
        let started = Instant::now();
        world.tick += 1;
        for phase in self.phases_mut() {
            for system in phase.iter_mut() {
                system.update(world, env);
            }
        }
        crate::metrics::TICK_DURATION.observe(started.elapsed().as_secs_f64());
    }

    /// The simulation loop. Returns after a graceful shutdown: one final
    /// input drain, then every system's shutdown hook (persistence
    /// force-saves there).
    pub fn run(&mut self, mut world: World, env: &Env, stop: Arc<AtomicBool>) {
        info!("Tick loop started");
        let mut next = Instant::now() + TICK_PERIOD;

        while !stop.load(Ordering::Acquire) {
            let now = Instant::now();
            if now < next {
                std::thread::sleep(next - now);
            }

            self.run_tick(&mut world, env);
            next += TICK_PERIOD;

            // Missed-tick policy: if the wall clock fell behind by more
            // than the allowed backlog, drop it and resynchronize.
            let now = Instant::now();
            if now > next + TICK_PERIOD * MAX_BACKLOG {
                let behind = (now - next).as_millis();
                warn!(behind_ms = %behind, "Tick backlog dropped");
                crate::metrics::TICKS_DROPPED
                    .inc_by((behind as u64 / TICK_PERIOD.as_millis() as u64).max(1));
                next = now + TICK_PERIOD;
            }
        }

        info!("Shutdown: final input drain and force save");
        for system in self.input.iter_mut() {
            system.update(&mut world, env);
        }
        for phase in self.phases_mut() {
            for system in phase.iter_mut() {
                system.shutdown(&mut world, env);
            }
        }
        info!("Tick loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Env, Phase, System};
    use crate::world::World;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct Recorder {
        name: &'static str,
        log: Arc<parking_lot::Mutex<Vec<&'static str>>>,
        shutdowns: Arc<AtomicU32>,
    }

    impl System for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn update(&mut self, _world: &mut World, _env: &Env) {
            self.log.lock().push(self.name);
        }

        fn shutdown(&mut self, _world: &mut World, _env: &Env) {
            self.shutdowns.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn phases_run_in_order() {
        let harness = crate::game::tick::test_support::harness();
        let (mut world, env) = harness;
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let shutdowns = Arc::new(AtomicU32::new(0));

        let mut sched = TickScheduler::new();
        for (phase, name) in [
            (Phase::Cleanup, "cleanup"),
            (Phase::Input, "input"),
            (Phase::Persist, "persist"),
            (Phase::Update, "update-a"),
            (Phase::Update, "update-b"),
            (Phase::PostUpdate, "post"),
            (Phase::Output, "output"),
        ] {
            sched.register(
                phase,
                Box::new(Recorder {
                    name,
                    log: log.clone(),
                    shutdowns: shutdowns.clone(),
                }),
            );
        }

        sched.run_tick(&mut world, &env);
        assert_eq!(
            *log.lock(),
            vec![
                "input", "update-a", "update-b", "post", "output", "persist", "cleanup"
            ]
        );
        assert_eq!(world.tick, 1);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::config::Config;
    use crate::data::{DataTables, MapData, MapGrid};
    use crate::game::Env;
    use crate::net::SessionRegistry;
    use crate::script::stock::StockFormulas;
    use crate::world::World;
    use std::sync::Arc;

    /// Minimal (World, Env) pair for system unit tests. Spawns a small
    /// runtime to back the Env handle; it is leaked so blocking DB calls
    /// from the tick path keep working for the test's lifetime.
    pub fn harness() -> (World, Env) {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let db = rt
            .block_on(crate::db::Database::new(":memory:"))
            .expect("in-memory db");
        let handle = rt.handle().clone();
        // Leak the runtime so the handle stays valid for the test's life.
        std::mem::forget(rt);

        let config: Config = toml::from_str(
            r#"
            [server]
            name = "test"

            [listen]
            addr = "127.0.0.1:0"
            "#,
        )
        .unwrap();

        let mut md = MapData::new();
        md.insert(MapGrid::new(4, 0, 0, 1000, 1000));

        let env = Env {
            config: Arc::new(config),
            tables: Arc::new(DataTables::new()),
            engine: Arc::new(StockFormulas),
            sessions: Arc::new(SessionRegistry::new()),
            db,
            rt: handle,
        };
        (World::new(md), env)
    }
}
