//! runegated - Runegate World Server.
//!
//! Startup wires the pieces in dependency order: configuration, tracing,
//! database (with WAL crash recovery), static data, world state, the
//! network gateway, and finally the dedicated tick thread that owns the
//! simulation.

use runegated::config::Config;
use runegated::data::{DataTables, MapData, MapGrid};
use runegated::db::Database;
use runegated::game::tick::TickScheduler;
use runegated::game::{Env, Phase};
use runegated::net::{Gateway, SessionRegistry};
use runegated::script::stock::StockFormulas;
use runegated::world::{Clan, ClanMember, World};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Resolve the configuration path from CLI arguments.
/// Supports `-c <path>`, `--config <path>`, or a bare path.
/// Falls back to `config.toml` when no argument is provided.
fn resolve_config_path() -> String {
    let mut args = std::env::args().skip(1);

    let raw_path = match args.next() {
        Some(flag) if flag == "-c" || flag == "--config" => args.next().unwrap_or_else(|| {
            eprintln!("Missing path after {}", flag);
            std::process::exit(1);
        }),
        Some(path) => path,
        None => "config.toml".to_string(),
    };

    match std::fs::canonicalize(std::path::Path::new(&raw_path)) {
        Ok(p) => p.to_string_lossy().into_owned(),
        Err(_) => raw_path,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration first (before tracing, so we can use log_format)
    let config_path = resolve_config_path();

    let config = Config::load(&config_path).map_err(|e| {
        eprintln!("ERROR: Failed to load config from {}: {}", config_path, e);
        e
    })?;

    // Initialize tracing based on config
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match config.server.log_format {
        runegated::config::LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .json()
                .init();
        }
        runegated::config::LogFormat::Pretty => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .init();
        }
    }

    // Validate configuration
    if let Err(errors) = runegated::config::validate(&config) {
        for err in &errors {
            error!(error = %err, "Configuration validation failed");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s)",
            errors.len()
        ));
    }

    info!(server = %config.server.name, "Starting runegated");

    // Initialize database
    let db_path = config
        .database
        .as_ref()
        .map(|d| d.path.as_str())
        .unwrap_or("runegate.db");
    let db = Database::new(db_path).await?;

    // Crash recovery: replay unprocessed economic WAL entries before the
    // world opens.
    if let Err(e) = runegated::game::trade::recover_wal(&db).await {
        error!(error = %e, "WAL recovery failed");
        return Err(e.into());
    }

    // Static data: the table and map loaders are external collaborators;
    // until one is wired in the world starts with one open map and empty
    // tables.
    let tables = Arc::new(DataTables::new());
    let mut map_data = MapData::new();
    map_data.insert(MapGrid::new(0, 0, 0, 32767, 32767));
    warn!("Data tables empty: no external loader configured");

    let mut world = World::new(map_data);
    world.reserve_obj_ids(db.inventory().max_obj_id().await?);

    // Restore clans from the database.
    match db.clans().load_all().await {
        Ok(clans) => {
            let count = clans.len();
            for (row, members) in clans {
                let members: HashMap<u32, ClanMember> = members
                    .into_iter()
                    .map(|m| {
                        (
                            m.char_id,
                            ClanMember {
                                char_id: m.char_id,
                                name: m.name,
                                rank: m.rank,
                                notes: m.notes,
                                online: false,
                            },
                        )
                    })
                    .collect();
                world.clans.restore(Clan {
                    clan_id: row.clan_id,
                    name: row.name,
                    leader: row.leader,
                    announcement: row.announcement,
                    emblem_id: row.emblem_id,
                    warehouse_using: 0,
                    members,
                });
            }
            info!(count = count, "Loaded clans");
        }
        Err(e) => {
            warn!(error = %e, "Failed to load clans from database");
        }
    }

    // Prometheus metrics are optional.
    // Convention: metrics_port = 0 disables the HTTP endpoint (used by tests).
    let metrics_port = config.server.metrics_port.unwrap_or(9090);
    if metrics_port == 0 {
        info!("Metrics disabled");
    } else {
        runegated::metrics::init();
        info!("Metrics initialized");

        tokio::spawn(async move {
            runegated::http::run_http_server(metrics_port).await;
        });
        info!(port = metrics_port, "Prometheus HTTP server started");
    }

    let sessions = Arc::new(SessionRegistry::new());
    let config = Arc::new(config);
    let env = Env {
        config: config.clone(),
        tables,
        engine: Arc::new(StockFormulas),
        sessions: sessions.clone(),
        db: db.clone(),
        rt: tokio::runtime::Handle::current(),
    };

    // Populate spawns (no-op until a loader fills the tables).
    runegated::game::respawn::spawn_world(&mut world, &env);

    // Shutdown plumbing: signals flip the stop flag for the tick thread
    // and broadcast to the gateway.
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(16);
    let stop = Arc::new(AtomicBool::new(false));
    {
        let shutdown_tx = shutdown_tx.clone();
        let stop = stop.clone();
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

            tokio::select! {
                _ = sigint.recv() => info!("Received SIGINT - initiating graceful shutdown"),
                _ = sigterm.recv() => info!("Received SIGTERM - initiating graceful shutdown"),
            }

            stop.store(true, Ordering::Release);
            let _ = shutdown_tx.send(());
        });
    }

    // The simulation owns its thread; it never runs on the tokio pool.
    let tick_thread = {
        let stop = stop.clone();
        std::thread::Builder::new()
            .name("tick".to_string())
            .spawn(move || {
                let mut scheduler = TickScheduler::new();
                scheduler.register(
                    Phase::Input,
                    Box::new(runegated::game::input::InputSystem::new()),
                );
                scheduler.register(Phase::Update, Box::new(runegated::game::combat::CombatSystem));
                scheduler.register(Phase::Update, Box::new(runegated::game::skills::SkillSystem));
                scheduler.register(
                    Phase::Update,
                    Box::new(runegated::game::ai::monster::MonsterAiSystem),
                );
                scheduler.register(
                    Phase::Update,
                    Box::new(runegated::game::ai::companion::CompanionAiSystem),
                );
                scheduler.register(Phase::Update, Box::new(runegated::game::respawn::RespawnSystem));
                scheduler.register(
                    Phase::Update,
                    Box::new(runegated::game::skills::effect::BuffTickSystem),
                );
                scheduler.register(Phase::PostUpdate, Box::new(runegated::game::regen::RegenSystem));
                scheduler.register(
                    Phase::PostUpdate,
                    Box::new(runegated::game::visibility::VisibilitySystem),
                );
                scheduler.register(
                    Phase::PostUpdate,
                    Box::new(runegated::game::visibility::PartyPositionSystem),
                );
                scheduler.register(
                    Phase::PostUpdate,
                    Box::new(runegated::game::ranking::RankingSystem),
                );
                scheduler.register(Phase::Output, Box::new(runegated::game::output::OutputSystem));
                scheduler.register(Phase::Persist, Box::new(runegated::game::persist::PersistSystem));
                scheduler.register(Phase::Cleanup, Box::new(runegated::game::cleanup::CleanupSystem));

                scheduler.run(world, &env, stop);
            })?
    };

    // Start the Gateway
    let gateway = Gateway::bind(
        config.listen.addr,
        sessions.clone(),
        config.game.session_queue,
        shutdown_tx.clone(),
    )
    .await?;

    gateway.run().await?;

    info!("Gateway stopped, waiting for the tick thread to finish...");
    stop.store(true, Ordering::Release);
    if tick_thread.join().is_err() {
        error!("Tick thread panicked during shutdown");
    }

    Ok(())
}
