//! Periodic ranking recompute.

use super::{Env, System};
use crate::world::{RankEntry, World};
use runegate_proto::server;

/// Every 10 minutes at 5 Hz.
const RANKING_TICKS: u64 = 3000;
/// Lines kept and announced.
const TOP_N: usize = 10;

pub struct RankingSystem;

impl System for RankingSystem {
    fn name(&self) -> &'static str {
        "ranking"
    }

    fn update(&mut self, world: &mut World, env: &Env) {
        if world.tick % RANKING_TICKS != 0 {
            return;
        }

        let mut entries: Vec<RankEntry> = world
            .players
            .values()
            .map(|p| RankEntry {
                name: p.name.clone(),
                level: p.level,
                exp: p.exp,
            })
            .collect();
        entries.sort_by(|a, b| (b.level, b.exp).cmp(&(a.level, a.exp)));
        entries.truncate(TOP_N);
        world.ranking = entries;

        if world.ranking.is_empty() {
            return;
        }
        let lines: Vec<String> = world
            .ranking
            .iter()
            .enumerate()
            .map(|(i, e)| format!("{}. {} (Lv.{})", i + 1, e.name, e.level))
            .collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let pkt = server::hypertext("ranking", &refs);
        for p in world.players.values() {
            env.sessions.send_to(p.session_id, &pkt);
        }
    }
}
