//! World entry, keepalive, and restart handlers.

use super::{Ctx, PacketHandler};
use crate::error::{HandlerError, HandlerResult};
use crate::game::{send_ability_scores, send_hp, send_mp, send_status, weight_pct, Env};
use crate::net::SessionState;
use crate::world::{ActiveBuff, ItemInstance, Player, World};
use runegate_proto::{server, PacketReader};
use tracing::{info, warn};

/// Keepalive; the framer layer owns idle timeouts, nothing to do here.
pub struct KeepAliveHandler;

impl PacketHandler for KeepAliveHandler {
    fn handle(&self, _ctx: &mut Ctx<'_>, _r: &mut PacketReader<'_>) -> HandlerResult {
        Ok(())
    }
}

/// Enter the world with a character id. The account was proven by the
/// external auth flow; this validates ownership and loads the character.
pub struct EnterWorldHandler;

impl PacketHandler for EnterWorldHandler {
    fn handle(&self, ctx: &mut Ctx<'_>, r: &mut PacketReader<'_>) -> HandlerResult {
        let account = r.cstr()?;
        let char_id = r.u32()?;
        load_and_enter_world(ctx.world, ctx.env, ctx.session_id, &account, char_id)
    }
}

/// Load a character from the database and place it in the world.
///
/// Serialized rows hold base values; equipment and buff contributions are
/// re-applied additively here, so nothing double counts across a restart.
pub fn load_and_enter_world(
    world: &mut World,
    env: &Env,
    session_id: u64,
    account: &str,
    char_id: u32,
) -> HandlerResult {
    if world.char_by_session(session_id).is_some() {
        return Ok(());
    }
    if world.players.contains_key(&char_id) {
        return Err(HandlerError::TargetInvalid("already in world"));
    }

    let db = env.db.clone();
    let loaded = env.rt.block_on(async {
        let row = db.characters().load(char_id).await?;
        let (items, equipment) = db.inventory().load(char_id).await?;
        let spells = db.characters().load_known_spells(char_id).await?;
        let buffs = db.buffs().load(char_id).await?;
        Ok::<_, crate::db::DbError>((row, items, equipment, spells, buffs))
    });

    let (row, items, equipment, spells, buff_rows) = match loaded {
        Ok(v) => v,
        Err(crate::db::DbError::CharacterNotFound(_)) => {
            return Err(HandlerError::TargetInvalid("unknown character"));
        }
        Err(e) => return Err(HandlerError::Internal(e.to_string())),
    };

    if row.account != account {
        warn!(session = %session_id, char = %char_id, "Character/account mismatch");
        return Err(HandlerError::Internal("account mismatch".into()));
    }

    let mut p = Player::new(char_id, session_id, row.account.clone(), row.name.clone());
    p.class = row.class;
    p.level = row.level;
    p.exp = row.exp;
    p.lawful = row.lawful;
    p.attr_grants = row.attr_grants;
    p.str_ = row.base_str;
    p.dex = row.base_dex;
    p.con = row.base_con;
    p.int = row.base_int;
    p.wis = row.base_wis;
    p.cha = row.base_cha;
    p.max_hp = row.base_max_hp;
    p.max_mp = row.base_max_mp;
    p.cur_hp = row.cur_hp;
    p.cur_mp = row.cur_mp;
    p.heading = row.heading;
    p.map_time_secs = row.map_time_secs;
    p.bookmarks = row.bookmarks;
    p.known_skills = spells.into_iter().collect();

    for item in &items {
        p.inventory.add(
            ItemInstance {
                obj_id: item.obj_id,
                item_id: item.item_id,
                count: item.count,
                enchant: item.enchant,
                identified: item.identified,
                durability: item.durability,
            },
            &env.tables,
        );
    }

    // InitEquipStats: re-apply worn-item deltas over the base values.
    for eq in &equipment {
        let Some(instance) = p.inventory.get(eq.obj_id) else {
            warn!(char = %char_id, obj = %eq.obj_id, "Equipment row references missing item");
            continue;
        };
        let Some(template) = env.tables.item(instance.item_id) else {
            continue;
        };
        let Some(slot) = template.slot else { continue };
        let deltas = super::item::equip_deltas(template);
        p.inventory.set_equipped(slot, eq.obj_id, deltas);
        p.apply_deltas(&deltas, 1);
    }

    // Restore saved buffs additively with their remaining seconds.
    for b in &buff_rows {
        let buff = ActiveBuff {
            skill_id: b.skill_id,
            ticks_left: (b.remaining_secs * 5).max(1),
            deltas: b.deltas,
            flags: b.flags,
            poly_id: b.poly_id,
            non_cancellable: env.engine.is_non_cancellable(b.skill_id),
        };
        crate::game::skills::effect::attach_restored_buff(&mut p, buff);
    }
    p.clamp_vitals();

    // Clan membership lives on the clan rows; bind it back and mark the
    // member present.
    let clan_info = world
        .clans
        .iter()
        .find(|c| c.members.contains_key(&char_id))
        .map(|c| (c.clan_id, c.members.get(&char_id).map_or(0, |m| m.rank)));
    if let Some((clan_id, rank)) = clan_info {
        p.clan = Some(clan_id);
        p.clan_rank = rank;
        if let Some(clan) = world.clans.get_mut(clan_id) {
            if let Some(m) = clan.members.get_mut(&char_id) {
                m.online = true;
            }
        }
    }

    // Position sanity: characters parked on maps that no longer exist
    // come back at the respawn point.
    let (map, x, y) = if world.map_data.is_in_map(row.map, row.x, row.y) {
        (row.map, row.x, row.y)
    } else {
        env.engine.respawn_location(row.map)
    };
    p.map = map;
    p.x = x;
    p.y = y;

    info!(session = %session_id, char = %char_id, name = %p.name, "Entering world");

    // Client-side bootstrap: status, scores, bag, icons.
    send_status(env, &p, weight_pct(&p, &env.tables));
    send_ability_scores(env, &p);
    send_hp(env, &p);
    send_mp(env, &p);
    for item in p.inventory.items() {
        if let Some(t) = env.tables.item(item.item_id) {
            env.sessions.send_to(
                session_id,
                &server::inventory_add(
                    item.obj_id,
                    item.item_id,
                    item.count,
                    item.identified,
                    &item.describe(t),
                ),
            );
        }
    }
    for buff in p.buffs.iter() {
        env.sessions.send_to(
            session_id,
            &server::buff_icon(buff.skill_id, buff.remaining_secs() as u16, true),
        );
    }

    world.add_player(p);
    if let Some(session) = env.sessions.get(session_id) {
        session.set_account(account.to_string());
        session.set_state(SessionState::InWorld);
    }
    crate::metrics::PLAYERS_IN_WORLD.set(world.players.len() as i64);
    Ok(())
}

/// Save-and-quit, or grave-to-town for dead characters.
pub struct RestartHandler;

impl PacketHandler for RestartHandler {
    fn handle(&self, ctx: &mut Ctx<'_>, _r: &mut PacketReader<'_>) -> HandlerResult {
        let char_id = ctx.char_id()?;
        let dead = ctx
            .world
            .players
            .get(&char_id)
            .is_some_and(|p| p.dead);

        if dead {
            let map = ctx.world.players.get(&char_id).map(|p| p.map).unwrap_or(0);
            let (map, x, y) = ctx.env.engine.respawn_location(map);
            ctx.world.relocate_player(char_id, map, x, y);
            if let Some(p) = ctx.world.players.get_mut(&char_id) {
                p.dead = false;
                p.cur_hp = (p.max_hp / 4).max(1);
                p.known.clear();
                p.dirty = true;
                send_hp(ctx.env, p);
            }
            return Ok(());
        }

        // Alive: the client is quitting. The reap pass runs the full
        // disconnect cleanup, including the save.
        if let Some(session) = ctx.env.sessions.get(ctx.session_id) {
            session.mark_closing();
        }
        Ok(())
    }
}
