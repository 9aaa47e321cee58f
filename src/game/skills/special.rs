//! Special routing: casts that validate further before any resource is
//! consumed - teleports, the summon family, resurrection, the bring-stone
//! and create-magical-weapon utilities, and item-enchant-target spells.

use super::super::{broadcast_nearby, messages, server_message, Env};
use super::consume_resources;
use crate::data::SkillTemplate;
use crate::world::{Companion, CompanionKind, CompanionStatus, ItemInstance, SkillRequest, World};
use rand::Rng;
use runegate_proto::server;
use tracing::debug;

/// Random self-teleport.
const TELEPORT: u16 = 5;
/// Party teleport: the whole party scatters near the caster's landing.
const MASS_TELEPORT: u16 = 69;
/// Summon monster.
const SUMMON_MONSTER: u16 = 147;
/// Resurrection family.
const RESURRECTION: u16 = 35;
const GREATER_RESURRECTION: u16 = 160;
/// Conjures the warehouse-fee stone.
const BRING_STONE: u16 = 1003;
/// Conjures a throwaway magic weapon.
const CREATE_MAGICAL_WEAPON: u16 = 1004;
/// Enchants a carried weapon in place of a scroll.
const ENCHANT_WEAPON_SPELL: u16 = 21;

/// Item conjured by bring-stone.
const STONE_ITEM: u32 = 40494;
/// Item conjured by create-magical-weapon.
const MAGIC_WEAPON_ITEM: u32 = 275;
/// Summonable monster template by caster tier.
const SUMMON_TEMPLATES: [u32; 3] = [81083, 81084, 81085];
/// Summon lifetime in ticks (20 minutes).
const SUMMON_TICKS: u32 = 6000;

/// Returns true when the cast was routed here (consumed or refused);
/// false sends it down the normal pipeline.
pub(crate) fn try_route(
    world: &mut World,
    env: &Env,
    char_id: u32,
    template: &SkillTemplate,
    req: &SkillRequest,
) -> bool {
    match template.skill_id {
        TELEPORT => {
            teleport_cast(world, env, char_id, template, req, false);
            true
        }
        MASS_TELEPORT => {
            teleport_cast(world, env, char_id, template, req, true);
            true
        }
        SUMMON_MONSTER => {
            summon_cast(world, env, char_id, template);
            true
        }
        RESURRECTION | GREATER_RESURRECTION => {
            resurrection_cast(world, env, char_id, template, req.target);
            true
        }
        BRING_STONE => {
            conjure_cast(world, env, char_id, template, STONE_ITEM, 1);
            true
        }
        CREATE_MAGICAL_WEAPON => {
            conjure_cast(world, env, char_id, template, MAGIC_WEAPON_ITEM, 1);
            true
        }
        ENCHANT_WEAPON_SPELL => {
            enchant_target_cast(world, env, char_id, template, req.target);
            true
        }
        _ => false,
    }
}

/// Teleport the caster (and optionally the party) to the bookmark
/// destination carried in the request, or somewhere random nearby.
fn teleport_cast(
    world: &mut World,
    env: &Env,
    char_id: u32,
    template: &SkillTemplate,
    req: &SkillRequest,
    group: bool,
) {
    let (map, x, y, party) = match world.players.get(&char_id) {
        Some(p) => (p.map, p.x, p.y, p.party),
        None => return,
    };

    // A bookmarked destination rides in the request coordinates; it must
    // exist before anything is spent.
    let dest = if req.x != 0 || req.y != 0 {
        if !world.map_data.is_in_map(map, req.x, req.y) {
            server_message(env, session_of(world, char_id), messages::NOTHING_HAPPENED);
            return;
        }
        (req.x, req.y)
    } else {
        let mut rng = rand::thread_rng();
        let mut dest = (x, y);
        for _ in 0..20 {
            let cand = (x + rng.gen_range(-60..=60), y + rng.gen_range(-60..=60));
            if world.map_data.is_passable(map, cand.0, cand.1, 0) {
                dest = cand;
                break;
            }
        }
        dest
    };

    consume_resources(world, env, char_id, template);
    teleport_player(world, env, char_id, map, dest.0, dest.1);

    if group {
        let members: Vec<u32> = party
            .and_then(|id| world.parties.get(id))
            .map(|p| p.members.clone())
            .unwrap_or_default();
        let mut rng = rand::thread_rng();
        for member in members {
            if member == char_id {
                continue;
            }
            let same_map = world.players.get(&member).is_some_and(|m| m.map == map);
            if !same_map {
                continue;
            }
            let (mx, my) = (dest.0 + rng.gen_range(-2..=2), dest.1 + rng.gen_range(-2..=2));
            teleport_player(world, env, member, map, mx, my);
        }
    }
}

/// Relocate with the removal broadcast and a fresh view.
pub fn teleport_player(world: &mut World, env: &Env, char_id: u32, map: u32, x: i32, y: i32) {
    let (old_map, old_x, old_y) = match world.players.get(&char_id) {
        Some(p) => (p.map, p.x, p.y),
        None => return,
    };
    let pkt = server::remove_object(char_id);
    broadcast_nearby(world, env, old_map, old_x, old_y, &pkt);

    world.relocate_player(char_id, map, x, y);
    if let Some(p) = world.players.get_mut(&char_id) {
        p.known.clear();
        p.dirty = true;
    }
}

fn summon_cast(world: &mut World, env: &Env, char_id: u32, template: &SkillTemplate) {
    let (level, map, x, y, count) = match world.players.get(&char_id) {
        Some(p) => (p.level, p.map, p.x, p.y, p.companions.len()),
        None => return,
    };
    if count >= 3 {
        server_message(env, session_of(world, char_id), messages::NOTHING_HAPPENED);
        return;
    }
    let tier = (level / 20).min(2) as usize;
    let npc_id = SUMMON_TEMPLATES[tier];
    let Some(npc_t) = env.tables.npc(npc_id).cloned() else {
        debug!(template = %npc_id, "Summon template missing");
        return;
    };

    consume_resources(world, env, char_id, template);

    let obj_id = world.alloc_obj_id();
    let summon = Companion {
        obj_id,
        kind: CompanionKind::Summon,
        template: npc_id,
        name: npc_t.name.clone(),
        master: char_id,
        map,
        x: x + 1,
        y,
        heading: 4,
        level: npc_t.level,
        cur_hp: npc_t.hp,
        max_hp: npc_t.hp,
        cur_mp: npc_t.mp,
        max_mp: npc_t.mp,
        exp: 0,
        lawful: 0,
        status: CompanionStatus::Defensive,
        target: None,
        attack_cd: 0,
        move_cd: 0,
        expiry: Some(SUMMON_TICKS),
        collar_obj_id: None,
        origin: None,
    };
    let pack = server::summon_pack(&server::CompanionView {
        obj_id,
        master_id: char_id,
        name: summon.name.clone(),
        level: summon.level,
        hp: (summon.cur_hp, summon.max_hp),
        status: summon.status.wire(),
    });
    world.add_companion(summon);
    env.sessions.send_to(session_of(world, char_id), &pack);
}

fn resurrection_cast(
    world: &mut World,
    env: &Env,
    char_id: u32,
    template: &SkillTemplate,
    target_id: u32,
) {
    let revivable = world
        .players
        .get(&target_id)
        .is_some_and(|t| t.dead);
    if !revivable {
        server_message(env, session_of(world, char_id), messages::NOTHING_HAPPENED);
        return;
    }

    consume_resources(world, env, char_id, template);

    let effect = env.engine.resurrect_effect(template.skill_id);
    if let Some(t) = world.players.get_mut(&target_id) {
        t.dead = false;
        t.cur_hp = ((t.max_hp * effect.hp_ratio_pct) / 100).max(1);
        t.dirty = true;
        super::super::send_hp(env, t);
    }
    if let Some(t) = world.players.get(&target_id) {
        let pkt = server::action_gfx(target_id, 0);
        broadcast_nearby(world, env, t.map, t.x, t.y, &pkt);
    }
}

fn conjure_cast(
    world: &mut World,
    env: &Env,
    char_id: u32,
    template: &SkillTemplate,
    item_id: u32,
    count: u32,
) {
    let has_room = world
        .players
        .get(&char_id)
        .is_some_and(|p| p.inventory.has_room());
    if !has_room {
        server_message(env, session_of(world, char_id), messages::BAG_FULL);
        return;
    }

    consume_resources(world, env, char_id, template);

    let obj_id = world.alloc_obj_id();
    let session = session_of(world, char_id);
    if let Some(p) = world.players.get_mut(&char_id) {
        let item = ItemInstance {
            obj_id,
            item_id,
            count,
            enchant: 0,
            identified: true,
            durability: 0,
        };
        let resident = p.inventory.add(item, &env.tables);
        if let Some(i) = p.inventory.get(resident) {
            let desc = env
                .tables
                .item(i.item_id)
                .map(|t| i.describe(t))
                .unwrap_or_default();
            env.sessions.send_to(
                session,
                &server::inventory_add(resident, i.item_id, i.count, true, &desc),
            );
        }
        p.dirty = true;
    }
}

/// Item-enchant-target spell: +1 on a carried, unequipped weapon.
fn enchant_target_cast(
    world: &mut World,
    env: &Env,
    char_id: u32,
    template: &SkillTemplate,
    target_obj: u32,
) {
    let valid = world.players.get(&char_id).is_some_and(|p| {
        p.inventory
            .get(target_obj)
            .and_then(|i| env.tables.item(i.item_id))
            .is_some_and(|t| matches!(t.kind, crate::data::ItemKind::Weapon))
            && !p.inventory.is_equipped(target_obj)
    });
    if !valid {
        server_message(env, session_of(world, char_id), messages::NOTHING_HAPPENED);
        return;
    }

    consume_resources(world, env, char_id, template);

    let session = session_of(world, char_id);
    if let Some(p) = world.players.get_mut(&char_id) {
        if let Some(item) = p.inventory.get_mut(target_obj) {
            item.enchant += 1;
            item.identified = true;
            let desc = env
                .tables
                .item(item.item_id)
                .map(|t| item.describe(t))
                .unwrap_or_default();
            env.sessions
                .send_to(session, &server::change_item_desc(target_obj, &desc));
        }
        p.dirty = true;
    }
}

fn session_of(world: &World, char_id: u32) -> u64 {
    world
        .players
        .get(&char_id)
        .map(|p| p.session_id)
        .unwrap_or(0)
}
