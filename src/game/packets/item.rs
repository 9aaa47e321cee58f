//! Item handlers: use, pickup, drop, bookmarks, and the raise-attribute
//! dialog.

use super::{Ctx, PacketHandler};
use crate::data::{ItemTemplate, UseKind};
use crate::error::{HandlerError, HandlerResult};
use crate::game::{broadcast_nearby, messages, send_ability_scores, send_hp, send_mp, weight_pct};
use crate::script::{EnchantContext, EnchantOutcome, PotionKind, StatDeltas};
use crate::world::player::ATTRIBUTE_CAP;
use crate::world::{chebyshev, Bookmark, CompanionKind, CompanionStatus, GroundItem};
use rand::Rng;
use runegate_proto::{server, PacketReader};
use tracing::debug;

/// Maximum stored bookmarks.
const MAX_BOOKMARKS: usize = 20;

/// Enchant scrolls whose data rows are flagged blessed inconsistently;
/// kept as normal by declared intent.
const FORCED_NORMAL_SCROLLS: [u32; 2] = [40074, 40087];

/// Stat deltas an item contributes while worn.
///
/// Weapon damage and to-hit flow through the combat context from the
/// wielded template, so they are excluded here to avoid double counting.
pub(crate) fn equip_deltas(t: &ItemTemplate) -> StatDeltas {
    let is_weapon = matches!(t.kind, crate::data::ItemKind::Weapon);
    StatDeltas {
        ac: if is_weapon { 0 } else { -t.ac },
        str_: t.add_str as i32,
        dex: t.add_dex as i32,
        con: t.add_con as i32,
        int: t.add_int as i32,
        wis: t.add_wis as i32,
        cha: t.add_cha as i32,
        max_hp: t.add_hp,
        max_mp: t.add_mp,
        mr: t.add_mr,
        hit_mod: if is_weapon { 0 } else { t.hit_mod },
        dmg_mod: if is_weapon { 0 } else { t.dmg_mod },
        ..Default::default()
    }
}

pub struct UseItemHandler;

impl PacketHandler for UseItemHandler {
    fn handle(&self, ctx: &mut Ctx<'_>, r: &mut PacketReader<'_>) -> HandlerResult {
        let obj_id = r.u32()?;
        let target_obj = r.u32()?;

        let char_id = ctx.char_id()?;
        let (item_id, identified) = {
            let p = ctx
                .world
                .players
                .get(&char_id)
                .ok_or(HandlerError::TargetInvalid("gone"))?;
            if p.dead {
                return Ok(());
            }
            let item = p
                .inventory
                .get(obj_id)
                .ok_or(HandlerError::TargetInvalid("no such item"))?;
            (item.item_id, item.identified)
        };
        let template = ctx
            .env
            .tables
            .item(item_id)
            .ok_or(HandlerError::TargetInvalid("no template"))?
            .clone();

        if template.equippable() {
            return toggle_equip(ctx, char_id, obj_id, &template);
        }

        match template.use_kind {
            UseKind::Potion => drink_potion(ctx, char_id, obj_id, item_id),
            UseKind::TeleportScroll => teleport_scroll(ctx, char_id, obj_id),
            UseKind::EnchantWeaponScroll => {
                enchant_scroll(ctx, char_id, obj_id, target_obj, item_id, identified, true)
            }
            UseKind::EnchantArmorScroll => {
                enchant_scroll(ctx, char_id, obj_id, target_obj, item_id, identified, false)
            }
            UseKind::PetCollar => use_collar(ctx, char_id, obj_id),
            UseKind::None => {
                ctx.reply(&server::server_message(messages::NOTHING_HAPPENED));
                Ok(())
            }
        }
    }
}

fn toggle_equip(
    ctx: &mut Ctx<'_>,
    char_id: u32,
    obj_id: u32,
    template: &ItemTemplate,
) -> HandlerResult {
    let slot = template.slot.expect("equippable");
    let p = ctx
        .world
        .players
        .get_mut(&char_id)
        .ok_or(HandlerError::TargetInvalid("gone"))?;
    let session = p.session_id;

    if p.inventory.is_equipped(obj_id) {
        if let Some((_, deltas)) = p.inventory.clear_equipped(slot) {
            p.apply_deltas(&deltas, -1);
        }
        p.dirty = true;
        ctx.env
            .sessions
            .send_to(session, &server::equipment_slot(slot.wire(), obj_id, false));
    } else {
        // Swap out whatever occupied the slot first.
        if let Some((old_obj, deltas)) = p.inventory.clear_equipped(slot) {
            p.apply_deltas(&deltas, -1);
            ctx.env
                .sessions
                .send_to(session, &server::equipment_slot(slot.wire(), old_obj, false));
        }
        let deltas = equip_deltas(template);
        p.inventory.set_equipped(slot, obj_id, deltas);
        p.apply_deltas(&deltas, 1);
        p.dirty = true;
        ctx.env
            .sessions
            .send_to(session, &server::equipment_slot(slot.wire(), obj_id, true));
    }

    let p = ctx.world.players.get(&char_id).expect("still here");
    crate::game::send_status(ctx.env, p, weight_pct(p, &ctx.env.tables));
    send_ability_scores(ctx.env, p);
    Ok(())
}

fn drink_potion(ctx: &mut Ctx<'_>, char_id: u32, obj_id: u32, item_id: u32) -> HandlerResult {
    let Some(effect) = ctx.env.engine.potion_effect(item_id) else {
        ctx.reply(&server::server_message(messages::NOTHING_HAPPENED));
        return Ok(());
    };

    {
        let p = ctx
            .world
            .players
            .get_mut(&char_id)
            .ok_or(HandlerError::TargetInvalid("gone"))?;
        if p.inventory.take(obj_id, 1, 0).is_none() {
            return Err(HandlerError::TargetInvalid("no such item"));
        }
        let remaining = p
            .inventory
            .get(obj_id)
            .map(|i| i.count)
            .unwrap_or(0);
        if remaining > 0 {
            ctx.env
                .sessions
                .send_to(p.session_id, &server::inventory_count(obj_id, remaining));
        } else {
            ctx.env
                .sessions
                .send_to(p.session_id, &server::inventory_remove(obj_id));
        }
        p.dirty = true;
    }

    match effect.kind {
        PotionKind::Heal => {
            if let Some(p) = ctx.world.players.get_mut(&char_id) {
                p.cur_hp = (p.cur_hp + effect.value).min(p.max_hp);
                send_hp(ctx.env, p);
            }
        }
        PotionKind::Mana => {
            if let Some(p) = ctx.world.players.get_mut(&char_id) {
                p.cur_mp = (p.cur_mp + effect.value).min(p.max_mp);
                send_mp(ctx.env, p);
            }
        }
        PotionKind::Haste => {
            crate::game::skills::effect::apply_buff_effect(ctx.world, ctx.env, char_id, 43, 1);
        }
        PotionKind::Brave => {
            crate::game::skills::effect::apply_buff_effect(ctx.world, ctx.env, char_id, 172, 1);
        }
        PotionKind::CurePoison => {
            crate::game::skills::effect::cure_poison(ctx.world, ctx.env, char_id);
        }
    }
    Ok(())
}

fn teleport_scroll(ctx: &mut Ctx<'_>, char_id: u32, obj_id: u32) -> HandlerResult {
    let (map, x, y) = {
        let p = ctx
            .world
            .players
            .get_mut(&char_id)
            .ok_or(HandlerError::TargetInvalid("gone"))?;
        if p.inventory.take(obj_id, 1, 0).is_none() {
            return Err(HandlerError::TargetInvalid("no such item"));
        }
        p.dirty = true;
        (p.map, p.x, p.y)
    };

    // Random landing tile near the origin; fall back in place.
    let mut rng = rand::thread_rng();
    let mut dest = (x, y);
    for _ in 0..20 {
        let cand = (x + rng.gen_range(-40..=40), y + rng.gen_range(-40..=40));
        if ctx.world.map_data.is_passable(map, cand.0, cand.1, 0) {
            dest = cand;
            break;
        }
    }
    crate::game::skills::special::teleport_player(ctx.world, ctx.env, char_id, map, dest.0, dest.1);
    ctx.reply(&server::inventory_remove(obj_id));
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn enchant_scroll(
    ctx: &mut Ctx<'_>,
    char_id: u32,
    scroll_obj: u32,
    target_obj: u32,
    scroll_item_id: u32,
    _identified: bool,
    is_weapon: bool,
) -> HandlerResult {
    let blessed = {
        // Hard-coded override list wins over the data flag.
        if FORCED_NORMAL_SCROLLS.contains(&scroll_item_id) {
            false
        } else {
            ctx.env
                .tables
                .item(scroll_item_id)
                .is_some_and(|t| t.name.starts_with("blessed"))
        }
    };

    let p = ctx
        .world
        .players
        .get_mut(&char_id)
        .ok_or(HandlerError::TargetInvalid("gone"))?;

    let Some(target) = p.inventory.get(target_obj) else {
        return Err(HandlerError::TargetInvalid("no enchant target"));
    };
    let Some(target_t) = ctx.env.tables.item(target.item_id) else {
        return Err(HandlerError::TargetInvalid("no template"));
    };
    let target_is_weapon = matches!(target_t.kind, crate::data::ItemKind::Weapon);
    if target_is_weapon != is_weapon {
        ctx.env
            .sessions
            .send_to(p.session_id, &server::server_message(messages::NOTHING_HAPPENED));
        return Ok(());
    }

    if p.inventory.take(scroll_obj, 1, 0).is_none() {
        return Err(HandlerError::TargetInvalid("no scroll"));
    }
    ctx.env
        .sessions
        .send_to(p.session_id, &server::inventory_remove(scroll_obj));

    let current = p.inventory.get(target_obj).map(|i| i.enchant).unwrap_or(0);
    let outcome = ctx.env.engine.calc_enchant(EnchantContext {
        item_id: target_t.item_id,
        current,
        blessed,
        is_weapon,
    });
    match outcome {
        EnchantOutcome::Success(new_level) => {
            let desc = {
                let item = p.inventory.get_mut(target_obj).expect("checked");
                item.enchant = new_level;
                item.identified = true;
                item.describe(target_t)
            };
            ctx.env
                .sessions
                .send_to(p.session_id, &server::change_item_desc(target_obj, &desc));
            ctx.env
                .sessions
                .send_to(p.session_id, &server::server_message(messages::ENCHANT_SUCCESS));
        }
        EnchantOutcome::Fail => {
            ctx.env
                .sessions
                .send_to(p.session_id, &server::server_message(messages::NOTHING_HAPPENED));
        }
        EnchantOutcome::Destroy => {
            // Worn targets are stripped first so the deltas revert.
            if p.inventory.is_equipped(target_obj) {
                if let Some(slot) = target_t.slot {
                    if let Some((_, deltas)) = p.inventory.clear_equipped(slot) {
                        p.apply_deltas(&deltas, -1);
                    }
                }
            }
            p.inventory.remove(target_obj);
            ctx.env
                .sessions
                .send_to(p.session_id, &server::inventory_remove(target_obj));
            ctx.env
                .sessions
                .send_to(p.session_id, &server::server_message(messages::ENCHANT_DESTROYED));
        }
    }
    p.dirty = true;
    Ok(())
}

fn use_collar(ctx: &mut Ctx<'_>, char_id: u32, collar_obj: u32) -> HandlerResult {
    let db = ctx.env.db.clone();
    let row = ctx
        .env
        .rt
        .block_on(async { db.pets().load(collar_obj).await })
        .map_err(|e| HandlerError::Internal(e.to_string()))?;
    let Some(row) = row else {
        ctx.reply(&server::server_message(messages::NOTHING_HAPPENED));
        return Ok(());
    };
    let Some(template) = ctx.env.tables.npc(row.npc_template) else {
        debug!(template = %row.npc_template, "Pet template missing");
        return Ok(());
    };
    let max_hp = template.hp + row.level as i32 * 8;
    let max_mp = template.mp + row.level as i32 * 2;

    let (map, x, y) = {
        let p = ctx
            .world
            .players
            .get(&char_id)
            .ok_or(HandlerError::TargetInvalid("gone"))?;
        (p.map, p.x, p.y)
    };

    let obj_id = ctx.world.alloc_obj_id();
    let pet = crate::world::Companion {
        obj_id,
        kind: CompanionKind::Pet,
        template: row.npc_template,
        name: row.name.clone(),
        master: char_id,
        map,
        x: x + 1,
        y,
        heading: 4,
        level: row.level,
        cur_hp: row.cur_hp.min(max_hp),
        max_hp,
        cur_mp: row.cur_mp.min(max_mp),
        max_mp,
        exp: row.exp,
        lawful: row.lawful,
        status: CompanionStatus::Rest,
        target: None,
        attack_cd: 0,
        move_cd: 0,
        expiry: None,
        collar_obj_id: Some(collar_obj),
        origin: None,
    };
    let pack = server::pet_pack(&server::CompanionView {
        obj_id,
        master_id: char_id,
        name: pet.name.clone(),
        level: pet.level,
        hp: (pet.cur_hp, pet.max_hp),
        status: pet.status.wire(),
    });
    ctx.world.add_companion(pet);
    ctx.reply(&pack);
    Ok(())
}

pub struct PickupHandler;

impl PacketHandler for PickupHandler {
    fn handle(&self, ctx: &mut Ctx<'_>, r: &mut PacketReader<'_>) -> HandlerResult {
        let ground_obj = r.u32()?;
        let char_id = ctx.char_id()?;

        let (map, px, py, session) = {
            let p = ctx
                .world
                .players
                .get(&char_id)
                .ok_or(HandlerError::TargetInvalid("gone"))?;
            if p.dead {
                return Ok(());
            }
            if !p.inventory.has_room() {
                return Err(HandlerError::BagFull);
            }
            if weight_pct(p, &ctx.env.tables) >= 100 {
                return Err(HandlerError::Overweight);
            }
            (p.map, p.x, p.y, p.session_id)
        };

        let Some(g) = ctx.world.grounds.get(&ground_obj) else {
            return Err(HandlerError::TargetInvalid("gone from ground"));
        };
        if g.map != map || chebyshev(g.x, g.y, px, py) > 2 {
            return Err(HandlerError::OutOfRange);
        }

        let g = ctx.world.remove_ground(ground_obj).expect("checked");
        let remove_pkt = server::remove_object(ground_obj);
        broadcast_nearby(ctx.world, ctx.env, map, g.x, g.y, &remove_pkt);

        let item = g.item;
        let (resident, count, identified, desc) = {
            let p = ctx.world.players.get_mut(&char_id).expect("checked");
            let t = ctx.env.tables.item(item.item_id);
            let desc = t.map(|t| item.describe(t)).unwrap_or_default();
            let identified = item.identified;
            let resident = p.inventory.add(item, &ctx.env.tables);
            let count = p.inventory.get(resident).map(|i| i.count).unwrap_or(0);
            p.dirty = true;
            (resident, count, identified, desc)
        };
        ctx.env.sessions.send_to(
            session,
            &server::inventory_add(
                resident,
                ctx.world
                    .players
                    .get(&char_id)
                    .and_then(|p| p.inventory.get(resident))
                    .map(|i| i.item_id)
                    .unwrap_or(0),
                count,
                identified,
                &desc,
            ),
        );
        let p = ctx.world.players.get(&char_id).expect("checked");
        ctx.env
            .sessions
            .send_to(session, &server::weight(weight_pct(p, &ctx.env.tables)));
        Ok(())
    }
}

pub struct DropItemHandler;

impl PacketHandler for DropItemHandler {
    fn handle(&self, ctx: &mut Ctx<'_>, r: &mut PacketReader<'_>) -> HandlerResult {
        let obj_id = r.u32()?;
        let count = r.u32()?;
        let char_id = ctx.char_id()?;

        let (part, map, x, y, remaining) = {
            let next_id = ctx.world.alloc_obj_id();
            let p = ctx
                .world
                .players
                .get_mut(&char_id)
                .ok_or(HandlerError::TargetInvalid("gone"))?;
            if p.dead {
                return Ok(());
            }
            let Some(part) = p.inventory.take(obj_id, count, next_id) else {
                return Err(HandlerError::TargetInvalid("no such item"));
            };
            p.dirty = true;
            let remaining = p.inventory.get(obj_id).map(|i| i.count).unwrap_or(0);
            (part, p.map, p.x, p.y, remaining)
        };

        if remaining > 0 {
            ctx.reply(&server::inventory_count(obj_id, remaining));
        } else {
            ctx.reply(&server::inventory_remove(obj_id));
        }

        let drop_pkt = server::drop_item(part.obj_id, part.item_id, x, y, part.count);
        let ttl = ctx.env.config.game.ground_item_ttl;
        ctx.world.add_ground(GroundItem {
            obj_id: part.obj_id,
            item: part,
            map,
            x,
            y,
            ttl,
        });
        broadcast_nearby(ctx.world, ctx.env, map, x, y, &drop_pkt);
        Ok(())
    }
}

pub struct BookmarkHandler;

impl PacketHandler for BookmarkHandler {
    fn handle(&self, ctx: &mut Ctx<'_>, r: &mut PacketReader<'_>) -> HandlerResult {
        let op = r.u8()?;
        let name = r.cstr()?;
        let char_id = ctx.char_id()?;
        let p = ctx
            .world
            .players
            .get_mut(&char_id)
            .ok_or(HandlerError::TargetInvalid("gone"))?;

        match op {
            0 => {
                if p.bookmarks.len() >= MAX_BOOKMARKS || name.is_empty() {
                    return Ok(());
                }
                let mark = Bookmark {
                    name,
                    map: p.map,
                    x: p.x,
                    y: p.y,
                };
                p.bookmarks.push(mark);
            }
            1 => {
                p.bookmarks.retain(|b| b.name != name);
            }
            _ => return Ok(()),
        }
        p.dirty = true;
        Ok(())
    }
}

pub struct RaiseAttributeHandler;

impl PacketHandler for RaiseAttributeHandler {
    fn handle(&self, ctx: &mut Ctx<'_>, r: &mut PacketReader<'_>) -> HandlerResult {
        let attr = r.u8()?;
        let char_id = ctx.char_id()?;
        let p = ctx
            .world
            .players
            .get_mut(&char_id)
            .ok_or(HandlerError::TargetInvalid("gone"))?;

        if p.attr_grants == 0 || p.attribute_total() >= ATTRIBUTE_CAP {
            return Ok(());
        }
        match attr {
            0 => p.str_ += 1,
            1 => p.dex += 1,
            2 => p.con += 1,
            3 => p.int += 1,
            4 => p.wis += 1,
            5 => p.cha += 1,
            _ => return Ok(()),
        }
        p.attr_grants -= 1;
        p.dirty = true;
        send_ability_scores(ctx.env, p);
        Ok(())
    }
}
