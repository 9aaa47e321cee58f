//! Warehouse operations.
//!
//! Four families share one flow: a cached row list keyed by owner, a fee
//! charged once per withdraw operation regardless of item count, and - for
//! the clan warehouse - a rank gate plus the single-use lock.

use super::{messages, server_message, Env};
use crate::db::WarehouseKind;
use crate::error::{HandlerError, HandlerResult};
use crate::world::{ItemInstance, World, ADENA, MITHRIL};
use runegate_proto::server;
use tracing::warn;

fn kind_from_byte(b: u8) -> Option<WarehouseKind> {
    Some(match b {
        0 => WarehouseKind::Personal,
        1 => WarehouseKind::Elven,
        2 => WarehouseKind::Character,
        3 => WarehouseKind::Clan,
        _ => return None,
    })
}

/// Owner key for a warehouse family, from the acting player.
fn owner_key(world: &World, char_id: u32, kind: WarehouseKind) -> Option<String> {
    let p = world.players.get(&char_id)?;
    Some(match kind {
        WarehouseKind::Personal | WarehouseKind::Elven => p.account.clone(),
        WarehouseKind::Character => p.char_id.to_string(),
        WarehouseKind::Clan => p.clan?.to_string(),
    })
}

/// Clan-warehouse gate: rank threshold and the single-use lock.
fn clan_gate(world: &mut World, env: &Env, char_id: u32) -> Result<(), HandlerError> {
    let (clan_id, rank, session) = {
        let p = world
            .players
            .get(&char_id)
            .ok_or(HandlerError::TargetInvalid("gone"))?;
        (
            p.clan.ok_or(HandlerError::NoPermission)?,
            p.clan_rank,
            p.session_id,
        )
    };
    if rank < env.config.game.clan_warehouse_rank {
        server_message(env, session, messages::NO_AUTHORITY);
        return Err(HandlerError::NoPermission);
    }
    let clan = world
        .clans
        .get_mut(clan_id)
        .ok_or(HandlerError::TargetInvalid("no clan"))?;
    if !clan.lock_warehouse(char_id) {
        server_message(env, session, messages::WAREHOUSE_IN_USE);
        return Err(HandlerError::NoPermission);
    }
    Ok(())
}

/// Release the clan lock (close, ESC, operation complete, disconnect).
pub fn release_clan_lock(world: &mut World, char_id: u32) {
    let Some(clan_id) = world.players.get(&char_id).and_then(|p| p.clan) else {
        return;
    };
    if let Some(clan) = world.clans.get_mut(clan_id) {
        clan.release_warehouse(char_id);
    }
}

/// Make sure the memory cache for an owner is loaded.
fn ensure_cache(world: &mut World, env: &Env, kind: WarehouseKind, owner: &str) {
    let key = (kind as u8, owner.to_string());
    if world.warehouses.contains_key(&key) {
        return;
    }
    let db = env.db.clone();
    let owner_s = owner.to_string();
    let rows = env
        .rt
        .block_on(async { db.warehouses().load(kind, &owner_s).await })
        .unwrap_or_else(|e| {
            warn!(error = %e, "Warehouse load failed, starting empty");
            Vec::new()
        });
    let items = rows
        .into_iter()
        .map(|r| ItemInstance {
            obj_id: r.obj_id,
            item_id: r.item_id,
            count: r.count,
            enchant: r.enchant,
            identified: r.identified,
            durability: r.durability,
        })
        .collect();
    world.warehouses.insert(key, items);
}

/// Deposit `count` of an inventory item. Memory cache and DB rows move
/// together; a DB failure aborts with the inventory untouched.
pub fn deposit(
    world: &mut World,
    env: &Env,
    char_id: u32,
    kind_byte: u8,
    obj_id: u32,
    count: u32,
) -> HandlerResult {
    let kind = kind_from_byte(kind_byte).ok_or(HandlerError::TargetInvalid("bad kind"))?;
    if kind == WarehouseKind::Clan {
        clan_gate(world, env, char_id)?;
    }
    let owner = owner_key(world, char_id, kind).ok_or(HandlerError::NoPermission)?;
    ensure_cache(world, env, kind, &owner);

    let next_obj = world.alloc_obj_id();
    let (part, session) = {
        let p = world
            .players
            .get_mut(&char_id)
            .ok_or(HandlerError::TargetInvalid("gone"))?;
        let session = p.session_id;
        let Some(part) = p.inventory.take(obj_id, count, next_obj) else {
            return Err(HandlerError::TargetInvalid("no such item"));
        };
        p.dirty = true;
        (part, session)
    };

    // DB row first; on failure the item goes straight back.
    let db = env.db.clone();
    let row = crate::db::ItemRow {
        obj_id: part.obj_id,
        item_id: part.item_id,
        count: part.count,
        enchant: part.enchant,
        identified: part.identified,
        durability: part.durability,
    };
    let owner_s = owner.clone();
    if let Err(e) = env
        .rt
        .block_on(async { db.warehouses().insert(kind, &owner_s, &row).await })
    {
        warn!(error = %e, "Warehouse deposit failed, restoring item");
        if let Some(p) = world.players.get_mut(&char_id) {
            p.inventory.add(part, &env.tables);
        }
        return Err(HandlerError::Internal(e.to_string()));
    }

    let remaining = world
        .players
        .get(&char_id)
        .and_then(|p| p.inventory.get(obj_id))
        .map(|i| i.count)
        .unwrap_or(0);
    if remaining > 0 {
        env.sessions
            .send_to(session, &server::inventory_count(obj_id, remaining));
    } else {
        env.sessions.send_to(session, &server::inventory_remove(obj_id));
    }

    world
        .warehouses
        .get_mut(&(kind as u8, owner))
        .expect("ensured")
        .push(part);
    Ok(())
}

/// Withdraw a stored item. The fee (adena, or mithril for the elven
/// warehouse) is charged once per operation.
pub fn withdraw(
    world: &mut World,
    env: &Env,
    char_id: u32,
    kind_byte: u8,
    obj_id: u32,
) -> HandlerResult {
    let kind = kind_from_byte(kind_byte).ok_or(HandlerError::TargetInvalid("bad kind"))?;
    if kind == WarehouseKind::Clan {
        clan_gate(world, env, char_id)?;
    }
    let owner = owner_key(world, char_id, kind).ok_or(HandlerError::NoPermission)?;
    ensure_cache(world, env, kind, &owner);

    let fee = env.config.game.warehouse_fee;
    let fee_item = if kind == WarehouseKind::Elven { MITHRIL } else { ADENA };

    {
        let p = world
            .players
            .get_mut(&char_id)
            .ok_or(HandlerError::TargetInvalid("gone"))?;
        if !p.inventory.has_room() {
            return Err(HandlerError::BagFull);
        }
        if !p.inventory.consume(fee_item, fee) {
            return Err(HandlerError::GoldShort);
        }
        p.dirty = true;
    }

    let key = (kind as u8, owner.clone());
    let item = {
        let cache = world.warehouses.get_mut(&key).expect("ensured");
        let Some(idx) = cache.iter().position(|i| i.obj_id == obj_id) else {
            return Err(HandlerError::TargetInvalid("not stored"));
        };
        cache.remove(idx)
    };

    let db = env.db.clone();
    let owner_s = owner.clone();
    if let Err(e) = env
        .rt
        .block_on(async { db.warehouses().remove(kind, &owner_s, obj_id).await })
    {
        warn!(error = %e, "Warehouse withdraw failed, restoring row");
        world.warehouses.get_mut(&key).expect("ensured").push(item);
        return Err(HandlerError::Internal(e.to_string()));
    }

    let session = world
        .players
        .get(&char_id)
        .map(|p| p.session_id)
        .unwrap_or(0);
    let desc = env
        .tables
        .item(item.item_id)
        .map(|t| item.describe(t))
        .unwrap_or_default();
    let (item_id, count, identified) = (item.item_id, item.count, item.identified);
    let resident = {
        let p = world.players.get_mut(&char_id).expect("checked");
        let resident = p.inventory.add(item, &env.tables);
        p.dirty = true;
        resident
    };
    env.sessions.send_to(
        session,
        &server::inventory_add(resident, item_id, count, identified, &desc),
    );
    Ok(())
}

/// Close the warehouse window (or ESC); only meaningful for the clan lock.
pub fn close(world: &mut World, _env: &Env, char_id: u32) {
    release_clan_lock(world, char_id);
}
