//! Server packet builders.
//!
//! One function per outbound packet shape. Builders return finished
//! [`Bytes`] payloads; broadcast to N viewers clones the handle, not the
//! buffer. Field layouts are the internal convention of this build; the
//! opcode byte leads, everything else is little-endian, strings are
//! NUL-terminated.

use crate::opcode::{EventSub, ServerOpcode};
use crate::writer::PacketWriter;
use bytes::Bytes;

/// What a viewer needs to render an object entering view.
#[derive(Debug, Clone)]
pub struct ObjectView {
    /// World object id.
    pub obj_id: u32,
    /// Object kind byte (player/NPC/summon/doll/follower/pet/ground item).
    pub kind: u8,
    /// Tile coordinates.
    pub x: i32,
    /// Tile coordinates.
    pub y: i32,
    /// Facing, 0-7.
    pub heading: u8,
    /// Sprite id.
    pub gfx: u16,
    /// Pose/status byte (standing, corpse).
    pub status: u8,
    /// Alignment shown under the name.
    pub lawful: i32,
    /// Display name.
    pub name: String,
    /// Active skin tint: 0 none, 1 green poison, 2 grey.
    pub poison_color: u8,
}

/// Fields of the own-status block.
#[derive(Debug, Clone)]
pub struct StatusView {
    /// Character object id.
    pub obj_id: u32,
    /// Level.
    pub level: u16,
    /// Experience points.
    pub exp: u64,
    /// Current/maximum HP.
    pub hp: (i32, i32),
    /// Current/maximum MP.
    pub mp: (i32, i32),
    /// Armor class.
    pub ac: i16,
    /// Alignment.
    pub lawful: i32,
    /// Carried-weight percentage.
    pub weight_pct: u8,
    /// Move-speed buff level (0 none, 1 haste, 2 greater).
    pub move_speed: u8,
    /// Brave-speed buff level.
    pub brave_speed: u8,
}

/// Companion status pack fields (shared by pet/summon/doll/follower).
#[derive(Debug, Clone)]
pub struct CompanionView {
    /// World object id.
    pub obj_id: u32,
    /// Master's character object id.
    pub master_id: u32,
    /// Display name.
    pub name: String,
    /// Level.
    pub level: u16,
    /// Current/maximum HP.
    pub hp: (i32, i32),
    /// Behaviour status byte (Rest/Aggressive/...).
    pub status: u8,
}

fn finish(w: PacketWriter) -> Bytes {
    w.finish()
}

/// An object moved one tile; `x`/`y` are the tile it left.
pub fn move_object(obj_id: u32, x: i32, y: i32, heading: u8) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::Move);
    w.u32(obj_id).i32(x).i32(y).u8(heading);
    finish(w)
}

/// Melee swing with damage (0 damage renders a miss).
pub fn attack(attacker: u32, target: u32, damage: i32, heading: u8) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::Attack);
    w.u32(attacker).u32(target).i32(damage).u8(heading);
    finish(w)
}

/// Ranged attack with an arrow projectile sprite.
pub fn arrow_attack(attacker: u32, target: u32, damage: i32, heading: u8, arrow_gfx: u16) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::ArrowAttack);
    w.u32(attacker).u32(target).i32(damage).u8(heading).u16(arrow_gfx);
    finish(w)
}

/// HP ratio meter over an object, 0-100.
pub fn hp_meter(obj_id: u32, ratio: u8) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::HpMeter);
    w.u32(obj_id).u8(ratio);
    finish(w)
}

/// Clears the meter line for an object (ratio byte 0xff).
pub fn hp_meter_clear(obj_id: u32) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::HpMeter);
    w.u32(obj_id).u8(0xff);
    finish(w)
}

/// Own HP.
pub fn hp(cur: i32, max: i32) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::Hp);
    w.i32(cur).i32(max);
    finish(w)
}

/// Own MP.
pub fn mp(cur: i32, max: i32) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::Mp);
    w.i32(cur).i32(max);
    finish(w)
}

/// Skill visual attached to an object.
pub fn skill_effect(obj_id: u32, gfx: u16) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::SkillEffect);
    w.u32(obj_id).u16(gfx);
    finish(w)
}

/// Action GFX (death pose 8, bow draw 1, ...).
pub fn action_gfx(obj_id: u32, act: u8) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::ActionGfx);
    w.u32(obj_id).u8(act);
    finish(w)
}

/// Attack-skill cast. `use_type` 6 = single projectile, 8 = area burst.
#[allow(clippy::too_many_arguments)]
pub fn use_attack_skill(
    caster: u32,
    target: u32,
    act: u16,
    gfx: u16,
    damage: i32,
    use_type: u8,
    tx: i32,
    ty: i32,
) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::UseAttackSkill);
    w.u32(caster)
        .u32(target)
        .u16(act)
        .u16(gfx)
        .i32(damage)
        .u8(use_type)
        .i32(tx)
        .i32(ty);
    finish(w)
}

/// Skin tint for poison/curse: 0 clear, 1 green, 2 grey.
pub fn poison_color(obj_id: u32, color: u8) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::Poison);
    w.u32(obj_id).u8(color);
    finish(w)
}

/// Paralysis-family client code. `kind`: 1 paralyze, 2 sleep, 3 freeze.
pub fn paralysis(kind: u8, on: bool) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::Paralysis);
    w.u8(kind).u8(on as u8);
    finish(w)
}

/// Free-standing effect at a map location.
pub fn effect_at(x: i32, y: i32, gfx: u16) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::Effect);
    w.i32(x).i32(y).u16(gfx);
    finish(w)
}

/// Object entered view.
pub fn put_object(v: &ObjectView) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::PutObject);
    w.u8(v.kind)
        .u32(v.obj_id)
        .i32(v.x)
        .i32(v.y)
        .u8(v.heading)
        .u16(v.gfx)
        .u8(v.status)
        .i32(v.lawful)
        .u8(v.poison_color)
        .cstr(&v.name);
    finish(w)
}

/// Object left view.
pub fn remove_object(obj_id: u32) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::RemoveObject);
    w.u32(obj_id);
    finish(w)
}

/// Item appended to the inventory window.
pub fn inventory_add(obj_id: u32, item_id: u32, count: u32, identified: bool, desc: &str) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::InventoryAdd);
    w.u32(obj_id)
        .u32(item_id)
        .u32(count)
        .u8(identified as u8)
        .cstr(desc);
    finish(w)
}

/// Item removed from the inventory window.
pub fn inventory_remove(obj_id: u32) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::InventoryRemove);
    w.u32(obj_id);
    finish(w)
}

/// Stack count changed.
pub fn inventory_count(obj_id: u32, count: u32) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::InventoryCount);
    w.u32(obj_id).u32(count);
    finish(w)
}

/// Carried-weight ratio, 0-100.
pub fn weight(pct: u8) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::Weight);
    w.u8(pct);
    finish(w)
}

/// Equip/unequip slot update.
pub fn equipment_slot(slot: u8, obj_id: u32, equipped: bool) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::EquipmentSlot);
    w.u8(slot).u32(obj_id).u8(equipped as u8);
    finish(w)
}

/// Item name/status line changed (identify, enchant level).
pub fn change_item_desc(obj_id: u32, desc: &str) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::ChangeItemDesc);
    w.u32(obj_id).cstr(desc);
    finish(w)
}

/// Full own-status block.
pub fn player_status(v: &StatusView) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::PlayerStatus);
    w.u32(v.obj_id)
        .u16(v.level)
        .u64(v.exp)
        .i32(v.hp.0)
        .i32(v.hp.1)
        .i32(v.mp.0)
        .i32(v.mp.1)
        .i16(v.ac)
        .i32(v.lawful)
        .u8(v.weight_pct)
        .u8(v.move_speed)
        .u8(v.brave_speed);
    finish(w)
}

/// The six primary attribute scores plus unspent level-up grants.
#[allow(clippy::too_many_arguments)]
pub fn ability_scores(
    str_: u8,
    dex: u8,
    con: u8,
    int: u8,
    wis: u8,
    cha: u8,
    unspent: u8,
) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::AbilityScores);
    w.u8(str_).u8(dex).u8(con).u8(int).u8(wis).u8(cha).u8(unspent);
    finish(w)
}

/// Item appeared on the ground.
pub fn drop_item(obj_id: u32, item_id: u32, x: i32, y: i32, count: u32) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::DropItem);
    w.u32(obj_id).u32(item_id).i32(x).i32(y).u32(count);
    finish(w)
}

/// Door state entered view.
pub fn door_perceive(door_id: u32, x: i32, y: i32, open: bool) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::DoorPerceive);
    w.u32(door_id).i32(x).i32(y).u8(open as u8);
    finish(w)
}

/// Clan emblem bytes.
pub fn emblem(clan_id: u32, emblem_id: u32, data: &[u8]) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::Emblem);
    w.u32(clan_id).u32(emblem_id).u16(data.len() as u16).bytes(data);
    finish(w)
}

fn companion_pack(op: ServerOpcode, v: &CompanionView) -> Bytes {
    let mut w = PacketWriter::new(op);
    w.u32(v.obj_id)
        .u32(v.master_id)
        .u16(v.level)
        .i32(v.hp.0)
        .i32(v.hp.1)
        .u8(v.status)
        .cstr(&v.name);
    finish(w)
}

/// Pet status pack.
pub fn pet_pack(v: &CompanionView) -> Bytes {
    companion_pack(ServerOpcode::PetPack, v)
}

/// Summon status pack.
pub fn summon_pack(v: &CompanionView) -> Bytes {
    companion_pack(ServerOpcode::SummonPack, v)
}

/// Doll status pack.
pub fn doll_pack(v: &CompanionView) -> Bytes {
    companion_pack(ServerOpcode::DollPack, v)
}

/// Follower status pack.
pub fn follower_pack(v: &CompanionView) -> Bytes {
    companion_pack(ServerOpcode::FollowerPack, v)
}

/// Numbered server message, no arguments.
pub fn server_message(id: u16) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::ServerMessage);
    w.u16(id);
    finish(w)
}

/// Numbered server message with string arguments.
pub fn server_message_args(id: u16, args: &[&str]) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::ServerMessageArgs);
    w.u16(id).u8(args.len() as u8);
    for a in args {
        w.cstr(a);
    }
    finish(w)
}

/// Yes/no dialog; the answer comes back with the same `dialog_id`.
pub fn yes_no_dialog(dialog_id: u16, msg_id: u16, args: &[&str]) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::YesNoDialog);
    w.u16(dialog_id).u16(msg_id).u8(args.len() as u8);
    for a in args {
        w.cstr(a);
    }
    finish(w)
}

/// Hypertext window keyed by page name.
pub fn hypertext(page: &str, args: &[&str]) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::Hypertext);
    w.cstr(page).u8(args.len() as u8);
    for a in args {
        w.cstr(a);
    }
    finish(w)
}

/// Chat line. `kind`: 0 normal, 1 shout, 2 whisper, 3 party, 4 clan.
pub fn say(obj_id: u32, kind: u8, name: &str, text: &str) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::Say);
    w.u32(obj_id).u8(kind).cstr(name).cstr(text);
    finish(w)
}

/// Buff icon on/off with remaining seconds.
pub fn buff_icon(skill_id: u16, secs: u16, on: bool) -> Bytes {
    let mut w = PacketWriter::new(ServerOpcode::BuffIcon);
    w.u16(skill_id).u16(secs).u8(on as u8);
    finish(w)
}

fn event(sub: EventSub) -> PacketWriter {
    let mut w = PacketWriter::new(ServerOpcode::Event);
    w.u8(sub as u8);
    w
}

/// A member joined the party.
pub fn party_join(name: &str) -> Bytes {
    let mut w = event(EventSub::PartyJoin);
    w.cstr(name);
    finish(w)
}

/// A member left or was kicked. `dissolved` tells the client to close the
/// party frame entirely.
pub fn party_leave(name: &str, dissolved: bool) -> Bytes {
    let mut w = event(EventSub::PartyLeave);
    w.cstr(name).u8(dissolved as u8);
    finish(w)
}

/// Party member coordinates refresh.
pub fn party_positions(members: &[(u32, i32, i32)]) -> Bytes {
    let mut w = event(EventSub::PartyPositions);
    w.u8(members.len() as u8);
    for &(id, x, y) in members {
        w.u32(id).i32(x).i32(y);
    }
    finish(w)
}

/// A member joined the clan.
pub fn clan_join(name: &str) -> Bytes {
    let mut w = event(EventSub::ClanJoin);
    w.cstr(name);
    finish(w)
}

/// A member left the clan.
pub fn clan_leave(name: &str) -> Bytes {
    let mut w = event(EventSub::ClanLeave);
    w.cstr(name);
    finish(w)
}

/// Clan announcement changed.
pub fn clan_announcement(text: &str) -> Bytes {
    let mut w = event(EventSub::ClanAnnouncement);
    w.cstr(text);
    finish(w)
}

/// A member's clan rank changed.
pub fn clan_rank(name: &str, rank: u8) -> Bytes {
    let mut w = event(EventSub::ClanRank);
    w.cstr(name).u8(rank);
    finish(w)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_message_layout() {
        let b = server_message(278);
        assert_eq!(b[0], ServerOpcode::ServerMessage as u8);
        assert_eq!(u16::from_le_bytes([b[1], b[2]]), 278);
    }

    #[test]
    fn put_object_carries_name_last() {
        let v = ObjectView {
            obj_id: 9,
            kind: 1,
            x: 100,
            y: 200,
            heading: 4,
            gfx: 61,
            status: 0,
            lawful: -100,
            name: "orc".into(),
            poison_color: 0,
        };
        let b = put_object(&v);
        assert_eq!(b[0], ServerOpcode::PutObject as u8);
        assert!(b.ends_with(b"orc\0"));
    }

    #[test]
    fn party_positions_counts_members() {
        let b = party_positions(&[(1, 10, 20), (2, 30, 40)]);
        assert_eq!(b[0], ServerOpcode::Event as u8);
        assert_eq!(b[1], EventSub::PartyPositions as u8);
        assert_eq!(b[2], 2);
    }
}
