//! The closed opcode sets.
//!
//! Every packet the simulation emits or accepts is named here; systems
//! refer to opcodes symbolically and never by raw value. The numeric
//! assignments are an internal convention of this build; the external
//! framer remaps them for a given client version if it must.

/// Opcodes for packets the server sends to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ServerOpcode {
    /// An object moved one tile.
    Move = 0x01,
    /// Melee attack animation with damage.
    Attack = 0x02,
    /// Ranged attack animation with arrow projectile.
    ArrowAttack = 0x03,
    /// HP ratio meter shown over a target (party members, attacked NPCs).
    HpMeter = 0x04,
    /// Own HP current/max.
    Hp = 0x05,
    /// Own MP current/max.
    Mp = 0x06,
    /// Skill visual on an object.
    SkillEffect = 0x07,
    /// Action GFX (death pose, bow draw, dialog gestures).
    ActionGfx = 0x08,
    /// Attack-skill cast with projectile or area use-type byte.
    UseAttackSkill = 0x09,
    /// Poison / curse skin tint on an object.
    Poison = 0x0a,
    /// Paralysis family client codes (paralyze, sleep, freeze on/off).
    Paralysis = 0x0b,
    /// Free-standing effect GFX at a map location.
    Effect = 0x0c,
    /// Object entered view (kind-specific body follows).
    PutObject = 0x0d,
    /// Object left view.
    RemoveObject = 0x0e,
    /// Item appended to the inventory window.
    InventoryAdd = 0x0f,
    /// Item removed from the inventory window.
    InventoryRemove = 0x10,
    /// Item stack count changed.
    InventoryCount = 0x11,
    /// Carried-weight ratio.
    Weight = 0x12,
    /// Equip/unequip slot update.
    EquipmentSlot = 0x13,
    /// Item name/status line changed (identify, enchant).
    ChangeItemDesc = 0x14,
    /// Full own-status block (level, exp, stats, speed flags).
    PlayerStatus = 0x15,
    /// The six primary attribute scores.
    AbilityScores = 0x16,
    /// Item appeared on the ground.
    DropItem = 0x17,
    /// Door state entered view.
    DoorPerceive = 0x18,
    /// Clan emblem bytes.
    Emblem = 0x19,
    /// Pet status pack.
    PetPack = 0x1a,
    /// Summon status pack.
    SummonPack = 0x1b,
    /// Doll status pack.
    DollPack = 0x1c,
    /// Follower status pack.
    FollowerPack = 0x1d,
    /// Numbered server message, no arguments.
    ServerMessage = 0x1e,
    /// Numbered server message with string arguments.
    ServerMessageArgs = 0x1f,
    /// Yes/no dialog keyed by a dialog id.
    YesNoDialog = 0x20,
    /// Hypertext window (help pages, clan announcements).
    Hypertext = 0x21,
    /// Sub-typed event packet; party and clan notices live here.
    Event = 0x22,
    /// Buff icon on/off with remaining seconds.
    BuffIcon = 0x23,
    /// Chat line from an object (kind byte selects normal/shout/party/clan/whisper).
    Say = 0x24,
}

/// Sub-types carried inside [`ServerOpcode::Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EventSub {
    /// A member joined the party.
    PartyJoin = 1,
    /// A member left or was kicked; party may have dissolved.
    PartyLeave = 2,
    /// Party member coordinates refresh.
    PartyPositions = 3,
    /// A member joined the clan.
    ClanJoin = 4,
    /// A member left the clan.
    ClanLeave = 5,
    /// Clan announcement changed.
    ClanAnnouncement = 6,
    /// A member's clan rank changed.
    ClanRank = 7,
}

/// Opcodes for packets clients send to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ClientOpcode {
    /// Keepalive; refreshes the session idle clock.
    KeepAlive = 0x40,
    /// Enter the world with a character id (post character-select).
    EnterWorld = 0x41,
    /// One-tile move request.
    Move = 0x42,
    /// Melee or ranged attack on a target object.
    Attack = 0x43,
    /// Cast a skill.
    UseSkill = 0x44,
    /// Use an inventory item (potions, scrolls, collars).
    UseItem = 0x45,
    /// Pick up a ground item.
    Pickup = 0x46,
    /// Drop an item on the ground.
    DropItem = 0x47,
    /// Chat (normal/shout/party/clan sub-kind in payload).
    Chat = 0x48,
    /// Whisper to a named player.
    Whisper = 0x49,
    /// Open trade with a target player.
    TradeRequest = 0x4a,
    /// Add an item to the open trade window.
    TradeAddItem = 0x4b,
    /// Add gold to the open trade window.
    TradeAddGold = 0x4c,
    /// Press OK on the trade window.
    TradeOk = 0x4d,
    /// Cancel the trade window.
    TradeCancel = 0x4e,
    /// Invite a player to the party.
    PartyInvite = 0x4f,
    /// Leave the current party.
    PartyLeave = 0x50,
    /// Kick a member (leader only).
    PartyKick = 0x51,
    /// Chat-party counterpart of invite/leave.
    ChatPartyInvite = 0x52,
    /// Leave the chat party.
    ChatPartyLeave = 0x53,
    /// Clan operations (create/join/leave/kick/rank/notes sub-kind in payload).
    Clan = 0x54,
    /// Upload a clan emblem.
    ClanEmblem = 0x55,
    /// Set the clan announcement.
    ClanAnnouncement = 0x56,
    /// Warehouse deposit/withdraw (personal, elven, character, clan).
    Warehouse = 0x57,
    /// Add or remove a teleport bookmark.
    Bookmark = 0x58,
    /// Spend a level-up attribute grant.
    RaiseAttribute = 0x59,
    /// Answer to a yes/no dialog.
    DialogAnswer = 0x5a,
    /// Save-and-quit request.
    Restart = 0x5b,
}

impl ClientOpcode {
    /// Map a raw opcode byte. Unknown bytes are a protocol error and the
    /// session that sent one is closed.
    pub fn from_u8(raw: u8) -> Option<Self> {
        use ClientOpcode::*;
        Some(match raw {
            0x40 => KeepAlive,
            0x41 => EnterWorld,
            0x42 => Move,
            0x43 => Attack,
            0x44 => UseSkill,
            0x45 => UseItem,
            0x46 => Pickup,
            0x47 => DropItem,
            0x48 => Chat,
            0x49 => Whisper,
            0x4a => TradeRequest,
            0x4b => TradeAddItem,
            0x4c => TradeAddGold,
            0x4d => TradeOk,
            0x4e => TradeCancel,
            0x4f => PartyInvite,
            0x50 => PartyLeave,
            0x51 => PartyKick,
            0x52 => ChatPartyInvite,
            0x53 => ChatPartyLeave,
            0x54 => Clan,
            0x55 => ClanEmblem,
            0x56 => ClanAnnouncement,
            0x57 => Warehouse,
            0x58 => Bookmark,
            0x59 => RaiseAttribute,
            0x5a => DialogAnswer,
            0x5b => Restart,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_opcodes_round_trip() {
        for raw in 0x40..=0x5b {
            let op = ClientOpcode::from_u8(raw).expect("assigned range");
            assert_eq!(op as u8, raw);
        }
        assert!(ClientOpcode::from_u8(0x00).is_none());
        assert!(ClientOpcode::from_u8(0xff).is_none());
    }
}
