//! Client packet handlers.
//!
//! A state-separated registry dispatches by opcode: universal handlers run
//! in any state, pre-world handlers only before a character is loaded,
//! in-world handlers only once the session carries a player. Packets that
//! arrive in the wrong state are dropped; packets that fail to decode
//! close the session.

mod chat;
mod clan;
mod combat;
mod dialog;
mod enter;
mod item;
mod movement;
mod party;
mod skill;
mod trade;
mod warehouse;

pub use enter::load_and_enter_world;
pub(crate) use party::{leave_chat_party, leave_party, party_hp_update};

use crate::error::{HandlerError, HandlerResult};
use crate::game::Env;
use crate::net::SessionState;
use crate::world::World;
use runegate_proto::{ClientOpcode, PacketReader, ProtoError};
use std::collections::HashMap;

/// Handler context for one dispatched packet.
pub struct Ctx<'a> {
    pub world: &'a mut World,
    pub env: &'a Env,
    pub session_id: u64,
}

impl Ctx<'_> {
    /// The char id bound to this session; in-world handlers may rely on it.
    pub fn char_id(&self) -> Result<u32, HandlerError> {
        self.world
            .char_by_session(self.session_id)
            .ok_or(HandlerError::TargetInvalid("no character"))
    }

    /// Queue a payload for the originating session.
    pub fn reply(&self, payload: &bytes::Bytes) {
        self.env.sessions.send_to(self.session_id, payload);
    }
}

/// Trait implemented by all packet handlers. Handlers validate cheaply,
/// mutate world state or enqueue work, and never block on I/O.
pub trait PacketHandler: Send + Sync {
    fn handle(&self, ctx: &mut Ctx<'_>, r: &mut PacketReader<'_>) -> HandlerResult;
}

/// Registry of packet handlers, split by required session state.
pub struct Registry {
    universal: HashMap<ClientOpcode, Box<dyn PacketHandler>>,
    pre_world: HashMap<ClientOpcode, Box<dyn PacketHandler>>,
    in_world: HashMap<ClientOpcode, Box<dyn PacketHandler>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create a new registry with all handlers registered.
    pub fn new() -> Self {
        let mut universal: HashMap<ClientOpcode, Box<dyn PacketHandler>> = HashMap::new();
        let mut pre_world: HashMap<ClientOpcode, Box<dyn PacketHandler>> = HashMap::new();
        let mut in_world: HashMap<ClientOpcode, Box<dyn PacketHandler>> = HashMap::new();

        universal.insert(ClientOpcode::KeepAlive, Box::new(enter::KeepAliveHandler));

        pre_world.insert(ClientOpcode::EnterWorld, Box::new(enter::EnterWorldHandler));

        in_world.insert(ClientOpcode::Move, Box::new(movement::MoveHandler));
        in_world.insert(ClientOpcode::Attack, Box::new(combat::AttackHandler));
        in_world.insert(ClientOpcode::UseSkill, Box::new(skill::UseSkillHandler));
        in_world.insert(ClientOpcode::UseItem, Box::new(item::UseItemHandler));
        in_world.insert(ClientOpcode::Pickup, Box::new(item::PickupHandler));
        in_world.insert(ClientOpcode::DropItem, Box::new(item::DropItemHandler));
        in_world.insert(ClientOpcode::Bookmark, Box::new(item::BookmarkHandler));
        in_world.insert(
            ClientOpcode::RaiseAttribute,
            Box::new(item::RaiseAttributeHandler),
        );
        in_world.insert(ClientOpcode::Chat, Box::new(chat::ChatHandler));
        in_world.insert(ClientOpcode::Whisper, Box::new(chat::WhisperHandler));
        in_world.insert(
            ClientOpcode::TradeRequest,
            Box::new(trade::TradeRequestHandler),
        );
        in_world.insert(
            ClientOpcode::TradeAddItem,
            Box::new(trade::TradeAddItemHandler),
        );
        in_world.insert(
            ClientOpcode::TradeAddGold,
            Box::new(trade::TradeAddGoldHandler),
        );
        in_world.insert(ClientOpcode::TradeOk, Box::new(trade::TradeOkHandler));
        in_world.insert(
            ClientOpcode::TradeCancel,
            Box::new(trade::TradeCancelHandler),
        );
        in_world.insert(
            ClientOpcode::PartyInvite,
            Box::new(party::PartyInviteHandler),
        );
        in_world.insert(ClientOpcode::PartyLeave, Box::new(party::PartyLeaveHandler));
        in_world.insert(ClientOpcode::PartyKick, Box::new(party::PartyKickHandler));
        in_world.insert(
            ClientOpcode::ChatPartyInvite,
            Box::new(party::ChatPartyInviteHandler),
        );
        in_world.insert(
            ClientOpcode::ChatPartyLeave,
            Box::new(party::ChatPartyLeaveHandler),
        );
        in_world.insert(ClientOpcode::Clan, Box::new(clan::ClanHandler));
        in_world.insert(ClientOpcode::ClanEmblem, Box::new(clan::ClanEmblemHandler));
        in_world.insert(
            ClientOpcode::ClanAnnouncement,
            Box::new(clan::ClanAnnouncementHandler),
        );
        in_world.insert(
            ClientOpcode::Warehouse,
            Box::new(warehouse::WarehouseHandler),
        );
        in_world.insert(
            ClientOpcode::DialogAnswer,
            Box::new(dialog::DialogAnswerHandler),
        );
        in_world.insert(ClientOpcode::Restart, Box::new(enter::RestartHandler));

        Self {
            universal,
            pre_world,
            in_world,
        }
    }

    /// Dispatch one payload (opcode byte first). Wrong-state packets are
    /// dropped silently; unknown opcodes are protocol errors.
    pub fn dispatch(
        &self,
        ctx: &mut Ctx<'_>,
        state: SessionState,
        payload: &[u8],
    ) -> HandlerResult {
        let Some((&raw, body)) = payload.split_first() else {
            return Err(HandlerError::Decode(ProtoError::Truncated {
                wanted: 1,
                remaining: 0,
            }));
        };
        let opcode =
            ClientOpcode::from_u8(raw).ok_or(HandlerError::Decode(ProtoError::UnknownOpcode(raw)))?;

        let handler = self.universal.get(&opcode).or_else(|| match state {
            SessionState::Connected => None,
            SessionState::Authenticated => self.pre_world.get(&opcode),
            SessionState::InWorld => self.in_world.get(&opcode),
        });

        let Some(handler) = handler else {
            // Known opcode, wrong state: drop.
            return Ok(());
        };

        let mut reader = PacketReader::new(body);
        handler.handle(ctx, &mut reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::game::tick::test_support::harness;
    use crate::net::SessionState;
    use runegate_proto::ClientOpcode;

    #[test]
    fn unknown_opcode_is_a_protocol_error() {
        let (mut world, env) = harness();
        let registry = Registry::new();
        let mut ctx = Ctx {
            world: &mut world,
            env: &env,
            session_id: 1,
        };
        let err = registry
            .dispatch(&mut ctx, SessionState::InWorld, &[0xee])
            .unwrap_err();
        assert!(matches!(err, HandlerError::Decode(_)));
    }

    #[test]
    fn wrong_state_packets_are_dropped() {
        let (mut world, env) = harness();
        let registry = Registry::new();
        let mut ctx = Ctx {
            world: &mut world,
            env: &env,
            session_id: 1,
        };
        // Move is in-world only; from Authenticated it must be ignored.
        let payload = [ClientOpcode::Move as u8, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(registry
            .dispatch(&mut ctx, SessionState::Authenticated, &payload)
            .is_ok());
    }
}
