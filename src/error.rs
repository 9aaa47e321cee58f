//! Unified error handling for runegated.
//!
//! This module realizes the failure taxonomy of the engine: validation
//! failures answer with a numbered server message or stay silent, resource
//! shortages abort the operation, protocol and internal failures close the
//! session, and nothing bubbles past a phase boundary.

use runegate_proto::ProtoError;
use thiserror::Error;

/// What dispatch does with a handler failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Drop the failure silently; no state changed.
    Ignore,
    /// Send the numbered server message to the originating session.
    ServerMessage(u16),
    /// Close the originating session; the tick continues.
    CloseSession,
}

/// Errors that can occur during packet handling.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("unknown skill")]
    UnknownSkill,

    #[error("target out of range")]
    OutOfRange,

    #[error("not enough hp")]
    NotEnoughHp,

    #[error("not enough mp")]
    NotEnoughMp,

    #[error("missing casting material")]
    MissingMaterial,

    #[error("inventory full")]
    BagFull,

    #[error("carrying too much weight")]
    Overweight,

    #[error("not enough gold")]
    GoldShort,

    #[error("target invalid: {0}")]
    TargetInvalid(&'static str),

    #[error("no permission")]
    NoPermission,

    #[error("packet decode error: {0}")]
    Decode(#[from] ProtoError),

    #[error("handler panicked")]
    HandlerPanic,

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for packet handlers.
pub type HandlerResult = Result<(), HandlerError>;

impl HandlerError {
    /// Static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownSkill => "unknown_skill",
            Self::OutOfRange => "out_of_range",
            Self::NotEnoughHp => "not_enough_hp",
            Self::NotEnoughMp => "not_enough_mp",
            Self::MissingMaterial => "missing_material",
            Self::BagFull => "bag_full",
            Self::Overweight => "overweight",
            Self::GoldShort => "gold_short",
            Self::TargetInvalid(_) => "target_invalid",
            Self::NoPermission => "no_permission",
            Self::Decode(_) => "decode_error",
            Self::HandlerPanic => "handler_panic",
            Self::Internal(_) => "internal_error",
        }
    }

    /// How dispatch disposes of this failure.
    pub fn disposition(&self) -> Disposition {
        use crate::game::messages;
        match self {
            Self::UnknownSkill | Self::OutOfRange | Self::TargetInvalid(_) => Disposition::Ignore,
            Self::NotEnoughHp => Disposition::ServerMessage(messages::NOT_ENOUGH_HP),
            Self::NotEnoughMp => Disposition::ServerMessage(messages::NOT_ENOUGH_MP),
            Self::MissingMaterial => Disposition::ServerMessage(messages::MISSING_MATERIAL),
            Self::BagFull => Disposition::ServerMessage(messages::BAG_FULL),
            Self::Overweight => Disposition::ServerMessage(messages::OVERWEIGHT),
            Self::GoldShort => Disposition::ServerMessage(messages::GOLD_SHORT),
            Self::NoPermission => Disposition::Ignore,
            Self::Decode(_) | Self::HandlerPanic | Self::Internal(_) => Disposition::CloseSession,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(HandlerError::UnknownSkill.error_code(), "unknown_skill");
        assert_eq!(HandlerError::BagFull.error_code(), "bag_full");
        assert_eq!(
            HandlerError::Internal("x".into()).error_code(),
            "internal_error"
        );
    }

    #[test]
    fn protocol_failures_close_the_session() {
        let err = HandlerError::Decode(ProtoError::UnknownOpcode(0xff));
        assert_eq!(err.disposition(), Disposition::CloseSession);
        assert_eq!(HandlerError::HandlerPanic.disposition(), Disposition::CloseSession);
    }

    #[test]
    fn validation_failures_are_silent() {
        assert_eq!(HandlerError::UnknownSkill.disposition(), Disposition::Ignore);
        assert_eq!(
            HandlerError::TargetInvalid("dead").disposition(),
            Disposition::Ignore
        );
    }
}
