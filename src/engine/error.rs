use thiserror::Error;

use crate::model::*;

/// What a `NotFound` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Room(RoomId),
    Booking(BookingId),
    Guest(GuestId),
    RoomType(RoomTypeId),
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Entity::Room(id) => write!(f, "room {id}"),
            Entity::Booking(id) => write!(f, "booking {id}"),
            Entity::Guest(id) => write!(f, "guest {id}"),
            Entity::RoomType(id) => write!(f, "room type {id}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(Entity),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("room {room_id} is not available for these dates: held by booking {booking_id}")]
    Conflict { room_id: RoomId, booking_id: BookingId },

    #[error("cannot {action} booking {booking_id} while it is {status}")]
    InvalidTransition {
        booking_id: BookingId,
        status: BookingStatus,
        action: Action,
    },

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("cannot delete room {room_id}: it has {active} active booking(s)")]
    RoomInUse { room_id: RoomId, active: usize },

    /// A reference the store cannot resolve (unknown guest, unknown room type).
    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),

    #[error("WAL error: {0}")]
    Wal(String),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    /// SQLSTATE reported to wire clients.
    pub fn sqlstate(&self) -> &'static str {
        match self {
            EngineError::NotFound(_) => "P0002",
            EngineError::Validation(_) | EngineError::LimitExceeded(_) => "22023",
            EngineError::Conflict { .. } => "23P01",
            EngineError::InvalidTransition { .. } => "55000",
            EngineError::AlreadyExists(_) => "23505",
            EngineError::RoomInUse { .. } => "2BP01",
            EngineError::Integrity(_) => "23503",
            EngineError::Wal(_) => "58030",
        }
    }
}
