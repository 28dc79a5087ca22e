use crate::limits::MAX_ACTIVE_STAYS_PER_ROOM;
use crate::model::*;

use super::EngineError;

// ── Availability checker ─────────────────────────────────────────

/// First active booking on `room` holding any night of `stay`.
///
/// Only active bookings are indexed on a room, so cancelled and checked-out
/// stays never show up here. `exclude` skips the booking being moved or
/// amended so it does not conflict with itself.
pub fn find_conflict(room: &RoomState, stay: &Stay, exclude: Option<BookingId>) -> Option<BookingId> {
    room.overlapping(stay)
        .find(|s| Some(s.booking_id) != exclude)
        .map(|s| s.booking_id)
}

pub fn availability(room: &RoomState, stay: &Stay, exclude: Option<BookingId>) -> Availability {
    match find_conflict(room, stay, exclude) {
        Some(booking_id) => Availability::Conflict(booking_id),
        None => Availability::Available,
    }
}

pub(crate) fn check_no_conflict(
    room: &RoomState,
    stay: &Stay,
    exclude: Option<BookingId>,
) -> Result<(), EngineError> {
    match find_conflict(room, stay, exclude) {
        None => Ok(()),
        Some(booking_id) => {
            metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            tracing::debug!(room_id = room.id(), booking_id, "room unavailable for {}..{}", stay.check_in, stay.check_out);
            Err(EngineError::Conflict {
                room_id: room.id(),
                booking_id,
            })
        }
    }
}

/// Room for one more indexed stay. A booking already on `room` (moving
/// within it) does not add one.
pub(crate) fn check_stay_capacity(room: &RoomState, exclude: Option<BookingId>) -> Result<(), EngineError> {
    let already_here = exclude.is_some_and(|id| room.stays.iter().any(|s| s.booking_id == id));
    if !already_here && room.stays.len() >= MAX_ACTIVE_STAYS_PER_ROOM {
        return Err(EngineError::LimitExceeded("too many active bookings on room"));
    }
    Ok(())
}
