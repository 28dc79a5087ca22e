use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;

use crate::limits::*;
use crate::model::*;

use super::availability::{check_no_conflict, check_stay_capacity};
use super::validate::{require_stay, validate_amount, validate_stay};
use super::{Engine, EngineError, RoomLocks};

/// Reject `action` unless `booking` may move to `next`.
fn ensure_transition(booking: &Booking, next: BookingStatus, action: Action) -> Result<(), EngineError> {
    if booking.status.can_become(next) {
        Ok(())
    } else {
        Err(EngineError::InvalidTransition {
            booking_id: booking.id,
            status: booking.status,
            action,
        })
    }
}

/// Availability plus the per-room stay cap, for placing `stay` on `room_id`.
fn check_room_free(
    rooms: &RoomLocks,
    room_id: RoomId,
    stay: &Stay,
    exclude: Option<BookingId>,
) -> Result<(), EngineError> {
    let rs = rooms.get(room_id)?;
    check_no_conflict(rs, stay, exclude)?;
    check_stay_capacity(rs, exclude)
}

fn record_transition(to: BookingStatus) {
    let to: &'static str = to.into();
    metrics::counter!(crate::observability::BOOKING_TRANSITIONS_TOTAL, "to" => to).increment(1);
}

impl Engine {
    /// Room type base price × nights, or zero when there is no room to price.
    fn default_total(&self, rooms: &RoomLocks, room_id: Option<RoomId>, stay: &Stay) -> Decimal {
        room_id
            .and_then(|id| rooms.get(id).ok())
            .and_then(|rs| self.store.get_room_type(&rs.room.type_id))
            .map(|t| t.base_price * Decimal::from(stay.nights()))
            .unwrap_or(Decimal::ZERO)
    }

    /// Reserve a stay, optionally on a specific room. The room's status is
    /// left alone: a confirmed reservation does not occupy it.
    pub async fn create_booking(&self, req: NewBooking) -> Result<Booking, EngineError> {
        let guest_id = req
            .guest_id
            .ok_or_else(|| EngineError::validation("guest_id is required"))?;
        let stay = require_stay(req.check_in, req.check_out)?;
        if let Some(total) = req.total_amount {
            validate_amount("total_amount", total)?;
        }
        if let Some(paid) = req.paid_amount {
            validate_amount("paid_amount", paid)?;
        }

        let _gate = self.begin().await;
        if self.store.booking_count() >= MAX_BOOKINGS {
            return Err(EngineError::LimitExceeded("too many bookings"));
        }
        if !self.store.contains_guest(&guest_id) {
            return Err(EngineError::Integrity(format!("guest {guest_id} does not exist")));
        }

        let mut rooms = self.lock_rooms(req.room_id).await?;
        if let Some(room_id) = req.room_id {
            check_room_free(&rooms, room_id, &stay, None)?;
        }

        let booking = Booking {
            id: self.store.booking_seq.next(),
            guest_id,
            room_id: req.room_id,
            stay,
            total_amount: req
                .total_amount
                .unwrap_or_else(|| self.default_total(&rooms, req.room_id, &stay)),
            paid_amount: req.paid_amount.unwrap_or(Decimal::ZERO),
            status: BookingStatus::Confirmed,
            created_at: Utc::now(),
        };
        let event = Event::BookingCreated {
            booking: booking.clone(),
        };
        self.commit(&event, &mut rooms, None).await?;
        self.store.insert_booking(booking.clone());
        record_transition(BookingStatus::Confirmed);
        Ok(booking)
    }

    /// CONFIRMED → CHECKED_IN, marking the room OCCUPIED in the same record.
    /// `room_id` overrides the stored room; moving rooms re-checks availability.
    pub async fn check_in(&self, id: BookingId, room_id: Option<RoomId>) -> Result<Booking, EngineError> {
        let _gate = self.begin().await;
        let mut booking = self.lock_booking(id).await?;
        ensure_transition(&booking, BookingStatus::CheckedIn, Action::CheckIn)?;

        let target = room_id
            .or(booking.room_id)
            .ok_or_else(|| EngineError::validation("room must be assigned before check-in"))?;
        let previous_room_id = booking.room_id.filter(|prev| *prev != target);

        let mut rooms = self.lock_rooms(previous_room_id.into_iter().chain([target])).await?;
        if booking.room_id != Some(target) {
            check_room_free(&rooms, target, &booking.stay, Some(id))?;
        }

        let event = Event::BookingCheckedIn {
            id,
            room_id: target,
            previous_room_id,
            stay: booking.stay,
        };
        self.commit(&event, &mut rooms, Some(&mut booking)).await?;
        record_transition(BookingStatus::CheckedIn);
        info!(booking_id = id, room_id = target, "checked in");
        Ok(booking.clone())
    }

    /// CHECKED_IN → CHECKED_OUT, leaving the room DIRTY for turnover.
    pub async fn check_out(&self, id: BookingId) -> Result<Booking, EngineError> {
        let _gate = self.begin().await;
        let mut booking = self.lock_booking(id).await?;
        ensure_transition(&booking, BookingStatus::CheckedOut, Action::CheckOut)?;
        let room_id = booking
            .room_id
            .ok_or_else(|| EngineError::Integrity(format!("checked-in booking {id} has no room")))?;

        let mut rooms = self.lock_rooms([room_id]).await?;
        let event = Event::BookingCheckedOut { id, room_id };
        self.commit(&event, &mut rooms, Some(&mut booking)).await?;
        record_transition(BookingStatus::CheckedOut);
        info!(booking_id = id, room_id, "checked out");
        Ok(booking.clone())
    }

    /// CONFIRMED → CANCELLED. Frees the nights on the room; its status stays.
    pub async fn cancel_booking(&self, id: BookingId) -> Result<Booking, EngineError> {
        let _gate = self.begin().await;
        let mut booking = self.lock_booking(id).await?;
        ensure_transition(&booking, BookingStatus::Cancelled, Action::Cancel)?;

        // Skip a room that no longer exists rather than failing the cancel.
        let room_id = booking.room_id.filter(|r| self.store.get_room(r).is_some());
        let mut rooms = self.lock_rooms(room_id).await?;
        let event = Event::BookingCancelled { id, room_id };
        self.commit(&event, &mut rooms, Some(&mut booking)).await?;
        record_transition(BookingStatus::Cancelled);
        info!(booking_id = id, "cancelled");
        Ok(booking.clone())
    }

    /// Change room, dates, amounts or status of a non-terminal booking.
    ///
    /// Availability is re-checked whenever the nights or the room change on a
    /// booking that stays active. A status change must be a legal edge and
    /// brings the same room coupling as the dedicated operations.
    pub async fn amend_booking(&self, id: BookingId, patch: BookingPatch) -> Result<Booking, EngineError> {
        if let Some(total) = patch.total_amount {
            validate_amount("total_amount", total)?;
        }
        if let Some(paid) = patch.paid_amount {
            validate_amount("paid_amount", paid)?;
        }

        let _gate = self.begin().await;
        let mut booking = self.lock_booking(id).await?;
        if booking.status.is_terminal() {
            return Err(EngineError::InvalidTransition {
                booking_id: id,
                status: booking.status,
                action: Action::Amend,
            });
        }
        if patch.is_empty() {
            return Ok(booking.clone());
        }

        let mut next = booking.clone();
        if let Some(room_id) = patch.room_id {
            if booking.status == BookingStatus::CheckedIn && room_id != booking.room_id {
                return Err(EngineError::InvalidTransition {
                    booking_id: id,
                    status: booking.status,
                    action: Action::Amend,
                });
            }
            next.room_id = room_id;
        }
        if patch.check_in.is_some() || patch.check_out.is_some() {
            let check_in = patch.check_in.unwrap_or(booking.stay.check_in);
            let check_out = patch.check_out.unwrap_or(booking.stay.check_out);
            next.stay = Stay::try_new(check_in, check_out)
                .ok_or_else(|| EngineError::validation("check-out must be after check-in"))?;
            validate_stay(&next.stay)?;
        }
        if let Some(total) = patch.total_amount {
            next.total_amount = total;
        }
        if let Some(paid) = patch.paid_amount {
            next.paid_amount = paid;
        }

        let mut room_status = None;
        let changed_status = patch.status.filter(|s| *s != booking.status);
        if let Some(status) = changed_status {
            let action = match status {
                BookingStatus::CheckedIn => Action::CheckIn,
                BookingStatus::CheckedOut => Action::CheckOut,
                BookingStatus::Cancelled => Action::Cancel,
                BookingStatus::Confirmed => Action::Amend,
            };
            ensure_transition(&booking, status, action)?;
            if status == BookingStatus::CheckedIn && next.room_id.is_none() {
                return Err(EngineError::validation("room must be assigned before check-in"));
            }
            next.status = status;
            room_status = status.room_effect();
        }

        let previous_room_id = booking.room_id.filter(|prev| Some(*prev) != next.room_id);
        let mut rooms = self.lock_rooms(previous_room_id.into_iter().chain(next.room_id)).await?;
        let moved = next.room_id != booking.room_id || next.stay != booking.stay;
        if next.status.is_active()
            && moved
            && let Some(room_id) = next.room_id
        {
            check_room_free(&rooms, room_id, &next.stay, Some(id))?;
        }

        let event = Event::BookingAmended {
            booking: next,
            previous_room_id,
            room_status,
        };
        self.commit(&event, &mut rooms, Some(&mut booking)).await?;
        if let Some(status) = changed_status {
            record_transition(status);
        }
        info!(booking_id = id, "amended");
        Ok(booking.clone())
    }
}
