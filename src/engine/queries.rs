use chrono::NaiveDate;

use crate::model::*;

use super::availability::availability;
use super::validate::require_stay;
use super::{Engine, EngineError, Entity};

impl Engine {
    pub async fn get_booking(&self, id: BookingId) -> Result<Booking, EngineError> {
        let shared = self
            .store
            .get_booking(&id)
            .ok_or(EngineError::NotFound(Entity::Booking(id)))?;
        let booking = shared.read().await.clone();
        Ok(booking)
    }

    /// Bookings matching `filter`, newest first.
    pub async fn list_bookings(&self, filter: BookingFilter) -> Vec<Booking> {
        let mut out = Vec::new();
        for shared in self.store.booking_handles() {
            let guard = shared.read().await;
            if filter.matches(&guard) {
                out.push(guard.clone());
            }
        }
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        out
    }

    /// Can `room_id` be reserved for `[check_in, check_out)`?
    pub async fn check_availability(
        &self,
        room_id: RoomId,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<Availability, EngineError> {
        let stay = require_stay(Some(check_in), Some(check_out))?;
        let rs = self
            .store
            .get_room(&room_id)
            .ok_or(EngineError::NotFound(Entity::Room(room_id)))?;
        let guard = rs.read().await;
        if guard.deleted {
            return Err(EngineError::NotFound(Entity::Room(room_id)));
        }
        Ok(availability(&guard, &stay, None))
    }

    /// Rooms free for the whole range, excluding rooms under maintenance.
    /// Ordered like `list_rooms`.
    pub async fn available_rooms(
        &self,
        check_in: NaiveDate,
        check_out: NaiveDate,
        type_id: Option<RoomTypeId>,
    ) -> Result<Vec<Room>, EngineError> {
        let stay = require_stay(Some(check_in), Some(check_out))?;
        let mut rooms = Vec::new();
        for rs in self.store.room_handles() {
            let guard = rs.read().await;
            if guard.deleted
                || guard.room.status == RoomStatus::Maintenance
                || type_id.is_some_and(|t| guard.room.type_id != t)
            {
                continue;
            }
            if availability(&guard, &stay, None).is_available() {
                rooms.push(guard.room.clone());
            }
        }
        rooms.sort_by(|a, b| a.floor.cmp(&b.floor).then_with(|| a.number.cmp(&b.number)));
        Ok(rooms)
    }

    /// Dashboard counts for the front desk on `date`.
    pub async fn front_desk(&self, date: NaiveDate) -> FrontDeskSummary {
        let mut summary = FrontDeskSummary {
            date: Some(date),
            ..Default::default()
        };

        for rs in self.store.room_handles() {
            let guard = rs.read().await;
            if guard.deleted {
                continue;
            }
            summary.total_rooms += 1;
            match guard.room.status {
                RoomStatus::Vacant => summary.vacant += 1,
                RoomStatus::Occupied => summary.occupied += 1,
                RoomStatus::Dirty => summary.dirty += 1,
                RoomStatus::Maintenance => summary.maintenance += 1,
            }
        }

        for shared in self.store.booking_handles() {
            let b = shared.read().await;
            match b.status {
                BookingStatus::Confirmed if b.stay.check_in == date => summary.arrivals += 1,
                BookingStatus::CheckedIn => {
                    summary.in_house += 1;
                    if b.stay.check_out == date {
                        summary.departures += 1;
                    }
                }
                _ => {}
            }
        }
        summary
    }
}
