use chrono::Utc;
use rust_decimal::Decimal;

use crate::limits::*;
use crate::model::*;

use super::validate::{require_text, validate_amount};
use super::{Engine, EngineError, Entity};

// Room types and guests are written once and read by the booking core.

impl Engine {
    pub async fn add_room_type(
        &self,
        name: &str,
        base_price: Decimal,
        max_occupancy: u32,
    ) -> Result<RoomType, EngineError> {
        let name = require_text("name", name, MAX_NAME_LEN, "room type name too long")?;
        validate_amount("base_price", base_price)?;
        if max_occupancy == 0 {
            return Err(EngineError::validation("max_occupancy must be at least 1"));
        }

        let _gate = self.begin().await;
        if self.store.room_type_count() >= MAX_ROOM_TYPES {
            return Err(EngineError::LimitExceeded("too many room types"));
        }
        let room_type = RoomType {
            id: self.store.room_type_seq.next(),
            name,
            base_price,
            max_occupancy,
        };
        self.commit_catalog(&Event::RoomTypeAdded {
            room_type: room_type.clone(),
        })
        .await?;
        self.store.insert_room_type(room_type.clone());
        Ok(room_type)
    }

    pub fn get_room_type(&self, id: RoomTypeId) -> Result<RoomType, EngineError> {
        self.store
            .get_room_type(&id)
            .ok_or(EngineError::NotFound(Entity::RoomType(id)))
    }

    pub fn list_room_types(&self) -> Vec<RoomType> {
        let mut types = self.store.room_types();
        types.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        types
    }

    /// Add a guest. Mobile numbers identify guests and must be unique.
    pub async fn register_guest(
        &self,
        name: &str,
        mobile: &str,
        email: Option<&str>,
    ) -> Result<Guest, EngineError> {
        let name = require_text("name", name, MAX_NAME_LEN, "guest name too long")?;
        let mobile = require_text("mobile", mobile, MAX_MOBILE_LEN, "mobile too long")?;
        let email = email.map(str::trim).filter(|e| !e.is_empty());
        if email.is_some_and(|e| e.len() > MAX_NAME_LEN) {
            return Err(EngineError::LimitExceeded("email too long"));
        }

        let _gate = self.begin().await;
        if self.store.guest_count() >= MAX_GUESTS {
            return Err(EngineError::LimitExceeded("too many guests"));
        }
        let guest = Guest {
            id: self.store.guest_seq.next(),
            name,
            mobile,
            email: email.map(str::to_string),
            registered_at: Utc::now(),
        };
        if !self.store.claim_mobile(&guest.mobile, guest.id) {
            return Err(EngineError::AlreadyExists(format!("guest with mobile {}", guest.mobile)));
        }

        let event = Event::GuestRegistered { guest: guest.clone() };
        if let Err(e) = self.commit_catalog(&event).await {
            self.store.release_mobile(&guest.mobile, guest.id);
            return Err(e);
        }
        self.store.insert_guest(guest.clone());
        Ok(guest)
    }

    pub fn get_guest(&self, id: GuestId) -> Result<Guest, EngineError> {
        self.store
            .get_guest(&id)
            .ok_or(EngineError::NotFound(Entity::Guest(id)))
    }

    /// Newest registrations first.
    pub fn list_guests(&self) -> Vec<Guest> {
        let mut guests = self.store.guests();
        guests.sort_by(|a, b| b.registered_at.cmp(&a.registered_at).then(b.id.cmp(&a.id)));
        guests
    }
}
