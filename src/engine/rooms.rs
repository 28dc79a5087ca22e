use tracing::info;

use crate::limits::*;
use crate::model::*;

use super::validate::require_text;
use super::{Engine, EngineError, Entity};

// ── Room registry ────────────────────────────────────────────────

impl Engine {
    fn require_room_type(&self, type_id: RoomTypeId) -> Result<(), EngineError> {
        if self.store.get_room_type(&type_id).is_none() {
            return Err(EngineError::Integrity(format!("room type {type_id} does not exist")));
        }
        Ok(())
    }

    pub async fn create_room(
        &self,
        number: &str,
        floor: Option<i32>,
        type_id: RoomTypeId,
        status: Option<RoomStatus>,
    ) -> Result<Room, EngineError> {
        let number = require_text("number", number, MAX_ROOM_NUMBER_LEN, "room number too long")?;

        let _gate = self.begin().await;
        if self.store.room_count() >= MAX_ROOMS {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }
        self.require_room_type(type_id)?;

        let room = Room {
            id: self.store.room_seq.next(),
            number,
            floor: floor.unwrap_or(1),
            type_id,
            status: status.unwrap_or_default(),
        };
        if !self.store.claim_room_number(&room.number, room.id) {
            return Err(EngineError::AlreadyExists(format!("room number {}", room.number)));
        }

        let event = Event::RoomCreated { room: room.clone() };
        if let Err(e) = self.commit_catalog(&event).await {
            self.store.release_room_number(&room.number, room.id);
            return Err(e);
        }
        self.store.insert_room(room.clone());
        info!(room_id = room.id, number = %room.number, "room created");
        Ok(room)
    }

    /// Change a room's number, floor or type. Status has its own operation.
    pub async fn update_room(&self, id: RoomId, patch: RoomPatch) -> Result<Room, EngineError> {
        let _gate = self.begin().await;
        let mut rooms = self.lock_rooms([id]).await?;
        let current = rooms.get(id)?.room.clone();

        let number = match &patch.number {
            Some(n) => require_text("number", n, MAX_ROOM_NUMBER_LEN, "room number too long")?,
            None => current.number.clone(),
        };
        let floor = patch.floor.unwrap_or(current.floor);
        let type_id = patch.type_id.unwrap_or(current.type_id);
        if type_id != current.type_id {
            self.require_room_type(type_id)?;
        }

        let renumbered = number != current.number;
        if renumbered && !self.store.claim_room_number(&number, id) {
            return Err(EngineError::AlreadyExists(format!("room number {number}")));
        }

        let event = Event::RoomUpdated {
            id,
            number: number.clone(),
            floor,
            type_id,
        };
        if let Err(e) = self.commit(&event, &mut rooms, None).await {
            if renumbered {
                self.store.release_room_number(&number, id);
            }
            return Err(e);
        }
        if renumbered {
            self.store.release_room_number(&current.number, id);
        }
        Ok(rooms.get(id)?.room.clone())
    }

    /// Unconditional status overwrite (housekeeping, maintenance, corrections).
    pub async fn set_room_status(&self, id: RoomId, status: RoomStatus) -> Result<Room, EngineError> {
        let _gate = self.begin().await;
        let mut rooms = self.lock_rooms([id]).await?;
        let event = Event::RoomStatusSet { id, status };
        self.commit(&event, &mut rooms, None).await?;
        info!(room_id = id, %status, "room status set");
        Ok(rooms.get(id)?.room.clone())
    }

    /// Remove a room that no active booking holds.
    pub async fn delete_room(&self, id: RoomId) -> Result<(), EngineError> {
        let _gate = self.begin().await;
        let mut rooms = self.lock_rooms([id]).await?;
        let rs = rooms.get(id)?;
        if !rs.stays.is_empty() {
            return Err(EngineError::RoomInUse {
                room_id: id,
                active: rs.stays.len(),
            });
        }
        let number = rs.room.number.clone();

        let event = Event::RoomDeleted { id };
        self.commit(&event, &mut rooms, None).await?;
        self.store.remove_room(&id, &number);
        info!(room_id = id, %number, "room deleted");
        Ok(())
    }

    pub async fn get_room(&self, id: RoomId) -> Result<Room, EngineError> {
        let rs = self
            .store
            .get_room(&id)
            .ok_or(EngineError::NotFound(Entity::Room(id)))?;
        let guard = rs.read().await;
        if guard.deleted {
            return Err(EngineError::NotFound(Entity::Room(id)));
        }
        Ok(guard.room.clone())
    }

    /// Rooms ordered by floor, then number.
    pub async fn list_rooms(&self, filter: RoomFilter) -> Vec<Room> {
        let mut rooms = Vec::new();
        for rs in self.store.room_handles() {
            let guard = rs.read().await;
            if !guard.deleted && filter.matches(&guard.room) {
                rooms.push(guard.room.clone());
            }
        }
        rooms.sort_by(|a, b| a.floor.cmp(&b.floor).then_with(|| a.number.cmp(&b.number)));
        rooms
    }
}
