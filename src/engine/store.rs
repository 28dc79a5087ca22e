use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::RwLock;

use crate::model::*;

pub type SharedRoomState = Arc<RwLock<RoomState>>;
pub type SharedBooking = Arc<RwLock<Booking>>;

/// Monotonic id source. Ids burned by a failed WAL append are not reused.
#[derive(Debug)]
pub struct Sequence(AtomicI64);

impl Default for Sequence {
    fn default() -> Self {
        Self(AtomicI64::new(1))
    }
}

impl Sequence {
    pub fn next(&self) -> i64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }

    /// Make sure later ids are allocated above `id` (used during replay).
    pub fn observe(&self, id: i64) {
        self.0.fetch_max(id + 1, Ordering::Relaxed);
    }
}

/// In-memory tables plus the unique indexes the hotel model needs.
///
/// Rooms and bookings are individually locked; catalog rows (room types,
/// guests) are immutable once inserted and live directly in the maps.
#[derive(Default)]
pub struct Store {
    rooms: DashMap<RoomId, SharedRoomState>,
    room_numbers: DashMap<String, RoomId>,
    bookings: DashMap<BookingId, SharedBooking>,
    room_types: DashMap<RoomTypeId, RoomType>,
    guests: DashMap<GuestId, Guest>,
    guest_mobiles: DashMap<String, GuestId>,
    pub room_seq: Sequence,
    pub booking_seq: Sequence,
    pub room_type_seq: Sequence,
    pub guest_seq: Sequence,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Rooms ────────────────────────────────────────────────

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn get_room(&self, id: &RoomId) -> Option<SharedRoomState> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    pub fn insert_room(&self, room: Room) {
        self.room_seq.observe(room.id);
        self.room_numbers.insert(room.number.clone(), room.id);
        self.rooms.insert(room.id, Arc::new(RwLock::new(RoomState::new(room))));
    }

    pub fn remove_room(&self, id: &RoomId, number: &str) {
        self.rooms.remove(id);
        self.release_room_number(number, *id);
    }

    /// Snapshot of room handles. Never hold a map shard across an await.
    pub fn room_handles(&self) -> Vec<SharedRoomState> {
        self.rooms.iter().map(|e| e.value().clone()).collect()
    }

    /// Reserve `number` for room `id`. False if another room holds it.
    pub fn claim_room_number(&self, number: &str, id: RoomId) -> bool {
        match self.room_numbers.entry(number.to_string()) {
            Entry::Occupied(e) => *e.get() == id,
            Entry::Vacant(e) => {
                e.insert(id);
                true
            }
        }
    }

    /// Drop the reservation of `number`, only if it still belongs to `id`.
    pub fn release_room_number(&self, number: &str, id: RoomId) {
        self.room_numbers.remove_if(number, |_, owner| *owner == id);
    }

    // ── Bookings ─────────────────────────────────────────────

    pub fn booking_count(&self) -> usize {
        self.bookings.len()
    }

    pub fn get_booking(&self, id: &BookingId) -> Option<SharedBooking> {
        self.bookings.get(id).map(|e| e.value().clone())
    }

    pub fn insert_booking(&self, booking: Booking) {
        self.booking_seq.observe(booking.id);
        // A compacted log drops deleted rooms, but their ids live on here.
        if let Some(room_id) = booking.room_id {
            self.room_seq.observe(room_id);
        }
        self.bookings.insert(booking.id, Arc::new(RwLock::new(booking)));
    }

    pub fn booking_handles(&self) -> Vec<SharedBooking> {
        self.bookings.iter().map(|e| e.value().clone()).collect()
    }

    // ── Room type catalog ────────────────────────────────────

    pub fn room_type_count(&self) -> usize {
        self.room_types.len()
    }

    pub fn get_room_type(&self, id: &RoomTypeId) -> Option<RoomType> {
        self.room_types.get(id).map(|e| e.value().clone())
    }

    pub fn insert_room_type(&self, room_type: RoomType) {
        self.room_type_seq.observe(room_type.id);
        self.room_types.insert(room_type.id, room_type);
    }

    pub fn room_types(&self) -> Vec<RoomType> {
        self.room_types.iter().map(|e| e.value().clone()).collect()
    }

    // ── Guest directory ──────────────────────────────────────

    pub fn guest_count(&self) -> usize {
        self.guests.len()
    }

    pub fn contains_guest(&self, id: &GuestId) -> bool {
        self.guests.contains_key(id)
    }

    pub fn get_guest(&self, id: &GuestId) -> Option<Guest> {
        self.guests.get(id).map(|e| e.value().clone())
    }

    pub fn insert_guest(&self, guest: Guest) {
        self.guest_seq.observe(guest.id);
        self.guest_mobiles.insert(guest.mobile.clone(), guest.id);
        self.guests.insert(guest.id, guest);
    }

    pub fn guests(&self) -> Vec<Guest> {
        self.guests.iter().map(|e| e.value().clone()).collect()
    }

    pub fn claim_mobile(&self, mobile: &str, id: GuestId) -> bool {
        match self.guest_mobiles.entry(mobile.to_string()) {
            Entry::Occupied(e) => *e.get() == id,
            Entry::Vacant(e) => {
                e.insert(id);
                true
            }
        }
    }

    pub fn release_mobile(&self, mobile: &str, id: GuestId) {
        self.guest_mobiles.remove_if(mobile, |_, owner| *owner == id);
    }
}
