mod availability;
mod catalog;
mod error;
mod lifecycle;
mod queries;
mod rooms;
mod store;
mod validate;

pub use availability::{availability, find_conflict};
pub use error::{EngineError, Entity};
pub use store::{SharedBooking, SharedRoomState, Store};

use std::io;
use std::path::PathBuf;

use tokio::sync::{OwnedRwLockWriteGuard, RwLock, mpsc, oneshot};
use tracing::{info, warn};

use crate::model::*;
use crate::wal::Wal;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// Blocks for the first Append, drains whatever else is already queued,
/// then pays for a single fsync and answers every sender in the batch.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                let result = flush_batch(&mut wal, &batch);
                respond_batch(&mut batch, &result);
                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let started = std::time::Instant::now();

    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Flush even after a failed append so half-buffered bytes don't leak
    // into the next batch; every caller in this batch is told it failed.
    let flush_err = wal.flush_sync().err();

    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());
    match append_err.or(flush_err) {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn respond_batch(batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_snapshot(wal.path(), &events).and_then(|()| wal.install_snapshot());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the caller"),
    }
}

/// The booking core: room registry, availability checker and booking
/// lifecycle over one WAL-backed store.
pub struct Engine {
    pub(super) store: Store,
    wal_tx: mpsc::Sender<WalCommand>,
    /// Mutations hold this shared for their whole run; compaction takes it
    /// exclusively so its snapshot sees no half-applied command.
    commit_gate: RwLock<()>,
}

/// Room side of an event. Caller holds the room's write lock.
/// Events that do not concern this room leave it untouched.
fn apply_to_room(rs: &mut RoomState, event: &Event) {
    let here = rs.id();
    match event {
        Event::RoomUpdated {
            number,
            floor,
            type_id,
            ..
        } => {
            rs.room.number = number.clone();
            rs.room.floor = *floor;
            rs.room.type_id = *type_id;
        }
        Event::RoomStatusSet { status, .. } => rs.room.status = *status,
        Event::RoomDeleted { .. } => rs.deleted = true,
        Event::BookingCreated { booking } => {
            if booking.room_id == Some(here) && booking.status.is_active() {
                rs.upsert_stay(booking.id, booking.stay);
            }
        }
        Event::BookingAmended {
            booking,
            previous_room_id,
            room_status,
        } => {
            if *previous_room_id == Some(here) {
                rs.remove_stay(booking.id);
            }
            if booking.room_id == Some(here) {
                if booking.status.is_active() {
                    rs.upsert_stay(booking.id, booking.stay);
                } else {
                    rs.remove_stay(booking.id);
                }
                if let Some(status) = room_status {
                    rs.room.status = *status;
                }
            }
        }
        Event::BookingCheckedIn {
            id,
            room_id,
            previous_room_id,
            stay,
        } => {
            if *room_id == here {
                rs.upsert_stay(*id, *stay);
                rs.room.status = RoomStatus::Occupied;
            } else if *previous_room_id == Some(here) {
                rs.remove_stay(*id);
            }
        }
        Event::BookingCheckedOut { id, room_id } => {
            if *room_id == here {
                rs.remove_stay(*id);
                rs.room.status = RoomStatus::Dirty;
            }
        }
        Event::BookingCancelled { id, .. } => {
            rs.remove_stay(*id);
        }
        // Catalog rows and room creation are handled at the store level.
        Event::RoomTypeAdded { .. } | Event::GuestRegistered { .. } | Event::RoomCreated { .. } => {}
    }
}

/// Booking side of an event. Caller holds the booking's write lock.
fn apply_to_booking(booking: &mut Booking, event: &Event) {
    match event {
        Event::BookingAmended { booking: next, .. } => *booking = next.clone(),
        Event::BookingCheckedIn { room_id, .. } => {
            booking.status = BookingStatus::CheckedIn;
            booking.room_id = Some(*room_id);
        }
        Event::BookingCheckedOut { .. } => booking.status = BookingStatus::CheckedOut,
        Event::BookingCancelled { .. } => booking.status = BookingStatus::Cancelled,
        _ => {}
    }
}

/// Rooms whose state an event changes.
fn event_room_ids(event: &Event) -> Vec<RoomId> {
    let mut ids: Vec<RoomId> = match event {
        Event::RoomUpdated { id, .. } | Event::RoomStatusSet { id, .. } | Event::RoomDeleted { id } => {
            vec![*id]
        }
        Event::BookingCreated { booking } => booking.room_id.into_iter().collect(),
        Event::BookingAmended {
            booking,
            previous_room_id,
            ..
        } => previous_room_id.iter().chain(booking.room_id.iter()).copied().collect(),
        Event::BookingCheckedIn {
            room_id,
            previous_room_id,
            ..
        } => previous_room_id.iter().copied().chain([*room_id]).collect(),
        Event::BookingCheckedOut { room_id, .. } => vec![*room_id],
        Event::BookingCancelled { room_id, .. } => room_id.iter().copied().collect(),
        Event::RoomTypeAdded { .. } | Event::GuestRegistered { .. } | Event::RoomCreated { .. } => Vec::new(),
    };
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Existing booking an event changes (`BookingCreated` inserts instead).
fn event_booking_id(event: &Event) -> Option<BookingId> {
    match event {
        Event::BookingAmended { booking, .. } => Some(booking.id),
        Event::BookingCheckedIn { id, .. }
        | Event::BookingCheckedOut { id, .. }
        | Event::BookingCancelled { id, .. } => Some(*id),
        _ => None,
    }
}

/// Write guards on a set of rooms, acquired in ascending id order.
pub(super) struct RoomLocks {
    guards: Vec<OwnedRwLockWriteGuard<RoomState>>,
}

impl RoomLocks {
    pub(super) fn get(&self, id: RoomId) -> Result<&RoomState, EngineError> {
        self.guards
            .iter()
            .find(|g| g.id() == id)
            .map(|g| &**g)
            .ok_or(EngineError::NotFound(Entity::Room(id)))
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut RoomState> {
        self.guards.iter_mut().map(|g| &mut **g)
    }
}

impl Engine {
    /// Open the store at `wal_path`, replaying whatever the log holds.
    /// Must be called inside a tokio runtime (spawns the WAL writer).
    pub fn new(wal_path: PathBuf) -> io::Result<Self> {
        let replay = Wal::replay(&wal_path)?;
        if let Some(offset) = replay.discarded_from {
            warn!("discarding torn WAL tail at byte {offset} of {}", wal_path.display());
            Wal::truncate(&wal_path, offset)?;
        }
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            store: Store::new(),
            wal_tx,
            commit_gate: RwLock::new(()),
        };
        for event in &replay.events {
            engine.replay_event(event);
        }
        info!(
            "replayed {} WAL records: {} rooms, {} bookings, {} guests",
            replay.events.len(),
            engine.store.room_count(),
            engine.store.booking_count(),
            engine.store.guest_count(),
        );
        Ok(engine)
    }

    /// Apply one recovered record. We are the sole owner of every lock here,
    /// so `try_write` always succeeds; never block inside the runtime.
    fn replay_event(&self, event: &Event) {
        match event {
            Event::RoomTypeAdded { room_type } => self.store.insert_room_type(room_type.clone()),
            Event::GuestRegistered { guest } => self.store.insert_guest(guest.clone()),
            Event::RoomCreated { room } => self.store.insert_room(room.clone()),
            Event::BookingCreated { booking } => self.store.insert_booking(booking.clone()),
            _ => {}
        }

        for room_id in event_room_ids(event) {
            let Some(rs) = self.store.get_room(&room_id) else { continue };
            let mut guard = rs.try_write().expect("replay: uncontended write");
            apply_to_room(&mut guard, event);
            if guard.deleted {
                let number = guard.room.number.clone();
                drop(guard);
                self.store.remove_room(&room_id, &number);
            }
        }

        if let Some(booking_id) = event_booking_id(event)
            && let Some(shared) = self.store.get_booking(&booking_id)
        {
            let mut guard = shared.try_write().expect("replay: uncontended write");
            apply_to_booking(&mut guard, event);
        }
    }

    /// Durably append one record through the group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Wal(e.to_string()))
    }

    /// Log `event`, then apply it to every locked room and to the booking.
    /// Nothing in memory changes unless the record is durable.
    pub(super) async fn commit(
        &self,
        event: &Event,
        rooms: &mut RoomLocks,
        booking: Option<&mut Booking>,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        for rs in rooms.iter_mut() {
            apply_to_room(rs, event);
        }
        if let Some(booking) = booking {
            apply_to_booking(booking, event);
        }
        Ok(())
    }

    /// Append a catalog record that touches no locked state.
    pub(super) async fn commit_catalog(&self, event: &Event) -> Result<(), EngineError> {
        self.wal_append(event).await
    }

    /// Shared side of the commit gate; every mutation holds it throughout.
    pub(super) async fn begin(&self) -> tokio::sync::RwLockReadGuard<'_, ()> {
        self.commit_gate.read().await
    }

    /// Write-lock `ids` in ascending order. Rooms that are missing or were
    /// deleted while we waited are reported as `NotFound`.
    pub(super) async fn lock_rooms(
        &self,
        ids: impl IntoIterator<Item = RoomId>,
    ) -> Result<RoomLocks, EngineError> {
        let mut ids: Vec<RoomId> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();

        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            let rs = self
                .store
                .get_room(&id)
                .ok_or(EngineError::NotFound(Entity::Room(id)))?;
            let guard = rs.write_owned().await;
            if guard.deleted {
                return Err(EngineError::NotFound(Entity::Room(id)));
            }
            guards.push(guard);
        }
        Ok(RoomLocks { guards })
    }

    pub(super) async fn lock_booking(
        &self,
        id: BookingId,
    ) -> Result<OwnedRwLockWriteGuard<Booking>, EngineError> {
        let shared = self
            .store
            .get_booking(&id)
            .ok_or(EngineError::NotFound(Entity::Booking(id)))?;
        Ok(shared.write_owned().await)
    }

    /// Rewrite the WAL as the minimal set of records recreating current state.
    pub async fn compact_wal(&self) -> Result<usize, EngineError> {
        let _freeze = self.commit_gate.write().await;

        let mut room_types = self.store.room_types();
        room_types.sort_by_key(|t| t.id);
        let mut guests = self.store.guests();
        guests.sort_by_key(|g| g.id);

        let mut rooms = Vec::new();
        for rs in self.store.room_handles() {
            let guard = rs.read().await;
            if !guard.deleted {
                rooms.push(guard.room.clone());
            }
        }
        rooms.sort_by_key(|r| r.id);

        let mut bookings = Vec::new();
        for shared in self.store.booking_handles() {
            bookings.push(shared.read().await.clone());
        }
        bookings.sort_by_key(|b| b.id);

        let events: Vec<Event> = room_types
            .into_iter()
            .map(|room_type| Event::RoomTypeAdded { room_type })
            .chain(guests.into_iter().map(|guest| Event::GuestRegistered { guest }))
            .chain(rooms.into_iter().map(|room| Event::RoomCreated { room }))
            .chain(bookings.into_iter().map(|booking| Event::BookingCreated { booking }))
            .collect();
        let count = events.len();

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Wal(e.to_string()))?;
        Ok(count)
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
