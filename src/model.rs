use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

pub type RoomId = i64;
pub type RoomTypeId = i64;
pub type GuestId = i64;
pub type BookingId = i64;

/// Half-open night range `[check_in, check_out)`.
///
/// The departure date is not a night of the stay: a guest leaving on the 12th
/// and another arriving on the 12th do not overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stay {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl Stay {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Self {
        debug_assert!(check_in < check_out, "Stay check_in must be before check_out");
        Self { check_in, check_out }
    }

    /// `None` when the range is empty or inverted.
    pub fn try_new(check_in: NaiveDate, check_out: NaiveDate) -> Option<Self> {
        (check_in < check_out).then_some(Self { check_in, check_out })
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    pub fn overlaps(&self, other: &Stay) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }

    /// True if the guest is on the premises on `date`, departure day included.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.check_in <= date && date <= self.check_out
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum RoomStatus {
    #[default]
    Vacant,
    Occupied,
    /// Turnover: vacated, waiting for housekeeping.
    Dirty,
    Maintenance,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum BookingStatus {
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
}

impl BookingStatus {
    /// Active bookings hold their room for their nights.
    pub fn is_active(self) -> bool {
        matches!(self, BookingStatus::Confirmed | BookingStatus::CheckedIn)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::CheckedOut | BookingStatus::Cancelled)
    }

    /// Edges of the booking state machine:
    /// CONFIRMED → CHECKED_IN → CHECKED_OUT, and CONFIRMED → CANCELLED.
    pub fn can_become(self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Confirmed, BookingStatus::CheckedIn)
                | (BookingStatus::CheckedIn, BookingStatus::CheckedOut)
                | (BookingStatus::Confirmed, BookingStatus::Cancelled)
        )
    }

    /// Room status written together with a booking entering this status.
    pub fn room_effect(self) -> Option<RoomStatus> {
        match self {
            BookingStatus::CheckedIn => Some(RoomStatus::Occupied),
            BookingStatus::CheckedOut => Some(RoomStatus::Dirty),
            BookingStatus::Confirmed | BookingStatus::Cancelled => None,
        }
    }
}

/// Lifecycle operation, used when reporting an illegal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Action {
    CheckIn,
    CheckOut,
    Cancel,
    Amend,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomType {
    pub id: RoomTypeId,
    pub name: String,
    /// Nightly rate used to populate a booking total when none is given.
    pub base_price: Decimal,
    pub max_occupancy: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    pub id: GuestId,
    pub name: String,
    pub mobile: String,
    pub email: Option<String>,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub number: String,
    pub floor: i32,
    pub type_id: RoomTypeId,
    pub status: RoomStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub guest_id: GuestId,
    /// `None` for a booking whose room is assigned later.
    pub room_id: Option<RoomId>,
    pub stay: Stay,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// Outstanding amount. Negative when the guest has overpaid.
    pub fn balance_due(&self) -> Decimal {
        self.total_amount - self.paid_amount
    }
}

/// An active booking's nights, as indexed on its room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveStay {
    pub booking_id: BookingId,
    pub stay: Stay,
}

/// A room plus the nights currently promised to active bookings.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub room: Room,
    /// Active stays, sorted by `stay.check_in`.
    pub stays: Vec<ActiveStay>,
    /// Set under the write lock when the room is removed, so waiters bail out.
    pub deleted: bool,
}

impl RoomState {
    pub fn new(room: Room) -> Self {
        Self {
            room,
            stays: Vec::new(),
            deleted: false,
        }
    }

    pub fn id(&self) -> RoomId {
        self.room.id
    }

    /// Insert or replace the stay for `booking_id`, keeping sort order.
    pub fn upsert_stay(&mut self, booking_id: BookingId, stay: Stay) {
        self.remove_stay(booking_id);
        let pos = self
            .stays
            .binary_search_by_key(&stay.check_in, |s| s.stay.check_in)
            .unwrap_or_else(|e| e);
        self.stays.insert(pos, ActiveStay { booking_id, stay });
    }

    pub fn remove_stay(&mut self, booking_id: BookingId) -> Option<ActiveStay> {
        let pos = self.stays.iter().position(|s| s.booking_id == booking_id)?;
        Some(self.stays.remove(pos))
    }

    /// Stays whose nights intersect `query`.
    /// Binary search skips everything starting on or after `query.check_out`.
    pub fn overlapping(&self, query: &Stay) -> impl Iterator<Item = &ActiveStay> {
        let right_bound = self
            .stays
            .partition_point(|s| s.stay.check_in < query.check_out);
        self.stays[..right_bound]
            .iter()
            .filter(move |s| s.stay.check_out > query.check_in)
    }
}

/// WAL record. One record per committed command; compound commands
/// (check-in, check-out, amend with a status change) carry both the booking
/// and the room side so they replay as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomTypeAdded {
        room_type: RoomType,
    },
    GuestRegistered {
        guest: Guest,
    },
    RoomCreated {
        room: Room,
    },
    RoomUpdated {
        id: RoomId,
        number: String,
        floor: i32,
        type_id: RoomTypeId,
    },
    RoomStatusSet {
        id: RoomId,
        status: RoomStatus,
    },
    RoomDeleted {
        id: RoomId,
    },
    BookingCreated {
        booking: Booking,
    },
    BookingAmended {
        booking: Booking,
        previous_room_id: Option<RoomId>,
        room_status: Option<RoomStatus>,
    },
    BookingCheckedIn {
        id: BookingId,
        room_id: RoomId,
        previous_room_id: Option<RoomId>,
        stay: Stay,
    },
    BookingCheckedOut {
        id: BookingId,
        room_id: RoomId,
    },
    BookingCancelled {
        id: BookingId,
        room_id: Option<RoomId>,
    },
}

// ── Inputs ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub guest_id: Option<GuestId>,
    pub room_id: Option<RoomId>,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub total_amount: Option<Decimal>,
    pub paid_amount: Option<Decimal>,
}

/// Field changes for `amend`. `room_id: Some(None)` unassigns the room.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingPatch {
    pub room_id: Option<Option<RoomId>>,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub total_amount: Option<Decimal>,
    pub paid_amount: Option<Decimal>,
    pub status: Option<BookingStatus>,
}

impl BookingPatch {
    pub fn is_empty(&self) -> bool {
        *self == BookingPatch::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomPatch {
    pub number: Option<String>,
    pub floor: Option<i32>,
    pub type_id: Option<RoomTypeId>,
}

// ── Query filters and results ────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    /// In-house on this date (departure day included).
    pub date: Option<NaiveDate>,
    pub room_id: Option<RoomId>,
    pub guest_id: Option<GuestId>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        self.status.is_none_or(|s| booking.status == s)
            && self.date.is_none_or(|d| booking.stay.covers(d))
            && self.room_id.is_none_or(|r| booking.room_id == Some(r))
            && self.guest_id.is_none_or(|g| booking.guest_id == g)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoomFilter {
    pub type_id: Option<RoomTypeId>,
    pub status: Option<RoomStatus>,
}

impl RoomFilter {
    pub fn matches(&self, room: &Room) -> bool {
        self.type_id.is_none_or(|t| room.type_id == t) && self.status.is_none_or(|s| room.status == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    /// The first active booking found holding any of the requested nights.
    Conflict(BookingId),
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontDeskSummary {
    pub date: Option<NaiveDate>,
    pub total_rooms: usize,
    pub vacant: usize,
    pub occupied: usize,
    pub dirty: usize,
    pub maintenance: usize,
    /// CONFIRMED bookings arriving on `date`.
    pub arrivals: usize,
    /// CHECKED_IN bookings due out on `date`.
    pub departures: usize,
    pub in_house: usize,
}
