/// Rooms a single property may register.
pub const MAX_ROOMS: usize = 10_000;

/// Room numbers are short labels like "101" or "B-12".
pub const MAX_ROOM_NUMBER_LEN: usize = 16;

/// Guest names, room type names, emails.
pub const MAX_NAME_LEN: usize = 256;

pub const MAX_MOBILE_LEN: usize = 32;

/// Longest stay a single booking may cover.
pub const MAX_STAY_NIGHTS: i64 = 365;

/// Calendar window accepted for check-in / check-out dates.
pub const MIN_BOOKING_YEAR: i32 = 2000;
pub const MAX_BOOKING_YEAR: i32 = 2100;

/// Active (CONFIRMED / CHECKED_IN) bookings indexed on one room.
pub const MAX_ACTIVE_STAYS_PER_ROOM: usize = 4096;

pub const MAX_ROOM_TYPES: usize = 256;
pub const MAX_GUESTS: usize = 1_000_000;
pub const MAX_BOOKINGS: usize = 10_000_000;
