use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One scheduled screening. The seat counter pair is only ever moved by the
/// inventory ledger's conditional updates.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Showtime {
    pub id: i64,
    pub movie_id: i64,
    pub hall: String,
    pub show_time: DateTime<Utc>,
    pub total_seats: i32,
    pub available_seats: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Showtime {
    /// Bookable at `now`: still marked active and not yet started.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.active && self.show_time > now
    }

    /// Fraction of seats already taken, in `0.0..=1.0`.
    pub fn occupancy_rate(&self) -> f64 {
        if self.total_seats <= 0 {
            return 0.0;
        }
        f64::from(self.total_seats - self.available_seats) / f64::from(self.total_seats)
    }
}
