//! Scheduling core: calendar windows, interval overlap, room availability
//! and windowed listing.
//!
//! Everything here is synchronous and side-effect free. Callers fetch
//! candidate records from the store and hand them in.

pub mod availability;
pub mod listing;
pub mod overlap;
pub mod window;

pub use availability::{check_availability, Availability, Bookable, Candidate};
pub use listing::{list_in_window, OwnerField, OwnerFilter, Scheduled};
pub use window::{resolve_window, CalendarWindow, Granularity, TimeWindow, WindowBounds};
