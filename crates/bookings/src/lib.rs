//! Bookings domain (event-sourced).
//!
//! Shoot bookings placed by customers, plus the pure pricing calculator
//! that produces the server-side quote for a booking selection.

pub mod booking;
pub mod pricing;

pub use booking::{
    Booking, BookingCommand, BookingEvent, BookingId, BookingStatus, CancelBooking,
    ConfirmBooking, CustomerDetails, PlaceBooking,
};
pub use pricing::{quote, EventType, PackageType, PriceBreakdown, ServiceType, ShootSelection};
