pub mod venue;
pub mod reservation;
pub mod draft;
pub mod records;

pub use venue::{PricingUnit, Service, ServiceId, Venue, VenueId};
pub use reservation::{
    Block, BlockId, NewReservation, Reservation, ReservationId, ReservationStatus, TimeSlot,
};
pub use draft::BookingDraft;
pub use records::{BlockRecord, FeedError, ReservationRecord, ServiceRecord, VenueRecord};
