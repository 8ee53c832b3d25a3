//! Booking engine: availability classification, pricing and the booking wizard.
//! Everything here is pure except [`wizard::BookingWizard::commit`], which calls
//! out to the commit service.

pub mod availability;
pub mod pricing;
pub mod wizard;

pub use availability::{
    classify, day_availability, AvailabilityCalendar, DayAvailability, DayStatus, Occupancy,
};
pub use pricing::{PricingBreakdown, PricingCalculator};
pub use wizard::{validate_date_time, BookingWizard, WizardError, WizardStep};
