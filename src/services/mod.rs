pub mod commit;
pub mod expiry;

pub use commit::{BookingCommitService, CommitOutcome};
pub use expiry::ExpiryService;
