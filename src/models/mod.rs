pub mod booking;
pub mod feedback;
pub mod photographer;
pub mod slot;
pub mod user_settings;

pub use booking::Booking;
pub use feedback::Feedback;
pub use photographer::Photographer;
pub use slot::{DeleteSlotOutcome, FreeSlot, Slot};
pub use user_settings::UserSettings;
