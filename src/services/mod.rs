pub mod booking;
pub mod policy;

pub use booking::{BookingError, BookingService, Mutated, NotificationOutcome, SkipReason};
pub use policy::{Mutation, RescheduleConflictPolicy, SchedulingPolicy};
