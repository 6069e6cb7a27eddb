//! Domain models for registration-service.

mod enrollment;
mod tier;

pub use enrollment::{Enrollment, NewEnrollment};
pub use tier::{IneligibleReason, Tier};
