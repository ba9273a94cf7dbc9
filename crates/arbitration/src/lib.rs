//! Arbitration applications: the business handler that drives the timeline.
//!
//! Persistence of the applications themselves is a plain in-memory
//! repository; the interesting part is that every state change appends the
//! matching timeline event, and a failed append fails the change.

pub mod application;
pub mod error;
pub mod service;
pub mod status;

pub use application::{ApplicationPatch, ArbitrationApplication, NewApplication};
pub use error::ApplicationError;
pub use service::ApplicationService;
pub use status::ApplicationStatus;
