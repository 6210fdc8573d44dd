//! Hostel room allocation engine: eligibility, availability, best-fit selection, per-room
//! locked booking, maintenance and receipts.

pub mod allocation;
pub mod config;
pub mod error;
pub mod telemetry;

pub use error::AppError;
