//! Room allocation workflow.
//!
//! Control flow for a booking: eligibility gate, availability read, best-fit selection, then
//! the locked transaction which commits occupancy, allocation and receipt in one store write.

pub mod availability;
pub mod clock;
pub mod domain;
pub mod eligibility;
pub mod errors;
pub mod import;
pub mod ledger;
pub(crate) mod locks;
pub mod maintenance;
pub mod repository;
pub mod router;
pub mod selector;
pub mod service;
pub mod snapshot;
pub mod store;

#[cfg(test)]
mod tests;

pub use availability::{HallSummary, RoomView};
pub use clock::{Clock, SystemClock};
pub use domain::{
    Actor, Admin, AdminId, Allocation, AllocationId, AllocationStatus, AuditAction, AuditEntry,
    Gender, Hall, HallId, PaymentRecord, PaymentStatus, Receipt, ReceiptNo, Room, RoomId, Student,
    StudentId, StudentProfile, TransactionReference,
};
pub use eligibility::{BlockedReason, Eligibility};
pub use errors::AllocationError;
pub use import::{EnrollmentImporter, HostelInventory, ImportError, ImportSummary};
pub use ledger::{ReceiptLedger, ReceiptView};
pub use maintenance::{MaintenanceState, MaintenanceStatus};
pub use repository::{
    AllocationCommit, AllocationNotice, AllocationNotifier, CommittedAllocation,
    HostelRepository, NotifyError, RepositoryError,
};
pub use router::allocation_router;
pub use service::{
    BookingConfirmation, BookingRequest, CurrentRoom, HostelAllocationService,
    PaymentVerification, StudentDashboard,
};
pub use snapshot::{OccupancySnapshot, OccupantView, RoomOccupancy, TrendPoint};
pub use store::InMemoryHostelRepository;
