use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Admin, AdminId, Allocation, AllocationId, AuditEntry, Hall, HallId, PaymentRecord, Receipt,
    ReceiptNo, Room, RoomId, Student, StudentId, TransactionReference,
};

/// Everything the store needs to commit one booking as a single write.
#[derive(Debug, Clone)]
pub struct AllocationCommit {
    pub student_id: StudentId,
    pub hall_id: HallId,
    pub room_id: RoomId,
    pub allocation_date: DateTime<Utc>,
    pub transaction_reference: TransactionReference,
    pub amount_paid: u64,
    pub receipt_prefix: String,
    pub audit: AuditEntry,
}

/// Result of a successful commit: the new allocation, its receipt, and the room after the
/// occupancy increment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedAllocation {
    pub allocation: Allocation,
    pub receipt: Receipt,
    pub room: Room,
}

/// Storage abstraction for halls, rooms, students and the allocation ledger.
///
/// `commit_allocation`, `set_maintenance` and `verify_payment` must each be atomic: either every
/// change they describe becomes visible, or none does.
///
/// Quarantine is stored state: a commit that fails with `DuplicateReceipt` quarantines the room
/// in the same write, and both `commit_allocation` and `set_maintenance` refuse a quarantined
/// room with `Quarantined` until `release_quarantine`.
pub trait HostelRepository: Send + Sync {
    fn student(&self, id: &StudentId) -> Result<Option<Student>, RepositoryError>;
    fn admin(&self, id: AdminId) -> Result<Option<Admin>, RepositoryError>;
    fn hall(&self, id: HallId) -> Result<Option<Hall>, RepositoryError>;
    fn halls(&self) -> Result<Vec<Hall>, RepositoryError>;
    fn room(&self, id: RoomId) -> Result<Option<Room>, RepositoryError>;
    fn rooms_in_hall(&self, hall_id: HallId) -> Result<Vec<Room>, RepositoryError>;

    fn active_allocation(&self, student: &StudentId)
        -> Result<Option<Allocation>, RepositoryError>;
    fn allocations(&self, hall_id: Option<HallId>) -> Result<Vec<Allocation>, RepositoryError>;
    fn allocations_for_room(&self, room_id: RoomId) -> Result<Vec<Allocation>, RepositoryError>;
    fn receipt_for(&self, allocation_id: AllocationId) -> Result<Option<Receipt>, RepositoryError>;

    fn commit_allocation(
        &self,
        commit: AllocationCommit,
    ) -> Result<CommittedAllocation, RepositoryError>;
    fn set_maintenance(
        &self,
        room_id: RoomId,
        under_maintenance: bool,
        audit: AuditEntry,
    ) -> Result<Room, RepositoryError>;
    fn verify_payment(
        &self,
        student: &StudentId,
        payment: PaymentRecord,
        audit: AuditEntry,
    ) -> Result<Student, RepositoryError>;

    fn is_quarantined(&self, room_id: RoomId) -> Result<bool, RepositoryError>;
    /// Returns whether the room was quarantined; the audit entry is only kept when it was.
    fn release_quarantine(&self, room_id: RoomId, audit: AuditEntry)
        -> Result<bool, RepositoryError>;

    fn record_audit(&self, entry: AuditEntry) -> Result<(), RepositoryError>;
    /// Most recent entries first.
    fn audit_log(&self, limit: usize) -> Result<Vec<AuditEntry>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("student already holds an active allocation")]
    StudentAlreadyAllocated,
    #[error("room capacity exhausted")]
    CapacityExceeded,
    #[error("receipt {0} already issued")]
    DuplicateReceipt(ReceiptNo),
    #[error("room {0} is quarantined")]
    Quarantined(RoomId),
    #[error("invalid record: {0}")]
    Invalid(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound hook told about each confirmed booking (e-mail, SMS, portal inbox).
pub trait AllocationNotifier: Send + Sync {
    fn notify(&self, notice: AllocationNotice) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationNotice {
    pub template: String,
    pub student_id: StudentId,
    pub recipient: Option<String>,
    pub details: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
