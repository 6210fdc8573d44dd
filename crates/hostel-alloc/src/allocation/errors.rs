use std::time::Duration;

use super::domain::{AdminId, HallId, ReceiptNo, RoomId, StudentId};
use super::repository::RepositoryError;

/// Every failure the engine can return to a caller.
///
/// All variants are expected outcomes except `DuplicateReceipt`, which signals a
/// broken transaction boundary and quarantines the room it was raised for.
#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    #[error("student {student_id} has no verified hostel payment")]
    PaymentNotVerified { student_id: StudentId },
    #[error("student {student_id} already holds a confirmed allocation")]
    AlreadyAllocated { student_id: StudentId },
    #[error("student {student_id} is not enrolled")]
    StudentNotFound { student_id: StudentId },
    #[error("student {student_id} has been deactivated")]
    StudentInactive { student_id: StudentId },
    #[error("hall {hall_id} does not admit this student's gender")]
    HallGenderMismatch { hall_id: HallId },
    #[error("hall {hall_id} not found")]
    HallNotFound { hall_id: HallId },
    #[error("room {room_id} not found")]
    RoomNotFound { room_id: RoomId },
    #[error("room {room_id} is under maintenance")]
    RoomUnderMaintenance { room_id: RoomId },
    #[error("room {room_id} is full")]
    RoomFull { room_id: RoomId },
    #[error("no room available in hall {hall_id}")]
    NoRoomAvailable { hall_id: HallId },
    #[error("room {room_id} is busy; lock not acquired within {waited:?}")]
    Busy { room_id: RoomId, waited: Duration },
    #[error("receipt {receipt_no} already issued (room {room_id})")]
    DuplicateReceipt { receipt_no: ReceiptNo, room_id: RoomId },
    #[error("room {room_id} is quarantined pending investigation")]
    RoomQuarantined { room_id: RoomId },
    #[error("administrator {admin_id} not found")]
    AdminNotFound { admin_id: AdminId },
    #[error("administrator {admin_id} does not manage hall {hall_id}")]
    AdminOutOfScope { admin_id: AdminId, hall_id: HallId },
    #[error("no receipt found for student {student_id}")]
    ReceiptNotFound { student_id: StudentId },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl AllocationError {
    /// Stable machine-readable code; the presentation layer owns the wording.
    pub const fn code(&self) -> &'static str {
        match self {
            AllocationError::PaymentNotVerified { .. } => "payment_not_verified",
            AllocationError::AlreadyAllocated { .. } => "already_allocated",
            AllocationError::StudentNotFound { .. } => "student_not_found",
            AllocationError::StudentInactive { .. } => "student_inactive",
            AllocationError::HallGenderMismatch { .. } => "hall_gender_mismatch",
            AllocationError::HallNotFound { .. } => "hall_not_found",
            AllocationError::RoomNotFound { .. } => "room_not_found",
            AllocationError::RoomUnderMaintenance { .. } => "room_under_maintenance",
            AllocationError::RoomFull { .. } => "room_full",
            AllocationError::NoRoomAvailable { .. } => "no_room_available",
            AllocationError::Busy { .. } => "busy",
            AllocationError::DuplicateReceipt { .. } => "duplicate_receipt",
            AllocationError::RoomQuarantined { .. } => "room_quarantined",
            AllocationError::AdminNotFound { .. } => "admin_not_found",
            AllocationError::AdminOutOfScope { .. } => "admin_out_of_scope",
            AllocationError::ReceiptNotFound { .. } => "receipt_not_found",
            AllocationError::Repository(_) => "repository_unavailable",
        }
    }

    /// Whether retrying the same request unchanged can succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, AllocationError::Busy { .. })
    }
}
