use serde::Serialize;

use super::domain::{Allocation, Gender, PaymentStatus, Student, StudentId};
use super::errors::AllocationError;

/// Outcome of the eligibility gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum Eligibility {
    /// May enter the booking flow; carries the gender used for hall filtering.
    Eligible { gender: Gender },
    Blocked(BlockedReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockedReason {
    StudentInactive,
    AlreadyAllocated,
    PaymentNotVerified,
}

impl BlockedReason {
    pub fn into_error(self, student_id: StudentId) -> AllocationError {
        match self {
            BlockedReason::StudentInactive => AllocationError::StudentInactive { student_id },
            BlockedReason::AlreadyAllocated => AllocationError::AlreadyAllocated { student_id },
            BlockedReason::PaymentNotVerified => {
                AllocationError::PaymentNotVerified { student_id }
            }
        }
    }
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible { .. })
    }

    pub fn gender(&self) -> Option<Gender> {
        match self {
            Eligibility::Eligible { gender } => Some(*gender),
            Eligibility::Blocked(_) => None,
        }
    }
}

/// Pure check: the caller supplies the student's current active allocation, if any.
pub fn check_eligibility(student: &Student, active: Option<&Allocation>) -> Eligibility {
    if !student.active {
        return Eligibility::Blocked(BlockedReason::StudentInactive);
    }

    if active.is_some() {
        return Eligibility::Blocked(BlockedReason::AlreadyAllocated);
    }

    if student.payment_status != PaymentStatus::Verified {
        return Eligibility::Blocked(BlockedReason::PaymentNotVerified);
    }

    Eligibility::Eligible {
        gender: student.gender,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::domain::{
        AllocationId, AllocationStatus, HallId, RoomId, StudentProfile, TransactionReference,
    };
    use chrono::{TimeZone, Utc};

    fn student(payment_status: PaymentStatus) -> Student {
        Student {
            student_id: StudentId("21/0001".to_string()),
            gender: Gender::Female,
            payment_status,
            active: true,
            profile: StudentProfile {
                full_name: "Ada Obi".to_string(),
                ..StudentProfile::default()
            },
            payment: None,
        }
    }

    fn allocation() -> Allocation {
        Allocation {
            allocation_id: AllocationId(1),
            student_id: StudentId("21/0001".to_string()),
            hall_id: HallId(1),
            room_id: RoomId(1),
            allocation_date: Utc.with_ymd_and_hms(2025, 9, 1, 8, 0, 0).unwrap(),
            status: AllocationStatus::Confirmed,
            transaction_reference: TransactionReference("TXN-1".to_string()),
            amount_paid: 0,
        }
    }

    #[test]
    fn verified_student_without_room_is_eligible() {
        let outcome = check_eligibility(&student(PaymentStatus::Verified), None);
        assert_eq!(
            outcome,
            Eligibility::Eligible {
                gender: Gender::Female
            }
        );
        assert_eq!(outcome.gender(), Some(Gender::Female));
    }

    #[test]
    fn unverified_payment_blocks() {
        let outcome = check_eligibility(&student(PaymentStatus::Unverified), None);
        assert_eq!(
            outcome,
            Eligibility::Blocked(BlockedReason::PaymentNotVerified)
        );
        assert!(!outcome.is_eligible());
    }

    #[test]
    fn existing_allocation_blocks_before_payment_check() {
        let existing = allocation();
        let outcome = check_eligibility(&student(PaymentStatus::Verified), Some(&existing));
        assert_eq!(outcome, Eligibility::Blocked(BlockedReason::AlreadyAllocated));
    }

    #[test]
    fn deactivated_student_blocks() {
        let mut inactive = student(PaymentStatus::Verified);
        inactive.active = false;
        assert_eq!(
            check_eligibility(&inactive, None),
            Eligibility::Blocked(BlockedReason::StudentInactive)
        );
    }

    #[test]
    fn blocked_reason_maps_to_error_kind() {
        let id = StudentId("21/0001".to_string());
        let err = BlockedReason::PaymentNotVerified.into_error(id);
        assert_eq!(err.code(), "payment_not_verified");
    }
}
