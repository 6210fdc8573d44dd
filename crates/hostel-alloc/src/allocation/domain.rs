use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Matriculation number; unique per student.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StudentId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HallId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AdminId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AllocationId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReceiptNo(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionReference(pub String);

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for HallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for AdminId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ReceiptNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub const fn label(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }

    /// Accepts the spellings found in enrollment exports ("M", "male", "Female", ...).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "m" | "male" => Some(Self::Male),
            "f" | "female" => Some(Self::Female),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Unverified,
    Verified,
}

impl PaymentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PaymentStatus::Unverified => "unverified",
            PaymentStatus::Verified => "verified",
        }
    }
}

/// Hostel fee payment attached to a student once an administrator verifies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub payment_reference: String,
    /// Amount in minor currency units (kobo, cents).
    pub amount_paid: u64,
    pub verified_at: DateTime<Utc>,
}

/// Profile fields echoed on receipts and dashboards; never consulted for eligibility.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub full_name: String,
    pub department: Option<String>,
    pub level: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub house_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub student_id: StudentId,
    pub gender: Gender,
    pub payment_status: PaymentStatus,
    pub active: bool,
    pub profile: StudentProfile,
    pub payment: Option<PaymentRecord>,
}

impl Student {
    pub fn amount_paid(&self) -> u64 {
        self.payment
            .as_ref()
            .map(|payment| payment.amount_paid)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hall {
    pub hall_id: HallId,
    pub name: String,
    pub gender_restriction: Gender,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub room_id: RoomId,
    pub hall_id: HallId,
    pub room_number: String,
    pub capacity: u32,
    pub current_occupants: u32,
    pub is_under_maintenance: bool,
}

impl Room {
    pub fn is_full(&self) -> bool {
        self.current_occupants >= self.capacity
    }

    pub fn remaining_beds(&self) -> u32 {
        self.capacity.saturating_sub(self.current_occupants)
    }

    /// In service and not full.
    pub fn is_bookable(&self) -> bool {
        !self.is_under_maintenance && !self.is_full()
    }

    pub fn block_label(&self) -> String {
        block_label(&self.room_number)
    }
}

/// Presentational block derived from the leading character of a room number.
pub fn block_label(room_number: &str) -> String {
    room_number
        .trim()
        .chars()
        .next()
        .map(|first| first.to_uppercase().collect())
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationStatus {
    Confirmed,
}

impl AllocationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            AllocationStatus::Confirmed => "confirmed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub allocation_id: AllocationId,
    pub student_id: StudentId,
    pub hall_id: HallId,
    pub room_id: RoomId,
    pub allocation_date: DateTime<Utc>,
    pub status: AllocationStatus,
    pub transaction_reference: TransactionReference,
    pub amount_paid: u64,
}

/// Ledger entry issued once per allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub receipt_no: ReceiptNo,
    pub sequence: u64,
    pub allocation_id: AllocationId,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admin {
    pub admin_id: AdminId,
    pub name: String,
    pub email: String,
    /// Hall this administrator manages; `None` grants every hall.
    pub hall_id: Option<HallId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "snake_case")]
pub enum Actor {
    Student(StudentId),
    Admin(AdminId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    RoomAllocated,
    MaintenanceStarted,
    MaintenanceEnded,
    PaymentVerified,
    QuarantineCleared,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub actor: Actor,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}
